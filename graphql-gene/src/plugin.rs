//! The interface between the schema generator and data-fetching technologies.
//!
//! A [`Model`] is any value describing a type, backed by whatever technology holds the data. The
//! schema generator never inspects models itself. Instead, for each model it asks every registered
//! [`Plugin`] in turn whether it [matches](Plugin::is_matching) the model, and lets the first one
//! that does [populate](Plugin::populate_type_defs) the field-line registry for it. Fields using the
//! default resolver are later answered by the same plugin's
//! [`default_resolver`](Plugin::default_resolver).
//!
//! Plugins recognize models by the capabilities they expose through [`Model::facet`], not by their
//! concrete type, so one model type can be served by several plugins and vice versa.

use crate::{
    config::{FieldConfig, GeneConfig},
    context::{RequestContext, ResolveInfo},
    registry::{TypeDefLines, TypeDefinition},
    Error, Result,
};
use async_graphql::{Name, Value};
use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// A source of type information.
pub trait Model: Send + Sync + Debug {
    /// The type-level policy declared with the model, if any.
    fn gene_config(&self) -> Option<&GeneConfig> {
        None
    }

    /// A named capability of this model.
    ///
    /// Plugins use facets to detect whether they can handle a model and to access the data they
    /// need from it.
    fn facet(&self, name: &str) -> Option<&(dyn Any + Send + Sync)>;
}

/// Properties of the schema being generated which plugins may need to take into account.
#[derive(Clone, Debug, Default)]
pub struct SchemaInfo {
    /// Custom scalars available in the schema, from the base schema or registered explicitly.
    pub scalars: IndexSet<String>,
    /// Overrides of a plugin's native type → GraphQL type mapping.
    pub data_type_map: IndexMap<String, String>,
}

impl SchemaInfo {
    pub fn has_scalar(&self, name: &str) -> bool {
        self.scalars.contains(name)
    }

    /// The GraphQL type the application maps the native type `native` to, if it overrides it.
    pub fn data_type(&self, native: &str) -> Option<&str> {
        self.data_type_map.get(native).map(String::as_str)
    }
}

/// Everything a plugin needs to populate the definition of one type.
pub struct PopulateParams<'a> {
    pub type_defs: &'a mut TypeDefLines,
    pub model: &'a dyn Model,
    /// The name to populate: the model's primary name or one of its aliases.
    pub type_name: &'a str,
    /// The policy for `type_name`.
    pub config: &'a GeneConfig,
    pub schema: &'a SchemaInfo,
}

impl<'a> PopulateParams<'a> {
    pub fn is_field_included(&self, field: &str) -> bool {
        self.config.is_field_included(field)
    }
}

/// Work deferred until every model has populated its type.
///
/// Hooks typically generate filter inputs for associations, which need the fields of the
/// association target.
pub type AfterTypeDefHook = Box<dyn FnOnce(&mut TypeDefLines) -> Result<()> + Send>;

/// The arguments of a default resolver call.
#[derive(Clone, Debug)]
pub struct DefaultResolverParams {
    /// The model that owns the field's return type.
    pub model: Arc<dyn Model>,
    /// The primary type name of `model`.
    pub model_key: String,
    pub source: Value,
    /// Field arguments: `page`, `perPage`, `id`, `locale`, `where` and `order`.
    pub args: IndexMap<Name, Value>,
    pub context: RequestContext,
    pub info: ResolveInfo,
}

/// A data-fetching technology.
///
/// Plugins provide type definitions either by implementing
/// [`populate_type_defs`](Self::populate_type_defs), which gets full access to the registry and
/// may defer work with hooks, or by implementing the simpler [`get_type_def`](Self::get_type_def),
/// whose result the default `populate_type_defs` merges into the registry.
#[async_trait]
pub trait Plugin: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Whether this plugin can handle `model`.
    fn is_matching(&self, model: &dyn Model) -> bool;

    /// The definition of the type `params.type_name`.
    fn get_type_def(&self, params: &PopulateParams<'_>) -> Result<TypeDefinition> {
        Err(Error::plugin(
            self.name(),
            format!("unable to define type {}", params.type_name),
        ))
    }

    /// Add the definition of the type `params.type_name` to the registry.
    fn populate_type_defs(&self, params: PopulateParams<'_>) -> Result<Vec<AfterTypeDefHook>> {
        let def = self.get_type_def(&params)?;
        params.type_defs.merge_type(params.type_name, def);
        Ok(vec![])
    }

    /// Fetch the data for a field using the default resolver.
    async fn default_resolver(
        &self,
        params: DefaultResolverParams,
    ) -> async_graphql::Result<Value> {
        Err(format!(
            "{} has no default resolver for {}",
            self.name(),
            params.model_key
        )
        .into())
    }
}

/// A model together with the plugin that handles it.
#[derive(Clone, Debug)]
pub(crate) struct ModelBinding {
    pub model: Arc<dyn Model>,
    pub plugin: Arc<dyn Plugin>,
    pub model_key: String,
}

/// The facet through which [`DeclaredModel`] exposes its fields.
pub const FIELDS_FACET: &str = "fields";

/// A model consisting only of field declarations, with no data behind it.
///
/// This is useful for output types computed by custom resolvers which should still be subject to
/// [`GeneConfig`] policy, such as aliases and field exclusion.
#[derive(Clone, Debug, Default)]
pub struct DeclaredModel {
    fields: IndexMap<String, FieldConfig>,
    config: Option<GeneConfig>,
}

impl DeclaredModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, field: impl Into<FieldConfig>) -> Self {
        self.fields.insert(name.into(), field.into());
        self
    }

    pub fn with_config(mut self, config: GeneConfig) -> Self {
        self.config = Some(config);
        self
    }
}

impl Model for DeclaredModel {
    fn gene_config(&self) -> Option<&GeneConfig> {
        self.config.as_ref()
    }

    fn facet(&self, name: &str) -> Option<&(dyn Any + Send + Sync)> {
        match name {
            FIELDS_FACET => Some(&self.fields),
            _ => None,
        }
    }
}

/// The plugin for models exposing a [`FIELDS_FACET`], like [`DeclaredModel`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DeclaredPlugin;

impl DeclaredPlugin {
    fn fields<'a>(model: &'a dyn Model) -> Option<&'a IndexMap<String, FieldConfig>> {
        model.facet(FIELDS_FACET)?.downcast_ref()
    }
}

#[async_trait]
impl Plugin for DeclaredPlugin {
    fn name(&self) -> &str {
        "declared"
    }

    fn is_matching(&self, model: &dyn Model) -> bool {
        Self::fields(model).is_some()
    }

    fn get_type_def(&self, params: &PopulateParams<'_>) -> Result<TypeDefinition> {
        let fields = Self::fields(params.model)
            .ok_or_else(|| Error::plugin(self.name(), "model has no declared fields"))?;

        let mut def = TypeDefinition::default();
        for (name, field) in fields {
            let Some(return_type) = &field.return_type else {
                continue;
            };
            if params.is_field_included(name) {
                def.ensure_field(name).type_def = return_type.clone();
            }
        }
        Ok(def)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_declared_plugin() {
        let model = DeclaredModel::new()
            .field("name", "String!")
            .field("secret", "String")
            .field("createdAt", "String")
            .field("nothing", FieldConfig::existing());
        let config = GeneConfig::new().exclude("secret");
        let plugin = DeclaredPlugin;
        assert!(plugin.is_matching(&model));

        let mut type_defs = TypeDefLines::new();
        let hooks = plugin
            .populate_type_defs(PopulateParams {
                type_defs: &mut type_defs,
                model: &model,
                type_name: "Message",
                config: &config,
                schema: &Default::default(),
            })
            .unwrap();
        assert!(hooks.is_empty());
        assert_eq!(
            type_defs.print(),
            "type Message {\n  name: String!\n}"
        );
    }

    #[derive(Debug)]
    struct Opaque;

    impl Model for Opaque {
        fn facet(&self, _name: &str) -> Option<&(dyn Any + Send + Sync)> {
            None
        }
    }

    #[test]
    fn test_declared_plugin_ignores_other_models() {
        assert!(!DeclaredPlugin.is_matching(&Opaque));
    }

    #[async_std::test]
    async fn test_no_default_resolver() {
        let err = DeclaredPlugin
            .default_resolver(DefaultResolverParams {
                model: Arc::new(Opaque),
                model_key: "Opaque".into(),
                source: Value::Null,
                args: Default::default(),
                context: Default::default(),
                info: ResolveInfo {
                    parent_type: "Query".into(),
                    field_name: "opaque".into(),
                    return_type: crate::signature::TypeSignature::parse("Opaque").unwrap(),
                    selection: Default::default(),
                },
            })
            .await
            .unwrap_err();
        assert_eq!(err.message, "declared has no default resolver for Opaque");
    }
}
