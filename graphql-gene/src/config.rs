//! Declarative configuration of types and fields.
//!
//! Every type in a generated schema is declared by a [`TypeSource`]: a [`Model`] handled by a data
//! plugin, a list of enum values, or an inline [`TypeConfig`]. Models and inline types carry a
//! [`GeneConfig`] describing type-level policy (which fields to expose, directives, aliases) and
//! each field can be configured with a [`FieldConfig`].

use crate::{
    directive::{Directive, LazyDirective},
    plugin::Model,
    registry::VarType,
    resolvers::{Resolver, ResolverParams},
};
use async_graphql::Value;
use derive_more::From;
use indexmap::IndexMap;
use regex::Regex;
use std::future::Future;
use std::sync::Arc;

/// Audit fields which are hidden unless [`GeneConfig::include_timestamps`] says otherwise.
pub const TIMESTAMP_FIELDS: [&str; 2] = ["createdAt", "updatedAt"];

/// A field name or a pattern matching field names.
#[derive(Clone, Debug, From)]
pub enum FieldMatcher {
    Name(String),
    Pattern(Regex),
}

impl From<&str> for FieldMatcher {
    fn from(name: &str) -> Self {
        Self::Name(name.into())
    }
}

impl FieldMatcher {
    pub fn matches(&self, field: &str) -> bool {
        match self {
            Self::Name(name) => name == field,
            Self::Pattern(pattern) => pattern.is_match(field),
        }
    }
}

/// Which of the [timestamp fields](TIMESTAMP_FIELDS) are exposed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum IncludeTimestamps {
    #[default]
    None,
    All,
    Only(Vec<String>),
}

impl From<bool> for IncludeTimestamps {
    fn from(include: bool) -> Self {
        if include {
            Self::All
        } else {
            Self::None
        }
    }
}

impl<S: Into<String>> From<Vec<S>> for IncludeTimestamps {
    fn from(fields: Vec<S>) -> Self {
        Self::Only(fields.into_iter().map(Into::into).collect())
    }
}

/// Type-level policy for a model or inline type.
#[derive(Clone, Debug, Default)]
pub struct GeneConfig {
    /// If set, only fields matching one of these are exposed.
    pub include: Option<Vec<FieldMatcher>>,
    /// Fields matching any of these are hidden.
    pub exclude: Vec<FieldMatcher>,
    pub include_timestamps: IncludeTimestamps,
    /// Overrides the kind of the generated type.
    pub var_type: Option<VarType>,
    /// Interfaces implemented by the generated type.
    pub implements: Vec<String>,
    /// Directives applied to every field returning this type.
    pub directives: Vec<LazyDirective>,
    /// Other names under which the same model is exposed, each with its own policy.
    pub aliases: IndexMap<String, GeneConfig>,
    /// Field configuration for other types, declared alongside this model.
    pub types: IndexMap<String, IndexMap<String, FieldConfig>>,
}

impl GeneConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, field: impl Into<FieldMatcher>) -> Self {
        self.include.get_or_insert_with(Vec::new).push(field.into());
        self
    }

    pub fn exclude(mut self, field: impl Into<FieldMatcher>) -> Self {
        self.exclude.push(field.into());
        self
    }

    pub fn include_timestamps(mut self, include: impl Into<IncludeTimestamps>) -> Self {
        self.include_timestamps = include.into();
        self
    }

    pub fn var_type(mut self, var_type: VarType) -> Self {
        self.var_type = Some(var_type);
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }

    pub fn directive(mut self, directive: impl Into<LazyDirective>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Add a directive which is only built when the schema is generated.
    pub fn lazy_directive(self, factory: impl Fn() -> Directive + Send + Sync + 'static) -> Self {
        self.directive(LazyDirective::new(factory))
    }

    pub fn alias(mut self, name: impl Into<String>, config: GeneConfig) -> Self {
        self.aliases.insert(name.into(), config);
        self
    }

    /// Configure fields of another type, such as `Query`.
    pub fn extend<K, V>(mut self, type_name: impl Into<String>, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<FieldConfig>,
    {
        let existing = self.types.entry(type_name.into()).or_default();
        for (name, field) in fields {
            existing.insert(name.into(), field.into());
        }
        self
    }

    /// Whether the field `field` is exposed under this policy.
    pub fn is_field_included(&self, field: &str) -> bool {
        let matches = |matchers: &[FieldMatcher]| matchers.iter().any(|m| m.matches(field));

        if let Some(include) = &self.include {
            if !matches(include) {
                return false;
            }
        }
        if matches(&self.exclude) {
            return false;
        }
        match &self.include_timestamps {
            IncludeTimestamps::All => true,
            IncludeTimestamps::None => !TIMESTAMP_FIELDS.contains(&field),
            IncludeTimestamps::Only(fields) => {
                !TIMESTAMP_FIELDS.contains(&field) || fields.iter().any(|f| f == field)
            }
        }
    }
}

/// How a field is resolved.
#[derive(Clone, Debug)]
pub enum ResolverConfig {
    /// Fetch data through the plugin which owns the field's return type.
    Default,
    Custom(Resolver),
}

/// Configuration of a single field.
#[derive(Clone, Debug, Default)]
pub struct FieldConfig {
    pub return_type: Option<String>,
    /// Argument signatures. Ignored for fields using the default resolver, whose arguments are
    /// generated.
    pub args: IndexMap<String, String>,
    pub resolver: Option<ResolverConfig>,
    pub directives: Vec<LazyDirective>,
}

impl FieldConfig {
    pub fn new(return_type: impl Into<String>) -> Self {
        Self {
            return_type: Some(return_type.into()),
            ..Default::default()
        }
    }

    /// A field with no return type of its own, used to attach directives or a resolver to a field
    /// declared elsewhere.
    pub fn existing() -> Self {
        Self::default()
    }

    /// A field of type `return_type` served by the default resolver.
    pub fn default_resolver(return_type: impl Into<String>) -> Self {
        Self::new(return_type).use_default_resolver()
    }

    pub fn use_default_resolver(mut self) -> Self {
        self.resolver = Some(ResolverConfig::Default);
        self
    }

    pub fn arg(mut self, name: impl Into<String>, signature: impl Into<String>) -> Self {
        self.args.insert(name.into(), signature.into());
        self
    }

    pub fn resolver<F, Fut>(mut self, resolver: F) -> Self
    where
        F: Fn(ResolverParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = async_graphql::Result<Value>> + Send + 'static,
    {
        self.resolver = Some(ResolverConfig::Custom(Resolver::new(resolver)));
        self
    }

    pub fn directive(mut self, directive: impl Into<LazyDirective>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn lazy_directive(self, factory: impl Fn() -> Directive + Send + Sync + 'static) -> Self {
        self.directive(LazyDirective::new(factory))
    }

    pub fn uses_default_resolver(&self) -> bool {
        matches!(self.resolver, Some(ResolverConfig::Default))
    }
}

impl From<&str> for FieldConfig {
    fn from(return_type: &str) -> Self {
        Self::new(return_type)
    }
}

impl From<String> for FieldConfig {
    fn from(return_type: String) -> Self {
        Self::new(return_type)
    }
}

/// An inline type declaration, not backed by any data plugin.
#[derive(Clone, Debug, Default)]
pub struct TypeConfig {
    pub config: GeneConfig,
    pub fields: IndexMap<String, FieldConfig>,
}

impl TypeConfig {
    fn of(var_type: VarType) -> Self {
        Self {
            config: GeneConfig::new().var_type(var_type),
            fields: Default::default(),
        }
    }

    pub fn object() -> Self {
        Self::of(VarType::Object)
    }

    pub fn input() -> Self {
        Self::of(VarType::Input)
    }

    pub fn interface() -> Self {
        Self::of(VarType::Interface)
    }

    /// A union of the given member types.
    pub fn union<S: Into<String>>(members: impl IntoIterator<Item = S>) -> Self {
        let mut union = Self::of(VarType::Union);
        for member in members {
            union.fields.insert(member.into(), FieldConfig::existing());
        }
        union
    }

    pub fn field(mut self, name: impl Into<String>, field: impl Into<FieldConfig>) -> Self {
        self.fields.insert(name.into(), field.into());
        self
    }

    pub fn with_config(mut self, config: GeneConfig) -> Self {
        self.config = config;
        self
    }

    pub fn directive(mut self, directive: impl Into<LazyDirective>) -> Self {
        self.config.directives.push(directive.into());
        self
    }
}

impl<K: Into<String>, V: Into<FieldConfig>> FromIterator<(K, V)> for TypeConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            config: Default::default(),
            fields: iter
                .into_iter()
                .map(|(name, field)| (name.into(), field.into()))
                .collect(),
        }
    }
}

/// The declaration of a type in the schema.
#[derive(Clone, Debug, From)]
pub enum TypeSource {
    /// A model handled by the first matching plugin.
    Model(Arc<dyn Model>),
    /// An enum with the given values.
    Enum(Vec<String>),
    Inline(TypeConfig),
}

impl TypeSource {
    pub fn model(model: impl Model + 'static) -> Self {
        Self::Model(Arc::new(model))
    }

    pub fn enumeration<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::Enum(values.into_iter().map(Into::into).collect())
    }

    pub fn union<S: Into<String>>(members: impl IntoIterator<Item = S>) -> Self {
        Self::Inline(TypeConfig::union(members))
    }

    /// An object type with the given fields.
    pub fn object<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<FieldConfig>,
    {
        Self::inline(TypeConfig::object(), fields)
    }

    pub fn input<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<FieldConfig>,
    {
        Self::inline(TypeConfig::input(), fields)
    }

    pub fn interface<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<FieldConfig>,
    {
        Self::inline(TypeConfig::interface(), fields)
    }

    fn inline<K, V>(config: TypeConfig, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<FieldConfig>,
    {
        Self::Inline(
            fields
                .into_iter()
                .fold(config, |config, (name, field)| config.field(name, field)),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_timestamps_hidden_by_default() {
        let config = GeneConfig::new();
        assert!(config.is_field_included("status"));
        assert!(!config.is_field_included("createdAt"));
        assert!(!config.is_field_included("updatedAt"));

        let config = GeneConfig::new().include_timestamps(true);
        assert!(config.is_field_included("createdAt"));

        let config = GeneConfig::new().include_timestamps(vec!["createdAt"]);
        assert!(config.is_field_included("createdAt"));
        assert!(!config.is_field_included("updatedAt"));
    }

    #[test]
    fn test_include_exclude() {
        let config = GeneConfig::new()
            .include("id")
            .include(Regex::new("^(name|status)").unwrap())
            .exclude("statusCode");
        assert!(config.is_field_included("id"));
        assert!(config.is_field_included("name"));
        assert!(config.is_field_included("status"));
        assert!(!config.is_field_included("statusCode"));
        assert!(!config.is_field_included("total"));

        let config = GeneConfig::new().exclude(Regex::new("^secret").unwrap());
        assert!(!config.is_field_included("secretKey"));
        assert!(config.is_field_included("key"));
    }

    #[test]
    fn test_field_config_shorthand() {
        let field = FieldConfig::from("[Order!]!");
        assert_eq!(field.return_type.as_deref(), Some("[Order!]!"));
        assert!(!field.uses_default_resolver());
        assert!(FieldConfig::default_resolver("Order").uses_default_resolver());
    }

    #[test]
    fn test_type_configs() {
        let union = TypeConfig::union(["Order", "Product"]);
        assert_eq!(union.config.var_type, Some(VarType::Union));
        assert_eq!(union.fields.keys().collect::<Vec<_>>(), ["Order", "Product"]);

        let message: TypeConfig = [("text", "String!"), ("level", "Int")].into_iter().collect();
        assert_eq!(message.config.var_type, None);
        assert_eq!(message.fields.len(), 2);

        match TypeSource::enumeration(["PAID", "PENDING"]) {
            TypeSource::Enum(values) => assert_eq!(values, ["PAID", "PENDING"]),
            source => panic!("unexpected source {source:?}"),
        }
        match TypeSource::input([("size", "Int!")]) {
            TypeSource::Inline(input) => {
                assert_eq!(input.config.var_type, Some(VarType::Input));
                assert_eq!(input.fields["size"].return_type.as_deref(), Some("Int!"));
            }
            source => panic!("unexpected source {source:?}"),
        }
    }
}
