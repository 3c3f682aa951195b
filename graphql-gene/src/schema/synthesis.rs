//! Generation of type definitions from type sources.
//!
//! Synthesis runs in two phases. First every [`TypeSource`] and every type extension contributes
//! field lines to the registry. Filter inputs for default-resolved fields depend on the fields of
//! the type they return, which may be declared by a later source, so their generation is deferred
//! along with the hooks returned by plugins until every source has been processed.

use crate::{
    config::{FieldConfig, GeneConfig, TypeConfig, TypeSource},
    default_resolver::{generate_filter_type_defs, populate_args_def},
    directive::DirectiveDefs,
    extend::TypeExtensions,
    plugin::{AfterTypeDefHook, Model, ModelBinding, Plugin, PopulateParams, SchemaInfo},
    registry::{TypeDefLines, VarType},
    resolvers::FieldWirings,
    signature::{return_type_name, TypeSignature},
    Result,
};
use indexmap::IndexMap;
use std::sync::Arc;

/// The output of synthesis.
#[derive(Debug, Default)]
pub(crate) struct Synthesis {
    pub type_def_lines: TypeDefLines,
    /// The printed type definitions, directive definitions first.
    pub type_defs: String,
    pub fields: FieldWirings,
    pub models: IndexMap<String, ModelBinding>,
}

/// A filter input to generate once every type is known.
struct DeferredFilter {
    graphql_type: String,
    field: String,
    field_type: String,
    is_list: bool,
}

pub(crate) struct Synthesizer<'a> {
    plugins: &'a [Arc<dyn Plugin>],
    schema: &'a SchemaInfo,
    extensions: &'a mut TypeExtensions,
    type_defs: TypeDefLines,
    directive_defs: DirectiveDefs,
    fields: FieldWirings,
    models: IndexMap<String, ModelBinding>,
    hooks: Vec<AfterTypeDefHook>,
    filters: Vec<DeferredFilter>,
}

impl<'a> Synthesizer<'a> {
    pub fn new(
        plugins: &'a [Arc<dyn Plugin>],
        schema: &'a SchemaInfo,
        extensions: &'a mut TypeExtensions,
    ) -> Self {
        Self {
            plugins,
            schema,
            extensions,
            type_defs: Default::default(),
            directive_defs: Default::default(),
            fields: Default::default(),
            models: Default::default(),
            hooks: vec![],
            filters: vec![],
        }
    }

    pub fn run(mut self, types: &IndexMap<String, TypeSource>) -> Result<Synthesis> {
        for (name, source) in types {
            match source {
                TypeSource::Model(model) => {
                    let plugin = self
                        .plugins
                        .iter()
                        .find(|plugin| plugin.is_matching(model.as_ref()));
                    match plugin {
                        Some(plugin) => self.model(name, model, plugin.clone())?,
                        None => tracing::warn!("no plugin matches the model for {name}, skipping"),
                    }
                }
                TypeSource::Enum(values) => self.enumeration(name, values),
                TypeSource::Inline(config) => self.inline(name, config)?,
            }
        }

        let extended = self.extensions.get_all().clone();
        for (graphql_type, fields) in &extended {
            self.field_lines(graphql_type, None, fields)?;
        }

        for filter in std::mem::take(&mut self.filters) {
            generate_filter_type_defs(
                &mut self.type_defs,
                &filter.graphql_type,
                &filter.field,
                &filter.field_type,
                filter.is_list,
            )?;
        }
        for hook in std::mem::take(&mut self.hooks) {
            hook(&mut self.type_defs)?;
        }

        let mut type_defs = self.type_defs.print();
        if !self.directive_defs.is_empty() {
            type_defs = format!("{}\n\n{type_defs}", self.directive_defs.print());
        }
        tracing::info!(
            "generated {} type definitions for {} models",
            self.type_defs.iter().count(),
            self.models.len()
        );
        Ok(Synthesis {
            type_def_lines: self.type_defs,
            type_defs,
            fields: self.fields,
            models: self.models,
        })
    }

    /// Populate the type of a model under its primary name and each of its aliases.
    fn model(&mut self, name: &str, model: &Arc<dyn Model>, plugin: Arc<dyn Plugin>) -> Result<()> {
        tracing::debug!("populating {name} with plugin {}", plugin.name());
        let config = model.gene_config().cloned().unwrap_or_default();
        self.populate(name, name, model, &plugin, &config)?;
        for (alias, alias_config) in &config.aliases {
            self.extensions.set_alias(alias.clone(), name);
            self.populate(alias, name, model, &plugin, alias_config)?;
        }
        Ok(())
    }

    fn populate(
        &mut self,
        type_name: &str,
        model_key: &str,
        model: &Arc<dyn Model>,
        plugin: &Arc<dyn Plugin>,
        config: &GeneConfig,
    ) -> Result<()> {
        self.extensions.set_gene_config(type_name, config.clone());
        let hooks = plugin.populate_type_defs(PopulateParams {
            type_defs: &mut self.type_defs,
            model: model.as_ref(),
            type_name,
            config,
            schema: self.schema,
        })?;
        self.hooks.extend(hooks);

        self.type_config(type_name, config);
        self.models.insert(
            type_name.to_string(),
            ModelBinding {
                model: model.clone(),
                plugin: plugin.clone(),
                model_key: model_key.to_string(),
            },
        );
        for (graphql_type, fields) in &config.types {
            self.field_lines(graphql_type, None, fields)?;
        }
        Ok(())
    }

    fn enumeration(&mut self, name: &str, values: &[String]) {
        let def = self.type_defs.ensure_type_of(name, VarType::Enum);
        for value in values {
            def.ensure_field(value);
        }
    }

    fn inline(&mut self, name: &str, config: &TypeConfig) -> Result<()> {
        self.extensions.set_gene_config(name, config.config.clone());
        self.field_lines(name, config.config.var_type, &config.fields)?;
        self.type_config(name, &config.config);
        for (graphql_type, fields) in &config.config.types {
            self.field_lines(graphql_type, None, fields)?;
        }
        Ok(())
    }

    /// Apply the type-level parts of a policy: kind, interfaces and directives.
    fn type_config(&mut self, type_name: &str, config: &GeneConfig) {
        let def = self.type_defs.ensure_type(type_name);
        if let Some(var_type) = config.var_type {
            def.var_type = var_type;
        }
        def.implements.extend(config.implements.iter().cloned());
        for directive in &config.directives {
            let invocation = self.directive_defs.register(directive.get());
            self.type_defs.set_directive_on_type(type_name, invocation);
        }
    }

    /// Add field lines for explicitly configured fields.
    fn field_lines(
        &mut self,
        graphql_type: &str,
        var_type: Option<VarType>,
        fields: &IndexMap<String, FieldConfig>,
    ) -> Result<()> {
        let def = self.type_defs.ensure_type(graphql_type);
        if let Some(var_type) = var_type {
            def.var_type = var_type;
        }

        for (name, field) in fields {
            let line = self.type_defs.ensure_field(graphql_type, name);
            if let Some(return_type) = &field.return_type {
                line.type_def = return_type.clone();
            }

            if field.uses_default_resolver() {
                let is_list = TypeSignature::parse(&line.type_def)?.is_list();
                populate_args_def(line, graphql_type, name, is_list);
                self.filters.push(DeferredFilter {
                    graphql_type: graphql_type.to_string(),
                    field: name.clone(),
                    field_type: return_type_name(&line.type_def).to_string(),
                    is_list,
                });
            } else {
                for (arg, signature) in &field.args {
                    line.args_def
                        .entry(arg.clone())
                        .or_default()
                        .insert(signature.clone());
                }
            }

            for directive in &field.directives {
                line.directives
                    .insert(self.directive_defs.register(directive.get()));
            }

            if field.resolver.is_some() || !field.directives.is_empty() {
                self.wire(graphql_type, name, field);
            }
        }
        Ok(())
    }

    fn wire(&mut self, graphql_type: &str, name: &str, field: &FieldConfig) {
        self.fields
            .entry(graphql_type.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default()
            .merge(field.resolver.clone(), &field.directives);
    }
}
