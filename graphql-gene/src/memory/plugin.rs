//! The plugin serving [`TableModel`]s.

use super::{Attribute, ColumnType, Query, TableModel, MEMORY_FACET};
use crate::{
    default_resolver::{generate_filter_type_defs, populate_args_def},
    plugin::{AfterTypeDefHook, DefaultResolverParams, Model, Plugin, PopulateParams, SchemaInfo},
    registry::{TypeDefLines, TypeDefinition},
    Error, Result,
};
use async_graphql::Value;
use async_trait::async_trait;

/// Scalars which are only used when the schema defines them, and are exposed as `String` otherwise.
const OPTIONAL_SCALARS: [&str; 3] = ["Date", "DateTime", "JSON"];

/// The plugin for tables of a [`MemoryStore`](super::MemoryStore).
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryPlugin;

impl MemoryPlugin {
    fn table(model: &dyn Model) -> Option<&TableModel> {
        model.facet(MEMORY_FACET)?.downcast_ref()
    }

    fn table_of<'a>(&self, params: &PopulateParams<'a>) -> Result<&'a TableModel> {
        Self::table(params.model).ok_or_else(|| {
            Error::plugin(
                self.name(),
                format!("{} is not a memory table", params.type_name),
            )
        })
    }
}

/// The GraphQL type of a column, or [`None`] if the column is not exposed.
fn attribute_type(attr: &Attribute, type_name: &str, schema: &SchemaInfo) -> Result<Option<String>> {
    // Foreign keys are exposed through their association instead.
    if attr.ty.is_integer() && attr.references.is_some() {
        return Ok(None);
    }

    let ty = match &attr.ty {
        ColumnType::Virtual(Some(ty)) => ty.as_ref(),
        ColumnType::Virtual(None) => {
            return Err(Error::VirtualWithoutReturnType {
                type_name: type_name.to_string(),
                field: attr.name.clone(),
            })
        }
        ty => ty,
    };

    let mut graphql_type = match schema.data_type(&ty.to_string()) {
        Some(overridden) => overridden.to_string(),
        None => match ty.graphql_type() {
            Some(name) if OPTIONAL_SCALARS.contains(&name) && !schema.has_scalar(name) => {
                "String".to_string()
            }
            Some(name) => name.to_string(),
            None => return Ok(None),
        },
    };
    if graphql_type.is_empty() {
        return Ok(None);
    }

    if graphql_type == "String" && attr.primary_key {
        graphql_type = "ID".into();
    }
    if !attr.allow_null {
        graphql_type.push('!');
    }
    Ok(Some(graphql_type))
}

#[async_trait]
impl Plugin for MemoryPlugin {
    fn name(&self) -> &str {
        "memory"
    }

    fn is_matching(&self, model: &dyn Model) -> bool {
        Self::table(model).is_some()
    }

    fn get_type_def(&self, params: &PopulateParams<'_>) -> Result<TypeDefinition> {
        let table = self.table_of(params)?.schema();

        let mut def = TypeDefinition::default();
        for attr in &table.attributes {
            if !params.is_field_included(&attr.name) {
                continue;
            }
            if let Some(ty) = attribute_type(attr, params.type_name, params.schema)? {
                def.ensure_field(&attr.name).type_def = ty;
            }
        }
        for assoc in &table.associations {
            if !params.is_field_included(&assoc.name) {
                continue;
            }
            def.ensure_field(&assoc.name).type_def = if assoc.is_multi() {
                format!("[{}!]", assoc.target)
            } else {
                assoc.target.clone()
            };
        }
        Ok(def)
    }

    /// Define the type of a table.
    ///
    /// Besides the fields given by [`get_type_def`](Self::get_type_def), to-many associations get
    /// the arguments of the default resolver, and their filter types are generated once every
    /// table is defined.
    fn populate_type_defs(&self, params: PopulateParams<'_>) -> Result<Vec<AfterTypeDefHook>> {
        let def = self.get_type_def(&params)?;
        params.type_defs.merge_type(params.type_name, def);

        let mut hooks: Vec<AfterTypeDefHook> = vec![];
        for assoc in &self.table_of(&params)?.schema().associations {
            if !assoc.is_multi() || !params.is_field_included(&assoc.name) {
                continue;
            }
            populate_args_def(
                params.type_defs.ensure_field(params.type_name, &assoc.name),
                params.type_name,
                &assoc.name,
                true,
            );

            let type_name = params.type_name.to_string();
            let field = assoc.name.clone();
            let target = assoc.target.clone();
            hooks.push(Box::new(move |type_defs: &mut TypeDefLines| {
                generate_filter_type_defs(type_defs, &type_name, &field, &target, true)
            }));
        }
        Ok(hooks)
    }

    async fn default_resolver(
        &self,
        params: DefaultResolverParams,
    ) -> async_graphql::Result<Value> {
        let table = Self::table(params.model.as_ref())
            .ok_or_else(|| format!("{} is not a memory table", params.model_key))?;
        let is_list = params.info.return_type.is_list();
        let query = Query::from_args(&params.args, is_list)?;
        tracing::info!(
            "{}.{}: querying {} with {:?}",
            params.info.parent_type,
            params.info.field_name,
            table.schema().name,
            query
        );

        let rows = table
            .store()
            .find(&table.schema().name, &query, &params.info.selection)
            .await?;
        Ok(if is_list {
            Value::List(rows)
        } else {
            rows.into_iter().next().unwrap_or(Value::Null)
        })
    }
}
