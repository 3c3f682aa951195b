//! Common items that you will always want in scope when generating a schema.

pub use crate::{
    async_graphql::{self, value, Value},
    config::{FieldConfig, GeneConfig, TypeConfig, TypeSource},
    context::RequestContext,
    directive::{Directive, DirectiveParams},
    extend::TypeExtensions,
    plugin::{Model, Plugin},
    registry::VarType,
    resolvers::{Resolver, ResolverParams},
    schema::{generate_schema, GeneratedSchema, ScalarDefinition, SchemaOptions},
};
