//! Schema generation.
//!
//! [`generate_schema`] is the entry point of the crate. It takes a set of [`SchemaOptions`] and
//! produces a [`GeneratedSchema`]:
//!
//! 1. every type source is turned into field lines, through the first matching [`Plugin`] for
//!    models or directly for enums and inline types
//! 2. type extensions are merged in and filter inputs are generated for default-resolved fields
//! 3. the resulting type definitions are printed, parsed and merged into the base schema
//! 4. the root types are validated and explicit resolvers are attached
//! 5. every field reachable from the roots is wired with its resolver and directives
//! 6. the document is materialized into an executable [`async_graphql::dynamic::Schema`]
//!
//! ```
//! # use graphql_gene::{prelude::*, async_graphql::value};
//! # async_std::task::block_on(async {
//! let mut extensions = TypeExtensions::new();
//! extensions.extend("Query", [(
//!     "greeting",
//!     FieldConfig::new("String!").resolver(|_| async { Ok(value!("hello")) }),
//! )]);
//! let schema = generate_schema(SchemaOptions::new().extensions(extensions)).unwrap();
//! let response = schema.execute("{ greeting }").await;
//! assert_eq!(response.data, value!({ "greeting": "hello" }));
//! # });
//! ```

pub mod document;
mod executable;
mod synthesis;

use crate::{
    config::{ResolverConfig, TypeSource},
    extend::TypeExtensions,
    plugin::{DeclaredPlugin, Model, Plugin, SchemaInfo},
    registry::TypeDefLines,
    resolvers::{wire, Resolver, ResolverMap},
    Error, Result,
};
use async_graphql::{dynamic::Schema, Request, Response, Value};
use derivative::Derivative;
use document::{SchemaDocument, TypeDef, TypeKind};
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;
use synthesis::Synthesizer;

pub type ScalarValidator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A custom scalar type.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct ScalarDefinition {
    pub name: String,
    pub description: Option<String>,
    #[derivative(Debug = "ignore")]
    pub validator: Option<ScalarValidator>,
}

impl ScalarDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            validator: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Reject input values for which `validator` returns `false`.
    pub fn validator(mut self, validator: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }
}

/// Everything needed to generate a schema.
#[derive(Debug, Default)]
pub struct SchemaOptions {
    types: IndexMap<String, TypeSource>,
    plugins: Vec<Arc<dyn Plugin>>,
    extensions: TypeExtensions,
    base_schema: Option<String>,
    scalars: IndexMap<String, ScalarDefinition>,
    resolvers: ResolverMap,
    data_type_map: IndexMap<String, String>,
}

impl SchemaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the type `name`.
    pub fn type_source(mut self, name: impl Into<String>, source: impl Into<TypeSource>) -> Self {
        self.types.insert(name.into(), source.into());
        self
    }

    /// Declare the type `name`, backed by a model.
    pub fn model(self, name: impl Into<String>, model: impl Model + 'static) -> Self {
        self.type_source(name, TypeSource::model(model))
    }

    /// Add a data plugin.
    ///
    /// Plugins are tried in the order they are added, followed by the built-in
    /// [`DeclaredPlugin`].
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn extensions(mut self, extensions: TypeExtensions) -> Self {
        self.extensions = extensions;
        self
    }

    /// SDL to extend rather than building the schema from scratch.
    pub fn base_schema(mut self, sdl: impl Into<String>) -> Self {
        self.base_schema = Some(sdl.into());
        self
    }

    pub fn scalar(mut self, scalar: ScalarDefinition) -> Self {
        self.scalars.insert(scalar.name.clone(), scalar);
        self
    }

    /// Resolve `type_name.field` with `resolver`, overriding any configured resolver.
    pub fn resolver(
        mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        resolver: Resolver,
    ) -> Self {
        self.resolvers
            .entry(type_name.into())
            .or_default()
            .insert(field.into(), resolver);
        self
    }

    /// Map the native data type `native` to the GraphQL type `graphql_type` in data plugins.
    pub fn data_type(mut self, native: impl Into<String>, graphql_type: impl Into<String>) -> Self {
        self.data_type_map.insert(native.into(), graphql_type.into());
        self
    }
}

/// A generated schema and the artifacts it was generated from.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct GeneratedSchema {
    #[derivative(Debug = "ignore")]
    schema: Schema,
    document: Arc<SchemaDocument>,
    type_defs: Arc<String>,
    type_def_lines: Arc<TypeDefLines>,
    resolvers: Arc<ResolverMap>,
    extensions: Arc<TypeExtensions>,
}

impl GeneratedSchema {
    /// The executable schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Execute a request.
    ///
    /// Attach a [`RequestContext`](crate::context::RequestContext) to the request to make headers
    /// and application data available to resolvers and directives.
    pub async fn execute(&self, request: impl Into<Request>) -> Response {
        self.schema.execute(request).await
    }

    /// The full schema as SDL, including directive definitions and usages.
    pub fn schema_string(&self) -> String {
        self.document.print()
    }

    /// The parsed schema document.
    pub fn document(&self) -> &SchemaDocument {
        &self.document
    }

    /// The generated type definitions, before merging with the base schema.
    pub fn type_defs(&self) -> &str {
        &self.type_defs
    }

    pub fn type_def_lines(&self) -> &TypeDefLines {
        &self.type_def_lines
    }

    /// Every wired resolver by type and field name.
    pub fn resolvers(&self) -> &ResolverMap {
        &self.resolvers
    }

    pub fn extensions(&self) -> &TypeExtensions {
        &self.extensions
    }
}

/// Generate an executable schema.
///
/// # Errors
///
/// Fails on any configuration error: missing or invalid root types, invalid type signatures,
/// filters on undefined types, explicit resolvers for undefined fields, default resolvers on types
/// no plugin owns, plugin errors, and SDL the host engine rejects.
pub fn generate_schema(options: SchemaOptions) -> Result<GeneratedSchema> {
    let SchemaOptions {
        types,
        mut plugins,
        mut extensions,
        base_schema,
        scalars,
        resolvers: explicit_resolvers,
        data_type_map,
    } = options;

    let mut document = match &base_schema {
        Some(sdl) => SchemaDocument::parse(sdl)?,
        None => SchemaDocument::default(),
    };
    let mut registered_scalars = document
        .types
        .values()
        .filter(|def| def.kind == TypeKind::Scalar)
        .map(|def| def.name.clone())
        .collect::<IndexSet<_>>();
    registered_scalars.extend(scalars.keys().cloned());
    let schema_info = SchemaInfo {
        scalars: registered_scalars,
        data_type_map,
    };

    plugins.push(Arc::new(DeclaredPlugin));
    let synthesis = Synthesizer::new(&plugins, &schema_info, &mut extensions).run(&types)?;

    document.merge(SchemaDocument::parse(&synthesis.type_defs)?)?;
    for scalar in scalars.values() {
        if document.get(&scalar.name).is_none() {
            document.merge_type(TypeDef {
                name: scalar.name.clone(),
                description: scalar.description.clone(),
                directives: vec![],
                kind: TypeKind::Scalar,
            })?;
        }
    }
    document.validate_roots()?;

    let mut fields = synthesis.fields;
    for (type_name, type_resolvers) in explicit_resolvers {
        for (field, resolver) in type_resolvers {
            if document.field(&type_name, &field).is_none() {
                return Err(Error::UnknownField { type_name, field });
            }
            fields
                .entry(type_name.clone())
                .or_default()
                .entry(field)
                .or_default()
                .merge(Some(ResolverConfig::Custom(resolver)), &[]);
        }
    }

    let extensions = Arc::new(extensions);
    let resolvers = wire(&document, &fields, &extensions, &synthesis.models)?;
    let schema = executable::build(&document, &resolvers, &scalars)?;
    tracing::info!(
        "generated schema with {} types and {} wired fields",
        document.types.len(),
        resolvers.values().map(IndexMap::len).sum::<usize>()
    );

    Ok(GeneratedSchema {
        schema,
        document: Arc::new(document),
        type_defs: Arc::new(synthesis.type_defs),
        type_def_lines: Arc::new(synthesis.type_def_lines),
        resolvers: Arc::new(resolvers),
        extensions,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::{FieldConfig, GeneConfig, TypeConfig},
        directive::Directive,
        init_logging,
        plugin::DeclaredModel,
        resolvers::ResolverParams,
        context::RequestContext,
    };
    use async_graphql::value;
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn order_model() -> DeclaredModel {
        DeclaredModel::new()
            .field("id", "Int!")
            .field("status", "String!")
            .field("total", "Float")
    }

    #[test]
    fn test_default_resolver_arguments() {
        init_logging();

        let mut extensions = TypeExtensions::new();
        extensions.extend(
            "Query",
            [
                ("order", FieldConfig::default_resolver("Order")),
                ("orders", FieldConfig::default_resolver("[Order!]!")),
            ],
        );
        let schema = generate_schema(
            SchemaOptions::new()
                .model("Order", order_model())
                .extensions(extensions),
        )
        .unwrap();

        let order = schema.document().field("Query", "order").unwrap();
        assert_eq!(
            order.args.keys().collect::<Vec<_>>(),
            ["id", "locale", "where"]
        );
        let orders = schema.document().field("Query", "orders").unwrap();
        assert_eq!(
            orders.args.keys().collect::<Vec<_>>(),
            ["page", "perPage", "locale", "where", "order"]
        );
        assert_eq!(orders.args["perPage"].default_value, Some(value!(10)));

        let sdl = schema.schema_string();
        assert!(sdl.starts_with("type Query {\n  order(id: String, locale: String, where: QueryWhereOptionsOrder): Order\n"));
        assert!(sdl.contains(
            "input GeneOperatorStringInput {\n  eq: String\n  ne: String\n  in: [String]\n  \
             notIn: [String]\n  null: Boolean\n  like: String\n  notLike: String\n}"
        ));
        assert!(sdl.contains("enum QuerySelectOrderOrders {\n  id_ASC\n  id_DESC\n"));
        assert!(schema.resolvers().contains_key("Query"));
        assert!(schema.type_defs().starts_with("type Query {"));
    }

    #[test]
    fn test_root_errors() {
        init_logging();

        let err = generate_schema(SchemaOptions::new().model("Order", order_model())).unwrap_err();
        assert_eq!(err, Error::MissingQuery);

        let err = generate_schema(
            SchemaOptions::new()
                .base_schema("type Query { version: String }")
                .resolver("Query", "missing", Resolver::field_accessor()),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "No field definition found for \"missing\" of type \"Query\"."
        );

        let mut extensions = TypeExtensions::new();
        extensions.extend("Query", [("colors", FieldConfig::default_resolver("[Color!]"))]);
        let err = generate_schema(
            SchemaOptions::new()
                .type_source(
                    "Color",
                    TypeSource::object([("name", "String"), ("hex", "String")]),
                )
                .extensions(extensions),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingModel { .. }), "{err}");
    }

    #[async_std::test]
    async fn test_base_schema_and_explicit_resolvers() {
        init_logging();

        let schema = generate_schema(
            SchemaOptions::new()
                .base_schema(
                    "scalar DateTime
                     type Query { version: String! }",
                )
                .scalar(ScalarDefinition::new("JSON").description("Arbitrary data."))
                .model(
                    "Order",
                    order_model().with_config(
                        GeneConfig::new()
                            .extend("Query", [("latest", "Order")])
                            .extend("Mutation", [("ping", "Boolean")]),
                    ),
                )
                .resolver(
                    "Query",
                    "version",
                    Resolver::new(|_| async { Ok(value!("1.0")) }),
                )
                .resolver(
                    "Query",
                    "latest",
                    Resolver::new(|_| async { Ok(value!({ "id": 7, "status": "PAID" })) }),
                )
                .resolver(
                    "Mutation",
                    "ping",
                    Resolver::new(|_| async { Ok(value!(true)) }),
                ),
        )
        .unwrap();

        let sdl = schema.schema_string();
        assert!(sdl.starts_with(
            "type Query {\n  version: String!\n  latest: Order\n}\n\n\
             type Mutation {\n  ping: Boolean\n}\n\n"
        ));
        assert!(sdl.contains("scalar DateTime"));
        assert!(sdl.contains("\"Arbitrary data.\"\nscalar JSON"));

        let response = schema.execute("{ version latest { id status } }").await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data,
            value!({ "version": "1.0", "latest": { "id": 7, "status": "PAID" } })
        );
        let response = schema.execute("mutation { ping }").await;
        assert_eq!(response.data, value!({ "ping": true }));
    }

    fn logging_directive(log: &Log, name: &'static str) -> Directive {
        let log = log.clone();
        Directive::new(name, move |params| {
            let log = log.clone();
            async move {
                log.lock().push(format!("{name}:{}", params.field));
                Ok(())
            }
        })
    }

    fn color_schema(log: &Log) -> GeneratedSchema {
        let auth = {
            let log = log.clone();
            Directive::new("auth", move |params| {
                let log = log.clone();
                async move {
                    log.lock().push(format!("auth:{}", params.field));
                    match params.context.get_header("authorization") {
                        Some("secret") => Ok(()),
                        _ => Err("Unauthorized".into()),
                    }
                }
            })
            .arg("role", "admin")
        };
        let sanitize = logging_directive(log, "sanitize");

        let mut extensions = TypeExtensions::new();
        extensions.extend(
            "Query",
            [(
                "product",
                FieldConfig::new("Product").resolver(|_: ResolverParams| async {
                    Ok(value!({ "name": "Shirt", "color": { "name": "Red", "hex": "#f00" } }))
                }),
            )],
        );
        generate_schema(
            SchemaOptions::new()
                .type_source(
                    "Product",
                    TypeConfig::object()
                        .field("name", "String!")
                        .field("color", FieldConfig::new("ProductColor").directive(sanitize)),
                )
                .type_source(
                    "ProductColor",
                    TypeConfig::object()
                        .field("name", "String")
                        .field("hex", "String")
                        .directive(auth),
                )
                .extensions(extensions),
        )
        .unwrap()
    }

    #[async_std::test]
    async fn test_type_directives_run_before_field_directives() {
        init_logging();

        let log = Log::default();
        let schema = color_schema(&log);
        assert!(schema.schema_string().contains("color: ProductColor @sanitize"));
        assert!(schema
            .schema_string()
            .contains("type ProductColor @auth(role: \"admin\") {"));

        let response = schema
            .execute(
                Request::new("{ product { name color { name } } }")
                    .data(RequestContext::new().header("Authorization", "secret")),
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data,
            value!({ "product": { "name": "Shirt", "color": { "name": "Red" } } })
        );
        assert_eq!(*log.lock(), ["auth:color", "sanitize:color"]);
    }

    #[async_std::test]
    async fn test_directive_errors_are_field_errors() {
        init_logging();

        let log = Log::default();
        let schema = color_schema(&log);
        let response = schema.execute("{ product { name color { name } } }").await;
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "Unauthorized");
        assert_eq!(
            response.data,
            value!({ "product": { "name": "Shirt", "color": null } })
        );
        // Sanitize never ran because auth rejected the field.
        assert_eq!(*log.lock(), ["auth:color"]);
    }
}
