//! Resolver wiring.
//!
//! After the schema document is built, every field reachable from `Query` or `Mutation` is
//! visited once. A field gets a resolver if it is configured with an explicit resolver, with the
//! default resolver, or if any directive applies to it. Directives apply to a field when they are
//! declared on the field itself or at the type level of the field's return type (including the
//! owning model's directives when the return type is an alias). They are collected in the order
//!
//! 1. type-level directives of the return type's owning model
//! 2. type-level directives of the return type itself (the alias, if it is one)
//! 3. field-level directives
//!
//! and composed so that the first one runs first, wrapping everything after it.

use crate::{
    config::ResolverConfig,
    context::{RequestContext, ResolveInfo},
    directive::{Chain, Directive, DirectiveParams, LazyDirective},
    extend::TypeExtensions,
    plugin::{DefaultResolverParams, ModelBinding},
    schema::document::{FieldDef, SchemaDocument, TypeKind},
    Error, Result,
};
use async_graphql::{Name, Value};
use futures::future::{BoxFuture, FutureExt};
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;
use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::sync::Arc;

/// The arguments passed to a resolver.
#[derive(Clone, Debug)]
pub struct ResolverParams {
    /// The parent value of the field.
    pub source: Value,
    /// The field arguments, with defaults filled in.
    pub args: IndexMap<Name, Value>,
    pub context: RequestContext,
    pub info: ResolveInfo,
}

type ResolverFn =
    dyn Fn(ResolverParams) -> BoxFuture<'static, async_graphql::Result<Value>> + Send + Sync;

/// An async function resolving the value of a field.
#[derive(Clone)]
pub struct Resolver(Arc<ResolverFn>);

impl Resolver {
    pub fn new<F, Fut>(resolver: F) -> Self
    where
        F: Fn(ResolverParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = async_graphql::Result<Value>> + Send + 'static,
    {
        Self(Arc::new(move |params| resolver(params).boxed()))
    }

    /// The resolver used for fields with nothing else to run: read the same-named entry of the
    /// parent object.
    pub fn field_accessor() -> Self {
        Self::new(|params: ResolverParams| async move {
            Ok(match &params.source {
                Value::Object(fields) => fields
                    .get(params.info.field_name.as_str())
                    .cloned()
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            })
        })
    }

    pub async fn call(&self, params: ResolverParams) -> async_graphql::Result<Value> {
        (self.0)(params).await
    }
}

impl Debug for Resolver {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Resolver")
    }
}

/// Compose `directives` around `base`, so that the first directive runs first.
pub fn compose(base: Resolver, directives: &[Directive]) -> Resolver {
    directives
        .iter()
        .rev()
        .fold(base, |next, directive| wrap(next, Arc::new(directive.clone())))
}

fn wrap(next: Resolver, directive: Arc<Directive>) -> Resolver {
    Resolver::new(move |params: ResolverParams| {
        let chain = Arc::new(Chain::new(next.clone(), params.clone()));
        let directive = directive.clone();
        async move {
            directive
                .handle(DirectiveParams::new(params, chain.clone()))
                .await?;
            if !chain.has_resolved() {
                chain.resolve().await?;
            }
            Ok(chain.result())
        }
    })
}

/// Resolvers by type name and field name.
pub type ResolverMap = IndexMap<String, IndexMap<String, Resolver>>;

/// Resolver configuration collected for a single field during synthesis.
#[derive(Clone, Debug, Default)]
pub(crate) struct FieldWiring {
    pub resolver: Option<ResolverConfig>,
    pub directives: Vec<LazyDirective>,
}

impl FieldWiring {
    pub fn merge(&mut self, resolver: Option<ResolverConfig>, directives: &[LazyDirective]) {
        if resolver.is_some() {
            self.resolver = resolver;
        }
        self.directives.extend(directives.iter().cloned());
    }
}

pub(crate) type FieldWirings = IndexMap<String, IndexMap<String, FieldWiring>>;

/// A field visited by [`look_deep_in_schema`].
#[derive(Clone, Copy, Debug)]
pub struct FieldVisit<'a> {
    pub parent_type: &'a str,
    pub field: &'a FieldDef,
    /// The named type at the bottom of the field's return type.
    pub type_name: &'a str,
}

/// Visit every field reachable from the root operation types, breadth-first.
///
/// Each type is visited at most once, so cyclic schemas terminate. Union members are visited
/// through the union.
pub fn look_deep_in_schema(
    document: &SchemaDocument,
    mut each: impl FnMut(FieldVisit<'_>) -> Result<()>,
) -> Result<()> {
    let mut queue = VecDeque::from(["Query", "Mutation"]);
    let mut visited = IndexSet::new();

    while let Some(type_name) = queue.pop_front() {
        if !visited.insert(type_name) {
            continue;
        }
        let Some(def) = document.get(type_name) else {
            continue;
        };
        match &def.kind {
            TypeKind::Object(object) | TypeKind::Interface(object) => {
                for field in object.fields.values() {
                    let field_type = field.ty.named_type();
                    each(FieldVisit {
                        parent_type: type_name,
                        field,
                        type_name: field_type,
                    })?;
                    queue.push_back(field_type);
                }
            }
            TypeKind::Union(members) => queue.extend(members.iter().map(String::as_str)),
            _ => {}
        }
    }
    Ok(())
}

/// Build the resolver of every field which needs one.
pub(crate) fn wire(
    document: &SchemaDocument,
    fields: &FieldWirings,
    extensions: &TypeExtensions,
    models: &IndexMap<String, ModelBinding>,
) -> Result<ResolverMap> {
    let mut resolvers = ResolverMap::new();

    look_deep_in_schema(document, |visit| {
        let wiring = fields
            .get(visit.parent_type)
            .and_then(|fields| fields.get(&visit.field.name));

        let mut directives = vec![];
        if let Some(owner) = extensions.alias_owner(visit.type_name) {
            if let Some(config) = extensions.gene_config_for_type(owner) {
                directives.extend(config.directives.iter().map(|d| d.get().clone()));
            }
        }
        if let Some(config) = extensions.gene_config_for_type(visit.type_name) {
            directives.extend(config.directives.iter().map(|d| d.get().clone()));
        }
        if let Some(wiring) = wiring {
            directives.extend(wiring.directives.iter().map(|d| d.get().clone()));
        }

        let base = match wiring.and_then(|wiring| wiring.resolver.as_ref()) {
            Some(ResolverConfig::Custom(resolver)) => Some(resolver.clone()),
            Some(ResolverConfig::Default) => {
                let binding =
                    models
                        .get(visit.type_name)
                        .ok_or_else(|| Error::MissingModel {
                            type_name: visit.type_name.to_string(),
                            parent: visit.parent_type.to_string(),
                            field: visit.field.name.clone(),
                        })?;
                Some(default_resolver(binding.clone()))
            }
            None => None,
        };
        if base.is_none() && directives.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            "wiring {}.{} with {} directive(s)",
            visit.parent_type,
            visit.field.name,
            directives.len()
        );
        let resolver = compose(base.unwrap_or_else(Resolver::field_accessor), &directives);
        resolvers
            .entry(visit.parent_type.to_string())
            .or_default()
            .insert(visit.field.name.clone(), resolver);
        Ok(())
    })?;

    Ok(resolvers)
}

/// A resolver delegating to the default resolver of the plugin owning a model.
fn default_resolver(binding: ModelBinding) -> Resolver {
    Resolver::new(move |params: ResolverParams| {
        let binding = binding.clone();
        async move {
            binding
                .plugin
                .default_resolver(DefaultResolverParams {
                    model: binding.model.clone(),
                    model_key: binding.model_key.clone(),
                    source: params.source,
                    args: params.args,
                    context: params.context,
                    info: params.info,
                })
                .await
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::GeneConfig, init_logging, signature::TypeSignature,
    };
    use async_graphql::value;
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn params() -> ResolverParams {
        ResolverParams {
            source: value!({ "color": "Red" }),
            args: Default::default(),
            context: Default::default(),
            info: ResolveInfo {
                parent_type: "Product".into(),
                field_name: "color".into(),
                return_type: TypeSignature::parse("String").unwrap(),
                selection: Default::default(),
            },
        }
    }

    /// A directive which logs its name and optionally resolves the rest of the chain itself.
    fn logging_directive(log: &Log, name: &'static str, resolve: bool) -> Directive {
        let log = log.clone();
        Directive::new(name, move |params| {
            let log = log.clone();
            async move {
                log.lock().push(format!("{name}:start"));
                if resolve {
                    params.resolve().await?;
                }
                log.lock().push(format!("{name}:end"));
                Ok(())
            }
        })
    }

    fn logging_resolver(log: &Log) -> Resolver {
        let log = log.clone();
        Resolver::new(move |_| {
            log.lock().push("resolver".into());
            async { Ok(value!("Red")) }
        })
    }

    #[async_std::test]
    async fn test_directive_order_with_resolve() {
        init_logging();

        let log = Log::default();
        let resolver = compose(
            logging_resolver(&log),
            &[
                logging_directive(&log, "a", true),
                logging_directive(&log, "b", true),
            ],
        );
        assert_eq!(resolver.call(params()).await.unwrap(), value!("Red"));
        assert_eq!(
            *log.lock(),
            ["a:start", "b:start", "resolver", "b:end", "a:end"]
        );
    }

    #[async_std::test]
    async fn test_directive_implicit_resolve() {
        init_logging();

        let log = Log::default();
        let resolver = compose(
            logging_resolver(&log),
            &[
                logging_directive(&log, "a", false),
                logging_directive(&log, "b", false),
            ],
        );
        assert_eq!(resolver.call(params()).await.unwrap(), value!("Red"));
        assert_eq!(
            *log.lock(),
            ["a:start", "a:end", "b:start", "b:end", "resolver"]
        );
    }

    #[async_std::test]
    async fn test_directive_error_short_circuits() {
        init_logging();

        let log = Log::default();
        let deny = Directive::new("auth", |_| async { Err("Unauthorized".into()) });
        let resolver = compose(
            logging_resolver(&log),
            &[deny, logging_directive(&log, "b", true)],
        );
        let err = resolver.call(params()).await.unwrap_err();
        assert_eq!(err.message, "Unauthorized");
        assert!(log.lock().is_empty());
    }

    #[async_std::test]
    async fn test_directive_filter_scalar() {
        init_logging();

        let hide_red = Directive::new("sanitize", |params| async move {
            params.filter(|color| color != &value!("Red"));
            Ok(())
        });
        let resolver = compose(Resolver::field_accessor(), &[hide_red]);
        assert_eq!(resolver.call(params()).await.unwrap(), Value::Null);

        let mut other = params();
        other.source = value!({ "color": "Blue" });
        assert_eq!(resolver.call(other).await.unwrap(), value!("Blue"));
    }

    #[async_std::test]
    async fn test_field_accessor() {
        init_logging();

        let mut params = params();
        assert_eq!(
            Resolver::field_accessor().call(params.clone()).await.unwrap(),
            value!("Red")
        );
        params.info.field_name = "size".into();
        assert_eq!(
            Resolver::field_accessor().call(params.clone()).await.unwrap(),
            Value::Null
        );
        params.source = Value::Null;
        assert_eq!(
            Resolver::field_accessor().call(params).await.unwrap(),
            Value::Null
        );
    }

    fn document() -> SchemaDocument {
        SchemaDocument::parse(
            "type Query { product: Product, search: [Result!]! }
             type Mutation { touch: Product }
             type Product { color: String, variants: [Variant!], featured: FeaturedProduct }
             type FeaturedProduct { color: String }
             type Variant { product: Product, size: Int }
             type Order { id: Int }
             union Result = Product | Order
             type Unreachable { name: String }",
        )
        .unwrap()
    }

    #[test]
    fn test_look_deep_in_schema() {
        let mut visits = vec![];
        look_deep_in_schema(&document(), |visit| {
            visits.push(format!("{}.{}", visit.parent_type, visit.field.name));
            Ok(())
        })
        .unwrap();
        assert_eq!(
            visits,
            [
                "Query.product",
                "Query.search",
                "Mutation.touch",
                "Product.color",
                "Product.variants",
                "Product.featured",
                "Variant.product",
                "Variant.size",
                "FeaturedProduct.color",
                "Order.id",
            ]
        );
    }

    #[async_std::test]
    async fn test_wire_directive_aggregation() {
        init_logging();

        let log = Log::default();
        let mut extensions = TypeExtensions::new();
        extensions.set_gene_config(
            "Product",
            GeneConfig::new().directive(logging_directive(&log, "product", false)),
        );
        extensions.set_gene_config(
            "FeaturedProduct",
            GeneConfig::new().directive(logging_directive(&log, "featured", false)),
        );
        extensions.set_alias("FeaturedProduct", "Product");

        let mut fields = FieldWirings::new();
        fields
            .entry("Product".into())
            .or_default()
            .entry("featured".into())
            .or_default()
            .merge(None, &[logging_directive(&log, "field", false).into()]);

        let resolvers = wire(&document(), &fields, &extensions, &Default::default()).unwrap();
        assert_eq!(
            resolvers
                .iter()
                .flat_map(|(ty, fields)| fields.keys().map(move |f| format!("{ty}.{f}")))
                .collect::<Vec<_>>(),
            ["Query.product", "Mutation.touch", "Product.featured", "Variant.product"]
        );

        let mut params = params();
        params.source = value!({ "featured": { "color": "Red" } });
        params.info.field_name = "featured".into();
        resolvers["Product"]["featured"].call(params).await.unwrap();
        assert_eq!(
            *log.lock(),
            [
                "product:start",
                "product:end",
                "featured:start",
                "featured:end",
                "field:start",
                "field:end",
            ]
        );
    }

    #[test]
    fn test_wire_default_without_model() {
        let mut fields = FieldWirings::new();
        fields
            .entry("Query".into())
            .or_default()
            .entry("product".into())
            .or_default()
            .merge(Some(ResolverConfig::Default), &[]);
        let err = wire(
            &document(),
            &fields,
            &TypeExtensions::new(),
            &Default::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingModel { .. }));
    }
}
