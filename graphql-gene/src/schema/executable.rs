//! Materialization of a schema document into an executable dynamic schema.

use super::{
    document::{FieldDef, InputValueDef, ObjectDef, SchemaDocument, TypeKind},
    ScalarDefinition,
};
use crate::{
    context::{RequestContext, ResolveInfo, Selection},
    resolvers::{Resolver, ResolverMap, ResolverParams},
    signature::TypeSignature,
    Error, Result,
};
use async_graphql::{
    dynamic::{
        Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Interface,
        InterfaceField, Object, ResolverContext, Scalar, Schema, SchemaBuilder, TypeRef, Union,
    },
    parser::types::{BaseType, Type},
    Name, Value,
};
use indexmap::IndexMap;

/// How a resolved [`Value`] is handed back to the engine.
#[derive(Clone, Debug)]
enum Shape {
    Leaf,
    Enum,
    /// A union or interface: the concrete type is read from `__typename`.
    Abstract,
    List(Box<Shape>),
}

impl Shape {
    fn of(document: &SchemaDocument, ty: &Type) -> Self {
        match &ty.base {
            BaseType::List(inner) => Self::List(Box::new(Self::of(document, inner))),
            BaseType::Named(name) => match document.get(name).map(|def| &def.kind) {
                Some(TypeKind::Enum(_)) => Self::Enum,
                Some(TypeKind::Union(_) | TypeKind::Interface(_)) => Self::Abstract,
                _ => Self::Leaf,
            },
        }
    }

    fn field_value<'a>(&self, value: Value) -> Option<FieldValue<'a>> {
        match (self, value) {
            (_, Value::Null) => None,
            (Self::List(inner), Value::List(items)) => Some(FieldValue::list(
                items
                    .into_iter()
                    .map(|item| inner.field_value(item).unwrap_or(FieldValue::NULL)),
            )),
            (Self::List(inner), single) => Some(FieldValue::list(
                inner.field_value(single).into_iter(),
            )),
            (Self::Enum, Value::String(name)) => Some(FieldValue::value(Value::Enum(Name::new(name)))),
            (Self::Abstract, Value::Object(fields)) => {
                let type_name = match fields.get("__typename") {
                    Some(Value::String(name)) => Some(name.clone()),
                    Some(Value::Enum(name)) => Some(name.to_string()),
                    _ => None,
                };
                let value = FieldValue::value(Value::Object(fields));
                Some(match type_name {
                    Some(type_name) => value.with_type(type_name),
                    None => value,
                })
            }
            (_, value) => Some(FieldValue::value(value)),
        }
    }
}

fn type_ref(ty: &Type) -> TypeRef {
    let base = match &ty.base {
        BaseType::Named(name) => TypeRef::Named(name.to_string().into()),
        BaseType::List(inner) => TypeRef::List(Box::new(type_ref(inner))),
    };
    if ty.nullable {
        base
    } else {
        TypeRef::NonNull(Box::new(base))
    }
}

fn input_value(def: &InputValueDef) -> InputValue {
    let input = InputValue::new(def.name.clone(), type_ref(def.ty.as_type()));
    match &def.default_value {
        Some(default) => input.default_value(default.clone()),
        None => input,
    }
}

/// A host field whose resolution goes through `resolver`.
fn field(
    document: &SchemaDocument,
    parent_type: &str,
    def: &FieldDef,
    resolver: Resolver,
) -> Field {
    let parent_type = parent_type.to_string();
    let field_name = def.name.clone();
    let return_type: TypeSignature = def.ty.clone();
    let shape = Shape::of(document, def.ty.as_type());
    let defaults = def
        .args
        .values()
        .filter_map(|arg| Some((Name::new(&arg.name), arg.default_value.clone()?)))
        .collect::<IndexMap<_, _>>();

    let mut field = Field::new(
        def.name.clone(),
        type_ref(def.ty.as_type()),
        move |ctx: ResolverContext<'_>| {
            let mut args = ctx
                .args
                .iter()
                .map(|(name, value)| (name.clone(), value.as_value().clone()))
                .collect::<IndexMap<_, _>>();
            for (name, default) in &defaults {
                args.entry(name.clone()).or_insert_with(|| default.clone());
            }
            let params = ResolverParams {
                source: ctx.parent_value.as_value().cloned().unwrap_or(Value::Null),
                args,
                context: ctx
                    .ctx
                    .data_opt::<RequestContext>()
                    .cloned()
                    .unwrap_or_default(),
                info: ResolveInfo {
                    parent_type: parent_type.clone(),
                    field_name: field_name.clone(),
                    return_type: return_type.clone(),
                    selection: Selection::from_field(ctx.ctx.field()),
                },
            };
            let resolver = resolver.clone();
            let shape = shape.clone();
            FieldFuture::new(async move {
                let value = resolver.call(params).await?;
                Ok(shape.field_value(value))
            })
        },
    );
    for arg in def.args.values() {
        field = field.argument(input_value(arg));
    }
    field
}

fn object(
    document: &SchemaDocument,
    name: &str,
    def: &ObjectDef,
    resolvers: &ResolverMap,
) -> Object {
    let mut object = Object::new(name);
    for interface in &def.implements {
        object = object.implement(interface);
    }
    for field_def in def.fields.values() {
        let resolver = resolvers
            .get(name)
            .and_then(|fields| fields.get(&field_def.name))
            .cloned()
            .unwrap_or_else(Resolver::field_accessor);
        object = object.field(field(document, name, field_def, resolver));
    }
    object
}

fn interface(name: &str, def: &ObjectDef) -> Interface {
    let mut interface = Interface::new(name);
    for field_def in def.fields.values() {
        let mut field = InterfaceField::new(field_def.name.clone(), type_ref(field_def.ty.as_type()));
        for arg in field_def.args.values() {
            field = field.argument(input_value(arg));
        }
        interface = interface.field(field);
    }
    interface
}

/// Register every type of `document` on `builder`.
fn register(
    mut builder: SchemaBuilder,
    document: &SchemaDocument,
    resolvers: &ResolverMap,
    scalars: &IndexMap<String, ScalarDefinition>,
) -> SchemaBuilder {
    for (name, def) in &document.types {
        builder = match &def.kind {
            TypeKind::Scalar => {
                if ["String", "Int", "Float", "Boolean", "ID"].contains(&name.as_str()) {
                    continue;
                }
                let mut scalar = Scalar::new(name);
                if let Some(description) = &def.description {
                    scalar = scalar.description(description);
                }
                if let Some(validator) = scalars.get(name).and_then(|s| s.validator.clone()) {
                    scalar = scalar.validator(move |value| validator(value));
                }
                builder.register(scalar)
            }
            TypeKind::Object(object_def) => {
                let mut object = object(document, name, object_def, resolvers);
                if let Some(description) = &def.description {
                    object = object.description(description);
                }
                builder.register(object)
            }
            TypeKind::Interface(object_def) => builder.register(interface(name, object_def)),
            TypeKind::Union(members) => builder.register(
                members
                    .iter()
                    .fold(Union::new(name), |union, member| union.possible_type(member)),
            ),
            TypeKind::Enum(values) => builder.register(
                values
                    .iter()
                    .fold(Enum::new(name), |e, value| e.item(EnumItem::new(value))),
            ),
            TypeKind::InputObject(fields) => builder.register(
                fields
                    .values()
                    .fold(InputObject::new(name), |input, field| {
                        input.field(input_value(field))
                    }),
            ),
        };
    }
    builder
}

/// Build the executable schema.
pub(crate) fn build(
    document: &SchemaDocument,
    resolvers: &ResolverMap,
    scalars: &IndexMap<String, ScalarDefinition>,
) -> Result<Schema> {
    let mutation = document.has_mutation().then_some("Mutation");
    let builder = Schema::build("Query", mutation, None);
    register(builder, document, resolvers, scalars)
        .finish()
        .map_err(Error::build)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::init_logging;
    use async_graphql::{value, Request};

    fn shop() -> SchemaDocument {
        SchemaDocument::parse(
            r#"
            type Query {
                product(size: Int = 3): Product
                status: Status
                search: [SearchResult!]!
            }
            type Product { name: String, size: Int }
            type Order { id: Int! }
            enum Status { PAID PENDING }
            union SearchResult = Product | Order
            "#,
        )
        .unwrap()
    }

    #[async_std::test]
    async fn test_field_accessors_and_defaults() {
        init_logging();

        let mut resolvers = ResolverMap::new();
        resolvers.entry("Query".into()).or_default().insert(
            "product".into(),
            Resolver::new(|params: ResolverParams| async move {
                let size = params.args["size"].clone();
                Ok(value!({ "name": "Shirt", "size": size }))
            }),
        );
        resolvers.entry("Query".into()).or_default().insert(
            "status".into(),
            Resolver::new(|_| async { Ok(value!("PAID")) }),
        );
        let schema = build(&shop(), &resolvers, &Default::default()).unwrap();

        let response = schema
            .execute("{ product { name size } status big: product(size: 5) { size } }")
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            value!({
                "product": { "name": "Shirt", "size": 3 },
                "status": "PAID",
                "big": { "size": 5 },
            })
            .into_json()
            .unwrap()
        );
    }

    #[async_std::test]
    async fn test_abstract_types() {
        init_logging();

        let mut resolvers = ResolverMap::new();
        resolvers.entry("Query".into()).or_default().insert(
            "search".into(),
            Resolver::new(|_| async {
                Ok(value!([
                    { "__typename": "Product", "name": "Shirt" },
                    { "__typename": "Order", "id": 1 },
                ]))
            }),
        );
        let schema = build(&shop(), &resolvers, &Default::default()).unwrap();

        let response = schema
            .execute(
                "{ search { __typename ... on Product { name } ... on Order { id } } }",
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data,
            value!({
                "search": [
                    { "__typename": "Product", "name": "Shirt" },
                    { "__typename": "Order", "id": 1 },
                ]
            })
        );
    }

    #[async_std::test]
    async fn test_request_context() {
        init_logging();

        let mut resolvers = ResolverMap::new();
        resolvers.entry("Query".into()).or_default().insert(
            "product".into(),
            Resolver::new(|params: ResolverParams| async move {
                Ok(value!({
                    "name": params.context.get_header("x-name").unwrap_or("none"),
                }))
            }),
        );
        let schema = build(&shop(), &resolvers, &Default::default()).unwrap();

        let response = schema
            .execute(
                Request::new("{ product { name } }")
                    .data(RequestContext::new().header("X-Name", "Hat")),
            )
            .await;
        assert_eq!(response.data, value!({ "product": { "name": "Hat" } }));

        let response = schema.execute("{ product { name } }").await;
        assert_eq!(response.data, value!({ "product": { "name": "none" } }));
    }
}
