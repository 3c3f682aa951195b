//! An owned, mergeable model of a GraphQL type-system document.
//!
//! The generated type definitions and the application's base schema are both parsed into a
//! [`SchemaDocument`], merged, validated and then materialized into an executable schema. The
//! document is also what the wiring engine walks and what
//! [`schema_string`](super::GeneratedSchema::schema_string) prints.

use crate::{signature::TypeSignature, Error, Result};
use async_graphql::{
    parser::{
        parse_schema,
        types::{
            ConstDirective, DirectiveDefinition, DirectiveLocation, FieldDefinition,
            InputValueDefinition, TypeDefinition, TypeKind as AstTypeKind, TypeSystemDefinition,
        },
        Positioned,
    },
    Value,
};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use std::mem::discriminant;

/// Scalars and directives every GraphQL schema has without declaring them.
const BUILTIN_SCALARS: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];
const BUILTIN_DIRECTIVES: [&str; 5] = ["skip", "include", "deprecated", "specifiedBy", "oneOf"];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchemaDocument {
    pub types: IndexMap<String, TypeDef>,
    pub directives: IndexMap<String, DirectiveDef>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeDef {
    pub name: String,
    pub description: Option<String>,
    /// Printed directive invocations.
    pub directives: Vec<String>,
    pub kind: TypeKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeKind {
    Scalar,
    Object(ObjectDef),
    Interface(ObjectDef),
    Union(IndexSet<String>),
    Enum(IndexSet<String>),
    InputObject(IndexMap<String, InputValueDef>),
}

/// The body of an object or interface type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectDef {
    pub implements: IndexSet<String>,
    pub fields: IndexMap<String, FieldDef>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeSignature,
    pub args: IndexMap<String, InputValueDef>,
    pub directives: Vec<String>,
}

/// An argument or an input object field.
#[derive(Clone, Debug, PartialEq)]
pub struct InputValueDef {
    pub name: String,
    pub ty: TypeSignature,
    pub default_value: Option<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DirectiveDef {
    pub name: String,
    pub args: IndexMap<String, InputValueDef>,
    pub locations: Vec<&'static str>,
}

impl SchemaDocument {
    /// Parse SDL text. Empty text yields an empty document.
    pub fn parse(sdl: &str) -> Result<Self> {
        let mut document = Self::default();
        if sdl.trim().is_empty() {
            return Ok(document);
        }

        let ast = parse_schema(sdl).map_err(Error::parse)?;
        for definition in ast.definitions {
            match definition {
                TypeSystemDefinition::Type(def) => document.merge_type(TypeDef::from_ast(def.node))?,
                TypeSystemDefinition::Directive(def) => {
                    let def = DirectiveDef::from_ast(def.node);
                    document.directives.insert(def.name.clone(), def);
                }
                TypeSystemDefinition::Schema(_) => {
                    tracing::warn!("ignoring schema definition, root types are Query and Mutation");
                }
            }
        }
        Ok(document)
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// The definition of the field `ty.field`, if `ty` is an object or interface type.
    pub fn field(&self, ty: &str, field: &str) -> Option<&FieldDef> {
        match &self.get(ty)?.kind {
            TypeKind::Object(object) | TypeKind::Interface(object) => object.fields.get(field),
            _ => None,
        }
    }

    /// Merge another document into this one, like a sequence of `extend` definitions.
    pub fn merge(&mut self, other: SchemaDocument) -> Result<()> {
        self.directives.extend(other.directives);
        for def in other.types.into_values() {
            self.merge_type(def)?;
        }
        Ok(())
    }

    /// Add a type, or extend the existing type with the same name.
    ///
    /// # Errors
    ///
    /// Fails if a type with the same name but a different kind already exists.
    pub fn merge_type(&mut self, def: TypeDef) -> Result<()> {
        let Some(existing) = self.types.get_mut(&def.name) else {
            self.types.insert(def.name.clone(), def);
            return Ok(());
        };
        if discriminant(&existing.kind) != discriminant(&def.kind) {
            return Err(Error::KindMismatch {
                type_name: def.name,
            });
        }

        for directive in def.directives {
            if !existing.directives.contains(&directive) {
                existing.directives.push(directive);
            }
        }
        if existing.description.is_none() {
            existing.description = def.description;
        }
        match (&mut existing.kind, def.kind) {
            (TypeKind::Object(existing), TypeKind::Object(new))
            | (TypeKind::Interface(existing), TypeKind::Interface(new)) => {
                existing.implements.extend(new.implements);
                existing.fields.extend(new.fields);
            }
            (TypeKind::Union(existing), TypeKind::Union(new))
            | (TypeKind::Enum(existing), TypeKind::Enum(new)) => existing.extend(new),
            (TypeKind::InputObject(existing), TypeKind::InputObject(new)) => existing.extend(new),
            _ => {}
        }
        Ok(())
    }

    /// Check that the root operation types exist and are object types.
    pub fn validate_roots(&self) -> Result<()> {
        match self.get("Query") {
            None => return Err(Error::MissingQuery),
            Some(TypeDef {
                kind: TypeKind::Object(_),
                ..
            }) => {}
            Some(_) => {
                return Err(Error::RootNotObject {
                    root: "Query".into(),
                })
            }
        }
        match self.get("Mutation") {
            None
            | Some(TypeDef {
                kind: TypeKind::Object(_),
                ..
            }) => Ok(()),
            Some(_) => Err(Error::RootNotObject {
                root: "Mutation".into(),
            }),
        }
    }

    /// Whether the schema has a `Mutation` type with at least one field.
    pub fn has_mutation(&self) -> bool {
        matches!(
            self.get("Mutation"),
            Some(TypeDef { kind: TypeKind::Object(object), .. }) if !object.fields.is_empty()
        )
    }

    /// Print the document as SDL.
    ///
    /// Directive definitions come first, then `Query`, `Mutation` and every other type sorted by
    /// name. Built-in scalars and directives are left out.
    pub fn print(&self) -> String {
        let directives = self
            .directives
            .values()
            .filter(|def| !BUILTIN_DIRECTIVES.contains(&def.name.as_str()))
            .map(DirectiveDef::print);
        let roots = ["Query", "Mutation"]
            .into_iter()
            .filter_map(|name| self.get(name));
        let rest = self
            .types
            .values()
            .filter(|def| !["Query", "Mutation"].contains(&def.name.as_str()))
            .filter(|def| !BUILTIN_SCALARS.contains(&def.name.as_str()))
            .sorted_by(|a, b| a.name.cmp(&b.name));
        directives
            .chain(roots.chain(rest).map(TypeDef::print))
            .join("\n\n")
    }
}

impl TypeDef {
    fn from_ast(def: TypeDefinition) -> Self {
        let kind = match def.kind {
            AstTypeKind::Scalar => TypeKind::Scalar,
            AstTypeKind::Object(object) => TypeKind::Object(ObjectDef {
                implements: names(object.implements),
                fields: fields(object.fields),
            }),
            AstTypeKind::Interface(interface) => TypeKind::Interface(ObjectDef {
                implements: names(interface.implements),
                fields: fields(interface.fields),
            }),
            AstTypeKind::Union(union) => TypeKind::Union(names(union.members)),
            AstTypeKind::Enum(enum_type) => TypeKind::Enum(
                enum_type
                    .values
                    .into_iter()
                    .map(|value| value.node.value.node.to_string())
                    .collect(),
            ),
            AstTypeKind::InputObject(input) => TypeKind::InputObject(input_values(input.fields)),
        };
        Self {
            name: def.name.node.to_string(),
            description: def.description.map(|desc| desc.node),
            directives: invocations(def.directives),
            kind,
        }
    }

    fn print(&self) -> String {
        let description = self
            .description
            .as_ref()
            .map(|desc| format!("{}\n", Value::String(desc.clone())))
            .unwrap_or_default();
        let directives = self
            .directives
            .iter()
            .map(|directive| format!(" {directive}"))
            .join("");
        let body = match &self.kind {
            TypeKind::Scalar => format!("scalar {}{directives}", self.name),
            TypeKind::Object(object) => print_object("type", &self.name, &directives, object),
            TypeKind::Interface(object) => {
                print_object("interface", &self.name, &directives, object)
            }
            TypeKind::Union(members) => {
                format!("union {}{directives} = {}", self.name, members.iter().join(" | "))
            }
            TypeKind::Enum(values) => print_block(
                &format!("enum {}{directives}", self.name),
                values.iter().map(String::clone),
            ),
            TypeKind::InputObject(fields) => print_block(
                &format!("input {}{directives}", self.name),
                fields.values().map(InputValueDef::print),
            ),
        };
        format!("{description}{body}")
    }
}

impl FieldDef {
    fn from_ast(def: FieldDefinition) -> Self {
        Self {
            name: def.name.node.to_string(),
            ty: def.ty.node.into(),
            args: input_values(def.arguments),
            directives: invocations(def.directives),
        }
    }

    fn print(&self) -> String {
        let mut line = self.name.clone();
        if !self.args.is_empty() {
            line = format!(
                "{line}({})",
                self.args.values().map(InputValueDef::print).join(", ")
            );
        }
        line = format!("{line}: {}", self.ty);
        for directive in &self.directives {
            line = format!("{line} {directive}");
        }
        line
    }
}

impl InputValueDef {
    fn from_ast(def: InputValueDefinition) -> Self {
        Self {
            name: def.name.node.to_string(),
            ty: def.ty.node.into(),
            default_value: def.default_value.map(|value| value.node),
        }
    }

    fn print(&self) -> String {
        match &self.default_value {
            Some(default) => format!("{}: {} = {default}", self.name, self.ty),
            None => format!("{}: {}", self.name, self.ty),
        }
    }
}

impl DirectiveDef {
    fn from_ast(def: DirectiveDefinition) -> Self {
        Self {
            name: def.name.node.to_string(),
            args: input_values(def.arguments),
            locations: def
                .locations
                .into_iter()
                .map(|location| location_name(location.node))
                .collect(),
        }
    }

    fn print(&self) -> String {
        let args = if self.args.is_empty() {
            String::new()
        } else {
            format!(
                "(\n{}\n)",
                self.args
                    .values()
                    .map(|arg| format!("  {}", arg.print()))
                    .join("\n")
            )
        };
        format!(
            "directive @{}{args} on {}",
            self.name,
            self.locations.iter().join(" | ")
        )
    }
}

fn names(names: Vec<Positioned<async_graphql::Name>>) -> IndexSet<String> {
    names.into_iter().map(|name| name.node.to_string()).collect()
}

fn fields(fields: Vec<Positioned<FieldDefinition>>) -> IndexMap<String, FieldDef> {
    fields
        .into_iter()
        .map(|field| {
            let field = FieldDef::from_ast(field.node);
            (field.name.clone(), field)
        })
        .collect()
}

fn input_values(values: Vec<Positioned<InputValueDefinition>>) -> IndexMap<String, InputValueDef> {
    values
        .into_iter()
        .map(|value| {
            let value = InputValueDef::from_ast(value.node);
            (value.name.clone(), value)
        })
        .collect()
}

fn invocations(directives: Vec<Positioned<ConstDirective>>) -> Vec<String> {
    directives
        .into_iter()
        .map(|directive| {
            let directive = directive.node;
            if directive.arguments.is_empty() {
                format!("@{}", directive.name.node)
            } else {
                format!(
                    "@{}({})",
                    directive.name.node,
                    directive
                        .arguments
                        .iter()
                        .map(|(name, value)| format!("{}: {}", name.node, value.node))
                        .join(", ")
                )
            }
        })
        .collect()
}

fn print_object(keyword: &str, name: &str, directives: &str, object: &ObjectDef) -> String {
    let implements = if object.implements.is_empty() {
        String::new()
    } else {
        format!(" implements {}", object.implements.iter().join(" & "))
    };
    print_block(
        &format!("{keyword} {name}{implements}{directives}"),
        object.fields.values().map(FieldDef::print),
    )
}

fn print_block(header: &str, lines: impl Iterator<Item = String>) -> String {
    format!(
        "{header} {{\n{}\n}}",
        lines.map(|line| format!("  {line}")).join("\n")
    )
}

fn location_name(location: DirectiveLocation) -> &'static str {
    match location {
        DirectiveLocation::Query => "QUERY",
        DirectiveLocation::Mutation => "MUTATION",
        DirectiveLocation::Subscription => "SUBSCRIPTION",
        DirectiveLocation::Field => "FIELD",
        DirectiveLocation::FragmentDefinition => "FRAGMENT_DEFINITION",
        DirectiveLocation::FragmentSpread => "FRAGMENT_SPREAD",
        DirectiveLocation::InlineFragment => "INLINE_FRAGMENT",
        DirectiveLocation::VariableDefinition => "VARIABLE_DEFINITION",
        DirectiveLocation::Schema => "SCHEMA",
        DirectiveLocation::Scalar => "SCALAR",
        DirectiveLocation::Object => "OBJECT",
        DirectiveLocation::FieldDefinition => "FIELD_DEFINITION",
        DirectiveLocation::ArgumentDefinition => "ARGUMENT_DEFINITION",
        DirectiveLocation::Interface => "INTERFACE",
        DirectiveLocation::Union => "UNION",
        DirectiveLocation::Enum => "ENUM",
        DirectiveLocation::EnumValue => "ENUM_VALUE",
        DirectiveLocation::InputObject => "INPUT_OBJECT",
        DirectiveLocation::InputFieldDefinition => "INPUT_FIELD_DEFINITION",
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const BASE: &str = r#"
        "A point in time."
        scalar DateTime

        directive @auth(role: String!) on OBJECT | FIELD_DEFINITION

        type Query {
            version: String!
        }

        type Order @auth(role: "admin") {
            status: String!
            createdAt: DateTime
        }

        enum Status { PAID PENDING }
    "#;

    #[test]
    fn test_parse() {
        let document = SchemaDocument::parse(BASE).unwrap();
        assert_eq!(
            document.types.keys().collect::<Vec<_>>(),
            ["DateTime", "Query", "Order", "Status"]
        );
        assert_eq!(
            document.get("DateTime").unwrap().description.as_deref(),
            Some("A point in time.")
        );
        assert_eq!(
            document.get("Order").unwrap().directives,
            ["@auth(role: \"admin\")"]
        );
        assert_eq!(
            document.field("Order", "status").unwrap().ty.to_string(),
            "String!"
        );
        assert!(document.field("Status", "PAID").is_none());
        assert_eq!(document.directives["auth"].locations, ["OBJECT", "FIELD_DEFINITION"]);
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(SchemaDocument::parse(" \n").unwrap(), SchemaDocument::default());
        assert!(matches!(
            SchemaDocument::parse("type Query {"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_merge() {
        let mut document = SchemaDocument::parse(BASE).unwrap();
        document
            .merge(
                SchemaDocument::parse(
                    "type Query { orders(page: Int = 1): [Order!]! }
                     enum Status { SENT }",
                )
                .unwrap(),
            )
            .unwrap();

        let query = document.get("Query").unwrap();
        let TypeKind::Object(query) = &query.kind else {
            panic!("Query is not an object");
        };
        assert_eq!(query.fields.keys().collect::<Vec<_>>(), ["version", "orders"]);
        assert_eq!(
            query.fields["orders"].args["page"].default_value,
            Some(Value::from(1))
        );
        assert_eq!(
            document.get("Status").unwrap().kind,
            TypeKind::Enum(["PAID", "PENDING", "SENT"].into_iter().map(String::from).collect())
        );

        let err = document
            .merge(SchemaDocument::parse("input Order { status: String }").unwrap())
            .unwrap_err();
        assert_eq!(err, Error::KindMismatch { type_name: "Order".into() });
    }

    #[test]
    fn test_validate_roots() {
        assert_eq!(
            SchemaDocument::parse("type Order { id: ID }")
                .unwrap()
                .validate_roots(),
            Err(Error::MissingQuery)
        );
        assert_eq!(
            SchemaDocument::parse("input Query { id: ID }")
                .unwrap()
                .validate_roots()
                .unwrap_err()
                .to_string(),
            "Query type is not an object type."
        );
        assert_eq!(
            SchemaDocument::parse("type Query { id: ID } enum Mutation { A }")
                .unwrap()
                .validate_roots()
                .unwrap_err()
                .to_string(),
            "Mutation type is not an object type."
        );
        let document = SchemaDocument::parse("type Query { id: ID }").unwrap();
        assert!(document.validate_roots().is_ok());
        assert!(!document.has_mutation());
    }

    #[test]
    fn test_print() {
        let document = SchemaDocument::parse(
            r#"
            type Product implements Node { id: ID! name(locale: String = "en"): String }
            interface Node { id: ID! }
            union Result = Product | Order
            type Mutation { touch: Int }
            type Query { node(id: ID!): Node @auth(role: "user") }
            directive @auth(role: String) on OBJECT | FIELD_DEFINITION
            input Filter { id: ID, size: Int = 3 }
            type Order { id: ID! }
            "#,
        )
        .unwrap();
        assert_eq!(
            document.print(),
            "directive @auth(\n  role: String\n) on OBJECT | FIELD_DEFINITION\n\n\
             type Query {\n  node(id: ID!): Node @auth(role: \"user\")\n}\n\n\
             type Mutation {\n  touch: Int\n}\n\n\
             input Filter {\n  id: ID\n  size: Int = 3\n}\n\n\
             interface Node {\n  id: ID!\n}\n\n\
             type Order {\n  id: ID!\n}\n\n\
             type Product implements Node {\n  id: ID!\n  name(locale: String = \"en\"): String\n}\n\n\
             union Result = Product | Order"
        );
    }
}
