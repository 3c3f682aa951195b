//! GraphQL type signatures.
//!
//! A type signature is the textual form of a GraphQL output or input type, such as `Foo`, `Foo!`,
//! `[Foo]` or `[Foo!]!`. Signatures are carried around as strings in the
//! [field-line registry](crate::registry), but whenever we need to reason about their structure
//! (is it a list? what is the named type at the bottom?) we parse them with the GraphQL parser.

use crate::{Error, Result};
use async_graphql::{
    parser::types::{BaseType, Type},
    Value,
};
use derive_more::Display;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A parsed GraphQL type signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeSignature(Type);

impl TypeSignature {
    /// Parse a type signature.
    pub fn parse(signature: &str) -> Result<Self> {
        Type::new(signature.trim())
            .map(Self)
            .ok_or_else(|| Error::InvalidSignature {
                signature: signature.to_string(),
            })
    }

    /// The name of the type at the bottom of all list wrappers.
    pub fn named_type(&self) -> &str {
        fn named(ty: &Type) -> &str {
            match &ty.base {
                BaseType::Named(name) => name.as_str(),
                BaseType::List(inner) => named(inner),
            }
        }
        named(&self.0)
    }

    /// Whether the outermost type is a list.
    pub fn is_list(&self) -> bool {
        matches!(self.0.base, BaseType::List(_))
    }

    /// Whether the outermost type is non-null.
    pub fn is_non_null(&self) -> bool {
        !self.0.nullable
    }

    /// The underlying parser type.
    pub fn as_type(&self) -> &Type {
        &self.0
    }
}

impl FromStr for TypeSignature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Display for TypeSignature {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Type> for TypeSignature {
    fn from(ty: Type) -> Self {
        Self(ty)
    }
}

/// The name of the type at the bottom of a type signature string.
///
/// This is a lenient version of [`TypeSignature::named_type`] for use on signatures which may still
/// carry a default value suffix, like `Int = 1`.
pub fn return_type_name(signature: &str) -> &str {
    signature
        .split('=')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| c == '[' || c == ']' || c == '!')
}

/// The scalar types every generated schema understands.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum BasicType {
    #[display(fmt = "ID")]
    Id,
    String,
    Int,
    Float,
    Boolean,
    DateTime,
    Date,
    #[display(fmt = "JSON")]
    Json,
}

impl BasicType {
    pub const ALL: [BasicType; 8] = [
        Self::Id,
        Self::String,
        Self::Int,
        Self::Float,
        Self::Boolean,
        Self::DateTime,
        Self::Date,
        Self::Json,
    ];

    /// Look up a basic type by its GraphQL name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.to_string() == name)
    }

    /// Whether where-filters can compare fields of this type.
    pub fn is_filterable(self) -> bool {
        matches!(
            self,
            Self::String | Self::Int | Self::Float | Self::Boolean | Self::Date | Self::DateTime
        )
    }

    /// Whether fields of this type support `like` and `notLike`.
    pub fn supports_like(self) -> bool {
        self == Self::String
    }

    /// Whether fields of this type support `lt`, `lte`, `gt` and `gte`.
    pub fn supports_range(self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::Date | Self::DateTime)
    }
}

/// Whether `name` refers to one of the [basic types](BasicType).
pub fn is_basic_type(name: &str) -> bool {
    BasicType::from_name(name).is_some()
}

/// The GraphQL type of a literal value.
///
/// Returns [`None`] for values with no literal representation in a type signature (objects,
/// binary blobs and null).
pub fn type_of_value(value: &Value) -> Option<String> {
    match value {
        Value::String(_) | Value::Enum(_) => Some("String".into()),
        Value::Number(n) if n.is_f64() => Some("Float".into()),
        Value::Number(_) => Some("Int".into()),
        Value::Boolean(_) => Some("Boolean".into()),
        Value::List(items) => {
            let inner = items
                .iter()
                .find_map(type_of_value)
                .unwrap_or_else(|| "String".into());
            Some(format!("[{inner}]"))
        }
        Value::Null | Value::Object(_) | Value::Binary(_) => None,
    }
}
