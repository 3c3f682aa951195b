//! Per-request state handed to resolvers and directives.

use crate::signature::TypeSignature;
use async_graphql::{Name, SelectionField, Value};
use indexmap::IndexMap;

/// Application data attached to a single request.
///
/// Attach it to a request with [`async_graphql::Request::data`]; every resolver and directive
/// handler of that request then receives a copy. Requests without a context get an empty one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestContext {
    headers: IndexMap<String, String>,
    values: IndexMap<String, Value>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request header. Header names are case-insensitive.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Add an arbitrary named value, such as the roles of the authenticated user.
    pub fn value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Look up a request header.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Look up a named value.
    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// A field requested in a query, with its arguments and sub-selection.
///
/// This is the look-ahead used by data plugins to load nested associations along with their
/// parent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    pub name: String,
    pub arguments: IndexMap<Name, Value>,
    pub fields: Vec<Selection>,
}

impl Selection {
    pub(crate) fn from_field(field: SelectionField<'_>) -> Self {
        let arguments = match field.arguments() {
            Ok(arguments) => arguments.into_iter().collect(),
            Err(err) => {
                tracing::warn!("unable to resolve arguments of {}: {}", field.name(), err.message);
                Default::default()
            }
        };
        Self {
            name: field.name().to_string(),
            arguments,
            fields: field.selection_set().map(Self::from_field).collect(),
        }
    }

    /// The sub-selections of the field called `name`.
    ///
    /// A field may be selected several times under different aliases, so this may yield more than
    /// one selection.
    pub fn fields_named<'a>(&'a self, name: &'a str) -> impl 'a + Iterator<Item = &'a Selection> {
        self.fields.iter().filter(move |field| field.name == name)
    }
}

/// Information about the field being resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolveInfo {
    /// The type that owns the field.
    pub parent_type: String,
    pub field_name: String,
    pub return_type: TypeSignature,
    /// The field as selected by the query.
    pub selection: Selection,
}
