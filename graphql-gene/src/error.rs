//! Configuration errors raised while generating a schema.
//!
//! These errors are fatal: they come out of [`generate_schema`](crate::generate_schema) and mean
//! the application should not start. Errors encountered while resolving individual fields are
//! reported through [`async_graphql::Error`] instead, so that they only affect the field they
//! occur in.

use snafu::Snafu;
use std::fmt::Display;

/// Errors encountered when generating a schema.
#[derive(Clone, Debug, Snafu, PartialEq, Eq)]
pub enum Error {
    #[snafu(display("Query root type must be provided."))]
    MissingQuery,

    #[snafu(display("{root} type is not an object type."))]
    RootNotObject { root: String },

    #[snafu(display("Provided field config for type \"{type_name}\" must be an object."))]
    ExtensionNotObject { type_name: String },

    #[snafu(display(
        "Virtual attribute \"{field}\" of \"{type_name}\" must have a \"returnType\" defined."
    ))]
    VirtualWithoutReturnType { type_name: String, field: String },

    #[snafu(display("Cannot find \"{type_name}\" definition used as \"returnType\"."))]
    UndefinedReturnType { type_name: String },

    #[snafu(display("invalid type signature \"{signature}\""))]
    InvalidSignature { signature: String },

    #[snafu(display("No field definition found for \"{field}\" of type \"{type_name}\"."))]
    UnknownField { type_name: String, field: String },

    #[snafu(display(
        "No model with a default resolver found for type \"{type_name}\" (used by {parent}.{field})."
    ))]
    MissingModel {
        type_name: String,
        parent: String,
        field: String,
    },

    #[snafu(display("type \"{type_name}\" is redeclared as a different kind"))]
    KindMismatch { type_name: String },

    #[snafu(display("error parsing type definitions: {error}"))]
    Parse { error: String },

    #[snafu(display("error building schema: {error}"))]
    Build { error: String },

    #[snafu(display("{plugin}: {error}"))]
    Plugin { plugin: String, error: String },
}

impl Error {
    /// An error in the generated or base SDL document.
    pub fn parse(error: impl Display) -> Self {
        Self::Parse {
            error: error.to_string(),
        }
    }

    /// An error reported by the host GraphQL engine when materializing the schema.
    pub fn build(error: impl Display) -> Self {
        Self::Build {
            error: error.to_string(),
        }
    }

    /// A custom error raised by a plugin while populating type definitions.
    pub fn plugin(plugin: impl Display, error: impl Display) -> Self {
        Self::Plugin {
            plugin: plugin.to_string(),
            error: error.to_string(),
        }
    }
}

/// Result of fallible schema generation steps.
pub type Result<T, E = Error> = std::result::Result<T, E>;
