//! GraphQL Gene generates a GraphQL schema from data models.
//!
//! An application describes its types as [type sources](config::TypeSource): models backed by a
//! data-fetching technology, enumerations, or inline field declarations. Each model is handed to
//! the first registered [plugin](plugin::Plugin) that recognizes it, which turns the model into
//! fields. Fields can be added to any type through [type extensions](extend::TypeExtensions), and
//! fields opting into the [default resolver](default_resolver) get standard pagination, filter and
//! order arguments, answered by the plugin that owns their return type.
//!
//! Cross-cutting behavior, like authorization, is expressed as [directives](directive::Directive)
//! attached to types and fields. Directives wrap the field's resolver in a chain, type-level
//! directives first.
//!
//! The result of [`generate_schema`] is an executable [`async_graphql`] dynamic schema, along with
//! the textual definitions it was built from.
//!
//! This crate comes with an [in-memory](memory) plugin, which is useful for prototyping and for
//! testing in isolation from an actual database. Other data sources can be supported by
//! implementing the [plugin](plugin::Plugin) trait.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

pub use async_graphql;

pub mod config;
pub mod context;
pub mod default_resolver;
pub mod directive;
pub mod error;
pub mod extend;
#[cfg(feature = "memory")]
pub mod memory;
pub mod operators;
pub mod plugin;
pub mod prelude;
pub mod registry;
pub mod resolvers;
pub mod schema;
pub mod signature;

pub use error::{Error, Result};
pub use schema::{generate_schema, GeneratedSchema, SchemaOptions};

/// Initialize tracing.
pub fn init_logging() {
    static ONCE: Once = Once::new();

    ONCE.call_once(|| {
        if let Err(err) = color_eyre::install() {
            eprintln!("unable to install error report handler: {err}");
        }
        tracing_subscriber::fmt()
            .with_ansi(true)
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    });
}
