//! Type extensions registered outside of any model.
//!
//! The usual way to add root fields is to extend `Query` and `Mutation` here:
//!
//! ```
//! # use graphql_gene::{extend::TypeExtensions, config::FieldConfig};
//! let mut extensions = TypeExtensions::new();
//! extensions.extend("Query", [
//!     ("orders", FieldConfig::default_resolver("[Order!]!")),
//!     ("order", FieldConfig::default_resolver("Order")),
//! ]);
//! assert_eq!(extensions.get("Query").unwrap().len(), 2);
//! ```
//!
//! Registrations are additive: extending a type twice merges the field maps, and the later
//! configuration of a field replaces the earlier one.
//!
//! [`TypeExtensions`] is mutable only while the application is being set up. Once it is handed to
//! [`generate_schema`](crate::generate_schema), the schema generator also records the
//! [`GeneConfig`] of every model under each name the model is exposed as, and the registry is
//! frozen for the lifetime of the generated schema, so resolvers can read it without locking.

use crate::{
    config::{FieldConfig, GeneConfig, TypeSource},
    Error, Result,
};
use indexmap::IndexMap;

#[derive(Clone, Debug, Default)]
pub struct TypeExtensions {
    types: IndexMap<String, IndexMap<String, FieldConfig>>,
    gene_configs: IndexMap<String, GeneConfig>,
    aliases: IndexMap<String, String>,
}

impl TypeExtensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace fields of `type_name`.
    pub fn extend<K, V>(
        &mut self,
        type_name: impl Into<String>,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> &mut Self
    where
        K: Into<String>,
        V: Into<FieldConfig>,
    {
        let existing = self.types.entry(type_name.into()).or_default();
        for (name, field) in fields {
            existing.insert(name.into(), field.into());
        }
        self
    }

    /// Extend several types at once from generic type declarations.
    ///
    /// # Errors
    ///
    /// Only inline field maps can extend a type. Models and enum value lists are rejected.
    pub fn extend_types<K: Into<String>>(
        &mut self,
        types: impl IntoIterator<Item = (K, TypeSource)>,
    ) -> Result<&mut Self> {
        for (type_name, source) in types {
            let type_name = type_name.into();
            match source {
                TypeSource::Inline(config) => {
                    self.extend(type_name, config.fields);
                }
                TypeSource::Model(_) | TypeSource::Enum(_) => {
                    return Err(Error::ExtensionNotObject { type_name });
                }
            }
        }
        Ok(self)
    }

    /// Every extended type and its fields, in registration order.
    pub fn get_all(&self) -> &IndexMap<String, IndexMap<String, FieldConfig>> {
        &self.types
    }

    pub fn get(&self, type_name: &str) -> Option<&IndexMap<String, FieldConfig>> {
        self.types.get(type_name)
    }

    /// Record the policy of the model exposed as `type_name`.
    pub fn set_gene_config(&mut self, type_name: impl Into<String>, config: GeneConfig) {
        self.gene_configs.insert(type_name.into(), config);
    }

    /// The policy of the model exposed as `type_name`, if it has been generated.
    pub fn gene_config_for_type(&self, type_name: &str) -> Option<&GeneConfig> {
        self.gene_configs.get(type_name)
    }

    /// Record that `alias` exposes the same model as `owner`.
    pub fn set_alias(&mut self, alias: impl Into<String>, owner: impl Into<String>) {
        self.aliases.insert(alias.into(), owner.into());
    }

    /// The primary type name of the model exposed as `alias`.
    pub fn alias_owner(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::TypeConfig;

    #[test]
    fn test_extend_merges() {
        let mut extensions = TypeExtensions::new();
        extensions.extend("Query", [("orders", "[Order!]!"), ("order", "Order")]);
        extensions.extend(
            "Query",
            [("order", FieldConfig::default_resolver("Order"))],
        );
        extensions.extend("Mutation", [("ping", "Boolean")]);

        let query = extensions.get("Query").unwrap();
        assert_eq!(query.keys().collect::<Vec<_>>(), ["orders", "order"]);
        assert_eq!(query["orders"].return_type.as_deref(), Some("[Order!]!"));
        assert!(!query["orders"].uses_default_resolver());
        assert!(query["order"].uses_default_resolver());
        assert_eq!(
            extensions.get_all().keys().collect::<Vec<_>>(),
            ["Query", "Mutation"]
        );
    }

    #[test]
    fn test_extend_types_rejects_non_objects() {
        let mut extensions = TypeExtensions::new();
        extensions
            .extend_types([(
                "Query",
                TypeSource::Inline(TypeConfig::object().field("version", "String!")),
            )])
            .unwrap();
        assert!(extensions.get("Query").unwrap().contains_key("version"));

        let err = extensions
            .extend_types([("Query", TypeSource::enumeration(["A", "B"]))])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Provided field config for type \"Query\" must be an object."
        );
    }

    #[test]
    fn test_gene_configs_and_aliases() {
        let mut extensions = TypeExtensions::new();
        extensions.set_gene_config("User", GeneConfig::new().exclude("password"));
        extensions.set_gene_config("AuthenticatedUser", GeneConfig::new());
        extensions.set_alias("AuthenticatedUser", "User");

        assert!(!extensions
            .gene_config_for_type("User")
            .unwrap()
            .is_field_included("password"));
        assert_eq!(extensions.alias_owner("AuthenticatedUser"), Some("User"));
        assert_eq!(extensions.alias_owner("User"), None);
        assert!(extensions.gene_config_for_type("Order").is_none());
    }
}
