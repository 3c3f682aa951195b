//! An in-memory data plugin.
//!
//! Tables are described ahead of time with a [`TableSchema`]: a list of typed [`Attribute`]s and
//! [`Association`]s to other tables. Creating a table in a [`MemoryStore`] yields a
//! [`TableModel`], which can be registered as a type source. The [`MemoryPlugin`] then exposes
//! the table's attributes and associations as GraphQL fields and answers default-resolved fields
//! by filtering, sorting and paginating the rows held by the store.
//!
//! ```
//! # use graphql_gene::{prelude::*, memory::*, async_graphql::value};
//! # async_std::task::block_on(async {
//! let store = MemoryStore::create();
//! let orders = store
//!     .create_table(
//!         TableSchema::new("Order")
//!             .attribute(Attribute::new("id", ColumnType::Integer).primary_key())
//!             .attribute(Attribute::new("status", ColumnType::String).not_null()),
//!     )
//!     .await
//!     .unwrap();
//! store
//!     .insert("Order", [value!({ "status": "PAID" }), value!({ "status": "PENDING" })])
//!     .await
//!     .unwrap();
//!
//! let mut extensions = TypeExtensions::new();
//! extensions.extend("Query", [("orders", FieldConfig::default_resolver("[Order!]!"))]);
//! let schema = generate_schema(
//!     SchemaOptions::new()
//!         .model("Order", orders)
//!         .plugin(MemoryPlugin)
//!         .extensions(extensions),
//! )
//! .unwrap();
//!
//! let response = schema
//!     .execute(r#"{ orders(where: { status: { eq: "PAID" } }) { id status } }"#)
//!     .await;
//! assert_eq!(response.data, value!({ "orders": [{ "id": 1, "status": "PAID" }] }));
//! # });
//! ```

mod plugin;
mod store;

pub use plugin::MemoryPlugin;
pub use store::{Error, MemoryStore, Query, TableModel};

use crate::config::GeneConfig;
use convert_case::{Case, Casing};
use derive_more::Display;

/// The facet through which a [`TableModel`] is recognized by the [`MemoryPlugin`].
pub const MEMORY_FACET: &str = "memory";

/// The native type of a column.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum ColumnType {
    #[display(fmt = "STRING")]
    String,
    #[display(fmt = "CHAR")]
    Char,
    #[display(fmt = "TEXT")]
    Text,
    #[display(fmt = "HSTORE")]
    Hstore,
    #[display(fmt = "NUMBER")]
    Number,
    #[display(fmt = "TINYINT")]
    TinyInt,
    #[display(fmt = "SMALLINT")]
    SmallInt,
    #[display(fmt = "MEDIUMINT")]
    MediumInt,
    #[display(fmt = "INTEGER")]
    Integer,
    #[display(fmt = "BIGINT")]
    BigInt,
    #[display(fmt = "FLOAT")]
    Float,
    #[display(fmt = "REAL")]
    Real,
    #[display(fmt = "DOUBLE")]
    Double,
    #[display(fmt = "DECIMAL")]
    Decimal,
    #[display(fmt = "BOOLEAN")]
    Boolean,
    #[display(fmt = "TIME")]
    Time,
    #[display(fmt = "DATE")]
    Date,
    #[display(fmt = "DATEONLY")]
    DateOnly,
    #[display(fmt = "NOW")]
    Now,
    #[display(fmt = "JSON")]
    Json,
    #[display(fmt = "JSONB")]
    Jsonb,
    #[display(fmt = "UUID")]
    Uuid,
    #[display(fmt = "UUIDV1")]
    UuidV1,
    #[display(fmt = "UUIDV4")]
    UuidV4,
    #[display(fmt = "BLOB")]
    Blob,
    /// A computed column, exposed with the type it computes.
    #[display(fmt = "VIRTUAL")]
    Virtual(Option<Box<ColumnType>>),
}

impl ColumnType {
    /// A virtual column computing values of type `ty`.
    pub fn virtual_of(ty: ColumnType) -> Self {
        Self::Virtual(Some(Box::new(ty)))
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Number
                | Self::TinyInt
                | Self::SmallInt
                | Self::MediumInt
                | Self::Integer
                | Self::BigInt
        )
    }

    /// The GraphQL type this native type maps to, if any.
    pub fn graphql_type(&self) -> Option<&'static str> {
        match self {
            Self::String | Self::Char | Self::Text | Self::Hstore => Some("String"),
            ty if ty.is_integer() => Some("Int"),
            Self::Float | Self::Real | Self::Double | Self::Decimal => Some("Float"),
            Self::Boolean => Some("Boolean"),
            Self::Time | Self::Date => Some("DateTime"),
            Self::DateOnly | Self::Now => Some("Date"),
            Self::Json | Self::Jsonb => Some("JSON"),
            Self::Uuid | Self::UuidV1 | Self::UuidV4 => Some("ID"),
            _ => None,
        }
    }
}

/// A column of a table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub ty: ColumnType,
    pub allow_null: bool,
    pub primary_key: bool,
    /// The table this column is a foreign key into.
    pub references: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            allow_null: true,
            primary_key: false,
            references: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    /// Mark this column as the primary key. Primary keys are never null.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.allow_null = false;
        self
    }

    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.references = Some(table.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssociationKind {
    /// Many rows of the target hold a foreign key to this row.
    HasMany,
    /// One row of the target holds a foreign key to this row.
    HasOne,
    /// This row holds a foreign key to one row of the target.
    BelongsTo,
}

/// A relation from one table to another, exposed as a field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Association {
    pub name: String,
    pub target: String,
    pub kind: AssociationKind,
    foreign_key: Option<String>,
}

impl Association {
    pub fn new(name: impl Into<String>, target: impl Into<String>, kind: AssociationKind) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind,
            foreign_key: None,
        }
    }

    pub fn foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = Some(column.into());
        self
    }

    pub fn is_multi(&self) -> bool {
        self.kind == AssociationKind::HasMany
    }

    /// The column holding the foreign key of this association, for an association of `source`.
    ///
    /// Unless set explicitly, this is `<source>Id` on the target for `HasMany` and `HasOne`
    /// associations, and `<name>Id` on the source for `BelongsTo` associations.
    pub fn foreign_key_column(&self, source: &str) -> String {
        if let Some(column) = &self.foreign_key {
            return column.clone();
        }
        let owner = match self.kind {
            AssociationKind::HasMany | AssociationKind::HasOne => source,
            AssociationKind::BelongsTo => &self.name,
        };
        format!("{owner} id").to_case(Case::Camel)
    }
}

/// The description of a table.
///
/// The name of the table is also the name of the GraphQL type it is exposed as.
#[derive(Clone, Debug, Default)]
pub struct TableSchema {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub associations: Vec<Association>,
    pub config: Option<GeneConfig>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn association(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    pub fn has_many(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.association(Association::new(name, target, AssociationKind::HasMany))
    }

    pub fn has_one(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.association(Association::new(name, target, AssociationKind::HasOne))
    }

    pub fn belongs_to(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.association(Association::new(name, target, AssociationKind::BelongsTo))
    }

    pub fn gene_config(mut self, config: GeneConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// The name of the primary key column, `id` if none is declared.
    pub fn primary_key(&self) -> &str {
        self.attributes
            .iter()
            .find(|attr| attr.primary_key)
            .map(|attr| attr.name.as_str())
            .unwrap_or("id")
    }

    /// Whether primary keys are generated when rows are inserted without one.
    pub fn generates_keys(&self) -> bool {
        self.attributes
            .iter()
            .find(|attr| attr.primary_key)
            .map(|attr| attr.ty.is_integer())
            .unwrap_or(true)
    }

    pub fn get_association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|assoc| assoc.name == name)
    }
}
