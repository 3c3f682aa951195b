//! Storage of in-memory tables.

use super::{Association, AssociationKind, TableSchema, MEMORY_FACET};
use crate::{
    config::GeneConfig,
    context::Selection,
    default_resolver::{PAGE_ARG_DEFAULT, PER_PAGE_ARG_DEFAULT},
    operators::{parse_order, sort_by, Condition, OrderBy, Operator},
    plugin::Model,
};
use async_graphql::{Name, Value};
use async_std::sync::{Arc, RwLock};
use indexmap::IndexMap;
use snafu::Snafu;
use std::any::Any;
use std::collections::hash_map::{Entry, HashMap};

/// Errors returned by the in-memory store.
#[derive(Debug, Snafu)]
#[snafu(display("table {}: {}", table, message))]
pub struct Error {
    table: String,
    message: String,
}

impl Error {
    fn new(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            message: message.into(),
        }
    }

    /// The table the failed operation was addressed to.
    pub fn table(&self) -> &str {
        &self.table
    }
}

type Row = IndexMap<Name, Value>;

fn field_of(row: &Row, field: &str) -> Value {
    row.get(field).cloned().unwrap_or(Value::Null)
}

/// Whether two key columns refer to the same row. Null keys refer to nothing.
fn same_key(a: &Value, b: &Value) -> bool {
    !matches!(a, Value::Null)
        && !matches!(b, Value::Null)
        && Operator::Eq.test(a, b).unwrap_or(false)
}

/// The selection of rows requested by the arguments of a default-resolved field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    /// Only the row with this primary key.
    pub id: Option<Value>,
    pub condition: Condition,
    pub order: Vec<OrderBy>,
    /// The offset and length of the page of results to return, if paginated.
    pub window: Option<(usize, usize)>,
}

impl Query {
    /// Interpret the arguments of a field.
    ///
    /// List fields are ordered and paginated, using page 1 of 10 rows unless the arguments say
    /// otherwise. Other fields may select a single row by `id`.
    pub fn from_args(args: &IndexMap<Name, Value>, is_list: bool) -> async_graphql::Result<Self> {
        let arg = |name: &str| args.get(name).unwrap_or(&Value::Null);
        let int_arg = |name: &str, default: i64| match arg(name) {
            Value::Number(n) => n.as_i64().unwrap_or(default),
            _ => default,
        };

        let mut query = Self {
            condition: Condition::parse(arg("where"))?,
            ..Default::default()
        };
        if is_list {
            query.order = parse_order(arg("order"))?;
            let page = int_arg("page", PAGE_ARG_DEFAULT).max(1);
            let per_page = int_arg("perPage", PER_PAGE_ARG_DEFAULT).max(0);
            query.window = Some((((page - 1) * per_page) as usize, per_page as usize));
        } else if !matches!(arg("id"), Value::Null) {
            query.id = Some(arg("id").clone());
        }
        Ok(query)
    }

    /// Select the rows of `table` from `rows`.
    ///
    /// Conditions on an association compare against the primary keys of the linked rows.
    fn apply<'a>(
        &self,
        db: &Db,
        table: &Table,
        rows: impl IntoIterator<Item = &'a Row>,
    ) -> async_graphql::Result<Vec<&'a Row>> {
        let mut matched = vec![];
        for row in rows {
            let lookup = |field: &str| db.field(table, row, field);
            if let Some(id) = &self.id {
                if !same_key(&field_of(row, table.schema.primary_key()), id) {
                    continue;
                }
            }
            if self.condition.matches(&lookup)? {
                matched.push(row);
            }
        }
        sort_by(&mut matched, &self.order, |row, field| field_of(row, field));
        Ok(match self.window {
            Some((offset, limit)) => matched.into_iter().skip(offset).take(limit).collect(),
            None => matched,
        })
    }
}

/// An in-memory table.
#[derive(Debug)]
struct Table {
    schema: Arc<TableSchema>,
    rows: Vec<Row>,
    next_key: i64,
}

/// The rows of `target` linked to `row` of `table` through `assoc`.
fn linked<'a>(
    table: &'a Table,
    row: &'a Row,
    assoc: &'a Association,
    target: &'a Table,
) -> impl Iterator<Item = &'a Row> + 'a {
    let column = assoc.foreign_key_column(&table.schema.name);
    target.rows.iter().filter(move |other| match assoc.kind {
        AssociationKind::HasMany | AssociationKind::HasOne => same_key(
            &field_of(other, &column),
            &field_of(row, table.schema.primary_key()),
        ),
        AssociationKind::BelongsTo => same_key(
            &field_of(other, target.schema.primary_key()),
            &field_of(row, &column),
        ),
    })
}

/// The in-memory database.
#[derive(Debug, Default)]
struct Db {
    tables: HashMap<String, Table>,
}

impl Db {
    fn table(&self, name: &str) -> Result<&Table, Error> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::new(name, "no such table"))
    }

    /// The value of `field` in `row` of `table`.
    ///
    /// An association evaluates to the primary key of the linked row, or to the list of primary
    /// keys of the linked rows if it links many. Unlinked associations are null.
    fn field(&self, table: &Table, row: &Row, field: &str) -> Value {
        let Some(assoc) = table.schema.get_association(field) else {
            return field_of(row, field);
        };
        if assoc.kind == AssociationKind::BelongsTo {
            return field_of(row, &assoc.foreign_key_column(&table.schema.name));
        }
        let Ok(target) = self.table(&assoc.target) else {
            return Value::Null;
        };
        let mut keys = linked(table, row, assoc, target)
            .map(|other| field_of(other, target.schema.primary_key()))
            .peekable();
        if keys.peek().is_none() {
            Value::Null
        } else if assoc.is_multi() {
            Value::List(keys.collect())
        } else {
            keys.next().unwrap_or(Value::Null)
        }
    }

    /// Convert `row` to a value, together with the associations requested by `selection`.
    fn load(&self, table: &Table, row: &Row, selection: &Selection) -> async_graphql::Result<Value> {
        let mut value = row.clone();
        for assoc in &table.schema.associations {
            let Some(field) = selection.fields_named(&assoc.name).next() else {
                continue;
            };
            let target = self.table(&assoc.target)?;
            let mut rows = linked(table, row, assoc, target);

            let loaded = if assoc.is_multi() {
                let query = Query::from_args(&field.arguments, true)?;
                Value::List(
                    query
                        .apply(self, target, rows)?
                        .into_iter()
                        .map(|other| self.load(target, other, field))
                        .collect::<async_graphql::Result<_>>()?,
                )
            } else {
                match rows.next() {
                    Some(other) => self.load(target, other, field)?,
                    None => Value::Null,
                }
            };
            value.insert(Name::new(&assoc.name), loaded);
        }
        Ok(Value::Object(value))
    }
}

/// A handle to an in-memory database.
///
/// Handles are cheap to clone and all clones refer to the same database.
#[derive(Clone, Debug)]
pub struct MemoryStore(Arc<RwLock<Db>>);

impl MemoryStore {
    /// Create a new, empty database.
    pub fn create() -> Self {
        Self(Default::default())
    }

    /// Create a table and return the model exposing it.
    pub async fn create_table(&self, schema: TableSchema) -> Result<TableModel, Error> {
        let schema = Arc::new(schema);
        let mut db = self.0.write().await;
        match db.tables.entry(schema.name.clone()) {
            Entry::Occupied(_) => Err(Error::new(&schema.name, "already exists")),
            Entry::Vacant(e) => {
                e.insert(Table {
                    schema: schema.clone(),
                    rows: vec![],
                    next_key: 1,
                });
                Ok(TableModel {
                    schema,
                    store: self.clone(),
                })
            }
        }
    }

    /// Insert rows into a table.
    ///
    /// Each row must be an object. Rows with no primary key are assigned the next available
    /// integer key, if the key column is an integer. The inserted rows are returned with their keys.
    pub async fn insert(
        &self,
        table: &str,
        rows: impl IntoIterator<Item = Value>,
    ) -> Result<Vec<Value>, Error> {
        let mut db = self.0.write().await;
        let table = db
            .tables
            .get_mut(table)
            .ok_or_else(|| Error::new(table, "no such table"))?;
        let primary_key = table.schema.primary_key().to_string();

        let mut inserted = vec![];
        for row in rows {
            let Value::Object(mut row) = row else {
                return Err(Error::new(&table.schema.name, "rows must be objects"));
            };
            match row.get(primary_key.as_str()) {
                Some(Value::Number(n)) => {
                    if let Some(key) = n.as_i64() {
                        table.next_key = table.next_key.max(key.saturating_add(1));
                    }
                }
                Some(Value::Null) | None if table.schema.generates_keys() => {
                    row.insert(Name::new(&primary_key), Value::from(table.next_key));
                    table.next_key += 1;
                }
                Some(Value::Null) | None => {
                    return Err(Error::new(
                        &table.schema.name,
                        format!("row is missing primary key {primary_key}"),
                    ));
                }
                Some(_) => {}
            }
            inserted.push(Value::Object(row.clone()));
            table.rows.push(row);
        }
        Ok(inserted)
    }

    /// Find the rows of `table` matching `query`, with the associations requested by `selection`.
    pub async fn find(
        &self,
        table: &str,
        query: &Query,
        selection: &Selection,
    ) -> async_graphql::Result<Vec<Value>> {
        let db = self.0.read().await;
        let table = db.table(table)?;
        query
            .apply(&db, table, &table.rows)?
            .into_iter()
            .map(|row| db.load(table, row, selection))
            .collect()
    }
}

/// A table exposed as a [`Model`].
#[derive(Clone, Debug)]
pub struct TableModel {
    schema: Arc<TableSchema>,
    store: MemoryStore,
}

impl TableModel {
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl Model for TableModel {
    fn gene_config(&self) -> Option<&GeneConfig> {
        self.schema.config.as_ref()
    }

    fn facet(&self, name: &str) -> Option<&(dyn Any + Send + Sync)> {
        match name {
            MEMORY_FACET => Some(self),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{init_logging, memory::{Attribute, ColumnType}};
    use async_graphql::value;

    async fn shop() -> MemoryStore {
        let store = MemoryStore::create();
        store
            .create_table(
                TableSchema::new("Order")
                    .attribute(Attribute::new("id", ColumnType::Integer).primary_key())
                    .attribute(Attribute::new("status", ColumnType::String))
                    .has_many("items", "OrderItem")
                    .belongs_to("customer", "Customer"),
            )
            .await
            .unwrap();
        store
            .create_table(
                TableSchema::new("OrderItem")
                    .attribute(Attribute::new("id", ColumnType::Integer).primary_key())
                    .attribute(Attribute::new("name", ColumnType::String))
                    .attribute(Attribute::new("orderId", ColumnType::Integer).references("Order")),
            )
            .await
            .unwrap();
        store
            .create_table(TableSchema::new("Customer").attribute(Attribute::new(
                "name",
                ColumnType::String,
            )))
            .await
            .unwrap();

        store
            .insert("Customer", [value!({ "name": "Ada" })])
            .await
            .unwrap();
        store
            .insert(
                "Order",
                [
                    value!({ "status": "PAID", "customerId": 1 }),
                    value!({ "status": "PENDING", "customerId": null }),
                ],
            )
            .await
            .unwrap();
        store
            .insert(
                "OrderItem",
                [
                    value!({ "name": "Shirt", "orderId": 1 }),
                    value!({ "name": "Hat", "orderId": 1 }),
                    value!({ "name": "Sock", "orderId": 2 }),
                ],
            )
            .await
            .unwrap();
        store
    }

    fn selection(fields: Vec<Selection>) -> Selection {
        Selection {
            name: "orders".into(),
            arguments: Default::default(),
            fields,
        }
    }

    #[async_std::test]
    async fn test_insert_keys() {
        init_logging();

        let store = MemoryStore::create();
        store
            .create_table(TableSchema::new("Order"))
            .await
            .unwrap();
        let rows = store
            .insert("Order", [value!({}), value!({ "id": 7 }), value!({})])
            .await
            .unwrap();
        assert_eq!(rows, [value!({ "id": 1 }), value!({ "id": 7 }), value!({ "id": 8 })]);

        store
            .create_table(
                TableSchema::new("Product")
                    .attribute(Attribute::new("sku", ColumnType::String).primary_key()),
            )
            .await
            .unwrap();
        store
            .insert("Product", [value!({ "sku": "A-1" })])
            .await
            .unwrap();
        let err = store.insert("Product", [value!({})]).await.unwrap_err();
        assert_eq!(err.to_string(), "table Product: row is missing primary key sku");
        store.insert("Product", [value!(1)]).await.unwrap_err();
        let err = store.insert("Missing", [value!({})]).await.unwrap_err();
        assert_eq!(err.table(), "Missing");
        let err = store
            .create_table(TableSchema::new("Order"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "table Order: already exists");
    }

    #[async_std::test]
    async fn test_insert_largest_key() {
        init_logging();

        let store = MemoryStore::create();
        store
            .create_table(TableSchema::new("Order"))
            .await
            .unwrap();
        let rows = store
            .insert("Order", [value!({ "id": i64::MAX })])
            .await
            .unwrap();
        assert_eq!(rows, [value!({ "id": i64::MAX })]);
    }

    #[async_std::test]
    async fn test_association_conditions() {
        init_logging();

        let store = shop().await;
        let find = |condition| {
            let store = store.clone();
            async move {
                let args = [(Name::new("where"), condition)].into_iter().collect();
                let query = Query::from_args(&args, true).unwrap();
                store
                    .find("Order", &query, &Default::default())
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|row| match row {
                        Value::Object(fields) => field_of(&fields, "id"),
                        _ => Value::Null,
                    })
                    .collect::<Vec<_>>()
            }
        };

        assert_eq!(find(value!({ "customer": { "eq": 1 } })).await, [value!(1)]);
        assert_eq!(find(value!({ "customer": { "null": true } })).await, [value!(2)]);
        assert_eq!(find(value!({ "items": { "eq": 3 } })).await, [value!(2)]);
        assert_eq!(
            find(value!({ "items": { "in": [1, 3] } })).await,
            [value!(1), value!(2)]
        );
    }

    #[async_std::test]
    async fn test_find() {
        init_logging();

        let store = shop().await;
        let args = [
            (Name::new("where"), value!({ "status": { "ne": "PENDING" } })),
        ]
        .into_iter()
        .collect();
        let query = Query::from_args(&args, true).unwrap();
        let rows = store
            .find("Order", &query, &Default::default())
            .await
            .unwrap();
        assert_eq!(rows, [value!({ "id": 1, "status": "PAID", "customerId": 1 })]);

        let args = [(Name::new("id"), value!("2"))].into_iter().collect();
        let query = Query::from_args(&args, false).unwrap();
        let rows = store
            .find("Order", &query, &Default::default())
            .await
            .unwrap();
        assert_eq!(rows, [value!({ "id": 2, "status": "PENDING", "customerId": null })]);
    }

    #[async_std::test]
    async fn test_pagination_and_order() {
        init_logging();

        let store = shop().await;
        let args = [
            (Name::new("order"), value!(["name_DESC"])),
            (Name::new("page"), value!(2)),
            (Name::new("perPage"), value!(2)),
        ]
        .into_iter()
        .collect();
        let query = Query::from_args(&args, true).unwrap();
        assert_eq!(query.window, Some((2, 2)));
        let rows = store
            .find("OrderItem", &query, &Default::default())
            .await
            .unwrap();
        assert_eq!(rows, [value!({ "id": 2, "name": "Hat", "orderId": 1 })]);

        let args = [(Name::new("order"), value!(["name"]))].into_iter().collect();
        assert_eq!(
            Query::from_args(&args, true).unwrap_err().message,
            "Invalid order value."
        );
    }

    #[async_std::test]
    async fn test_eager_loading() {
        init_logging();

        let store = shop().await;
        let items = Selection {
            name: "items".into(),
            arguments: [(Name::new("order"), value!(["name_ASC"]))]
                .into_iter()
                .collect(),
            fields: vec![],
        };
        let customer = Selection {
            name: "customer".into(),
            ..Default::default()
        };
        let rows = store
            .find("Order", &Query::default(), &selection(vec![items, customer]))
            .await
            .unwrap();
        assert_eq!(
            rows,
            [
                value!({
                    "id": 1,
                    "status": "PAID",
                    "customerId": 1,
                    "items": [
                        { "id": 2, "name": "Hat", "orderId": 1 },
                        { "id": 1, "name": "Shirt", "orderId": 1 },
                    ],
                    "customer": { "id": 1, "name": "Ada" },
                }),
                value!({
                    "id": 2,
                    "status": "PENDING",
                    "customerId": null,
                    "items": [{ "id": 3, "name": "Sock", "orderId": 2 }],
                    "customer": null,
                }),
            ]
        );
    }
}
