use clap::Parser;
use graphql_gene::{
    memory::{Attribute, ColumnType, MemoryPlugin, MemoryStore, Query, TableModel, TableSchema},
    prelude::*,
};

////////////////////////////////////////////////////////////////////////////////////////////////////
// Options
//

#[derive(Clone, Debug, Parser)]
pub struct Options {
    /// Token clients must send in the `authorization` header to see customers.
    #[clap(long, env = "SHOP_ADMIN_TOKEN", default_value = "secret")]
    admin_token: String,
    /// Execute a query against the shop and print the result, instead of printing the schema.
    #[clap(long, env = "SHOP_QUERY")]
    query: Option<String>,
    /// Send this token in the `authorization` header of the query.
    #[clap(long, env = "SHOP_TOKEN")]
    token: Option<String>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Directives
//

/// Only let through requests carrying the admin token.
fn auth(token: String) -> Directive {
    Directive::new("auth", move |params| {
        let token = token.clone();
        async move {
            match params.context.get_header("authorization") {
                Some(auth) if auth == token => Ok(()),
                _ => Err(format!("{} requires the admin role", params.info.parent_type).into()),
            }
        }
    })
    .arg("role", "admin")
}

/// Remove discontinued products from a list of products.
fn hide_discontinued() -> Directive {
    Directive::new("hideDiscontinued", |params| async move {
        params.filter(|product| match product {
            Value::Object(fields) => !matches!(fields.get("discontinued"), Some(Value::Boolean(true))),
            _ => true,
        });
        Ok(())
    })
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Data
//

pub async fn create_store(
    admin_token: &str,
) -> Result<(MemoryStore, Vec<TableModel>), graphql_gene::memory::Error> {
    let store = MemoryStore::create();

    let products = store
        .create_table(
            TableSchema::new("Product")
                .attribute(Attribute::new("id", ColumnType::Integer).primary_key())
                .attribute(Attribute::new("name", ColumnType::String).not_null())
                .attribute(Attribute::new("color", ColumnType::String))
                .attribute(Attribute::new("size", ColumnType::SmallInt))
                .attribute(Attribute::new("price", ColumnType::Decimal).not_null())
                .attribute(Attribute::new("discontinued", ColumnType::Boolean))
                .gene_config(
                    GeneConfig::new().alias(
                        "ProductPreview",
                        GeneConfig::new().include("name").include("color"),
                    ),
                ),
        )
        .await?;
    let orders = store
        .create_table(
            TableSchema::new("Order")
                .attribute(Attribute::new("id", ColumnType::Integer).primary_key())
                .attribute(Attribute::new("status", ColumnType::String).not_null())
                .attribute(Attribute::new("placedOn", ColumnType::DateOnly))
                .attribute(
                    Attribute::new("customerId", ColumnType::Integer).references("Customer"),
                )
                .has_many("items", "OrderItem")
                .belongs_to("customer", "Customer"),
        )
        .await?;
    let items = store
        .create_table(
            TableSchema::new("OrderItem")
                .attribute(Attribute::new("id", ColumnType::Integer).primary_key())
                .attribute(Attribute::new("quantity", ColumnType::Integer).not_null())
                .attribute(Attribute::new("orderId", ColumnType::Integer).references("Order"))
                .attribute(Attribute::new("productId", ColumnType::Integer).references("Product"))
                .belongs_to("product", "Product"),
        )
        .await?;
    let customers = store
        .create_table(
            TableSchema::new("Customer")
                .attribute(Attribute::new("id", ColumnType::Integer).primary_key())
                .attribute(Attribute::new("name", ColumnType::String).not_null())
                .attribute(Attribute::new("email", ColumnType::String))
                .has_many("orders", "Order")
                .gene_config(
                    GeneConfig::new()
                        .exclude("email")
                        .directive(auth(admin_token.to_string())),
                ),
        )
        .await?;

    store
        .insert(
            "Product",
            [
                value!({ "name": "Shirt", "color": "Blue", "size": 3, "price": 20.0 }),
                value!({ "name": "Hat", "color": "Red", "size": 1, "price": 15.5 }),
                value!({ "name": "Coat", "color": "Blue", "size": 4, "price": 80.0, "discontinued": true }),
            ],
        )
        .await?;
    store
        .insert(
            "Customer",
            [
                value!({ "name": "Ada", "email": "ada@example.com" }),
                value!({ "name": "Grace", "email": "grace@example.com" }),
            ],
        )
        .await?;
    store
        .insert(
            "Order",
            [
                value!({ "status": "PAID", "customerId": 1, "placedOn": "2024-03-01" }),
                value!({ "status": "PENDING", "customerId": 2, "placedOn": "2024-03-02" }),
            ],
        )
        .await?;
    store
        .insert(
            "OrderItem",
            [
                value!({ "quantity": 2, "orderId": 1, "productId": 1 }),
                value!({ "quantity": 1, "orderId": 1, "productId": 2 }),
                value!({ "quantity": 1, "orderId": 2, "productId": 3 }),
            ],
        )
        .await?;

    Ok((store, vec![products, orders, items, customers]))
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Schema
//

pub async fn schema(opt: &Options) -> color_eyre::Result<GeneratedSchema> {
    let (store, models) = create_store(&opt.admin_token).await?;

    let mut extensions = TypeExtensions::new();
    extensions
        .extend(
            "Query",
            [
                (
                    "products",
                    FieldConfig::default_resolver("[Product!]!").directive(hide_discontinued()),
                ),
                ("orders", FieldConfig::default_resolver("[Order!]!")),
                ("order", FieldConfig::default_resolver("Order")),
                (
                    "featured",
                    FieldConfig::new("ProductPreview").resolver(move |_| {
                        let store = store.clone();
                        async move {
                            let products = store
                                .find("Product", &Query::default(), &Default::default())
                                .await?;
                            Ok(products.into_iter().next().unwrap_or(Value::Null))
                        }
                    }),
                ),
            ],
        )
        .extend("Order", [("status", "OrderStatus!")]);

    let mut options = SchemaOptions::new()
        .type_source(
            "OrderStatus",
            TypeSource::enumeration(["PENDING", "PAID", "SENT"]),
        )
        .plugin(MemoryPlugin)
        .extensions(extensions)
        .scalar(ScalarDefinition::new("Date").description("A calendar date, like 2024-03-01."));
    for model in models {
        options = options.model(model.schema().name.clone(), model);
    }
    Ok(generate_schema(options)?)
}

#[async_std::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let opt = Options::parse();
    let schema = schema(&opt).await?;

    match &opt.query {
        Some(query) => {
            let mut context = RequestContext::new();
            if let Some(token) = &opt.token {
                context = context.header("authorization", token.clone());
            }
            let response = schema
                .execute(async_graphql::Request::new(query).data(context))
                .await;
            for err in &response.errors {
                eprintln!("error: {}", err.message);
            }
            println!("{}", response.data);
        }
        None => println!("{}", schema.schema_string()),
    }
    Ok(())
}
