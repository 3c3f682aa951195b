//! Arguments and filter types for fields served by the default resolver.
//!
//! A field which opts into the default resolver is answered by the data plugin that owns the
//! field's return type. Such fields take a standard set of arguments:
//!
//! * list fields: `page: Int = 1, perPage: Int = 10, locale: String, where: <Where>,
//!   order: [<Order>!]`
//! * other fields: `id: String, locale: String, where: <Where>`
//!
//! `<Where>` is an input type generated per field which allows filtering on each scalar field of
//! the return type through an _operator input_ (`GeneOperatorStringInput` and friends), and
//! `<Order>` is an enum with a `<field>_ASC` and `<field>_DESC` value for each scalar field.

use crate::{
    registry::{FieldLine, TypeDefLines, VarType},
    signature::{is_basic_type, return_type_name, BasicType},
    Error, Result,
};

pub const PAGE_ARG_DEFAULT: i64 = 1;
pub const PER_PAGE_ARG_DEFAULT: i64 = 10;

/// The logical connectives allowed in every where input.
pub const AND_OR_OPERATORS: [&str; 2] = ["and", "or"];

/// Suffixes of the values of a generated order enum.
pub const QUERY_ORDER_VALUES: [&str; 2] = ["ASC", "DESC"];

/// Add the default resolver's arguments to a field line.
pub fn populate_args_def(line: &mut FieldLine, graphql_type: &str, field: &str, is_list: bool) {
    let where_input = where_options_input_name(graphql_type, field);
    if is_list {
        line.add_argument("page", "Int");
        line.add_argument("perPage", "Int");
    } else {
        line.add_argument("id", "String");
    }
    line.add_argument("locale", "String");
    line.add_argument("where", &where_input);
    if is_list {
        let order_enum = query_order_enum_name(graphql_type, field);
        line.add_argument("order", &format!("[{order_enum}!]"));
    }
}

/// The name of the where input for `graphql_type.field`.
pub fn where_options_input_name(graphql_type: &str, field: &str) -> String {
    generate_graphql_type_name(graphql_type, field, "WhereOptions")
}

/// The name of the order enum for `graphql_type.field`.
pub fn query_order_enum_name(graphql_type: &str, field: &str) -> String {
    generate_graphql_type_name(graphql_type, field, "SelectOrder")
}

/// Build a derived type name from a type, a field and a suffix.
///
/// Each part has its first letter capitalized, and the parts are joined in the order type, suffix,
/// field. So `("Order", "items", "WhereOptions")` becomes `OrderWhereOptionsItems`.
pub fn generate_graphql_type_name(graphql_type: &str, field: &str, suffix: &str) -> String {
    [graphql_type, suffix, field]
        .into_iter()
        .map(capitalize)
        .collect()
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The name of the operator input for comparing values of type `ty`.
pub fn operator_input_name(ty: BasicType) -> String {
    format!("GeneOperator{ty}Input")
}

/// Generate the operator input for comparing values of type `ty`.
pub fn populate_operator_input(type_defs: &mut TypeDefLines, ty: BasicType) -> String {
    let name = operator_input_name(ty);
    if type_defs.contains(&name) {
        return name;
    }

    let input = type_defs.ensure_type_of(&name, VarType::Input);
    let mut operators = vec![
        ("eq", ty.to_string()),
        ("ne", ty.to_string()),
        ("in", format!("[{ty}]")),
        ("notIn", format!("[{ty}]")),
        ("null", "Boolean".to_string()),
    ];
    if ty.supports_like() {
        operators.push(("like", ty.to_string()));
        operators.push(("notLike", ty.to_string()));
    }
    if ty.supports_range() {
        for op in ["lt", "lte", "gt", "gte"] {
            operators.push((op, ty.to_string()));
        }
    }
    for (op, type_def) in operators {
        input.ensure_field(op).type_def = type_def;
    }
    name
}

/// The filterable scalar behind a field signature, if there is one.
fn filterable_type(signature: &str) -> Option<BasicType> {
    BasicType::from_name(return_type_name(signature)).filter(|ty| ty.is_filterable())
}

/// Generate the where input and order enum for `graphql_type.field`, whose return type is named
/// `field_type`.
///
/// The order enum is only generated for list fields. Generation is skipped when the derived types
/// already exist, so the first field to request a given pair of names defines them.
///
/// # Errors
///
/// Fails if `field_type` is neither a basic scalar nor a type already present in `type_defs`.
pub fn generate_filter_type_defs(
    type_defs: &mut TypeDefLines,
    graphql_type: &str,
    field: &str,
    field_type: &str,
    is_list: bool,
) -> Result<()> {
    let where_input = where_options_input_name(graphql_type, field);
    let order_enum = query_order_enum_name(graphql_type, field);

    if type_defs.has_lines(&where_input) && (!is_list || type_defs.has_lines(&order_enum)) {
        return Ok(());
    }

    for op in AND_OR_OPERATORS {
        type_defs
            .ensure_type_of(&where_input, VarType::Input)
            .ensure_field(op)
            .type_def = format!("[{where_input}!]");
    }
    if is_list {
        type_defs.ensure_type_of(&order_enum, VarType::Enum);
    }

    if is_basic_type(field_type) {
        return Ok(());
    }
    let target = type_defs
        .get(field_type)
        .ok_or_else(|| Error::UndefinedReturnType {
            type_name: field_type.to_string(),
        })?
        .lines
        .iter()
        .map(|(name, line)| (name.clone(), line.type_def.clone()))
        .collect::<Vec<_>>();

    for (name, type_def) in target {
        // Fields pointing at another type are filtered by that type's `id`.
        let filterable = filterable_type(&type_def).or_else(|| {
            let id = type_defs
                .get(return_type_name(&type_def))?
                .lines
                .get("id")?;
            filterable_type(&id.type_def)
        });

        match filterable {
            Some(ty) => {
                let operator_input = populate_operator_input(type_defs, ty);
                type_defs.ensure_field(&where_input, &name).type_def = operator_input;
            }
            None => {
                type_defs.remove_field(&where_input, &name);
            }
        }

        let is_scalar = !type_def.starts_with('[') && is_basic_type(return_type_name(&type_def));
        if is_list && is_scalar {
            for order in QUERY_ORDER_VALUES {
                type_defs
                    .ensure_type(&order_enum)
                    .ensure_field(&format!("{name}_{order}"));
            }
        }
    }

    Ok(())
}
