//! The generic `where` and `order` argument model of default resolvers.
//!
//! Default-resolved fields accept a `where` argument shaped by the generated where inputs:
//!
//! ```graphql
//! { status: { in: ["PAID", "PENDING"] }, or: [{ total: { gt: 100 } }, { paid: { eq: true } }] }
//! ```
//!
//! and an `order` argument listing `<field>_ASC` or `<field>_DESC` values. Data plugins parse these
//! into a [`Condition`] tree and a list of [`OrderBy`] clauses, then either translate them into
//! their native query language or evaluate them directly, as the in-memory plugin does.

use async_graphql::Value;
use derive_more::Display;
use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// A comparison operator of a generated operator input.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Operator {
    #[display(fmt = "eq")]
    Eq,
    #[display(fmt = "ne")]
    Ne,
    #[display(fmt = "in")]
    In,
    #[display(fmt = "notIn")]
    NotIn,
    #[display(fmt = "null")]
    Null,
    #[display(fmt = "like")]
    Like,
    #[display(fmt = "notLike")]
    NotLike,
    #[display(fmt = "lt")]
    Lt,
    #[display(fmt = "lte")]
    Lte,
    #[display(fmt = "gt")]
    Gt,
    #[display(fmt = "gte")]
    Gte,
}

impl Operator {
    pub const ALL: [Operator; 11] = [
        Self::Eq,
        Self::Ne,
        Self::In,
        Self::NotIn,
        Self::Null,
        Self::Like,
        Self::NotLike,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.to_string() == name)
    }

    /// Whether `value` satisfies this operator applied to `operand`.
    ///
    /// A null operand places no constraint on the value, except for [`Operator::Null`], where it is
    /// treated as `false`. List values (the ids of an association, for example) satisfy the
    /// positive operators if any of their elements does.
    pub fn test(self, value: &Value, operand: &Value) -> async_graphql::Result<bool> {
        if self == Self::Null {
            let want_null = matches!(operand, Value::Boolean(true));
            return Ok(matches!(value, Value::Null) == want_null);
        }
        if matches!(operand, Value::Null) {
            return Ok(true);
        }
        match self {
            Self::Ne => return Ok(!Self::Eq.test(value, operand)?),
            Self::NotIn => return Ok(!Self::In.test(value, operand)?),
            Self::NotLike => return Ok(!Self::Like.test(value, operand)?),
            _ => {}
        }
        if let Value::List(items) = value {
            for item in items {
                if self.test(item, operand)? {
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        Ok(match self {
            Self::Eq => loose_eq(value, operand),
            Self::In => match operand {
                Value::List(candidates) => candidates.iter().any(|c| loose_eq(value, c)),
                single => loose_eq(value, single),
            },
            Self::Like => match (as_str(value), as_str(operand)) {
                (Some(value), Some(pattern)) => like_pattern(pattern)?.is_match(value),
                _ => false,
            },
            Self::Lt => ordering(value, operand) == Some(Ordering::Less),
            Self::Lte => matches!(
                ordering(value, operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Gt => ordering(value, operand) == Some(Ordering::Greater),
            Self::Gte => matches!(
                ordering(value, operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Ne | Self::NotIn | Self::NotLike | Self::Null => unreachable!(),
        })
    }
}

fn as_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Enum(name) => Some(name.as_str()),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Equality which treats numbers and numeric strings (ids, for example) alike.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Number(_), _) | (_, Value::Number(_)) => match (as_f64(a), as_f64(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        _ => match (as_str(a), as_str(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn ordering(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        (Value::Number(_), _) | (_, Value::Number(_)) => as_f64(a)?.partial_cmp(&as_f64(b)?),
        _ => Some(as_str(a)?.cmp(as_str(b)?)),
    }
}

/// Compile an SQL `LIKE` pattern into a case-insensitive regex.
///
/// `%` matches any sequence of characters and `_` any single character.
fn like_pattern(pattern: &str) -> async_graphql::Result<Regex> {
    let mut re = String::from("(?is)^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|err| format!("Invalid like pattern \"{pattern}\": {err}").into())
}

/// Total order on values used for sorting. Nulls come first, incomparable values are equal.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => ordering(a, b).unwrap_or(Ordering::Equal),
    }
}

/// A parsed `where` argument.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Field {
        field: String,
        operator: Operator,
        operand: Value,
    },
}

impl Default for Condition {
    fn default() -> Self {
        Self::And(vec![])
    }
}

impl Condition {
    /// Parse a `where` argument. A null argument matches everything.
    pub fn parse(value: &Value) -> async_graphql::Result<Self> {
        let fields = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(fields) => fields,
            _ => return Err("Invalid where value.".into()),
        };

        let mut conditions = vec![];
        for (key, value) in fields {
            match key.as_str() {
                "and" => conditions.push(Self::And(Self::parse_list(value)?)),
                "or" => conditions.push(Self::Or(Self::parse_list(value)?)),
                field => {
                    let operators = match value {
                        Value::Null => continue,
                        Value::Object(operators) => operators,
                        _ => return Err("Invalid where value.".into()),
                    };
                    for (op, operand) in operators {
                        let operator = Operator::from_name(op)
                            .ok_or_else(|| format!("Unknown operator \"{op}\"."))?;
                        conditions.push(Self::Field {
                            field: field.to_string(),
                            operator,
                            operand: operand.clone(),
                        });
                    }
                }
            }
        }
        Ok(if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Self::And(conditions)
        })
    }

    fn parse_list(value: &Value) -> async_graphql::Result<Vec<Self>> {
        match value {
            Value::Null => Ok(vec![]),
            Value::List(items) => items.iter().map(Self::parse).collect(),
            single => Ok(vec![Self::parse(single)?]),
        }
    }

    /// Evaluate the condition against a record, given a function looking up its fields.
    ///
    /// An empty `or` matches nothing, an empty `and` matches everything.
    pub fn matches(&self, lookup: &impl Fn(&str) -> Value) -> async_graphql::Result<bool> {
        match self {
            Self::And(conditions) => {
                for condition in conditions {
                    if !condition.matches(lookup)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(conditions) => {
                for condition in conditions {
                    if condition.matches(lookup)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Field {
                field,
                operator,
                operand,
            } => operator.test(&lookup(field), operand),
        }
    }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Direction {
    #[display(fmt = "ASC")]
    Asc,
    #[display(fmt = "DESC")]
    Desc,
}

/// One clause of an `order` argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn parse(value: &Value) -> async_graphql::Result<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new("^(.+)_(ASC|DESC)$").expect("order pattern is a valid regex")
        });

        let caps = as_str(value)
            .and_then(|name| pattern.captures(name))
            .ok_or("Invalid order value.")?;
        Ok(Self {
            field: caps[1].to_string(),
            direction: if &caps[2] == "ASC" {
                Direction::Asc
            } else {
                Direction::Desc
            },
        })
    }

    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let ord = compare(a, b);
        match self.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }
}

/// Parse an `order` argument into its clauses, most significant first.
pub fn parse_order(value: &Value) -> async_graphql::Result<Vec<OrderBy>> {
    match value {
        Value::Null => Ok(vec![]),
        Value::List(items) => items.iter().map(OrderBy::parse).collect(),
        single => Ok(vec![OrderBy::parse(single)?]),
    }
}

/// Stable-sort `items` by `orders`, given a function looking up a field of an item.
pub fn sort_by<T>(items: &mut [T], orders: &[OrderBy], lookup: impl Fn(&T, &str) -> Value) {
    if orders.is_empty() {
        return;
    }
    items.sort_by(|a, b| {
        orders
            .iter()
            .map(|order| order.compare(&lookup(a, &order.field), &lookup(b, &order.field)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}
