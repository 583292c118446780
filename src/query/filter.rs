//! CQL2-JSON filter expressions.
//!
//! Builds the JSON shape used by the STAC API filter extension:
//!
//! ```json
//! {"op": "=", "args": [{"property": "properties.cmip6:variable_id"}, "tas"]}
//! ```
//!
//! Only the operators the conformance scenarios need are modelled. Anything
//! else is rejected by [`Filter::from_cql2_json`] with
//! [`StacError::InvalidFilter`].

use crate::error::{Result, StacError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }

    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "=" | "eq" => CompareOp::Eq,
            "<>" | "!=" | "neq" => CompareOp::NotEq,
            "<" | "lt" => CompareOp::Lt,
            "<=" | "lte" => CompareOp::Lte,
            ">" | "gt" => CompareOp::Gt,
            ">=" | "gte" => CompareOp::Gte,
            _ => return None,
        })
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        op: CompareOp,
        property: String,
        value: Value,
    },
    In {
        property: String,
        values: Vec<Value>,
    },
    /// `t_intersects` against an ISO 8601 interval literal such as
    /// `"1850-01-01/2020-01-01"`.
    TIntersects {
        property: String,
        interval: String,
    },
    Not(Box<Filter>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Compare {
            op: CompareOp::Eq,
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn compare(op: CompareOp, property: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Compare {
            op,
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(
        property: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::In {
            property: property.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn t_intersects(property: impl Into<String>, interval: impl Into<String>) -> Self {
        Filter::TIntersects {
            property: property.into(),
            interval: interval.into(),
        }
    }

    pub fn to_cql2_json(&self) -> Value {
        match self {
            Filter::Compare {
                op,
                property,
                value,
            } => json!({"op": op.as_str(), "args": [{"property": property}, value]}),
            Filter::In { property, values } => {
                json!({"op": "in", "args": [{"property": property}, values]})
            }
            Filter::TIntersects { property, interval } => {
                json!({"op": "t_intersects", "args": [{"property": property}, interval]})
            }
            Filter::Not(inner) => json!({"op": "not", "args": [inner.to_cql2_json()]}),
            Filter::And(parts) => json!({
                "op": "and",
                "args": parts.iter().map(Filter::to_cql2_json).collect::<Vec<_>>()
            }),
            Filter::Or(parts) => json!({
                "op": "or",
                "args": parts.iter().map(Filter::to_cql2_json).collect::<Vec<_>>()
            }),
        }
    }

    /// Parse a CQL2-JSON expression.
    ///
    /// # Errors
    /// Returns [`StacError::InvalidFilter`] for unknown operators, wrong arity
    /// or a missing `{"property": ...}` operand.
    pub fn from_cql2_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| invalid(format!("expected an object, got {}", value)))?;
        let op = obj
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("missing 'op'"))?
            .to_ascii_lowercase();
        let args = obj
            .get("args")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid(format!("'{}' is missing 'args'", op)))?;

        match op.as_str() {
            "and" | "or" => {
                if args.is_empty() {
                    return Err(invalid(format!("'{}' needs at least one argument", op)));
                }
                let parts = args
                    .iter()
                    .map(Filter::from_cql2_json)
                    .collect::<Result<Vec<_>>>()?;
                Ok(if op == "and" {
                    Filter::And(parts)
                } else {
                    Filter::Or(parts)
                })
            }
            "not" => match args.as_slice() {
                [inner] => Ok(Filter::Not(Box::new(Filter::from_cql2_json(inner)?))),
                _ => Err(invalid("'not' takes exactly one argument")),
            },
            "in" => {
                let (property, list) = binary_args(&op, args)?;
                let values = list
                    .as_array()
                    .ok_or_else(|| invalid("'in' expects a list as second argument"))?
                    .clone();
                Ok(Filter::In { property, values })
            }
            "t_intersects" => {
                let (property, interval) = binary_args(&op, args)?;
                let interval = interval
                    .as_str()
                    .ok_or_else(|| invalid("'t_intersects' expects an interval string"))?
                    .to_string();
                Ok(Filter::TIntersects { property, interval })
            }
            other => {
                let cmp = CompareOp::parse(other)
                    .ok_or_else(|| invalid(format!("unsupported operator '{}'", other)))?;
                let (property, value) = binary_args(&op, args)?;
                Ok(Filter::Compare {
                    op: cmp,
                    property,
                    value: value.clone(),
                })
            }
        }
    }
}

fn invalid(msg: impl Into<String>) -> StacError {
    StacError::InvalidFilter(msg.into())
}

fn binary_args<'a>(op: &str, args: &'a [Value]) -> Result<(String, &'a Value)> {
    match args {
        [lhs, rhs] => {
            let property = lhs
                .get("property")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(format!("'{}' expects a property as first argument", op)))?;
            Ok((property.to_string(), rhs))
        }
        _ => Err(invalid(format!("'{}' takes exactly two arguments", op))),
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_cql2_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Filter::from_cql2_json(&value).map_err(serde::de::Error::custom)
    }
}
