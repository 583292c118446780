//! Query extension expressions.
//!
//! Accepts the compact string form `"<property><op><value>"` (for example
//! `"start_datetime>1850-01-01"`) and turns a list of them into the STAC API
//! query extension object:
//!
//! ```json
//! {"start_datetime": {"gt": "1850-01-01"}}
//! ```
//!
//! Values that parse as JSON keep their JSON type; everything else is sent as
//! a string.

use crate::error::{Result, StacError};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::multispace0,
    combinator::rest,
    sequence::{delimited, tuple},
    IResult,
};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct QueryExpr {
    pub property: String,
    pub op: &'static str,
    pub value: Value,
}

fn is_property_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '.' | '-')
}

fn property(input: &str) -> IResult<&str, &str> {
    take_while1(is_property_char)(input)
}

fn operator(input: &str) -> IResult<&str, &'static str> {
    let (input, op) = alt((
        tag(">="),
        tag("<="),
        tag("<>"),
        tag(">"),
        tag("<"),
        tag("="),
    ))(input)?;
    let name = match op {
        ">=" => "gte",
        "<=" => "lte",
        "<>" => "neq",
        ">" => "gt",
        "<" => "lt",
        _ => "eq",
    };
    Ok((input, name))
}

fn expression(input: &str) -> IResult<&str, (&str, &'static str, &str)> {
    tuple((
        delimited(multispace0, property, multispace0),
        operator,
        delimited(multispace0, rest, multispace0),
    ))(input)
}

/// Parse one `"<property><op><value>"` expression.
///
/// # Errors
/// Returns [`StacError::InvalidQuery`] if there is no recognised operator or
/// the value is empty.
pub fn parse_query_expr(input: &str) -> Result<QueryExpr> {
    let (_, (prop, op, raw)) = expression(input)
        .map_err(|e| StacError::InvalidQuery(format!("'{}': {}", input, e)))?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(StacError::InvalidQuery(format!("'{}': missing value", input)));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok(QueryExpr {
        property: prop.to_string(),
        op,
        value,
    })
}

/// Build the query extension object from a list of expressions. Several
/// expressions on the same property are merged into one operator map.
pub fn build_query<S: AsRef<str>>(exprs: &[S]) -> Result<Value> {
    let mut out = Map::new();
    for expr in exprs {
        let parsed = parse_query_expr(expr.as_ref())?;
        let entry = out
            .entry(parsed.property)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(ops) = entry {
            ops.insert(parsed.op.to_string(), parsed.value);
        }
    }
    Ok(Value::Object(out))
}
