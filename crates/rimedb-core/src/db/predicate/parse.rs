//! Module: predicate::parse
//! Responsibility: accept JSON-shaped filters from untyped callers.
//! Boundary: rejects unknown operator keys; performs no schema checks.

use crate::{
    db::predicate::expr::{FieldFilter, FilterExpr, FilterNode, FilterOp},
    error::CompileError,
    value::Value,
};
use serde_json::{Map, Value as JsonValue};

impl FilterExpr {
    /// Parse `{ field: value | {op: value}, AND: [..], OR: [..], NOT: {..} }`.
    ///
    /// Key order is preserved. Unknown operators inside an operator map are
    /// a compile error, never skipped.
    pub fn from_json(json: &JsonValue) -> Result<Self, CompileError> {
        let JsonValue::Object(map) = json else {
            return Err(CompileError::malformed(format!(
                "filter must be an object, found {}",
                json_kind(json)
            )));
        };

        parse_level(map)
    }
}

fn parse_level(map: &Map<String, JsonValue>) -> Result<FilterExpr, CompileError> {
    let mut nodes = Vec::with_capacity(map.len());

    for (key, value) in map {
        let node = match key.as_str() {
            "AND" => FilterNode::And(parse_list("AND", value, true)?),
            "OR" => FilterNode::Or(parse_list("OR", value, false)?),
            "NOT" => match value {
                JsonValue::Object(inner) => FilterNode::Not(Box::new(parse_level(inner)?)),
                other => {
                    return Err(CompileError::malformed(format!(
                        "NOT expects exactly one filter object, found {}",
                        json_kind(other)
                    )));
                }
            },
            field => FilterNode::Field {
                field: field.to_string(),
                filter: parse_field(field, value)?,
            },
        };
        nodes.push(node);
    }

    FilterExpr::from_nodes(nodes)
}

// AND also accepts a single object as shorthand for a one-element list.
fn parse_list(
    combinator: &str,
    value: &JsonValue,
    allow_single: bool,
) -> Result<Vec<FilterExpr>, CompileError> {
    match value {
        JsonValue::Array(items) => items
            .iter()
            .map(|item| match item {
                JsonValue::Object(map) => parse_level(map),
                other => Err(CompileError::malformed(format!(
                    "{combinator} entries must be filter objects, found {}",
                    json_kind(other)
                ))),
            })
            .collect(),
        JsonValue::Object(map) if allow_single => Ok(vec![parse_level(map)?]),
        other => Err(CompileError::malformed(format!(
            "{combinator} expects a list of filters, found {}",
            json_kind(other)
        ))),
    }
}

fn parse_field(field: &str, value: &JsonValue) -> Result<FieldFilter, CompileError> {
    let JsonValue::Object(ops) = value else {
        return Ok(FieldFilter::Value(Value::from(value.clone())));
    };

    ops.iter()
        .map(|(key, operand)| {
            let op = FilterOp::from_key(key).ok_or_else(|| CompileError::InvalidOperator {
                field: field.to_string(),
                operator: key.clone(),
            })?;

            Ok((op, Value::from(operand.clone())))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(FieldFilter::Ops)
}

const fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
