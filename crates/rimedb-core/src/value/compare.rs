//! Module: value::compare
//! Responsibility: comparison semantics shared by predicate evaluation and ordering.
//! Boundary: mirrors SQL behavior; any comparison involving NULL is unknown.

use crate::value::{Row, Value};
use std::cmp::Ordering;

/// Equality under SQL semantics.
///
/// Returns `None` when either side is null (unknown). Int and Float compare
/// numerically; values of unrelated kinds are unequal.
#[must_use]
pub fn compare_eq(left: &Value, right: &Value) -> Option<bool> {
    if left.is_nullish() || right.is_nullish() {
        return None;
    }

    let equal = match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (a, b) if a.is_numeric() && b.is_numeric() => {
            numeric_cmp(a, b).is_some_and(Ordering::is_eq)
        }
        (Value::List(a), Value::List(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => a == b,
        _ => false,
    };

    Some(equal)
}

/// Ordering under SQL semantics.
///
/// Returns `None` for null operands or for kinds that have no ordering
/// relationship with each other.
#[must_use]
pub fn compare_order(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_nullish() || right.is_nullish() {
        return None;
    }

    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (a, b) if a.is_numeric() && b.is_numeric() => numeric_cmp(a, b),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Total order used for ORDER BY and group keys.
///
/// Nulls sort first; unrelated kinds fall back to a fixed rank so the
/// result is deterministic.
#[must_use]
pub fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    if let Some(ordering) = compare_order(left, right) {
        return ordering;
    }

    match (left, right) {
        (Value::List(a), Value::List(b)) => list_cmp(a, b),
        (Value::Object(a), Value::Object(b)) => row_cmp(a, b),
        _ => rank(left).cmp(&rank(right)),
    }
}

fn numeric_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    let (a, b) = (left.as_f64()?, right.as_f64()?);

    a.partial_cmp(&b)
}

fn list_cmp(left: &[Value], right: &[Value]) -> Ordering {
    for (a, b) in left.iter().zip(right) {
        let ordering = canonical_cmp(a, b);
        if ordering.is_ne() {
            return ordering;
        }
    }

    left.len().cmp(&right.len())
}

fn row_cmp(left: &Row, right: &Row) -> Ordering {
    for ((ka, va), (kb, vb)) in left.iter().zip(right.iter()) {
        let ordering = ka.cmp(kb).then_with(|| canonical_cmp(va, vb));
        if ordering.is_ne() {
            return ordering;
        }
    }

    left.len().cmp(&right.len())
}

const fn rank(value: &Value) -> u8 {
    match value {
        Value::Absent | Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::Text(_) => 3,
        Value::List(_) => 4,
        Value::Object(_) => 5,
    }
}
