use crate::{
    db::predicate::ast::{CompareOp, Predicate},
    value::{Row, Value, compare_eq, compare_order},
};
use std::cmp::Ordering;

///
/// FieldSource
///
/// Abstraction over a row-like value that can expose fields by name.
/// A missing field reads as NULL.
///

pub trait FieldSource {
    fn field(&self, name: &str) -> Option<&Value>;
}

impl FieldSource for Row {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

///
/// Truth
///
/// SQL three-valued logic. `Unknown` arises from any comparison involving
/// NULL and propagates through AND/OR/NOT the way a relational backend
/// does, so the in-memory adapter and SQL backends agree on every filter.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    const fn from_bool(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }

    const fn from_option(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::True,
            Some(false) => Self::False,
            None => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn is_true(self) -> bool {
        matches!(self, Self::True)
    }

    const fn negate(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }
}

/// Evaluate a value-carrying predicate. A row matches only when the
/// predicate is definitely true.
#[must_use]
pub fn eval_row<R: FieldSource + ?Sized>(row: &R, predicate: &Predicate) -> bool {
    eval_with(row, predicate, &|value: &Value| value).is_true()
}

///
/// Evaluate any predicate, resolving literal slots through `resolve`.
///
/// The document dialect stores parameter references instead of values;
/// its executor passes a resolver that indexes the command parameters.
///
pub fn eval_with<'p, R, V, F>(row: &R, predicate: &'p Predicate<V>, resolve: &F) -> Truth
where
    R: FieldSource + ?Sized,
    F: Fn(&'p V) -> &'p Value,
{
    match predicate {
        Predicate::True => Truth::True,
        Predicate::False => Truth::False,

        Predicate::Compare { field, op, value } => {
            let actual = read(row, field);
            Truth::from_option(compare(actual, *op, resolve(value)))
        }

        Predicate::Text { field, op, value } => {
            let actual = read(row, field);
            if actual.is_nullish() {
                return Truth::Unknown;
            }
            match (actual.as_text(), resolve(value).as_text()) {
                (Some(haystack), Some(needle)) => Truth::from_bool(op.matches(haystack, needle)),
                _ => Truth::False,
            }
        }

        Predicate::In { field, values } => {
            membership(read(row, field), values.iter().map(|v| resolve(v)))
        }
        Predicate::NotIn { field, values } => {
            membership(read(row, field), values.iter().map(|v| resolve(v))).negate()
        }

        Predicate::IsNull { field } => Truth::from_bool(read(row, field).is_nullish()),
        Predicate::IsNotNull { field } => Truth::from_bool(!read(row, field).is_nullish()),

        Predicate::And(children) => {
            let mut result = Truth::True;
            for child in children {
                match eval_with(row, child, resolve) {
                    Truth::False => return Truth::False,
                    Truth::Unknown => result = Truth::Unknown,
                    Truth::True => {}
                }
            }
            result
        }
        Predicate::Or(children) => {
            let mut result = Truth::False;
            for child in children {
                match eval_with(row, child, resolve) {
                    Truth::True => return Truth::True,
                    Truth::Unknown => result = Truth::Unknown,
                    Truth::False => {}
                }
            }
            result
        }
        Predicate::Not(inner) => eval_with(row, inner, resolve).negate(),
    }
}

fn read<'r, R: FieldSource + ?Sized>(row: &'r R, field: &str) -> &'r Value {
    const NULL: &Value = &Value::Null;
    row.field(field).unwrap_or(NULL)
}

fn compare(actual: &Value, op: CompareOp, expected: &Value) -> Option<bool> {
    match op {
        CompareOp::Eq => compare_eq(actual, expected),
        CompareOp::Ne => compare_eq(actual, expected).map(|eq| !eq),
        CompareOp::Gt => compare_order(actual, expected).map(|o| o == Ordering::Greater),
        CompareOp::Gte => compare_order(actual, expected).map(|o| o != Ordering::Less),
        CompareOp::Lt => compare_order(actual, expected).map(|o| o == Ordering::Less),
        CompareOp::Lte => compare_order(actual, expected).map(|o| o != Ordering::Greater),
    }
}

// `x IN (a, b)` is `x = a OR x = b`; a NULL `x` is unknown, an empty list false.
fn membership<'v>(actual: &Value, candidates: impl Iterator<Item = &'v Value>) -> Truth {
    let mut result = Truth::False;
    for candidate in candidates {
        match compare_eq(actual, candidate) {
            Some(true) => return Truth::True,
            Some(false) => {}
            None => result = Truth::Unknown,
        }
    }
    result
}
