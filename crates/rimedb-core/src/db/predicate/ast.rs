use crate::value::Value;
use serde::{Deserialize, Serialize};

///
/// Predicate IR
///
/// Validated, lowered form of a filter. Every backend renderer and the
/// in-memory evaluator consume this shape; none of them see `FilterExpr`.
///
/// `V` is the literal slot. Relational rendering keeps `Value`s and
/// extracts them into positional parameters; the document dialect stores
/// `ParamRef`s into the command's parameter list.
///

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    #[must_use]
    pub const fn sql_symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

///
/// TextOp
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TextOp {
    Contains,
    StartsWith,
    EndsWith,
}

impl TextOp {
    #[must_use]
    pub fn matches(self, haystack: &str, needle: &str) -> bool {
        match self {
            Self::Contains => haystack.contains(needle),
            Self::StartsWith => haystack.starts_with(needle),
            Self::EndsWith => haystack.ends_with(needle),
        }
    }
}

///
/// ParamRef
/// Index into a command's parameter list.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ParamRef(pub usize);

///
/// Predicate
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Predicate<V = Value> {
    True,
    False,
    Compare { field: String, op: CompareOp, value: V },
    Text { field: String, op: TextOp, value: V },
    In { field: String, values: Vec<V> },
    NotIn { field: String, values: Vec<V> },
    IsNull { field: String },
    IsNotNull { field: String },
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
}

impl<V> Predicate<V> {
    /// Conjunction with neutral-element removal and flattening.
    /// `AND []` is `True`.
    #[must_use]
    pub fn and_of(children: Vec<Self>) -> Self {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Self::True => {}
                Self::False => return Self::False,
                Self::And(grandchildren) => flat.extend(grandchildren),
                other => flat.push(other),
            }
        }

        match flat.len() {
            0 => Self::True,
            1 => flat.pop().unwrap_or(Self::True),
            _ => Self::And(flat),
        }
    }

    /// Disjunction with neutral-element removal and flattening.
    /// `OR []` is `False`: zero alternatives match nothing.
    #[must_use]
    pub fn or_of(children: Vec<Self>) -> Self {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Self::False => {}
                Self::True => return Self::True,
                Self::Or(grandchildren) => flat.extend(grandchildren),
                other => flat.push(other),
            }
        }

        match flat.len() {
            0 => Self::False,
            1 => flat.pop().unwrap_or(Self::False),
            _ => Self::Or(flat),
        }
    }

    /// Negation; constants fold and double negation cancels, both of which
    /// hold under three-valued logic.
    #[must_use]
    pub fn not_of(inner: Self) -> Self {
        match inner {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    #[must_use]
    pub const fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    #[must_use]
    pub const fn is_compound(&self) -> bool {
        matches!(self, Self::And(_) | Self::Or(_))
    }

    /// Rewrite every literal slot in pre-order, left to right. This is the
    /// same order the relational renderer emits placeholders in.
    pub fn map_values<W>(self, f: &mut impl FnMut(V) -> W) -> Predicate<W> {
        match self {
            Self::True => Predicate::True,
            Self::False => Predicate::False,
            Self::Compare { field, op, value } => Predicate::Compare {
                field,
                op,
                value: f(value),
            },
            Self::Text { field, op, value } => Predicate::Text {
                field,
                op,
                value: f(value),
            },
            Self::In { field, values } => Predicate::In {
                field,
                values: values.into_iter().map(&mut *f).collect(),
            },
            Self::NotIn { field, values } => Predicate::NotIn {
                field,
                values: values.into_iter().map(&mut *f).collect(),
            },
            Self::IsNull { field } => Predicate::IsNull { field },
            Self::IsNotNull { field } => Predicate::IsNotNull { field },
            Self::And(children) => Predicate::And(
                children
                    .into_iter()
                    .map(|child| child.map_values(f))
                    .collect(),
            ),
            Self::Or(children) => Predicate::Or(
                children
                    .into_iter()
                    .map(|child| child.map_values(f))
                    .collect(),
            ),
            Self::Not(inner) => Predicate::Not(Box::new(inner.map_values(f))),
        }
    }
}
