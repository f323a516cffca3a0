//! Module: predicate::expr
//! Responsibility: caller-facing filter expression tree and its builder.
//! Does not own: validation, lowering, or rendering.

use crate::{error::CompileError, value::Value};
use std::fmt;

///
/// FilterOp
///
/// Closed operator set accepted inside a field-operator map.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[remain::sorted]
pub enum FilterOp {
    Contains,
    EndsWith,
    Equals,
    Gt,
    Gte,
    In,
    Lt,
    Lte,
    Not,
    NotIn,
    StartsWith,
}

impl FilterOp {
    pub const ALL: [Self; 11] = [
        Self::Equals,
        Self::Not,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Contains,
        Self::StartsWith,
        Self::EndsWith,
        Self::In,
        Self::NotIn,
    ];

    /// Key used in the JSON-shaped filter surface.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::EndsWith => "endsWith",
            Self::Equals => "equals",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::In => "in",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Not => "not",
            Self::NotIn => "notIn",
            Self::StartsWith => "startsWith",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.key() == key)
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

///
/// FieldFilter
///
/// Condition on one field: either a direct value (`field: value`) or an
/// operator map (`field: { op: value, .. }`) whose entries are ANDed.
///

#[derive(Clone, Debug, PartialEq)]
pub enum FieldFilter {
    Value(Value),
    Ops(Vec<(FilterOp, Value)>),
}

///
/// FilterNode
///
/// One entry at a filter level, in caller key order.
///

#[derive(Clone, Debug, PartialEq)]
pub enum FilterNode {
    Field { field: String, filter: FieldFilter },
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
}

impl FilterNode {
    const fn combinator_key(&self) -> Option<&'static str> {
        match self {
            Self::Field { .. } => None,
            Self::And(_) => Some("AND"),
            Self::Or(_) => Some("OR"),
            Self::Not(_) => Some("NOT"),
        }
    }
}

///
/// FilterExpr
///
/// One filter level: an ordered sequence of field conditions and at most
/// one of each logical combinator. The level's predicate is the conjunction
/// of every entry.
///
/// The empty expression matches every row.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterExpr {
    nodes: Vec<FilterNode>,
}

impl FilterExpr {
    #[must_use]
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Build a level from raw nodes, enforcing one combinator of each kind.
    pub fn from_nodes(nodes: Vec<FilterNode>) -> Result<Self, CompileError> {
        let mut seen: Vec<&'static str> = Vec::new();
        for key in nodes.iter().filter_map(FilterNode::combinator_key) {
            if seen.contains(&key) {
                return Err(CompileError::DuplicateCombinator {
                    combinator: key.to_string(),
                });
            }
            seen.push(key);
        }

        Ok(Self { nodes })
    }

    #[must_use]
    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // --- Combinator constructors ---

    /// `{ AND: [..] }`
    #[must_use]
    pub fn all(exprs: impl IntoIterator<Item = Self>) -> Self {
        Self::new().and(exprs)
    }

    /// `{ OR: [..] }`
    #[must_use]
    pub fn any(exprs: impl IntoIterator<Item = Self>) -> Self {
        Self::new().or(exprs)
    }

    /// `{ NOT: expr }`
    #[must_use]
    pub fn negate(expr: Self) -> Self {
        Self::new().not(expr)
    }

    /// Conjoin two complete expressions; an empty side is dropped.
    ///
    /// Field conditions of both sides stay at the top level. Combinators
    /// that collide, together with any `AND` already present, move into a
    /// single `AND` list, so unique equalities remain visible after a
    /// rewriter narrows the filter.
    #[must_use]
    pub fn and_where(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }

        let colliding: Vec<&'static str> = other
            .nodes
            .iter()
            .filter_map(FilterNode::combinator_key)
            .filter(|key| {
                self.nodes
                    .iter()
                    .any(|node| node.combinator_key() == Some(*key))
            })
            .collect();
        if colliding.is_empty() {
            let mut nodes = self.nodes;
            nodes.extend(other.nodes);
            return Self { nodes };
        }

        let mut nodes = Vec::new();
        let mut conjuncts = Vec::new();
        for node in self.nodes.into_iter().chain(other.nodes) {
            match node {
                FilterNode::And(children) => conjuncts.extend(children),
                node if node
                    .combinator_key()
                    .is_some_and(|key| colliding.contains(&key)) =>
                {
                    conjuncts.push(Self { nodes: vec![node] });
                }
                node => nodes.push(node),
            }
        }
        nodes.push(FilterNode::And(conjuncts));

        Self { nodes }
    }

    // --- Field conditions ---

    /// Direct equality, `field: value`. A null value tests `IS NULL`.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.nodes.push(FilterNode::Field {
            field: field.into(),
            filter: FieldFilter::Value(value.into()),
        });
        self
    }

    #[must_use]
    pub fn is_null(self, field: impl Into<String>) -> Self {
        self.eq(field, Value::Null)
    }

    #[must_use]
    pub fn is_not_null(self, field: impl Into<String>) -> Self {
        self.op(field, FilterOp::Not, Value::Null)
    }

    /// Add an operator to the field's operator map, creating it if needed.
    #[must_use]
    pub fn op(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();

        let existing = self.nodes.iter_mut().find_map(|node| match node {
            FilterNode::Field {
                field: name,
                filter: FieldFilter::Ops(ops),
            } if *name == field => Some(ops),
            _ => None,
        });

        match existing {
            Some(ops) => ops.push((op, value)),
            None => self.nodes.push(FilterNode::Field {
                field,
                filter: FieldFilter::Ops(vec![(op, value)]),
            }),
        }
        self
    }

    #[must_use]
    pub fn equals(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, FilterOp::Equals, value)
    }

    #[must_use]
    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, FilterOp::Not, value)
    }

    #[must_use]
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, FilterOp::Gt, value)
    }

    #[must_use]
    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, FilterOp::Gte, value)
    }

    #[must_use]
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, FilterOp::Lt, value)
    }

    #[must_use]
    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, FilterOp::Lte, value)
    }

    #[must_use]
    pub fn contains(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, FilterOp::Contains, value)
    }

    #[must_use]
    pub fn starts_with(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, FilterOp::StartsWith, value)
    }

    #[must_use]
    pub fn ends_with(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, FilterOp::EndsWith, value)
    }

    #[must_use]
    pub fn in_list<I>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.op(field, FilterOp::In, Value::List(values))
    }

    #[must_use]
    pub fn not_in_list<I>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.op(field, FilterOp::NotIn, Value::List(values))
    }

    // --- Combinators on this level ---

    /// Append to this level's AND list.
    #[must_use]
    pub fn and(mut self, exprs: impl IntoIterator<Item = Self>) -> Self {
        let exprs = exprs.into_iter();
        match self.combinator_mut(|node| matches!(node, FilterNode::And(_))) {
            Some(FilterNode::And(list)) => list.extend(exprs),
            _ => self.nodes.push(FilterNode::And(exprs.collect())),
        }
        self
    }

    /// Append to this level's OR list.
    #[must_use]
    pub fn or(mut self, exprs: impl IntoIterator<Item = Self>) -> Self {
        let exprs = exprs.into_iter();
        match self.combinator_mut(|node| matches!(node, FilterNode::Or(_))) {
            Some(FilterNode::Or(list)) => list.extend(exprs),
            _ => self.nodes.push(FilterNode::Or(exprs.collect())),
        }
        self
    }

    /// Set this level's NOT. A second call excludes rows matching either
    /// expression: `NOT (a OR b)`.
    #[must_use]
    #[expect(clippy::should_implement_trait)]
    pub fn not(mut self, expr: Self) -> Self {
        match self.combinator_mut(|node| matches!(node, FilterNode::Not(_))) {
            Some(FilterNode::Not(inner)) => {
                let previous = std::mem::take(inner.as_mut());
                **inner = Self::any([previous, expr]);
            }
            _ => self.nodes.push(FilterNode::Not(Box::new(expr))),
        }
        self
    }

    fn combinator_mut(&mut self, pick: impl Fn(&FilterNode) -> bool) -> Option<&mut FilterNode> {
        self.nodes.iter_mut().find(|node| pick(node))
    }
}
