use crate::value::Value;
use serde::{Deserialize, Serialize};

///
/// FieldKind
///
/// Scalar classification consumed from the schema collaborator.
/// Deliberately small: it drives operator legality and literal shape
/// checks only. Adapters own any further coercion.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[remain::sorted]
pub enum FieldKind {
    Bool,
    DateTime,
    Float,
    Int,
    Json,
    Relation { model: String },
    Text,
}

impl FieldKind {
    #[must_use]
    pub const fn is_relation(&self) -> bool {
        matches!(self, Self::Relation { .. })
    }

    /// Ordering operators (`gt`, `gte`, `lt`, `lte`) and ORDER BY.
    #[must_use]
    pub const fn supports_ordering(&self) -> bool {
        matches!(self, Self::DateTime | Self::Float | Self::Int | Self::Text)
    }

    /// Substring operators (`contains`, `startsWith`, `endsWith`).
    #[must_use]
    pub const fn supports_text_search(&self) -> bool {
        matches!(self, Self::Text)
    }

    /// Membership operators (`in`, `notIn`).
    #[must_use]
    pub const fn supports_membership(&self) -> bool {
        !matches!(self, Self::Json | Self::Relation { .. })
    }

    /// Arithmetic aggregates (`_sum`, `_avg`).
    #[must_use]
    pub const fn supports_arithmetic(&self) -> bool {
        matches!(self, Self::Float | Self::Int)
    }

    /// Whether a non-null literal has a shape this kind can hold.
    #[must_use]
    pub const fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Bool => matches!(value, Value::Bool(_)),
            Self::DateTime => matches!(value, Value::Text(_) | Value::Int(_)),
            Self::Float => matches!(value, Value::Int(_) | Value::Float(_)),
            Self::Int => matches!(value, Value::Int(_)),
            Self::Json => true,
            Self::Relation { .. } => matches!(value, Value::Object(_) | Value::List(_)),
            Self::Text => matches!(value, Value::Text(_)),
        }
    }
}

///
/// FieldModel
/// Runtime field metadata used for validation.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FieldModel {
    /// Field name as used in filters, ordering and projection.
    pub name: String,
    pub kind: FieldKind,
    pub optional: bool,
    pub list: bool,
    pub unique: bool,
}

impl FieldModel {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            list: false,
            unique: false,
        }
    }

    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub const fn list(mut self) -> Self {
        self.list = true;
        self
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Scalar, non-list, non-relation: eligible for every operator its
    /// kind supports.
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        !self.list && !self.kind.is_relation()
    }

    /// Literal shape check for a comparison value. Null always passes;
    /// null tests are compiled separately.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }

        if self.list {
            return value
                .as_list()
                .is_some_and(|items| items.iter().all(|item| self.kind.accepts(item)));
        }

        self.kind.accepts(value)
    }
}
