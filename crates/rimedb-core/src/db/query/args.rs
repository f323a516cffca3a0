//! Module: query::args
//! Responsibility: caller-facing operation arguments and their JSON-shaped parser.
//! Does not own: validation against the model (see `assemble`).

use crate::{
    db::predicate::FilterExpr,
    error::CompileError,
    value::{Row, Value},
};
use derive_more::{Deref, IntoIterator};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

///
/// Operation
///
/// Closed set of model-level operations. Names match the camelCase method
/// names used by rewriters, middleware and metrics.
///

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[remain::sorted]
pub enum Operation {
    Aggregate,
    Count,
    Create,
    Delete,
    DeleteMany,
    FindFirst,
    FindMany,
    FindUnique,
    GroupBy,
    Update,
    UpdateMany,
}

impl Operation {
    pub const ALL: [Self; 11] = [
        Self::FindMany,
        Self::FindFirst,
        Self::FindUnique,
        Self::Create,
        Self::Update,
        Self::UpdateMany,
        Self::Delete,
        Self::DeleteMany,
        Self::Count,
        Self::Aggregate,
        Self::GroupBy,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aggregate => "aggregate",
            Self::Count => "count",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::DeleteMany => "deleteMany",
            Self::FindFirst => "findFirst",
            Self::FindMany => "findMany",
            Self::FindUnique => "findUnique",
            Self::GroupBy => "groupBy",
            Self::Update => "update",
            Self::UpdateMany => "updateMany",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Operations that return entity rows (and therefore get computed fields).
    #[must_use]
    pub const fn returns_records(self) -> bool {
        !matches!(self, Self::Count | Self::Aggregate | Self::GroupBy)
    }

    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            Self::Create | Self::Update | Self::UpdateMany | Self::Delete | Self::DeleteMany
        )
    }

    /// Operations whose filter must single out one row by a unique field.
    #[must_use]
    pub const fn requires_unique_filter(self) -> bool {
        matches!(self, Self::FindUnique | Self::Update | Self::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    #[must_use]
    pub const fn sql_keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "asc" | "ASC" => Some(Self::Asc),
            "desc" | "DESC" => Some(Self::Desc),
            _ => None,
        }
    }
}

///
/// OrderSpec
///
/// Ordered `(field, direction)` pairs. Insertion order is ORDER BY
/// precedence; a field appears at most once.
///

#[derive(Clone, Debug, Default, Deref, Eq, IntoIterator, PartialEq)]
#[into_iterator(owned, ref)]
pub struct OrderSpec(Vec<(String, OrderDirection)>);

impl OrderSpec {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a key; re-ordering an existing field replaces its direction
    /// without changing its precedence.
    pub fn push(&mut self, field: impl Into<String>, direction: OrderDirection) {
        let field = field.into();
        match self.0.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = direction,
            None => self.0.push((field, direction)),
        }
    }
}

///
/// AggregateFn
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFn {
    /// Result key prefix, e.g. `_sum`.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Count => "_count",
            Self::Sum => "_sum",
            Self::Avg => "_avg",
            Self::Min => "_min",
            Self::Max => "_max",
        }
    }

    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        [Self::Count, Self::Sum, Self::Avg, Self::Min, Self::Max]
            .into_iter()
            .find(|func| func.prefix() == prefix)
    }
}

///
/// AggregateCall
/// One aggregate column; `field == None` is `COUNT(*)`.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AggregateCall {
    pub func: AggregateFn,
    pub field: Option<String>,
}

impl AggregateCall {
    /// Dotted result alias: `_count`, `_sum.age`.
    #[must_use]
    pub fn alias(&self) -> String {
        match &self.field {
            Some(field) => format!("{}.{field}", self.func.prefix()),
            None => self.func.prefix().to_string(),
        }
    }
}

///
/// AggregateSpec
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AggregateSpec {
    pub count: bool,
    pub sum: Vec<String>,
    pub avg: Vec<String>,
    pub min: Vec<String>,
    pub max: Vec<String>,
}

impl AggregateSpec {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.count
            && self.sum.is_empty()
            && self.avg.is_empty()
            && self.min.is_empty()
            && self.max.is_empty()
    }

    /// Aggregate columns in a stable order: count first, then sum, avg, min, max.
    #[must_use]
    pub fn calls(&self) -> Vec<AggregateCall> {
        let mut calls = Vec::new();
        if self.count {
            calls.push(AggregateCall {
                func: AggregateFn::Count,
                field: None,
            });
        }

        for (func, fields) in [
            (AggregateFn::Sum, &self.sum),
            (AggregateFn::Avg, &self.avg),
            (AggregateFn::Min, &self.min),
            (AggregateFn::Max, &self.max),
        ] {
            calls.extend(fields.iter().map(|field| AggregateCall {
                func,
                field: Some(field.clone()),
            }));
        }

        calls
    }

    fn push(&mut self, func: AggregateFn, field: String) {
        let list = match func {
            AggregateFn::Count => {
                self.count = true;
                return;
            }
            AggregateFn::Sum => &mut self.sum,
            AggregateFn::Avg => &mut self.avg,
            AggregateFn::Min => &mut self.min,
            AggregateFn::Max => &mut self.max,
        };
        if !list.contains(&field) {
            list.push(field);
        }
    }
}

///
/// QueryArgs
///
/// Arguments of one model operation. Which parts are meaningful depends on
/// the operation; the assembler rejects missing required parts.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryArgs {
    pub filter: Option<FilterExpr>,
    pub data: Option<Row>,
    pub select: Vec<String>,
    pub order_by: OrderSpec,
    pub take: Option<i64>,
    pub skip: Option<u64>,
    pub aggregate: AggregateSpec,
    pub by: Vec<String>,
}

impl QueryArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Conjoin `extra` with the existing filter. Rewriters use this to add
    /// conditions without disturbing what the caller asked for.
    #[must_use]
    pub fn and_filter(mut self, extra: FilterExpr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and_where(extra),
            None => extra,
        });
        self
    }

    #[must_use]
    pub fn data(mut self, data: Row) -> Self {
        self.data = Some(data);
        self
    }

    /// Set one data field, creating the data row if needed.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data
            .get_or_insert_with(Row::new)
            .insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by.push(field, direction);
        self
    }

    #[must_use]
    pub const fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }

    #[must_use]
    pub const fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub const fn count(mut self) -> Self {
        self.aggregate.count = true;
        self
    }

    #[must_use]
    pub fn sum(mut self, field: impl Into<String>) -> Self {
        self.aggregate.push(AggregateFn::Sum, field.into());
        self
    }

    #[must_use]
    pub fn avg(mut self, field: impl Into<String>) -> Self {
        self.aggregate.push(AggregateFn::Avg, field.into());
        self
    }

    #[must_use]
    pub fn min(mut self, field: impl Into<String>) -> Self {
        self.aggregate.push(AggregateFn::Min, field.into());
        self
    }

    #[must_use]
    pub fn max(mut self, field: impl Into<String>) -> Self {
        self.aggregate.push(AggregateFn::Max, field.into());
        self
    }

    #[must_use]
    pub fn by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Row limit; a negative `take` means unbounded.
    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        self.take.and_then(|take| u64::try_from(take).ok())
    }

    /// Parse the JSON argument shape used by untyped callers:
    /// `{ where, data, select, orderBy, take, skip, by, _count, _sum, _avg, _min, _max }`.
    pub fn from_json(json: &JsonValue) -> Result<Self, CompileError> {
        let JsonValue::Object(map) = json else {
            return Err(CompileError::malformed("arguments must be an object"));
        };

        let mut args = Self::new();
        for (key, value) in map {
            match key.as_str() {
                "where" => args.filter = Some(FilterExpr::from_json(value)?),
                "data" => args.data = Some(parse_data(value)?),
                "select" => args.select = parse_field_set("select", value)?,
                "orderBy" => args.order_by = parse_order(value)?,
                "take" => {
                    args.take = Some(value.as_i64().ok_or_else(|| {
                        CompileError::malformed("take must be an integer")
                    })?);
                }
                "skip" => {
                    args.skip = Some(value.as_u64().ok_or_else(|| {
                        CompileError::malformed("skip must be a non-negative integer")
                    })?);
                }
                "by" => args.by = parse_field_set("by", value)?,
                "_count" => {
                    args.aggregate.count = value
                        .as_bool()
                        .ok_or_else(|| CompileError::malformed("_count must be a boolean"))?;
                }
                other => {
                    let Some(func) = AggregateFn::from_prefix(other) else {
                        return Err(CompileError::malformed(format!(
                            "unknown argument '{other}'"
                        )));
                    };
                    for field in parse_field_set(other, value)? {
                        args.aggregate.push(func, field);
                    }
                }
            }
        }

        Ok(args)
    }

    /// Dynamic form of `from_json`, used when extension methods forward
    /// their arguments to a base operation. `Null` means no arguments.
    pub fn from_value(value: &Value) -> Result<Self, CompileError> {
        if value.is_nullish() {
            return Ok(Self::new());
        }

        Self::from_json(&value.to_json())
    }
}

fn parse_data(value: &JsonValue) -> Result<Row, CompileError> {
    match value {
        JsonValue::Object(map) => Ok(Row::from(map.clone())),
        _ => Err(CompileError::malformed("data must be an object")),
    }
}

// Field sets are either `["a", "b"]` or `{ "a": true, "b": false }`.
fn parse_field_set(key: &str, value: &JsonValue) -> Result<Vec<String>, CompileError> {
    match value {
        JsonValue::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    CompileError::malformed(format!("{key} entries must be field names"))
                })
            })
            .collect(),
        JsonValue::Object(map) => Ok(map
            .iter()
            .filter(|(_, flag)| flag.as_bool() == Some(true))
            .map(|(field, _)| field.clone())
            .collect()),
        _ => Err(CompileError::malformed(format!(
            "{key} must be a list or an object of flags"
        ))),
    }
}

fn parse_order(value: &JsonValue) -> Result<OrderSpec, CompileError> {
    let entries: Vec<&Map<String, JsonValue>> = match value {
        JsonValue::Object(map) => vec![map],
        JsonValue::Array(items) => items
            .iter()
            .map(|item| {
                item.as_object()
                    .ok_or_else(|| CompileError::malformed("orderBy entries must be objects"))
            })
            .collect::<Result<_, _>>()?,
        _ => return Err(CompileError::malformed("orderBy must be an object or a list")),
    };

    let mut spec = OrderSpec::new();
    for (field, direction) in entries.into_iter().flatten() {
        let direction = direction
            .as_str()
            .and_then(OrderDirection::parse)
            .ok_or_else(|| {
                CompileError::malformed(format!("orderBy '{field}' must be 'asc' or 'desc'"))
            })?;
        spec.push(field.clone(), direction);
    }

    Ok(spec)
}

impl From<FilterExpr> for QueryArgs {
    fn from(filter: FilterExpr) -> Self {
        Self::new().filter(filter)
    }
}

impl From<Row> for QueryArgs {
    fn from(data: Row) -> Self {
        Self::new().data(data)
    }
}
