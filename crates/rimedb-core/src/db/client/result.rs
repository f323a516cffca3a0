use crate::{
    error::Error,
    value::{Row, Value},
};

///
/// OperationResult
///
/// Result of one model operation as it flows back through middleware.
/// The variant is fixed by the operation; typed delegate methods unwrap it.
///

#[derive(Clone, Debug, PartialEq)]
pub enum OperationResult {
    /// `findMany`
    Records(Vec<Row>),
    /// `findFirst`, `findUnique`, `create`, `update`, `delete`
    Record(Option<Row>),
    /// `count`, `updateMany`, `deleteMany`
    Count(u64),
    /// `aggregate`
    Aggregate(Row),
    /// `groupBy`
    Groups(Vec<Row>),
}

impl OperationResult {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Records(rows) | Self::Groups(rows) => rows.len(),
            Self::Record(row) => usize::from(row.is_some()),
            Self::Count(_) | Self::Aggregate(_) => 1,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_records(self) -> Result<Vec<Row>, Error> {
        match self {
            Self::Records(rows) | Self::Groups(rows) => Ok(rows),
            other => Err(shape_error("records", &other)),
        }
    }

    pub fn into_record(self) -> Result<Option<Row>, Error> {
        match self {
            Self::Record(row) => Ok(row),
            other => Err(shape_error("a record", &other)),
        }
    }

    pub fn into_count(self) -> Result<u64, Error> {
        match self {
            Self::Count(count) => Ok(count),
            other => Err(shape_error("a count", &other)),
        }
    }

    pub fn into_aggregate(self) -> Result<Row, Error> {
        match self {
            Self::Aggregate(row) => Ok(row),
            other => Err(shape_error("an aggregate", &other)),
        }
    }

    /// Dynamic form handed to extension methods.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Records(rows) | Self::Groups(rows) => {
                Value::List(rows.into_iter().map(Value::Object).collect())
            }
            Self::Record(row) => row.map_or(Value::Null, Value::Object),
            Self::Count(count) => Value::Int(i64::try_from(count).unwrap_or(i64::MAX)),
            Self::Aggregate(row) => Value::Object(row),
        }
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Row] {
        match self {
            Self::Records(rows) | Self::Groups(rows) => rows,
            Self::Record(Some(row)) | Self::Aggregate(row) => std::slice::from_mut(row),
            Self::Record(None) | Self::Count(_) => &mut [],
        }
    }
}

const fn label(result: &OperationResult) -> &'static str {
    match result {
        OperationResult::Records(_) => "records",
        OperationResult::Record(_) => "a record",
        OperationResult::Count(_) => "a count",
        OperationResult::Aggregate(_) => "an aggregate",
        OperationResult::Groups(_) => "groups",
    }
}

// Only reachable when a middleware replaces the result with another shape.
fn shape_error(expected: &str, found: &OperationResult) -> Error {
    Error::backend(format!(
        "expected {expected} from the pipeline, found {}",
        label(found)
    ))
}
