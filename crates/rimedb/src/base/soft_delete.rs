//! Module: base::soft_delete
//! Responsibility: mark rows deleted with a timestamp instead of removing them.
//! Does not own: physical deletion; `delete` and `deleteMany` still remove rows.
//! Boundary: every read on a covered model sees only rows whose marker is null.
//!
//! Injected model methods:
//! - `softDelete({ where })` stamps the marker on matching live rows.
//! - `findDeleted({ where, ... })` lists marked rows.
//! - `restore({ where })` clears the marker on matching marked rows.
//!
//! The last two read through the model as it was before this extension,
//! so the hiding rewriter does not apply to them.

use rimedb_core::{
    db::{
        client::ModelContext,
        extension::{ExtensionDescriptor, ModelScope},
        predicate::FilterExpr,
        query::{Operation, QueryArgs},
    },
    error::Error,
    value::{Row, Value},
};
use std::time::{SystemTime, UNIX_EPOCH};

/// Extension name, as reported by `Client` debug output.
pub const EXTENSION_NAME: &str = "softDelete";

/// Default marker field.
pub const DELETED_AT: &str = "deletedAt";

/// Operations whose results hide marked rows.
pub const READ_OPERATIONS: [Operation; 6] = [
    Operation::FindMany,
    Operation::FindFirst,
    Operation::FindUnique,
    Operation::Count,
    Operation::Aggregate,
    Operation::GroupBy,
];

///
/// SoftDelete
///
/// Builder for the soft-delete extension. Covers the listed models only;
/// each of them must declare the marker field as an optional date-time.
///

#[derive(Clone, Debug)]
pub struct SoftDelete {
    field: String,
    models: Vec<String>,
}

impl SoftDelete {
    #[must_use]
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: DELETED_AT.to_string(),
            models: models.into_iter().map(Into::into).collect(),
        }
    }

    /// Use `field` as the marker instead of `deletedAt`.
    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    #[must_use]
    pub fn build(self) -> ExtensionDescriptor {
        let Self { field, models } = self;

        models
            .iter()
            .fold(ExtensionDescriptor::new(EXTENSION_NAME), |ext, model| {
                let scope = ModelScope::model(model.as_str());
                let hide = field.clone();
                let mark = field.clone();
                let list = field.clone();
                let unmark = field.clone();

                ext.query_rewriter_for(&scope, &READ_OPERATIONS, move |args: QueryArgs| {
                    Ok(args.and_filter(FilterExpr::new().is_null(hide.as_str())))
                })
                .model_method(scope.clone(), "softDelete", move |ctx, args| {
                    soft_delete(ctx, args, mark.clone())
                })
                .model_method(scope.clone(), "findDeleted", move |ctx, args| {
                    find_deleted(ctx, args, list.clone())
                })
                .model_method(scope, "restore", move |ctx, args| {
                    restore(ctx, args, unmark.clone())
                })
            })
    }
}

/// Soft-delete extension over `models` with the default `deletedAt` marker.
#[must_use]
pub fn extension(models: &[&str]) -> ExtensionDescriptor {
    SoftDelete::new(models.iter().copied()).build()
}

// --- Methods ---

async fn soft_delete(ctx: ModelContext, args: Value, field: String) -> Result<Value, Error> {
    let filter = required_filter(&args, "softDelete")?;
    let stamp = now_millis()?;

    let update = QueryArgs::new()
        .filter(filter.and_where(FilterExpr::new().is_null(field.as_str())))
        .data(Row::new().with(field, stamp));
    let count = ctx.next().update_many(update).await?;
    tracing::debug!(model = ctx.model(), count, "rows soft-deleted");

    Ok(count_value(count))
}

async fn find_deleted(ctx: ModelContext, args: Value, field: String) -> Result<Value, Error> {
    let query = QueryArgs::from_value(&args)?
        .and_filter(FilterExpr::new().is_not_null(field.as_str()));
    let rows = ctx.next().find_many(query).await?;

    Ok(Value::List(rows.into_iter().map(Value::Object).collect()))
}

async fn restore(ctx: ModelContext, args: Value, field: String) -> Result<Value, Error> {
    let filter = required_filter(&args, "restore")?;

    let update = QueryArgs::new()
        .filter(filter.and_where(FilterExpr::new().is_not_null(field.as_str())))
        .data(Row::new().with(field, Value::Null));
    let count = ctx.next().update_many(update).await?;
    tracing::debug!(model = ctx.model(), count, "rows restored");

    Ok(count_value(count))
}

// --- Helpers ---

// A bare `{}` would touch every row; both write methods insist on `where`.
fn required_filter(args: &Value, method: &str) -> Result<FilterExpr, Error> {
    QueryArgs::from_value(args)?
        .filter
        .filter(|filter| !filter.is_empty())
        .ok_or_else(|| {
            Error::extension(EXTENSION_NAME, format!("{method} requires a where filter"))
        })
}

fn now_millis() -> Result<i64, Error> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| Error::extension(EXTENSION_NAME, err.to_string()))?;

    i64::try_from(elapsed.as_millis())
        .map_err(|err| Error::extension(EXTENSION_NAME, err.to_string()))
}

fn count_value(count: u64) -> Value {
    Value::Int(i64::try_from(count).unwrap_or(i64::MAX))
}
