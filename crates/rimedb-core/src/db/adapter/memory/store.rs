//! Module: adapter::memory::store
//! Responsibility: collection storage and document-command execution for the memory backend.
//! Does not own: connection state, locking, or transaction publication.

use crate::{
    db::{
        predicate::{ParamRef, Predicate, eval_with},
        query::{AggregateCall, AggregateFn, DocumentCommand, OrderDirection, QueryResult},
    },
    error::Error,
    model::DataModel,
    value::{Row, Value, canonical_cmp, compare_eq},
};
use std::{cmp::Ordering, collections::BTreeMap};

const NULL: &Value = &Value::Null;

///
/// Collection
///
/// Rows in insertion order plus the fields whose non-null values must be
/// distinct. The primary key, when declared, is always unique and is
/// assigned from a counter when an insert leaves it out.
///

#[derive(Clone, Debug, Default)]
struct Collection {
    rows: Vec<Row>,
    primary_key: Option<String>,
    unique: Vec<String>,
}

impl Collection {
    fn unique_fields(&self) -> impl Iterator<Item = &str> {
        self.primary_key
            .iter()
            .chain(self.unique.iter())
            .map(String::as_str)
    }

    fn next_id(&self, collection: &str) -> Result<i64, Error> {
        let Some(pk) = &self.primary_key else {
            return Ok(1);
        };

        let Some(max) = self
            .rows
            .iter()
            .filter_map(|row| row.get(pk).and_then(Value::as_i64))
            .max()
        else {
            return Ok(1);
        };

        max.checked_add(1).ok_or_else(|| {
            Error::backend(format!("{collection}.{pk}: generated key space exhausted"))
        })
    }
}

///
/// MemoryStore
///
/// Complete contents of a memory adapter. Transactions work on a clone and
/// replace the published store on commit.
///

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    collections: BTreeMap<String, Collection>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// One collection per model, keyed by table name, with the primary key
    /// and unique fields declared.
    #[must_use]
    pub fn from_model(model: &DataModel) -> Self {
        let mut store = Self::new();
        for entity in model.models() {
            let unique = entity
                .fields
                .iter()
                .filter(|field| field.unique && field.name != entity.primary_key)
                .map(|field| field.name.clone())
                .collect();
            store.collections.insert(
                entity.table.clone(),
                Collection {
                    rows: Vec::new(),
                    primary_key: Some(entity.primary_key.clone()),
                    unique,
                },
            );
        }

        store
    }

    #[must_use]
    pub fn collection(mut self, name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        self.collections.entry(name.into()).or_default().primary_key = Some(primary_key.into());
        self
    }

    #[must_use]
    pub fn unique(mut self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.collections
            .entry(name.into())
            .or_default()
            .unique
            .push(field.into());
        self
    }

    /// Seed rows without constraint checks.
    #[must_use]
    pub fn rows(mut self, name: impl Into<String>, rows: impl IntoIterator<Item = Row>) -> Self {
        self.collections
            .entry(name.into())
            .or_default()
            .rows
            .extend(rows);
        self
    }

    #[must_use]
    pub fn snapshot(&self, name: &str) -> Vec<Row> {
        self.collections
            .get(name)
            .map(|collection| collection.rows.clone())
            .unwrap_or_default()
    }

    // --- Reads ---

    pub(crate) fn read(
        &self,
        command: &DocumentCommand,
        params: &[Value],
    ) -> Result<QueryResult, Error> {
        let empty = Collection::default();
        let collection = self
            .collections
            .get(command.collection())
            .unwrap_or(&empty);

        let rows = match command {
            DocumentCommand::Find {
                filter,
                select,
                order,
                skip,
                take,
                ..
            } => {
                let mut rows: Vec<Row> = matching(&collection.rows, filter, params)
                    .cloned()
                    .collect();
                sort_rows(&mut rows, order);
                let mut rows = page(rows, *skip, *take);
                if !select.is_empty() {
                    for row in &mut rows {
                        row.retain_fields(select.iter().map(String::as_str));
                    }
                }
                rows
            }
            DocumentCommand::Count { filter, .. } => {
                let count = matching(&collection.rows, filter, params).count();
                vec![Row::new().with("_count", int(count))]
            }
            DocumentCommand::Aggregate {
                filter, aggregates, ..
            } => {
                let rows: Vec<&Row> = matching(&collection.rows, filter, params).collect();
                vec![aggregate_row(Row::new(), &rows, aggregates)]
            }
            DocumentCommand::GroupBy {
                filter,
                by,
                aggregates,
                order,
                skip,
                take,
                ..
            } => {
                let rows: Vec<&Row> = matching(&collection.rows, filter, params).collect();
                let mut grouped: Vec<Row> = group(&rows, by)
                    .into_iter()
                    .map(|(keys, members)| {
                        let base = by.iter().cloned().zip(keys).collect::<Row>();
                        aggregate_row(base, &members, aggregates)
                    })
                    .collect();
                sort_rows(&mut grouped, order);
                page(grouped, *skip, *take)
            }
            DocumentCommand::Insert { .. }
            | DocumentCommand::Update { .. }
            | DocumentCommand::Delete { .. } => {
                return Err(Error::backend("write command routed to the read path"));
            }
        };

        Ok(QueryResult::from_rows(rows))
    }

    // --- Writes ---

    /// Apply one write. Constraint checks run against the would-be result
    /// before anything is stored, so a failed write changes nothing.
    pub(crate) fn write(
        &mut self,
        command: &DocumentCommand,
        params: &[Value],
    ) -> Result<QueryResult, Error> {
        if !command.is_write() {
            return self.read(command, params);
        }

        let name = command.collection().to_string();
        let collection = self.collections.entry(name.clone()).or_default();

        match command {
            DocumentCommand::Insert { fields, .. } => {
                let mut row: Row = fields
                    .iter()
                    .map(|(field, param)| (field.clone(), resolve(params, param).clone()))
                    .collect();
                if let Some(pk) = &collection.primary_key
                    && row.get(pk).is_none_or(Value::is_nullish)
                {
                    let id = collection.next_id(&name)?;
                    row.insert(pk.clone(), Value::Int(id));
                }

                check_unique(&name, collection, &collection.rows, &row)?;
                collection.rows.push(row.clone());

                Ok(QueryResult::from_rows(vec![row]))
            }
            DocumentCommand::Update { filter, set, .. } => {
                let mut next = collection.rows.clone();
                let mut touched = Vec::new();
                for (index, row) in next.iter_mut().enumerate() {
                    if !eval_with(&*row, filter, &|p: &ParamRef| resolve(params, p)).is_true() {
                        continue;
                    }
                    for (field, param) in set {
                        row.insert(field.clone(), resolve(params, param).clone());
                    }
                    touched.push(index);
                }

                for &index in &touched {
                    let others: Vec<Row> = next
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != index)
                        .map(|(_, row)| row.clone())
                        .collect();
                    check_unique(&name, collection, &others, &next[index])?;
                }

                let updated = touched.iter().map(|&index| next[index].clone()).collect();
                collection.rows = next;

                Ok(QueryResult::from_rows(updated))
            }
            DocumentCommand::Delete { filter, .. } => {
                let (removed, kept): (Vec<Row>, Vec<Row>) =
                    std::mem::take(&mut collection.rows)
                        .into_iter()
                        .partition(|row| {
                            eval_with(row, filter, &|p: &ParamRef| resolve(params, p)).is_true()
                        });
                collection.rows = kept;

                Ok(QueryResult::from_rows(removed))
            }
            DocumentCommand::Find { .. }
            | DocumentCommand::Count { .. }
            | DocumentCommand::Aggregate { .. }
            | DocumentCommand::GroupBy { .. } => {
                Err(Error::backend("read command routed to the write path"))
            }
        }
    }
}

fn resolve<'p>(params: &'p [Value], param: &ParamRef) -> &'p Value {
    params.get(param.0).unwrap_or(NULL)
}

fn matching<'r>(
    rows: &'r [Row],
    filter: &'r Predicate<ParamRef>,
    params: &'r [Value],
) -> impl Iterator<Item = &'r Row> {
    rows.iter()
        .filter(move |row| eval_with(*row, filter, &|p: &ParamRef| resolve(params, p)).is_true())
}

fn check_unique(
    name: &str,
    collection: &Collection,
    others: &[Row],
    candidate: &Row,
) -> Result<(), Error> {
    for field in collection.unique_fields() {
        let Some(value) = candidate.get(field) else {
            continue;
        };
        let taken = others
            .iter()
            .filter_map(|row| row.get(field))
            .any(|existing| compare_eq(existing, value) == Some(true));
        if taken {
            return Err(Error::constraint(format!(
                "UNIQUE constraint failed: {name}.{field}"
            )));
        }
    }

    Ok(())
}

// Stable sort: rows equal on every key keep insertion order.
fn sort_rows(rows: &mut [Row], order: &[(String, OrderDirection)]) {
    if order.is_empty() {
        return;
    }

    rows.sort_by(|a, b| {
        for (field, direction) in order {
            let left = a.get(field).unwrap_or(NULL);
            let right = b.get(field).unwrap_or(NULL);
            let ordering = match direction {
                OrderDirection::Asc => canonical_cmp(left, right),
                OrderDirection::Desc => canonical_cmp(right, left),
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn page(rows: Vec<Row>, skip: u64, take: Option<u64>) -> Vec<Row> {
    let skip = usize::try_from(skip).unwrap_or(usize::MAX);
    let take = take.map_or(usize::MAX, |take| usize::try_from(take).unwrap_or(usize::MAX));

    rows.into_iter().skip(skip).take(take).collect()
}

// Groups in first-seen order; keys compare under the canonical order, so
// NULLs form one group as they do in SQL GROUP BY.
fn group<'r>(rows: &[&'r Row], by: &[String]) -> Vec<(Vec<Value>, Vec<&'r Row>)> {
    let mut groups: Vec<(Vec<Value>, Vec<&Row>)> = Vec::new();
    for row in rows {
        let keys: Vec<Value> = by
            .iter()
            .map(|field| row.get(field).cloned().unwrap_or_default())
            .collect();
        let existing = groups.iter_mut().find(|(group_keys, _)| {
            group_keys
                .iter()
                .zip(&keys)
                .all(|(a, b)| canonical_cmp(a, b).is_eq())
        });
        match existing {
            Some((_, members)) => members.push(row),
            None => groups.push((keys, vec![row])),
        }
    }

    groups
}

fn aggregate_row(mut base: Row, rows: &[&Row], calls: &[AggregateCall]) -> Row {
    for call in calls {
        let values: Vec<&Value> = match &call.field {
            Some(field) => rows
                .iter()
                .filter_map(|row| row.get(field))
                .filter(|value| !value.is_nullish())
                .collect(),
            None => Vec::new(),
        };

        let result = match (call.func, &call.field) {
            (AggregateFn::Count, None) => int(rows.len()),
            (AggregateFn::Count, Some(_)) => int(values.len()),
            (AggregateFn::Sum, _) => sum(&values),
            (AggregateFn::Avg, _) => avg(&values),
            (AggregateFn::Min, _) => extreme(&values, Ordering::Less),
            (AggregateFn::Max, _) => extreme(&values, Ordering::Greater),
        };
        base.insert(call.alias(), result);
    }

    base
}

fn int(count: usize) -> Value {
    Value::Int(i64::try_from(count).unwrap_or(i64::MAX))
}

// SUM over integers stays integral; any float widens the result.
fn sum(values: &[&Value]) -> Value {
    if values.is_empty() {
        return Value::Null;
    }

    if values.iter().all(|value| matches!(value, Value::Int(_))) {
        let total = values.iter().filter_map(|value| value.as_i64()).sum::<i64>();
        return Value::Int(total);
    }

    Value::Float(values.iter().filter_map(|value| value.as_f64()).sum())
}

#[expect(clippy::cast_precision_loss)]
fn avg(values: &[&Value]) -> Value {
    let numbers: Vec<f64> = values.iter().filter_map(|value| value.as_f64()).collect();
    if numbers.is_empty() {
        return Value::Null;
    }

    Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

fn extreme(values: &[&Value], wanted: Ordering) -> Value {
    values
        .iter()
        .copied()
        .reduce(|best, value| {
            if canonical_cmp(value, best) == wanted {
                value
            } else {
                best
            }
        })
        .cloned()
        .unwrap_or_default()
}
