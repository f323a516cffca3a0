//! Module: extension::compute
//! Responsibility: computed result fields and select-aware projection.
//! Boundary: failures are contained per field; a row is never dropped.

use crate::{
    db::extension::descriptor::ResultField,
    model::{DataModel, EntityModel, FieldKind},
    obs::{MetricsEvent, MetricsSink},
    value::{Row, Value},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

///
/// Selection
///
/// Backend projection derived from a caller `select` that may name
/// computed fields. `keep` is the caller's original list; rows are cut
/// back to it after computing, which also trims writes whose backend
/// hands back whole rows.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Selection {
    pub backend: Vec<String>,
    pub keep: Option<Vec<String>>,
}

/// Replace computed fields in `select` with the stored fields they need,
/// following needs through other computed fields.
#[must_use]
pub fn plan_selection(select: &[String], fields: &BTreeMap<String, ResultField>) -> Selection {
    if select.is_empty() {
        return Selection::default();
    }
    if !select.iter().any(|name| fields.contains_key(name)) {
        return Selection {
            backend: select.to_vec(),
            keep: Some(select.to_vec()),
        };
    }

    let mut backend = Vec::new();
    let mut visited = BTreeSet::new();
    let mut pending: Vec<&str> = select.iter().map(String::as_str).collect();

    while let Some(name) = pending.pop() {
        if !visited.insert(name) {
            continue;
        }
        match fields.get(name) {
            Some(field) => pending.extend(field.needs.iter().map(String::as_str)),
            None => backend.push(name.to_string()),
        }
    }
    backend.sort();

    Selection {
        backend,
        keep: Some(select.to_vec()),
    }
}

///
/// Computer
///
/// Applies one model's computed fields to result rows. Nested rows are
/// reached only through the model's relation fields; Json values are data
/// and are left untouched.
///

pub struct Computer<'a> {
    entity: &'a EntityModel,
    data: &'a DataModel,
    fields: &'a BTreeMap<String, ResultField>,
    sink: &'a dyn MetricsSink,
}

impl<'a> Computer<'a> {
    #[must_use]
    pub const fn new(
        entity: &'a EntityModel,
        data: &'a DataModel,
        fields: &'a BTreeMap<String, ResultField>,
        sink: &'a dyn MetricsSink,
    ) -> Self {
        Self {
            entity,
            data,
            fields,
            sink,
        }
    }

    pub fn apply(&self, rows: &mut [Row], selection: &Selection) {
        if self.fields.is_empty() && selection.keep.is_none() {
            return;
        }

        for row in rows {
            self.augment(row);
            if let Some(keep) = &selection.keep {
                row.retain_fields(keep.iter().map(String::as_str));
            }
        }
    }

    /// Nested relation rows first, then fixpoint passes over this row: each
    /// pass computes every field whose needs are present, so computed fields
    /// may feed other computed fields. Existing keys are never overwritten.
    pub fn augment(&self, row: &mut Row) {
        if !self.fields.is_empty() {
            self.augment_as(self.entity, row);
        }
    }

    fn augment_as(&self, entity: &EntityModel, row: &mut Row) {
        for field in &entity.fields {
            let FieldKind::Relation { model } = &field.kind else {
                continue;
            };
            let target = self.data.get(model).map(Arc::as_ref);

            match row.get_mut(&field.name) {
                Some(Value::Object(nested)) => self.augment_relation(target, model, nested),
                Some(Value::List(items)) => {
                    for item in items {
                        if let Value::Object(nested) = item {
                            self.augment_relation(target, model, nested);
                        }
                    }
                }
                _ => {}
            }
        }

        self.compute(&entity.name, row);
    }

    // Rows of an unregistered model get computed fields but no deeper nesting.
    fn augment_relation(&self, target: Option<&EntityModel>, model: &str, row: &mut Row) {
        match target {
            Some(target) => self.augment_as(target, row),
            None => self.compute(model, row),
        }
    }

    fn compute(&self, model: &str, row: &mut Row) {
        let mut done: BTreeSet<&str> = BTreeSet::new();
        loop {
            let mut progressed = false;

            for (name, field) in self.fields {
                if done.contains(name.as_str()) {
                    continue;
                }
                if row.contains_key(name) {
                    done.insert(name.as_str());
                    continue;
                }
                if !field.needs.iter().all(|need| row.contains_key(need)) {
                    continue;
                }

                let value = match (field.compute)(row) {
                    Ok(value) => value,
                    Err(err) => {
                        tracing::warn!(
                            model,
                            field = %name,
                            error = %err,
                            "computed field failed"
                        );
                        self.sink.record(MetricsEvent::ComputeFailed { model, field: name });
                        Value::Absent
                    }
                };
                row.insert(name.clone(), value);
                done.insert(name.as_str());
                progressed = true;
            }

            if !progressed {
                break;
            }
        }
    }
}
