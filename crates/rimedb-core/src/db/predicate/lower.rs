//! Module: predicate::lower
//! Responsibility: schema-aware validation and lowering of `FilterExpr` into the predicate IR.
//! Does not own: rendering or evaluation.
//! Boundary: every compile error for a filter is raised here, before any command exists.

use crate::{
    db::predicate::{
        ast::{CompareOp, Predicate, TextOp},
        expr::{FieldFilter, FilterExpr, FilterNode, FilterOp},
    },
    error::CompileError,
    model::{EntityModel, FieldModel, is_identifier},
    value::Value,
};

///
/// Lowerer
///
/// Walks one filter tree. With a model attached, field names, operator
/// legality and literal shapes are checked; without one only identifier
/// syntax is enforced.
///

pub(crate) struct Lowerer<'a> {
    model: Option<&'a EntityModel>,
    max_depth: usize,
}

impl<'a> Lowerer<'a> {
    pub(crate) const fn new(model: Option<&'a EntityModel>, max_depth: usize) -> Self {
        Self { model, max_depth }
    }

    pub(crate) fn lower(&self, expr: &FilterExpr) -> Result<Predicate, CompileError> {
        self.lower_level(expr, 0)
    }

    fn lower_level(&self, expr: &FilterExpr, depth: usize) -> Result<Predicate, CompileError> {
        if depth > self.max_depth {
            return Err(CompileError::DepthExceeded {
                max: self.max_depth,
            });
        }

        let mut conjuncts = Vec::with_capacity(expr.nodes().len());
        for node in expr.nodes() {
            let lowered = match node {
                FilterNode::Field { field, filter } => self.lower_field(field, filter)?,
                FilterNode::And(children) => Predicate::and_of(self.lower_children(children, depth)?),
                FilterNode::Or(children) => Predicate::or_of(self.lower_children(children, depth)?),
                FilterNode::Not(inner) => Predicate::not_of(self.lower_level(inner, depth + 1)?),
            };
            conjuncts.push(lowered);
        }

        Ok(Predicate::and_of(conjuncts))
    }

    fn lower_children(
        &self,
        children: &[FilterExpr],
        depth: usize,
    ) -> Result<Vec<Predicate>, CompileError> {
        children
            .iter()
            .map(|child| self.lower_level(child, depth + 1))
            .collect()
    }

    fn lower_field(&self, field: &str, filter: &FieldFilter) -> Result<Predicate, CompileError> {
        let model_field = self.resolve_field(field)?;

        match filter {
            FieldFilter::Value(value) => lower_op(field, model_field, FilterOp::Equals, value),
            FieldFilter::Ops(ops) => {
                let lowered = ops
                    .iter()
                    .map(|(op, value)| lower_op(field, model_field, *op, value))
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Predicate::and_of(lowered))
            }
        }
    }

    fn resolve_field(&self, field: &str) -> Result<Option<&'a FieldModel>, CompileError> {
        let Some(model) = self.model else {
            if !is_identifier(field) {
                return Err(CompileError::InvalidIdentifier {
                    ident: field.to_string(),
                });
            }
            return Ok(None);
        };

        let model_field = model
            .get_field(field)
            .ok_or_else(|| CompileError::UnknownField {
                model: model.name.clone(),
                field: field.to_string(),
            })?;

        Ok(Some(model_field))
    }
}

fn lower_op(
    field: &str,
    model_field: Option<&FieldModel>,
    op: FilterOp,
    value: &Value,
) -> Result<Predicate, CompileError> {
    if let Some(model_field) = model_field {
        check_operator(model_field, op)?;
    }

    let name = field.to_string();
    let predicate = match op {
        FilterOp::Equals if value.is_nullish() => Predicate::IsNull { field: name },
        FilterOp::Not if value.is_nullish() => Predicate::IsNotNull { field: name },
        FilterOp::Equals | FilterOp::Not => {
            check_literal(field, model_field, op, value)?;
            let cmp = if op == FilterOp::Equals {
                CompareOp::Eq
            } else {
                CompareOp::Ne
            };
            Predicate::Compare {
                field: name,
                op: cmp,
                value: value.clone(),
            }
        }
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
            if value.is_nullish() {
                return Err(mismatch(field, op, "a non-null value", value));
            }
            check_literal(field, model_field, op, value)?;
            Predicate::Compare {
                field: name,
                op: ordering_op(op),
                value: value.clone(),
            }
        }
        FilterOp::Contains | FilterOp::StartsWith | FilterOp::EndsWith => {
            if value.as_text().is_none() {
                return Err(mismatch(field, op, "text", value));
            }
            Predicate::Text {
                field: name,
                op: text_op(op),
                value: value.clone(),
            }
        }
        FilterOp::In | FilterOp::NotIn => {
            let Some(items) = value.as_list() else {
                return Err(mismatch(field, op, "a list", value));
            };
            for item in items {
                if item.is_nullish() {
                    return Err(mismatch(field, op, "non-null list items", item));
                }
                check_literal(field, model_field, op, item)?;
            }
            lower_membership(name, op, items.to_vec())
        }
    };

    Ok(predicate)
}

// `in: []` matches nothing; `notIn: []` matches everything.
fn lower_membership(field: String, op: FilterOp, values: Vec<Value>) -> Predicate {
    match (op, values.is_empty()) {
        (FilterOp::In, true) => Predicate::False,
        (FilterOp::In, false) => Predicate::In { field, values },
        (_, true) => Predicate::True,
        (_, false) => Predicate::NotIn { field, values },
    }
}

fn check_operator(field: &FieldModel, op: FilterOp) -> Result<(), CompileError> {
    let kind = &field.kind;
    let supported = if kind.is_relation() {
        false
    } else if field.list {
        matches!(op, FilterOp::Equals | FilterOp::Not)
    } else {
        match op {
            FilterOp::Equals | FilterOp::Not => true,
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => kind.supports_ordering(),
            FilterOp::Contains | FilterOp::StartsWith | FilterOp::EndsWith => {
                kind.supports_text_search()
            }
            FilterOp::In | FilterOp::NotIn => kind.supports_membership(),
        }
    };

    if supported {
        Ok(())
    } else {
        Err(CompileError::OperatorNotSupported {
            field: field.name.clone(),
            operator: op.key().to_string(),
            kind: kind_label(field),
        })
    }
}

fn check_literal(
    field: &str,
    model_field: Option<&FieldModel>,
    op: FilterOp,
    value: &Value,
) -> Result<(), CompileError> {
    match model_field {
        Some(model_field) if !model_field.accepts(value) => {
            Err(mismatch(field, op, &kind_label(model_field), value))
        }
        _ => Ok(()),
    }
}

fn mismatch(field: &str, op: FilterOp, expected: &str, found: &Value) -> CompileError {
    CompileError::TypeMismatch {
        field: field.to_string(),
        operator: op.key().to_string(),
        expected: expected.to_string(),
        found: found.kind_label().to_string(),
    }
}

fn kind_label(field: &FieldModel) -> String {
    let base = format!("{:?}", field.kind);
    if field.list {
        format!("List<{base}>")
    } else {
        base
    }
}

const fn ordering_op(op: FilterOp) -> CompareOp {
    match op {
        FilterOp::Gt => CompareOp::Gt,
        FilterOp::Gte => CompareOp::Gte,
        FilterOp::Lt => CompareOp::Lt,
        _ => CompareOp::Lte,
    }
}

const fn text_op(op: FilterOp) -> TextOp {
    match op {
        FilterOp::Contains => TextOp::Contains,
        FilterOp::StartsWith => TextOp::StartsWith,
        _ => TextOp::EndsWith,
    }
}
