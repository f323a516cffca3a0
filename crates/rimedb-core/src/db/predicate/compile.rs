//! Module: predicate::compile
//! Responsibility: public compile contract and relational rendering of the predicate IR.
//! Boundary: output text uses `?` placeholders; dialect numbering happens at assembly.

use crate::{
    config::DEFAULT_MAX_FILTER_DEPTH,
    db::{
        predicate::{
            ast::{ParamRef, Predicate, TextOp},
            expr::FilterExpr,
            lower::Lowerer,
        },
        query::Dialect,
    },
    error::CompileError,
    model::EntityModel,
    value::Value,
};

/// Escape character used in LIKE patterns. `!` needs no quoting in any
/// supported dialect, unlike backslash under MySQL.
const LIKE_ESCAPE: char = '!';

///
/// CompiledPredicate
///
/// A WHERE fragment and its parameters, in placeholder order.
/// `clause == None` matches every row.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompiledPredicate {
    pub clause: Option<String>,
    pub params: Vec<Value>,
}

impl CompiledPredicate {
    #[must_use]
    pub const fn is_unfiltered(&self) -> bool {
        self.clause.is_none()
    }
}

///
/// PredicateCompiler
///

#[derive(Clone, Copy, Debug)]
pub struct PredicateCompiler<'a> {
    dialect: Dialect,
    model: Option<&'a EntityModel>,
    max_depth: usize,
}

impl<'a> PredicateCompiler<'a> {
    #[must_use]
    pub const fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            model: None,
            max_depth: DEFAULT_MAX_FILTER_DEPTH,
        }
    }

    /// Validate field names, operators and literal shapes against `model`.
    #[must_use]
    pub const fn with_model(mut self, model: &'a EntityModel) -> Self {
        self.model = Some(model);
        self
    }

    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Validate and lower to the predicate IR. `None` and the empty
    /// expression both lower to `Predicate::True`.
    pub fn lower(&self, expr: Option<&FilterExpr>) -> Result<Predicate, CompileError> {
        match expr {
            Some(expr) => Lowerer::new(self.model, self.max_depth).lower(expr),
            None => Ok(Predicate::True),
        }
    }

    pub fn compile(&self, expr: Option<&FilterExpr>) -> Result<CompiledPredicate, CompileError> {
        let predicate = self.lower(expr)?;

        Ok(render_sql(&predicate, self.dialect))
    }

    /// Lower and convert literals into parameter references for the
    /// document dialect. Parameters are appended to `params`.
    pub fn compile_document(
        &self,
        expr: Option<&FilterExpr>,
        params: &mut Vec<Value>,
    ) -> Result<Predicate<ParamRef>, CompileError> {
        let predicate = self.lower(expr)?;

        Ok(predicate.map_values(&mut |value| {
            params.push(value);
            ParamRef(params.len() - 1)
        }))
    }
}

/// Compile a filter without schema validation, using `?` placeholders and
/// double-quoted identifiers.
pub fn compile(expr: Option<&FilterExpr>) -> Result<CompiledPredicate, CompileError> {
    PredicateCompiler::new(Dialect::Sqlite).compile(expr)
}

/// Render a lowered predicate. `True` renders as no clause at all.
#[must_use]
pub fn render_sql(predicate: &Predicate, dialect: Dialect) -> CompiledPredicate {
    if predicate.is_true() {
        return CompiledPredicate::default();
    }

    let (clause, params) = render_fragment(predicate, dialect);

    CompiledPredicate {
        clause: Some(clause),
        params,
    }
}

// Each compound child is rendered with its own parameter list, which is
// then appended in order; parameter order therefore tracks text order.
fn render_fragment(predicate: &Predicate, dialect: Dialect) -> (String, Vec<Value>) {
    let q = |field: &str| dialect.quote_ident(field);

    match predicate {
        Predicate::True => ("1 = 1".to_string(), Vec::new()),
        Predicate::False => ("1 = 0".to_string(), Vec::new()),
        Predicate::Compare { field, op, value } => (
            format!("{} {} ?", q(field), op.sql_symbol()),
            vec![value.clone()],
        ),
        Predicate::Text { field, op, value } => {
            let needle = value.as_text().unwrap_or_default();
            (
                format!("{} LIKE ? ESCAPE '{LIKE_ESCAPE}'", q(field)),
                vec![Value::Text(like_pattern(*op, needle))],
            )
        }
        Predicate::In { field, values } => (
            format!("{} IN ({})", q(field), placeholders(values.len())),
            values.clone(),
        ),
        Predicate::NotIn { field, values } => (
            format!("{} NOT IN ({})", q(field), placeholders(values.len())),
            values.clone(),
        ),
        Predicate::IsNull { field } => (format!("{} IS NULL", q(field)), Vec::new()),
        Predicate::IsNotNull { field } => (format!("{} IS NOT NULL", q(field)), Vec::new()),
        Predicate::And(children) => join_children(children, " AND ", dialect),
        Predicate::Or(children) => join_children(children, " OR ", dialect),
        Predicate::Not(inner) => {
            let (text, params) = render_fragment(inner, dialect);
            (format!("NOT ({text})"), params)
        }
    }
}

fn join_children(children: &[Predicate], keyword: &str, dialect: Dialect) -> (String, Vec<Value>) {
    let mut parts = Vec::with_capacity(children.len());
    let mut params = Vec::new();

    for child in children {
        let (text, child_params) = render_fragment(child, dialect);
        if child.is_compound() {
            parts.push(format!("({text})"));
        } else {
            parts.push(text);
        }
        params.extend(child_params);
    }

    (parts.join(keyword), params)
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn like_pattern(op: TextOp, needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(ch);
    }

    match op {
        TextOp::Contains => format!("%{escaped}%"),
        TextOp::StartsWith => format!("{escaped}%"),
        TextOp::EndsWith => format!("%{escaped}"),
    }
}
