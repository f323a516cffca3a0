//! Module: query::assemble
//! Responsibility: turn (model, operation, args) into one complete backend command.
//! Does not own: filter lowering (predicate), execution (adapter), result shaping (client).
//! Boundary: every validation error surfaces here, before an adapter sees anything.

use crate::{
    config::DEFAULT_MAX_FILTER_DEPTH,
    db::{
        predicate::{
            FieldFilter, FilterExpr, FilterNode, FilterOp, ParamRef, PredicateCompiler, render_sql,
        },
        query::{
            Dialect,
            args::{AggregateCall, AggregateFn, Operation, OrderDirection, QueryArgs},
            command::{CompiledCommand, DocumentCommand},
        },
    },
    error::CompileError,
    model::{EntityModel, FieldModel},
    value::{Row, Value},
};

///
/// QueryAssembler
///
/// Assembles commands for one model in one dialect. Relational dialects
/// produce SQL with placeholders numbered in occurrence order; `Document`
/// produces a structured command over the same parameter list.
///

#[derive(Clone, Copy, Debug)]
pub struct QueryAssembler<'a> {
    dialect: Dialect,
    model: &'a EntityModel,
    max_depth: usize,
}

impl<'a> QueryAssembler<'a> {
    #[must_use]
    pub const fn new(dialect: Dialect, model: &'a EntityModel) -> Self {
        Self {
            dialect,
            model,
            max_depth: DEFAULT_MAX_FILTER_DEPTH,
        }
    }

    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn assemble(
        &self,
        operation: Operation,
        args: &QueryArgs,
    ) -> Result<CompiledCommand, CompileError> {
        let plan = self.plan(operation, args)?;

        if self.dialect.is_relational() {
            self.assemble_sql(&plan, args)
        } else {
            self.assemble_document(&plan, args)
        }
    }

    // --- Validation ---

    fn plan(&self, operation: Operation, args: &QueryArgs) -> Result<Plan, CompileError> {
        let model = self.model;

        if operation.requires_unique_filter() && !has_unique_equality(model, args.filter.as_ref())
        {
            return Err(CompileError::UniqueWhereRequired {
                model: model.name.clone(),
                operation: operation.name().to_string(),
            });
        }

        for field in &args.select {
            self.column(field, "select")?;
        }
        for (field, _) in &args.order_by {
            let column = self.column(field, "orderBy")?;
            if column.list {
                return Err(unsupported(column, "orderBy"));
            }
        }

        let data = match operation {
            Operation::Create => Some(self.checked_data(operation, args, true)?),
            Operation::Update | Operation::UpdateMany => {
                Some(self.checked_data(operation, args, false)?)
            }
            _ => None,
        };

        let aggregates = match operation {
            Operation::Count => vec![AggregateCall {
                func: AggregateFn::Count,
                field: None,
            }],
            Operation::Aggregate | Operation::GroupBy => self.checked_aggregates(operation, args)?,
            _ => Vec::new(),
        };

        if operation == Operation::GroupBy {
            if args.by.is_empty() {
                return Err(CompileError::MissingArgument {
                    operation: operation.name().to_string(),
                    argument: "by".to_string(),
                });
            }
            for field in &args.by {
                self.column(field, "by")?;
            }
        }

        let limit = match operation {
            Operation::FindFirst => Some(1),
            Operation::FindMany | Operation::GroupBy => args.limit(),
            _ => None,
        };
        let skip = match operation {
            Operation::FindFirst | Operation::FindMany | Operation::GroupBy => args.skip,
            _ => None,
        };

        Ok(Plan {
            operation,
            data,
            aggregates,
            limit,
            skip,
        })
    }

    fn column(&self, name: &str, context: &str) -> Result<&'a FieldModel, CompileError> {
        let field = self
            .model
            .get_field(name)
            .ok_or_else(|| CompileError::UnknownField {
                model: self.model.name.clone(),
                field: name.to_string(),
            })?;

        if field.kind.is_relation() {
            return Err(unsupported(field, context));
        }

        Ok(field)
    }

    fn checked_data(
        &self,
        operation: Operation,
        args: &QueryArgs,
        allow_empty: bool,
    ) -> Result<Vec<(String, Value)>, CompileError> {
        let data = match &args.data {
            Some(data) if allow_empty || !data.is_empty() => data,
            _ => {
                return Err(CompileError::MissingArgument {
                    operation: operation.name().to_string(),
                    argument: "data".to_string(),
                });
            }
        };

        data.iter()
            .map(|(name, value)| {
                let field = self.column(name, "data")?;
                let fits = if value.is_nullish() {
                    field.optional
                } else {
                    field.accepts(value)
                };
                if !fits {
                    return Err(CompileError::TypeMismatch {
                        field: name.clone(),
                        operator: "data".to_string(),
                        expected: format!("{:?}", field.kind),
                        found: value.kind_label().to_string(),
                    });
                }

                Ok((name.clone(), value.clone()))
            })
            .collect()
    }

    fn checked_aggregates(
        &self,
        operation: Operation,
        args: &QueryArgs,
    ) -> Result<Vec<AggregateCall>, CompileError> {
        let calls = args.aggregate.calls();
        if calls.is_empty() && operation == Operation::Aggregate {
            return Err(CompileError::MissingArgument {
                operation: operation.name().to_string(),
                argument: "_count, _sum, _avg, _min or _max".to_string(),
            });
        }

        for call in &calls {
            let Some(name) = &call.field else { continue };
            let field = self.column(name, call.func.prefix())?;
            let supported = match call.func {
                AggregateFn::Sum | AggregateFn::Avg => field.kind.supports_arithmetic(),
                AggregateFn::Min | AggregateFn::Max => field.kind.supports_ordering(),
                AggregateFn::Count => true,
            };
            if !supported || field.list {
                return Err(unsupported(field, call.func.prefix()));
            }
        }

        Ok(calls)
    }

    /// Read-back of the row MySQL just inserted when the data did not carry
    /// the primary key. Must run on the connection that did the insert.
    #[must_use]
    pub fn last_inserted(&self, select: &[String]) -> CompiledCommand {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = LAST_INSERT_ID()",
            self.projection(select),
            self.dialect.quote_ident(&self.model.table),
            self.dialect.quote_ident(&self.model.primary_key)
        );

        CompiledCommand::sql(sql, Vec::new())
    }

    fn compiler(&self) -> PredicateCompiler<'a> {
        PredicateCompiler::new(self.dialect)
            .with_model(self.model)
            .max_depth(self.max_depth)
    }

    // --- Relational ---

    fn assemble_sql(&self, plan: &Plan, args: &QueryArgs) -> Result<CompiledCommand, CompileError> {
        let dialect = self.dialect;
        let table = dialect.quote_ident(&self.model.table);
        let lowered = self.compiler().lower(args.filter.as_ref())?;
        let predicate = render_sql(&lowered, dialect);
        let where_clause = predicate
            .clause
            .map(|clause| format!(" WHERE {clause}"))
            .unwrap_or_default();

        let mut params = Vec::new();
        let mut sql = match plan.operation {
            Operation::FindMany | Operation::FindFirst | Operation::FindUnique => {
                params.extend(predicate.params);
                format!(
                    "SELECT {} FROM {table}{where_clause}",
                    self.projection(&args.select)
                )
            }
            Operation::Create => {
                let data = plan.data.as_deref().unwrap_or_default();
                let mut sql = if data.is_empty() {
                    match dialect {
                        Dialect::MySql => format!("INSERT INTO {table} () VALUES ()"),
                        _ => format!("INSERT INTO {table} DEFAULT VALUES"),
                    }
                } else {
                    let columns: Vec<String> =
                        data.iter().map(|(name, _)| dialect.quote_ident(name)).collect();
                    format!(
                        "INSERT INTO {table} ({}) VALUES ({})",
                        columns.join(", "),
                        vec!["?"; data.len()].join(", ")
                    )
                };
                params.extend(data.iter().map(|(_, value)| value.clone()));
                self.push_returning(&mut sql, &args.select);
                sql
            }
            Operation::Update | Operation::UpdateMany => {
                let data = plan.data.as_deref().unwrap_or_default();
                let assignments: Vec<String> = data
                    .iter()
                    .map(|(name, _)| format!("{} = ?", dialect.quote_ident(name)))
                    .collect();
                // SET values precede WHERE values, matching placeholder order.
                params.extend(data.iter().map(|(_, value)| value.clone()));
                params.extend(predicate.params);
                let mut sql = format!(
                    "UPDATE {table} SET {}{where_clause}",
                    assignments.join(", ")
                );
                self.push_returning(&mut sql, &args.select);
                sql
            }
            Operation::Delete | Operation::DeleteMany => {
                params.extend(predicate.params);
                let mut sql = format!("DELETE FROM {table}{where_clause}");
                self.push_returning(&mut sql, &args.select);
                sql
            }
            Operation::Count | Operation::Aggregate => {
                params.extend(predicate.params);
                format!(
                    "SELECT {} FROM {table}{where_clause}",
                    self.aggregate_columns(&plan.aggregates)
                )
            }
            Operation::GroupBy => {
                params.extend(predicate.params);
                let keys: Vec<String> = args.by.iter().map(|f| dialect.quote_ident(f)).collect();
                let mut columns = keys.clone();
                if !plan.aggregates.is_empty() {
                    columns.push(self.aggregate_columns(&plan.aggregates));
                }
                format!(
                    "SELECT {} FROM {table}{where_clause} GROUP BY {}",
                    columns.join(", "),
                    keys.join(", ")
                )
            }
        };

        if matches!(
            plan.operation,
            Operation::FindMany | Operation::FindFirst | Operation::FindUnique | Operation::GroupBy
        ) {
            self.push_order(&mut sql, args);
            self.push_paging(&mut sql, plan.limit, plan.skip);
        }

        Ok(CompiledCommand::sql(dialect.number_placeholders(&sql), params))
    }

    fn projection(&self, select: &[String]) -> String {
        let columns: Vec<String> = if select.is_empty() {
            self.model
                .column_fields()
                .map(|field| self.dialect.quote_ident(&field.name))
                .collect()
        } else {
            select.iter().map(|f| self.dialect.quote_ident(f)).collect()
        };

        columns.join(", ")
    }

    fn aggregate_columns(&self, calls: &[AggregateCall]) -> String {
        calls
            .iter()
            .map(|call| {
                let target = call
                    .field
                    .as_deref()
                    .map_or_else(|| "*".to_string(), |f| self.dialect.quote_ident(f));
                format!(
                    "{}({target}) AS {}",
                    call.func.sql_name(),
                    self.dialect.quote_ident(&call.alias())
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn push_returning(&self, sql: &mut String, select: &[String]) {
        if self.dialect.supports_returning() {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.projection(select));
        }
    }

    fn push_order(&self, sql: &mut String, args: &QueryArgs) {
        if args.order_by.is_empty() {
            return;
        }

        let keys: Vec<String> = args
            .order_by
            .iter()
            .map(|(field, direction)| {
                format!(
                    "{} {}",
                    self.dialect.quote_ident(field),
                    direction.sql_keyword()
                )
            })
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&keys.join(", "));
    }

    // LIMIT and OFFSET are validated integers and are inlined.
    fn push_paging(&self, sql: &mut String, limit: Option<u64>, skip: Option<u64>) {
        match (limit, skip) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(_)) => {
                if let Some(unbounded) = self.dialect.unbounded_limit() {
                    sql.push_str(&format!(" LIMIT {unbounded}"));
                }
            }
            (None, None) => {}
        }
        if let Some(skip) = skip {
            sql.push_str(&format!(" OFFSET {skip}"));
        }
    }

    // --- Document ---

    fn assemble_document(
        &self,
        plan: &Plan,
        args: &QueryArgs,
    ) -> Result<CompiledCommand, CompileError> {
        let collection = self.model.table.clone();
        let mut params = Vec::new();

        let data = plan.data.as_deref().unwrap_or_default();
        let command = match plan.operation {
            Operation::FindMany | Operation::FindFirst | Operation::FindUnique => {
                DocumentCommand::Find {
                    collection,
                    filter: self.compiler().compile_document(args.filter.as_ref(), &mut params)?,
                    select: args.select.clone(),
                    order: order_pairs(args),
                    skip: plan.skip.unwrap_or(0),
                    take: plan.limit,
                }
            }
            Operation::Create => DocumentCommand::Insert {
                collection,
                fields: assign(data, &mut params),
            },
            Operation::Update | Operation::UpdateMany => {
                // Assignment parameters come first, as in UPDATE ... SET ... WHERE.
                let set = assign(data, &mut params);
                DocumentCommand::Update {
                    collection,
                    filter: self.compiler().compile_document(args.filter.as_ref(), &mut params)?,
                    set,
                }
            }
            Operation::Delete | Operation::DeleteMany => DocumentCommand::Delete {
                collection,
                filter: self.compiler().compile_document(args.filter.as_ref(), &mut params)?,
            },
            Operation::Count => DocumentCommand::Count {
                collection,
                filter: self.compiler().compile_document(args.filter.as_ref(), &mut params)?,
            },
            Operation::Aggregate => DocumentCommand::Aggregate {
                collection,
                filter: self.compiler().compile_document(args.filter.as_ref(), &mut params)?,
                aggregates: plan.aggregates.clone(),
            },
            Operation::GroupBy => DocumentCommand::GroupBy {
                collection,
                filter: self.compiler().compile_document(args.filter.as_ref(), &mut params)?,
                by: args.by.clone(),
                aggregates: plan.aggregates.clone(),
                order: order_pairs(args),
                skip: plan.skip.unwrap_or(0),
                take: plan.limit,
            },
        };

        Ok(CompiledCommand::document(command, params))
    }
}

/// Assemble one command with the default depth bound.
pub fn assemble(
    dialect: Dialect,
    model: &EntityModel,
    operation: Operation,
    args: &QueryArgs,
) -> Result<CompiledCommand, CompileError> {
    QueryAssembler::new(dialect, model).assemble(operation, args)
}

/// Reshape dotted aggregate aliases (`_sum.age`) into nested objects
/// (`_sum: { age }`). Keys without a dot are kept as they are.
#[must_use]
pub fn reshape_aggregates(row: Row) -> Row {
    let mut shaped = Row::new();
    for (key, value) in row {
        match key.split_once('.') {
            Some((prefix, field)) if prefix.starts_with('_') => {
                let entry = shaped
                    .entry(prefix.to_string())
                    .or_insert_with(|| Value::Object(Row::new()));
                if let Value::Object(group) = entry {
                    group.insert(field.to_string(), value);
                }
            }
            _ => {
                shaped.insert(key, value);
            }
        }
    }

    shaped
}

///
/// Plan
/// Validated, operation-specific parts shared by both assembly paths.
///

struct Plan {
    operation: Operation,
    data: Option<Vec<(String, Value)>>,
    aggregates: Vec<AggregateCall>,
    limit: Option<u64>,
    skip: Option<u64>,
}

fn assign(data: &[(String, Value)], params: &mut Vec<Value>) -> Vec<(String, ParamRef)> {
    data.iter()
        .map(|(name, value)| {
            params.push(value.clone());
            (name.clone(), ParamRef(params.len() - 1))
        })
        .collect()
}

fn order_pairs(args: &QueryArgs) -> Vec<(String, OrderDirection)> {
    args.order_by.iter().cloned().collect()
}

fn unsupported(field: &FieldModel, operator: &str) -> CompileError {
    CompileError::OperatorNotSupported {
        field: field.name.clone(),
        operator: operator.to_string(),
        kind: format!("{:?}", field.kind),
    }
}

// True when the filter pins a unique field to one non-null value, either
// directly or through `equals`, at the top level or inside a top-level
// `AND` (whose children are conjoined with that level).
fn has_unique_equality(model: &EntityModel, filter: Option<&FilterExpr>) -> bool {
    let Some(filter) = filter else {
        return false;
    };

    filter.nodes().iter().any(|node| match node {
        FilterNode::Field { field, filter } => {
            model.is_unique_field(field) && pins_one_value(filter)
        }
        FilterNode::And(children) => children
            .iter()
            .any(|child| has_unique_equality(model, Some(child))),
        FilterNode::Or(_) | FilterNode::Not(_) => false,
    })
}

fn pins_one_value(filter: &FieldFilter) -> bool {
    match filter {
        FieldFilter::Value(value) => !value.is_nullish(),
        FieldFilter::Ops(ops) => ops
            .iter()
            .any(|(op, value)| *op == FilterOp::Equals && !value.is_nullish()),
    }
}
