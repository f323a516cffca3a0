//! Module: client::delegate
//! Responsibility: per-model operations and the path each call takes through the pipeline.
//! Does not own: extension lookup rules (extension::context).
//! Boundary: middleware wraps rewrite, assembly, execution and computed fields, in that order.

use crate::{
    db::{
        client::{Client, OperationResult},
        extension::{
            BoxFuture, Computer, MiddlewareParams, Next, Selection, Terminal, plan_selection,
        },
        predicate::FilterExpr,
        query::{
            CompiledCommand, Dialect, Operation, QueryArgs, QueryAssembler, QueryResult,
            reshape_aggregates,
        },
    },
    error::Error,
    model::EntityModel,
    obs::MetricsEvent,
    value::{Row, Value},
};
use std::{collections::BTreeMap, fmt, sync::Arc};

///
/// ModelDelegate
///
/// Operation table of one model, bound to the client it came from.
///

#[derive(Clone)]
pub struct ModelDelegate {
    client: Client,
    entity: Arc<EntityModel>,
}

impl ModelDelegate {
    pub(crate) const fn new(client: Client, entity: Arc<EntityModel>) -> Self {
        Self { client, entity }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.entity.name
    }

    #[must_use]
    pub fn entity(&self) -> &EntityModel {
        &self.entity
    }

    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    // --- Operations ---

    pub async fn find_many(&self, args: impl Into<QueryArgs>) -> Result<Vec<Row>, Error> {
        self.run(Operation::FindMany, args.into())
            .await?
            .into_records()
    }

    pub async fn find_first(&self, args: impl Into<QueryArgs>) -> Result<Option<Row>, Error> {
        self.run(Operation::FindFirst, args.into())
            .await?
            .into_record()
    }

    pub async fn find_unique(&self, args: impl Into<QueryArgs>) -> Result<Option<Row>, Error> {
        self.run(Operation::FindUnique, args.into())
            .await?
            .into_record()
    }

    pub async fn create(&self, args: impl Into<QueryArgs>) -> Result<Row, Error> {
        self.run(Operation::Create, args.into())
            .await?
            .into_record()?
            .ok_or_else(|| self.not_found())
    }

    pub async fn update(&self, args: impl Into<QueryArgs>) -> Result<Row, Error> {
        self.run(Operation::Update, args.into())
            .await?
            .into_record()?
            .ok_or_else(|| self.not_found())
    }

    pub async fn update_many(&self, args: impl Into<QueryArgs>) -> Result<u64, Error> {
        self.run(Operation::UpdateMany, args.into())
            .await?
            .into_count()
    }

    pub async fn delete(&self, args: impl Into<QueryArgs>) -> Result<Row, Error> {
        self.run(Operation::Delete, args.into())
            .await?
            .into_record()?
            .ok_or_else(|| self.not_found())
    }

    pub async fn delete_many(&self, args: impl Into<QueryArgs>) -> Result<u64, Error> {
        self.run(Operation::DeleteMany, args.into())
            .await?
            .into_count()
    }

    pub async fn count(&self, args: impl Into<QueryArgs>) -> Result<u64, Error> {
        self.run(Operation::Count, args.into()).await?.into_count()
    }

    /// Aggregates keyed as `_count` and `_sum: { field }` style objects.
    pub async fn aggregate(&self, args: impl Into<QueryArgs>) -> Result<Row, Error> {
        self.run(Operation::Aggregate, args.into())
            .await?
            .into_aggregate()
    }

    pub async fn group_by(&self, args: impl Into<QueryArgs>) -> Result<Vec<Row>, Error> {
        self.run(Operation::GroupBy, args.into())
            .await?
            .into_records()
    }

    /// Invoke a method by name: an injected model method if one is in
    /// scope, otherwise the base operation of that name.
    pub async fn call(&self, method: &str, args: Value) -> Result<Value, Error> {
        let pipeline = self.client.pipeline();

        if let Some((index, method_fn)) = pipeline.model_method(self.name(), method) {
            let next = Self::new(
                self.client.with_pipeline(pipeline.prefix(index)),
                Arc::clone(&self.entity),
            );
            let ctx = ModelContext {
                this: self.clone(),
                next,
            };

            return method_fn(ctx, args).await;
        }

        let Some(operation) = Operation::from_name(method) else {
            return Err(Error::UnknownMethod {
                target: format!("model '{}'", self.name()),
                method: method.to_string(),
            });
        };
        let args = QueryArgs::from_value(&args)?;

        Ok(self.run(operation, args).await?.into_value())
    }

    /// Run one base operation through middleware and the pipeline.
    pub async fn run(
        &self,
        operation: Operation,
        args: QueryArgs,
    ) -> Result<OperationResult, Error> {
        let this = self.clone();
        let terminal: Terminal = Arc::new(
            move |params: MiddlewareParams| -> BoxFuture<'static, Result<OperationResult, Error>> {
                let this = this.clone();
                Box::pin(async move { this.execute(params.operation, params.args).await })
            },
        );

        let params = MiddlewareParams {
            model: self.name().to_string(),
            operation,
            args,
        };

        Next::new(self.client.pipeline().middleware(), terminal)
            .run(params)
            .await
    }

    // --- Pipeline ---

    // Rewrite, execute, then compute. Computed fields only apply to
    // operations that hand back records.
    async fn execute(
        &self,
        operation: Operation,
        args: QueryArgs,
    ) -> Result<OperationResult, Error> {
        let name = self.name();
        let pipeline = self.client.pipeline();
        let mut args = pipeline.rewrite(name, operation, args)?;

        let (fields, selection) = if operation.returns_records() {
            let fields = pipeline.result_fields(name);
            let selection = plan_selection(&args.select, &fields);
            args.select.clone_from(&selection.backend);
            (fields, selection)
        } else {
            (BTreeMap::new(), Selection::default())
        };

        let sink = self.client.sink().as_ref();
        sink.record(MetricsEvent::ExecStart {
            model: name,
            operation,
        });
        let result = self.dispatch(operation, &args).await;
        sink.record(MetricsEvent::ExecFinish {
            model: name,
            operation,
            rows: result.as_ref().map_or(0, |result| result.len() as u64),
            ok: result.is_ok(),
        });

        let mut result = result?;
        Computer::new(&self.entity, self.client.data_model(), &fields, sink)
            .apply(result.rows_mut(), &selection);

        Ok(result)
    }

    async fn dispatch(
        &self,
        operation: Operation,
        args: &QueryArgs,
    ) -> Result<OperationResult, Error> {
        let dialect = self.client.dialect();
        let single_write = matches!(
            operation,
            Operation::Create | Operation::Update | Operation::Delete
        );

        if single_write && dialect.is_relational() && !dialect.supports_returning() {
            let entity = Arc::clone(&self.entity);
            let args = args.clone();

            return self
                .client
                .transaction(move |tx| async move {
                    Self::new(tx, entity).write_then_read(operation, &args).await
                })
                .await;
        }

        let command = self.assembler(dialect).assemble(operation, args)?;
        let result = self.client.send(command).await?;

        self.shape(operation, result)
    }

    // Single-row writes for dialects without RETURNING: the affected row is
    // read with follow-up queries on the same transaction.
    async fn write_then_read(
        &self,
        operation: Operation,
        args: &QueryArgs,
    ) -> Result<OperationResult, Error> {
        let assembler = self.assembler(self.client.dialect());
        let pk = self.entity.primary_key.as_str();
        let new_key = args
            .data
            .as_ref()
            .and_then(|data| data.get(pk))
            .filter(|value| !value.is_nullish())
            .cloned();

        match operation {
            Operation::Create => {
                self.client
                    .send(assembler.assemble(operation, args)?)
                    .await?;
                let read = match new_key {
                    Some(key) => assembler.assemble(Operation::FindUnique, &self.by_key(key, args))?,
                    None => assembler.last_inserted(&args.select),
                };

                Ok(OperationResult::Record(self.first(read).await?))
            }
            Operation::Update => {
                let probe = QueryArgs::new()
                    .select([pk])
                    .filter(args.filter.clone().unwrap_or_default());
                let old_key = self
                    .first(assembler.assemble(Operation::FindUnique, &probe)?)
                    .await?
                    .and_then(|mut row| row.remove(pk))
                    .ok_or_else(|| self.not_found())?;

                self.client
                    .send(assembler.assemble(operation, args)?)
                    .await?;
                let key = new_key.unwrap_or(old_key);
                let read = assembler.assemble(Operation::FindUnique, &self.by_key(key, args))?;

                Ok(OperationResult::Record(self.first(read).await?))
            }
            Operation::Delete => {
                let read = QueryArgs {
                    filter: args.filter.clone(),
                    select: args.select.clone(),
                    ..QueryArgs::new()
                };
                let row = self
                    .first(assembler.assemble(Operation::FindUnique, &read)?)
                    .await?
                    .ok_or_else(|| self.not_found())?;

                self.client
                    .send(assembler.assemble(operation, args)?)
                    .await?;

                Ok(OperationResult::Record(Some(row)))
            }
            _ => {
                let result = self
                    .client
                    .send(assembler.assemble(operation, args)?)
                    .await?;

                self.shape(operation, result)
            }
        }
    }

    fn shape(&self, operation: Operation, result: QueryResult) -> Result<OperationResult, Error> {
        let QueryResult { rows, row_count } = result;

        let shaped = match operation {
            Operation::FindMany => OperationResult::Records(rows),
            Operation::FindFirst | Operation::FindUnique | Operation::Create => {
                OperationResult::Record(rows.into_iter().next())
            }
            Operation::Update | Operation::Delete => {
                let row = rows.into_iter().next().ok_or_else(|| self.not_found())?;
                OperationResult::Record(Some(row))
            }
            Operation::UpdateMany | Operation::DeleteMany => OperationResult::Count(row_count),
            Operation::Count => {
                let count = rows
                    .first()
                    .and_then(|row| row.get("_count"))
                    .and_then(Value::as_i64)
                    .and_then(|count| u64::try_from(count).ok())
                    .unwrap_or(0);
                OperationResult::Count(count)
            }
            Operation::Aggregate => OperationResult::Aggregate(reshape_aggregates(
                rows.into_iter().next().unwrap_or_default(),
            )),
            Operation::GroupBy => {
                OperationResult::Groups(rows.into_iter().map(reshape_aggregates).collect())
            }
        };

        Ok(shaped)
    }

    // --- Helpers ---

    fn assembler(&self, dialect: Dialect) -> QueryAssembler<'_> {
        QueryAssembler::new(dialect, &self.entity)
            .max_depth(self.client.client_config().max_filter_depth)
    }

    fn by_key(&self, key: Value, args: &QueryArgs) -> QueryArgs {
        QueryArgs::new()
            .filter(FilterExpr::new().eq(self.entity.primary_key.clone(), key))
            .select(args.select.iter().cloned())
    }

    async fn first(&self, command: CompiledCommand) -> Result<Option<Row>, Error> {
        Ok(self.client.send(command).await?.rows.into_iter().next())
    }

    fn not_found(&self) -> Error {
        Error::RecordNotFound {
            model: self.entity.name.clone(),
        }
    }
}

impl fmt::Debug for ModelDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDelegate")
            .field("model", &self.entity.name)
            .finish_non_exhaustive()
    }
}

///
/// ModelContext
///
/// Explicit receiver handed to injected model methods. `this` is the
/// model with every extension applied; `next` is the model as it was
/// before the extension that defined the running method.
///

#[derive(Clone, Debug)]
pub struct ModelContext {
    this: ModelDelegate,
    next: ModelDelegate,
}

impl ModelContext {
    #[must_use]
    pub const fn this(&self) -> &ModelDelegate {
        &self.this
    }

    #[must_use]
    pub const fn next(&self) -> &ModelDelegate {
        &self.next
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.this.name()
    }

    #[must_use]
    pub const fn client(&self) -> &Client {
        self.this.client()
    }
}
