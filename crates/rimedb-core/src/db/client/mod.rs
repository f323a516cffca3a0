//! Module: client
//! Responsibility: the caller-facing client and its per-model delegates.
//! Does not own: command assembly (query), storage (adapter), extension composition (extension).
//! Boundary: every model operation enters the extension pipeline here; raw commands do not.

mod delegate;
mod result;

#[cfg(test)]
mod tests;

use crate::{
    config::ClientConfig,
    db::{
        adapter::SharedAdapter,
        extension::{ExtensionDescriptor, PipelineContext},
        query::{CompiledCommand, Dialect, QueryResult},
        transaction::TransactionCoordinator,
    },
    error::{CompileError, Error},
    model::DataModel,
    obs::{SharedSink, noop_sink},
    value::{Row, Value},
};
use std::{fmt, future::Future, sync::Arc};

pub use delegate::{ModelContext, ModelDelegate};
pub use result::OperationResult;

///
/// Client
///
/// Handle over one adapter, one data model and one composed pipeline.
/// Cheap to clone; `extends` returns a new client and leaves this one as
/// it was.
///

#[derive(Clone)]
pub struct Client {
    adapter: SharedAdapter,
    model: Arc<DataModel>,
    pipeline: Arc<PipelineContext>,
    config: Arc<ClientConfig>,
    sink: SharedSink,
}

impl Client {
    #[must_use]
    pub fn new(adapter: SharedAdapter, model: DataModel) -> Self {
        Self {
            adapter,
            model: Arc::new(model),
            pipeline: Arc::new(PipelineContext::new()),
            config: Arc::new(ClientConfig::default()),
            sink: noop_sink(),
        }
    }

    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        let pipeline = (*self.pipeline).clone().strict(config.strict_extensions);
        self.pipeline = Arc::new(pipeline);
        self.config = Arc::new(config);
        self
    }

    #[must_use]
    pub fn with_metrics_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    // --- Accessors ---

    #[must_use]
    pub fn adapter(&self) -> &SharedAdapter {
        &self.adapter
    }

    #[must_use]
    pub fn data_model(&self) -> &DataModel {
        &self.model
    }

    #[must_use]
    pub fn pipeline(&self) -> &PipelineContext {
        &self.pipeline
    }

    #[must_use]
    pub fn client_config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.adapter.dialect()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.adapter.is_connected()
    }

    /// Whether this client is scoped to an open transaction.
    #[must_use]
    pub fn is_transaction(&self) -> bool {
        self.adapter.in_transaction()
    }

    // --- Connection ---

    pub async fn connect(&self) -> Result<(), Error> {
        self.adapter.connect().await
    }

    pub async fn disconnect(&self) -> Result<(), Error> {
        self.adapter.disconnect().await
    }

    // --- Raw access ---

    /// Execute a caller-built command and return the affected row count.
    /// Raw commands skip rewriters, middleware and computed fields.
    pub async fn execute_raw(&self, command: CompiledCommand) -> Result<u64, Error> {
        Ok(self.send(command).await?.row_count)
    }

    /// Execute a caller-built command and return its rows as they are.
    pub async fn query_raw(&self, command: CompiledCommand) -> Result<Vec<Row>, Error> {
        Ok(self.send(command).await?.rows)
    }

    // --- Transactions ---

    /// Run `callback` with a transaction-scoped client that shares this
    /// client's pipeline. Commits on `Ok`, rolls back on `Err`. Called on a
    /// client that is already transaction-scoped, it joins that transaction.
    pub async fn transaction<T, F, Fut>(&self, callback: F) -> Result<T, Error>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        TransactionCoordinator::new(Arc::clone(&self.adapter))
            .metrics_sink(Arc::clone(&self.sink))
            .run(|adapter| callback(self.with_adapter(adapter)))
            .await
    }

    // --- Extensions ---

    /// New client with `extension` applied after every existing one.
    pub fn extends(&self, extension: impl Into<Arc<ExtensionDescriptor>>) -> Result<Self, Error> {
        let pipeline = self.pipeline.compose(extension)?;

        Ok(Self {
            pipeline: Arc::new(pipeline),
            ..self.clone()
        })
    }

    /// Invoke an injected client method. Transaction-scoped clients try
    /// transaction methods first.
    pub async fn call(&self, method: &str, args: Value) -> Result<Value, Error> {
        let found = if self.is_transaction() {
            self.pipeline
                .transaction_method(method)
                .or_else(|| self.pipeline.client_method(method))
        } else {
            self.pipeline.client_method(method)
        };

        match found {
            Some(method_fn) => method_fn(self.clone(), args).await,
            None => Err(Error::UnknownMethod {
                target: "client".to_string(),
                method: method.to_string(),
            }),
        }
    }

    /// Delegate for one model of the data model.
    pub fn model(&self, name: &str) -> Result<ModelDelegate, Error> {
        let entity = self
            .model
            .get(name)
            .ok_or_else(|| CompileError::UnknownModel {
                model: name.to_string(),
            })?;

        Ok(ModelDelegate::new(self.clone(), Arc::clone(entity)))
    }

    // --- Internal ---

    pub(crate) fn with_adapter(&self, adapter: SharedAdapter) -> Self {
        Self {
            adapter,
            ..self.clone()
        }
    }

    pub(crate) fn with_pipeline(&self, pipeline: PipelineContext) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            ..self.clone()
        }
    }

    pub(crate) fn sink(&self) -> &SharedSink {
        &self.sink
    }

    pub(crate) async fn send(&self, command: CompiledCommand) -> Result<QueryResult, Error> {
        if self.config.debug {
            tracing::debug!(
                dialect = %self.adapter.dialect(),
                command = ?command.body,
                params = ?command.params,
                "executing command"
            );
        }

        self.adapter.execute(command).await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("dialect", &self.adapter.dialect())
            .field("models", &self.model.names().collect::<Vec<_>>())
            .field("extensions", &self.pipeline.extension_names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
