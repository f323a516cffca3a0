//! In-process document backend.
//!
//! Speaks the `Document` dialect, evaluates filters under SQL three-valued
//! logic, and isolates transactions by working on a private copy of the
//! store that is published atomically on commit.

mod store;


use crate::{
    db::{
        adapter::Adapter,
        query::{CommandBody, CompiledCommand, Dialect, QueryResult},
    },
    error::Error,
    value::Row,
};
use async_trait::async_trait;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

pub use store::MemoryStore;

///
/// Shared
/// State common to a root adapter and every transaction it begins.
///

#[derive(Debug)]
struct Shared {
    store: RwLock<MemoryStore>,
    // Held for the lifetime of a transaction and for each autocommit write.
    writer: Arc<Mutex<()>>,
    connected: AtomicBool,
}

///
/// TxInner
///

struct TxInner {
    working: MemoryStore,
    _writer: OwnedMutexGuard<()>,
}

///
/// MemoryAdapter
///
/// Reads outside a transaction see the last committed store. Writes
/// outside a transaction wait for any open transaction to finish.
/// Dropping a transaction handle without committing discards its work.
///

pub struct MemoryAdapter {
    shared: Arc<Shared>,
    tx: Option<Mutex<Option<TxInner>>>,
}

impl MemoryAdapter {
    #[must_use]
    pub fn new(store: MemoryStore) -> Self {
        Self {
            shared: Arc::new(Shared {
                store: RwLock::new(store),
                writer: Arc::new(Mutex::new(())),
                connected: AtomicBool::new(false),
            }),
            tx: None,
        }
    }

    /// Committed contents of one collection.
    pub async fn rows(&self, collection: &str) -> Vec<Row> {
        self.shared.store.read().await.snapshot(collection)
    }

    fn ensure_connected(&self) -> Result<(), Error> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    async fn execute_document(&self, command: CompiledCommand) -> Result<QueryResult, Error> {
        let CommandBody::Document(document) = &command.body else {
            return Err(Error::backend(
                "memory adapter executes document commands only",
            ));
        };
        let params = &command.params;

        // Transaction-scoped: operate on the private copy.
        if let Some(tx) = &self.tx {
            let mut guard = tx.lock().await;
            let inner = guard
                .as_mut()
                .ok_or_else(|| Error::transaction_state("transaction already finished"))?;

            return if document.is_write() {
                inner.working.write(document, params)
            } else {
                inner.working.read(document, params)
            };
        }

        if document.is_write() {
            let _writer = self.shared.writer.lock().await;
            self.shared.store.write().await.write(document, params)
        } else {
            self.shared.store.read().await.read(document, params)
        }
    }

    async fn finish(&self, commit: bool) -> Result<(), Error> {
        let Some(tx) = &self.tx else {
            return Err(Error::transaction_state("no transaction is open on this handle"));
        };
        let inner = tx
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::transaction_state("transaction already finished"))?;

        if commit {
            *self.shared.store.write().await = inner.working;
            tracing::debug!("memory transaction committed");
        } else {
            tracing::debug!("memory transaction rolled back");
        }

        // Writer lock is released when `inner` drops here.
        Ok(())
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new(MemoryStore::new())
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Document
    }

    async fn connect(&self) -> Result<(), Error> {
        if !self.shared.connected.swap(true, Ordering::SeqCst) {
            tracing::info!("memory adapter connected");
        }

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Error> {
        if self.shared.connected.swap(false, Ordering::SeqCst) {
            tracing::info!("memory adapter disconnected");
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    async fn execute(&self, command: CompiledCommand) -> Result<QueryResult, Error> {
        self.ensure_connected()?;

        self.execute_document(command).await
    }

    async fn begin_transaction(&self) -> Result<Arc<dyn Adapter>, Error> {
        self.ensure_connected()?;
        if self.tx.is_some() {
            return Err(Error::transaction_state(
                "nested transactions are not supported",
            ));
        }

        let writer = Arc::clone(&self.shared.writer).lock_owned().await;
        let working = self.shared.store.read().await.clone();
        tracing::debug!("memory transaction started");

        Ok(Arc::new(Self {
            shared: Arc::clone(&self.shared),
            tx: Some(Mutex::new(Some(TxInner {
                working,
                _writer: writer,
            }))),
        }))
    }

    async fn commit_transaction(&self) -> Result<(), Error> {
        self.finish(true).await
    }

    async fn rollback_transaction(&self) -> Result<(), Error> {
        self.finish(false).await
    }
}
