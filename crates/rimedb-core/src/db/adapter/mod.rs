//! Module: adapter
//! Responsibility: the storage contract every backend implements.
//! Does not own: command construction (query) or transaction policy (transaction).
//! Boundary: the only place commands leave the core.

pub mod memory;

use crate::{
    db::query::{CompiledCommand, Dialect, QueryResult},
    error::Error,
};
use async_trait::async_trait;
use std::sync::Arc;

pub use memory::{MemoryAdapter, MemoryStore};

///
/// Adapter
///
/// Per-backend implementation of the storage contract.
///
/// `begin_transaction` hands back a transaction-scoped adapter with the
/// identical contract; `commit_transaction` / `rollback_transaction` are
/// only valid on that scoped handle, and only once.
///

#[async_trait]
pub trait Adapter: Send + Sync {
    /// Dialect the assembler must produce commands in.
    fn dialect(&self) -> Dialect;

    async fn connect(&self) -> Result<(), Error>;

    async fn disconnect(&self) -> Result<(), Error>;

    fn is_connected(&self) -> bool;

    /// Whether this handle is scoped to an open transaction.
    fn in_transaction(&self) -> bool;

    /// Execute one command. Fails with `NotConnected` when disconnected and
    /// with `ConstraintViolation` (backend message verbatim) on constraint
    /// failures.
    async fn execute(&self, command: CompiledCommand) -> Result<QueryResult, Error>;

    async fn begin_transaction(&self) -> Result<Arc<dyn Adapter>, Error>;

    async fn commit_transaction(&self) -> Result<(), Error>;

    async fn rollback_transaction(&self) -> Result<(), Error>;
}

/// Shared adapter handle carried by clients.
pub type SharedAdapter = Arc<dyn Adapter>;
