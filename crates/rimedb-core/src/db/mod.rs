//! Module: db
//! Responsibility: everything between a model call and the backend.
//!
//! Flow of one model operation:
//! `client` → middleware (`extension`) → rewriters → `query` assembly
//! (filters via `predicate`) → `adapter` → computed fields → caller.

pub mod adapter;
pub mod client;
pub mod extension;
pub mod predicate;
pub mod query;
pub mod transaction;

pub use adapter::{Adapter, MemoryAdapter, MemoryStore, SharedAdapter};
pub use client::{Client, ModelContext, ModelDelegate, OperationResult};
pub use extension::{ExtensionDescriptor, ModelScope, PipelineContext};
pub use predicate::{FilterExpr, compile};
pub use query::{CompiledCommand, Dialect, Operation, QueryArgs, QueryResult, assemble};
pub use transaction::{TransactionCoordinator, run_in_transaction};
