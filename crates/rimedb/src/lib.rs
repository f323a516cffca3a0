//! ## Crate layout
//! - `base`: builtin extensions that ship with the client (soft delete).
//! - `core`: runtime engine: values, models, filters, query assembly,
//!   adapters, transactions and the extension pipeline.
//!
//! The `prelude` module is the surface application code needs to declare a
//! data model, open a client and compose extensions onto it.

pub use rimedb_core as core;

pub mod base;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use crate::core::{ClientConfig, CompileError, Error, ErrorClass, db};

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        base::soft_delete::SoftDelete,
        core::{
            db::{Dialect, MemoryAdapter, MemoryStore},
            prelude::*,
        },
    };
}
