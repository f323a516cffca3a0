//! Core runtime for RimeDB: values, model descriptors, the predicate
//! compiler, query assembly, adapters, transactions and the extension
//! pipeline that ties them to the client.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod obs;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

pub use config::ClientConfig;
pub use error::{CompileError, Error, ErrorClass};

///
/// Prelude
///
/// Domain vocabulary for callers building models, filters and extensions.
/// Adapters, assemblers and sinks stay behind their modules.
///

pub mod prelude {
    pub use crate::{
        config::ClientConfig,
        db::{
            client::{Client, ModelContext, ModelDelegate, OperationResult},
            extension::{ExtensionDescriptor, MiddlewareParams, ModelScope, Next},
            predicate::FilterExpr,
            query::{Operation, OrderDirection, QueryArgs},
        },
        error::Error,
        model::{DataModel, EntityModel, FieldKind, FieldModel},
        value::{Row, Value},
    };
}
