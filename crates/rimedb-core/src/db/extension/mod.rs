//! Module: extension
//! Responsibility: extension descriptors, their composition, middleware and computed fields.
//! Does not own: operation execution (see `client`).

mod compute;
mod context;
mod descriptor;
mod middleware;


pub use compute::{Computer, Selection, plan_selection};
pub use context::{BUILTIN_CLIENT_METHODS, PipelineContext};
pub use descriptor::{
    BoxFuture, ClientMethod, ComputeFn, ExtensionDescriptor, MethodFuture, Middleware,
    ModelMethod, ModelScope, QueryRewriter, ResultField,
};
pub use middleware::{MiddlewareParams, Next};

pub(crate) use middleware::Terminal;
