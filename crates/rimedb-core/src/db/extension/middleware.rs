use crate::{
    db::{
        client::OperationResult,
        extension::descriptor::{BoxFuture, Middleware},
        query::{Operation, QueryArgs},
    },
    error::Error,
};
use std::sync::Arc;

pub(crate) type Terminal =
    Arc<dyn Fn(MiddlewareParams) -> BoxFuture<'static, Result<OperationResult, Error>> + Send + Sync>;

///
/// MiddlewareParams
///
/// What a middleware sees before the call proceeds. Changing `args`
/// before calling `next` changes what the rest of the chain receives.
///

#[derive(Clone, Debug)]
pub struct MiddlewareParams {
    pub model: String,
    pub operation: Operation,
    pub args: QueryArgs,
}

///
/// Next
///
/// Handle to the remainder of the middleware chain. Consumed by `run`, so
/// each middleware can forward a call at most once.
///

pub struct Next {
    chain: Arc<[Middleware]>,
    index: usize,
    terminal: Terminal,
}

impl Next {
    pub(crate) fn new(chain: Arc<[Middleware]>, terminal: Terminal) -> Self {
        Self {
            chain,
            index: 0,
            terminal,
        }
    }

    pub fn run(self, params: MiddlewareParams) -> BoxFuture<'static, Result<OperationResult, Error>> {
        match self.chain.get(self.index).cloned() {
            Some(middleware) => {
                let next = Self {
                    chain: self.chain,
                    index: self.index + 1,
                    terminal: self.terminal,
                };
                middleware(params, next)
            }
            None => (self.terminal)(params),
        }
    }
}
