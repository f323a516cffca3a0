//! Module: query
//! Responsibility: operation arguments, dialects, and command assembly.
//! Does not own: filter lowering (see `predicate`) or execution (see `adapter`).

mod args;
mod assemble;
mod command;
mod dialect;


pub use args::{
    AggregateCall, AggregateFn, AggregateSpec, Operation, OrderDirection, OrderSpec, QueryArgs,
};
pub use assemble::{QueryAssembler, assemble, reshape_aggregates};
pub use command::{CommandBody, CompiledCommand, DocumentCommand, QueryResult};
pub use dialect::Dialect;
