//! Module: predicate
//! Responsibility: filter expressions, their validated IR, SQL rendering and row evaluation.
//! Does not own: statement assembly or execution.
//! Boundary: `FilterExpr` in, `Predicate` IR or `CompiledPredicate` out.

mod ast;
mod compile;
mod eval;
mod expr;
mod lower;
mod parse;

#[cfg(test)]
mod tests;

pub use ast::{CompareOp, ParamRef, Predicate, TextOp};
pub use compile::{CompiledPredicate, PredicateCompiler, compile, render_sql};
pub use eval::{FieldSource, Truth, eval_row, eval_with};
pub use expr::{FieldFilter, FilterExpr, FilterNode, FilterOp};
