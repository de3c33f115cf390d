//! Tree-walking interpreter backend.
//!
//! Runs analysed translation units and REPL statements directly over the
//! AST through the [`StmtVisitor`](crate::ast::visitor::StmtVisitor)
//! protocol. Host functions can be bound to `extern` declarations with
//! [`Interpreter::register_function`](interpreter::Interpreter::register_function).

pub mod interpreter;
pub mod storage;
pub mod value;

#[cfg(test)]
mod tests;
