//! Parser module driving semantic analysis.
//!
//! This module contains the parser that turns a stream of tokens into
//! calls on [`crate::sema::sema::Sema`]. It uses a Pratt parser for
//! expressions with proper operator precedence and handles:
//!
//! - Declarations (functions, variables, records, enums, modules, aliases)
//! - Statements and control flow
//! - Type parsing for type annotations
//! - Error recovery and reporting
//!
//! The parser uses NUD (null denotation) and LED (left denotation) functions
//! for expression parsing with binding power for precedence handling.

pub mod decl;
pub mod expr;
pub mod lookups;
pub mod parser;
pub mod stmt;
pub mod types;

#[cfg(test)]
mod tests;
