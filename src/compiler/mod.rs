//! Code generation module for the compiler.
//!
//! This module lowers the analysed AST into a small SSA intermediate form
//! modelled after LLVM IR. It handles:
//!
//! - Lowering of expressions and statements into basic blocks
//! - Type conversion from AST types to IR types
//! - Runtime library declarations
//! - Structural verification of the lowered module
//!
//! With the `llvm` feature the verified module can be handed to LLVM
//! through inkwell.

pub mod compiler;
pub mod expr;
pub mod ir;
#[cfg(feature = "llvm")]
pub mod llvm;
pub mod stdlib;
pub mod stmt;
pub mod verifier;

#[cfg(test)]
mod tests;
