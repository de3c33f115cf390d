//! Error types and error handling for the toolchain.
//!
//! This module defines the fatal error type shared by every phase. It
//! includes:
//!
//! - Error structures with source position information
//! - Variants for syntax, invariant, unimplemented and runtime failures
//! - A category used by drivers to classify a failed attempt
//! - Helpful tips rendered next to the offending source line
//!
//! Recoverable semantic errors are diagnostics, see [`crate::diagnostics`].

pub mod errors;

#[cfg(test)]
mod tests;
