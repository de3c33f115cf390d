//! Lexical analysis module.
//!
//! Converts source text into a stream of tokens for the parser:
//!
//! - Tokenization of source code using anchored regex patterns
//! - Recognition of keywords, identifiers, literals, and operators
//! - Byte-offset spans for diagnostics
//! - Comments and whitespace handling

pub mod lexer;
pub mod tokens;

#[cfg(test)]
mod tests;
