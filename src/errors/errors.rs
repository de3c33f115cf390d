use std::fmt::Display;

use thiserror::Error;

use crate::Position;

/// A fatal error raised while lexing, analysing, lowering or running a
/// program.
///
/// Recoverable user errors never show up here; they are reported through the
/// diagnostics engine instead. An `Error` means the current attempt is over.
#[derive(Debug, Clone)]
pub struct Error {
    internal_error: ErrorImpl,
    position: Position,
}

/// Broad classification of an [`Error`], used by drivers and tests to tell
/// "your program is wrong" apart from "the toolchain cannot handle this".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Syntax,
    Invariant,
    Unimplemented,
    Runtime,
    Driver,
}

impl Error {
    pub fn new(error_impl: ErrorImpl, position: Position) -> Self {
        Error {
            internal_error: error_impl,
            position,
        }
    }

    /// Shorthand for an invariant violation without a meaningful location.
    pub fn invariant(message: impl Into<String>) -> Self {
        Error::new(
            ErrorImpl::InvariantViolation {
                message: message.into(),
            },
            Position::null(),
        )
    }

    /// Shorthand for an unimplemented feature.
    pub fn not_implemented(feature: impl Into<String>, position: Position) -> Self {
        Error::new(
            ErrorImpl::NotImplementedError {
                feature: feature.into(),
            },
            position,
        )
    }

    pub fn get_position(&self) -> &Position {
        &self.position
    }

    pub fn get_impl(&self) -> &ErrorImpl {
        &self.internal_error
    }

    pub fn category(&self) -> ErrorCategory {
        match &self.internal_error {
            ErrorImpl::UnrecognisedToken { .. }
            | ErrorImpl::UnexpectedToken { .. }
            | ErrorImpl::UnexpectedTokenDetailed { .. }
            | ErrorImpl::NumberParseError { .. } => ErrorCategory::Syntax,
            ErrorImpl::InvariantViolation { .. }
            | ErrorImpl::UnbalancedScope
            | ErrorImpl::InvalidOpcode { .. }
            | ErrorImpl::UnresolvedType { .. }
            | ErrorImpl::DanglingDeclRef { .. }
            | ErrorImpl::ParameterCountMismatch { .. }
            | ErrorImpl::VerificationFailed { .. } => ErrorCategory::Invariant,
            ErrorImpl::NotImplementedError { .. } => ErrorCategory::Unimplemented,
            ErrorImpl::DivisionByZero
            | ErrorImpl::IndexOutOfBounds { .. }
            | ErrorImpl::StackOverflow { .. }
            | ErrorImpl::UnboundExternal { .. } => ErrorCategory::Runtime,
            ErrorImpl::StatementFailed
            | ErrorImpl::CompilationFailed { .. }
            | ErrorImpl::EntryNotFound { .. }
            | ErrorImpl::IoError { .. } => ErrorCategory::Driver,
        }
    }

    pub fn get_error_name(&self) -> &str {
        match &self.internal_error {
            ErrorImpl::UnrecognisedToken { .. } => "UnrecognisedToken",
            ErrorImpl::UnexpectedToken { .. } => "UnexpectedToken",
            ErrorImpl::UnexpectedTokenDetailed { .. } => "UnexpectedTokenDetailed",
            ErrorImpl::NumberParseError { .. } => "NumberParseError",
            ErrorImpl::InvariantViolation { .. } => "InvariantViolation",
            ErrorImpl::UnbalancedScope => "UnbalancedScope",
            ErrorImpl::InvalidOpcode { .. } => "InvalidOpcode",
            ErrorImpl::UnresolvedType { .. } => "UnresolvedType",
            ErrorImpl::DanglingDeclRef { .. } => "DanglingDeclRef",
            ErrorImpl::ParameterCountMismatch { .. } => "ParameterCountMismatch",
            ErrorImpl::VerificationFailed { .. } => "VerificationFailed",
            ErrorImpl::NotImplementedError { .. } => "NotImplementedError",
            ErrorImpl::DivisionByZero => "DivisionByZero",
            ErrorImpl::IndexOutOfBounds { .. } => "IndexOutOfBounds",
            ErrorImpl::StackOverflow { .. } => "StackOverflow",
            ErrorImpl::UnboundExternal { .. } => "UnboundExternal",
            ErrorImpl::StatementFailed => "StatementFailed",
            ErrorImpl::CompilationFailed { .. } => "CompilationFailed",
            ErrorImpl::EntryNotFound { .. } => "EntryNotFound",
            ErrorImpl::IoError { .. } => "IoError",
        }
    }

    pub fn get_tip(&self) -> ErrorTip {
        match &self.internal_error {
            ErrorImpl::UnrecognisedToken { .. } => ErrorTip::None,
            ErrorImpl::UnexpectedToken { token } => ErrorTip::Suggestion(format!(
                "Unexpected token: `{}`, did you miss a semicolon?",
                token
            )),
            ErrorImpl::UnexpectedTokenDetailed { token, message } => {
                ErrorTip::Suggestion(format!("Unexpected token: `{}`, {}", token, message))
            }
            ErrorImpl::NumberParseError { token } => ErrorTip::Suggestion(format!(
                "Invalid number: `{}`, is it above the integer limit?",
                token
            )),
            ErrorImpl::InvariantViolation { message } => {
                ErrorTip::Suggestion(format!("Internal invariant violated: {}", message))
            }
            ErrorImpl::UnbalancedScope => ErrorTip::Suggestion(String::from(
                "A scope was popped without a matching push",
            )),
            ErrorImpl::InvalidOpcode { opcode } => {
                ErrorTip::Suggestion(format!("Operator `{}` cannot be lowered here", opcode))
            }
            ErrorImpl::UnresolvedType { type_ } => ErrorTip::Suggestion(format!(
                "Type `{}` must be resolved before it is lowered",
                type_
            )),
            ErrorImpl::DanglingDeclRef { name } => ErrorTip::Suggestion(format!(
                "Declaration `{}` has no storage in the current run",
                name
            )),
            ErrorImpl::ParameterCountMismatch {
                function,
                expected,
                received,
            } => ErrorTip::Suggestion(format!(
                "parameter count mismatch calling `{}`: expected {}, received {}",
                function, expected, received
            )),
            ErrorImpl::VerificationFailed { function, message } => ErrorTip::Suggestion(format!(
                "Function `{}` failed verification: {}",
                function, message
            )),
            ErrorImpl::NotImplementedError { feature } => ErrorTip::Suggestion(format!(
                "`{}` is expected to be handled, but has not yet been implemented",
                feature
            )),
            ErrorImpl::DivisionByZero => ErrorTip::Suggestion(String::from(
                "The right hand side of a division evaluated to zero",
            )),
            ErrorImpl::IndexOutOfBounds { index, length } => ErrorTip::Suggestion(format!(
                "Index {} is out of bounds for an array of length {}",
                index, length
            )),
            ErrorImpl::StackOverflow { depth } => {
                ErrorTip::Suggestion(format!("Call depth exceeded the limit of {}", depth))
            }
            ErrorImpl::UnboundExternal { function } => ErrorTip::Suggestion(format!(
                "Extern function `{}` has no registered implementation",
                function
            )),
            ErrorImpl::StatementFailed => ErrorTip::Suggestion(String::from(
                "The statement was rolled back, earlier declarations are intact",
            )),
            ErrorImpl::CompilationFailed { errors } => {
                ErrorTip::Suggestion(format!("{} error(s) were reported", errors))
            }
            ErrorImpl::EntryNotFound { name } => {
                ErrorTip::Suggestion(format!("No function named `{}` was declared", name))
            }
            ErrorImpl::IoError { message } => ErrorTip::Suggestion(message.clone()),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.internal_error)
    }
}

impl std::error::Error for Error {}

pub enum ErrorTip {
    None,
    Suggestion(String),
}

impl Display for ErrorTip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorTip::None => write!(f, ""),
            ErrorTip::Suggestion(suggestion) => write!(f, "{}", suggestion),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ErrorImpl {
    #[error("unrecognised token: {token:?}")]
    UnrecognisedToken { token: String },
    #[error("unexpected token: {token:?}")]
    UnexpectedToken { token: String },
    #[error("unexpected token ({message:?}): {token:?}")]
    UnexpectedTokenDetailed { token: String, message: String },
    #[error("error parsing number: {token:?}")]
    NumberParseError { token: String },
    #[error("invariant violation: {message}")]
    InvariantViolation { message: String },
    #[error("scope popped without a matching push")]
    UnbalancedScope,
    #[error("invalid opcode {opcode:?}")]
    InvalidOpcode { opcode: String },
    #[error("unresolved type {type_} reached lowering")]
    UnresolvedType { type_: String },
    #[error("declaration {name:?} is absent from every live store")]
    DanglingDeclRef { name: String },
    #[error("parameter count mismatch calling {function:?}: expected {expected}, received {received}")]
    ParameterCountMismatch {
        function: String,
        expected: usize,
        received: usize,
    },
    #[error("verification of {function:?} failed: {message}")]
    VerificationFailed { function: String, message: String },
    #[error("not implemented: {feature}")]
    NotImplementedError { feature: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i64, length: usize },
    #[error("call depth exceeded {depth}")]
    StackOverflow { depth: usize },
    #[error("extern function {function:?} has no implementation")]
    UnboundExternal { function: String },
    #[error("statement failed")]
    StatementFailed,
    #[error("compilation failed with {errors} error(s)")]
    CompilationFailed { errors: usize },
    #[error("entry function {name:?} not found")]
    EntryNotFound { name: String },
    #[error("io error: {message}")]
    IoError { message: String },
}
