//! Unit tests for error handling.
//!
//! This module contains tests for error types, their categories and tips.

use crate::errors::errors::{Error, ErrorCategory, ErrorImpl, ErrorTip};
use crate::Position;
use std::rc::Rc;

#[test]
fn test_error_creation() {
    let error = Error::new(
        ErrorImpl::UnrecognisedToken {
            token: "@".to_string(),
        },
        Position(10, Rc::new("test.pn".to_string())),
    );

    assert_eq!(error.get_error_name(), "UnrecognisedToken");
    assert_eq!(error.get_position().0, 10);
    assert_eq!(error.category(), ErrorCategory::Syntax);
}

#[test]
fn test_parameter_count_mismatch_tip() {
    let error = Error::new(
        ErrorImpl::ParameterCountMismatch {
            function: "add".to_string(),
            expected: 2,
            received: 3,
        },
        Position::null(),
    );

    assert_eq!(error.category(), ErrorCategory::Invariant);
    assert!(error.get_tip().to_string().contains("parameter count mismatch"));
    assert!(error.to_string().contains("expected 2, received 3"));
}

#[test]
fn test_not_implemented_is_distinct_from_invariant() {
    let unimplemented = Error::not_implemented("goto", Position::null());
    let invariant = Error::invariant("unknown type class");

    assert_eq!(unimplemented.category(), ErrorCategory::Unimplemented);
    assert_eq!(invariant.category(), ErrorCategory::Invariant);
    assert_eq!(unimplemented.get_error_name(), "NotImplementedError");
}

#[test]
fn test_runtime_errors() {
    let error = Error::new(ErrorImpl::DivisionByZero, Position::null());
    assert_eq!(error.category(), ErrorCategory::Runtime);

    let error = Error::new(
        ErrorImpl::IndexOutOfBounds {
            index: 4,
            length: 3,
        },
        Position::null(),
    );
    assert_eq!(error.get_error_name(), "IndexOutOfBounds");
}

#[test]
fn test_error_tip_none_displays_empty() {
    let error = Error::new(
        ErrorImpl::UnrecognisedToken {
            token: "$".to_string(),
        },
        Position::null(),
    );

    match error.get_tip() {
        ErrorTip::None => {}
        ErrorTip::Suggestion(_) => panic!("unrecognised tokens carry no tip"),
    }
    assert_eq!(ErrorTip::None.to_string(), "");
}
