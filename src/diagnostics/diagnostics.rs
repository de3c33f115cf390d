use std::{fmt::Display, rc::Rc};

use log::debug;

use crate::Span;

use super::text_map::DiagTextMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticLevel {
    Ignored,
    Note,
    Remark,
    Warning,
    Error,
    Fatal,
}

impl DiagnosticLevel {
    /// Errors and fatals mark the current attempt as failed.
    pub fn is_error(&self) -> bool {
        matches!(self, DiagnosticLevel::Error | DiagnosticLevel::Fatal)
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            DiagnosticLevel::Ignored | DiagnosticLevel::Note | DiagnosticLevel::Remark => {
                log::Level::Info
            }
            DiagnosticLevel::Warning => log::Level::Warn,
            DiagnosticLevel::Error | DiagnosticLevel::Fatal => log::Level::Error,
        }
    }
}

impl Display for DiagnosticLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DiagnosticLevel::Ignored => "ignored",
            DiagnosticLevel::Note => "note",
            DiagnosticLevel::Remark => "remark",
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Fatal => "fatal error",
        };
        write!(f, "{}", name)
    }
}

macro_rules! define_diag_ids {
    ($($id:ident => $level:ident),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum DiagId {
            $($id),*
        }

        impl DiagId {
            pub const ALL: &'static [DiagId] = &[$(DiagId::$id),*];

            pub fn name(&self) -> &'static str {
                match self {
                    $(DiagId::$id => stringify!($id)),*
                }
            }

            pub fn level(&self) -> DiagnosticLevel {
                match self {
                    $(DiagId::$id => DiagnosticLevel::$level),*
                }
            }

            pub fn from_name(name: &str) -> Option<DiagId> {
                match name {
                    $(stringify!($id) => Some(DiagId::$id),)*
                    _ => None,
                }
            }
        }
    };
}

define_diag_ids! {
    ErrUnexpectedToken => Error,
    ErrExpectedExpression => Error,
    ErrExpectedTypeName => Error,
    ErrUndefinedIdentifier => Error,
    ErrAmbiguousReference => Error,
    ErrRedefinition => Error,
    ErrConflictingOverload => Error,
    ErrNoMatchingOverload => Error,
    ErrAmbiguousCall => Error,
    ErrArgumentCountMismatch => Error,
    ErrNotCallable => Error,
    ErrIncompatibleTypes => Error,
    ErrInvalidOperands => Error,
    ErrInvalidUnaryOperand => Error,
    ErrNotAssignable => Error,
    ErrNoMember => Error,
    ErrNotSubscriptable => Error,
    ErrBreakOutsideLoop => Error,
    ErrContinueOutsideLoop => Error,
    ErrReturnOutsideFunction => Error,
    ErrReturnValueInVoid => Error,
    ErrReturnMissingValue => Error,
    ErrUndefinedLabel => Error,
    ErrLabelRedefinition => Error,
    ErrCircularReference => Error,
    ErrExpectedConstant => Error,
    ErrNotAModule => Error,
    ErrIncompleteType => Error,
    ErrCannotDeduceType => Error,
    ErrUnknownAttribute => Error,
    ErrStatementNotAllowed => Error,
    ErrTooDeepResolution => Fatal,
    WarnMissingReturn => Warning,
    WarnDeprecated => Warning,
    WarnImplicitNarrowing => Warning,
    NoteDeclaredHere => Note,
    NotePreviousDefinition => Note,
}

impl Display for DiagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single reported diagnostic with its already formatted message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub id: DiagId,
    pub span: Span,
    pub args: Vec<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn level(&self) -> DiagnosticLevel {
        self.id.level()
    }
}

/// Receives every diagnostic the engine reports.
pub trait DiagnosticConsumer {
    fn handle_diagnostic(&mut self, level: DiagnosticLevel, diag: &Diagnostic);
}

/// Discards diagnostics; the engine still records them.
pub struct IgnoringDiagnosticConsumer;

impl DiagnosticConsumer for IgnoringDiagnosticConsumer {
    fn handle_diagnostic(&mut self, _level: DiagnosticLevel, _diag: &Diagnostic) {}
}

pub struct DiagnosticsEngine {
    text_map: Rc<DiagTextMap>,
    consumer: Box<dyn DiagnosticConsumer>,
    errored: bool,
    error_count: usize,
    history: Vec<Diagnostic>,
}

impl DiagnosticsEngine {
    pub fn new(text_map: Rc<DiagTextMap>, consumer: Box<dyn DiagnosticConsumer>) -> Self {
        DiagnosticsEngine {
            text_map,
            consumer,
            errored: false,
            error_count: 0,
            history: vec![],
        }
    }

    /// An engine with the builtin diagnostic texts that records but does not
    /// print anything.
    pub fn silent() -> Self {
        DiagnosticsEngine::new(
            Rc::new(DiagTextMap::builtin()),
            Box::new(IgnoringDiagnosticConsumer),
        )
    }

    pub fn set_consumer(&mut self, consumer: Box<dyn DiagnosticConsumer>) {
        self.consumer = consumer;
    }

    pub fn get_text_map(&self) -> &DiagTextMap {
        &self.text_map
    }

    pub fn report(&mut self, id: DiagId, span: &Span, args: &[&str]) {
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        let message = self.text_map.format(id, &args);
        let diagnostic = Diagnostic {
            id,
            span: span.clone(),
            args,
            message,
        };

        let level = id.level();
        if level.is_error() {
            self.errored = true;
            self.error_count += 1;
        }

        debug!("reported {} at {}:{}", id, span.start.1, span.start.0);
        self.consumer.handle_diagnostic(level, &diagnostic);
        self.history.push(diagnostic);
    }

    pub fn errored(&self) -> bool {
        self.errored
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Clears the error flag and the history so the next attempt starts
    /// clean. Consumers have already seen every reported diagnostic.
    pub fn reset(&mut self) {
        self.errored = false;
        self.error_count = 0;
        self.history.clear();
    }

    pub fn history(&self) -> &[Diagnostic] {
        &self.history
    }

    pub fn take_history(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.history)
    }

    pub fn has_reported(&self, id: DiagId) -> bool {
        self.history.iter().any(|diag| diag.id == id)
    }
}
