use std::{cell::RefCell, rc::Rc};

use crate::{Position, Span};

use super::{
    consumer::LogDiagnosticConsumer,
    diagnostics::{DiagId, Diagnostic, DiagnosticLevel, DiagnosticsEngine},
    source::SourceManager,
    text_map::DiagTextMap,
};

fn span_at(offset: u32, file: &str) -> Span {
    Span {
        start: Position(offset, Rc::new(file.to_string())),
        end: Position(offset + 1, Rc::new(file.to_string())),
    }
}

#[test]
fn test_text_map_parses_alternating_lines() {
    let map = DiagTextMap::parse(
        "ErrUndefinedIdentifier\nuse of undeclared identifier {0}\nWarnMissingReturn\n{0} falls off\n\nErrRedefinition\nafter the blank line\n",
    );

    assert_eq!(map.len(), 2);
    assert_eq!(
        map.get_text(DiagId::ErrUndefinedIdentifier),
        Some("use of undeclared identifier {0}")
    );
    assert_eq!(map.get_text(DiagId::ErrRedefinition), None);
}

#[test]
fn test_text_map_tolerates_unknown_and_duplicate_ids() {
    let map = DiagTextMap::parse(
        "ErrNoSuchThing\nwhatever\nErrRedefinition\nfirst\nErrRedefinition\nsecond\n\n",
    );

    assert_eq!(map.len(), 1);
    assert_eq!(map.get_text(DiagId::ErrRedefinition), Some("first"));
}

#[test]
fn test_builtin_text_map_covers_every_id() {
    let map = DiagTextMap::builtin();

    for id in DiagId::ALL {
        assert!(map.get_text(*id).is_some(), "missing text for {}", id);
    }
}

#[test]
fn test_format_substitutes_arguments() {
    let map = DiagTextMap::builtin();
    let message = map.format(
        DiagId::ErrArgumentCountMismatch,
        &["add".to_string(), "2".to_string(), "3".to_string()],
    );

    assert_eq!(message, "add expects 2 argument(s), 3 given");
    assert_eq!(
        DiagTextMap::default().format(DiagId::ErrNotAssignable, &[]),
        "ErrNotAssignable"
    );
}

#[test]
fn test_levels_classify_failure() {
    assert!(DiagId::ErrRedefinition.level().is_error());
    assert!(DiagId::ErrTooDeepResolution.level().is_error());
    assert!(!DiagId::WarnMissingReturn.level().is_error());
    assert_eq!(DiagId::NoteDeclaredHere.level().log_level(), log::Level::Info);
    assert_eq!(DiagnosticLevel::Warning.log_level(), log::Level::Warn);
    assert_eq!(DiagnosticLevel::Fatal.log_level(), log::Level::Error);
}

#[test]
fn test_engine_error_flag_and_reset() {
    let mut engine = DiagnosticsEngine::silent();

    engine.report(DiagId::WarnMissingReturn, &span_at(0, "a.pn"), &["f"]);
    assert!(!engine.errored());

    engine.report(DiagId::ErrUndefinedIdentifier, &span_at(4, "a.pn"), &["x"]);
    assert!(engine.errored());
    assert_eq!(engine.error_count(), 1);
    assert_eq!(engine.history()[1].message, "use of undeclared identifier x");

    engine.reset();
    assert!(!engine.errored());
    assert!(engine.history().is_empty());
    assert!(!engine.has_reported(DiagId::ErrUndefinedIdentifier));
}

#[test]
fn test_log_consumer_renders_line_and_caret() {
    let sources = Rc::new(RefCell::new(SourceManager::new()));
    sources
        .borrow_mut()
        .add_file("main.pn", "fn main() {\n    return y;\n}\n");
    let consumer = LogDiagnosticConsumer::new(Rc::clone(&sources));

    let diag = Diagnostic {
        id: DiagId::ErrUndefinedIdentifier,
        span: span_at(23, "main.pn"),
        args: vec!["y".to_string()],
        message: "use of undeclared identifier y".to_string(),
    };
    let lines = consumer.render(DiagnosticLevel::Error, &diag);

    assert_eq!(lines[0], "main.pn:2:12: error: use of undeclared identifier y");
    assert_eq!(lines[2], "2 | return y;");
    assert_eq!(lines[3], "  | -------^");
}

#[test]
fn test_source_manager_reports_missing_files() {
    let mut sources = SourceManager::new();
    sources.add_file("known.pn", "let x = 1;");

    assert_eq!(sources.get_file_content("known.pn"), Some("let x = 1;"));
    assert!(sources.get_file_content("unknown.pn").is_none());
}
