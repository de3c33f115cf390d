use std::{cell::RefCell, rc::Rc};

use log::log;

use crate::{get_line_at_position, render_source_excerpt};

use super::{
    diagnostics::{Diagnostic, DiagnosticConsumer, DiagnosticLevel},
    source::SourceManager,
};

/// Forwards diagnostics to the `log` facade, followed by the offending
/// source line and a caret when the file is known.
pub struct LogDiagnosticConsumer {
    sources: Rc<RefCell<SourceManager>>,
}

impl LogDiagnosticConsumer {
    pub fn new(sources: Rc<RefCell<SourceManager>>) -> Self {
        LogDiagnosticConsumer { sources }
    }

    pub fn render(&self, level: DiagnosticLevel, diag: &Diagnostic) -> Vec<String> {
        let sources = self.sources.borrow();
        let position = &diag.span.start;

        let location = sources
            .get_file_content(&position.1)
            .and_then(|content| get_line_at_position(content, position.0))
            .map(|(line, _, column)| format!("{}:{}:{}", position.1, line, column + 1))
            .unwrap_or_else(|| position.1.to_string());

        let mut lines = vec![format!("{}: {}: {}", location, level, diag.message)];
        if sources.get_file_content(&position.1).is_some() {
            lines.extend(render_source_excerpt(&sources, position).into_iter().skip(1));
        }
        lines
    }
}

impl DiagnosticConsumer for LogDiagnosticConsumer {
    fn handle_diagnostic(&mut self, level: DiagnosticLevel, diag: &Diagnostic) {
        if level == DiagnosticLevel::Ignored {
            return;
        }

        for line in self.render(level, diag) {
            log!(level.log_level(), "{}", line);
        }
    }
}
