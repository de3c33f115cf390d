#![allow(clippy::module_inception)]

use std::rc::Rc;

use crate::{
    diagnostics::source::SourceManager,
    errors::errors::{Error, ErrorTip},
};

pub mod ast;
pub mod compiler;
pub mod diagnostics;
pub mod errors;
pub mod interpreter;
pub mod lexer;
pub mod macros;
pub mod options;
pub mod parser;
pub mod sema;

extern crate regex;

/// A byte offset into a named source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position(pub u32, pub Rc<String>);

impl Position {
    pub fn null() -> Self {
        Position(0, Rc::new(String::from("<null>")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn null() -> Self {
        Span {
            start: Position::null(),
            end: Position::null(),
        }
    }

    /// Builds a span covering both `self` and `other`.
    pub fn to(&self, other: &Span) -> Span {
        Span {
            start: self.start.clone(),
            end: other.end.clone(),
        }
    }
}

/// Finds the line containing the byte offset `position`.
///
/// Returns the 1-based line number, the line text and the offset of
/// `position` within that line, or `None` when the offset is past the end of
/// `content`.
pub fn get_line_at_position(content: &str, position: u32) -> Option<(usize, String, usize)> {
    let pos = position as usize;

    if pos > content.len() {
        return None;
    }

    let mut start = 0;
    let mut line_number = 1;

    for line in content.split_inclusive('\n') {
        let end = start + line.len();

        if (start..end).contains(&pos) {
            return Some((line_number, line.to_string(), pos - start));
        }

        start = end;
        line_number += 1;
    }

    // Offset sits exactly at the end of the content
    content
        .split_inclusive('\n')
        .last()
        .map(|line| (line_number - 1, line.to_string(), line.len()))
}

/// Renders the excerpt below a message: the file, the offending line and a
/// caret under `position`.
pub fn render_source_excerpt(sources: &SourceManager, position: &crate::Position) -> Vec<String> {
    /*
        -> final.pn
           |
        20 | let a = #;
           | --------^
    */
    let mut lines = vec![format!("-> {}", position.1)];

    let Some(content) = sources.get_file_content(&position.1) else {
        return lines;
    };
    let Some((line, line_text, line_pos)) = get_line_at_position(content, position.0) else {
        return lines;
    };

    let line_string = line.to_string();
    let padding = line_string.len() + 2;

    let (line_text_removed, removed_whitespace) = remove_starting_whitespace(&line_text);
    let arrows = line_pos.saturating_sub(removed_whitespace) + 1;

    lines.push(format!("{:>padding$}", "|"));
    lines.push(format!("{} | {}", line_string, line_text_removed.trim_end()));
    lines.push(format!("{:>padding$} {:->arrows$}", "|", "^"));
    lines
}

pub fn display_error(error: &Error, sources: &SourceManager) {
    if let ErrorTip::None = error.get_tip() {
        eprintln!("Error: {}", error.get_error_name());
    } else {
        eprintln!("Error: {} ({})", error.get_error_name(), error.get_tip());
    }

    for line in render_source_excerpt(sources, error.get_position()) {
        eprintln!("{}", line);
    }
}

fn remove_starting_whitespace(string: &str) -> (String, usize) {
    let mut start = 0;
    for c in string.chars() {
        if c == ' ' || c == '\t' {
            start += 1;
        } else {
            break;
        }
    }

    (String::from(&string[start..]), start)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{diagnostics::source::SourceManager, Position};

    #[test]
    fn test_get_line_at_position() {
        let content = "Hello, world!\nfoo\nbar\nTesting { }\n";

        let (line_number, line, line_pos) = super::get_line_at_position(content, 10).unwrap();
        assert_eq!(line_number, 1);
        assert_eq!(line, "Hello, world!\n");
        assert_eq!(line_pos, 10);

        let (line_number, line, line_pos) = super::get_line_at_position(content, 30).unwrap();
        assert_eq!(line_number, 4);
        assert_eq!(line, "Testing { }\n");
        assert_eq!(line_pos, 8);

        assert!(super::get_line_at_position(content, 400).is_none());
    }

    #[test]
    fn test_render_source_excerpt() {
        let mut sources = SourceManager::new();
        sources.add_file("final.pn", "fn main() {\n    let a = #;\n}\n");

        let lines = super::render_source_excerpt(&sources, &Position(24, Rc::new("final.pn".into())));
        assert_eq!(lines[0], "-> final.pn");
        assert_eq!(lines[2], "2 | let a = #;");
        assert_eq!(lines[3], "  | --------^");
    }
}
