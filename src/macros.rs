//! Utility macros for the toolchain.
//!
//! - `MK_TOKEN!` - Creates a Token instance
//! - `MK_SPAN!` - Creates a Span over a byte range of the lexer's file
//! - `MK_DEFAULT_HANDLER!` - Creates a default lexer handler for fixed tokens

/// Creates a Token instance.
///
/// ```ignore
/// let token = MK_TOKEN!(TokenKind::Number, "42".to_string(), span);
/// ```
#[macro_export]
macro_rules! MK_TOKEN {
    ($kind:expr, $value:expr, $span:expr) => {
        Token {
            kind: $kind,
            value: $value,
            span: $span,
        }
    };
}

/// Creates a Span from `$start` to `$end` (byte offsets) in the lexer's file.
#[macro_export]
macro_rules! MK_SPAN {
    ($lexer:expr, $start:expr, $end:expr) => {
        Span {
            start: Position($start as u32, Rc::clone(&$lexer.file)),
            end: Position($end as u32, Rc::clone(&$lexer.file)),
        }
    };
}

/// Creates a default lexer handler for a fixed spelling.
///
/// The handler pushes a token of `$kind` and advances the lexer by the
/// length of `$value`.
///
/// ```ignore
/// RegexPattern::new("^\\+", MK_DEFAULT_HANDLER!(TokenKind::Plus, "+"))
/// ```
#[macro_export]
macro_rules! MK_DEFAULT_HANDLER {
    ($kind:expr, $value:literal) => {
        |lexer: &mut Lexer, _regex: &Regex| {
            let start = lexer.pos;
            lexer.push(MK_TOKEN!(
                $kind,
                String::from($value),
                MK_SPAN!(lexer, start, start + $value.len())
            ));
            lexer.advance_n($value.len());
        }
    };
}
