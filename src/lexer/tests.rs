//! Unit tests for the lexer module.
//!
//! Covers keywords, literals with suffixes, escapes, operator spellings,
//! comments, source spans and error cases.

use super::{lexer::tokenize, tokens::TokenKind};

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source.to_string(), Some("test.pn".to_string()))
        .unwrap()
        .iter()
        .map(|token| token.kind)
        .collect()
}

#[test]
fn test_tokenize_keywords() {
    assert_eq!(
        kinds("let const fn extern struct enum module alias if else while do for break continue goto return as typeof true false"),
        vec![
            TokenKind::Let,
            TokenKind::Const,
            TokenKind::Fn,
            TokenKind::Extern,
            TokenKind::Struct,
            TokenKind::Enum,
            TokenKind::Module,
            TokenKind::Alias,
            TokenKind::If,
            TokenKind::Else,
            TokenKind::While,
            TokenKind::Do,
            TokenKind::For,
            TokenKind::Break,
            TokenKind::Continue,
            TokenKind::Goto,
            TokenKind::Return,
            TokenKind::As,
            TokenKind::Typeof,
            TokenKind::True,
            TokenKind::False,
            TokenKind::EOF,
        ]
    );
}

#[test]
fn test_tokenize_identifiers() {
    let tokens = tokenize("foo baz_123 _under i32".to_string(), None).unwrap();

    assert_eq!(tokens[0].value, "foo");
    assert_eq!(tokens[1].value, "baz_123");
    assert_eq!(tokens[2].value, "_under");
    // Builtin type names are plain identifiers until the parser sees them
    assert_eq!(tokens[3].kind, TokenKind::Identifier);
    assert_eq!(tokens[3].value, "i32");
}

#[test]
fn test_tokenize_numbers_with_suffixes() {
    let tokens = tokenize("42 3.14 7u 9ul 1.5f 0xFF 2e3".to_string(), None).unwrap();
    let values: Vec<&str> = tokens.iter().map(|token| token.value.as_str()).collect();

    assert_eq!(values, vec!["42", "3.14", "7u", "9ul", "1.5f", "0xFF", "2e3", "EOF"]);
    assert!(tokens[..7].iter().all(|token| token.kind == TokenKind::Number));
}

#[test]
fn test_tokenize_string_escapes() {
    let source = r#""hello\nworld" "tab\there" "quote\"test" "hex\x41""#.to_string();
    let tokens = tokenize(source, None).unwrap();

    assert_eq!(tokens[0].value, "hello\nworld");
    assert_eq!(tokens[1].value, "tab\there");
    assert_eq!(tokens[2].value, "quote\"test");
    assert_eq!(tokens[3].value, "hexA");
    assert_eq!(tokens[4].kind, TokenKind::EOF);
}

#[test]
fn test_tokenize_char_literals() {
    let tokens = tokenize(r"'a' '\n' '\''".to_string(), None).unwrap();

    assert_eq!(tokens[0].kind, TokenKind::Char);
    assert_eq!(tokens[0].value, "a");
    assert_eq!(tokens[1].value, "\n");
    assert_eq!(tokens[2].value, "'");
}

#[test]
fn test_tokenize_longest_operator_wins() {
    assert_eq!(
        kinds("<<= << <= < >>= >> >= > == = != ! && & &= || | |= ^ ^= ~"),
        vec![
            TokenKind::ShiftLeftEquals,
            TokenKind::ShiftLeft,
            TokenKind::LessEquals,
            TokenKind::Less,
            TokenKind::ShiftRightEquals,
            TokenKind::ShiftRight,
            TokenKind::GreaterEquals,
            TokenKind::Greater,
            TokenKind::Equals,
            TokenKind::Assignment,
            TokenKind::NotEquals,
            TokenKind::Not,
            TokenKind::And,
            TokenKind::BitAnd,
            TokenKind::AndEquals,
            TokenKind::Or,
            TokenKind::BitOr,
            TokenKind::OrEquals,
            TokenKind::Caret,
            TokenKind::CaretEquals,
            TokenKind::Tilde,
            TokenKind::EOF,
        ]
    );
}

#[test]
fn test_tokenize_punctuation() {
    assert_eq!(
        kinds("( ) { } [ ] . ... , ; : :: -> # ? ++ -- += -= *= /= %="),
        vec![
            TokenKind::OpenParen,
            TokenKind::CloseParen,
            TokenKind::OpenCurly,
            TokenKind::CloseCurly,
            TokenKind::OpenBracket,
            TokenKind::CloseBracket,
            TokenKind::Dot,
            TokenKind::Ellipsis,
            TokenKind::Comma,
            TokenKind::Semicolon,
            TokenKind::Colon,
            TokenKind::ColonColon,
            TokenKind::Arrow,
            TokenKind::Hash,
            TokenKind::Question,
            TokenKind::PlusPlus,
            TokenKind::MinusMinus,
            TokenKind::PlusEquals,
            TokenKind::MinusEquals,
            TokenKind::StarEquals,
            TokenKind::SlashEquals,
            TokenKind::PercentEquals,
            TokenKind::EOF,
        ]
    );
}

#[test]
fn test_tokenize_comments() {
    assert_eq!(
        kinds("let x = 5; // trailing\n/* block\n comment */ x"),
        vec![
            TokenKind::Let,
            TokenKind::Identifier,
            TokenKind::Assignment,
            TokenKind::Number,
            TokenKind::Semicolon,
            TokenKind::Identifier,
            TokenKind::EOF,
        ]
    );
}

#[test]
fn test_token_spans_are_byte_offsets() {
    let tokens = tokenize("let value = 42;".to_string(), Some("span.pn".to_string())).unwrap();

    assert_eq!(tokens[1].span.start.0, 4);
    assert_eq!(tokens[1].span.end.0, 9);
    assert_eq!(tokens[3].span.start.0, 12);
    assert_eq!(tokens[3].span.start.1.as_str(), "span.pn");
    assert_eq!(tokens[5].span.start.0, 15);
}

#[test]
fn test_tokenize_unrecognized_token() {
    let result = tokenize("let x = @".to_string(), Some("test.pn".to_string()));

    let error = result.err().unwrap();
    assert_eq!(error.get_error_name(), "UnrecognisedToken");
    assert_eq!(error.get_position().0, 8);
}
