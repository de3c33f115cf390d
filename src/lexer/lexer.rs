use std::rc::Rc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    errors::errors::{Error, ErrorImpl},
    Position, Span, MK_DEFAULT_HANDLER, MK_SPAN, MK_TOKEN,
};

use super::tokens::{Token, TokenKind, RESERVED_LOOKUP};

pub type RegexHandler = fn(&mut Lexer, &Regex);

pub struct RegexPattern {
    regex: Regex,
    handler: RegexHandler,
}

impl RegexPattern {
    fn new(pattern: &str, handler: RegexHandler) -> Self {
        RegexPattern {
            regex: Regex::new(pattern).unwrap(),
            handler,
        }
    }
}

lazy_static! {
    /// Patterns are tried in order, so longer spellings come first.
    static ref PATTERNS: Vec<RegexPattern> = vec![
        RegexPattern::new("^\\s+", skip_handler),
        RegexPattern::new("^//[^\n]*", skip_handler),
        RegexPattern::new("^/\\*[\\s\\S]*?\\*/", skip_handler),
        RegexPattern::new("^[a-zA-Z_][a-zA-Z0-9_]*", symbol_handler),
        RegexPattern::new("^(0[xX][0-9a-fA-F]+|[0-9]+(\\.[0-9]+)?([eE][+-]?[0-9]+)?)([uU][lL]?|[lL]|[fF])?", number_handler),
        RegexPattern::new("^\"(\\\\.|[^\"\\\\])*\"", string_handler),
        RegexPattern::new("^'(\\\\.|[^'\\\\])'", char_handler),
        RegexPattern::new("^\\[", MK_DEFAULT_HANDLER!(TokenKind::OpenBracket, "[")),
        RegexPattern::new("^\\]", MK_DEFAULT_HANDLER!(TokenKind::CloseBracket, "]")),
        RegexPattern::new("^\\{", MK_DEFAULT_HANDLER!(TokenKind::OpenCurly, "{")),
        RegexPattern::new("^\\}", MK_DEFAULT_HANDLER!(TokenKind::CloseCurly, "}")),
        RegexPattern::new("^\\(", MK_DEFAULT_HANDLER!(TokenKind::OpenParen, "(")),
        RegexPattern::new("^\\)", MK_DEFAULT_HANDLER!(TokenKind::CloseParen, ")")),
        RegexPattern::new("^==", MK_DEFAULT_HANDLER!(TokenKind::Equals, "==")),
        RegexPattern::new("^!=", MK_DEFAULT_HANDLER!(TokenKind::NotEquals, "!=")),
        RegexPattern::new("^!", MK_DEFAULT_HANDLER!(TokenKind::Not, "!")),
        RegexPattern::new("^=", MK_DEFAULT_HANDLER!(TokenKind::Assignment, "=")),
        RegexPattern::new("^<<=", MK_DEFAULT_HANDLER!(TokenKind::ShiftLeftEquals, "<<=")),
        RegexPattern::new("^<<", MK_DEFAULT_HANDLER!(TokenKind::ShiftLeft, "<<")),
        RegexPattern::new("^<=", MK_DEFAULT_HANDLER!(TokenKind::LessEquals, "<=")),
        RegexPattern::new("^<", MK_DEFAULT_HANDLER!(TokenKind::Less, "<")),
        RegexPattern::new("^>>=", MK_DEFAULT_HANDLER!(TokenKind::ShiftRightEquals, ">>=")),
        RegexPattern::new("^>>", MK_DEFAULT_HANDLER!(TokenKind::ShiftRight, ">>")),
        RegexPattern::new("^>=", MK_DEFAULT_HANDLER!(TokenKind::GreaterEquals, ">=")),
        RegexPattern::new("^>", MK_DEFAULT_HANDLER!(TokenKind::Greater, ">")),
        RegexPattern::new("^\\|\\|", MK_DEFAULT_HANDLER!(TokenKind::Or, "||")),
        RegexPattern::new("^\\|=", MK_DEFAULT_HANDLER!(TokenKind::OrEquals, "|=")),
        RegexPattern::new("^\\|", MK_DEFAULT_HANDLER!(TokenKind::BitOr, "|")),
        RegexPattern::new("^&&", MK_DEFAULT_HANDLER!(TokenKind::And, "&&")),
        RegexPattern::new("^&=", MK_DEFAULT_HANDLER!(TokenKind::AndEquals, "&=")),
        RegexPattern::new("^&", MK_DEFAULT_HANDLER!(TokenKind::BitAnd, "&")),
        RegexPattern::new("^\\^=", MK_DEFAULT_HANDLER!(TokenKind::CaretEquals, "^=")),
        RegexPattern::new("^\\^", MK_DEFAULT_HANDLER!(TokenKind::Caret, "^")),
        RegexPattern::new("^~", MK_DEFAULT_HANDLER!(TokenKind::Tilde, "~")),
        RegexPattern::new("^\\.\\.\\.", MK_DEFAULT_HANDLER!(TokenKind::Ellipsis, "...")),
        RegexPattern::new("^\\.", MK_DEFAULT_HANDLER!(TokenKind::Dot, ".")),
        RegexPattern::new("^;", MK_DEFAULT_HANDLER!(TokenKind::Semicolon, ";")),
        RegexPattern::new("^::", MK_DEFAULT_HANDLER!(TokenKind::ColonColon, "::")),
        RegexPattern::new("^:", MK_DEFAULT_HANDLER!(TokenKind::Colon, ":")),
        RegexPattern::new("^\\?", MK_DEFAULT_HANDLER!(TokenKind::Question, "?")),
        RegexPattern::new("^,", MK_DEFAULT_HANDLER!(TokenKind::Comma, ",")),
        RegexPattern::new("^#", MK_DEFAULT_HANDLER!(TokenKind::Hash, "#")),
        RegexPattern::new("^\\+\\+", MK_DEFAULT_HANDLER!(TokenKind::PlusPlus, "++")),
        RegexPattern::new("^\\+=", MK_DEFAULT_HANDLER!(TokenKind::PlusEquals, "+=")),
        RegexPattern::new("^\\+", MK_DEFAULT_HANDLER!(TokenKind::Plus, "+")),
        RegexPattern::new("^->", MK_DEFAULT_HANDLER!(TokenKind::Arrow, "->")),
        RegexPattern::new("^--", MK_DEFAULT_HANDLER!(TokenKind::MinusMinus, "--")),
        RegexPattern::new("^-=", MK_DEFAULT_HANDLER!(TokenKind::MinusEquals, "-=")),
        RegexPattern::new("^-", MK_DEFAULT_HANDLER!(TokenKind::Dash, "-")),
        RegexPattern::new("^\\*=", MK_DEFAULT_HANDLER!(TokenKind::StarEquals, "*=")),
        RegexPattern::new("^\\*", MK_DEFAULT_HANDLER!(TokenKind::Star, "*")),
        RegexPattern::new("^/=", MK_DEFAULT_HANDLER!(TokenKind::SlashEquals, "/=")),
        RegexPattern::new("^/", MK_DEFAULT_HANDLER!(TokenKind::Slash, "/")),
        RegexPattern::new("^%=", MK_DEFAULT_HANDLER!(TokenKind::PercentEquals, "%=")),
        RegexPattern::new("^%", MK_DEFAULT_HANDLER!(TokenKind::Percent, "%")),
    ];
}

pub struct Lexer {
    tokens: Vec<Token>,
    source: String,
    pub pos: usize,
    pub file: Rc<String>,
}

impl Lexer {
    pub fn new(source: String, file: Option<String>) -> Lexer {
        let file_name = if let Some(file) = file {
            Rc::new(file)
        } else {
            Rc::new(String::from("shell"))
        };

        Lexer {
            pos: 0,
            tokens: vec![],
            source,
            file: file_name,
        }
    }

    pub fn advance_n(&mut self, n: usize) {
        self.pos += n;
    }

    pub fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    pub fn remainder(&self) -> &str {
        &self.source[self.pos..]
    }

    pub fn at_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn matched(&self, regex: &Regex) -> String {
        regex
            .find(self.remainder())
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }
}

fn number_handler(lexer: &mut Lexer, regex: &Regex) {
    let matched = lexer.matched(regex);
    let start = lexer.pos;

    lexer.push(MK_TOKEN!(
        TokenKind::Number,
        matched.clone(),
        MK_SPAN!(lexer, start, start + matched.len())
    ));
    lexer.advance_n(matched.len());
}

fn skip_handler(lexer: &mut Lexer, regex: &Regex) {
    let matched = lexer.matched(regex);
    lexer.advance_n(matched.len().max(1));
}

fn string_handler(lexer: &mut Lexer, regex: &Regex) {
    let matched = lexer.matched(regex);
    let start = lexer.pos;
    let string_literal = unescape(&matched[1..matched.len() - 1]);

    lexer.push(MK_TOKEN!(
        TokenKind::String,
        string_literal,
        MK_SPAN!(lexer, start, start + matched.len())
    ));
    lexer.advance_n(matched.len());
}

fn char_handler(lexer: &mut Lexer, regex: &Regex) {
    let matched = lexer.matched(regex);
    let start = lexer.pos;
    let char_literal = unescape(&matched[1..matched.len() - 1]);

    lexer.push(MK_TOKEN!(
        TokenKind::Char,
        char_literal,
        MK_SPAN!(lexer, start, start + matched.len())
    ));
    lexer.advance_n(matched.len());
}

fn symbol_handler(lexer: &mut Lexer, regex: &Regex) {
    let value = lexer.matched(regex);
    let start = lexer.pos;
    let kind = RESERVED_LOOKUP
        .get(value.as_str())
        .copied()
        .unwrap_or(TokenKind::Identifier);

    lexer.push(MK_TOKEN!(
        kind,
        value.clone(),
        MK_SPAN!(lexer, start, start + value.len())
    ));
    lexer.advance_n(value.len());
}

/// Resolves backslash escapes inside string and character literals.
pub fn unescape(raw: &str) -> String {
    let mut result = String::new();
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }

        match chars.peek().copied() {
            Some('n') => {
                result.push('\n');
                chars.next();
            }
            Some('t') => {
                result.push('\t');
                chars.next();
            }
            Some('r') => {
                result.push('\r');
                chars.next();
            }
            Some('0') => {
                result.push('\0');
                chars.next();
            }
            Some(quote @ ('\\' | '"' | '\'')) => {
                result.push(quote);
                chars.next();
            }
            Some('x') => {
                chars.next();
                let mut hex = String::new();

                while hex.len() < 2 {
                    match chars.peek() {
                        Some(digit) if digit.is_ascii_hexdigit() => {
                            hex.push(*digit);
                            chars.next();
                        }
                        _ => break,
                    }
                }

                match u8::from_str_radix(&hex, 16) {
                    Ok(byte) => result.push(byte as char),
                    Err(_) => result.push_str("\\x"),
                }
            }
            // Unknown escapes keep the backslash
            _ => result.push(ch),
        }
    }

    result
}

pub fn tokenize(source: String, file: Option<String>) -> Result<Vec<Token>, Error> {
    let mut lex = Lexer::new(source, file);

    while !lex.at_eof() {
        let mut matched = false;

        for pattern in PATTERNS.iter() {
            if pattern.regex.is_match(lex.remainder()) {
                (pattern.handler)(&mut lex, &pattern.regex);
                matched = true;
                break;
            }
        }

        if !matched {
            let token = lex.remainder().chars().next().unwrap_or_default().to_string();
            return Err(Error::new(
                ErrorImpl::UnrecognisedToken { token },
                Position(lex.pos as u32, Rc::clone(&lex.file)),
            ));
        }
    }

    let end = lex.pos;
    lex.push(MK_TOKEN!(
        TokenKind::EOF,
        String::from("EOF"),
        MK_SPAN!(lex, end, end)
    ));
    Ok(lex.tokens)
}
