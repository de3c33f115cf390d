use lazy_static::lazy_static;
use std::{collections::HashMap, fmt::Display};

use crate::Span;

lazy_static! {
    pub static ref RESERVED_LOOKUP: HashMap<&'static str, TokenKind> = {
        let mut map = HashMap::new();
        map.insert("let", TokenKind::Let);
        map.insert("const", TokenKind::Const);
        map.insert("fn", TokenKind::Fn);
        map.insert("return", TokenKind::Return);
        map.insert("if", TokenKind::If);
        map.insert("else", TokenKind::Else);
        map.insert("while", TokenKind::While);
        map.insert("do", TokenKind::Do);
        map.insert("for", TokenKind::For);
        map.insert("break", TokenKind::Break);
        map.insert("continue", TokenKind::Continue);
        map.insert("goto", TokenKind::Goto);
        map.insert("struct", TokenKind::Struct);
        map.insert("enum", TokenKind::Enum);
        map.insert("module", TokenKind::Module);
        map.insert("alias", TokenKind::Alias);
        map.insert("extern", TokenKind::Extern);
        map.insert("static", TokenKind::Static);
        map.insert("as", TokenKind::As);
        map.insert("typeof", TokenKind::Typeof);
        map.insert("auto", TokenKind::Auto);
        map.insert("true", TokenKind::True);
        map.insert("false", TokenKind::False);
        map
    };
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum TokenKind {
    EOF,
    Number,
    String,
    Char,
    Identifier,

    OpenBracket,
    CloseBracket,
    OpenCurly,
    CloseCurly,
    OpenParen,
    CloseParen,

    Assignment, // =
    Equals,     // ==
    Not,        // !
    NotEquals,  // !=

    Less,
    LessEquals,
    Greater,
    GreaterEquals,

    Or,
    And,
    BitOr,
    BitAnd,
    Caret,
    Tilde,
    ShiftLeft,
    ShiftRight,

    Dot,
    Ellipsis,
    Semicolon,
    Colon,
    ColonColon,
    Question,
    Comma,
    Arrow,
    Hash,

    PlusPlus,
    MinusMinus,
    PlusEquals,
    MinusEquals,
    StarEquals,
    SlashEquals,
    PercentEquals,
    AndEquals,
    OrEquals,
    CaretEquals,
    ShiftLeftEquals,
    ShiftRightEquals,

    Plus,
    Dash,
    Slash,
    Star,
    Percent,

    // Reserved
    Let,
    Const,
    Fn,
    Return,
    If,
    Else,
    While,
    Do,
    For,
    Break,
    Continue,
    Goto,
    Struct,
    Enum,
    Module,
    Alias,
    Extern,
    Static,
    As,
    Typeof,
    Auto,
    True,
    False,
}

impl TokenKind {
    /// Whether this token starts a declaration the parser may cache before
    /// resolving it.
    pub fn starts_declaration(&self) -> bool {
        matches!(
            self,
            TokenKind::Let
                | TokenKind::Const
                | TokenKind::Fn
                | TokenKind::Extern
                | TokenKind::Static
                | TokenKind::Struct
                | TokenKind::Enum
                | TokenKind::Module
                | TokenKind::Alias
                | TokenKind::Hash
        )
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub span: Span,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token {{\nkind: {},\nvalue: {}}}", self.kind, self.value)
    }
}

impl Token {
    pub fn is_one_of_many(&self, tokens: &[TokenKind]) -> bool {
        tokens.contains(&self.kind)
    }

    pub fn debug(&self) {
        if self.is_one_of_many(&[
            TokenKind::String,
            TokenKind::Char,
            TokenKind::Identifier,
            TokenKind::Number,
        ]) {
            log::trace!("{} ({})", self.kind, self.value);
        } else {
            log::trace!("{} ()", self.kind);
        }
    }
}
