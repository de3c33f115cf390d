use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::{
    ast::{
        stmts::{ExprPtr, StmtPtr},
        types::TypeId,
    },
    errors::errors::Error,
    lexer::tokens::TokenKind,
};

use super::{expr::*, parser::Parser, stmt::*, types::*};

/// Operator precedence, weakest first.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug)]
pub enum BindingPower {
    Default,
    Assignment,
    Conditional,
    LogicalOr,
    LogicalAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
    Equality,
    Relational,
    Shift,
    Additive,
    Multiplicative,
    Unary,
    Postfix,
    Primary,
}

pub type StmtHandler = fn(&mut Parser<'_>) -> Result<StmtPtr, Error>;
pub type NUDHandler = fn(&mut Parser<'_>) -> Result<ExprPtr, Error>;
pub type LEDHandler = fn(&mut Parser<'_>, ExprPtr, BindingPower) -> Result<ExprPtr, Error>;
pub type TypeNUDHandler = fn(&mut Parser<'_>) -> Result<TypeId, Error>;

pub type StmtLookup = HashMap<TokenKind, StmtHandler>;
pub type NUDLookup = HashMap<TokenKind, NUDHandler>;
pub type LEDLookup = HashMap<TokenKind, LEDHandler>;
pub type BPLookup = HashMap<TokenKind, BindingPower>;
pub type TypeNUDLookup = HashMap<TokenKind, TypeNUDHandler>;

/// Infix and postfix operators with their binding power and handler.
fn led_table() -> Vec<(TokenKind, BindingPower, LEDHandler)> {
    let mut table: Vec<(TokenKind, BindingPower, LEDHandler)> = vec![];

    for kind in [
        TokenKind::Assignment,
        TokenKind::PlusEquals,
        TokenKind::MinusEquals,
        TokenKind::StarEquals,
        TokenKind::SlashEquals,
        TokenKind::PercentEquals,
        TokenKind::AndEquals,
        TokenKind::OrEquals,
        TokenKind::CaretEquals,
        TokenKind::ShiftLeftEquals,
        TokenKind::ShiftRightEquals,
    ] {
        table.push((kind, BindingPower::Assignment, parse_assignment_expr));
    }

    table.push((TokenKind::Question, BindingPower::Conditional, parse_conditional_expr));

    let binary = [
        (TokenKind::Or, BindingPower::LogicalOr),
        (TokenKind::And, BindingPower::LogicalAnd),
        (TokenKind::BitOr, BindingPower::BitwiseOr),
        (TokenKind::Caret, BindingPower::BitwiseXor),
        (TokenKind::BitAnd, BindingPower::BitwiseAnd),
        (TokenKind::Equals, BindingPower::Equality),
        (TokenKind::NotEquals, BindingPower::Equality),
        (TokenKind::Less, BindingPower::Relational),
        (TokenKind::LessEquals, BindingPower::Relational),
        (TokenKind::Greater, BindingPower::Relational),
        (TokenKind::GreaterEquals, BindingPower::Relational),
        (TokenKind::ShiftLeft, BindingPower::Shift),
        (TokenKind::ShiftRight, BindingPower::Shift),
        (TokenKind::Plus, BindingPower::Additive),
        (TokenKind::Dash, BindingPower::Additive),
        (TokenKind::Star, BindingPower::Multiplicative),
        (TokenKind::Slash, BindingPower::Multiplicative),
        (TokenKind::Percent, BindingPower::Multiplicative),
    ];
    for (kind, bp) in binary {
        table.push((kind, bp, parse_binary_expr));
    }

    // Postfix
    table.push((TokenKind::OpenParen, BindingPower::Postfix, parse_call_expr));
    table.push((TokenKind::OpenBracket, BindingPower::Postfix, parse_subscript_expr));
    table.push((TokenKind::Dot, BindingPower::Postfix, parse_member_expr));
    table.push((TokenKind::PlusPlus, BindingPower::Postfix, parse_postfix_expr));
    table.push((TokenKind::MinusMinus, BindingPower::Postfix, parse_postfix_expr));
    table.push((TokenKind::As, BindingPower::Postfix, parse_as_expr));

    table
}

lazy_static! {
    pub static ref LED_LOOKUP: LEDLookup = led_table()
        .into_iter()
        .map(|(kind, _, handler)| (kind, handler))
        .collect();

    pub static ref BP_LOOKUP: BPLookup = led_table()
        .into_iter()
        .map(|(kind, bp, _)| (kind, bp))
        .collect();

    pub static ref NUD_LOOKUP: NUDLookup = {
        let mut map: NUDLookup = HashMap::new();
        // Literals and symbols
        map.insert(TokenKind::Number, parse_primary_expr);
        map.insert(TokenKind::String, parse_primary_expr);
        map.insert(TokenKind::Char, parse_primary_expr);
        map.insert(TokenKind::True, parse_primary_expr);
        map.insert(TokenKind::False, parse_primary_expr);
        map.insert(TokenKind::Identifier, parse_id_expr);
        map.insert(TokenKind::OpenParen, parse_grouping_expr);
        // Prefix operators
        for kind in [
            TokenKind::Dash,
            TokenKind::Plus,
            TokenKind::Not,
            TokenKind::Tilde,
            TokenKind::PlusPlus,
            TokenKind::MinusMinus,
        ] {
            map.insert(kind, parse_prefix_expr);
        }
        map
    };

    pub static ref STMT_LOOKUP: StmtLookup = {
        let mut map: StmtLookup = HashMap::new();
        map.insert(TokenKind::OpenCurly, parse_block_stmt);
        map.insert(TokenKind::If, parse_if_stmt);
        map.insert(TokenKind::While, parse_while_stmt);
        map.insert(TokenKind::Do, parse_do_stmt);
        map.insert(TokenKind::For, parse_for_stmt);
        map.insert(TokenKind::Break, parse_break_stmt);
        map.insert(TokenKind::Continue, parse_continue_stmt);
        map.insert(TokenKind::Return, parse_return_stmt);
        map.insert(TokenKind::Goto, parse_goto_stmt);
        map.insert(TokenKind::Semicolon, parse_null_stmt);
        // Local declarations
        map.insert(TokenKind::Let, parse_local_decl_stmt);
        map.insert(TokenKind::Const, parse_local_decl_stmt);
        map.insert(TokenKind::Static, parse_local_decl_stmt);
        map.insert(TokenKind::Extern, parse_local_decl_stmt);
        map.insert(TokenKind::Hash, parse_local_decl_stmt);
        map
    };

    pub static ref TYPE_NUD_LOOKUP: TypeNUDLookup = {
        let mut map: TypeNUDLookup = HashMap::new();
        map.insert(TokenKind::Identifier, parse_named_type);
        map.insert(TokenKind::OpenBracket, parse_array_type);
        map.insert(TokenKind::OpenParen, parse_paren_type);
        map.insert(TokenKind::Typeof, parse_typeof_type);
        map.insert(TokenKind::Auto, parse_auto_type);
        map
    };
}
