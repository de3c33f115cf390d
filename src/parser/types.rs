//! Type parsing implementation.
//!
//! Handles the written forms of types:
//!
//! - Builtin spellings and (qualified) tag or alias names
//! - Fixed size arrays, `[T; N]`
//! - Parenthesized types, `(T)`
//! - `typeof(expr)` and `auto`
//!
//! Like expressions, each form is dispatched through a NUD handler keyed by
//! its first token. Sema turns the written form into an interned type.

use crate::{ast::types::TypeId, errors::errors::Error, lexer::tokens::TokenKind};

use super::{
    expr::parse_expr,
    lookups::{BindingPower, TYPE_NUD_LOOKUP},
    parser::Parser,
};

pub fn parse_type(parser: &mut Parser<'_>) -> Result<TypeId, Error> {
    let token_kind = parser.current_token_kind();
    let nud = TYPE_NUD_LOOKUP
        .get(&token_kind)
        .copied()
        .ok_or_else(|| parser.unexpected("expected a type"))?;
    nud(parser)
}

pub fn parse_named_type(parser: &mut Parser<'_>) -> Result<TypeId, Error> {
    let (qualifiers, name, span) = parser.parse_path()?;
    parser.sema.act_on_type_name(&qualifiers, &name, &span)
}

pub fn parse_array_type(parser: &mut Parser<'_>) -> Result<TypeId, Error> {
    let start = parser.expect(TokenKind::OpenBracket)?.span;
    let element = parse_type(parser)?;
    parser.expect(TokenKind::Semicolon)?;
    let size = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseBracket)?;

    let span = parser.span_from(&start);
    Ok(parser.sema.act_on_array_type(element, size, &span))
}

pub fn parse_paren_type(parser: &mut Parser<'_>) -> Result<TypeId, Error> {
    parser.expect(TokenKind::OpenParen)?;
    let inner = parse_type(parser)?;
    parser.expect(TokenKind::CloseParen)?;
    Ok(parser.sema.act_on_paren_type(inner))
}

pub fn parse_typeof_type(parser: &mut Parser<'_>) -> Result<TypeId, Error> {
    parser.expect(TokenKind::Typeof)?;
    parser.expect(TokenKind::OpenParen)?;
    let expr = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseParen)?;
    Ok(parser.sema.act_on_typeof_type(expr))
}

pub fn parse_auto_type(parser: &mut Parser<'_>) -> Result<TypeId, Error> {
    parser.expect(TokenKind::Auto)?;
    Ok(parser.sema.act_on_auto_type())
}
