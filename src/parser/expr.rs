use crate::{
    ast::stmts::{BinaryOperator, ExprPtr, UnaryOperator},
    errors::errors::Error,
    lexer::tokens::TokenKind,
};

use super::{
    lookups::{BindingPower, BP_LOOKUP, LED_LOOKUP, NUD_LOOKUP},
    parser::Parser,
    types::parse_type,
};

/// Pratt loop: one NUD for the current token, then LEDs for as long as the
/// next operator binds tighter than `bp`.
pub fn parse_expr(parser: &mut Parser<'_>, bp: BindingPower) -> Result<ExprPtr, Error> {
    let token_kind = parser.current_token_kind();
    let nud = NUD_LOOKUP
        .get(&token_kind)
        .copied()
        .ok_or_else(|| parser.unexpected("expected an expression"))?;

    let mut left = nud(parser)?;

    loop {
        let token_kind = parser.current_token_kind();
        let token_bp = BP_LOOKUP
            .get(&token_kind)
            .copied()
            .unwrap_or(BindingPower::Default);
        if token_bp <= bp {
            break;
        }

        let led = LED_LOOKUP
            .get(&token_kind)
            .copied()
            .ok_or_else(|| parser.unexpected("expected an operator"))?;
        left = led(parser, left, token_bp)?;
    }

    Ok(left)
}

pub fn parse_primary_expr(parser: &mut Parser<'_>) -> Result<ExprPtr, Error> {
    let token = parser.advance();
    match token.kind {
        TokenKind::Number => parser.sema.act_on_numeric_constant(&token.value, &token.span),
        TokenKind::String => Ok(parser.sema.act_on_string_literal(&token.value, &token.span)),
        TokenKind::Char => Ok(parser.sema.act_on_char_literal(&token.value, &token.span)),
        TokenKind::True => Ok(parser.sema.act_on_bool_literal(true, &token.span)),
        TokenKind::False => Ok(parser.sema.act_on_bool_literal(false, &token.span)),
        _ => {
            parser.rewind(parser.pos().saturating_sub(1));
            Err(parser.unexpected("expected a literal"))
        }
    }
}

/// `name` or `a::b::name`.
pub fn parse_id_expr(parser: &mut Parser<'_>) -> Result<ExprPtr, Error> {
    let (qualifiers, name, span) = parser.parse_path()?;
    parser.sema.act_on_id_expr(&qualifiers, &name, &span)
}

pub fn parse_grouping_expr(parser: &mut Parser<'_>) -> Result<ExprPtr, Error> {
    let start = parser.expect(TokenKind::OpenParen)?.span;
    let inner = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseParen)?;

    let span = parser.span_from(&start);
    parser.sema.act_on_paren_expr(inner, &span)
}

pub fn parse_prefix_expr(parser: &mut Parser<'_>) -> Result<ExprPtr, Error> {
    let operator_token = parser.advance();
    let op = UnaryOperator::from_prefix_token(operator_token.kind)
        .ok_or_else(|| parser.unexpected("expected a prefix operator"))?;
    let operand = parse_expr(parser, BindingPower::Unary)?;

    let span = parser.span_from(&operator_token.span);
    parser.sema.act_on_unary_op(op, operand, &span)
}

pub fn parse_binary_expr(parser: &mut Parser<'_>, left: ExprPtr, bp: BindingPower) -> Result<ExprPtr, Error> {
    let operator_token = parser.advance();
    let op = BinaryOperator::from_token(operator_token.kind)
        .ok_or_else(|| parser.unexpected("expected a binary operator"))?;
    let right = parse_expr(parser, bp)?;

    let span = left.span.to(&right.span);
    parser.sema.act_on_binary_op(op, left, right, &span)
}

/// Right associative: `a = b = c` assigns `c` to `b` first.
pub fn parse_assignment_expr(parser: &mut Parser<'_>, left: ExprPtr, _bp: BindingPower) -> Result<ExprPtr, Error> {
    let operator_token = parser.advance();
    let op = BinaryOperator::from_token(operator_token.kind)
        .ok_or_else(|| parser.unexpected("expected an assignment operator"))?;
    let value = parse_expr(parser, BindingPower::Default)?;

    let span = left.span.to(&value.span);
    parser.sema.act_on_binary_op(op, left, value, &span)
}

pub fn parse_conditional_expr(parser: &mut Parser<'_>, cond: ExprPtr, _bp: BindingPower) -> Result<ExprPtr, Error> {
    parser.expect(TokenKind::Question)?;
    let then_expr = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::Colon)?;
    let else_expr = parse_expr(parser, BindingPower::Assignment)?;

    let span = cond.span.to(&else_expr.span);
    parser.sema.act_on_conditional_op(cond, then_expr, else_expr, &span)
}

pub fn parse_call_expr(parser: &mut Parser<'_>, callee: ExprPtr, _bp: BindingPower) -> Result<ExprPtr, Error> {
    parser.expect(TokenKind::OpenParen)?;

    let mut args = vec![];
    while parser.current_token_kind() != TokenKind::CloseParen {
        args.push(parse_expr(parser, BindingPower::Default)?);
        if !parser.eat(TokenKind::Comma) {
            break;
        }
    }
    parser.expect(TokenKind::CloseParen)?;

    let span = parser.span_from(&callee.span);
    parser.sema.act_on_call_expr(callee, args, &span)
}

pub fn parse_subscript_expr(parser: &mut Parser<'_>, base: ExprPtr, _bp: BindingPower) -> Result<ExprPtr, Error> {
    parser.expect(TokenKind::OpenBracket)?;
    let index = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseBracket)?;

    let span = parser.span_from(&base.span);
    parser.sema.act_on_array_subscript_expr(base, index, &span)
}

pub fn parse_member_expr(parser: &mut Parser<'_>, base: ExprPtr, _bp: BindingPower) -> Result<ExprPtr, Error> {
    parser.expect(TokenKind::Dot)?;
    let member = parser.expect(TokenKind::Identifier)?.value;

    let span = parser.span_from(&base.span);
    parser.sema.act_on_member_access_expr(base, &member, &span)
}

pub fn parse_postfix_expr(parser: &mut Parser<'_>, operand: ExprPtr, _bp: BindingPower) -> Result<ExprPtr, Error> {
    let operator_token = parser.advance();
    let op = UnaryOperator::from_postfix_token(operator_token.kind)
        .ok_or_else(|| parser.unexpected("expected a postfix operator"))?;

    let span = parser.span_from(&operand.span);
    parser.sema.act_on_postfix_unary_op(op, operand, &span)
}

/// `expr as type`
pub fn parse_as_expr(parser: &mut Parser<'_>, expr: ExprPtr, _bp: BindingPower) -> Result<ExprPtr, Error> {
    parser.expect(TokenKind::As)?;
    let ty = parse_type(parser)?;

    let span = parser.span_from(&expr.span);
    parser.sema.act_on_as_type_expr(expr, ty, &span)
}
