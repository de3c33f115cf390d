use crate::{
    ast::stmts::{ExprPtr, StmtPtr},
    errors::errors::Error,
    lexer::tokens::TokenKind,
    sema::scope::ScopeFlags,
    Span,
};

use super::{
    decl::parse_decl_stmt,
    expr::parse_expr,
    lookups::{BindingPower, STMT_LOOKUP},
    parser::Parser,
};

fn loop_scope() -> ScopeFlags {
    ScopeFlags::BREAK_SCOPE | ScopeFlags::CONTINUE_SCOPE | ScopeFlags::BLOCK_SCOPE
}

pub fn parse_stmt(parser: &mut Parser<'_>) -> Result<StmtPtr, Error> {
    let token_kind = parser.current_token_kind();
    if token_kind == TokenKind::Identifier && parser.peek_kind(1) == TokenKind::Colon {
        return parse_label_stmt(parser);
    }
    if let Some(handler) = STMT_LOOKUP.get(&token_kind).copied() {
        return handler(parser);
    }

    let expr = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::Semicolon)?;
    Ok(parser.sema.act_on_expr_stmt(expr))
}

/// A statement that gets its own block scope, as branches and loop bodies
/// do.
fn parse_scoped_stmt(parser: &mut Parser<'_>, flags: ScopeFlags) -> Result<StmtPtr, Error> {
    parser.with_scope(flags, parse_stmt)
}

/// Statements up to the closing `}`, which is consumed. Syntax errors in a
/// statement are reported and skipped, so this only fails on fatal errors.
pub fn parse_compound_items(parser: &mut Parser<'_>) -> Result<Vec<StmtPtr>, Error> {
    let mut stmts = vec![];
    loop {
        match parser.current_token_kind() {
            TokenKind::CloseCurly => {
                parser.advance();
                return Ok(stmts);
            }
            TokenKind::EOF => {
                let error = parser.unexpected("expected CloseCurly");
                parser.report_syntax_error(&error);
                return Ok(stmts);
            }
            _ => {
                if let Some(stmt) = parser.recover(parse_stmt)? {
                    stmts.push(stmt);
                }
            }
        }
    }
}

pub fn parse_block_stmt(parser: &mut Parser<'_>) -> Result<StmtPtr, Error> {
    let start = parser.expect(TokenKind::OpenCurly)?.span;
    let stmts = parser.with_scope(ScopeFlags::BLOCK_SCOPE, parse_compound_items)?;

    let span = parser.span_from(&start);
    Ok(parser.sema.act_on_compound_stmt(stmts, &span))
}

fn parse_paren_condition(parser: &mut Parser<'_>) -> Result<ExprPtr, Error> {
    parser.expect(TokenKind::OpenParen)?;
    let cond = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseParen)?;
    Ok(cond)
}

pub fn parse_if_stmt(parser: &mut Parser<'_>) -> Result<StmtPtr, Error> {
    let start = parser.expect(TokenKind::If)?.span;
    let cond = parse_paren_condition(parser)?;
    let then_stmt = parse_scoped_stmt(parser, ScopeFlags::BLOCK_SCOPE)?;

    let else_stmt = if parser.eat(TokenKind::Else) {
        Some(parse_scoped_stmt(parser, ScopeFlags::BLOCK_SCOPE)?)
    } else {
        None
    };

    let span = parser.span_from(&start);
    Ok(parser.sema.act_on_if_stmt(cond, then_stmt, else_stmt, &span))
}

pub fn parse_while_stmt(parser: &mut Parser<'_>) -> Result<StmtPtr, Error> {
    let start = parser.expect(TokenKind::While)?.span;
    let cond = parse_paren_condition(parser)?;
    let body = parse_scoped_stmt(parser, loop_scope())?;

    let span = parser.span_from(&start);
    Ok(parser.sema.act_on_while_stmt(cond, body, &span))
}

pub fn parse_do_stmt(parser: &mut Parser<'_>) -> Result<StmtPtr, Error> {
    let start = parser.expect(TokenKind::Do)?.span;
    let body = parse_scoped_stmt(parser, loop_scope())?;
    parser.expect(TokenKind::While)?;
    let cond = parse_paren_condition(parser)?;
    parser.expect(TokenKind::Semicolon)?;

    let span = parser.span_from(&start);
    Ok(parser.sema.act_on_do_stmt(body, cond, &span))
}

/// `for (init; cond; inc) body`. The loop scope also covers `init`, so a
/// variable declared there is visible in the whole loop only.
pub fn parse_for_stmt(parser: &mut Parser<'_>) -> Result<StmtPtr, Error> {
    let start = parser.expect(TokenKind::For)?.span;

    parser.with_scope(loop_scope(), |parser| {
        parser.expect(TokenKind::OpenParen)?;

        let init = match parser.current_token_kind() {
            TokenKind::Semicolon => {
                parser.advance();
                None
            }
            TokenKind::Let | TokenKind::Const => Some(parse_decl_stmt(parser)?),
            _ => {
                let expr = parse_expr(parser, BindingPower::Default)?;
                parser.expect(TokenKind::Semicolon)?;
                Some(parser.sema.act_on_expr_stmt(expr))
            }
        };

        let cond = if parser.current_token_kind() != TokenKind::Semicolon {
            Some(parse_expr(parser, BindingPower::Default)?)
        } else {
            None
        };
        parser.expect(TokenKind::Semicolon)?;

        let inc = if parser.current_token_kind() != TokenKind::CloseParen {
            Some(parse_expr(parser, BindingPower::Default)?)
        } else {
            None
        };
        parser.expect(TokenKind::CloseParen)?;

        let body = parse_stmt(parser)?;

        let span = parser.span_from(&start);
        Ok(parser.sema.act_on_for_stmt(init, cond, inc, body, &span))
    })
}

pub fn parse_break_stmt(parser: &mut Parser<'_>) -> Result<StmtPtr, Error> {
    let start = parser.expect(TokenKind::Break)?.span;
    parser.expect(TokenKind::Semicolon)?;
    Ok(parser.sema.act_on_break_stmt(&start))
}

pub fn parse_continue_stmt(parser: &mut Parser<'_>) -> Result<StmtPtr, Error> {
    let start = parser.expect(TokenKind::Continue)?.span;
    parser.expect(TokenKind::Semicolon)?;
    Ok(parser.sema.act_on_continue_stmt(&start))
}

pub fn parse_return_stmt(parser: &mut Parser<'_>) -> Result<StmtPtr, Error> {
    let start = parser.expect(TokenKind::Return)?.span;

    let value = if parser.current_token_kind() != TokenKind::Semicolon {
        Some(parse_expr(parser, BindingPower::Default)?)
    } else {
        None
    };
    parser.expect(TokenKind::Semicolon)?;

    let span = parser.span_from(&start);
    Ok(parser.sema.act_on_return_stmt(value, &span))
}

pub fn parse_goto_stmt(parser: &mut Parser<'_>) -> Result<StmtPtr, Error> {
    let start = parser.expect(TokenKind::Goto)?.span;
    let label = parser.expect(TokenKind::Identifier)?;
    parser.expect(TokenKind::Semicolon)?;

    let span = parser.span_from(&start);
    parser.sema.act_on_goto_stmt(&label.value, &span)
}

/// `name: stmt`
pub fn parse_label_stmt(parser: &mut Parser<'_>) -> Result<StmtPtr, Error> {
    let label = parser.expect(TokenKind::Identifier)?;
    parser.expect(TokenKind::Colon)?;

    // A label may end a block: `done: }`
    let sub_stmt = if parser.current_token_kind() == TokenKind::CloseCurly {
        parser.sema.act_on_null_stmt(&label.span)
    } else {
        parse_stmt(parser)?
    };

    parser.sema.act_on_label_stmt(&label.value, &label.span, sub_stmt)
}

pub fn parse_null_stmt(parser: &mut Parser<'_>) -> Result<StmtPtr, Error> {
    let token = parser.expect(TokenKind::Semicolon)?;
    Ok(parser.sema.act_on_null_stmt(&token.span))
}

/// `let`, `const` and `extern fn` prototypes inside a function body.
pub fn parse_local_decl_stmt(parser: &mut Parser<'_>) -> Result<StmtPtr, Error> {
    parse_decl_stmt(parser)
}

/// Parses `{ ... }` as a function body: the statements go straight into
/// the function scope, which is already open.
pub fn parse_function_body(parser: &mut Parser<'_>) -> Result<(Vec<StmtPtr>, Span), Error> {
    let start = parser.expect(TokenKind::OpenCurly)?.span;
    let stmts = parse_compound_items(parser)?;
    Ok((stmts, parser.span_from(&start)))
}
