//! Declaration parsing.
//!
//! At the top level of a translation unit (and inside modules) Phase 1 only
//! captures functions, variables and aliases: their tokens are sliced out
//! and handed to Sema as unresolved declarators. Records, enums and modules
//! open scopes other declarations live in, so they are declared eagerly;
//! record fields are cached like any other declarator.
//!
//! The `parse_*_decl` functions below do the full parse. They run when a
//! cached declarator is resolved, and directly for anything seen in
//! Phase 2 (function bodies, REPL input).

use std::rc::Rc;

use crate::{
    ast::{
        attributes::Attribute,
        decls::{AliasTarget, DeclId, DeclKind, StorageClass},
        stmts::StmtPtr,
        types::BuiltinClass,
    },
    diagnostics::diagnostics::DiagId,
    errors::errors::{Error, ErrorCategory},
    lexer::tokens::TokenKind,
    sema::{declarator::DeclaratorKind, sema::Phase},
};

use super::{
    expr::parse_expr,
    lookups::BindingPower,
    parser::Parser,
    stmt::parse_function_body,
    types::parse_type,
};

// Prefixes

/// `#[name]` and `#[name("argument")]`, any number of them.
pub fn parse_attributes(parser: &mut Parser<'_>) -> Result<Vec<Rc<dyn Attribute>>, Error> {
    let mut attributes = vec![];
    while parser.current_token_kind() == TokenKind::Hash {
        let start = parser.advance().span;
        parser.expect(TokenKind::OpenBracket)?;
        let name = parser.expect(TokenKind::Identifier)?;

        let argument = if parser.eat(TokenKind::OpenParen) {
            let argument = parser.expect(TokenKind::String)?.value;
            parser.expect(TokenKind::CloseParen)?;
            Some(argument)
        } else {
            None
        };
        parser.expect(TokenKind::CloseBracket)?;

        let span = parser.span_from(&start);
        if let Some(attribute) = parser.sema.act_on_attribute(&name.value, argument, &span) {
            attributes.push(attribute);
        }
    }
    Ok(attributes)
}

pub fn parse_storage_class(parser: &mut Parser<'_>) -> StorageClass {
    match parser.current_token_kind() {
        TokenKind::Extern => {
            parser.advance();
            StorageClass::Extern
        }
        TokenKind::Static => {
            parser.advance();
            StorageClass::Static
        }
        _ => StorageClass::None,
    }
}

/// The keyword that decides what the declaration at the cursor is, looking
/// past attributes and storage classes, with its offset from the cursor.
pub fn declaration_keyword(parser: &Parser<'_>) -> (TokenKind, usize) {
    let mut offset = 0;
    loop {
        match parser.peek_kind(offset) {
            TokenKind::Hash if parser.peek_kind(offset + 1) == TokenKind::OpenBracket => {
                offset += 2;
                let mut depth = 1usize;
                while depth > 0 {
                    match parser.peek_kind(offset) {
                        TokenKind::EOF => return (TokenKind::EOF, offset),
                        TokenKind::OpenBracket => depth += 1,
                        TokenKind::CloseBracket => depth -= 1,
                        _ => {}
                    }
                    offset += 1;
                }
            }
            TokenKind::Extern | TokenKind::Static => offset += 1,
            kind => return (kind, offset),
        }
    }
}

pub fn starts_declaration(parser: &Parser<'_>) -> bool {
    parser.current_token_kind().starts_declaration()
}

fn in_function(parser: &Parser<'_>) -> bool {
    !parser.sema.functions.is_empty()
}

// Declaration lists

/// Declarations up to `terminator` (not consumed). Anything that is not a
/// declaration is diagnosed as a statement at `scope_name` scope and
/// skipped.
pub fn parse_decls(parser: &mut Parser<'_>, terminator: TokenKind, scope_name: &str) -> Result<(), Error> {
    while parser.current_token_kind() != terminator && parser.has_tokens() {
        parser.recover(|parser| parse_top_level_decl(parser, scope_name))?;
    }
    Ok(())
}

fn parse_top_level_decl(parser: &mut Parser<'_>, scope_name: &str) -> Result<(), Error> {
    let (keyword, offset) = declaration_keyword(parser);
    let caching = parser.sema.current_phase() == Phase::Phase1;

    match keyword {
        TokenKind::Struct => parse_struct_decl(parser).map(drop),
        TokenKind::Enum => parse_enum_decl(parser).map(drop),
        TokenKind::Module => parse_module_decl(parser).map(drop),
        TokenKind::Fn if caching => cache_declarator(parser, DeclaratorKind::Function, offset),
        TokenKind::Let | TokenKind::Const if caching => cache_declarator(parser, DeclaratorKind::Variable, offset),
        TokenKind::Alias if caching => cache_declarator(parser, DeclaratorKind::Alias, offset),
        TokenKind::Fn => parse_function_decl(parser).map(drop),
        TokenKind::Let | TokenKind::Const => parse_var_decl(parser).map(drop),
        TokenKind::Alias => parse_alias_decl(parser).map(drop),
        _ => {
            let span = parser.current_token().span.clone();
            parser.sema.diag(DiagId::ErrStatementNotAllowed, &span, &[scope_name]);
            let start = parser.pos();
            parser.synchronize(start);
            Ok(())
        }
    }
}

/// Phase 1: slices out the declaration at the cursor and hands it to Sema.
/// Only the name is looked at; the keyword sits `offset` tokens ahead.
fn cache_declarator(parser: &mut Parser<'_>, kind: DeclaratorKind, offset: usize) -> Result<(), Error> {
    let start = parser.pos();
    parser.rewind(start + offset + 1);
    let name = parser.expect(TokenKind::Identifier)?;

    match kind {
        DeclaratorKind::Function => {
            parser.skip_until(&[TokenKind::OpenCurly, TokenKind::Semicolon]);
            if parser.current_token_kind() == TokenKind::OpenCurly {
                parser.skip_group();
            } else {
                parser.expect(TokenKind::Semicolon)?;
            }
        }
        _ => {
            parser.skip_until(&[TokenKind::Semicolon]);
            parser.expect(TokenKind::Semicolon)?;
        }
    }

    let tokens = parser.slice_tokens(start, parser.pos());
    let file = parser.file();
    parser
        .sema
        .act_on_unresolved_declarator(kind, Rc::from(name.value.as_str()), name.span, tokens, file)?;
    Ok(())
}

// Functions

/// `extern? fn name(a: T, ...) -> R` followed by a body or `;`.
pub fn parse_function_decl(parser: &mut Parser<'_>) -> Result<DeclId, Error> {
    let attributes = parse_attributes(parser)?;
    let storage = parse_storage_class(parser);
    parser.expect(TokenKind::Fn)?;
    let name = parser.expect(TokenKind::Identifier)?;

    parser.expect(TokenKind::OpenParen)?;
    let mut params = vec![];
    let mut variadic = false;
    while parser.current_token_kind() != TokenKind::CloseParen {
        if parser.eat(TokenKind::Ellipsis) {
            variadic = true;
            break;
        }
        let param = parser.expect(TokenKind::Identifier)?;
        parser.expect(TokenKind::Colon)?;
        let ty = parse_type(parser)?;
        params.push(parser.sema.act_on_param_declarator(Some(&param.value), &param.span, ty));

        if !parser.eat(TokenKind::Comma) {
            break;
        }
    }
    parser.expect(TokenKind::CloseParen)?;

    let result = if parser.eat(TokenKind::Arrow) {
        parse_type(parser)?
    } else {
        parser.sema.ast.get_builtin_type(BuiltinClass::Void)
    };

    let decl = parser.sema.act_on_function_declarator(
        &name.value,
        &name.span,
        result,
        params,
        variadic,
        storage,
        attributes,
    )?;

    if parser.current_token_kind() != TokenKind::OpenCurly {
        parser.expect(TokenKind::Semicolon)?;
        return Ok(decl);
    }
    if storage == StorageClass::Extern {
        return Err(parser.unexpected("an extern function cannot have a body"));
    }
    if in_function(parser) {
        return Err(parser.unexpected("functions cannot be defined inside another function"));
    }

    parser.sema.act_on_start_of_function_def(decl)?;
    let (stmts, span) = parse_function_body(parser)?;
    let body = parser.sema.act_on_compound_stmt(stmts, &span);
    parser.sema.act_on_finish_function_body(decl, body)?;
    Ok(decl)
}

// Variables, fields and aliases

/// `let name: T = init;` or `const name = init;`
pub fn parse_var_decl(parser: &mut Parser<'_>) -> Result<DeclId, Error> {
    let attributes = parse_attributes(parser)?;
    let storage = parse_storage_class(parser);
    let constant = match parser.current_token_kind() {
        TokenKind::Let => false,
        TokenKind::Const => true,
        _ => return Err(parser.unexpected("expected Let or Const")),
    };
    parser.advance();
    let name = parser.expect(TokenKind::Identifier)?;

    let ty = if parser.eat(TokenKind::Colon) {
        Some(parse_type(parser)?)
    } else {
        None
    };
    let init = if parser.eat(TokenKind::Assignment) {
        Some(parse_expr(parser, BindingPower::Default)?)
    } else {
        None
    };
    parser.expect(TokenKind::Semicolon)?;

    let decl = parser
        .sema
        .act_on_variable_declarator(&name.value, &name.span, ty, init, constant, storage)?;
    parser.sema.attach_attributes(decl, attributes);
    Ok(decl)
}

/// `name: T`, one record member.
pub fn parse_field_decl(parser: &mut Parser<'_>) -> Result<DeclId, Error> {
    let name = parser.expect(TokenKind::Identifier)?;
    parser.expect(TokenKind::Colon)?;
    let ty = parse_type(parser)?;
    parser.sema.act_on_field_declarator(&name.value, &name.span, ty)
}

/// `alias Name = target;`. A path may name a module as well as a type.
pub fn parse_alias_decl(parser: &mut Parser<'_>) -> Result<DeclId, Error> {
    let attributes = parse_attributes(parser)?;
    parser.expect(TokenKind::Alias)?;
    let name = parser.expect(TokenKind::Identifier)?;
    parser.expect(TokenKind::Assignment)?;

    let target = if parser.current_token_kind() == TokenKind::Identifier {
        let (qualifiers, target, span) = parser.parse_path()?;
        parser.sema.act_on_alias_target_path(&qualifiers, &target, &span)?
    } else {
        AliasTarget::Type(parse_type(parser)?)
    };
    parser.expect(TokenKind::Semicolon)?;

    let decl = parser.sema.act_on_alias_declaration(&name.value, &name.span, target)?;
    parser.sema.attach_attributes(decl, attributes);
    Ok(decl)
}

// Records, enums and modules

/// Parses one member with `parse`, recovering at the next `,` or `}` on a
/// syntax error, then eats the separating comma.
fn parse_member(parser: &mut Parser<'_>, parse: impl FnOnce(&mut Parser<'_>) -> Result<(), Error>) -> Result<(), Error> {
    if let Err(error) = parse(parser) {
        if error.category() != ErrorCategory::Syntax {
            return Err(error);
        }
        parser.report_syntax_error(&error);
        parser.skip_until(&[TokenKind::Comma, TokenKind::CloseCurly]);
        if !matches!(
            parser.current_token_kind(),
            TokenKind::Comma | TokenKind::CloseCurly | TokenKind::EOF
        ) {
            parser.advance();
        }
    }
    parser.eat(TokenKind::Comma);
    Ok(())
}

fn parse_struct_field(parser: &mut Parser<'_>) -> Result<(), Error> {
    if parser.sema.current_phase() == Phase::Phase2 {
        return parse_field_decl(parser).map(drop);
    }

    let start = parser.pos();
    let name = parser.expect(TokenKind::Identifier)?;
    parser.skip_until(&[TokenKind::Comma, TokenKind::CloseCurly]);

    let tokens = parser.slice_tokens(start, parser.pos());
    let file = parser.file();
    parser.sema.act_on_unresolved_declarator(
        DeclaratorKind::Field,
        Rc::from(name.value.as_str()),
        name.span,
        tokens,
        file,
    )?;
    Ok(())
}

/// `struct Name { a: T, b: U }`
pub fn parse_struct_decl(parser: &mut Parser<'_>) -> Result<DeclId, Error> {
    let attributes = parse_attributes(parser)?;
    parser.expect(TokenKind::Struct)?;
    let name = parser.expect(TokenKind::Identifier)?;
    parser.expect(TokenKind::OpenCurly)?;

    let tag = parser.sema.act_on_tag(DeclKind::Record, &name.value, &name.span, None)?;
    parser.sema.attach_attributes(tag, attributes);

    parser.sema.act_on_tag_start_definition(tag)?;
    let mut body = Ok(());
    while body.is_ok() && !matches!(parser.current_token_kind(), TokenKind::CloseCurly | TokenKind::EOF) {
        body = parse_member(parser, parse_struct_field);
    }
    parser.sema.act_on_tag_finish_definition(tag)?;

    body?;
    parser.expect(TokenKind::CloseCurly)?;
    Ok(tag)
}

/// `enum Name : T { A = 1, B }`. Enumerators are analysed as they are
/// read, in Phase 2 terms, so their values may refer to cached constants.
pub fn parse_enum_decl(parser: &mut Parser<'_>) -> Result<DeclId, Error> {
    let phase = parser.sema.current_phase();
    parser.sema.set_current_phase(Phase::Phase2);
    let result = parse_enum_decl_body(parser);
    parser.sema.set_current_phase(phase);
    result
}

fn parse_enum_decl_body(parser: &mut Parser<'_>) -> Result<DeclId, Error> {
    let attributes = parse_attributes(parser)?;
    parser.expect(TokenKind::Enum)?;
    let name = parser.expect(TokenKind::Identifier)?;
    let underlying = if parser.eat(TokenKind::Colon) {
        Some(parse_type(parser)?)
    } else {
        None
    };
    parser.expect(TokenKind::OpenCurly)?;

    let tag = parser.sema.act_on_tag(DeclKind::Enum, &name.value, &name.span, underlying)?;
    parser.sema.attach_attributes(tag, attributes);

    parser.sema.act_on_tag_start_definition(tag)?;
    let mut body = Ok(());
    while body.is_ok() && !matches!(parser.current_token_kind(), TokenKind::CloseCurly | TokenKind::EOF) {
        body = parse_member(parser, |parser| {
            let enumerator = parser.expect(TokenKind::Identifier)?;
            let init = if parser.eat(TokenKind::Assignment) {
                Some(parse_expr(parser, BindingPower::Default)?)
            } else {
                None
            };
            parser
                .sema
                .act_on_enumerator(tag, &enumerator.value, &enumerator.span, init)?;
            Ok(())
        });
    }
    parser.sema.act_on_tag_finish_definition(tag)?;

    body?;
    parser.expect(TokenKind::CloseCurly)?;
    Ok(tag)
}

/// `module name { decls }`. A module written twice is reopened.
pub fn parse_module_decl(parser: &mut Parser<'_>) -> Result<DeclId, Error> {
    let attributes = parse_attributes(parser)?;
    parser.expect(TokenKind::Module)?;
    let name = parser.expect(TokenKind::Identifier)?;
    parser.expect(TokenKind::OpenCurly)?;

    let module = parser.sema.act_on_module_decl(&name.value, &name.span)?;
    parser.sema.attach_attributes(module, attributes);

    parser.sema.act_on_start_module(module)?;
    let body = parse_decls(parser, TokenKind::CloseCurly, "module");
    parser.sema.act_on_finish_module(module)?;

    body?;
    parser.expect(TokenKind::CloseCurly)?;
    Ok(module)
}

// Declaration statements

/// A declaration in statement position: inside a function body, a `for`
/// initializer or a REPL line. Parsed immediately and wrapped in a
/// declaration statement.
pub fn parse_decl_stmt(parser: &mut Parser<'_>) -> Result<StmtPtr, Error> {
    let start = parser.current_token().span.clone();
    let (keyword, _) = declaration_keyword(parser);

    let decl = match keyword {
        TokenKind::Let | TokenKind::Const => parse_var_decl(parser)?,
        TokenKind::Fn => parse_function_decl(parser)?,
        TokenKind::Alias => parse_alias_decl(parser)?,
        TokenKind::Struct | TokenKind::Enum | TokenKind::Module if in_function(parser) => {
            return Err(parser.unexpected("only variables, aliases and function prototypes can be declared here"));
        }
        TokenKind::Struct => parse_struct_decl(parser)?,
        TokenKind::Enum => parse_enum_decl(parser)?,
        TokenKind::Module => parse_module_decl(parser)?,
        _ => return Err(parser.unexpected("expected a declaration")),
    };

    let span = parser.span_from(&start);
    Ok(parser.sema.act_on_decl_stmt(vec![decl], &span))
}
