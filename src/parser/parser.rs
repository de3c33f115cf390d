//! Parser state and entry points.
//!
//! The parser does not build a syntax tree of its own. As it recognizes a
//! declarator, statement or expression it calls the matching `act_on_*`
//! entry point of [`Sema`], which returns the typed node.
//!
//! A translation unit is parsed in two phases:
//!
//! - Phase 1 walks the top level. Functions, variables, aliases and record
//!   fields are only cached as token slices (see
//!   [`Sema::act_on_unresolved_declarator`]); records, enums and modules are
//!   declared right away so their scopes exist.
//! - Phase 2 resolves every cached declarator through [`resolve_declarator`],
//!   which Sema also calls on demand when a lookup lands on a declarator that
//!   has not been resolved yet.
//!
//! Syntax errors are reported as diagnostics and parsing resumes at the next
//! statement boundary. Any other error is fatal and propagates.

use std::rc::Rc;

use log::debug;

use crate::{
    ast::{
        decls::{DeclId, DeclaratorId},
        stmts::StmtPtr,
    },
    diagnostics::diagnostics::DiagId,
    errors::errors::{Error, ErrorCategory, ErrorImpl},
    lexer::{
        lexer::tokenize,
        tokens::{Token, TokenKind},
    },
    sema::{
        declarator::DeclaratorKind,
        scope::ScopeFlags,
        sema::{Phase, Sema},
    },
    Position, Span,
};

use super::{decl, stmt};

/// Token cursor plus the analyzer it feeds.
pub struct Parser<'a> {
    /// Always terminated by an EOF token
    tokens: Rc<[Token]>,
    pos: usize,
    file: Rc<String>,
    pub sema: &'a mut Sema,
}

impl<'a> Parser<'a> {
    /// Creates a parser over `tokens`. An EOF token is appended when the
    /// stream does not already end with one.
    pub fn new(tokens: impl Into<Rc<[Token]>>, file: Rc<String>, sema: &'a mut Sema) -> Self {
        let mut tokens: Rc<[Token]> = tokens.into();
        if tokens.last().map(|token| token.kind) != Some(TokenKind::EOF) {
            let end = tokens
                .last()
                .map(|token| token.span.end.clone())
                .unwrap_or_else(|| Position(0, Rc::clone(&file)));
            let mut owned = tokens.to_vec();
            owned.push(Token {
                kind: TokenKind::EOF,
                value: String::from("EOF"),
                span: Span {
                    start: end.clone(),
                    end,
                },
            });
            tokens = Rc::from(owned);
        }

        Parser {
            tokens,
            pos: 0,
            file,
            sema,
        }
    }

    pub fn current_token(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub fn current_token_kind(&self) -> TokenKind {
        self.current_token().kind
    }

    /// Kind of the token `offset` positions ahead; EOF past the end.
    pub fn peek_kind(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(TokenKind::EOF, |token| token.kind)
    }

    pub fn previous_token(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)]
    }

    /// Advances to the next token and returns the previous one. EOF is
    /// never stepped over.
    pub fn advance(&mut self) -> Token {
        let token = self.current_token().clone();
        if token.kind != TokenKind::EOF {
            self.pos += 1;
        }
        token
    }

    /// Consumes the current token when it is of `kind`.
    pub fn eat(&mut self, kind: TokenKind) -> bool {
        if self.current_token_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expects a token of the specified kind, with optional custom error.
    pub fn expect_error(&mut self, expected_kind: TokenKind, error: Option<Error>) -> Result<Token, Error> {
        if self.current_token_kind() == expected_kind {
            return Ok(self.advance());
        }
        Err(error.unwrap_or_else(|| self.unexpected(format!("expected {}", expected_kind))))
    }

    pub fn expect(&mut self, expected_kind: TokenKind) -> Result<Token, Error> {
        self.expect_error(expected_kind, None)
    }

    /// Whether there is anything left before EOF.
    pub fn has_tokens(&self) -> bool {
        self.current_token_kind() != TokenKind::EOF
    }

    pub fn get_position(&self) -> Position {
        self.current_token().span.start.clone()
    }

    pub fn file(&self) -> Rc<String> {
        Rc::clone(&self.file)
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Moves the cursor back to a position obtained from [`Parser::pos`].
    pub fn rewind(&mut self, pos: usize) {
        self.pos = pos.min(self.tokens.len() - 1);
    }

    /// Span from `start` to the end of the last consumed token.
    pub fn span_from(&self, start: &Span) -> Span {
        Span {
            start: start.start.clone(),
            end: self.previous_token().span.end.clone(),
        }
    }

    /// A syntax error at the current token.
    pub fn unexpected(&self, message: impl Into<String>) -> Error {
        let token = self.current_token();
        Error::new(
            ErrorImpl::UnexpectedTokenDetailed {
                token: token.value.clone(),
                message: message.into(),
            },
            token.span.start.clone(),
        )
    }

    /// Copies `tokens[start..end]` and terminates the copy with an EOF
    /// token, the shape cached declarators are stored in.
    pub fn slice_tokens(&self, start: usize, end: usize) -> Vec<Token> {
        let end = end.clamp(start, self.tokens.len() - 1);
        let mut tokens = self.tokens[start..end].to_vec();
        let tail = self.tokens[end.saturating_sub(1).max(start)].span.end.clone();
        tokens.push(Token {
            kind: TokenKind::EOF,
            value: String::from("EOF"),
            span: Span {
                start: tail.clone(),
                end: tail,
            },
        });
        tokens
    }

    /// `IDENT ('::' IDENT)*`. Returns the qualifiers, the final name and
    /// the span of the whole path.
    pub fn parse_path(&mut self) -> Result<(Vec<Rc<str>>, Rc<str>, Span), Error> {
        let first = self.expect(TokenKind::Identifier)?;
        let start = first.span.clone();
        let mut parts: Vec<Rc<str>> = vec![Rc::from(first.value.as_str())];

        while self.current_token_kind() == TokenKind::ColonColon && self.peek_kind(1) == TokenKind::Identifier {
            self.advance();
            parts.push(Rc::from(self.advance().value.as_str()));
        }

        let name = parts.pop().unwrap_or_else(|| Rc::from(first.value.as_str()));
        Ok((parts, name, self.span_from(&start)))
    }

    // Recovery

    /// Runs `parse`, turning a syntax error into a diagnostic and skipping
    /// to the next statement boundary. Other errors propagate.
    pub fn recover<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T, Error>) -> Result<Option<T>, Error> {
        let start = self.pos;
        match parse(self) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.category() == ErrorCategory::Syntax => {
                self.report_syntax_error(&error);
                self.synchronize(start);
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    pub fn report_syntax_error(&mut self, error: &Error) {
        let position = error.get_position().clone();
        let span = Span {
            start: position.clone(),
            end: position,
        };
        self.sema.diag(DiagId::ErrUnexpectedToken, &span, &[&error.to_string()]);
    }

    /// Skips past the next `;`, or up to a `}` closing the enclosing block.
    /// Always makes progress when nothing was consumed since `start`.
    pub fn synchronize(&mut self, start: usize) {
        loop {
            match self.current_token_kind() {
                TokenKind::EOF => break,
                TokenKind::Semicolon => {
                    self.advance();
                    break;
                }
                TokenKind::CloseCurly => {
                    if self.pos == start {
                        self.advance();
                    }
                    break;
                }
                TokenKind::OpenCurly => {
                    self.skip_group();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skips a bracketed group starting at the current opening token,
    /// including everything nested inside it.
    pub fn skip_group(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.current_token_kind() {
                TokenKind::EOF => return,
                TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenCurly => depth += 1,
                TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseCurly => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            self.advance();
            if depth == 0 {
                return;
            }
        }
    }

    /// Skips to the first of `kinds` outside any bracketed group, stopping
    /// early at EOF or at a closing token that would leave the current
    /// group.
    pub fn skip_until(&mut self, kinds: &[TokenKind]) {
        loop {
            let kind = self.current_token_kind();
            if kind == TokenKind::EOF || kinds.contains(&kind) {
                return;
            }
            match kind {
                TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenCurly => self.skip_group(),
                TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseCurly => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Runs `parse` inside a fresh scope, popping it whatever the outcome.
    pub fn with_scope<T>(
        &mut self,
        flags: ScopeFlags,
        parse: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        self.sema.push_scope(flags);
        let result = parse(self);
        self.sema.pop_scope()?;
        result
    }
}

/// Parses a whole translation unit into `sema`: Phase 1 over the tokens,
/// then Phase 2 over every cached declarator. Semantic and syntax errors
/// end up in the diagnostics engine.
pub fn parse_translation_unit(sema: &mut Sema, tokens: Vec<Token>, file: Rc<String>) -> Result<(), Error> {
    sema.set_declarator_resolver(resolve_declarator);
    sema.set_current_phase(Phase::Phase1);

    let mut parser = Parser::new(tokens, file, sema);
    decl::parse_decls(&mut parser, TokenKind::EOF, "translation unit")?;

    debug!(
        "parser: phase 1 cached {} declarator(s)",
        parser.sema.declarator_count()
    );
    parser.sema.set_current_phase(Phase::Phase2);
    parser.sema.resolve_pending_declarators()
}

/// Parses REPL input. Everything is analysed immediately in Phase 2;
/// declarations come back as declaration statements so their initializers
/// can run.
pub fn parse_statements(sema: &mut Sema, tokens: Vec<Token>, file: Rc<String>) -> Result<Vec<StmtPtr>, Error> {
    sema.set_declarator_resolver(resolve_declarator);
    sema.set_current_phase(Phase::Phase2);

    let mut parser = Parser::new(tokens, file, sema);
    let mut stmts = vec![];
    while parser.has_tokens() {
        let item = parser.recover(|parser| {
            if decl::starts_declaration(parser) {
                decl::parse_decl_stmt(parser)
            } else {
                stmt::parse_stmt(parser)
            }
        })?;
        if let Some(stmt) = item {
            stmts.push(stmt);
        }
    }
    Ok(stmts)
}

/// Re-parses a declarator cached in Phase 1. Installed into Sema, which
/// calls it with the declarator's scope and context already restored.
pub fn resolve_declarator(sema: &mut Sema, id: DeclaratorId) -> Result<Option<DeclId>, Error> {
    let (kind, tokens, file) = {
        let declarator = sema.declarator(id)?;
        (
            declarator.kind,
            Rc::clone(&declarator.tokens),
            Rc::clone(&declarator.file),
        )
    };

    let mut parser = Parser::new(tokens, file, sema);
    let decl = parser.recover(|parser| match kind {
        DeclaratorKind::Function => decl::parse_function_decl(parser),
        DeclaratorKind::Variable => decl::parse_var_decl(parser),
        DeclaratorKind::Field => decl::parse_field_decl(parser),
        DeclaratorKind::Alias => decl::parse_alias_decl(parser),
    })?;

    if decl.is_some() && parser.has_tokens() {
        let error = parser.unexpected("expected the end of the declaration");
        parser.report_syntax_error(&error);
    }
    Ok(decl)
}

/// Lexes `content`, registered under `name`, and parses it as a translation
/// unit. Fails with `CompilationFailed` once any error diagnostic was
/// reported, so callers only ever see a fully analysed unit.
pub fn parse_source(sema: &mut Sema, name: &str, content: &str) -> Result<(), Error> {
    let file = Rc::new(name.to_string());
    let tokens = tokenize(content.to_string(), Some(name.to_string()))?;
    parse_translation_unit(sema, tokens, Rc::clone(&file))?;

    if sema.has_errors() {
        return Err(Error::new(
            ErrorImpl::CompilationFailed {
                errors: sema.diags.error_count(),
            },
            Position(0, file),
        ));
    }
    Ok(())
}
