use std::rc::Rc;

use crate::{
    ast::decls::{ContextId, DeclId, DeclaratorId, IdentifierNamespace},
    errors::errors::Error,
    lexer::tokens::Token,
    Span,
};

use super::{scope::ScopeId, sema::Sema};

/// Re-parses a cached declarator in Phase 2. The parser installs this so
/// Sema can resolve forward references without depending on it.
pub type DeclaratorResolver = fn(&mut Sema, DeclaratorId) -> Result<Option<DeclId>, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaratorKind {
    Function,
    Variable,
    Field,
    Alias,
}

impl DeclaratorKind {
    /// The namespace the resolved declaration will live in, which is also
    /// where its placeholder can be found.
    pub fn namespace(&self) -> IdentifierNamespace {
        match self {
            DeclaratorKind::Function | DeclaratorKind::Variable => IdentifierNamespace::ORDINARY,
            DeclaratorKind::Field => IdentifierNamespace::MEMBER,
            DeclaratorKind::Alias => IdentifierNamespace::TAG | IdentifierNamespace::MODULE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Pending,
    InProgress,
    Resolved(DeclId),
    Failed,
}

/// A declaration captured in Phase 1: its name, its tokens (terminated by
/// an EOF token) and where it was written.
#[derive(Debug, Clone)]
pub struct Declarator {
    pub kind: DeclaratorKind,
    pub name: Rc<str>,
    pub span: Span,
    pub tokens: Rc<[Token]>,
    pub file: Rc<String>,
    pub scope: ScopeId,
    pub context: ContextId,
    pub placeholder: DeclId,
    pub state: ResolutionState,
}

impl Declarator {
    pub fn is_resolved(&self) -> bool {
        matches!(self.state, ResolutionState::Resolved(_))
    }

    pub fn resolved_decl(&self) -> Option<DeclId> {
        match self.state {
            ResolutionState::Resolved(decl) => Some(decl),
            _ => None,
        }
    }
}
