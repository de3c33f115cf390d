use bitflags::bitflags;

use crate::ast::decls::{ContextId, DeclId};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScopeFlags: u16 {
        const TRANSLATION_UNIT   = 1 << 0;
        const MODULE_SCOPE       = 1 << 1;
        const FN_SCOPE           = 1 << 2;
        const FUNCTION_PROTOTYPE = 1 << 3;
        const BLOCK_SCOPE        = 1 << 4;
        const DECL_SCOPE         = 1 << 5;
        const RECORD_SCOPE       = 1 << 6;
        const ENUM_SCOPE         = 1 << 7;
        const BREAK_SCOPE        = 1 << 8;
        const CONTINUE_SCOPE     = 1 << 9;
    }
}

/// Index of a [`Scope`] in the Sema scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) usize);

/// One lexical nesting level. Scopes stay in the arena after they are
/// popped, so cached declarators can be resolved later from the scope they
/// were written in.
#[derive(Debug, Clone)]
pub struct Scope {
    pub flags: ScopeFlags,
    pub parent: Option<ScopeId>,
    /// The context new declarations in this scope are added to.
    pub entity: Option<ContextId>,
    decls: Vec<DeclId>,
}

impl Scope {
    pub fn new(flags: ScopeFlags, parent: Option<ScopeId>, entity: Option<ContextId>) -> Self {
        Scope {
            flags,
            parent,
            entity,
            decls: vec![],
        }
    }

    pub fn decls(&self) -> &[DeclId] {
        &self.decls
    }

    pub fn add_decl(&mut self, decl: DeclId) {
        if !self.decls.contains(&decl) {
            self.decls.push(decl);
        }
    }

    pub fn remove_decl(&mut self, decl: DeclId) -> bool {
        let before = self.decls.len();
        self.decls.retain(|candidate| *candidate != decl);
        before != self.decls.len()
    }

    /// Puts `new` where `old` was, keeping registration order.
    pub fn replace_decl(&mut self, old: DeclId, new: DeclId) -> bool {
        match self.decls.iter().position(|candidate| *candidate == old) {
            Some(index) => {
                self.decls[index] = new;
                true
            }
            None => false,
        }
    }

    pub fn retain_decls(&mut self, keep: impl FnMut(&DeclId) -> bool) {
        self.decls.retain(keep);
    }

    pub fn is_decl_scope(&self) -> bool {
        self.flags.intersects(
            ScopeFlags::TRANSLATION_UNIT
                | ScopeFlags::MODULE_SCOPE
                | ScopeFlags::DECL_SCOPE
                | ScopeFlags::RECORD_SCOPE
                | ScopeFlags::ENUM_SCOPE,
        )
    }
}
