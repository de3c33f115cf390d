use std::rc::Rc;

use log::debug;

use crate::{
    ast::{
        decls::{AliasTarget, ContextId, DeclId, DeclKind, IdentifierNamespace},
        types::{Type, TypeId},
    },
    errors::errors::Error,
    Span,
};

use super::{
    scope::ScopeId,
    sema::{Phase, Sema},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Ordinary,
    Tag,
    Label,
    Member,
    Module,
    Any,
}

impl LookupKind {
    pub fn namespace(&self) -> IdentifierNamespace {
        match self {
            LookupKind::Ordinary => IdentifierNamespace::ORDINARY,
            LookupKind::Tag => IdentifierNamespace::TAG,
            LookupKind::Label => IdentifierNamespace::LABEL,
            LookupKind::Member => IdentifierNamespace::MEMBER,
            LookupKind::Module => IdentifierNamespace::MODULE,
            LookupKind::Any => IdentifierNamespace::all(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupClassification {
    NotFound,
    Found,
    FoundOverloaded,
    Ambiguous,
}

/// One name lookup: the question and, once resolved, the answer.
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub name: Rc<str>,
    pub kind: LookupKind,
    pub span: Span,
    /// Object type for member lookups.
    pub base_type: Option<TypeId>,
    decls: Vec<DeclId>,
    classification: LookupClassification,
    /// Set when a candidate failed to resolve and was already diagnosed.
    suppress_diagnostics: bool,
}

impl LookupResult {
    pub fn new(name: &str, kind: LookupKind, span: Span) -> Self {
        LookupResult {
            name: Rc::from(name),
            kind,
            span,
            base_type: None,
            decls: vec![],
            classification: LookupClassification::NotFound,
            suppress_diagnostics: false,
        }
    }

    pub fn member(name: &str, base_type: TypeId, span: Span) -> Self {
        let mut result = LookupResult::new(name, LookupKind::Member, span);
        result.base_type = Some(base_type);
        result
    }

    /// Adds a candidate; duplicates are ignored.
    pub fn add_decl(&mut self, decl: DeclId) {
        if !self.decls.contains(&decl) {
            self.decls.push(decl);
        }
    }

    pub fn decls(&self) -> &[DeclId] {
        &self.decls
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn clear(&mut self) {
        self.decls.clear();
        self.classification = LookupClassification::NotFound;
    }

    pub fn classification(&self) -> LookupClassification {
        self.classification
    }

    pub fn is_found(&self) -> bool {
        self.classification == LookupClassification::Found
    }

    /// The single declaration of a `Found` result.
    pub fn get_found_decl(&self) -> Option<DeclId> {
        match self.classification {
            LookupClassification::Found => self.decls.first().copied(),
            _ => None,
        }
    }

    pub fn suppress_diagnostics(&self) -> bool {
        self.suppress_diagnostics
    }
}

impl Sema {
    /// Unqualified lookup, walking outward from `scope`. The innermost scope
    /// holding any match answers the query, so inner names shadow outer
    /// ones. Returns whether anything was found.
    pub fn lookup_name(&mut self, result: &mut LookupResult, scope: ScopeId) -> Result<bool, Error> {
        let namespace = result.kind.namespace();
        let found = self.lookup_name_in(result, scope, namespace)?;
        if !found {
            self.classify(result);
        }
        Ok(found)
    }

    /// Looks `result.name` up among the members of `context` only. Enclosing
    /// contexts are never consulted.
    pub fn lookup_qualified_name(&mut self, result: &mut LookupResult, context: ContextId) -> Result<bool, Error> {
        let namespace = result.kind.namespace();
        self.lookup_qualified_in(result, context, namespace)
    }

    /// Resolves `qualifier::...::name`. The first qualifier is found with an
    /// unqualified lookup from `scope`; each following part is looked up
    /// inside the context named by the previous one.
    pub fn lookup_nested_name(
        &mut self,
        result: &mut LookupResult,
        scope: ScopeId,
        qualifiers: &[Rc<str>],
    ) -> Result<bool, Error> {
        if qualifiers.is_empty() {
            return self.lookup_name(result, scope);
        }

        let mut context: Option<ContextId> = None;
        for qualifier in qualifiers {
            let mut step = LookupResult::new(qualifier, LookupKind::Any, result.span.clone());
            let found = match context {
                None => self.lookup_name_in(&mut step, scope, Self::qualifier_namespace())?,
                Some(context) => self.lookup_qualified_in(&mut step, context, Self::qualifier_namespace())?,
            };

            if !found {
                result.clear();
                result.suppress_diagnostics |= step.suppress_diagnostics;
                return Ok(false);
            }

            match step.get_found_decl().and_then(|decl| self.nested_context(decl)) {
                Some(next) => context = Some(next),
                None => {
                    result.clear();
                    return Ok(false);
                }
            }
        }

        match context {
            Some(context) => self.lookup_qualified_name(result, context),
            None => Ok(false),
        }
    }

    /// The context a qualifier names: modules, enums and records directly,
    /// aliases through their target.
    pub fn nested_context(&self, decl: DeclId) -> Option<ContextId> {
        let entry = self.ast.get_decl(decl);
        match entry.kind {
            DeclKind::Module | DeclKind::Enum | DeclKind::Record => self.ast.as_decl_context(decl),
            DeclKind::Alias => match self.ast.alias_target(decl)? {
                AliasTarget::Module(module) => self.ast.as_decl_context(module),
                AliasTarget::Type(ty) => match self.ast.get_type(self.ast.underlying_type(ty)) {
                    Type::Record(decl) | Type::Enum(decl) => self.ast.as_decl_context(*decl),
                    _ => None,
                },
            },
            _ => None,
        }
    }

    fn qualifier_namespace() -> IdentifierNamespace {
        IdentifierNamespace::MODULE | IdentifierNamespace::TAG
    }

    fn lookup_name_in(
        &mut self,
        result: &mut LookupResult,
        scope: ScopeId,
        namespace: IdentifierNamespace,
    ) -> Result<bool, Error> {
        result.clear();
        let mut current = Some(scope);
        while let Some(id) = current {
            let matches: Vec<DeclId> = self
                .scope(id)
                .decls()
                .iter()
                .copied()
                .filter(|decl| self.matches_name(*decl, &result.name, namespace))
                .collect();

            if !matches.is_empty() {
                for decl in matches {
                    result.add_decl(decl);
                }
                self.finish_lookup(result)?;
                if !result.is_empty() {
                    return Ok(true);
                }
            }
            current = self.scope(id).parent;
        }
        Ok(false)
    }

    fn lookup_qualified_in(
        &mut self,
        result: &mut LookupResult,
        context: ContextId,
        namespace: IdentifierNamespace,
    ) -> Result<bool, Error> {
        result.clear();
        let matches: Vec<DeclId> = self
            .ast
            .decls(context)
            .filter(|decl| self.matches_name(*decl, &result.name, namespace))
            .collect();
        for decl in matches {
            result.add_decl(decl);
        }
        self.finish_lookup(result)?;
        Ok(!result.is_empty())
    }

    fn matches_name(&self, decl: DeclId, name: &str, namespace: IdentifierNamespace) -> bool {
        self.ast.get_decl(decl).has_name(name) && self.decl_namespace(decl).intersects(namespace)
    }

    /// Resolves placeholders among the candidates (Phase 2 only), then
    /// classifies the result.
    fn finish_lookup(&mut self, result: &mut LookupResult) -> Result<(), Error> {
        if self.current_phase() == Phase::Phase2 {
            let candidates = std::mem::take(&mut result.decls);
            for decl in candidates {
                match self.ast.get_decl(decl).declarator() {
                    Some(declarator) => match self.resolve_declarator(declarator)? {
                        Some(resolved) => {
                            if self
                                .ast
                                .get_decl(resolved)
                                .kind
                                .namespace()
                                .intersects(result.kind.namespace())
                            {
                                result.add_decl(resolved);
                            }
                        }
                        None => result.suppress_diagnostics = true,
                    },
                    None => result.add_decl(decl),
                }
            }
        }

        self.classify(result);
        Ok(())
    }

    /// Zero candidates is NotFound, one is Found, several functions with
    /// pairwise distinct signatures are FoundOverloaded and anything else is
    /// Ambiguous.
    pub fn classify(&self, result: &mut LookupResult) {
        result.classification = match result.decls.len() {
            0 => LookupClassification::NotFound,
            1 => LookupClassification::Found,
            _ if self.are_mutually_overloadable(&result.decls) => LookupClassification::FoundOverloaded,
            _ => LookupClassification::Ambiguous,
        };

        debug!(
            "lookup `{}` ({:?}): {:?} with {} candidate(s)",
            result.name,
            result.kind,
            result.classification,
            result.decls.len()
        );
    }

    fn are_mutually_overloadable(&self, decls: &[DeclId]) -> bool {
        if decls
            .iter()
            .any(|decl| self.ast.get_decl(*decl).kind != DeclKind::Function)
        {
            return false;
        }

        for (index, first) in decls.iter().enumerate() {
            for second in &decls[index + 1..] {
                if !self.is_overload_compatible(*first, *second) {
                    return false;
                }
            }
        }
        true
    }

    /// Two functions may overload each other when their parameter lists
    /// differ. Placeholders that have not been typed yet are assumed to.
    fn is_overload_compatible(&self, first: DeclId, second: DeclId) -> bool {
        let (Some(first_ty), Some(_)) = (self.ast.get_decl(first).ty, self.ast.get_decl(second).ty) else {
            return true;
        };
        self.check_function_overload(first_ty, &[second]).is_none()
    }
}
