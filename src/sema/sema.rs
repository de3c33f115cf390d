use std::{collections::HashMap, fmt::Display, rc::Rc};

use log::{debug, warn};

use crate::{
    ast::{
        attributes::{Attribute, AttributeRegistry, DeprecatedAttr, ImportedAttr},
        context::AstContext,
        decls::{ContextId, Decl, DeclData, DeclId, DeclKind, DeclaratorId, IdentifierNamespace},
        types::TypeId,
    },
    diagnostics::diagnostics::{DiagId, DiagnosticsEngine},
    errors::errors::{Error, ErrorImpl},
    lexer::tokens::Token,
    options::CompilerOptions,
    Position, Span,
};

use super::{
    declarator::{Declarator, DeclaratorKind, DeclaratorResolver, ResolutionState},
    scope::{Scope, ScopeFlags, ScopeId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Declarators are cached by name and shape only.
    Phase1,
    /// Cached declarators are resolved; also the REPL phase.
    Phase2,
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Phase1 => write!(f, "phase 1"),
            Phase::Phase2 => write!(f, "phase 2"),
        }
    }
}

/// Bookkeeping for the function body being analysed.
#[derive(Debug, Clone)]
pub struct FunctionScopeInfo {
    pub decl: DeclId,
    pub result: TypeId,
    pub labels: Vec<DeclId>,
}

/// Everything a diverted resolution replaces and later puts back.
#[derive(Debug)]
struct DivertedState {
    declarator: DeclaratorId,
    scope_stack: Vec<ScopeId>,
    scope_floor: usize,
    context: ContextId,
    functions: Vec<FunctionScopeInfo>,
    phase: Phase,
    pending_placeholder: Option<DeclId>,
}

/// Marks the state a REPL statement starts from, so a failed statement can
/// be undone.
#[derive(Debug, Clone)]
pub struct SemaSnapshot {
    decls: usize,
    scopes: usize,
    declarators: usize,
}

/// The semantic analyzer. The parser drives it through the `act_on_*`
/// entry points; it owns the AST context, the scope arena and the cached
/// declarators.
pub struct Sema {
    pub ast: AstContext,
    pub diags: DiagnosticsEngine,
    pub options: CompilerOptions,
    scopes: Vec<Scope>,
    scope_stack: Vec<ScopeId>,
    scope_floor: usize,
    tu_scope: ScopeId,
    current_context: ContextId,
    phase: Phase,
    declarators: Vec<Declarator>,
    resolve_stack: Vec<DivertedState>,
    resolver: Option<DeclaratorResolver>,
    pending_placeholder: Option<DeclId>,
    pub(crate) functions: Vec<FunctionScopeInfo>,
    attribute_registry: AttributeRegistry,
    name_cache: HashMap<DeclId, Rc<str>>,
}

impl Default for Sema {
    fn default() -> Self {
        Sema::new(DiagnosticsEngine::silent(), CompilerOptions::default())
    }
}

impl Sema {
    pub fn new(diags: DiagnosticsEngine, options: CompilerOptions) -> Self {
        let ast = AstContext::new();
        let tu = ast.translation_unit();

        Sema {
            ast,
            diags,
            options,
            scopes: vec![Scope::new(ScopeFlags::TRANSLATION_UNIT, None, Some(tu))],
            scope_stack: vec![],
            scope_floor: 0,
            tu_scope: ScopeId(0),
            current_context: tu,
            phase: Phase::Phase2,
            declarators: vec![],
            resolve_stack: vec![],
            resolver: None,
            pending_placeholder: None,
            functions: vec![],
            attribute_registry: AttributeRegistry::with_builtins(),
            name_cache: HashMap::new(),
        }
    }

    // Phases

    pub fn current_phase(&self) -> Phase {
        self.phase
    }

    pub fn set_current_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!("sema: entering {}", phase);
        }
        self.phase = phase;
    }

    pub fn set_declarator_resolver(&mut self, resolver: DeclaratorResolver) {
        self.resolver = Some(resolver);
    }

    /// Suspends the current resolution to resolve `id` from the scope and
    /// context it was written in.
    pub fn act_on_phase_diverted(&mut self, id: DeclaratorId) -> Result<(), Error> {
        let declarator = self.declarator(id)?.clone();
        let scope_stack = if declarator.scope == self.tu_scope {
            vec![]
        } else {
            vec![declarator.scope]
        };

        let saved = DivertedState {
            declarator: id,
            scope_floor: std::mem::replace(&mut self.scope_floor, scope_stack.len()),
            scope_stack: std::mem::replace(&mut self.scope_stack, scope_stack),
            context: std::mem::replace(&mut self.current_context, declarator.context),
            functions: std::mem::take(&mut self.functions),
            phase: std::mem::replace(&mut self.phase, Phase::Phase2),
            pending_placeholder: std::mem::replace(
                &mut self.pending_placeholder,
                Some(declarator.placeholder),
            ),
        };
        self.resolve_stack.push(saved);
        self.declarators[id.0].state = ResolutionState::InProgress;

        debug!(
            "sema: diverted to resolve `{}` (depth {})",
            declarator.name,
            self.resolve_stack.len()
        );
        Ok(())
    }

    /// Puts back the state saved by the matching [`Sema::act_on_phase_diverted`].
    pub fn act_on_phase_resumed(&mut self) -> Result<DeclaratorId, Error> {
        let saved = self
            .resolve_stack
            .pop()
            .ok_or_else(|| Error::invariant("phase resumed without a diverted resolution"))?;

        if self.scope_stack.len() != self.scope_floor {
            warn!(
                "resolution of declarator {} left {} scope(s) open",
                saved.declarator.0,
                self.scope_stack.len().saturating_sub(self.scope_floor)
            );
        }

        self.scope_stack = saved.scope_stack;
        self.scope_floor = saved.scope_floor;
        self.current_context = saved.context;
        self.functions = saved.functions;
        self.phase = saved.phase;
        self.pending_placeholder = saved.pending_placeholder;

        debug!("sema: resumed after declarator {}", saved.declarator.0);
        Ok(saved.declarator)
    }

    pub fn is_resolving(&self) -> bool {
        !self.resolve_stack.is_empty()
    }

    // Scopes

    pub fn tu_scope(&self) -> ScopeId {
        self.tu_scope
    }

    pub fn current_scope(&self) -> ScopeId {
        self.scope_stack.last().copied().unwrap_or(self.tu_scope)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn current_context(&self) -> ContextId {
        self.current_context
    }

    pub fn scope_depth(&self) -> usize {
        self.scope_stack.len()
    }

    /// Opens a scope that keeps adding declarations to the current context.
    pub fn push_scope(&mut self, flags: ScopeFlags) -> ScopeId {
        let entity = self.current_context;
        self.push_scope_with_entity(flags, entity)
    }

    /// Opens a scope whose declarations go to `entity`, which becomes the
    /// current context until the scope is popped.
    pub fn push_scope_with_entity(&mut self, flags: ScopeFlags, entity: ContextId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        let parent = self.current_scope();
        self.scopes.push(Scope::new(flags, Some(parent), Some(entity)));
        self.scope_stack.push(id);
        self.current_context = entity;

        debug!("sema: push scope {} ({:?})", id.0, flags);
        id
    }

    pub fn pop_scope(&mut self) -> Result<(), Error> {
        if self.scope_stack.len() <= self.scope_floor {
            return Err(Error::new(ErrorImpl::UnbalancedScope, Position::null()));
        }

        let popped = self.scope_stack.pop();
        let current = self.current_scope();
        self.current_context = self.scopes[current.0]
            .entity
            .unwrap_or_else(|| self.ast.translation_unit());

        debug!("sema: pop scope {:?}", popped.map(|scope| scope.0));
        Ok(())
    }

    /// Walks outward from the current scope to the first scope with any of
    /// `flags`, stopping at function boundaries unless asked for them.
    pub fn enclosing_scope_with(&self, flags: ScopeFlags) -> Option<ScopeId> {
        let mut scope = Some(self.current_scope());
        while let Some(id) = scope {
            let current = self.scope(id);
            if current.flags.intersects(flags) {
                return Some(id);
            }
            if current.flags.contains(ScopeFlags::FN_SCOPE) {
                return None;
            }
            scope = current.parent;
        }
        None
    }

    /// Registers `decl` for lookup in `scope` and, unless suppressed, adds it
    /// to the context active in that scope.
    pub fn push_on_scope_chains(
        &mut self,
        decl: DeclId,
        scope: ScopeId,
        add_to_context: bool,
    ) -> Result<(), Error> {
        if add_to_context {
            let context = self.scopes[scope.0]
                .entity
                .unwrap_or(self.current_context);
            self.ast.add_decl(context, decl)?;
        }

        if self.ast.get_decl(decl).name.is_some() {
            self.scopes[scope.0].add_decl(decl);
        }
        Ok(())
    }

    pub fn remove_from_scope_chains(&mut self, decl: DeclId, scope: ScopeId) -> Result<(), Error> {
        self.scopes[scope.0].remove_decl(decl);
        if let Some(context) = self.ast.get_decl(decl).get_context() {
            self.ast.remove_decl(context, decl)?;
        }
        Ok(())
    }

    /// Puts `new` in place of a Phase 1 placeholder, in its scope and in
    /// its context, keeping the original position in both.
    pub fn remove_old_unresolved_decl(&mut self, placeholder: DeclId, new: DeclId) -> Result<(), Error> {
        let id = self.ast.get_decl(placeholder).declarator().ok_or_else(|| {
            Error::invariant(format!(
                "`{}` is not an unresolved placeholder",
                self.ast.get_decl(placeholder).name_str()
            ))
        })?;
        let (scope, context) = {
            let declarator = self.declarator(id)?;
            (declarator.scope, declarator.context)
        };

        if !self.scopes[scope.0].replace_decl(placeholder, new) && self.ast.get_decl(new).name.is_some() {
            self.scopes[scope.0].add_decl(new);
        }
        if self.ast.contains_decl(context, placeholder) {
            self.ast.replace_decl(context, placeholder, new)?;
        } else {
            self.ast.add_decl(context, new)?;
        }

        self.declarators[id.0].state = ResolutionState::Resolved(new);
        Ok(())
    }

    /// Makes a freshly built declaration visible: it takes over the pending
    /// placeholder when a cached declarator is being resolved, otherwise it
    /// joins the current scope and context.
    pub fn register_declaration(&mut self, decl: DeclId) -> Result<(), Error> {
        match self.pending_placeholder.take() {
            Some(placeholder) => self.remove_old_unresolved_decl(placeholder, decl),
            None => self.push_on_scope_chains(decl, self.current_scope(), true),
        }
    }

    /// The scope `register_declaration` would use, for redefinition checks.
    pub(crate) fn registration_scope(&self) -> ScopeId {
        self.pending_placeholder
            .and_then(|placeholder| self.ast.get_decl(placeholder).declarator())
            .and_then(|id| self.declarators.get(id.0))
            .map_or_else(|| self.current_scope(), |declarator| declarator.scope)
    }

    pub(crate) fn pending_placeholder(&self) -> Option<DeclId> {
        self.pending_placeholder
    }

    pub(crate) fn take_pending_placeholder(&mut self) -> Option<DeclId> {
        self.pending_placeholder.take()
    }

    // Declarators

    /// Caches a declarator seen in Phase 1 and registers a placeholder for
    /// it, so later lookups can find and resolve it on demand.
    pub fn act_on_unresolved_declarator(
        &mut self,
        kind: DeclaratorKind,
        name: Rc<str>,
        span: Span,
        tokens: Vec<Token>,
        file: Rc<String>,
    ) -> Result<DeclaratorId, Error> {
        let id = DeclaratorId(self.declarators.len());
        let placeholder = self.ast.create_decl(
            Decl::new(DeclKind::Unresolved, Some(Rc::clone(&name)), span.clone())
                .with_data(DeclData::Unresolved { declarator: id }),
        );

        let scope = self.current_scope();
        self.push_on_scope_chains(placeholder, scope, true)?;

        debug!("sema: cached {:?} declarator `{}`", kind, name);
        self.declarators.push(Declarator {
            kind,
            name,
            span,
            tokens: Rc::from(tokens),
            file,
            scope,
            context: self.current_context,
            placeholder,
            state: ResolutionState::Pending,
        });
        Ok(id)
    }

    pub fn declarator(&self, id: DeclaratorId) -> Result<&Declarator, Error> {
        self.declarators
            .get(id.0)
            .ok_or_else(|| Error::invariant(format!("unknown declarator {}", id.0)))
    }

    pub fn declarator_count(&self) -> usize {
        self.declarators.len()
    }

    /// Resolves a cached declarator, diverting from whatever is in progress.
    /// Cycles and runaway nesting are diagnosed and yield `None`.
    pub fn resolve_declarator(&mut self, id: DeclaratorId) -> Result<Option<DeclId>, Error> {
        let (state, name, span) = {
            let declarator = self.declarator(id)?;
            (declarator.state, Rc::clone(&declarator.name), declarator.span.clone())
        };

        match state {
            ResolutionState::Resolved(decl) => return Ok(Some(decl)),
            ResolutionState::Failed => return Ok(None),
            ResolutionState::InProgress => {
                self.diag(DiagId::ErrCircularReference, &span, &[&*name]);
                return Ok(None);
            }
            ResolutionState::Pending => {}
        }

        if self.resolve_stack.len() >= self.options.max_resolution_depth {
            let depth = self.options.max_resolution_depth.to_string();
            self.diag(DiagId::ErrTooDeepResolution, &span, &[&*name, &depth]);
            return Ok(None);
        }

        let resolver = self
            .resolver
            .ok_or_else(|| Error::invariant("no declarator resolver installed"))?;

        self.act_on_phase_diverted(id)?;
        let result = resolver(self, id);
        self.act_on_phase_resumed()?;
        result?;

        match self.declarator(id)?.state {
            ResolutionState::Resolved(decl) => Ok(Some(decl)),
            _ => {
                self.declarators[id.0].state = ResolutionState::Failed;
                let (placeholder, scope) = {
                    let declarator = self.declarator(id)?;
                    (declarator.placeholder, declarator.scope)
                };
                self.remove_from_scope_chains(placeholder, scope)?;
                debug!("sema: declarator `{}` failed to resolve", name);
                Ok(None)
            }
        }
    }

    /// Resolves every declarator still pending, in declaration order.
    pub fn resolve_pending_declarators(&mut self) -> Result<(), Error> {
        for index in 0..self.declarators.len() {
            if self.declarators[index].state == ResolutionState::Pending {
                self.resolve_declarator(DeclaratorId(index))?;
            }
        }
        Ok(())
    }

    /// Namespace a declaration is visible in; placeholders answer for the
    /// declaration they will become.
    pub fn decl_namespace(&self, decl: DeclId) -> IdentifierNamespace {
        let entry = self.ast.get_decl(decl);
        match entry.declarator() {
            Some(id) => self
                .declarators
                .get(id.0)
                .map_or(IdentifierNamespace::all(), |declarator| {
                    declarator.kind.namespace()
                }),
            None => entry.kind.namespace(),
        }
    }

    // Diagnostics

    pub fn diag(&mut self, id: DiagId, span: &Span, args: &[&str]) {
        self.diags.report(id, span, args);
    }

    pub fn has_errors(&self) -> bool {
        self.diags.errored()
    }

    // Attributes

    pub fn attribute_registry(&self) -> &AttributeRegistry {
        &self.attribute_registry
    }

    pub fn attribute_registry_mut(&mut self) -> &mut AttributeRegistry {
        &mut self.attribute_registry
    }

    /// Builds an attribute from its source spelling. Unknown names are
    /// diagnosed and dropped.
    pub fn act_on_attribute(
        &mut self,
        name: &str,
        argument: Option<String>,
        span: &Span,
    ) -> Option<Rc<dyn Attribute>> {
        match name {
            "deprecated" => Some(Rc::new(DeprecatedAttr { message: argument })),
            "imported" => Some(Rc::new(ImportedAttr {
                origin: argument.unwrap_or_default(),
            })),
            _ => {
                self.diag(DiagId::ErrUnknownAttribute, span, &[name]);
                None
            }
        }
    }

    pub fn attach_attributes(&mut self, decl: DeclId, attributes: Vec<Rc<dyn Attribute>>) {
        self.ast.get_decl_mut(decl).attributes.extend(attributes);
    }

    pub fn mark_as_imported(&mut self, decl: DeclId, origin: &str) {
        if !self.is_imported(decl) {
            self.ast
                .get_decl_mut(decl)
                .attributes
                .push(Rc::new(ImportedAttr {
                    origin: origin.to_string(),
                }));
        }
    }

    pub fn is_imported(&self, decl: DeclId) -> bool {
        self.ast.get_decl(decl).get_attribute::<ImportedAttr>().is_some()
    }

    /// Warns when a deprecated declaration is referenced.
    pub fn diagnose_use_of_decl(&mut self, decl: DeclId, span: &Span) {
        let message = match self.ast.get_decl(decl).get_attribute::<DeprecatedAttr>() {
            Some(deprecated) => deprecated.message.clone().unwrap_or_default(),
            None => return,
        };
        let name = self.qualified_name(decl);
        self.diag(DiagId::WarnDeprecated, span, &[&*name, &message]);
    }

    // Names

    /// Qualified `module::name` spelling, cached per declaration.
    pub fn qualified_name(&mut self, decl: DeclId) -> Rc<str> {
        if let Some(name) = self.name_cache.get(&decl) {
            return Rc::clone(name);
        }
        let name: Rc<str> = Rc::from(self.ast.qualified_name(decl));
        self.name_cache.insert(decl, Rc::clone(&name));
        name
    }

    pub fn type_name(&self, ty: TypeId) -> String {
        self.ast.type_name(ty)
    }

    // REPL support

    pub fn snapshot(&self) -> SemaSnapshot {
        SemaSnapshot {
            decls: self.ast.decl_count(),
            scopes: self.scopes.len(),
            declarators: self.declarators.len(),
        }
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Drops the scopes opened since `snapshot`. Once a statement is done
    /// nothing refers to them.
    pub fn release_scopes(&mut self, snapshot: &SemaSnapshot) {
        self.scopes.truncate(snapshot.scopes.max(1));
    }

    /// Unlinks every declaration created since `snapshot`, wherever it was
    /// added, and clears the error flag. Earlier declarations stay.
    pub fn rollback(&mut self, snapshot: &SemaSnapshot) -> Result<(), Error> {
        let watermark = snapshot.decls;
        let added: Vec<DeclId> = (watermark..self.ast.decl_count())
            .map(|index| DeclId(index as u32))
            .collect();

        // Members go before the contexts that own them
        for &decl in added.iter().rev() {
            let Some(context) = self.ast.get_decl(decl).get_context() else {
                continue;
            };
            if !self.ast.contains_decl(context, decl) {
                continue;
            }
            debug!("sema: rolling back `{}`", self.ast.get_decl(decl).name_str());
            self.ast.remove_decl(context, decl)?;
        }

        self.release_scopes(snapshot);
        for scope in &mut self.scopes {
            scope.retain_decls(|decl| decl.index() < watermark);
        }
        self.name_cache.retain(|decl, _| decl.index() < watermark);
        self.declarators.truncate(snapshot.declarators);
        self.scope_stack.clear();
        self.scope_floor = 0;
        self.resolve_stack.clear();
        self.functions.clear();
        self.pending_placeholder = None;
        self.current_context = self.ast.translation_unit();
        self.diags.reset();
        Ok(())
    }
}
