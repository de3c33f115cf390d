use std::rc::Rc;

use log::debug;

use crate::{
    ast::{
        attributes::Attribute,
        decls::{AliasTarget, Decl, DeclData, DeclId, DeclKind, DeclaratorId, StorageClass},
        stmts::{ExprPtr, StmtPtr},
        types::{BuiltinClass, Type, TypeId},
    },
    diagnostics::diagnostics::DiagId,
    errors::errors::Error,
    Span,
};

use super::{
    constant::{evaluate_constant, wrap_integer, ConstValue},
    declarator::ResolutionState,
    scope::ScopeFlags,
    sema::{FunctionScopeInfo, Phase, Sema},
};

impl Sema {
    /// Checks a new declaration against what its scope already holds.
    /// Returns whether it may be registered: functions with distinct
    /// parameter lists overload each other, any other clash is a
    /// redefinition.
    ///
    /// Placeholders are skipped. Both sides of a clash are eventually
    /// resolved, and the later one reports it.
    pub fn handle_declarator(&mut self, decl: DeclId) -> Result<bool, Error> {
        let Some(name) = self.ast.get_decl(decl).name.clone() else {
            return Ok(true);
        };
        let kind = self.ast.get_decl(decl).kind;
        let namespace = kind.namespace();
        let pending = self.pending_placeholder();
        let scope = self.registration_scope();

        let previous: Vec<DeclId> = self
            .scope(scope)
            .decls()
            .iter()
            .copied()
            .filter(|other| *other != decl && Some(*other) != pending)
            .filter(|other| {
                let entry = self.ast.get_decl(*other);
                entry.kind != DeclKind::Unresolved
                    && entry.has_name(&name)
                    && entry.kind.namespace().intersects(namespace)
            })
            .collect();

        for other in previous {
            let other_kind = self.ast.get_decl(other).kind;
            let other_span = self.ast.get_decl(other).span.clone();
            let span = self.ast.get_decl(decl).span.clone();

            if kind == DeclKind::Function && other_kind == DeclKind::Function {
                let Some(ty) = self.ast.get_decl(decl).ty else {
                    continue;
                };
                if self.check_function_overload(ty, &[other]).is_some() {
                    self.diag(DiagId::ErrConflictingOverload, &span, &[&*name]);
                    self.diag(DiagId::NotePreviousDefinition, &other_span, &[&*name]);
                    return Ok(false);
                }
                continue;
            }

            self.diag(DiagId::ErrRedefinition, &span, &[&*name]);
            self.diag(DiagId::NotePreviousDefinition, &other_span, &[&*name]);
            return Ok(false);
        }
        Ok(true)
    }

    fn declare(&mut self, decl: DeclId) -> Result<DeclId, Error> {
        if self.handle_declarator(decl)? {
            self.register_declaration(decl)?;
        } else {
            // The placeholder stays unresolved and is dropped by the caller
            self.take_pending_placeholder();
        }
        Ok(decl)
    }

    fn is_undeduced(&self, ty: TypeId) -> bool {
        matches!(self.ast.get_type(ty), Type::Auto(None))
    }

    // Variables

    /// `let` and `const` bindings. Without a written type the initializer
    /// decides it; a written type converts the initializer.
    pub fn act_on_variable_declarator(
        &mut self,
        name: &str,
        span: &Span,
        ty: Option<TypeId>,
        init: Option<ExprPtr>,
        constant: bool,
        storage: StorageClass,
    ) -> Result<DeclId, Error> {
        let declared = ty.filter(|ty| !self.is_undeduced(*ty));

        let (ty, init) = match (declared, init) {
            (Some(ty), Some(init)) => {
                let init = self.perform_implicit_conversion(init, ty, span);
                (ty, Some(init))
            }
            (Some(ty), None) => (ty, None),
            (None, Some(init)) => {
                let ty = if self.ast.is_unresolved(init.ty) {
                    init.ty
                } else if self.ast.is_void(init.ty) || self.ast.function_signature(init.ty).is_some() {
                    let found = self.type_name(init.ty);
                    self.diag(DiagId::ErrIncompatibleTypes, &init.span, &[&found, "a value"]);
                    self.error_type()
                } else {
                    self.ast.get_auto_type(Some(init.ty))
                };
                (ty, Some(init))
            }
            (None, None) => {
                self.diag(DiagId::ErrCannotDeduceType, span, &[name]);
                (self.error_type(), None)
            }
        };

        if self.ast.is_void(ty) {
            let found = self.type_name(ty);
            self.diag(DiagId::ErrIncompleteType, span, &[name, &found]);
        }
        if constant && init.is_none() {
            self.diag(DiagId::ErrExpectedConstant, span, &[name]);
        }

        let decl = self.ast.create_decl(
            Decl::new(DeclKind::Var, Some(Rc::from(name)), span.clone())
                .with_type(ty)
                .with_storage(storage)
                .with_data(DeclData::Variable { init, constant }),
        );
        self.declare(decl)
    }

    /// Parameters are created detached; [`Sema::act_on_start_of_function_def`]
    /// makes them visible inside the body.
    pub fn act_on_param_declarator(&mut self, name: Option<&str>, span: &Span, ty: TypeId) -> DeclId {
        if self.is_undeduced(ty) {
            self.diag(DiagId::ErrCannotDeduceType, span, &[name.unwrap_or("parameter")]);
        } else if self.ast.is_void(ty) {
            let found = self.type_name(ty);
            self.diag(DiagId::ErrIncompleteType, span, &[name.unwrap_or("parameter"), &found]);
        }

        self.ast
            .create_decl(Decl::new(DeclKind::ParmVar, name.map(Rc::from), span.clone()).with_type(ty))
    }

    /// A record member. The record is the current context.
    pub fn act_on_field_declarator(&mut self, name: &str, span: &Span, ty: TypeId) -> Result<DeclId, Error> {
        let record = self.current_context().decl();
        if self.ast.get_decl(record).kind != DeclKind::Record {
            return Err(Error::invariant(format!(
                "field `{}` declared outside of a record",
                name
            )));
        }

        let contains_itself = self.ast.record_decl(ty) == Some(record);
        if self.is_undeduced(ty) || self.ast.is_void(ty) || contains_itself {
            let found = self.type_name(ty);
            self.diag(DiagId::ErrIncompleteType, span, &[name, &found]);
        }

        let decl = self
            .ast
            .create_decl(Decl::new(DeclKind::Field, Some(Rc::from(name)), span.clone()).with_type(ty));
        self.declare(decl)
    }

    // Functions

    /// Builds a function from its signature. The declaration is returned
    /// even when it clashes with an earlier one, so its body can still be
    /// analysed; it is just never made visible.
    #[allow(clippy::too_many_arguments)]
    pub fn act_on_function_declarator(
        &mut self,
        name: &str,
        span: &Span,
        result: TypeId,
        params: Vec<DeclId>,
        variadic: bool,
        storage: StorageClass,
        attributes: Vec<Rc<dyn Attribute>>,
    ) -> Result<DeclId, Error> {
        let param_types = params
            .iter()
            .map(|param| self.ast.get_decl(*param).ty.unwrap_or_else(|| self.ast.get_builtin_type(BuiltinClass::Void)))
            .collect();
        let ty = self.ast.get_function_type(result, param_types, variadic);

        let decl = self.ast.create_decl(
            Decl::new(DeclKind::Function, Some(Rc::from(name)), span.clone())
                .with_type(ty)
                .with_storage(storage)
                .with_data(DeclData::Function { params, body: None }),
        );
        self.attach_attributes(decl, attributes);

        debug!("sema: function `{}`: {}", name, self.type_name(ty));
        self.declare(decl)
    }

    /// Opens the body scope of `function` and makes its parameters visible.
    pub fn act_on_start_of_function_def(&mut self, function: DeclId) -> Result<(), Error> {
        let context = self.ast.cast_to_decl_context(function)?;
        let result = self
            .ast
            .get_decl(function)
            .ty
            .and_then(|ty| self.ast.function_signature(ty).map(|(result, _, _)| result))
            .ok_or_else(|| Error::invariant("function declaration without a function type"))?;

        let scope = self.push_scope_with_entity(ScopeFlags::FN_SCOPE | ScopeFlags::DECL_SCOPE, context);

        let params = self.ast.get_decl(function).params().to_vec();
        let mut seen: Vec<Rc<str>> = vec![];
        for param in params {
            if let Some(name) = self.ast.get_decl(param).name.clone() {
                if seen.contains(&name) {
                    let span = self.ast.get_decl(param).span.clone();
                    self.diag(DiagId::ErrRedefinition, &span, &[&*name]);
                    continue;
                }
                seen.push(name);
            }
            self.push_on_scope_chains(param, scope, false)?;
        }

        self.functions.push(FunctionScopeInfo {
            decl: function,
            result,
            labels: vec![],
        });
        Ok(())
    }

    /// Attaches the body, checks labels and the missing-return case, and
    /// closes the body scope.
    pub fn act_on_finish_function_body(&mut self, function: DeclId, body: StmtPtr) -> Result<(), Error> {
        let info = self
            .functions
            .pop()
            .ok_or_else(|| Error::invariant("function body finished without a matching start"))?;
        if info.decl != function {
            return Err(Error::invariant(format!(
                "finished body of `{}` while analysing another function",
                self.ast.get_decl(function).name_str()
            )));
        }

        for label in &info.labels {
            let entry = self.ast.get_decl(*label);
            if matches!(entry.data, DeclData::Label { defined: false }) {
                let (name, span) = (entry.name_str().to_string(), entry.span.clone());
                self.diag(DiagId::ErrUndefinedLabel, &span, &[&name]);
            }
        }

        self.check_function_return(function, info.result, &body);

        if let DeclData::Function { body: slot, .. } = &mut self.ast.get_decl_mut(function).data {
            *slot = Some(body);
        }
        self.pop_scope()
    }

    /// Warns when a function returning a value can reach the end of its
    /// body.
    pub fn check_function_return(&mut self, function: DeclId, result: TypeId, body: &StmtPtr) {
        if self.ast.is_void(result) || self.ast.is_unresolved(result) || !body.can_fall_through() {
            return;
        }
        let name = self.qualified_name(function);
        let span = self.ast.get_decl(function).span.clone();
        self.diag(DiagId::WarnMissingReturn, &span, &[&*name]);
    }

    /// The label `name` of the current function, created on first mention.
    pub fn lookup_or_create_label(&mut self, name: &str, span: &Span) -> Result<Option<DeclId>, Error> {
        let existing = match self.functions.last() {
            Some(info) => info
                .labels
                .iter()
                .copied()
                .find(|label| self.ast.get_decl(*label).has_name(name)),
            None => {
                self.diag(DiagId::ErrStatementNotAllowed, span, &["label"]);
                return Ok(None);
            }
        };
        if existing.is_some() {
            return Ok(existing);
        }

        let scope = self
            .enclosing_scope_with(ScopeFlags::FN_SCOPE)
            .ok_or_else(|| Error::invariant("function body without a function scope"))?;
        let label = self
            .ast
            .create_decl(Decl::new(DeclKind::Label, Some(Rc::from(name)), span.clone()));
        self.push_on_scope_chains(label, scope, true)?;

        if let Some(info) = self.functions.last_mut() {
            info.labels.push(label);
        }
        Ok(Some(label))
    }

    /// Declares a host function at translation unit level. It behaves like
    /// an `extern` declaration.
    pub fn declare_intrinsic(&mut self, name: &str, result: TypeId, params: &[TypeId]) -> Result<DeclId, Error> {
        let span = Span::null();
        let param_decls = params
            .iter()
            .map(|ty| {
                self.ast
                    .create_decl(Decl::new(DeclKind::ParmVar, None, span.clone()).with_type(*ty))
            })
            .collect();
        let ty = self.ast.get_function_type(result, params.to_vec(), false);

        let decl = self.ast.create_decl(
            Decl::new(DeclKind::Function, Some(Rc::from(name)), span)
                .with_type(ty)
                .with_storage(StorageClass::Extern)
                .with_data(DeclData::Function {
                    params: param_decls,
                    body: None,
                }),
        );
        self.mark_as_imported(decl, "host");

        let conflict = self.check_function_overload(
            ty,
            &self
                .scope(self.tu_scope())
                .decls()
                .iter()
                .copied()
                .filter(|other| self.ast.get_decl(*other).has_name(name))
                .collect::<Vec<_>>(),
        );
        if conflict.is_some() {
            return Err(Error::invariant(format!(
                "intrinsic `{}` conflicts with an existing declaration",
                name
            )));
        }

        self.push_on_scope_chains(decl, self.tu_scope(), true)?;
        debug!("sema: intrinsic `{}`: {}", name, self.type_name(ty));
        Ok(decl)
    }

    // Tags

    /// Declares a record or an enum. Enums take an integer underlying type,
    /// `i32` unless written.
    pub fn act_on_tag(
        &mut self,
        kind: DeclKind,
        name: &str,
        span: &Span,
        underlying: Option<TypeId>,
    ) -> Result<DeclId, Error> {
        let decl = match kind {
            DeclKind::Record => self
                .ast
                .create_decl(Decl::new(DeclKind::Record, Some(Rc::from(name)), span.clone())),
            DeclKind::Enum => {
                let i32_ty = self.ast.get_builtin_type(BuiltinClass::I32);
                let underlying = match underlying {
                    Some(ty) if self.ast.builtin_class(ty).is_some_and(|class| class.is_integer()) => ty,
                    Some(ty) => {
                        if !self.ast.is_unresolved(ty) {
                            let found = self.type_name(ty);
                            self.diag(DiagId::ErrIncompatibleTypes, span, &[&found, "an integer type"]);
                        }
                        i32_ty
                    }
                    None => i32_ty,
                };
                self.ast.create_decl(
                    Decl::new(DeclKind::Enum, Some(Rc::from(name)), span.clone()).with_type(underlying),
                )
            }
            _ => {
                return Err(Error::invariant(format!("{} is not a tag kind", kind)));
            }
        };
        self.declare(decl)
    }

    pub fn act_on_tag_start_definition(&mut self, tag: DeclId) -> Result<(), Error> {
        let context = self.ast.cast_to_decl_context(tag)?;
        let flags = match self.ast.get_decl(tag).kind {
            DeclKind::Record => ScopeFlags::RECORD_SCOPE,
            _ => ScopeFlags::ENUM_SCOPE,
        };
        self.push_scope_with_entity(flags | ScopeFlags::DECL_SCOPE, context);
        Ok(())
    }

    pub fn act_on_tag_finish_definition(&mut self, tag: DeclId) -> Result<(), Error> {
        if self.current_context().decl() != tag {
            return Err(Error::invariant(format!(
                "closing `{}` while another context is open",
                self.ast.get_decl(tag).name_str()
            )));
        }
        self.pop_scope()
    }

    /// Resolves the fields of `record` still cached from Phase 1, so field
    /// indices are final before one is used.
    pub fn complete_record(&mut self, record: DeclId) -> Result<(), Error> {
        if self.current_phase() != Phase::Phase2 {
            return Ok(());
        }
        let Some(context) = self.ast.as_decl_context(record) else {
            return Ok(());
        };

        let pending: Vec<DeclaratorId> = self
            .ast
            .decls(context)
            .filter_map(|decl| self.ast.get_decl(decl).declarator())
            .collect();
        for declarator in pending {
            if self.declarator(declarator)?.state == ResolutionState::Pending {
                self.resolve_declarator(declarator)?;
            }
        }
        Ok(())
    }

    /// One enumerator. An initializer must fold to an integer constant;
    /// otherwise the value follows the previous enumerator.
    pub fn act_on_enumerator(
        &mut self,
        enum_decl: DeclId,
        name: &str,
        span: &Span,
        init: Option<ExprPtr>,
    ) -> Result<DeclId, Error> {
        let class = self
            .ast
            .get_decl(enum_decl)
            .ty
            .and_then(|ty| self.ast.builtin_class(ty))
            .unwrap_or(BuiltinClass::I32);
        let next = self.ast.next_enum_value(enum_decl);

        let value = match &init {
            Some(init) if init.is_recovery() => next,
            Some(init) => match evaluate_constant(&self.ast, init) {
                Some(ConstValue::Int(value)) => value,
                _ => {
                    self.diag(DiagId::ErrExpectedConstant, &init.span, &[name]);
                    next
                }
            },
            None => next,
        };

        let ty = self.ast.get_enum_type(enum_decl);
        let decl = self.ast.create_decl(
            Decl::new(DeclKind::EnumConstant, Some(Rc::from(name)), span.clone())
                .with_type(ty)
                .with_data(DeclData::EnumConstant {
                    value: wrap_integer(value, class),
                    init,
                }),
        );
        self.declare(decl)
    }

    // Modules

    /// Declares a module, or reopens the one already declared under the
    /// same name in the current scope.
    pub fn act_on_module_decl(&mut self, name: &str, span: &Span) -> Result<DeclId, Error> {
        let existing = self
            .scope(self.current_scope())
            .decls()
            .iter()
            .copied()
            .find(|decl| {
                let entry = self.ast.get_decl(*decl);
                entry.kind == DeclKind::Module && entry.has_name(name)
            });
        if let Some(module) = existing {
            debug!("sema: reopening module `{}`", name);
            return Ok(module);
        }

        let decl = self
            .ast
            .create_decl(Decl::new(DeclKind::Module, Some(Rc::from(name)), span.clone()));
        self.declare(decl)
    }

    pub fn act_on_start_module(&mut self, module: DeclId) -> Result<(), Error> {
        let context = self.ast.cast_to_decl_context(module)?;
        self.push_scope_with_entity(ScopeFlags::MODULE_SCOPE | ScopeFlags::DECL_SCOPE, context);
        Ok(())
    }

    pub fn act_on_finish_module(&mut self, module: DeclId) -> Result<(), Error> {
        if self.current_context().decl() != module {
            return Err(Error::invariant(format!(
                "closing module `{}` while another context is open",
                self.ast.get_decl(module).name_str()
            )));
        }
        self.pop_scope()
    }

    // Aliases

    pub fn act_on_alias_declaration(&mut self, name: &str, span: &Span, target: AliasTarget) -> Result<DeclId, Error> {
        let mut decl = Decl::new(DeclKind::Alias, Some(Rc::from(name)), span.clone()).with_data(DeclData::Alias(target));
        if let AliasTarget::Type(ty) = target {
            decl = decl.with_type(ty);
        }
        let decl = self.ast.create_decl(decl);
        self.declare(decl)
    }

    /// The type a tag or alias declaration names.
    pub fn type_of_type_decl(&mut self, decl: DeclId) -> Option<TypeId> {
        match self.ast.get_decl(decl).kind {
            DeclKind::Record => Some(self.ast.get_record_type(decl)),
            DeclKind::Enum => Some(self.ast.get_enum_type(decl)),
            DeclKind::Alias => match self.ast.alias_target(decl)? {
                AliasTarget::Type(ty) => Some(ty),
                AliasTarget::Module(_) => None,
            },
            _ => None,
        }
    }

    /// The sentinel type given to anything that failed to analyse.
    pub fn error_type(&mut self) -> TypeId {
        self.ast.get_unresolved_type("<error>")
    }
}
