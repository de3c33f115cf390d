use std::rc::Rc;

use crate::{
    ast::{
        decls::{AliasTarget, DeclKind},
        stmts::ExprPtr,
        types::{BuiltinClass, TypeId},
    },
    diagnostics::diagnostics::DiagId,
    errors::errors::Error,
    Span,
};

use super::{
    constant::{evaluate_constant, ConstValue},
    lookup::{LookupClassification, LookupKind, LookupResult},
    sema::Sema,
};

impl Sema {
    /// A written type name: a builtin spelling, or a tag or alias found by
    /// (possibly qualified) lookup.
    pub fn act_on_type_name(&mut self, qualifiers: &[Rc<str>], name: &str, span: &Span) -> Result<TypeId, Error> {
        if qualifiers.is_empty() {
            if let Some(class) = BuiltinClass::from_spelling(name) {
                return Ok(self.ast.get_builtin_type(class));
            }
        }

        let mut result = LookupResult::new(name, LookupKind::Tag, span.clone());
        let scope = self.current_scope();
        self.lookup_nested_name(&mut result, scope, qualifiers)?;

        let spelled = spell_path(qualifiers, name);
        match result.classification() {
            LookupClassification::Found => {
                let Some(decl) = result.get_found_decl() else {
                    return Ok(self.error_type());
                };
                match self.type_of_type_decl(decl) {
                    Some(ty) => {
                        self.diagnose_use_of_decl(decl, span);
                        Ok(ty)
                    }
                    None => {
                        // Phase 1 placeholders are quietly unresolved
                        if self.ast.get_decl(decl).kind != DeclKind::Unresolved {
                            self.diag(DiagId::ErrExpectedTypeName, span, &[&spelled]);
                        }
                        Ok(self.ast.get_unresolved_type(&spelled))
                    }
                }
            }
            LookupClassification::NotFound => {
                if !result.suppress_diagnostics() {
                    self.diag(DiagId::ErrExpectedTypeName, span, &[&spelled]);
                }
                Ok(self.error_type())
            }
            LookupClassification::FoundOverloaded | LookupClassification::Ambiguous => {
                self.diag(DiagId::ErrAmbiguousReference, span, &[&spelled]);
                Ok(self.error_type())
            }
        }
    }

    /// `[element; size]`. The size must fold to a non-negative integer.
    pub fn act_on_array_type(&mut self, element: TypeId, size: ExprPtr, span: &Span) -> TypeId {
        if self.ast.is_unresolved(element) || size.is_recovery() {
            return self.error_type();
        }
        if self.ast.is_void(element) {
            let found = self.type_name(element);
            self.diag(DiagId::ErrIncompleteType, span, &["array element", &found]);
            return self.error_type();
        }

        match evaluate_constant(&self.ast, &size) {
            Some(ConstValue::Int(count)) if count >= 0 => self.ast.get_array_type(element, count as u64),
            _ => {
                self.diag(DiagId::ErrExpectedConstant, &size.span, &[]);
                self.error_type()
            }
        }
    }

    pub fn act_on_paren_type(&mut self, inner: TypeId) -> TypeId {
        self.ast.get_paren_type(inner)
    }

    /// `typeof(expr)`. The operand is never evaluated.
    pub fn act_on_typeof_type(&mut self, expr: ExprPtr) -> TypeId {
        if expr.is_recovery() {
            return self.error_type();
        }
        self.ast.get_typeof_type(expr.ty)
    }

    pub fn act_on_auto_type(&mut self) -> TypeId {
        self.ast.get_auto_type(None)
    }

    /// The target of `alias name = path;`. A path naming a module (or an
    /// alias of one) makes a module alias; anything else must name a type.
    pub fn act_on_alias_target_path(
        &mut self,
        qualifiers: &[Rc<str>],
        name: &str,
        span: &Span,
    ) -> Result<AliasTarget, Error> {
        if qualifiers.is_empty() && BuiltinClass::from_spelling(name).is_some() {
            return Ok(AliasTarget::Type(self.act_on_type_name(qualifiers, name, span)?));
        }

        let mut result = LookupResult::new(name, LookupKind::Module, span.clone());
        let scope = self.current_scope();
        self.lookup_nested_name(&mut result, scope, qualifiers)?;

        if let Some(decl) = result.get_found_decl() {
            let entry = self.ast.get_decl(decl);
            match entry.kind {
                DeclKind::Module => return Ok(AliasTarget::Module(decl)),
                DeclKind::Alias => {
                    if let Some(AliasTarget::Module(module)) = self.ast.alias_target(decl) {
                        return Ok(AliasTarget::Module(module));
                    }
                }
                _ => {}
            }
        }

        Ok(AliasTarget::Type(self.act_on_type_name(qualifiers, name, span)?))
    }
}

fn spell_path(qualifiers: &[Rc<str>], name: &str) -> String {
    qualifiers
        .iter()
        .map(|qualifier| qualifier.as_ref())
        .chain(std::iter::once(name))
        .collect::<Vec<_>>()
        .join("::")
}
