use std::rc::Rc;

use crate::{
    ast::{
        decls::{DeclId, DeclKind},
        stmts::{
            BinaryExpr, BinaryOperator, CastExpr, CastKind, CompoundAssignExpr, Expr, ExprKind, ExprPtr,
            UnaryOperator, ValueKind,
        },
        types::{BuiltinClass, Type, TypeId},
    },
    diagnostics::diagnostics::DiagId,
    errors::errors::{Error, ErrorImpl},
    Span,
};

use super::{
    constant::evaluate_constant,
    lookup::{LookupClassification, LookupKind, LookupResult},
    overload::OverloadOutcome,
    sema::Sema,
};

/// Common type of two arithmetic operands. Bool and char act as `i32`; a
/// floating operand wins with the higher ranked float, otherwise the higher
/// ranked integer wins and on a rank tie the unsigned one.
pub fn common_arithmetic_class(lhs: BuiltinClass, rhs: BuiltinClass) -> BuiltinClass {
    let lhs = promoted_class(lhs);
    let rhs = promoted_class(rhs);

    if lhs.is_floating() || rhs.is_floating() {
        return match (lhs.is_floating(), rhs.is_floating()) {
            (true, true) if rhs.rank() > lhs.rank() => rhs,
            (true, _) => lhs,
            _ => rhs,
        };
    }

    if lhs.rank() != rhs.rank() {
        if lhs.rank() > rhs.rank() {
            lhs
        } else {
            rhs
        }
    } else if !lhs.is_signed() {
        lhs
    } else {
        rhs
    }
}

fn promoted_class(class: BuiltinClass) -> BuiltinClass {
    match class {
        BuiltinClass::Bool | BuiltinClass::Char => BuiltinClass::I32,
        other => other,
    }
}

/// The cast that turns a `from` value into a `to` value.
pub fn cast_kind_for(from: BuiltinClass, to: BuiltinClass) -> CastKind {
    if from == to {
        return CastKind::NoOp;
    }
    if to == BuiltinClass::Bool {
        return if from.is_floating() {
            CastKind::FloatingToBoolean
        } else {
            CastKind::IntegralToBoolean
        };
    }
    match (from.is_floating(), to.is_floating()) {
        (true, true) => CastKind::FloatingCast,
        (false, true) => CastKind::IntegralToFloating,
        (true, false) => CastKind::FloatingToIntegral,
        (false, false) => CastKind::IntegralCast,
    }
}

/// Whether converting `from` to `to` can lose information.
fn is_narrowing(from: BuiltinClass, to: BuiltinClass) -> bool {
    if to == BuiltinClass::Bool {
        return false;
    }
    match (from.is_floating(), to.is_floating()) {
        (true, false) => true,
        (true, true) => to.rank() < from.rank(),
        (false, false) => to.bit_width() < from.bit_width(),
        (false, true) => false,
    }
}

impl Sema {
    fn is_invalid(&self, expr: &Expr) -> bool {
        expr.is_recovery() || self.ast.is_unresolved(expr.ty)
    }

    pub fn build_recovery_expr(&mut self, children: Vec<ExprPtr>, span: &Span) -> ExprPtr {
        let ty = self.error_type();
        Expr::rvalue(ExprKind::Recovery(children), ty, span.clone())
    }

    fn builtin(&self, class: BuiltinClass) -> TypeId {
        self.ast.get_builtin_type(class)
    }

    // Literals

    /// Integer literals are `i32` when they fit and `i64` otherwise; `u`,
    /// `l` and `ul` suffixes pick the unsigned and long types. Floating
    /// literals are `f64`, or `f32` with an `f` suffix.
    pub fn act_on_numeric_constant(&mut self, text: &str, span: &Span) -> Result<ExprPtr, Error> {
        let parse_error = || {
            Error::new(
                ErrorImpl::NumberParseError {
                    token: text.to_string(),
                },
                span.start.clone(),
            )
        };

        let lower = text.to_ascii_lowercase();
        let is_hex = lower.starts_with("0x");
        let digits = lower.trim_end_matches(|c: char| match c {
            'u' | 'l' => true,
            'f' => !is_hex,
            _ => false,
        });
        let suffix = &lower[digits.len()..];
        let floating = !is_hex && (digits.contains('.') || digits.contains('e') || suffix.contains('f'));

        if floating {
            let value: f64 = digits.parse().map_err(|_| parse_error())?;
            let (class, value) = match suffix {
                "" => (BuiltinClass::F64, value),
                "f" => (BuiltinClass::F32, value as f32 as f64),
                _ => return Err(parse_error()),
            };
            let ty = self.builtin(class);
            return Ok(Expr::rvalue(ExprKind::FloatingLiteral(value), ty, span.clone()));
        }

        let value = if is_hex {
            u64::from_str_radix(&digits[2..], 16)
        } else {
            digits.parse::<u64>()
        }
        .map_err(|_| parse_error())?;

        let class = match suffix {
            "" if value <= i32::MAX as u64 => BuiltinClass::I32,
            "" | "l" if value <= i64::MAX as u64 => BuiltinClass::I64,
            "u" if value <= u32::MAX as u64 => BuiltinClass::U32,
            "" | "l" | "u" | "ul" | "lu" => BuiltinClass::U64,
            _ => return Err(parse_error()),
        };
        let ty = self.builtin(class);
        Ok(Expr::rvalue(ExprKind::IntegerLiteral(value as i64), ty, span.clone()))
    }

    pub fn act_on_bool_literal(&mut self, value: bool, span: &Span) -> ExprPtr {
        let ty = self.builtin(BuiltinClass::Bool);
        Expr::rvalue(ExprKind::BoolLiteral(value), ty, span.clone())
    }

    /// `value` is the unescaped literal; its first byte is the character.
    pub fn act_on_char_literal(&mut self, value: &str, span: &Span) -> ExprPtr {
        let ty = self.builtin(BuiltinClass::Char);
        let byte = value.bytes().next().unwrap_or(0);
        Expr::rvalue(ExprKind::CharLiteral(byte), ty, span.clone())
    }

    /// A string literal is a `[char; N]` array including the terminating
    /// zero byte.
    pub fn act_on_string_literal(&mut self, value: &str, span: &Span) -> ExprPtr {
        let char_ty = self.builtin(BuiltinClass::Char);
        let ty = self.ast.get_array_type(char_ty, value.len() as u64 + 1);
        Expr::new(
            ExprKind::StringLiteral(Rc::from(value)),
            ty,
            ValueKind::LValue,
            span.clone(),
        )
    }

    // Names

    /// A possibly qualified name used as a value.
    pub fn act_on_id_expr(&mut self, qualifiers: &[Rc<str>], name: &str, span: &Span) -> Result<ExprPtr, Error> {
        let mut result = LookupResult::new(name, LookupKind::Ordinary, span.clone());
        let scope = self.current_scope();
        self.lookup_nested_name(&mut result, scope, qualifiers)?;

        let spelled = qualifiers
            .iter()
            .map(|qualifier| qualifier.to_string())
            .chain(std::iter::once(name.to_string()))
            .collect::<Vec<_>>()
            .join("::");

        match result.classification() {
            LookupClassification::NotFound => {
                if !result.suppress_diagnostics() {
                    self.diag(DiagId::ErrUndefinedIdentifier, span, &[&spelled]);
                }
                Ok(self.build_recovery_expr(vec![], span))
            }
            LookupClassification::Ambiguous => {
                self.diag(DiagId::ErrAmbiguousReference, span, &[&spelled]);
                for candidate in result.decls().to_vec() {
                    let candidate_span = self.ast.get_decl(candidate).span.clone();
                    self.diag(DiagId::NoteDeclaredHere, &candidate_span, &[&spelled]);
                }
                Ok(self.build_recovery_expr(vec![], span))
            }
            LookupClassification::FoundOverloaded => {
                let candidates: Rc<[DeclId]> = Rc::from(result.decls());
                let ty = match self.ast.get_decl(candidates[0]).ty {
                    Some(ty) => ty,
                    None => self.error_type(),
                };
                Ok(Expr::rvalue(ExprKind::OverloadSet(candidates), ty, span.clone()))
            }
            LookupClassification::Found => match result.get_found_decl() {
                Some(decl) => Ok(self.build_decl_ref_expr(decl, span)),
                None => Err(Error::invariant(format!("lookup of `{}` found nothing", spelled))),
            },
        }
    }

    /// Reference to a value declaration. Variables are lvalues, assignable
    /// unless `const`.
    pub fn build_decl_ref_expr(&mut self, decl: DeclId, span: &Span) -> ExprPtr {
        let (kind, constant, ty) = {
            let entry = self.ast.get_decl(decl);
            (entry.kind, entry.is_constant(), entry.ty)
        };

        let value_kind = match kind {
            DeclKind::Var | DeclKind::ParmVar if constant => ValueKind::LValue,
            DeclKind::Var | DeclKind::ParmVar => ValueKind::ModifiableLValue,
            DeclKind::Function | DeclKind::EnumConstant => ValueKind::RValue,
            DeclKind::Unresolved => {
                // Only Phase 1 sees placeholders here, while folding constants
                let name = self.ast.get_decl(decl).name_str().to_string();
                self.diag(DiagId::ErrExpectedConstant, span, &[&name]);
                return self.build_recovery_expr(vec![], span);
            }
            _ => {
                let name = self.ast.get_decl(decl).name_str().to_string();
                self.diag(DiagId::ErrUndefinedIdentifier, span, &[&name]);
                return self.build_recovery_expr(vec![], span);
            }
        };

        self.diagnose_use_of_decl(decl, span);
        let ty = match ty {
            Some(ty) => ty,
            None => self.error_type(),
        };
        Expr::new(ExprKind::DeclRef(decl), ty, value_kind, span.clone())
    }

    pub fn act_on_paren_expr(&mut self, inner: ExprPtr, span: &Span) -> Result<ExprPtr, Error> {
        if inner.is_recovery() {
            return Ok(inner);
        }
        let (ty, value_kind) = (inner.ty, inner.value_kind);
        Ok(Expr::new(ExprKind::Paren(inner), ty, value_kind, span.clone()))
    }

    // Conversions

    fn implicit_cast(&mut self, expr: ExprPtr, to: TypeId) -> ExprPtr {
        if self.ast.is_same_type(expr.ty, to) {
            return expr;
        }
        let kind = match (self.ast.arithmetic_class(expr.ty), self.ast.arithmetic_class(to)) {
            (Some(from), Some(to)) => cast_kind_for(from, to),
            _ => CastKind::NoOp,
        };
        let span = expr.span.clone();
        Expr::rvalue(ExprKind::ImplicitCast(CastExpr { kind, operand: expr }), to, span)
    }

    /// Bool, char and enum operands become `i32` (enums their underlying
    /// type) before arithmetic.
    fn promote(&mut self, expr: ExprPtr) -> ExprPtr {
        match self.ast.arithmetic_class(expr.ty) {
            Some(class) => {
                let target = self.builtin(promoted_class(class));
                self.implicit_cast(expr, target)
            }
            None => expr,
        }
    }

    /// Converts both operands to their common arithmetic type, inserting
    /// implicit casts where a type differs. `None` when either operand is
    /// not arithmetic.
    pub fn usual_arithmetic_conversions(
        &mut self,
        lhs: ExprPtr,
        rhs: ExprPtr,
    ) -> Option<(ExprPtr, ExprPtr, TypeId)> {
        let lhs_class = self.ast.arithmetic_class(lhs.ty)?;
        let rhs_class = self.ast.arithmetic_class(rhs.ty)?;
        let common = self.builtin(common_arithmetic_class(lhs_class, rhs_class));

        let lhs = self.implicit_cast(lhs, common);
        let rhs = self.implicit_cast(rhs, common);
        Some((lhs, rhs, common))
    }

    /// Converts `expr` to `to` the way initialization and argument passing
    /// do. Only arithmetic values convert; anything else must already have
    /// the target type.
    pub fn perform_implicit_conversion(&mut self, expr: ExprPtr, to: TypeId, span: &Span) -> ExprPtr {
        if self.is_invalid(&expr) || self.ast.is_unresolved(to) || self.ast.is_same_type(expr.ty, to) {
            return expr;
        }

        match (self.ast.arithmetic_class(expr.ty), self.ast.builtin_class(to)) {
            (Some(from), Some(target)) if target.is_arithmetic() => {
                if is_narrowing(from, target) && evaluate_constant(&self.ast, &expr).is_none() {
                    let (from_name, to_name) = (self.type_name(expr.ty), self.type_name(to));
                    self.diag(DiagId::WarnImplicitNarrowing, &expr.span, &[&from_name, &to_name]);
                }
                self.implicit_cast(expr, to)
            }
            _ => {
                let (from_name, to_name) = (self.type_name(expr.ty), self.type_name(to));
                self.diag(DiagId::ErrIncompatibleTypes, span, &[&from_name, &to_name]);
                self.build_recovery_expr(vec![expr], span)
            }
        }
    }

    /// Conditions of `if`, loops, `?:`, `!`, `&&` and `||` are converted to
    /// bool.
    pub fn act_on_condition_expr(&mut self, cond: ExprPtr) -> ExprPtr {
        if self.is_invalid(&cond) {
            return cond;
        }
        match self.ast.arithmetic_class(cond.ty) {
            Some(_) => {
                let bool_ty = self.builtin(BuiltinClass::Bool);
                self.implicit_cast(cond, bool_ty)
            }
            None => {
                let found = self.type_name(cond.ty);
                let span = cond.span.clone();
                self.diag(DiagId::ErrIncompatibleTypes, &span, &[&found, "bool"]);
                self.build_recovery_expr(vec![cond], &span)
            }
        }
    }

    // Operators

    fn invalid_operands(&mut self, op: BinaryOperator, lhs: ExprPtr, rhs: ExprPtr, span: &Span) -> ExprPtr {
        let (lhs_name, rhs_name) = (self.type_name(lhs.ty), self.type_name(rhs.ty));
        self.diag(DiagId::ErrInvalidOperands, span, &[op.spelling(), &lhs_name, &rhs_name]);
        self.build_recovery_expr(vec![lhs, rhs], span)
    }

    /// Binary operators, including assignment and compound assignment.
    /// Operands already rejected produce a recovery node without another
    /// diagnostic.
    pub fn act_on_binary_op(
        &mut self,
        op: BinaryOperator,
        lhs: ExprPtr,
        rhs: ExprPtr,
        span: &Span,
    ) -> Result<ExprPtr, Error> {
        if self.is_invalid(&lhs) || self.is_invalid(&rhs) {
            return Ok(self.build_recovery_expr(vec![lhs, rhs], span));
        }

        if op.is_assignment() && !lhs.is_modifiable_lvalue() {
            self.diag(DiagId::ErrNotAssignable, &lhs.span, &[]);
            return Ok(self.build_recovery_expr(vec![lhs, rhs], span));
        }

        if op == BinaryOperator::Assign {
            let rhs = self.perform_implicit_conversion(rhs, lhs.ty, span);
            if rhs.is_recovery() {
                return Ok(self.build_recovery_expr(vec![lhs, rhs], span));
            }
            let ty = lhs.ty;
            return Ok(Expr::rvalue(ExprKind::Binary(BinaryExpr { op, lhs, rhs }), ty, span.clone()));
        }

        if let Some(base) = op.compound_base() {
            let (Some(lhs_class), Some(rhs_class)) =
                (self.ast.arithmetic_class(lhs.ty), self.ast.arithmetic_class(rhs.ty))
            else {
                return Ok(self.invalid_operands(op, lhs, rhs, span));
            };
            if base.is_integer_only() && (lhs_class.is_floating() || rhs_class.is_floating()) {
                return Ok(self.invalid_operands(op, lhs, rhs, span));
            }

            let computation_type = self.builtin(common_arithmetic_class(lhs_class, rhs_class));
            let rhs = self.implicit_cast(rhs, computation_type);
            let ty = lhs.ty;
            return Ok(Expr::rvalue(
                ExprKind::CompoundAssign(CompoundAssignExpr {
                    op,
                    lhs,
                    rhs,
                    computation_type,
                }),
                ty,
                span.clone(),
            ));
        }

        if op.is_logical() {
            let lhs = self.act_on_condition_expr(lhs);
            let rhs = self.act_on_condition_expr(rhs);
            if lhs.is_recovery() || rhs.is_recovery() {
                return Ok(self.build_recovery_expr(vec![lhs, rhs], span));
            }
            let ty = self.builtin(BuiltinClass::Bool);
            return Ok(Expr::rvalue(ExprKind::Binary(BinaryExpr { op, lhs, rhs }), ty, span.clone()));
        }

        let floating = [&lhs, &rhs]
            .iter()
            .any(|operand| self.ast.arithmetic_class(operand.ty).is_some_and(|class| class.is_floating()));
        if op.is_integer_only() && floating {
            return Ok(self.invalid_operands(op, lhs, rhs, span));
        }

        let (lhs, rhs, common) = match (self.ast.arithmetic_class(lhs.ty), self.ast.arithmetic_class(rhs.ty)) {
            (Some(_), Some(_)) => match self.usual_arithmetic_conversions(lhs, rhs) {
                Some(converted) => converted,
                None => return Err(Error::invariant("arithmetic operands without a common type")),
            },
            _ => return Ok(self.invalid_operands(op, lhs, rhs, span)),
        };

        let ty = if op.is_comparison() {
            self.builtin(BuiltinClass::Bool)
        } else {
            common
        };
        Ok(Expr::rvalue(ExprKind::Binary(BinaryExpr { op, lhs, rhs }), ty, span.clone()))
    }

    pub fn act_on_unary_op(&mut self, op: UnaryOperator, operand: ExprPtr, span: &Span) -> Result<ExprPtr, Error> {
        if self.is_invalid(&operand) {
            return Ok(self.build_recovery_expr(vec![operand], span));
        }

        let class = self.ast.arithmetic_class(operand.ty);
        let invalid = match op {
            UnaryOperator::Plus | UnaryOperator::Minus | UnaryOperator::Not => class.is_none(),
            UnaryOperator::BitNot => !class.is_some_and(|class| class.is_integer()),
            _ => class.is_none() || class == Some(BuiltinClass::Bool),
        };
        if invalid {
            let found = self.type_name(operand.ty);
            self.diag(DiagId::ErrInvalidUnaryOperand, span, &[op.spelling(), &found]);
            return Ok(self.build_recovery_expr(vec![operand], span));
        }

        let (operand, ty) = match op {
            UnaryOperator::Plus | UnaryOperator::Minus | UnaryOperator::BitNot => {
                let operand = self.promote(operand);
                let ty = operand.ty;
                (operand, ty)
            }
            UnaryOperator::Not => {
                let operand = self.act_on_condition_expr(operand);
                (operand, self.builtin(BuiltinClass::Bool))
            }
            _ => {
                if !operand.is_modifiable_lvalue() {
                    self.diag(DiagId::ErrNotAssignable, &operand.span, &[]);
                    return Ok(self.build_recovery_expr(vec![operand], span));
                }
                let ty = operand.ty;
                (operand, ty)
            }
        };

        Ok(Expr::rvalue(ExprKind::Unary { op, operand }, ty, span.clone()))
    }

    pub fn act_on_postfix_unary_op(
        &mut self,
        op: UnaryOperator,
        operand: ExprPtr,
        span: &Span,
    ) -> Result<ExprPtr, Error> {
        if !op.is_postfix() {
            return Err(Error::invariant(format!("`{}` is not a postfix operator", op.spelling())));
        }
        self.act_on_unary_op(op, operand, span)
    }

    // Postfix expressions

    /// Calls a function or an overload set. A single candidate is checked
    /// for arity first; several candidates go through overload resolution.
    pub fn act_on_call_expr(&mut self, callee: ExprPtr, args: Vec<ExprPtr>, span: &Span) -> Result<ExprPtr, Error> {
        let candidates: Vec<DeclId> = match &callee.ignore_parens().kind {
            ExprKind::DeclRef(decl) if self.ast.get_decl(*decl).kind == DeclKind::Function => vec![*decl],
            ExprKind::OverloadSet(decls) => decls.to_vec(),
            _ => {
                if !self.is_invalid(&callee) {
                    let found = self.type_name(callee.ty);
                    self.diag(DiagId::ErrNotCallable, &callee.span, &[&found]);
                }
                return Ok(self.build_recovery_expr(args, span));
            }
        };
        if args.iter().any(|arg| self.is_invalid(arg)) {
            return Ok(self.build_recovery_expr(args, span));
        }

        let name = self.qualified_name(candidates[0]);
        let function = if let [single] = candidates.as_slice() {
            let ty = self
                .ast
                .get_decl(*single)
                .ty
                .ok_or_else(|| Error::invariant(format!("function `{}` has no type", name)))?;
            let (expected, variadic) = match self.ast.function_signature(ty) {
                Some((_, params, variadic)) => (params.len(), variadic),
                None => return Err(Error::invariant(format!("`{}` has a non-function type", name))),
            };
            if args.len() < expected || (args.len() > expected && !variadic) {
                let (expected, given) = (expected.to_string(), args.len().to_string());
                self.diag(DiagId::ErrArgumentCountMismatch, span, &[&name, &expected, &given]);
                return Ok(self.build_recovery_expr(args, span));
            }
            *single
        } else {
            match self.resolve_overload(&candidates, &args) {
                OverloadOutcome::Success(function) => {
                    self.diagnose_use_of_decl(function, span);
                    function
                }
                OverloadOutcome::NoViable => {
                    let types = args
                        .iter()
                        .map(|arg| self.type_name(arg.ty))
                        .collect::<Vec<_>>()
                        .join(", ");
                    self.diag(DiagId::ErrNoMatchingOverload, span, &[&name, &types]);
                    return Ok(self.build_recovery_expr(args, span));
                }
                OverloadOutcome::Ambiguous(tied) => {
                    self.diag(DiagId::ErrAmbiguousCall, span, &[&name]);
                    for candidate in tied {
                        let candidate_span = self.ast.get_decl(candidate).span.clone();
                        self.diag(DiagId::NoteDeclaredHere, &candidate_span, &[&name]);
                    }
                    return Ok(self.build_recovery_expr(args, span));
                }
            }
        };

        let ty = self
            .ast
            .get_decl(function)
            .ty
            .ok_or_else(|| Error::invariant(format!("function `{}` has no type", name)))?;
        let (result, params) = match self.ast.function_signature(ty) {
            Some((result, params, _)) => (result, params.to_vec()),
            None => return Err(Error::invariant(format!("`{}` has a non-function type", name))),
        };

        let mut converted = Vec::with_capacity(args.len());
        for (index, arg) in args.into_iter().enumerate() {
            let arg = match params.get(index) {
                Some(param) => {
                    let arg_span = arg.span.clone();
                    self.perform_implicit_conversion(arg, *param, &arg_span)
                }
                None => self.promote(arg),
            };
            converted.push(arg);
        }
        if converted.iter().any(|arg| arg.is_recovery()) {
            return Ok(self.build_recovery_expr(converted, span));
        }

        Ok(Expr::rvalue(
            ExprKind::Call {
                callee: function,
                args: converted,
            },
            result,
            span.clone(),
        ))
    }

    /// `base.member` on a record value. The result is an lvalue when the
    /// base is.
    pub fn act_on_member_access_expr(&mut self, base: ExprPtr, member: &str, span: &Span) -> Result<ExprPtr, Error> {
        if self.is_invalid(&base) {
            return Ok(self.build_recovery_expr(vec![base], span));
        }

        let Some(record) = self.ast.record_decl(base.ty) else {
            let found = self.type_name(base.ty);
            self.diag(DiagId::ErrNoMember, span, &[member, &found]);
            return Ok(self.build_recovery_expr(vec![base], span));
        };

        self.complete_record(record)?;
        let context = self.ast.cast_to_decl_context(record)?;
        let mut result = LookupResult::member(member, base.ty, span.clone());
        self.lookup_qualified_name(&mut result, context)?;

        let field = result
            .get_found_decl()
            .filter(|decl| self.ast.get_decl(*decl).kind == DeclKind::Field);
        let Some(field) = field else {
            if !result.suppress_diagnostics() {
                let found = self.type_name(base.ty);
                self.diag(DiagId::ErrNoMember, span, &[member, &found]);
            }
            return Ok(self.build_recovery_expr(vec![base], span));
        };

        let index = self
            .ast
            .field_index(record, field)
            .ok_or_else(|| Error::invariant(format!("field `{}` is not part of its record", member)))?;
        let ty = match self.ast.get_decl(field).ty {
            Some(ty) => ty,
            None => self.error_type(),
        };
        self.diagnose_use_of_decl(field, span);

        let value_kind = base.value_kind;
        Ok(Expr::new(ExprKind::Member { base, field, index }, ty, value_kind, span.clone()))
    }

    /// `base[index]` on an array. The index is converted to `i64`.
    pub fn act_on_array_subscript_expr(
        &mut self,
        base: ExprPtr,
        index: ExprPtr,
        span: &Span,
    ) -> Result<ExprPtr, Error> {
        if self.is_invalid(&base) || self.is_invalid(&index) {
            return Ok(self.build_recovery_expr(vec![base, index], span));
        }

        let Some((element, _)) = self.ast.array_info(base.ty) else {
            let found = self.type_name(base.ty);
            self.diag(DiagId::ErrNotSubscriptable, span, &[&found]);
            return Ok(self.build_recovery_expr(vec![base, index], span));
        };

        if !self
            .ast
            .arithmetic_class(index.ty)
            .is_some_and(|class| class.is_integer())
        {
            let found = self.type_name(index.ty);
            self.diag(DiagId::ErrIncompatibleTypes, &index.span, &[&found, "an integer"]);
            return Ok(self.build_recovery_expr(vec![base, index], span));
        }

        let i64_ty = self.builtin(BuiltinClass::I64);
        let index = self.implicit_cast(index, i64_ty);
        let value_kind = base.value_kind;
        Ok(Expr::new(
            ExprKind::ArraySubscript { base, index },
            element,
            value_kind,
            span.clone(),
        ))
    }

    pub fn act_on_conditional_op(
        &mut self,
        cond: ExprPtr,
        then_expr: ExprPtr,
        else_expr: ExprPtr,
        span: &Span,
    ) -> Result<ExprPtr, Error> {
        let cond = self.act_on_condition_expr(cond);
        if cond.is_recovery() || self.is_invalid(&then_expr) || self.is_invalid(&else_expr) {
            return Ok(self.build_recovery_expr(vec![cond, then_expr, else_expr], span));
        }

        let (then_expr, else_expr, ty) = if self.ast.is_same_type(then_expr.ty, else_expr.ty) {
            let ty = then_expr.ty;
            (then_expr, else_expr, ty)
        } else {
            let arithmetic = self.ast.arithmetic_class(then_expr.ty).is_some()
                && self.ast.arithmetic_class(else_expr.ty).is_some();
            if !arithmetic {
                let (then_name, else_name) = (self.type_name(then_expr.ty), self.type_name(else_expr.ty));
                self.diag(DiagId::ErrIncompatibleTypes, span, &[&else_name, &then_name]);
                return Ok(self.build_recovery_expr(vec![cond, then_expr, else_expr], span));
            }
            self.usual_arithmetic_conversions(then_expr, else_expr)
                .ok_or_else(|| Error::invariant("arithmetic branches without a common type"))?
        };

        Ok(Expr::rvalue(
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            },
            ty,
            span.clone(),
        ))
    }

    /// Explicit `expr as T`. Any arithmetic conversion is allowed, and
    /// integers may become enums.
    pub fn act_on_as_type_expr(&mut self, expr: ExprPtr, ty: TypeId, span: &Span) -> Result<ExprPtr, Error> {
        if self.is_invalid(&expr) || self.ast.is_unresolved(ty) {
            return Ok(self.build_recovery_expr(vec![expr], span));
        }

        let to_enum = matches!(self.ast.get_type(self.ast.underlying_type(ty)), Type::Enum(_));
        let kind = match (self.ast.arithmetic_class(expr.ty), self.ast.arithmetic_class(ty)) {
            _ if self.ast.is_same_type(expr.ty, ty) => Some(CastKind::NoOp),
            (Some(from), Some(_)) if to_enum && !from.is_integer() => None,
            (Some(from), Some(to)) => Some(cast_kind_for(from, to)),
            _ => None,
        };

        match kind {
            Some(kind) => Ok(Expr::rvalue(
                ExprKind::AsType(CastExpr { kind, operand: expr }),
                ty,
                span.clone(),
            )),
            None => {
                let (from_name, to_name) = (self.type_name(expr.ty), self.type_name(ty));
                self.diag(DiagId::ErrIncompatibleTypes, span, &[&from_name, &to_name]);
                Ok(self.build_recovery_expr(vec![expr], span))
            }
        }
    }
}
