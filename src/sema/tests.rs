use std::rc::Rc;

use crate::{
    ast::{
        attributes::DeprecatedAttr,
        decls::{DeclId, DeclKind, DeclaratorId, StorageClass},
        stmts::{BinaryOperator, CastKind, ExprKind, ExprPtr, Stmt, StmtKind},
        types::{BuiltinClass, TypeId},
    },
    diagnostics::diagnostics::DiagId,
    errors::errors::{Error, ErrorImpl},
    Span,
};

use super::{
    constant::{evaluate_constant, ConstValue},
    declarator::DeclaratorKind,
    expr::common_arithmetic_class,
    lookup::{LookupClassification, LookupKind, LookupResult},
    overload::OverloadOutcome,
    scope::ScopeFlags,
    sema::{Phase, Sema},
};

fn span() -> Span {
    Span::null()
}

fn builtin(sema: &Sema, class: BuiltinClass) -> TypeId {
    sema.ast.get_builtin_type(class)
}

fn int(sema: &mut Sema, text: &str) -> ExprPtr {
    sema.act_on_numeric_constant(text, &span()).unwrap()
}

fn declare_var(sema: &mut Sema, name: &str, class: BuiltinClass) -> DeclId {
    let ty = builtin(sema, class);
    sema.act_on_variable_declarator(name, &span(), Some(ty), None, false, StorageClass::None)
        .unwrap()
}

fn declare_function(sema: &mut Sema, name: &str, result: BuiltinClass, params: &[BuiltinClass]) -> DeclId {
    let params = params
        .iter()
        .map(|class| {
            let ty = builtin(sema, *class);
            sema.act_on_param_declarator(None, &span(), ty)
        })
        .collect();
    let result = builtin(sema, result);
    sema.act_on_function_declarator(name, &span(), result, params, false, StorageClass::Extern, vec![])
        .unwrap()
}

fn lookup(sema: &mut Sema, name: &str, kind: LookupKind) -> LookupResult {
    let mut result = LookupResult::new(name, kind, span());
    let scope = sema.current_scope();
    sema.lookup_name(&mut result, scope).unwrap();
    result
}

#[test]
fn test_balanced_scopes_restore_current_scope() {
    let mut sema = Sema::default();
    let before = sema.current_scope();

    sema.push_scope(ScopeFlags::BLOCK_SCOPE);
    sema.push_scope(ScopeFlags::BLOCK_SCOPE | ScopeFlags::BREAK_SCOPE);
    sema.pop_scope().unwrap();
    sema.push_scope(ScopeFlags::BLOCK_SCOPE);
    sema.pop_scope().unwrap();
    sema.pop_scope().unwrap();

    assert_eq!(sema.current_scope(), before);
    assert_eq!(sema.scope_depth(), 0);
}

#[test]
fn test_unbalanced_pop_is_detected() {
    let mut sema = Sema::default();
    let error = sema.pop_scope().unwrap_err();
    assert!(matches!(error.get_impl(), ErrorImpl::UnbalancedScope));
}

#[test]
fn test_lookup_classification() {
    let mut sema = Sema::default();
    declare_var(&mut sema, "x", BuiltinClass::I32);
    declare_function(&mut sema, "add", BuiltinClass::I32, &[BuiltinClass::I32, BuiltinClass::I32]);
    declare_function(&mut sema, "add", BuiltinClass::F64, &[BuiltinClass::F64, BuiltinClass::F64]);

    assert_eq!(
        lookup(&mut sema, "missing", LookupKind::Ordinary).classification(),
        LookupClassification::NotFound
    );
    assert_eq!(
        lookup(&mut sema, "x", LookupKind::Ordinary).classification(),
        LookupClassification::Found
    );

    let add = lookup(&mut sema, "add", LookupKind::Ordinary);
    assert_eq!(add.classification(), LookupClassification::FoundOverloaded);
    assert_eq!(add.decls().len(), 2);
}

#[test]
fn test_lookup_mixed_candidates_are_ambiguous() {
    let mut sema = Sema::default();
    let var = sema.ast.create_decl(crate::ast::decls::Decl::new(
        DeclKind::Var,
        Some(Rc::from("f")),
        span(),
    ));
    let function = declare_function(&mut sema, "f", BuiltinClass::Void, &[]);
    let tu = sema.tu_scope();
    sema.push_on_scope_chains(var, tu, true).unwrap();

    let result = lookup(&mut sema, "f", LookupKind::Ordinary);
    assert_eq!(result.classification(), LookupClassification::Ambiguous);
    assert!(result.decls().contains(&function));
}

#[test]
fn test_inner_scope_shadows_outer() {
    let mut sema = Sema::default();
    let outer = declare_var(&mut sema, "x", BuiltinClass::I32);

    sema.push_scope(ScopeFlags::BLOCK_SCOPE);
    let inner = declare_var(&mut sema, "x", BuiltinClass::F64);
    assert_eq!(lookup(&mut sema, "x", LookupKind::Ordinary).get_found_decl(), Some(inner));
    assert!(!sema.has_errors());

    sema.pop_scope().unwrap();
    assert_eq!(lookup(&mut sema, "x", LookupKind::Ordinary).get_found_decl(), Some(outer));
}

#[test]
fn test_tags_and_ordinary_names_do_not_clash() {
    let mut sema = Sema::default();
    let record = sema.act_on_tag(DeclKind::Record, "S", &span(), None).unwrap();
    let var = declare_var(&mut sema, "S", BuiltinClass::I32);

    assert!(!sema.has_errors());
    assert_eq!(lookup(&mut sema, "S", LookupKind::Tag).get_found_decl(), Some(record));
    assert_eq!(lookup(&mut sema, "S", LookupKind::Ordinary).get_found_decl(), Some(var));
}

#[test]
fn test_redefinition_is_diagnosed() {
    let mut sema = Sema::default();
    let first = declare_var(&mut sema, "x", BuiltinClass::I32);
    declare_var(&mut sema, "x", BuiltinClass::I32);

    assert!(sema.diags.has_reported(DiagId::ErrRedefinition));
    assert!(sema.diags.has_reported(DiagId::NotePreviousDefinition));
    assert_eq!(lookup(&mut sema, "x", LookupKind::Ordinary).get_found_decl(), Some(first));
}

#[test]
fn test_usual_arithmetic_conversion_classes() {
    assert_eq!(common_arithmetic_class(BuiltinClass::I32, BuiltinClass::F64), BuiltinClass::F64);
    assert_eq!(common_arithmetic_class(BuiltinClass::U16, BuiltinClass::U32), BuiltinClass::U32);
    assert_eq!(common_arithmetic_class(BuiltinClass::I32, BuiltinClass::U32), BuiltinClass::U32);
    assert_eq!(common_arithmetic_class(BuiltinClass::F32, BuiltinClass::I64), BuiltinClass::F32);
    assert_eq!(common_arithmetic_class(BuiltinClass::Bool, BuiltinClass::Char), BuiltinClass::I32);
}

#[test]
fn test_binary_op_inserts_implicit_casts() {
    let mut sema = Sema::default();
    let lhs = int(&mut sema, "1");
    let rhs = int(&mut sema, "2.5");
    let sum = sema
        .act_on_binary_op(BinaryOperator::Add, lhs, rhs, &span())
        .unwrap();

    assert_eq!(sum.ty, builtin(&sema, BuiltinClass::F64));
    let ExprKind::Binary(binary) = &sum.kind else {
        panic!("expected a binary operator, got {:?}", sum.class());
    };
    assert_eq!(binary.lhs.as_cast().map(|cast| cast.kind), Some(CastKind::IntegralToFloating));
    assert!(binary.rhs.as_cast().is_none());

    let lhs = int(&mut sema, "1");
    let rhs = int(&mut sema, "2");
    let less = sema.act_on_binary_op(BinaryOperator::Lt, lhs, rhs, &span()).unwrap();
    assert_eq!(less.ty, builtin(&sema, BuiltinClass::Bool));
}

#[test]
fn test_integer_only_operators_reject_floats() {
    let mut sema = Sema::default();
    let lhs = int(&mut sema, "7.0");
    let rhs = int(&mut sema, "2");
    let result = sema.act_on_binary_op(BinaryOperator::Rem, lhs, rhs, &span()).unwrap();

    assert!(result.is_recovery());
    assert!(sema.diags.has_reported(DiagId::ErrInvalidOperands));
}

#[test]
fn test_numeric_literal_types() {
    let mut sema = Sema::default();
    let cases = [
        ("42", BuiltinClass::I32),
        ("3000000000", BuiltinClass::I64),
        ("10u", BuiltinClass::U32),
        ("10ul", BuiltinClass::U64),
        ("7l", BuiltinClass::I64),
        ("0xFF", BuiltinClass::I32),
        ("1.5", BuiltinClass::F64),
        ("1.5f", BuiltinClass::F32),
        ("1e3", BuiltinClass::F64),
    ];

    for (text, class) in cases {
        let literal = int(&mut sema, text);
        assert_eq!(literal.ty, builtin(&sema, class), "literal {}", text);
    }

    let hex = int(&mut sema, "0xFF");
    assert!(matches!(hex.kind, ExprKind::IntegerLiteral(255)));

    let error = sema.act_on_numeric_constant("99999999999999999999", &span()).unwrap_err();
    assert!(matches!(error.get_impl(), ErrorImpl::NumberParseError { .. }));
}

#[test]
fn test_assignment_requires_modifiable_lvalue() {
    let mut sema = Sema::default();
    let i32_ty = builtin(&sema, BuiltinClass::I32);
    let init = int(&mut sema, "1");
    sema.act_on_variable_declarator("limit", &span(), Some(i32_ty), Some(init), true, StorageClass::None)
        .unwrap();
    declare_var(&mut sema, "counter", BuiltinClass::I32);

    let counter = sema.act_on_id_expr(&[], "counter", &span()).unwrap();
    let one = int(&mut sema, "1");
    let assign = sema
        .act_on_binary_op(BinaryOperator::AddAssign, counter, one, &span())
        .unwrap();
    assert!(matches!(assign.kind, ExprKind::CompoundAssign(_)));
    assert!(!sema.has_errors());

    let limit = sema.act_on_id_expr(&[], "limit", &span()).unwrap();
    let two = int(&mut sema, "2");
    let assign = sema.act_on_binary_op(BinaryOperator::Assign, limit, two, &span()).unwrap();
    assert!(assign.is_recovery());
    assert!(sema.diags.has_reported(DiagId::ErrNotAssignable));

    let literal = int(&mut sema, "3");
    let increment = sema
        .act_on_postfix_unary_op(crate::ast::stmts::UnaryOperator::PostInc, literal, &span())
        .unwrap();
    assert!(increment.is_recovery());
}

#[test]
fn test_recovery_does_not_cascade() {
    let mut sema = Sema::default();
    let missing = sema.act_on_id_expr(&[], "missing", &span()).unwrap();
    assert!(missing.is_recovery());

    let one = int(&mut sema, "1");
    let sum = sema.act_on_binary_op(BinaryOperator::Add, missing, one, &span()).unwrap();
    let negated = sema
        .act_on_unary_op(crate::ast::stmts::UnaryOperator::Minus, sum, &span())
        .unwrap();

    assert!(negated.is_recovery());
    assert_eq!(sema.diags.error_count(), 1);
    assert!(sema.diags.has_reported(DiagId::ErrUndefinedIdentifier));
}

#[test]
fn test_conflicting_overload_regardless_of_result_type() {
    let mut sema = Sema::default();
    let first = declare_function(&mut sema, "add", BuiltinClass::I32, &[BuiltinClass::I32, BuiltinClass::I32]);
    let second = declare_function(&mut sema, "add", BuiltinClass::I64, &[BuiltinClass::I32, BuiltinClass::I32]);

    assert!(sema.diags.has_reported(DiagId::ErrConflictingOverload));
    let second_ty = sema.ast.get_decl(second).ty.unwrap();
    assert_eq!(sema.check_function_overload(second_ty, &[first]), Some(first));

    // The rejected declaration never becomes visible
    let result = lookup(&mut sema, "add", LookupKind::Ordinary);
    assert_eq!(result.get_found_decl(), Some(first));
}

#[test]
fn test_overload_resolution_ranking() {
    let mut sema = Sema::default();
    let ints = declare_function(&mut sema, "add", BuiltinClass::I32, &[BuiltinClass::I32, BuiltinClass::I32]);
    let floats = declare_function(&mut sema, "add", BuiltinClass::F64, &[BuiltinClass::F64, BuiltinClass::F64]);
    let candidates = [ints, floats];

    let args = vec![int(&mut sema, "1"), int(&mut sema, "2")];
    assert_eq!(sema.resolve_overload(&candidates, &args), OverloadOutcome::Success(ints));

    let args = vec![int(&mut sema, "1.0f"), int(&mut sema, "2.0f")];
    assert_eq!(sema.resolve_overload(&candidates, &args), OverloadOutcome::Success(floats));

    // i64 reaches both by conversion only
    let args = vec![int(&mut sema, "1l"), int(&mut sema, "2l")];
    assert!(matches!(
        sema.resolve_overload(&candidates, &args),
        OverloadOutcome::Ambiguous(_)
    ));

    let args = vec![int(&mut sema, "1")];
    assert_eq!(sema.resolve_overload(&candidates, &args), OverloadOutcome::NoViable);
}

#[test]
fn test_call_through_overload_set() {
    let mut sema = Sema::default();
    declare_function(&mut sema, "add", BuiltinClass::I32, &[BuiltinClass::I32, BuiltinClass::I32]);
    let floats = declare_function(&mut sema, "add", BuiltinClass::F64, &[BuiltinClass::F64, BuiltinClass::F64]);

    let callee = sema.act_on_id_expr(&[], "add", &span()).unwrap();
    assert!(matches!(callee.kind, ExprKind::OverloadSet(_)));

    let args = vec![int(&mut sema, "1.5"), int(&mut sema, "2.5f")];
    let call = sema.act_on_call_expr(callee, args, &span()).unwrap();
    let ExprKind::Call { callee, args } = &call.kind else {
        panic!("expected a call, got {:?}", call.class());
    };
    assert_eq!(*callee, floats);
    assert_eq!(args[1].as_cast().map(|cast| cast.kind), Some(CastKind::FloatingCast));
    assert_eq!(call.ty, builtin(&sema, BuiltinClass::F64));
}

#[test]
fn test_call_argument_count_is_checked() {
    let mut sema = Sema::default();
    declare_function(&mut sema, "add", BuiltinClass::I32, &[BuiltinClass::I32, BuiltinClass::I32]);

    let callee = sema.act_on_id_expr(&[], "add", &span()).unwrap();
    let args = vec![int(&mut sema, "1"), int(&mut sema, "2"), int(&mut sema, "3")];
    let call = sema.act_on_call_expr(callee, args, &span()).unwrap();

    assert!(call.is_recovery());
    let diag = sema
        .diags
        .history()
        .iter()
        .find(|diag| diag.id == DiagId::ErrArgumentCountMismatch)
        .unwrap();
    assert_eq!(diag.args, vec!["add", "2", "3"]);
}

#[test]
fn test_enumerators_follow_previous_value() {
    let mut sema = Sema::default();
    let color = sema.act_on_tag(DeclKind::Enum, "Color", &span(), None).unwrap();
    sema.act_on_tag_start_definition(color).unwrap();
    let four = int(&mut sema, "4");
    let red = sema.act_on_enumerator(color, "Red", &span(), Some(four)).unwrap();
    let green = sema.act_on_enumerator(color, "Green", &span(), None).unwrap();
    sema.act_on_tag_finish_definition(color).unwrap();

    assert_eq!(sema.ast.get_decl(red).enum_value(), Some(4));
    assert_eq!(sema.ast.get_decl(green).enum_value(), Some(5));

    let qualified = sema
        .act_on_id_expr(&[Rc::from("Color")], "Green", &span())
        .unwrap();
    assert_eq!(evaluate_constant(&sema.ast, &qualified), Some(ConstValue::Int(5)));

    // Enumerators are not visible unqualified outside the enum
    let unqualified = sema.act_on_id_expr(&[], "Green", &span()).unwrap();
    assert!(unqualified.is_recovery());
}

#[test]
fn test_constant_folding() {
    let mut sema = Sema::default();
    let one = int(&mut sema, "1");
    let two = int(&mut sema, "2");
    let three = int(&mut sema, "3");
    let sum = sema.act_on_binary_op(BinaryOperator::Add, one, two, &span()).unwrap();
    let paren = sema.act_on_paren_expr(sum, &span()).unwrap();
    let product = sema
        .act_on_binary_op(BinaryOperator::Mul, paren, three, &span())
        .unwrap();

    assert_eq!(evaluate_constant(&sema.ast, &product), Some(ConstValue::Int(9)));

    let zero = int(&mut sema, "0");
    let ten = int(&mut sema, "10");
    let division = sema.act_on_binary_op(BinaryOperator::Div, ten, zero, &span()).unwrap();
    assert_eq!(evaluate_constant(&sema.ast, &division), None);
}

#[test]
fn test_member_access_on_record() {
    let mut sema = Sema::default();
    let point = sema.act_on_tag(DeclKind::Record, "Point", &span(), None).unwrap();
    sema.act_on_tag_start_definition(point).unwrap();
    let i32_ty = builtin(&sema, BuiltinClass::I32);
    sema.act_on_field_declarator("x", &span(), i32_ty).unwrap();
    sema.act_on_field_declarator("y", &span(), i32_ty).unwrap();
    sema.act_on_tag_finish_definition(point).unwrap();

    let point_ty = sema.ast.get_record_type(point);
    sema.act_on_variable_declarator("p", &span(), Some(point_ty), None, false, StorageClass::None)
        .unwrap();

    let p = sema.act_on_id_expr(&[], "p", &span()).unwrap();
    let y = sema.act_on_member_access_expr(p, "y", &span()).unwrap();
    assert!(matches!(y.kind, ExprKind::Member { index: 1, .. }));
    assert!(y.is_modifiable_lvalue());

    let p = sema.act_on_id_expr(&[], "p", &span()).unwrap();
    let z = sema.act_on_member_access_expr(p, "z", &span()).unwrap();
    assert!(z.is_recovery());
    assert!(sema.diags.has_reported(DiagId::ErrNoMember));
}

#[test]
fn test_control_statements_outside_their_context() {
    let mut sema = Sema::default();
    let stmt = sema.act_on_break_stmt(&span());
    assert!(matches!(stmt.kind, StmtKind::Null));
    assert!(sema.diags.has_reported(DiagId::ErrBreakOutsideLoop));

    sema.push_scope(ScopeFlags::BLOCK_SCOPE | ScopeFlags::BREAK_SCOPE | ScopeFlags::CONTINUE_SCOPE);
    let stmt = sema.act_on_continue_stmt(&span());
    assert!(matches!(stmt.kind, StmtKind::Continue));
    sema.pop_scope().unwrap();

    let stmt = sema.act_on_return_stmt(None, &span());
    assert!(matches!(stmt.kind, StmtKind::Null));
    assert!(sema.diags.has_reported(DiagId::ErrReturnOutsideFunction));
}

#[test]
fn test_function_body_checks() {
    let mut sema = Sema::default();
    let i32_ty = builtin(&sema, BuiltinClass::I32);
    let param = sema.act_on_param_declarator(Some("n"), &span(), i32_ty);
    let function = sema
        .act_on_function_declarator("f", &span(), i32_ty, vec![param], false, StorageClass::None, vec![])
        .unwrap();

    sema.act_on_start_of_function_def(function).unwrap();
    let n = sema.act_on_id_expr(&[], "n", &span()).unwrap();
    assert!(matches!(n.kind, ExprKind::DeclRef(decl) if decl == param));

    let goto = sema.act_on_goto_stmt("nowhere", &span()).unwrap();
    let expr = sema.act_on_expr_stmt(n);
    let body = sema.act_on_compound_stmt(vec![goto, expr], &span());
    sema.act_on_finish_function_body(function, body).unwrap();

    assert!(sema.diags.has_reported(DiagId::ErrUndefinedLabel));
    assert!(sema.diags.has_reported(DiagId::WarnMissingReturn));
    assert!(sema.ast.get_decl(function).body().is_some());
    assert_eq!(sema.scope_depth(), 0);
}

#[test]
fn test_return_value_is_converted() {
    let mut sema = Sema::default();
    let f64_ty = builtin(&sema, BuiltinClass::F64);
    let function = sema
        .act_on_function_declarator("half", &span(), f64_ty, vec![], false, StorageClass::None, vec![])
        .unwrap();
    sema.act_on_start_of_function_def(function).unwrap();

    let value = int(&mut sema, "1");
    let stmt = sema.act_on_return_stmt(Some(value), &span());
    let StmtKind::Return(Some(value)) = &stmt.kind else {
        panic!("expected a return statement");
    };
    assert_eq!(value.ty, f64_ty);

    let body = sema.act_on_compound_stmt(vec![Stmt::new(StmtKind::Null, span()), stmt], &span());
    sema.act_on_finish_function_body(function, body).unwrap();
    assert!(!sema.diags.has_reported(DiagId::WarnMissingReturn));
}

#[test]
fn test_deprecated_use_warns() {
    let mut sema = Sema::default();
    let void_ty = builtin(&sema, BuiltinClass::Void);
    let attribute = sema
        .act_on_attribute("deprecated", Some("use g".to_string()), &span())
        .unwrap();
    let old = sema
        .act_on_function_declarator("old", &span(), void_ty, vec![], false, StorageClass::Extern, vec![attribute])
        .unwrap();
    assert!(sema.ast.get_decl(old).get_attribute::<DeprecatedAttr>().is_some());

    sema.act_on_id_expr(&[], "old", &span()).unwrap();
    let warning = sema
        .diags
        .history()
        .iter()
        .find(|diag| diag.id == DiagId::WarnDeprecated)
        .unwrap();
    assert_eq!(warning.args, vec!["old", "use g"]);
    assert!(!sema.has_errors());
}

#[test]
fn test_intrinsics_are_imported_externs() {
    let mut sema = Sema::default();
    let void_ty = builtin(&sema, BuiltinClass::Void);
    let i32_ty = builtin(&sema, BuiltinClass::I32);
    let print = sema.declare_intrinsic("print_i32", void_ty, &[i32_ty]).unwrap();

    assert!(sema.is_imported(print));
    assert!(sema.ast.get_decl(print).is_extern());
    assert_eq!(lookup(&mut sema, "print_i32", LookupKind::Ordinary).get_found_decl(), Some(print));

    let error = sema.declare_intrinsic("print_i32", void_ty, &[i32_ty]).unwrap_err();
    assert_eq!(error.category(), crate::errors::errors::ErrorCategory::Invariant);
}

#[test]
fn test_rollback_drops_new_declarations() {
    let mut sema = Sema::default();
    let kept = declare_var(&mut sema, "kept", BuiltinClass::I32);
    let snapshot = sema.snapshot();

    declare_var(&mut sema, "dropped", BuiltinClass::I32);
    sema.act_on_id_expr(&[], "missing", &span()).unwrap();
    assert!(sema.has_errors());

    sema.rollback(&snapshot).unwrap();
    assert!(!sema.has_errors());
    assert_eq!(
        lookup(&mut sema, "dropped", LookupKind::Ordinary).classification(),
        LookupClassification::NotFound
    );
    assert_eq!(lookup(&mut sema, "kept", LookupKind::Ordinary).get_found_decl(), Some(kept));
}

fn resolve_crosswise(sema: &mut Sema, id: DeclaratorId) -> Result<Option<DeclId>, Error> {
    let name = Rc::clone(&sema.declarator(id)?.name);
    let other = if &*name == "a" { "b" } else { "a" };
    let init = sema.act_on_id_expr(&[], other, &Span::null())?;
    let decl = sema.act_on_variable_declarator(&name, &Span::null(), None, Some(init), false, StorageClass::None)?;
    Ok(Some(decl))
}

fn resolve_forward(sema: &mut Sema, id: DeclaratorId) -> Result<Option<DeclId>, Error> {
    let name = Rc::clone(&sema.declarator(id)?.name);
    let init = match &*name {
        "x" => {
            let y = sema.act_on_id_expr(&[], "y", &Span::null())?;
            let one = sema.act_on_numeric_constant("1", &Span::null())?;
            sema.act_on_binary_op(BinaryOperator::Add, y, one, &Span::null())?
        }
        _ => sema.act_on_numeric_constant("2.5", &Span::null())?,
    };
    let decl = sema.act_on_variable_declarator(&name, &Span::null(), None, Some(init), false, StorageClass::None)?;
    Ok(Some(decl))
}

fn cache(sema: &mut Sema, name: &str) {
    sema.act_on_unresolved_declarator(
        DeclaratorKind::Variable,
        Rc::from(name),
        Span::null(),
        vec![],
        Rc::new(String::from("test")),
    )
    .unwrap();
}

#[test]
fn test_forward_reference_resolves_on_demand() {
    let mut sema = Sema::default();
    sema.set_declarator_resolver(resolve_forward);

    sema.set_current_phase(Phase::Phase1);
    cache(&mut sema, "x");
    cache(&mut sema, "y");
    sema.set_current_phase(Phase::Phase2);
    sema.resolve_pending_declarators().unwrap();

    assert!(!sema.has_errors());
    let x = lookup(&mut sema, "x", LookupKind::Ordinary).get_found_decl().unwrap();
    let x_ty = sema.ast.get_decl(x).ty.unwrap();
    assert_eq!(sema.ast.builtin_class(x_ty), Some(BuiltinClass::F64));

    // Resolution keeps declaration order in the context
    let tu = sema.ast.translation_unit();
    let names: Vec<String> = sema
        .ast
        .decls(tu)
        .map(|decl| sema.ast.get_decl(decl).name_str().to_string())
        .collect();
    assert_eq!(names, vec!["x", "y"]);
}

#[test]
fn test_circular_reference_is_diagnosed() {
    let mut sema = Sema::default();
    sema.set_declarator_resolver(resolve_crosswise);

    sema.set_current_phase(Phase::Phase1);
    cache(&mut sema, "a");
    cache(&mut sema, "b");
    sema.set_current_phase(Phase::Phase2);
    sema.resolve_pending_declarators().unwrap();

    let circular = sema
        .diags
        .history()
        .iter()
        .filter(|diag| diag.id == DiagId::ErrCircularReference)
        .count();
    assert_eq!(circular, 1);
    assert!(!sema.diags.has_reported(DiagId::ErrUndefinedIdentifier));
    assert!(!sema.is_resolving());
    assert_eq!(sema.scope_depth(), 0);
}
