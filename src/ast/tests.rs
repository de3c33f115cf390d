use std::rc::Rc;

use crate::{errors::errors::ErrorCategory, Span};

use super::{
    attributes::{AttributeRegistry, DeprecatedAttr, ImportedAttr, MemoryArchive},
    context::AstContext,
    decls::{Decl, DeclKind},
    stmts::{BinaryExpr, BinaryOperator, CastExpr, CastKind, Expr, ExprKind, Stmt, StmtClass, StmtKind},
    types::BuiltinClass,
    visitor::StmtVisitor,
};

fn named(kind: DeclKind, name: &str) -> Decl {
    Decl::new(kind, Some(Rc::from(name)), Span::null())
}

#[test]
fn test_add_decl_preserves_order() {
    let mut ctx = AstContext::new();
    let tu = ctx.translation_unit();

    let a = ctx.create_decl(named(DeclKind::Var, "a"));
    let b = ctx.create_decl(named(DeclKind::Var, "b"));
    let c = ctx.create_decl(named(DeclKind::Var, "c"));

    for decl in [a, b, c] {
        ctx.add_decl(tu, decl).unwrap();
        assert!(ctx.contains_decl(tu, decl));
    }

    assert_eq!(ctx.decls(tu).collect::<Vec<_>>(), vec![a, b, c]);
    // Restartable
    assert_eq!(ctx.decls(tu).count(), 3);
}

#[test]
fn test_remove_and_replace_decl() {
    let mut ctx = AstContext::new();
    let tu = ctx.translation_unit();

    let a = ctx.create_decl(named(DeclKind::Var, "a"));
    let b = ctx.create_decl(named(DeclKind::Var, "b"));
    let c = ctx.create_decl(named(DeclKind::Var, "c"));
    for decl in [a, b, c] {
        ctx.add_decl(tu, decl).unwrap();
    }

    ctx.remove_decl(tu, c).unwrap();
    assert!(!ctx.contains_decl(tu, c));
    assert_eq!(ctx.decls(tu).collect::<Vec<_>>(), vec![a, b]);

    let d = ctx.create_decl(named(DeclKind::Var, "d"));
    ctx.replace_decl(tu, a, d).unwrap();
    assert!(!ctx.contains_decl(tu, a));
    assert_eq!(ctx.decls(tu).collect::<Vec<_>>(), vec![d, b]);

    // Re-adding after removal appends
    ctx.add_decl(tu, c).unwrap();
    assert_eq!(ctx.decls(tu).collect::<Vec<_>>(), vec![d, b, c]);

    assert!(ctx.remove_decl(tu, a).is_err());
}

#[test]
fn test_add_decl_twice_is_invariant_violation() {
    let mut ctx = AstContext::new();
    let tu = ctx.translation_unit();
    let a = ctx.create_decl(named(DeclKind::Var, "a"));

    ctx.add_decl(tu, a).unwrap();
    let error = ctx.add_decl(tu, a).unwrap_err();
    assert_eq!(error.category(), ErrorCategory::Invariant);
}

#[test]
fn test_decl_context_narrowing() {
    let mut ctx = AstContext::new();
    let module = ctx.create_decl(named(DeclKind::Module, "m"));
    let record = ctx.create_decl(named(DeclKind::Record, "S"));
    let var = ctx.create_decl(named(DeclKind::Var, "x"));

    let module_ctx = ctx.cast_to_decl_context(module).unwrap();
    assert_eq!(ctx.cast_from_decl_context(module_ctx).unwrap(), module);
    assert!(ctx.cast_to_decl_context(record).is_ok());

    assert!(ctx.as_decl_context(var).is_none());
    let error = ctx.cast_to_decl_context(var).unwrap_err();
    assert_eq!(error.category(), ErrorCategory::Invariant);
}

#[test]
fn test_kind_ranges() {
    assert!(DeclKind::Enum.is_tag());
    assert!(DeclKind::Record.is_tag());
    assert!(!DeclKind::Alias.is_tag());
    assert!(DeclKind::Alias.is_type_decl());
    assert!(DeclKind::ParmVar.is_variable());
    assert!(!DeclKind::EnumConstant.is_variable());
    assert!(DeclKind::EnumConstant.is_value_decl());
    assert!(!DeclKind::Label.is_decl_context());
}

#[test]
fn test_record_and_enum_bookkeeping() {
    let mut ctx = AstContext::new();
    let record = ctx.create_decl(named(DeclKind::Record, "Point"));
    let record_ctx = ctx.cast_to_decl_context(record).unwrap();
    let i32_ty = ctx.get_builtin_type(BuiltinClass::I32);

    let x = ctx.create_decl(named(DeclKind::Field, "x").with_type(i32_ty));
    let y = ctx.create_decl(named(DeclKind::Field, "y").with_type(i32_ty));
    ctx.add_decl(record_ctx, x).unwrap();
    ctx.add_decl(record_ctx, y).unwrap();

    assert_eq!(ctx.field_count(record), 2);
    assert_eq!(ctx.field_index(record, y), Some(1));

    let record_ty = ctx.get_record_type(record);
    assert_eq!(ctx.type_size(record_ty), 8);

    let enum_decl = ctx.create_decl(named(DeclKind::Enum, "Color"));
    let enum_ctx = ctx.cast_to_decl_context(enum_decl).unwrap();
    assert_eq!(ctx.next_enum_value(enum_decl), 0);

    let red = ctx.create_decl(named(DeclKind::EnumConstant, "Red").with_data(
        super::decls::DeclData::EnumConstant {
            value: 4,
            init: None,
        },
    ));
    ctx.add_decl(enum_ctx, red).unwrap();
    assert_eq!(ctx.next_enum_value(enum_decl), 5);
}

#[test]
fn test_qualified_name() {
    let mut ctx = AstContext::new();
    let tu = ctx.translation_unit();
    let module = ctx.create_decl(named(DeclKind::Module, "math"));
    ctx.add_decl(tu, module).unwrap();
    let module_ctx = ctx.cast_to_decl_context(module).unwrap();
    let function = ctx.create_decl(named(DeclKind::Function, "sqrt"));
    ctx.add_decl(module_ctx, function).unwrap();

    assert_eq!(ctx.qualified_name(function), "math::sqrt");
    assert_eq!(ctx.qualified_name(module), "math");
}

#[test]
fn test_types_are_interned() {
    let mut ctx = AstContext::new();
    let i32_ty = ctx.get_builtin_type(BuiltinClass::I32);

    let a = ctx.get_array_type(i32_ty, 4);
    let b = ctx.get_array_type(i32_ty, 4);
    let c = ctx.get_array_type(i32_ty, 5);
    assert_eq!(a, b);
    assert_ne!(a, c);

    let f = ctx.get_function_type(i32_ty, vec![i32_ty, i32_ty], false);
    assert_eq!(ctx.type_name(f), "fn(i32, i32) -> i32");
    assert_eq!(ctx.type_name(a), "[i32; 4]");
}

#[test]
fn test_underlying_type_is_idempotent() {
    let mut ctx = AstContext::new();
    let f64_ty = ctx.get_builtin_type(BuiltinClass::F64);

    let auto = ctx.get_auto_type(Some(f64_ty));
    let type_of = ctx.get_typeof_type(auto);
    let nested = ctx.get_paren_type(type_of);

    let paren = ctx.get_paren_type(f64_ty);
    let other = ctx.get_typeof_type(paren);

    let once = ctx.underlying_type(nested);
    assert_eq!(once, f64_ty);
    assert_eq!(ctx.underlying_type(once), once);
    assert_eq!(ctx.underlying_type(other), f64_ty);
    assert!(ctx.is_same_type(nested, other));

    // An undeduced auto is left alone
    let undeduced = ctx.get_auto_type(None);
    assert_eq!(ctx.underlying_type(undeduced), undeduced);
    assert!(ctx.is_unresolved(undeduced));
}

#[test]
fn test_builtin_ranks() {
    assert!(BuiltinClass::F32.rank() > BuiltinClass::U64.rank());
    assert_eq!(BuiltinClass::I32.rank(), BuiltinClass::U32.rank());
    assert!(BuiltinClass::Bool.is_integer());
    assert!(!BuiltinClass::U16.is_signed());
    assert_eq!(BuiltinClass::from_spelling("u8"), Some(BuiltinClass::U8));
    assert_eq!(BuiltinClass::from_spelling("int"), None);
}

#[test]
fn test_stmt_class_fallback_chain() {
    assert_eq!(
        StmtClass::CompoundAssignOperator.base(),
        Some(StmtClass::BinaryOperator)
    );
    assert_eq!(StmtClass::BinaryOperator.base(), Some(StmtClass::Expr));
    assert_eq!(StmtClass::ImplicitCastExpr.base(), Some(StmtClass::CastExpr));
    assert_eq!(StmtClass::AsTypeExpr.base(), Some(StmtClass::CastExpr));
    assert_eq!(StmtClass::CastExpr.base(), Some(StmtClass::Expr));
    assert_eq!(StmtClass::ReturnStmt.base(), Some(StmtClass::Stmt));
    assert_eq!(StmtClass::Expr.base(), None);

    assert!(StmtClass::ImplicitCastExpr.is_cast());
    assert!(StmtClass::ImplicitCastExpr.is_expr());
    assert!(!StmtClass::IfStmt.is_expr());
}

/// Overrides only the roots and the binary operator, and records the path
/// each dispatch took.
#[derive(Default)]
struct TraceVisitor {
    trace: Vec<&'static str>,
    slot: Option<i64>,
}

impl StmtVisitor for TraceVisitor {
    type Value = i64;

    fn last_value(&mut self) -> &mut Option<i64> {
        &mut self.slot
    }

    fn visit_stmt(&mut self, _stmt: &Stmt) -> Result<(), crate::errors::errors::Error> {
        self.trace.push("stmt");
        Ok(())
    }

    fn visit_expr(&mut self, _expr: &Expr) -> Result<(), crate::errors::errors::Error> {
        self.trace.push("expr");
        self.slot = Some(0);
        Ok(())
    }

    fn visit_binary_operator(&mut self, _expr: &Expr) -> Result<(), crate::errors::errors::Error> {
        self.trace.push("binary");
        self.slot = Some(1);
        Ok(())
    }
}

#[test]
fn test_visitor_falls_back_to_base() {
    let mut ctx = AstContext::new();
    let i32_ty = ctx.get_builtin_type(BuiltinClass::I32);
    let i64_ty = ctx.get_builtin_type(BuiltinClass::I64);

    let one = Expr::rvalue(ExprKind::IntegerLiteral(1), i32_ty, Span::null());
    let two = Expr::rvalue(ExprKind::IntegerLiteral(2), i32_ty, Span::null());
    let add = Expr::rvalue(
        ExprKind::Binary(BinaryExpr {
            op: BinaryOperator::Add,
            lhs: one.clone(),
            rhs: two,
        }),
        i32_ty,
        Span::null(),
    );
    let cast = Expr::rvalue(
        ExprKind::ImplicitCast(CastExpr {
            kind: CastKind::IntegralCast,
            operand: one,
        }),
        i64_ty,
        Span::null(),
    );

    let mut visitor = TraceVisitor::default();
    assert_eq!(visitor.evaluate(&add).unwrap(), 1);
    assert_eq!(visitor.evaluate(&cast).unwrap(), 0);

    let stmt = Stmt::new(StmtKind::Compound(vec![]), Span::null());
    visitor.visit(&stmt).unwrap();
    let expr_stmt = Stmt::new(StmtKind::Expr(add), Span::null());
    visitor.visit(&expr_stmt).unwrap();

    assert_eq!(visitor.trace, vec!["binary", "expr", "stmt", "binary"]);
}

#[test]
fn test_attribute_registry_round_trip() {
    let registry = AttributeRegistry::with_builtins();
    let mut archive = MemoryArchive::new();

    let deprecated = DeprecatedAttr {
        message: Some(String::from("use add2")),
    };
    let imported = ImportedAttr {
        origin: String::from("host"),
    };
    registry.serialize(&deprecated, &mut archive).unwrap();
    registry.serialize(&imported, &mut archive).unwrap();

    let first = registry.deserialize(&mut archive).unwrap();
    let second = registry.deserialize(&mut archive).unwrap();
    assert_eq!(first.as_any().downcast_ref::<DeprecatedAttr>(), Some(&deprecated));
    assert_eq!(second.as_any().downcast_ref::<ImportedAttr>(), Some(&imported));

    // Exhausted
    assert!(registry.deserialize(&mut archive).is_err());
}

#[test]
fn test_attribute_registry_rejects_unknown() {
    let registry = AttributeRegistry::new();
    let mut archive = MemoryArchive::new();
    let deprecated = DeprecatedAttr { message: None };

    assert!(!registry.is_registered("deprecated"));
    assert!(registry.serialize(&deprecated, &mut archive).is_err());
    assert!(archive.is_empty());
}

#[test]
fn test_decl_attribute_lookup() {
    let mut decl = named(DeclKind::Function, "old");
    decl.attributes.push(Rc::new(DeprecatedAttr { message: None }));

    assert!(decl.get_attribute::<DeprecatedAttr>().is_some());
    assert!(decl.get_attribute::<ImportedAttr>().is_none());
}
