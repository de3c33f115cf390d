//! Unit tests for the parser module.
//!
//! Each test parses a small program into a fresh Sema and inspects the
//! declarations and diagnostics it produced:
//! - Declarations and forward references
//! - Records, enums, modules and aliases
//! - Statements, labels and loops
//! - Syntax error recovery

use std::rc::Rc;

use crate::{
    ast::{
        decls::{DeclId, DeclKind},
        stmts::StmtKind,
        types::BuiltinClass,
    },
    diagnostics::diagnostics::DiagId,
    lexer::lexer::tokenize,
    sema::sema::Sema,
};

use super::parser::{parse_statements, parse_translation_unit};

fn parse_source(source: &str) -> Sema {
    let mut sema = Sema::default();
    let tokens = tokenize(source.to_string(), Some("test.lang".to_string())).unwrap();
    parse_translation_unit(&mut sema, tokens, Rc::new("test.lang".to_string())).unwrap();
    sema
}

fn tu_decl(sema: &Sema, name: &str) -> DeclId {
    sema.ast
        .decls(sema.ast.translation_unit())
        .find(|decl| sema.ast.get_decl(*decl).has_name(name))
        .unwrap()
}

fn member(sema: &Sema, owner: DeclId, name: &str) -> DeclId {
    let context = sema.ast.as_decl_context(owner).unwrap();
    sema.ast
        .decls(context)
        .find(|decl| sema.ast.get_decl(*decl).has_name(name))
        .unwrap()
}

fn body_len(sema: &Sema, function: DeclId) -> usize {
    match &sema.ast.get_decl(function).body().unwrap().kind {
        StmtKind::Compound(stmts) => stmts.len(),
        _ => panic!("function body is not a compound statement"),
    }
}

#[test]
fn test_parse_function_definition() {
    let sema = parse_source("fn add(a: i32, b: i32) -> i32 { return a + b; }");

    assert!(!sema.has_errors());
    let add = tu_decl(&sema, "add");
    assert_eq!(sema.ast.get_decl(add).kind, DeclKind::Function);
    assert_eq!(sema.ast.get_decl(add).params().len(), 2);
    assert_eq!(body_len(&sema, add), 1);
}

#[test]
fn test_parse_extern_prototype() {
    let sema = parse_source("extern fn add(a: i32, b: i32) -> i32;");

    assert!(!sema.has_errors());
    let add = tu_decl(&sema, "add");
    assert!(sema.ast.get_decl(add).is_extern());
    assert!(sema.ast.get_decl(add).body().is_none());
}

#[test]
fn test_forward_reference_between_globals() {
    let sema = parse_source("let x = y + 1; let y = 2;");

    assert!(!sema.has_errors());
    let names: Vec<String> = sema
        .ast
        .decls(sema.ast.translation_unit())
        .map(|decl| sema.ast.get_decl(decl).name_str().to_string())
        .collect();
    assert_eq!(names, vec!["x", "y"]);
    assert_eq!(sema.ast.get_decl(tu_decl(&sema, "x")).kind, DeclKind::Var);
}

#[test]
fn test_forward_call_between_functions() {
    let sema = parse_source("fn f() -> i32 { return g(); } fn g() -> i32 { return 1; }");
    assert!(!sema.has_errors());
}

#[test]
fn test_circular_initializers_are_diagnosed() {
    let sema = parse_source("let a = b; let b = a;");

    assert!(sema.diags.has_reported(DiagId::ErrCircularReference));
    let circular = sema
        .diags
        .history()
        .iter()
        .filter(|diag| diag.id == DiagId::ErrCircularReference)
        .count();
    assert_eq!(circular, 1);
    assert!(!sema.diags.has_reported(DiagId::ErrUndefinedIdentifier));
}

#[test]
fn test_statement_at_translation_unit_scope() {
    let sema = parse_source("x = 1; let y = 2;");

    assert!(sema.diags.has_reported(DiagId::ErrStatementNotAllowed));
    assert_eq!(sema.ast.get_decl(tu_decl(&sema, "y")).kind, DeclKind::Var);
}

#[test]
fn test_syntax_error_recovers_in_function_body() {
    let sema = parse_source("fn f() { let x = ; let y = 1; }");

    assert!(sema.diags.has_reported(DiagId::ErrUnexpectedToken));
    assert_eq!(body_len(&sema, tu_decl(&sema, "f")), 1);
}

#[test]
fn test_extern_function_with_body_is_rejected() {
    let sema = parse_source("extern fn f() {}");
    assert!(sema.diags.has_reported(DiagId::ErrUnexpectedToken));
}

#[test]
fn test_struct_fields_and_member_access() {
    let sema = parse_source("struct P { x: i32, y: f64 } fn get(p: P) -> f64 { return p.y; }");

    assert!(!sema.has_errors());
    let record = tu_decl(&sema, "P");
    assert_eq!(sema.ast.get_decl(record).kind, DeclKind::Record);
    assert_eq!(sema.ast.field_count(record), 2);
    assert_eq!(sema.ast.get_decl(member(&sema, record, "y")).kind, DeclKind::Field);
}

#[test]
fn test_struct_field_syntax_error_keeps_other_fields() {
    let sema = parse_source("struct P { x: , y: i32 }");

    assert!(sema.diags.has_reported(DiagId::ErrUnexpectedToken));
    let record = tu_decl(&sema, "P");
    assert_eq!(sema.ast.record_fields(record).len(), 1);
}

#[test]
fn test_enum_values_and_qualified_access() {
    let sema = parse_source("enum Color { Red, Green = 5, Blue } const B = Color::Blue;");

    assert!(!sema.has_errors());
    let color = tu_decl(&sema, "Color");
    assert_eq!(sema.ast.get_decl(member(&sema, color, "Red")).enum_value(), Some(0));
    assert_eq!(sema.ast.get_decl(member(&sema, color, "Blue")).enum_value(), Some(6));
}

#[test]
fn test_enumerator_refers_to_cached_constant() {
    let sema = parse_source("const BASE = 10; enum E { A = BASE, B }");

    assert!(!sema.has_errors());
    let e = tu_decl(&sema, "E");
    assert_eq!(sema.ast.get_decl(member(&sema, e, "B")).enum_value(), Some(11));
}

#[test]
fn test_module_members_and_paths() {
    let sema = parse_source(
        "module math { fn sq(x: i32) -> i32 { return x * x; } } \
         fn f() -> i32 { return math::sq(3); }",
    );

    assert!(!sema.has_errors());
    let math = tu_decl(&sema, "math");
    assert_eq!(sema.ast.get_decl(math).kind, DeclKind::Module);
    assert_eq!(sema.ast.get_decl(member(&sema, math, "sq")).kind, DeclKind::Function);
}

#[test]
fn test_module_is_reopened() {
    let sema = parse_source("module m { let a = 1; } module m { let b = 2; }");

    assert!(!sema.has_errors());
    let modules = sema
        .ast
        .decls(sema.ast.translation_unit())
        .filter(|decl| sema.ast.get_decl(*decl).kind == DeclKind::Module)
        .count();
    assert_eq!(modules, 1);
    let m = tu_decl(&sema, "m");
    member(&sema, m, "a");
    member(&sema, m, "b");
}

#[test]
fn test_alias_declarations() {
    let sema = parse_source(
        "alias Int = i32; let x: Int = 3; \
         module m { let v = 1; } alias mm = m; let y = mm::v;",
    );

    assert!(!sema.has_errors());
    let x = tu_decl(&sema, "x");
    let ty = sema.ast.get_decl(x).ty.unwrap();
    assert_eq!(sema.ast.builtin_class(ty), Some(BuiltinClass::I32));
}

#[test]
fn test_type_forms() {
    let sema = parse_source("let a: [i32; 3]; let b: (f64) = 1.0; let c: typeof(b) = 2.0; let d: auto = 3;");

    assert!(!sema.has_errors());
    let a = tu_decl(&sema, "a");
    let ty = sema.ast.get_decl(a).ty.unwrap();
    assert_eq!(sema.ast.array_info(ty).map(|(_, count)| count), Some(3));
}

#[test]
fn test_labels_and_goto() {
    let sema = parse_source("fn f() { goto done; done: return; }");
    assert!(!sema.has_errors());

    let sema = parse_source("fn g() { goto missing; }");
    assert!(sema.diags.has_reported(DiagId::ErrUndefinedLabel));
}

#[test]
fn test_loops_and_jumps() {
    let sema = parse_source(
        "fn f() { for (let i = 0; i < 3; i = i + 1) { if (i == 1) { continue; } break; } \
         let n = 0; while (n < 10) n += 1; do { n -= 1; } while (n > 0); }",
    );
    assert!(!sema.has_errors());

    let sema = parse_source("fn g() { break; }");
    assert!(sema.diags.has_reported(DiagId::ErrBreakOutsideLoop));
}

#[test]
fn test_block_scope_shadowing() {
    let sema = parse_source("fn f() -> i32 { let x = 1; { let x = 2.5; } return x; }");
    assert!(!sema.has_errors());
}

#[test]
fn test_overloads_in_source() {
    let sema = parse_source(
        "fn f(a: i32) -> i32 { return a; } fn f(a: f64) -> f64 { return a; } \
         fn g() -> f64 { return f(1.5); }",
    );
    assert!(!sema.has_errors());

    let sema = parse_source("fn h(a: i32) {} fn h(b: i32) {}");
    assert!(sema.diags.has_reported(DiagId::ErrConflictingOverload));
}

#[test]
fn test_attributes_on_declarations() {
    let sema = parse_source("#[deprecated(\"use g\")] fn old() {} fn g() { old(); }");
    assert!(sema.diags.has_reported(DiagId::WarnDeprecated));
    assert!(!sema.has_errors());

    let sema = parse_source("#[nope] fn f() {}");
    assert!(sema.diags.has_reported(DiagId::ErrUnknownAttribute));
}

#[test]
fn test_parse_statements_for_repl() {
    let mut sema = Sema::default();
    let tokens = tokenize("let x = 1; x + 2;".to_string(), None).unwrap();
    let stmts = parse_statements(&mut sema, tokens, Rc::new("shell".to_string())).unwrap();

    assert!(!sema.has_errors());
    assert_eq!(stmts.len(), 2);
    assert!(matches!(stmts[0].kind, StmtKind::Decl(_)));
    assert!(matches!(stmts[1].kind, StmtKind::Expr(_)));
}

#[test]
fn test_repl_syntax_error_skips_statement() {
    let mut sema = Sema::default();
    let tokens = tokenize("let = 1; let y = 2;".to_string(), None).unwrap();
    let stmts = parse_statements(&mut sema, tokens, Rc::new("shell".to_string())).unwrap();

    assert!(sema.diags.has_reported(DiagId::ErrUnexpectedToken));
    assert_eq!(stmts.len(), 1);
}
