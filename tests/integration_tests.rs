//! Integration tests for the complete pipeline.
//!
//! These tests drive the public API the way the binary does: source text
//! goes through lexing, parsing and semantic analysis, then either the
//! interpreter runs it or the code generator lowers and verifies it.

use std::{cell::RefCell, rc::Rc};

use procyon::{
    ast::stmts::{BinaryOperator, ExprKind, StmtKind},
    compiler::{compiler::Compiler, ir::Terminator},
    diagnostics::{diagnostics::DiagId, source::SourceManager},
    errors::errors::{ErrorCategory, ErrorImpl},
    interpreter::{interpreter::Interpreter, value::Value},
    lexer::lexer::tokenize,
    parser::parser::parse_statements,
    sema::sema::Sema,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn interpreter() -> (Interpreter, Rc<RefCell<Vec<u8>>>) {
    init_logger();
    let output = Rc::new(RefCell::new(Vec::new()));
    let interpreter = Interpreter::with_sema(
        Sema::default(),
        Rc::new(RefCell::new(SourceManager::new())),
        output.clone(),
    )
    .unwrap();
    (interpreter, output)
}

fn compiler() -> Compiler {
    init_logger();
    Compiler::with_sema(Sema::default(), Rc::new(RefCell::new(SourceManager::new()))).unwrap()
}

#[test]
fn test_extern_call_lowers_with_declared_arguments() {
    let module = compiler()
        .compile_source(
            "add.pn",
            "extern fn add(a: i32, b: i32) -> i32; fn main() -> i32 { return add(1, 2); }",
        )
        .unwrap();

    let calls = module.get_function("main").unwrap().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "add");
    assert_eq!(calls[0].1.len(), 2);
}

#[test]
fn test_extern_call_with_wrong_argument_count_is_rejected() {
    let mut compiler = compiler();
    let error = compiler
        .compile_source(
            "add.pn",
            "extern fn add(a: i32, b: i32) -> i32; fn main() -> i32 { return add(1, 2, 3); }",
        )
        .unwrap_err();

    // Sema catches it first; nothing reaches the code generator
    assert!(matches!(error.get_impl(), ErrorImpl::CompilationFailed { .. }));
    assert_eq!(error.category(), ErrorCategory::Driver);
}

#[test]
fn test_if_else_lowers_to_two_reachable_arms() {
    let module = compiler()
        .compile_source(
            "branch.pn",
            "fn main() -> i32 { if (1 < 2) { return 1; } else { return 0; } }",
        )
        .unwrap();
    let main = module.get_function("main").unwrap();

    let names: Vec<&str> = main.blocks.iter().map(|block| block.name.as_str()).collect();
    assert_eq!(names, vec!["entry", "if.then", "if.else"]);
    for block in &main.blocks[1..] {
        assert!(matches!(block.terminator, Some(Terminator::Ret(Some(_)))));
    }
}

#[test]
fn test_repl_respects_precedence() {
    let (mut interpreter, _) = interpreter();
    assert_eq!(
        interpreter.run_statement("1 + 2 * 3;").unwrap(),
        Some(Value::Integer(7))
    );
}

#[test]
fn test_multiplication_binds_tighter_in_the_tree() {
    let mut sema = Sema::default();
    let tokens = tokenize(String::from("1 + 2 * 3;"), Some(String::from("<stdin>"))).unwrap();
    let stmts = parse_statements(&mut sema, tokens, Rc::new(String::from("<stdin>"))).unwrap();

    let StmtKind::Expr(expr) = &stmts[0].kind else {
        panic!("expected an expression statement");
    };
    let ExprKind::Binary(add) = &expr.kind else {
        panic!("expected a binary expression");
    };
    assert_eq!(add.op, BinaryOperator::Add);
    assert!(matches!(&add.rhs.kind, ExprKind::Binary(mul) if mul.op == BinaryOperator::Mul));
}

#[test]
fn test_overloads_differing_only_in_result_conflict() {
    let (mut interpreter, _) = interpreter();
    let error = interpreter
        .run_source(
            "overload.pn",
            "fn add(a: i32, b: i32) -> i32 { return a + b; } \
             fn add(a: i32, b: i32) -> i64 { return 0; } \
             fn main() -> i32 { return add(1, 2); }",
        )
        .unwrap_err();

    assert!(matches!(error.get_impl(), ErrorImpl::CompilationFailed { .. }));
    assert!(interpreter.sema.diags.has_reported(DiagId::ErrConflictingOverload));
}

#[test]
fn test_interpreter_and_compiler_accept_the_same_program() {
    let source = "struct P { x: i32, y: i32 } \
                  fn area(w: i32, h: i32) -> i32 { return w * h; } \
                  fn main() -> i32 { let p: P; p.x = 6; p.y = 7; print_int(area(p.x, p.y)); return 0; }";

    let (mut interpreter, output) = interpreter();
    assert_eq!(interpreter.run_source("both.pn", source).unwrap(), Value::Integer(0));
    assert_eq!(String::from_utf8(output.borrow().clone()).unwrap(), "42\n");

    let module = compiler().compile_source("both.pn", source).unwrap();
    assert!(module.get_function("area").is_some());
    assert!(module.get_function("print_int").unwrap().is_declaration());
}
