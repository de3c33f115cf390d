use std::{cell::RefCell, rc::Rc};

use crate::{
    ast::{
        decls::{Decl, DeclData, DeclId, DeclKind},
        stmts::{Expr, ExprKind, Stmt, StmtKind},
        types::BuiltinClass,
    },
    diagnostics::source::SourceManager,
    errors::errors::{ErrorCategory, ErrorImpl},
    parser::parser::parse_source,
    sema::sema::Sema,
    Span,
};

use super::{
    compiler::{CodeGen, Compiler},
    ir::{BlockId, Function, GlobalInit, InstKind, IrType, Module, Operand, Terminator},
    verifier::verify_module,
};

fn compiler() -> Compiler {
    let _ = env_logger::builder().is_test(true).try_init();
    Compiler::with_sema(Sema::default(), Rc::new(RefCell::new(SourceManager::new()))).unwrap()
}

fn compile(source: &str) -> Module {
    compiler().compile_source("test.lang", source).unwrap()
}

fn block_names(function: &Function) -> Vec<&str> {
    function.blocks.iter().map(|block| block.name.as_str()).collect()
}

fn tu_decl(sema: &Sema, name: &str) -> DeclId {
    sema.ast
        .decls(sema.ast.translation_unit())
        .find(|decl| sema.ast.get_decl(*decl).name_str() == name)
        .unwrap()
}

/// Defines `fn f() -> i32 { return add(<args>); }` directly in the AST, so
/// the call reaches code generation without Sema checking it.
fn define_caller(sema: &mut Sema, argc: i64) {
    let add = tu_decl(sema, "add");
    let i32_ty = sema.ast.get_builtin_type(BuiltinClass::I32);
    let args = (0..argc)
        .map(|value| Expr::rvalue(ExprKind::IntegerLiteral(value), i32_ty, Span::null()))
        .collect();
    let call = Expr::rvalue(ExprKind::Call { callee: add, args }, i32_ty, Span::null());
    let body = Stmt::new(
        StmtKind::Compound(vec![Stmt::new(StmtKind::Return(Some(call)), Span::null())]),
        Span::null(),
    );

    let fn_ty = sema.ast.get_function_type(i32_ty, vec![], false);
    let decl = sema.ast.create_decl(
        Decl::new(DeclKind::Function, Some("f".into()), Span::null())
            .with_type(fn_ty)
            .with_data(DeclData::Function {
                params: vec![],
                body: Some(body),
            }),
    );
    let tu = sema.ast.translation_unit();
    sema.ast.add_decl(tu, decl).unwrap();
}

#[test]
fn test_argument_count_is_checked_before_the_call() {
    let mut sema = Sema::default();
    parse_source(&mut sema, "test.lang", "extern fn add(a: i32, b: i32) -> i32;").unwrap();
    define_caller(&mut sema, 3);

    let error = CodeGen::new(&sema.ast, "test").compile().unwrap_err();
    match error.get_impl() {
        ErrorImpl::ParameterCountMismatch {
            function,
            expected,
            received,
        } => {
            assert_eq!(function, "add");
            assert_eq!(*expected, 2);
            assert_eq!(*received, 3);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(error.category(), ErrorCategory::Invariant);
}

#[test]
fn test_call_with_matching_arguments() {
    let mut sema = Sema::default();
    parse_source(&mut sema, "test.lang", "extern fn add(a: i32, b: i32) -> i32;").unwrap();
    define_caller(&mut sema, 2);

    let module = CodeGen::new(&sema.ast, "test").compile().unwrap();
    verify_module(&module).unwrap();

    let calls = module.get_function("f").unwrap().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "add");
    assert_eq!(calls[0].1.len(), 2);
    assert!(module.get_function("add").unwrap().is_declaration());
}

#[test]
fn test_if_else_with_returns_leaves_no_join_block() {
    let module = compile("fn main() -> i32 { if (1 < 2) { return 1; } else { return 0; } }");
    let main = module.get_function("main").unwrap();

    assert_eq!(block_names(main), vec!["entry", "if.then", "if.else"]);
    assert!(matches!(
        main.block(BlockId(0)).terminator,
        Some(Terminator::CondBr { .. })
    ));
}

#[test]
fn test_if_without_else_falls_through_to_end() {
    let module = compile("fn pick(a: i32) -> i32 { let r = 0; if (a > 0) { r = 1; } return r; }");
    let pick = module.get_function("pick").unwrap();

    assert_eq!(block_names(pick), vec!["entry", "if.then", "if.end"]);
    let end = pick.block_named("if.end").unwrap();
    assert_eq!(pick.predecessors(end), vec![BlockId(0), BlockId(1)]);
}

#[test]
fn test_loops_lower_to_verified_blocks() {
    let module = compile(
        "fn main() -> i32 { \
           let sum = 0; \
           for (let i = 0; i < 10; i += 1) { if (i % 2 == 0) { continue; } sum += i; } \
           let n = 0; while (true) { n += 1; if (n == 3) { break; } } \
           do { sum += 100; } while (false); \
           return sum + n; \
         }",
    );
    let main = module.get_function("main").unwrap();
    let names = block_names(main);

    for name in ["for.cond", "for.body", "for.inc", "for.end", "while.cond", "while.end", "do.body", "do.cond"] {
        assert!(names.contains(&name), "missing block {}", name);
    }
    // `continue` jumps to the increment
    let inc = main.block_named("for.inc").unwrap();
    assert!(main.predecessors(inc).len() >= 2);
}

#[test]
fn test_logical_operators_join_with_phi() {
    let module = compile("fn both(a: bool, b: bool) -> bool { return a && b; }");
    let both = module.get_function("both").unwrap();

    let end = both.block_named("land.end").unwrap();
    let phi = both.block(end).instructions.first().unwrap();
    let InstKind::Phi(incoming) = &phi.kind else {
        panic!("expected a phi, found {:?}", phi.kind);
    };
    assert_eq!(phi.ty, IrType::I1);
    assert_eq!(incoming[0], (Operand::bool(false), BlockId(0)));
    assert_eq!(incoming[1].1, both.block_named("land.rhs").unwrap());
}

#[test]
fn test_goto_targets_label_block() {
    let module = compile("fn main() -> i32 { let i = 0; again: i += 1; if (i < 5) goto again; return i; }");
    let main = module.get_function("main").unwrap();

    let again = main.block_named("again").unwrap();
    assert_eq!(main.predecessors(again).len(), 2);
}

#[test]
fn test_module_printing() {
    let module = compile("fn add(a: i32, b: i32) -> i32 { return a + b; }");
    let text = module.to_string();

    assert!(text.starts_with("; ModuleID = 'test.lang'"));
    assert!(text.contains("declare void @print_int(i64)"));
    assert!(text.contains("define i32 @add(i32 %0, i32 %1) {"));
    assert!(text.contains("entry:"));
    assert!(text.contains("alloca i32"));
    assert!(text.contains("= add i32 %"));
    assert!(text.contains("  ret i32 %"));
}

#[test]
fn test_runtime_calls_widen_arguments() {
    let module = compile("fn main() { let x: i32 = 5; print_int(x); }");
    let main = module.get_function("main").unwrap();

    let calls = main.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "print_int");
    assert_eq!(calls[0].1[0].ty, IrType::I64);
    assert_eq!(main.result, IrType::Void);
}

#[test]
fn test_overloads_get_distinct_symbols() {
    let module = compile(
        "fn scale(a: i32) -> i32 { return a * 2; } \
         fn scale(a: f64) -> f64 { return a * 2.0; } \
         fn main() -> f64 { return scale(1.5); }",
    );

    assert!(module.get_function("scale.i32").is_some());
    assert!(module.get_function("scale.f64").is_some());
    assert_eq!(module.get_function("main").unwrap().calls()[0].0, "scale.f64");
}

#[test]
fn test_module_members_get_dotted_symbols() {
    let module = compile(
        "module math { fn sq(x: i32) -> i32 { return x * x; } } \
         fn f() -> i32 { return math::sq(3); }",
    );

    assert!(module.get_function("math.sq").is_some());
    assert_eq!(module.get_function("f").unwrap().calls()[0].0, "math.sq");
}

#[test]
fn test_constant_globals_are_folded() {
    let module = compile("let counter: i64 = 40 + 2; fn main() -> i64 { counter += 1; return counter; }");

    let counter = module.get_global("counter").unwrap();
    assert_eq!(counter.ty, IrType::I64);
    assert_eq!(counter.init, GlobalInit::Int(42));
    assert!(!counter.constant);
}

#[test]
fn test_folded_shift_wraps_at_operand_width() {
    let module = compile("let g: i32 = 1 << 33; fn main() -> i32 { return g; }");

    assert_eq!(module.get_global("g").unwrap().init, GlobalInit::Int(2));
}

#[test]
fn test_non_constant_global_initializer_is_not_implemented() {
    let error = compiler()
        .compile_source("test.lang", "fn seed() -> i32 { return 7; } let x = seed();")
        .unwrap_err();

    assert!(matches!(error.get_impl(), ErrorImpl::NotImplementedError { .. }));
    assert_eq!(error.category(), ErrorCategory::Unimplemented);
}

#[test]
fn test_code_after_return_is_pruned() {
    let module = compile("fn main() -> i32 { return 1; let dead = 2; }");
    let main = module.get_function("main").unwrap();

    assert_eq!(block_names(main), vec!["entry"]);
}

#[test]
fn test_missing_return_yields_zero() {
    let module = compile("fn main() -> i32 { let x = 1; }");
    let main = module.get_function("main").unwrap();

    assert_eq!(
        main.block(BlockId(0)).terminator,
        Some(Terminator::Ret(Some(Operand::zero(IrType::I32))))
    );
}

#[test]
fn test_verifier_rejects_unterminated_block() {
    let mut module = Module::new("broken");
    let mut function = Function::new("f", vec![], IrType::I32, false);
    function.append_block("entry");
    module.add_function(function);

    let error = verify_module(&module).unwrap_err();
    assert!(matches!(
        error.get_impl(),
        ErrorImpl::VerificationFailed { function, .. } if function == "f"
    ));
}

#[test]
fn test_verifier_rejects_mismatched_return() {
    let mut module = Module::new("broken");
    let mut function = Function::new("f", vec![], IrType::I32, false);
    let entry = function.append_block("entry");
    function.block_mut(entry).terminator = Some(Terminator::Ret(None));
    module.add_function(function);

    assert!(verify_module(&module).is_err());
}

#[test]
fn test_remove_unreachable_blocks_renumbers_targets() {
    let mut function = Function::new("f", vec![], IrType::Void, false);
    let entry = function.append_block("entry");
    let orphan = function.append_block("orphan");
    let exit = function.append_block("exit");
    function.block_mut(entry).terminator = Some(Terminator::Br(exit));
    function.block_mut(orphan).terminator = Some(Terminator::Ret(None));
    function.block_mut(exit).terminator = Some(Terminator::Ret(None));

    assert_eq!(function.remove_unreachable_blocks(), 1);
    assert_eq!(block_names(&function), vec!["entry", "exit"]);
    assert_eq!(function.block(BlockId(0)).terminator, Some(Terminator::Br(BlockId(1))));
}

#[test]
fn test_block_names_are_unique() {
    let mut function = Function::new("f", vec![], IrType::Void, false);
    function.append_block("if.then");
    function.append_block("if.then");

    assert_eq!(block_names(&function), vec!["if.then", "if.then1"]);
}

#[test]
fn test_string_literals_become_constant_globals() {
    let module = compile("fn main() { let s = \"hi\"; }");

    let text = module.get_global(".str.0").unwrap();
    assert!(text.constant);
    assert_eq!(text.ty, IrType::Array(Box::new(IrType::I8), 3));
    assert_eq!(text.init, GlobalInit::Bytes(b"hi\0".to_vec()));
}
