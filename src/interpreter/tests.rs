use std::{cell::RefCell, rc::Rc};

use crate::{
    ast::types::BuiltinClass,
    diagnostics::source::SourceManager,
    errors::errors::{ErrorCategory, ErrorImpl},
    sema::sema::Sema,
};

use super::{interpreter::Interpreter, value::Value};

fn interpreter_with(sema: Sema) -> (Interpreter, Rc<RefCell<Vec<u8>>>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let output = Rc::new(RefCell::new(Vec::new()));
    let interpreter = Interpreter::with_sema(
        sema,
        Rc::new(RefCell::new(SourceManager::new())),
        output.clone(),
    )
    .unwrap();
    (interpreter, output)
}

fn interpreter() -> (Interpreter, Rc<RefCell<Vec<u8>>>) {
    interpreter_with(Sema::default())
}

fn run(source: &str) -> Value {
    let (mut interpreter, _) = interpreter();
    interpreter.run_source("test.lang", source).unwrap()
}

#[test]
fn test_function_call_and_arithmetic() {
    let value = run("fn add(a: i32, b: i32) -> i32 { return a + b; } fn main() -> i32 { return add(2, 3) * 4; }");
    assert_eq!(value, Value::Integer(20));
}

#[test]
fn test_globals_initialize_in_dependency_order() {
    let value = run("let x = y + 1; let y = 41; fn main() -> i32 { return x; }");
    assert_eq!(value, Value::Integer(42));
}

#[test]
fn test_recursion() {
    let value = run(
        "fn fact(n: i64) -> i64 { if (n <= 1) { return 1; } return n * fact(n - 1); } \
         fn main() -> i64 { return fact(10); }",
    );
    assert_eq!(value, Value::Integer(3628800));
}

#[test]
fn test_loops_with_break_and_continue() {
    let value = run(
        "fn main() -> i32 { \
           let sum = 0; \
           for (let i = 0; i < 10; i += 1) { if (i % 2 == 0) { continue; } sum += i; } \
           let n = 0; while (true) { n += 1; if (n == 3) { break; } } \
           do { sum += 100; } while (false); \
           return sum + n; \
         }",
    );
    assert_eq!(value, Value::Integer(25 + 100 + 3));
}

#[test]
fn test_goto_backwards_in_function_body() {
    let value = run("fn main() -> i32 { let i = 0; again: i += 1; if (i < 5) goto again; return i; }");
    assert_eq!(value, Value::Integer(5));
}

#[test]
fn test_records_and_arrays() {
    let value = run(
        "struct P { x: i32, y: i32 } \
         fn main() -> i32 { let p: P; p.x = 3; p.y = 4; let a: [i32; 3]; a[1] = p.x * p.y; return a[1] + a[0]; }",
    );
    assert_eq!(value, Value::Integer(12));
}

#[test]
fn test_unsigned_wraparound() {
    let value = run("fn main() -> i32 { let a: u8 = 250; a += 10; return a; }");
    assert_eq!(value, Value::Integer(4));
}

#[test]
fn test_casts_and_enums() {
    let value = run("enum E { A, B = 5 } fn main() -> i32 { let f = 3.7; return (f as i32) + (E::B as i32); }");
    assert_eq!(value, Value::Integer(8));
}

#[test]
fn test_logical_operators_short_circuit() {
    let value = run(
        "let hits = 0; fn bump() -> bool { hits += 1; return true; } \
         fn main() -> i32 { if (false && bump()) {} if (true || bump()) {} if (bump() && bump()) {} return hits; }",
    );
    assert_eq!(value, Value::Integer(2));
}

#[test]
fn test_division_by_zero_is_a_runtime_error() {
    let (mut interpreter, _) = interpreter();
    let error = interpreter
        .run_source("test.lang", "fn main() -> i32 { let z = 0; return 1 / z; }")
        .unwrap_err();
    assert!(matches!(error.get_impl(), ErrorImpl::DivisionByZero));
    assert_eq!(error.category(), ErrorCategory::Runtime);
}

#[test]
fn test_array_index_out_of_bounds() {
    let (mut interpreter, _) = interpreter();
    let error = interpreter
        .run_source("test.lang", "fn main() -> i32 { let a: [i32; 2]; let i = 2; return a[i]; }")
        .unwrap_err();
    assert!(matches!(
        error.get_impl(),
        ErrorImpl::IndexOutOfBounds { index: 2, length: 2 }
    ));
}

#[test]
fn test_call_depth_is_bounded() {
    let mut sema = Sema::default();
    sema.options.max_call_depth = 32;
    let (mut interpreter, _) = interpreter_with(sema);

    let error = interpreter
        .run_source("test.lang", "fn f(n: i32) -> i32 { return f(n + 1); } fn main() -> i32 { return f(0); }")
        .unwrap_err();
    assert!(matches!(error.get_impl(), ErrorImpl::StackOverflow { depth: 32 }));
}

#[test]
fn test_missing_entry_function() {
    let (mut interpreter, _) = interpreter();
    let error = interpreter.run_source("test.lang", "fn start() {}").unwrap_err();
    assert!(matches!(error.get_impl(), ErrorImpl::EntryNotFound { .. }));
}

#[test]
fn test_semantic_errors_fail_the_load() {
    let (mut interpreter, _) = interpreter();
    let error = interpreter.run_source("test.lang", "fn main() -> i32 { return nope; }").unwrap_err();
    assert!(matches!(error.get_impl(), ErrorImpl::CompilationFailed { .. }));
}

#[test]
fn test_host_function_binds_extern_prototype() {
    let (mut interpreter, _) = interpreter();
    interpreter
        .load_source(
            "test.lang",
            "extern fn add(a: i32, b: i32) -> i32; fn main() -> i32 { return add(1, 2); }",
        )
        .unwrap();

    let error = interpreter.call_function("main", &[]).unwrap_err();
    assert!(matches!(error.get_impl(), ErrorImpl::UnboundExternal { .. }));

    interpreter
        .register_function("add", BuiltinClass::I32, &[BuiltinClass::I32, BuiltinClass::I32], |args| {
            Ok(Value::Integer(args[0].as_int() + args[1].as_int()))
        })
        .unwrap();
    assert_eq!(interpreter.call_function("main", &[]).unwrap(), Value::Integer(3));
}

#[test]
fn test_host_function_registered_before_source() {
    let (mut interpreter, _) = interpreter();
    interpreter
        .register_function("twice", BuiltinClass::I32, &[BuiltinClass::I32], |args| {
            Ok(Value::Integer(args[0].as_int() * 2))
        })
        .unwrap();

    let value = interpreter
        .run_source("test.lang", "fn main() -> i32 { return twice(21); }")
        .unwrap();
    assert_eq!(value, Value::Integer(42));
}

#[test]
fn test_call_function_in_module() {
    let (mut interpreter, _) = interpreter();
    interpreter
        .load_source("test.lang", "module math { fn sq(x: i32) -> i32 { return x * x; } }")
        .unwrap();

    let value = interpreter.call_function("math::sq", &[Value::Integer(9)]).unwrap();
    assert_eq!(value, Value::Integer(81));

    let error = interpreter.call_function("math::sq", &[]).unwrap_err();
    assert!(matches!(
        error.get_impl(),
        ErrorImpl::ParameterCountMismatch {
            expected: 1,
            received: 0,
            ..
        }
    ));
}

#[test]
fn test_print_builtins_write_to_output() {
    let (mut interpreter, output) = interpreter();
    interpreter
        .run_source("test.lang", "fn main() { print_int(7); print_char('a'); print_float(0.5); }")
        .unwrap();
    assert_eq!(String::from_utf8(output.borrow().clone()).unwrap(), "7\na\n0.5\n");
}

#[test]
fn test_repl_keeps_declarations_between_statements() {
    let (mut interpreter, _) = interpreter();

    assert_eq!(interpreter.run_statement("let x = 40;").unwrap(), None);
    assert_eq!(interpreter.run_statement("x + 2;").unwrap(), Some(Value::Integer(42)));
    assert_eq!(interpreter.run_statement("x = x * 2; x;").unwrap(), Some(Value::Integer(80)));
}

#[test]
fn test_repl_failed_statement_is_rolled_back() {
    let (mut interpreter, _) = interpreter();
    interpreter.run_statement("let x = 1;").unwrap();

    let error = interpreter.run_statement("let y = nope;").unwrap_err();
    assert!(matches!(error.get_impl(), ErrorImpl::StatementFailed));
    assert!(!interpreter.sema.has_errors());

    // `y` is gone, `x` survived
    assert!(interpreter.run_statement("y;").is_err());
    assert_eq!(interpreter.run_statement("x;").unwrap(), Some(Value::Integer(1)));
}

#[test]
fn test_repl_rollback_reaches_into_reopened_modules() {
    let (mut interpreter, _) = interpreter();
    interpreter
        .run_statement("module m { let x = 1; fn a() -> i32 { return 1; } }")
        .unwrap();

    let error = interpreter
        .run_statement("module m { let y = 2; fn b() -> i32 { return 2; } let z = nope; }")
        .unwrap_err();
    assert!(matches!(error.get_impl(), ErrorImpl::StatementFailed));

    assert!(interpreter.run_statement("m::y;").is_err());
    assert!(interpreter.run_statement("m::b();").is_err());
    assert_eq!(interpreter.run_statement("m::x;").unwrap(), Some(Value::Integer(1)));
    assert_eq!(interpreter.run_statement("m::a();").unwrap(), Some(Value::Integer(1)));
}

#[test]
fn test_repl_statements_release_their_scopes_and_diagnostics() {
    let (mut interpreter, _) = interpreter();
    let scopes = interpreter.sema.scope_count();

    for index in 0..3 {
        interpreter
            .run_statement(&format!("fn f{}() -> i32 {{ {{ let v = {}; return v; }} }}", index, index))
            .unwrap();
        assert!(interpreter.run_statement("fn g() -> i32 { { return nope; } }").is_err());
    }

    assert_eq!(interpreter.sema.scope_count(), scopes);
    assert!(interpreter.sema.diags.history().is_empty());
    assert_eq!(interpreter.run_statement("f2();").unwrap(), Some(Value::Integer(2)));
}

#[test]
fn test_constant_shift_wraps_at_operand_width() {
    let value = run("let g: i32 = 1 << 33; fn main() -> i32 { return g; }");
    assert_eq!(value, Value::Integer(2));
}

#[test]
fn test_repl_runtime_failure_drops_its_values() {
    let (mut interpreter, _) = interpreter();
    interpreter.run_statement("let a = 1;").unwrap();
    let before = interpreter.global_count();

    let error = interpreter.run_statement("let b = a / 0;").unwrap_err();
    assert!(matches!(error.get_impl(), ErrorImpl::DivisionByZero));
    assert_eq!(interpreter.global_count(), before);

    // The name can be declared again
    interpreter.run_statement("let b = 2;").unwrap();
    assert_eq!(interpreter.run_statement("a + b;").unwrap(), Some(Value::Integer(3)));
}

#[test]
fn test_repl_functions_and_strings() {
    let (mut interpreter, _) = interpreter();
    interpreter
        .run_statement("fn inc(v: i32) -> i32 { return v + 1; }")
        .unwrap();
    assert_eq!(interpreter.run_statement("inc(41);").unwrap(), Some(Value::Integer(42)));

    interpreter.run_statement("let s = \"hi\";").unwrap();
    let value = interpreter.run_statement("s;").unwrap().unwrap();
    assert_eq!(value.as_text().as_deref(), Some("hi"));
}

#[test]
fn test_value_conversions() {
    use super::value::convert;

    assert_eq!(convert(&Value::Integer(300), BuiltinClass::I32, BuiltinClass::U8), Value::Integer(44));
    assert_eq!(convert(&Value::Integer(-1), BuiltinClass::I32, BuiltinClass::F64), Value::Floating(-1.0));
    assert_eq!(
        convert(&Value::Integer(-1), BuiltinClass::U64, BuiltinClass::F64),
        Value::Floating(u64::MAX as f64)
    );
    assert_eq!(convert(&Value::Floating(2.9), BuiltinClass::F64, BuiltinClass::I32), Value::Integer(2));
    assert_eq!(convert(&Value::Floating(0.0), BuiltinClass::F64, BuiltinClass::Bool), Value::Integer(0));
}
