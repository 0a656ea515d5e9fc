//! Front-end golden-AST and end-to-end tests.
//!
//! The compiler must emit exactly the pair shapes the evaluator accepts;
//! the golden tests compare the written form of the compiled AST, and the
//! end-to-end tests run the result through the core evaluator.

use std::cell::RefCell;
use std::rc::Rc;

use fennec_compiler::{CompileError, compile, compile_with_spans};
use fennec_core::{Context, Value};

fn ast(src: &str) -> String {
    let mut ctx = Context::new();
    let v = compile(&mut ctx, src).unwrap();
    ctx.write_value(v, true)
}

fn run(ctx: &mut Context, src: &str) -> Value {
    let v = compile(ctx, src).unwrap();
    ctx.eval(v).unwrap()
}

/// Run a program and capture everything it printed.
fn run_capturing(src: &str) -> String {
    let mut ctx = Context::new();
    let out: Rc<RefCell<String>> = Rc::new(RefCell::new(String::new()));
    let sink = out.clone();
    ctx.set_output(Box::new(move |s| sink.borrow_mut().push_str(s)));
    // The scenarios print through `println`; in a bare core context the
    // printing primitive is `print`, so alias it.
    let print = ctx.global("print").unwrap();
    ctx.set_global("println", print).unwrap();
    let v = compile(&mut ctx, src).unwrap();
    ctx.eval(v).unwrap();
    let captured = out.borrow().clone();
    captured
}

#[test]
fn emission_table() {
    assert_eq!(ast("let x = 1;"), "(let x 1)");
    assert_eq!(ast("[1, 2, 3]"), "(list 1 2 3)");
    assert_eq!(ast("-x"), "(- x)");
    assert_eq!(ast("!x"), "(not x)");
    assert_eq!(ast("a + b"), "(+ a b)");
    assert_eq!(ast("a - b"), "(- a b)");
    assert_eq!(ast("a * b"), "(* a b)");
    assert_eq!(ast("a / b"), "(/ a b)");
    assert_eq!(ast("a % b"), "(mod a b)");
    assert_eq!(ast("a == b"), "(is a b)");
    assert_eq!(ast("a != b"), "(not (is a b))");
    assert_eq!(ast("a < b"), "(< a b)");
    assert_eq!(ast("a <= b"), "(<= a b)");
    assert_eq!(ast("a > b"), "(< b a)");
    assert_eq!(ast("a >= b"), "(<= b a)");
    assert_eq!(ast("a and b"), "(and a b)");
    assert_eq!(ast("a or b"), "(or a b)");
    assert_eq!(ast("a.b"), "(get a b)");
    assert_eq!(ast("f(a, b)"), "(f a b)");
    assert_eq!(ast("x = e"), "(= x e)");
    assert_eq!(ast("return;"), "(return)");
    assert_eq!(ast("return e;"), "(return e)");
    assert_eq!(ast("import m;"), "(import m)");
}

#[test]
fn literals() {
    assert_eq!(ast("42"), "42");
    assert_eq!(ast("3.25"), "3.25");
    assert_eq!(ast("0x10"), "16");
    assert_eq!(ast("2e3"), "2000");
    assert_eq!(ast("true"), "true");
    assert_eq!(ast("false"), "false");
    assert_eq!(ast("nil"), "nil");
    assert_eq!(ast("\"hi\\n\""), "\"hi\\n\"");
}

#[test]
fn precedence_and_grouping() {
    assert_eq!(ast("1 + 2 * 3"), "(+ 1 (* 2 3))");
    assert_eq!(ast("(1 + 2) * 3"), "(* (+ 1 2) 3)");
    assert_eq!(ast("a or b and c"), "(or a (and b c))");
    assert_eq!(ast("a == b < c"), "(is a (< b c))");
    assert_eq!(ast("-a * b"), "(* (- a) b)");
    assert_eq!(ast("x = y = 1"), "(= x (= y 1))");
    assert_eq!(ast("a.b.c"), "(get (get a b) c)");
    assert_eq!(ast("m.sq(9)"), "((get m sq) 9)");
    assert_eq!(ast("f(1)(2)"), "((f 1) 2)");
}

#[test]
fn statements_and_blocks() {
    assert_eq!(
        ast("fn add(a, b) { a + b }"),
        "(let add (fn (a b) (+ a b)))"
    );
    assert_eq!(ast("fn(x) { x }"), "(fn (x) x)");
    assert_eq!(ast("if (c) a; else b;"), "(if c a b)");
    assert_eq!(ast("if (c) a;"), "(if c a)");
    assert_eq!(ast("while (c) { f(); g(); }"), "(while c (do (f) (g)))");
    assert_eq!(ast("{ a; b; }"), "(do a b)");
    assert_eq!(ast("{ a; }"), "a");
    assert_eq!(ast("let x = 1; x"), "(do (let x 1) x)");
    assert_eq!(
        ast("module(\"m\") { export let pi = 3.5; }"),
        "(module \"m\" (export (let pi 3.5)))"
    );
    assert_eq!(
        ast("module(\"m\") { export let a = 1; export fn f(x) { x } }"),
        "(module \"m\" (do (export (let a 1)) (export (let f (fn (x) x)))))"
    );
}

#[test]
fn scenario_factorial() {
    let out = run_capturing("let f = fn(n){ if(n<=1) 1 else n*f(n-1) }; println(f(10));");
    assert_eq!(out, "3628800\n");
}

#[test]
fn scenario_counter() {
    let out = run_capturing(
        "fn make_counter(){ let c = 0; fn inc(){ c = c + 1; return c; } return inc; }\n\
         let g = make_counter(); println(g()); println(g()); println(g());",
    );
    assert_eq!(out, "1\n2\n3\n");
}

#[test]
fn scenario_modules() {
    let out = run_capturing(
        "module(\"m\") { export let pi = 3.14159; export fn sq(x){ x*x } }\n\
         import m; println(m.pi); println(m.sq(9));",
    );
    assert_eq!(out, "3.14159\n81\n");
}

#[test]
fn scenario_list_literal() {
    let out = run_capturing(
        "let xs = [1,2,3];\n\
         println(car(xs)); println(car(cdr(xs))); println(car(cdr(cdr(xs))));",
    );
    assert_eq!(out, "1\n2\n3\n");
}

#[test]
fn closures_capture_by_reference() {
    let mut ctx = Context::new();
    let v = run(
        &mut ctx,
        "fn outer() { let n = 10; let bump = fn() { n = n + 5; }; bump(); return n; } outer()",
    );
    assert_eq!(v, Value::Fixnum(15));
}

#[test]
fn comparison_swaps_evaluate_correctly() {
    let mut ctx = Context::new();
    assert_eq!(run(&mut ctx, "2 > 1"), Value::Bool(true));
    assert_eq!(run(&mut ctx, "1 > 2"), Value::Bool(false));
    assert_eq!(run(&mut ctx, "2 >= 2"), Value::Bool(true));
    assert_eq!(run(&mut ctx, "1 != 2"), Value::Bool(true));
    assert_eq!(run(&mut ctx, "2 != 2"), Value::Bool(false));
}

#[test]
fn syntax_errors() {
    let mut ctx = Context::new();
    assert!(matches!(
        compile(&mut ctx, "let = 5;"),
        Err(CompileError::Syntax { .. })
    ));
    assert!(matches!(
        compile(&mut ctx, "1 + = 2;"),
        Err(CompileError::Syntax { .. })
    ));
    assert!(matches!(
        compile(&mut ctx, "\"unterminated"),
        Err(CompileError::UnterminatedString { .. })
    ));
    assert!(matches!(
        compile(&mut ctx, "1 + 2 = 3;"),
        Err(CompileError::InvalidAssignmentTarget { .. })
    ));
    assert!(matches!(
        compile(&mut ctx, "export 5;"),
        Err(CompileError::Syntax { .. })
    ));
}

#[test]
fn panic_mode_reports_the_first_error_and_recovers() {
    let mut ctx = Context::new();
    // Both statements are bad; recovery must reach the second without
    // cascading, and the first error is the one reported.
    let err = compile(&mut ctx, "let = 1; let x = ;").unwrap_err();
    match err {
        CompileError::Syntax { location, .. } => assert!(location.starts_with("1:5")),
        other => panic!("unexpected error {other:?}"),
    }
    // The context is still usable for a correct program afterwards.
    assert_eq!(run(&mut ctx, "1 + 1"), Value::Fixnum(2));
}

#[test]
fn spans_are_recorded_when_enabled() {
    let mut ctx = Context::new();
    let (v, spans) = compile_with_spans(&mut ctx, "let x = 1;").unwrap();
    assert!(!spans.is_empty());
    let span = spans.get(v).expect("top form has a span");
    assert_eq!((span.line, span.col), (1, 1));
    assert!(span.end_col > span.col);
}
