//! Library behavior over a fully installed context.

use std::cell::RefCell;
use std::rc::Rc;

use fennec_core::{Context, CoreError, Value};

fn context() -> Context {
    let mut ctx = Context::new();
    fennec_runtime::install(&mut ctx).unwrap();
    ctx
}

fn eval(ctx: &mut Context, src: &str) -> Value {
    let expr = ctx.read_str(src).unwrap().unwrap();
    ctx.eval(expr).unwrap()
}

fn shown(ctx: &mut Context, src: &str) -> String {
    let v = eval(ctx, src);
    ctx.write_value(v, true)
}

#[test]
fn typeof_reports_every_variant() {
    let mut ctx = context();
    let cases = [
        ("(typeof nil)", "nil"),
        ("(typeof true)", "boolean"),
        ("(typeof 1)", "number"),
        ("(typeof 1.5)", "number"),
        ("(typeof \"s\")", "string"),
        ("(typeof (quote sym))", "symbol"),
        ("(typeof (cons 1 2))", "pair"),
        ("(typeof (fn () 1))", "function"),
        ("(typeof (mac () 1))", "macro"),
        ("(typeof car)", "primitive"),
        ("(typeof typeof)", "native"),
    ];
    for (src, expected) in cases {
        let v = eval(&mut ctx, src);
        assert_eq!(ctx.string_value(v).unwrap(), expected, "case {src}");
    }
}

#[test]
fn higher_order_ops_compose_with_the_evaluator() {
    let mut ctx = context();
    assert_eq!(
        shown(&mut ctx, "(fold + 0 (filter (fn (x) (< x 5)) (map (fn (x) (* x x)) (list 1 2 3))))"),
        "5"
    );
}

#[test]
fn println_prints_like_print() {
    let mut ctx = context();
    let out: Rc<RefCell<String>> = Rc::new(RefCell::new(String::new()));
    let sink = out.clone();
    ctx.set_output(Box::new(move |s| sink.borrow_mut().push_str(s)));
    eval(&mut ctx, "(println 3.14159)");
    eval(&mut ctx, "(println 1 \"two\" 3)");
    assert_eq!(&*out.borrow(), "3.14159\n1 two 3\n");
}

#[test]
fn file_round_trip() {
    let mut ctx = context();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("note.txt");
    let path_str = path.to_str().unwrap();

    let program = format!("(writefile \"{path_str}\" \"hello from fennec\")");
    eval(&mut ctx, &program);
    let program = format!("(readfile \"{path_str}\")");
    let v = eval(&mut ctx, &program);
    assert_eq!(ctx.string_value(v).unwrap(), "hello from fennec");

    let missing = format!("(readfile \"{path_str}.does-not-exist\")");
    let expr = ctx.read_str(&missing).unwrap().unwrap();
    assert!(matches!(ctx.eval(expr), Err(CoreError::Domain(_))));
}

#[test]
fn time_moves_forward() {
    let mut ctx = context();
    let time_v = eval(&mut ctx, "(time)");
    let t = ctx.to_number(time_v).unwrap();
    assert!(t > 1.0e9, "unix time should be far from the epoch, got {t}");
    let clock_v1 = eval(&mut ctx, "(clock)");
    let c1 = ctx.to_number(clock_v1).unwrap();
    let clock_v2 = eval(&mut ctx, "(clock)");
    let c2 = ctx.to_number(clock_v2).unwrap();
    assert!(c2 >= c1);
    let v = eval(&mut ctx, "(datetime)");
    let text = ctx.string_value(v).unwrap();
    assert!(text.len() >= 19, "datetime should be formatted, got {text}");
}

#[test]
fn getenv_reads_the_environment() {
    let mut ctx = context();
    // SAFETY: tests in this binary run on independent contexts; the
    // variable is process-local and uniquely named.
    unsafe { std::env::set_var("FENNEC_TEST_VAR", "marten") };
    let v = eval(&mut ctx, "(getenv \"FENNEC_TEST_VAR\")");
    assert_eq!(ctx.string_value(v).unwrap(), "marten");
    assert_eq!(eval(&mut ctx, "(getenv \"FENNEC_TEST_MISSING\")"), Value::Nil);
}
