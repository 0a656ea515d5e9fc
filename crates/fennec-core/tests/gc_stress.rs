//! GC survival under allocation pressure.

use fennec_core::{Context, ContextConfig, Value};

/// Repeatedly allocate discardable pairs while cons-ing survivors onto a
/// rooted list. After N iterations the survivor list must hold exactly N
/// elements whose payloads are the iteration indices in reverse order,
/// and a 1 MiB arena must complete the run without running out of memory.
#[test]
fn survivors_outlive_five_thousand_iterations() {
    const N: i64 = 5000;
    let mut ctx = Context::with_config(ContextConfig {
        arena_size: 1024 * 1024,
        ..ContextConfig::default()
    });

    let program = format!(
        "(do \
           (let survivors nil) \
           (let i 0) \
           (while (< i {N}) \
             (do (let junk (cons i (cons i nil))) nil) \
             (= survivors (cons i survivors)) \
             (= i (+ i 1))) \
           survivors)"
    );
    let saved = ctx.save_gc();
    let expr = ctx.read_str(&program).unwrap().unwrap();
    let survivors = ctx.eval(expr).unwrap();

    let mut node = survivors;
    let mut expected = N - 1;
    let mut count = 0;
    while !node.is_nil() {
        assert_eq!(ctx.car(node).unwrap(), Value::Fixnum(expected));
        expected -= 1;
        count += 1;
        node = ctx.cdr(node).unwrap();
    }
    assert_eq!(count, N);
    assert_eq!(expected, -1);

    let stats = ctx.gc_stats();
    assert!(stats.collections > 0, "the run must have collected at least once");
    ctx.restore_gc(saved);
}

/// Collections triggered mid-construction must not reclaim cells that are
/// only reachable through the root stack.
#[test]
fn root_stack_protects_construction() {
    let mut ctx = Context::with_config(ContextConfig {
        arena_size: 256 * 1024,
        root_capacity: 4096,
        ..ContextConfig::default()
    });
    let saved = ctx.save_gc();

    // Build a long list one cons at a time, collapsing the root stack to
    // just the list head, while churning garbage in between.
    let mut head = Value::Nil;
    for i in 0..2000 {
        head = ctx.cons(Value::Fixnum(i), head).unwrap();
        ctx.restore_gc(saved);
        ctx.push_gc(head).unwrap();
        let junk_mark = ctx.save_gc();
        ctx.cons(Value::Fixnum(-1), Value::Nil).unwrap();
        ctx.restore_gc(junk_mark);
    }
    ctx.collect();

    let mut node = head;
    let mut expected = 1999;
    while !node.is_nil() {
        assert_eq!(ctx.car(node).unwrap(), Value::Fixnum(expected));
        expected -= 1;
        node = ctx.cdr(node).unwrap();
    }
    assert_eq!(expected, -1);
    ctx.restore_gc(saved);
}

/// String buffers are released when their cells die; survivors keep their
/// contents bit-identical across collections.
#[test]
fn strings_survive_collections_intact() {
    let mut ctx = Context::with_config(ContextConfig {
        arena_size: 64 * 1024,
        ..ContextConfig::default()
    });
    let saved = ctx.save_gc();
    let keeper = ctx.string("the quick brown fox").unwrap();
    ctx.restore_gc(saved);
    ctx.push_gc(keeper).unwrap();

    for i in 0..5000 {
        let mark = ctx.save_gc();
        ctx.string(&format!("garbage {i}")).unwrap();
        ctx.restore_gc(mark);
    }
    ctx.collect();
    assert_eq!(ctx.string_value(keeper).unwrap(), "the quick brown fox");
    ctx.restore_gc(saved);
}
