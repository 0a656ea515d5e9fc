//! List natives, including the higher-order operations
//!
//! `map`, `filter` and `fold` call back into the evaluator through
//! `Context::apply`, so any callable works: closures, operator
//! primitives, or other natives. The growing result list is collapsed
//! onto the root stack element by element, keeping peak root usage
//! constant regardless of input length.

use std::rc::Rc;

use fennec_core::{Context, CoreResult, Value};

/// Register the list natives.
pub fn install(ctx: &mut Context) -> CoreResult<()> {
    ctx.register(
        "nth",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let list = ctx.next_arg(&mut args)?;
            let index = ctx.next_arg(&mut args)?;
            let mut index = ctx.to_number(index)? as i64;
            let mut node = list;
            loop {
                let Some((car, cdr)) = split(ctx, node) else {
                    return Ok(Value::Nil);
                };
                if index <= 0 {
                    return Ok(car);
                }
                index -= 1;
                node = cdr;
            }
        }),
    )?;
    ctx.register(
        "reverse",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let list = ctx.next_arg(&mut args)?;
            let saved = ctx.save_gc();
            let mut out = Value::Nil;
            let mut node = list;
            while let Some((car, cdr)) = split(ctx, node) {
                out = ctx.cons(car, out)?;
                node = cdr;
                ctx.restore_gc(saved);
                ctx.push_gc(out)?;
            }
            Ok(out)
        }),
    )?;
    ctx.register(
        "append",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let first = ctx.next_arg(&mut args)?;
            let second = ctx.next_arg(&mut args)?;
            let saved = ctx.save_gc();
            let mut head = Value::Nil;
            let mut tail = Value::Nil;
            let mut node = first;
            while let Some((car, cdr)) = split(ctx, node) {
                let cell = ctx.cons(car, Value::Nil)?;
                if tail.is_nil() {
                    head = cell;
                } else {
                    ctx.set_cdr(tail, cell)?;
                }
                tail = cell;
                node = cdr;
                ctx.restore_gc(saved);
                ctx.push_gc(head)?;
            }
            if tail.is_nil() {
                return Ok(second);
            }
            ctx.set_cdr(tail, second)?;
            Ok(head)
        }),
    )?;
    ctx.register(
        "map",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let f = ctx.next_arg(&mut args)?;
            let list = ctx.next_arg(&mut args)?;
            let saved = ctx.save_gc();
            let mut head = Value::Nil;
            let mut tail = Value::Nil;
            let mut node = list;
            while let Some((car, cdr)) = split(ctx, node) {
                let mapped = ctx.apply(f, &[car])?;
                let cell = ctx.cons(mapped, Value::Nil)?;
                if tail.is_nil() {
                    head = cell;
                } else {
                    ctx.set_cdr(tail, cell)?;
                }
                tail = cell;
                node = cdr;
                ctx.restore_gc(saved);
                ctx.push_gc(head)?;
            }
            Ok(head)
        }),
    )?;
    ctx.register(
        "filter",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let f = ctx.next_arg(&mut args)?;
            let list = ctx.next_arg(&mut args)?;
            let saved = ctx.save_gc();
            let mut head = Value::Nil;
            let mut tail = Value::Nil;
            let mut node = list;
            while let Some((car, cdr)) = split(ctx, node) {
                let keep = ctx.apply(f, &[car])?;
                if keep.is_truthy() {
                    let cell = ctx.cons(car, Value::Nil)?;
                    if tail.is_nil() {
                        head = cell;
                    } else {
                        ctx.set_cdr(tail, cell)?;
                    }
                    tail = cell;
                }
                node = cdr;
                ctx.restore_gc(saved);
                ctx.push_gc(head)?;
            }
            Ok(head)
        }),
    )?;
    ctx.register(
        "fold",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let f = ctx.next_arg(&mut args)?;
            let mut acc = ctx.next_arg(&mut args)?;
            let list = ctx.next_arg(&mut args)?;
            let saved = ctx.save_gc();
            let mut node = list;
            while let Some((car, cdr)) = split(ctx, node) {
                acc = ctx.apply(f, &[acc, car])?;
                node = cdr;
                ctx.restore_gc(saved);
                ctx.push_gc(acc)?;
            }
            Ok(acc)
        }),
    )?;
    Ok(())
}

fn split(ctx: &Context, node: Value) -> Option<(Value, Value)> {
    if node.is_nil() {
        return None;
    }
    let car = ctx.car(node).ok()?;
    let cdr = ctx.cdr(node).ok()?;
    Some((car, cdr))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_shown(ctx: &mut Context, src: &str) -> String {
        let expr = ctx.read_str(src).unwrap().unwrap();
        let v = ctx.eval(expr).unwrap();
        ctx.write_value(v, true)
    }

    #[test]
    fn structural_helpers() {
        let mut ctx = Context::new();
        install(&mut ctx).unwrap();
        assert_eq!(eval_shown(&mut ctx, "(nth (list 10 20 30) 1)"), "20");
        assert_eq!(eval_shown(&mut ctx, "(nth (list 10) 5)"), "nil");
        assert_eq!(eval_shown(&mut ctx, "(reverse (list 1 2 3))"), "(3 2 1)");
        assert_eq!(
            eval_shown(&mut ctx, "(append (list 1 2) (list 3 4))"),
            "(1 2 3 4)"
        );
        assert_eq!(eval_shown(&mut ctx, "(append nil (list 1))"), "(1)");
    }

    #[test]
    fn higher_order_operations() {
        let mut ctx = Context::new();
        install(&mut ctx).unwrap();
        assert_eq!(
            eval_shown(&mut ctx, "(map (fn (x) (* x x)) (list 1 2 3))"),
            "(1 4 9)"
        );
        assert_eq!(
            eval_shown(&mut ctx, "(filter (fn (x) (< 1 x)) (list 1 2 3))"),
            "(2 3)"
        );
        assert_eq!(eval_shown(&mut ctx, "(fold + 0 (list 1 2 3 4))"), "10");
        // Operator primitives work as callables too.
        assert_eq!(eval_shown(&mut ctx, "(map - (list 1 2))"), "(-1 -2)");
    }

    #[test]
    fn map_survives_gc_pressure() {
        let mut ctx = Context::new();
        install(&mut ctx).unwrap();
        let expr = ctx
            .read_str(
                "(do (let build (fn (n acc) (if (< n 1) acc (build (- n 1) (cons n acc))))) \
                     (fold + 0 (map (fn (x) (* x 2)) (build 100 nil))))",
            )
            .unwrap()
            .unwrap();
        let v = ctx.eval(expr).unwrap();
        assert_eq!(ctx.write_value(v, true), "10100");
    }
}
