//! Free-variable analysis
//!
//! Pre-pass run when a closure is constructed: walks the body and collects
//! the symbols referenced but not bound within it. The resulting list is
//! stored on the closure and consulted at every call to materialize
//! upvalues from the definition environment.
//!
//! `quote` is opaque. A `do` sequence threads the names introduced by its
//! `(let name expr)` statements into the bound set for later statements.
//! Nested `fn`/`mac` bodies are analyzed with their own parameters and
//! their free variables re-checked against the enclosing bound set, so
//! names bound further out keep propagating. Special forms are recognized
//! by the head symbol's global slot holding the corresponding primitive.

use crate::context::Context;
use crate::heap::CellData;
use crate::value::{CellRef, Primitive, Value};

/// Collect the free variables of `body` (a list of forms) given the
/// parameter list `params` as the initial bound set.
pub(crate) fn free_vars(ctx: &Context, body: Value, params: Value) -> Vec<CellRef> {
    let mut bound = Vec::new();
    collect_params(ctx, params, &mut bound);
    let mut free = Vec::new();
    analyze_seq(ctx, body, &mut bound, &mut free);
    free
}

/// Parameters form a proper list, or a dotted list whose tail is a rest
/// parameter.
fn collect_params(ctx: &Context, mut params: Value, bound: &mut Vec<CellRef>) {
    loop {
        match params {
            Value::Cell(r) => match &ctx.slot(r).data {
                CellData::Pair { car, cdr } => {
                    if let Value::Cell(s) = *car {
                        if ctx.is_symbol(*car) {
                            bound.push(s);
                        }
                    }
                    params = *cdr;
                }
                CellData::Sym(_) => {
                    bound.push(r);
                    return;
                }
                _ => return,
            },
            _ => return,
        }
    }
}

/// Analyze a body sequence with `do` threading: a `(let name expr)`
/// statement makes `name` bound for every later statement.
fn analyze_seq(ctx: &Context, mut body: Value, bound: &mut Vec<CellRef>, free: &mut Vec<CellRef>) {
    while let Some((form, rest)) = ctx.pair_parts(body) {
        if let Some((Primitive::Let, args)) = special_form(ctx, form) {
            let name = ctx.car(args).unwrap_or(Value::Nil);
            let init = ctx.cdr(args).and_then(|r| ctx.car(r)).unwrap_or(Value::Nil);
            analyze(ctx, init, bound, free);
            if let Value::Cell(s) = name {
                if ctx.is_symbol(name) && !bound.contains(&s) {
                    bound.push(s);
                }
            }
        } else {
            analyze(ctx, form, bound, free);
        }
        body = rest;
    }
}

fn analyze(ctx: &Context, expr: Value, bound: &mut Vec<CellRef>, free: &mut Vec<CellRef>) {
    let Value::Cell(r) = expr else { return };
    match &ctx.slot(r).data {
        CellData::Sym(_) => {
            if !bound.contains(&r) && !free.contains(&r) {
                free.push(r);
            }
        }
        CellData::Pair { .. } => {
            if let Some((prim, args)) = special_form(ctx, expr) {
                match prim {
                    Primitive::Quote => return,
                    Primitive::Do => {
                        // The do gets its own bound-set extension; names
                        // introduced inside do not leak past it.
                        let depth = bound.len();
                        analyze_seq(ctx, args, bound, free);
                        bound.truncate(depth);
                        return;
                    }
                    Primitive::Fn | Primitive::Mac => {
                        let params = ctx.car(args).unwrap_or(Value::Nil);
                        let body = ctx.cdr(args).unwrap_or(Value::Nil);
                        for inner in free_vars(ctx, body, params) {
                            if !bound.contains(&inner) && !free.contains(&inner) {
                                free.push(inner);
                            }
                        }
                        return;
                    }
                    _ => {}
                }
            }
            // Any other pair: analyze the operator and each argument,
            // treating a dotted tail as a value.
            let mut node = expr;
            while let Some((car, cdr)) = ctx.pair_parts(node) {
                analyze(ctx, car, bound, free);
                node = cdr;
            }
            analyze(ctx, node, bound, free);
        }
        _ => {}
    }
}

/// Recognize a special-form application: the head is a primitive cell, or
/// a symbol whose global slot holds one.
fn special_form(ctx: &Context, form: Value) -> Option<(Primitive, Value)> {
    let (head, args) = ctx.pair_parts(form)?;
    let resolved = match head {
        Value::Cell(r) => match &ctx.slot(r).data {
            CellData::Prim(p) => Some(*p),
            CellData::Sym(s) => {
                if let Value::Cell(g) = s.global {
                    if let CellData::Prim(p) = &ctx.slot(g).data {
                        Some(*p)
                    } else {
                        None
                    }
                } else {
                    None
                }
            }
            _ => None,
        },
        _ => None,
    };
    resolved.map(|p| (p, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(ctx: &Context, vars: &[CellRef]) -> Vec<String> {
        vars.iter()
            .filter_map(|&r| ctx.symbol_name(Value::Cell(r)).map(str::to_owned))
            .collect()
    }

    fn analyze_fn(ctx: &mut Context, src: &str) -> Vec<String> {
        // src is a (fn (params) body...) form
        let form = ctx.read_str(src).unwrap().unwrap();
        let args = ctx.cdr(form).unwrap();
        let params = ctx.car(args).unwrap();
        let body = ctx.cdr(args).unwrap();
        let vars = free_vars(ctx, body, params);
        names(ctx, &vars)
    }

    #[test]
    fn params_are_bound() {
        let mut ctx = Context::new();
        let free = analyze_fn(&mut ctx, "(fn (x y) (cons x y))");
        assert!(!free.contains(&"x".to_string()));
        assert!(!free.contains(&"y".to_string()));
        assert!(free.contains(&"cons".to_string()));
    }

    #[test]
    fn quote_is_opaque() {
        let mut ctx = Context::new();
        let free = analyze_fn(&mut ctx, "(fn () (quote (a b c)))");
        assert!(free.is_empty());
    }

    #[test]
    fn do_threads_let_bindings() {
        let mut ctx = Context::new();
        let free = analyze_fn(&mut ctx, "(fn () (do (let a 1) (+ a b)))");
        assert!(!free.contains(&"a".to_string()));
        assert!(free.contains(&"b".to_string()));
    }

    #[test]
    fn captured_variable_is_free_in_nested_fn() {
        let mut ctx = Context::new();
        let free = analyze_fn(&mut ctx, "(fn (c) (fn () (= c (+ c 1))))");
        assert!(!free.contains(&"c".to_string()));
        let free_inner = analyze_fn(&mut ctx, "(fn () (= c (+ c 1)))");
        assert!(free_inner.contains(&"c".to_string()));
    }

    #[test]
    fn dotted_tail_is_analyzed_as_value() {
        let mut ctx = Context::new();
        let free = analyze_fn(&mut ctx, "(fn () (f a . b))");
        assert!(free.contains(&"b".to_string()));
    }

    #[test]
    fn rest_parameter_is_bound() {
        let mut ctx = Context::new();
        let free = analyze_fn(&mut ctx, "(fn (a . rest) (cons a rest))");
        assert!(!free.contains(&"rest".to_string()));
    }
}
