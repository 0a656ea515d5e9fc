//! String natives

use std::rc::Rc;

use fennec_core::{Context, CoreError, CoreResult, Type, Value};

/// Register the string natives.
pub fn install(ctx: &mut Context) -> CoreResult<()> {
    ctx.register(
        "len",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let v = ctx.next_arg(&mut args)?;
            let n = match ctx.type_of(v) {
                Type::String => ctx.string_value(v)?.chars().count() as i64,
                Type::Nil => 0,
                Type::Pair => {
                    let mut count = 0i64;
                    let mut node = v;
                    while ctx.type_of(node) == Type::Pair {
                        count += 1;
                        node = ctx.cdr(node)?;
                    }
                    count
                }
                other => {
                    return Err(CoreError::type_error(format!(
                        "len expects a string or list, got {}",
                        other.name()
                    )));
                }
            };
            Ok(Value::Fixnum(n))
        }),
    )?;
    ctx.register(
        "substr",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let s = ctx.next_arg(&mut args)?;
            let start = ctx.next_arg(&mut args)?;
            let count = ctx.next_arg(&mut args)?;
            let start = ctx.to_number(start)?.max(0.0) as usize;
            let count = ctx.to_number(count)?.max(0.0) as usize;
            let text: String = ctx
                .string_value(s)?
                .chars()
                .skip(start)
                .take(count)
                .collect();
            ctx.string(&text)
        }),
    )?;
    ctx.register(
        "concat",
        Rc::new(|ctx: &mut Context, argv| {
            let mut out = String::new();
            let mut args = argv;
            while let Ok(v) = ctx.next_arg(&mut args) {
                out.push_str(&ctx.write_value(v, false));
            }
            ctx.string(&out)
        }),
    )?;
    ctx.register(
        "upper",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let v = ctx.next_arg(&mut args)?;
            let text = ctx.string_value(v)?.to_ascii_uppercase();
            ctx.string(&text)
        }),
    )?;
    ctx.register(
        "lower",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let v = ctx.next_arg(&mut args)?;
            let text = ctx.string_value(v)?.to_ascii_lowercase();
            ctx.string(&text)
        }),
    )?;
    ctx.register(
        "chr",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let v = ctx.next_arg(&mut args)?;
            let code = ctx.to_number(v)? as u32;
            let c = char::from_u32(code)
                .ok_or_else(|| CoreError::domain_error("chr of an invalid code point"))?;
            ctx.string(&c.to_string())
        }),
    )?;
    ctx.register(
        "ord",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let v = ctx.next_arg(&mut args)?;
            let c = ctx
                .string_value(v)?
                .chars()
                .next()
                .ok_or_else(|| CoreError::domain_error("ord of an empty string"))?;
            Ok(Value::Fixnum(c as i64))
        }),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(ctx: &mut Context, src: &str) -> Value {
        let expr = ctx.read_str(src).unwrap().unwrap();
        ctx.eval(expr).unwrap()
    }

    fn eval_str(ctx: &mut Context, src: &str) -> String {
        let v = eval(ctx, src);
        ctx.string_value(v).unwrap().to_string()
    }

    #[test]
    fn string_basics() {
        let mut ctx = Context::new();
        install(&mut ctx).unwrap();
        assert_eq!(eval(&mut ctx, "(len \"abc\")"), Value::Fixnum(3));
        assert_eq!(eval(&mut ctx, "(len nil)"), Value::Fixnum(0));
        assert_eq!(eval(&mut ctx, "(len (list 1 2 3))"), Value::Fixnum(3));
        assert_eq!(eval_str(&mut ctx, "(substr \"hello\" 1 3)"), "ell");
        assert_eq!(eval_str(&mut ctx, "(substr \"hi\" 0 10)"), "hi");
        assert_eq!(eval_str(&mut ctx, "(concat \"a\" 1 \"b\")"), "a1b");
        assert_eq!(eval_str(&mut ctx, "(upper \"abC\")"), "ABC");
        assert_eq!(eval_str(&mut ctx, "(lower \"AbC\")"), "abc");
        assert_eq!(eval(&mut ctx, "(ord \"A\")"), Value::Fixnum(65));
        assert_eq!(eval_str(&mut ctx, "(chr 66)"), "B");
    }

    #[test]
    fn ord_of_empty_fails() {
        let mut ctx = Context::new();
        install(&mut ctx).unwrap();
        let expr = ctx.read_str("(ord \"\")").unwrap().unwrap();
        assert!(matches!(ctx.eval(expr), Err(CoreError::Domain(_))));
    }
}
