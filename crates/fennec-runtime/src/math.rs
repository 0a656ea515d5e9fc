//! Numeric natives

use std::rc::Rc;

use fennec_core::{Context, CoreError, CoreResult, Value};

fn number_arg(ctx: &mut Context, args: &mut Value) -> CoreResult<f64> {
    let v = ctx.next_arg(args)?;
    ctx.to_number(v)
}

/// Register the math natives.
pub fn install(ctx: &mut Context) -> CoreResult<()> {
    ctx.register(
        "abs",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let n = number_arg(ctx, &mut args)?;
            ctx.number(n.abs())
        }),
    )?;
    ctx.register(
        "floor",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let n = number_arg(ctx, &mut args)?;
            ctx.number(n.floor())
        }),
    )?;
    ctx.register(
        "ceil",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let n = number_arg(ctx, &mut args)?;
            ctx.number(n.ceil())
        }),
    )?;
    ctx.register(
        "round",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let n = number_arg(ctx, &mut args)?;
            ctx.number(n.round())
        }),
    )?;
    ctx.register(
        "sqrt",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let n = number_arg(ctx, &mut args)?;
            if n < 0.0 {
                return Err(CoreError::domain_error("sqrt of a negative number"));
            }
            ctx.number(n.sqrt())
        }),
    )?;
    ctx.register(
        "pow",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let base = number_arg(ctx, &mut args)?;
            let exp = number_arg(ctx, &mut args)?;
            ctx.number(base.powf(exp))
        }),
    )?;
    ctx.register(
        "exp",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let n = number_arg(ctx, &mut args)?;
            ctx.number(n.exp())
        }),
    )?;
    ctx.register(
        "log",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let n = number_arg(ctx, &mut args)?;
            if n <= 0.0 {
                return Err(CoreError::domain_error("log of a non-positive number"));
            }
            ctx.number(n.ln())
        }),
    )?;
    ctx.register(
        "sin",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let n = number_arg(ctx, &mut args)?;
            ctx.number(n.sin())
        }),
    )?;
    ctx.register(
        "cos",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let n = number_arg(ctx, &mut args)?;
            ctx.number(n.cos())
        }),
    )?;
    ctx.register(
        "mod",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let a = number_arg(ctx, &mut args)?;
            let b = number_arg(ctx, &mut args)?;
            if b == 0.0 {
                return Err(CoreError::domain_error("mod by zero"));
            }
            ctx.number(a % b)
        }),
    )?;
    ctx.register(
        "min",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let mut best = number_arg(ctx, &mut args)?;
            while let Ok(v) = ctx.next_arg(&mut args) {
                best = best.min(ctx.to_number(v)?);
            }
            ctx.number(best)
        }),
    )?;
    ctx.register(
        "max",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let mut best = number_arg(ctx, &mut args)?;
            while let Ok(v) = ctx.next_arg(&mut args) {
                best = best.max(ctx.to_number(v)?);
            }
            ctx.number(best)
        }),
    )?;
    Ok(())
}
