//! Process natives

use std::rc::Rc;

use fennec_core::{Context, CoreResult, Value};

/// Register the process natives.
pub fn install(ctx: &mut Context) -> CoreResult<()> {
    ctx.register(
        "getenv",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let name = ctx.next_arg(&mut args)?;
            let name = ctx.string_value(name)?.to_owned();
            match std::env::var(&name) {
                Ok(value) => ctx.string(&value),
                Err(_) => Ok(Value::Nil),
            }
        }),
    )?;
    ctx.register(
        "exit",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let code = match ctx.next_arg(&mut args) {
                Ok(v) => ctx.to_number(v)? as i32,
                Err(_) => 0,
            };
            std::process::exit(code);
        }),
    )?;
    Ok(())
}
