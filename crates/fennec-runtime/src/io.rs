//! File I/O and printing natives
//!
//! `println` writes through the context's output sink exactly like the
//! core `print` primitive. File failures surface as domain errors
//! carrying the OS error text.

use std::fs;
use std::rc::Rc;

use fennec_core::{Context, CoreError, CoreResult, Value};

/// Register the I/O natives.
pub fn install(ctx: &mut Context) -> CoreResult<()> {
    ctx.register(
        "println",
        Rc::new(|ctx: &mut Context, argv| {
            let mut line = String::new();
            let mut args = argv;
            let mut first = true;
            while let Ok(v) = ctx.next_arg(&mut args) {
                if !first {
                    line.push(' ');
                }
                first = false;
                line.push_str(&ctx.write_value(v, false));
            }
            line.push('\n');
            ctx.write_out(&line);
            Ok(Value::Nil)
        }),
    )?;
    ctx.register(
        "readfile",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let path = ctx.next_arg(&mut args)?;
            let path = ctx.string_value(path)?.to_owned();
            let contents = fs::read_to_string(&path)
                .map_err(|e| CoreError::domain_error(format!("readfile {path}: {e}")))?;
            ctx.string(&contents)
        }),
    )?;
    ctx.register(
        "writefile",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let path = ctx.next_arg(&mut args)?;
            let contents = ctx.next_arg(&mut args)?;
            let path = ctx.string_value(path)?.to_owned();
            let contents = ctx.string_value(contents)?.to_owned();
            fs::write(&path, contents)
                .map_err(|e| CoreError::domain_error(format!("writefile {path}: {e}")))?;
            Ok(Value::Nil)
        }),
    )?;
    Ok(())
}
