//! # Fennec extended library
//!
//! Host-registered native functions layered on the core: math, strings,
//! list higher-order operations, type introspection, simple file I/O,
//! time, process access and a seedable PRNG. None of these change core
//! semantics; everything goes through the public embedding API.

#![warn(clippy::all)]

pub mod io;
pub mod list;
pub mod math;
pub mod process;
pub mod random;
pub mod text;
pub mod time;

use std::rc::Rc;

use fennec_core::{Context, CoreResult};

/// Register the whole library on a context.
pub fn install(ctx: &mut Context) -> CoreResult<()> {
    math::install(ctx)?;
    text::install(ctx)?;
    list::install(ctx)?;
    io::install(ctx)?;
    time::install(ctx)?;
    process::install(ctx)?;
    random::install(ctx)?;

    ctx.register(
        "typeof",
        Rc::new(|ctx: &mut Context, argv| {
            let mut args = argv;
            let v = ctx.next_arg(&mut args)?;
            let name = ctx.type_of(v).name();
            ctx.string(name)
        }),
    )?;
    Ok(())
}
