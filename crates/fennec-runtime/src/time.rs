//! Time natives

use std::rc::Rc;
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use chrono::Local;
use fennec_core::{Context, CoreResult};

/// Monotonic origin shared by every `clock` call in the process.
fn clock_origin() -> Instant {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    *ORIGIN.get_or_init(Instant::now)
}

/// Register the time natives.
pub fn install(ctx: &mut Context) -> CoreResult<()> {
    // Anchor the monotonic clock at install time.
    let _ = clock_origin();

    ctx.register(
        "time",
        Rc::new(|ctx: &mut Context, _argv| {
            let secs = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            ctx.number(secs)
        }),
    )?;
    ctx.register(
        "clock",
        Rc::new(|ctx: &mut Context, _argv| {
            ctx.number(clock_origin().elapsed().as_secs_f64())
        }),
    )?;
    ctx.register(
        "datetime",
        Rc::new(|ctx: &mut Context, _argv| {
            let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            ctx.string(&now)
        }),
    )?;
    Ok(())
}
