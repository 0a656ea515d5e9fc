//! Seedable PRNG natives
//!
//! An xorshift64* generator whose state is shared by `random`, `randint`
//! and `srand`. The state is seeded from the operating system at install
//! and can be reset deterministically with `srand`.

use std::cell::Cell;
use std::rc::Rc;

use fennec_core::{Context, CoreError, CoreResult, Value};

fn next(state: &Cell<u64>) -> u64 {
    let mut x = state.get();
    x ^= x >> 12;
    x ^= x << 25;
    x ^= x >> 27;
    state.set(x);
    x.wrapping_mul(0x2545_F491_4F6C_DD1D)
}

/// Register the PRNG natives.
pub fn install(ctx: &mut Context) -> CoreResult<()> {
    let mut seed_bytes = [0u8; 8];
    getrandom::getrandom(&mut seed_bytes)
        .map_err(|e| CoreError::domain_error(format!("seeding the PRNG failed: {e}")))?;
    // State must never be zero or xorshift degenerates.
    let state = Rc::new(Cell::new(u64::from_le_bytes(seed_bytes) | 1));

    let rand_state = state.clone();
    ctx.register(
        "random",
        Rc::new(move |ctx: &mut Context, _argv| {
            let bits = next(&rand_state) >> 11;
            ctx.number(bits as f64 / (1u64 << 53) as f64)
        }),
    )?;

    let randint_state = state.clone();
    ctx.register(
        "randint",
        Rc::new(move |ctx: &mut Context, argv| {
            let mut args = argv;
            let lo = ctx.next_arg(&mut args)?;
            let hi = ctx.next_arg(&mut args)?;
            let lo = ctx.to_number(lo)? as i64;
            let hi = ctx.to_number(hi)? as i64;
            if hi < lo {
                return Err(CoreError::domain_error("randint with an empty range"));
            }
            let span = (hi - lo) as u64 + 1;
            let v = lo + (next(&randint_state) % span) as i64;
            Ok(Value::Fixnum(v))
        }),
    )?;

    let srand_state = state;
    ctx.register(
        "srand",
        Rc::new(move |ctx: &mut Context, argv| {
            let mut args = argv;
            let seed = ctx.next_arg(&mut args)?;
            let seed = ctx.to_number(seed)? as u64;
            srand_state.set(seed | 1);
            Ok(Value::Nil)
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

    #[test]
    fn srand_makes_the_sequence_deterministic() {
        let mut ctx = Context::new();
        install(&mut ctx).unwrap();
        eval(&mut ctx, "(srand 42)");
        let a_v = eval(&mut ctx, "(random)");
        let a = ctx.to_number(a_v).unwrap();
        let b_v = eval(&mut ctx, "(random)");
        let b = ctx.to_number(b_v).unwrap();
        eval(&mut ctx, "(srand 42)");
        let a2_v = eval(&mut ctx, "(random)");
        let a2 = ctx.to_number(a2_v).unwrap();
        let b2_v = eval(&mut ctx, "(random)");
        let b2 = ctx.to_number(b2_v).unwrap();
        assert_eq!(a, a2);
        assert_eq!(b, b2);
        assert_ne!(a, b);
    }

    #[test]
    fn random_is_in_unit_interval() {
        let mut ctx = Context::new();
        install(&mut ctx).unwrap();
        for _ in 0..100 {
            let v = eval(&mut ctx, "(random)");
            let n = ctx.to_number(v).unwrap();
            assert!((0.0..1.0).contains(&n));
        }
    }

    #[test]
    fn randint_stays_in_bounds() {
        let mut ctx = Context::new();
        install(&mut ctx).unwrap();
        for _ in 0..100 {
            let v = eval(&mut ctx, "(randint 1 6)");
            let Value::Fixnum(n) = v else { panic!("expected fixnum") };
            assert!((1..=6).contains(&n));
        }
        let bad = ctx.read_str("(randint 6 1)").unwrap().unwrap();
        assert!(matches!(ctx.eval(bad), Err(CoreError::Domain(_))));
    }
}
