//! Interactive read-compile-eval-print loop.

use std::io::{BufRead, Write};
use std::process::ExitCode;

use fennec_core::Context;

use crate::report;

/// Run the REPL until end of input. Each line is compiled with the modern
/// syntax, evaluated, and echoed in read-back form. Errors leave the
/// context usable.
pub fn run(ctx: &mut Context, spans: bool) -> ExitCode {
    println!("fennec {} - type an expression, ctrl-d to exit", env!("CARGO_PKG_VERSION"));
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let Some(Ok(line)) = lines.next() else {
            println!();
            return ExitCode::SUCCESS;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let saved = ctx.save_gc();
        let compiled = if spans {
            fennec_compiler::compile_with_spans(ctx, line).map(|(v, t)| (v, Some(t)))
        } else {
            fennec_compiler::compile(ctx, line).map(|v| (v, None))
        };
        match compiled {
            Ok((program, span_table)) => match ctx.eval(program) {
                Ok(value) => println!("{}", ctx.write_value(value, true)),
                Err(e) => report::runtime_error(ctx, &e, span_table.as_ref(), line, "<repl>"),
            },
            Err(e) => eprintln!("error: {e}"),
        }
        ctx.restore_gc(saved);
    }
}
