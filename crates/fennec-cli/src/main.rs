//! Fennec CLI - script runner and REPL.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::filter::EnvFilter;

use fennec_core::{Context, ContextConfig};

mod repl;
mod report;

/// Exit codes, following the BSD sysexits convention.
const EXIT_USAGE: u8 = 64;
const EXIT_COMPILE: u8 = 65;
const EXIT_RUNTIME: u8 = 70;
const EXIT_IO: u8 = 74;

#[derive(Parser)]
#[command(
    name = "fennec",
    version,
    about = "The Fennec scripting language",
    long_about = "Fennec is a small embeddable scripting language.\n\n\
                  Run a script:   fennec script.fnc\n\
                  Eval a string:  fennec -e 'println(1 + 1);'\n\
                  Start a REPL:   fennec"
)]
struct Cli {
    /// Script to run; with no script, an interactive REPL starts
    script: Option<PathBuf>,

    /// Evaluate the argument as a program
    #[arg(short = 'e', long = "eval", value_name = "CODE")]
    eval: Option<String>,

    /// Record source spans and annotate error traces with them
    #[arg(long)]
    spans: bool,

    /// Arena size in bytes
    #[arg(long, value_name = "BYTES")]
    arena_size: Option<usize>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut config = ContextConfig::default();
    if let Some(bytes) = cli.arena_size {
        config.arena_size = bytes;
    }
    // Deeply recursive scripts hold more temporaries than the embedding
    // default allows for.
    config.root_capacity = 4096;

    let arena_bytes = config.arena_size;
    let mut ctx = Context::with_config(config);
    tracing::debug!(arena_bytes, "context ready");
    if let Err(e) = fennec_runtime::install(&mut ctx) {
        eprintln!("error: {e}");
        return ExitCode::from(EXIT_RUNTIME);
    }

    if let Some(code) = cli.eval {
        return execute(&mut ctx, &code, "<eval>", cli.spans);
    }

    if let Some(path) = cli.script {
        let source = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: cannot read {}: {e}", path.display());
                return ExitCode::from(EXIT_IO);
            }
        };
        let name = path.display().to_string();
        return execute(&mut ctx, &source, &name, cli.spans);
    }

    repl::run(&mut ctx, cli.spans)
}

/// Compile and evaluate one source unit, mapping failures to sysexits
/// codes.
fn execute(ctx: &mut Context, source: &str, name: &str, spans: bool) -> ExitCode {
    let compiled = if spans {
        fennec_compiler::compile_with_spans(ctx, source).map(|(v, t)| (v, Some(t)))
    } else {
        fennec_compiler::compile(ctx, source).map(|v| (v, None))
    };
    let (program, span_table) = match compiled {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_COMPILE);
        }
    };
    match ctx.eval(program) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            report::runtime_error(ctx, &e, span_table.as_ref(), source, name);
            ExitCode::from(EXIT_RUNTIME)
        }
    }
}
