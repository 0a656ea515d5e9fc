//! Runtime error reporting with call-list traces.

use fennec_compiler::SpanTable;
use fennec_core::{Context, CoreError};

/// Print `error: <message>` and one `=> <expr>` line per call-list frame,
/// innermost first. When a span table is available, frames gain a
/// `<source>:<line>:<col>` suffix and an echo of the offending source
/// line.
pub fn runtime_error(
    ctx: &Context,
    err: &CoreError,
    spans: Option<&SpanTable>,
    source: &str,
    name: &str,
) {
    eprintln!("error: {err}");
    for &frame in ctx.backtrace() {
        let rendered = ctx.write_value(frame, true);
        match spans.and_then(|table| table.get(frame)) {
            Some(span) => {
                eprintln!("=> {rendered} ({name}:{}:{})", span.line, span.col);
                if let Some(text) = source.lines().nth(span.line as usize - 1) {
                    eprintln!("   | {text}");
                }
            }
            None => eprintln!("=> {rendered}"),
        }
    }
}
