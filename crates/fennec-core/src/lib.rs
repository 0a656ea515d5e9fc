//! # Fennec core runtime
//!
//! The embeddable core of the Fennec scripting language: a homoiconic
//! pair/atom object model on a fixed-size arena with a mark-sweep garbage
//! collector, an S-expression reader, and a tree-walking evaluator with
//! lexical closures, macros and modules.
//!
//! ## Design
//!
//! - **Arena**: one pre-sized pool of uniform cells and a freelist; cells
//!   never move, so index handles stay valid for the context's lifetime
//! - **GC**: mark-sweep driven by an adaptive threshold, with an explicit
//!   root stack (`save_gc`/`push_gc`/`restore_gc`) protecting temporaries
//! - **Closures**: static free-variable analysis at construction plus
//!   frame-shaped environments; captures alias the defining binding pair
//! - **AST**: plain pairs — the S-expression reader and the curly-brace
//!   compiler front-end produce the same shape
//!
//! A [`Context`] aggregates every piece of interpreter state; hosts run
//! one context per worker and never share one across threads.

#![warn(clippy::all)]

mod analyzer;
mod context;
mod error;
mod gc;
mod heap;
mod reader;
mod value;
mod writer;

mod eval;

pub use context::{Context, ContextConfig, ErrorHandler, NativeFn, OutputSink};
pub use error::{CoreError, CoreResult};
pub use gc::GcStats;
pub use heap::{ForeignFinalize, ForeignMark};
pub use reader::Reader;
pub use value::{CellRef, FIXNUM_MAX, FIXNUM_MIN, Primitive, Type, Value};
