//! The interpreter context
//!
//! A `Context` owns the arena, freelist, root stack, call list, module
//! stack and symbol table — every piece of interpreter state. Hosts create
//! one context per worker; there is no hidden process-wide state and no
//! locking, because a context is strictly single-threaded.

use std::any::Any;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{CoreError, CoreResult};
use crate::heap::{CellData, Closure, Foreign, ForeignFinalize, ForeignMark, Slot, Symbol};
use crate::value::{CellRef, Primitive, Type, Value, FIXNUM_MAX, FIXNUM_MIN};

/// Host-registered native function. Receives the context and the already
/// evaluated argument list; may call back into `eval`/`apply` on the same
/// context.
pub type NativeFn = Rc<dyn Fn(&mut Context, Value) -> CoreResult<Value>>;

/// Callback observing raised errors before they propagate to the host.
/// Receives the error and the rendered call-list trace, innermost frame
/// first.
pub type ErrorHandler = Box<dyn FnMut(&CoreError, &[String])>;

/// Sink for `print` output. Defaults to stdout.
pub type OutputSink = Box<dyn FnMut(&str)>;

/// Sizing knobs for a context.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Arena size in bytes; the cell count is `arena_size / sizeof(cell)`
    pub arena_size: usize,
    /// Root stack capacity
    pub root_capacity: usize,
    /// Initial GC threshold (allocations between collections)
    pub gc_threshold: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            arena_size: 4 * 1024 * 1024,
            root_capacity: 1024,
            gc_threshold: 1024,
        }
    }
}

/// The interpreter context: arena, GC state, symbol table and host hooks.
pub struct Context {
    pub(crate) slots: Vec<Slot>,
    pub(crate) free_head: Option<CellRef>,

    pub(crate) roots: Vec<Value>,
    root_capacity: usize,

    /// Chain of currently-evaluating call forms, for error traces
    pub(crate) calllist: Vec<Value>,
    /// Export tables of the active `module` bodies
    pub(crate) modules: Vec<Value>,
    /// Snapshot of the call list taken when the last error was raised
    pub(crate) backtrace: Vec<Value>,

    pub(crate) symbols: FxHashMap<Box<str>, CellRef>,
    pub(crate) natives: Vec<NativeFn>,

    /// Reserved cell marking frame-shaped environments
    pub(crate) frame_marker: Value,
    /// Reserved cell tagging in-flight `return` values
    pub(crate) return_marker: Value,

    pub(crate) allocs_since_gc: usize,
    pub(crate) gc_threshold: usize,
    pub(crate) live_count: usize,
    pub(crate) last_swept: usize,
    pub(crate) collections: usize,

    output: Option<OutputSink>,
    handler: Option<ErrorHandler>,
}

impl Context {
    /// Create a context with default sizing.
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    /// Create a context over an arena of the configured size. The region
    /// is formatted once into a freelist of uniform cells; steady-state
    /// operation never calls the general-purpose allocator except for
    /// string byte buffers.
    pub fn with_config(config: ContextConfig) -> Self {
        let cells = (config.arena_size / std::mem::size_of::<Slot>()).max(128);
        let mut slots = Vec::with_capacity(cells);
        for i in 0..cells {
            let next = if i + 1 < cells {
                Some(CellRef(i as u32 + 1))
            } else {
                None
            };
            slots.push(Slot::free(next));
        }

        let mut ctx = Context {
            slots,
            free_head: Some(CellRef(0)),
            roots: Vec::with_capacity(config.root_capacity.max(16)),
            root_capacity: config.root_capacity.max(16),
            calllist: Vec::new(),
            modules: Vec::new(),
            backtrace: Vec::new(),
            symbols: FxHashMap::default(),
            natives: Vec::new(),
            frame_marker: Value::Nil,
            return_marker: Value::Nil,
            allocs_since_gc: 0,
            gc_threshold: config.gc_threshold,
            live_count: 0,
            last_swept: 0,
            collections: 0,
            output: None,
            handler: None,
        };
        ctx.bootstrap();
        ctx
    }

    /// Allocate the reserved marker cells and install the primitives under
    /// their global names. Infallible in practice: a fresh arena of the
    /// minimum size has room for the bootstrap set, and the root stack is
    /// collapsed after every installation.
    fn bootstrap(&mut self) {
        let saved = self.save_gc();
        // The markers become roots through their context fields; they are
        // deliberately not interned, so no program name can reach them.
        self.frame_marker = self
            .alloc(CellData::Sym(Symbol {
                name: Box::from("#frame"),
                global: Value::Nil,
            }))
            .expect("bootstrap allocation");
        self.restore_gc(saved);
        self.return_marker = self
            .alloc(CellData::Sym(Symbol {
                name: Box::from("#return"),
                global: Value::Nil,
            }))
            .expect("bootstrap allocation");
        self.restore_gc(saved);
        for prim in Primitive::ALL {
            let cell = self
                .alloc(CellData::Prim(prim))
                .expect("bootstrap allocation");
            let sym = self.intern(prim.name()).expect("bootstrap allocation");
            self.set_symbol_global(sym, cell);
            self.restore_gc(saved);
        }
    }

    // ------------------------------------------------------------------
    // Arena and root stack
    // ------------------------------------------------------------------

    #[inline]
    pub(crate) fn slot(&self, r: CellRef) -> &Slot {
        &self.slots[r.index()]
    }

    #[inline]
    pub(crate) fn slot_mut(&mut self, r: CellRef) -> &mut Slot {
        &mut self.slots[r.index()]
    }

    /// Pop one cell from the freelist, collecting first when the adaptive
    /// threshold is crossed or the freelist is empty. The new cell is
    /// pushed onto the root stack.
    pub(crate) fn alloc(&mut self, data: CellData) -> CoreResult<Value> {
        if self.allocs_since_gc >= self.gc_threshold || self.free_head.is_none() {
            self.collect();
        }
        let Some(r) = self.free_head else {
            return Err(CoreError::OutOfMemory);
        };
        let next = match &self.slots[r.index()].data {
            CellData::Free { next } => *next,
            _ => unreachable!("freelist entry is not a Free cell"),
        };
        self.free_head = next;
        let slot = &mut self.slots[r.index()];
        slot.marked = false;
        slot.data = data;
        self.allocs_since_gc += 1;
        let v = Value::Cell(r);
        self.push_gc(v)?;
        Ok(v)
    }

    /// Current top of the root stack.
    pub fn save_gc(&self) -> usize {
        self.roots.len()
    }

    /// Protect a value from collection. Immediates are silently ignored.
    pub fn push_gc(&mut self, v: Value) -> CoreResult<()> {
        if let Value::Cell(_) = v {
            if self.roots.len() >= self.root_capacity {
                return Err(CoreError::GcStackOverflow);
            }
            self.roots.push(v);
        }
        Ok(())
    }

    /// Truncate the root stack to a previously saved index. Values pushed
    /// above it become collectible unless reachable elsewhere.
    pub fn restore_gc(&mut self, saved: usize) {
        self.roots.truncate(saved);
    }

    // ------------------------------------------------------------------
    // Value constructors
    // ------------------------------------------------------------------

    /// Allocate a pair.
    pub fn cons(&mut self, car: Value, cdr: Value) -> CoreResult<Value> {
        self.alloc(CellData::Pair { car, cdr })
    }

    /// Allocate an immutable string.
    pub fn string(&mut self, s: &str) -> CoreResult<Value> {
        self.alloc(CellData::Str(Box::from(s)))
    }

    /// Make a number: an immediate fixnum when the value is exactly
    /// integral and in fixnum range, a boxed double otherwise.
    ///
    /// The lower bound is inclusive: `FIXNUM_MIN` (`-2^62`) is exactly
    /// representable as a double. The upper comparison stays strict
    /// because `FIXNUM_MAX` rounds up to `2^62` as a double, one past the
    /// largest fixnum.
    pub fn number(&mut self, n: f64) -> CoreResult<Value> {
        if n.fract() == 0.0 && n >= FIXNUM_MIN as f64 && n < FIXNUM_MAX as f64 {
            Ok(Value::Fixnum(n as i64))
        } else {
            self.alloc(CellData::Num(n))
        }
    }

    /// Make a fixnum immediate.
    pub fn fixnum(n: i64) -> Value {
        Value::Fixnum(n)
    }

    /// Build a proper list from a slice, protecting the partial list while
    /// it grows.
    pub fn list(&mut self, items: &[Value]) -> CoreResult<Value> {
        let saved = self.save_gc();
        let mut head = Value::Nil;
        for &item in items.iter().rev() {
            head = self.cons(item, head)?;
            self.restore_gc(saved);
            self.push_gc(head)?;
        }
        Ok(head)
    }

    /// Allocate a foreign cell carrying opaque host data. The mark hook
    /// reports values the data keeps alive; the finalizer runs when the
    /// cell is swept or the context is closed.
    pub fn foreign(
        &mut self,
        data: Box<dyn Any>,
        mark: Option<ForeignMark>,
        finalize: Option<ForeignFinalize>,
    ) -> CoreResult<Value> {
        self.alloc(CellData::Foreign(Foreign {
            data,
            mark,
            finalize,
        }))
    }

    pub(crate) fn make_closure(&mut self, closure: Closure, is_macro: bool) -> CoreResult<Value> {
        if is_macro {
            self.alloc(CellData::Macro(closure))
        } else {
            self.alloc(CellData::Func(closure))
        }
    }

    /// Intern a symbol, returning the identical cell for every equal name.
    pub fn intern(&mut self, name: &str) -> CoreResult<Value> {
        if let Some(&r) = self.symbols.get(name) {
            return Ok(Value::Cell(r));
        }
        let v = self.alloc(CellData::Sym(Symbol {
            name: Box::from(name),
            global: Value::Nil,
        }))?;
        let Value::Cell(r) = v else { unreachable!() };
        self.symbols.insert(Box::from(name), r);
        Ok(v)
    }

    // ------------------------------------------------------------------
    // Inspectors
    // ------------------------------------------------------------------

    /// Runtime type of a value.
    pub fn type_of(&self, v: Value) -> Type {
        match v {
            Value::Nil => Type::Nil,
            Value::Bool(_) => Type::Bool,
            Value::Fixnum(_) => Type::Number,
            Value::Cell(r) => match &self.slot(r).data {
                CellData::Free { .. } => Type::Free,
                CellData::Pair { .. } => Type::Pair,
                CellData::Str(_) => Type::String,
                CellData::Sym(_) => Type::Symbol,
                CellData::Num(_) => Type::Number,
                CellData::Func(_) => Type::Function,
                CellData::Macro(_) => Type::Macro,
                CellData::Prim(_) => Type::Primitive,
                CellData::Native(_) => Type::Native,
                CellData::Foreign(_) => Type::Foreign,
            },
        }
    }

    /// Pair accessor returning `(car, cdr)`; `None` for non-pairs.
    #[inline]
    pub(crate) fn pair_parts(&self, v: Value) -> Option<(Value, Value)> {
        if let Value::Cell(r) = v {
            if let CellData::Pair { car, cdr } = self.slot(r).data {
                return Some((car, cdr));
            }
        }
        None
    }

    /// `car` with the classical tolerance: the car of `nil` is `nil`.
    pub fn car(&self, v: Value) -> CoreResult<Value> {
        match v {
            Value::Nil => Ok(Value::Nil),
            _ => self
                .pair_parts(v)
                .map(|(car, _)| car)
                .ok_or_else(|| CoreError::type_error("car expects a pair")),
        }
    }

    /// `cdr` with the classical tolerance: the cdr of `nil` is `nil`.
    pub fn cdr(&self, v: Value) -> CoreResult<Value> {
        match v {
            Value::Nil => Ok(Value::Nil),
            _ => self
                .pair_parts(v)
                .map(|(_, cdr)| cdr)
                .ok_or_else(|| CoreError::type_error("cdr expects a pair")),
        }
    }

    /// Replace the car of a pair.
    pub fn set_car(&mut self, v: Value, new: Value) -> CoreResult<()> {
        let Value::Cell(r) = v else {
            return Err(CoreError::type_error("setcar expects a pair"));
        };
        match &mut self.slot_mut(r).data {
            CellData::Pair { car, .. } => {
                *car = new;
                Ok(())
            }
            _ => Err(CoreError::type_error("setcar expects a pair")),
        }
    }

    /// Replace the cdr of a pair.
    pub fn set_cdr(&mut self, v: Value, new: Value) -> CoreResult<()> {
        let Value::Cell(r) = v else {
            return Err(CoreError::type_error("setcdr expects a pair"));
        };
        match &mut self.slot_mut(r).data {
            CellData::Pair { cdr, .. } => {
                *cdr = new;
                Ok(())
            }
            _ => Err(CoreError::type_error("setcdr expects a pair")),
        }
    }

    /// Numeric coercion: fixnums and boxed doubles only.
    pub fn to_number(&self, v: Value) -> CoreResult<f64> {
        match v {
            Value::Fixnum(n) => Ok(n as f64),
            Value::Cell(r) => match self.slot(r).data {
                CellData::Num(n) => Ok(n),
                _ => Err(CoreError::type_error(format!(
                    "expected a number, got {}",
                    self.type_of(v).name()
                ))),
            },
            _ => Err(CoreError::type_error(format!(
                "expected a number, got {}",
                self.type_of(v).name()
            ))),
        }
    }

    /// Borrow the contents of a string value.
    pub fn string_value(&self, v: Value) -> CoreResult<&str> {
        if let Value::Cell(r) = v {
            if let CellData::Str(s) = &self.slot(r).data {
                return Ok(s);
            }
        }
        Err(CoreError::type_error(format!(
            "expected a string, got {}",
            self.type_of(v).name()
        )))
    }

    /// Name of a symbol value, if it is one.
    pub fn symbol_name(&self, v: Value) -> Option<&str> {
        if let Value::Cell(r) = v {
            if let CellData::Sym(s) = &self.slot(r).data {
                return Some(&s.name);
            }
        }
        None
    }

    /// Borrow the host data of a foreign cell, if `v` is one.
    pub fn foreign_value(&self, v: Value) -> Option<&dyn Any> {
        if let Value::Cell(r) = v {
            if let CellData::Foreign(f) = &self.slot(r).data {
                return Some(f.data.as_ref());
            }
        }
        None
    }

    pub(crate) fn is_symbol(&self, v: Value) -> bool {
        matches!(v, Value::Cell(r) if matches!(self.slot(r).data, CellData::Sym(_)))
    }

    // ------------------------------------------------------------------
    // Globals and natives
    // ------------------------------------------------------------------

    pub(crate) fn symbol_global(&self, sym: Value) -> Value {
        if let Value::Cell(r) = sym {
            if let CellData::Sym(s) = &self.slot(r).data {
                return s.global;
            }
        }
        Value::Nil
    }

    pub(crate) fn set_symbol_global(&mut self, sym: Value, v: Value) {
        if let Value::Cell(r) = sym {
            if let CellData::Sym(s) = &mut self.slot_mut(r).data {
                s.global = v;
            }
        }
    }

    /// Read a global binding by name.
    pub fn global(&mut self, name: &str) -> CoreResult<Value> {
        let sym = self.intern(name)?;
        Ok(self.symbol_global(sym))
    }

    /// Set a global binding by name.
    pub fn set_global(&mut self, name: &str, v: Value) -> CoreResult<()> {
        let saved = self.save_gc();
        self.push_gc(v)?;
        let sym = self.intern(name)?;
        self.set_symbol_global(sym, v);
        self.restore_gc(saved);
        Ok(())
    }

    /// Register a named native function.
    pub fn register(&mut self, name: &str, f: NativeFn) -> CoreResult<()> {
        let saved = self.save_gc();
        let idx = self.natives.len() as u32;
        self.natives.push(f);
        let cell = self.alloc(CellData::Native(idx))?;
        let sym = self.intern(name)?;
        self.set_symbol_global(sym, cell);
        self.restore_gc(saved);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Host hooks
    // ------------------------------------------------------------------

    /// Redirect `print` output. Pass a closure appending into a buffer to
    /// capture output in tests.
    pub fn set_output(&mut self, sink: OutputSink) {
        self.output = Some(sink);
    }

    /// Install an error handler observing (error, rendered trace) before
    /// each error propagates to the host.
    pub fn set_error_handler(&mut self, handler: ErrorHandler) {
        self.handler = Some(handler);
    }

    /// Write a string to the print sink (stdout unless redirected).
    pub fn write_out(&mut self, s: &str) {
        match &mut self.output {
            Some(sink) => sink(s),
            None => print!("{s}"),
        }
    }

    /// Call list snapshot taken when the last error was raised, innermost
    /// frame first. Hosts use this for annotated traces.
    pub fn backtrace(&self) -> &[Value] {
        &self.backtrace
    }

    /// Record the call list as the error's backtrace, notify the handler,
    /// and reset the call list so the context stays usable. An error that
    /// already unwound through a nested `eval` keeps its original
    /// backtrace.
    pub(crate) fn fail(&mut self, err: CoreError) -> CoreError {
        if self.calllist.is_empty() {
            return err;
        }
        self.backtrace = std::mem::take(&mut self.calllist);
        self.backtrace.reverse();
        if let Some(mut handler) = self.handler.take() {
            let trace: Vec<String> = self
                .backtrace
                .iter()
                .map(|&form| self.write_value(form, true))
                .collect();
            handler(&err, &trace);
            self.handler = Some(handler);
        }
        err
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Context {
    /// Closing a context clears every root and runs a final collection so
    /// foreign finalizers fire and string buffers are released.
    fn drop(&mut self) {
        self.roots.clear();
        self.calllist.clear();
        self.modules.clear();
        self.backtrace.clear();
        self.symbols.clear();
        self.frame_marker = Value::Nil;
        self.return_marker = Value::Nil;
        self.collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_returns_identical_cells() {
        let mut ctx = Context::new();
        let a = ctx.intern("alpha").unwrap();
        let b = ctx.intern("alpha").unwrap();
        let c = ctx.intern("beta").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fixnum_boundary() {
        let mut ctx = Context::new();
        assert_eq!(ctx.number(42.0).unwrap(), Value::Fixnum(42));
        assert_eq!(ctx.number(-7.0).unwrap(), Value::Fixnum(-7));
        let boxed = ctx.number(3.5).unwrap();
        assert_eq!(ctx.type_of(boxed), Type::Number);
        assert!(matches!(boxed, Value::Cell(_)));
        let huge = ctx.number(1e300).unwrap();
        assert!(matches!(huge, Value::Cell(_)));
        // The smallest fixnum is inside the immediate range; one past the
        // largest is not.
        assert_eq!(
            ctx.number(crate::FIXNUM_MIN as f64).unwrap(),
            Value::Fixnum(crate::FIXNUM_MIN)
        );
        let past_max = ctx.number((1u64 << 62) as f64).unwrap();
        assert!(matches!(past_max, Value::Cell(_)));
    }

    #[test]
    fn cons_car_cdr_laws() {
        let mut ctx = Context::new();
        let a = Value::Fixnum(1);
        let b = Value::Fixnum(2);
        let pair = ctx.cons(a, b).unwrap();
        assert_eq!(ctx.car(pair).unwrap(), a);
        assert_eq!(ctx.cdr(pair).unwrap(), b);
        assert_eq!(ctx.car(Value::Nil).unwrap(), Value::Nil);
        assert_eq!(ctx.cdr(Value::Nil).unwrap(), Value::Nil);
        assert!(ctx.car(a).is_err());
    }

    #[test]
    fn foreign_cells_expose_their_data() {
        let mut ctx = Context::new();
        let v = ctx.foreign(Box::new(7u32), None, None).unwrap();
        let data = ctx.foreign_value(v).unwrap();
        assert_eq!(data.downcast_ref::<u32>(), Some(&7));
        assert!(ctx.foreign_value(Value::Nil).is_none());
        assert_eq!(ctx.type_of(v), Type::Foreign);
    }

    #[test]
    fn root_stack_overflow_is_reported() {
        let mut ctx = Context::with_config(ContextConfig {
            root_capacity: 8,
            ..ContextConfig::default()
        });
        let saved = ctx.save_gc();
        let mut last = Ok(());
        for _ in 0..32 {
            last = ctx.cons(Value::Nil, Value::Nil).map(|_| ());
            if last.is_err() {
                break;
            }
        }
        assert!(matches!(last, Err(CoreError::GcStackOverflow)));
        ctx.restore_gc(saved);
    }
}
