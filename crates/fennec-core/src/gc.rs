//! Mark-sweep garbage collector
//!
//! Classical two-phase collection over the arena. The root set is the
//! explicit root stack, the call list, the module stack, the backtrace
//! snapshot, the symbol table and the two reserved marker cells. Marking
//! runs a worklist to bound Rust stack depth; sweeping walks the arena
//! linearly, finalizes dead foreign cells, drops dead string buffers and
//! rebuilds the freelist in place.
//!
//! Threshold policy after a sweep: `threshold = max(live * 2, 1024)` with
//! the allocation counter reset. A collection is triggered before an
//! allocation whenever the counter reaches the threshold or the freelist
//! is empty.

use crate::context::Context;
use crate::heap::CellData;
use crate::value::{CellRef, Value};

/// Collection statistics, cumulative per context.
#[derive(Debug, Clone, Copy, Default)]
pub struct GcStats {
    /// Number of collections performed
    pub collections: usize,
    /// Cells found live by the last collection
    pub live: usize,
    /// Cells reclaimed by the last collection
    pub swept: usize,
    /// Current allocation threshold
    pub threshold: usize,
}

impl Context {
    /// Run a full mark-sweep collection. Returns the number of cells
    /// reclaimed.
    pub fn collect(&mut self) -> usize {
        #[cfg(feature = "gc_logging")]
        tracing::debug!(
            target: "fennec::gc",
            roots = self.roots.len(),
            cells = self.slots.len(),
            "GC cycle starting"
        );

        self.mark();
        let swept = self.sweep();

        #[cfg(feature = "gc_logging")]
        tracing::info!(
            target: "fennec::gc",
            collection = self.collections,
            live = self.live_count,
            swept,
            threshold = self.gc_threshold,
            "GC cycle complete"
        );

        swept
    }

    /// Current collector statistics.
    pub fn gc_stats(&self) -> GcStats {
        GcStats {
            collections: self.collections,
            live: self.live_count,
            swept: self.last_swept,
            threshold: self.gc_threshold,
        }
    }

    fn mark(&mut self) {
        let mut work: Vec<CellRef> = Vec::with_capacity(128);

        fn seed(work: &mut Vec<CellRef>, v: Value) {
            if let Value::Cell(r) = v {
                work.push(r);
            }
        }

        for &v in &self.roots {
            seed(&mut work, v);
        }
        for &v in &self.calllist {
            seed(&mut work, v);
        }
        for &v in &self.modules {
            seed(&mut work, v);
        }
        for &v in &self.backtrace {
            seed(&mut work, v);
        }
        for &r in self.symbols.values() {
            work.push(r);
        }
        seed(&mut work, self.frame_marker);
        seed(&mut work, self.return_marker);

        let mut children: Vec<Value> = Vec::with_capacity(8);
        while let Some(r) = work.pop() {
            if self.slots[r.index()].marked {
                continue;
            }
            self.slots[r.index()].marked = true;

            children.clear();
            match &self.slots[r.index()].data {
                CellData::Pair { car, cdr } => {
                    children.push(*car);
                    children.push(*cdr);
                }
                CellData::Sym(s) => children.push(s.global),
                CellData::Func(c) | CellData::Macro(c) => {
                    children.extend([c.def_env, c.free_vars, c.params, c.body]);
                }
                CellData::Foreign(f) => {
                    if let Some(mark) = f.mark {
                        mark(f.data.as_ref(), &mut |v| children.push(v));
                    }
                }
                _ => {}
            }
            for &child in &children {
                if let Value::Cell(c) = child {
                    if !self.slots[c.index()].marked {
                        work.push(c);
                    }
                }
            }
        }
    }

    /// Finalize and free unmarked cells, clear surviving marks, rebuild
    /// the freelist, and retune the threshold.
    fn sweep(&mut self) -> usize {
        let mut live = 0usize;
        let mut swept = 0usize;
        let mut free_head = None;

        for i in 0..self.slots.len() {
            if self.slots[i].marked {
                self.slots[i].marked = false;
                live += 1;
                continue;
            }
            if !matches!(self.slots[i].data, CellData::Free { .. }) {
                if let CellData::Foreign(f) = &mut self.slots[i].data {
                    if let Some(finalize) = f.finalize {
                        finalize(f.data.as_mut());
                    }
                }
                swept += 1;
            }
            // Dropping the payload here releases string buffers and
            // foreign data; the slot is relinked into the freelist.
            self.slots[i].data = CellData::Free { next: free_head };
            free_head = Some(CellRef(i as u32));
        }

        self.free_head = free_head;
        self.live_count = live;
        self.last_swept = swept;
        self.allocs_since_gc = 0;
        self.gc_threshold = (live * 2).max(1024);
        self.collections += 1;
        swept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextConfig;

    #[test]
    fn unreachable_cells_are_reclaimed() {
        let mut ctx = Context::new();
        let saved = ctx.save_gc();
        for _ in 0..100 {
            ctx.cons(Value::Nil, Value::Nil).unwrap();
        }
        ctx.restore_gc(saved);
        ctx.collect();
        let stats = ctx.gc_stats();
        assert!(stats.swept >= 100);
    }

    #[test]
    fn rooted_cells_survive_and_keep_identity() {
        let mut ctx = Context::new();
        let saved = ctx.save_gc();
        let pair = ctx.cons(Value::Fixnum(7), Value::Fixnum(9)).unwrap();
        ctx.collect();
        assert_eq!(ctx.car(pair).unwrap(), Value::Fixnum(7));
        assert_eq!(ctx.cdr(pair).unwrap(), Value::Fixnum(9));
        ctx.restore_gc(saved);
    }

    #[test]
    fn reachable_through_pairs_survives() {
        let mut ctx = Context::new();
        let saved = ctx.save_gc();
        let inner = ctx.cons(Value::Fixnum(1), Value::Nil).unwrap();
        let outer = ctx.cons(inner, Value::Nil).unwrap();
        // Keep only the outer pair rooted.
        ctx.restore_gc(saved);
        ctx.push_gc(outer).unwrap();
        ctx.collect();
        let inner_again = ctx.car(outer).unwrap();
        assert_eq!(ctx.car(inner_again).unwrap(), Value::Fixnum(1));
        ctx.restore_gc(saved);
    }

    #[test]
    fn symbols_and_globals_are_roots() {
        let mut ctx = Context::new();
        let saved = ctx.save_gc();
        let v = ctx.string("kept alive through a global").unwrap();
        ctx.set_global("keeper", v).unwrap();
        ctx.restore_gc(saved);
        ctx.collect();
        let got = ctx.global("keeper").unwrap();
        assert_eq!(ctx.string_value(got).unwrap(), "kept alive through a global");
    }

    #[test]
    fn threshold_retunes_after_sweep() {
        let mut ctx = Context::new();
        ctx.collect();
        let stats = ctx.gc_stats();
        assert!(stats.threshold >= 1024);
        assert_eq!(stats.threshold, (stats.live * 2).max(1024));
    }

    #[test]
    fn exhausting_a_tiny_arena_reports_out_of_memory() {
        // Minimum-size arena; root everything so nothing can be reclaimed.
        let mut ctx = Context::with_config(ContextConfig {
            arena_size: 1,
            root_capacity: 4096,
            ..ContextConfig::default()
        });
        let mut result = Ok(Value::Nil);
        for _ in 0..4096 {
            result = ctx.cons(Value::Nil, Value::Nil);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(crate::CoreError::OutOfMemory)));
    }

    #[test]
    fn foreign_finalizers_run_on_sweep() {
        use std::any::Any;
        use std::cell::Cell as StdCell;
        use std::rc::Rc;

        thread_local! {
            static FINALIZED: StdCell<usize> = const { StdCell::new(0) };
        }
        fn finalize(_data: &mut dyn Any) {
            FINALIZED.with(|c| c.set(c.get() + 1));
        }

        FINALIZED.with(|c| c.set(0));
        let mut ctx = Context::new();
        let saved = ctx.save_gc();
        let payload: Rc<str> = Rc::from("payload");
        ctx.foreign(Box::new(payload), None, Some(finalize)).unwrap();
        ctx.restore_gc(saved);
        ctx.collect();
        assert_eq!(FINALIZED.with(|c| c.get()), 1);
        // A second collection must not re-finalize the freed cell.
        ctx.collect();
        assert_eq!(FINALIZED.with(|c| c.get()), 1);
    }

    #[test]
    fn close_runs_finalizers() {
        use std::any::Any;
        use std::cell::Cell as StdCell;

        thread_local! {
            static CLOSED: StdCell<usize> = const { StdCell::new(0) };
        }
        fn finalize(_data: &mut dyn Any) {
            CLOSED.with(|c| c.set(c.get() + 1));
        }

        CLOSED.with(|c| c.set(0));
        {
            let mut ctx = Context::new();
            let v = ctx.foreign(Box::new(0u8), None, Some(finalize)).unwrap();
            ctx.set_global("held", v).unwrap();
            // Still rooted through the global; dropping the context must
            // clear the roots and fire the finalizer.
        }
        assert_eq!(CLOSED.with(|c| c.get()), 1);
    }
}
