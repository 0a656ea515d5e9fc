//! Tree-walking evaluator
//!
//! Dispatch: a symbol evaluates to its nearest lexical binding or its
//! global slot; any other non-pair evaluates to itself; a pair is a call
//! whose head is evaluated and dispatched by type (primitive special
//! form, closure, macro, or host native).
//!
//! Environments come in two shapes. The legacy shape is a plain
//! association list of `(symbol . value)` binding pairs. Closure bodies
//! run in a frame: the pair `(#frame . (locals . upvalues))`, where both
//! halves are association lists. Name lookup checks locals, then
//! upvalues, then the symbol's global slot. Bindings are the pairs
//! themselves, so captures and assignment share one mutable cell.
//!
//! `return` is an explicit sentinel: evaluating `(return e)` yields the
//! tagged pair `(#return . value)`, which short-circuits every enclosing
//! sequence and is unwrapped at the closure-application boundary. No
//! non-local jump is involved.
//!
//! Every recursive entry frames its temporaries between `save_gc` /
//! `restore_gc`, keeping the value under construction rooted while
//! everything else becomes collectible again on exit.

use crate::analyzer;
use crate::context::Context;
use crate::error::{CoreError, CoreResult};
use crate::heap::{CellData, Closure};
use crate::value::{Primitive, Type, Value};

impl Context {
    /// Evaluate an expression at top level (globals only).
    ///
    /// The result is left protected on the root stack; callers bracket
    /// batches of evaluations with `save_gc`/`restore_gc`.
    pub fn eval(&mut self, expr: Value) -> CoreResult<Value> {
        let saved = self.save_gc();
        let res = self.eval_expr(expr, Value::Nil, None);
        self.restore_gc(saved);
        match res {
            Ok(v) => match self.push_gc(v) {
                Ok(()) => Ok(v),
                Err(e) => Err(self.fail(e)),
            },
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Call a function, native or operator primitive with pre-evaluated
    /// arguments. Reentrant: natives may call this on the context that
    /// invoked them.
    pub fn apply(&mut self, f: Value, args: &[Value]) -> CoreResult<Value> {
        let saved = self.save_gc();
        let res = match self.list(args) {
            Ok(argv) => self.apply_value(f, argv),
            Err(e) => Err(e),
        };
        self.restore_gc(saved);
        match res {
            Ok(v) => match self.push_gc(v) {
                Ok(()) => Ok(v),
                Err(e) => Err(self.fail(e)),
            },
            Err(e) => Err(self.fail(e)),
        }
    }

    fn eval_expr(&mut self, expr: Value, env: Value, out: Option<&mut Value>) -> CoreResult<Value> {
        match self.type_of(expr) {
            Type::Symbol => Ok(self.lookup(expr, env)),
            Type::Pair => self.eval_pair(expr, env, out),
            _ => Ok(expr),
        }
    }

    /// Call wrapper: records the form on the call list for error traces,
    /// frames the temporaries, and protects the result in the caller's
    /// frame. On error the call list is left in place so the backtrace
    /// can be snapshotted.
    fn eval_pair(&mut self, form: Value, env: Value, out: Option<&mut Value>) -> CoreResult<Value> {
        self.calllist.push(form);
        let saved = self.save_gc();
        let res = self.eval_form(form, env, out);
        self.restore_gc(saved);
        let v = res?;
        self.calllist.pop();
        self.push_gc(v)?;
        Ok(v)
    }

    fn eval_form(&mut self, form: Value, env: Value, out: Option<&mut Value>) -> CoreResult<Value> {
        let (head, args) = self
            .pair_parts(form)
            .expect("eval_form dispatches on pairs");
        let f = self.eval_expr(head, env, None)?;
        match self.type_of(f) {
            Type::Primitive => {
                let Value::Cell(r) = f else { unreachable!() };
                let p = match &self.slot(r).data {
                    CellData::Prim(p) => *p,
                    _ => unreachable!(),
                };
                self.eval_primitive(p, args, env, out)
            }
            Type::Function => {
                let argv = self.eval_args(args, env)?;
                self.apply_closure(f, argv)
            }
            Type::Macro => self.expand_macro(f, form, env, out),
            Type::Native => {
                let Value::Cell(r) = f else { unreachable!() };
                let idx = match &self.slot(r).data {
                    CellData::Native(i) => *i as usize,
                    _ => unreachable!(),
                };
                let argv = self.eval_args(args, env)?;
                let native = self.natives[idx].clone();
                native(self, argv)
            }
            _ => Err(CoreError::call_error(self.write_value(f, true))),
        }
    }

    /// Evaluate an argument list left-to-right into a fresh proper list.
    fn eval_args(&mut self, args: Value, env: Value) -> CoreResult<Value> {
        let saved = self.save_gc();
        let mut head = Value::Nil;
        let mut tail = Value::Nil;
        let mut node = args;
        while !node.is_nil() {
            let Some((expr, rest)) = self.pair_parts(node) else {
                return Err(CoreError::arity_error("dotted pair in argument list"));
            };
            let v = self.eval_expr(expr, env, None)?;
            let cell = self.cons(v, Value::Nil)?;
            if tail.is_nil() {
                head = cell;
            } else {
                self.set_cdr(tail, cell)?;
            }
            tail = cell;
            node = rest;
            self.restore_gc(saved);
            self.push_gc(head)?;
        }
        self.restore_gc(saved);
        self.push_gc(head)?;
        Ok(head)
    }

    /// Evaluate a body sequence as `do`: each form in order, threading
    /// bindings introduced by a local `let` into the environment seen by
    /// later forms. A `return`-tagged result short-circuits the sequence.
    fn eval_seq(&mut self, body: Value, env: Value) -> CoreResult<Value> {
        let saved = self.save_gc();
        let mut env = env;
        let mut node = body;
        let mut result = Value::Nil;
        while let Some((form, rest)) = self.pair_parts(node) {
            self.restore_gc(saved);
            self.push_gc(env)?;
            let current = env;
            result = self.eval_expr(form, current, Some(&mut env))?;
            if self.is_return(result) {
                break;
            }
            node = rest;
        }
        self.restore_gc(saved);
        self.push_gc(result)?;
        Ok(result)
    }

    fn eval_primitive(
        &mut self,
        p: Primitive,
        args: Value,
        env: Value,
        out: Option<&mut Value>,
    ) -> CoreResult<Value> {
        match p {
            Primitive::Let => self.eval_let(args, env, out),
            Primitive::Set => self.eval_set(args, env),
            Primitive::If => self.eval_if(args, env),
            Primitive::While => self.eval_while(args, env),
            Primitive::And => {
                let mut node = args;
                let mut last = Value::Nil;
                while let Some((expr, rest)) = self.pair_parts(node) {
                    last = self.eval_expr(expr, env, None)?;
                    if !last.is_truthy() {
                        return Ok(last);
                    }
                    node = rest;
                }
                Ok(last)
            }
            Primitive::Or => {
                let mut node = args;
                let mut last = Value::Nil;
                while let Some((expr, rest)) = self.pair_parts(node) {
                    last = self.eval_expr(expr, env, None)?;
                    if last.is_truthy() {
                        return Ok(last);
                    }
                    node = rest;
                }
                Ok(last)
            }
            Primitive::Do => self.eval_seq(args, env),
            Primitive::Quote => self.car(args),
            Primitive::Fn | Primitive::Mac => self.eval_fn(p, args, env),
            Primitive::Return => {
                let v = match self.pair_parts(args) {
                    Some((expr, _)) => self.eval_expr(expr, env, None)?,
                    None => Value::Nil,
                };
                self.cons(self.return_marker, v)
            }
            Primitive::Module => self.eval_module(args, env),
            Primitive::Export => self.eval_export(args, env, out),
            Primitive::Import => Ok(Value::Nil),
            Primitive::Get => self.eval_get(args, env),
            _ => {
                let argv = self.eval_args(args, env)?;
                self.apply_primitive(p, argv)
            }
        }
    }

    /// `let`: with an out-environment (inside a sequence) bind with
    /// letrec semantics — placeholder first, initializer second — and
    /// thread the extended environment back. At top level install a
    /// global.
    fn eval_let(&mut self, args: Value, env: Value, out: Option<&mut Value>) -> CoreResult<Value> {
        let Some((name, rest)) = self.pair_parts(args) else {
            return Err(CoreError::arity_error("let expects a name"));
        };
        if !self.is_symbol(name) {
            return Err(CoreError::type_error("let expects a symbol name"));
        }
        let init = self.car(rest)?;
        match out {
            Some(out_env) => {
                let saved = self.save_gc();
                let binding = self.cons(name, Value::Nil)?;
                let new_env = if self.is_frame(env) {
                    let (_, inner) = self.pair_parts(env).expect("frame is a pair");
                    let (locals, _) = self.pair_parts(inner).expect("frame body is a pair");
                    let new_locals = self.cons(binding, locals)?;
                    self.set_car(inner, new_locals)?;
                    env
                } else {
                    self.cons(binding, env)?
                };
                self.restore_gc(saved);
                self.push_gc(new_env)?;
                let value = self.eval_expr(init, new_env, None)?;
                self.set_cdr(binding, value)?;
                *out_env = new_env;
                Ok(value)
            }
            None => {
                let value = self.eval_expr(init, env, None)?;
                self.set_symbol_global(name, value);
                Ok(value)
            }
        }
    }

    /// `=`: mutate the binding found by name lookup, or the global slot.
    fn eval_set(&mut self, args: Value, env: Value) -> CoreResult<Value> {
        let Some((name, rest)) = self.pair_parts(args) else {
            return Err(CoreError::arity_error("= expects a name"));
        };
        if !self.is_symbol(name) {
            return Err(CoreError::type_error("= expects a symbol name"));
        }
        let expr = self.car(rest)?;
        let value = self.eval_expr(expr, env, None)?;
        match self.getbound(name, env) {
            Some(binding) => self.set_cdr(binding, value)?,
            None => self.set_symbol_global(name, value),
        }
        Ok(value)
    }

    /// N-ary `if`: condition/body clauses, with a trailing unpaired
    /// expression as the else-branch; `nil` when nothing matches.
    fn eval_if(&mut self, args: Value, env: Value) -> CoreResult<Value> {
        let mut clauses = args;
        loop {
            let Some((cond, rest)) = self.pair_parts(clauses) else {
                return Ok(Value::Nil);
            };
            match self.pair_parts(rest) {
                Some((then, more)) => {
                    let c = self.eval_expr(cond, env, None)?;
                    if c.is_truthy() {
                        return self.eval_expr(then, env, None);
                    }
                    clauses = more;
                }
                None => return self.eval_expr(cond, env, None),
            }
        }
    }

    fn eval_while(&mut self, args: Value, env: Value) -> CoreResult<Value> {
        let Some((cond, body)) = self.pair_parts(args) else {
            return Err(CoreError::arity_error("while expects a condition"));
        };
        let saved = self.save_gc();
        loop {
            self.restore_gc(saved);
            let c = self.eval_expr(cond, env, None)?;
            if !c.is_truthy() {
                break;
            }
            let r = self.eval_seq(body, env)?;
            if self.is_return(r) {
                return Ok(r);
            }
        }
        Ok(Value::Nil)
    }

    /// `fn`/`mac`: capture the environment, analyze the body for free
    /// variables, and construct the closure cell.
    fn eval_fn(&mut self, p: Primitive, args: Value, env: Value) -> CoreResult<Value> {
        let Some((params, body)) = self.pair_parts(args) else {
            return Err(CoreError::arity_error("fn expects a parameter list"));
        };
        let saved = self.save_gc();
        let free = analyzer::free_vars(self, body, params);
        let mut free_list = Value::Nil;
        for &sym in free.iter().rev() {
            free_list = self.cons(Value::Cell(sym), free_list)?;
            self.restore_gc(saved);
            self.push_gc(free_list)?;
        }
        let closure = Closure {
            def_env: env,
            free_vars: free_list,
            params,
            body,
        };
        self.make_closure(closure, p == Primitive::Mac)
    }

    /// `module`: run the body with a fresh export table on the module
    /// stack, then bind the finished table to the module's name.
    fn eval_module(&mut self, args: Value, env: Value) -> CoreResult<Value> {
        let Some((name_expr, body)) = self.pair_parts(args) else {
            return Err(CoreError::arity_error("module expects a name"));
        };
        let name_v = self.eval_expr(name_expr, env, None)?;
        let name = self
            .string_value(name_v)
            .map_err(|_| CoreError::type_error("module expects a string name"))?
            .to_owned();
        self.modules.push(Value::Nil);
        if let Err(e) = self.eval_seq(body, env) {
            self.modules.pop();
            return Err(e);
        }
        let table = *self.modules.last().expect("module stack entry");
        let sym = match self.intern(&name) {
            Ok(s) => s,
            Err(e) => {
                self.modules.pop();
                return Err(e);
            }
        };
        self.set_symbol_global(sym, table);
        self.modules.pop();
        Ok(table)
    }

    /// `export`: evaluate the declaration (threading the environment like
    /// the surrounding sequence) and record its name and value in the
    /// current module's table.
    fn eval_export(
        &mut self,
        args: Value,
        env: Value,
        out: Option<&mut Value>,
    ) -> CoreResult<Value> {
        if self.modules.is_empty() {
            return Err(CoreError::type_error("export outside a module"));
        }
        let decl = self.car(args)?;
        let decl_rest = self.cdr(decl)?;
        let name = self.car(decl_rest)?;
        if !self.is_symbol(name) {
            return Err(CoreError::type_error(
                "export expects a let or fn declaration",
            ));
        }
        let value = self.eval_expr(decl, env, out)?;
        let binding = self.cons(name, value)?;
        let table = *self.modules.last().expect("module stack entry");
        let new_table = self.cons(binding, table)?;
        *self.modules.last_mut().expect("module stack entry") = new_table;
        Ok(value)
    }

    /// `get`: evaluate the object, look the unevaluated symbol name up in
    /// it (the object must be an association list, such as a module
    /// table).
    fn eval_get(&mut self, args: Value, env: Value) -> CoreResult<Value> {
        let Some((obj_expr, rest)) = self.pair_parts(args) else {
            return Err(CoreError::arity_error("get expects an object and a name"));
        };
        let name = self.car(rest)?;
        if !self.is_symbol(name) {
            return Err(CoreError::type_error("get expects a symbol name"));
        }
        let obj = self.eval_expr(obj_expr, env, None)?;
        if !obj.is_nil() && self.pair_parts(obj).is_none() {
            return Err(CoreError::type_error("property access on non-table"));
        }
        match self.assoc(name, obj) {
            Some(binding) => self.cdr(binding),
            None => Err(CoreError::name_error(format!(
                "unbound property '{}'",
                self.symbol_name(name).unwrap_or("?")
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Application
    // ------------------------------------------------------------------

    pub(crate) fn apply_value(&mut self, f: Value, argv: Value) -> CoreResult<Value> {
        match self.type_of(f) {
            Type::Function => self.apply_closure(f, argv),
            Type::Native => {
                let Value::Cell(r) = f else { unreachable!() };
                let idx = match &self.slot(r).data {
                    CellData::Native(i) => *i as usize,
                    _ => unreachable!(),
                };
                let native = self.natives[idx].clone();
                native(self, argv)
            }
            Type::Primitive => {
                let Value::Cell(r) = f else { unreachable!() };
                let p = match &self.slot(r).data {
                    CellData::Prim(p) => *p,
                    _ => unreachable!(),
                };
                match p {
                    Primitive::Let
                    | Primitive::Set
                    | Primitive::If
                    | Primitive::While
                    | Primitive::And
                    | Primitive::Or
                    | Primitive::Do
                    | Primitive::Quote
                    | Primitive::Fn
                    | Primitive::Mac
                    | Primitive::Return
                    | Primitive::Module
                    | Primitive::Export
                    | Primitive::Import
                    | Primitive::Get => Err(CoreError::call_error(self.write_value(f, true))),
                    _ => self.apply_primitive(p, argv),
                }
            }
            _ => Err(CoreError::call_error(self.write_value(f, true))),
        }
    }

    /// Apply a closure to an evaluated argument list: materialize
    /// upvalues from the definition environment, zip parameters against
    /// arguments, build the frame, run the body, unwrap `return`.
    fn apply_closure(&mut self, f: Value, argv: Value) -> CoreResult<Value> {
        let (closure, _) = self
            .closure_of(f)
            .ok_or_else(|| CoreError::call_error(self.write_value(f, true)))?;
        let saved = self.save_gc();
        let frame = self.build_frame(&closure, argv)?;
        let res = self.eval_seq(closure.body, frame)?;
        self.restore_gc(saved);
        let result = if self.is_return(res) {
            self.cdr(res)?
        } else {
            res
        };
        self.push_gc(result)?;
        Ok(result)
    }

    /// Build the frame `(#frame . (locals . upvalues))`.
    ///
    /// Upvalues reuse the binding pairs the definition environment holds,
    /// giving reference semantics for captures; a free variable with no
    /// binding in the definition environment falls back to its global
    /// slot at lookup time. Excess actuals are ignored, excess formals
    /// bind to `nil`, a dotted rest parameter takes the remaining
    /// actuals.
    fn build_frame(&mut self, closure: &Closure, argv: Value) -> CoreResult<Value> {
        let saved = self.save_gc();

        let mut upvalues = Value::Nil;
        let mut free = closure.free_vars;
        while let Some((sym, rest)) = self.pair_parts(free) {
            if let Some(binding) = self.getbound(sym, closure.def_env) {
                upvalues = self.cons(binding, upvalues)?;
                self.restore_gc(saved);
                self.push_gc(upvalues)?;
            }
            free = rest;
        }

        let mut locals = Value::Nil;
        let mut params = closure.params;
        let mut args = argv;
        loop {
            if params.is_nil() {
                break;
            }
            match self.pair_parts(params) {
                Some((sym, prest)) => {
                    let val = match self.pair_parts(args) {
                        Some((a, arest)) => {
                            args = arest;
                            a
                        }
                        None => Value::Nil,
                    };
                    let binding = self.cons(sym, val)?;
                    locals = self.cons(binding, locals)?;
                    params = prest;
                }
                None => {
                    // Dotted rest parameter captures the remaining actuals.
                    let binding = self.cons(params, args)?;
                    locals = self.cons(binding, locals)?;
                    params = Value::Nil;
                }
            }
            self.restore_gc(saved);
            self.push_gc(upvalues)?;
            self.push_gc(locals)?;
        }

        let inner = self.cons(locals, upvalues)?;
        let frame = self.cons(self.frame_marker, inner)?;
        self.restore_gc(saved);
        self.push_gc(frame)?;
        Ok(frame)
    }

    /// Apply a macro: bind the unevaluated arguments, evaluate the body
    /// in the macro's environment, splice the expansion over the call
    /// cell, then evaluate the mutated cell in the caller's environment.
    /// The in-place splice is the expansion cache — the macro never runs
    /// again for this call site.
    fn expand_macro(
        &mut self,
        f: Value,
        form: Value,
        env: Value,
        out: Option<&mut Value>,
    ) -> CoreResult<Value> {
        let (closure, _) = self
            .closure_of(f)
            .ok_or_else(|| CoreError::call_error(self.write_value(f, true)))?;
        let raw_args = self.cdr(form)?;
        let saved = self.save_gc();
        let frame = self.build_frame(&closure, raw_args)?;
        let res = self.eval_seq(closure.body, frame)?;
        let expansion = if self.is_return(res) {
            self.cdr(res)?
        } else {
            res
        };
        self.restore_gc(saved);
        self.push_gc(expansion)?;

        let Value::Cell(site) = form else {
            unreachable!("macro call sites are pairs")
        };
        let replacement = if let Value::Cell(r) = expansion {
            match &self.slot(r).data {
                CellData::Pair { car, cdr } => Some(CellData::Pair {
                    car: *car,
                    cdr: *cdr,
                }),
                CellData::Num(n) => Some(CellData::Num(*n)),
                CellData::Str(s) => Some(CellData::Str(s.clone())),
                _ => None,
            }
        } else {
            None
        };
        match replacement {
            Some(data) => self.slot_mut(site).data = data,
            None => {
                // Symbols and immediates are quoted so the splice
                // re-evaluates to the expansion value, not through it.
                let quote = self.intern("quote")?;
                let tail = self.cons(expansion, Value::Nil)?;
                self.slot_mut(site).data = CellData::Pair {
                    car: quote,
                    cdr: tail,
                };
            }
        }
        self.eval_expr(form, env, out)
    }

    /// Operator primitives over an evaluated argument list.
    fn apply_primitive(&mut self, p: Primitive, argv: Value) -> CoreResult<Value> {
        match p {
            Primitive::Add => {
                let mut acc = 0.0;
                let mut node = argv;
                while let Some((v, rest)) = self.pair_parts(node) {
                    acc += self.to_number(v)?;
                    node = rest;
                }
                self.number(acc)
            }
            Primitive::Mul => {
                let mut acc = 1.0;
                let mut node = argv;
                while let Some((v, rest)) = self.pair_parts(node) {
                    acc *= self.to_number(v)?;
                    node = rest;
                }
                self.number(acc)
            }
            Primitive::Sub => match self.pair_parts(argv) {
                None => Ok(Value::Fixnum(0)),
                Some((first, rest)) => {
                    let mut acc = self.to_number(first)?;
                    if rest.is_nil() {
                        return self.number(-acc);
                    }
                    let mut node = rest;
                    while let Some((v, more)) = self.pair_parts(node) {
                        acc -= self.to_number(v)?;
                        node = more;
                    }
                    self.number(acc)
                }
            },
            Primitive::Div => {
                let Some((first, rest)) = self.pair_parts(argv) else {
                    return Err(CoreError::arity_error("'/' expects at least one argument"));
                };
                let mut acc = self.to_number(first)?;
                let mut node = rest;
                while let Some((v, more)) = self.pair_parts(node) {
                    acc /= self.to_number(v)?;
                    node = more;
                }
                self.number(acc)
            }
            Primitive::Lt | Primitive::Le => {
                let mut args = argv;
                let a = self.next_arg(&mut args)?;
                let b = self.next_arg(&mut args)?;
                let (a, b) = (self.to_number(a)?, self.to_number(b)?);
                Ok(Value::Bool(if p == Primitive::Lt { a < b } else { a <= b }))
            }
            Primitive::Cons => {
                let mut args = argv;
                let a = self.next_arg(&mut args)?;
                let b = self.next_arg(&mut args)?;
                self.cons(a, b)
            }
            Primitive::Car => {
                let mut args = argv;
                let v = self.next_arg(&mut args)?;
                self.car(v)
            }
            Primitive::Cdr => {
                let mut args = argv;
                let v = self.next_arg(&mut args)?;
                self.cdr(v)
            }
            Primitive::SetCar => {
                let mut args = argv;
                let pair = self.next_arg(&mut args)?;
                let v = self.next_arg(&mut args)?;
                self.set_car(pair, v)?;
                Ok(v)
            }
            Primitive::SetCdr => {
                let mut args = argv;
                let pair = self.next_arg(&mut args)?;
                let v = self.next_arg(&mut args)?;
                self.set_cdr(pair, v)?;
                Ok(v)
            }
            Primitive::List => Ok(argv),
            Primitive::Not => {
                let mut args = argv;
                let v = self.next_arg(&mut args)?;
                Ok(Value::Bool(!v.is_truthy()))
            }
            Primitive::Is => {
                let mut args = argv;
                let a = self.next_arg(&mut args)?;
                let b = self.next_arg(&mut args)?;
                Ok(Value::Bool(self.is_same(a, b)))
            }
            Primitive::Atom => {
                let mut args = argv;
                let v = self.next_arg(&mut args)?;
                Ok(Value::Bool(self.pair_parts(v).is_none()))
            }
            Primitive::Print => {
                let mut line = String::new();
                let mut node = argv;
                let mut first = true;
                while let Some((v, rest)) = self.pair_parts(node) {
                    if !first {
                        line.push(' ');
                    }
                    first = false;
                    line.push_str(&self.write_value(v, false));
                    node = rest;
                }
                line.push('\n');
                self.write_out(&line);
                Ok(Value::Nil)
            }
            _ => Err(CoreError::call_error(p.name().to_string())),
        }
    }

    // ------------------------------------------------------------------
    // Environments
    // ------------------------------------------------------------------

    fn is_frame(&self, env: Value) -> bool {
        matches!(self.pair_parts(env), Some((car, _)) if car == self.frame_marker)
    }

    /// Find the binding pair for a name: frame locals, then upvalues;
    /// legacy lists element by element. `None` means the global slot.
    fn getbound(&self, sym: Value, env: Value) -> Option<Value> {
        let mut node = env;
        loop {
            let (car, cdr) = self.pair_parts(node)?;
            if car == self.frame_marker {
                let (locals, upvalues) = self.pair_parts(cdr)?;
                return self.assoc(sym, locals).or_else(|| self.assoc(sym, upvalues));
            }
            if let Some((name, _)) = self.pair_parts(car) {
                if name == sym {
                    return Some(car);
                }
            }
            node = cdr;
        }
    }

    pub(crate) fn assoc(&self, sym: Value, mut list: Value) -> Option<Value> {
        while let Some((entry, rest)) = self.pair_parts(list) {
            if let Some((name, _)) = self.pair_parts(entry) {
                if name == sym {
                    return Some(entry);
                }
            }
            list = rest;
        }
        None
    }

    fn lookup(&self, sym: Value, env: Value) -> Value {
        match self.getbound(sym, env) {
            Some(binding) => self.pair_parts(binding).map(|(_, v)| v).unwrap_or(Value::Nil),
            None => self.symbol_global(sym),
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Is this a `(#return . value)` sentinel?
    pub(crate) fn is_return(&self, v: Value) -> bool {
        matches!(self.pair_parts(v), Some((car, _)) if car == self.return_marker)
    }

    fn closure_of(&self, v: Value) -> Option<(Closure, bool)> {
        if let Value::Cell(r) = v {
            match &self.slot(r).data {
                CellData::Func(c) => return Some((*c, false)),
                CellData::Macro(c) => return Some((*c, true)),
                _ => {}
            }
        }
        None
    }

    /// Pop the next argument from an evaluated argument list.
    pub fn next_arg(&self, args: &mut Value) -> CoreResult<Value> {
        match self.pair_parts(*args) {
            Some((v, rest)) => {
                *args = rest;
                Ok(v)
            }
            None => Err(CoreError::arity_error("too few arguments")),
        }
    }

    fn is_numeric(&self, v: Value) -> bool {
        match v {
            Value::Fixnum(_) => true,
            Value::Cell(r) => matches!(self.slot(r).data, CellData::Num(_)),
            _ => false,
        }
    }

    /// `is` semantics: structural for numbers and strings, identity for
    /// everything else.
    fn is_same(&self, a: Value, b: Value) -> bool {
        if self.is_numeric(a) && self.is_numeric(b) {
            return self.to_number(a).unwrap_or(f64::NAN) == self.to_number(b).unwrap_or(f64::NAN);
        }
        if let (Value::Cell(ra), Value::Cell(rb)) = (a, b) {
            if let (CellData::Str(sa), CellData::Str(sb)) =
                (&self.slot(ra).data, &self.slot(rb).data)
            {
                return sa == sb;
            }
        }
        a == b
    }
}
