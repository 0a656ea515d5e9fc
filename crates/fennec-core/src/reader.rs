//! S-expression reader
//!
//! Turns a character stream into pair/atom trees in the same shape the
//! evaluator accepts. The reader is incremental: each call to [`Reader::read`]
//! pulls exactly one expression, so a REPL or file loader can interleave
//! reading and evaluation.
//!
//! Atoms are parsed as a double first; if the whole token is consumed the
//! result is a number, otherwise a symbol. `nil`, `true` and `false` are
//! their respective values. Comments run from `;` to end of line. Dotted
//! pairs use a bare `.` inside a list.

use std::iter::Peekable;

use crate::context::Context;
use crate::error::{CoreError, CoreResult};
use crate::value::Value;

/// Longest accepted atom token, in bytes.
const MAX_SYMBOL_LEN: usize = 256;

/// Incremental S-expression reader over any character source.
pub struct Reader<I: Iterator<Item = char>> {
    chars: Peekable<I>,
}

impl<I: Iterator<Item = char>> Reader<I> {
    /// Wrap a character source.
    pub fn new(source: I) -> Self {
        Reader {
            chars: source.peekable(),
        }
    }

    /// Read the next expression, or `None` at end of input.
    ///
    /// While a list or string is being built its cells are kept on the
    /// root stack; the completed expression is left protected at the
    /// caller's current save point.
    pub fn read(&mut self, ctx: &mut Context) -> CoreResult<Option<Value>> {
        self.skip_blank();
        if self.chars.peek().is_none() {
            return Ok(None);
        }
        self.read_expr(ctx).map(Some)
    }

    fn skip_blank(&mut self) {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.chars.next();
                }
                Some(';') => {
                    for c in self.chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn read_expr(&mut self, ctx: &mut Context) -> CoreResult<Value> {
        self.skip_blank();
        match self.chars.peek() {
            None => Err(CoreError::reader_error("unexpected end of input")),
            Some(')') => Err(CoreError::reader_error("stray ')'")),
            Some('(') => {
                self.chars.next();
                self.read_list(ctx)
            }
            Some('\'') => {
                self.chars.next();
                let saved = ctx.save_gc();
                let quoted = self.read_expr(ctx)?;
                let quote = ctx.intern("quote")?;
                let tail = ctx.cons(quoted, Value::Nil)?;
                let form = ctx.cons(quote, tail)?;
                ctx.restore_gc(saved);
                ctx.push_gc(form)?;
                Ok(form)
            }
            Some('"') => {
                self.chars.next();
                self.read_string(ctx)
            }
            Some(_) => {
                let token = self.read_token()?;
                self.atom(ctx, &token)
            }
        }
    }

    fn read_list(&mut self, ctx: &mut Context) -> CoreResult<Value> {
        let saved = ctx.save_gc();
        let mut head = Value::Nil;
        let mut tail = Value::Nil;
        loop {
            self.skip_blank();
            match self.chars.peek() {
                None => return Err(CoreError::reader_error("unclosed list")),
                Some(')') => {
                    self.chars.next();
                    break;
                }
                _ => {}
            }

            // A bare `.` token makes the next expression the list tail.
            if self.chars.peek() == Some(&'.') {
                let token = self.read_token()?;
                if token == "." {
                    if tail.is_nil() {
                        return Err(CoreError::reader_error("'.' at the start of a list"));
                    }
                    let rest = self.read_expr(ctx)?;
                    ctx.set_cdr(tail, rest)?;
                    self.skip_blank();
                    if self.chars.next() != Some(')') {
                        return Err(CoreError::reader_error("expected ')' after dotted tail"));
                    }
                    break;
                }
                let elem = self.atom(ctx, &token)?;
                self.append(ctx, &mut head, &mut tail, elem, saved)?;
                continue;
            }

            let elem = self.read_expr(ctx)?;
            self.append(ctx, &mut head, &mut tail, elem, saved)?;
        }
        ctx.restore_gc(saved);
        ctx.push_gc(head)?;
        Ok(head)
    }

    /// Link a new element onto the growing list, then collapse the root
    /// stack so only the list head stays protected.
    fn append(
        &mut self,
        ctx: &mut Context,
        head: &mut Value,
        tail: &mut Value,
        elem: Value,
        saved: usize,
    ) -> CoreResult<()> {
        let cell = ctx.cons(elem, Value::Nil)?;
        if tail.is_nil() {
            *head = cell;
        } else {
            ctx.set_cdr(*tail, cell)?;
        }
        *tail = cell;
        ctx.restore_gc(saved);
        ctx.push_gc(*head)
    }

    fn read_string(&mut self, ctx: &mut Context) -> CoreResult<Value> {
        let mut buf = String::new();
        loop {
            match self.chars.next() {
                None => return Err(CoreError::reader_error("unclosed string")),
                Some('"') => break,
                Some('\\') => match self.chars.next() {
                    Some('n') => buf.push('\n'),
                    Some('r') => buf.push('\r'),
                    Some('t') => buf.push('\t'),
                    Some('"') => buf.push('"'),
                    Some('\\') => buf.push('\\'),
                    Some(c) => {
                        return Err(CoreError::reader_error(format!(
                            "unknown escape '\\{c}' in string"
                        )));
                    }
                    None => return Err(CoreError::reader_error("unclosed string")),
                },
                Some(c) => buf.push(c),
            }
        }
        ctx.string(&buf)
    }

    fn read_token(&mut self) -> CoreResult<String> {
        let mut token = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_whitespace() || matches!(c, '(' | ')' | ';' | '"' | '\'') {
                break;
            }
            token.push(c);
            self.chars.next();
            if token.len() > MAX_SYMBOL_LEN {
                return Err(CoreError::reader_error("symbol too long"));
            }
        }
        Ok(token)
    }

    fn atom(&mut self, ctx: &mut Context, token: &str) -> CoreResult<Value> {
        match token {
            "nil" => Ok(Value::Nil),
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => {
                if let Ok(n) = token.parse::<f64>() {
                    ctx.number(n)
                } else {
                    ctx.intern(token)
                }
            }
        }
    }
}

impl Context {
    /// Read the first expression from a string. Convenience wrapper for
    /// hosts and tests; use [`Reader`] directly to pull several
    /// expressions from one source.
    pub fn read_str(&mut self, source: &str) -> CoreResult<Option<Value>> {
        Reader::new(source.chars()).read(self)
    }
}
