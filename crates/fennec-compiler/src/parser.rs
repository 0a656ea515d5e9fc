//! Pratt parser for the modern syntax
//!
//! Emits pair trees in exactly the shape the core evaluator accepts, so
//! `let x = 1;` compiles to the same `(let x 1)` the S-expression reader
//! would produce. Precedence, ascending: assignment, logical-or,
//! logical-and, equality, comparison, term, factor, unary, call, primary.
//!
//! Desugarings: `a != b` → `(not (is a b))`; `a > b` → `(< b a)`;
//! `a >= b` → `(<= b a)`; `[a, b]` → `(list a b)`; `a.b` → `(get a b)`
//! with `b` unevaluated; `fn name(p) { body }` at statement position →
//! `(let name (fn (p) body'))`. A block or program with more than one
//! statement is wrapped in `(do …)`.
//!
//! Error recovery is panic mode: on a syntax error the parser records it
//! and skips to the next `;` or statement keyword, so one pass can report
//! the first error with the rest of the source still checked for shape.
//!
//! The growing program list is kept on the context's root stack, collapsed
//! to the list head at every statement boundary, so a collection triggered
//! by an AST allocation never frees a partially built tree.

use fennec_core::{Context, Value};

use crate::error::{CompileError, CompileResult};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::span::{Span, SpanTable};

/// Compile modern-syntax source into a core AST.
///
/// The result is left protected on the context's root stack, like any
/// other freshly constructed value.
pub fn compile(ctx: &mut Context, source: &str) -> CompileResult<Value> {
    Compiler::new(ctx, false).run(source).map(|(v, _)| v)
}

/// Compile with span recording enabled; returns the AST and the filled
/// span table.
pub fn compile_with_spans(ctx: &mut Context, source: &str) -> CompileResult<(Value, SpanTable)> {
    let (v, spans) = Compiler::new(ctx, true).run(source)?;
    Ok((v, spans.unwrap_or_default()))
}

/// Parser state over a lexed token stream.
pub struct Compiler<'a> {
    ctx: &'a mut Context,
    tokens: Vec<Token>,
    pos: usize,
    spans: Option<SpanTable>,
    errors: Vec<CompileError>,
}

impl<'a> Compiler<'a> {
    /// Create a compiler for one source unit.
    pub fn new(ctx: &'a mut Context, record_spans: bool) -> Self {
        Compiler {
            ctx,
            tokens: Vec::new(),
            pos: 0,
            spans: record_spans.then(SpanTable::new),
            errors: Vec::new(),
        }
    }

    fn run(mut self, source: &str) -> CompileResult<(Value, Option<SpanTable>)> {
        self.tokens = Lexer::new(source).tokenize()?;
        let mark = self.ctx.save_gc();
        let result = self.sequence(TokenKind::Eof);
        match result {
            Ok(program) if self.errors.is_empty() => {
                self.ctx.restore_gc(mark);
                self.ctx.push_gc(program)?;
                Ok((program, self.spans))
            }
            Ok(_) => {
                self.ctx.restore_gc(mark);
                Err(self.errors.remove(0))
            }
            Err(e) => {
                self.ctx.restore_gc(mark);
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Parse statements up to (not consuming) `end`; a single statement
    /// stands alone, several are wrapped in `(do …)`.
    fn sequence(&mut self, end: TokenKind) -> CompileResult<Value> {
        let mark = self.ctx.save_gc();
        let mut head = Value::Nil;
        let mut tail = Value::Nil;
        let mut count = 0usize;
        while !self.check(end) && !self.check(TokenKind::Eof) {
            match self.statement() {
                Ok(stmt) => {
                    let cell = self.ctx.cons(stmt, Value::Nil)?;
                    if tail.is_nil() {
                        head = cell;
                    } else {
                        self.ctx.set_cdr(tail, cell)?;
                    }
                    tail = cell;
                    count += 1;
                }
                Err(e) => {
                    self.errors.push(e);
                    let before = self.pos;
                    self.synchronize();
                    // Recovery must make progress: skip a token the
                    // synchronizer refused to cross (e.g. a stray brace).
                    if self.pos == before && !self.check(end) && !self.check(TokenKind::Eof) {
                        self.advance();
                    }
                }
            }
            self.ctx.restore_gc(mark);
            self.ctx.push_gc(head)?;
        }
        let result = if count == 1 {
            self.ctx.car(head)?
        } else {
            let do_sym = self.ctx.intern("do")?;
            self.ctx.cons(do_sym, head)?
        };
        self.ctx.restore_gc(mark);
        self.ctx.push_gc(result)?;
        Ok(result)
    }

    fn statement(&mut self) -> CompileResult<Value> {
        match self.peek_kind() {
            TokenKind::Let => self.let_decl(),
            TokenKind::Fn if self.peek_next_kind() == TokenKind::Identifier => self.fn_decl(),
            TokenKind::Return => self.return_stmt(),
            TokenKind::If => self.if_stmt(),
            TokenKind::While => self.while_stmt(),
            TokenKind::Module => self.module_stmt(),
            TokenKind::Export => self.export_stmt(),
            TokenKind::Import => self.import_stmt(),
            TokenKind::LeftBrace => {
                self.advance();
                let body = self.sequence(TokenKind::RightBrace)?;
                self.expect(TokenKind::RightBrace, "expected '}' after block")?;
                Ok(body)
            }
            _ => self.expression_stmt(),
        }
    }

    /// `let x = e;` → `(let x e)`
    fn let_decl(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        self.advance();
        let name_tok = self.expect(TokenKind::Identifier, "expected a name after 'let'")?;
        self.expect(TokenKind::Equal, "expected '=' after the name")?;
        let init = self.expression()?;
        self.expect(TokenKind::Semicolon, "expected ';' after declaration")?;
        let let_sym = self.ctx.intern("let")?;
        let name = self.ctx.intern(&name_tok.lexeme)?;
        self.emit(&[let_sym, name, init], start)
    }

    /// `fn name(p,…) { body }` → `(let name (fn (p …) body'))`
    fn fn_decl(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        self.advance();
        let name_tok = self.expect(TokenKind::Identifier, "expected a function name")?;
        let lambda = self.function_rest(start)?;
        let let_sym = self.ctx.intern("let")?;
        let name = self.ctx.intern(&name_tok.lexeme)?;
        self.emit(&[let_sym, name, lambda], start)
    }

    /// Parameter list and body of a function, shared by declarations and
    /// expressions. Emits `(fn (p …) body')`.
    fn function_rest(&mut self, start: (u32, u32)) -> CompileResult<Value> {
        self.expect(TokenKind::LeftParen, "expected '(' before parameters")?;
        // Parameters read left-to-right; symbols are immortal, so holding
        // them in a plain vector across allocations is safe.
        let mut params: Vec<Value> = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                let tok = self.expect(TokenKind::Identifier, "expected a parameter name")?;
                params.push(self.ctx.intern(&tok.lexeme)?);
                if !self.match_tok(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "expected ')' after parameters")?;
        let param_list = self.ctx.list(&params)?;
        self.expect(TokenKind::LeftBrace, "expected '{' before function body")?;
        let body = self.sequence(TokenKind::RightBrace)?;
        self.expect(TokenKind::RightBrace, "expected '}' after function body")?;
        let fn_sym = self.ctx.intern("fn")?;
        self.emit(&[fn_sym, param_list, body], start)
    }

    /// `return e;` / `return;` → `(return e)` / `(return)`
    fn return_stmt(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        self.advance();
        let ret = self.ctx.intern("return")?;
        if self.match_tok(TokenKind::Semicolon) {
            return self.emit(&[ret], start);
        }
        let value = self.expression()?;
        self.match_tok(TokenKind::Semicolon);
        self.emit(&[ret, value], start)
    }

    /// `if (c) s1 else s2` → `(if c s1 s2)`
    fn if_stmt(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        self.advance();
        self.expect(TokenKind::LeftParen, "expected '(' after 'if'")?;
        let cond = self.expression()?;
        self.expect(TokenKind::RightParen, "expected ')' after condition")?;
        let then = self.statement()?;
        let if_sym = self.ctx.intern("if")?;
        if self.match_tok(TokenKind::Else) {
            let alt = self.statement()?;
            self.emit(&[if_sym, cond, then, alt], start)
        } else {
            self.emit(&[if_sym, cond, then], start)
        }
    }

    /// `while (c) s` → `(while c s)`
    fn while_stmt(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        self.advance();
        self.expect(TokenKind::LeftParen, "expected '(' after 'while'")?;
        let cond = self.expression()?;
        self.expect(TokenKind::RightParen, "expected ')' after condition")?;
        let body = self.statement()?;
        let while_sym = self.ctx.intern("while")?;
        self.emit(&[while_sym, cond, body], start)
    }

    /// `module("n") { body }` → `(module "n" body')`
    fn module_stmt(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        self.advance();
        self.expect(TokenKind::LeftParen, "expected '(' after 'module'")?;
        let name_tok = self.expect(TokenKind::StringLit, "expected a module name string")?;
        self.expect(TokenKind::RightParen, "expected ')' after module name")?;
        self.expect(TokenKind::LeftBrace, "expected '{' before module body")?;
        let body = self.sequence(TokenKind::RightBrace)?;
        self.expect(TokenKind::RightBrace, "expected '}' after module body")?;
        let module_sym = self.ctx.intern("module")?;
        let name = self.ctx.string(&name_tok.lexeme)?;
        self.emit(&[module_sym, name, body], start)
    }

    /// `export decl` → `(export decl)`
    fn export_stmt(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        self.advance();
        let decl = match self.peek_kind() {
            TokenKind::Let => self.let_decl()?,
            TokenKind::Fn => self.fn_decl()?,
            _ => {
                let tok = self.peek().clone();
                return Err(CompileError::syntax(
                    "expected a let or fn declaration after 'export'",
                    tok.line,
                    tok.col,
                ));
            }
        };
        let export_sym = self.ctx.intern("export")?;
        self.emit(&[export_sym, decl], start)
    }

    /// `import n;` → `(import n)`
    fn import_stmt(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        self.advance();
        let name_tok = self.expect(TokenKind::Identifier, "expected a module name")?;
        self.expect(TokenKind::Semicolon, "expected ';' after import")?;
        let import_sym = self.ctx.intern("import")?;
        let name = self.ctx.intern(&name_tok.lexeme)?;
        self.emit(&[import_sym, name], start)
    }

    /// Expression statement; the terminating `;` may be omitted before a
    /// closing brace, `else`, or end of input.
    fn expression_stmt(&mut self) -> CompileResult<Value> {
        let expr = self.expression()?;
        self.match_tok(TokenKind::Semicolon);
        Ok(expr)
    }

    // ------------------------------------------------------------------
    // Expressions, by ascending precedence
    // ------------------------------------------------------------------

    fn expression(&mut self) -> CompileResult<Value> {
        self.assignment()
    }

    /// `x = e` → `(= x e)`; the target must be a plain name.
    fn assignment(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        let expr = self.or_expr()?;
        if self.match_tok(TokenKind::Equal) {
            if self.ctx.symbol_name(expr).is_none() {
                return Err(CompileError::invalid_assignment_target(start.0, start.1));
            }
            let value = self.assignment()?;
            let set = self.ctx.intern("=")?;
            return self.emit(&[set, expr, value], start);
        }
        Ok(expr)
    }

    fn or_expr(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        let mut expr = self.and_expr()?;
        while self.match_tok(TokenKind::Or) {
            let rhs = self.and_expr()?;
            let or_sym = self.ctx.intern("or")?;
            expr = self.emit(&[or_sym, expr, rhs], start)?;
        }
        Ok(expr)
    }

    fn and_expr(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        let mut expr = self.equality()?;
        while self.match_tok(TokenKind::And) {
            let rhs = self.equality()?;
            let and_sym = self.ctx.intern("and")?;
            expr = self.emit(&[and_sym, expr, rhs], start)?;
        }
        Ok(expr)
    }

    /// `a == b` → `(is a b)`; `a != b` → `(not (is a b))`
    fn equality(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        let mut expr = self.comparison()?;
        loop {
            if self.match_tok(TokenKind::EqualEqual) {
                let rhs = self.comparison()?;
                let is_sym = self.ctx.intern("is")?;
                expr = self.emit(&[is_sym, expr, rhs], start)?;
            } else if self.match_tok(TokenKind::BangEqual) {
                let rhs = self.comparison()?;
                let is_sym = self.ctx.intern("is")?;
                let inner = self.emit(&[is_sym, expr, rhs], start)?;
                let not_sym = self.ctx.intern("not")?;
                expr = self.emit(&[not_sym, inner], start)?;
            } else {
                return Ok(expr);
            }
        }
    }

    /// `<`/`<=` directly; `>`/`>=` swap their operands.
    fn comparison(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        let mut expr = self.term()?;
        loop {
            let (op, swapped) = match self.peek_kind() {
                TokenKind::Less => ("<", false),
                TokenKind::LessEqual => ("<=", false),
                TokenKind::Greater => ("<", true),
                TokenKind::GreaterEqual => ("<=", true),
                _ => return Ok(expr),
            };
            self.advance();
            let rhs = self.term()?;
            let op_sym = self.ctx.intern(op)?;
            expr = if swapped {
                self.emit(&[op_sym, rhs, expr], start)?
            } else {
                self.emit(&[op_sym, expr, rhs], start)?
            };
        }
    }

    fn term(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        let mut expr = self.factor()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => "+",
                TokenKind::Minus => "-",
                _ => return Ok(expr),
            };
            self.advance();
            let rhs = self.factor()?;
            let op_sym = self.ctx.intern(op)?;
            expr = self.emit(&[op_sym, expr, rhs], start)?;
        }
    }

    fn factor(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        let mut expr = self.unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => "*",
                TokenKind::Slash => "/",
                TokenKind::Percent => "mod",
                _ => return Ok(expr),
            };
            self.advance();
            let rhs = self.unary()?;
            let op_sym = self.ctx.intern(op)?;
            expr = self.emit(&[op_sym, expr, rhs], start)?;
        }
    }

    /// `-x` → `(- x)`; `!x` → `(not x)`
    fn unary(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        if self.match_tok(TokenKind::Minus) {
            let operand = self.unary()?;
            let minus = self.ctx.intern("-")?;
            return self.emit(&[minus, operand], start);
        }
        if self.match_tok(TokenKind::Bang) {
            let operand = self.unary()?;
            let not_sym = self.ctx.intern("not")?;
            return self.emit(&[not_sym, operand], start);
        }
        self.call()
    }

    /// Call and property-access chains: `f(a,b)` → `(f a b)`;
    /// `a.b` → `(get a b)` with the name unevaluated.
    fn call(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        let mut expr = self.primary()?;
        loop {
            if self.match_tok(TokenKind::LeftParen) {
                let mut items = vec![expr];
                if !self.check(TokenKind::RightParen) {
                    loop {
                        items.push(self.expression()?);
                        if !self.match_tok(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RightParen, "expected ')' after arguments")?;
                expr = self.emit(&items, start)?;
            } else if self.match_tok(TokenKind::Dot) {
                let name_tok =
                    self.expect(TokenKind::Identifier, "expected a property name after '.'")?;
                let get_sym = self.ctx.intern("get")?;
                let name = self.ctx.intern(&name_tok.lexeme)?;
                expr = self.emit(&[get_sym, expr, name], start)?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> CompileResult<Value> {
        let start = self.start_pos();
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                let n = parse_number(&tok.lexeme)
                    .ok_or_else(|| CompileError::syntax("malformed number", tok.line, tok.col))?;
                let v = self.ctx.number(n)?;
                self.record_span(v, start);
                Ok(v)
            }
            TokenKind::StringLit => {
                self.advance();
                let v = self.ctx.string(&tok.lexeme)?;
                self.record_span(v, start);
                Ok(v)
            }
            TokenKind::True => {
                self.advance();
                Ok(Value::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Value::Bool(false))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Value::Nil)
            }
            TokenKind::Identifier => {
                self.advance();
                self.ctx.intern(&tok.lexeme).map_err(Into::into)
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(TokenKind::RightParen, "expected ')' after expression")?;
                Ok(expr)
            }
            TokenKind::LeftBracket => {
                self.advance();
                let list_sym = self.ctx.intern("list")?;
                let mut items = vec![list_sym];
                if !self.check(TokenKind::RightBracket) {
                    loop {
                        items.push(self.expression()?);
                        if !self.match_tok(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RightBracket, "expected ']' after list literal")?;
                self.emit(&items, start)
            }
            TokenKind::Fn => {
                self.advance();
                self.function_rest(start)
            }
            _ => Err(CompileError::syntax(
                format!("unexpected token '{}'", describe(&tok)),
                tok.line,
                tok.col,
            )),
        }
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn peek_next_kind(&self) -> TokenKind {
        self.tokens
            .get(self.pos + 1)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn match_tok(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, msg: &str) -> CompileResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let tok = self.peek();
            Err(CompileError::syntax(
                format!("{msg}, found '{}'", describe(tok)),
                tok.line,
                tok.col,
            ))
        }
    }

    /// Skip to the next statement boundary after a syntax error.
    fn synchronize(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof | TokenKind::RightBrace => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::Fn
                | TokenKind::Let
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Return
                | TokenKind::Module
                | TokenKind::Export
                | TokenKind::Import => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn start_pos(&self) -> (u32, u32) {
        let tok = self.peek();
        (tok.line, tok.col)
    }

    fn prev_end(&self) -> (u32, u32) {
        let tok = &self.tokens[self.pos.saturating_sub(1)];
        (tok.end_line, tok.end_col)
    }

    /// Build a list form and record its span.
    fn emit(&mut self, items: &[Value], start: (u32, u32)) -> CompileResult<Value> {
        let v = self.ctx.list(items)?;
        self.record_span(v, start);
        Ok(v)
    }

    fn record_span(&mut self, v: Value, start: (u32, u32)) {
        let end = self.prev_end();
        if let Some(table) = &mut self.spans {
            table.insert(
                v,
                Span {
                    line: start.0,
                    col: start.1,
                    end_line: end.0,
                    end_col: end.1,
                },
            );
        }
    }
}

/// Numeric literal: `0x` hex or decimal with optional fraction/exponent.
fn parse_number(lexeme: &str) -> Option<f64> {
    if let Some(hex) = lexeme.strip_prefix("0x").or_else(|| lexeme.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok().map(|n| n as f64)
    } else {
        lexeme.parse().ok()
    }
}

fn describe(tok: &Token) -> String {
    if tok.kind == TokenKind::Eof {
        "end of input".to_string()
    } else {
        tok.lexeme.clone()
    }
}
