//! Value writer
//!
//! Renders values back to text: fixnums through `itoa`, boxed doubles
//! through `ryu` (shortest round-trip form), lists with dotted-tail
//! notation. In quoted mode strings are written with their surrounding
//! quotes and escapes so that `read(write(v))` reproduces `v`; display
//! mode (used by `print`) writes string contents raw.

use std::fmt::Write as _;

use crate::context::Context;
use crate::heap::CellData;
use crate::value::Value;

impl Context {
    /// Render a value. `quote` selects quoted (read-back) or display form.
    pub fn write_value(&self, v: Value, quote: bool) -> String {
        let mut out = String::new();
        self.write_into(&mut out, v, quote);
        out
    }

    fn write_into(&self, out: &mut String, v: Value, quote: bool) {
        match v {
            Value::Nil => out.push_str("nil"),
            Value::Bool(true) => out.push_str("true"),
            Value::Bool(false) => out.push_str("false"),
            Value::Fixnum(n) => {
                let mut buf = itoa::Buffer::new();
                out.push_str(buf.format(n));
            }
            Value::Cell(r) => match &self.slot(r).data {
                CellData::Num(n) => {
                    if n.is_finite() {
                        let mut buf = ryu::Buffer::new();
                        out.push_str(buf.format(*n));
                    } else if n.is_nan() {
                        out.push_str("nan");
                    } else if *n > 0.0 {
                        out.push_str("inf");
                    } else {
                        out.push_str("-inf");
                    }
                }
                CellData::Str(s) => {
                    if quote {
                        out.push('"');
                        for c in s.chars() {
                            match c {
                                '\n' => out.push_str("\\n"),
                                '\r' => out.push_str("\\r"),
                                '\t' => out.push_str("\\t"),
                                '"' => out.push_str("\\\""),
                                '\\' => out.push_str("\\\\"),
                                _ => out.push(c),
                            }
                        }
                        out.push('"');
                    } else {
                        out.push_str(s);
                    }
                }
                CellData::Sym(s) => out.push_str(&s.name),
                CellData::Pair { .. } => self.write_list(out, v, quote),
                CellData::Func(_) => out.push_str("<function>"),
                CellData::Macro(_) => out.push_str("<macro>"),
                CellData::Prim(p) => {
                    let _ = write!(out, "<primitive {}>", p.name());
                }
                CellData::Native(_) => out.push_str("<native>"),
                CellData::Foreign(_) => out.push_str("<foreign>"),
                CellData::Free { .. } => out.push_str("<free>"),
            },
        }
    }

    fn write_list(&self, out: &mut String, v: Value, quote: bool) {
        out.push('(');
        let mut node = v;
        let mut first = true;
        loop {
            match self.pair_parts(node) {
                Some((car, cdr)) => {
                    if !first {
                        out.push(' ');
                    }
                    first = false;
                    self.write_into(out, car, quote);
                    node = cdr;
                }
                None => {
                    if !node.is_nil() {
                        out.push_str(" . ");
                        self.write_into(out, node, quote);
                    }
                    break;
                }
            }
        }
        out.push(')');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_round_trip() {
        let mut ctx = Context::new();
        for src in [
            "42",
            "-17",
            "3.25",
            "nil",
            "true",
            "false",
            "\"a\\tb\"",
            "(1 2 3)",
            "(a (b . c) \"d\")",
        ] {
            let v = ctx.read_str(src).unwrap().unwrap();
            let written = ctx.write_value(v, true);
            let again = ctx.read_str(&written).unwrap().unwrap();
            assert_eq!(written, ctx.write_value(again, true), "source: {src}");
        }
    }

    #[test]
    fn display_mode_writes_strings_raw() {
        let mut ctx = Context::new();
        let v = ctx.string("plain text").unwrap();
        assert_eq!(ctx.write_value(v, false), "plain text");
        assert_eq!(ctx.write_value(v, true), "\"plain text\"");
    }

    #[test]
    fn dotted_tail_notation() {
        let mut ctx = Context::new();
        let v = ctx.read_str("(1 2 . 3)").unwrap().unwrap();
        assert_eq!(ctx.write_value(v, true), "(1 2 . 3)");
    }
}
