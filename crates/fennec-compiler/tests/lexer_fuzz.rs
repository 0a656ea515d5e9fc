//! Robustness: arbitrary printable input must lex and parse to a result,
//! never a panic or a hang.

use proptest::prelude::*;

use fennec_compiler::{Lexer, compile};
use fennec_core::Context;

proptest! {
    #[test]
    fn lexer_never_panics(src in "[ -~\n\t]{0,200}") {
        let _ = Lexer::new(&src).tokenize();
    }

    #[test]
    fn parser_never_panics(src in "[ -~\n\t]{0,200}") {
        let mut ctx = Context::new();
        let _ = compile(&mut ctx, &src);
    }

    #[test]
    fn identifier_heavy_input_round_trips(ident in "[a-z_][a-z0-9_]{0,20}") {
        let tokens = Lexer::new(&ident).tokenize().unwrap();
        prop_assert_eq!(tokens.len(), 2);
        prop_assert_eq!(tokens[0].lexeme.as_str(), ident.as_str());
    }
}
