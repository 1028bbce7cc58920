//! Lexer for Vela.
//!
//! Converts source text into a finite token stream ending in `EndOfInput`,
//! with whitespace and comments attached as trivia. Lexing is a pure
//! function of the source: the same text always produces the same tokens.
//!
//! # String handling
//!
//! Strings use the `n`-hash rule: `#`×n `"` opens a line string closed by
//! `"` `#`×n, and `#`×n `"""` opens a multi-line string closed by `"""`
//! `#`×n. Interpolations open with `\{` (with the matching hash count) and
//! close at the balancing `}`; the scanner lexes ordinary tokens inside
//! them, nesting arbitrarily. Multi-line strings emit one `StringNewline`
//! per line break; indentation handling belongs to the parser and binder,
//! which read the open quote's trailing and the close quote's leading
//! trivia.
//!
//! # Error handling
//!
//! The lexer never fails. Invalid characters become `Skipped` trivia with a
//! diagnostic; unterminated strings pop their mode and let the parser
//! synthesize the missing delimiter.

mod cursor;
mod escape;
mod scanner;

pub use scanner::LexOutput;

use vela_syntax::StringInterner;

/// Lex source text into tokens and diagnostics.
///
/// The returned stream always ends with an `EndOfInput` token; diagnostics
/// are keyed by the index of the token they attach to.
pub fn lex(source: &str, interner: &StringInterner) -> LexOutput {
    scanner::Scanner::new(source, interner).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_syntax::{Token, TokenKind, TokenValue, TriviaKind};

    fn kinds(source: &str) -> Vec<TokenKind> {
        let interner = StringInterner::new();
        lex(source, &interner).tokens.iter().map(|t| t.kind).collect()
    }

    fn round_trip(source: &str) {
        let interner = StringInterner::new();
        let output = lex(source, &interner);
        let mut text = String::new();
        for token in &output.tokens {
            for trivium in &token.leading {
                text.push_str(interner.lookup(trivium.text));
            }
            text.push_str(interner.lookup(token.text));
            for trivium in &token.trailing {
                text.push_str(interner.lookup(trivium.text));
            }
        }
        assert_eq!(text, source, "lexed tokens must reconstruct the input");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(kinds(""), vec![TokenKind::EndOfInput]);
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("func main varx"),
            vec![
                TokenKind::KeywordFunc,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn test_all_keywords() {
        let source = "and else false func goto if import internal mod module not or public rem return true val var while";
        let expected = [
            TokenKind::KeywordAnd,
            TokenKind::KeywordElse,
            TokenKind::KeywordFalse,
            TokenKind::KeywordFunc,
            TokenKind::KeywordGoto,
            TokenKind::KeywordIf,
            TokenKind::KeywordImport,
            TokenKind::KeywordInternal,
            TokenKind::KeywordMod,
            TokenKind::KeywordModule,
            TokenKind::KeywordNot,
            TokenKind::KeywordOr,
            TokenKind::KeywordPublic,
            TokenKind::KeywordRem,
            TokenKind::KeywordReturn,
            TokenKind::KeywordTrue,
            TokenKind::KeywordVal,
            TokenKind::KeywordVar,
            TokenKind::KeywordWhile,
        ];
        let lexed = kinds(source);
        for (i, kind) in expected.iter().enumerate() {
            assert_eq!(&lexed[i], kind, "keyword at index {i}");
        }
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("+ += - -= * *= / /= = == != < <= > >= ..."),
            vec![
                TokenKind::Plus,
                TokenKind::PlusAssign,
                TokenKind::Minus,
                TokenKind::MinusAssign,
                TokenKind::Star,
                TokenKind::StarAssign,
                TokenKind::Slash,
                TokenKind::SlashAssign,
                TokenKind::Assign,
                TokenKind::Equal,
                TokenKind::NotEqual,
                TokenKind::LessThan,
                TokenKind::LessEqual,
                TokenKind::GreaterThan,
                TokenKind::GreaterEqual,
                TokenKind::Ellipsis,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn test_int_literals() {
        let interner = StringInterner::new();
        let output = lex("42 1_000 0xFF", &interner);
        assert_eq!(output.tokens[0].value, Some(TokenValue::Int(42)));
        assert_eq!(output.tokens[1].value, Some(TokenValue::Int(1_000)));
        assert_eq!(output.tokens[2].value, Some(TokenValue::Int(255)));
    }

    #[test]
    fn test_float_literals() {
        let interner = StringInterner::new();
        let output = lex("3.5 2.5e10", &interner);
        assert_eq!(output.tokens[0].value, Some(TokenValue::Float(3.5f64.to_bits())));
        assert_eq!(
            output.tokens[1].value,
            Some(TokenValue::Float(2.5e10f64.to_bits()))
        );
    }

    #[test]
    fn test_int_dot_member_is_not_float() {
        assert_eq!(
            kinds("1.abs"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn test_char_literals() {
        let interner = StringInterner::new();
        let output = lex(r"'a' '\n' '\''", &interner);
        assert_eq!(output.tokens[0].value, Some(TokenValue::Char('a')));
        assert_eq!(output.tokens[1].value, Some(TokenValue::Char('\n')));
        assert_eq!(output.tokens[2].value, Some(TokenValue::Char('\'')));
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_trailing_trivia_owns_newline() {
        let interner = StringInterner::new();
        let output = lex("a  \nb", &interner);
        let a = &output.tokens[0];
        assert_eq!(a.trailing.len(), 2);
        assert_eq!(a.trailing[0].kind, TriviaKind::Whitespace);
        assert_eq!(a.trailing[1].kind, TriviaKind::Newline);
        let b = &output.tokens[1];
        assert!(b.leading.is_empty());
        round_trip("a  \nb");
    }

    #[test]
    fn test_comment_leads_next_token() {
        let interner = StringInterner::new();
        let output = lex("a // note\nb", &interner);
        let a = &output.tokens[0];
        // `a` is followed by a space then a comment: nothing trails.
        assert!(a.trailing.is_empty());
        let b = &output.tokens[1];
        let kinds: Vec<TriviaKind> = b.leading.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TriviaKind::Whitespace,
                TriviaKind::LineComment,
                TriviaKind::Newline,
            ]
        );
        round_trip("a // note\nb");
    }

    #[test]
    fn test_doc_comment_trivia() {
        let interner = StringInterner::new();
        let output = lex("/// docs\nfunc", &interner);
        assert_eq!(output.tokens[0].leading[0].kind, TriviaKind::DocComment);
    }

    #[test]
    fn test_invalid_char_becomes_skipped_trivia() {
        let interner = StringInterner::new();
        let output = lex("a $ b", &interner);
        assert_eq!(
            output.tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::EndOfInput,
            ]
        );
        let b = &output.tokens[1];
        assert!(b.leading.iter().any(|t| t.kind == TriviaKind::Skipped));
        assert_eq!(output.diagnostics.len(), 1);
        round_trip("a $ b");
    }

    #[test]
    fn test_line_string() {
        let interner = StringInterner::new();
        let output = lex(r#""hello""#, &interner);
        assert_eq!(
            output.tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::LineStringStart,
                TokenKind::StringContent,
                TokenKind::LineStringEnd,
                TokenKind::EndOfInput,
            ]
        );
        let content = &output.tokens[1];
        assert_eq!(
            content.value,
            Some(TokenValue::String(interner.intern("hello")))
        );
    }

    #[test]
    fn test_line_string_escapes_decoded() {
        let interner = StringInterner::new();
        let output = lex(r#""a\nb""#, &interner);
        let content = &output.tokens[1];
        assert_eq!(content.value, Some(TokenValue::String(interner.intern("a\nb"))));
        // Raw text is preserved for round-tripping.
        assert_eq!(interner.lookup(content.text), r"a\nb");
    }

    #[test]
    fn test_raw_string_hash_rule() {
        let interner = StringInterner::new();
        let output = lex(r##"#"a\nb"#"##, &interner);
        let content = &output.tokens[1];
        // Under one hash, `\n` is two literal characters.
        assert_eq!(
            content.value,
            Some(TokenValue::String(interner.intern(r"a\nb")))
        );
        let output = lex(r##"#"a\#tb"#"##, &interner);
        let content = &output.tokens[1];
        assert_eq!(
            content.value,
            Some(TokenValue::String(interner.intern("a\tb")))
        );
    }

    #[test]
    fn test_interpolation() {
        let interner = StringInterner::new();
        let output = lex(r#""x = \{1 + 2}""#, &interner);
        assert_eq!(
            output.tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::LineStringStart,
                TokenKind::StringContent,
                TokenKind::InterpolationStart,
                TokenKind::IntLiteral,
                TokenKind::Plus,
                TokenKind::IntLiteral,
                TokenKind::InterpolationEnd,
                TokenKind::LineStringEnd,
                TokenKind::EndOfInput,
            ]
        );
        round_trip(r#""x = \{1 + 2}""#);
    }

    #[test]
    fn test_interpolation_tracks_brace_depth() {
        let interner = StringInterner::new();
        let output = lex(r#""v: \{ { 1 } }""#, &interner);
        let kinds: Vec<TokenKind> = output.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::LineStringStart,
                TokenKind::StringContent,
                TokenKind::InterpolationStart,
                TokenKind::CurlyOpen,
                TokenKind::IntLiteral,
                TokenKind::CurlyClose,
                TokenKind::InterpolationEnd,
                TokenKind::LineStringEnd,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn test_nested_string_in_interpolation() {
        round_trip(r#""outer \{"inner"} done""#);
    }

    #[test]
    fn test_unterminated_line_string() {
        let interner = StringInterner::new();
        let output = lex("\"abc\nx", &interner);
        assert!(output
            .diagnostics
            .iter()
            .any(|(_, d)| d.code() == vela_diagnostic::ErrorCode::E0003));
        // The newline and following tokens still lex.
        assert!(output
            .tokens
            .iter()
            .any(|t| t.kind == TokenKind::Identifier));
        round_trip("\"abc\nx");
    }

    #[test]
    fn test_multi_line_string() {
        let interner = StringInterner::new();
        let source = "\"\"\"\n  foo\n  bar\n  \"\"\"";
        let output = lex(source, &interner);
        let kinds: Vec<TokenKind> = output.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::MultiLineStringStart,
                TokenKind::StringContent,
                TokenKind::StringNewline,
                TokenKind::StringContent,
                TokenKind::StringNewline,
                TokenKind::MultiLineStringEnd,
                TokenKind::EndOfInput,
            ]
        );
        // Open quote owns the first line break as trailing trivia.
        let open = &output.tokens[0];
        assert_eq!(open.trailing.last().map(|t| t.kind), Some(TriviaKind::Newline));
        // Close quote owns its indentation as leading trivia.
        let close = &output.tokens[5];
        assert_eq!(close.leading.len(), 1);
        assert_eq!(close.leading[0].kind, TriviaKind::Whitespace);
        assert_eq!(interner.lookup(close.leading[0].text), "  ");
        round_trip(source);
    }

    #[test]
    fn test_multi_line_string_round_trips_crlf() {
        round_trip("\"\"\"\r\n  one\r\n  two\r\n  \"\"\"");
    }

    #[test]
    fn test_determinism() {
        let source = "func main() { val s = \"a\\{1}b\"; }";
        let interner = StringInterner::new();
        let first: Vec<Token> = lex(source, &interner).tokens;
        let second: Vec<Token> = lex(source, &interner).tokens;
        assert_eq!(first, second);
    }

    #[test]
    fn test_round_trip_program() {
        round_trip("func main() {\n    var x: int32 = 1 + 2 * 3;\n    // done\n}\n");
    }
}
