//! The modal scanner.
//!
//! A mode stack tracks string and interpolation nesting:
//!
//! - empty stack: normal token scanning
//! - `LineString(n)` / `MultiLineString(n)`: string content scanning under
//!   the `n`-hash delimiter rule
//! - `Interpolation`: normal scanning inside `\{…}`, with brace depth
//!   tracking so nested blocks don't end the interpolation early
//!
//! The scanner owns trivia attachment: a run of horizontal whitespace
//! followed by a line break trails the previous token; everything else
//! (comments included) leads the next one. Invalid input becomes `Skipped`
//! trivia plus a diagnostic — the scanner never fails and always finishes
//! with `EndOfInput`.

use vela_diagnostic::{Diagnostic, ErrorCode, Span};
use vela_syntax::{Name, StringInterner, Token, TokenKind, TokenValue, TriviaKind, Trivium};

use crate::cursor::Cursor;
use crate::escape::{decode_escape, Escape};

/// Lexing mode, one stack entry per open string or interpolation.
#[derive(Clone, Copy, Debug)]
enum Mode {
    LineString { hashes: u32 },
    MultiLineString { hashes: u32 },
    Interpolation { depth: u32 },
}

/// Lexer output: the token stream plus diagnostics keyed by token index.
pub struct LexOutput {
    /// All tokens; the last one is always `EndOfInput`.
    pub tokens: Vec<Token>,
    /// Diagnostics, each keyed by the index of the token it belongs to.
    pub diagnostics: Vec<(usize, Diagnostic)>,
}

pub(crate) struct Scanner<'a> {
    cursor: Cursor<'a>,
    interner: &'a StringInterner,
    modes: Vec<Mode>,
    tokens: Vec<Token>,
    diagnostics: Vec<(usize, Diagnostic)>,
    /// Leading trivia collected for the next token.
    pending: Vec<Trivium>,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(source: &'a str, interner: &'a StringInterner) -> Self {
        Scanner {
            cursor: Cursor::new(source),
            interner,
            modes: Vec::new(),
            tokens: Vec::new(),
            diagnostics: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub(crate) fn run(mut self) -> LexOutput {
        loop {
            match self.modes.last().copied() {
                None | Some(Mode::Interpolation { .. }) => {
                    self.collect_leading_trivia();
                    if self.cursor.is_eof() {
                        if !self.modes.is_empty() {
                            self.modes.clear();
                        }
                        self.emit(TokenKind::EndOfInput, self.cursor.pos(), None, false);
                        break;
                    }
                    self.scan_normal();
                }
                Some(Mode::LineString { hashes }) => self.scan_line_string(hashes),
                Some(Mode::MultiLineString { hashes }) => self.scan_multi_line_string(hashes),
            }
        }
        LexOutput {
            tokens: self.tokens,
            diagnostics: self.diagnostics,
        }
    }

    // ─── Trivia ────────────────────────────────────────────────────

    fn intern_range(&self, start: u32, end: u32) -> (Name, u32) {
        (self.interner.intern(self.cursor.slice(start, end)), end - start)
    }

    fn push_trivium(&mut self, kind: TriviaKind, start: u32) {
        let (text, width) = self.intern_range(start, self.cursor.pos());
        self.pending.push(Trivium::new(kind, text, width));
    }

    /// Collect whitespace, newlines, and comments as leading trivia of the
    /// next token.
    fn collect_leading_trivia(&mut self) {
        loop {
            let start = self.cursor.pos();
            if self.cursor.eat_horizontal_whitespace() > 0 {
                self.push_trivium(TriviaKind::Whitespace, start);
                continue;
            }
            if self.cursor.eat_newline() > 0 {
                self.push_trivium(TriviaKind::Newline, start);
                continue;
            }
            if self.cursor.matches(b"//") {
                let kind = if self.cursor.matches(b"///") {
                    TriviaKind::DocComment
                } else {
                    TriviaKind::LineComment
                };
                self.cursor.eat_to_line_end();
                self.push_trivium(kind, start);
                continue;
            }
            break;
        }
    }

    /// Scan a run of horizontal whitespace and, if a newline follows,
    /// attach both as trailing trivia of the token just emitted. Without a
    /// newline the whitespace is left for the next token's leading trivia.
    fn scan_trailing_trivia(&mut self) {
        let save = self.cursor.pos();
        let ws_start = self.cursor.pos();
        self.cursor.eat_horizontal_whitespace();
        let ws_end = self.cursor.pos();
        let nl_start = self.cursor.pos();
        if self.cursor.eat_newline() == 0 {
            self.cursor.set_pos(save);
            return;
        }
        let token = self.tokens.last_mut().expect("trailing scan without token");
        if ws_end > ws_start {
            let text = self.interner.intern(self.cursor.slice(ws_start, ws_end));
            token
                .trailing
                .push(Trivium::new(TriviaKind::Whitespace, text, ws_end - ws_start));
        }
        let nl_end = self.cursor.pos();
        let text = self.interner.intern(self.cursor.slice(nl_start, nl_end));
        token
            .trailing
            .push(Trivium::new(TriviaKind::Newline, text, nl_end - nl_start));
    }

    fn report(&mut self, code: ErrorCode, message: String, span: Span) {
        // Keyed by the token the problem will attach to: the next one to be
        // emitted, or the last one when it already exists.
        let index = self.tokens.len();
        self.diagnostics
            .push((index, Diagnostic::error(code, message, span)));
    }

    // ─── Token emission ────────────────────────────────────────────

    fn emit(&mut self, kind: TokenKind, start: u32, value: Option<TokenValue>, trailing: bool) {
        let (text, width) = self.intern_range(start, self.cursor.pos());
        let mut token = Token::new(kind, text, width);
        token.value = value;
        token.leading = std::mem::take(&mut self.pending);
        self.tokens.push(token);
        if trailing {
            self.scan_trailing_trivia();
        }
    }

    // ─── Normal mode ───────────────────────────────────────────────

    fn scan_normal(&mut self) {
        let start = self.cursor.pos();
        let byte = self.cursor.peek();
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_identifier(start),
            b'0'..=b'9' => self.scan_number(start),
            b'\'' => self.scan_char_literal(start),
            b'"' | b'#' => self.scan_string_open(start),
            b'(' => self.single(start, TokenKind::ParenOpen),
            b')' => self.single(start, TokenKind::ParenClose),
            b'[' => self.single(start, TokenKind::BracketOpen),
            b']' => self.single(start, TokenKind::BracketClose),
            b'{' => {
                if let Some(Mode::Interpolation { depth }) = self.modes.last_mut() {
                    *depth += 1;
                }
                self.single(start, TokenKind::CurlyOpen);
            }
            b'}' => match self.modes.last_mut() {
                Some(Mode::Interpolation { depth: 0 }) => {
                    self.cursor.advance(1);
                    // Content resumes immediately: no trailing scan.
                    self.emit(TokenKind::InterpolationEnd, start, None, false);
                    self.modes.pop();
                }
                Some(Mode::Interpolation { depth }) => {
                    *depth -= 1;
                    self.single(start, TokenKind::CurlyClose);
                }
                _ => self.single(start, TokenKind::CurlyClose),
            },
            b',' => self.single(start, TokenKind::Comma),
            b':' => self.single(start, TokenKind::Colon),
            b';' => self.single(start, TokenKind::Semicolon),
            b'.' => {
                if self.cursor.matches(b"...") {
                    self.cursor.advance(3);
                    self.emit(TokenKind::Ellipsis, start, None, true);
                } else {
                    self.single(start, TokenKind::Dot);
                }
            }
            b'+' => self.operator_with_assign(start, TokenKind::Plus, TokenKind::PlusAssign),
            b'-' => self.operator_with_assign(start, TokenKind::Minus, TokenKind::MinusAssign),
            b'*' => self.operator_with_assign(start, TokenKind::Star, TokenKind::StarAssign),
            b'/' => self.operator_with_assign(start, TokenKind::Slash, TokenKind::SlashAssign),
            b'=' => self.operator_with_assign(start, TokenKind::Assign, TokenKind::Equal),
            b'<' => self.operator_with_assign(start, TokenKind::LessThan, TokenKind::LessEqual),
            b'>' => {
                self.operator_with_assign(start, TokenKind::GreaterThan, TokenKind::GreaterEqual);
            }
            b'!' => {
                if self.cursor.peek_at(1) == b'=' {
                    self.cursor.advance(2);
                    self.emit(TokenKind::NotEqual, start, None, true);
                } else {
                    self.skip_invalid_char(start);
                }
            }
            _ => self.skip_invalid_char(start),
        }
    }

    fn single(&mut self, start: u32, kind: TokenKind) {
        self.cursor.advance(1);
        self.emit(kind, start, None, true);
    }

    /// Emit `base`, or `with_eq` when the next byte is `=`.
    fn operator_with_assign(&mut self, start: u32, base: TokenKind, with_eq: TokenKind) {
        self.cursor.advance(1);
        if self.cursor.peek() == b'=' {
            self.cursor.advance(1);
            self.emit(with_eq, start, None, true);
        } else {
            self.emit(base, start, None, true);
        }
    }

    fn skip_invalid_char(&mut self, start: u32) {
        let ch = self.cursor.peek_char().unwrap_or('\u{FFFD}');
        self.cursor.advance(ch.len_utf8() as u32);
        let span = Span::new(start, self.cursor.pos());
        self.report(
            ErrorCode::E0001,
            format!("unexpected character `{}`", ch.escape_default()),
            span,
        );
        self.push_trivium(TriviaKind::Skipped, start);
    }

    fn scan_identifier(&mut self, start: u32) {
        self.cursor
            .eat_while(|b| b.is_ascii_alphanumeric() || b == b'_');
        let text = self.cursor.slice(start, self.cursor.pos());
        let kind = TokenKind::keyword(text).unwrap_or(TokenKind::Identifier);
        self.emit(kind, start, None, true);
    }

    fn scan_number(&mut self, start: u32) {
        if self.cursor.matches(b"0x") || self.cursor.matches(b"0X") {
            self.cursor.advance(2);
            self.cursor
                .eat_while(|b| b.is_ascii_hexdigit() || b == b'_');
            let digits: String = self
                .cursor
                .slice(start + 2, self.cursor.pos())
                .chars()
                .filter(|&c| c != '_')
                .collect();
            let value = match i64::from_str_radix(&digits, 16) {
                Ok(v) => v,
                Err(_) => {
                    let span = Span::new(start, self.cursor.pos());
                    self.report(
                        ErrorCode::E0004,
                        format!("invalid integer literal `{}`", self.cursor.slice(start, self.cursor.pos())),
                        span,
                    );
                    0
                }
            };
            self.emit(TokenKind::IntLiteral, start, Some(TokenValue::Int(value)), true);
            return;
        }

        self.cursor.eat_while(|b| b.is_ascii_digit() || b == b'_');

        let mut is_float = false;
        if self.cursor.peek() == b'.' && self.cursor.peek_at(1).is_ascii_digit() {
            is_float = true;
            self.cursor.advance(1);
            self.cursor.eat_while(|b| b.is_ascii_digit() || b == b'_');
        }
        if matches!(self.cursor.peek(), b'e' | b'E') {
            let sign = matches!(self.cursor.peek_at(1), b'+' | b'-');
            let digit_at = if sign { 2 } else { 1 };
            if self.cursor.peek_at(digit_at).is_ascii_digit() {
                is_float = true;
                self.cursor.advance(digit_at);
                self.cursor.eat_while(|b| b.is_ascii_digit() || b == b'_');
            }
        }

        let raw: String = self
            .cursor
            .slice(start, self.cursor.pos())
            .chars()
            .filter(|&c| c != '_')
            .collect();
        if is_float {
            let value = raw.parse::<f64>().unwrap_or_else(|_| {
                // Digit shape is already validated; parse can only fail on
                // range, which f64 maps to infinity rather than Err.
                f64::INFINITY
            });
            self.emit(
                TokenKind::FloatLiteral,
                start,
                Some(TokenValue::Float(value.to_bits())),
                true,
            );
        } else {
            let value = match raw.parse::<i64>() {
                Ok(v) => v,
                Err(_) => {
                    let span = Span::new(start, self.cursor.pos());
                    self.report(
                        ErrorCode::E0004,
                        format!("integer literal `{raw}` out of range"),
                        span,
                    );
                    0
                }
            };
            self.emit(TokenKind::IntLiteral, start, Some(TokenValue::Int(value)), true);
        }
    }

    fn scan_char_literal(&mut self, start: u32) {
        self.cursor.advance(1);
        let value = match self.cursor.peek() {
            0 | b'\n' | b'\r' => None,
            b'\\' => {
                let text_from = self.cursor.pos();
                let remaining = self.remaining_from(text_from);
                match decode_escape(remaining, 0, 0) {
                    Escape::Char(c, width) => {
                        self.cursor.advance(width);
                        Some(c)
                    }
                    Escape::Invalid(width) => {
                        let span = Span::new(text_from, text_from + width);
                        self.cursor.advance(width);
                        self.report(
                            ErrorCode::E0002,
                            "invalid escape sequence in character literal".to_string(),
                            span,
                        );
                        None
                    }
                }
            }
            _ => {
                let c = self.cursor.peek_char();
                if let Some(c) = c {
                    self.cursor.advance(c.len_utf8() as u32);
                }
                c
            }
        };
        if self.cursor.peek() == b'\'' {
            self.cursor.advance(1);
        } else {
            let span = Span::new(start, self.cursor.pos());
            self.report(
                ErrorCode::E0004,
                "unterminated character literal".to_string(),
                span,
            );
        }
        self.emit(
            TokenKind::CharLiteral,
            start,
            value.map(TokenValue::Char),
            true,
        );
    }

    fn remaining_from(&self, pos: u32) -> &'a str {
        self.cursor.slice_from(pos)
    }

    // ─── String open ───────────────────────────────────────────────

    fn scan_string_open(&mut self, start: u32) {
        let hashes = self.cursor.eat_while(|b| b == b'#');
        if self.cursor.peek() != b'"' {
            // A hash run with no quote is not a token.
            let span = Span::new(start, self.cursor.pos());
            self.report(
                ErrorCode::E0001,
                "unexpected character `#`".to_string(),
                span,
            );
            self.push_trivium(TriviaKind::Skipped, start);
            return;
        }
        if self.cursor.matches(b"\"\"\"") {
            self.cursor.advance(3);
            // The rest of the open line (spaces + newline) trails the open
            // quotes; the first line break is therefore trivia, not content.
            self.emit(TokenKind::MultiLineStringStart, start, None, true);
            self.modes.push(Mode::MultiLineString { hashes });
        } else {
            self.cursor.advance(1);
            // Content starts immediately after the quote.
            self.emit(TokenKind::LineStringStart, start, None, false);
            self.modes.push(Mode::LineString { hashes });
        }
    }

    // ─── String content modes ──────────────────────────────────────

    /// True when the cursor sits at the closing delimiter for `hashes`.
    fn at_close(&self, quotes: u32, hashes: u32) -> bool {
        for i in 0..quotes {
            if self.cursor.peek_at(i) != b'"' {
                return false;
            }
        }
        for i in 0..hashes {
            if self.cursor.peek_at(quotes + i) != b'#' {
                return false;
            }
        }
        true
    }

    /// True when the cursor sits at an escape intro (`\` + `hashes` hashes).
    fn at_escape(&self, hashes: u32) -> bool {
        if self.cursor.peek() != b'\\' {
            return false;
        }
        (0..hashes).all(|i| self.cursor.peek_at(1 + i) == b'#')
    }

    fn flush_content(&mut self, start: u32, value: &mut String) {
        if self.cursor.pos() > start {
            let decoded = self.interner.intern(value);
            self.emit(
                TokenKind::StringContent,
                start,
                Some(TokenValue::String(decoded)),
                false,
            );
            value.clear();
        }
    }

    fn scan_line_string(&mut self, hashes: u32) {
        let start = self.cursor.pos();
        let mut value = String::new();
        loop {
            if self.cursor.is_eof() || self.cursor.peek() == b'\n' || self.cursor.peek() == b'\r' {
                let span = Span::new(start, self.cursor.pos());
                self.flush_content(start, &mut value);
                self.report(
                    ErrorCode::E0003,
                    "unterminated string literal".to_string(),
                    span,
                );
                self.modes.pop();
                return;
            }
            if self.at_close(1, hashes) {
                self.flush_content(start, &mut value);
                let close_start = self.cursor.pos();
                self.cursor.advance(1 + hashes);
                self.emit(TokenKind::LineStringEnd, close_start, None, true);
                self.modes.pop();
                return;
            }
            if self.at_escape(hashes) {
                if self.cursor.peek_at(1 + hashes) == b'{' {
                    self.flush_content(start, &mut value);
                    let open_start = self.cursor.pos();
                    self.cursor.advance(2 + hashes);
                    self.emit(TokenKind::InterpolationStart, open_start, None, false);
                    self.modes.push(Mode::Interpolation { depth: 0 });
                    return;
                }
                self.consume_escape(hashes, &mut value);
                continue;
            }
            self.consume_content_char(&mut value);
        }
    }

    fn scan_multi_line_string(&mut self, hashes: u32) {
        let mut run_start = self.cursor.pos();
        let mut value = String::new();
        loop {
            if self.cursor.is_eof() {
                let span = Span::new(run_start, self.cursor.pos());
                self.flush_content(run_start, &mut value);
                self.report(
                    ErrorCode::E0003,
                    "unterminated multi-line string literal".to_string(),
                    span,
                );
                self.modes.pop();
                return;
            }
            if self.cursor.peek() == b'\n' || self.cursor.peek() == b'\r' {
                self.flush_content(run_start, &mut value);
                let nl_start = self.cursor.pos();
                self.cursor.eat_newline();
                let newline = self.interner.intern("\n");
                self.emit(
                    TokenKind::StringNewline,
                    nl_start,
                    Some(TokenValue::String(newline)),
                    false,
                );
                run_start = self.cursor.pos();
                continue;
            }
            if self.at_close(3, hashes) {
                // Indentation before closing quotes that stands alone on
                // its line becomes the close token's leading trivia; the
                // parser reads it as the required prefix.
                let run = self.cursor.slice(run_start, self.cursor.pos());
                let at_line_start = matches!(
                    self.tokens.last().map(|t| t.kind),
                    Some(TokenKind::StringNewline | TokenKind::MultiLineStringStart)
                );
                if at_line_start && !run.is_empty() && run.bytes().all(|b| b == b' ' || b == b'\t')
                {
                    let (text, width) = self.intern_range(run_start, self.cursor.pos());
                    self.pending
                        .push(Trivium::new(TriviaKind::Whitespace, text, width));
                    value.clear();
                } else {
                    self.flush_content(run_start, &mut value);
                }
                let close_start = self.cursor.pos();
                self.cursor.advance(3 + hashes);
                self.emit(TokenKind::MultiLineStringEnd, close_start, None, true);
                self.modes.pop();
                return;
            }
            if self.at_escape(hashes) {
                if self.cursor.peek_at(1 + hashes) == b'{' {
                    self.flush_content(run_start, &mut value);
                    let open_start = self.cursor.pos();
                    self.cursor.advance(2 + hashes);
                    self.emit(TokenKind::InterpolationStart, open_start, None, false);
                    self.modes.push(Mode::Interpolation { depth: 0 });
                    return;
                }
                self.consume_escape(hashes, &mut value);
                continue;
            }
            self.consume_content_char(&mut value);
        }
    }

    fn consume_escape(&mut self, hashes: u32, value: &mut String) {
        let pos = self.cursor.pos();
        let remaining = self.remaining_from(pos);
        match decode_escape(remaining, 0, hashes) {
            Escape::Char(c, width) => {
                self.cursor.advance(width);
                value.push(c);
            }
            Escape::Invalid(width) => {
                let span = Span::new(pos, pos + width);
                value.push_str(self.cursor.slice(pos, pos + width));
                self.cursor.advance(width);
                self.report(
                    ErrorCode::E0002,
                    "invalid escape sequence".to_string(),
                    span,
                );
            }
        }
    }

    fn consume_content_char(&mut self, value: &mut String) {
        if let Some(c) = self.cursor.peek_char() {
            value.push(c);
            self.cursor.advance(c.len_utf8() as u32);
        } else {
            // Invalid UTF-8 cannot occur (`&str` input); skip a byte to
            // guarantee progress regardless.
            self.cursor.advance(1);
        }
    }
}
