//! String expression parsing and multi-line string layout checks.
//!
//! The lexer has already shaped the string into structure tokens; the
//! parser assembles them into a `StringExpression` node (interpolations
//! become nested `Interpolation` nodes) and then enforces the multi-line
//! layout rules:
//!
//! - nothing may follow the opening `"""` on its line
//! - the closing `"""` must stand on its own line
//! - the whitespace before the closing `"""` is the required prefix of
//!   every non-empty content line; interpolations are exempt

use vela_diagnostic::{Diagnostic, ErrorCode, Span};
use vela_syntax::{GreenElement, SyntaxKind, Token, TokenKind, TriviaKind};

use crate::Parser;

/// What a string body part is, with the absolute position of its text.
enum Part {
    Content { start: u32, text: &'static str },
    Newline,
    Interpolation { start: u32 },
}

impl Part {
    fn start(&self) -> Option<u32> {
        match self {
            Part::Content { start, .. } | Part::Interpolation { start } => Some(*start),
            Part::Newline => None,
        }
    }
}

impl Parser<'_> {
    pub(crate) fn parse_string_expression(&mut self) -> GreenElement {
        let multi_line = self.at(TokenKind::MultiLineStringStart);
        let close_kind = if multi_line {
            TokenKind::MultiLineStringEnd
        } else {
            TokenKind::LineStringEnd
        };
        let open_token = self.current().clone();
        let mut children = vec![self.bump()];
        let mut parts = Vec::new();
        let mut close_token = None;

        loop {
            match self.current_kind() {
                TokenKind::StringContent => {
                    let start = self.current_span().start;
                    let text = self.interner.lookup(self.current().text);
                    parts.push(Part::Content { start, text });
                    children.push(self.bump());
                }
                TokenKind::StringNewline => {
                    parts.push(Part::Newline);
                    children.push(self.bump());
                }
                TokenKind::InterpolationStart => {
                    let start = self.current_span().start;
                    let mut interp = vec![self.bump()];
                    interp.push(self.parse_expression());
                    interp.push(self.expect(TokenKind::InterpolationEnd));
                    parts.push(Part::Interpolation { start });
                    children.push(self.node(SyntaxKind::Interpolation, interp));
                }
                kind if kind == close_kind => {
                    close_token = Some((self.current().clone(), self.current_span()));
                    children.push(self.bump());
                    break;
                }
                _ => {
                    children.push(self.missing(close_kind));
                    break;
                }
            }
        }

        let node = self.node(SyntaxKind::StringExpression, children);
        if multi_line {
            self.check_multi_line_layout(node, &open_token, close_token.as_ref(), &parts);
        }
        node
    }

    fn check_multi_line_layout(
        &mut self,
        node: GreenElement,
        open: &Token,
        close: Option<&(Token, Span)>,
        parts: &[Part],
    ) {
        let open_ends_line = open
            .trailing
            .iter()
            .any(|t| t.kind == TriviaKind::Newline);

        if !open_ends_line {
            if let Some(start) = parts.first().and_then(Part::start) {
                self.report(
                    node,
                    Diagnostic::error(
                        ErrorCode::E1006,
                        "multi-line string content must start on the line after the opening quotes"
                            .to_string(),
                        Span::point(start),
                    ),
                );
            }
        }

        let closes_on_own_line = match parts.last() {
            None => open_ends_line,
            Some(Part::Newline) => true,
            Some(_) => false,
        };
        if let Some((_, close_span)) = close {
            if !closes_on_own_line {
                self.report(
                    node,
                    Diagnostic::error(
                        ErrorCode::E1005,
                        "the closing quotes of a multi-line string must be on their own line"
                            .to_string(),
                        *close_span,
                    ),
                );
            }
        }

        // Indentation: the whitespace leading the closing quotes is the
        // required prefix of every content line.
        let prefix = close
            .and_then(|(t, _)| {
                t.leading
                    .iter()
                    .rev()
                    .find(|tr| tr.kind == TriviaKind::Whitespace)
            })
            .map(|tr| self.interner.lookup(tr.text))
            .unwrap_or("");
        if prefix.is_empty() {
            return;
        }

        let mut at_line_start = open_ends_line;
        for part in parts {
            match part {
                Part::Newline => at_line_start = true,
                Part::Interpolation { .. } => at_line_start = false,
                Part::Content { start, text } => {
                    if at_line_start && !text.starts_with(prefix) {
                        let indent =
                            text.len() - text.trim_start_matches([' ', '\t']).len();
                        self.report(
                            node,
                            Diagnostic::error(
                                ErrorCode::E1004,
                                "insufficient indentation in multi-line string".to_string(),
                                Span::at(*start, indent as u32),
                            ),
                        );
                    }
                    at_line_start = false;
                }
            }
        }
    }
}
