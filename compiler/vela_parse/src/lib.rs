//! Recursive descent parser for Vela.
//!
//! Consumes the lexer's token stream and produces a green [`SyntaxTree`].
//! Single-token lookahead, with on-demand peek-ahead used only for `<`
//! disambiguation and label detection. Panic-mode recovery wraps
//! unexpected input in `Unexpected*` nodes and materializes missing tokens
//! as zero-width tokens carrying an `ExpectedToken` diagnostic, so the
//! tree shape is preserved and the source round-trips byte-for-byte.

mod decl;
mod expr;
mod recovery;
mod strings;
mod types;

#[cfg(test)]
mod tests;

pub use recovery::{
    TokenSet, CLOSING, DECLARATION_BOUNDARY, DECLARATION_START, EXPRESSION_BOUNDARY,
    STATEMENT_BOUNDARY,
};

use std::sync::Arc;

use tracing::trace;
use vela_diagnostic::{Diagnostic, ErrorCode, Span};
use vela_lexer::LexOutput;
use vela_syntax::{
    GreenElement, GreenTree, StringInterner, SyntaxKind, SyntaxTree, Token, TokenId, TokenKind,
};

/// Parse source text into a syntax tree.
pub fn parse(source: &str, interner: Arc<StringInterner>) -> SyntaxTree {
    let output = vela_lexer::lex(source, &interner);
    parse_tokens(output, interner)
}

/// Parse an already-lexed token stream into a syntax tree.
pub fn parse_tokens(output: LexOutput, interner: Arc<StringInterner>) -> SyntaxTree {
    let mut parser = Parser::new(output, &interner);
    let root = parser.parse_compilation_unit();
    let mut green = parser.finish();
    green.set_root(root);
    SyntaxTree::new(green, interner)
}

/// Parsing context: whether declarations appear at module level or inside a
/// function body.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum DeclContext {
    Global,
    Local,
}

pub(crate) struct Parser<'a> {
    tokens: Vec<Token>,
    /// Lexer diagnostics keyed by stream index, attached after parsing.
    lex_diagnostics: Vec<(usize, Diagnostic)>,
    /// Green ids of consumed stream tokens, by stream index.
    consumed: Vec<Option<TokenId>>,
    pos: usize,
    /// Absolute byte offset of the current token's full start.
    offset: u32,
    tree: GreenTree,
    interner: &'a StringInterner,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(output: LexOutput, interner: &'a StringInterner) -> Self {
        debug_assert!(matches!(
            output.tokens.last().map(|t| t.kind),
            Some(TokenKind::EndOfInput)
        ));
        let len = output.tokens.len();
        Parser {
            tokens: output.tokens,
            lex_diagnostics: output.diagnostics,
            consumed: vec![None; len],
            pos: 0,
            offset: 0,
            tree: GreenTree::new(),
            interner,
        }
    }

    /// Attach deferred lexer diagnostics and hand over the green tree.
    pub(crate) fn finish(mut self) -> GreenTree {
        for (index, diagnostic) in std::mem::take(&mut self.lex_diagnostics) {
            let element = self
                .consumed
                .get(index)
                .copied()
                .flatten()
                .or_else(|| self.consumed.iter().rev().find_map(|&id| id))
                .map(GreenElement::Token);
            if let Some(element) = element {
                self.tree.attach_diagnostic(element, diagnostic);
            }
        }
        self.tree
    }

    // ─── Stream access ─────────────────────────────────────────────

    /// Token `n` ahead of the cursor, clamped to `EndOfInput`.
    pub(crate) fn peek(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    #[inline]
    pub(crate) fn current(&self) -> &Token {
        self.peek(0)
    }

    #[inline]
    pub(crate) fn current_kind(&self) -> TokenKind {
        self.current().kind
    }

    #[inline]
    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.current_kind() == kind
    }

    #[inline]
    pub(crate) fn at_end(&self) -> bool {
        self.at(TokenKind::EndOfInput)
    }

    /// Absolute span of the current token's text.
    pub(crate) fn current_span(&self) -> Span {
        let token = self.current();
        let start = self.offset + token.leading_width();
        Span::at(start, token.text_width)
    }

    /// Consume the current token into the green arena.
    pub(crate) fn bump(&mut self) -> GreenElement {
        debug_assert!(self.pos < self.tokens.len());
        let token = self.tokens[self.pos].clone();
        self.offset += token.full_width();
        let id = self.tree.alloc_token(token);
        self.consumed[self.pos] = Some(id);
        // The cursor never advances past the final EndOfInput token.
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        GreenElement::Token(id)
    }

    /// Consume the current token when it matches, otherwise materialize a
    /// zero-width missing token with an `ExpectedToken` diagnostic.
    pub(crate) fn expect(&mut self, kind: TokenKind) -> GreenElement {
        if self.at(kind) {
            return self.bump();
        }
        self.missing(kind)
    }

    /// Materialize a zero-width token of `kind` at the current position.
    pub(crate) fn missing(&mut self, kind: TokenKind) -> GreenElement {
        trace!(expected = ?kind, found = ?self.current_kind(), "synthesizing missing token");
        let id = self.tree.alloc_token(Token::missing(kind));
        let span = Span::point(self.current_span().start);
        self.tree.attach_diagnostic(
            GreenElement::Token(id),
            Diagnostic::error(
                ErrorCode::E1002,
                format!(
                    "expected `{}`, found `{}`",
                    kind.display_name(),
                    self.current_kind().display_name()
                ),
                span,
            ),
        );
        GreenElement::Token(id)
    }

    /// Allocate a green node.
    pub(crate) fn node(&mut self, kind: SyntaxKind, children: Vec<GreenElement>) -> GreenElement {
        GreenElement::Node(self.tree.alloc_node(kind, children))
    }

    /// Kind of an already-allocated green node.
    pub(crate) fn green_kind(&self, id: vela_syntax::GreenId) -> SyntaxKind {
        self.tree.node(id).kind
    }

    /// Attach a diagnostic to an element.
    pub(crate) fn report(&mut self, element: GreenElement, diagnostic: Diagnostic) {
        self.tree.attach_diagnostic(element, diagnostic);
    }

    // ─── Recovery ──────────────────────────────────────────────────

    /// Build an `Unexpected*` node by synchronizing: tokens are consumed
    /// until one of `stop` (or end of input) comes up. An `UnexpectedInput`
    /// diagnostic covering the consumed range is attached.
    pub(crate) fn unexpected(&mut self, kind: SyntaxKind, stop: TokenSet) -> GreenElement {
        let start = self.current_span().start;
        let what = self.current_kind().display_name();
        let mut children = Vec::new();
        while !self.at_end() && !stop.contains(self.current_kind()) {
            children.push(self.bump());
        }
        let end = self.current_span().start;
        let node = self.node(kind, children);
        self.report(
            node,
            Diagnostic::error(
                ErrorCode::E1001,
                format!("unexpected `{what}`"),
                Span::new(start, end.max(start)),
            ),
        );
        node
    }
}
