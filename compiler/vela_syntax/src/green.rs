//! The green tree: immutable, position-free syntax backbone.
//!
//! Green nodes and tokens live in flat arenas addressed by `u32` ids; child
//! references are ids, never pointers, so equal sub-trees can share
//! structure across re-parses. A green node caches its full width (the sum
//! of its children's full widths); nothing in the green tree knows an
//! absolute position.
//!
//! Syntax diagnostics are attached by node identity in a side table owned by
//! the tree; their spans are materialized by the producer (lexer/parser),
//! which is the only place absolute offsets are known during construction.

use vela_diagnostic::Diagnostic;

use crate::{SyntaxKind, Token};

/// Id of a green node within its [`GreenTree`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct GreenId(u32);

/// Id of a token within its [`GreenTree`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TokenId(u32);

impl std::fmt::Debug for GreenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GreenId({})", self.0)
    }
}

impl std::fmt::Debug for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenId({})", self.0)
    }
}

/// A child of a green node: either a nested node or a token.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum GreenElement {
    Node(GreenId),
    Token(TokenId),
}

/// An immutable green node: kind, ordered children, cached full width.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct GreenNode {
    pub kind: SyntaxKind,
    pub children: Vec<GreenElement>,
    pub full_width: u32,
}

#[cold]
#[inline(never)]
fn panic_arena_full(value: usize, context: &str) -> ! {
    panic!(
        "green arena capacity exceeded: {context} has {value} elements (0x{value:X}), max is {}",
        u32::MAX
    )
}

#[inline]
fn to_u32(value: usize, context: &str) -> u32 {
    u32::try_from(value).unwrap_or_else(|_| panic_arena_full(value, context))
}

/// Arena storage for a parsed file: nodes, tokens, root, and attached
/// syntax diagnostics.
#[derive(Debug, Default)]
pub struct GreenTree {
    nodes: Vec<GreenNode>,
    tokens: Vec<Token>,
    root: Option<GreenId>,
    /// Diagnostics keyed by the element they were attached to.
    diagnostics: Vec<(GreenElement, Diagnostic)>,
}

impl GreenTree {
    /// Create an empty tree under construction.
    pub fn new() -> Self {
        GreenTree::default()
    }

    /// Add a token to the arena.
    pub fn alloc_token(&mut self, token: Token) -> TokenId {
        let id = TokenId(to_u32(self.tokens.len(), "tokens"));
        self.tokens.push(token);
        id
    }

    /// Add a node to the arena, caching its full width from its children.
    pub fn alloc_node(&mut self, kind: SyntaxKind, children: Vec<GreenElement>) -> GreenId {
        let full_width = children.iter().map(|&c| self.full_width(c)).sum();
        let id = GreenId(to_u32(self.nodes.len(), "nodes"));
        self.nodes.push(GreenNode {
            kind,
            children,
            full_width,
        });
        id
    }

    /// Designate the root node. Called once by the parser.
    pub fn set_root(&mut self, root: GreenId) {
        debug_assert!(self.root.is_none());
        self.root = Some(root);
    }

    /// The root node.
    ///
    /// # Panics
    /// Panics if the tree is still under construction.
    pub fn root(&self) -> GreenId {
        self.root.expect("green tree has no root")
    }

    /// Attach a diagnostic to an element.
    pub fn attach_diagnostic(&mut self, element: GreenElement, diagnostic: Diagnostic) {
        self.diagnostics.push((element, diagnostic));
    }

    /// All attached syntax diagnostics, in attachment order.
    pub fn diagnostics(&self) -> &[(GreenElement, Diagnostic)] {
        &self.diagnostics
    }

    #[inline]
    pub fn node(&self, id: GreenId) -> &GreenNode {
        &self.nodes[id.0 as usize]
    }

    #[inline]
    pub fn token(&self, id: TokenId) -> &Token {
        &self.tokens[id.0 as usize]
    }

    /// Full width of an element (cached for nodes, computed for tokens).
    pub fn full_width(&self, element: GreenElement) -> u32 {
        match element {
            GreenElement::Node(id) => self.node(id).full_width,
            GreenElement::Token(id) => self.token(id).full_width(),
        }
    }

    /// Number of nodes in the arena.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of tokens in the arena.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Reconstruct the source text of an element, byte-for-byte, by
    /// concatenating trivia and token text in order.
    pub fn text_of(
        &self,
        element: GreenElement,
        interner: &crate::StringInterner,
        out: &mut String,
    ) {
        match element {
            GreenElement::Token(id) => {
                let token = self.token(id);
                for trivium in &token.leading {
                    out.push_str(interner.lookup(trivium.text));
                }
                out.push_str(interner.lookup(token.text));
                for trivium in &token.trailing {
                    out.push_str(interner.lookup(trivium.text));
                }
            }
            GreenElement::Node(id) => {
                for &child in &self.node(id).children {
                    self.text_of(child, interner, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StringInterner, TokenKind};

    fn token(interner: &StringInterner, kind: TokenKind, text: &str) -> Token {
        Token::new(kind, interner.intern(text), text.len() as u32)
    }

    #[test]
    fn test_node_width_is_sum_of_children() {
        let interner = StringInterner::new();
        let mut tree = GreenTree::new();
        let a = tree.alloc_token(token(&interner, TokenKind::Identifier, "ab"));
        let b = tree.alloc_token(token(&interner, TokenKind::Plus, "+"));
        let c = tree.alloc_token(token(&interner, TokenKind::Identifier, "cde"));
        let node = tree.alloc_node(
            SyntaxKind::BinaryExpression,
            vec![
                GreenElement::Token(a),
                GreenElement::Token(b),
                GreenElement::Token(c),
            ],
        );
        assert_eq!(tree.node(node).full_width, 6);
    }

    #[test]
    fn test_text_reconstruction() {
        let interner = StringInterner::new();
        let mut tree = GreenTree::new();
        let mut lhs = token(&interner, TokenKind::Identifier, "x");
        lhs.trailing.push(crate::Trivium::new(
            crate::TriviaKind::Whitespace,
            interner.intern(" "),
            1,
        ));
        let lhs = tree.alloc_token(lhs);
        let mut op = token(&interner, TokenKind::Plus, "+");
        op.trailing.push(crate::Trivium::new(
            crate::TriviaKind::Whitespace,
            interner.intern(" "),
            1,
        ));
        let op = tree.alloc_token(op);
        let rhs = tree.alloc_token(token(&interner, TokenKind::IntLiteral, "1"));
        let node = tree.alloc_node(
            SyntaxKind::BinaryExpression,
            vec![
                GreenElement::Token(lhs),
                GreenElement::Token(op),
                GreenElement::Token(rhs),
            ],
        );

        let mut text = String::new();
        tree.text_of(GreenElement::Node(node), &interner, &mut text);
        assert_eq!(text, "x + 1");
    }
}
