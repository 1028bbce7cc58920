//! The red tree: lazy, position-aware facade over the green tree.
//!
//! Red nodes live in an arena with a parent-index slot — no back-pointers.
//! A red node records its green element, its parent, and its absolute
//! `full_position`; children are materialized on first access and memoized
//! per parent. Materialization is thread-safe and at-most-once: the child
//! list is computed outside the write lock, published under it, and a loser
//! that raced a concurrent materializer discards its work and adopts the
//! winner's ids, so concurrent requests observe identical references.

use std::sync::Arc;

use parking_lot::RwLock;
use vela_diagnostic::{Diagnostic, Span};

use crate::{
    GreenElement, GreenId, GreenTree, Name, StringInterner, SyntaxKind, Token, TokenId, TokenKind,
    TokenValue,
};

/// Id of a red node within its tree's arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct RedId(u32);

impl std::fmt::Debug for RedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RedId({})", self.0)
    }
}

struct RedData {
    element: GreenElement,
    parent: Option<RedId>,
    full_position: u32,
    /// Materialized children, `None` until first access.
    children: Option<Arc<[RedId]>>,
}

struct TreeData {
    green: GreenTree,
    interner: Arc<StringInterner>,
    red: RwLock<Vec<RedData>>,
}

/// A parsed file: green backbone plus the lazily grown red arena.
#[derive(Clone)]
pub struct SyntaxTree {
    data: Arc<TreeData>,
}

impl SyntaxTree {
    /// Wrap a finished green tree. The root red node is created eagerly at
    /// position zero.
    pub fn new(green: GreenTree, interner: Arc<StringInterner>) -> Self {
        let root = RedData {
            element: GreenElement::Node(green.root()),
            parent: None,
            full_position: 0,
            children: None,
        };
        SyntaxTree {
            data: Arc::new(TreeData {
                green,
                interner,
                red: RwLock::new(vec![root]),
            }),
        }
    }

    /// The root node.
    pub fn root(&self) -> SyntaxNode {
        SyntaxNode {
            tree: self.clone(),
            id: RedId(0),
        }
    }

    /// The tree's interner.
    pub fn interner(&self) -> &Arc<StringInterner> {
        &self.data.interner
    }

    /// The green backbone.
    pub fn green(&self) -> &GreenTree {
        &self.data.green
    }

    /// Syntax diagnostics attached during lexing/parsing.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.data
            .green
            .diagnostics()
            .iter()
            .map(|(_, d)| d.clone())
            .collect()
    }

    /// Reconstruct the full source text byte-for-byte.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.data.green.text_of(
            GreenElement::Node(self.data.green.root()),
            &self.data.interner,
            &mut out,
        );
        out
    }

    fn same_tree(&self, other: &SyntaxTree) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Materialize and return the children of `parent`, at most once.
    fn children_of(&self, parent: RedId) -> Arc<[RedId]> {
        let (element, position) = {
            let red = self.data.red.read();
            let data = &red[parent.0 as usize];
            if let Some(children) = &data.children {
                return Arc::clone(children);
            }
            (data.element, data.full_position)
        };

        let GreenElement::Node(green_id) = element else {
            // Tokens have no children; publish the empty list.
            let empty: Arc<[RedId]> = Arc::from(Vec::new());
            let mut red = self.data.red.write();
            let data = &mut red[parent.0 as usize];
            if let Some(children) = &data.children {
                return Arc::clone(children);
            }
            data.children = Some(Arc::clone(&empty));
            return empty;
        };

        // Compute child elements and offsets outside the write lock; the
        // green tree is immutable so no lock is needed for this part.
        let mut offset = position;
        let pending: Vec<(GreenElement, u32)> = self
            .data
            .green
            .node(green_id)
            .children
            .iter()
            .map(|&child| {
                let at = offset;
                offset += self.data.green.full_width(child);
                (child, at)
            })
            .collect();

        let mut red = self.data.red.write();
        // Re-check: a concurrent materializer may have won; discard ours.
        if let Some(children) = &red[parent.0 as usize].children {
            return Arc::clone(children);
        }
        let ids: Vec<RedId> = pending
            .into_iter()
            .map(|(child, at)| {
                let id = RedId(u32::try_from(red.len()).expect("red arena overflow"));
                red.push(RedData {
                    element: child,
                    parent: Some(parent),
                    full_position: at,
                    children: None,
                });
                id
            })
            .collect();
        let ids: Arc<[RedId]> = Arc::from(ids);
        red[parent.0 as usize].children = Some(Arc::clone(&ids));
        ids
    }

    fn element_of(&self, id: RedId) -> GreenElement {
        self.data.red.read()[id.0 as usize].element
    }

    fn position_of(&self, id: RedId) -> u32 {
        self.data.red.read()[id.0 as usize].full_position
    }

    fn parent_of(&self, id: RedId) -> Option<RedId> {
        self.data.red.read()[id.0 as usize].parent
    }
}

impl std::fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("nodes", &self.data.green.node_count())
            .field("tokens", &self.data.green.token_count())
            .finish()
    }
}

/// A red element: node or token handle.
#[derive(Clone, Debug)]
pub enum SyntaxElement {
    Node(SyntaxNode),
    Token(SyntaxToken),
}

impl SyntaxElement {
    pub fn as_node(&self) -> Option<&SyntaxNode> {
        match self {
            SyntaxElement::Node(node) => Some(node),
            SyntaxElement::Token(_) => None,
        }
    }

    pub fn as_token(&self) -> Option<&SyntaxToken> {
        match self {
            SyntaxElement::Token(token) => Some(token),
            SyntaxElement::Node(_) => None,
        }
    }

    /// Absolute position including leading trivia.
    pub fn full_position(&self) -> u32 {
        match self {
            SyntaxElement::Node(n) => n.full_position(),
            SyntaxElement::Token(t) => t.full_position(),
        }
    }

    /// Width including trivia.
    pub fn full_width(&self) -> u32 {
        match self {
            SyntaxElement::Node(n) => n.full_width(),
            SyntaxElement::Token(t) => t.full_width(),
        }
    }
}

/// A position-aware handle to a green node.
#[derive(Clone)]
pub struct SyntaxNode {
    tree: SyntaxTree,
    id: RedId,
}

impl SyntaxNode {
    fn green_id(&self) -> GreenId {
        match self.tree.element_of(self.id) {
            GreenElement::Node(id) => id,
            GreenElement::Token(_) => unreachable!("SyntaxNode over a token element"),
        }
    }

    /// Kind of the underlying green node.
    pub fn kind(&self) -> SyntaxKind {
        self.tree.green().node(self.green_id()).kind
    }

    /// The owning tree.
    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    /// Absolute position including leading trivia.
    pub fn full_position(&self) -> u32 {
        self.tree.position_of(self.id)
    }

    /// Width including trivia.
    pub fn full_width(&self) -> u32 {
        self.tree.green().node(self.green_id()).full_width
    }

    /// Span including trivia.
    pub fn full_span(&self) -> Span {
        Span::at(self.full_position(), self.full_width())
    }

    /// Span excluding the first token's leading and the last token's
    /// trailing trivia. Falls back to the full span for empty nodes.
    pub fn span(&self) -> Span {
        match (self.first_token(), self.last_token()) {
            (Some(first), Some(last)) => Span::new(first.span().start, last.span().end),
            _ => self.full_span(),
        }
    }

    /// Parent node; `None` at the root.
    pub fn parent(&self) -> Option<SyntaxNode> {
        self.tree.parent_of(self.id).map(|id| SyntaxNode {
            tree: self.tree.clone(),
            id,
        })
    }

    /// All children in order.
    pub fn children(&self) -> Vec<SyntaxElement> {
        let ids = self.tree.children_of(self.id);
        ids.iter()
            .map(|&id| match self.tree.element_of(id) {
                GreenElement::Node(_) => SyntaxElement::Node(SyntaxNode {
                    tree: self.tree.clone(),
                    id,
                }),
                GreenElement::Token(_) => SyntaxElement::Token(SyntaxToken {
                    tree: self.tree.clone(),
                    id,
                }),
            })
            .collect()
    }

    /// Child nodes only, in order.
    pub fn child_nodes(&self) -> Vec<SyntaxNode> {
        self.children()
            .into_iter()
            .filter_map(|e| match e {
                SyntaxElement::Node(n) => Some(n),
                SyntaxElement::Token(_) => None,
            })
            .collect()
    }

    /// Child tokens only, in order.
    pub fn child_tokens(&self) -> Vec<SyntaxToken> {
        self.children()
            .into_iter()
            .filter_map(|e| match e {
                SyntaxElement::Token(t) => Some(t),
                SyntaxElement::Node(_) => None,
            })
            .collect()
    }

    /// First child node of the given kind.
    pub fn child_of_kind(&self, kind: SyntaxKind) -> Option<SyntaxNode> {
        self.child_nodes().into_iter().find(|n| n.kind() == kind)
    }

    /// First child token of the given kind.
    pub fn token_of_kind(&self, kind: TokenKind) -> Option<SyntaxToken> {
        self.child_tokens().into_iter().find(|t| t.kind() == kind)
    }

    /// First token in the subtree.
    pub fn first_token(&self) -> Option<SyntaxToken> {
        for child in self.children() {
            match child {
                SyntaxElement::Token(t) => return Some(t),
                SyntaxElement::Node(n) => {
                    if let Some(t) = n.first_token() {
                        return Some(t);
                    }
                }
            }
        }
        None
    }

    /// Last token in the subtree.
    pub fn last_token(&self) -> Option<SyntaxToken> {
        for child in self.children().into_iter().rev() {
            match child {
                SyntaxElement::Token(t) => return Some(t),
                SyntaxElement::Node(n) => {
                    if let Some(t) = n.last_token() {
                        return Some(t);
                    }
                }
            }
        }
        None
    }

    /// Source text of the subtree, trivia included.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.tree.green().text_of(
            GreenElement::Node(self.green_id()),
            self.tree.interner(),
            &mut out,
        );
        out
    }
}

impl PartialEq for SyntaxNode {
    fn eq(&self, other: &Self) -> bool {
        self.tree.same_tree(&other.tree) && self.id == other.id
    }
}

impl Eq for SyntaxNode {}

impl std::fmt::Debug for SyntaxNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} @ {}", self.kind(), self.full_span())
    }
}

/// A position-aware handle to a token.
#[derive(Clone)]
pub struct SyntaxToken {
    tree: SyntaxTree,
    id: RedId,
}

impl SyntaxToken {
    fn token_id(&self) -> TokenId {
        match self.tree.element_of(self.id) {
            GreenElement::Token(id) => id,
            GreenElement::Node(_) => unreachable!("SyntaxToken over a node element"),
        }
    }

    /// The green token data.
    pub fn green(&self) -> &Token {
        // Token storage is append-only and never moves after parsing, but
        // going through the tree keeps the borrow simple.
        self.tree.green().token(self.token_id())
    }

    pub fn kind(&self) -> TokenKind {
        self.green().kind
    }

    /// Interned token text.
    pub fn text(&self) -> Name {
        self.green().text
    }

    /// Token text as a string slice.
    pub fn text_str(&self) -> &'static str {
        self.tree.interner().lookup(self.green().text)
    }

    /// Decoded literal value, when present.
    pub fn value(&self) -> Option<TokenValue> {
        self.green().value
    }

    /// Absolute position including leading trivia.
    pub fn full_position(&self) -> u32 {
        self.tree.position_of(self.id)
    }

    /// Width including trivia.
    pub fn full_width(&self) -> u32 {
        self.green().full_width()
    }

    /// Span of the token text alone, trivia excluded.
    pub fn span(&self) -> Span {
        let token = self.green();
        let start = self.full_position() + token.leading_width();
        Span::at(start, token.text_width)
    }

    /// Span including trivia.
    pub fn full_span(&self) -> Span {
        Span::at(self.full_position(), self.full_width())
    }

    /// Parent node.
    pub fn parent(&self) -> Option<SyntaxNode> {
        self.tree.parent_of(self.id).map(|id| SyntaxNode {
            tree: self.tree.clone(),
            id,
        })
    }

    /// True for parser-synthesized zero-width tokens.
    pub fn is_missing(&self) -> bool {
        self.green().is_missing()
    }
}

impl PartialEq for SyntaxToken {
    fn eq(&self, other: &Self) -> bool {
        self.tree.same_tree(&other.tree) && self.id == other.id
    }
}

impl Eq for SyntaxToken {}

impl std::fmt::Debug for SyntaxToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} @ {}", self.kind(), self.full_span())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Trivium;

    fn sample_tree() -> SyntaxTree {
        // Green for `x + 1` with a trailing space on `x` and `+`.
        let interner = Arc::new(StringInterner::new());
        let mut green = GreenTree::new();

        let mut lhs = Token::new(TokenKind::Identifier, interner.intern("x"), 1);
        lhs.trailing.push(Trivium::new(
            crate::TriviaKind::Whitespace,
            interner.intern(" "),
            1,
        ));
        let lhs = green.alloc_token(lhs);
        let lhs = green.alloc_node(SyntaxKind::NameExpression, vec![GreenElement::Token(lhs)]);

        let mut op = Token::new(TokenKind::Plus, interner.intern("+"), 1);
        op.trailing.push(Trivium::new(
            crate::TriviaKind::Whitespace,
            interner.intern(" "),
            1,
        ));
        let op = green.alloc_token(op);

        let mut rhs_token = Token::new(TokenKind::IntLiteral, interner.intern("1"), 1);
        rhs_token.value = Some(TokenValue::Int(1));
        let rhs = green.alloc_token(rhs_token);
        let rhs = green.alloc_node(SyntaxKind::LiteralExpression, vec![GreenElement::Token(rhs)]);

        let binary = green.alloc_node(
            SyntaxKind::BinaryExpression,
            vec![
                GreenElement::Node(lhs),
                GreenElement::Token(op),
                GreenElement::Node(rhs),
            ],
        );
        green.set_root(binary);
        SyntaxTree::new(green, interner)
    }

    #[test]
    fn test_child_positions_accumulate_widths() {
        let tree = sample_tree();
        let root = tree.root();
        let children = root.children();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].full_position(), 0);
        assert_eq!(children[1].full_position(), 2);
        assert_eq!(children[2].full_position(), 4);
        assert_eq!(root.full_width(), 5);
    }

    #[test]
    fn test_parent_chain_terminates_at_root() {
        let tree = sample_tree();
        let root = tree.root();
        let rhs = root.child_nodes()[1].clone();
        assert_eq!(rhs.parent().unwrap(), root);
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_children_memoized_identical() {
        let tree = sample_tree();
        let first = tree.root().children();
        let second = tree.root().children();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            match (a, b) {
                (SyntaxElement::Node(x), SyntaxElement::Node(y)) => assert_eq!(x, y),
                (SyntaxElement::Token(x), SyntaxElement::Token(y)) => assert_eq!(x, y),
                _ => panic!("child shape changed between materializations"),
            }
        }
    }

    #[test]
    fn test_token_span_excludes_trivia() {
        let tree = sample_tree();
        let op = tree.root().child_tokens()[0].clone();
        assert_eq!(op.kind(), TokenKind::Plus);
        assert_eq!(op.full_span(), Span::new(2, 4));
        assert_eq!(op.span(), Span::new(2, 3));
    }

    #[test]
    fn test_text_round_trip() {
        let tree = sample_tree();
        assert_eq!(tree.text(), "x + 1");
    }

    #[test]
    fn test_concurrent_materialization_observes_one_value() {
        let tree = sample_tree();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tree = tree.clone();
                std::thread::spawn(move || {
                    tree.root()
                        .children()
                        .iter()
                        .map(SyntaxElement::full_position)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<Vec<u32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for other in &results[1..] {
            assert_eq!(&results[0], other);
        }
    }
}
