//! Error recovery support: token sets and synchronization boundaries.
//!
//! `TokenSet` is a `u128` bitset over token-kind discriminants, giving O(1)
//! membership for the stop sets used by panic-mode recovery.

use vela_syntax::TokenKind;

/// A set of token kinds backed by a `u128` bitset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenSet(u128);

impl TokenSet {
    /// The empty set.
    #[inline]
    pub const fn new() -> Self {
        TokenSet(0)
    }

    /// Add a token kind (builder form for `const` contexts).
    #[inline]
    #[must_use]
    pub const fn with(self, kind: TokenKind) -> Self {
        TokenSet(self.0 | (1u128 << kind.discriminant_index()))
    }

    /// Union of two sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        TokenSet(self.0 | other.0)
    }

    /// O(1) membership test.
    #[inline]
    pub const fn contains(self, kind: TokenKind) -> bool {
        (self.0 & (1u128 << kind.discriminant_index())) != 0
    }
}

impl Default for TokenSet {
    fn default() -> Self {
        TokenSet::new()
    }
}

/// Tokens that can begin a declaration.
pub const DECLARATION_START: TokenSet = TokenSet::new()
    .with(TokenKind::KeywordImport)
    .with(TokenKind::KeywordFunc)
    .with(TokenKind::KeywordModule)
    .with(TokenKind::KeywordVar)
    .with(TokenKind::KeywordVal)
    .with(TokenKind::KeywordInternal)
    .with(TokenKind::KeywordPublic);

/// Closing delimiters recovery must never step over.
pub const CLOSING: TokenSet = TokenSet::new()
    .with(TokenKind::ParenClose)
    .with(TokenKind::BracketClose)
    .with(TokenKind::CurlyClose)
    .with(TokenKind::InterpolationEnd)
    .with(TokenKind::EndOfInput);

/// Stop set when recovering at declaration level.
pub const DECLARATION_BOUNDARY: TokenSet = DECLARATION_START.union(CLOSING);

/// Stop set when recovering at statement level: declarations, closing
/// delimiters, and statement punctuation.
pub const STATEMENT_BOUNDARY: TokenSet = DECLARATION_BOUNDARY
    .with(TokenKind::Semicolon)
    .with(TokenKind::CurlyOpen)
    .with(TokenKind::KeywordIf)
    .with(TokenKind::KeywordWhile)
    .with(TokenKind::KeywordReturn)
    .with(TokenKind::KeywordGoto);

/// Stop set when recovering inside an expression.
pub const EXPRESSION_BOUNDARY: TokenSet = STATEMENT_BOUNDARY.with(TokenKind::Comma);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_matches_construction() {
        let set = TokenSet::new()
            .with(TokenKind::Comma)
            .with(TokenKind::EndOfInput);
        assert!(set.contains(TokenKind::Comma));
        assert!(set.contains(TokenKind::EndOfInput));
        assert!(!set.contains(TokenKind::Dot));
        assert!(!set.contains(TokenKind::Identifier));
    }

    #[test]
    fn test_union() {
        let a = TokenSet::new().with(TokenKind::Plus);
        let b = TokenSet::new().with(TokenKind::Minus);
        let both = a.union(b);
        assert!(both.contains(TokenKind::Plus));
        assert!(both.contains(TokenKind::Minus));
    }

    #[test]
    fn test_boundary_sets() {
        assert!(DECLARATION_START.contains(TokenKind::KeywordFunc));
        assert!(STATEMENT_BOUNDARY.contains(TokenKind::Semicolon));
        assert!(STATEMENT_BOUNDARY.contains(TokenKind::CurlyClose));
        assert!(EXPRESSION_BOUNDARY.contains(TokenKind::Comma));
        assert!(!EXPRESSION_BOUNDARY.contains(TokenKind::Plus));
    }
}
