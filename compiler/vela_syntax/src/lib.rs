//! Syntax layer for the Vela compiler.
//!
//! Two-layer tree design:
//!
//! - **Green** ([`GreenTree`], [`GreenNode`], [`Token`]): immutable,
//!   position-free, arena-backed; children are `u32` ids; full widths are
//!   cached. Built only by the parser.
//! - **Red** ([`SyntaxTree`], [`SyntaxNode`], [`SyntaxToken`]): lazy,
//!   parent-aware, position-carrying facade, materialized thread-safely on
//!   demand.
//!
//! Tokens own their trivia ([`Trivium`]), so concatenating the tree
//! reconstructs the source byte-for-byte. Identifier and trivia text is
//! interned ([`StringInterner`], [`Name`]).
//!
//! Typed accessors over red nodes live in [`ast`].

pub mod ast;
mod green;
mod interner;
mod kind;
mod red;
mod token;

pub use green::{GreenElement, GreenId, GreenNode, GreenTree, TokenId};
pub use interner::{Name, StringInterner};
pub use kind::SyntaxKind;
pub use red::{RedId, SyntaxElement, SyntaxNode, SyntaxToken, SyntaxTree};
pub use token::{Token, TokenKind, TokenValue, TriviaKind, Trivium};
