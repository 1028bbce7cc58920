//! Type syntax parsing: name, member, and generic types.

use vela_syntax::{GreenElement, SyntaxKind, TokenKind};

use crate::recovery::{TokenSet, EXPRESSION_BOUNDARY};
use crate::Parser;

/// Stop set for type recovery: expression boundaries plus the `>` that may
/// close a surrounding type argument list.
const TYPE_BOUNDARY: TokenSet = EXPRESSION_BOUNDARY.with(TokenKind::GreaterThan);

impl Parser<'_> {
    /// Parse a type: `Name`, `path.Name`, or `Base<Args…>`.
    pub(crate) fn parse_type(&mut self) -> GreenElement {
        let mut ty = if self.at(TokenKind::Identifier) {
            let children = vec![self.bump()];
            self.node(SyntaxKind::NameType, children)
        } else {
            return self.unexpected(SyntaxKind::UnexpectedType, TYPE_BOUNDARY);
        };
        loop {
            match self.current_kind() {
                TokenKind::Dot => {
                    let dot = self.bump();
                    let member = self.expect(TokenKind::Identifier);
                    ty = self.node(SyntaxKind::MemberType, vec![ty, dot, member]);
                }
                // In type context `<` is always a type argument list.
                TokenKind::LessThan => {
                    let arguments = self.parse_type_argument_list();
                    ty = self.node(SyntaxKind::GenericType, vec![ty, arguments]);
                }
                _ => break,
            }
        }
        ty
    }
}
