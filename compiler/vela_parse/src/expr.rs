//! Expression parsing: the precedence chain.
//!
//! Levels, loosest to tightest:
//!
//! 0. `return expr?`, `goto label`
//! 1. `= += -= *= /=` (right-associative)
//! 2. `or` (left)
//! 3. `and` (left)
//! 4. prefix `not`
//! 5. relational, chained: `a < b > c` is one node with element tail
//! 6. `+ -` (left)
//! 7. `* / mod rem` (left)
//! 8. prefix `+ -`
//! 9. postfix: call, index, generics (disambiguated), member
//! 10. atoms: literals, names, strings, grouping, control flow

use vela_syntax::{GreenElement, SyntaxKind, TokenKind};

use crate::recovery::EXPRESSION_BOUNDARY;
use crate::Parser;

fn is_relational(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Equal
            | TokenKind::NotEqual
            | TokenKind::LessThan
            | TokenKind::GreaterThan
            | TokenKind::LessEqual
            | TokenKind::GreaterEqual
    )
}

impl Parser<'_> {
    /// Parse an expression (level 0).
    pub(crate) fn parse_expression(&mut self) -> GreenElement {
        match self.current_kind() {
            TokenKind::KeywordReturn => {
                let mut children = vec![self.bump()];
                if self.current_kind().starts_expression() {
                    children.push(self.parse_assignment());
                }
                self.node(SyntaxKind::ReturnExpression, children)
            }
            TokenKind::KeywordGoto => {
                let mut children = vec![self.bump()];
                children.push(self.expect(TokenKind::Identifier));
                self.node(SyntaxKind::GotoExpression, children)
            }
            _ => self.parse_assignment(),
        }
    }

    /// Level 1: assignment operators, right-associative.
    fn parse_assignment(&mut self) -> GreenElement {
        let left = self.parse_or();
        match self.current_kind() {
            TokenKind::Assign
            | TokenKind::PlusAssign
            | TokenKind::MinusAssign
            | TokenKind::StarAssign
            | TokenKind::SlashAssign => {
                let op = self.bump();
                let right = self.parse_assignment();
                self.node(SyntaxKind::BinaryExpression, vec![left, op, right])
            }
            _ => left,
        }
    }

    /// Level 2: `or`, left-associative.
    fn parse_or(&mut self) -> GreenElement {
        let mut left = self.parse_and();
        while self.at(TokenKind::KeywordOr) {
            let op = self.bump();
            let right = self.parse_and();
            left = self.node(SyntaxKind::BinaryExpression, vec![left, op, right]);
        }
        left
    }

    /// Level 3: `and`, left-associative.
    fn parse_and(&mut self) -> GreenElement {
        let mut left = self.parse_not();
        while self.at(TokenKind::KeywordAnd) {
            let op = self.bump();
            let right = self.parse_not();
            left = self.node(SyntaxKind::BinaryExpression, vec![left, op, right]);
        }
        left
    }

    /// Level 4: prefix `not`.
    fn parse_not(&mut self) -> GreenElement {
        if self.at(TokenKind::KeywordNot) {
            let op = self.bump();
            let operand = self.parse_not();
            return self.node(SyntaxKind::UnaryExpression, vec![op, operand]);
        }
        self.parse_relational()
    }

    /// Level 5: relational operators, chained into one node.
    fn parse_relational(&mut self) -> GreenElement {
        let head = self.parse_additive();
        if !is_relational(self.current_kind()) {
            return head;
        }
        let mut children = vec![head];
        while is_relational(self.current_kind()) {
            let op = self.bump();
            let operand = self.parse_additive();
            children.push(self.node(SyntaxKind::ComparisonElement, vec![op, operand]));
        }
        self.node(SyntaxKind::RelationalExpression, children)
    }

    /// Level 6: `+ -`, left-associative.
    fn parse_additive(&mut self) -> GreenElement {
        let mut left = self.parse_multiplicative();
        while matches!(self.current_kind(), TokenKind::Plus | TokenKind::Minus) {
            let op = self.bump();
            let right = self.parse_multiplicative();
            left = self.node(SyntaxKind::BinaryExpression, vec![left, op, right]);
        }
        left
    }

    /// Level 7: `* / mod rem`, left-associative.
    fn parse_multiplicative(&mut self) -> GreenElement {
        let mut left = self.parse_prefix_sign();
        while matches!(
            self.current_kind(),
            TokenKind::Star | TokenKind::Slash | TokenKind::KeywordMod | TokenKind::KeywordRem
        ) {
            let op = self.bump();
            let right = self.parse_prefix_sign();
            left = self.node(SyntaxKind::BinaryExpression, vec![left, op, right]);
        }
        left
    }

    /// Level 8: prefix `+ -`.
    fn parse_prefix_sign(&mut self) -> GreenElement {
        if matches!(self.current_kind(), TokenKind::Plus | TokenKind::Minus) {
            let op = self.bump();
            let operand = self.parse_prefix_sign();
            return self.node(SyntaxKind::UnaryExpression, vec![op, operand]);
        }
        self.parse_postfix()
    }

    /// Level 9: postfix operators.
    fn parse_postfix(&mut self) -> GreenElement {
        let mut expr = self.parse_atom();
        let mut callable = is_generic_callable(&expr, self);
        loop {
            match self.current_kind() {
                TokenKind::ParenOpen => {
                    let arguments = self.parse_argument_list();
                    expr = self.node(SyntaxKind::CallExpression, vec![expr, arguments]);
                    callable = false;
                }
                TokenKind::BracketOpen => {
                    let mut children = vec![expr, self.bump()];
                    children.push(self.parse_expression());
                    children.push(self.expect(TokenKind::BracketClose));
                    expr = self.node(SyntaxKind::IndexExpression, children);
                    callable = false;
                }
                TokenKind::Dot => {
                    let dot = self.bump();
                    let member = self.expect(TokenKind::Identifier);
                    expr = self.node(SyntaxKind::MemberExpression, vec![expr, dot, member]);
                    callable = true;
                }
                TokenKind::LessThan if callable && self.generics_ahead() => {
                    let arguments = self.parse_type_argument_list();
                    expr = self.node(SyntaxKind::GenericExpression, vec![expr, arguments]);
                    callable = false;
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_argument_list(&mut self) -> GreenElement {
        let mut children = vec![self.bump()]; // (
        loop {
            if self.at(TokenKind::ParenClose) || self.at_end() {
                break;
            }
            children.push(self.parse_expression());
            if self.at(TokenKind::Comma) {
                children.push(self.bump());
            } else {
                break;
            }
        }
        children.push(self.expect(TokenKind::ParenClose));
        self.node(SyntaxKind::ArgumentList, children)
    }

    pub(crate) fn parse_type_argument_list(&mut self) -> GreenElement {
        let mut children = vec![self.expect(TokenKind::LessThan)];
        loop {
            if self.at(TokenKind::GreaterThan) || self.at_end() {
                break;
            }
            children.push(self.parse_type());
            if self.at(TokenKind::Comma) {
                children.push(self.bump());
            } else {
                break;
            }
        }
        children.push(self.expect(TokenKind::GreaterThan));
        self.node(SyntaxKind::TypeArgumentList, children)
    }

    /// Level 10: atoms.
    fn parse_atom(&mut self) -> GreenElement {
        match self.current_kind() {
            TokenKind::IntLiteral
            | TokenKind::FloatLiteral
            | TokenKind::CharLiteral
            | TokenKind::KeywordTrue
            | TokenKind::KeywordFalse => {
                let children = vec![self.bump()];
                self.node(SyntaxKind::LiteralExpression, children)
            }
            TokenKind::Identifier => {
                let children = vec![self.bump()];
                self.node(SyntaxKind::NameExpression, children)
            }
            TokenKind::LineStringStart | TokenKind::MultiLineStringStart => {
                self.parse_string_expression()
            }
            TokenKind::ParenOpen => {
                let mut children = vec![self.bump()];
                children.push(self.parse_expression());
                children.push(self.expect(TokenKind::ParenClose));
                self.node(SyntaxKind::GroupingExpression, children)
            }
            TokenKind::CurlyOpen => self.parse_block_expression(),
            TokenKind::KeywordIf => self.parse_if_expression(),
            TokenKind::KeywordWhile => self.parse_while_expression(),
            _ => self.unexpected(SyntaxKind::UnexpectedExpression, EXPRESSION_BOUNDARY),
        }
    }

    /// `{ statements… value? }`
    fn parse_block_expression(&mut self) -> GreenElement {
        let mut children = vec![self.bump()]; // {
        while !self.at(TokenKind::CurlyClose) && !self.at_end() {
            let before = self.pos;
            // A trailing expression without `;` is the block's value.
            if self.current_kind().starts_expression()
                && !self.statement_keyword_ahead()
            {
                let expr = self.parse_expression();
                if self.at(TokenKind::Semicolon) {
                    let semi = self.bump();
                    children.push(self.node(SyntaxKind::ExpressionStatement, vec![expr, semi]));
                    continue;
                }
                if self.at(TokenKind::CurlyClose) || self.at_end() {
                    children.push(expr);
                    break;
                }
                // Control-flow expressions may omit the semicolon.
                let semi_optional = matches!(
                    kind_of(&expr, self),
                    Some(
                        SyntaxKind::BlockExpression
                            | SyntaxKind::IfExpression
                            | SyntaxKind::WhileExpression
                    )
                );
                if semi_optional {
                    children.push(self.node(SyntaxKind::ExpressionStatement, vec![expr]));
                } else {
                    let semi = self.expect(TokenKind::Semicolon);
                    children.push(self.node(SyntaxKind::ExpressionStatement, vec![expr, semi]));
                }
                continue;
            }
            children.push(self.parse_statement());
            if self.pos == before {
                let stray = vec![self.bump()];
                children.push(self.node(SyntaxKind::UnexpectedStatement, stray));
            }
        }
        children.push(self.expect(TokenKind::CurlyClose));
        self.node(SyntaxKind::BlockExpression, children)
    }

    /// True when the current token begins a statement-only construct
    /// (declaration or label) rather than an expression.
    fn statement_keyword_ahead(&self) -> bool {
        self.at(TokenKind::Identifier) && self.peek(1).kind == TokenKind::Colon
    }

    /// `if (cond) then-expr else else-expr`
    fn parse_if_expression(&mut self) -> GreenElement {
        let mut children = vec![self.bump()]; // if
        children.push(self.expect(TokenKind::ParenOpen));
        children.push(self.parse_expression());
        children.push(self.expect(TokenKind::ParenClose));
        children.push(self.parse_expression());
        if self.at(TokenKind::KeywordElse) {
            let else_kw = self.bump();
            let body = self.parse_expression();
            children.push(self.node(SyntaxKind::ElseClause, vec![else_kw, body]));
        }
        self.node(SyntaxKind::IfExpression, children)
    }

    /// `while (cond) body`
    fn parse_while_expression(&mut self) -> GreenElement {
        let mut children = vec![self.bump()]; // while
        children.push(self.expect(TokenKind::ParenOpen));
        children.push(self.parse_expression());
        children.push(self.expect(TokenKind::ParenClose));
        children.push(self.parse_expression());
        self.node(SyntaxKind::WhileExpression, children)
    }

    // ─── `<` disambiguation ────────────────────────────────────────

    /// Decide whether a `<` after a name or member opens type arguments.
    ///
    /// Speculatively scans over `identifier`, `,`, `.`, and nested `<…>`
    /// pairs without consuming. On the closing `>`, the next token
    /// decides: `(` means generics, an expression starter means the `<`
    /// was a comparison, anything else defaults to generics. Any other
    /// token inside the scanned region means comparison.
    pub(crate) fn generics_ahead(&self) -> bool {
        debug_assert!(self.at(TokenKind::LessThan));
        let mut lookahead = 1;
        let mut depth = 0u32;
        loop {
            match self.peek(lookahead).kind {
                TokenKind::Identifier | TokenKind::Dot | TokenKind::Comma => lookahead += 1,
                TokenKind::LessThan => {
                    depth += 1;
                    lookahead += 1;
                }
                TokenKind::GreaterThan => {
                    if depth == 0 {
                        let next = self.peek(lookahead + 1).kind;
                        return next == TokenKind::ParenOpen || !next.starts_expression();
                    }
                    depth -= 1;
                    lookahead += 1;
                }
                _ => return false,
            }
        }
    }
}

/// The syntax kind of an already-built element, when it is a node.
fn kind_of(element: &GreenElement, parser: &Parser<'_>) -> Option<SyntaxKind> {
    match element {
        GreenElement::Node(id) => Some(parser.green_kind(*id)),
        GreenElement::Token(_) => None,
    }
}

/// True when a built expression may be followed by type arguments: only
/// names and member accesses are generic-callable.
fn is_generic_callable(element: &GreenElement, parser: &Parser<'_>) -> bool {
    matches!(
        kind_of(element, parser),
        Some(SyntaxKind::NameExpression | SyntaxKind::MemberExpression)
    )
}
