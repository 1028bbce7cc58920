//! Declaration and statement parsing.

use tracing::trace;
use vela_diagnostic::{Diagnostic, ErrorCode};
use vela_syntax::{GreenElement, SyntaxKind, TokenKind};

use crate::recovery::{DECLARATION_BOUNDARY, STATEMENT_BOUNDARY};
use crate::{DeclContext, Parser};

impl Parser<'_> {
    /// Parse the whole file: declarations followed by `EndOfInput`.
    pub(crate) fn parse_compilation_unit(&mut self) -> vela_syntax::GreenId {
        let mut children = Vec::new();
        while !self.at_end() {
            let before = self.pos;
            children.push(self.parse_declaration(DeclContext::Global));
            if self.pos == before {
                // The declaration parser refused to consume (the current
                // token is a stop token with no meaning here, e.g. a stray
                // `}`); force progress.
                let stray = vec![self.bump()];
                let node = self.node(SyntaxKind::UnexpectedDeclaration, stray);
                children.push(node);
            }
        }
        children.push(self.bump());
        let GreenElement::Node(root) = self.node(SyntaxKind::CompilationUnit, children) else {
            unreachable!("node() always returns a node element")
        };
        root
    }

    /// Parse one declaration: optional visibility modifier, then dispatch.
    pub(crate) fn parse_declaration(&mut self, context: DeclContext) -> GreenElement {
        trace!(kind = ?self.current_kind(), "parse_declaration");
        let visibility = self
            .current_kind()
            .is_visibility()
            .then(|| self.bump());

        match self.current_kind() {
            TokenKind::KeywordImport => self.parse_import(visibility),
            TokenKind::KeywordFunc => self.parse_function(visibility),
            TokenKind::KeywordModule => self.parse_module(visibility, context),
            TokenKind::KeywordVar | TokenKind::KeywordVal => self.parse_variable(visibility),
            TokenKind::Identifier if self.peek(1).kind == TokenKind::Colon => {
                self.parse_label(visibility, context)
            }
            _ => {
                let mut children = Vec::new();
                children.extend(visibility);
                let rest = self.unexpected(SyntaxKind::UnexpectedDeclaration, DECLARATION_BOUNDARY);
                children.push(rest);
                if children.len() == 1 {
                    children.pop().expect("one element")
                } else {
                    self.node(SyntaxKind::UnexpectedDeclaration, children)
                }
            }
        }
    }

    /// `import path.to.module;`
    fn parse_import(&mut self, visibility: Option<GreenElement>) -> GreenElement {
        let mut children = Vec::new();
        children.extend(visibility);
        children.push(self.bump()); // import
        children.push(self.parse_import_path());
        children.push(self.expect(TokenKind::Semicolon));
        self.node(SyntaxKind::ImportDeclaration, children)
    }

    fn parse_import_path(&mut self) -> GreenElement {
        let mut children = vec![self.expect(TokenKind::Identifier)];
        while self.at(TokenKind::Dot) {
            children.push(self.bump());
            children.push(self.expect(TokenKind::Identifier));
        }
        self.node(SyntaxKind::ImportPath, children)
    }

    /// `func name<T, …>(params): Type { … }` or `func name(…) = expr;`
    fn parse_function(&mut self, visibility: Option<GreenElement>) -> GreenElement {
        let mut children = Vec::new();
        children.extend(visibility);
        children.push(self.bump()); // func
        children.push(self.expect(TokenKind::Identifier));
        if self.at(TokenKind::LessThan) {
            children.push(self.parse_generic_parameter_list());
        }
        children.push(self.parse_parameter_list());
        if self.at(TokenKind::Colon) {
            children.push(self.parse_type_annotation());
        }
        children.push(self.parse_function_body());
        self.node(SyntaxKind::FunctionDeclaration, children)
    }

    fn parse_generic_parameter_list(&mut self) -> GreenElement {
        let mut children = vec![self.bump()]; // <
        loop {
            if self.at(TokenKind::GreaterThan) || self.at_end() {
                break;
            }
            let name = vec![self.expect(TokenKind::Identifier)];
            children.push(self.node(SyntaxKind::GenericParameter, name));
            if self.at(TokenKind::Comma) {
                children.push(self.bump());
            } else {
                break;
            }
        }
        children.push(self.expect(TokenKind::GreaterThan));
        self.node(SyntaxKind::GenericParameterList, children)
    }

    fn parse_parameter_list(&mut self) -> GreenElement {
        let mut children = vec![self.expect(TokenKind::ParenOpen)];
        loop {
            if self.at(TokenKind::ParenClose) || self.at_end() {
                break;
            }
            children.push(self.parse_parameter());
            if self.at(TokenKind::Comma) {
                children.push(self.bump());
            } else {
                break;
            }
        }
        children.push(self.expect(TokenKind::ParenClose));
        self.node(SyntaxKind::ParameterList, children)
    }

    /// `name: Type` with an optional leading `...` variadic marker.
    fn parse_parameter(&mut self) -> GreenElement {
        let mut children = Vec::new();
        if self.at(TokenKind::Ellipsis) {
            children.push(self.bump());
        }
        children.push(self.expect(TokenKind::Identifier));
        children.push(self.parse_type_annotation());
        self.node(SyntaxKind::Parameter, children)
    }

    /// `: Type`
    pub(crate) fn parse_type_annotation(&mut self) -> GreenElement {
        let mut children = vec![self.expect(TokenKind::Colon)];
        children.push(self.parse_type());
        self.node(SyntaxKind::TypeAnnotation, children)
    }

    fn parse_function_body(&mut self) -> GreenElement {
        if self.at(TokenKind::Assign) {
            let mut children = vec![self.bump()];
            children.push(self.parse_expression());
            children.push(self.expect(TokenKind::Semicolon));
            return self.node(SyntaxKind::InlineFunctionBody, children);
        }
        let mut children = vec![self.expect(TokenKind::CurlyOpen)];
        self.parse_statement_list(&mut children);
        children.push(self.expect(TokenKind::CurlyClose));
        self.node(SyntaxKind::BlockFunctionBody, children)
    }

    /// `module name { declarations }` — wrapped as unexpected outside the
    /// global context.
    fn parse_module(
        &mut self,
        visibility: Option<GreenElement>,
        context: DeclContext,
    ) -> GreenElement {
        let start = self.current_span();
        let mut children = Vec::new();
        children.extend(visibility);
        children.push(self.bump()); // module
        children.push(self.expect(TokenKind::Identifier));
        children.push(self.expect(TokenKind::CurlyOpen));
        while !self.at(TokenKind::CurlyClose) && !self.at_end() {
            let before = self.pos;
            children.push(self.parse_declaration(DeclContext::Global));
            if self.pos == before {
                break;
            }
        }
        children.push(self.expect(TokenKind::CurlyClose));
        let module = self.node(SyntaxKind::ModuleDeclaration, children);
        if context == DeclContext::Local {
            let wrapped = self.node(SyntaxKind::UnexpectedDeclaration, vec![module]);
            self.report(
                wrapped,
                Diagnostic::error(
                    ErrorCode::E1003,
                    "modules are not legal inside a local context".to_string(),
                    start,
                ),
            );
            return wrapped;
        }
        module
    }

    /// `var name: Type = value;` / `val name = value;`
    fn parse_variable(&mut self, visibility: Option<GreenElement>) -> GreenElement {
        let mut children = Vec::new();
        children.extend(visibility);
        children.push(self.bump()); // var | val
        children.push(self.expect(TokenKind::Identifier));
        if self.at(TokenKind::Colon) {
            children.push(self.parse_type_annotation());
        }
        if self.at(TokenKind::Assign) {
            let mut init = vec![self.bump()];
            init.push(self.parse_expression());
            children.push(self.node(SyntaxKind::ValueInitializer, init));
        }
        children.push(self.expect(TokenKind::Semicolon));
        self.node(SyntaxKind::VariableDeclaration, children)
    }

    /// `name:` — wrapped as unexpected outside a local context.
    fn parse_label(
        &mut self,
        visibility: Option<GreenElement>,
        context: DeclContext,
    ) -> GreenElement {
        let start = self.current_span();
        let mut children = Vec::new();
        children.extend(visibility);
        children.push(self.bump()); // identifier
        children.push(self.bump()); // colon
        let label = self.node(SyntaxKind::LabelDeclaration, children);
        if context == DeclContext::Global {
            let wrapped = self.node(SyntaxKind::UnexpectedDeclaration, vec![label]);
            self.report(
                wrapped,
                Diagnostic::error(
                    ErrorCode::E1003,
                    "labels are not legal outside a local context".to_string(),
                    start,
                ),
            );
            return wrapped;
        }
        label
    }

    // ─── Statements ────────────────────────────────────────────────

    /// Parse statements until a `}` or end of input, guaranteeing progress.
    pub(crate) fn parse_statement_list(&mut self, children: &mut Vec<GreenElement>) {
        while !self.at(TokenKind::CurlyClose) && !self.at_end() {
            let before = self.pos;
            children.push(self.parse_statement());
            if self.pos == before {
                let stray = vec![self.bump()];
                children.push(self.node(SyntaxKind::UnexpectedStatement, stray));
            }
        }
    }

    /// One statement inside a block or function body.
    pub(crate) fn parse_statement(&mut self) -> GreenElement {
        trace!(kind = ?self.current_kind(), "parse_statement");
        match self.current_kind() {
            TokenKind::Semicolon => {
                let children = vec![self.bump()];
                self.node(SyntaxKind::NoOpStatement, children)
            }
            kind if starts_local_declaration(kind, self.peek(1).kind) => {
                let decl = self.parse_declaration(DeclContext::Local);
                self.node(SyntaxKind::DeclarationStatement, vec![decl])
            }
            TokenKind::CurlyOpen | TokenKind::KeywordIf | TokenKind::KeywordWhile => {
                // Control-flow expression statement: trailing `;` optional.
                let expr = self.parse_expression();
                let mut children = vec![expr];
                if self.at(TokenKind::Semicolon) {
                    children.push(self.bump());
                }
                self.node(SyntaxKind::ExpressionStatement, children)
            }
            kind if !kind.starts_expression() => {
                // Not a statement at all; synchronize. May consume nothing
                // when the offender is a stop token — the caller's progress
                // guard then forces a bump.
                self.unexpected(SyntaxKind::UnexpectedStatement, STATEMENT_BOUNDARY)
            }
            _ => {
                let expr = self.parse_expression();
                let mut children = vec![expr];
                children.push(self.expect(TokenKind::Semicolon));
                self.node(SyntaxKind::ExpressionStatement, children)
            }
        }
    }
}

/// True when a token begins a declaration legal in statement position.
fn starts_local_declaration(kind: TokenKind, next: TokenKind) -> bool {
    match kind {
        TokenKind::KeywordImport
        | TokenKind::KeywordFunc
        | TokenKind::KeywordModule
        | TokenKind::KeywordVar
        | TokenKind::KeywordVal
        | TokenKind::KeywordInternal
        | TokenKind::KeywordPublic => true,
        TokenKind::Identifier => next == TokenKind::Colon,
        _ => false,
    }
}
