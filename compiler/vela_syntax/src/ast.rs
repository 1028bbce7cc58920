//! Typed views over red syntax nodes.
//!
//! Each view wraps a [`SyntaxNode`] of one kind and exposes its children by
//! role. Accessors search by kind rather than position so that recovery
//! artifacts (missing tokens, `Unexpected*` children) degrade to `None`
//! instead of panicking.

use crate::{SyntaxElement, SyntaxKind, SyntaxNode, SyntaxToken, TokenKind};

macro_rules! ast_node {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Debug)]
        pub struct $name(SyntaxNode);

        impl $name {
            /// Wrap a node of the matching kind.
            pub fn cast(node: SyntaxNode) -> Option<Self> {
                (node.kind() == $kind).then_some($name(node))
            }

            /// The underlying syntax node.
            pub fn syntax(&self) -> &SyntaxNode {
                &self.0
            }
        }
    };
}

fn nth_expression(node: &SyntaxNode, n: usize) -> Option<SyntaxNode> {
    node.child_nodes()
        .into_iter()
        .filter(|c| c.kind().is_expression())
        .nth(n)
}

fn first_type(node: &SyntaxNode) -> Option<SyntaxNode> {
    node.child_nodes().into_iter().find(|c| c.kind().is_type())
}

fn identifier(node: &SyntaxNode) -> Option<SyntaxToken> {
    node.token_of_kind(TokenKind::Identifier)
}

// ─── Root ──────────────────────────────────────────────────────────

ast_node!(
    /// Root node: declarations plus the end-of-input token.
    CompilationUnit,
    SyntaxKind::CompilationUnit
);

impl CompilationUnit {
    pub fn declarations(&self) -> Vec<Declaration> {
        self.0
            .child_nodes()
            .into_iter()
            .filter_map(Declaration::cast)
            .collect()
    }

    pub fn end_of_input(&self) -> Option<SyntaxToken> {
        self.0.token_of_kind(TokenKind::EndOfInput)
    }
}

// ─── Declarations ──────────────────────────────────────────────────

/// Any declaration, including the recovery variant.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Declaration {
    Import(ImportDeclaration),
    Function(FunctionDeclaration),
    Module(ModuleDeclaration),
    Variable(VariableDeclaration),
    Label(LabelDeclaration),
    Unexpected(SyntaxNode),
}

impl Declaration {
    pub fn cast(node: SyntaxNode) -> Option<Self> {
        Some(match node.kind() {
            SyntaxKind::ImportDeclaration => {
                Declaration::Import(ImportDeclaration::cast(node)?)
            }
            SyntaxKind::FunctionDeclaration => {
                Declaration::Function(FunctionDeclaration::cast(node)?)
            }
            SyntaxKind::ModuleDeclaration => Declaration::Module(ModuleDeclaration::cast(node)?),
            SyntaxKind::VariableDeclaration => {
                Declaration::Variable(VariableDeclaration::cast(node)?)
            }
            SyntaxKind::LabelDeclaration => Declaration::Label(LabelDeclaration::cast(node)?),
            SyntaxKind::UnexpectedDeclaration => Declaration::Unexpected(node),
            _ => return None,
        })
    }

    pub fn syntax(&self) -> &SyntaxNode {
        match self {
            Declaration::Import(d) => d.syntax(),
            Declaration::Function(d) => d.syntax(),
            Declaration::Module(d) => d.syntax(),
            Declaration::Variable(d) => d.syntax(),
            Declaration::Label(d) => d.syntax(),
            Declaration::Unexpected(n) => n,
        }
    }
}

ast_node!(ImportDeclaration, SyntaxKind::ImportDeclaration);

impl ImportDeclaration {
    pub fn path(&self) -> Option<ImportPath> {
        self.0
            .child_of_kind(SyntaxKind::ImportPath)
            .and_then(ImportPath::cast)
    }
}

ast_node!(ImportPath, SyntaxKind::ImportPath);

impl ImportPath {
    /// The dotted path segments in order.
    pub fn segments(&self) -> Vec<SyntaxToken> {
        self.0
            .child_tokens()
            .into_iter()
            .filter(|t| t.kind() == TokenKind::Identifier)
            .collect()
    }
}

ast_node!(FunctionDeclaration, SyntaxKind::FunctionDeclaration);

impl FunctionDeclaration {
    pub fn visibility(&self) -> Option<SyntaxToken> {
        self.0
            .child_tokens()
            .into_iter()
            .find(|t| t.kind().is_visibility())
    }

    pub fn name(&self) -> Option<SyntaxToken> {
        identifier(&self.0)
    }

    pub fn generic_parameters(&self) -> Option<GenericParameterList> {
        self.0
            .child_of_kind(SyntaxKind::GenericParameterList)
            .and_then(GenericParameterList::cast)
    }

    pub fn parameters(&self) -> Option<ParameterList> {
        self.0
            .child_of_kind(SyntaxKind::ParameterList)
            .and_then(ParameterList::cast)
    }

    pub fn return_type(&self) -> Option<TypeAnnotation> {
        self.0
            .child_of_kind(SyntaxKind::TypeAnnotation)
            .and_then(TypeAnnotation::cast)
    }

    pub fn body(&self) -> Option<FunctionBody> {
        self.0.child_nodes().into_iter().find_map(|n| match n.kind() {
            SyntaxKind::BlockFunctionBody => {
                BlockFunctionBody::cast(n).map(FunctionBody::Block)
            }
            SyntaxKind::InlineFunctionBody => {
                InlineFunctionBody::cast(n).map(FunctionBody::Inline)
            }
            _ => None,
        })
    }
}

/// A function body: block form or `= expr;` form.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FunctionBody {
    Block(BlockFunctionBody),
    Inline(InlineFunctionBody),
}

ast_node!(BlockFunctionBody, SyntaxKind::BlockFunctionBody);

impl BlockFunctionBody {
    pub fn statements(&self) -> Vec<Statement> {
        self.0
            .child_nodes()
            .into_iter()
            .filter_map(Statement::cast)
            .collect()
    }
}

ast_node!(InlineFunctionBody, SyntaxKind::InlineFunctionBody);

impl InlineFunctionBody {
    pub fn value(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }
}

ast_node!(GenericParameterList, SyntaxKind::GenericParameterList);

impl GenericParameterList {
    pub fn parameters(&self) -> Vec<GenericParameter> {
        self.0
            .child_nodes()
            .into_iter()
            .filter_map(GenericParameter::cast)
            .collect()
    }
}

ast_node!(GenericParameter, SyntaxKind::GenericParameter);

impl GenericParameter {
    pub fn name(&self) -> Option<SyntaxToken> {
        identifier(&self.0)
    }
}

ast_node!(ParameterList, SyntaxKind::ParameterList);

impl ParameterList {
    pub fn parameters(&self) -> Vec<Parameter> {
        self.0
            .child_nodes()
            .into_iter()
            .filter_map(Parameter::cast)
            .collect()
    }
}

ast_node!(Parameter, SyntaxKind::Parameter);

impl Parameter {
    /// The `...` marker on a variadic parameter.
    pub fn ellipsis(&self) -> Option<SyntaxToken> {
        self.0.token_of_kind(TokenKind::Ellipsis)
    }

    pub fn name(&self) -> Option<SyntaxToken> {
        identifier(&self.0)
    }

    pub fn type_annotation(&self) -> Option<TypeAnnotation> {
        self.0
            .child_of_kind(SyntaxKind::TypeAnnotation)
            .and_then(TypeAnnotation::cast)
    }
}

ast_node!(TypeAnnotation, SyntaxKind::TypeAnnotation);

impl TypeAnnotation {
    pub fn ty(&self) -> Option<SyntaxNode> {
        first_type(&self.0)
    }
}

ast_node!(ValueInitializer, SyntaxKind::ValueInitializer);

impl ValueInitializer {
    pub fn value(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }
}

ast_node!(ModuleDeclaration, SyntaxKind::ModuleDeclaration);

impl ModuleDeclaration {
    pub fn visibility(&self) -> Option<SyntaxToken> {
        self.0
            .child_tokens()
            .into_iter()
            .find(|t| t.kind().is_visibility())
    }

    pub fn name(&self) -> Option<SyntaxToken> {
        identifier(&self.0)
    }

    pub fn declarations(&self) -> Vec<Declaration> {
        self.0
            .child_nodes()
            .into_iter()
            .filter_map(Declaration::cast)
            .collect()
    }
}

ast_node!(VariableDeclaration, SyntaxKind::VariableDeclaration);

impl VariableDeclaration {
    pub fn visibility(&self) -> Option<SyntaxToken> {
        self.0
            .child_tokens()
            .into_iter()
            .find(|t| t.kind().is_visibility())
    }

    /// The `var` or `val` keyword.
    pub fn keyword(&self) -> Option<SyntaxToken> {
        self.0
            .child_tokens()
            .into_iter()
            .find(|t| matches!(t.kind(), TokenKind::KeywordVar | TokenKind::KeywordVal))
    }

    /// True for `var`, false for `val`.
    pub fn is_mutable(&self) -> bool {
        self.keyword()
            .is_some_and(|t| t.kind() == TokenKind::KeywordVar)
    }

    pub fn name(&self) -> Option<SyntaxToken> {
        identifier(&self.0)
    }

    pub fn type_annotation(&self) -> Option<TypeAnnotation> {
        self.0
            .child_of_kind(SyntaxKind::TypeAnnotation)
            .and_then(TypeAnnotation::cast)
    }

    pub fn initializer(&self) -> Option<ValueInitializer> {
        self.0
            .child_of_kind(SyntaxKind::ValueInitializer)
            .and_then(ValueInitializer::cast)
    }
}

ast_node!(LabelDeclaration, SyntaxKind::LabelDeclaration);

impl LabelDeclaration {
    pub fn name(&self) -> Option<SyntaxToken> {
        identifier(&self.0)
    }
}

// ─── Statements ────────────────────────────────────────────────────

/// Any statement.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Statement {
    Declaration(DeclarationStatement),
    Expression(ExpressionStatement),
    NoOp(SyntaxNode),
    Unexpected(SyntaxNode),
}

impl Statement {
    pub fn cast(node: SyntaxNode) -> Option<Self> {
        Some(match node.kind() {
            SyntaxKind::DeclarationStatement => {
                Statement::Declaration(DeclarationStatement::cast(node)?)
            }
            SyntaxKind::ExpressionStatement => {
                Statement::Expression(ExpressionStatement::cast(node)?)
            }
            SyntaxKind::NoOpStatement => Statement::NoOp(node),
            SyntaxKind::UnexpectedStatement => Statement::Unexpected(node),
            _ => return None,
        })
    }

    pub fn syntax(&self) -> &SyntaxNode {
        match self {
            Statement::Declaration(s) => s.syntax(),
            Statement::Expression(s) => s.syntax(),
            Statement::NoOp(n) | Statement::Unexpected(n) => n,
        }
    }
}

ast_node!(DeclarationStatement, SyntaxKind::DeclarationStatement);

impl DeclarationStatement {
    pub fn declaration(&self) -> Option<Declaration> {
        self.0.child_nodes().into_iter().find_map(Declaration::cast)
    }
}

ast_node!(ExpressionStatement, SyntaxKind::ExpressionStatement);

impl ExpressionStatement {
    pub fn expression(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }
}

// ─── Expressions ───────────────────────────────────────────────────

ast_node!(LiteralExpression, SyntaxKind::LiteralExpression);

impl LiteralExpression {
    pub fn token(&self) -> Option<SyntaxToken> {
        self.0.child_tokens().into_iter().next()
    }
}

ast_node!(NameExpression, SyntaxKind::NameExpression);

impl NameExpression {
    pub fn identifier(&self) -> Option<SyntaxToken> {
        identifier(&self.0)
    }
}

ast_node!(MemberExpression, SyntaxKind::MemberExpression);

impl MemberExpression {
    pub fn receiver(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }

    pub fn member(&self) -> Option<SyntaxToken> {
        identifier(&self.0)
    }
}

ast_node!(CallExpression, SyntaxKind::CallExpression);

impl CallExpression {
    pub fn callee(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }

    pub fn arguments(&self) -> Vec<SyntaxNode> {
        self.0
            .child_of_kind(SyntaxKind::ArgumentList)
            .map(|list| {
                list.child_nodes()
                    .into_iter()
                    .filter(|n| n.kind().is_expression())
                    .collect()
            })
            .unwrap_or_default()
    }
}

ast_node!(IndexExpression, SyntaxKind::IndexExpression);

impl IndexExpression {
    pub fn receiver(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }

    pub fn index(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 1)
    }
}

ast_node!(GenericExpression, SyntaxKind::GenericExpression);

impl GenericExpression {
    pub fn callee(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }

    pub fn type_arguments(&self) -> Vec<SyntaxNode> {
        self.0
            .child_of_kind(SyntaxKind::TypeArgumentList)
            .map(|list| {
                list.child_nodes()
                    .into_iter()
                    .filter(|n| n.kind().is_type())
                    .collect()
            })
            .unwrap_or_default()
    }
}

ast_node!(UnaryExpression, SyntaxKind::UnaryExpression);

impl UnaryExpression {
    pub fn operator(&self) -> Option<SyntaxToken> {
        self.0.child_tokens().into_iter().next()
    }

    pub fn operand(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }
}

ast_node!(BinaryExpression, SyntaxKind::BinaryExpression);

impl BinaryExpression {
    pub fn left(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }

    pub fn operator(&self) -> Option<SyntaxToken> {
        self.0.child_tokens().into_iter().next()
    }

    pub fn right(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 1)
    }
}

ast_node!(RelationalExpression, SyntaxKind::RelationalExpression);

impl RelationalExpression {
    /// The leftmost operand.
    pub fn head(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }

    /// The `(op, operand)` tail, in order.
    pub fn comparisons(&self) -> Vec<ComparisonElement> {
        self.0
            .child_nodes()
            .into_iter()
            .filter_map(ComparisonElement::cast)
            .collect()
    }
}

ast_node!(ComparisonElement, SyntaxKind::ComparisonElement);

impl ComparisonElement {
    pub fn operator(&self) -> Option<SyntaxToken> {
        self.0.child_tokens().into_iter().next()
    }

    pub fn operand(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }
}

ast_node!(IfExpression, SyntaxKind::IfExpression);

impl IfExpression {
    pub fn condition(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }

    pub fn then_body(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 1)
    }

    pub fn else_clause(&self) -> Option<ElseClause> {
        self.0
            .child_of_kind(SyntaxKind::ElseClause)
            .and_then(ElseClause::cast)
    }
}

ast_node!(ElseClause, SyntaxKind::ElseClause);

impl ElseClause {
    pub fn body(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }
}

ast_node!(WhileExpression, SyntaxKind::WhileExpression);

impl WhileExpression {
    pub fn condition(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }

    pub fn body(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 1)
    }
}

ast_node!(BlockExpression, SyntaxKind::BlockExpression);

impl BlockExpression {
    pub fn statements(&self) -> Vec<Statement> {
        self.0
            .child_nodes()
            .into_iter()
            .filter_map(Statement::cast)
            .collect()
    }

    /// The trailing value expression, when the block ends without `;`.
    pub fn value(&self) -> Option<SyntaxNode> {
        self.0
            .child_nodes()
            .into_iter()
            .find(|n| n.kind().is_expression())
    }
}

ast_node!(ReturnExpression, SyntaxKind::ReturnExpression);

impl ReturnExpression {
    pub fn value(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }
}

ast_node!(GotoExpression, SyntaxKind::GotoExpression);

impl GotoExpression {
    pub fn label(&self) -> Option<SyntaxToken> {
        identifier(&self.0)
    }
}

ast_node!(StringExpression, SyntaxKind::StringExpression);

/// One part of a string literal body.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum StringPart {
    Content(SyntaxToken),
    Newline(SyntaxToken),
    Interpolation(Interpolation),
}

impl StringExpression {
    /// The opening quote token.
    pub fn open(&self) -> Option<SyntaxToken> {
        self.0.child_tokens().into_iter().find(|t| {
            matches!(
                t.kind(),
                TokenKind::LineStringStart | TokenKind::MultiLineStringStart
            )
        })
    }

    /// The closing quote token.
    pub fn close(&self) -> Option<SyntaxToken> {
        self.0.child_tokens().into_iter().find(|t| {
            matches!(
                t.kind(),
                TokenKind::LineStringEnd | TokenKind::MultiLineStringEnd
            )
        })
    }

    /// True for `"""` strings.
    pub fn is_multi_line(&self) -> bool {
        self.open()
            .is_some_and(|t| t.kind() == TokenKind::MultiLineStringStart)
    }

    /// Body parts in source order.
    pub fn parts(&self) -> Vec<StringPart> {
        self.0
            .children()
            .into_iter()
            .filter_map(|child| match child {
                SyntaxElement::Token(t) => match t.kind() {
                    TokenKind::StringContent => Some(StringPart::Content(t)),
                    TokenKind::StringNewline => Some(StringPart::Newline(t)),
                    _ => None,
                },
                SyntaxElement::Node(n) => {
                    Interpolation::cast(n).map(StringPart::Interpolation)
                }
            })
            .collect()
    }
}

ast_node!(Interpolation, SyntaxKind::Interpolation);

impl Interpolation {
    pub fn expression(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }
}

ast_node!(GroupingExpression, SyntaxKind::GroupingExpression);

impl GroupingExpression {
    pub fn expression(&self) -> Option<SyntaxNode> {
        nth_expression(&self.0, 0)
    }
}

// ─── Types ─────────────────────────────────────────────────────────

ast_node!(NameType, SyntaxKind::NameType);

impl NameType {
    pub fn identifier(&self) -> Option<SyntaxToken> {
        identifier(&self.0)
    }
}

ast_node!(MemberType, SyntaxKind::MemberType);

impl MemberType {
    pub fn receiver(&self) -> Option<SyntaxNode> {
        first_type(&self.0)
    }

    pub fn member(&self) -> Option<SyntaxToken> {
        identifier(&self.0)
    }
}

ast_node!(GenericType, SyntaxKind::GenericType);

impl GenericType {
    pub fn base(&self) -> Option<SyntaxNode> {
        first_type(&self.0)
    }

    pub fn type_arguments(&self) -> Vec<SyntaxNode> {
        self.0
            .child_of_kind(SyntaxKind::TypeArgumentList)
            .map(|list| {
                list.child_nodes()
                    .into_iter()
                    .filter(|n| n.kind().is_type())
                    .collect()
            })
            .unwrap_or_default()
    }
}
