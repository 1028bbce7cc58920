//! The bound tree: the untyped tree with every promise resolved and every
//! expression carrying a concrete type.
//!
//! Produced by a rewrite pass after the solver reaches fixpoint. Types that
//! failed to resolve are `Error`; the corresponding diagnostics were
//! already reported, so consumers treat `Error` silently.

use vela_diagnostic::Span;
use vela_syntax::Name;

use crate::{Constant, SymbolId, TypeId};

/// Id of a bound expression.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct BoundExprId(pub(crate) u32);

/// Id of a bound statement.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct BoundStmtId(pub(crate) u32);

/// Callee of a bound call.
#[derive(Clone, Debug)]
pub enum BoundCallee {
    /// A single resolved function symbol.
    Function(SymbolId),
    /// An indirect call through a function-typed value.
    Value(BoundExprId),
}

/// One part of a bound string expression.
#[derive(Clone, Debug)]
pub enum BoundStringPart {
    Text(Name),
    Expr(BoundExprId),
}

/// Bound expression payloads.
#[derive(Clone, Debug)]
pub enum BoundExprKind {
    Literal(Constant),
    SymbolRef(SymbolId),
    /// A resolved function reference outside call position.
    FunctionRef(SymbolId),
    Call {
        callee: BoundCallee,
        args: Vec<BoundExprId>,
    },
    NewArray {
        element: TypeId,
        length: BoundExprId,
    },
    Member {
        receiver: BoundExprId,
        member: SymbolId,
    },
    Index {
        receiver: BoundExprId,
        index: BoundExprId,
    },
    And {
        left: BoundExprId,
        right: BoundExprId,
    },
    Or {
        left: BoundExprId,
        right: BoundExprId,
    },
    Not { operand: BoundExprId },
    Relational {
        first: BoundExprId,
        /// `(operator symbol, operand)` steps, in source order.
        comparisons: Vec<(SymbolId, BoundExprId)>,
    },
    If {
        condition: BoundExprId,
        then_branch: BoundExprId,
        else_branch: Option<BoundExprId>,
    },
    While {
        condition: BoundExprId,
        body: BoundExprId,
    },
    Block {
        statements: Vec<BoundStmtId>,
        value: Option<BoundExprId>,
        /// Locals declared directly in this block, for scope instructions.
        locals: Vec<SymbolId>,
    },
    Return { value: Option<BoundExprId> },
    Goto { label: SymbolId },
    Assign {
        target: BoundExprId,
        /// Resolved compound operator, `None` for plain `=`.
        operator: Option<SymbolId>,
        value: BoundExprId,
    },
    String { parts: Vec<BoundStringPart> },
    Error,
}

/// A bound expression node. `ty` is always concrete (possibly `Error`).
#[derive(Clone, Debug)]
pub struct BoundExpr {
    pub kind: BoundExprKind,
    pub ty: TypeId,
    pub span: Span,
}

/// Bound statement payloads.
#[derive(Clone, Debug)]
pub enum BoundStmt {
    Local {
        symbol: SymbolId,
        initializer: Option<BoundExprId>,
    },
    Label { symbol: SymbolId },
    Expr(BoundExprId),
    Nop,
}

/// One fully bound function body.
#[derive(Debug)]
pub struct BoundBody {
    pub function: SymbolId,
    pub root: BoundExprId,
}

/// Flat storage for bound bodies.
#[derive(Default)]
pub struct BoundArena {
    exprs: Vec<BoundExpr>,
    stmts: Vec<BoundStmt>,
    stmt_spans: Vec<Span>,
}

impl BoundArena {
    pub fn new() -> Self {
        BoundArena::default()
    }

    pub fn alloc_expr(&mut self, expr: BoundExpr) -> BoundExprId {
        let id = BoundExprId(u32::try_from(self.exprs.len()).expect("bound arena overflow"));
        self.exprs.push(expr);
        id
    }

    pub fn alloc_stmt(&mut self, stmt: BoundStmt, span: Span) -> BoundStmtId {
        let id = BoundStmtId(u32::try_from(self.stmts.len()).expect("bound arena overflow"));
        self.stmts.push(stmt);
        self.stmt_spans.push(span);
        id
    }

    #[inline]
    pub fn expr(&self, id: BoundExprId) -> &BoundExpr {
        &self.exprs[id.0 as usize]
    }

    #[inline]
    pub fn stmt(&self, id: BoundStmtId) -> &BoundStmt {
        &self.stmts[id.0 as usize]
    }

    #[inline]
    pub fn stmt_span(&self, id: BoundStmtId) -> Span {
        self.stmt_spans[id.0 as usize]
    }
}
