//! The untyped tree: binder output.
//!
//! Mirrors the executable syntax with names resolved to symbols. Every
//! expression carries a `TypeId` that may still be a type variable, and
//! every unresolved overload choice is a [`PromiseId`] the constraint
//! solver fills in. Nodes are flat arena records addressed by `u32` ids.

use vela_diagnostic::Span;
use vela_syntax::Name;

use crate::{SymbolId, TypeId};

/// Id of an untyped expression.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct UntypedExprId(pub(crate) u32);

/// Id of an untyped statement.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct UntypedStmtId(pub(crate) u32);

/// Id of a constraint promise.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PromiseId(pub(crate) u32);

/// A literal constant.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Constant {
    Int(i64),
    /// Float bits (for `Eq`/`Hash`).
    Float(u64),
    Bool(bool),
    Char(char),
    String(Name),
    Unit,
}

/// Callee of an untyped call.
#[derive(Clone, Debug)]
pub enum UntypedCallee {
    /// An ordinary expression of (eventual) function type.
    Expr(UntypedExprId),
    /// A function group whose member is chosen by the solver.
    Overload { name: Name, promise: PromiseId },
}

/// One part of a string expression body.
#[derive(Clone, Debug)]
pub enum UntypedStringPart {
    /// Cooked text (escapes decoded, indentation stripped).
    Text(Name),
    /// An interpolated expression.
    Expr(UntypedExprId),
}

/// Untyped expression payloads.
#[derive(Clone, Debug)]
pub enum UntypedExprKind {
    Literal(Constant),
    /// Reference to a local, parameter, or global.
    SymbolRef(SymbolId),
    /// Reference to a module (only legal as a member-access receiver).
    ModuleRef(SymbolId),
    /// Reference to a type (only legal in constructor position).
    TypeRef {
        symbol: SymbolId,
        /// The instantiated type when type arguments were written.
        instance: Option<TypeId>,
    },
    /// Reference to a function group; the promise picks the member.
    FunctionGroup {
        name: Name,
        candidates: Vec<SymbolId>,
        /// Explicit type arguments (`f<int32>`), when written.
        type_args: Option<Vec<TypeId>>,
        promise: PromiseId,
    },
    Call {
        callee: UntypedCallee,
        args: Vec<UntypedExprId>,
    },
    /// Array constructor call: `Array<T>(len)`.
    NewArray {
        element: TypeId,
        length: UntypedExprId,
    },
    Member {
        receiver: UntypedExprId,
        name: Name,
        promise: PromiseId,
    },
    Index {
        receiver: UntypedExprId,
        index: UntypedExprId,
    },
    /// Short-circuit conjunction; not an overloaded operator.
    And {
        left: UntypedExprId,
        right: UntypedExprId,
    },
    /// Short-circuit disjunction.
    Or {
        left: UntypedExprId,
        right: UntypedExprId,
    },
    /// Boolean negation.
    Not { operand: UntypedExprId },
    /// Chained relational expression; each step is an overload promise.
    Relational {
        first: UntypedExprId,
        comparisons: Vec<(Name, PromiseId, UntypedExprId)>,
    },
    If {
        condition: UntypedExprId,
        then_branch: UntypedExprId,
        else_branch: Option<UntypedExprId>,
    },
    While {
        condition: UntypedExprId,
        body: UntypedExprId,
    },
    Block {
        statements: Vec<UntypedStmtId>,
        value: Option<UntypedExprId>,
    },
    Return { value: Option<UntypedExprId> },
    Goto { label: SymbolId },
    Assign {
        target: UntypedExprId,
        /// Compound operator promise (`+=` etc.), `None` for plain `=`.
        operator: Option<(Name, PromiseId)>,
        value: UntypedExprId,
    },
    String { parts: Vec<UntypedStringPart> },
    /// Recovery placeholder.
    Error,
}

/// An untyped expression node.
#[derive(Clone, Debug)]
pub struct UntypedExpr {
    pub kind: UntypedExprKind,
    pub ty: TypeId,
    pub span: Span,
}

/// Untyped statement payloads.
#[derive(Clone, Debug)]
pub enum UntypedStmt {
    Local {
        symbol: SymbolId,
        initializer: Option<UntypedExprId>,
    },
    Label { symbol: SymbolId },
    Expr(UntypedExprId),
    /// Nested function declarations are compiled separately; the statement
    /// records the symbol for scope bookkeeping.
    Function { symbol: SymbolId },
    Nop,
}

/// Flat storage for one compilation's untyped bodies.
#[derive(Default)]
pub struct UntypedArena {
    exprs: Vec<UntypedExpr>,
    stmts: Vec<UntypedStmt>,
    stmt_spans: Vec<Span>,
}

impl UntypedArena {
    pub fn new() -> Self {
        UntypedArena::default()
    }

    pub fn alloc_expr(&mut self, expr: UntypedExpr) -> UntypedExprId {
        let id = UntypedExprId(u32::try_from(self.exprs.len()).expect("untyped arena overflow"));
        self.exprs.push(expr);
        id
    }

    pub fn alloc_stmt(&mut self, stmt: UntypedStmt, span: Span) -> UntypedStmtId {
        let id = UntypedStmtId(u32::try_from(self.stmts.len()).expect("untyped arena overflow"));
        self.stmts.push(stmt);
        self.stmt_spans.push(span);
        id
    }

    #[inline]
    pub fn expr(&self, id: UntypedExprId) -> &UntypedExpr {
        &self.exprs[id.0 as usize]
    }

    #[inline]
    pub fn stmt(&self, id: UntypedStmtId) -> &UntypedStmt {
        &self.stmts[id.0 as usize]
    }

    #[inline]
    pub fn stmt_span(&self, id: UntypedStmtId) -> Span {
        self.stmt_spans[id.0 as usize]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }
}
