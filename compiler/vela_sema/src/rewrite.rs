//! The untyped → bound rewrite.
//!
//! Runs after the solver reaches fixpoint. Every type is resolved through
//! the pool (residual variables collapse to `Error`), and every promise is
//! read out: resolved promises yield the chosen symbol, failed promises
//! collapse the expression to `Error` without further diagnostics (the
//! root cause was already reported).

use crate::solve::PromiseState;
use crate::{
    BoundArena, BoundCallee, BoundExpr, BoundExprId, BoundExprKind, BoundStmt, BoundStringPart,
    PromiseId, Promises, SymbolId, TypeData, TypeId, TypePool, UntypedArena, UntypedCallee,
    UntypedExprId, UntypedExprKind, UntypedStmt, UntypedStmtId, UntypedStringPart,
};

pub(crate) struct Rewriter<'a> {
    pub untyped: &'a UntypedArena,
    pub bound: &'a mut BoundArena,
    pub pool: &'a mut TypePool,
    pub promises: &'a Promises,
}

impl Rewriter<'_> {
    /// Final type of an expression: resolved, with residual variables
    /// collapsed to `Error`.
    fn final_ty(&mut self, ty: TypeId) -> TypeId {
        let resolved = self.pool.resolve(ty);
        if matches!(self.pool.data(resolved), TypeData::Var(_)) {
            TypePool::ERROR
        } else {
            resolved
        }
    }

    fn promised(&self, promise: PromiseId) -> Option<SymbolId> {
        match self.promises.get(promise) {
            PromiseState::Resolved(symbol) => Some(symbol),
            PromiseState::Unresolved | PromiseState::Failed => None,
        }
    }

    pub(crate) fn expr(&mut self, id: UntypedExprId) -> BoundExprId {
        let node = self.untyped.expr(id).clone();
        let ty = self.final_ty(node.ty);
        let span = node.span;

        let kind = match node.kind {
            UntypedExprKind::Literal(constant) => BoundExprKind::Literal(constant),
            UntypedExprKind::SymbolRef(symbol) => BoundExprKind::SymbolRef(symbol),
            UntypedExprKind::ModuleRef(_) | UntypedExprKind::TypeRef { .. } => {
                // Context diagnostics were reported at binding time.
                BoundExprKind::Error
            }
            UntypedExprKind::FunctionGroup { promise, .. } => match self.promised(promise) {
                Some(symbol) => BoundExprKind::FunctionRef(symbol),
                None => BoundExprKind::Error,
            },
            UntypedExprKind::Call { callee, args } => {
                let args: Vec<BoundExprId> = args.iter().map(|&a| self.expr(a)).collect();
                match callee {
                    UntypedCallee::Expr(callee) => {
                        let callee = self.expr(callee);
                        BoundExprKind::Call {
                            callee: BoundCallee::Value(callee),
                            args,
                        }
                    }
                    UntypedCallee::Overload { promise, .. } => match self.promised(promise) {
                        Some(symbol) => BoundExprKind::Call {
                            callee: BoundCallee::Function(symbol),
                            args,
                        },
                        None => BoundExprKind::Error,
                    },
                }
            }
            UntypedExprKind::NewArray { element, length } => {
                let element = self.final_ty(element);
                let length = self.expr(length);
                BoundExprKind::NewArray { element, length }
            }
            UntypedExprKind::Member {
                receiver, promise, ..
            } => {
                let receiver = self.expr(receiver);
                match self.promised(promise) {
                    Some(member) => BoundExprKind::Member { receiver, member },
                    None => BoundExprKind::Error,
                }
            }
            UntypedExprKind::Index { receiver, index } => BoundExprKind::Index {
                receiver: self.expr(receiver),
                index: self.expr(index),
            },
            UntypedExprKind::And { left, right } => BoundExprKind::And {
                left: self.expr(left),
                right: self.expr(right),
            },
            UntypedExprKind::Or { left, right } => BoundExprKind::Or {
                left: self.expr(left),
                right: self.expr(right),
            },
            UntypedExprKind::Not { operand } => BoundExprKind::Not {
                operand: self.expr(operand),
            },
            UntypedExprKind::Relational { first, comparisons } => {
                let first = self.expr(first);
                let mut bound = Vec::with_capacity(comparisons.len());
                let mut failed = false;
                for (_, promise, operand) in comparisons {
                    let operand = self.expr(operand);
                    match self.promised(promise) {
                        Some(symbol) => bound.push((symbol, operand)),
                        None => failed = true,
                    }
                }
                if failed {
                    BoundExprKind::Error
                } else {
                    BoundExprKind::Relational {
                        first,
                        comparisons: bound,
                    }
                }
            }
            UntypedExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => BoundExprKind::If {
                condition: self.expr(condition),
                then_branch: self.expr(then_branch),
                else_branch: else_branch.map(|e| self.expr(e)),
            },
            UntypedExprKind::While { condition, body } => BoundExprKind::While {
                condition: self.expr(condition),
                body: self.expr(body),
            },
            UntypedExprKind::Block { statements, value } => {
                let mut locals = Vec::new();
                let statements: Vec<_> = statements
                    .iter()
                    .map(|&s| self.stmt(s, &mut locals))
                    .collect();
                let value = value.map(|v| self.expr(v));
                BoundExprKind::Block {
                    statements,
                    value,
                    locals,
                }
            }
            UntypedExprKind::Return { value } => BoundExprKind::Return {
                value: value.map(|v| self.expr(v)),
            },
            UntypedExprKind::Goto { label } => BoundExprKind::Goto { label },
            UntypedExprKind::Assign {
                target,
                operator,
                value,
            } => {
                let target = self.expr(target);
                let value = self.expr(value);
                match operator {
                    None => BoundExprKind::Assign {
                        target,
                        operator: None,
                        value,
                    },
                    Some((_, promise)) => match self.promised(promise) {
                        Some(symbol) => BoundExprKind::Assign {
                            target,
                            operator: Some(symbol),
                            value,
                        },
                        None => BoundExprKind::Error,
                    },
                }
            }
            UntypedExprKind::String { parts } => {
                let parts = parts
                    .into_iter()
                    .map(|part| match part {
                        UntypedStringPart::Text(text) => BoundStringPart::Text(text),
                        UntypedStringPart::Expr(expr) => BoundStringPart::Expr(self.expr(expr)),
                    })
                    .collect();
                BoundExprKind::String { parts }
            }
            UntypedExprKind::Error => BoundExprKind::Error,
        };

        let ty = if matches!(kind, BoundExprKind::Error) {
            TypePool::ERROR
        } else {
            ty
        };
        self.bound.alloc_expr(BoundExpr { kind, ty, span })
    }

    fn stmt(&mut self, id: UntypedStmtId, locals: &mut Vec<SymbolId>) -> crate::BoundStmtId {
        let span = self.untyped.stmt_span(id);
        let stmt = match self.untyped.stmt(id).clone() {
            UntypedStmt::Local {
                symbol,
                initializer,
            } => {
                locals.push(symbol);
                BoundStmt::Local {
                    symbol,
                    initializer: initializer.map(|i| self.expr(i)),
                }
            }
            UntypedStmt::Label { symbol } => BoundStmt::Label { symbol },
            UntypedStmt::Expr(expr) => BoundStmt::Expr(self.expr(expr)),
            UntypedStmt::Function { .. } | UntypedStmt::Nop => BoundStmt::Nop,
        };
        self.bound.alloc_stmt(stmt, span)
    }
}
