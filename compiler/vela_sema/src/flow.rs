//! Flow checks on the bound tree.
//!
//! Two checks run per function body:
//!
//! - `NotAllPathsReturn`: a function with a non-unit declared return type
//!   whose block body can complete normally.
//! - `UnreachableCode`: statements following a diverging statement inside
//!   a block.
//!
//! Divergence is structural and conservative: `return` and `goto` diverge,
//! an `if` diverges when its condition does or both branches do, a loop is
//! never assumed infinite.

use vela_diagnostic::{Diagnostic, ErrorCode};

use crate::{
    BoundArena, BoundBody, BoundCallee, BoundExprId, BoundExprKind, BoundStmt, BoundStmtId,
    SymbolStore, TypeData, TypePool,
};

/// Run flow checks over all bound bodies.
pub(crate) fn check(
    bound: &BoundArena,
    bodies: &[BoundBody],
    store: &SymbolStore,
    pool: &mut TypePool,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for body in bodies {
        check_unreachable(bound, body.root, diagnostics);

        let data = store.get(body.function);
        let Some(function) = data.as_function() else {
            continue;
        };
        let ret = pool.resolve(function.return_type);
        let needs_return = !matches!(
            pool.data(ret),
            TypeData::Primitive(crate::Primitive::Unit) | TypeData::Error | TypeData::Never
        );
        // Inline bodies produce their value; only block bodies can fall
        // off the end.
        let is_block = matches!(
            bound.expr(body.root).kind,
            BoundExprKind::Block { .. }
        );
        if needs_return && is_block && !diverges(bound, body.root) {
            let span = bound.expr(body.root).span;
            diagnostics.push(Diagnostic::error(
                ErrorCode::E4002,
                "not all code paths return a value".to_string(),
                span,
            ));
        }
    }
}

/// Report statements that can never execute.
fn check_unreachable(bound: &BoundArena, root: BoundExprId, diagnostics: &mut Vec<Diagnostic>) {
    walk_blocks(bound, root, &mut |bound, statements| {
        let mut diverged = false;
        for &stmt in statements {
            if diverged {
                diagnostics.push(Diagnostic::warning(
                    ErrorCode::E4001,
                    "unreachable code".to_string(),
                    bound.stmt_span(stmt),
                ));
                break;
            }
            if stmt_diverges(bound, stmt) {
                diverged = true;
            }
        }
    });
}

/// Visit every block's statement list in the expression tree.
fn walk_blocks(
    bound: &BoundArena,
    expr: BoundExprId,
    visit: &mut impl FnMut(&BoundArena, &[BoundStmtId]),
) {
    match &bound.expr(expr).kind {
        BoundExprKind::Block {
            statements, value, ..
        } => {
            visit(bound, statements);
            for &stmt in statements {
                match bound.stmt(stmt) {
                    BoundStmt::Expr(e) => walk_blocks(bound, *e, visit),
                    BoundStmt::Local {
                        initializer: Some(init),
                        ..
                    } => walk_blocks(bound, *init, visit),
                    _ => {}
                }
            }
            if let Some(value) = value {
                walk_blocks(bound, *value, visit);
            }
        }
        BoundExprKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            walk_blocks(bound, *condition, visit);
            walk_blocks(bound, *then_branch, visit);
            if let Some(else_branch) = else_branch {
                walk_blocks(bound, *else_branch, visit);
            }
        }
        BoundExprKind::While { condition, body } => {
            walk_blocks(bound, *condition, visit);
            walk_blocks(bound, *body, visit);
        }
        BoundExprKind::Call { callee, args } => {
            if let BoundCallee::Value(callee) = callee {
                walk_blocks(bound, *callee, visit);
            }
            for &arg in args {
                walk_blocks(bound, arg, visit);
            }
        }
        BoundExprKind::Assign { target, value, .. } => {
            walk_blocks(bound, *target, visit);
            walk_blocks(bound, *value, visit);
        }
        BoundExprKind::Return { value: Some(value) } => walk_blocks(bound, *value, visit),
        BoundExprKind::And { left, right } | BoundExprKind::Or { left, right } => {
            walk_blocks(bound, *left, visit);
            walk_blocks(bound, *right, visit);
        }
        BoundExprKind::Not { operand } => walk_blocks(bound, *operand, visit),
        BoundExprKind::Index { receiver, index } => {
            walk_blocks(bound, *receiver, visit);
            walk_blocks(bound, *index, visit);
        }
        BoundExprKind::Member { receiver, .. } => walk_blocks(bound, *receiver, visit),
        BoundExprKind::Relational { first, comparisons } => {
            walk_blocks(bound, *first, visit);
            for (_, operand) in comparisons {
                walk_blocks(bound, *operand, visit);
            }
        }
        _ => {}
    }
}

fn stmt_diverges(bound: &BoundArena, stmt: BoundStmtId) -> bool {
    match bound.stmt(stmt) {
        BoundStmt::Expr(expr) => diverges(bound, *expr),
        BoundStmt::Local {
            initializer: Some(init),
            ..
        } => diverges(bound, *init),
        _ => false,
    }
}

/// True when evaluating `expr` can never complete normally.
fn diverges(bound: &BoundArena, expr: BoundExprId) -> bool {
    match &bound.expr(expr).kind {
        BoundExprKind::Return { .. } | BoundExprKind::Goto { .. } => true,
        BoundExprKind::Block {
            statements, value, ..
        } => {
            statements.iter().any(|&s| stmt_diverges(bound, s))
                || (*value).is_some_and(|v| diverges(bound, v))
        }
        BoundExprKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            diverges(bound, *condition)
                || match else_branch {
                    Some(else_branch) => {
                        diverges(bound, *then_branch) && diverges(bound, *else_branch)
                    }
                    None => false,
                }
        }
        BoundExprKind::While { condition, .. } => diverges(bound, *condition),
        BoundExprKind::Call { callee, args } => {
            let callee_diverges = match callee {
                BoundCallee::Value(callee) => diverges(bound, *callee),
                BoundCallee::Function(_) => false,
            };
            callee_diverges || args.iter().any(|&a| diverges(bound, a))
        }
        BoundExprKind::Assign { target, value, .. } => {
            diverges(bound, *target) || diverges(bound, *value)
        }
        BoundExprKind::And { left, .. } | BoundExprKind::Or { left, .. } => {
            // The right side may be skipped.
            diverges(bound, *left)
        }
        BoundExprKind::Not { operand } => diverges(bound, *operand),
        BoundExprKind::Index { receiver, index } => {
            diverges(bound, *receiver) || diverges(bound, *index)
        }
        BoundExprKind::Member { receiver, .. } => diverges(bound, *receiver),
        BoundExprKind::NewArray { length, .. } => diverges(bound, *length),
        _ => false,
    }
}
