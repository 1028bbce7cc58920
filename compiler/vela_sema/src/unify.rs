//! Link-based type unification.
//!
//! Unification is symmetric: a variable on either side gets substituted
//! (two variables union), concrete types compare structurally, and a
//! mismatch poisons both reachable variables with `Error` so a single root
//! cause cannot cascade into follow-on diagnostics.

use vela_diagnostic::Span;

use crate::{TypeData, TypeId, TypePool, VarState};

/// A recorded unification mismatch: the two types (unresolved display forms)
/// and the span the requirement came from.
#[derive(Clone, Debug)]
pub struct UnifyError {
    pub expected: TypeId,
    pub found: TypeId,
    pub span: Span,
}

/// Unify two types in the pool.
///
/// Returns `true` on success. On mismatch a [`UnifyError`] is appended and
/// every variable at the roots of both sides is linked to `Error`.
pub fn unify(
    pool: &mut TypePool,
    a: TypeId,
    b: TypeId,
    span: Span,
    errors: &mut Vec<UnifyError>,
) -> bool {
    let a = pool.resolve(a);
    let b = pool.resolve(b);
    if a == b {
        return true;
    }

    match (pool.data(a).clone(), pool.data(b).clone()) {
        // Error absorbs: never report against an already-failed type.
        (TypeData::Error, _) | (_, TypeData::Error) => true,

        // Variable on either side: substitute (two variables union).
        (TypeData::Var(var), _) => {
            pool.set_var(var, VarState::Link(b));
            true
        }
        (_, TypeData::Var(var)) => {
            pool.set_var(var, VarState::Link(a));
            true
        }

        // Never inhabits every type.
        (TypeData::Never, _) | (_, TypeData::Never) => true,

        (TypeData::Array { element: ea }, TypeData::Array { element: eb }) => {
            unify(pool, ea, eb, span, errors)
        }

        (
            TypeData::Function {
                params: pa,
                ret: ra,
            },
            TypeData::Function {
                params: pb,
                ret: rb,
            },
        ) => {
            if pa.len() != pb.len() {
                mismatch(pool, a, b, span, errors);
                return false;
            }
            let mut ok = true;
            for (&x, &y) in pa.iter().zip(&pb) {
                ok &= unify(pool, x, y, span, errors);
            }
            ok & unify(pool, ra, rb, span, errors)
        }

        (
            TypeData::Instance {
                generic: ga,
                args: aa,
            },
            TypeData::Instance {
                generic: gb,
                args: ab,
            },
        ) => {
            if ga != gb || aa.len() != ab.len() {
                mismatch(pool, a, b, span, errors);
                return false;
            }
            let mut ok = true;
            for (&x, &y) in aa.iter().zip(&ab) {
                ok &= unify(pool, x, y, span, errors);
            }
            ok
        }

        _ => {
            mismatch(pool, a, b, span, errors);
            false
        }
    }
}

/// Record a mismatch and poison both ends with `Error`.
fn mismatch(pool: &mut TypePool, a: TypeId, b: TypeId, span: Span, errors: &mut Vec<UnifyError>) {
    errors.push(UnifyError {
        expected: a,
        found: b,
        span,
    });
    poison(pool, a);
    poison(pool, b);
}

/// Link every root variable of `id` to `Error`.
fn poison(pool: &mut TypePool, id: TypeId) {
    let id = pool.resolve(id);
    if let TypeData::Var(var) = *pool.data(id) {
        pool.set_var(var, VarState::Link(TypePool::ERROR));
    }
}

/// Signature comparison that treats all type parameters as equal.
///
/// Used when deciding whether two function declarations collide in an
/// overload set.
pub fn signatures_match(pool: &TypePool, a: TypeId, b: TypeId) -> bool {
    fn types_match(pool: &TypePool, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        match (pool.data(a), pool.data(b)) {
            (TypeData::TypeParameter(_), TypeData::TypeParameter(_)) => true,
            (TypeData::Array { element: ea }, TypeData::Array { element: eb }) => {
                types_match(pool, *ea, *eb)
            }
            (
                TypeData::Function { params: pa, ret: ra },
                TypeData::Function { params: pb, ret: rb },
            ) => {
                pa.len() == pb.len()
                    && pa.iter().zip(pb).all(|(&x, &y)| types_match(pool, x, y))
                    && types_match(pool, *ra, *rb)
            }
            (
                TypeData::Instance { generic: ga, args: aa },
                TypeData::Instance { generic: gb, args: ab },
            ) => {
                ga == gb
                    && aa.len() == ab.len()
                    && aa.iter().zip(ab).all(|(&x, &y)| types_match(pool, x, y))
            }
            _ => false,
        }
    }
    types_match(pool, a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_errors() -> Vec<UnifyError> {
        Vec::new()
    }

    #[test]
    fn test_unify_var_with_concrete() {
        let mut pool = TypePool::new();
        let var = pool.fresh_var();
        let mut errors = no_errors();
        assert!(unify(&mut pool, var, TypePool::INT32, Span::DUMMY, &mut errors));
        assert_eq!(pool.resolve(var), TypePool::INT32);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_unify_is_symmetric() {
        let mut pool = TypePool::new();
        let var = pool.fresh_var();
        let mut errors = no_errors();
        assert!(unify(&mut pool, TypePool::BOOL, var, Span::DUMMY, &mut errors));
        assert_eq!(pool.resolve(var), TypePool::BOOL);
    }

    #[test]
    fn test_unify_is_transitive() {
        let mut pool = TypePool::new();
        let a = pool.fresh_var();
        let b = pool.fresh_var();
        let c = pool.fresh_var();
        let mut errors = no_errors();
        assert!(unify(&mut pool, a, b, Span::DUMMY, &mut errors));
        assert!(unify(&mut pool, b, c, Span::DUMMY, &mut errors));
        assert!(unify(&mut pool, a, TypePool::STRING, Span::DUMMY, &mut errors));
        assert_eq!(pool.resolve(c), TypePool::STRING);
    }

    #[test]
    fn test_mismatch_poisons_both_ends() {
        let mut pool = TypePool::new();
        let var = pool.fresh_var();
        let mut errors = no_errors();
        assert!(unify(&mut pool, var, TypePool::INT32, Span::DUMMY, &mut errors));
        assert!(!unify(&mut pool, var, TypePool::STRING, Span::DUMMY, &mut errors));
        assert_eq!(errors.len(), 1);
        // The variable keeps its earlier binding; subsequent unification
        // against it no longer reports (Error absorbs).
        assert!(unify(&mut pool, TypePool::ERROR, var, Span::DUMMY, &mut errors));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_error_absorbs() {
        let mut pool = TypePool::new();
        let mut errors = no_errors();
        assert!(unify(&mut pool, TypePool::ERROR, TypePool::INT32, Span::DUMMY, &mut errors));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_never_unifies_with_anything() {
        let mut pool = TypePool::new();
        let mut errors = no_errors();
        assert!(unify(&mut pool, TypePool::NEVER, TypePool::INT32, Span::DUMMY, &mut errors));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_function_types_unify_structurally() {
        let mut pool = TypePool::new();
        let var = pool.fresh_var();
        let f1 = pool.function(vec![TypePool::INT32], var);
        let f2 = pool.function(vec![TypePool::INT32], TypePool::BOOL);
        let mut errors = no_errors();
        assert!(unify(&mut pool, f1, f2, Span::DUMMY, &mut errors));
        assert_eq!(pool.resolve(var), TypePool::BOOL);
    }

    #[test]
    fn test_signature_match_treats_type_params_equal() {
        let mut pool = TypePool::new();
        let p1 = pool.intern_data(TypeData::TypeParameter(crate::SymbolId::from_raw(1)));
        let p2 = pool.intern_data(TypeData::TypeParameter(crate::SymbolId::from_raw(2)));
        let f1 = pool.function(vec![p1], p1);
        let f2 = pool.function(vec![p2], p2);
        assert!(signatures_match(&pool, f1, f2));
        let f3 = pool.function(vec![TypePool::INT32], TypePool::INT32);
        assert!(!signatures_match(&pool, f1, f3));
    }
}
