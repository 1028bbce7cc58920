//! Semantic analysis for Vela.
//!
//! The pipeline inside this crate:
//!
//! 1. **Binder** ([`analyze`]): walks syntax, builds the symbol DAG rooted
//!    at the compilation's root module, and produces the **untyped tree**,
//!    where every expression carries a type (possibly a fresh variable)
//!    and every unresolved overload is a promise.
//! 2. **Solver** ([`solve::Solver`]): a fixpoint engine over constraints
//!    (`Assignable`, `Call`, `Overload`, `Member`) that unifies type
//!    variables and scores overload candidates.
//! 3. **Rewrite**: the untyped tree becomes the **bound tree** — every
//!    promise resolved to one symbol, every expression concretely typed.
//! 4. **Flow checks**: return-path and reachability diagnostics.
//!
//! No diagnostic is fatal: analysis always runs to completion, with the
//! `Error` type absorbing cascades so each failure is reported once.

mod binder;
mod bound;
mod cancel;
mod flow;
mod intrinsics;
pub mod provider;
mod rewrite;
mod scope;
pub mod solve;
mod symbol;
mod types;
mod unify;
mod untyped;

pub use binder::{analyze, AnalyzeOptions, Analysis};
pub use bound::{
    BoundArena, BoundBody, BoundCallee, BoundExpr, BoundExprId, BoundExprKind, BoundStmt,
    BoundStmtId, BoundStringPart,
};
pub use cancel::CancellationToken;
pub use intrinsics::Intrinsics;
pub use provider::{
    AssemblySymbols, MemberDescription, MemberDescriptionKind, SymbolProvider, TypeDescription,
    TypeSymbols,
};
pub use solve::{Constraint, Promises, SolveState, Solver};
pub use symbol::{
    FunctionSymbol, IntrinsicOp, Lazy, SymbolData, SymbolId, SymbolKind, SymbolStore, Visibility,
};
pub use types::{Primitive, TypeData, TypeId, TypePool, VarState};
pub use unify::{signatures_match, unify, UnifyError};
pub use untyped::{
    Constant, PromiseId, UntypedArena, UntypedCallee, UntypedExpr, UntypedExprId, UntypedExprKind,
    UntypedStmt, UntypedStmtId, UntypedStringPart,
};

#[cfg(test)]
mod tests {
    //! End-to-end binder + solver tests over parsed sources.

    use std::sync::Arc;

    use vela_diagnostic::ErrorCode;
    use vela_syntax::StringInterner;

    use super::*;

    fn analyze_source(source: &str) -> Analysis {
        let interner = Arc::new(StringInterner::new());
        let tree = vela_parse::parse(source, Arc::clone(&interner));
        assert!(
            tree.diagnostics().is_empty(),
            "test source must parse cleanly: {:?}",
            tree.diagnostics()
        );
        analyze(&tree, &AnalyzeOptions::default(), &CancellationToken::new())
    }

    fn codes(analysis: &Analysis) -> Vec<ErrorCode> {
        analysis.diagnostics.iter().map(|d| d.code()).collect()
    }

    #[test]
    fn test_arithmetic_resolves_to_int32() {
        let analysis = analyze_source("func main() { var x: int32 = 1 + 2 * 3; }");
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
        // The local's declared type and the initializer unified.
        let body = &analysis.bodies[0];
        let root = analysis.bound.expr(body.root);
        assert!(matches!(root.kind, BoundExprKind::Block { .. }));
    }

    #[test]
    fn test_generic_call_instantiates() {
        let analysis =
            analyze_source("func f<T>(x: T): T = x;\nfunc main() { var y: int32 = f<int32>(5); }");
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    }

    #[test]
    fn test_generic_inference_without_explicit_args() {
        let analysis =
            analyze_source("func f<T>(x: T): T = x;\nfunc main() { var y: int32 = f(5); }");
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    }

    #[test]
    fn test_no_matching_overload_reports_once() {
        let analysis = analyze_source("func main(): int32 { return 1 + \"x\"; }");
        let errors = codes(&analysis);
        assert_eq!(
            errors.iter().filter(|&&c| c == ErrorCode::E3004).count(),
            1,
            "exactly one NoMatchingOverload: {:?}",
            analysis.diagnostics
        );
        // No cascade into the declared return type.
        assert!(!errors.contains(&ErrorCode::E3001), "{:?}", analysis.diagnostics);
    }

    #[test]
    fn test_undefined_reference() {
        let analysis = analyze_source("func main() { missing(); }");
        assert!(codes(&analysis).contains(&ErrorCode::E2001));
    }

    #[test]
    fn test_type_mismatch_reported() {
        let analysis = analyze_source("func main() { var x: bool = 1; }");
        assert!(codes(&analysis).contains(&ErrorCode::E3001));
    }

    #[test]
    fn test_val_is_immutable() {
        let analysis = analyze_source("func main() { val x = 1; x = 2; }");
        assert!(codes(&analysis).contains(&ErrorCode::E3006));
    }

    #[test]
    fn test_shadowing_in_inner_block() {
        let analysis = analyze_source(
            "func main() { val x = 1; { val x = \"s\"; var y: string = x; } var z: int32 = x; }",
        );
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    }

    #[test]
    fn test_goto_and_labels() {
        let analysis =
            analyze_source("func main() { var i = 0; again: i += 1; if (i < 3) goto again; }");
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    }

    #[test]
    fn test_undefined_label() {
        let analysis = analyze_source("func main() { goto nowhere; }");
        assert!(codes(&analysis).contains(&ErrorCode::E2001));
    }

    #[test]
    fn test_not_all_paths_return() {
        let analysis = analyze_source("func f(c: bool): int32 { if (c) return 1; }");
        assert!(codes(&analysis).contains(&ErrorCode::E4002));
    }

    #[test]
    fn test_all_paths_return_accepted() {
        let analysis =
            analyze_source("func f(c: bool): int32 { if (c) { return 1; } else { return 2; } }");
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    }

    #[test]
    fn test_if_with_both_branches_diverging() {
        // The result of the `if` settles to Never rather than failing
        // inference when every path out of it diverges.
        let analysis = analyze_source(
            "func f(c: bool): int32 { if (c) { return 1; } else { return 2; } }",
        );
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
        let root = analysis.bodies[0].root;
        let BoundExprKind::Block { statements, .. } = &analysis.bound.expr(root).kind else {
            panic!("block body");
        };
        let BoundStmt::Expr(if_expr) = analysis.bound.stmt(statements[0]) else {
            panic!("if statement");
        };
        assert_ne!(analysis.bound.expr(*if_expr).ty, TypePool::ERROR);
    }

    #[test]
    fn test_unreachable_code_warned() {
        let analysis = analyze_source("func main() { return; val x = 1; }");
        assert!(codes(&analysis).contains(&ErrorCode::E4001));
    }

    #[test]
    fn test_type_as_value_rejected() {
        let analysis = analyze_source("func main() { int32(5); }");
        assert!(codes(&analysis).contains(&ErrorCode::E2003));
    }

    #[test]
    fn test_array_constructor_and_indexing() {
        let analysis = analyze_source(
            "func main() { val xs = Array<int32>(3); xs[0] = 1; var n: int32 = xs[0] + xs.length; }",
        );
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    }

    #[test]
    fn test_variadic_parameter_requires_array() {
        let analysis = analyze_source("func f(...xs: int32) {}");
        assert!(codes(&analysis).contains(&ErrorCode::E3001));
    }

    #[test]
    fn test_variadic_call_matches_zero_or_more() {
        let analysis = analyze_source(
            "func sum(...xs: Array<int32>): int32 = 0;\nfunc main() { sum(); sum(1); sum(1, 2, 3); }",
        );
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    }

    #[test]
    fn test_ambiguous_overload_reported_not_picked() {
        let analysis = analyze_source(
            "func g(x: int32, y: float64) {}\nfunc g(x: float64, y: int32) {}\nfunc main() { g(1, 2); }",
        );
        // Neither candidate matches (1, 2) exactly; both are eliminated on
        // the mismatched argument, so this reports rather than picking.
        assert!(
            codes(&analysis).contains(&ErrorCode::E3004)
                || codes(&analysis).contains(&ErrorCode::E3003),
            "{:?}",
            analysis.diagnostics
        );
    }

    #[test]
    fn test_duplicate_overload_signature() {
        let analysis = analyze_source("func f(x: int32) {}\nfunc f(x: int32) {}");
        assert!(codes(&analysis).contains(&ErrorCode::E2004));
    }

    #[test]
    fn test_module_member_access() {
        let analysis = analyze_source(
            "module geometry { public func area(w: int32, h: int32): int32 = w * h; }\nfunc main() { var a: int32 = geometry.area(2, 3); }",
        );
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    }

    #[test]
    fn test_module_global_references_sibling() {
        // `b`'s initializer binds inside module `m`'s scope, so the
        // sibling global `a` resolves.
        let analysis = analyze_source("module m { val a = 1; val b = a; }");
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
        assert_eq!(analysis.globals.len(), 2);
    }

    #[test]
    fn test_nested_module_global_initializers() {
        let analysis = analyze_source(
            "module outer { module inner { val a = 1; val b = a + 1; } }",
        );
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
        assert_eq!(analysis.globals.len(), 2);
    }

    #[test]
    fn test_root_global_initializer_calls_function() {
        let analysis =
            analyze_source("func twice(x: int32): int32 = x * 2;\nval n = twice(21);");
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
        let (_, init) = analysis.globals[0];
        assert!(init.is_some());
    }

    #[test]
    fn test_module_as_value_rejected() {
        let analysis =
            analyze_source("module m { public func f() {} }\nfunc main() { val x = m; }");
        assert!(codes(&analysis).contains(&ErrorCode::E2003));
    }

    #[test]
    fn test_string_interpolation_types() {
        let analysis =
            analyze_source("func main() { val n = 3; var s: string = \"n = \\{n}!\"; }");
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    }

    #[test]
    fn test_if_branches_unify() {
        let analysis =
            analyze_source("func pick(c: bool): int32 { return if (c) 1 else 2; }");
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    }

    #[test]
    fn test_if_branch_mismatch() {
        let analysis = analyze_source("func main() { val x = if (true) 1 else \"s\"; }");
        assert!(codes(&analysis).contains(&ErrorCode::E3001));
    }

    #[test]
    fn test_external_import_through_provider() {
        use provider::test_support::FakeProvider;

        let source = "import system.console;\nfunc main() { log(\"hi\"); }";
        let interner = Arc::new(StringInterner::new());
        let tree = vela_parse::parse(source, Arc::clone(&interner));
        assert!(tree.diagnostics().is_empty());

        let provider = FakeProvider {
            assembly_name: "system".to_string(),
            types: vec![(
                Vec::new(),
                "console".to_string(),
                vec![MemberDescription {
                    name: "log".to_string(),
                    visibility: Visibility::Public,
                    kind: MemberDescriptionKind::Function {
                        params: vec![TypeDescription::Primitive(Primitive::String)],
                        ret: TypeDescription::Unit,
                        is_variadic: false,
                    },
                }],
            )],
        };
        let options = AnalyzeOptions {
            providers: vec![Arc::new(provider)],
            references: vec!["system".to_string()],
        };
        let analysis = analyze(&tree, &options, &CancellationToken::new());
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    }

    #[test]
    fn test_cancellation_stops_solving() {
        let interner = Arc::new(StringInterner::new());
        let tree = vela_parse::parse("func main() { var x: int32 = 1 + 2; }", Arc::clone(&interner));
        let token = CancellationToken::new();
        token.cancel();
        let analysis = analyze(&tree, &AnalyzeOptions::default(), &token);
        // Cancellation is not an error: no body was processed, and no
        // residual-inference diagnostics leak out.
        assert!(analysis.bodies.is_empty());
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    }
}
