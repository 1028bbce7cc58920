//! Register-based three-address IR for Vela, and lowering from the bound
//! tree.
//!
//! The model: a [`Module`] of [`Procedure`]s, each an ordered list of
//! [`BasicBlock`]s ending in exactly one branch. Lowering walks bound
//! bodies depth-first, with block detachment for `return`/`goto`, lvalue
//! load/store templates for assignment, and the operator rewrites
//! documented in [`lower`].

mod lower;
mod model;
mod print;

pub use lower::lower;
pub use model::{
    BasicBlock, BlockId, GlobalId, Instruction, LocalId, Module, Operand, ParamId, Procedure,
    RegisterId,
};
pub use print::{print_module, print_procedure, qualified_name};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vela_sema::{analyze, Analysis, AnalyzeOptions, CancellationToken, Constant};
    use vela_syntax::StringInterner;

    use super::*;

    fn lower_source(source: &str) -> (Module, Analysis, Arc<StringInterner>) {
        let interner = Arc::new(StringInterner::new());
        let tree = vela_parse::parse(source, Arc::clone(&interner));
        assert!(tree.diagnostics().is_empty(), "{:?}", tree.diagnostics());
        let analysis = analyze(&tree, &AnalyzeOptions::default(), &CancellationToken::new());
        assert!(
            analysis.diagnostics.is_empty(),
            "{:?}",
            analysis.diagnostics
        );
        let module = lower(&analysis);
        (module, analysis, interner)
    }

    fn all_instructions(procedure: &Procedure) -> Vec<&Instruction> {
        procedure
            .blocks
            .iter()
            .flat_map(|b| b.instructions.iter())
            .collect()
    }

    #[test]
    fn test_mul_before_add() {
        let (module, _, _) = lower_source("func main() { var x: int32 = 1 + 2 * 3; }");
        let main = &module.procedures[0];
        let instructions = all_instructions(main);
        let mul = instructions
            .iter()
            .position(|i| matches!(i, Instruction::Mul { .. }))
            .expect("a mul instruction");
        let add = instructions
            .iter()
            .position(|i| matches!(i, Instruction::Add { .. }))
            .expect("an add instruction");
        assert!(mul < add, "mul is emitted before add");
    }

    #[test]
    fn test_every_block_ends_in_one_branch() {
        let (module, _, _) = lower_source(
            "func abs(x: int32): int32 { if (x < 0) { return 0 - x; } else { return x; } }\nfunc main() { abs(0 - 5); }",
        );
        for procedure in &module.procedures {
            for block in &procedure.blocks {
                if block.instructions.is_empty() {
                    continue;
                }
                assert!(
                    block.terminator().is_some(),
                    "block must end in a branch: {block:?}"
                );
                let branches = block
                    .instructions
                    .iter()
                    .filter(|i| i.is_branch())
                    .count();
                assert_eq!(branches, 1, "exactly one branch per block: {block:?}");
            }
        }
    }

    #[test]
    fn test_mod_lowering_is_mathematically_correct() {
        // (a rem b + b) rem b: two rem instructions and one add.
        let (module, _, _) = lower_source("func f(a: int32, b: int32): int32 = a mod b;");
        let procedure = &module.procedures[0];
        let instructions = all_instructions(procedure);
        let rems = instructions
            .iter()
            .filter(|i| matches!(i, Instruction::Rem { .. }))
            .count();
        let adds = instructions
            .iter()
            .filter(|i| matches!(i, Instruction::Add { .. }))
            .count();
        assert_eq!(rems, 2);
        assert_eq!(adds, 1);
        // The second rem consumes the add's result.
        let add_target = instructions.iter().find_map(|i| match i {
            Instruction::Add { target, .. } => Some(*target),
            _ => None,
        });
        let last_rem_left = instructions.iter().rev().find_map(|i| match i {
            Instruction::Rem { left, .. } => Some(left.clone()),
            _ => None,
        });
        assert_eq!(last_rem_left, add_target.map(Operand::Register));
    }

    #[test]
    fn test_greater_equal_rewrites_to_not_less() {
        let (module, _, _) = lower_source("func f(a: int32, b: int32): bool = a >= b;");
        let instructions = all_instructions(&module.procedures[0]);
        assert!(instructions
            .iter()
            .any(|i| matches!(i, Instruction::Less { .. })));
        // The negation is `x == false`.
        assert!(instructions.iter().any(|i| matches!(
            i,
            Instruction::Equal {
                right: Operand::Constant(Constant::Bool(false)),
                ..
            }
        )));
    }

    #[test]
    fn test_not_equal_rewrites_through_equal() {
        let (module, _, _) = lower_source("func f(a: int32, b: int32): bool = a != b;");
        let instructions = all_instructions(&module.procedures[0]);
        let equals = instructions
            .iter()
            .filter(|i| matches!(i, Instruction::Equal { .. }))
            .count();
        assert_eq!(equals, 2, "a == b, then == false");
    }

    #[test]
    fn test_unary_minus_is_mul_by_minus_one() {
        let (module, _, _) = lower_source("func f(x: int32): int32 = -x;");
        let instructions = all_instructions(&module.procedures[0]);
        assert!(instructions.iter().any(|i| matches!(
            i,
            Instruction::Mul {
                right: Operand::Constant(Constant::Int(-1)),
                ..
            }
        )));
    }

    #[test]
    fn test_goto_detaches_block() {
        let (module, _, _) = lower_source(
            "func main() { var i = 0; again: i = i + 1; if (i < 3) goto again; }",
        );
        let procedure = &module.procedures[0];
        // A jump back to the label block exists.
        let jumps = all_instructions(procedure)
            .iter()
            .filter(|i| matches!(i, Instruction::Jump { .. }))
            .count();
        assert!(jumps >= 2, "implicit jump into the label plus the goto");
    }

    #[test]
    fn test_return_detaches_and_drops_trailing_code() {
        let interner = Arc::new(StringInterner::new());
        let tree = vela_parse::parse("func main() { return; val x = 1; }", Arc::clone(&interner));
        let analysis = analyze(&tree, &AnalyzeOptions::default(), &CancellationToken::new());
        // The unreachable-code warning is expected; lowering still works.
        let module = lower(&analysis);
        let procedure = &module.procedures[0];
        // No store for `x` lands after the ret.
        for block in &procedure.blocks {
            if let Some(position) = block
                .instructions
                .iter()
                .position(|i| matches!(i, Instruction::Ret { .. }))
            {
                for trailing in &block.instructions[position + 1..] {
                    assert!(
                        trailing.valid_in_unreachable(),
                        "only scope ends and sequence points after ret: {trailing:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_while_loop_shape() {
        let (module, _, _) = lower_source("func main() { var i = 0; while (i < 3) { i = i + 1; } }");
        let procedure = &module.procedures[0];
        assert!(procedure.blocks.len() >= 4, "entry, header, body, exit");
        assert!(all_instructions(procedure)
            .iter()
            .any(|i| matches!(i, Instruction::Branch { .. })));
    }

    #[test]
    fn test_and_short_circuits() {
        let (module, _, _) = lower_source("func f(a: bool, b: bool): bool = a and b;");
        let procedure = &module.procedures[0];
        // Short-circuit needs a branch even in a straight-line function.
        assert!(all_instructions(procedure)
            .iter()
            .any(|i| matches!(i, Instruction::Branch { .. })));
    }

    #[test]
    fn test_relational_chain_evaluates_middle_once(){
        let (module, _, _) = lower_source("func f(a: int32, b: int32, c: int32): bool = a < b > c;");
        let procedure = &module.procedures[0];
        // `b` is param1: exactly one load of it despite two comparisons.
        let loads_of_b = all_instructions(procedure)
            .iter()
            .filter(|i| matches!(i, Instruction::Load { source: Operand::Param(ParamId(1)), .. }))
            .count();
        assert_eq!(loads_of_b, 1);
    }

    #[test]
    fn test_compound_assignment_loads_once_stores_once() {
        let (module, _, _) = lower_source("func main() { var xs = Array<int32>(1); xs[0] += 2; }");
        let procedure = &module.procedures[0];
        let instructions = all_instructions(procedure);
        let element_loads = instructions
            .iter()
            .filter(|i| matches!(i, Instruction::LoadElement { .. }))
            .count();
        let element_stores = instructions
            .iter()
            .filter(|i| matches!(i, Instruction::StoreElement { .. }))
            .count();
        assert_eq!(element_loads, 1);
        assert_eq!(element_stores, 1);
    }

    #[test]
    fn test_procedure_with_errors_is_skipped() {
        let interner = Arc::new(StringInterner::new());
        let tree = vela_parse::parse(
            "func bad(): int32 { return 1 + \"x\"; }\nfunc good(): int32 { return 1; }",
            Arc::clone(&interner),
        );
        let analysis = analyze(&tree, &AnalyzeOptions::default(), &CancellationToken::new());
        assert!(!analysis.diagnostics.is_empty());
        let module = lower(&analysis);
        assert_eq!(module.procedures.len(), 1, "only the clean procedure lowers");
    }

    #[test]
    fn test_global_initializers_synthesize_procedure() {
        let (module, analysis, _) = lower_source("val answer = 42;\nfunc main() {}");
        // One procedure for main, one synthesized for global init.
        assert_eq!(module.procedures.len(), 2);
        assert_eq!(module.globals.len(), 1);
        let synthesized = module
            .procedures
            .iter()
            .find(|p| analysis.store.get(p.symbol).name.is_none())
            .expect("synthesized init procedure");
        assert!(all_instructions(synthesized).iter().any(|i| matches!(
            i,
            Instruction::Store {
                target: Operand::Global(_),
                ..
            }
        )));
    }

    #[test]
    fn test_printed_form() {
        let (module, mut analysis, interner) =
            lower_source("func add(a: int32, b: int32): int32 = a + b;");
        let text = print_module(&module, &analysis.store, &mut analysis.pool, &interner);
        assert!(text.contains("proc @add"));
        assert!(text.contains(":= add"));
        assert!(text.contains("ret "));
    }
}
