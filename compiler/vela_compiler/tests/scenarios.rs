//! End-to-end scenarios through the full pipeline.

use vela_compiler::{Compilation, CompileOptions};
use vela_diagnostic::{ErrorCode, Severity};
use vela_ir::Instruction;

fn compile(source: &str) -> Compilation {
    Compilation::new(source, CompileOptions::new("test.vela"))
}

#[test]
fn test_arithmetic_program() {
    // `1 + 2 * 3`: parses clean, `x` resolves to int32, and the IR holds
    // Mul before Add.
    let compilation = compile("func main() { var x: int32 = 1 + 2 * 3; }");
    assert!(compilation.diagnostics().is_empty(), "{:?}", compilation.diagnostics());

    let module = compilation.ir();
    let main = &module.procedures[0];
    let instructions: Vec<&Instruction> = main
        .blocks
        .iter()
        .flat_map(|b| b.instructions.iter())
        .collect();
    let mul = instructions
        .iter()
        .position(|i| matches!(i, Instruction::Mul { .. }))
        .expect("mul emitted");
    let add = instructions
        .iter()
        .position(|i| matches!(i, Instruction::Add { .. }))
        .expect("add emitted");
    assert!(mul < add);
}

#[test]
fn test_generic_function_call() {
    // `f<int32>(5)`: the `<` disambiguates to generics, no diagnostics.
    let compilation = compile("func f<T>(x: T): T = x;\nfunc main() { f<int32>(5); }");
    assert!(compilation.diagnostics().is_empty(), "{:?}", compilation.diagnostics());
}

#[test]
fn test_chained_relational() {
    // `1 < 2 > 3` is one chained relational expression, not generics.
    let compilation = compile("func main() { 1 < 2 > 3; }");
    assert!(compilation.diagnostics().is_empty(), "{:?}", compilation.diagnostics());
}

#[test]
fn test_multi_line_string_indentation() {
    // Closing prefix is two spaces; deeper lines are fine, a
    // one-space line reports insufficient indentation.
    let ok = compile("val s = \"\"\"\n  foo\n     bar\n  \"\"\";");
    assert!(ok.diagnostics().is_empty(), "{:?}", ok.diagnostics());

    let bad = compile("val s = \"\"\"\n  foo\n bar\n  \"\"\";");
    let codes: Vec<ErrorCode> = bad.diagnostics().iter().map(|d| d.code()).collect();
    assert!(codes.contains(&ErrorCode::E1004), "{codes:?}");
}

#[test]
fn test_overload_failure_does_not_cascade() {
    // `1 + "x"`: one NoMatchingOverload; the declared return type of main
    // does not produce a second diagnostic.
    let compilation = compile("func main() { return 1 + \"x\"; }");
    let diagnostics = compilation.diagnostics();
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.severity() == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1, "{diagnostics:?}");
    assert_eq!(errors[0].code(), ErrorCode::E3004);
}

#[test]
fn test_parse_recovery_keeps_tree_shape() {
    // `var = 1;`: the missing name is synthesized zero-width, the block
    // still closes, and later code is reachable.
    let source = "func main() { var = 1; }";
    let compilation = compile(source);
    let tree = compilation.syntax_tree();
    assert_eq!(tree.text(), source);
    let codes: Vec<ErrorCode> = compilation.diagnostics().iter().map(|d| d.code()).collect();
    assert!(codes.contains(&ErrorCode::E1002), "{codes:?}");
}

#[test]
fn test_goto_loop_compiles() {
    let compilation = compile(
        "func main() {\n    var i = 0;\n    again:\n    i += 1;\n    if (i < 10) goto again;\n}",
    );
    assert!(compilation.diagnostics().is_empty(), "{:?}", compilation.diagnostics());
    let module = compilation.ir();
    assert_eq!(module.procedures.len(), 1);
}

#[test]
fn test_interpolated_string_program() {
    let compilation = compile(
        "func greet(name: string): string = \"hello, \\{name}!\";\nfunc main() { greet(\"vela\"); }",
    );
    assert!(compilation.diagnostics().is_empty(), "{:?}", compilation.diagnostics());
    // The lowered greeting concatenates through the string intrinsics:
    // to_text(name) plus two concats folding three pieces, plus the call
    // from main.
    let module = compilation.ir();
    let calls = module
        .procedures
        .iter()
        .flat_map(|p| p.blocks.iter())
        .flat_map(|b| b.instructions.iter())
        .filter(|i| matches!(i, Instruction::Call { .. }))
        .count();
    assert!(calls >= 4, "expected conversion and concatenation calls");
}

#[test]
fn test_modules_and_visibility() {
    let compilation = compile(
        "module geometry {\n    public func area(w: int32, h: int32): int32 = w * h;\n}\nfunc main() { var a: int32 = geometry.area(2, 3); }",
    );
    assert!(compilation.diagnostics().is_empty(), "{:?}", compilation.diagnostics());
    let module = compilation.ir();
    assert_eq!(module.procedures.len(), 2);
}

#[test]
fn test_module_globals_reference_siblings() {
    // Module-level initializers see their sibling globals; the whole
    // chain lowers through the synthesized initializer procedure.
    let compilation = compile(
        "module config {\n    public val width = 640;\n    public val height = width / 2;\n}\nfunc main() { var h: int32 = config.height; }",
    );
    assert!(compilation.diagnostics().is_empty(), "{:?}", compilation.diagnostics());
    let module = compilation.ir();
    assert_eq!(module.globals.len(), 2);
    // main plus the synthesized global initializer.
    assert_eq!(module.procedures.len(), 2);
    let stores = module
        .procedures
        .iter()
        .flat_map(|p| p.blocks.iter())
        .flat_map(|b| b.instructions.iter())
        .filter(|i| {
            matches!(
                i,
                Instruction::Store {
                    target: vela_ir::Operand::Global(_),
                    ..
                }
            )
        })
        .count();
    assert_eq!(stores, 2, "both initializers store their global slot");
}

#[test]
fn test_ir_text_surface() {
    let compilation = compile("func add(a: int32, b: int32): int32 = a + b;");
    let text = compilation.print_ir();
    assert!(text.contains("proc @add {"), "{text}");
    assert!(text.contains("bb0:"), "{text}");
    assert!(text.contains(":= add"), "{text}");
    assert!(text.contains("ret "), "{text}");
}

#[test]
fn test_errors_still_produce_bound_tree() {
    // A compilation with errors still yields an analysis and skips IR only
    // for the affected procedure.
    let compilation = compile(
        "func bad() { missing(); }\nfunc good(): int32 { return 2; }",
    );
    assert!(compilation.has_errors());
    let analysis = compilation.analysis();
    assert_eq!(analysis.bodies.len(), 2, "both bodies bound");
    let module = compilation.ir();
    assert_eq!(module.procedures.len(), 1, "only the clean body lowers");
}
