//! Parser tests: shapes, precedence, disambiguation, recovery, round-trip.

use std::sync::Arc;

use vela_diagnostic::ErrorCode;
use vela_syntax::ast::{self, Declaration, StringPart};
use vela_syntax::{StringInterner, SyntaxKind, SyntaxNode, SyntaxTree};

use crate::parse;

fn parse_source(source: &str) -> SyntaxTree {
    parse(source, Arc::new(StringInterner::new()))
}

/// All nodes of the tree in depth-first order.
fn descendants(tree: &SyntaxTree) -> Vec<SyntaxNode> {
    fn walk(node: SyntaxNode, out: &mut Vec<SyntaxNode>) {
        out.push(node.clone());
        for child in node.child_nodes() {
            walk(child, out);
        }
    }
    let mut out = Vec::new();
    walk(tree.root(), &mut out);
    out
}

fn nodes_of_kind(tree: &SyntaxTree, kind: SyntaxKind) -> Vec<SyntaxNode> {
    descendants(tree)
        .into_iter()
        .filter(|n| n.kind() == kind)
        .collect()
}

fn assert_round_trip(source: &str) {
    let tree = parse_source(source);
    assert_eq!(tree.text(), source, "tree must reconstruct the source");
}

fn assert_no_diagnostics(tree: &SyntaxTree) {
    let diags = tree.diagnostics();
    assert!(diags.is_empty(), "expected clean parse, got: {diags:?}");
}

#[test]
fn test_empty_file() {
    let tree = parse_source("");
    assert_eq!(tree.root().kind(), SyntaxKind::CompilationUnit);
    assert_no_diagnostics(&tree);
}

#[test]
fn test_round_trip_is_exact() {
    for source in [
        "",
        "func main() {}\n",
        "func main() { var x: int32 = 1 + 2 * 3; }",
        "import console;\n\nfunc main() { console.log(\"hi\"); }\n",
        "module geometry { public func area(w: int32, h: int32): int32 = w * h; }",
        "func main() {\n    // comment\n    val x = 1;\n}\n",
        "func broken( {",
        "func main() { var = 1; }",
        "val s = \"a\\{1 + 2}b\";",
    ] {
        assert_round_trip(source);
    }
}

#[test]
fn test_function_shape() {
    let tree = parse_source("public func add(a: int32, b: int32): int32 = a + b;");
    let unit = ast::CompilationUnit::cast(tree.root()).unwrap();
    let decls = unit.declarations();
    assert_eq!(decls.len(), 1);
    let Declaration::Function(func) = &decls[0] else {
        panic!("expected a function declaration");
    };
    assert_eq!(func.name().unwrap().text_str(), "add");
    assert!(func.visibility().is_some());
    let params = func.parameters().unwrap().parameters();
    assert_eq!(params.len(), 2);
    assert_eq!(params[0].name().unwrap().text_str(), "a");
    assert!(params[1].type_annotation().is_some());
    assert!(func.return_type().is_some());
    assert!(matches!(func.body(), Some(ast::FunctionBody::Inline(_))));
    assert_no_diagnostics(&tree);
}

#[test]
fn test_variadic_parameter() {
    let tree = parse_source("func log(...parts: Array<string>) {}");
    let params = nodes_of_kind(&tree, SyntaxKind::Parameter);
    assert_eq!(params.len(), 1);
    let param = ast::Parameter::cast(params[0].clone()).unwrap();
    assert!(param.ellipsis().is_some());
    assert_no_diagnostics(&tree);
}

#[test]
fn test_precedence_mul_binds_tighter() {
    let tree = parse_source("func main() { var x: int32 = 1 + 2 * 3; }");
    assert_no_diagnostics(&tree);
    let binaries = nodes_of_kind(&tree, SyntaxKind::BinaryExpression);
    assert_eq!(binaries.len(), 2);
    // The outermost binary is `+`; its right operand is the `*` node.
    let outer = ast::BinaryExpression::cast(binaries[0].clone()).unwrap();
    assert_eq!(outer.operator().unwrap().text_str(), "+");
    let inner = ast::BinaryExpression::cast(outer.right().unwrap()).unwrap();
    assert_eq!(inner.operator().unwrap().text_str(), "*");
}

#[test]
fn test_assignment_is_right_associative() {
    let tree = parse_source("func main() { a = b = 1; }");
    let binaries = nodes_of_kind(&tree, SyntaxKind::BinaryExpression);
    let outer = ast::BinaryExpression::cast(binaries[0].clone()).unwrap();
    assert_eq!(outer.operator().unwrap().text_str(), "=");
    let right = ast::BinaryExpression::cast(outer.right().unwrap()).unwrap();
    assert_eq!(right.operator().unwrap().text_str(), "=");
}

#[test]
fn test_generic_call_disambiguation() {
    // `<` followed by `>` then `(` reads as type arguments.
    let tree = parse_source("func main() { f<int32>(5); }");
    assert_no_diagnostics(&tree);
    assert_eq!(nodes_of_kind(&tree, SyntaxKind::GenericExpression).len(), 1);
    assert_eq!(nodes_of_kind(&tree, SyntaxKind::RelationalExpression).len(), 0);
}

#[test]
fn test_chained_relational_is_not_generics() {
    let tree = parse_source("func main() { 1 < 2 > 3; }");
    assert_no_diagnostics(&tree);
    let relationals = nodes_of_kind(&tree, SyntaxKind::RelationalExpression);
    assert_eq!(relationals.len(), 1);
    let relational = ast::RelationalExpression::cast(relationals[0].clone()).unwrap();
    let comparisons = relational.comparisons();
    assert_eq!(comparisons.len(), 2);
    assert_eq!(comparisons[0].operator().unwrap().text_str(), "<");
    assert_eq!(comparisons[1].operator().unwrap().text_str(), ">");
    assert_eq!(nodes_of_kind(&tree, SyntaxKind::GenericExpression).len(), 0);
}

#[test]
fn test_ambiguous_angle_defaults_to_generics() {
    // After `a<b>` the next token `-` is an expression starter, so this
    // reads as comparison; after `a<b>` followed by `;` it reads as
    // generics (the documented default).
    let tree = parse_source("func main() { a<b>; }");
    assert_eq!(nodes_of_kind(&tree, SyntaxKind::GenericExpression).len(), 1);

    let tree = parse_source("func main() { a < b - c; }");
    assert_eq!(nodes_of_kind(&tree, SyntaxKind::GenericExpression).len(), 0);
    assert_eq!(nodes_of_kind(&tree, SyntaxKind::RelationalExpression).len(), 1);
}

#[test]
fn test_relational_with_non_name_operand_is_comparison() {
    let tree = parse_source("func main() { a < 1; }");
    assert_no_diagnostics(&tree);
    assert_eq!(nodes_of_kind(&tree, SyntaxKind::RelationalExpression).len(), 1);
}

#[test]
fn test_if_else_and_while() {
    let tree = parse_source(
        "func main() { if (a < b) { c(); } else { d(); } while (true) { e(); } }",
    );
    assert_no_diagnostics(&tree);
    assert_eq!(nodes_of_kind(&tree, SyntaxKind::IfExpression).len(), 1);
    assert_eq!(nodes_of_kind(&tree, SyntaxKind::ElseClause).len(), 1);
    assert_eq!(nodes_of_kind(&tree, SyntaxKind::WhileExpression).len(), 1);
}

#[test]
fn test_block_value_expression() {
    let tree = parse_source("func main() { val x = { 1 + 2 }; }");
    assert_no_diagnostics(&tree);
    let blocks = nodes_of_kind(&tree, SyntaxKind::BlockExpression);
    assert_eq!(blocks.len(), 1);
    let block = ast::BlockExpression::cast(blocks[0].clone()).unwrap();
    assert!(block.value().is_some());
    assert!(block.statements().is_empty());
}

#[test]
fn test_label_and_goto() {
    let tree = parse_source("func main() { start: if (true) goto start; }");
    assert_no_diagnostics(&tree);
    assert_eq!(nodes_of_kind(&tree, SyntaxKind::LabelDeclaration).len(), 1);
    assert_eq!(nodes_of_kind(&tree, SyntaxKind::GotoExpression).len(), 1);
}

#[test]
fn test_label_at_module_level_is_unexpected() {
    let tree = parse_source("start: func main() {}");
    let diags = tree.diagnostics();
    assert!(diags.iter().any(|d| d.code() == ErrorCode::E1003));
    assert!(!nodes_of_kind(&tree, SyntaxKind::UnexpectedDeclaration).is_empty());
    assert_round_trip("start: func main() {}");
}

#[test]
fn test_module_in_function_is_unexpected() {
    let tree = parse_source("func main() { module m {} }");
    let diags = tree.diagnostics();
    assert!(diags.iter().any(|d| d.code() == ErrorCode::E1003));
}

#[test]
fn test_nested_modules_are_legal() {
    let tree = parse_source("module outer { module inner { func f() {} } }");
    assert_no_diagnostics(&tree);
    assert_eq!(nodes_of_kind(&tree, SyntaxKind::ModuleDeclaration).len(), 2);
}

#[test]
fn test_missing_identifier_recovery() {
    // `var = 1;` still parses as a variable declaration with a missing
    // name, and the block completes.
    let source = "func main() { var = 1; }";
    let tree = parse_source(source);
    assert_eq!(tree.text(), source);
    let diags = tree.diagnostics();
    assert!(diags.iter().any(|d| d.code() == ErrorCode::E1002
        && d.message().contains("identifier")));
    let vars = nodes_of_kind(&tree, SyntaxKind::VariableDeclaration);
    assert_eq!(vars.len(), 1);
    let var = ast::VariableDeclaration::cast(vars[0].clone()).unwrap();
    assert!(var.name().unwrap().is_missing());
    assert!(var.initializer().is_some());
    // The body still closes: no unexpected nodes swallowed the `}`.
    assert_eq!(nodes_of_kind(&tree, SyntaxKind::BlockFunctionBody).len(), 1);
}

#[test]
fn test_unexpected_input_synchronizes() {
    let source = "func main() { @@ val x = 1; }";
    let tree = parse_source(source);
    assert_eq!(tree.text(), source);
    // The `val` declaration after the garbage still parses.
    assert_eq!(nodes_of_kind(&tree, SyntaxKind::VariableDeclaration).len(), 1);
}

#[test]
fn test_string_expression_with_interpolation() {
    let tree = parse_source(r#"val s = "x = \{1 + 2}!";"#);
    assert_no_diagnostics(&tree);
    let strings = nodes_of_kind(&tree, SyntaxKind::StringExpression);
    assert_eq!(strings.len(), 1);
    let string = ast::StringExpression::cast(strings[0].clone()).unwrap();
    let parts = string.parts();
    assert_eq!(parts.len(), 3);
    assert!(matches!(parts[0], StringPart::Content(_)));
    assert!(matches!(parts[1], StringPart::Interpolation(_)));
    assert!(matches!(parts[2], StringPart::Content(_)));
}

#[test]
fn test_multi_line_string_ok() {
    let source = "val s = \"\"\"\n  foo\n    bar\n  \"\"\";";
    let tree = parse_source(source);
    // `bar` is indented deeper than the prefix: fine, it starts with it.
    assert_no_diagnostics(&tree);
    assert_round_trip(source);
}

#[test]
fn test_multi_line_string_insufficient_indentation() {
    let source = "val s = \"\"\"\n  foo\n bar\n  \"\"\";";
    let tree = parse_source(source);
    let diags = tree.diagnostics();
    assert_eq!(
        diags
            .iter()
            .filter(|d| d.code() == ErrorCode::E1004)
            .count(),
        1
    );
    assert_round_trip(source);
}

#[test]
fn test_multi_line_string_close_not_on_own_line() {
    let source = "val s = \"\"\"\n  foo\"\"\";";
    let tree = parse_source(source);
    assert!(tree
        .diagnostics()
        .iter()
        .any(|d| d.code() == ErrorCode::E1005));
}

#[test]
fn test_multi_line_string_extra_tokens_after_open() {
    let source = "val s = \"\"\"oops\n  foo\n  \"\"\";";
    let tree = parse_source(source);
    assert!(tree
        .diagnostics()
        .iter()
        .any(|d| d.code() == ErrorCode::E1006));
}

#[test]
fn test_red_positions_consistent() {
    let source = "func main() { var x: int32 = 1 + 2 * 3; }";
    let tree = parse_source(source);
    for node in descendants(&tree) {
        let mut offset = node.full_position();
        for child in node.children() {
            assert_eq!(child.full_position(), offset, "child positions accumulate");
            offset += child.full_width();
        }
        assert_eq!(
            offset,
            node.full_position() + node.full_width(),
            "child widths sum to the parent width"
        );
    }
}

#[test]
fn test_import_path() {
    let tree = parse_source("import system.console;");
    assert_no_diagnostics(&tree);
    let imports = nodes_of_kind(&tree, SyntaxKind::ImportDeclaration);
    let import = ast::ImportDeclaration::cast(imports[0].clone()).unwrap();
    let segments = import.path().unwrap().segments();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].text_str(), "system");
    assert_eq!(segments[1].text_str(), "console");
}

#[test]
fn test_goto_and_return_parse_value() {
    let tree = parse_source("func f(): int32 { return 1 + 2; }");
    assert_no_diagnostics(&tree);
    let returns = nodes_of_kind(&tree, SyntaxKind::ReturnExpression);
    assert_eq!(returns.len(), 1);
    let ret = ast::ReturnExpression::cast(returns[0].clone()).unwrap();
    assert!(ret.value().is_some());
}
