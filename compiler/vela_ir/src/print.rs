//! Textual form of the IR.
//!
//! Register-defining instructions print as `<target> := <op> <operands>`;
//! effect-only instructions print as `<op> <operands>`; branches print as
//! `jump bb<n>`, `branch <cond> bb<t> bb<f>`, and `ret <operand>`.
//! Operands: `rN`, `locN`, `globN`, `paramN`, literal constants, and
//! symbolic references by qualified name (`@module.name`).

use std::fmt::Write as _;

use vela_sema::{Constant, SymbolId, SymbolStore, TypePool};
use vela_syntax::StringInterner;

use crate::model::{Instruction, Module, Operand, Procedure};

/// Render a whole module.
pub fn print_module(
    module: &Module,
    store: &SymbolStore,
    pool: &mut TypePool,
    interner: &StringInterner,
) -> String {
    let mut out = String::new();
    for (symbol, ty) in &module.globals {
        let _ = writeln!(
            out,
            "global {} : {}",
            qualified_name(*symbol, store, interner),
            pool.display(*ty, interner)
        );
    }
    if !module.globals.is_empty() {
        out.push('\n');
    }
    for procedure in &module.procedures {
        print_procedure(procedure, store, pool, interner, &mut out);
        out.push('\n');
    }
    out
}

/// Render one procedure.
pub fn print_procedure(
    procedure: &Procedure,
    store: &SymbolStore,
    pool: &mut TypePool,
    interner: &StringInterner,
    out: &mut String,
) {
    let _ = writeln!(
        out,
        "proc {} {{",
        qualified_name(procedure.symbol, store, interner)
    );
    for (index, block) in procedure.blocks.iter().enumerate() {
        let _ = writeln!(out, "bb{index}:");
        for instruction in &block.instructions {
            let _ = writeln!(
                out,
                "  {}",
                print_instruction(instruction, store, pool, interner)
            );
        }
    }
    out.push_str("}\n");
}

/// Qualified name of a symbol: container chain joined with `.`.
pub fn qualified_name(symbol: SymbolId, store: &SymbolStore, interner: &StringInterner) -> String {
    let mut segments = Vec::new();
    let mut current = Some(symbol);
    while let Some(id) = current {
        let data = store.get(id);
        if let Some(name) = data.name {
            segments.push(interner.lookup(name).to_string());
        }
        current = data.container;
    }
    segments.reverse();
    if segments.is_empty() {
        format!("@<anonymous:{}>", symbol.index())
    } else {
        format!("@{}", segments.join("."))
    }
}

fn operand(op: &Operand, store: &SymbolStore, interner: &StringInterner) -> String {
    match op {
        Operand::Register(r) => format!("r{}", r.0),
        Operand::Local(l) => format!("loc{}", l.0),
        Operand::Global(g) => format!("glob{}", g.0),
        Operand::Param(p) => format!("param{}", p.0),
        Operand::Constant(c) => constant(c, interner),
        Operand::Symbol(s) => qualified_name(*s, store, interner),
    }
}

fn constant(c: &Constant, interner: &StringInterner) -> String {
    match c {
        Constant::Int(v) => v.to_string(),
        Constant::Float(bits) => format!("{}", f64::from_bits(*bits)),
        Constant::Bool(v) => v.to_string(),
        Constant::Char(v) => format!("'{}'", v.escape_default()),
        Constant::String(name) => format!("\"{}\"", interner.lookup(*name).escape_default()),
        Constant::Unit => "unit".to_string(),
    }
}

fn print_instruction(
    instruction: &Instruction,
    store: &SymbolStore,
    pool: &mut TypePool,
    interner: &StringInterner,
) -> String {
    let op = |o: &Operand| operand(o, store, interner);
    match instruction {
        Instruction::Add { target, left, right } => {
            format!("r{} := add {} {}", target.0, op(left), op(right))
        }
        Instruction::Sub { target, left, right } => {
            format!("r{} := sub {} {}", target.0, op(left), op(right))
        }
        Instruction::Mul { target, left, right } => {
            format!("r{} := mul {} {}", target.0, op(left), op(right))
        }
        Instruction::Div { target, left, right } => {
            format!("r{} := div {} {}", target.0, op(left), op(right))
        }
        Instruction::Rem { target, left, right } => {
            format!("r{} := rem {} {}", target.0, op(left), op(right))
        }
        Instruction::Less { target, left, right } => {
            format!("r{} := less {} {}", target.0, op(left), op(right))
        }
        Instruction::Equal { target, left, right } => {
            format!("r{} := equal {} {}", target.0, op(left), op(right))
        }
        Instruction::Load { target, source } => {
            format!("r{} := load {}", target.0, op(source))
        }
        Instruction::Store { target, source } => {
            format!("store {} {}", op(target), op(source))
        }
        Instruction::LoadField {
            target,
            receiver,
            field,
        } => format!(
            "r{} := loadfield {} {}",
            target.0,
            op(receiver),
            qualified_name(*field, store, interner)
        ),
        Instruction::StoreField {
            receiver,
            field,
            source,
        } => format!(
            "storefield {} {} {}",
            op(receiver),
            qualified_name(*field, store, interner),
            op(source)
        ),
        Instruction::LoadElement {
            target,
            array,
            index,
        } => format!("r{} := loadelement {} {}", target.0, op(array), op(index)),
        Instruction::StoreElement {
            array,
            index,
            source,
        } => format!("storeelement {} {} {}", op(array), op(index), op(source)),
        Instruction::Call {
            target,
            callee,
            args,
        } => {
            let mut text = format!("r{} := call {}", target.0, op(callee));
            for arg in args {
                let _ = write!(text, " {}", op(arg));
            }
            text
        }
        Instruction::MemberCall {
            target,
            callee,
            receiver,
            args,
        } => {
            let mut text = format!(
                "r{} := membercall {} {}",
                target.0,
                qualified_name(*callee, store, interner),
                op(receiver)
            );
            for arg in args {
                let _ = write!(text, " {}", op(arg));
            }
            text
        }
        Instruction::NewObject {
            target,
            constructor,
            args,
        } => {
            let mut text = format!(
                "r{} := newobject {}",
                target.0,
                qualified_name(*constructor, store, interner)
            );
            for arg in args {
                let _ = write!(text, " {}", op(arg));
            }
            text
        }
        Instruction::NewArray {
            target,
            element,
            length,
        } => format!(
            "r{} := newarray {} {}",
            target.0,
            pool.display(*element, interner),
            op(length)
        ),
        Instruction::ArrayLength { target, array } => {
            format!("r{} := arraylength {}", target.0, op(array))
        }
        Instruction::Jump { to } => format!("jump bb{}", to.0),
        Instruction::Branch {
            condition,
            then_block,
            else_block,
        } => format!(
            "branch {} bb{} bb{}",
            op(condition),
            then_block.0,
            else_block.0
        ),
        Instruction::Ret { value } => format!("ret {}", op(value)),
        Instruction::SequencePoint { span } => format!("sequencepoint {span}"),
        Instruction::StartScope { locals } => {
            let mut text = "startscope".to_string();
            for local in locals {
                let _ = write!(text, " loc{}", local.0);
            }
            text
        }
        Instruction::EndScope => "endscope".to_string(),
        Instruction::Nop => "nop".to_string(),
    }
}
