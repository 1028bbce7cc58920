//! Lowering: bound tree → procedures of basic blocks.
//!
//! A depth-first walk emits three-address instructions into the current
//! block. Detachment discipline: a terminator seals the block; subsequent
//! instructions are dropped unless they are valid in unreachable contexts
//! (scope ends, sequence points), and a label starts a fresh reachable
//! block. Operator applications key on the resolved operator symbol;
//! several are rewritten:
//!
//! - `a mod b` → `(a rem b + b) rem b`
//! - `a >= b` → `(a < b) == false`, `a <= b` → `(b < a) == false`
//! - `a != b` → `(a == b) == false`, `not x` → `x == false`
//! - `-x` → `x * -1`, `a > b` → `b < a`
//!
//! Procedures are compiled at most once per module, keyed by symbol
//! identity; procedures whose bodies contain `Error` nodes are skipped
//! (their diagnostics were already reported).

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;
use vela_sema::{
    Analysis, BoundArena, BoundCallee, BoundExprId, BoundExprKind, BoundStmt, BoundStmtId,
    BoundStringPart, Constant, FunctionSymbol, IntrinsicOp, SymbolData, SymbolId, SymbolKind,
    TypePool, Visibility,
};

use crate::model::{
    BasicBlock, BlockId, GlobalId, Instruction, LocalId, Module, Operand, ParamId, Procedure,
    RegisterId,
};

/// Lower an analyzed compilation into an IR module.
pub fn lower(analysis: &Analysis) -> Module {
    let mut module = Module::default();

    // Globals get stable slots first.
    let mut global_ids: FxHashMap<SymbolId, GlobalId> = FxHashMap::default();
    for &(symbol, _) in &analysis.globals {
        let data = analysis.store.get(symbol);
        if let SymbolKind::Global { ty, .. } = data.kind {
            let id = GlobalId(module.globals.len() as u32);
            module.globals.push((symbol, ty));
            global_ids.insert(symbol, id);
        }
    }

    let bodies: FxHashMap<SymbolId, BoundExprId> = analysis
        .bodies
        .iter()
        .map(|b| (b.function, b.root))
        .collect();

    let mut lowerer = ModuleLowerer {
        analysis,
        module,
        bodies,
        global_ids,
        started: FxHashSet::default(),
        queue: analysis.bodies.iter().map(|b| b.function).collect(),
    };
    lowerer.run();
    lowerer.synthesize_global_init();
    lowerer.module
}

struct ModuleLowerer<'a> {
    analysis: &'a Analysis,
    module: Module,
    bodies: FxHashMap<SymbolId, BoundExprId>,
    global_ids: FxHashMap<SymbolId, GlobalId>,
    /// At-most-once guard keyed by symbol identity.
    started: FxHashSet<SymbolId>,
    /// Functions awaiting compilation (declaration order first, then
    /// discovery order for references).
    queue: Vec<SymbolId>,
}

impl ModuleLowerer<'_> {
    fn run(&mut self) {
        let mut index = 0;
        while index < self.queue.len() {
            let symbol = self.queue[index];
            index += 1;
            self.ensure_procedure(symbol);
        }
    }

    /// Compile a procedure at most once.
    fn ensure_procedure(&mut self, symbol: SymbolId) {
        if !self.started.insert(symbol) {
            return;
        }
        let Some(&root) = self.bodies.get(&symbol) else {
            return;
        };
        if contains_error(&self.analysis.bound, root) {
            debug!(?symbol, "skipping procedure with error nodes");
            return;
        }
        let mut referenced = Vec::new();
        let procedure = compile_procedure(
            self.analysis,
            &self.global_ids,
            symbol,
            root,
            &mut referenced,
        );
        let index = self.module.procedures.len();
        self.module.procedures.push(procedure);
        self.module.by_symbol.insert(symbol, index);
        // References compile lazily, after the referencing procedure.
        self.queue.extend(referenced);
    }

    /// Synthesize a procedure storing every global initializer.
    fn synthesize_global_init(&mut self) {
        let globals_with_init: Vec<(SymbolId, BoundExprId)> = self
            .analysis
            .globals
            .iter()
            .filter_map(|&(symbol, init)| init.map(|init| (symbol, init)))
            .collect();
        if globals_with_init.is_empty() {
            return;
        }
        if globals_with_init
            .iter()
            .any(|&(_, init)| contains_error(&self.analysis.bound, init))
        {
            return;
        }

        let ty = TypePool::UNIT;
        let symbol = self.analysis.store.alloc(SymbolData {
            name: None,
            container: Some(self.analysis.root_module),
            visibility: Visibility::Internal,
            kind: SymbolKind::Function(FunctionSymbol {
                type_params: Vec::new(),
                params: Vec::new(),
                return_type: ty,
                ty,
                is_variadic: false,
                body: None,
                intrinsic: None,
            }),
        });

        let mut referenced = Vec::new();
        let mut fl = FunctionLowerer::new(self.analysis, &self.global_ids, symbol, &mut referenced);
        for (global, init) in globals_with_init {
            let value = fl.lower_expr(init);
            let slot = fl.global_ids[&global];
            fl.emit(Instruction::Store {
                target: Operand::Global(slot),
                source: value,
            });
        }
        fl.seal_with(Instruction::Ret {
            value: Operand::Constant(Constant::Unit),
        });
        let procedure = fl.finish();
        let index = self.module.procedures.len();
        self.module.procedures.push(procedure);
        self.module.by_symbol.insert(symbol, index);
    }
}

/// True when the body still contains error nodes; such procedures are
/// skipped.
fn contains_error(bound: &BoundArena, root: BoundExprId) -> bool {
    fn expr(bound: &BoundArena, id: BoundExprId) -> bool {
        let node = bound.expr(id);
        if matches!(node.kind, BoundExprKind::Error) || node.ty == TypePool::ERROR {
            return true;
        }
        match &node.kind {
            BoundExprKind::Call { callee, args } => {
                let callee_err = match callee {
                    BoundCallee::Value(c) => expr(bound, *c),
                    BoundCallee::Function(_) => false,
                };
                callee_err || args.iter().any(|&a| expr(bound, a))
            }
            BoundExprKind::NewArray { length, .. } => expr(bound, *length),
            BoundExprKind::Member { receiver, .. } => expr(bound, *receiver),
            BoundExprKind::Index { receiver, index } => {
                expr(bound, *receiver) || expr(bound, *index)
            }
            BoundExprKind::And { left, right } | BoundExprKind::Or { left, right } => {
                expr(bound, *left) || expr(bound, *right)
            }
            BoundExprKind::Not { operand } => expr(bound, *operand),
            BoundExprKind::Relational { first, comparisons } => {
                expr(bound, *first) || comparisons.iter().any(|&(_, o)| expr(bound, o))
            }
            BoundExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                expr(bound, *condition)
                    || expr(bound, *then_branch)
                    || else_branch.is_some_and(|e| expr(bound, e))
            }
            BoundExprKind::While { condition, body } => {
                expr(bound, *condition) || expr(bound, *body)
            }
            BoundExprKind::Block {
                statements, value, ..
            } => {
                statements.iter().any(|&s| stmt(bound, s))
                    || value.is_some_and(|v| expr(bound, v))
            }
            BoundExprKind::Return { value } => value.is_some_and(|v| expr(bound, v)),
            BoundExprKind::Assign { target, value, .. } => {
                expr(bound, *target) || expr(bound, *value)
            }
            BoundExprKind::String { parts } => parts.iter().any(|p| match p {
                BoundStringPart::Expr(e) => expr(bound, *e),
                BoundStringPart::Text(_) => false,
            }),
            _ => false,
        }
    }
    fn stmt(bound: &BoundArena, id: BoundStmtId) -> bool {
        match bound.stmt(id) {
            BoundStmt::Local { initializer, .. } => initializer.is_some_and(|i| expr(bound, i)),
            BoundStmt::Expr(e) => expr(bound, *e),
            _ => false,
        }
    }
    expr(bound, root)
}

fn compile_procedure(
    analysis: &Analysis,
    global_ids: &FxHashMap<SymbolId, GlobalId>,
    symbol: SymbolId,
    root: BoundExprId,
    referenced: &mut Vec<SymbolId>,
) -> Procedure {
    let mut fl = FunctionLowerer::new(analysis, global_ids, symbol, referenced);
    let result = fl.lower_expr(root);
    // Falling off the end returns the body value (unit for block bodies
    // that complete normally, the inline expression otherwise).
    fl.seal_with(Instruction::Ret { value: result });
    fl.finish()
}

/// An lvalue as a load/store template: the address parts are evaluated
/// once and reused by both the load and the store.
enum LValue {
    Local(LocalId),
    Global(GlobalId),
    Element { array: Operand, index: Operand },
    Field { receiver: Operand, field: SymbolId },
    /// Assignment through a non-place (already diagnosed).
    Discard,
}

struct FunctionLowerer<'a> {
    analysis: &'a Analysis,
    global_ids: &'a FxHashMap<SymbolId, GlobalId>,
    referenced: &'a mut Vec<SymbolId>,
    symbol: SymbolId,
    parameters: Vec<SymbolId>,
    param_ids: FxHashMap<SymbolId, ParamId>,
    locals: Vec<(Option<SymbolId>, vela_sema::TypeId)>,
    local_ids: FxHashMap<SymbolId, LocalId>,
    registers: Vec<vela_sema::TypeId>,
    blocks: Vec<BasicBlock>,
    current: BlockId,
    /// True after a terminator: emits are dropped until a block starts.
    detached: bool,
    labels: FxHashMap<SymbolId, BlockId>,
}

impl<'a> FunctionLowerer<'a> {
    fn new(
        analysis: &'a Analysis,
        global_ids: &'a FxHashMap<SymbolId, GlobalId>,
        symbol: SymbolId,
        referenced: &'a mut Vec<SymbolId>,
    ) -> Self {
        let mut parameters = Vec::new();
        let mut param_ids = FxHashMap::default();
        if let Some(function) = analysis.store.get(symbol).as_function() {
            for (i, &param) in function.params.iter().enumerate() {
                parameters.push(param);
                param_ids.insert(param, ParamId(i as u32));
            }
        }
        FunctionLowerer {
            analysis,
            global_ids,
            referenced,
            symbol,
            parameters,
            param_ids,
            locals: Vec::new(),
            local_ids: FxHashMap::default(),
            registers: Vec::new(),
            blocks: vec![BasicBlock::default()],
            current: BlockId(0),
            detached: false,
            labels: FxHashMap::default(),
        }
    }

    fn finish(self) -> Procedure {
        let procedure = Procedure {
            symbol: self.symbol,
            parameters: self.parameters,
            locals: self.locals,
            registers: self.registers,
            blocks: self.blocks,
            entry: BlockId(0),
        };
        debug_assert!(
            procedure
                .blocks
                .iter()
                .all(|b| b.terminator().is_some() || b.instructions.is_empty()),
            "every reachable block ends in a branch"
        );
        procedure
    }

    // ─── Emission plumbing ─────────────────────────────────────────

    fn emit(&mut self, instruction: Instruction) {
        if self.detached && !instruction.valid_in_unreachable() {
            return;
        }
        self.blocks[self.current.0 as usize]
            .instructions
            .push(instruction);
    }

    /// Emit a terminator and detach.
    fn seal_with(&mut self, terminator: Instruction) {
        debug_assert!(terminator.is_branch());
        self.emit(terminator);
        self.detached = true;
    }

    fn alloc_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::default());
        id
    }

    /// Begin emitting into `block`; code is reachable again.
    fn start_block(&mut self, block: BlockId) {
        self.current = block;
        self.detached = false;
    }

    fn new_register(&mut self, ty: vela_sema::TypeId) -> RegisterId {
        let id = RegisterId(self.registers.len() as u32);
        self.registers.push(ty);
        id
    }

    fn new_local(&mut self, symbol: Option<SymbolId>, ty: vela_sema::TypeId) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.push((symbol, ty));
        if let Some(symbol) = symbol {
            self.local_ids.insert(symbol, id);
        }
        id
    }

    fn label_block(&mut self, label: SymbolId) -> BlockId {
        if let Some(&block) = self.labels.get(&label) {
            return block;
        }
        let block = self.alloc_block();
        self.labels.insert(label, block);
        block
    }

    /// Load a value into a fresh register.
    fn load(&mut self, source: Operand, ty: vela_sema::TypeId) -> Operand {
        let target = self.new_register(ty);
        self.emit(Instruction::Load { target, source });
        Operand::Register(target)
    }

    /// Note that a function symbol was referenced (it compiles lazily).
    fn note_reference(&mut self, symbol: SymbolId) {
        self.referenced.push(symbol);
    }

    // ─── Expressions ───────────────────────────────────────────────

    fn lower_expr(&mut self, id: BoundExprId) -> Operand {
        let node = self.analysis.bound.expr(id).clone();
        let ty = node.ty;
        match node.kind {
            BoundExprKind::Literal(constant) => Operand::Constant(constant),
            BoundExprKind::SymbolRef(symbol) => self.lower_symbol_ref(symbol, ty),
            BoundExprKind::FunctionRef(symbol) => {
                self.note_reference(symbol);
                Operand::Symbol(symbol)
            }
            BoundExprKind::Call { callee, args } => self.lower_call(callee, &args, ty),
            BoundExprKind::NewArray { element, length } => {
                let length = self.lower_expr(length);
                let target = self.new_register(ty);
                self.emit(Instruction::NewArray {
                    target,
                    element,
                    length,
                });
                Operand::Register(target)
            }
            BoundExprKind::Member { receiver, member } => self.lower_member(receiver, member, ty),
            BoundExprKind::Index { receiver, index } => {
                let array = self.lower_expr(receiver);
                let index = self.lower_expr(index);
                let target = self.new_register(ty);
                self.emit(Instruction::LoadElement {
                    target,
                    array,
                    index,
                });
                Operand::Register(target)
            }
            BoundExprKind::And { left, right } => self.lower_short_circuit(left, right, true),
            BoundExprKind::Or { left, right } => self.lower_short_circuit(left, right, false),
            BoundExprKind::Not { operand } => {
                let operand = self.lower_expr(operand);
                // `not x` is `x == false`.
                let target = self.new_register(TypePool::BOOL);
                self.emit(Instruction::Equal {
                    target,
                    left: operand,
                    right: Operand::Constant(Constant::Bool(false)),
                });
                Operand::Register(target)
            }
            BoundExprKind::Relational { first, comparisons } => {
                self.lower_relational(first, &comparisons)
            }
            BoundExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.lower_if(condition, then_branch, else_branch, ty),
            BoundExprKind::While { condition, body } => {
                self.lower_while(condition, body);
                Operand::Constant(Constant::Unit)
            }
            BoundExprKind::Block {
                statements,
                value,
                locals,
            } => self.lower_block(&statements, value, &locals),
            BoundExprKind::Return { value } => {
                let value = match value {
                    Some(value) => self.lower_expr(value),
                    None => Operand::Constant(Constant::Unit),
                };
                self.seal_with(Instruction::Ret { value });
                Operand::Constant(Constant::Unit)
            }
            BoundExprKind::Goto { label } => {
                let block = self.label_block(label);
                self.seal_with(Instruction::Jump { to: block });
                Operand::Constant(Constant::Unit)
            }
            BoundExprKind::Assign {
                target,
                operator,
                value,
            } => {
                self.lower_assign(target, operator, value);
                Operand::Constant(Constant::Unit)
            }
            BoundExprKind::String { parts } => self.lower_string(&parts),
            BoundExprKind::Error => {
                // Procedures containing errors are skipped before lowering.
                self.emit(Instruction::Nop);
                Operand::Constant(Constant::Unit)
            }
        }
    }

    fn lower_symbol_ref(&mut self, symbol: SymbolId, ty: vela_sema::TypeId) -> Operand {
        if let Some(&local) = self.local_ids.get(&symbol) {
            return self.load(Operand::Local(local), ty);
        }
        if let Some(&param) = self.param_ids.get(&symbol) {
            return self.load(Operand::Param(param), ty);
        }
        if let Some(&global) = self.global_ids.get(&symbol) {
            return self.load(Operand::Global(global), ty);
        }
        // Metadata fields/properties referenced bare cannot occur; function
        // references arrive as FunctionRef.
        Operand::Constant(Constant::Unit)
    }

    fn lower_call(
        &mut self,
        callee: BoundCallee,
        args: &[BoundExprId],
        ty: vela_sema::TypeId,
    ) -> Operand {
        match callee {
            BoundCallee::Function(symbol) => {
                let intrinsic = self
                    .analysis
                    .store
                    .get(symbol)
                    .as_function()
                    .and_then(|f| f.intrinsic);
                match intrinsic {
                    Some(op) => {
                        let operands: Vec<Operand> =
                            args.iter().map(|&a| self.lower_expr(a)).collect();
                        self.lower_intrinsic(op, symbol, &operands, ty)
                    }
                    None => {
                        let operands: Vec<Operand> =
                            args.iter().map(|&a| self.lower_expr(a)).collect();
                        self.note_reference(symbol);
                        let target = self.new_register(ty);
                        self.emit(Instruction::Call {
                            target,
                            callee: Operand::Symbol(symbol),
                            args: operands,
                        });
                        Operand::Register(target)
                    }
                }
            }
            BoundCallee::Value(callee) => {
                let callee = self.lower_expr(callee);
                let operands: Vec<Operand> = args.iter().map(|&a| self.lower_expr(a)).collect();
                let target = self.new_register(ty);
                self.emit(Instruction::Call {
                    target,
                    callee,
                    args: operands,
                });
                Operand::Register(target)
            }
        }
    }

    /// Apply a resolved intrinsic operator, including the documented
    /// rewrites.
    fn lower_intrinsic(
        &mut self,
        op: IntrinsicOp,
        symbol: SymbolId,
        args: &[Operand],
        ty: vela_sema::TypeId,
    ) -> Operand {
        let binary = |this: &mut Self,
                      make: fn(RegisterId, Operand, Operand) -> Instruction,
                      left: Operand,
                      right: Operand,
                      ty| {
            let target = this.new_register(ty);
            this.emit(make(target, left, right));
            Operand::Register(target)
        };

        match op {
            IntrinsicOp::Add => binary(
                self,
                |target, left, right| Instruction::Add { target, left, right },
                args[0].clone(),
                args[1].clone(),
                ty,
            ),
            IntrinsicOp::Sub => binary(
                self,
                |target, left, right| Instruction::Sub { target, left, right },
                args[0].clone(),
                args[1].clone(),
                ty,
            ),
            IntrinsicOp::Mul => binary(
                self,
                |target, left, right| Instruction::Mul { target, left, right },
                args[0].clone(),
                args[1].clone(),
                ty,
            ),
            IntrinsicOp::Div => binary(
                self,
                |target, left, right| Instruction::Div { target, left, right },
                args[0].clone(),
                args[1].clone(),
                ty,
            ),
            IntrinsicOp::Rem => binary(
                self,
                |target, left, right| Instruction::Rem { target, left, right },
                args[0].clone(),
                args[1].clone(),
                ty,
            ),
            IntrinsicOp::Mod => {
                // (a rem b + b) rem b
                let r1 = self.new_register(ty);
                self.emit(Instruction::Rem {
                    target: r1,
                    left: args[0].clone(),
                    right: args[1].clone(),
                });
                let r2 = self.new_register(ty);
                self.emit(Instruction::Add {
                    target: r2,
                    left: Operand::Register(r1),
                    right: args[1].clone(),
                });
                let r3 = self.new_register(ty);
                self.emit(Instruction::Rem {
                    target: r3,
                    left: Operand::Register(r2),
                    right: args[1].clone(),
                });
                Operand::Register(r3)
            }
            IntrinsicOp::Less => binary(
                self,
                |target, left, right| Instruction::Less { target, left, right },
                args[0].clone(),
                args[1].clone(),
                TypePool::BOOL,
            ),
            // a > b is b < a.
            IntrinsicOp::Greater => binary(
                self,
                |target, left, right| Instruction::Less { target, left, right },
                args[1].clone(),
                args[0].clone(),
                TypePool::BOOL,
            ),
            // a <= b is (b < a) == false.
            IntrinsicOp::LessEqual => {
                let less = binary(
                    self,
                    |target, left, right| Instruction::Less { target, left, right },
                    args[1].clone(),
                    args[0].clone(),
                    TypePool::BOOL,
                );
                self.negate_bool(less)
            }
            // a >= b is (a < b) == false.
            IntrinsicOp::GreaterEqual => {
                let less = binary(
                    self,
                    |target, left, right| Instruction::Less { target, left, right },
                    args[0].clone(),
                    args[1].clone(),
                    TypePool::BOOL,
                );
                self.negate_bool(less)
            }
            IntrinsicOp::Equal => binary(
                self,
                |target, left, right| Instruction::Equal { target, left, right },
                args[0].clone(),
                args[1].clone(),
                TypePool::BOOL,
            ),
            // a != b is (a == b) == false.
            IntrinsicOp::NotEqual => {
                let equal = binary(
                    self,
                    |target, left, right| Instruction::Equal { target, left, right },
                    args[0].clone(),
                    args[1].clone(),
                    TypePool::BOOL,
                );
                self.negate_bool(equal)
            }
            // -x is x * -1.
            IntrinsicOp::Negate => {
                let minus_one = match self.analysis.store.get(symbol).as_function() {
                    Some(f) if f.return_type == TypePool::FLOAT64 => {
                        Operand::Constant(Constant::Float((-1.0f64).to_bits()))
                    }
                    _ => Operand::Constant(Constant::Int(-1)),
                };
                binary(
                    self,
                    |target, left, right| Instruction::Mul { target, left, right },
                    args[0].clone(),
                    minus_one,
                    ty,
                )
            }
            IntrinsicOp::Identity => args[0].clone(),
            IntrinsicOp::ToText | IntrinsicOp::Concat => {
                let target = self.new_register(TypePool::STRING);
                self.emit(Instruction::Call {
                    target,
                    callee: Operand::Symbol(symbol),
                    args: args.to_vec(),
                });
                Operand::Register(target)
            }
        }
    }

    /// `x == false`.
    fn negate_bool(&mut self, operand: Operand) -> Operand {
        let target = self.new_register(TypePool::BOOL);
        self.emit(Instruction::Equal {
            target,
            left: operand,
            right: Operand::Constant(Constant::Bool(false)),
        });
        Operand::Register(target)
    }

    fn lower_member(
        &mut self,
        receiver: BoundExprId,
        member: SymbolId,
        ty: vela_sema::TypeId,
    ) -> Operand {
        let receiver = self.lower_expr(receiver);
        if member == self.analysis.intrinsics.array_length {
            let target = self.new_register(TypePool::INT32);
            self.emit(Instruction::ArrayLength {
                target,
                array: receiver,
            });
            return Operand::Register(target);
        }
        match &self.analysis.store.get(member).kind {
            SymbolKind::Field { .. } => {
                let target = self.new_register(ty);
                self.emit(Instruction::LoadField {
                    target,
                    receiver,
                    field: member,
                });
                Operand::Register(target)
            }
            SymbolKind::Property { .. } => {
                let target = self.new_register(ty);
                self.emit(Instruction::MemberCall {
                    target,
                    callee: member,
                    receiver,
                    args: Vec::new(),
                });
                Operand::Register(target)
            }
            // A method referenced as a value.
            _ => Operand::Symbol(member),
        }
    }

    /// Short-circuit `and` / `or` through a result slot written in both
    /// arms.
    fn lower_short_circuit(
        &mut self,
        left: BoundExprId,
        right: BoundExprId,
        is_and: bool,
    ) -> Operand {
        let result = self.new_local(None, TypePool::BOOL);
        let left = self.lower_expr(left);

        let rhs_block = self.alloc_block();
        let short_block = self.alloc_block();
        let join = self.alloc_block();
        if is_and {
            self.seal_with(Instruction::Branch {
                condition: left,
                then_block: rhs_block,
                else_block: short_block,
            });
        } else {
            self.seal_with(Instruction::Branch {
                condition: left,
                then_block: short_block,
                else_block: rhs_block,
            });
        }

        self.start_block(rhs_block);
        let right = self.lower_expr(right);
        self.emit(Instruction::Store {
            target: Operand::Local(result),
            source: right,
        });
        self.seal_with(Instruction::Jump { to: join });

        self.start_block(short_block);
        self.emit(Instruction::Store {
            target: Operand::Local(result),
            source: Operand::Constant(Constant::Bool(!is_and)),
        });
        self.seal_with(Instruction::Jump { to: join });

        self.start_block(join);
        self.load(Operand::Local(result), TypePool::BOOL)
    }

    /// Chained comparisons: each operand is evaluated once; the chain
    /// short-circuits like `and`.
    fn lower_relational(
        &mut self,
        first: BoundExprId,
        comparisons: &[(SymbolId, BoundExprId)],
    ) -> Operand {
        let mut previous = self.lower_expr(first);

        if let [(symbol, operand)] = comparisons {
            let operand = self.lower_expr(*operand);
            return self.lower_comparison(*symbol, previous, operand);
        }

        let result = self.new_local(None, TypePool::BOOL);
        let false_block = self.alloc_block();
        let join = self.alloc_block();

        for (i, &(symbol, operand)) in comparisons.iter().enumerate() {
            let operand = self.lower_expr(operand);
            let compared = self.lower_comparison(symbol, previous.clone(), operand.clone());
            if i + 1 == comparisons.len() {
                self.emit(Instruction::Store {
                    target: Operand::Local(result),
                    source: compared,
                });
                self.seal_with(Instruction::Jump { to: join });
            } else {
                let next = self.alloc_block();
                self.seal_with(Instruction::Branch {
                    condition: compared,
                    then_block: next,
                    else_block: false_block,
                });
                self.start_block(next);
            }
            previous = operand;
        }

        self.start_block(false_block);
        self.emit(Instruction::Store {
            target: Operand::Local(result),
            source: Operand::Constant(Constant::Bool(false)),
        });
        self.seal_with(Instruction::Jump { to: join });

        self.start_block(join);
        self.load(Operand::Local(result), TypePool::BOOL)
    }

    fn lower_comparison(&mut self, symbol: SymbolId, left: Operand, right: Operand) -> Operand {
        let op = self
            .analysis
            .store
            .get(symbol)
            .as_function()
            .and_then(|f| f.intrinsic)
            .unwrap_or(IntrinsicOp::Equal);
        self.lower_intrinsic(op, symbol, &[left, right], TypePool::BOOL)
    }

    fn lower_if(
        &mut self,
        condition: BoundExprId,
        then_branch: BoundExprId,
        else_branch: Option<BoundExprId>,
        ty: vela_sema::TypeId,
    ) -> Operand {
        let condition = self.lower_expr(condition);
        let then_block = self.alloc_block();
        let join = self.alloc_block();

        let has_value = else_branch.is_some() && ty != TypePool::UNIT && ty != TypePool::NEVER;
        let result = has_value.then(|| self.new_local(None, ty));

        match else_branch {
            Some(else_branch) => {
                let else_block = self.alloc_block();
                self.seal_with(Instruction::Branch {
                    condition,
                    then_block,
                    else_block,
                });

                self.start_block(then_block);
                let value = self.lower_expr(then_branch);
                if let Some(result) = result {
                    self.emit(Instruction::Store {
                        target: Operand::Local(result),
                        source: value,
                    });
                }
                self.seal_with(Instruction::Jump { to: join });

                self.start_block(else_block);
                let value = self.lower_expr(else_branch);
                if let Some(result) = result {
                    self.emit(Instruction::Store {
                        target: Operand::Local(result),
                        source: value,
                    });
                }
                self.seal_with(Instruction::Jump { to: join });
            }
            None => {
                self.seal_with(Instruction::Branch {
                    condition,
                    then_block,
                    else_block: join,
                });
                self.start_block(then_block);
                self.lower_expr(then_branch);
                self.seal_with(Instruction::Jump { to: join });
            }
        }

        self.start_block(join);
        match result {
            Some(result) => self.load(Operand::Local(result), ty),
            None => Operand::Constant(Constant::Unit),
        }
    }

    fn lower_while(&mut self, condition: BoundExprId, body: BoundExprId) {
        let header = self.alloc_block();
        let body_block = self.alloc_block();
        let exit = self.alloc_block();

        self.seal_with(Instruction::Jump { to: header });
        self.start_block(header);
        let condition = self.lower_expr(condition);
        self.seal_with(Instruction::Branch {
            condition,
            then_block: body_block,
            else_block: exit,
        });

        self.start_block(body_block);
        self.lower_expr(body);
        self.seal_with(Instruction::Jump { to: header });

        self.start_block(exit);
    }

    fn lower_block(
        &mut self,
        statements: &[BoundStmtId],
        value: Option<BoundExprId>,
        locals: &[SymbolId],
    ) -> Operand {
        let local_ids: Vec<LocalId> = locals
            .iter()
            .map(|&symbol| {
                let ty = match &self.analysis.store.get(symbol).kind {
                    SymbolKind::Local { ty, .. } => *ty,
                    _ => TypePool::ERROR,
                };
                self.new_local(Some(symbol), ty)
            })
            .collect();
        self.emit(Instruction::StartScope { locals: local_ids });

        for &stmt in statements {
            self.lower_stmt(stmt);
        }
        let result = match value {
            Some(value) => self.lower_expr(value),
            None => Operand::Constant(Constant::Unit),
        };

        self.emit(Instruction::EndScope);
        result
    }

    fn lower_stmt(&mut self, id: BoundStmtId) {
        let span = self.analysis.bound.stmt_span(id);
        self.emit(Instruction::SequencePoint { span });
        match self.analysis.bound.stmt(id).clone() {
            BoundStmt::Local {
                symbol,
                initializer,
            } => {
                if let Some(initializer) = initializer {
                    let value = self.lower_expr(initializer);
                    let local = self.local_ids[&symbol];
                    self.emit(Instruction::Store {
                        target: Operand::Local(local),
                        source: value,
                    });
                }
            }
            BoundStmt::Label { symbol } => {
                // A label starts a new block; the previous block falls
                // through with an implicit jump.
                let block = self.label_block(symbol);
                if !self.detached {
                    self.seal_with(Instruction::Jump { to: block });
                }
                self.start_block(block);
            }
            BoundStmt::Expr(expr) => {
                self.lower_expr(expr);
            }
            BoundStmt::Nop => {}
        }
    }

    // ─── Assignment ────────────────────────────────────────────────

    /// Compile the right-hand side first, then the lvalue template; a
    /// compound assignment reuses the template for one load before the
    /// store, so receiver side effects run once.
    fn lower_assign(
        &mut self,
        target: BoundExprId,
        operator: Option<SymbolId>,
        value: BoundExprId,
    ) {
        let rhs = self.lower_expr(value);
        let lvalue = self.lower_lvalue(target);

        let source = match operator {
            None => rhs,
            Some(symbol) => {
                let target_ty = self.analysis.bound.expr(target).ty;
                let current = self.load_from(&lvalue, target_ty);
                let op = self
                    .analysis
                    .store
                    .get(symbol)
                    .as_function()
                    .and_then(|f| f.intrinsic)
                    .unwrap_or(IntrinsicOp::Add);
                self.lower_intrinsic(op, symbol, &[current, rhs], target_ty)
            }
        };
        self.store_to(&lvalue, source);
    }

    fn lower_lvalue(&mut self, target: BoundExprId) -> LValue {
        match self.analysis.bound.expr(target).kind.clone() {
            BoundExprKind::SymbolRef(symbol) => {
                if let Some(&local) = self.local_ids.get(&symbol) {
                    LValue::Local(local)
                } else if let Some(&global) = self.global_ids.get(&symbol) {
                    LValue::Global(global)
                } else {
                    LValue::Discard
                }
            }
            BoundExprKind::Index { receiver, index } => {
                let array = self.lower_expr(receiver);
                let index = self.lower_expr(index);
                LValue::Element { array, index }
            }
            BoundExprKind::Member { receiver, member } => {
                let receiver = self.lower_expr(receiver);
                LValue::Field {
                    receiver,
                    field: member,
                }
            }
            _ => LValue::Discard,
        }
    }

    fn load_from(&mut self, lvalue: &LValue, ty: vela_sema::TypeId) -> Operand {
        match lvalue {
            LValue::Local(local) => self.load(Operand::Local(*local), ty),
            LValue::Global(global) => self.load(Operand::Global(*global), ty),
            LValue::Element { array, index } => {
                let target = self.new_register(ty);
                self.emit(Instruction::LoadElement {
                    target,
                    array: array.clone(),
                    index: index.clone(),
                });
                Operand::Register(target)
            }
            LValue::Field { receiver, field } => {
                let target = self.new_register(ty);
                self.emit(Instruction::LoadField {
                    target,
                    receiver: receiver.clone(),
                    field: *field,
                });
                Operand::Register(target)
            }
            LValue::Discard => Operand::Constant(Constant::Unit),
        }
    }

    fn store_to(&mut self, lvalue: &LValue, source: Operand) {
        match lvalue {
            LValue::Local(local) => self.emit(Instruction::Store {
                target: Operand::Local(*local),
                source,
            }),
            LValue::Global(global) => self.emit(Instruction::Store {
                target: Operand::Global(*global),
                source,
            }),
            LValue::Element { array, index } => self.emit(Instruction::StoreElement {
                array: array.clone(),
                index: index.clone(),
                source,
            }),
            LValue::Field { receiver, field } => self.emit(Instruction::StoreField {
                receiver: receiver.clone(),
                field: *field,
                source,
            }),
            LValue::Discard => {}
        }
    }

    // ─── Strings ───────────────────────────────────────────────────

    /// Interpolated strings fold left through `concat`, converting each
    /// expression part with the `to_text` overload for its type.
    fn lower_string(&mut self, parts: &[BoundStringPart]) -> Operand {
        let concat = self.analysis.intrinsics.concat;
        let mut accumulated: Option<Operand> = None;
        for part in parts {
            let piece = match part {
                BoundStringPart::Text(text) => Operand::Constant(Constant::String(*text)),
                BoundStringPart::Expr(expr) => {
                    let ty = self.analysis.bound.expr(*expr).ty;
                    let operand = self.lower_expr(*expr);
                    match self.analysis.intrinsics.to_text_for(&self.analysis.store, ty) {
                        Some(to_text) => {
                            let target = self.new_register(TypePool::STRING);
                            self.emit(Instruction::Call {
                                target,
                                callee: Operand::Symbol(to_text),
                                args: vec![operand],
                            });
                            Operand::Register(target)
                        }
                        None => Operand::Constant(Constant::String(
                            vela_syntax::Name::EMPTY,
                        )),
                    }
                }
            };
            accumulated = Some(match accumulated {
                None => piece,
                Some(previous) => {
                    let target = self.new_register(TypePool::STRING);
                    self.emit(Instruction::Call {
                        target,
                        callee: Operand::Symbol(concat),
                        args: vec![previous, piece],
                    });
                    Operand::Register(target)
                }
            });
        }
        accumulated.unwrap_or(Operand::Constant(Constant::String(vela_syntax::Name::EMPTY)))
    }
}
