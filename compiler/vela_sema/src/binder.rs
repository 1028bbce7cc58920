//! The binder: syntax to untyped tree.
//!
//! Two passes over the syntax. Declaration collection builds the module
//! tree, function signatures, and globals; body binding walks each
//! function body producing untyped nodes, scope by scope, emitting
//! constraints for everything that needs the solver (assignability,
//! overload groups, member lookups, indirect calls). References are
//! classified by context: a bare type name is never a legal callee or
//! value, modules are only legal as member-access receivers, and labels
//! resolve only from `goto`.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;
use vela_diagnostic::{Diagnostic, ErrorCode, Span};
use vela_syntax::ast::{self, Declaration, FunctionBody, Statement, StringPart};
use vela_syntax::{Name, StringInterner, SyntaxKind, SyntaxNode, SyntaxTree, TokenKind, TokenValue, TriviaKind};

use crate::provider::{MetadataCache, SymbolProvider};
use crate::scope::{ScopeKind, Scopes};
use crate::solve::{Constraint, SolveContext, Solver};
use crate::unify::signatures_match;
use crate::{
    BoundArena, BoundBody, CancellationToken, Constant, FunctionSymbol, Intrinsics, Lazy,
    Promises, SymbolData, SymbolId, SymbolKind, SymbolStore, TypeData, TypeId, TypePool,
    UntypedArena, UntypedCallee, UntypedExpr, UntypedExprId, UntypedExprKind, UntypedStmt,
    UntypedStringPart, Visibility,
};

/// External inputs to semantic analysis.
#[derive(Default)]
pub struct AnalyzeOptions {
    /// Symbol providers consulted for external assemblies.
    pub providers: Vec<Arc<dyn SymbolProvider>>,
    /// Assembly names searched when resolving imports.
    pub references: Vec<String>,
}

/// The result of semantic analysis.
pub struct Analysis {
    pub store: SymbolStore,
    pub pool: TypePool,
    pub intrinsics: Intrinsics,
    pub root_module: SymbolId,
    pub untyped: UntypedArena,
    pub bound: BoundArena,
    /// Fully bound function bodies, in binding order.
    pub bodies: Vec<BoundBody>,
    /// Global variables of the compilation, with bound initializers.
    pub globals: Vec<(SymbolId, Option<crate::BoundExprId>)>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run the binder and solver over a parsed tree.
pub fn analyze(
    tree: &SyntaxTree,
    options: &AnalyzeOptions,
    cancellation: &CancellationToken,
) -> Analysis {
    let interner = Arc::clone(tree.interner());
    let store = SymbolStore::new();
    let mut pool = TypePool::new();
    let intrinsics = Intrinsics::install(&store, &mut pool, &interner);
    let mut promises = Promises::new();
    let mut solver = Solver::new();
    let mut untyped = UntypedArena::new();
    let mut diagnostics = Vec::new();
    let metadata = MetadataCache::new();

    let unit = ast::CompilationUnit::cast(tree.root()).expect("root is a compilation unit");

    let mut binder = Binder {
        store: &store,
        pool: &mut pool,
        intrinsics: &intrinsics,
        interner: &interner,
        promises: &mut promises,
        solver: &mut solver,
        untyped: &mut untyped,
        diagnostics: &mut diagnostics,
        scopes: Scopes::new(),
        metadata: &metadata,
        options,
        pending_bodies: Vec::new(),
        current_return: TypePool::UNIT,
        current_container: None,
        module_imports: FxHashMap::default(),
        globals: Vec::new(),
    };

    binder.scopes.push(ScopeKind::CompilationUnit);
    for (name, &symbol) in &intrinsics.primitive_types {
        binder.scopes.declare(*name, symbol, &store);
    }
    let array_name = interner.intern("Array");
    binder.scopes.declare(array_name, intrinsics.array_type, &store);

    // Pass 1: the module tree, signatures, and globals.
    let root_module = binder.collect_module(None, Visibility::Public, &unit.declarations(), None);

    // Pass 2: bodies. Module scopes are re-entered per function via the
    // container chain.
    let mut untyped_bodies: Vec<(SymbolId, UntypedExprId)> = Vec::new();
    let mut global_inits: Vec<(SymbolId, Option<UntypedExprId>)> = Vec::new();
    binder.bind_globals(root_module, &mut global_inits);
    let mut queue: Vec<SymbolId> = binder.function_queue(root_module);
    while let Some(function) = queue.pop() {
        if cancellation.is_cancelled() {
            break;
        }
        if let Some(root) = binder.bind_function_body(function, root_module) {
            untyped_bodies.push((function, root));
        }
        queue.append(&mut binder.pending_bodies);
    }
    drop(binder);

    debug!(
        functions = untyped_bodies.len(),
        exprs = untyped.expr_count(),
        "binding finished, solving"
    );

    // Solve.
    let mut ctx = SolveContext {
        pool: &mut pool,
        store: &store,
        intrinsics: &intrinsics,
        interner: &interner,
        promises: &mut promises,
        diagnostics: &mut diagnostics,
    };
    solver.solve(&mut ctx, cancellation);

    // Rewrite to the bound tree.
    let mut bound = BoundArena::new();
    let mut bodies = Vec::new();
    {
        let mut rewriter = crate::rewrite::Rewriter {
            untyped: &untyped,
            bound: &mut bound,
            pool: &mut pool,
            promises: &promises,
        };
        for (function, root) in untyped_bodies {
            let root = rewriter.expr(root);
            bodies.push(BoundBody { function, root });
        }
    }
    let globals = global_inits
        .into_iter()
        .map(|(symbol, init)| {
            let mut rewriter = crate::rewrite::Rewriter {
                untyped: &untyped,
                bound: &mut bound,
                pool: &mut pool,
                promises: &promises,
            };
            (symbol, init.map(|e| rewriter.expr(e)))
        })
        .collect();

    // Flow checks on the bound tree.
    crate::flow::check(&bound, &bodies, &store, &mut pool, &mut diagnostics);

    Analysis {
        store,
        pool,
        intrinsics,
        root_module,
        untyped,
        bound,
        bodies,
        globals,
        diagnostics,
    }
}

/// Members of a type symbol, if initialized.
pub(crate) fn type_members(symbol: SymbolId, store: &SymbolStore) -> Vec<SymbolId> {
    match &store.get(symbol).kind {
        SymbolKind::Type { members, .. } => {
            members.get().map(|m| (*m).clone()).unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

struct Binder<'a> {
    store: &'a SymbolStore,
    pool: &'a mut TypePool,
    intrinsics: &'a Intrinsics,
    interner: &'a Arc<StringInterner>,
    promises: &'a mut Promises,
    solver: &'a mut Solver,
    untyped: &'a mut UntypedArena,
    diagnostics: &'a mut Vec<Diagnostic>,
    scopes: Scopes,
    metadata: &'a MetadataCache,
    options: &'a AnalyzeOptions,
    /// Nested functions discovered while binding bodies.
    pending_bodies: Vec<SymbolId>,
    current_return: TypeId,
    /// Container module of the function body being bound.
    current_container: Option<SymbolId>,
    /// Imports per module, for scope re-entry while binding bodies.
    module_imports: FxHashMap<SymbolId, Vec<SymbolId>>,
    globals: Vec<SymbolId>,
}

/// Side table entries recorded during collection so bodies can re-enter
/// their module scope.
#[derive(Default)]
struct ModuleInfo {
    members: Vec<SymbolId>,
    imports: Vec<SymbolId>,
}

impl Binder<'_> {
    fn report(&mut self, code: ErrorCode, message: String, span: Span) {
        self.diagnostics.push(Diagnostic::error(code, message, span));
    }

    // ─── Pass 1: collection ────────────────────────────────────────

    /// Collect a module's declarations into symbols. Pushes a module scope
    /// that remains on the stack (the scope stack mirrors the module tree
    /// during collection and body binding alike, since bodies are bound
    /// while their module's scope is still open).
    fn collect_module(
        &mut self,
        name: Option<Name>,
        visibility: Visibility,
        declarations: &[Declaration],
        container: Option<SymbolId>,
    ) -> SymbolId {
        let module = self.store.alloc(SymbolData {
            name,
            container,
            visibility,
            kind: SymbolKind::Module {
                members: Lazy::new(),
            },
        });

        self.scopes.push(ScopeKind::Module);
        let mut info = ModuleInfo::default();

        // Imports first: signatures may reference imported types.
        for declaration in declarations {
            if let Declaration::Import(import) = declaration {
                if let Some(symbol) = self.resolve_import(import) {
                    info.imports.push(symbol);
                    self.declare_imported_members(symbol);
                }
            }
        }

        for declaration in declarations {
            match declaration {
                Declaration::Import(_) | Declaration::Unexpected(_) => {}
                Declaration::Function(func) => {
                    let symbol = self.collect_function(func, module);
                    self.check_duplicate_overload(func, symbol);
                    if let Some(name) = self.store.get(symbol).name {
                        self.scopes.declare(name, symbol, self.store);
                    }
                    info.members.push(symbol);
                }
                Declaration::Module(nested) => {
                    let nested_name = nested.name().map(|t| t.text());
                    let visibility = visibility_of(nested.visibility().map(|t| t.kind()));
                    let symbol = self.collect_module(
                        nested_name,
                        visibility,
                        &nested.declarations(),
                        Some(module),
                    );
                    self.scopes.pop();
                    if let Some(name) = nested_name {
                        self.scopes.declare(name, symbol, self.store);
                    }
                    info.members.push(symbol);
                }
                Declaration::Variable(var) => {
                    let symbol = self.collect_global(var, module);
                    if let Some(name) = self.store.get(symbol).name {
                        self.scopes.declare(name, symbol, self.store);
                    }
                    info.members.push(symbol);
                    self.globals.push(symbol);
                }
                Declaration::Label(label) => {
                    // The parser already wrapped global labels; tolerate.
                    let _ = label;
                }
            }
        }

        match &self.store.get(module).kind {
            SymbolKind::Module { members } => {
                members.get_or_init(|| info.members.clone());
            }
            _ => unreachable!("collect_module allocated a module"),
        }
        self.module_imports.insert(module, info.imports);
        // The module scope stays pushed for the caller (the root stays open
        // for body binding; nested modules are popped by the caller above).
        module
    }

    fn check_duplicate_overload(&mut self, func: &ast::FunctionDeclaration, symbol: SymbolId) {
        let Some(name) = self.store.get(symbol).name else {
            return;
        };
        let Some(existing) = self.scopes.lookup_current(name).map(<[SymbolId]>::to_vec) else {
            return;
        };
        let new_ty = match self.store.get(symbol).as_function() {
            Some(f) => f.ty,
            None => return,
        };
        for other in existing {
            if other == symbol {
                continue;
            }
            let Some(other_fn) = self.store.get(other).as_function().map(|f| f.ty) else {
                continue;
            };
            if signatures_match(self.pool, new_ty, other_fn) {
                let span = func
                    .name()
                    .map(|t| t.span())
                    .unwrap_or_else(|| func.syntax().span());
                let shown = self.interner.lookup(name);
                self.report(
                    ErrorCode::E2004,
                    format!("`{shown}` is already declared with an equivalent signature"),
                    span,
                );
            }
        }
    }

    /// Build a function symbol: type parameters, parameters, return type.
    fn collect_function(
        &mut self,
        func: &ast::FunctionDeclaration,
        container: SymbolId,
    ) -> SymbolId {
        let name = func.name().map(|t| t.text());
        let visibility = visibility_of(func.visibility().map(|t| t.kind()));

        // Type parameters open a signature scope.
        self.scopes.push(ScopeKind::Function);
        let mut type_params = Vec::new();
        if let Some(list) = func.generic_parameters() {
            for param in list.parameters() {
                let Some(token) = param.name() else { continue };
                let symbol = self.store.alloc(SymbolData {
                    name: Some(token.text()),
                    container: None,
                    visibility: Visibility::Private,
                    kind: SymbolKind::TypeParameter,
                });
                self.scopes.declare(token.text(), symbol, self.store);
                type_params.push(symbol);
            }
        }

        let mut params = Vec::new();
        let mut param_types = Vec::new();
        let mut is_variadic = false;
        if let Some(list) = func.parameters() {
            let declared = list.parameters();
            for (i, param) in declared.iter().enumerate() {
                let ty = param
                    .type_annotation()
                    .and_then(|a| a.ty())
                    .map(|t| self.bind_type(&t))
                    .unwrap_or(TypePool::ERROR);
                let variadic = param.ellipsis().is_some();
                if variadic {
                    if i + 1 != declared.len() {
                        let span = param.syntax().span();
                        self.report(
                            ErrorCode::E1003,
                            "a variadic parameter must be the last parameter".to_string(),
                            span,
                        );
                    } else if !matches!(self.pool.data(ty), TypeData::Array { .. }) {
                        let span = param.syntax().span();
                        let shown = self.pool.display(ty, self.interner);
                        self.report(
                            ErrorCode::E3001,
                            format!("a variadic parameter requires an array type, found {shown}"),
                            span,
                        );
                    } else {
                        is_variadic = true;
                    }
                }
                let symbol = self.store.alloc(SymbolData {
                    name: param.name().map(|t| t.text()),
                    container: None,
                    visibility: Visibility::Private,
                    kind: SymbolKind::Parameter {
                        ty,
                        is_variadic: variadic,
                    },
                });
                params.push(symbol);
                param_types.push(ty);
            }
        }

        let return_type = match func.return_type().and_then(|a| a.ty()) {
            Some(ty) => self.bind_type(&ty),
            // Inline bodies infer; block bodies default to unit.
            None => match func.body() {
                Some(FunctionBody::Inline(_)) => self.pool.fresh_var(),
                _ => TypePool::UNIT,
            },
        };
        self.scopes.pop();

        let ty = self.pool.function(param_types, return_type);
        self.store.alloc(SymbolData {
            name,
            container: Some(container),
            visibility,
            kind: SymbolKind::Function(FunctionSymbol {
                type_params,
                params,
                return_type,
                ty,
                is_variadic,
                body: Some(func.clone()),
                intrinsic: None,
            }),
        })
    }

    fn collect_global(&mut self, var: &ast::VariableDeclaration, container: SymbolId) -> SymbolId {
        let name = var.name().map(|t| t.text());
        let visibility = visibility_of(var.visibility().map(|t| t.kind()));
        let ty = match var.type_annotation().and_then(|a| a.ty()) {
            Some(ty) => self.bind_type(&ty),
            None => self.pool.fresh_var(),
        };
        self.store.alloc(SymbolData {
            name,
            container: Some(container),
            visibility,
            kind: SymbolKind::Global {
                ty,
                mutable: var.is_mutable(),
                initializer: var.initializer(),
            },
        })
    }

    /// Resolve an import path to a module or external type symbol.
    fn resolve_import(&mut self, import: &ast::ImportDeclaration) -> Option<SymbolId> {
        let Some(path) = import.path() else {
            return None;
        };
        let segments = path.segments();
        if segments.is_empty() {
            return None;
        }
        let names: Vec<&str> = segments.iter().map(|t| t.text_str()).collect();

        // Source modules first: walk from what is in scope.
        let first = segments[0].text();
        if let Some(entries) = self.scopes.lookup(first) {
            if let Some(&start) = entries
                .iter()
                .find(|&&s| matches!(self.store.get(s).kind, SymbolKind::Module { .. }))
            {
                let mut current = start;
                let mut ok = true;
                for segment in &segments[1..] {
                    match self.module_member(current, segment.text()) {
                        Some(next) => current = next,
                        None => {
                            ok = false;
                            break;
                        }
                    }
                }
                if ok {
                    return Some(current);
                }
            }
        }

        // External: the first segment names an assembly reference.
        for reference in &self.options.references {
            if reference != names[0] {
                continue;
            }
            for provider in &self.options.providers {
                let Some(assembly) = provider.assembly(reference, None) else {
                    continue;
                };
                let (namespace, name) = names[1..].split_at(names.len().saturating_sub(2));
                let Some(type_name) = name.first() else {
                    continue;
                };
                if let Some(symbol) = self.metadata.type_symbol(
                    &assembly,
                    namespace,
                    type_name,
                    self.store,
                    self.pool,
                    self.interner,
                ) {
                    return Some(symbol);
                }
            }
        }

        let span = path.syntax().span();
        self.report(
            ErrorCode::E2001,
            format!("undefined import `{}`", names.join(".")),
            span,
        );
        None
    }

    /// Bring an imported container's members into the current scope.
    fn declare_imported_members(&mut self, container: SymbolId) {
        let members: Vec<SymbolId> = match &self.store.get(container).kind {
            SymbolKind::Module { members } => {
                members.get().map(|m| (*m).clone()).unwrap_or_default()
            }
            SymbolKind::Type { members, .. } => {
                members.get().map(|m| (*m).clone()).unwrap_or_default()
            }
            _ => Vec::new(),
        };
        for member in members {
            let data = self.store.get(member);
            if data.visibility == Visibility::Private {
                continue;
            }
            if let Some(name) = data.name {
                self.scopes.declare(name, member, self.store);
            }
        }
        // The container itself stays addressable by its own name.
        if let Some(name) = self.store.get(container).name {
            self.scopes.declare(name, container, self.store);
        }
    }

    fn module_member(&self, module: SymbolId, name: Name) -> Option<SymbolId> {
        let members = match &self.store.get(module).kind {
            SymbolKind::Module { members } => members.get()?,
            _ => return None,
        };
        members
            .iter()
            .copied()
            .find(|&m| self.store.get(m).name == Some(name))
    }

    /// All source functions reachable from a module, depth first.
    fn function_queue(&self, module: SymbolId) -> Vec<SymbolId> {
        let mut queue = Vec::new();
        let mut stack = vec![module];
        while let Some(current) = stack.pop() {
            let members = match &self.store.get(current).kind {
                SymbolKind::Module { members } => {
                    members.get().map(|m| (*m).clone()).unwrap_or_default()
                }
                _ => Vec::new(),
            };
            for member in members {
                match &self.store.get(member).kind {
                    SymbolKind::Module { .. } => stack.push(member),
                    SymbolKind::Function(f) if f.body.is_some() => queue.push(member),
                    _ => {}
                }
            }
        }
        queue
    }

    /// Bind global initializers against their declared types.
    ///
    /// Each initializer binds inside its global's container module scope,
    /// re-entered the same way function bodies re-enter theirs, so a
    /// module-level global can reference its siblings.
    fn bind_globals(&mut self, root: SymbolId, out: &mut Vec<(SymbolId, Option<UntypedExprId>)>) {
        let globals = self.globals.clone();
        for global in globals {
            let data = self.store.get(global);
            let SymbolKind::Global {
                ty, initializer, ..
            } = &data.kind
            else {
                continue;
            };
            let ty = *ty;
            let init = initializer.clone().and_then(|i| i.value());

            let module_scopes = self.push_module_scopes(data.container, root);
            let bound = init.map(|value| {
                let expr = self.bind_expr(&value);
                let span = value.span();
                self.solver.push(Constraint::Assignable {
                    target: ty,
                    source: self.untyped.expr(expr).ty,
                    span,
                });
                expr
            });
            for _ in 0..module_scopes {
                self.scopes.pop();
            }
            out.push((global, bound));
        }
    }

    // ─── Pass 2: bodies ────────────────────────────────────────────

    /// Re-enter the module scopes between the root module and `container`,
    /// returning how many scopes were pushed.
    fn push_module_scopes(&mut self, container: Option<SymbolId>, root: SymbolId) -> usize {
        let mut chain = Vec::new();
        let mut current = container;
        while let Some(module) = current {
            if module == root {
                break;
            }
            chain.push(module);
            current = self.store.get(module).container;
        }
        chain.reverse();
        let mut pushed = 0;
        for module in chain {
            self.scopes.push(ScopeKind::Module);
            pushed += 1;
            if let Some(imports) = self.module_imports.get(&module).cloned() {
                for import in imports {
                    self.declare_imported_members(import);
                }
            }
            let members = match &self.store.get(module).kind {
                SymbolKind::Module { members } => {
                    members.get().map(|m| (*m).clone()).unwrap_or_default()
                }
                _ => Vec::new(),
            };
            for member in members {
                if let Some(name) = self.store.get(member).name {
                    self.scopes.declare(name, member, self.store);
                }
            }
        }
        pushed
    }

    /// Bind one function body, producing the untyped root expression.
    fn bind_function_body(&mut self, symbol: SymbolId, root: SymbolId) -> Option<UntypedExprId> {
        let data = self.store.get(symbol);
        let function = data.as_function()?;
        let decl = function.body.clone()?;

        let container = data.container;
        let module_scopes = self.push_module_scopes(container, root);
        let saved_container = self.current_container;
        self.current_container = container;

        self.scopes.push(ScopeKind::Function);
        for &type_param in &function.type_params {
            if let Some(name) = self.store.get(type_param).name {
                self.scopes.declare(name, type_param, self.store);
            }
        }
        for &param in &function.params {
            if let Some(name) = self.store.get(param).name {
                self.scopes.declare(name, param, self.store);
            }
        }
        let saved_return = self.current_return;
        self.current_return = function.return_type;

        let root = match decl.body() {
            Some(FunctionBody::Inline(inline)) => {
                let value = inline
                    .value()
                    .map(|v| self.bind_expr(&v))
                    .unwrap_or_else(|| self.error_expr(decl.syntax().span()));
                let span = self.untyped.expr(value).span;
                self.solver.push(Constraint::Assignable {
                    target: function.return_type,
                    source: self.untyped.expr(value).ty,
                    span,
                });
                Some(value)
            }
            Some(FunctionBody::Block(block)) => {
                self.scopes.push(ScopeKind::FunctionBody);
                let statements = block.statements();
                self.predeclare_labels(&statements);
                let stmts: Vec<_> = statements
                    .iter()
                    .map(|s| self.bind_statement(s))
                    .collect();
                self.scopes.pop();
                let span = block.syntax().span();
                Some(self.untyped.alloc_expr(UntypedExpr {
                    kind: UntypedExprKind::Block {
                        statements: stmts,
                        value: None,
                    },
                    ty: TypePool::UNIT,
                    span,
                }))
            }
            None => None,
        };

        self.current_return = saved_return;
        self.current_container = saved_container;
        self.scopes.pop();
        for _ in 0..module_scopes {
            self.scopes.pop();
        }
        root
    }

    /// Labels are visible to forward `goto`s within their scope.
    fn predeclare_labels(&mut self, statements: &[Statement]) {
        for statement in statements {
            if let Statement::Declaration(decl) = statement {
                if let Some(Declaration::Label(label)) = decl.declaration() {
                    if let Some(token) = label.name() {
                        let symbol = self.store.alloc(SymbolData {
                            name: Some(token.text()),
                            container: None,
                            visibility: Visibility::Private,
                            kind: SymbolKind::Label,
                        });
                        self.scopes.declare(token.text(), symbol, self.store);
                    }
                }
            }
        }
    }

    fn bind_statement(&mut self, statement: &Statement) -> crate::UntypedStmtId {
        let span = statement.syntax().span();
        let stmt = match statement {
            Statement::Declaration(decl) => match decl.declaration() {
                Some(Declaration::Variable(var)) => self.bind_local(&var),
                Some(Declaration::Label(label)) => {
                    // Pre-declared; find the symbol back by name.
                    let symbol = label
                        .name()
                        .and_then(|t| self.scopes.lookup_label(t.text(), self.store));
                    match symbol {
                        Some(symbol) => UntypedStmt::Label { symbol },
                        None => UntypedStmt::Nop,
                    }
                }
                Some(Declaration::Function(func)) => {
                    let container = self.current_container.unwrap_or(SymbolId::from_raw(0));
                    let symbol = self.collect_function(&func, container);
                    if let Some(name) = self.store.get(symbol).name {
                        self.scopes.declare(name, symbol, self.store);
                    }
                    self.pending_bodies.push(symbol);
                    UntypedStmt::Function { symbol }
                }
                Some(Declaration::Import(import)) => {
                    if let Some(symbol) = self.resolve_import(&import) {
                        self.declare_imported_members(symbol);
                    }
                    UntypedStmt::Nop
                }
                _ => UntypedStmt::Nop,
            },
            Statement::Expression(expr_stmt) => match expr_stmt.expression() {
                Some(expr) => UntypedStmt::Expr(self.bind_expr(&expr)),
                None => UntypedStmt::Nop,
            },
            Statement::NoOp(_) | Statement::Unexpected(_) => UntypedStmt::Nop,
        };
        self.untyped.alloc_stmt(stmt, span)
    }

    fn bind_local(&mut self, var: &ast::VariableDeclaration) -> UntypedStmt {
        let ty = match var.type_annotation().and_then(|a| a.ty()) {
            Some(ty) => self.bind_type(&ty),
            None => self.pool.fresh_var(),
        };
        let symbol = self.store.alloc(SymbolData {
            name: var.name().map(|t| t.text()),
            container: None,
            visibility: Visibility::Private,
            kind: SymbolKind::Local {
                ty,
                mutable: var.is_mutable(),
            },
        });
        let initializer = var.initializer().and_then(|i| i.value()).map(|value| {
            let expr = self.bind_expr(&value);
            let span = value.span();
            self.solver.push(Constraint::Assignable {
                target: ty,
                source: self.untyped.expr(expr).ty,
                span,
            });
            expr
        });
        if let Some(name) = var.name().map(|t| t.text()) {
            self.scopes.declare(name, symbol, self.store);
        }
        UntypedStmt::Local {
            symbol,
            initializer,
        }
    }

    fn error_expr(&mut self, span: Span) -> UntypedExprId {
        self.untyped.alloc_expr(UntypedExpr {
            kind: UntypedExprKind::Error,
            ty: TypePool::ERROR,
            span,
        })
    }

    fn alloc(&mut self, kind: UntypedExprKind, ty: TypeId, span: Span) -> UntypedExprId {
        self.untyped.alloc_expr(UntypedExpr { kind, ty, span })
    }

    fn expr_ty(&self, id: UntypedExprId) -> TypeId {
        self.untyped.expr(id).ty
    }

    // ─── Expressions ───────────────────────────────────────────────

    /// Bind an expression in value context: module and type references are
    /// not values, and a function group referenced as a value must name a
    /// unique function.
    fn bind_expr(&mut self, node: &SyntaxNode) -> UntypedExprId {
        let id = self.bind_expr_any(node);
        match self.untyped.expr(id).kind.clone() {
            UntypedExprKind::ModuleRef(_) => {
                let span = self.untyped.expr(id).span;
                self.report(
                    ErrorCode::E2003,
                    "a module is not a value".to_string(),
                    span,
                );
                self.error_expr(span)
            }
            UntypedExprKind::TypeRef { .. } => {
                let span = self.untyped.expr(id).span;
                self.report(
                    ErrorCode::E2003,
                    "a type is not a value".to_string(),
                    span,
                );
                self.error_expr(span)
            }
            UntypedExprKind::FunctionGroup {
                name,
                candidates,
                promise,
                ..
            } => {
                let span = self.untyped.expr(id).span;
                match candidates.as_slice() {
                    [single] => {
                        let ty = self.untyped.expr(id).ty;
                        self.promises.resolve(promise, *single);
                        if let Some(fn_ty) = self.store.get(*single).value_type() {
                            self.solver.push(Constraint::Assignable {
                                target: ty,
                                source: fn_ty,
                                span,
                            });
                        }
                        id
                    }
                    _ => {
                        let shown = self.interner.lookup(name);
                        self.report(
                            ErrorCode::E2002,
                            format!("ambiguous reference to `{shown}`"),
                            span,
                        );
                        self.promises.fail(promise);
                        self.error_expr(span)
                    }
                }
            }
            _ => id,
        }
    }

    /// Bind an expression allowing module/type results (receiver and
    /// callee positions).
    fn bind_expr_any(&mut self, node: &SyntaxNode) -> UntypedExprId {
        let span = node.span();
        match node.kind() {
            SyntaxKind::LiteralExpression => self.bind_literal(node, span),
            SyntaxKind::NameExpression => self.bind_name(node, span),
            SyntaxKind::MemberExpression => self.bind_member(node, span),
            SyntaxKind::CallExpression => self.bind_call(node, span),
            SyntaxKind::GenericExpression => self.bind_generic(node, span),
            SyntaxKind::IndexExpression => self.bind_index(node, span),
            SyntaxKind::UnaryExpression => self.bind_unary(node, span),
            SyntaxKind::BinaryExpression => self.bind_binary(node, span),
            SyntaxKind::RelationalExpression => self.bind_relational(node, span),
            SyntaxKind::IfExpression => self.bind_if(node, span),
            SyntaxKind::WhileExpression => self.bind_while(node, span),
            SyntaxKind::BlockExpression => self.bind_block(node, span),
            SyntaxKind::ReturnExpression => self.bind_return(node, span),
            SyntaxKind::GotoExpression => self.bind_goto(node, span),
            SyntaxKind::StringExpression => self.bind_string(node, span),
            SyntaxKind::GroupingExpression => {
                match ast::GroupingExpression::cast(node.clone()).and_then(|g| g.expression()) {
                    Some(inner) => self.bind_expr_any(&inner),
                    None => self.error_expr(span),
                }
            }
            _ => self.error_expr(span),
        }
    }

    fn bind_literal(&mut self, node: &SyntaxNode, span: Span) -> UntypedExprId {
        let Some(token) = ast::LiteralExpression::cast(node.clone()).and_then(|l| l.token())
        else {
            return self.error_expr(span);
        };
        let (constant, ty) = match token.kind() {
            TokenKind::KeywordTrue => (Constant::Bool(true), TypePool::BOOL),
            TokenKind::KeywordFalse => (Constant::Bool(false), TypePool::BOOL),
            TokenKind::IntLiteral => match token.value() {
                Some(TokenValue::Int(value)) => (Constant::Int(value), TypePool::INT32),
                _ => (Constant::Int(0), TypePool::INT32),
            },
            TokenKind::FloatLiteral => match token.value() {
                Some(TokenValue::Float(bits)) => (Constant::Float(bits), TypePool::FLOAT64),
                _ => (Constant::Float(0), TypePool::FLOAT64),
            },
            TokenKind::CharLiteral => match token.value() {
                Some(TokenValue::Char(value)) => (Constant::Char(value), TypePool::CHAR),
                _ => (Constant::Char('\0'), TypePool::CHAR),
            },
            _ => return self.error_expr(span),
        };
        self.alloc(UntypedExprKind::Literal(constant), ty, span)
    }

    fn bind_name(&mut self, node: &SyntaxNode, span: Span) -> UntypedExprId {
        let Some(token) = ast::NameExpression::cast(node.clone()).and_then(|n| n.identifier())
        else {
            return self.error_expr(span);
        };
        let name = token.text();
        let Some(entries) = self.scopes.lookup(name).map(<[SymbolId]>::to_vec) else {
            let shown = self.interner.lookup(name);
            self.report(
                ErrorCode::E2001,
                format!("undefined reference `{shown}`"),
                span,
            );
            return self.error_expr(span);
        };
        self.bind_symbol_entries(name, &entries, span)
    }

    /// Classify a resolved name: value, module, type, or function group.
    fn bind_symbol_entries(
        &mut self,
        name: Name,
        entries: &[SymbolId],
        span: Span,
    ) -> UntypedExprId {
        debug_assert!(!entries.is_empty());
        let first = self.store.get(entries[0]);
        match &first.kind {
            SymbolKind::Function(_) => {
                let candidates: Vec<SymbolId> = entries
                    .iter()
                    .copied()
                    .filter(|&s| matches!(self.store.get(s).kind, SymbolKind::Function(_)))
                    .collect();
                let promise = self.promises.fresh();
                let ty = self.pool.fresh_var();
                self.alloc(
                    UntypedExprKind::FunctionGroup {
                        name,
                        candidates,
                        type_args: None,
                        promise,
                    },
                    ty,
                    span,
                )
            }
            SymbolKind::Module { .. } => {
                self.alloc(UntypedExprKind::ModuleRef(entries[0]), TypePool::ERROR, span)
            }
            SymbolKind::Type { .. } | SymbolKind::TypeParameter => self.alloc(
                UntypedExprKind::TypeRef {
                    symbol: entries[0],
                    instance: None,
                },
                TypePool::ERROR,
                span,
            ),
            SymbolKind::Label => {
                let shown = self.interner.lookup(name);
                self.report(
                    ErrorCode::E2003,
                    format!("label `{shown}` can only be referenced by `goto`"),
                    span,
                );
                self.error_expr(span)
            }
            _ => {
                let ty = first.value_type().unwrap_or(TypePool::ERROR);
                self.alloc(UntypedExprKind::SymbolRef(entries[0]), ty, span)
            }
        }
    }

    fn bind_member(&mut self, node: &SyntaxNode, span: Span) -> UntypedExprId {
        let Some(member) = ast::MemberExpression::cast(node.clone()) else {
            return self.error_expr(span);
        };
        let (Some(receiver_node), Some(member_token)) = (member.receiver(), member.member())
        else {
            return self.error_expr(span);
        };
        let name = member_token.text();
        let receiver = self.bind_expr_any(&receiver_node);

        match &self.untyped.expr(receiver).kind {
            // Module member access is pure namespacing.
            UntypedExprKind::ModuleRef(module) => {
                let module = *module;
                let members: Vec<SymbolId> = match &self.store.get(module).kind {
                    SymbolKind::Module { members } => {
                        members.get().map(|m| (*m).clone()).unwrap_or_default()
                    }
                    _ => Vec::new(),
                };
                let matching: Vec<SymbolId> = members
                    .into_iter()
                    .filter(|&m| self.store.get(m).name == Some(name))
                    .collect();
                if matching.is_empty() {
                    let shown = self.interner.lookup(name);
                    self.report(
                        ErrorCode::E2001,
                        format!("undefined reference `{shown}`"),
                        span,
                    );
                    return self.error_expr(span);
                }
                self.bind_symbol_entries(name, &matching, span)
            }
            // Static member access on an external type.
            UntypedExprKind::TypeRef { symbol, .. } => {
                let members = type_members(*symbol, self.store);
                let matching: Vec<SymbolId> = members
                    .into_iter()
                    .filter(|&m| self.store.get(m).name == Some(name))
                    .collect();
                if matching.is_empty() {
                    let shown = self.interner.lookup(name);
                    self.report(
                        ErrorCode::E2001,
                        format!("undefined reference `{shown}`"),
                        span,
                    );
                    return self.error_expr(span);
                }
                self.bind_symbol_entries(name, &matching, span)
            }
            // Value receiver: a member constraint awaits its type.
            _ => {
                let promise = self.promises.fresh();
                let result = self.pool.fresh_var();
                self.solver.push(Constraint::Member {
                    receiver: self.expr_ty(receiver),
                    name,
                    result,
                    promise,
                    span,
                });
                self.alloc(
                    UntypedExprKind::Member {
                        receiver,
                        name,
                        promise,
                    },
                    result,
                    span,
                )
            }
        }
    }

    fn bind_generic(&mut self, node: &SyntaxNode, span: Span) -> UntypedExprId {
        let Some(generic) = ast::GenericExpression::cast(node.clone()) else {
            return self.error_expr(span);
        };
        let Some(callee) = generic.callee() else {
            return self.error_expr(span);
        };
        let type_args: Vec<TypeId> = generic
            .type_arguments()
            .iter()
            .map(|t| self.bind_type(t))
            .collect();
        let base = self.bind_expr_any(&callee);
        match self.untyped.expr(base).kind.clone() {
            UntypedExprKind::FunctionGroup {
                name,
                candidates,
                promise,
                ..
            } => {
                let ty = self.expr_ty(base);
                self.alloc(
                    UntypedExprKind::FunctionGroup {
                        name,
                        candidates,
                        type_args: Some(type_args),
                        promise,
                    },
                    ty,
                    span,
                )
            }
            UntypedExprKind::TypeRef { symbol, .. } => {
                let instance = if symbol == self.intrinsics.array_type {
                    if type_args.len() == 1 {
                        Some(self.pool.array(type_args[0]))
                    } else {
                        self.report(
                            ErrorCode::E3005,
                            format!("`Array` takes 1 type argument, found {}", type_args.len()),
                            span,
                        );
                        Some(TypePool::ERROR)
                    }
                } else {
                    Some(
                        self.pool
                            .intern_data(TypeData::Instance {
                                generic: symbol,
                                args: type_args,
                            }),
                    )
                };
                self.alloc(
                    UntypedExprKind::TypeRef { symbol, instance },
                    TypePool::ERROR,
                    span,
                )
            }
            _ => {
                self.report(
                    ErrorCode::E2003,
                    "type arguments are only legal on function or type names".to_string(),
                    span,
                );
                base
            }
        }
    }

    fn bind_call(&mut self, node: &SyntaxNode, span: Span) -> UntypedExprId {
        let Some(call) = ast::CallExpression::cast(node.clone()) else {
            return self.error_expr(span);
        };
        let Some(callee_node) = call.callee() else {
            return self.error_expr(span);
        };
        let args: Vec<UntypedExprId> = call
            .arguments()
            .iter()
            .map(|a| self.bind_expr(a))
            .collect();
        let arg_types: Vec<TypeId> = args.iter().map(|&a| self.expr_ty(a)).collect();

        let callee = self.bind_expr_any(&callee_node);
        match self.untyped.expr(callee).kind.clone() {
            UntypedExprKind::FunctionGroup {
                name,
                candidates,
                type_args,
                promise,
            } => {
                let ret = self.pool.fresh_var();
                // The group's own type is the resolved function type.
                self.solver.push(Constraint::Overload {
                    name,
                    candidates,
                    type_args,
                    args: arg_types,
                    ret,
                    promise,
                    span,
                });
                self.alloc(
                    UntypedExprKind::Call {
                        callee: UntypedCallee::Overload { name, promise },
                        args,
                    },
                    ret,
                    span,
                )
            }
            UntypedExprKind::TypeRef { symbol, instance } => {
                // Constructor position: only the array constructor exists.
                if let Some(instance) = instance {
                    if let TypeData::Array { element } = self.pool.data(instance) {
                        let element = *element;
                        if args.len() == 1 {
                            self.solver.push(Constraint::Assignable {
                                target: TypePool::INT32,
                                source: arg_types[0],
                                span,
                            });
                            return self.alloc(
                                UntypedExprKind::NewArray {
                                    element,
                                    length: args[0],
                                },
                                instance,
                                span,
                            );
                        }
                        self.report(
                            ErrorCode::E3001,
                            format!("the array constructor takes 1 argument, found {}", args.len()),
                            span,
                        );
                        return self.error_expr(span);
                    }
                }
                let _ = symbol;
                self.report(
                    ErrorCode::E2003,
                    "a type name cannot be called".to_string(),
                    span,
                );
                self.error_expr(span)
            }
            UntypedExprKind::ModuleRef(_) => {
                self.report(
                    ErrorCode::E2003,
                    "a module cannot be called".to_string(),
                    span,
                );
                self.error_expr(span)
            }
            _ => {
                let ret = self.pool.fresh_var();
                self.solver.push(Constraint::Call {
                    callee: self.expr_ty(callee),
                    args: arg_types,
                    ret,
                    span,
                });
                self.alloc(
                    UntypedExprKind::Call {
                        callee: UntypedCallee::Expr(callee),
                        args,
                    },
                    ret,
                    span,
                )
            }
        }
    }

    fn bind_index(&mut self, node: &SyntaxNode, span: Span) -> UntypedExprId {
        let Some(index) = ast::IndexExpression::cast(node.clone()) else {
            return self.error_expr(span);
        };
        let (Some(receiver_node), Some(index_node)) = (index.receiver(), index.index()) else {
            return self.error_expr(span);
        };
        let receiver = self.bind_expr(&receiver_node);
        let index_expr = self.bind_expr(&index_node);
        let element = self.pool.fresh_var();
        let array = self.pool.array(element);
        self.solver.push(Constraint::Assignable {
            target: array,
            source: self.expr_ty(receiver),
            span,
        });
        self.solver.push(Constraint::Assignable {
            target: TypePool::INT32,
            source: self.expr_ty(index_expr),
            span,
        });
        self.alloc(
            UntypedExprKind::Index {
                receiver,
                index: index_expr,
            },
            element,
            span,
        )
    }

    fn bind_unary(&mut self, node: &SyntaxNode, span: Span) -> UntypedExprId {
        let Some(unary) = ast::UnaryExpression::cast(node.clone()) else {
            return self.error_expr(span);
        };
        let (Some(op), Some(operand_node)) = (unary.operator(), unary.operand()) else {
            return self.error_expr(span);
        };
        let operand = self.bind_expr(&operand_node);

        if op.kind() == TokenKind::KeywordNot {
            self.solver.push(Constraint::Assignable {
                target: TypePool::BOOL,
                source: self.expr_ty(operand),
                span,
            });
            return self.alloc(UntypedExprKind::Not { operand }, TypePool::BOOL, span);
        }

        let op_name = self.interner.intern(&format!("unary{}", op.text_str()));
        self.overload_call(op_name, vec![operand], span)
    }

    /// An overloaded operator application, represented as a call so
    /// lowering can key on the resolved operator symbol.
    fn overload_call(&mut self, name: Name, args: Vec<UntypedExprId>, span: Span) -> UntypedExprId {
        let candidates = self.intrinsics.operator_set(name).to_vec();
        let arg_types: Vec<TypeId> = args.iter().map(|&a| self.expr_ty(a)).collect();
        let promise = self.promises.fresh();
        let ret = self.pool.fresh_var();
        self.solver.push(Constraint::Overload {
            name,
            candidates,
            type_args: None,
            args: arg_types,
            ret,
            promise,
            span,
        });
        self.alloc(
            UntypedExprKind::Call {
                callee: UntypedCallee::Overload { name, promise },
                args,
            },
            ret,
            span,
        )
    }

    fn bind_binary(&mut self, node: &SyntaxNode, span: Span) -> UntypedExprId {
        let Some(binary) = ast::BinaryExpression::cast(node.clone()) else {
            return self.error_expr(span);
        };
        let (Some(left_node), Some(op), Some(right_node)) =
            (binary.left(), binary.operator(), binary.right())
        else {
            return self.error_expr(span);
        };

        match op.kind() {
            TokenKind::Assign
            | TokenKind::PlusAssign
            | TokenKind::MinusAssign
            | TokenKind::StarAssign
            | TokenKind::SlashAssign => self.bind_assignment(&left_node, op.kind(), &right_node, span),
            TokenKind::KeywordAnd | TokenKind::KeywordOr => {
                let left = self.bind_expr(&left_node);
                let right = self.bind_expr(&right_node);
                for &operand in &[left, right] {
                    self.solver.push(Constraint::Assignable {
                        target: TypePool::BOOL,
                        source: self.expr_ty(operand),
                        span,
                    });
                }
                let kind = if op.kind() == TokenKind::KeywordAnd {
                    UntypedExprKind::And { left, right }
                } else {
                    UntypedExprKind::Or { left, right }
                };
                self.alloc(kind, TypePool::BOOL, span)
            }
            _ => {
                let left = self.bind_expr(&left_node);
                let right = self.bind_expr(&right_node);
                let name = op.text();
                self.overload_call(name, vec![left, right], span)
            }
        }
    }

    fn bind_assignment(
        &mut self,
        target_node: &SyntaxNode,
        op: TokenKind,
        value_node: &SyntaxNode,
        span: Span,
    ) -> UntypedExprId {
        let value = self.bind_expr(value_node);
        let target = self.bind_expr(target_node);

        // The target must be an assignable place.
        match &self.untyped.expr(target).kind {
            UntypedExprKind::SymbolRef(symbol) => {
                let data = self.store.get(*symbol);
                if !data.is_assignable() {
                    self.report(
                        ErrorCode::E3006,
                        "cannot assign to an immutable binding".to_string(),
                        span,
                    );
                }
            }
            UntypedExprKind::Index { .. }
            | UntypedExprKind::Member { .. }
            | UntypedExprKind::Error => {}
            _ => {
                self.report(
                    ErrorCode::E3006,
                    "this expression cannot be assigned to".to_string(),
                    span,
                );
            }
        }

        let target_ty = self.expr_ty(target);
        let operator = match op {
            TokenKind::Assign => {
                self.solver.push(Constraint::Assignable {
                    target: target_ty,
                    source: self.expr_ty(value),
                    span,
                });
                None
            }
            _ => {
                let base = match op {
                    TokenKind::PlusAssign => "+",
                    TokenKind::MinusAssign => "-",
                    TokenKind::StarAssign => "*",
                    TokenKind::SlashAssign => "/",
                    _ => unreachable!("assignment operator"),
                };
                let name = self.interner.intern(base);
                let candidates = self.intrinsics.operator_set(name).to_vec();
                let promise = self.promises.fresh();
                let ret = self.pool.fresh_var();
                self.solver.push(Constraint::Overload {
                    name,
                    candidates,
                    type_args: None,
                    args: vec![target_ty, self.expr_ty(value)],
                    ret,
                    promise,
                    span,
                });
                self.solver.push(Constraint::Assignable {
                    target: target_ty,
                    source: ret,
                    span,
                });
                Some((name, promise))
            }
        };

        self.alloc(
            UntypedExprKind::Assign {
                target,
                operator,
                value,
            },
            TypePool::UNIT,
            span,
        )
    }

    fn bind_relational(&mut self, node: &SyntaxNode, span: Span) -> UntypedExprId {
        let Some(relational) = ast::RelationalExpression::cast(node.clone()) else {
            return self.error_expr(span);
        };
        let Some(head_node) = relational.head() else {
            return self.error_expr(span);
        };
        let first = self.bind_expr(&head_node);
        let mut previous_ty = self.expr_ty(first);
        let mut comparisons = Vec::new();
        for comparison in relational.comparisons() {
            let (Some(op), Some(operand_node)) = (comparison.operator(), comparison.operand())
            else {
                continue;
            };
            let operand = self.bind_expr(&operand_node);
            let name = op.text();
            let candidates = self.intrinsics.operator_set(name).to_vec();
            let promise = self.promises.fresh();
            let ret = self.pool.fresh_var();
            let op_span = op.span();
            self.solver.push(Constraint::Overload {
                name,
                candidates,
                type_args: None,
                args: vec![previous_ty, self.expr_ty(operand)],
                ret,
                promise,
                span: op_span,
            });
            self.solver.push(Constraint::Assignable {
                target: TypePool::BOOL,
                source: ret,
                span: op_span,
            });
            previous_ty = self.expr_ty(operand);
            comparisons.push((name, promise, operand));
        }
        self.alloc(
            UntypedExprKind::Relational { first, comparisons },
            TypePool::BOOL,
            span,
        )
    }

    fn bind_if(&mut self, node: &SyntaxNode, span: Span) -> UntypedExprId {
        let Some(if_expr) = ast::IfExpression::cast(node.clone()) else {
            return self.error_expr(span);
        };
        let condition = match if_expr.condition() {
            Some(c) => self.bind_expr(&c),
            None => self.error_expr(span),
        };
        self.solver.push(Constraint::Assignable {
            target: TypePool::BOOL,
            source: self.expr_ty(condition),
            span,
        });
        let then_branch = match if_expr.then_body() {
            Some(t) => self.bind_expr(&t),
            None => self.error_expr(span),
        };
        let else_branch = if_expr
            .else_clause()
            .and_then(|e| e.body())
            .map(|e| self.bind_expr(&e));

        let ty = match else_branch {
            Some(else_branch) => {
                let result = self.pool.fresh_var();
                for &branch in &[then_branch, else_branch] {
                    let branch_span = self.untyped.expr(branch).span;
                    self.solver.push(Constraint::Assignable {
                        target: result,
                        source: self.expr_ty(branch),
                        span: branch_span,
                    });
                }
                result
            }
            None => TypePool::UNIT,
        };
        self.alloc(
            UntypedExprKind::If {
                condition,
                then_branch,
                else_branch,
            },
            ty,
            span,
        )
    }

    fn bind_while(&mut self, node: &SyntaxNode, span: Span) -> UntypedExprId {
        let Some(while_expr) = ast::WhileExpression::cast(node.clone()) else {
            return self.error_expr(span);
        };
        let condition = match while_expr.condition() {
            Some(c) => self.bind_expr(&c),
            None => self.error_expr(span),
        };
        self.solver.push(Constraint::Assignable {
            target: TypePool::BOOL,
            source: self.expr_ty(condition),
            span,
        });
        self.scopes.push(ScopeKind::While);
        let body = match while_expr.body() {
            Some(b) => self.bind_expr(&b),
            None => self.error_expr(span),
        };
        self.scopes.pop();
        self.alloc(
            UntypedExprKind::While { condition, body },
            TypePool::UNIT,
            span,
        )
    }

    fn bind_block(&mut self, node: &SyntaxNode, span: Span) -> UntypedExprId {
        let Some(block) = ast::BlockExpression::cast(node.clone()) else {
            return self.error_expr(span);
        };
        self.scopes.push(ScopeKind::Block);
        let statements = block.statements();
        self.predeclare_labels(&statements);
        let stmts: Vec<_> = statements.iter().map(|s| self.bind_statement(s)).collect();
        let value = block.value().map(|v| self.bind_expr(&v));
        self.scopes.pop();
        let ty = value.map(|v| self.expr_ty(v)).unwrap_or(TypePool::UNIT);
        self.alloc(
            UntypedExprKind::Block {
                statements: stmts,
                value,
            },
            ty,
            span,
        )
    }

    fn bind_return(&mut self, node: &SyntaxNode, span: Span) -> UntypedExprId {
        let value = ast::ReturnExpression::cast(node.clone())
            .and_then(|r| r.value())
            .map(|v| self.bind_expr(&v));
        let source = value.map(|v| self.expr_ty(v)).unwrap_or(TypePool::UNIT);
        self.solver.push(Constraint::Assignable {
            target: self.current_return,
            source,
            span,
        });
        self.alloc(UntypedExprKind::Return { value }, TypePool::NEVER, span)
    }

    fn bind_goto(&mut self, node: &SyntaxNode, span: Span) -> UntypedExprId {
        let Some(token) = ast::GotoExpression::cast(node.clone()).and_then(|g| g.label()) else {
            return self.error_expr(span);
        };
        let name = token.text();
        match self.scopes.lookup_label(name, self.store) {
            Some(label) => self.alloc(UntypedExprKind::Goto { label }, TypePool::NEVER, span),
            None => {
                let shown = self.interner.lookup(name);
                self.report(
                    ErrorCode::E2001,
                    format!("undefined label `{shown}`"),
                    span,
                );
                self.error_expr(span)
            }
        }
    }

    fn bind_string(&mut self, node: &SyntaxNode, span: Span) -> UntypedExprId {
        let Some(string) = ast::StringExpression::cast(node.clone()) else {
            return self.error_expr(span);
        };
        let multi_line = string.is_multi_line();
        // The closing delimiter's leading whitespace is the indentation
        // prefix stripped from every content line.
        let prefix: String = string
            .close()
            .map(|t| {
                t.green()
                    .leading
                    .iter()
                    .rev()
                    .find(|tr| tr.kind == TriviaKind::Whitespace)
                    .map(|tr| self.interner.lookup(tr.text).to_string())
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        let raw_parts = string.parts();
        let mut parts = Vec::new();
        let mut at_line_start = true;
        for (i, part) in raw_parts.iter().enumerate() {
            match part {
                StringPart::Content(token) => {
                    let text = match token.value() {
                        Some(TokenValue::String(name)) => self.interner.lookup(name),
                        _ => token.text_str(),
                    };
                    let cooked = if multi_line && at_line_start && !prefix.is_empty() {
                        text.strip_prefix(prefix.as_str()).unwrap_or(text)
                    } else {
                        text
                    };
                    parts.push(UntypedStringPart::Text(self.interner.intern(cooked)));
                    at_line_start = false;
                }
                StringPart::Newline(_) => {
                    // The line break before the closing delimiter is not
                    // part of the value.
                    if !(multi_line && i + 1 == raw_parts.len()) {
                        parts.push(UntypedStringPart::Text(self.interner.intern("\n")));
                    }
                    at_line_start = true;
                }
                StringPart::Interpolation(interpolation) => {
                    let expr = match interpolation.expression() {
                        Some(e) => self.bind_expr(&e),
                        None => self.error_expr(span),
                    };
                    parts.push(UntypedStringPart::Expr(expr));
                    at_line_start = false;
                }
            }
        }
        self.alloc(UntypedExprKind::String { parts }, TypePool::STRING, span)
    }

    // ─── Types ─────────────────────────────────────────────────────

    /// Bind type syntax to a pool type.
    fn bind_type(&mut self, node: &SyntaxNode) -> TypeId {
        let span = node.span();
        match node.kind() {
            SyntaxKind::NameType => {
                let Some(token) =
                    ast::NameType::cast(node.clone()).and_then(|n| n.identifier())
                else {
                    return TypePool::ERROR;
                };
                let name = token.text();
                let Some(entries) = self.scopes.lookup(name).map(<[SymbolId]>::to_vec) else {
                    let shown = self.interner.lookup(name);
                    self.report(
                        ErrorCode::E2001,
                        format!("undefined type `{shown}`"),
                        span,
                    );
                    return TypePool::ERROR;
                };
                self.type_from_symbol(entries[0], name, span)
            }
            SyntaxKind::GenericType => {
                let Some(generic) = ast::GenericType::cast(node.clone()) else {
                    return TypePool::ERROR;
                };
                let args: Vec<TypeId> = generic
                    .type_arguments()
                    .iter()
                    .map(|t| self.bind_type(t))
                    .collect();
                let Some(base) = generic.base() else {
                    return TypePool::ERROR;
                };
                self.bind_generic_type(&base, args, span)
            }
            SyntaxKind::MemberType => {
                let Some(member) = ast::MemberType::cast(node.clone()) else {
                    return TypePool::ERROR;
                };
                let (Some(receiver), Some(token)) = (member.receiver(), member.member()) else {
                    return TypePool::ERROR;
                };
                let symbol = self.resolve_type_path(&receiver, token.text(), span);
                match symbol {
                    Some(symbol) => self.type_from_symbol(symbol, token.text(), span),
                    None => TypePool::ERROR,
                }
            }
            _ => TypePool::ERROR,
        }
    }

    fn type_from_symbol(&mut self, symbol: SymbolId, name: Name, span: Span) -> TypeId {
        let data = self.store.get(symbol);
        match &data.kind {
            SymbolKind::Type { ty, .. } => {
                if symbol == self.intrinsics.array_type {
                    self.report(
                        ErrorCode::E3005,
                        "`Array` requires a type argument".to_string(),
                        span,
                    );
                    return TypePool::ERROR;
                }
                if *ty == TypePool::ERROR {
                    // External non-generic type.
                    return self.pool.intern_data(TypeData::Instance {
                        generic: symbol,
                        args: Vec::new(),
                    });
                }
                *ty
            }
            SymbolKind::TypeParameter => {
                self.pool.intern_data(TypeData::TypeParameter(symbol))
            }
            _ => {
                let shown = self.interner.lookup(name);
                self.report(
                    ErrorCode::E2003,
                    format!("`{shown}` is not a type"),
                    span,
                );
                TypePool::ERROR
            }
        }
    }

    fn bind_generic_type(&mut self, base: &SyntaxNode, args: Vec<TypeId>, span: Span) -> TypeId {
        let Some(token) = ast::NameType::cast(base.clone()).and_then(|n| n.identifier()) else {
            return TypePool::ERROR;
        };
        let name = token.text();
        let Some(entries) = self.scopes.lookup(name).map(<[SymbolId]>::to_vec) else {
            let shown = self.interner.lookup(name);
            self.report(ErrorCode::E2001, format!("undefined type `{shown}`"), span);
            return TypePool::ERROR;
        };
        let symbol = entries[0];
        if symbol == self.intrinsics.array_type {
            if args.len() != 1 {
                self.report(
                    ErrorCode::E3005,
                    format!("`Array` takes 1 type argument, found {}", args.len()),
                    span,
                );
                return TypePool::ERROR;
            }
            return self.pool.array(args[0]);
        }
        match &self.store.get(symbol).kind {
            SymbolKind::Type { .. } => self.pool.intern_data(TypeData::Instance {
                generic: symbol,
                args,
            }),
            _ => {
                let shown = self.interner.lookup(name);
                self.report(ErrorCode::E2003, format!("`{shown}` is not a type"), span);
                TypePool::ERROR
            }
        }
    }

    /// Walk a member-type path (`module.Type`) to its final symbol.
    fn resolve_type_path(
        &mut self,
        receiver: &SyntaxNode,
        member: Name,
        span: Span,
    ) -> Option<SymbolId> {
        let container = match receiver.kind() {
            SyntaxKind::NameType => {
                let token = ast::NameType::cast(receiver.clone()).and_then(|n| n.identifier())?;
                let entries = self.scopes.lookup(token.text())?;
                entries.first().copied()
            }
            SyntaxKind::MemberType => {
                let node = ast::MemberType::cast(receiver.clone())?;
                let token = node.member()?;
                self.resolve_type_path(&node.receiver()?, token.text(), span)
            }
            _ => None,
        }?;
        match &self.store.get(container).kind {
            SymbolKind::Module { .. } => self.module_member(container, member),
            SymbolKind::Type { .. } => {
                type_members(container, self.store)
                    .into_iter()
                    .find(|&m| self.store.get(m).name == Some(member))
            }
            _ => None,
        }
    }
}

fn visibility_of(kind: Option<TokenKind>) -> Visibility {
    match kind {
        Some(TokenKind::KeywordPublic) => Visibility::Public,
        Some(TokenKind::KeywordInternal) => Visibility::Internal,
        _ => Visibility::Private,
    }
}
