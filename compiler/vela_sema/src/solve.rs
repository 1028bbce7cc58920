//! The constraint solver.
//!
//! A fixpoint engine over constraints and type variables. Each tick a
//! constraint reports [`SolveState`]: `Stale` (awaiting information),
//! `AdvancedContinue` (made progress, run another pass), or `Solved`. The
//! driver loops until every constraint solves or a full pass makes no
//! progress; residual stale constraints fail with their configured
//! diagnostic.
//!
//! Failure containment: a constraint that fails definitively unifies its
//! output with `Error` and fails its promise; constraints whose inputs are
//! already `Error` (or whose promise failed upstream) stay silent, so only
//! the root cause is reported.

use rustc_hash::FxHashMap;
use tracing::{debug, trace};
use vela_diagnostic::{Diagnostic, ErrorCode, Span};
use vela_syntax::{Name, StringInterner};

use crate::unify::{unify, UnifyError};
use crate::{
    CancellationToken, Intrinsics, PromiseId, SymbolId, SymbolKind, SymbolStore, TypeData, TypeId,
    TypePool,
};

/// Result of one constraint tick.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SolveState {
    /// Waiting on more information; try again next pass.
    Stale,
    /// Progress was made; the driver runs another full pass.
    AdvancedContinue,
    /// Done; never ticked again.
    Solved,
}

/// State of one constraint promise.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PromiseState {
    Unresolved,
    Resolved(SymbolId),
    /// Definitive failure; dependents stay silent.
    Failed,
}

/// Promise storage.
#[derive(Default)]
pub struct Promises {
    states: Vec<PromiseState>,
}

impl Promises {
    pub fn new() -> Self {
        Promises::default()
    }

    pub fn fresh(&mut self) -> PromiseId {
        let id = PromiseId(u32::try_from(self.states.len()).expect("promise overflow"));
        self.states.push(PromiseState::Unresolved);
        id
    }

    pub fn get(&self, id: PromiseId) -> PromiseState {
        self.states[id.0 as usize]
    }

    pub fn resolve(&mut self, id: PromiseId, symbol: SymbolId) {
        debug_assert_eq!(self.get(id), PromiseState::Unresolved);
        self.states[id.0 as usize] = PromiseState::Resolved(symbol);
    }

    /// Mark failed, suppressing dependent diagnostics.
    pub fn fail(&mut self, id: PromiseId) {
        if self.get(id) == PromiseState::Unresolved {
            self.states[id.0 as usize] = PromiseState::Failed;
        }
    }
}

/// A solver work item.
#[derive(Clone, Debug)]
pub enum Constraint {
    /// `source` must be assignable to `target` (implicit conversions are
    /// identity, so this unifies).
    Assignable {
        target: TypeId,
        source: TypeId,
        span: Span,
    },
    /// An indirect call through a function-typed value.
    Call {
        callee: TypeId,
        args: Vec<TypeId>,
        ret: TypeId,
        span: Span,
    },
    /// Resolve a function group against arguments.
    Overload {
        name: Name,
        candidates: Vec<SymbolId>,
        /// Explicit type arguments (`f<int32>`), when written.
        type_args: Option<Vec<TypeId>>,
        args: Vec<TypeId>,
        ret: TypeId,
        promise: PromiseId,
        span: Span,
    },
    /// Await the receiver type, then look the member up on it.
    Member {
        receiver: TypeId,
        name: Name,
        result: TypeId,
        promise: PromiseId,
        span: Span,
    },
}

/// Everything a constraint needs to make progress.
pub struct SolveContext<'a> {
    pub pool: &'a mut TypePool,
    pub store: &'a SymbolStore,
    pub intrinsics: &'a Intrinsics,
    pub interner: &'a StringInterner,
    pub promises: &'a mut Promises,
    pub diagnostics: &'a mut Vec<Diagnostic>,
}

impl SolveContext<'_> {
    fn report_unify_errors(&mut self, errors: Vec<UnifyError>) {
        for error in errors {
            let expected = self.pool.display(error.expected, self.interner);
            let found = self.pool.display(error.found, self.interner);
            self.diagnostics.push(Diagnostic::error(
                ErrorCode::E3001,
                format!("type mismatch: expected {expected}, found {found}"),
                error.span,
            ));
        }
    }

    fn unify_reporting(&mut self, a: TypeId, b: TypeId, span: Span) {
        let mut errors = Vec::new();
        unify(self.pool, a, b, span, &mut errors);
        self.report_unify_errors(errors);
    }

    /// Unify without reporting (failure containment paths).
    fn unify_silent(&mut self, a: TypeId, b: TypeId) {
        let mut errors = Vec::new();
        unify(self.pool, a, b, Span::DUMMY, &mut errors);
    }
}

/// The driver: owns the constraint list and runs it to fixpoint.
#[derive(Default)]
pub struct Solver {
    constraints: Vec<Constraint>,
}

impl Solver {
    pub fn new() -> Self {
        Solver::default()
    }

    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Run to fixpoint. Residual stale constraints fail with their
    /// configured diagnostic. Consults `cancellation` between passes.
    pub fn solve(mut self, ctx: &mut SolveContext<'_>, cancellation: &CancellationToken) {
        let mut pending: Vec<Option<Constraint>> =
            self.constraints.drain(..).map(Some).collect();
        debug!(count = pending.len(), "solving constraints");

        loop {
            if cancellation.is_cancelled() {
                return;
            }
            let mut progressed = false;
            let mut remaining = 0usize;
            for slot in pending.iter_mut() {
                let Some(constraint) = slot.take() else {
                    continue;
                };
                match tick(&constraint, ctx) {
                    SolveState::Solved => progressed = true,
                    SolveState::AdvancedContinue => {
                        progressed = true;
                        remaining += 1;
                        *slot = Some(constraint);
                    }
                    SolveState::Stale => {
                        remaining += 1;
                        *slot = Some(constraint);
                    }
                }
            }
            if remaining == 0 {
                return;
            }
            if !progressed {
                break;
            }
        }

        // Fixpoint with stale leftovers: each fails definitively.
        for constraint in pending.into_iter().flatten() {
            fail_stale(&constraint, ctx);
        }
    }
}

/// Run one constraint tick.
fn tick(constraint: &Constraint, ctx: &mut SolveContext<'_>) -> SolveState {
    trace!(?constraint, "tick");
    match constraint {
        Constraint::Assignable {
            target,
            source,
            span,
        } => {
            // Never is assignable to everything, so it must not force the
            // target; while the target is still a variable the constraint
            // waits in case another assignment pins it down.
            let source_resolved = ctx.pool.resolve(*source);
            if matches!(ctx.pool.data(source_resolved), TypeData::Never) {
                let target_resolved = ctx.pool.resolve(*target);
                if matches!(ctx.pool.data(target_resolved), TypeData::Var(_)) {
                    return SolveState::Stale;
                }
                return SolveState::Solved;
            }
            ctx.unify_reporting(*target, *source, *span);
            SolveState::Solved
        }

        Constraint::Call {
            callee,
            args,
            ret,
            span,
        } => tick_call(*callee, args, *ret, *span, ctx),

        Constraint::Overload {
            name,
            candidates,
            type_args,
            args,
            ret,
            promise,
            span,
        } => tick_overload(
            *name,
            candidates,
            type_args.as_deref(),
            args,
            *ret,
            *promise,
            *span,
            ctx,
        ),

        Constraint::Member {
            receiver,
            name,
            result,
            promise,
            span,
        } => tick_member(*receiver, *name, *result, *promise, *span, ctx),
    }
}

fn tick_call(
    callee: TypeId,
    args: &[TypeId],
    ret: TypeId,
    span: Span,
    ctx: &mut SolveContext<'_>,
) -> SolveState {
    let callee = ctx.pool.resolve(callee);
    match ctx.pool.data(callee).clone() {
        TypeData::Var(_) => SolveState::Stale,
        TypeData::Error => {
            ctx.unify_silent(ret, TypePool::ERROR);
            SolveState::Solved
        }
        TypeData::Function { params, ret: fret } => {
            if params.len() != args.len() {
                ctx.diagnostics.push(Diagnostic::error(
                    ErrorCode::E3001,
                    format!(
                        "expected {} argument(s), found {}",
                        params.len(),
                        args.len()
                    ),
                    span,
                ));
                ctx.unify_silent(ret, TypePool::ERROR);
                return SolveState::Solved;
            }
            for (&param, &arg) in params.iter().zip(args) {
                ctx.unify_reporting(param, arg, span);
            }
            ctx.unify_reporting(ret, fret, span);
            SolveState::Solved
        }
        _ => {
            let shown = ctx.pool.display(callee, ctx.interner);
            ctx.diagnostics.push(Diagnostic::error(
                ErrorCode::E3002,
                format!("value of type {shown} is not callable"),
                span,
            ));
            ctx.unify_silent(ret, TypePool::ERROR);
            SolveState::Solved
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn tick_overload(
    name: Name,
    candidates: &[SymbolId],
    type_args: Option<&[TypeId]>,
    args: &[TypeId],
    ret: TypeId,
    promise: PromiseId,
    span: Span,
    ctx: &mut SolveContext<'_>,
) -> SolveState {
    // Candidate iteration order is declaration order; ties are reported,
    // never resolved by position.
    let viable: Vec<SymbolId> = candidates
        .iter()
        .copied()
        .filter(|&c| arity_matches(c, type_args, args.len(), ctx))
        .collect();

    let any_error_arg = args.iter().any(|&a| {
        let resolved = ctx.pool.resolve(a);
        matches!(ctx.pool.data(resolved), TypeData::Error)
    });

    if viable.is_empty() {
        if !any_error_arg {
            let shown = ctx.interner.lookup(name);
            ctx.diagnostics.push(Diagnostic::error(
                ErrorCode::E3004,
                format!("no overload of `{shown}` matches the call"),
                span,
            ));
        }
        ctx.unify_silent(ret, TypePool::ERROR);
        ctx.promises.fail(promise);
        return SolveState::Solved;
    }

    let all_known = args.iter().all(|&a| !ctx.pool.is_unresolved(a));
    if !all_known {
        if viable.len() == 1 {
            // A single viable candidate drives inference through the
            // unknown arguments.
            resolve_overload(viable[0], type_args, args, ret, promise, span, ctx);
            return SolveState::Solved;
        }
        return SolveState::Stale;
    }

    let mut scored: Vec<(SymbolId, u32)> = Vec::with_capacity(viable.len());
    for candidate in viable {
        if let Some(score) = score_candidate(candidate, type_args, args, ctx) {
            scored.push((candidate, score));
        }
    }

    match best_unique(&scored) {
        Selection::None => {
            if !any_error_arg {
                let shown = ctx.interner.lookup(name);
                let arg_types: Vec<String> = args
                    .iter()
                    .map(|&a| ctx.pool.display(a, ctx.interner))
                    .collect();
                ctx.diagnostics.push(Diagnostic::error(
                    ErrorCode::E3004,
                    format!(
                        "no overload of `{shown}` matches argument types ({})",
                        arg_types.join(", ")
                    ),
                    span,
                ));
            }
            ctx.unify_silent(ret, TypePool::ERROR);
            ctx.promises.fail(promise);
            SolveState::Solved
        }
        Selection::Ambiguous(top) => {
            if !any_error_arg {
                let shown = ctx.interner.lookup(name);
                ctx.diagnostics.push(
                    Diagnostic::error(
                        ErrorCode::E3003,
                        format!("ambiguous overload of `{shown}`"),
                        span,
                    )
                    .with_note(format!("{} candidates score equally", top.len())),
                );
            }
            ctx.unify_silent(ret, TypePool::ERROR);
            ctx.promises.fail(promise);
            SolveState::Solved
        }
        Selection::Unique(winner) => {
            resolve_overload(winner, type_args, args, ret, promise, span, ctx);
            SolveState::Solved
        }
    }
}

enum Selection {
    None,
    Unique(SymbolId),
    Ambiguous(Vec<SymbolId>),
}

fn best_unique(scored: &[(SymbolId, u32)]) -> Selection {
    let Some(&max) = scored.iter().map(|(_, s)| s).max() else {
        return Selection::None;
    };
    let top: Vec<SymbolId> = scored
        .iter()
        .filter(|(_, s)| *s == max)
        .map(|(c, _)| *c)
        .collect();
    match top.as_slice() {
        [single] => Selection::Unique(*single),
        _ => Selection::Ambiguous(top),
    }
}

fn arity_matches(
    candidate: SymbolId,
    type_args: Option<&[TypeId]>,
    arg_count: usize,
    ctx: &SolveContext<'_>,
) -> bool {
    let data = ctx.store.get(candidate);
    let Some(function) = data.as_function() else {
        return false;
    };
    if let Some(type_args) = type_args {
        if function.type_params.len() != type_args.len() {
            return false;
        }
    }
    if function.is_variadic {
        arg_count + 1 >= function.params.len()
    } else {
        arg_count == function.params.len()
    }
}

/// Parameter types of a function symbol, in order.
fn param_types(candidate: SymbolId, ctx: &SolveContext<'_>) -> (Vec<TypeId>, bool) {
    let data = ctx.store.get(candidate);
    let function = data.as_function().expect("overload candidate is a function");
    let params = function
        .params
        .iter()
        .map(|&p| match &ctx.store.get(p).kind {
            SymbolKind::Parameter { ty, .. } => *ty,
            _ => TypePool::ERROR,
        })
        .collect();
    (params, function.is_variadic)
}

/// The parameter type that matches argument `i`, accounting for a trailing
/// variadic (which contributes its element type).
fn param_type_for(
    params: &[TypeId],
    variadic: bool,
    i: usize,
    ctx: &mut SolveContext<'_>,
) -> TypeId {
    if variadic && i + 1 >= params.len() {
        let last = *params.last().expect("variadic function has a parameter");
        match ctx.pool.data(last) {
            TypeData::Array { element } => *element,
            _ => TypePool::ERROR,
        }
    } else {
        params[i]
    }
}

/// Score one candidate against fully-known argument types.
///
/// `None` means eliminated. Per argument: `+2` exact, `+1` assignable via
/// generic unification (or an absorbed `Error`/`Never`), `0` unknown.
fn score_candidate(
    candidate: SymbolId,
    type_args: Option<&[TypeId]>,
    args: &[TypeId],
    ctx: &mut SolveContext<'_>,
) -> Option<u32> {
    let (params, variadic) = param_types(candidate, ctx);
    let mut bindings: FxHashMap<SymbolId, TypeId> = FxHashMap::default();
    if let Some(type_args) = type_args {
        let data = ctx.store.get(candidate);
        let function = data.as_function()?;
        for (&param, &arg) in function.type_params.iter().zip(type_args) {
            bindings.insert(param, arg);
        }
    }

    let mut total = 0u32;
    for (i, &arg) in args.iter().enumerate() {
        let param = param_type_for(&params, variadic, i, ctx);
        let arg = ctx.pool.resolve(arg);
        total += arg_score(param, arg, &mut bindings, ctx)?;
    }
    Some(total)
}

fn arg_score(
    param: TypeId,
    arg: TypeId,
    bindings: &mut FxHashMap<SymbolId, TypeId>,
    ctx: &mut SolveContext<'_>,
) -> Option<u32> {
    match ctx.pool.data(arg) {
        // Unknown: defer without eliminating.
        TypeData::Var(_) => return Some(0),
        // Absorbed failures match anything quietly.
        TypeData::Error | TypeData::Never => return Some(1),
        _ => {}
    }
    if param == arg {
        return Some(2);
    }
    generic_match(param, arg, bindings, ctx).then_some(1)
}

/// Structural match where type parameters bind (consistently) to argument
/// types.
fn generic_match(
    param: TypeId,
    arg: TypeId,
    bindings: &mut FxHashMap<SymbolId, TypeId>,
    ctx: &mut SolveContext<'_>,
) -> bool {
    if param == arg {
        return true;
    }
    match (ctx.pool.data(param).clone(), ctx.pool.data(arg).clone()) {
        (TypeData::TypeParameter(p), _) => match bindings.get(&p) {
            Some(&bound) => bound == arg,
            None => {
                bindings.insert(p, arg);
                true
            }
        },
        (TypeData::Array { element: pe }, TypeData::Array { element: ae }) => {
            generic_match(pe, ae, bindings, ctx)
        }
        (
            TypeData::Function {
                params: pp,
                ret: pr,
            },
            TypeData::Function {
                params: ap,
                ret: ar,
            },
        ) => {
            pp.len() == ap.len()
                && pp
                    .iter()
                    .zip(&ap)
                    .all(|(&x, &y)| generic_match(x, y, bindings, ctx))
                && generic_match(pr, ar, bindings, ctx)
        }
        (
            TypeData::Instance {
                generic: pg,
                args: pa,
            },
            TypeData::Instance {
                generic: ag,
                args: aa,
            },
        ) => {
            pg == ag
                && pa.len() == aa.len()
                && pa
                    .iter()
                    .zip(&aa)
                    .all(|(&x, &y)| generic_match(x, y, bindings, ctx))
        }
        _ => false,
    }
}

/// Commit to a winner: instantiate its signature and unify.
fn resolve_overload(
    winner: SymbolId,
    type_args: Option<&[TypeId]>,
    args: &[TypeId],
    ret: TypeId,
    promise: PromiseId,
    span: Span,
    ctx: &mut SolveContext<'_>,
) {
    let data = ctx.store.get(winner);
    let function = data.as_function().expect("winner is a function");

    let mut substitution: FxHashMap<SymbolId, TypeId> = FxHashMap::default();
    for (i, &type_param) in function.type_params.iter().enumerate() {
        let binding = match type_args {
            Some(type_args) => type_args[i],
            None => ctx.pool.fresh_var(),
        };
        substitution.insert(type_param, binding);
    }

    let (params, variadic) = param_types(winner, ctx);
    for (i, &arg) in args.iter().enumerate() {
        let param = param_type_for(&params, variadic, i, ctx);
        let param = instantiate(param, &substitution, ctx.pool);
        ctx.unify_reporting(param, arg, span);
    }
    let fret = instantiate(function.return_type, &substitution, ctx.pool);
    ctx.unify_reporting(ret, fret, span);
    ctx.promises.resolve(promise, winner);
}

/// Replace type parameters by their substitution, interning the result.
pub(crate) fn instantiate(
    ty: TypeId,
    substitution: &FxHashMap<SymbolId, TypeId>,
    pool: &mut TypePool,
) -> TypeId {
    if substitution.is_empty() {
        return ty;
    }
    match pool.data(ty).clone() {
        TypeData::TypeParameter(p) => substitution.get(&p).copied().unwrap_or(ty),
        TypeData::Array { element } => {
            let element = instantiate(element, substitution, pool);
            pool.array(element)
        }
        TypeData::Function { params, ret } => {
            let params = params
                .iter()
                .map(|&p| instantiate(p, substitution, pool))
                .collect();
            let ret = instantiate(ret, substitution, pool);
            pool.function(params, ret)
        }
        TypeData::Instance { generic, args } => {
            let args = args
                .iter()
                .map(|&a| instantiate(a, substitution, pool))
                .collect();
            pool.intern_data(TypeData::Instance { generic, args })
        }
        _ => ty,
    }
}

fn tick_member(
    receiver: TypeId,
    name: Name,
    result: TypeId,
    promise: PromiseId,
    span: Span,
    ctx: &mut SolveContext<'_>,
) -> SolveState {
    let receiver = ctx.pool.resolve(receiver);
    match ctx.pool.data(receiver).clone() {
        TypeData::Var(_) => SolveState::Stale,
        TypeData::Error => {
            ctx.unify_silent(result, TypePool::ERROR);
            ctx.promises.fail(promise);
            SolveState::Solved
        }
        TypeData::Array { .. } => {
            if ctx.interner.lookup(name) == "length" {
                ctx.unify_reporting(result, TypePool::INT32, span);
                ctx.promises.resolve(promise, ctx.intrinsics.array_length);
            } else {
                report_no_member(receiver, name, span, ctx);
                ctx.unify_silent(result, TypePool::ERROR);
                ctx.promises.fail(promise);
            }
            SolveState::Solved
        }
        TypeData::Instance { generic, .. } => {
            let members = crate::binder::type_members(generic, ctx.store);
            let matching: Vec<SymbolId> = members
                .iter()
                .copied()
                .filter(|&m| ctx.store.get(m).name == Some(name))
                .collect();
            match matching.as_slice() {
                [] => {
                    report_no_member(receiver, name, span, ctx);
                    ctx.unify_silent(result, TypePool::ERROR);
                    ctx.promises.fail(promise);
                }
                [single] => {
                    let value_type = ctx.store.get(*single).value_type();
                    match value_type {
                        Some(ty) => ctx.unify_reporting(result, ty, span),
                        None => ctx.unify_silent(result, TypePool::ERROR),
                    }
                    ctx.promises.resolve(promise, *single);
                }
                _ => {
                    let shown = ctx.interner.lookup(name);
                    ctx.diagnostics.push(Diagnostic::error(
                        ErrorCode::E2002,
                        format!("ambiguous reference to member `{shown}`"),
                        span,
                    ));
                    ctx.unify_silent(result, TypePool::ERROR);
                    ctx.promises.fail(promise);
                }
            }
            SolveState::Solved
        }
        _ => {
            report_no_member(receiver, name, span, ctx);
            ctx.unify_silent(result, TypePool::ERROR);
            ctx.promises.fail(promise);
            SolveState::Solved
        }
    }
}

fn report_no_member(receiver: TypeId, name: Name, span: Span, ctx: &mut SolveContext<'_>) {
    let shown_name = ctx.interner.lookup(name);
    let shown_type = ctx.pool.display(receiver, ctx.interner);
    ctx.diagnostics.push(Diagnostic::error(
        ErrorCode::E2001,
        format!("no member `{shown_name}` on type {shown_type}"),
        span,
    ));
}

/// Fail a constraint left stale at fixpoint.
fn fail_stale(constraint: &Constraint, ctx: &mut SolveContext<'_>) {
    match constraint {
        Constraint::Assignable { target, .. } => {
            // Only Never-source assignments go stale: every path into the
            // target diverges, so the target settles to Never.
            let resolved = ctx.pool.resolve(*target);
            if matches!(ctx.pool.data(resolved), TypeData::Var(_)) {
                ctx.unify_silent(*target, TypePool::NEVER);
            }
        }
        Constraint::Call { callee, ret, span, .. } => {
            let resolved = ctx.pool.resolve(*callee);
            if !matches!(ctx.pool.data(resolved), TypeData::Error) {
                ctx.diagnostics.push(Diagnostic::error(
                    ErrorCode::E3007,
                    "the type of the called value could not be inferred".to_string(),
                    *span,
                ));
            }
            ctx.unify_silent(*callee, TypePool::ERROR);
            ctx.unify_silent(*ret, TypePool::ERROR);
        }
        Constraint::Overload {
            name,
            ret,
            promise,
            span,
            ..
        } => {
            let shown = ctx.interner.lookup(*name);
            ctx.diagnostics.push(Diagnostic::error(
                ErrorCode::E3007,
                format!("the overloads of `{shown}` could not be resolved from the argument types"),
                *span,
            ));
            ctx.unify_silent(*ret, TypePool::ERROR);
            ctx.promises.fail(*promise);
        }
        Constraint::Member {
            receiver,
            result,
            promise,
            span,
            ..
        } => {
            let resolved = ctx.pool.resolve(*receiver);
            if !matches!(ctx.pool.data(resolved), TypeData::Error) {
                ctx.diagnostics.push(Diagnostic::error(
                    ErrorCode::E3007,
                    "the type of the member access receiver could not be inferred".to_string(),
                    *span,
                ));
            }
            ctx.unify_silent(*result, TypePool::ERROR);
            ctx.promises.fail(*promise);
        }
    }
}
