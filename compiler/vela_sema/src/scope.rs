//! The lexical scope stack.
//!
//! Scope boundaries: compilation unit, module, function (parameters and
//! type parameters), function body, block, and while. Inner scopes shadow
//! outer ones; within one scope, function declarations with the same name
//! accumulate into an overload set.

use rustc_hash::FxHashMap;
use vela_syntax::Name;

use crate::{SymbolId, SymbolKind, SymbolStore};

/// What opened the scope.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ScopeKind {
    CompilationUnit,
    Module,
    Function,
    FunctionBody,
    Block,
    While,
}

/// One scope level: names declared at this level.
#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    entries: FxHashMap<Name, Vec<SymbolId>>,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Scope {
            kind,
            entries: FxHashMap::default(),
        }
    }

    /// Declare a symbol. Functions accumulate into overload sets; any
    /// other kind replaces earlier same-name entries (shadowing within the
    /// scope).
    pub fn declare(&mut self, name: Name, symbol: SymbolId, store: &SymbolStore) {
        let entry = self.entries.entry(name).or_default();
        let is_function = matches!(store.get(symbol).kind, SymbolKind::Function(_));
        let all_functions = entry
            .iter()
            .all(|&s| matches!(store.get(s).kind, SymbolKind::Function(_)));
        if is_function && all_functions {
            entry.push(symbol);
        } else {
            entry.clear();
            entry.push(symbol);
        }
    }

    /// Symbols declared under `name` in this scope.
    pub fn lookup(&self, name: Name) -> Option<&[SymbolId]> {
        self.entries.get(&name).map(Vec::as_slice)
    }
}

/// The scope stack.
#[derive(Debug, Default)]
pub struct Scopes {
    stack: Vec<Scope>,
}

impl Scopes {
    pub fn new() -> Self {
        Scopes { stack: Vec::new() }
    }

    pub fn push(&mut self, kind: ScopeKind) {
        self.stack.push(Scope::new(kind));
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    pub fn declare(&mut self, name: Name, symbol: SymbolId, store: &SymbolStore) {
        self.stack
            .last_mut()
            .expect("declare outside any scope")
            .declare(name, symbol, store);
    }

    /// Resolve a name: the innermost scope containing it wins.
    pub fn lookup(&self, name: Name) -> Option<&[SymbolId]> {
        self.stack.iter().rev().find_map(|scope| scope.lookup(name))
    }

    /// Resolve a name in the innermost scope only (duplicate detection).
    pub fn lookup_current(&self, name: Name) -> Option<&[SymbolId]> {
        self.stack.last().and_then(|scope| scope.lookup(name))
    }

    /// Resolve a name to a label symbol, walking outward.
    pub fn lookup_label(&self, name: Name, store: &SymbolStore) -> Option<SymbolId> {
        for scope in self.stack.iter().rev() {
            if let Some(entries) = scope.lookup(name) {
                if let Some(&label) = entries
                    .iter()
                    .find(|&&s| matches!(store.get(s).kind, SymbolKind::Label))
                {
                    return Some(label);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FunctionSymbol, SymbolData, TypePool, Visibility};
    use vela_syntax::StringInterner;

    fn label(store: &SymbolStore) -> SymbolId {
        store.alloc(SymbolData {
            name: None,
            container: None,
            visibility: Visibility::Private,
            kind: SymbolKind::Label,
        })
    }

    fn function(store: &SymbolStore, pool: &mut TypePool) -> SymbolId {
        let ty = pool.function(Vec::new(), TypePool::UNIT);
        store.alloc(SymbolData {
            name: None,
            container: None,
            visibility: Visibility::Private,
            kind: SymbolKind::Function(FunctionSymbol {
                type_params: Vec::new(),
                params: Vec::new(),
                return_type: TypePool::UNIT,
                ty,
                is_variadic: false,
                body: None,
                intrinsic: None,
            }),
        })
    }

    #[test]
    fn test_inner_scope_shadows_outer() {
        let store = SymbolStore::new();
        let interner = StringInterner::new();
        let name = interner.intern("x");

        let outer = label(&store);
        let inner = label(&store);

        let mut scopes = Scopes::new();
        scopes.push(ScopeKind::Function);
        scopes.declare(name, outer, &store);
        scopes.push(ScopeKind::Block);
        scopes.declare(name, inner, &store);

        assert_eq!(scopes.lookup(name), Some(&[inner][..]));
        scopes.pop();
        assert_eq!(scopes.lookup(name), Some(&[outer][..]));
    }

    #[test]
    fn test_functions_accumulate_into_overload_set() {
        let store = SymbolStore::new();
        let mut pool = TypePool::new();
        let interner = StringInterner::new();
        let name = interner.intern("f");

        let f1 = function(&store, &mut pool);
        let f2 = function(&store, &mut pool);

        let mut scopes = Scopes::new();
        scopes.push(ScopeKind::Module);
        scopes.declare(name, f1, &store);
        scopes.declare(name, f2, &store);

        assert_eq!(scopes.lookup(name).unwrap().len(), 2);
    }

    #[test]
    fn test_non_function_replaces() {
        let store = SymbolStore::new();
        let mut pool = TypePool::new();
        let interner = StringInterner::new();
        let name = interner.intern("f");

        let f = function(&store, &mut pool);
        let l = label(&store);

        let mut scopes = Scopes::new();
        scopes.push(ScopeKind::Block);
        scopes.declare(name, f, &store);
        scopes.declare(name, l, &store);

        assert_eq!(scopes.lookup(name), Some(&[l][..]));
    }
}
