//! The symbol model.
//!
//! Symbols form a DAG rooted at the compilation's root module: every symbol
//! holds an optional back reference to its container, never an owning link
//! downward (module member lists are data, not ownership). Symbols are
//! created lazily on first query and live in a thread-safe store for the
//! compilation's lifetime.

use std::sync::Arc;

use parking_lot::RwLock;
use vela_syntax::{ast, Name};

use crate::TypeId;

/// Index of a symbol in the store.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    /// Construct from a raw index (tests and serialization only).
    pub fn from_raw(raw: u32) -> Self {
        SymbolId(raw)
    }

    /// Raw index of the symbol.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl std::fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SymbolId({})", self.0)
    }
}

/// Declared visibility of a symbol.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Visibility {
    /// Visible within the declaring module only.
    #[default]
    Private,
    /// Visible within the compilation.
    Internal,
    /// Visible to consumers of the compilation.
    Public,
}

/// A once-initialized cell with compare-and-set publication.
///
/// Concurrent initializers race: the value is computed outside the lock,
/// published under it, and a loser discards its work and adopts the
/// winner's value. All readers observe the same `Arc`.
pub struct Lazy<T> {
    slot: RwLock<Option<Arc<T>>>,
}

impl<T> Lazy<T> {
    pub fn new() -> Self {
        Lazy {
            slot: RwLock::new(None),
        }
    }

    /// Get the value, initializing it at most once.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> Arc<T> {
        if let Some(value) = self.slot.read().as_ref() {
            return Arc::clone(value);
        }
        let computed = Arc::new(init());
        let mut slot = self.slot.write();
        match slot.as_ref() {
            // A concurrent initializer won; discard ours.
            Some(value) => Arc::clone(value),
            None => {
                *slot = Some(Arc::clone(&computed));
                computed
            }
        }
    }

    /// The value, if already initialized.
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.read().as_ref().map(Arc::clone)
    }
}

impl<T> Default for Lazy<T> {
    fn default() -> Self {
        Lazy::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.slot.read().as_ref() {
            Some(value) => write!(f, "Lazy({value:?})"),
            None => write!(f, "Lazy(<uninit>)"),
        }
    }
}

/// Function payload.
#[derive(Debug)]
pub struct FunctionSymbol {
    /// Declared type parameters, in order.
    pub type_params: Vec<SymbolId>,
    /// Parameter symbols, in declaration order.
    pub params: Vec<SymbolId>,
    /// Declared (or inferred) return type.
    pub return_type: TypeId,
    /// Full function type (`Function { params, ret }` in the pool).
    pub ty: TypeId,
    /// True when the last parameter is variadic.
    pub is_variadic: bool,
    /// Body syntax for source functions; `None` for metadata functions and
    /// intrinsics.
    pub body: Option<ast::FunctionDeclaration>,
    /// Intrinsic operation implemented by this function, if any.
    pub intrinsic: Option<IntrinsicOp>,
}

/// Operations implemented directly by the compiler.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum IntrinsicOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Mod,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    Negate,
    Identity,
    /// Convert a value to its text form (string interpolation).
    ToText,
    /// Concatenate two strings.
    Concat,
}

/// Payload of a symbol.
#[derive(Debug)]
pub enum SymbolKind {
    /// A module; members are populated lazily.
    Module {
        members: Lazy<Vec<SymbolId>>,
    },
    Function(FunctionSymbol),
    Parameter {
        ty: TypeId,
        is_variadic: bool,
    },
    Local {
        ty: TypeId,
        mutable: bool,
    },
    Global {
        ty: TypeId,
        mutable: bool,
        initializer: Option<ast::ValueInitializer>,
    },
    Field {
        ty: TypeId,
        mutable: bool,
    },
    Property {
        ty: TypeId,
        has_setter: bool,
    },
    Label,
    /// A type symbol (primitive, metadata type, or the array constructor).
    Type {
        ty: TypeId,
        members: Lazy<Vec<SymbolId>>,
    },
    TypeParameter,
}

/// One symbol: identity, containment back reference, visibility, payload.
#[derive(Debug)]
pub struct SymbolData {
    pub name: Option<Name>,
    pub container: Option<SymbolId>,
    pub visibility: Visibility,
    pub kind: SymbolKind,
}

/// Thread-safe, append-only symbol storage.
pub struct SymbolStore {
    symbols: RwLock<Vec<Arc<SymbolData>>>,
}

impl SymbolStore {
    pub fn new() -> Self {
        SymbolStore {
            symbols: RwLock::new(Vec::with_capacity(64)),
        }
    }

    /// Add a symbol, returning its id.
    pub fn alloc(&self, data: SymbolData) -> SymbolId {
        let mut symbols = self.symbols.write();
        let id = SymbolId(u32::try_from(symbols.len()).expect("symbol store overflow"));
        symbols.push(Arc::new(data));
        id
    }

    /// Fetch a symbol. The `Arc` is cloned out so no lock is held while the
    /// caller reads fields.
    pub fn get(&self, id: SymbolId) -> Arc<SymbolData> {
        Arc::clone(&self.symbols.read()[id.0 as usize])
    }

    /// Number of symbols allocated.
    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.read().is_empty()
    }
}

impl Default for SymbolStore {
    fn default() -> Self {
        SymbolStore::new()
    }
}

impl SymbolData {
    /// The function payload, when this is a function.
    pub fn as_function(&self) -> Option<&FunctionSymbol> {
        match &self.kind {
            SymbolKind::Function(f) => Some(f),
            _ => None,
        }
    }

    /// The value type of the symbol when referenced in value context.
    pub fn value_type(&self) -> Option<TypeId> {
        match &self.kind {
            SymbolKind::Function(f) => Some(f.ty),
            SymbolKind::Parameter { ty, .. }
            | SymbolKind::Local { ty, .. }
            | SymbolKind::Global { ty, .. }
            | SymbolKind::Field { ty, .. }
            | SymbolKind::Property { ty, .. } => Some(*ty),
            SymbolKind::Module { .. }
            | SymbolKind::Label
            | SymbolKind::Type { .. }
            | SymbolKind::TypeParameter => None,
        }
    }

    /// True for symbols that can be assigned to.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Local { mutable: true, .. }
                | SymbolKind::Global { mutable: true, .. }
                | SymbolKind::Field { mutable: true, .. }
                | SymbolKind::Property {
                    has_setter: true,
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_roundtrip() {
        let store = SymbolStore::new();
        let id = store.alloc(SymbolData {
            name: None,
            container: None,
            visibility: Visibility::Public,
            kind: SymbolKind::Label,
        });
        let data = store.get(id);
        assert!(matches!(data.kind, SymbolKind::Label));
        assert_eq!(data.visibility, Visibility::Public);
    }

    #[test]
    fn test_lazy_initializes_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let lazy: Arc<Lazy<usize>> = Arc::new(Lazy::new());
        let observed = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let lazy = Arc::clone(&lazy);
                let observed = Arc::clone(&observed);
                std::thread::spawn(move || {
                    let value = lazy.get_or_init(|| i);
                    observed.fetch_max(*value, Ordering::SeqCst);
                    *value
                })
            })
            .collect();
        let values: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        // Whatever initializer won, everyone saw the same value.
        assert!(values.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(*lazy.get().unwrap(), values[0]);
    }

    #[test]
    fn test_container_back_reference() {
        let store = SymbolStore::new();
        let module = store.alloc(SymbolData {
            name: None,
            container: None,
            visibility: Visibility::Public,
            kind: SymbolKind::Module {
                members: Lazy::new(),
            },
        });
        let label = store.alloc(SymbolData {
            name: None,
            container: Some(module),
            visibility: Visibility::Private,
            kind: SymbolKind::Label,
        });
        assert_eq!(store.get(label).container, Some(module));
        assert_eq!(store.get(module).container, None);
    }
}
