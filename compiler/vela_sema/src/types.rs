//! The type pool: a deduplicating arena that is the single source of truth
//! for all types in a compilation.
//!
//! Types are referenced by [`TypeId`] (32-bit indices). Hash-based
//! deduplication ensures each unique type exists once, so type equality is
//! index equality. Primitives are pre-interned at fixed indices. Type
//! variables carry a single substitution slot ([`VarState`]) resolved with
//! path compression.

use rustc_hash::FxHashMap;

use crate::SymbolId;

/// Index of a type in the pool.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl std::fmt::Debug for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// Built-in primitive types.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Primitive {
    Unit,
    Bool,
    Int32,
    Int64,
    Float64,
    String,
    Char,
}

impl Primitive {
    /// Source-level name of the primitive.
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Unit => "unit",
            Primitive::Bool => "bool",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::Float64 => "float64",
            Primitive::String => "string",
            Primitive::Char => "char",
        }
    }

    /// All primitives, in pre-intern order.
    pub const ALL: [Primitive; 7] = [
        Primitive::Unit,
        Primitive::Bool,
        Primitive::Int32,
        Primitive::Int64,
        Primitive::Float64,
        Primitive::String,
        Primitive::Char,
    ];
}

/// Structure of a type.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeData {
    /// A built-in primitive.
    Primitive(Primitive),
    /// Rank-1 array.
    Array { element: TypeId },
    /// Function signature.
    Function { params: Vec<TypeId>, ret: TypeId },
    /// Reference to a declared type parameter.
    TypeParameter(SymbolId),
    /// Instantiation of an external generic type.
    Instance { generic: SymbolId, args: Vec<TypeId> },
    /// Unification variable; the id indexes the pool's variable states.
    Var(u32),
    /// Bottom type of diverging expressions.
    Never,
    /// Poison type absorbing cascading failures.
    Error,
}

/// Substitution slot of a type variable.
#[derive(Clone, Copy, Debug)]
pub enum VarState {
    /// Not yet unified with anything.
    Unbound,
    /// Unified: reads follow the link (with path compression).
    Link(TypeId),
}

/// Deduplicating type arena with variable substitution slots.
///
/// Cloning is cheap relative to a compilation and gives consumers (e.g.
/// printers) a scratch pool for display-time resolution.
#[derive(Clone)]
pub struct TypePool {
    items: Vec<TypeData>,
    intern: FxHashMap<TypeData, TypeId>,
    vars: Vec<VarState>,
}

impl TypePool {
    /// Pre-interned `Error` type.
    pub const ERROR: TypeId = TypeId(0);
    /// Pre-interned `Never` type.
    pub const NEVER: TypeId = TypeId(1);
    /// Pre-interned `unit`.
    pub const UNIT: TypeId = TypeId(2);
    /// Pre-interned `bool`.
    pub const BOOL: TypeId = TypeId(3);
    /// Pre-interned `int32`.
    pub const INT32: TypeId = TypeId(4);
    /// Pre-interned `int64`.
    pub const INT64: TypeId = TypeId(5);
    /// Pre-interned `float64`.
    pub const FLOAT64: TypeId = TypeId(6);
    /// Pre-interned `string`.
    pub const STRING: TypeId = TypeId(7);
    /// Pre-interned `char`.
    pub const CHAR: TypeId = TypeId(8);

    /// Create a pool with the fixed-index types pre-interned.
    pub fn new() -> Self {
        let mut pool = TypePool {
            items: Vec::with_capacity(64),
            intern: FxHashMap::default(),
            vars: Vec::new(),
        };
        for data in [
            TypeData::Error,
            TypeData::Never,
            TypeData::Primitive(Primitive::Unit),
            TypeData::Primitive(Primitive::Bool),
            TypeData::Primitive(Primitive::Int32),
            TypeData::Primitive(Primitive::Int64),
            TypeData::Primitive(Primitive::Float64),
            TypeData::Primitive(Primitive::String),
            TypeData::Primitive(Primitive::Char),
        ] {
            pool.intern_data(data);
        }
        debug_assert_eq!(pool.items.len(), 9);
        pool
    }

    /// The pre-interned id of a primitive.
    pub fn primitive(&self, primitive: Primitive) -> TypeId {
        match primitive {
            Primitive::Unit => Self::UNIT,
            Primitive::Bool => Self::BOOL,
            Primitive::Int32 => Self::INT32,
            Primitive::Int64 => Self::INT64,
            Primitive::Float64 => Self::FLOAT64,
            Primitive::String => Self::STRING,
            Primitive::Char => Self::CHAR,
        }
    }

    /// Intern a type, deduplicating structurally equal data.
    pub fn intern_data(&mut self, data: TypeData) -> TypeId {
        if let Some(&id) = self.intern.get(&data) {
            return id;
        }
        let id = TypeId(u32::try_from(self.items.len()).expect("type pool overflow"));
        self.items.push(data.clone());
        self.intern.insert(data, id);
        id
    }

    /// Intern a rank-1 array type.
    pub fn array(&mut self, element: TypeId) -> TypeId {
        self.intern_data(TypeData::Array { element })
    }

    /// Intern a function type.
    pub fn function(&mut self, params: Vec<TypeId>, ret: TypeId) -> TypeId {
        self.intern_data(TypeData::Function { params, ret })
    }

    /// Create a fresh unbound type variable.
    pub fn fresh_var(&mut self) -> TypeId {
        let var_id = u32::try_from(self.vars.len()).expect("type variable overflow");
        self.vars.push(VarState::Unbound);
        self.intern_data(TypeData::Var(var_id))
    }

    /// The structure of a type, without following variable links.
    #[inline]
    pub fn data(&self, id: TypeId) -> &TypeData {
        &self.items[id.0 as usize]
    }

    pub(crate) fn var_state(&self, var_id: u32) -> VarState {
        self.vars[var_id as usize]
    }

    pub(crate) fn set_var(&mut self, var_id: u32, state: VarState) {
        self.vars[var_id as usize] = state;
    }

    /// Resolve a type by following variable links, compressing the path so
    /// later reads are O(1).
    pub fn resolve(&mut self, id: TypeId) -> TypeId {
        let TypeData::Var(var_id) = *self.data(id) else {
            return id;
        };
        match self.var_state(var_id) {
            VarState::Unbound => id,
            VarState::Link(target) => {
                let resolved = self.resolve(target);
                if resolved != target {
                    self.set_var(var_id, VarState::Link(resolved));
                }
                resolved
            }
        }
    }

    /// True when the (resolved) type still contains an unbound variable at
    /// its root.
    pub fn is_unresolved(&mut self, id: TypeId) -> bool {
        let resolved = self.resolve(id);
        matches!(self.data(resolved), TypeData::Var(_))
    }

    /// Render a type for diagnostics.
    pub fn display(&mut self, id: TypeId, interner: &vela_syntax::StringInterner) -> String {
        let id = self.resolve(id);
        match self.data(id).clone() {
            TypeData::Primitive(p) => p.name().to_string(),
            TypeData::Array { element } => {
                format!("Array<{}>", self.display(element, interner))
            }
            TypeData::Function { params, ret } => {
                let params: Vec<String> =
                    params.iter().map(|&p| self.display(p, interner)).collect();
                format!("({}) -> {}", params.join(", "), self.display(ret, interner))
            }
            TypeData::TypeParameter(_) => "type parameter".to_string(),
            TypeData::Instance { args, .. } => {
                let args: Vec<String> = args.iter().map(|&a| self.display(a, interner)).collect();
                format!("<instance of {}>", args.join(", "))
            }
            TypeData::Var(_) => "_".to_string(),
            TypeData::Never => "Never".to_string(),
            TypeData::Error => "<error>".to_string(),
        }
    }
}

impl Default for TypePool {
    fn default() -> Self {
        TypePool::new()
    }
}
