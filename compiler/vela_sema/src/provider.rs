//! External symbol provider interface.
//!
//! The core never parses object files. Hosts hand in implementations of
//! [`SymbolProvider`]; the binder materializes symbols from the returned
//! descriptions on first reference and caches them per assembly.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::{
    FunctionSymbol, Lazy, Primitive, SymbolData, SymbolId, SymbolKind, SymbolStore, TypePool,
    Visibility,
};

/// A provider of external assemblies.
pub trait SymbolProvider: Send + Sync {
    /// Look up an assembly by name and optional public key token.
    fn assembly(
        &self,
        name: &str,
        public_key_token: Option<&[u8]>,
    ) -> Option<Arc<dyn AssemblySymbols>>;
}

/// One external assembly.
pub trait AssemblySymbols: Send + Sync {
    /// Name of the assembly (diagnostics only).
    fn name(&self) -> String;

    /// Look up a type by namespace path and name.
    fn lookup_type(&self, namespace: &[&str], name: &str) -> Option<Arc<dyn TypeSymbols>>;
}

/// One external type.
pub trait TypeSymbols: Send + Sync {
    fn name(&self) -> String;
    fn members(&self) -> Vec<MemberDescription>;
    fn generic_parameters(&self) -> Vec<String>;
    fn is_value_type(&self) -> bool;
    fn visibility(&self) -> Visibility;
}

/// A member of an external type, in provider-neutral form.
pub struct MemberDescription {
    pub name: String,
    pub visibility: Visibility,
    pub kind: MemberDescriptionKind,
}

/// Member shape.
pub enum MemberDescriptionKind {
    Field {
        ty: TypeDescription,
        mutable: bool,
    },
    Property {
        ty: TypeDescription,
        has_setter: bool,
    },
    Function {
        params: Vec<TypeDescription>,
        ret: TypeDescription,
        is_variadic: bool,
    },
}

/// Provider-neutral type reference, converted to pool types on
/// materialization.
#[derive(Clone, Debug)]
pub enum TypeDescription {
    Primitive(Primitive),
    Array(Box<TypeDescription>),
    Unit,
}

impl TypeDescription {
    fn to_type(&self, pool: &mut TypePool) -> crate::TypeId {
        match self {
            TypeDescription::Primitive(p) => pool.primitive(*p),
            TypeDescription::Array(element) => {
                let element = element.to_type(pool);
                pool.array(element)
            }
            TypeDescription::Unit => TypePool::UNIT,
        }
    }
}

/// Cache of materialized external symbols, keyed per assembly and path.
///
/// Metadata symbols are created on first reference; a second reference to
/// the same path observes the cached symbol.
pub struct MetadataCache {
    types: RwLock<FxHashMap<(String, String), SymbolId>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        MetadataCache {
            types: RwLock::new(FxHashMap::default()),
        }
    }

    /// Materialize (or fetch) the symbol for an external type.
    pub fn type_symbol(
        &self,
        assembly: &Arc<dyn AssemblySymbols>,
        path: &[&str],
        name: &str,
        store: &SymbolStore,
        pool: &mut TypePool,
        interner: &vela_syntax::StringInterner,
    ) -> Option<SymbolId> {
        let key = (assembly.name(), format!("{}::{name}", path.join(".")));
        if let Some(&id) = self.types.read().get(&key) {
            return Some(id);
        }

        let ty = assembly.lookup_type(path, name)?;
        let members = materialize_members(&ty, store, pool, interner);
        let symbol = store.alloc(SymbolData {
            name: Some(interner.intern(name)),
            container: None,
            visibility: ty.visibility(),
            kind: SymbolKind::Type {
                ty: TypePool::ERROR,
                members: {
                    let lazy = Lazy::new();
                    lazy.get_or_init(|| members);
                    lazy
                },
            },
        });

        let mut cache = self.types.write();
        // A concurrent materializer may have won; keep its symbol.
        Some(*cache.entry(key).or_insert(symbol))
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        MetadataCache::new()
    }
}

fn materialize_members(
    ty: &Arc<dyn TypeSymbols>,
    store: &SymbolStore,
    pool: &mut TypePool,
    interner: &vela_syntax::StringInterner,
) -> Vec<SymbolId> {
    ty.members()
        .into_iter()
        .map(|member| {
            let name = Some(interner.intern(&member.name));
            let kind = match member.kind {
                MemberDescriptionKind::Field { ty, mutable } => SymbolKind::Field {
                    ty: ty.to_type(pool),
                    mutable,
                },
                MemberDescriptionKind::Property { ty, has_setter } => SymbolKind::Property {
                    ty: ty.to_type(pool),
                    has_setter,
                },
                MemberDescriptionKind::Function {
                    params,
                    ret,
                    is_variadic,
                } => {
                    let param_types: Vec<_> =
                        params.iter().map(|p| p.to_type(pool)).collect();
                    let ret = ret.to_type(pool);
                    let param_symbols: Vec<SymbolId> = param_types
                        .iter()
                        .enumerate()
                        .map(|(i, &ty)| {
                            store.alloc(SymbolData {
                                name: None,
                                container: None,
                                visibility: Visibility::Private,
                                kind: SymbolKind::Parameter {
                                    ty,
                                    is_variadic: is_variadic && i + 1 == param_types.len(),
                                },
                            })
                        })
                        .collect();
                    let fn_ty = pool.function(param_types, ret);
                    SymbolKind::Function(FunctionSymbol {
                        type_params: Vec::new(),
                        params: param_symbols,
                        return_type: ret,
                        ty: fn_ty,
                        is_variadic,
                        body: None,
                        intrinsic: None,
                    })
                }
            };
            store.alloc(SymbolData {
                name,
                container: None,
                visibility: member.visibility,
                kind,
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    //! A tiny in-memory provider used by binder tests.

    use super::*;

    pub struct FakeProvider {
        pub assembly_name: String,
        pub types: Vec<(Vec<String>, String, Vec<MemberDescription>)>,
    }

    struct FakeAssembly {
        name: String,
        types: Vec<(Vec<String>, String, Vec<MemberDescription>)>,
    }

    struct FakeType {
        name: String,
        members: Vec<MemberDescription>,
    }

    impl SymbolProvider for FakeProvider {
        fn assembly(
            &self,
            name: &str,
            _public_key_token: Option<&[u8]>,
        ) -> Option<Arc<dyn AssemblySymbols>> {
            (name == self.assembly_name).then(|| {
                Arc::new(FakeAssembly {
                    name: self.assembly_name.clone(),
                    types: self
                        .types
                        .iter()
                        .map(|(p, n, m)| {
                            (
                                p.clone(),
                                n.clone(),
                                m.iter().map(clone_member).collect::<Vec<_>>(),
                            )
                        })
                        .collect(),
                }) as Arc<dyn AssemblySymbols>
            })
        }
    }

    fn clone_member(m: &MemberDescription) -> MemberDescription {
        MemberDescription {
            name: m.name.clone(),
            visibility: m.visibility,
            kind: match &m.kind {
                MemberDescriptionKind::Field { ty, mutable } => MemberDescriptionKind::Field {
                    ty: ty.clone(),
                    mutable: *mutable,
                },
                MemberDescriptionKind::Property { ty, has_setter } => {
                    MemberDescriptionKind::Property {
                        ty: ty.clone(),
                        has_setter: *has_setter,
                    }
                }
                MemberDescriptionKind::Function {
                    params,
                    ret,
                    is_variadic,
                } => MemberDescriptionKind::Function {
                    params: params.clone(),
                    ret: ret.clone(),
                    is_variadic: *is_variadic,
                },
            },
        }
    }

    impl AssemblySymbols for FakeAssembly {
        fn name(&self) -> String {
            self.name.clone()
        }

        fn lookup_type(&self, namespace: &[&str], name: &str) -> Option<Arc<dyn TypeSymbols>> {
            self.types
                .iter()
                .find(|(path, type_name, _)| {
                    path.iter().map(String::as_str).eq(namespace.iter().copied())
                        && type_name == name
                })
                .map(|(_, type_name, members)| {
                    Arc::new(FakeType {
                        name: type_name.clone(),
                        members: members.iter().map(clone_member).collect(),
                    }) as Arc<dyn TypeSymbols>
                })
        }
    }

    impl TypeSymbols for FakeType {
        fn name(&self) -> String {
            self.name.clone()
        }

        fn members(&self) -> Vec<MemberDescription> {
            self.members.iter().map(clone_member).collect()
        }

        fn generic_parameters(&self) -> Vec<String> {
            Vec::new()
        }

        fn is_value_type(&self) -> bool {
            false
        }

        fn visibility(&self) -> Visibility {
            Visibility::Public
        }
    }
}
