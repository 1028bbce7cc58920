//! Intrinsic symbols and well-known types.
//!
//! There is no process-wide state: each compilation builds one
//! [`Intrinsics`] value and threads it through binding, solving, and
//! lowering. It owns the primitive type symbols, the `Array` constructor
//! symbol, and the operator overload sets the solver scores against.

use rustc_hash::FxHashMap;
use vela_syntax::{Name, StringInterner};

use crate::{
    FunctionSymbol, IntrinsicOp, Lazy, Primitive, SymbolData, SymbolId, SymbolKind, SymbolStore,
    TypeId, TypePool, Visibility,
};

/// Intrinsic symbols of one compilation.
pub struct Intrinsics {
    /// Primitive type symbols by name (`int32`, `bool`, …).
    pub primitive_types: FxHashMap<Name, SymbolId>,
    /// The `Array` generic type constructor symbol.
    pub array_type: SymbolId,
    /// Operator overload sets keyed by operator text (`+`, `<`, …).
    pub operators: FxHashMap<Name, Vec<SymbolId>>,
    /// `to_text` conversions used by string interpolation lowering.
    pub to_text: Vec<SymbolId>,
    /// `concat(string, string): string` used by string lowering.
    pub concat: SymbolId,
    /// The `length` property of arrays.
    pub array_length: SymbolId,
}

impl Intrinsics {
    /// Build the intrinsic symbol table into `store` and `pool`.
    pub fn install(store: &SymbolStore, pool: &mut TypePool, interner: &StringInterner) -> Self {
        let mut primitive_types = FxHashMap::default();
        for primitive in Primitive::ALL {
            let name = interner.intern(primitive.name());
            let ty = pool.primitive(primitive);
            let symbol = store.alloc(SymbolData {
                name: Some(name),
                container: None,
                visibility: Visibility::Public,
                kind: SymbolKind::Type {
                    ty,
                    members: Lazy::new(),
                },
            });
            primitive_types.insert(name, symbol);
        }

        let array_type = store.alloc(SymbolData {
            name: Some(interner.intern("Array")),
            container: None,
            visibility: Visibility::Public,
            kind: SymbolKind::Type {
                ty: TypePool::ERROR,
                members: Lazy::new(),
            },
        });

        let mut builder = OperatorBuilder {
            store,
            pool,
            interner,
            operators: FxHashMap::default(),
        };

        const NUMERIC: [TypeId; 3] = [TypePool::INT32, TypePool::INT64, TypePool::FLOAT64];
        const INTEGRAL: [TypeId; 2] = [TypePool::INT32, TypePool::INT64];
        const EQUATABLE: [TypeId; 6] = [
            TypePool::INT32,
            TypePool::INT64,
            TypePool::FLOAT64,
            TypePool::BOOL,
            TypePool::STRING,
            TypePool::CHAR,
        ];

        for (text, op) in [
            ("+", IntrinsicOp::Add),
            ("-", IntrinsicOp::Sub),
            ("*", IntrinsicOp::Mul),
            ("/", IntrinsicOp::Div),
        ] {
            for ty in NUMERIC {
                builder.binary(text, op, ty, ty, ty);
            }
        }
        for (text, op) in [("rem", IntrinsicOp::Rem), ("mod", IntrinsicOp::Mod)] {
            for ty in INTEGRAL {
                builder.binary(text, op, ty, ty, ty);
            }
        }
        for (text, op) in [
            ("<", IntrinsicOp::Less),
            (">", IntrinsicOp::Greater),
            ("<=", IntrinsicOp::LessEqual),
            (">=", IntrinsicOp::GreaterEqual),
        ] {
            for ty in NUMERIC {
                builder.binary(text, op, ty, ty, TypePool::BOOL);
            }
        }
        for (text, op) in [("==", IntrinsicOp::Equal), ("!=", IntrinsicOp::NotEqual)] {
            for ty in EQUATABLE {
                builder.binary(text, op, ty, ty, TypePool::BOOL);
            }
        }
        for ty in NUMERIC {
            builder.unary("-", IntrinsicOp::Negate, ty, ty);
            builder.unary("+", IntrinsicOp::Identity, ty, ty);
        }

        let mut to_text = Vec::new();
        for ty in EQUATABLE {
            to_text.push(builder.function(
                "to_text",
                Some(IntrinsicOp::ToText),
                vec![ty],
                TypePool::STRING,
            ));
        }
        let concat = builder.function(
            "concat",
            Some(IntrinsicOp::Concat),
            vec![TypePool::STRING, TypePool::STRING],
            TypePool::STRING,
        );

        let operators = builder.operators;

        let array_length = store.alloc(SymbolData {
            name: Some(interner.intern("length")),
            container: Some(array_type),
            visibility: Visibility::Public,
            kind: SymbolKind::Property {
                ty: TypePool::INT32,
                has_setter: false,
            },
        });

        Intrinsics {
            primitive_types,
            array_type,
            operators,
            to_text,
            concat,
            array_length,
        }
    }

    /// Overload set for an operator spelled `text`, empty when none.
    pub fn operator_set(&self, text: Name) -> &[SymbolId] {
        self.operators.get(&text).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The `to_text` overload whose parameter equals `ty`.
    pub fn to_text_for(&self, store: &SymbolStore, ty: TypeId) -> Option<SymbolId> {
        self.to_text.iter().copied().find(|&sym| {
            store
                .get(sym)
                .as_function()
                .and_then(|f| f.params.first().copied())
                .map(|p| match &store.get(p).kind {
                    SymbolKind::Parameter { ty: param_ty, .. } => *param_ty == ty,
                    _ => false,
                })
                .unwrap_or(false)
        })
    }
}

struct OperatorBuilder<'a> {
    store: &'a SymbolStore,
    pool: &'a mut TypePool,
    interner: &'a StringInterner,
    operators: FxHashMap<Name, Vec<SymbolId>>,
}

impl OperatorBuilder<'_> {
    fn function(
        &mut self,
        text: &str,
        intrinsic: Option<IntrinsicOp>,
        param_types: Vec<TypeId>,
        ret: TypeId,
    ) -> SymbolId {
        let params: Vec<SymbolId> = param_types
            .iter()
            .map(|&ty| {
                self.store.alloc(SymbolData {
                    name: None,
                    container: None,
                    visibility: Visibility::Private,
                    kind: SymbolKind::Parameter {
                        ty,
                        is_variadic: false,
                    },
                })
            })
            .collect();
        let ty = self.pool.function(param_types, ret);
        self.store.alloc(SymbolData {
            name: Some(self.interner.intern(text)),
            container: None,
            visibility: Visibility::Public,
            kind: SymbolKind::Function(FunctionSymbol {
                type_params: Vec::new(),
                params,
                return_type: ret,
                ty,
                is_variadic: false,
                body: None,
                intrinsic,
            }),
        })
    }

    fn binary(&mut self, text: &str, op: IntrinsicOp, left: TypeId, right: TypeId, ret: TypeId) {
        let symbol = self.function(text, Some(op), vec![left, right], ret);
        let name = self.interner.intern(text);
        self.operators.entry(name).or_default().push(symbol);
    }

    fn unary(&mut self, text: &str, op: IntrinsicOp, operand: TypeId, ret: TypeId) {
        let symbol = self.function(&format!("unary{text}"), Some(op), vec![operand], ret);
        let name = self.interner.intern(&format!("unary{text}"));
        self.operators.entry(name).or_default().push(symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_sets_follow_declaration_order() {
        let store = SymbolStore::new();
        let mut pool = TypePool::new();
        let interner = StringInterner::new();
        let intrinsics = Intrinsics::install(&store, &mut pool, &interner);

        let plus = intrinsics.operator_set(interner.intern("+"));
        assert_eq!(plus.len(), 3);
        // Declaration order: int32, int64, float64.
        let first = store.get(plus[0]);
        let f = first.as_function().unwrap();
        assert_eq!(f.return_type, TypePool::INT32);
    }

    #[test]
    fn test_to_text_lookup() {
        let store = SymbolStore::new();
        let mut pool = TypePool::new();
        let interner = StringInterner::new();
        let intrinsics = Intrinsics::install(&store, &mut pool, &interner);

        let for_int = intrinsics.to_text_for(&store, TypePool::INT32);
        assert!(for_int.is_some());
        let for_unit = intrinsics.to_text_for(&store, TypePool::UNIT);
        assert!(for_unit.is_none());
    }

    #[test]
    fn test_mod_and_rem_are_integral_only() {
        let store = SymbolStore::new();
        let mut pool = TypePool::new();
        let interner = StringInterner::new();
        let intrinsics = Intrinsics::install(&store, &mut pool, &interner);

        assert_eq!(intrinsics.operator_set(interner.intern("mod")).len(), 2);
        assert_eq!(intrinsics.operator_set(interner.intern("rem")).len(), 2);
    }
}
