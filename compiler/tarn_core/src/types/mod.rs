//! Immutable type trees over symbol handles.
//!
//! A [`TypePtr`] is a shared, immutable pointer to one node of a type tree.
//! Nodes are never mutated in place; every transformation builds new nodes
//! bottom-up and reuses unchanged subtrees, so trees minted by one snapshot
//! are freely shared by all snapshots descended from it (symbol handles
//! survive forks unchanged).

use std::sync::Arc;

use tarn_source::NameRef;

use crate::global_state::GlobalState;
use crate::symbols::SymbolRef;

mod subtyping;
mod typemaps;

#[cfg(test)]
mod tests;

pub use subtyping::{all, any, equiv, is_subtype, is_subtype_under};
pub use typemaps::{approximate, instantiate, instantiate_under, replace_self_type};

/// Payload of a literal singleton type.
///
/// Floats are stored as raw bits so the node is `Eq` and `Hash`; NaN
/// literals compare by representation, which is what interning wants.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LiteralValue {
    Integer(i64),
    Float(u64),
    String(NameRef),
    Symbol(NameRef),
}

impl LiteralValue {
    pub fn float(value: f64) -> LiteralValue {
        LiteralValue::Float(value.to_bits())
    }

    pub fn as_float(self) -> Option<f64> {
        match self {
            LiteralValue::Float(bits) => Some(f64::from_bits(bits)),
            _ => None,
        }
    }
}

/// One node of a type tree.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Type {
    /// A class or module instance type.
    Class { sym: SymbolRef },
    /// Untagged union. Built through [`any`], which normalizes; the raw
    /// constructor is for shapes the lattice has already decided on.
    Or { left: TypePtr, right: TypePtr },
    /// Intersection. Built through [`all`].
    And { left: TypePtr, right: TypePtr },
    /// A singleton literal, a subtype of its underlying class.
    Literal {
        underlying: SymbolRef,
        value: LiteralValue,
    },
    /// Fixed-arity heterogeneous array; a subtype of `underlying`.
    Tuple { elems: Vec<TypePtr>, underlying: TypePtr },
    /// Keyed record with literal keys; a subtype of `underlying`.
    Shape {
        keys: Vec<TypePtr>,
        values: Vec<TypePtr>,
        underlying: TypePtr,
    },
    /// A generic class applied to type arguments, one per non-fixed type
    /// member of `sym`, in declaration order.
    Applied { sym: SymbolRef, targs: Vec<TypePtr> },
    /// An unsolved inference variable owned by a constraint; `sym` is the
    /// method type argument it stands for.
    TypeVar { sym: SymbolRef },
    /// A class type member as seen inside its own class body.
    LambdaParam {
        sym: SymbolRef,
        lower: TypePtr,
        upper: TypePtr,
    },
    /// A method type argument as seen inside the declaring method.
    SelfTypeParam { sym: SymbolRef },
    /// Indirection through a static-field type alias; never an operand of
    /// the lattice, dealiased before comparison.
    Alias { sym: SymbolRef },
    /// The receiver's type, replaced at call sites.
    SelfType,
    /// The type of a type: what a class-object expression evaluates to.
    Meta { wrapped: TypePtr },
    /// A constant that did not resolve; absorbs like untyped so one
    /// resolution error does not cascade.
    UnresolvedClass {
        scope: SymbolRef,
        names: Vec<NameRef>,
    },
    /// A generic application whose class failed to resolve.
    UnresolvedApplied { sym: SymbolRef, targs: Vec<TypePtr> },
}

impl Type {
    /// Variant tag, for logs and internal-error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Type::Class { .. } => "ClassType",
            Type::Or { .. } => "OrType",
            Type::And { .. } => "AndType",
            Type::Literal { .. } => "LiteralType",
            Type::Tuple { .. } => "TupleType",
            Type::Shape { .. } => "ShapeType",
            Type::Applied { .. } => "AppliedType",
            Type::TypeVar { .. } => "TypeVar",
            Type::LambdaParam { .. } => "LambdaParam",
            Type::SelfTypeParam { .. } => "SelfTypeParam",
            Type::Alias { .. } => "AliasType",
            Type::SelfType => "SelfType",
            Type::Meta { .. } => "MetaType",
            Type::UnresolvedClass { .. } => "UnresolvedClassType",
            Type::UnresolvedApplied { .. } => "UnresolvedAppliedType",
        }
    }
}

/// Shared immutable pointer to a type tree node.
///
/// Equality and hashing are structural (delegated to [`Type`]);
/// [`TypePtr::ptr_eq`] is the identity check transformations use to detect
/// "nothing changed, reuse the input".
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct TypePtr(Arc<Type>);

impl std::ops::Deref for TypePtr {
    type Target = Type;

    fn deref(&self) -> &Type {
        &self.0
    }
}

impl AsRef<Type> for TypePtr {
    fn as_ref(&self) -> &Type {
        &self.0
    }
}

impl TypePtr {
    pub fn new(ty: Type) -> TypePtr {
        TypePtr(Arc::new(ty))
    }

    /// Same allocation, not just structurally equal.
    pub fn ptr_eq(&self, other: &TypePtr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn class_of(sym: SymbolRef) -> TypePtr {
        debug_assert!(sym.exists(), "class type over the absent symbol");
        TypePtr::new(Type::Class { sym })
    }

    pub fn top() -> TypePtr {
        TypePtr::class_of(SymbolRef::TOP)
    }

    pub fn bottom() -> TypePtr {
        TypePtr::class_of(SymbolRef::BOTTOM)
    }

    pub fn untyped() -> TypePtr {
        TypePtr::class_of(SymbolRef::UNTYPED)
    }

    pub fn nil() -> TypePtr {
        TypePtr::class_of(SymbolRef::NIL)
    }

    /// `True | False`.
    pub fn boolean() -> TypePtr {
        TypePtr::new(Type::Or {
            left: TypePtr::class_of(SymbolRef::TRUE),
            right: TypePtr::class_of(SymbolRef::FALSE),
        })
    }

    /// Nullable wrapper: `ty | Nil`.
    pub fn nilable(gs: &GlobalState, ty: &TypePtr) -> TypePtr {
        any(gs, ty, &TypePtr::nil())
    }

    /// A tuple; the underlying erased view is `Array[lub of elements]`.
    pub fn tuple(gs: &GlobalState, elems: Vec<TypePtr>) -> TypePtr {
        let element = elems
            .iter()
            .fold(TypePtr::bottom(), |acc, elem| any(gs, &acc, elem));
        let underlying = TypePtr::new(Type::Applied {
            sym: SymbolRef::ARRAY,
            targs: vec![element],
        });
        TypePtr::new(Type::Tuple { elems, underlying })
    }

    /// A shape; keys must be literal types. The erased view stays fully
    /// untyped on both key and value, matching how shapes are checked.
    pub fn shape(keys: Vec<TypePtr>, values: Vec<TypePtr>) -> TypePtr {
        assert_eq!(keys.len(), values.len(), "shape key/value arity mismatch");
        debug_assert!(
            keys.iter().all(|key| matches!(**key, Type::Literal { .. })),
            "shape keys must be literal types"
        );
        let underlying = TypePtr::new(Type::Applied {
            sym: SymbolRef::HASH,
            targs: vec![TypePtr::untyped(), TypePtr::untyped()],
        });
        TypePtr::new(Type::Shape {
            keys,
            values,
            underlying,
        })
    }

    pub fn literal(underlying: SymbolRef, value: LiteralValue) -> TypePtr {
        TypePtr::new(Type::Literal { underlying, value })
    }

    pub fn is_top(&self) -> bool {
        matches!(**self, Type::Class { sym } if sym == SymbolRef::TOP)
    }

    pub fn is_bottom(&self) -> bool {
        matches!(**self, Type::Class { sym } if sym == SymbolRef::BOTTOM)
    }

    pub fn is_untyped(&self) -> bool {
        matches!(**self, Type::Class { sym } if sym == SymbolRef::UNTYPED)
    }

    pub fn is_nil(&self) -> bool {
        matches!(**self, Type::Class { sym } if sym == SymbolRef::NIL)
    }

    /// Fully defined types mention no type parameters or `self`; only such
    /// types may become constraint solutions directly.
    pub fn is_fully_defined(&self) -> bool {
        match &**self {
            Type::Class { .. } | Type::Literal { .. } | Type::Alias { .. } => true,
            Type::TypeVar { .. }
            | Type::LambdaParam { .. }
            | Type::SelfTypeParam { .. }
            | Type::SelfType => false,
            Type::Or { left, right } | Type::And { left, right } => {
                left.is_fully_defined() && right.is_fully_defined()
            }
            Type::Tuple { elems, .. } => elems.iter().all(TypePtr::is_fully_defined),
            Type::Shape { keys, values, .. } => {
                keys.iter().all(TypePtr::is_fully_defined)
                    && values.iter().all(TypePtr::is_fully_defined)
            }
            Type::Applied { targs, .. } | Type::UnresolvedApplied { targs, .. } => {
                targs.iter().all(TypePtr::is_fully_defined)
            }
            Type::Meta { wrapped } => wrapped.is_fully_defined(),
            Type::UnresolvedClass { .. } => true,
        }
    }

    /// Whether untyped occurs anywhere in the tree. Unresolved constants
    /// count; they behave as untyped throughout the lattice.
    pub fn has_untyped(&self) -> bool {
        match &**self {
            Type::Class { sym } => *sym == SymbolRef::UNTYPED,
            Type::UnresolvedClass { .. } => true,
            Type::Literal { .. }
            | Type::TypeVar { .. }
            | Type::SelfTypeParam { .. }
            | Type::Alias { .. }
            | Type::SelfType => false,
            Type::Or { left, right } | Type::And { left, right } => {
                left.has_untyped() || right.has_untyped()
            }
            Type::Tuple { elems, .. } => elems.iter().any(TypePtr::has_untyped),
            Type::Shape { keys, values, .. } => {
                keys.iter().any(TypePtr::has_untyped) || values.iter().any(TypePtr::has_untyped)
            }
            Type::Applied { targs, .. } | Type::UnresolvedApplied { targs, .. } => {
                targs.iter().any(TypePtr::has_untyped)
            }
            Type::LambdaParam { lower, upper, .. } => lower.has_untyped() || upper.has_untyped(),
            Type::Meta { wrapped } => wrapped.has_untyped(),
        }
    }

    /// Unresolved constants poison comparisons the way untyped does.
    pub(crate) fn absorbs_like_untyped(&self) -> bool {
        self.is_untyped()
            || matches!(
                **self,
                Type::UnresolvedClass { .. } | Type::UnresolvedApplied { .. }
            )
    }

    /// The class symbol the tree erases to, dropping proxy wrappers.
    pub fn underlying_class(&self, gs: &GlobalState) -> SymbolRef {
        match &**self {
            Type::Class { sym } => *sym,
            Type::Literal { underlying, .. } => *underlying,
            Type::Tuple { underlying, .. } | Type::Shape { underlying, .. } => {
                underlying.underlying_class(gs)
            }
            Type::Applied { sym, .. } => *sym,
            Type::TypeVar { .. }
            | Type::Or { .. }
            | Type::And { .. }
            | Type::LambdaParam { .. }
            | Type::SelfTypeParam { .. }
            | Type::Alias { .. }
            | Type::SelfType
            | Type::Meta { .. }
            | Type::UnresolvedClass { .. }
            | Type::UnresolvedApplied { .. } => SymbolRef::ABSENT,
        }
    }

    /// Drop a literal wrapper to its underlying class type; other trees are
    /// returned as-is.
    pub fn drop_literal(&self) -> TypePtr {
        match &**self {
            Type::Literal { underlying, .. } => TypePtr::class_of(*underlying),
            _ => self.clone(),
        }
    }

    /// Whether every inhabitant of this tree is an instance of `klass`.
    pub fn derives_from(&self, gs: &GlobalState, klass: SymbolRef) -> bool {
        match &**self {
            Type::Class { sym } => *sym == klass || sym.derives_from(gs, klass),
            Type::Literal { underlying, .. } => {
                *underlying == klass || underlying.derives_from(gs, klass)
            }
            Type::Tuple { underlying, .. } | Type::Shape { underlying, .. } => {
                underlying.derives_from(gs, klass)
            }
            Type::Applied { sym, .. } => *sym == klass || sym.derives_from(gs, klass),
            Type::Or { left, right } => {
                left.derives_from(gs, klass) && right.derives_from(gs, klass)
            }
            Type::And { left, right } => {
                left.derives_from(gs, klass) || right.derives_from(gs, klass)
            }
            _ => false,
        }
    }

    /// User-facing rendering.
    pub fn show(&self, gs: &GlobalState) -> String {
        match &**self {
            Type::Class { sym } => sym.show(gs),
            Type::Or { left, right } => format!("({} | {})", left.show(gs), right.show(gs)),
            Type::And { left, right } => format!("({} & {})", left.show(gs), right.show(gs)),
            Type::Literal { underlying, value } => {
                let rendered = match value {
                    LiteralValue::Integer(n) => n.to_string(),
                    LiteralValue::Float(bits) => f64::from_bits(*bits).to_string(),
                    LiteralValue::String(name) => format!("{:?}", gs.names.raw_text(*name)),
                    LiteralValue::Symbol(name) => format!(":{}", gs.names.raw_text(*name)),
                };
                format!("{}({})", underlying.show(gs), rendered)
            }
            Type::Tuple { elems, .. } => {
                let elems: Vec<String> = elems.iter().map(|elem| elem.show(gs)).collect();
                format!("[{}]", elems.join(", "))
            }
            Type::Shape { keys, values, .. } => {
                let pairs: Vec<String> = keys
                    .iter()
                    .zip(values)
                    .map(|(key, value)| format!("{} => {}", key.show(gs), value.show(gs)))
                    .collect();
                format!("{{{}}}", pairs.join(", "))
            }
            Type::Applied { sym, targs } | Type::UnresolvedApplied { sym, targs } => {
                let targs: Vec<String> = targs.iter().map(|targ| targ.show(gs)).collect();
                format!("{}[{}]", sym.show(gs), targs.join(", "))
            }
            Type::TypeVar { sym } => format!("typevar({})", sym.show(gs)),
            Type::LambdaParam { sym, .. } | Type::SelfTypeParam { sym } => sym.show(gs),
            Type::Alias { sym } => format!("alias({})", sym.show(gs)),
            Type::SelfType => "self".to_owned(),
            Type::Meta { wrapped } => format!("<Type: {}>", wrapped.show(gs)),
            Type::UnresolvedClass { scope, names } => {
                let mut path = scope.show(gs);
                for name in names {
                    path.push_str("::");
                    path.push_str(&gs.names.show(*name));
                }
                format!("<unresolved {path}>")
            }
        }
    }
}
