//! Structure-preserving type transformations.
//!
//! Every transformation here follows the same shape: an inner recursion
//! returning `Option<TypePtr>` where `None` means "subtree unchanged". Only
//! changed spines are reallocated; untouched subtrees keep their original
//! allocation, which is what makes instantiating types at every call site
//! affordable.

use crate::constraint::TypeConstraint;
use crate::global_state::GlobalState;
use crate::symbols::SymbolRef;

use super::{Type, TypePtr};

/// Replace class type members (`params`) with the concrete `targs`,
/// positionally.
pub fn instantiate(
    gs: &GlobalState,
    what: &TypePtr,
    params: &[SymbolRef],
    targs: &[TypePtr],
) -> TypePtr {
    assert_eq!(params.len(), targs.len(), "instantiation arity mismatch");
    instantiate_inner(gs, what, params, targs).unwrap_or_else(|| what.clone())
}

fn instantiate_inner(
    gs: &GlobalState,
    what: &TypePtr,
    params: &[SymbolRef],
    targs: &[TypePtr],
) -> Option<TypePtr> {
    match &**what {
        Type::LambdaParam { sym, .. } => params
            .iter()
            .position(|param| param == sym)
            .map(|i| targs[i].clone()),
        _ => map_children(gs, what, &mut |child| {
            instantiate_inner(gs, child, params, targs)
        }),
    }
}

/// Replace the inference variables of a solved constraint with their
/// solutions. An empty constraint is the identity.
pub fn instantiate_under(gs: &GlobalState, what: &TypePtr, tc: &TypeConstraint) -> TypePtr {
    if tc.is_empty() {
        return what.clone();
    }
    instantiate_under_inner(gs, what, tc).unwrap_or_else(|| what.clone())
}

fn instantiate_under_inner(
    gs: &GlobalState,
    what: &TypePtr,
    tc: &TypeConstraint,
) -> Option<TypePtr> {
    match &**what {
        Type::TypeVar { sym } => Some(tc.instantiation_for(*sym)),
        _ => map_children(gs, what, &mut |child| {
            instantiate_under_inner(gs, child, tc)
        }),
    }
}

/// Pessimistic variable elimination for an unsolved constraint: each
/// inference variable becomes its fully defined upper bound if one was
/// recorded, otherwise top. Used to produce printable, comparable types
/// before (or instead of) solving.
pub fn approximate(gs: &GlobalState, what: &TypePtr, tc: &TypeConstraint) -> TypePtr {
    approximate_inner(gs, what, tc).unwrap_or_else(|| what.clone())
}

fn approximate_inner(gs: &GlobalState, what: &TypePtr, tc: &TypeConstraint) -> Option<TypePtr> {
    match &**what {
        Type::TypeVar { sym } => Some(match tc.upper_bound(*sym) {
            Some(bound) if bound.is_fully_defined() => bound.clone(),
            _ => TypePtr::top(),
        }),
        _ => map_children(gs, what, &mut |child| approximate_inner(gs, child, tc)),
    }
}

/// Replace `self` with the receiver's type.
pub fn replace_self_type(gs: &GlobalState, what: &TypePtr, receiver: &TypePtr) -> TypePtr {
    replace_self_type_inner(gs, what, receiver).unwrap_or_else(|| what.clone())
}

fn replace_self_type_inner(
    gs: &GlobalState,
    what: &TypePtr,
    receiver: &TypePtr,
) -> Option<TypePtr> {
    match &**what {
        Type::SelfType => Some(receiver.clone()),
        _ => map_children(gs, what, &mut |child| {
            replace_self_type_inner(gs, child, receiver)
        }),
    }
}

/// Apply `f` to the children of a composite node, rebuilding the node only
/// if some child changed. Leaves (and node kinds the transformations never
/// look inside) report unchanged.
fn map_children(
    gs: &GlobalState,
    what: &TypePtr,
    f: &mut dyn FnMut(&TypePtr) -> Option<TypePtr>,
) -> Option<TypePtr> {
    match &**what {
        Type::Or { left, right } => {
            let new_left = f(left);
            let new_right = f(right);
            if new_left.is_none() && new_right.is_none() {
                return None;
            }
            Some(TypePtr::new(Type::Or {
                left: new_left.unwrap_or_else(|| left.clone()),
                right: new_right.unwrap_or_else(|| right.clone()),
            }))
        }
        Type::And { left, right } => {
            let new_left = f(left);
            let new_right = f(right);
            if new_left.is_none() && new_right.is_none() {
                return None;
            }
            Some(TypePtr::new(Type::And {
                left: new_left.unwrap_or_else(|| left.clone()),
                right: new_right.unwrap_or_else(|| right.clone()),
            }))
        }
        Type::Tuple { elems, .. } => {
            // Rebuilding through the factory recomputes the erased view.
            map_elems(elems, f).map(|elems| TypePtr::tuple(gs, elems))
        }
        Type::Shape { keys, values, .. } => {
            // Keys are literals and never change.
            map_elems(values, f).map(|values| TypePtr::shape(keys.clone(), values))
        }
        Type::Applied { sym, targs } => map_elems(targs, f).map(|targs| {
            TypePtr::new(Type::Applied { sym: *sym, targs })
        }),
        Type::UnresolvedApplied { sym, targs } => map_elems(targs, f).map(|targs| {
            TypePtr::new(Type::UnresolvedApplied { sym: *sym, targs })
        }),
        Type::Meta { wrapped } => f(wrapped).map(|wrapped| TypePtr::new(Type::Meta { wrapped })),
        Type::Class { .. }
        | Type::Literal { .. }
        | Type::TypeVar { .. }
        | Type::LambdaParam { .. }
        | Type::SelfTypeParam { .. }
        | Type::Alias { .. }
        | Type::SelfType
        | Type::UnresolvedClass { .. } => None,
    }
}

/// Map over a slice of children; `None` iff every child was unchanged.
fn map_elems(
    elems: &[TypePtr],
    f: &mut dyn FnMut(&TypePtr) -> Option<TypePtr>,
) -> Option<Vec<TypePtr>> {
    let mut changed: Option<Vec<TypePtr>> = None;
    for (i, elem) in elems.iter().enumerate() {
        match f(elem) {
            Some(new_elem) => {
                changed
                    .get_or_insert_with(|| elems[..i].to_vec())
                    .push(new_elem);
            }
            None => {
                if let Some(out) = changed.as_mut() {
                    out.push(elem.clone());
                }
            }
        }
    }
    changed
}
