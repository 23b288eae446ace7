//! The subtyping relation and the lub/glb lattice operations.
//!
//! Untyped is deliberately infectious: it is both a subtype and a supertype
//! of everything, and it absorbs in both lattice directions, so one untyped
//! value silences downstream errors instead of cascading them. Unresolved
//! constants behave the same way.
//!
//! Aliases must be dealiased before reaching any comparison here; an alias
//! operand is a fatal internal error, not a `false`.

use tarn_stack::ensure_sufficient_stack;

use crate::constraint::TypeConstraint;
use crate::global_state::GlobalState;
use crate::symbols::{SymbolFlags, SymbolRef, Variance};

use super::{Type, TypePtr};

/// Whether recording into a constraint is allowed for this comparison.
enum Bounds<'a> {
    /// Pure check. Inference variables compare by identity only.
    Check,
    /// Comparisons against inference variables are recorded as bounds and
    /// succeed; the later solve decides whether they were consistent.
    Record(&'a mut TypeConstraint),
}

/// `a <: b` without constraint recording.
pub fn is_subtype(gs: &GlobalState, a: &TypePtr, b: &TypePtr) -> bool {
    ensure_sufficient_stack(|| is_subtype_impl(gs, &mut Bounds::Check, a, b))
}

/// `a <: b`, recording bounds on inference variables into `tc`.
pub fn is_subtype_under(
    gs: &GlobalState,
    tc: &mut TypeConstraint,
    a: &TypePtr,
    b: &TypePtr,
) -> bool {
    ensure_sufficient_stack(|| is_subtype_impl(gs, &mut Bounds::Record(tc), a, b))
}

/// Mutual subtyping.
pub fn equiv(gs: &GlobalState, a: &TypePtr, b: &TypePtr) -> bool {
    is_subtype(gs, a, b) && is_subtype(gs, b, a)
}

fn is_subtype_impl(gs: &GlobalState, bounds: &mut Bounds<'_>, a: &TypePtr, b: &TypePtr) -> bool {
    if a.ptr_eq(b) || a == b {
        return true;
    }
    if a.absorbs_like_untyped() || b.absorbs_like_untyped() {
        return true;
    }
    if a.is_bottom() || b.is_top() {
        return true;
    }

    debug_assert!(
        !matches!(**a, Type::Alias { .. }) && !matches!(**b, Type::Alias { .. }),
        "aliases must be dealiased before subtyping"
    );

    // Inference variables first: their meaning depends on the mode, not on
    // the structure of the other side.
    if matches!(**a, Type::TypeVar { .. }) || matches!(**b, Type::TypeVar { .. }) {
        return type_var_subtype(gs, bounds, a, b);
    }

    // Universal splits: every branch of the left union, and every branch of
    // the right intersection, must hold.
    if let Type::Or { left, right } = &**a {
        return is_subtype_impl(gs, bounds, left, b) && is_subtype_impl(gs, bounds, right, b);
    }
    if let Type::And { left, right } = &**b {
        return is_subtype_impl(gs, bounds, a, left) && is_subtype_impl(gs, bounds, a, right);
    }
    // Existential splits.
    if let Type::And { left, right } = &**a {
        return is_subtype_impl(gs, bounds, left, b) || is_subtype_impl(gs, bounds, right, b);
    }
    if let Type::Or { left, right } = &**b {
        return is_subtype_impl(gs, bounds, a, left) || is_subtype_impl(gs, bounds, a, right);
    }

    // Class type members compare through their bounds.
    if let Type::LambdaParam { upper, .. } = &**a {
        return is_subtype_impl(gs, bounds, upper, b);
    }
    if let Type::LambdaParam { lower, .. } = &**b {
        return is_subtype_impl(gs, bounds, a, lower);
    }

    match (&**a, &**b) {
        (Type::Literal { .. }, Type::Literal { .. }) => false, // unequal, see above
        (Type::Tuple { elems: ea, .. }, Type::Tuple { elems: eb, .. }) => {
            ea.len() == eb.len()
                && ea
                    .iter()
                    .zip(eb)
                    .all(|(x, y)| is_subtype_impl(gs, bounds, x, y))
        }
        (
            Type::Shape {
                keys: ka,
                values: va,
                ..
            },
            Type::Shape {
                keys: kb,
                values: vb,
                ..
            },
        ) => {
            ka.len() == kb.len()
                && kb.iter().zip(vb).all(|(key, value_b)| {
                    ka.iter()
                        .position(|k| k == key)
                        .is_some_and(|i| is_subtype_impl(gs, bounds, &va[i], value_b))
                })
        }
        // A proxy against anything else erases to its underlying view.
        (Type::Literal { underlying, .. }, _) => {
            is_subtype_impl(gs, bounds, &TypePtr::class_of(*underlying), b)
        }
        (Type::Tuple { underlying, .. } | Type::Shape { underlying, .. }, _) => {
            is_subtype_impl(gs, bounds, underlying, b)
        }
        // Nothing non-equal flows into a proxy.
        (_, Type::Literal { .. } | Type::Tuple { .. } | Type::Shape { .. }) => false,

        (Type::Class { sym: sa }, Type::Class { sym: sb }) => sa.derives_from(gs, *sb),
        (Type::Applied { sym: sa, targs: ta }, Type::Applied { sym: sb, targs: tb }) => {
            if sa == sb {
                return applied_args_subtype(gs, bounds, *sa, ta, tb);
            }
            // No ancestor type-argument alignment is modeled; an unrelated
            // instantiation only flows into one that constrains nothing.
            sa.derives_from(gs, *sb) && targs_absorb(tb)
        }
        (Type::Applied { sym: sa, .. }, Type::Class { sym: sb }) => {
            *sa == *sb || sa.derives_from(gs, *sb)
        }
        (Type::Class { sym: sa }, Type::Applied { sym: sb, targs: tb }) => {
            (*sa == *sb || sa.derives_from(gs, *sb)) && targs_absorb(tb)
        }
        (Type::Meta { wrapped: wa }, Type::Meta { wrapped: wb }) => {
            is_subtype_impl(gs, bounds, wa, wb) && is_subtype_impl(gs, bounds, wb, wa)
        }
        // SelfType and SelfTypeParam are nominal; only the equality case
        // at the top of the function relates them.
        _ => false,
    }
}

fn type_var_subtype(gs: &GlobalState, bounds: &mut Bounds<'_>, a: &TypePtr, b: &TypePtr) -> bool {
    match bounds {
        Bounds::Check => false, // distinct variables, see equality fast path
        Bounds::Record(tc) => {
            if tc.is_solved() {
                let expand = |ty: &TypePtr| match &**ty {
                    Type::TypeVar { sym } => tc.instantiation_for(*sym),
                    _ => ty.clone(),
                };
                let ea = expand(a);
                let eb = expand(b);
                return is_subtype_impl(gs, &mut Bounds::Check, &ea, &eb);
            }
            if let Type::TypeVar { sym } = &**a {
                tc.record_upper_bound(gs, *sym, b.clone());
            }
            if let Type::TypeVar { sym } = &**b {
                tc.record_lower_bound(gs, *sym, a.clone());
            }
            true
        }
    }
}

fn applied_args_subtype(
    gs: &GlobalState,
    bounds: &mut Bounds<'_>,
    sym: SymbolRef,
    ta: &[TypePtr],
    tb: &[TypePtr],
) -> bool {
    if ta.len() != tb.len() {
        return false;
    }
    let params: Vec<SymbolRef> = gs
        .symbol(sym)
        .type_params
        .iter()
        .copied()
        .filter(|&param| !gs.symbol(param).flags.contains(SymbolFlags::FIXED))
        .collect();
    debug_assert_eq!(params.len(), ta.len(), "application arity drifted from declaration");
    params.iter().zip(ta.iter().zip(tb)).all(|(&param, (x, y))| {
        match gs.symbol(param).variance() {
            Variance::Covariant => is_subtype_impl(gs, bounds, x, y),
            Variance::Contravariant => is_subtype_impl(gs, bounds, y, x),
            Variance::Invariant => {
                is_subtype_impl(gs, bounds, x, y) && is_subtype_impl(gs, bounds, y, x)
            }
        }
    })
}

/// Type arguments that constrain nothing (each is top or untyped).
fn targs_absorb(targs: &[TypePtr]) -> bool {
    targs
        .iter()
        .all(|targ| targ.is_top() || targ.absorbs_like_untyped())
}

/// Least upper bound.
pub fn any(gs: &GlobalState, a: &TypePtr, b: &TypePtr) -> TypePtr {
    ensure_sufficient_stack(|| lub(gs, a, b))
}

fn lub(gs: &GlobalState, a: &TypePtr, b: &TypePtr) -> TypePtr {
    if a.ptr_eq(b) || a == b {
        return a.clone();
    }
    if a.absorbs_like_untyped() {
        return a.clone();
    }
    if b.absorbs_like_untyped() {
        return b.clone();
    }
    if a.is_bottom() {
        return b.clone();
    }
    if b.is_bottom() {
        return a.clone();
    }
    if a.is_top() || b.is_top() {
        return TypePtr::top();
    }

    // Flatten unions on both sides and merge branch lists with pairwise
    // subsumption, so the result stays in a right-nested normal form and
    // repeated widening cannot grow without bound.
    let mut branches: Vec<TypePtr> = Vec::new();
    collect_or_branches(a, &mut branches);
    let mut incoming: Vec<TypePtr> = Vec::new();
    collect_or_branches(b, &mut incoming);
    for branch in incoming {
        if branches.iter().any(|kept| is_subtype(gs, &branch, kept)) {
            continue;
        }
        branches.retain(|kept| !is_subtype(gs, kept, &branch));
        branches.push(branch);
    }

    let mut iter = branches.into_iter();
    let first = iter.next().unwrap_or_else(TypePtr::bottom);
    iter.fold(first, |acc, branch| {
        TypePtr::new(Type::Or {
            left: acc,
            right: branch,
        })
    })
}

fn collect_or_branches(ty: &TypePtr, out: &mut Vec<TypePtr>) {
    match &**ty {
        Type::Or { left, right } => {
            collect_or_branches(left, out);
            collect_or_branches(right, out);
        }
        _ => out.push(ty.clone()),
    }
}

/// Greatest lower bound.
pub fn all(gs: &GlobalState, a: &TypePtr, b: &TypePtr) -> TypePtr {
    ensure_sufficient_stack(|| glb(gs, a, b))
}

fn glb(gs: &GlobalState, a: &TypePtr, b: &TypePtr) -> TypePtr {
    if a.ptr_eq(b) || a == b {
        return a.clone();
    }
    if a.absorbs_like_untyped() {
        return a.clone();
    }
    if b.absorbs_like_untyped() {
        return b.clone();
    }
    if a.is_top() {
        return b.clone();
    }
    if b.is_top() {
        return a.clone();
    }
    if a.is_bottom() || b.is_bottom() {
        return TypePtr::bottom();
    }

    // Meets distribute over unions.
    if let Type::Or { left, right } = &**a {
        return lub(gs, &glb(gs, left, b), &glb(gs, right, b));
    }
    if let Type::Or { left, right } = &**b {
        return lub(gs, &glb(gs, a, left), &glb(gs, a, right));
    }

    let mut parts: Vec<TypePtr> = Vec::new();
    collect_and_parts(a, &mut parts);
    let mut incoming: Vec<TypePtr> = Vec::new();
    collect_and_parts(b, &mut incoming);
    for part in incoming {
        if parts.iter().any(|kept| is_subtype(gs, kept, &part)) {
            continue;
        }
        if parts.iter().any(|kept| proper_classes_disjoint(gs, kept, &part)) {
            // Single inheritance: two unrelated proper classes share no
            // instances, so the whole meet is empty.
            return TypePtr::bottom();
        }
        parts.retain(|kept| !is_subtype(gs, &part, kept));
        parts.push(part);
    }

    let mut iter = parts.into_iter();
    let first = iter.next().unwrap_or_else(TypePtr::top);
    iter.fold(first, |acc, part| {
        TypePtr::new(Type::And {
            left: acc,
            right: part,
        })
    })
}

fn collect_and_parts(ty: &TypePtr, out: &mut Vec<TypePtr>) {
    match &**ty {
        Type::And { left, right } => {
            collect_and_parts(left, out);
            collect_and_parts(right, out);
        }
        _ => out.push(ty.clone()),
    }
}

fn proper_classes_disjoint(gs: &GlobalState, a: &TypePtr, b: &TypePtr) -> bool {
    let (Type::Class { sym: sa }, Type::Class { sym: sb }) = (&**a, &**b) else {
        return false;
    };
    let proper = |sym: SymbolRef| {
        let data = gs.symbol(sym);
        data.is_class() && !data.flags.contains(SymbolFlags::MODULE)
    };
    proper(*sa)
        && proper(*sb)
        && sa != sb
        && !sa.derives_from(gs, *sb)
        && !sb.derives_from(gs, *sa)
}
