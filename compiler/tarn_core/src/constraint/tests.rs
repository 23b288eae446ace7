use pretty_assertions::assert_eq;
use tarn_source::Loc;

use super::*;
use crate::symbols::Variance;
use crate::types::{instantiate_under, is_subtype_under, Type, TypePtr};
use crate::SymbolRef;

fn method_with_type_arg(gs: &mut GlobalState, variance: Variance) -> (SymbolRef, SymbolRef) {
    let name = gs.names.enter_utf8("generic_method");
    let method = gs.enter_method_symbol(Loc::NONE, SymbolRef::OBJECT, name);
    let t = gs.names.enter_utf8("T");
    let t = gs.enter_type_argument(Loc::NONE, method, t, variance);
    (method, t)
}

fn var(gs: &GlobalState, sym: SymbolRef) -> TypePtr {
    gs.symbol(sym)
        .result_type
        .clone()
        .unwrap_or_else(|| TypePtr::new(Type::TypeVar { sym }))
}

fn integer() -> TypePtr {
    TypePtr::class_of(SymbolRef::INTEGER)
}

fn string() -> TypePtr {
    TypePtr::class_of(SymbolRef::STRING)
}

fn object() -> TypePtr {
    TypePtr::class_of(SymbolRef::OBJECT)
}

#[test]
fn covariant_variable_with_no_evidence_solves_to_bottom() {
    let mut gs = GlobalState::new();
    let (_, t) = method_with_type_arg(&mut gs, Variance::Covariant);
    let mut tc = TypeConstraint::new();
    tc.define_domain(&gs, &[t]);
    assert!(tc.solve(&gs));
    assert!(tc.instantiation_for(t).is_bottom());
}

#[test]
fn invariant_variable_with_no_evidence_solves_to_top() {
    let mut gs = GlobalState::new();
    let (_, t) = method_with_type_arg(&mut gs, Variance::Invariant);
    let mut tc = TypeConstraint::new();
    tc.define_domain(&gs, &[t]);
    assert!(tc.solve(&gs));
    assert!(tc.instantiation_for(t).is_top());
}

#[test]
fn lower_bounds_join_into_the_solution() {
    let mut gs = GlobalState::new();
    let (_, t) = method_with_type_arg(&mut gs, Variance::Covariant);
    let mut tc = TypeConstraint::new();
    tc.define_domain(&gs, &[t]);
    tc.record_lower_bound(&gs, t, integer());
    tc.record_lower_bound(&gs, t, string());
    assert!(tc.solve(&gs));

    let solution = tc.instantiation_for(t);
    assert!(crate::types::is_subtype(&gs, &integer(), &solution));
    assert!(crate::types::is_subtype(&gs, &string(), &solution));
}

#[test]
fn invariant_variable_adopts_lower_bound_evidence() {
    let mut gs = GlobalState::new();
    let (_, t) = method_with_type_arg(&mut gs, Variance::Invariant);
    let typevar = var(&gs, t);
    let mut tc = TypeConstraint::new();
    tc.define_domain(&gs, &[t]);

    // Argument flow is the only evidence; the seeded top upper bound must
    // not win over it.
    assert!(is_subtype_under(&gs, &mut tc, &integer(), &typevar));
    assert!(tc.solve(&gs));
    assert_eq!(tc.instantiation_for(t), integer());
}

#[test]
fn satisfied_queries_read_bounds_without_recording() {
    let mut gs = GlobalState::new();
    let (_, t) = method_with_type_arg(&mut gs, Variance::Invariant);
    let typevar = var(&gs, t);
    let mut tc = TypeConstraint::new();
    tc.define_domain(&gs, &[t]);

    // The seeded top upper bound admits anything on the right; an
    // unbounded left variable reaches only a top-like right side.
    assert!(tc.is_already_satisfied(&gs, &integer(), &typevar));
    assert!(tc.is_already_satisfied(&gs, &typevar, &TypePtr::top()));
    assert!(!tc.is_already_satisfied(&gs, &typevar, &integer()));

    tc.record_lower_bound(&gs, t, integer());
    assert!(tc.is_already_satisfied(&gs, &typevar, &object()));
    assert!(!tc.is_already_satisfied(&gs, &typevar, &string()));

    tc.record_upper_bound(&gs, t, string());
    assert!(tc.is_already_satisfied(&gs, &string(), &typevar));
    assert!(!tc.is_already_satisfied(&gs, &integer(), &typevar));

    // Plain types bypass the bounds entirely.
    assert!(tc.is_already_satisfied(&gs, &integer(), &object()));
    assert!(!tc.is_already_satisfied(&gs, &object(), &integer()));
}

#[test]
fn conflicting_bounds_are_unsolvable_and_cached() {
    let mut gs = GlobalState::new();
    let (_, t) = method_with_type_arg(&mut gs, Variance::Covariant);
    let mut tc = TypeConstraint::new();
    tc.define_domain(&gs, &[t]);
    tc.record_lower_bound(&gs, t, integer());
    tc.record_upper_bound(&gs, t, string());

    assert!(!tc.solve(&gs));
    assert!(tc.is_unsolvable());
    assert!(!tc.is_solved());
    // The failure is cached; repeat calls short-circuit.
    assert!(!tc.solve(&gs));
}

#[test]
fn solving_is_idempotent() {
    let mut gs = GlobalState::new();
    let (_, t) = method_with_type_arg(&mut gs, Variance::Covariant);
    let mut tc = TypeConstraint::new();
    tc.define_domain(&gs, &[t]);
    tc.record_lower_bound(&gs, t, integer());
    assert!(tc.solve(&gs));
    assert!(tc.solve(&gs));
    assert_eq!(tc.instantiation_for(t), integer());
}

#[test]
#[should_panic(expected = "unsolved constraint")]
fn instantiation_requires_a_solved_constraint() {
    let mut gs = GlobalState::new();
    let (_, t) = method_with_type_arg(&mut gs, Variance::Covariant);
    let mut tc = TypeConstraint::new();
    tc.define_domain(&gs, &[t]);
    let _ = tc.instantiation_for(t);
}

#[test]
#[should_panic(expected = "recorded after solving")]
fn solved_constraints_reject_new_bounds() {
    let mut gs = GlobalState::new();
    let (_, t) = method_with_type_arg(&mut gs, Variance::Covariant);
    let mut tc = TypeConstraint::new();
    tc.define_domain(&gs, &[t]);
    assert!(tc.solve(&gs));
    tc.record_lower_bound(&gs, t, integer());
}

#[test]
fn subtype_checks_record_bounds_on_variables() {
    let mut gs = GlobalState::new();
    let (_, t) = method_with_type_arg(&mut gs, Variance::Covariant);
    let typevar = var(&gs, t);

    let mut tc = TypeConstraint::new();
    tc.define_domain(&gs, &[t]);
    // Argument flowing into the parameter: Integer <: T.
    assert!(is_subtype_under(&gs, &mut tc, &integer(), &typevar));
    assert!(tc.solve(&gs));
    assert_eq!(tc.instantiation_for(t), integer());

    // Instantiating the declared return type through the solved constraint.
    let ret = TypePtr::new(Type::Or {
        left: typevar,
        right: TypePtr::nil(),
    });
    let out = instantiate_under(&gs, &ret, &tc);
    assert_eq!(
        out,
        TypePtr::new(Type::Or {
            left: integer(),
            right: TypePtr::nil(),
        })
    );
}

#[test]
fn without_recording_variables_compare_by_identity_only() {
    let mut gs = GlobalState::new();
    let (_, t) = method_with_type_arg(&mut gs, Variance::Covariant);
    let typevar = var(&gs, t);
    assert!(crate::types::is_subtype(&gs, &typevar, &typevar));
    assert!(!crate::types::is_subtype(&gs, &integer(), &typevar));
    assert!(!crate::types::is_subtype(&gs, &typevar, &integer()));
}

#[test]
fn empty_constraint_is_the_identity_instantiation() {
    let gs = GlobalState::new();
    let tc = TypeConstraint::new();
    assert!(tc.is_empty());
    let ty = integer();
    assert!(instantiate_under(&gs, &ty, &tc).ptr_eq(&ty));
}

#[test]
fn open_constraints_fork_for_speculation() {
    let mut gs = GlobalState::new();
    let (_, t) = method_with_type_arg(&mut gs, Variance::Covariant);
    let mut tc = TypeConstraint::new();
    tc.define_domain(&gs, &[t]);
    tc.record_lower_bound(&gs, t, integer());

    let mut speculative = tc.deep_copy();
    speculative.record_lower_bound(&gs, t, string());
    assert!(speculative.solve(&gs));
    assert!(tc.solve(&gs));
    assert_eq!(tc.instantiation_for(t), integer());
    assert_eq!(tc.domain(), vec![t]);
}

#[test]
#[should_panic(expected = "must not fork")]
fn solved_constraints_do_not_fork() {
    let mut gs = GlobalState::new();
    let (_, t) = method_with_type_arg(&mut gs, Variance::Covariant);
    let mut tc = TypeConstraint::new();
    tc.define_domain(&gs, &[t]);
    assert!(tc.solve(&gs));
    let _ = tc.deep_copy();
}
