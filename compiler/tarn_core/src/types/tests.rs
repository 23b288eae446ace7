use pretty_assertions::assert_eq;
use tarn_source::Loc;

use super::*;
use crate::symbols::{SymbolRef, Variance};

fn class(gs: &mut GlobalState, name: &str) -> SymbolRef {
    let name = gs.names.enter_constant_utf8(name);
    gs.enter_class_symbol(Loc::NONE, SymbolRef::ROOT, name)
}

fn generic(gs: &mut GlobalState, name: &str, variance: Variance) -> SymbolRef {
    let sym = class(gs, name);
    let param = gs.names.enter_utf8("Elem");
    let _ = gs.enter_type_member(Loc::NONE, sym, param, variance);
    sym
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
fn class_subtyping_follows_the_hierarchy() {
    let gs = GlobalState::new();
    assert!(is_subtype(&gs, &integer(), &object()));
    assert!(!is_subtype(&gs, &object(), &integer()));
    assert!(!is_subtype(&gs, &integer(), &string()));
    assert!(is_subtype(&gs, &integer(), &integer()));
}

#[test]
fn top_bottom_and_untyped_relate_to_everything() {
    let gs = GlobalState::new();
    assert!(is_subtype(&gs, &TypePtr::bottom(), &integer()));
    assert!(is_subtype(&gs, &integer(), &TypePtr::top()));
    assert!(is_subtype(&gs, &TypePtr::untyped(), &integer()));
    assert!(is_subtype(&gs, &integer(), &TypePtr::untyped()));
    assert!(!is_subtype(&gs, &TypePtr::top(), &integer()));
    assert!(!is_subtype(&gs, &integer(), &TypePtr::bottom()));
}

#[test]
fn union_and_intersection_subtyping() {
    let gs = GlobalState::new();
    let int_or_str = any(&gs, &integer(), &string());
    assert!(is_subtype(&gs, &integer(), &int_or_str));
    assert!(is_subtype(&gs, &int_or_str, &object()));
    assert!(!is_subtype(&gs, &int_or_str, &integer()));

    let meet = TypePtr::new(Type::And {
        left: integer(),
        right: object(),
    });
    assert!(is_subtype(&gs, &meet, &integer()));
    assert!(is_subtype(&gs, &meet, &object()));
}

#[test]
fn lub_collapses_subsumed_branches() {
    let gs = GlobalState::new();
    assert_eq!(any(&gs, &integer(), &object()), object());
    assert_eq!(any(&gs, &object(), &integer()), object());
    assert_eq!(any(&gs, &integer(), &TypePtr::bottom()), integer());
    assert!(any(&gs, &integer(), &TypePtr::top()).is_top());

    let union = any(&gs, &integer(), &string());
    assert!(matches!(*union, Type::Or { .. }));
    // Re-joining an already-covered branch is a no-op.
    assert_eq!(any(&gs, &union, &integer()), union);
}

#[test]
fn untyped_absorbs_in_both_lattice_directions() {
    let gs = GlobalState::new();
    assert!(any(&gs, &TypePtr::untyped(), &integer()).is_untyped());
    assert!(any(&gs, &integer(), &TypePtr::untyped()).is_untyped());
    assert!(all(&gs, &TypePtr::untyped(), &integer()).is_untyped());
    assert!(all(&gs, &integer(), &TypePtr::untyped()).is_untyped());
}

#[test]
fn glb_of_unrelated_proper_classes_is_bottom() {
    let gs = GlobalState::new();
    assert!(all(&gs, &integer(), &string()).is_bottom());
    assert_eq!(all(&gs, &integer(), &object()), integer());
    assert_eq!(all(&gs, &integer(), &TypePtr::top()), integer());
}

#[test]
fn glb_with_a_module_stays_an_intersection() {
    let mut gs = GlobalState::new();
    let name = gs.names.enter_constant_utf8("Comparable");
    let comparable = gs.enter_module_symbol(Loc::NONE, SymbolRef::ROOT, name);
    let met = all(&gs, &integer(), &TypePtr::class_of(comparable));
    assert!(matches!(*met, Type::And { .. }));
}

#[test]
fn glb_distributes_over_unions() {
    let gs = GlobalState::new();
    let int_or_str = any(&gs, &integer(), &string());
    assert_eq!(all(&gs, &int_or_str, &integer()), integer());
}

#[test]
fn literal_types_sit_below_their_class() {
    let gs = GlobalState::new();
    let forty_two = TypePtr::literal(SymbolRef::INTEGER, LiteralValue::Integer(42));
    let other = TypePtr::literal(SymbolRef::INTEGER, LiteralValue::Integer(7));
    assert!(is_subtype(&gs, &forty_two, &integer()));
    assert!(!is_subtype(&gs, &forty_two, &string()));
    assert!(!is_subtype(&gs, &integer(), &forty_two));
    assert!(!is_subtype(&gs, &forty_two, &other));
    assert_eq!(forty_two.drop_literal(), integer());
}

#[test]
fn tuples_are_covariant_and_erase_to_arrays() {
    let gs = GlobalState::new();
    let narrow = TypePtr::tuple(&gs, vec![integer(), string()]);
    let wide = TypePtr::tuple(&gs, vec![object(), object()]);
    let short = TypePtr::tuple(&gs, vec![integer()]);
    assert!(is_subtype(&gs, &narrow, &wide));
    assert!(!is_subtype(&gs, &wide, &narrow));
    assert!(!is_subtype(&gs, &narrow, &short));
    assert!(is_subtype(&gs, &narrow, &TypePtr::class_of(SymbolRef::ARRAY)));
}

#[test]
fn shapes_compare_by_key_set_and_value_types() {
    let mut gs = GlobalState::new();
    let key = |gs: &mut GlobalState, s: &str| {
        let name = gs.names.enter_utf8(s);
        TypePtr::literal(SymbolRef::SYMBOL, LiteralValue::Symbol(name))
    };
    let k_id = key(&mut gs, "id");
    let k_name = key(&mut gs, "name");

    let narrow = TypePtr::shape(vec![k_id.clone(), k_name.clone()], vec![integer(), string()]);
    let wide = TypePtr::shape(vec![k_id.clone(), k_name.clone()], vec![object(), object()]);
    let reordered = TypePtr::shape(vec![k_name, k_id.clone()], vec![string(), object()]);
    let missing = TypePtr::shape(vec![k_id], vec![integer()]);

    assert!(is_subtype(&gs, &narrow, &wide));
    assert!(is_subtype(&gs, &narrow, &reordered));
    assert!(!is_subtype(&gs, &wide, &narrow));
    assert!(!is_subtype(&gs, &narrow, &missing));
    assert!(is_subtype(&gs, &narrow, &TypePtr::class_of(SymbolRef::HASH)));
}

#[test]
fn applied_types_respect_declared_variance() {
    let mut gs = GlobalState::new();
    let co = generic(&mut gs, "Producer", Variance::Covariant);
    let contra = generic(&mut gs, "Consumer", Variance::Contravariant);
    let inv = generic(&mut gs, "Cell", Variance::Invariant);

    let app = |sym, arg: TypePtr| TypePtr::new(Type::Applied { sym, targs: vec![arg] });

    assert!(is_subtype(&gs, &app(co, integer()), &app(co, object())));
    assert!(!is_subtype(&gs, &app(co, object()), &app(co, integer())));

    assert!(is_subtype(&gs, &app(contra, object()), &app(contra, integer())));
    assert!(!is_subtype(&gs, &app(contra, integer()), &app(contra, object())));

    assert!(is_subtype(&gs, &app(inv, integer()), &app(inv, integer())));
    assert!(!is_subtype(&gs, &app(inv, integer()), &app(inv, object())));
}

#[test]
fn unresolved_constants_absorb_like_untyped() {
    let mut gs = GlobalState::new();
    let missing = gs.names.enter_utf8("Missing");
    let unresolved = TypePtr::new(Type::UnresolvedClass {
        scope: SymbolRef::ROOT,
        names: vec![missing],
    });
    assert!(is_subtype(&gs, &unresolved, &integer()));
    assert!(is_subtype(&gs, &integer(), &unresolved));
    assert!(any(&gs, &unresolved, &integer()).absorbs_like_untyped());
    assert!(unresolved.has_untyped());
}

#[test]
fn instantiate_shares_unaffected_structure() {
    let mut gs = GlobalState::new();
    let boxy = generic(&mut gs, "Box", Variance::Invariant);
    let param = gs.symbol(boxy).type_params[0];

    let vanilla = any(&gs, &integer(), &string());
    let out = instantiate(&gs, &vanilla, &[param], &[object()]);
    assert!(out.ptr_eq(&vanilla));
}

#[test]
fn instantiate_replaces_bound_parameters() {
    let mut gs = GlobalState::new();
    let boxy = generic(&mut gs, "Box", Variance::Invariant);
    let param = gs.symbol(boxy).type_params[0];
    let occurrence = gs
        .symbol(param)
        .result_type
        .clone()
        .unwrap_or_else(TypePtr::untyped);

    let tree = TypePtr::new(Type::Or {
        left: occurrence,
        right: string(),
    });
    let out = instantiate(&gs, &tree, &[param], &[integer()]);
    let Type::Or { left, right } = &*out else {
        panic!("expected a union, got {}", out.show(&gs));
    };
    assert_eq!(left, &integer());
    // The untouched branch keeps its allocation.
    let Type::Or { right: original_right, .. } = &*tree else {
        unreachable!()
    };
    assert!(right.ptr_eq(original_right));
}

#[test]
fn replace_self_type_substitutes_the_receiver() {
    let gs = GlobalState::new();
    let tree = TypePtr::new(Type::Or {
        left: TypePtr::new(Type::SelfType),
        right: TypePtr::nil(),
    });
    let out = replace_self_type(&gs, &tree, &integer());
    assert_eq!(out, any(&gs, &integer(), &TypePtr::nil()));
    // No self marker, no new allocation.
    let plain = integer();
    assert!(replace_self_type(&gs, &plain, &string()).ptr_eq(&plain));
}

#[test]
fn fully_defined_and_untyped_queries() {
    let mut gs = GlobalState::new();
    let boxy = generic(&mut gs, "Box", Variance::Invariant);
    let param = gs.symbol(boxy).type_params[0];
    let lambda = gs
        .symbol(param)
        .result_type
        .clone()
        .unwrap_or_else(TypePtr::untyped);

    assert!(integer().is_fully_defined());
    assert!(!lambda.is_fully_defined());
    assert!(!TypePtr::new(Type::SelfType).is_fully_defined());
    assert!(!integer().has_untyped());
    assert!(any(&gs, &integer(), &TypePtr::untyped()).has_untyped());
}

#[test]
fn rendering_is_stable() {
    let gs = GlobalState::new();
    let forty_two = TypePtr::literal(SymbolRef::INTEGER, LiteralValue::Integer(42));
    let union = TypePtr::new(Type::Or {
        left: integer(),
        right: string(),
    });
    assert_eq!(union.show(&gs), "(Integer | String)");
    assert_eq!(forty_two.show(&gs), "Integer(42)");
    assert_eq!(TypePtr::tuple(&gs, vec![integer()]).show(&gs), "[Integer]");
    assert_eq!(TypePtr::boolean().show(&gs), "(True | False)");
}

#[test]
fn variant_tags_are_stable() {
    let gs = GlobalState::new();
    assert_eq!(integer().type_name(), "ClassType");
    assert_eq!(TypePtr::boolean().type_name(), "OrType");
    assert_eq!(all(&gs, &integer(), &TypePtr::untyped()).type_name(), "ClassType");
    assert_eq!(
        TypePtr::literal(SymbolRef::INTEGER, LiteralValue::Integer(1)).type_name(),
        "LiteralType"
    );
    assert_eq!(TypePtr::tuple(&gs, vec![integer()]).type_name(), "TupleType");
    assert_eq!(TypePtr::new(Type::SelfType).type_name(), "SelfType");
}

#[test]
fn equiv_is_mutual_subtyping() {
    let gs = GlobalState::new();
    let a = any(&gs, &integer(), &string());
    let b = any(&gs, &string(), &integer());
    assert!(equiv(&gs, &a, &b));
    assert!(!equiv(&gs, &a, &integer()));
}
