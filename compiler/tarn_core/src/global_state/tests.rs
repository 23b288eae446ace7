use pretty_assertions::assert_eq;
use tarn_source::SourceKind;

use super::*;
use crate::symbols::Variance;

fn class(gs: &mut GlobalState, owner: SymbolRef, name: &str) -> SymbolRef {
    let name = gs.names.enter_constant_utf8(name);
    gs.enter_class_symbol(Loc::NONE, owner, name)
}

#[test]
fn fresh_snapshots_start_with_the_well_known_catalog() {
    let gs = GlobalState::new();
    assert_eq!(gs.symbol_count(), SymbolRef::WELL_KNOWN_COUNT);
    assert!(!gs.was_modified());
    gs.sanity_check();
}

#[test]
fn snapshot_ids_are_unique() {
    let a = GlobalState::new();
    let b = GlobalState::new();
    assert_ne!(a.id(), b.id());
    assert_eq!(a.names.id(), a.id());
}

#[test]
fn declaring_marks_the_snapshot_modified() {
    let mut gs = GlobalState::new();
    assert!(!gs.was_modified());
    let _ = class(&mut gs, SymbolRef::ROOT, "Widget");
    assert!(gs.was_modified());
}

#[test]
#[should_panic(expected = "symbol table is frozen")]
fn frozen_symbol_table_rejects_declarations() {
    let mut gs = GlobalState::new();
    assert!(!gs.freeze_symbol_table());
    let _ = class(&mut gs, SymbolRef::ROOT, "TooLate");
}

#[test]
fn scoped_unfreeze_restores_the_previous_state() {
    let mut gs = GlobalState::new();
    gs.freeze_all();
    let widget = gs.with_unfrozen_symbol_table(|gs| {
        gs.names.unfreeze();
        let widget = class(gs, SymbolRef::ROOT, "Widget");
        gs.names.freeze();
        widget
    });
    assert!(gs.is_symbol_table_frozen());
    assert!(widget.exists());
}

#[test]
fn method_arguments_append_in_order() {
    let mut gs = GlobalState::new();
    let widget = class(&mut gs, SymbolRef::ROOT, "Widget");
    let run = gs.names.enter_utf8("run");
    let run = gs.enter_method_symbol(Loc::NONE, widget, run);
    let first = gs.names.enter_utf8("first");
    let second = gs.names.enter_utf8("second");
    let first = gs.enter_method_argument(Loc::NONE, run, first, SymbolFlags::empty());
    let second = gs.enter_method_argument(Loc::NONE, run, second, SymbolFlags::ARG_OPTIONAL);
    assert_eq!(gs.symbol(run).arguments_or_mixins, vec![first, second]);
    assert!(gs.symbol(second).flags.contains(SymbolFlags::ARG_OPTIONAL));
}

#[test]
fn type_members_carry_their_bound_marker_types() {
    let mut gs = GlobalState::new();
    let boxy = class(&mut gs, SymbolRef::ROOT, "Box");
    let elem = gs.names.enter_utf8("Elem");
    let elem = gs.enter_type_member(Loc::NONE, boxy, elem, Variance::Covariant);
    let marker = gs.symbol(elem).result_type.clone();
    assert!(matches!(
        marker.as_deref(),
        Some(Type::LambdaParam { sym, .. }) if *sym == elem
    ));
    assert_eq!(gs.symbol(elem).variance(), Variance::Covariant);
}

#[test]
fn deep_copy_preserves_content_and_renumbers_the_snapshot() {
    let mut gs = GlobalState::new();
    let widget = class(&mut gs, SymbolRef::ROOT, "Widget");
    let name = gs.names.enter_utf8("carried");
    let file = gs.files.enter_source("widget.tn", "class Widget\n");

    let copy = gs.deep_copy(false);
    assert_ne!(copy.id(), gs.id());
    assert_eq!(copy.symbol_count(), gs.symbol_count());
    // Symbol handles survive the fork; name handles stay valid by lineage.
    assert_eq!(copy.symbol(widget).name, gs.symbol(widget).name);
    assert_eq!(copy.names.raw_text(name), "carried");
    // File payloads are shared, not copied.
    assert!(copy.files.shares_slot(&gs.files, file.index()));
    assert!(!copy.was_modified());
    copy.sanity_check();
}

#[test]
fn deep_copy_can_impersonate_the_parent() {
    let gs = GlobalState::new();
    let copy = gs.deep_copy(true);
    assert_eq!(copy.id(), gs.id());
}

#[test]
fn forked_snapshots_evolve_independently() {
    let mut parent = GlobalState::new();
    let _ = class(&mut parent, SymbolRef::ROOT, "Shared");
    let mut child = parent.deep_copy(false);

    let in_child = class(&mut child, SymbolRef::ROOT, "ChildOnly");
    assert_eq!(child.symbol_count(), parent.symbol_count() + 1);
    let child_only = child.names.lookup_utf8("ChildOnly");
    assert!(child_only.exists());
    assert!(!parent.names.lookup_utf8("ChildOnly").exists());
    assert!(in_child.exists());
}

#[test]
fn reopened_classes_accumulate_definition_sites() {
    let mut gs = GlobalState::new();
    let first = gs.files.enter_source("a.tn", "class Widget\n");
    let second = gs.files.enter_source("b.tn", "class Widget\nclass Widget\n");
    let name = gs.names.enter_constant_utf8("Widget");

    let widget = gs.enter_class_symbol(Loc::new(first, 0, 12), SymbolRef::ROOT, name);
    assert_eq!(gs.symbol(widget).loc().file, first);

    let again = gs.enter_class_symbol(Loc::new(second, 0, 12), SymbolRef::ROOT, name);
    assert_eq!(widget, again);
    assert_eq!(gs.symbol(widget).locs.len(), 2);
    assert_eq!(gs.symbol(widget).loc().file, second);

    // Re-declaring within an already-seen file replaces that file's entry.
    let _ = gs.enter_class_symbol(Loc::new(second, 14, 26), SymbolRef::ROOT, name);
    assert_eq!(gs.symbol(widget).locs.len(), 2);
    assert_eq!(gs.symbol(widget).loc().begin, 14);

    // Synthesized symbols have no definition site at all.
    assert!(gs.symbol(SymbolRef::OBJECT).locs.is_empty());
    assert!(!gs.symbol(SymbolRef::OBJECT).loc().exists());
}

#[test]
fn reserved_file_slots_fill_later() {
    let mut gs = GlobalState::new();
    let pending = gs.files.reserve("later.tn");
    assert_eq!(gs.files.file(pending).kind(), SourceKind::NotYetRead);
    let payload = std::sync::Arc::new(tarn_source::File::new(
        "later.tn".to_owned(),
        "x = 1\n".to_owned(),
        SourceKind::Normal,
    ));
    gs.files.fill_reserved(pending, payload);
    assert_eq!(gs.files.file(pending).kind(), SourceKind::Normal);
    assert_eq!(gs.files.lookup_path("later.tn"), pending);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "used against snapshot")]
fn handles_do_not_cross_unrelated_snapshots() {
    let mut a = GlobalState::new();
    let foreign = a.names.enter_utf8("minted_elsewhere");
    let b = GlobalState::new();
    let _ = b.names.raw_text(foreign);
}
