//! End-to-end exercise of the fork / parallel-work / reconcile cycle:
//! one frozen base snapshot, several forks doing independent interning on
//! worker threads while sharing the base's type trees, then sequential
//! name substitution back into the base on the coordinating thread.

use rayon::prelude::*;

use tarn_core::types::{any, is_subtype};
use tarn_core::{GlobalState, NameSubstitution, SymbolRef, TypePtr};
use tarn_source::Loc;

fn declare_class(gs: &mut GlobalState, name: &str) -> SymbolRef {
    let name = gs.names.enter_constant_utf8(name);
    gs.enter_class_symbol(Loc::NONE, SymbolRef::ROOT, name)
}

#[test]
fn forks_work_in_parallel_and_reconcile_through_substitution() {
    let mut base = GlobalState::new();
    let request = declare_class(&mut base, "Request");
    let response = declare_class(&mut base, "Response");
    base.files.enter_source("base.tn", "class Request\nclass Response\n");
    base.freeze_all();
    base.sanity_check();

    // A type tree built in the base; the forks share its allocation.
    let request_or_response = any(
        &base,
        &TypePtr::class_of(request),
        &TypePtr::class_of(response),
    );

    let children: Vec<GlobalState> = (0..4u32)
        .into_par_iter()
        .map(|worker| {
            let mut child = base.deep_copy(false);
            // Symbol tables must stay aligned for reconciliation; workers
            // only intern names and register files.
            for i in 0..64 {
                let _ = child.names.enter_utf8(&format!("local_{worker}_{i}"));
            }
            child
                .files
                .enter_source(&format!("worker_{worker}.tn"), "x = 1\n");

            // The shared tree is usable against the fork without copying.
            assert!(is_subtype(
                &child,
                &TypePtr::class_of(request),
                &request_or_response
            ));
            assert!(!is_subtype(
                &child,
                &TypePtr::class_of(SymbolRef::INTEGER),
                &request_or_response
            ));
            child
        })
        .collect();

    // Reconcile on the coordinating thread.
    base.names.unfreeze();
    base.files.unfreeze();
    for (worker, child) in children.iter().enumerate() {
        let sub = NameSubstitution::new(child, &mut base);
        assert!(!sub.is_fast_path());

        let local = child.names.lookup_utf8(&format!("local_{worker}_0"));
        assert!(local.exists());
        let translated = sub.substitute(local);
        assert_eq!(
            base.names.raw_text(translated),
            format!("local_{worker}_0")
        );

        assert!(base
            .files
            .lookup_path(&format!("worker_{worker}.tn"))
            .exists());
    }
    base.sanity_check();
}

#[test]
fn an_unchanged_fork_reconciles_on_the_fast_path() {
    let mut base = GlobalState::new();
    let _ = declare_class(&mut base, "Stable");
    let child = base.deep_copy(false);

    let sub = NameSubstitution::new(&child, &mut base);
    assert!(sub.is_fast_path());
    let stable = base.names.lookup_utf8("Stable");
    assert!(stable.exists());
}
