//! Handle translation between forked snapshots.
//!
//! A fork produces two tables whose handles are not interchangeable even
//! though they denote overlapping content. [`NameSubstitution`] re-interns
//! every name of the source snapshot into the destination up front and
//! translates by dense array lookup afterwards; [`LazyNameSubstitution`]
//! memoizes on-demand translation for workloads that touch only a small
//! fraction of a large snapshot.
//!
//! Substitutions model exactly-once translation per fork: feeding a handle
//! that already targets the destination back through `substitute` is a usage
//! error, caught in debug builds.

use rustc_hash::FxHashMap;
use tarn_source::{NameKind, NameRef, NameTable, SourceKind};

use crate::global_state::GlobalState;


/// Eager, whole-table name translation from one snapshot into another.
///
/// Construction requires the two snapshots to agree on their symbol tables;
/// substitution reconciles names minted during parallel work, it does not
/// merge diverged declarations.
pub struct NameSubstitution {
    utf8: Vec<NameRef>,
    constants: Vec<NameRef>,
    uniques: Vec<NameRef>,
    fast_path: bool,
    #[cfg(debug_assertions)]
    to_id: u32,
}

impl NameSubstitution {
    #[tracing::instrument(level = "debug", skip_all, fields(from = from.id(), to = to.id()))]
    pub fn new(from: &GlobalState, to: &mut GlobalState) -> NameSubstitution {
        assert_eq!(
            from.symbol_count(),
            to.symbol_count(),
            "substitution across diverged symbol tables"
        );
        assert!(!to.names.is_frozen(), "substituting into a frozen name table");

        // Bring over files the destination has not seen, matched by path:
        // slot indices are per-snapshot, and two sibling forks may have
        // used the same index for different files. Tombstones stay behind;
        // a path the destination reserved but never read is filled in.
        for index in 1..from.files.count() {
            let file = from.files.file(tarn_source::FileRef::from_index(index));
            if file.kind() == SourceKind::NotYetRead {
                continue;
            }
            let existing = to.files.lookup_path(file.path());
            if existing.exists() {
                if to.files.file(existing).kind() == SourceKind::NotYetRead {
                    to.files.fill_reserved(existing, std::sync::Arc::clone(file));
                }
                continue;
            }
            to.files.enter(std::sync::Arc::clone(file));
        }

        // Identity fast path: every source name must already sit at the same
        // index in the destination. That holds exactly when the source
        // interned nothing since the fork point relating the two tables
        // (the destination is append-only and never renumbers).
        let from_counts = (
            from.names.utf8_count(),
            from.names.constant_count(),
            from.names.unique_count(),
        );
        let fast_path = if from.names.id() == to.names.id() {
            from_counts
                == (
                    to.names.utf8_count(),
                    to.names.constant_count(),
                    to.names.unique_count(),
                )
        } else if let Some(counts) = from.names.fork_point(to.names.id()) {
            counts == from_counts
        } else if let Some(counts) = to.names.fork_point(from.names.id()) {
            counts == from_counts
        } else {
            false
        };

        let mut sub = NameSubstitution {
            utf8: Vec::with_capacity(from.names.utf8_count() as usize),
            constants: vec![NameRef::ABSENT; from.names.constant_count() as usize],
            uniques: vec![NameRef::ABSENT; from.names.unique_count() as usize],
            fast_path,
            #[cfg(debug_assertions)]
            to_id: to.names.id(),
        };

        if fast_path {
            for index in 0..from.names.utf8_count() {
                let raw = (index << 2) | NameKind::Utf8 as u32;
                sub.utf8.push(to.names.name_from_raw(raw));
            }
            for index in 0..from.names.constant_count() {
                let raw = (index << 2) | NameKind::Constant as u32;
                sub.constants[index as usize] = to.names.name_from_raw(raw);
            }
            for index in 0..from.names.unique_count() {
                let raw = (index << 2) | NameKind::Unique as u32;
                sub.uniques[index as usize] = to.names.name_from_raw(raw);
            }
        } else {
            // UTF-8 names first: they are the leaves of every wrapper.
            for index in 0..from.names.utf8_count() {
                let handle = from.names.name_from_raw((index << 2) | NameKind::Utf8 as u32);
                let text = from.names.raw_text(handle);
                sub.utf8.push(to.names.enter_utf8(text));
            }
            // Unique names next, pulling the constants they wrap on demand;
            // a unique's original always precedes it.
            for index in 0..from.names.unique_count() {
                let handle = from.names.name_from_raw((index << 2) | NameKind::Unique as u32);
                sub.translate(&from.names, &mut to.names, handle);
            }
            // Remaining constants.
            for index in 0..from.names.constant_count() {
                let handle = from.names.name_from_raw((index << 2) | NameKind::Constant as u32);
                sub.translate(&from.names, &mut to.names, handle);
            }
        }

        debug_assert!({
            // Equal symbol tables store equal spellings; every symbol name
            // must come back as the destination's own handle for it.
            for index in 0..from.symbol_count() {
                let sym = crate::symbols::SymbolRef::from_index(index);
                let translated = sub.substitute(from.symbol(sym).name);
                assert_eq!(
                    translated.raw(),
                    to.symbol(sym).name.raw(),
                    "symbol {index} renamed by substitution"
                );
            }
            true
        });
        sub
    }

    fn translate(&mut self, from: &NameTable, to: &mut NameTable, name: NameRef) -> NameRef {
        if !name.exists() {
            return NameRef::ABSENT;
        }
        let index = name.index() as usize;
        match name.kind() {
            NameKind::Utf8 => self.utf8[index],
            NameKind::Constant => {
                if self.constants[index].exists() {
                    return self.constants[index];
                }
                let original = self.translate(from, to, from.constant_original(name));
                let translated = to.enter_constant(original);
                self.constants[index] = translated;
                translated
            }
            NameKind::Unique => {
                if self.uniques[index].exists() {
                    return self.uniques[index];
                }
                let (kind, original, num) = from.unique_data(name);
                let original = self.translate(from, to, original);
                let translated = to.fresh_unique(kind, original, num);
                self.uniques[index] = translated;
                translated
            }
        }
    }

    /// Whether translation is the identity on raw handles.
    pub fn is_fast_path(&self) -> bool {
        self.fast_path
    }

    /// Translate one source handle into the destination table.
    pub fn substitute(&self, name: NameRef) -> NameRef {
        #[cfg(debug_assertions)]
        assert!(
            self.fast_path || name.is_well_known() || name.minted_by() != self.to_id,
            "handle already targets the destination table"
        );
        if !name.exists() {
            return NameRef::ABSENT;
        }
        let index = name.index() as usize;
        match name.kind() {
            NameKind::Utf8 => self.utf8[index],
            NameKind::Constant => self.constants[index],
            NameKind::Unique => self.uniques[index],
        }
    }
}

/// Memoized on-demand translation into a destination snapshot.
///
/// Useful when hashing or summarizing a single file out of a large
/// snapshot: only the names actually encountered are re-interned.
pub struct LazyNameSubstitution<'a> {
    from: &'a GlobalState,
    memo: FxHashMap<NameRef, NameRef>,
}

impl<'a> LazyNameSubstitution<'a> {
    pub fn new(from: &'a GlobalState) -> LazyNameSubstitution<'a> {
        let mut memo = FxHashMap::default();
        memo.insert(NameRef::ABSENT, NameRef::ABSENT);
        LazyNameSubstitution { from, memo }
    }

    /// How many distinct handles have been translated so far.
    pub fn translated_count(&self) -> usize {
        self.memo.len() - 1
    }

    /// Translate `name`, interning it into `to` on first encounter.
    pub fn substitute(&mut self, to: &mut GlobalState, name: NameRef) -> NameRef {
        if let Some(&translated) = self.memo.get(&name) {
            return translated;
        }
        let translated = match name.kind() {
            NameKind::Utf8 => to.names.enter_utf8(self.from.names.raw_text(name)),
            NameKind::Constant => {
                let original = self.from.names.constant_original(name);
                let original = self.substitute(to, original);
                to.names.enter_constant(original)
            }
            NameKind::Unique => {
                let (kind, original, num) = self.from.names.unique_data(name);
                let original = self.substitute(to, original);
                to.names.fresh_unique(kind, original, num)
            }
        };
        self.memo.insert(name, translated);
        translated
    }
}
