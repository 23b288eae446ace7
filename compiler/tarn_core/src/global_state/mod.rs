//! One complete snapshot of the semantic model.
//!
//! A [`GlobalState`] owns the name table, the file table, and the symbol
//! arena, and enforces the single-writer discipline over all three: each
//! table mutates only while explicitly unfrozen, and freezing returns the
//! previous state so scoped unfreezes can restore it. Snapshots fork with
//! [`GlobalState::deep_copy`]; forked children evolve independently and are
//! reconciled later through name substitution.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use rustc_hash::FxHashSet;
use tarn_source::{FileTable, Loc, NameKind, NameRef, NameTable, UniqueNameKind};

use crate::symbols::{FuzzySearchResult, Symbol, SymbolFlags, SymbolRef};
use crate::types::{Type, TypePtr};

#[cfg(test)]
mod tests;

/// Snapshot ids are process-unique and never reused; id 0 is reserved for
/// the well-known name catalog shared by every table.
static NEXT_SNAPSHOT_ID: AtomicU32 = AtomicU32::new(1);

fn mint_snapshot_id() -> u32 {
    NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed)
}

pub struct GlobalState {
    id: u32,
    pub names: NameTable,
    pub files: FileTable,
    symbols: Vec<Symbol>,
    symbol_table_frozen: bool,
    was_modified: bool,
}

impl GlobalState {
    /// A fresh snapshot with the well-known symbols synthesized.
    pub fn new() -> GlobalState {
        let id = mint_snapshot_id();
        let names = NameTable::new(id);
        let mut gs = GlobalState {
            id,
            names,
            files: FileTable::new(),
            symbols: Vec::with_capacity(SymbolRef::WELL_KNOWN_COUNT as usize),
            symbol_table_frozen: false,
            was_modified: false,
        };
        gs.synthesize_well_known();
        gs
    }

    /// The well-known symbols are pushed directly, in the fixed handle
    /// order, then linked as members of the root scope. `declare` cannot be
    /// used here because owners come into existence out of scope order.
    fn synthesize_well_known(&mut self) {
        let root = SymbolRef::ROOT;
        let special = SymbolFlags::CLASS_OR_MODULE | SymbolFlags::MODULE;
        let class = SymbolFlags::CLASS_OR_MODULE;

        let catalog: [(SymbolRef, NameRef, SymbolFlags, SymbolRef); 16] = [
            (SymbolRef::ABSENT, NameRef::ABSENT, special, SymbolRef::ABSENT),
            (SymbolRef::TOP, NameRef::C_TOP, special, SymbolRef::ABSENT),
            (SymbolRef::BOTTOM, NameRef::C_BOTTOM, special, SymbolRef::ABSENT),
            (SymbolRef::ROOT, NameRef::C_ROOT, class, SymbolRef::ABSENT),
            (SymbolRef::PLACEHOLDER, NameRef::C_PLACEHOLDER, special, SymbolRef::ABSENT),
            (SymbolRef::OBJECT, NameRef::C_OBJECT, class, SymbolRef::ABSENT),
            (SymbolRef::INTEGER, NameRef::C_INTEGER, class, SymbolRef::OBJECT),
            (SymbolRef::FLOAT, NameRef::C_FLOAT, class, SymbolRef::OBJECT),
            (SymbolRef::STRING, NameRef::C_STRING, class, SymbolRef::OBJECT),
            (SymbolRef::SYMBOL, NameRef::C_SYMBOL, class, SymbolRef::OBJECT),
            (SymbolRef::ARRAY, NameRef::C_ARRAY, class, SymbolRef::OBJECT),
            (SymbolRef::HASH, NameRef::C_HASH, class, SymbolRef::OBJECT),
            (SymbolRef::TRUE, NameRef::C_TRUE, class, SymbolRef::OBJECT),
            (SymbolRef::FALSE, NameRef::C_FALSE, class, SymbolRef::OBJECT),
            (SymbolRef::NIL, NameRef::C_NIL, class, SymbolRef::OBJECT),
            (SymbolRef::UNTYPED, NameRef::C_UNTYPED, special, SymbolRef::ABSENT),
        ];
        for (expected, name, flags, superclass) in catalog {
            let owner = if expected == SymbolRef::ABSENT || expected == SymbolRef::ROOT {
                SymbolRef::ABSENT
            } else {
                root
            };
            let mut symbol = Symbol::new(name, owner, flags, Loc::NONE);
            symbol.superclass = superclass;
            let minted = SymbolRef::from_index(self.symbols.len() as u32);
            assert_eq!(minted, expected, "well-known symbol out of order");
            self.symbols.push(symbol);
        }
        for index in 1..SymbolRef::WELL_KNOWN_COUNT {
            let sym = SymbolRef::from_index(index);
            if sym == root {
                continue;
            }
            let name = self.symbols[index as usize].name;
            self.symbols[root.index() as usize].members.push((name, sym));
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn symbol_count(&self) -> u32 {
        self.symbols.len() as u32
    }

    pub fn symbol(&self, sym: SymbolRef) -> &Symbol {
        &self.symbols[sym.index() as usize]
    }

    /// Mutable access marks the snapshot modified; fatal while frozen.
    pub fn symbol_mut(&mut self, sym: SymbolRef) -> &mut Symbol {
        assert!(!self.symbol_table_frozen, "symbol table is frozen");
        self.was_modified = true;
        &mut self.symbols[sym.index() as usize]
    }

    /// Whether anything was declared or mutated since construction or the
    /// last fork.
    pub fn was_modified(&self) -> bool {
        self.was_modified
    }

    // --- declaration ----------------------------------------------------

    /// Declare `name` in `owner`, or return the existing member.
    ///
    /// Re-declaration is idempotent only when the existing member already
    /// carries every requested flag; anything else means two conflicting
    /// definitions and is fatal.
    fn declare(
        &mut self,
        loc: Loc,
        owner: SymbolRef,
        name: NameRef,
        flags: SymbolFlags,
    ) -> SymbolRef {
        assert!(!self.symbol_table_frozen, "symbol table is frozen");
        debug_assert!(name.exists(), "declaration under the absent name");
        debug_assert!(owner.exists(), "declaration under the absent owner");

        let existing = owner.lookup_member(self, name);
        if existing.exists() {
            let existing_flags = self.symbol(existing).flags;
            assert!(
                existing_flags.contains(flags),
                "conflicting redeclaration of `{}`: {:?} vs {:?}",
                existing.full_name(self),
                existing_flags,
                flags,
            );
            if loc.exists() {
                self.symbols[existing.index() as usize].add_loc(loc);
                self.was_modified = true;
            }
            return existing;
        }

        let sym = SymbolRef::from_index(self.symbols.len() as u32);
        self.symbols.push(Symbol::new(name, owner, flags, loc));
        self.symbols[owner.index() as usize].members.push((name, sym));
        self.was_modified = true;
        sym
    }

    pub fn enter_class_symbol(&mut self, loc: Loc, owner: SymbolRef, name: NameRef) -> SymbolRef {
        debug_assert_eq!(name.kind(), NameKind::Constant, "class names live in the constant namespace");
        self.declare(loc, owner, name, SymbolFlags::CLASS_OR_MODULE)
    }

    pub fn enter_module_symbol(&mut self, loc: Loc, owner: SymbolRef, name: NameRef) -> SymbolRef {
        debug_assert_eq!(name.kind(), NameKind::Constant);
        self.declare(
            loc,
            owner,
            name,
            SymbolFlags::CLASS_OR_MODULE | SymbolFlags::MODULE,
        )
    }

    pub fn enter_method_symbol(&mut self, loc: Loc, owner: SymbolRef, name: NameRef) -> SymbolRef {
        self.declare(loc, owner, name, SymbolFlags::METHOD)
    }

    pub fn enter_field_symbol(&mut self, loc: Loc, owner: SymbolRef, name: NameRef) -> SymbolRef {
        self.declare(loc, owner, name, SymbolFlags::FIELD)
    }

    pub fn enter_static_field_symbol(
        &mut self,
        loc: Loc,
        owner: SymbolRef,
        name: NameRef,
    ) -> SymbolRef {
        self.declare(loc, owner, name, SymbolFlags::STATIC_FIELD)
    }

    /// Declare a class type member; its result type is the member seen as a
    /// bounded parameter within the class body.
    pub fn enter_type_member(
        &mut self,
        loc: Loc,
        owner: SymbolRef,
        name: NameRef,
        variance: crate::symbols::Variance,
    ) -> SymbolRef {
        debug_assert!(self.symbol(owner).is_class());
        let sym = self.declare(loc, owner, name, SymbolFlags::TYPE_MEMBER | variance.flag());
        if !self.symbol(owner).type_params.contains(&sym) {
            self.symbol_mut(owner).type_params.push(sym);
        }
        if self.symbol(sym).result_type.is_none() {
            self.symbol_mut(sym).result_type = Some(TypePtr::new(Type::LambdaParam {
                sym,
                lower: TypePtr::bottom(),
                upper: TypePtr::top(),
            }));
        }
        sym
    }

    /// Declare a method type argument; its result type is the inference
    /// variable constraints will bound at call sites.
    pub fn enter_type_argument(
        &mut self,
        loc: Loc,
        owner: SymbolRef,
        name: NameRef,
        variance: crate::symbols::Variance,
    ) -> SymbolRef {
        debug_assert!(self.symbol(owner).is_method());
        let sym = self.declare(loc, owner, name, SymbolFlags::TYPE_ARGUMENT | variance.flag());
        if !self.symbol(owner).type_params.contains(&sym) {
            self.symbol_mut(owner).type_params.push(sym);
        }
        if self.symbol(sym).result_type.is_none() {
            self.symbol_mut(sym).result_type = Some(TypePtr::new(Type::TypeVar { sym }));
        }
        sym
    }

    pub fn enter_method_argument(
        &mut self,
        loc: Loc,
        owner: SymbolRef,
        name: NameRef,
        flags: SymbolFlags,
    ) -> SymbolRef {
        debug_assert!(self.symbol(owner).is_method());
        let sym = self.declare(loc, owner, name, SymbolFlags::METHOD_ARGUMENT | flags);
        if !self.symbol(owner).arguments_or_mixins.contains(&sym) {
            self.symbol_mut(owner).arguments_or_mixins.push(sym);
        }
        sym
    }

    // --- singleton classes ----------------------------------------------

    /// The singleton class of `sym`, materializing it on first use.
    ///
    /// The two links are member slots under well-known names: the original
    /// holds a forward link keyed `<singleton class>`, the singleton holds
    /// a back link keyed `<attached class>`. Untyped is its own singleton.
    pub fn singleton_class(&mut self, sym: SymbolRef) -> SymbolRef {
        debug_assert!(self.symbol(sym).is_class());
        let existing = sym.lookup_singleton_class(self);
        if existing.exists() {
            return existing;
        }

        let base_name = self.symbol(sym).name;
        let singleton_name = self.names.fresh_unique(UniqueNameKind::Singleton, base_name, 1);
        let loc = self.symbol(sym).loc();
        let owner = self.symbol(sym).owner;

        let singleton = SymbolRef::from_index(self.symbols.len() as u32);
        let mut data = Symbol::new(singleton_name, owner, SymbolFlags::CLASS_OR_MODULE, loc);
        // Hierarchy resolution replaces the placeholder with the attached
        // class's singleton superclass later.
        data.superclass = SymbolRef::PLACEHOLDER;
        data.members.push((NameRef::ATTACHED, sym));
        assert!(!self.symbol_table_frozen, "symbol table is frozen");
        self.symbols.push(data);
        self.symbols[sym.index() as usize]
            .members
            .push((NameRef::SINGLETON, singleton));
        self.was_modified = true;
        singleton
    }

    // --- fuzzy search ---------------------------------------------------

    /// Near-miss candidates for a misspelled member, for "did you mean"
    /// diagnostics.
    ///
    /// Search is staged: the scope's ancestors, then its lexically
    /// enclosing scopes, and only if both come up empty a breadth-first
    /// sweep of the whole scope tree. Results are ordered by edit distance
    /// and then declaration order, so diagnostics are reproducible.
    pub fn fuzzy_find_member(&self, scope: SymbolRef, name: NameRef) -> Vec<FuzzySearchResult> {
        if !name.exists() || name.kind() != NameKind::Utf8 {
            return Vec::new();
        }
        let target = self.names.raw_text(name).to_owned();
        let mut best = 1 + target.chars().count() / 2;
        let mut out = Vec::new();

        scope.fuzzy_scan_ancestors(
            self,
            &target,
            &mut best,
            &mut out,
            crate::symbols::MAX_SEARCH_DEPTH,
        );
        let mut enclosing = self.symbol(scope).owner;
        while enclosing.exists() {
            enclosing.fuzzy_scan_members(self, &target, &mut best, &mut out);
            enclosing = self.symbol(enclosing).owner;
        }

        if out.is_empty() {
            let mut queue = VecDeque::from([SymbolRef::ROOT]);
            let mut seen = FxHashSet::default();
            while let Some(current) = queue.pop_front() {
                if !seen.insert(current) {
                    continue;
                }
                current.fuzzy_scan_members(self, &target, &mut best, &mut out);
                for &(_, member) in &self.symbol(current).members {
                    if self.symbol(member).is_class() {
                        queue.push_back(member);
                    }
                }
            }
        }

        out.retain(|candidate| candidate.distance <= best);
        out.sort_by_key(|candidate| (candidate.distance, candidate.symbol.index()));
        out.dedup_by_key(|candidate| (candidate.symbol, candidate.name));
        out
    }

    // --- freezing -------------------------------------------------------

    /// Freeze the symbol table; returns the previous state.
    pub fn freeze_symbol_table(&mut self) -> bool {
        std::mem::replace(&mut self.symbol_table_frozen, true)
    }

    /// Unfreeze the symbol table; returns the previous state.
    pub fn unfreeze_symbol_table(&mut self) -> bool {
        std::mem::replace(&mut self.symbol_table_frozen, false)
    }

    pub fn is_symbol_table_frozen(&self) -> bool {
        self.symbol_table_frozen
    }

    /// Freeze all three tables at once, e.g. before handing the snapshot to
    /// readers on other threads.
    pub fn freeze_all(&mut self) {
        self.names.freeze();
        self.files.freeze();
        self.freeze_symbol_table();
    }

    /// Run `f` with the symbol table temporarily unfrozen, restoring the
    /// previous state afterwards.
    pub fn with_unfrozen_symbol_table<R>(&mut self, f: impl FnOnce(&mut GlobalState) -> R) -> R {
        let was_frozen = self.unfreeze_symbol_table();
        let result = f(self);
        if was_frozen {
            self.freeze_symbol_table();
        }
        result
    }

    // --- forking --------------------------------------------------------

    /// Fork an independent child snapshot.
    ///
    /// Symbol handles stay valid in the child; name handles are re-tagged
    /// against the child's table, whose lineage records this fork. File
    /// payloads are shared, not copied. With `keep_id` the child impersonates
    /// the parent, for cache round-trips that restore rather than fork.
    #[tracing::instrument(level = "debug", skip(self), fields(parent = self.id))]
    pub fn deep_copy(&self, keep_id: bool) -> GlobalState {
        let id = if keep_id { self.id } else { mint_snapshot_id() };
        let names = self.names.deep_copy(id);
        let symbols = self
            .symbols
            .iter()
            .map(|symbol| symbol.deep_copy(&names))
            .collect();
        GlobalState {
            id,
            names,
            files: self.files.deep_copy(),
            symbols,
            symbol_table_frozen: self.symbol_table_frozen,
            was_modified: false,
        }
    }

    // --- consistency ----------------------------------------------------

    /// Walk the whole snapshot checking internal invariants. Debug builds
    /// only; a release build compiles this to nothing.
    pub fn sanity_check(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        self.names.sanity_check();
        for (index, symbol) in self.symbols.iter().enumerate() {
            assert!(
                (symbol.owner.index() as usize) < self.symbols.len(),
                "symbol {index} has an out-of-range owner"
            );
            for &(name, member) in &symbol.members {
                assert!(name.exists() || index == 0, "member under the absent name");
                assert!(
                    (member.index() as usize) < self.symbols.len(),
                    "symbol {index} has an out-of-range member"
                );
            }
            if symbol.superclass.exists() {
                assert!(
                    self.symbol(symbol.superclass).is_class(),
                    "superclass of symbol {index} is not a class"
                );
            }
        }
    }
}

impl Default for GlobalState {
    fn default() -> Self {
        GlobalState::new()
    }
}

impl std::fmt::Debug for GlobalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalState")
            .field("id", &self.id)
            .field("symbols", &self.symbols.len())
            .field("names", &self.names.total_count())
            .field("frozen", &self.symbol_table_frozen)
            .finish()
    }
}
