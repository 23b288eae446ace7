//! The symbol arena: declared entities and the operations over them.
//!
//! A [`Symbol`] is one declared entity - class, module, method, field,
//! method argument, or type parameter - addressed by a [`SymbolRef`] into
//! the snapshot's single dense arena. Declaration is idempotent:
//! re-declaring an existing member with a flag subset returns the existing
//! handle, and incompatible flags are a fatal invariant violation.
//!
//! Ancestor search is depth-first over mixins in reverse declaration order
//! (most-recently-included wins) then the superclass, bounded by a fixed
//! recursion-depth guard that treats exhaustion as a fatal internal error.

use smallvec::SmallVec;
use tarn_diagnostic::{Diagnostic, ErrorCode};
use tarn_source::{Loc, NameKind, NameRef, NameTable, UniqueNameKind};

use crate::global_state::GlobalState;
use crate::types::{Type, TypePtr};

mod levenshtein;

pub(crate) use levenshtein::distance_under;

bitflags::bitflags! {
    /// What kind of entity a symbol is, plus per-kind sub-flags.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct SymbolFlags: u32 {
        // Entity kinds.
        const CLASS_OR_MODULE  = 1 << 0;
        const METHOD           = 1 << 1;
        const FIELD            = 1 << 2;
        const STATIC_FIELD     = 1 << 3;
        const METHOD_ARGUMENT  = 1 << 4;
        const TYPE_ARGUMENT    = 1 << 5;
        const TYPE_MEMBER      = 1 << 6;

        // Class/module sub-flags.
        const MODULE           = 1 << 8;
        const ABSTRACT         = 1 << 9;

        // Method sub-flags.
        const PRIVATE          = 1 << 12;

        // Method-argument sub-flags.
        const ARG_KEYWORD      = 1 << 16;
        const ARG_REPEATED     = 1 << 17;
        const ARG_OPTIONAL     = 1 << 18;
        const ARG_BLOCK        = 1 << 19;

        // Type-parameter variance (exactly one set on type members/arguments).
        const COVARIANT        = 1 << 24;
        const CONTRAVARIANT    = 1 << 25;
        const INVARIANT        = 1 << 26;
        const FIXED            = 1 << 27;
    }
}

/// Variance of a generic type parameter.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Variance {
    Covariant,
    Contravariant,
    Invariant,
}

impl Variance {
    pub(crate) fn flag(self) -> SymbolFlags {
        match self {
            Variance::Covariant => SymbolFlags::COVARIANT,
            Variance::Contravariant => SymbolFlags::CONTRAVARIANT,
            Variance::Invariant => SymbolFlags::INVARIANT,
        }
    }
}

/// Stable handle into the symbol arena.
///
/// Symbols are never renumbered by a fork, so unlike [`NameRef`] a symbol
/// handle is valid in every snapshot descended from the one that minted it;
/// type trees holding `SymbolRef`s are deliberately shared across snapshots.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct SymbolRef(u32);

impl SymbolRef {
    // Well-known symbols, synthesized at snapshot construction in this order.
    pub const ABSENT: SymbolRef = SymbolRef(0);
    pub const TOP: SymbolRef = SymbolRef(1);
    pub const BOTTOM: SymbolRef = SymbolRef(2);
    pub const ROOT: SymbolRef = SymbolRef(3);
    pub const PLACEHOLDER: SymbolRef = SymbolRef(4);
    pub const OBJECT: SymbolRef = SymbolRef(5);
    pub const INTEGER: SymbolRef = SymbolRef(6);
    pub const FLOAT: SymbolRef = SymbolRef(7);
    pub const STRING: SymbolRef = SymbolRef(8);
    pub const SYMBOL: SymbolRef = SymbolRef(9);
    pub const ARRAY: SymbolRef = SymbolRef(10);
    pub const HASH: SymbolRef = SymbolRef(11);
    pub const TRUE: SymbolRef = SymbolRef(12);
    pub const FALSE: SymbolRef = SymbolRef(13);
    pub const NIL: SymbolRef = SymbolRef(14);
    pub const UNTYPED: SymbolRef = SymbolRef(15);

    /// Number of well-known symbols.
    pub const WELL_KNOWN_COUNT: u32 = 16;

    pub(crate) const fn from_index(index: u32) -> SymbolRef {
        SymbolRef(index)
    }

    #[inline]
    pub const fn exists(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Whether this handle is part of the synthesized well-known catalog.
    #[inline]
    pub const fn is_well_known(self) -> bool {
        self.0 < Self::WELL_KNOWN_COUNT
    }
}

impl std::fmt::Debug for SymbolRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.exists() {
            write!(f, "SymbolRef({})", self.0)
        } else {
            write!(f, "SymbolRef(<absent>)")
        }
    }
}

impl Default for SymbolRef {
    fn default() -> Self {
        Self::ABSENT
    }
}

/// Outcome of a bounded-edit-distance member search.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FuzzySearchResult {
    pub symbol: SymbolRef,
    pub name: NameRef,
    pub distance: usize,
}

/// One declared entity.
///
/// `members` is an append-only ordered association list; search order over
/// it is declaration order, which keeps diagnostics reproducible.
pub struct Symbol {
    pub name: NameRef,
    pub owner: SymbolRef,
    pub flags: SymbolFlags,
    /// Superclass for classes; absent otherwise.
    pub superclass: SymbolRef,
    /// Mixins in declaration order for classes; positional arguments for
    /// methods.
    pub arguments_or_mixins: Vec<SymbolRef>,
    /// Type members (classes) or type arguments (methods), in declaration
    /// order.
    pub type_params: SmallVec<[SymbolRef; 4]>,
    /// Declared or inferred result type; `None` until computed.
    pub result_type: Option<TypePtr>,
    /// Definition sites in the order encountered; a class reopened across
    /// files accumulates one per file.
    pub locs: SmallVec<[Loc; 2]>,
    pub members: Vec<(NameRef, SymbolRef)>,
}

impl Symbol {
    pub(crate) fn new(name: NameRef, owner: SymbolRef, flags: SymbolFlags, loc: Loc) -> Symbol {
        let mut locs = SmallVec::new();
        if loc.exists() {
            locs.push(loc);
        }
        Symbol {
            name,
            owner,
            flags,
            superclass: SymbolRef::ABSENT,
            arguments_or_mixins: Vec::new(),
            type_params: SmallVec::new(),
            result_type: None,
            locs,
            members: Vec::new(),
        }
    }

    /// The most recent definition site; the none sentinel for synthesized
    /// symbols.
    pub fn loc(&self) -> Loc {
        self.locs.last().copied().unwrap_or(Loc::NONE)
    }

    /// Record another definition site. A new loc in an already-seen file
    /// replaces that file's entry; the sentinel is ignored.
    pub fn add_loc(&mut self, loc: Loc) {
        if !loc.exists() {
            return;
        }
        if let Some(existing) = self.locs.iter_mut().find(|known| known.file == loc.file) {
            *existing = loc;
        } else {
            self.locs.push(loc);
        }
    }

    pub fn is_class(&self) -> bool {
        self.flags.contains(SymbolFlags::CLASS_OR_MODULE)
    }

    pub fn is_method(&self) -> bool {
        self.flags.contains(SymbolFlags::METHOD)
    }

    pub fn is_type_param(&self) -> bool {
        self.flags
            .intersects(SymbolFlags::TYPE_MEMBER | SymbolFlags::TYPE_ARGUMENT)
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.contains(SymbolFlags::ABSTRACT)
    }

    /// Variance of a type parameter symbol.
    pub fn variance(&self) -> Variance {
        debug_assert!(self.is_type_param(), "variance of a non-type-parameter");
        if self.flags.contains(SymbolFlags::COVARIANT) {
            Variance::Covariant
        } else if self.flags.contains(SymbolFlags::CONTRAVARIANT) {
            Variance::Contravariant
        } else {
            Variance::Invariant
        }
    }

    /// Copy for a forked snapshot, re-tagging stored name handles so the
    /// debug lineage checks accept them against the destination table.
    pub(crate) fn deep_copy(&self, to_names: &NameTable) -> Symbol {
        Symbol {
            name: self.name.retagged(to_names),
            owner: self.owner,
            flags: self.flags,
            superclass: self.superclass,
            arguments_or_mixins: self.arguments_or_mixins.clone(),
            type_params: self.type_params.clone(),
            result_type: self.result_type.clone(),
            locs: self.locs.clone(),
            members: self
                .members
                .iter()
                .map(|&(name, sym)| (name.retagged(to_names), sym))
                .collect(),
        }
    }
}

/// Fixed recursion-depth guard for ancestor search.
///
/// Exceeding it is treated as a fatal internal error; this masks (rather
/// than detects) genuinely cyclic ancestor graphs, which the hierarchy
/// resolver above this core is expected to reject.
pub(crate) const MAX_SEARCH_DEPTH: u32 = 100;

/// Bound on alias-chain expansion before `dealias` degrades.
const ALIAS_EXPANSION_LIMIT: u32 = 256;

impl SymbolRef {
    /// Find a direct member by name and dealias it; absent on a miss.
    pub fn find_member(self, gs: &GlobalState, name: NameRef) -> SymbolRef {
        let found = self.lookup_member(gs, name);
        if found.exists() {
            found.dealias(gs)
        } else {
            SymbolRef::ABSENT
        }
    }

    /// Find a direct member by name without dealiasing.
    pub fn lookup_member(self, gs: &GlobalState, name: NameRef) -> SymbolRef {
        gs.symbol(self)
            .members
            .iter()
            .find(|&&(member_name, _)| member_name == name)
            .map_or(SymbolRef::ABSENT, |&(_, sym)| sym)
    }

    /// Search the ancestor graph for a member: own members first, then
    /// mixins in reverse declaration order, then the superclass.
    pub fn find_member_transitive(self, gs: &GlobalState, name: NameRef) -> SymbolRef {
        self.find_member_transitive_internal(gs, name, MAX_SEARCH_DEPTH, &|_| true)
    }

    /// Like [`SymbolRef::find_member_transitive`], but only accepts
    /// non-abstract method symbols.
    pub fn find_concrete_method_transitive(self, gs: &GlobalState, name: NameRef) -> SymbolRef {
        self.find_member_transitive_internal(gs, name, MAX_SEARCH_DEPTH, &|sym| {
            let data = gs.symbol(sym);
            data.is_method() && !data.is_abstract()
        })
    }

    fn find_member_transitive_internal(
        self,
        gs: &GlobalState,
        name: NameRef,
        depth: u32,
        accept: &dyn Fn(SymbolRef) -> bool,
    ) -> SymbolRef {
        debug_assert!(gs.symbol(self).is_class(), "transitive search on a non-class");
        if depth == 0 {
            self.report_search_depth_exhausted(gs, name);
        }

        let found = self.find_member(gs, name);
        if found.exists() && accept(found) {
            return found;
        }
        let data = gs.symbol(self);
        for &mixin in data.arguments_or_mixins.iter().rev() {
            let found = mixin.find_member_transitive_internal(gs, name, depth - 1, accept);
            if found.exists() {
                return found;
            }
        }
        if data.superclass.exists() {
            return data
                .superclass
                .find_member_transitive_internal(gs, name, depth - 1, accept);
        }
        SymbolRef::ABSENT
    }

    /// Fatal: the depth guard tripped, so the ancestor graph is almost
    /// certainly cyclic and the model cannot be trusted.
    #[cold]
    fn report_search_depth_exhausted(self, gs: &GlobalState, name: NameRef) -> ! {
        let parents: Vec<String> = gs
            .symbol(self)
            .arguments_or_mixins
            .iter()
            .rev()
            .chain(std::iter::once(&gs.symbol(self).superclass))
            .filter(|parent| parent.exists())
            .map(|parent| parent.full_name(gs))
            .collect();
        panic!(
            "ancestor search for `{}` in `{}` hit the depth guard; parents are: [{}]",
            gs.names.show(name),
            self.full_name(gs),
            parents.join(", ")
        );
    }

    /// Follow alias indirections in `result_type` to the aliased symbol.
    ///
    /// Uses the default expansion bound; degradation is traced but the
    /// diagnostic is dropped. Use [`SymbolRef::dealias_with_limit`] to
    /// receive it.
    pub fn dealias(self, gs: &GlobalState) -> SymbolRef {
        let (target, diagnostic) = self.dealias_with_limit(gs, ALIAS_EXPANSION_LIMIT);
        if let Some(diagnostic) = diagnostic {
            tracing::error!(code = %diagnostic.code, "{}", diagnostic.message);
        }
        target
    }

    /// Follow alias indirections up to `limit` links.
    ///
    /// If the bound is exceeded, returns the alias target reached so far
    /// plus a diagnostic, rather than looping.
    pub fn dealias_with_limit(self, gs: &GlobalState, limit: u32) -> (SymbolRef, Option<Diagnostic>) {
        let mut current = self;
        for _ in 0..limit {
            match gs.symbol(current).result_type.as_deref() {
                Some(Type::Alias { sym }) => current = *sym,
                _ => return (current, None),
            }
        }
        let diagnostic = Diagnostic::error(ErrorCode::E5001)
            .with_message(format!(
                "alias chain starting at `{}` exceeds {limit} links; expansion truncated",
                self.full_name(gs)
            ))
            .with_label(gs.symbol(self).loc(), "alias declared here");
        (current, Some(diagnostic))
    }

    /// Whether `self` transitively mixes in or subclasses `other`.
    pub fn derives_from(self, gs: &GlobalState, other: SymbolRef) -> bool {
        debug_assert!(gs.symbol(self).is_class(), "derives_from on a non-class");
        let data = gs.symbol(self);
        for &mixin in &data.arguments_or_mixins {
            if mixin == other || mixin.derives_from(gs, other) {
                return true;
            }
        }
        if data.superclass.exists() {
            return data.superclass == other || data.superclass.derives_from(gs, other);
        }
        false
    }

    /// The singleton class already materialized for this class, if any.
    pub fn lookup_singleton_class(self, gs: &GlobalState) -> SymbolRef {
        debug_assert!(gs.symbol(self).is_class());
        if self == SymbolRef::UNTYPED {
            return SymbolRef::UNTYPED;
        }
        self.lookup_member(gs, NameRef::SINGLETON)
    }

    /// The instance class this singleton class is attached to.
    ///
    /// The untyped symbol is its own singleton and attached class.
    pub fn attached_class(self, gs: &GlobalState) -> SymbolRef {
        debug_assert!(gs.symbol(self).is_class());
        if self == SymbolRef::UNTYPED {
            return SymbolRef::UNTYPED;
        }
        self.lookup_member(gs, NameRef::ATTACHED)
    }

    /// The nearest enclosing class scope, following owners.
    pub fn enclosing_class(self, gs: &GlobalState) -> SymbolRef {
        let mut current = self;
        while current.exists() && !gs.symbol(current).is_class() {
            current = gs.symbol(current).owner;
        }
        current
    }

    /// Number of non-fixed type parameters.
    pub fn type_arity(self, gs: &GlobalState) -> usize {
        gs.symbol(self)
            .type_params
            .iter()
            .filter(|&&param| !gs.symbol(param).flags.contains(SymbolFlags::FIXED))
            .count()
    }

    /// `::`-joined path for class scopes, `#` for members.
    pub fn full_name(self, gs: &GlobalState) -> String {
        let data = gs.symbol(self);
        let own = gs.names.show(data.name);
        if !data.owner.exists() || data.owner == SymbolRef::ROOT {
            return own;
        }
        let separator = if data.is_class() { "::" } else { "#" };
        format!("{}{}{}", data.owner.full_name(gs), separator, own)
    }

    /// User-facing rendering; singleton classes render as `<Class:X>`.
    pub fn show(self, gs: &GlobalState) -> String {
        let data = gs.symbol(self);
        if data.is_class() && data.name.exists() && data.name.kind() == NameKind::Unique {
            let (kind, _, _) = gs.names.unique_data(data.name);
            if kind == UniqueNameKind::Singleton {
                let attached = self.attached_class(gs);
                if attached.exists() {
                    return format!("<Class:{}>", attached.show(gs));
                }
            }
        }
        self.full_name(gs)
    }

    /// Fuzzy search over this symbol and its ancestors, tightening `best`
    /// and collecting candidates into `out`.
    pub(crate) fn fuzzy_scan_ancestors(
        self,
        gs: &GlobalState,
        target: &str,
        best: &mut usize,
        out: &mut Vec<FuzzySearchResult>,
        depth: u32,
    ) {
        if depth == 0 {
            return;
        }
        self.fuzzy_scan_members(gs, target, best, out);
        let data = gs.symbol(self);
        for &mixin in data.arguments_or_mixins.iter().rev() {
            mixin.fuzzy_scan_ancestors(gs, target, best, out, depth - 1);
        }
        if data.superclass.exists() {
            data.superclass.fuzzy_scan_ancestors(gs, target, best, out, depth - 1);
        }
    }

    /// Fuzzy search over this symbol's direct members only.
    pub(crate) fn fuzzy_scan_members(
        self,
        gs: &GlobalState,
        target: &str,
        best: &mut usize,
        out: &mut Vec<FuzzySearchResult>,
    ) {
        for &(member_name, member_sym) in &gs.symbol(self).members {
            if member_name.kind() != NameKind::Utf8 {
                continue;
            }
            let candidate = gs.names.raw_text(member_name);
            if let Some(distance) = distance_under(target, candidate, *best + 1) {
                out.push(FuzzySearchResult {
                    symbol: member_sym,
                    name: member_name,
                    distance,
                });
                *best = (*best).min(distance);
            }
        }
    }
}
