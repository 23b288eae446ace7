//! Name interning.
//!
//! Every identifier spelling in the model is interned exactly once and
//! referred to by a [`NameRef`]. Three kinds of names exist:
//!
//! - **UTF-8**: plain identifier text.
//! - **Constant**: a wrapper putting an existing spelling into the constant
//!   namespace, so `Foo` the method and `Foo` the class never collide.
//! - **Unique**: a deterministic synthesized name for compiler-internal
//!   temporaries, distinct per `(kind, original, sequence)`.
//!
//! Storage is three dense per-kind vectors plus one shared open-address hash
//! array of `(hash, raw handle)` pairs. The hash array size is always a power
//! of two and probing uses a triangular-number step. On growth the stored
//! hashes are rehomed without being recomputed, so previously returned
//! handles stay valid.

use std::hash::Hasher;

use rustc_hash::FxHasher;

/// Snapshot id reserved for handles that are valid against every snapshot.
///
/// Well-known names are minted at table construction in a fixed order, so
/// their indices are identical in every table.
pub const WELL_KNOWN_TABLE_ID: u32 = 0;

/// Which namespace a name lives in.
///
/// The discriminant doubles as the low-bit tag inside [`NameRef`]; tag 0 is
/// reserved for the absent sentinel.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum NameKind {
    Utf8 = 1,
    Constant = 2,
    Unique = 3,
}

/// Why a unique name was synthesized.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum UniqueNameKind {
    /// Desugaring temporary.
    Desugar,
    /// Mangled name of a class's singleton class.
    Singleton,
    /// Overload-disambiguation suffix.
    Overload,
    /// Renamed-away symbol after a redefinition collision.
    MangleRename,
}

/// Stable handle to an interned name.
///
/// Layout: one `u32` packing the kind tag (2 low bits) and a per-kind dense
/// index (30 high bits). Raw value 0 is the absent sentinel.
///
/// In debug builds the handle also carries the id of the snapshot that
/// minted it; dereferences revalidate that id against the current table's
/// deep-clone lineage, rejecting handles from unrelated snapshots even when
/// their raw index happens to be in range.
#[derive(Copy, Clone)]
pub struct NameRef {
    raw: u32,
    #[cfg(debug_assertions)]
    minted_by: u32,
}

impl PartialEq for NameRef {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for NameRef {}

impl std::hash::Hash for NameRef {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.raw);
    }
}

impl PartialOrd for NameRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NameRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl std::fmt::Debug for NameRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.exists() {
            return write!(f, "NameRef(<absent>)");
        }
        write!(f, "NameRef({:?}, {})", self.kind(), self.index())
    }
}

impl Default for NameRef {
    fn default() -> Self {
        Self::ABSENT
    }
}

#[cfg(feature = "cache")]
impl serde::Serialize for NameRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.raw)
    }
}

#[cfg(feature = "cache")]
impl<'de> serde::Deserialize<'de> for NameRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Deserialized handles target a freshly restored table; lineage
        // checking restarts from the well-known tag.
        u32::deserialize(deserializer).map(Self::well_known_raw)
    }
}

impl NameRef {
    /// The absent-name sentinel.
    pub const ABSENT: NameRef = NameRef::well_known_raw(0);

    // Well-known UTF-8 names, in table construction order.
    pub const ATTACHED: NameRef = NameRef::well_known(NameKind::Utf8, 0);
    pub const SINGLETON: NameRef = NameRef::well_known(NameKind::Utf8, 1);
    pub const ROOT: NameRef = NameRef::well_known(NameKind::Utf8, 2);
    pub const PLACEHOLDER: NameRef = NameRef::well_known(NameKind::Utf8, 3);
    pub const OBJECT: NameRef = NameRef::well_known(NameKind::Utf8, 4);
    pub const INTEGER: NameRef = NameRef::well_known(NameKind::Utf8, 5);
    pub const FLOAT: NameRef = NameRef::well_known(NameKind::Utf8, 6);
    pub const STRING: NameRef = NameRef::well_known(NameKind::Utf8, 7);
    pub const SYMBOL: NameRef = NameRef::well_known(NameKind::Utf8, 8);
    pub const ARRAY: NameRef = NameRef::well_known(NameKind::Utf8, 9);
    pub const HASH: NameRef = NameRef::well_known(NameKind::Utf8, 10);
    pub const TRUE: NameRef = NameRef::well_known(NameKind::Utf8, 11);
    pub const FALSE: NameRef = NameRef::well_known(NameKind::Utf8, 12);
    pub const NIL: NameRef = NameRef::well_known(NameKind::Utf8, 13);
    pub const UNTYPED: NameRef = NameRef::well_known(NameKind::Utf8, 14);
    pub const TOP: NameRef = NameRef::well_known(NameKind::Utf8, 15);
    pub const BOTTOM: NameRef = NameRef::well_known(NameKind::Utf8, 16);

    // Constant-namespace wrappers of the class spellings above.
    pub const C_ROOT: NameRef = NameRef::well_known(NameKind::Constant, 0);
    pub const C_PLACEHOLDER: NameRef = NameRef::well_known(NameKind::Constant, 1);
    pub const C_OBJECT: NameRef = NameRef::well_known(NameKind::Constant, 2);
    pub const C_INTEGER: NameRef = NameRef::well_known(NameKind::Constant, 3);
    pub const C_FLOAT: NameRef = NameRef::well_known(NameKind::Constant, 4);
    pub const C_STRING: NameRef = NameRef::well_known(NameKind::Constant, 5);
    pub const C_SYMBOL: NameRef = NameRef::well_known(NameKind::Constant, 6);
    pub const C_ARRAY: NameRef = NameRef::well_known(NameKind::Constant, 7);
    pub const C_HASH: NameRef = NameRef::well_known(NameKind::Constant, 8);
    pub const C_TRUE: NameRef = NameRef::well_known(NameKind::Constant, 9);
    pub const C_FALSE: NameRef = NameRef::well_known(NameKind::Constant, 10);
    pub const C_NIL: NameRef = NameRef::well_known(NameKind::Constant, 11);
    pub const C_UNTYPED: NameRef = NameRef::well_known(NameKind::Constant, 12);
    pub const C_TOP: NameRef = NameRef::well_known(NameKind::Constant, 13);
    pub const C_BOTTOM: NameRef = NameRef::well_known(NameKind::Constant, 14);

    const LAST_WELL_KNOWN_UTF8: u32 = 16;
    const LAST_WELL_KNOWN_CONSTANT: u32 = 14;

    const fn well_known(kind: NameKind, index: u32) -> NameRef {
        NameRef::well_known_raw((index << 2) | kind as u32)
    }

    const fn well_known_raw(raw: u32) -> NameRef {
        NameRef {
            raw,
            #[cfg(debug_assertions)]
            minted_by: WELL_KNOWN_TABLE_ID,
        }
    }

    fn minted(raw: u32, table: &NameTable) -> NameRef {
        let _ = table;
        NameRef {
            raw,
            #[cfg(debug_assertions)]
            minted_by: table.id,
        }
    }

    /// Whether this handle refers to a name at all.
    #[inline]
    pub const fn exists(self) -> bool {
        self.raw != 0
    }

    /// The namespace tag. Must not be called on the absent sentinel.
    #[inline]
    pub fn kind(self) -> NameKind {
        debug_assert!(self.exists(), "absent name has no kind");
        match self.raw & 0b11 {
            1 => NameKind::Utf8,
            2 => NameKind::Constant,
            _ => NameKind::Unique,
        }
    }

    /// The per-kind dense index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.raw >> 2
    }

    /// The packed raw value, for hashing and the hash array.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.raw
    }

    /// Well-known handles are minted identically by every table.
    pub fn is_well_known(self) -> bool {
        !self.exists()
            || match self.kind() {
                NameKind::Utf8 => self.index() <= Self::LAST_WELL_KNOWN_UTF8,
                NameKind::Constant => self.index() <= Self::LAST_WELL_KNOWN_CONSTANT,
                NameKind::Unique => false,
            }
    }

    /// Re-tag a handle as minted by `table` without changing its raw value.
    ///
    /// Used by substitution and deep-copy, which know the index is valid in
    /// the destination by construction.
    pub fn retagged(self, table: &NameTable) -> NameRef {
        NameRef::minted(self.raw, table)
    }

    /// The snapshot id that minted this handle. Debug builds only; release
    /// handles carry no provenance.
    #[cfg(debug_assertions)]
    pub fn minted_by(self) -> u32 {
        self.minted_by
    }
}

/// Payload of a constant-namespace name.
#[derive(Clone)]
struct ConstantName {
    original: NameRef,
}

/// Payload of a synthesized unique name.
#[derive(Clone)]
struct UniqueName {
    kind: UniqueNameKind,
    original: NameRef,
    num: u32,
}

/// One fork recorded on a table's deep-clone lineage.
///
/// A handle minted by `parent_id` is valid against this table iff its
/// per-kind index is below the counts recorded at fork time.
#[derive(Copy, Clone)]
struct LineageEntry {
    parent_id: u32,
    utf8_count: u32,
    constant_count: u32,
    unique_count: u32,
}

/// The name interning table.
///
/// Mutation is single-writer: interning while the table is frozen is a fatal
/// error, and there is no internal locking. Shared read access from any
/// number of threads is safe once frozen.
pub struct NameTable {
    id: u32,
    lineage: Vec<LineageEntry>,
    utf8_names: Vec<Box<str>>,
    constant_names: Vec<ConstantName>,
    unique_names: Vec<UniqueName>,
    /// Open-address array of `(stored hash, raw handle)`. Raw 0 means empty.
    names_by_hash: Vec<(u32, u32)>,
    frozen: bool,
}

const INITIAL_HASH_SIZE: usize = 128;

fn fold(h: u64) -> u32 {
    (h ^ (h >> 32)) as u32
}

fn hash_utf8(text: &str) -> u32 {
    let mut hasher = FxHasher::default();
    hasher.write(text.as_bytes());
    fold(hasher.finish())
}

fn hash_constant(original: NameRef) -> u32 {
    let mut hasher = FxHasher::default();
    hasher.write_u32(NameKind::Constant as u32);
    hasher.write_u32(original.raw());
    fold(hasher.finish())
}

fn hash_unique(kind: UniqueNameKind, original: NameRef, num: u32) -> u32 {
    let mut hasher = FxHasher::default();
    hasher.write_u32(NameKind::Unique as u32);
    hasher.write_u32(kind as u32);
    hasher.write_u32(num);
    hasher.write_u32(original.raw());
    fold(hasher.finish())
}

impl NameTable {
    /// Create a table and mint the well-known catalog in its fixed order.
    pub fn new(id: u32) -> NameTable {
        let mut table = NameTable {
            id,
            lineage: Vec::new(),
            utf8_names: Vec::new(),
            constant_names: Vec::new(),
            unique_names: Vec::new(),
            names_by_hash: vec![(0, 0); INITIAL_HASH_SIZE],
            frozen: false,
        };

        let well_known_utf8: [(&str, NameRef); 17] = [
            ("<attached class>", NameRef::ATTACHED),
            ("<singleton class>", NameRef::SINGLETON),
            ("<root>", NameRef::ROOT),
            ("<placeholder>", NameRef::PLACEHOLDER),
            ("Object", NameRef::OBJECT),
            ("Integer", NameRef::INTEGER),
            ("Float", NameRef::FLOAT),
            ("String", NameRef::STRING),
            ("Symbol", NameRef::SYMBOL),
            ("Array", NameRef::ARRAY),
            ("Hash", NameRef::HASH),
            ("True", NameRef::TRUE),
            ("False", NameRef::FALSE),
            ("Nil", NameRef::NIL),
            ("<untyped>", NameRef::UNTYPED),
            ("<top>", NameRef::TOP),
            ("<bottom>", NameRef::BOTTOM),
        ];
        for (text, expected) in well_known_utf8 {
            let entered = table.enter_utf8(text);
            assert_eq!(entered, expected, "well-known name {text:?} out of order");
        }

        let well_known_constants: [(NameRef, NameRef); 15] = [
            (NameRef::ROOT, NameRef::C_ROOT),
            (NameRef::PLACEHOLDER, NameRef::C_PLACEHOLDER),
            (NameRef::OBJECT, NameRef::C_OBJECT),
            (NameRef::INTEGER, NameRef::C_INTEGER),
            (NameRef::FLOAT, NameRef::C_FLOAT),
            (NameRef::STRING, NameRef::C_STRING),
            (NameRef::SYMBOL, NameRef::C_SYMBOL),
            (NameRef::ARRAY, NameRef::C_ARRAY),
            (NameRef::HASH, NameRef::C_HASH),
            (NameRef::TRUE, NameRef::C_TRUE),
            (NameRef::FALSE, NameRef::C_FALSE),
            (NameRef::NIL, NameRef::C_NIL),
            (NameRef::UNTYPED, NameRef::C_UNTYPED),
            (NameRef::TOP, NameRef::C_TOP),
            (NameRef::BOTTOM, NameRef::C_BOTTOM),
        ];
        for (original, expected) in well_known_constants {
            let entered = table.enter_constant(original);
            assert_eq!(entered, expected, "well-known constant out of order");
        }

        table
    }

    /// The snapshot id this table belongs to.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The per-kind name counts recorded when this table forked off
    /// snapshot `parent_id`, if it did. Substitution compares these against
    /// current counts to decide whether the identity fast path applies.
    pub fn fork_point(&self, parent_id: u32) -> Option<(u32, u32, u32)> {
        self.lineage
            .iter()
            .rev()
            .find(|entry| entry.parent_id == parent_id)
            .map(|entry| (entry.utf8_count, entry.constant_count, entry.unique_count))
    }

    /// Re-mint a raw handle against this table, asserting its index is in
    /// range. For substitution fast paths that translate by identity.
    pub fn name_from_raw(&self, raw: u32) -> NameRef {
        let name = NameRef::minted(raw, self);
        if name.exists() {
            let in_range = match name.kind() {
                NameKind::Utf8 => name.index() < self.utf8_count(),
                NameKind::Constant => name.index() < self.constant_count(),
                NameKind::Unique => name.index() < self.unique_count(),
            };
            assert!(in_range, "raw handle {raw:#x} out of range for this table");
        }
        name
    }

    pub fn utf8_count(&self) -> u32 {
        self.utf8_names.len() as u32
    }

    pub fn constant_count(&self) -> u32 {
        self.constant_names.len() as u32
    }

    pub fn unique_count(&self) -> u32 {
        self.unique_names.len() as u32
    }

    /// Total names across all kinds.
    pub fn total_count(&self) -> u32 {
        self.utf8_count() + self.constant_count() + self.unique_count()
    }

    /// Freeze the table against mutation; returns the previous state.
    pub fn freeze(&mut self) -> bool {
        std::mem::replace(&mut self.frozen, true)
    }

    /// Unfreeze the table; returns the previous state.
    pub fn unfreeze(&mut self) -> bool {
        std::mem::replace(&mut self.frozen, false)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Intern `text`, returning the existing handle if already present.
    pub fn enter_utf8(&mut self, text: &str) -> NameRef {
        let hs = hash_utf8(text);
        if let Some(found) = self.probe(hs, |raw| self.utf8_matches(raw, text)) {
            return NameRef::minted(found, self);
        }
        assert!(!self.frozen, "interning {text:?} into a frozen name table");

        self.grow_if_needed();
        let raw = (self.utf8_count() << 2) | NameKind::Utf8 as u32;
        self.insert(hs, raw);
        self.utf8_names.push(text.into());
        NameRef::minted(raw, self)
    }

    /// Look up `text` without interning; absent sentinel on a miss.
    pub fn lookup_utf8(&self, text: &str) -> NameRef {
        let hs = hash_utf8(text);
        match self.probe(hs, |raw| self.utf8_matches(raw, text)) {
            Some(found) => NameRef::minted(found, self),
            None => NameRef::ABSENT,
        }
    }

    /// Wrap an existing spelling as its constant-namespace variant.
    ///
    /// `original` must be a UTF-8 name or a unique name over one.
    pub fn enter_constant(&mut self, original: NameRef) -> NameRef {
        assert!(original.exists(), "constant name over the absent name");
        debug_assert!(
            self.is_valid_constant_original(original),
            "constant name over wrong name kind"
        );
        self.assert_lineage(original);

        let hs = hash_constant(original);
        if let Some(found) = self.probe(hs, |raw| self.constant_matches(raw, original)) {
            return NameRef::minted(found, self);
        }
        assert!(!self.frozen, "interning a constant into a frozen name table");

        self.grow_if_needed();
        let raw = (self.constant_count() << 2) | NameKind::Constant as u32;
        self.insert(hs, raw);
        self.constant_names.push(ConstantName { original });
        NameRef::minted(raw, self)
    }

    /// Intern `text` and wrap it in the constant namespace in one step.
    pub fn enter_constant_utf8(&mut self, text: &str) -> NameRef {
        let original = self.enter_utf8(text);
        self.enter_constant(original)
    }

    /// Look up the constant wrapper of `original`; absent sentinel on a miss.
    pub fn lookup_constant(&self, original: NameRef) -> NameRef {
        if !original.exists() {
            return NameRef::ABSENT;
        }
        let hs = hash_constant(original);
        match self.probe(hs, |raw| self.constant_matches(raw, original)) {
            Some(found) => NameRef::minted(found, self),
            None => NameRef::ABSENT,
        }
    }

    /// Synthesize (or find) the unique name `(kind, original, num)`.
    ///
    /// Sequence numbers are caller-owned and must be positive; the result is
    /// deterministic and distinct per triple.
    pub fn fresh_unique(&mut self, kind: UniqueNameKind, original: NameRef, num: u32) -> NameRef {
        assert!(num > 0, "unique name sequence must be positive");
        assert!(original.exists(), "unique name over the absent name");
        self.assert_lineage(original);

        let hs = hash_unique(kind, original, num);
        if let Some(found) = self.probe(hs, |raw| self.unique_matches(raw, kind, original, num)) {
            return NameRef::minted(found, self);
        }
        assert!(!self.frozen, "interning a unique name into a frozen name table");

        self.grow_if_needed();
        let raw = (self.unique_count() << 2) | NameKind::Unique as u32;
        self.insert(hs, raw);
        self.unique_names.push(UniqueName { kind, original, num });
        NameRef::minted(raw, self)
    }

    /// Look up a unique name without interning; absent sentinel on a miss.
    pub fn lookup_unique(&self, kind: UniqueNameKind, original: NameRef, num: u32) -> NameRef {
        if num == 0 || !original.exists() {
            return NameRef::ABSENT;
        }
        let hs = hash_unique(kind, original, num);
        match self.probe(hs, |raw| self.unique_matches(raw, kind, original, num)) {
            Some(found) => NameRef::minted(found, self),
            None => NameRef::ABSENT,
        }
    }

    /// The original spelling wrapped by a constant name.
    pub fn constant_original(&self, name: NameRef) -> NameRef {
        debug_assert_eq!(name.kind(), NameKind::Constant);
        self.assert_lineage(name);
        self.constant_names[name.index() as usize].original
    }

    /// The `(kind, original, sequence)` triple of a unique name.
    pub fn unique_data(&self, name: NameRef) -> (UniqueNameKind, NameRef, u32) {
        debug_assert_eq!(name.kind(), NameKind::Unique);
        self.assert_lineage(name);
        let data = &self.unique_names[name.index() as usize];
        (data.kind, data.original, data.num)
    }

    /// The underlying UTF-8 spelling, chasing constant/unique wrappers.
    pub fn raw_text(&self, name: NameRef) -> &str {
        self.assert_lineage(name);
        match name.kind() {
            NameKind::Utf8 => &self.utf8_names[name.index() as usize],
            NameKind::Constant => self.raw_text(self.constant_original(name)),
            NameKind::Unique => self.raw_text(self.unique_data(name).1),
        }
    }

    /// Debug rendering, including synthesized structure.
    pub fn to_display(&self, name: NameRef) -> String {
        if !name.exists() {
            return "<absent>".to_owned();
        }
        self.assert_lineage(name);
        match name.kind() {
            NameKind::Utf8 => self.utf8_names[name.index() as usize].to_string(),
            NameKind::Constant => {
                format!("<constant:{}>", self.to_display(self.constant_original(name)))
            }
            NameKind::Unique => {
                let (kind, original, num) = self.unique_data(name);
                match kind {
                    UniqueNameKind::Singleton => {
                        format!("<singleton class:{}>", self.to_display(original))
                    }
                    UniqueNameKind::Overload => {
                        format!("<overload N.{} : {}>", num, self.to_display(original))
                    }
                    _ => format!("{}${num}", self.to_display(original)),
                }
            }
        }
    }

    /// User-facing rendering.
    pub fn show(&self, name: NameRef) -> String {
        if !name.exists() {
            return "<absent>".to_owned();
        }
        self.assert_lineage(name);
        match name.kind() {
            NameKind::Utf8 => self.utf8_names[name.index() as usize].to_string(),
            NameKind::Constant => self.show(self.constant_original(name)),
            NameKind::Unique => {
                let (kind, original, num) = self.unique_data(name);
                match kind {
                    UniqueNameKind::Singleton => format!("<Class:{}>", self.show(original)),
                    UniqueNameKind::Overload => {
                        format!("{} (overload.{num})", self.show(original))
                    }
                    _ => self.show(original),
                }
            }
        }
    }

    /// Deep-copy the table for a forked snapshot.
    ///
    /// Records a lineage entry for `self`, so handles minted before the fork
    /// remain valid against the copy.
    pub fn deep_copy(&self, new_id: u32) -> NameTable {
        let mut lineage = self.lineage.clone();
        lineage.push(LineageEntry {
            parent_id: self.id,
            utf8_count: self.utf8_count(),
            constant_count: self.constant_count(),
            unique_count: self.unique_count(),
        });
        let copy = NameTable {
            id: new_id,
            lineage,
            utf8_names: self.utf8_names.clone(),
            constant_names: self.constant_names.clone(),
            unique_names: self.unique_names.clone(),
            names_by_hash: self.names_by_hash.clone(),
            frozen: false,
        };
        debug_assert!({
            // Payload handles inside the copy are valid by lineage; nothing
            // to re-tag beyond the owning-table check itself.
            copy.sanity_check();
            true
        });
        copy
    }

    /// Expensive internal-consistency check, debug builds only.
    pub fn sanity_check(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        assert!(
            self.names_by_hash.len().is_power_of_two(),
            "name hash table size corruption"
        );
        for &(stored, raw) in &self.names_by_hash {
            if raw == 0 {
                continue;
            }
            let name = NameRef::minted(raw, self);
            assert_eq!(stored, self.hash_of(name), "name hash table corruption");
        }
        for (i, text) in self.utf8_names.iter().enumerate() {
            let found = self.lookup_utf8(text);
            assert_eq!(found.index(), i as u32, "utf8 name {text:?} resolves elsewhere");
        }
    }

    fn is_valid_constant_original(&self, original: NameRef) -> bool {
        match original.kind() {
            NameKind::Utf8 => true,
            NameKind::Unique => self.unique_data(original).1.kind() == NameKind::Utf8,
            NameKind::Constant => false,
        }
    }

    fn utf8_matches(&self, raw: u32, text: &str) -> bool {
        raw & 0b11 == NameKind::Utf8 as u32 && *self.utf8_names[(raw >> 2) as usize] == *text
    }

    fn constant_matches(&self, raw: u32, original: NameRef) -> bool {
        raw & 0b11 == NameKind::Constant as u32
            && self.constant_names[(raw >> 2) as usize].original == original
    }

    fn unique_matches(&self, raw: u32, kind: UniqueNameKind, original: NameRef, num: u32) -> bool {
        if raw & 0b11 != NameKind::Unique as u32 {
            return false;
        }
        let data = &self.unique_names[(raw >> 2) as usize];
        data.kind == kind && data.original == original && data.num == num
    }

    fn hash_of(&self, name: NameRef) -> u32 {
        match name.kind() {
            NameKind::Utf8 => hash_utf8(&self.utf8_names[name.index() as usize]),
            NameKind::Constant => hash_constant(self.constant_original(name)),
            NameKind::Unique => {
                let (kind, original, num) = self.unique_data(name);
                hash_unique(kind, original, num)
            }
        }
    }

    /// Triangular-number probe for a stored handle matching `matches`.
    ///
    /// Returns the raw handle on a hit, `None` once an empty bucket is
    /// reached. Visiting every bucket without finding either is a fatal
    /// internal-consistency error; the doubling policy keeps the table at
    /// most half full, so it should be unreachable.
    fn probe(&self, hs: u32, matches: impl Fn(u32) -> bool) -> Option<u32> {
        let size = self.names_by_hash.len() as u32;
        let mask = size - 1;
        let mut bucket_id = hs & mask;
        let mut probe_count: u32 = 1;

        while self.names_by_hash[bucket_id as usize].1 != 0 {
            let (stored_hash, raw) = self.names_by_hash[bucket_id as usize];
            if stored_hash == hs && matches(raw) {
                return Some(raw);
            }
            assert!(probe_count != size, "name hash table is full");
            bucket_id = (bucket_id + probe_count) & mask;
            probe_count += 1;
        }
        None
    }

    /// Write `(hs, raw)` into the first free bucket of its probe sequence.
    fn insert(&mut self, hs: u32, raw: u32) {
        let size = self.names_by_hash.len() as u32;
        let mask = size - 1;
        let mut bucket_id = hs & mask;
        let mut probe_count: u32 = 1;
        while self.names_by_hash[bucket_id as usize].1 != 0 {
            assert!(probe_count != size, "name hash table is full");
            bucket_id = (bucket_id + probe_count) & mask;
            probe_count += 1;
        }
        self.names_by_hash[bucket_id as usize] = (hs, raw);
    }

    /// Double the hash array when the next insert would exceed half load.
    ///
    /// Stored hash values are rehomed as-is; per-kind indices (and hence
    /// previously returned handles) are untouched.
    fn grow_if_needed(&mut self) {
        let used = self.total_count() as usize;
        if 2 * (used + 1) < self.names_by_hash.len() {
            return;
        }
        let new_size = self.names_by_hash.len() * 2;
        tracing::debug!(old = self.names_by_hash.len(), new = new_size, "growing name hash table");

        let mut rehomed = vec![(0u32, 0u32); new_size];
        let mask = new_size as u32 - 1;
        for &(hs, raw) in &self.names_by_hash {
            if raw == 0 {
                continue;
            }
            let mut bucket_id = hs & mask;
            let mut probe_count: u32 = 1;
            while rehomed[bucket_id as usize].1 != 0 {
                bucket_id = (bucket_id + probe_count) & mask;
                probe_count += 1;
            }
            rehomed[bucket_id as usize] = (hs, raw);
        }
        self.names_by_hash = rehomed;
    }

    /// Debug check that `name` was minted by this table or an ancestor
    /// recorded on the deep-clone lineage.
    #[cfg(debug_assertions)]
    fn assert_lineage(&self, name: NameRef) {
        if name.is_well_known() || name.minted_by == self.id {
            return;
        }
        let valid = self.lineage.iter().any(|entry| {
            entry.parent_id == name.minted_by
                && name.index()
                    < match name.kind() {
                        NameKind::Utf8 => entry.utf8_count,
                        NameKind::Constant => entry.constant_count,
                        NameKind::Unique => entry.unique_count,
                    }
        });
        assert!(
            valid,
            "name {:?} minted by snapshot {} used against snapshot {}",
            name, name.minted_by, self.id
        );
    }

    #[cfg(not(debug_assertions))]
    #[inline]
    fn assert_lineage(&self, _name: NameRef) {}
}
