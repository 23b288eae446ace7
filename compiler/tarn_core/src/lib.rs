//! The semantic core of the Tarn type checker.
//!
//! One [`GlobalState`] value is one complete, internally consistent snapshot
//! of the model: the name table, the file table, and the symbol arena. Types
//! are immutable [`TypePtr`] trees over symbol handles; generic call sites
//! are instantiated by solving a small local [`TypeConstraint`]; forked
//! snapshots reconcile their name handles through [`NameSubstitution`].
//!
//! Identity and sharing invariants (every other subsystem depends on them):
//!
//! - Handles are dense indices, valid only against the snapshot that minted
//!   them (names additionally lineage-checked in debug builds).
//! - Tables mutate only while explicitly unfrozen, single-writer; frozen
//!   tables are freely shared across threads without locks.
//! - `TypePtr` payloads are never mutated in place; transformations build
//!   new, possibly shared subtrees bottom-up. The atomic reference count is
//!   the only concurrently mutated state in the core.

pub mod constraint;
pub mod global_state;
pub mod substitute;
pub mod symbols;
pub mod types;

pub use constraint::TypeConstraint;
pub use global_state::GlobalState;
pub use substitute::{LazyNameSubstitution, NameSubstitution};
pub use symbols::{FuzzySearchResult, Symbol, SymbolFlags, SymbolRef, Variance};
pub use types::{LiteralValue, Type, TypePtr};

// Size assertions to prevent accidental regressions. Symbols and types are
// allocated by the hundred thousand on real codebases.
#[cfg(target_pointer_width = "64")]
mod size_asserts {
    use super::{SymbolRef, TypePtr};
    tarn_source::static_assert_size!(SymbolRef, 4);
    tarn_source::static_assert_size!(TypePtr, 8);
    tarn_source::static_assert_size!(Option<TypePtr>, 8);
}
