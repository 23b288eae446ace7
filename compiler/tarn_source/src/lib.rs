//! Name interning and file tables for the Tarn type checker.
//!
//! This is the leaf crate of the semantic core. It owns the two tables every
//! other layer builds on:
//!
//! - [`NameTable`]: interns identifier spellings into stable [`NameRef`]
//!   handles (UTF-8 text, "constant namespace" wrappers, and synthesized
//!   unique names for compiler-internal temporaries).
//! - [`FileTable`]: the file arena behind [`FileRef`] handles, with derived
//!   line-break tables and [`Loc`] resolution.
//!
//! Handles are dense `u32` indices, never pointers, and are only valid
//! against the table snapshot that minted them. In debug builds every
//! [`NameRef`] carries the id of its minting table and dereferences
//! revalidate it against the table's deep-clone lineage.

/// Compile-time size assertion for handle and payload types.
///
/// Fails to compile if the type's size changes, preventing accidental
/// regressions in types that are stored by the million.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

mod files;
mod loc;
mod names;

pub use files::{File, FileRef, FileTable, SourceKind};
pub use loc::Loc;
pub use names::{NameKind, NameRef, NameTable, UniqueNameKind, WELL_KNOWN_TABLE_ID};

// Size assertions to prevent accidental regressions. NameRef and Loc are
// stored inside every symbol and type; their release-mode sizes matter.
#[cfg(all(target_pointer_width = "64", not(debug_assertions)))]
mod size_asserts {
    use super::{FileRef, Loc, NameRef};
    static_assert_size!(NameRef, 4);
    static_assert_size!(FileRef, 4);
    static_assert_size!(Loc, 12);
}
