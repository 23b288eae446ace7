//! Source locations.

use crate::files::{FileRef, FileTable};

/// A byte range within one file.
///
/// Layout: 12 bytes. `NONE` (absent file) marks synthesized entities with no
/// source location.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Loc {
    pub file: FileRef,
    pub begin: u32,
    pub end: u32,
}

impl Loc {
    /// The no-location sentinel for synthesized entities.
    pub const NONE: Loc = Loc {
        file: FileRef::ABSENT,
        begin: 0,
        end: 0,
    };

    pub const fn new(file: FileRef, begin: u32, end: u32) -> Loc {
        Loc { file, begin, end }
    }

    #[inline]
    pub const fn exists(self) -> bool {
        self.file.exists()
    }

    /// Render as `path:line:col`, or `???` for the sentinel.
    pub fn show(self, files: &FileTable) -> String {
        if !self.exists() {
            return "???".to_owned();
        }
        let file = files.file(self.file);
        let (line, col) = file.line_col(self.begin);
        format!("{}:{line}:{col}", file.path())
    }
}

impl std::fmt::Debug for Loc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.exists() {
            write!(f, "Loc({:?}, {}..{})", self.file, self.begin, self.end)
        } else {
            write!(f, "Loc(<none>)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn none_does_not_exist() {
        assert!(!Loc::NONE.exists());
    }

    #[test]
    fn show_resolves_line_and_column() {
        let mut files = FileTable::new();
        let file = files.enter_source("pkg/main.tn", "a = 1\nb = 2\n");
        let loc = Loc::new(file, 8, 9);
        assert_eq!(loc.show(&files), "pkg/main.tn:2:3");
        assert_eq!(Loc::NONE.show(&files), "???");
    }
}
