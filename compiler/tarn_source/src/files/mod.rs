//! File arena.
//!
//! Files are stored behind [`FileRef`] handles in a dense arena whose slot 0
//! is the absent-file sentinel. Payloads sit behind `Arc` so forked
//! snapshots share file contents instead of copying them.

use std::sync::Arc;

use rustc_hash::FxHashMap;

/// What a file slot holds.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum SourceKind {
    /// Ordinary source text.
    Normal,
    /// Preloaded payload definitions (the standard library skeleton).
    Payload,
    /// A declaration-interface file.
    Interface,
    /// A reserved slot whose contents have not been read yet.
    NotYetRead,
}

/// Stable handle into the file arena. Index 0 is the absent sentinel.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct FileRef(u32);

impl FileRef {
    pub const ABSENT: FileRef = FileRef(0);

    #[inline]
    pub const fn exists(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Handle for slot `index`; index 0 is the absent sentinel slot.
    #[inline]
    pub const fn from_index(index: u32) -> FileRef {
        FileRef(index)
    }
}

impl std::fmt::Debug for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.exists() {
            write!(f, "FileRef({})", self.0)
        } else {
            write!(f, "FileRef(<absent>)")
        }
    }
}

/// One source file: path, text, and the derived line-break offset table.
pub struct File {
    path: String,
    source: String,
    /// Byte offsets of every `\n` in `source`.
    line_breaks: Vec<u32>,
    kind: SourceKind,
}

impl File {
    pub fn new(path: String, source: String, kind: SourceKind) -> File {
        let line_breaks = source
            .bytes()
            .enumerate()
            .filter(|&(_, b)| b == b'\n')
            .map(|(i, _)| i as u32)
            .collect();
        File {
            path,
            source,
            line_breaks,
            kind,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn line_breaks(&self) -> &[u32] {
        &self.line_breaks
    }

    /// Number of lines (a trailing fragment without `\n` counts as a line).
    pub fn line_count(&self) -> u32 {
        self.line_breaks.len() as u32 + 1
    }

    /// Translate a byte offset into 1-based `(line, column)`.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        debug_assert!(offset as usize <= self.source.len(), "offset past end of file");
        let line = self.line_breaks.partition_point(|&brk| brk < offset) as u32;
        let line_start = if line == 0 {
            0
        } else {
            self.line_breaks[line as usize - 1] + 1
        };
        (line + 1, offset - line_start + 1)
    }
}

/// The file arena: dense slots plus a path index.
///
/// Single-writer like the name table; registering a file while the table is
/// frozen is a fatal error.
pub struct FileTable {
    files: Vec<Arc<File>>,
    by_path: FxHashMap<String, FileRef>,
    frozen: bool,
}

impl FileTable {
    pub fn new() -> FileTable {
        FileTable {
            // Slot 0 backs the absent sentinel.
            files: vec![Arc::new(File::new(String::new(), String::new(), SourceKind::NotYetRead))],
            by_path: FxHashMap::default(),
            frozen: false,
        }
    }

    /// Number of slots, sentinel included.
    pub fn count(&self) -> u32 {
        self.files.len() as u32
    }

    pub fn freeze(&mut self) -> bool {
        std::mem::replace(&mut self.frozen, true)
    }

    pub fn unfreeze(&mut self) -> bool {
        std::mem::replace(&mut self.frozen, false)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Register a file payload in the next free slot.
    pub fn enter(&mut self, file: Arc<File>) -> FileRef {
        assert!(!self.frozen, "registering {:?} in a frozen file table", file.path());
        debug_assert!(
            !self.by_path.contains_key(file.path()),
            "file {:?} registered twice",
            file.path()
        );
        let handle = FileRef(self.files.len() as u32);
        self.by_path.insert(file.path().to_owned(), handle);
        self.files.push(file);
        handle
    }

    /// Convenience wrapper building a [`SourceKind::Normal`] payload.
    pub fn enter_source(&mut self, path: &str, source: &str) -> FileRef {
        self.enter(Arc::new(File::new(
            path.to_owned(),
            source.to_owned(),
            SourceKind::Normal,
        )))
    }

    /// Reserve a slot for a path whose contents will arrive later.
    pub fn reserve(&mut self, path: &str) -> FileRef {
        self.enter(Arc::new(File::new(
            path.to_owned(),
            String::new(),
            SourceKind::NotYetRead,
        )))
    }

    /// Fill a previously reserved slot.
    ///
    /// The slot must hold a not-yet-read tombstone for the same path.
    pub fn fill_reserved(&mut self, handle: FileRef, file: Arc<File>) -> FileRef {
        assert!(!self.frozen, "filling a slot in a frozen file table");
        let slot = &mut self.files[handle.index() as usize];
        assert_eq!(slot.kind(), SourceKind::NotYetRead, "slot already holds contents");
        assert_eq!(slot.path(), file.path(), "slot reserved for a different path");
        *slot = file;
        handle
    }

    /// The payload behind a handle.
    pub fn file(&self, handle: FileRef) -> &Arc<File> {
        debug_assert!(handle.exists(), "dereferencing the absent file");
        &self.files[handle.index() as usize]
    }

    /// Look a path up; absent sentinel on a miss.
    pub fn lookup_path(&self, path: &str) -> FileRef {
        self.by_path.get(path).copied().unwrap_or(FileRef::ABSENT)
    }

    /// Shallow copy for a forked snapshot; payloads are shared.
    pub fn deep_copy(&self) -> FileTable {
        FileTable {
            files: self.files.clone(),
            by_path: self.by_path.clone(),
            frozen: false,
        }
    }

    /// Whether two tables share the payload in a slot (used by substitution
    /// to skip copying).
    pub fn shares_slot(&self, other: &FileTable, index: u32) -> bool {
        (index as usize) < self.files.len()
            && (index as usize) < other.files.len()
            && Arc::ptr_eq(&self.files[index as usize], &other.files[index as usize])
    }
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}
