//! How much of a pack triplet [`OpenOptions::open`] loads.

use std::path::{Path, PathBuf};

use crate::enumerate::{IndexEnumerator, NativeIndexReader, ShowIndex};
use crate::error::{IndexError, OpenError};
use crate::index::Index;

/// Builder controlling how much of a pack triplet is loaded.
///
/// ```no_run
/// use git_packfile::OpenOptions;
///
/// let index = OpenOptions::new()
///     .native_index()
///     .load_bitmap(true)
///     .open("pack-0123456789abcdef0123456789abcdef01234567.idx")?;
/// println!("{} bitmap commits", index.bitmap_commit_count());
/// # Ok::<(), git_packfile::OpenError>(())
/// ```
pub struct OpenOptions {
    enumerator: Box<dyn IndexEnumerator>,
    load_bitmap: bool,
    label_types: bool,
}

impl OpenOptions {
    /// Index only, enumerated with `git show-index` from `PATH`.
    pub fn new() -> Self {
        Self {
            enumerator: Box::new(ShowIndex::default()),
            load_bitmap: false,
            label_types: false,
        }
    }

    /// Use a custom index enumerator.
    pub fn enumerator(mut self, enumerator: impl IndexEnumerator + 'static) -> Self {
        self.enumerator = Box::new(enumerator);
        self
    }

    /// Decode the `.idx` in-process instead of running git.
    pub fn native_index(self) -> Self {
        self.enumerator(NativeIndexReader)
    }

    /// Run `git show-index` from the given binary.
    pub fn git_binary(self, git: impl Into<PathBuf>) -> Self {
        self.enumerator(ShowIndex::with_binary(git))
    }

    /// Also load the `.bitmap`.
    pub fn load_bitmap(mut self, yes: bool) -> Self {
        self.load_bitmap = yes;
        self
    }

    /// Also label object types. Implies [`load_bitmap`](Self::load_bitmap).
    pub fn label_types(mut self, yes: bool) -> Self {
        self.label_types = yes;
        self
    }

    /// Open only the index, ignoring the bitmap settings.
    pub fn open_index(&self, idx_path: impl AsRef<Path>) -> Result<Index, IndexError> {
        Index::open_with(idx_path, self.enumerator.as_ref())
    }

    /// Open the index and run the configured follow-up steps.
    pub fn open(&self, idx_path: impl AsRef<Path>) -> Result<Index, OpenError> {
        let mut index = self.open_index(idx_path)?;
        if self.load_bitmap || self.label_types {
            index.load_bitmap()?;
        }
        if self.label_types {
            index.label_object_types()?;
        }
        Ok(index)
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::new()
    }
}
