//! Read-only loading of pack indexes and their reachability bitmaps.
//!
//! Given `pack-<id>.idx`, this crate checks that the index, the `.pack`, and
//! (optionally) the `.bitmap` all belong to the same pack, enumerates the
//! pack's objects, orders them by pack offset, decodes the EWAH bitmaps, and
//! uses the per-type bitmaps to label every object with its type. Object
//! data is never inflated.
//!
//! ```no_run
//! use git_packfile::OpenOptions;
//!
//! let index = OpenOptions::new()
//!     .label_types(true)
//!     .open("objects/pack/pack-0123456789abcdef0123456789abcdef01234567.idx")?;
//! for object in index.objects_in_pack_order() {
//!     println!("{object}");
//! }
//! # Ok::<(), git_packfile::OpenError>(())
//! ```

pub mod bitmap;
pub mod enumerate;
pub mod error;
pub mod ewah;
pub mod hashfile;
pub mod index;
mod label;
pub mod object;
mod options;
pub mod trailer;

use std::path::Path;

pub use bitmap::{BitmapCommit, IndexBitmap};
pub use enumerate::{IndexEnumerator, NativeIndexReader, ShowIndex};
pub use error::{
    BitmapError, EwahError, HashfileError, IndexError, IndexWarning, LabelError, OpenError,
};
pub use ewah::Bitmap;
pub use hashfile::HashfileReader;
pub use index::{Index, TypeCounts};
pub use object::{Object, ObjectType, PackId};
pub use options::OpenOptions;
pub use trailer::TrailerReader;

/// Pack header: `PACK` followed by version 2.
pub const PACK_SIGNATURE: &[u8; 8] = b"PACK\x00\x00\x00\x02";
pub const PACK_HEADER_SIZE: usize = 12;

/// Pack index v2 constants.
pub const IDX_SIGNATURE: [u8; 4] = [0xff, 0x74, 0x4f, 0x63]; // "\377tOc"
pub const IDX_VERSION: u32 = 2;

/// Bitmap header: `BITM` followed by version 1.
pub const BITMAP_SIGNATURE: &[u8; 6] = b"BITM\x00\x01";

/// Every reachable object has a bit; required.
pub const BITMAP_OPT_FULL_DAG: u16 = 0x1;
/// A name-hash cache follows the commit bitmaps.
pub const BITMAP_OPT_HASH_CACHE: u16 = 0x4;

/// Open `pack-<id>.idx` with default options (index only, via `git show-index`).
pub fn open_index(idx_path: impl AsRef<Path>) -> Result<Index, IndexError> {
    OpenOptions::new().open_index(idx_path)
}
