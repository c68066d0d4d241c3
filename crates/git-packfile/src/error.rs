//! Error types for every layer of the pack reader.

use std::io;
use std::path::PathBuf;

use git_hash::ObjectId;

use crate::object::ObjectType;

/// Failures of the trailer and hashfile readers.
///
/// Both readers implement [`std::io::Read`], so these errors travel inside an
/// [`io::Error`] of kind [`io::ErrorKind::InvalidData`]; use
/// [`HashfileError::from_io`] to get them back out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashfileError {
    #[error("input ended before {expected} trailer bytes were available (got {actual})")]
    TrailerTooSmall { expected: usize, actual: usize },

    #[error("trailer requested before end of content")]
    TrailerNotReady,

    #[error("hashfile checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: ObjectId, actual: ObjectId },

    #[error("malformed hashfile: input shorter than its checksum trailer")]
    MalformedHashfile,

    #[error("SHA-1 collision detected while hashing content")]
    Sha1Collision,
}

impl HashfileError {
    /// Recover a hashfile error carried inside an `io::Error`, if any.
    pub fn from_io(err: &io::Error) -> Option<&HashfileError> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<HashfileError>())
    }
}

impl From<HashfileError> for io::Error {
    fn from(err: HashfileError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

/// Errors from decoding or combining EWAH bitmaps.
#[derive(Debug, thiserror::Error)]
pub enum EwahError {
    #[error("EWAH bitmap too large: {bits} bits in {words} words")]
    BitmapOverflow { bits: u32, words: u32 },

    #[error("malformed EWAH bitmap: {reason}")]
    BitmapMalformed { reason: String },

    #[error("cannot XOR bitmaps of different widths ({left} vs {right} bits)")]
    BitmapWidthMismatch { left: u32, right: u32 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors from opening a pack index and its pack.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("not a pack index path: {0}")]
    BadIndexPath(PathBuf),

    #[error("pack index too small: {0}")]
    IndexTooSmall(PathBuf),

    #[error("invalid pack index {path}: {reason}")]
    InvalidIndex { path: PathBuf, reason: String },

    #[error("pack index trailer names pack {actual}, expected {expected}")]
    PackIdMismatch { expected: ObjectId, actual: ObjectId },

    #[error("pack file missing for index: {0}")]
    PackMissing(PathBuf),

    #[error("bad pack signature in {0}")]
    BadPackSignature(PathBuf),

    #[error("pack trailer names pack {actual}, expected {expected}")]
    BadPackTrailer { expected: ObjectId, actual: ObjectId },

    #[error("malformed index line {line}: {reason}")]
    MalformedIndexLine { line: usize, reason: String },

    #[error("index entries not in ascending OID order at line {line}")]
    UnsortedIndex { line: usize },

    #[error("object {oid} at offset {offset} lies beyond pack data ending at {limit}")]
    OffsetOutOfRange {
        oid: ObjectId,
        offset: u64,
        limit: u64,
    },

    #[error("pack has {expected} objects but index enumerated {actual}")]
    IndexObjectCountMismatch { expected: u32, actual: usize },

    #[error("index enumeration failed: {0}")]
    Enumerator(#[from] git_utils::UtilError),

    #[error(transparent)]
    Hashfile(HashfileError),

    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for IndexError {
    fn from(err: io::Error) -> Self {
        match HashfileError::from_io(&err) {
            Some(inner) => IndexError::Hashfile(inner.clone()),
            None => IndexError::Io(err),
        }
    }
}

/// Errors from loading or querying a `.bitmap`.
#[derive(Debug, thiserror::Error)]
pub enum BitmapError {
    #[error("bitmap file missing: {0}")]
    BitmapMissing(PathBuf),

    #[error("bad bitmap signature")]
    BadBitmapSignature,

    #[error("unknown bitmap flags {0:#06x}")]
    UnknownBitmapFlag(u16),

    #[error("bitmap lacks the FULL_DAG flag")]
    BitmapNotFullDag,

    #[error("bitmap names pack {actual}, expected {expected}")]
    BitmapPackMismatch { expected: ObjectId, actual: ObjectId },

    #[error("{object_type} bitmap has {bits} bits but the pack has {objects} objects")]
    TypeBitmapTooWide {
        object_type: ObjectType,
        bits: u32,
        objects: usize,
    },

    #[error("bitmap commit position {position} out of range for {objects} objects")]
    BitmapCommitOutOfRange { position: u32, objects: usize },

    #[error("trailing bytes after bitmap content")]
    TrailingBitmapBytes,

    #[error("bitmap checksum mismatch: expected {expected}, got {actual}")]
    BitmapChecksumMismatch { expected: ObjectId, actual: ObjectId },

    #[error("malformed bitmap file: {0}")]
    MalformedHashfile(HashfileError),

    #[error("bitmap commit {index} has XOR offset {xor_offset} reaching before the first commit")]
    BitmapXorOutOfRange { index: usize, xor_offset: u8 },

    #[error("bitmap commit index {index} out of range ({count} commits)")]
    BitmapCommitIndexOutOfRange { index: usize, count: usize },

    #[error("no bitmap for commit {0}")]
    BitmapCommitNotFound(ObjectId),

    #[error("no bitmap loaded")]
    NoBitmap,

    #[error(transparent)]
    Ewah(EwahError),

    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for BitmapError {
    fn from(err: io::Error) -> Self {
        match HashfileError::from_io(&err) {
            Some(HashfileError::ChecksumMismatch { expected, actual }) => {
                BitmapError::BitmapChecksumMismatch {
                    expected: *expected,
                    actual: *actual,
                }
            }
            Some(other) => BitmapError::MalformedHashfile(other.clone()),
            None => BitmapError::Io(err),
        }
    }
}

impl From<EwahError> for BitmapError {
    fn from(err: EwahError) -> Self {
        match err {
            EwahError::Io(io) => io.into(),
            other => BitmapError::Ewah(other),
        }
    }
}

/// Errors from object-type labelling.
#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("no bitmap loaded")]
    NoBitmap,

    #[error("object {position} labelled {previous} and {new}")]
    ConflictingTypeLabel {
        position: usize,
        previous: ObjectType,
        new: ObjectType,
    },

    #[error("object {0} has no type bit set")]
    UnlabeledObject(usize),

    #[error("{object_type} bitmap sets bit {position} beyond {objects} objects")]
    PositionOutOfRange {
        object_type: ObjectType,
        position: usize,
        objects: usize,
    },

    #[error(transparent)]
    Ewah(#[from] EwahError),
}

/// Any failure of [`OpenOptions::open`](crate::OpenOptions::open).
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Bitmap(#[from] BitmapError),

    #[error(transparent)]
    Label(#[from] LabelError),
}

/// Non-fatal anomalies noticed while loading an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexWarning {
    /// Two objects claim the same pack offset; they were ordered by OID.
    DuplicateOffset {
        offset: u64,
        first: ObjectId,
        second: ObjectId,
    },
}
