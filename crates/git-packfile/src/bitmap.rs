//! `.bitmap` files: per-type object bitmaps and per-commit reachability
//! bitmaps, indexed by pack order.
//!
//! File format (big-endian, framed as a hashfile):
//! ```text
//! Header:  "BITM" | version 1 (2) | flags (2) | commit count (4) | pack id (20)
//! Types:   commits, trees, blobs, tags (4 × EWAH)
//! Commits: [pack position (4) | xor offset (1) | flags (1) | EWAH]*
//! Cache:   object count × 4-byte name hashes (HASH_CACHE only)
//! Trailer: SHA-1 of everything above
//! ```

use std::fs::File;
use std::io::{self, Read};

use git_hash::{ObjectId, SHA1_LEN};

use crate::error::BitmapError;
use crate::ewah::Bitmap;
use crate::hashfile::HashfileReader;
use crate::index::Index;
use crate::object::{Object, ObjectType};
use crate::{BITMAP_OPT_FULL_DAG, BITMAP_OPT_HASH_CACHE, BITMAP_SIGNATURE};

const KNOWN_FLAGS: u16 = BITMAP_OPT_FULL_DAG | BITMAP_OPT_HASH_CACHE;

/// A commit with a stored reachability bitmap.
#[derive(Debug, Clone)]
pub struct BitmapCommit {
    oid: ObjectId,
    xor_offset: u8,
    flags: u8,
    bitmap: Bitmap,
}

impl BitmapCommit {
    pub fn oid(&self) -> ObjectId {
        self.oid
    }

    /// Distance back to the commit this bitmap is XOR'd against; 0 for none.
    pub fn xor_offset(&self) -> u8 {
        self.xor_offset
    }

    /// Per-commit flags, kept as stored.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// The bitmap as stored, or fully resolved once returned by
    /// [`Index::bitmap_commit`].
    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }
}

/// In-memory form of a `.bitmap` file.
#[derive(Debug, Clone)]
pub struct IndexBitmap {
    flags: u16,
    commits: Bitmap,
    trees: Bitmap,
    blobs: Bitmap,
    tags: Bitmap,
    bitmap_commits: Vec<BitmapCommit>,
    /// Entries `[0, resolved)` of `bitmap_commits` have their XOR chains applied.
    resolved: usize,
}

impl IndexBitmap {
    /// Parse a `.bitmap` stream for `index`, verifying its trailing checksum.
    ///
    /// The four type bitmaps are materialized eagerly; commit bitmaps stay
    /// compressed until resolved.
    pub fn read_from<R: Read>(reader: R, index: &Index) -> Result<Self, BitmapError> {
        let mut r = HashfileReader::new(reader);
        let num_objects = index.len();

        let mut header = [0u8; 12 + SHA1_LEN];
        r.read_exact(&mut header)?;
        if &header[..6] != BITMAP_SIGNATURE {
            return Err(BitmapError::BadBitmapSignature);
        }

        let flags = u16::from_be_bytes([header[6], header[7]]);
        if flags & !KNOWN_FLAGS != 0 {
            return Err(BitmapError::UnknownBitmapFlag(flags & !KNOWN_FLAGS));
        }
        if flags & BITMAP_OPT_FULL_DAG == 0 {
            return Err(BitmapError::BitmapNotFullDag);
        }

        let commit_count = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);

        let mut pack_id = [0u8; SHA1_LEN];
        pack_id.copy_from_slice(&header[12..]);
        let pack_id = ObjectId::from(pack_id);
        if pack_id != *index.id().as_oid() {
            return Err(BitmapError::BitmapPackMismatch {
                expected: *index.id().as_oid(),
                actual: pack_id,
            });
        }

        let mut type_bitmap = |object_type: ObjectType| -> Result<Bitmap, BitmapError> {
            let mut bitmap = Bitmap::read_from(&mut r)?;
            if bitmap.bits() as usize > num_objects {
                return Err(BitmapError::TypeBitmapTooWide {
                    object_type,
                    bits: bitmap.bits(),
                    objects: num_objects,
                });
            }
            bitmap.materialize()?;
            Ok(bitmap)
        };
        let commits = type_bitmap(ObjectType::Commit)?;
        let trees = type_bitmap(ObjectType::Tree)?;
        let blobs = type_bitmap(ObjectType::Blob)?;
        let tags = type_bitmap(ObjectType::Tag)?;

        let mut bitmap_commits = Vec::with_capacity(commit_count.min(1 << 16) as usize);
        for _ in 0..commit_count {
            let mut entry = [0u8; 6];
            r.read_exact(&mut entry)?;
            let position = u32::from_be_bytes([entry[0], entry[1], entry[2], entry[3]]);
            let bitmap = Bitmap::read_from(&mut r)?;
            let oid = index
                .object_at(position as usize)
                .map(|o| o.oid)
                .ok_or(BitmapError::BitmapCommitOutOfRange {
                    position,
                    objects: num_objects,
                })?;
            bitmap_commits.push(BitmapCommit {
                oid,
                xor_offset: entry[4],
                flags: entry[5],
                bitmap,
            });
        }

        if flags & BITMAP_OPT_HASH_CACHE != 0 {
            let cache_len = num_objects as u64 * 4;
            let skipped = io::copy(&mut (&mut r).take(cache_len), &mut io::sink())?;
            if skipped != cache_len {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "bitmap hash cache truncated",
                )
                .into());
            }
        }

        let mut probe = [0u8; 1];
        if r.read(&mut probe)? != 0 {
            return Err(BitmapError::TrailingBitmapBytes);
        }

        Ok(Self {
            flags,
            commits,
            trees,
            blobs,
            tags,
            bitmap_commits,
            resolved: 0,
        })
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn has_hash_cache(&self) -> bool {
        self.flags & BITMAP_OPT_HASH_CACHE != 0
    }

    /// The bitmap of objects of type `object_type`; `None` for `Unknown`.
    pub fn type_bitmap(&self, object_type: ObjectType) -> Option<&Bitmap> {
        match object_type {
            ObjectType::Commit => Some(&self.commits),
            ObjectType::Tree => Some(&self.trees),
            ObjectType::Blob => Some(&self.blobs),
            ObjectType::Tag => Some(&self.tags),
            ObjectType::Unknown => None,
        }
    }

    pub fn commit_count(&self) -> usize {
        self.bitmap_commits.len()
    }

    /// Commits in file order. Only the first [`resolved_count`](Self::resolved_count)
    /// carry fully resolved bitmaps.
    pub fn commits(&self) -> &[BitmapCommit] {
        &self.bitmap_commits
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved
    }

    /// Position of the entry for `oid` in the commit table.
    pub fn find_commit(&self, oid: &ObjectId) -> Option<usize> {
        self.bitmap_commits.iter().position(|c| c.oid == *oid)
    }

    /// Resolve XOR chains for every entry up to and including `index`.
    ///
    /// Entries are processed in ascending order, so each XOR base is already
    /// resolved when it is needed. Earlier work is kept; later calls only
    /// process entries not yet resolved.
    pub fn resolve(&mut self, index: usize) -> Result<&BitmapCommit, BitmapError> {
        if index >= self.bitmap_commits.len() {
            return Err(BitmapError::BitmapCommitIndexOutOfRange {
                index,
                count: self.bitmap_commits.len(),
            });
        }

        while self.resolved <= index {
            let j = self.resolved;
            let xor_offset = self.bitmap_commits[j].xor_offset;
            if xor_offset as usize > j {
                return Err(BitmapError::BitmapXorOutOfRange {
                    index: j,
                    xor_offset,
                });
            }

            let (done, rest) = self.bitmap_commits.split_at_mut(j);
            let current = &mut rest[0].bitmap;
            current.materialize()?;
            if xor_offset > 0 {
                current.xor(&done[j - xor_offset as usize].bitmap)?;
            }
            self.resolved += 1;
        }

        Ok(&self.bitmap_commits[index])
    }
}

impl Index {
    /// Load `<stem>.bitmap` and attach it. Idempotent.
    pub fn load_bitmap(&mut self) -> Result<(), BitmapError> {
        if self.bitmap.is_some() {
            return Ok(());
        }

        let path = self.bitmap_path();
        let file = File::open(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => BitmapError::BitmapMissing(path.clone()),
            _ => BitmapError::from(err),
        })?;
        let bitmap = IndexBitmap::read_from(file, self)?;

        tracing::debug!(
            pack = %self.id,
            commits = bitmap.commit_count(),
            flags = bitmap.flags(),
            "loaded pack bitmap"
        );
        self.bitmap = Some(bitmap);
        Ok(())
    }

    /// Number of commits with stored bitmaps; 0 when no bitmap is loaded.
    pub fn bitmap_commit_count(&self) -> usize {
        self.bitmap.as_ref().map_or(0, IndexBitmap::commit_count)
    }

    /// The `i`-th bitmap commit with its XOR chain resolved.
    pub fn bitmap_commit(&mut self, i: usize) -> Result<&BitmapCommit, BitmapError> {
        self.bitmap.as_mut().ok_or(BitmapError::NoBitmap)?.resolve(i)
    }

    /// Every object reachable from `commit`, in pack order.
    pub fn reachable_objects(&mut self, commit: &ObjectId) -> Result<Vec<Object>, BitmapError> {
        let mut out = Vec::new();
        self.for_each_reachable(commit, |object| {
            out.push(*object);
            Ok(())
        })?;
        Ok(out)
    }

    /// Call `f` for every object reachable from `commit`, in pack order.
    pub fn for_each_reachable<F>(&mut self, commit: &ObjectId, mut f: F) -> Result<(), BitmapError>
    where
        F: FnMut(&Object) -> Result<(), BitmapError>,
    {
        let bitmap = self.bitmap.as_mut().ok_or(BitmapError::NoBitmap)?;
        let entry = bitmap
            .find_commit(commit)
            .ok_or(BitmapError::BitmapCommitNotFound(*commit))?;
        let resolved = bitmap.resolve(entry)?;

        let objects = &self.objects;
        let order = &self.packfile_order;
        resolved.bitmap().scan(|position| {
            let index_pos = order.get(position as usize).ok_or_else(|| {
                BitmapError::BitmapCommitOutOfRange {
                    position,
                    objects: objects.len(),
                }
            })?;
            f(&objects[*index_pos])
        })
    }
}
