//! Loading a pack index and ordering its objects by pack offset.
//!
//! Loading checks three independent sources of the pack id against each
//! other: the `pack-<id>.idx` file name, the pack checksum stored near the
//! end of the `.idx`, and the trailer of the `.pack` itself.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use git_hash::{ObjectId, SHA1_LEN};
use regex::Regex;

use crate::bitmap::IndexBitmap;
use crate::enumerate::{parse_index_line, IndexEnumerator};
use crate::error::{IndexError, IndexWarning};
use crate::hashfile::HashfileReader;
use crate::object::{Object, ObjectType, PackId};
use crate::{PACK_HEADER_SIZE, PACK_SIGNATURE};

fn pack_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?s)(.*)pack-([0-9a-f]{40})\.idx$").expect("static regex is valid")
    })
}

/// Split `<prefix>pack-<id>.idx` into the path stem and the pack id.
pub fn parse_index_path(idx_path: &Path) -> Result<(PathBuf, PackId), IndexError> {
    let bad_path = || IndexError::BadIndexPath(idx_path.to_path_buf());
    let text = idx_path.to_str().ok_or_else(bad_path)?;
    let caps = pack_path_regex().captures(text).ok_or_else(bad_path)?;
    let id = ObjectId::from_hex(&caps[2]).map_err(|_| bad_path())?;
    let stem = format!("{}pack-{}", &caps[1], &caps[2]);
    Ok((PathBuf::from(stem), PackId::new(id)))
}

/// All objects of one pack, in index order and in pack order.
#[derive(Debug)]
pub struct Index {
    pub(crate) id: PackId,
    pub(crate) pack_base: PathBuf,
    /// Index order: ascending by OID.
    pub(crate) objects: Vec<Object>,
    /// Pack order: `objects` positions sorted by ascending offset.
    pub(crate) packfile_order: Vec<usize>,
    /// Inverse of `packfile_order`: pack position of each index position.
    pub(crate) pack_rank: Vec<usize>,
    pub(crate) bitmap: Option<IndexBitmap>,
    pub(crate) labelled: bool,
    pub(crate) warnings: Vec<IndexWarning>,
}

/// Number of objects of each type in a labelled index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeCounts {
    pub commits: usize,
    pub trees: usize,
    pub blobs: usize,
    pub tags: usize,
    pub unknown: usize,
}

impl Index {
    /// Open `pack-<id>.idx`, enumerating it with `git show-index`.
    pub fn open(idx_path: impl AsRef<Path>) -> Result<Self, IndexError> {
        Self::open_with(idx_path, &crate::enumerate::ShowIndex::default())
    }

    /// Open `pack-<id>.idx` with the given enumerator.
    ///
    /// No bitmap is loaded. All files are closed again before returning.
    pub fn open_with(
        idx_path: impl AsRef<Path>,
        enumerator: &dyn IndexEnumerator,
    ) -> Result<Self, IndexError> {
        let idx_path = idx_path.as_ref();
        let (pack_base, id) = parse_index_path(idx_path)?;

        let idx_pack_id = read_index_pack_id(idx_path)?;
        if idx_pack_id != *id.as_oid() {
            return Err(IndexError::PackIdMismatch {
                expected: *id.as_oid(),
                actual: idx_pack_id,
            });
        }

        let pack_path = sibling(&pack_base, "pack");
        let header = read_pack_header(&pack_path, &id)?;

        let expected = header.num_objects;
        let mut objects: Vec<Object> = Vec::with_capacity(expected as usize);
        let mut seen = 0usize;
        enumerator.enumerate(idx_path, &mut |line: &str| -> Result<(), IndexError> {
            seen += 1;
            let (offset, oid) = parse_index_line(line, seen)?;
            if seen > expected as usize {
                return Ok(());
            }
            if let Some(prev) = objects.last() {
                if oid <= prev.oid {
                    return Err(IndexError::UnsortedIndex { line: seen });
                }
            }
            if offset >= header.data_end {
                return Err(IndexError::OffsetOutOfRange {
                    oid,
                    offset,
                    limit: header.data_end,
                });
            }
            objects.push(Object::new(oid, offset));
            Ok(())
        })?;
        if seen != expected as usize {
            return Err(IndexError::IndexObjectCountMismatch {
                expected,
                actual: seen,
            });
        }

        let mut index = Self {
            id,
            pack_base,
            objects,
            packfile_order: Vec::new(),
            pack_rank: Vec::new(),
            bitmap: None,
            labelled: false,
            warnings: Vec::new(),
        };
        index.build_packfile_order();

        tracing::debug!(
            pack = %index.id,
            objects = index.objects.len(),
            "opened pack index"
        );
        Ok(index)
    }

    /// Sort object positions by offset, breaking ties by OID. Idempotent.
    pub fn build_packfile_order(&mut self) {
        if self.packfile_order.len() == self.objects.len() && !self.objects.is_empty() {
            return;
        }

        let objects = &self.objects;
        let mut order: Vec<usize> = (0..objects.len()).collect();
        order.sort_by_key(|&i| (objects[i].offset, objects[i].oid));

        for pair in order.windows(2) {
            let (a, b) = (&objects[pair[0]], &objects[pair[1]]);
            if a.offset == b.offset {
                tracing::warn!(
                    pack = %self.id,
                    offset = a.offset,
                    first = %a.oid,
                    second = %b.oid,
                    "duplicate offset in pack index"
                );
                self.warnings.push(IndexWarning::DuplicateOffset {
                    offset: a.offset,
                    first: a.oid,
                    second: b.oid,
                });
            }
        }

        let mut rank = vec![0usize; order.len()];
        for (pack_pos, &idx_pos) in order.iter().enumerate() {
            rank[idx_pos] = pack_pos;
        }
        self.packfile_order = order;
        self.pack_rank = rank;
    }

    pub fn id(&self) -> PackId {
        self.id
    }

    /// The path without its `.idx`/`.pack`/`.bitmap` extension.
    pub fn pack_base(&self) -> &Path {
        &self.pack_base
    }

    pub fn idx_path(&self) -> PathBuf {
        sibling(&self.pack_base, "idx")
    }

    pub fn pack_path(&self) -> PathBuf {
        sibling(&self.pack_base, "pack")
    }

    pub fn bitmap_path(&self) -> PathBuf {
        sibling(&self.pack_base, "bitmap")
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects in index order (ascending OID).
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    /// Index positions of the objects, sorted by pack offset.
    pub fn packfile_order(&self) -> &[usize] {
        &self.packfile_order
    }

    /// Objects in pack order (ascending offset).
    pub fn objects_in_pack_order(&self) -> impl Iterator<Item = &Object> + '_ {
        self.packfile_order.iter().map(move |&i| &self.objects[i])
    }

    /// The object at the given pack-order position.
    pub fn object_at(&self, pack_position: usize) -> Option<&Object> {
        self.packfile_order
            .get(pack_position)
            .map(|&i| &self.objects[i])
    }

    /// Find an object by id.
    pub fn lookup(&self, oid: &ObjectId) -> Option<&Object> {
        self.index_position(oid).map(|i| &self.objects[i])
    }

    /// Pack-order position of an object, i.e. its bit in every bitmap.
    pub fn pack_position(&self, oid: &ObjectId) -> Option<usize> {
        self.index_position(oid).map(|i| self.pack_rank[i])
    }

    fn index_position(&self, oid: &ObjectId) -> Option<usize> {
        self.objects.binary_search_by(|o| o.oid.cmp(oid)).ok()
    }

    /// Anomalies noticed while loading.
    pub fn warnings(&self) -> &[IndexWarning] {
        &self.warnings
    }

    pub fn bitmap(&self) -> Option<&IndexBitmap> {
        self.bitmap.as_ref()
    }

    /// True once [`label_object_types`](Index::label_object_types) succeeded.
    pub fn is_labelled(&self) -> bool {
        self.labelled
    }

    pub fn type_counts(&self) -> TypeCounts {
        let mut counts = TypeCounts::default();
        for object in &self.objects {
            match object.obj_type {
                ObjectType::Commit => counts.commits += 1,
                ObjectType::Tree => counts.trees += 1,
                ObjectType::Blob => counts.blobs += 1,
                ObjectType::Tag => counts.tags += 1,
                ObjectType::Unknown => counts.unknown += 1,
            }
        }
        counts
    }

    /// Stream the whole `.pack` through SHA-1 and compare with its trailer.
    pub fn verify_pack_checksum(&self) -> Result<(), IndexError> {
        let file = open_pack(&self.pack_path())?;
        let mut reader = HashfileReader::new(file);
        io::copy(&mut reader, &mut io::sink())?;
        Ok(())
    }
}

/// `<stem>.<ext>`. The stem may itself contain dots, so this appends rather
/// than using `Path::with_extension`.
fn sibling(stem: &Path, ext: &str) -> PathBuf {
    let mut path = stem.as_os_str().to_os_string();
    path.push(".");
    path.push(ext);
    PathBuf::from(path)
}

/// What the loader needs from the `.pack`: its object count and where the
/// object data ends.
struct PackHeader {
    num_objects: u32,
    data_end: u64,
}

fn open_pack(pack_path: &Path) -> Result<File, IndexError> {
    File::open(pack_path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => IndexError::PackMissing(pack_path.to_path_buf()),
        _ => IndexError::from(err),
    })
}

fn read_pack_header(pack_path: &Path, id: &PackId) -> Result<PackHeader, IndexError> {
    let mut file = open_pack(pack_path)?;
    let bad_signature = || IndexError::BadPackSignature(pack_path.to_path_buf());

    let len = file.metadata()?.len();
    if len < (PACK_HEADER_SIZE + SHA1_LEN) as u64 {
        return Err(bad_signature());
    }

    let mut header = [0u8; PACK_HEADER_SIZE];
    file.read_exact(&mut header)?;
    if &header[..8] != PACK_SIGNATURE {
        return Err(bad_signature());
    }
    let num_objects = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);

    let mut trailer = [0u8; SHA1_LEN];
    file.seek(SeekFrom::End(-(SHA1_LEN as i64)))?;
    file.read_exact(&mut trailer)?;
    let actual = ObjectId::from(trailer);
    if actual != *id.as_oid() {
        return Err(IndexError::BadPackTrailer {
            expected: *id.as_oid(),
            actual,
        });
    }

    Ok(PackHeader {
        num_objects,
        data_end: len - SHA1_LEN as u64,
    })
}

/// The pack checksum recorded in the first half of the index trailer.
fn read_index_pack_id(idx_path: &Path) -> Result<ObjectId, IndexError> {
    let mut file = File::open(idx_path)?;
    let len = file.metadata()?.len();
    if len < 2 * SHA1_LEN as u64 {
        return Err(IndexError::IndexTooSmall(idx_path.to_path_buf()));
    }
    let mut trailer = [0u8; 2 * SHA1_LEN];
    file.seek(SeekFrom::End(-(2 * SHA1_LEN as i64)))?;
    file.read_exact(&mut trailer)?;
    let mut pack_id = [0u8; SHA1_LEN];
    pack_id.copy_from_slice(&trailer[..SHA1_LEN]);
    Ok(ObjectId::from(pack_id))
}
