//! Synthetic pack triplets for integration tests.
//!
//! Builds `pack-<id>.pack`, `pack-<id>.idx` (v2), and `pack-<id>.bitmap`
//! files in a temporary directory. Object data is filler; only the framing
//! the loader looks at is real.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use git_hash::hasher::Hasher;
use git_hash::ObjectId;

pub const FULL_DAG: u16 = 0x1;
pub const HASH_CACHE: u16 = 0x4;

/// Append the SHA-1 of `content` to it.
pub fn seal(mut content: Vec<u8>) -> Vec<u8> {
    let digest = Hasher::digest(&content).unwrap();
    content.extend_from_slice(digest.as_bytes());
    content
}

/// A distinct, deterministic object id.
pub fn oid(n: u32) -> ObjectId {
    Hasher::digest(format!("object {n}").as_bytes()).unwrap()
}

/// Dense words for `positions` within a bitmap of `bits` bits.
pub fn dense(bits: u32, positions: &[u32]) -> Vec<u64> {
    let mut words = vec![0u64; (bits as usize + 63) / 64];
    for &p in positions {
        assert!(p < bits, "bit {p} outside width {bits}");
        words[p as usize / 64] |= 1 << (p % 64);
    }
    words
}

/// Encode dense words as EWAH, folding runs of all-zero and all-one words.
pub fn ewah_from_dense(bits: u32, words: &[u64]) -> Vec<u8> {
    let mut payload: Vec<u64> = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let mut clean_bit = 0u64;
        let mut clean = 0u64;
        if words[i] == 0 || words[i] == u64::MAX {
            clean_bit = (words[i] == u64::MAX) as u64;
            let value = words[i];
            while i < words.len() && words[i] == value {
                clean += 1;
                i += 1;
            }
        }
        let start = i;
        while i < words.len() && words[i] != 0 && words[i] != u64::MAX {
            i += 1;
        }
        let dirty = &words[start..i];
        payload.push(clean_bit | (clean << 1) | ((dirty.len() as u64) << 33));
        payload.extend_from_slice(dirty);
    }

    let mut out = Vec::new();
    out.extend_from_slice(&bits.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    for w in &payload {
        out.extend_from_slice(&w.to_be_bytes());
    }
    out.extend_from_slice(&0u32.to_be_bytes());
    out
}

pub fn ewah(bits: u32, positions: &[u32]) -> Vec<u8> {
    ewah_from_dense(bits, &dense(bits, positions))
}

/// Pack index v2 bytes for `(oid, offset)` entries.
pub fn idx_bytes(entries: &[(ObjectId, u64)], pack_id: &ObjectId) -> Vec<u8> {
    let mut sorted = entries.to_vec();
    sorted.sort_by_key(|e| e.0);

    let mut buf = Vec::new();
    buf.extend_from_slice(&[0xff, 0x74, 0x4f, 0x63]);
    buf.extend_from_slice(&2u32.to_be_bytes());

    let mut fanout = [0u32; 256];
    for (oid, _) in &sorted {
        fanout[oid.first_byte() as usize] += 1;
    }
    for i in 1..256 {
        fanout[i] += fanout[i - 1];
    }
    for count in fanout {
        buf.extend_from_slice(&count.to_be_bytes());
    }
    for (oid, _) in &sorted {
        buf.extend_from_slice(oid.as_bytes());
    }
    for (i, _) in sorted.iter().enumerate() {
        buf.extend_from_slice(&(0xc0de_0000u32 + i as u32).to_be_bytes());
    }
    let mut large = Vec::new();
    for (_, offset) in &sorted {
        if *offset > 0x7fff_ffff {
            buf.extend_from_slice(&(0x8000_0000u32 | large.len() as u32).to_be_bytes());
            large.push(*offset);
        } else {
            buf.extend_from_slice(&(*offset as u32).to_be_bytes());
        }
    }
    for offset in large {
        buf.extend_from_slice(&offset.to_be_bytes());
    }
    buf.extend_from_slice(pack_id.as_bytes());
    seal(buf)
}

/// Pack bytes whose object data is filler, long enough to hold `entries`.
pub fn pack_bytes(num_objects: u32, entries: &[(ObjectId, u64)]) -> Vec<u8> {
    let end = entries.iter().map(|e| e.1 + 8).max().unwrap_or(12).max(12);
    let mut buf = Vec::new();
    buf.extend_from_slice(b"PACK\x00\x00\x00\x02");
    buf.extend_from_slice(&num_objects.to_be_bytes());
    buf.resize(end as usize, 0x5a);
    seal(buf)
}

/// One stored commit bitmap.
#[derive(Clone)]
pub struct CommitEntry {
    pub position: u32,
    pub xor_offset: u8,
    pub flags: u8,
    pub bits: u32,
    pub set: Vec<u32>,
}

impl CommitEntry {
    pub fn new(position: u32, bits: u32, set: &[u32]) -> Self {
        Self {
            position,
            xor_offset: 0,
            flags: 0,
            bits,
            set: set.to_vec(),
        }
    }

    pub fn xor(mut self, offset: u8) -> Self {
        self.xor_offset = offset;
        self
    }
}

/// Contents of a `.bitmap` file.
#[derive(Clone)]
pub struct BitmapLayout {
    pub flags: u16,
    pub pack_id: ObjectId,
    /// commits, trees, blobs, tags: (width, set bits)
    pub types: [(u32, Vec<u32>); 4],
    pub commits: Vec<CommitEntry>,
    pub hash_cache_len: usize,
}

impl BitmapLayout {
    /// Content bytes, without the checksum trailer.
    pub fn content(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"BITM\x00\x01");
        buf.extend_from_slice(&self.flags.to_be_bytes());
        buf.extend_from_slice(&(self.commits.len() as u32).to_be_bytes());
        buf.extend_from_slice(self.pack_id.as_bytes());
        for (bits, set) in &self.types {
            buf.extend_from_slice(&ewah(*bits, set));
        }
        for c in &self.commits {
            buf.extend_from_slice(&c.position.to_be_bytes());
            buf.push(c.xor_offset);
            buf.push(c.flags);
            buf.extend_from_slice(&ewah(c.bits, &c.set));
        }
        if self.flags & HASH_CACHE != 0 {
            buf.extend(std::iter::repeat(0xab).take(self.hash_cache_len * 4));
        }
        buf
    }

    pub fn bytes(&self) -> Vec<u8> {
        seal(self.content())
    }
}

/// A pack triplet on disk.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub id: ObjectId,
    pub entries: Vec<(ObjectId, u64)>,
}

impl Fixture {
    /// A pack holding `entries`, with matching `.idx` and `.pack`.
    pub fn new(entries: Vec<(ObjectId, u64)>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pack = pack_bytes(entries.len() as u32, &entries);
        let id = ObjectId::from_bytes(&pack[pack.len() - 20..]).unwrap();
        let fixture = Self { dir, id, entries };
        std::fs::write(fixture.pack_path(), &pack).unwrap();
        std::fs::write(fixture.idx_path(), idx_bytes(&fixture.entries, &id)).unwrap();
        fixture
    }

    /// `n` objects whose pack order differs from their index order.
    pub fn with_objects(n: u32) -> Self {
        let entries = (0..n).map(|i| (oid(i), 12 + 100 * i as u64)).collect();
        Self::new(entries)
    }

    pub fn stem(&self) -> PathBuf {
        self.dir.path().join(format!("pack-{}", self.id))
    }

    pub fn idx_path(&self) -> PathBuf {
        self.dir.path().join(format!("pack-{}.idx", self.id))
    }

    pub fn pack_path(&self) -> PathBuf {
        self.dir.path().join(format!("pack-{}.pack", self.id))
    }

    pub fn bitmap_path(&self) -> PathBuf {
        self.dir.path().join(format!("pack-{}.bitmap", self.id))
    }

    /// Object ids in pack order (ascending offset).
    pub fn pack_order(&self) -> Vec<ObjectId> {
        let mut sorted = self.entries.clone();
        sorted.sort_by_key(|e| (e.1, e.0));
        sorted.into_iter().map(|e| e.0).collect()
    }

    /// A FULL_DAG bitmap layout for this pack with every type bitmap empty.
    pub fn bitmap_layout(&self) -> BitmapLayout {
        BitmapLayout {
            flags: FULL_DAG,
            pack_id: self.id,
            types: Default::default(),
            commits: Vec::new(),
            hash_cache_len: self.entries.len(),
        }
    }

    /// A layout whose type bitmaps label pack position `i` as
    /// commit/tree/blob/tag for `i % 4 == 0/1/2/3`.
    pub fn typed_bitmap_layout(&self) -> BitmapLayout {
        let n = self.entries.len() as u32;
        let mut layout = self.bitmap_layout();
        for (t, slot) in layout.types.iter_mut().enumerate() {
            *slot = (n, (0..n).filter(|i| i % 4 == t as u32).collect());
        }
        layout
    }

    pub fn write_bitmap(&self, layout: &BitmapLayout) {
        std::fs::write(self.bitmap_path(), layout.bytes()).unwrap();
    }

    pub fn write_bitmap_bytes(&self, bytes: &[u8]) {
        std::fs::write(self.bitmap_path(), bytes).unwrap();
    }

    /// Flip one byte of a file in the triplet.
    pub fn corrupt(path: &Path, at_from_end: usize) {
        let mut data = std::fs::read(path).unwrap();
        let i = data.len() - at_from_end;
        data[i] ^= 0xff;
        std::fs::write(path, data).unwrap();
    }
}
