//! Enumerating the entries of a pack index.
//!
//! Index decoding is pluggable. [`ShowIndex`] delegates to `git show-index`;
//! [`NativeIndexReader`] decodes the v2 format in-process. Both produce the
//! same line-oriented output, one `<offset> <oid> (<crc32>)` line per object
//! in index order, which the loader parses with [`parse_index_line`].

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use git_hash::hex::is_lower_hex;
use git_hash::{ObjectId, SHA1_LEN};
use git_utils::subprocess::GitCommand;

use crate::error::IndexError;
use crate::hashfile::HashfileReader;
use crate::{IDX_SIGNATURE, IDX_VERSION};

/// Callback receiving one index line at a time.
pub type LineSink<'a> = dyn FnMut(&str) -> Result<(), IndexError> + 'a;

/// Produces the entries of a pack index as text lines.
pub trait IndexEnumerator {
    /// Emit one `<decimal offset> <hex oid>[ <extra>]` line per object of
    /// `idx_path`, in index order.
    fn enumerate(&self, idx_path: &Path, emit: &mut LineSink<'_>) -> Result<(), IndexError>;
}

/// Enumerates through `git show-index`, feeding it the `.idx` on stdin.
#[derive(Debug, Clone)]
pub struct ShowIndex {
    git_binary: PathBuf,
}

impl ShowIndex {
    /// Use the given git binary instead of `git` from `PATH`.
    pub fn with_binary(git_binary: impl Into<PathBuf>) -> Self {
        Self {
            git_binary: git_binary.into(),
        }
    }

    pub fn git_binary(&self) -> &Path {
        &self.git_binary
    }
}

impl Default for ShowIndex {
    fn default() -> Self {
        Self::with_binary("git")
    }
}

impl IndexEnumerator for ShowIndex {
    fn enumerate(&self, idx_path: &Path, emit: &mut LineSink<'_>) -> Result<(), IndexError> {
        let idx = File::open(idx_path)?;
        let stdout = GitCommand::new(&self.git_binary)
            .arg("show-index")
            .stdin_file(idx)
            .run_checked()?;

        for (i, line) in stdout.lines().enumerate() {
            let line = line.to_str().map_err(|_| IndexError::MalformedIndexLine {
                line: i + 1,
                reason: "not valid UTF-8".into(),
            })?;
            emit(line)?;
        }
        Ok(())
    }
}

/// Decodes pack index v2 files directly.
///
/// The file is streamed through a [`HashfileReader`], so the index's own
/// trailing checksum is verified before any line is emitted.
///
/// ```text
/// Header:  \xff tOc (4 bytes) | version (4 bytes = 2)
/// Fanout:  256 × 4-byte big-endian cumulative counts
/// OIDs:    N × 20-byte sorted OIDs
/// CRC32:   N × 4-byte CRC32 values
/// Offsets: N × 4-byte offsets (high bit = 1 → use 64-bit table)
/// 64-bit:  M × 8-byte offsets (for packs > 2GB)
/// Trailer: 20-byte pack checksum | 20-byte index checksum
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeIndexReader;

impl IndexEnumerator for NativeIndexReader {
    fn enumerate(&self, idx_path: &Path, emit: &mut LineSink<'_>) -> Result<(), IndexError> {
        let file = File::open(idx_path)?;
        let mut reader = HashfileReader::new(BufReader::new(file));
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        let table = IndexTable::parse(&data).map_err(|reason| IndexError::InvalidIndex {
            path: idx_path.to_path_buf(),
            reason,
        })?;
        let mut line = String::new();
        for i in 0..table.num_objects {
            let offset = table.offset_at(i).map_err(|reason| IndexError::InvalidIndex {
                path: idx_path.to_path_buf(),
                reason,
            })?;
            line.clear();
            line.push_str(&format!(
                "{offset} {} ({:08x})",
                table.oid_at(i),
                table.crc32_at(i)
            ));
            emit(&line)?;
        }
        Ok(())
    }
}

/// Section offsets of a v2 index held in memory (checksum already stripped).
struct IndexTable<'a> {
    data: &'a [u8],
    num_objects: usize,
    oid_offset: usize,
    crc_offset: usize,
    offset32_offset: usize,
    offset64_offset: usize,
    offset64_count: usize,
}

impl<'a> IndexTable<'a> {
    const FANOUT_OFFSET: usize = 8;
    const FANOUT_LEN: usize = 256 * 4;

    fn parse(data: &'a [u8]) -> Result<Self, String> {
        let header_len = Self::FANOUT_OFFSET + Self::FANOUT_LEN;
        if data.len() < header_len + SHA1_LEN {
            return Err(format!("file too small: {} bytes", data.len()));
        }
        if data[0..4] != IDX_SIGNATURE {
            return Err("bad signature".into());
        }
        let version = be_u32(&data[4..8]);
        if version != IDX_VERSION {
            return Err(format!(
                "unsupported version {version}, expected {IDX_VERSION}"
            ));
        }

        let mut previous = 0u32;
        for bucket in 0..256 {
            let count = be_u32(&data[Self::FANOUT_OFFSET + bucket * 4..]);
            if count < previous {
                return Err(format!("fan-out table decreases at bucket {bucket}"));
            }
            previous = count;
        }

        let n = previous as usize;
        let oid_offset = header_len;
        let crc_offset = oid_offset + n * SHA1_LEN;
        let offset32_offset = crc_offset + n * 4;
        let offset64_offset = offset32_offset + n * 4;
        if data.len() < offset64_offset + SHA1_LEN {
            return Err(format!(
                "file too small for {n} objects: {} bytes",
                data.len()
            ));
        }

        let offset64_count = (0..n)
            .filter(|&i| be_u32(&data[offset32_offset + i * 4..]) & 0x8000_0000 != 0)
            .count();
        let expected = offset64_offset + offset64_count * 8 + SHA1_LEN;
        if data.len() != expected {
            return Err(format!(
                "expected {expected} bytes before the checksum, found {}",
                data.len()
            ));
        }

        Ok(Self {
            data,
            num_objects: n,
            oid_offset,
            crc_offset,
            offset32_offset,
            offset64_offset,
            offset64_count,
        })
    }

    fn oid_at(&self, index: usize) -> ObjectId {
        let start = self.oid_offset + index * SHA1_LEN;
        let mut bytes = [0u8; SHA1_LEN];
        bytes.copy_from_slice(&self.data[start..start + SHA1_LEN]);
        ObjectId::from(bytes)
    }

    fn crc32_at(&self, index: usize) -> u32 {
        be_u32(&self.data[self.crc_offset + index * 4..])
    }

    fn offset_at(&self, index: usize) -> Result<u64, String> {
        let val = be_u32(&self.data[self.offset32_offset + index * 4..]);
        if val & 0x8000_0000 == 0 {
            return Ok(val as u64);
        }
        let idx64 = (val & 0x7FFF_FFFF) as usize;
        if idx64 >= self.offset64_count {
            return Err(format!(
                "64-bit offset slot {idx64} out of range for object {index}"
            ));
        }
        let pos = self.offset64_offset + idx64 * 8;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.data[pos..pos + 8]);
        Ok(u64::from_be_bytes(bytes))
    }
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Parse one `<decimal offset> <40 hex oid>[ <extra>]` line.
///
/// `line_no` is 1-based and only used for error reporting.
pub fn parse_index_line(line: &str, line_no: usize) -> Result<(u64, ObjectId), IndexError> {
    let malformed = |reason: String| IndexError::MalformedIndexLine {
        line: line_no,
        reason,
    };

    let mut fields = line.splitn(3, ' ');
    let offset = fields
        .next()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| malformed("missing offset".into()))?;
    let oid = fields
        .next()
        .ok_or_else(|| malformed("missing object id".into()))?;

    if !offset.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format!("bad offset {offset:?}")));
    }
    let offset: u64 = offset
        .parse()
        .map_err(|e| malformed(format!("bad offset {offset:?}: {e}")))?;
    if !is_lower_hex(oid) {
        return Err(malformed(format!("object id {oid:?} is not lowercase hex")));
    }
    let oid = ObjectId::from_hex(oid).map_err(|e| malformed(format!("bad object id: {e}")))?;
    Ok((offset, oid))
}
