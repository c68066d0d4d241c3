//! EWAH-compressed bitmaps as stored in `.bitmap` files.
//!
//! Wire layout (all big-endian):
//!
//! ```text
//! bits (u32) | words (u32) | words × u64 payload | rlw position (u32)
//! ```
//!
//! The payload is a sequence of runs. Each run starts with a header word:
//! bit 0 is the clean bit, bits 1..=32 count clean words, bits 33..=63 count
//! the dirty words that follow the header verbatim.

use std::borrow::Cow;
use std::io::{self, Read};

use crate::error::EwahError;

/// Bytes after the payload that git uses for bookkeeping.
const EWAH_TRAILER_LEN: usize = 4;

const CLEAN_RUN_MASK: u64 = 0xFFFF_FFFF;

/// Number of 64-bit words needed to hold `bits` bits.
pub fn dense_len(bits: u32) -> usize {
    (bits as usize + 63) / 64
}

/// A single EWAH bitmap: its compressed bytes plus an optional dense copy.
///
/// Dense word `k` holds bits `64k..64k + 63`, least significant bit first.
/// Bits at or beyond [`Bitmap::bits`] are always zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    bits: u32,
    words: u32,
    raw: Vec<u8>,
    dense: Option<Vec<u64>>,
}

impl Bitmap {
    /// Read one EWAH bitmap from `r`, leaving it compressed.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, EwahError> {
        let mut header = [0u8; 8];
        r.read_exact(&mut header)?;
        let bits = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let words = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);

        let raw_len = checked_raw_len(bits, words)?;
        let mut raw = Vec::new();
        r.take(raw_len as u64).read_to_end(&mut raw)?;
        if raw.len() != raw_len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("EWAH payload truncated: {} of {raw_len} bytes", raw.len()),
            )
            .into());
        }

        Ok(Self {
            bits,
            words,
            raw,
            dense: None,
        })
    }

    /// Parse a bitmap from a byte slice, returning it and the bytes consumed.
    pub fn parse(data: &[u8]) -> Result<(Self, usize), EwahError> {
        let mut cursor = data;
        let bitmap = Self::read_from(&mut cursor)?;
        Ok((bitmap, data.len() - cursor.len()))
    }

    /// Number of logical bits.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Number of 64-bit words in the compressed payload.
    pub fn words(&self) -> u32 {
        self.words
    }

    /// The compressed payload followed by the 4-byte bookkeeping field.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn is_materialized(&self) -> bool {
        self.dense.is_some()
    }

    /// Decompress into the dense form and keep it. Idempotent.
    pub fn materialize(&mut self) -> Result<(), EwahError> {
        if self.dense.is_none() {
            self.dense = Some(self.decode()?);
        }
        Ok(())
    }

    /// The dense words, decoding on the fly when not materialized.
    pub fn dense(&self) -> Result<Cow<'_, [u64]>, EwahError> {
        match &self.dense {
            Some(words) => Ok(Cow::Borrowed(words)),
            None => Ok(Cow::Owned(self.decode()?)),
        }
    }

    /// Visit every set bit in ascending order.
    ///
    /// Stops at the first error returned by `f` and propagates it.
    pub fn scan<E, F>(&self, mut f: F) -> Result<(), E>
    where
        F: FnMut(u32) -> Result<(), E>,
        E: From<EwahError>,
    {
        let dense = self.dense()?;
        for (k, &word) in dense.iter().enumerate() {
            let mut w = word;
            while w != 0 {
                let bit = w.trailing_zeros();
                let index = k as u64 * 64 + bit as u64;
                if index >= self.bits as u64 {
                    return Ok(());
                }
                f(index as u32)?;
                w &= w - 1;
            }
        }
        Ok(())
    }

    /// All set bits in ascending order.
    pub fn set_bits(&self) -> Result<Vec<u32>, EwahError> {
        let mut out = Vec::new();
        self.scan(|i| {
            out.push(i);
            Ok::<_, EwahError>(())
        })?;
        Ok(out)
    }

    pub fn is_set(&self, index: u32) -> Result<bool, EwahError> {
        if index >= self.bits {
            return Ok(false);
        }
        let dense = self.dense()?;
        Ok(dense[index as usize / 64] & (1u64 << (index % 64)) != 0)
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> Result<usize, EwahError> {
        Ok(self.dense()?.iter().map(|w| w.count_ones() as usize).sum())
    }

    /// XOR `other` into this bitmap. Both must have the same width.
    pub fn xor(&mut self, other: &Bitmap) -> Result<(), EwahError> {
        if self.bits != other.bits {
            return Err(EwahError::BitmapWidthMismatch {
                left: self.bits,
                right: other.bits,
            });
        }
        let theirs = other.dense()?;
        self.materialize()?;
        if let Some(mine) = self.dense.as_mut() {
            for (a, b) in mine.iter_mut().zip(theirs.iter()) {
                *a ^= *b;
            }
        }
        Ok(())
    }

    fn payload_word(&self, i: usize) -> u64 {
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.raw[i * 8..i * 8 + 8]);
        u64::from_be_bytes(word)
    }

    fn decode(&self) -> Result<Vec<u64>, EwahError> {
        let total = dense_len(self.bits);
        let payload_words = self.words as usize;
        let mut out = vec![0u64; total];
        let mut cursor = 0usize;
        let mut i = 0usize;

        while i < payload_words {
            let rlw = self.payload_word(i);
            i += 1;

            let clean = rlw & 1 != 0;
            let clean_words = ((rlw >> 1) & CLEAN_RUN_MASK) as usize;
            let dirty_words = (rlw >> 33) as usize;

            if clean_words > total - cursor {
                return Err(malformed(format!(
                    "clean run of {clean_words} words overruns {total} words"
                )));
            }
            if clean {
                out[cursor..cursor + clean_words].fill(u64::MAX);
            }
            cursor += clean_words;

            if dirty_words > payload_words - i {
                return Err(malformed(format!(
                    "{dirty_words} dirty words announced but only {} remain",
                    payload_words - i
                )));
            }
            if dirty_words > total - cursor {
                return Err(malformed(format!(
                    "dirty run of {dirty_words} words overruns {total} words"
                )));
            }
            for slot in &mut out[cursor..cursor + dirty_words] {
                *slot = self.payload_word(i);
                i += 1;
            }
            cursor += dirty_words;
        }

        if cursor != total {
            return Err(malformed(format!(
                "runs describe {cursor} words, {} bits need {total}",
                self.bits
            )));
        }

        let tail = self.bits % 64;
        if tail != 0 {
            if let Some(last) = out.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
        Ok(out)
    }
}

fn malformed(reason: String) -> EwahError {
    EwahError::BitmapMalformed { reason }
}

/// Byte length of payload plus trailer, bounded to a signed 32-bit count.
fn checked_raw_len(bits: u32, words: u32) -> Result<usize, EwahError> {
    let overflow = EwahError::BitmapOverflow { bits, words };
    if bits > i32::MAX as u32 || words > i32::MAX as u32 {
        return Err(overflow);
    }
    let len = (words as u64) * 8 + EWAH_TRAILER_LEN as u64;
    if len > i32::MAX as u64 {
        return Err(overflow);
    }
    Ok(len as usize)
}
