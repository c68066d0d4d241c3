//! A reader that hides the last `T` bytes of its input.
//!
//! Git's on-disk formats end in a fixed-size trailer (usually a checksum).
//! [`TrailerReader`] forwards everything before that trailer and, once the
//! content is exhausted, hands the trailer out through [`TrailerReader::trailer`].

use std::io::{self, Read};

use crate::error::HashfileError;

/// Size of the internal buffer. Trailers must be strictly smaller.
pub const TRAILER_BUFFER_SIZE: usize = 8192;

/// Withholds the final `trailer_len` bytes of the wrapped reader.
///
/// Live bytes sit in `buf[start..end]`; at most `trailer_len` of them are
/// ever held back from the caller.
pub struct TrailerReader<R> {
    inner: R,
    buf: Box<[u8; TRAILER_BUFFER_SIZE]>,
    start: usize,
    end: usize,
    trailer_len: usize,
    at_eof: bool,
}

impl<R: Read> TrailerReader<R> {
    /// Wrap `inner`, withholding its last `trailer_len` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `trailer_len` is zero or not smaller than the buffer.
    pub fn new(inner: R, trailer_len: usize) -> Self {
        assert!(
            trailer_len > 0 && trailer_len < TRAILER_BUFFER_SIZE,
            "trailer length {trailer_len} out of range"
        );
        Self {
            inner,
            buf: Box::new([0u8; TRAILER_BUFFER_SIZE]),
            start: 0,
            end: 0,
            trailer_len,
            at_eof: false,
        }
    }

    /// The withheld trailer. Only available once `read` has returned end of
    /// content.
    pub fn trailer(&self) -> Result<&[u8], HashfileError> {
        if !self.at_eof {
            return Err(HashfileError::TrailerNotReady);
        }
        let live = self.end - self.start;
        if live < self.trailer_len {
            return Err(HashfileError::TrailerTooSmall {
                expected: self.trailer_len,
                actual: live,
            });
        }
        Ok(&self.buf[self.end - self.trailer_len..self.end])
    }

    /// Move the live bytes to the front and read more behind them.
    fn refill(&mut self) -> io::Result<()> {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        loop {
            match self.inner.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    self.at_eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.end += n;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl<R: Read> Read for TrailerReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        while !self.at_eof && self.end - self.start <= self.trailer_len {
            self.refill()?;
        }
        let live = self.end - self.start;
        if live <= self.trailer_len {
            return Ok(0);
        }
        let n = (live - self.trailer_len).min(out.len());
        out[..n].copy_from_slice(&self.buf[self.start..self.start + n]);
        self.start += n;
        Ok(n)
    }
}
