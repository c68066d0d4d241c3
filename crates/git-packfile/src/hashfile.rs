//! Reader for git's `<content> || SHA1(content)` framing.

use std::io::{self, Read};

use git_hash::hasher::Hasher;
use git_hash::{ObjectId, SHA1_LEN};

use crate::error::HashfileError;
use crate::trailer::TrailerReader;

enum State {
    /// Content is still flowing; the hasher has seen everything handed out.
    Reading(Hasher),
    /// The trailer matched.
    Verified,
    /// Verification failed; the error is repeated on every read.
    Failed(HashfileError),
}

/// Yields the content of a hashfile and verifies its trailing SHA-1.
///
/// End of content (`Ok(0)`) is reported only after the checksum matched.
/// A mismatch surfaces instead as an `io::Error` carrying
/// [`HashfileError::ChecksumMismatch`].
pub struct HashfileReader<R> {
    inner: TrailerReader<R>,
    state: State,
}

impl<R: Read> HashfileReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: TrailerReader::new(inner, SHA1_LEN),
            state: State::Reading(Hasher::new()),
        }
    }

    /// True once the trailer has been checked and matched.
    pub fn is_verified(&self) -> bool {
        matches!(self.state, State::Verified)
    }

    /// The checksum stored in the trailer, once end of content was reached.
    pub fn stored_checksum(&self) -> Option<ObjectId> {
        self.inner
            .trailer()
            .ok()
            .and_then(|t| ObjectId::from_bytes(t).ok())
    }

    fn verify(&mut self) -> Result<(), HashfileError> {
        let hasher = match std::mem::replace(&mut self.state, State::Verified) {
            State::Reading(hasher) => hasher,
            State::Verified => return Ok(()),
            State::Failed(err) => {
                self.state = State::Failed(err.clone());
                return Err(err);
            }
        };

        let outcome = self.check(hasher);
        if let Err(err) = &outcome {
            self.state = State::Failed(err.clone());
        }
        outcome
    }

    fn check(&self, hasher: Hasher) -> Result<(), HashfileError> {
        let trailer = self.inner.trailer().map_err(|err| match err {
            HashfileError::TrailerTooSmall { .. } => HashfileError::MalformedHashfile,
            other => other,
        })?;
        let expected =
            ObjectId::from_bytes(trailer).map_err(|_| HashfileError::MalformedHashfile)?;
        let actual = hasher
            .finalize()
            .map_err(|_| HashfileError::Sha1Collision)?;
        if expected != actual {
            return Err(HashfileError::ChecksumMismatch { expected, actual });
        }
        Ok(())
    }
}

impl<R: Read> Read for HashfileReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        match &mut self.state {
            State::Verified => return Ok(0),
            State::Failed(err) => return Err(err.clone().into()),
            State::Reading(_) => {}
        }

        let n = self.inner.read(out)?;
        if n > 0 {
            if let State::Reading(hasher) = &mut self.state {
                hasher.update(&out[..n]);
            }
            return Ok(n);
        }
        self.verify()?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(content: &[u8]) -> Vec<u8> {
        let mut data = content.to_vec();
        data.extend_from_slice(Hasher::digest(content).unwrap().as_bytes());
        data
    }

    #[test]
    fn yields_content_and_verifies() {
        let data = framed(b"hello");
        assert_eq!(data.len(), 25);

        let mut r = HashfileReader::new(&data[..]);
        let mut content = Vec::new();
        r.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"hello");
        assert!(r.is_verified());

        let mut buf = [0u8; 8];
        assert_eq!(r.read(&mut buf).unwrap(), 0);
        assert_eq!(r.stored_checksum(), Some(Hasher::digest(b"hello").unwrap()));
    }

    #[test]
    fn any_flipped_content_byte_is_detected() {
        let data = framed(b"hello");
        for i in 0..5 {
            let mut corrupt = data.clone();
            corrupt[i] ^= 0x01;
            let mut r = HashfileReader::new(&corrupt[..]);
            let mut content = Vec::new();
            let err = r.read_to_end(&mut content).unwrap_err();
            assert!(matches!(
                HashfileError::from_io(&err),
                Some(HashfileError::ChecksumMismatch { .. })
            ));
        }
    }

    #[test]
    fn mismatch_repeats_on_later_reads() {
        let mut data = framed(b"hello");
        data[24] ^= 0xff;
        let mut r = HashfileReader::new(&data[..]);
        let mut content = Vec::new();
        assert!(r.read_to_end(&mut content).is_err());
        let mut buf = [0u8; 4];
        assert!(r.read(&mut buf).is_err());
        assert!(!r.is_verified());
    }

    #[test]
    fn short_input_is_malformed() {
        let data = [0u8; 10];
        let mut r = HashfileReader::new(&data[..]);
        let mut content = Vec::new();
        let err = r.read_to_end(&mut content).unwrap_err();
        assert_eq!(
            HashfileError::from_io(&err),
            Some(&HashfileError::MalformedHashfile)
        );
    }

    #[test]
    fn empty_content_hashes_to_empty_digest() {
        let data = framed(b"");
        let mut r = HashfileReader::new(&data[..]);
        let mut content = Vec::new();
        r.read_to_end(&mut content).unwrap();
        assert!(content.is_empty());
        assert!(r.is_verified());
    }
}
