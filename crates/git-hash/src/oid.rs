use std::fmt;
use std::str::FromStr;

use crate::hex::{hex_decode, hex_to_string};
use crate::{HashError, SHA1_HEX_LEN, SHA1_LEN};

/// A SHA-1 object identifier.
///
/// Ordering is bytewise, which is also the lexicographic order of the
/// lowercase hex rendering, i.e. pack index order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId([u8; SHA1_LEN]);

impl ObjectId {
    /// The all-zeros OID.
    pub const NULL: Self = Self([0u8; SHA1_LEN]);

    /// Create an ObjectId from a 20-byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HashError> {
        let arr: [u8; SHA1_LEN] =
            bytes
                .try_into()
                .map_err(|_| HashError::InvalidHashLength {
                    expected: SHA1_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(arr))
    }

    /// Create an ObjectId from a 40-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        if hex.len() != SHA1_HEX_LEN {
            return Err(HashError::InvalidHexLength {
                expected: SHA1_HEX_LEN,
                actual: hex.len(),
            });
        }
        let mut bytes = [0u8; SHA1_LEN];
        hex_decode(hex, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; SHA1_LEN] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex_to_string(&self.0)
    }

    /// First byte of the digest (the fan-out bucket in a pack index).
    pub fn first_byte(&self) -> u8 {
        self.0[0]
    }

    pub fn is_null(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl From<[u8; SHA1_LEN]> for ObjectId {
    fn from(bytes: [u8; SHA1_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..8])
    }
}

impl FromStr for ObjectId {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
