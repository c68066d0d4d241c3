//! Object identity and hashing for the pack readers.
//!
//! Packs, indexes, and bitmaps handled by this workspace are all SHA-1
//! based, so `ObjectId` is a fixed 20-byte digest. The streaming
//! [`hasher::Hasher`] runs SHA-1 with collision detection.

mod error;
pub mod hasher;
pub mod hex;
mod oid;

pub use error::HashError;
pub use oid::ObjectId;

/// Length of a raw SHA-1 digest in bytes.
pub const SHA1_LEN: usize = 20;

/// Length of a SHA-1 digest rendered as hex.
pub const SHA1_HEX_LEN: usize = SHA1_LEN * 2;
