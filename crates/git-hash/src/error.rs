use thiserror::Error;

/// Failures parsing or computing object ids.
#[derive(Debug, Error)]
pub enum HashError {
    /// A byte outside `[0-9a-fA-F]` in a hex object id.
    #[error("'{character}' at offset {position} is not a hex digit")]
    InvalidHex { position: usize, character: char },

    #[error("hex object id must be {expected} characters, found {actual}")]
    InvalidHexLength { expected: usize, actual: usize },

    #[error("raw object id must be {expected} bytes, found {actual}")]
    InvalidHashLength { expected: usize, actual: usize },

    /// The SHA-1 collision detector flagged the input.
    #[error("input matches a known SHA-1 collision attack")]
    Sha1Collision,
}
