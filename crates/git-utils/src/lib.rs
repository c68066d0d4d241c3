//! Plumbing shared by the pack readers: running external `git` helpers.

pub mod error;
pub mod subprocess;

pub use error::UtilError;

pub type Result<T> = std::result::Result<T, UtilError>;
