//! Object records and pack identity.

use std::fmt;

use git_hash::ObjectId;

/// Type of an object as recovered from the bitmap type indexes.
///
/// `Unknown` is the state before labelling; after a successful labelling
/// pass no object is left `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectType {
    #[default]
    Unknown,
    Blob,
    Commit,
    Tree,
    Tag,
}

impl ObjectType {
    /// The four concrete types in the order their bitmaps appear on disk.
    pub const BITMAP_ORDER: [ObjectType; 4] = [Self::Commit, Self::Tree, Self::Blob, Self::Tag];

    /// The canonical name, as used in object headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Blob => "blob",
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Tag => "tag",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One object of a pack: its id, where it lives, and (once labelled) its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Object {
    pub oid: ObjectId,
    pub offset: u64,
    pub obj_type: ObjectType,
}

impl Object {
    pub fn new(oid: ObjectId, offset: u64) -> Self {
        Self {
            oid,
            offset,
            obj_type: ObjectType::Unknown,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.oid, self.obj_type, self.offset)
    }
}

/// Identity of a pack triplet: the checksum of its `.pack`, which also names
/// the `pack-<id>.*` files.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackId(ObjectId);

impl PackId {
    pub fn new(oid: ObjectId) -> Self {
        Self(oid)
    }

    pub fn as_oid(&self) -> &ObjectId {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names() {
        assert_eq!(ObjectType::Commit.to_string(), "commit");
        assert_eq!(ObjectType::Unknown.to_string(), "unknown");
        assert!(!ObjectType::default().is_known());
        assert!(ObjectType::Tag.is_known());
    }

    #[test]
    fn object_display_matches_listing_format() {
        let oid = ObjectId::from_hex("8ab686eafeb1f44702738c8b0f24f2567c36da6d").unwrap();
        let mut obj = Object::new(oid, 12);
        obj.obj_type = ObjectType::Blob;
        assert_eq!(
            obj.to_string(),
            "8ab686eafeb1f44702738c8b0f24f2567c36da6d blob 12"
        );
    }
}
