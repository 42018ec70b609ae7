//! Content-addressed record keys
//!
//! A key is a kind discriminator plus a 64-bit hash. In redb it is stored
//! as the tuple `(kind, hash)` so records of one kind sort together.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use verbatim_common::{content_hash, path_hash};

/// Record kind discriminator
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyKind {
    #[default]
    Unset = 0,
    Tag = 1,
    Image = 2,
}

impl KeyKind {
    /// Decode a stored discriminant
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Tag,
            2 => Self::Image,
            _ => Self::Unset,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Tag => "tag",
            Self::Image => "img",
        }
    }
}

/// Key of one index record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    pub kind: KeyKind,
    pub hash: u64,
}

impl Key {
    #[must_use]
    pub const fn new(kind: KeyKind, hash: u64) -> Self {
        Self { kind, hash }
    }

    /// Key of the Tag record for a source file
    #[must_use]
    pub fn tag(path: &Path) -> Self {
        Self::new(KeyKind::Tag, path_hash(path))
    }

    /// Key of the Image record for embedded artwork bytes
    #[must_use]
    pub fn image(data: &[u8]) -> Self {
        Self::new(KeyKind::Image, content_hash(data))
    }

    /// A null key has no kind or a zero hash and is never persisted.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self.kind, KeyKind::Unset) || self.hash == 0
    }

    /// Tuple form used as the redb table key
    #[must_use]
    pub const fn to_table_key(self) -> (u8, u64) {
        (self.kind as u8, self.hash)
    }

    #[must_use]
    pub const fn from_table_key((kind, hash): (u8, u64)) -> Self {
        Self::new(KeyKind::from_u8(kind), hash)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:016x}", self.kind.as_str(), self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_keys() {
        assert!(Key::default().is_null());
        assert!(Key::new(KeyKind::Tag, 0).is_null());
        assert!(Key::new(KeyKind::Unset, 42).is_null());
        assert!(!Key::new(KeyKind::Image, 42).is_null());
    }

    #[test]
    fn test_key_equality_needs_both_fields() {
        let tag = Key::new(KeyKind::Tag, 7);
        assert_eq!(tag, Key::new(KeyKind::Tag, 7));
        assert_ne!(tag, Key::new(KeyKind::Image, 7));
        assert_ne!(tag, Key::new(KeyKind::Tag, 8));
    }

    #[test]
    fn test_derived_keys() {
        let tag = Key::tag(Path::new("/music/a.mp3"));
        assert_eq!(tag.kind, KeyKind::Tag);
        assert!(!tag.is_null());

        let img = Key::image(b"cover");
        assert_eq!(img.kind, KeyKind::Image);
        assert_eq!(img, Key::image(b"cover"));
    }

    #[test]
    fn test_table_key_round_trip() {
        let key = Key::new(KeyKind::Image, 0xdead_beef);
        assert_eq!(key.to_table_key(), (2, 0xdead_beef));
        assert_eq!(Key::from_table_key(key.to_table_key()), key);
        assert_eq!(Key::from_table_key((9, 1)).kind, KeyKind::Unset);
    }

    #[test]
    fn test_display() {
        let key = Key::new(KeyKind::Tag, 0xff);
        assert_eq!(key.to_string(), "tag:00000000000000ff");
    }
}
