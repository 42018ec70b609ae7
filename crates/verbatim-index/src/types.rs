//! Stored record types.
//!
//! Records are persisted to redb as a bincode envelope of the payload
//! followed by the two link sets. The key lives in the table key and the
//! dirty flags are never stored.

use crate::key::{Key, KeyKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Payload stored under a key of kind `KIND`
pub trait Value:
    Serialize + DeserializeOwned + Default + Clone + fmt::Debug + fmt::Display + Send + 'static
{
    const KIND: KeyKind;
}

/// Most recently observed metadata for one source file
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Source mtime (unix seconds) when this record was produced
    pub modified: i64,
    pub filename: String,
    pub artist: String,
    pub album: String,
    pub title: String,
    pub genre: String,
}

impl Value for Tag {
    const KIND: KeyKind = KeyKind::Tag;
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.filename, self.modified, self.genre, self.artist, self.album, self.title
        )
    }
}

/// Embedded cover image, shared by every file carrying identical bytes
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub size: u64,
    pub data: Vec<u8>,
    pub mimetype: String,
}

impl Image {
    #[must_use]
    pub fn new(data: Vec<u8>, mimetype: impl Into<String>) -> Self {
        Self {
            size: data.len() as u64,
            data,
            mimetype: mimetype.into(),
        }
    }
}

impl Value for Image {
    const KIND: KeyKind = KeyKind::Image;
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.mimetype, self.size)
    }
}

/// A record plus its link sets and the flags that drive `Database::update`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entry<V> {
    pub key: Key,
    pub value: V,
    /// Keys this record references
    pub links_to: BTreeSet<Key>,
    /// Keys referencing this record
    pub links_from: BTreeSet<Key>,
    pub added: bool,
    pub removed: bool,
    pub updated: bool,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, V> {
    value: &'a V,
    links_to: &'a BTreeSet<Key>,
    links_from: &'a BTreeSet<Key>,
}

#[derive(Deserialize)]
struct Envelope<V> {
    value: V,
    links_to: BTreeSet<Key>,
    links_from: BTreeSet<Key>,
}

impl<V: Value> Entry<V> {
    #[must_use]
    pub fn new(key: Key) -> Self {
        Self {
            key,
            value: V::default(),
            links_to: BTreeSet::new(),
            links_from: BTreeSet::new(),
            added: false,
            removed: false,
            updated: false,
        }
    }

    /// Serialize payload and links
    pub fn encode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(&EnvelopeRef {
            value: &self.value,
            links_to: &self.links_to,
            links_from: &self.links_from,
        })
    }

    /// Decode a stored envelope for `key`, with all flags cleared
    pub fn decode(key: Key, bytes: &[u8]) -> bincode::Result<Self> {
        let envelope: Envelope<V> = bincode::deserialize(bytes)?;
        Ok(Self {
            key,
            value: envelope.value,
            links_to: envelope.links_to,
            links_from: envelope.links_from,
            added: false,
            removed: false,
            updated: false,
        })
    }

    /// Whether `update` would touch storage
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.added || self.removed || self.updated
    }
}

/// Any stored record, selected by the key discriminant
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Record {
    Tag(Entry<Tag>),
    Image(Entry<Image>),
}

impl Record {
    /// Decode a stored value; `None` for keys of an unknown kind
    pub fn decode(key: Key, bytes: &[u8]) -> bincode::Result<Option<Self>> {
        Ok(match key.kind {
            KeyKind::Tag => Some(Self::Tag(Entry::decode(key, bytes)?)),
            KeyKind::Image => Some(Self::Image(Entry::decode(key, bytes)?)),
            KeyKind::Unset => None,
        })
    }

    #[must_use]
    pub const fn key(&self) -> Key {
        match self {
            Self::Tag(e) => e.key,
            Self::Image(e) => e.key,
        }
    }

    #[must_use]
    pub const fn links_to(&self) -> &BTreeSet<Key> {
        match self {
            Self::Tag(e) => &e.links_to,
            Self::Image(e) => &e.links_to,
        }
    }

    #[must_use]
    pub const fn links_from(&self) -> &BTreeSet<Key> {
        match self {
            Self::Tag(e) => &e.links_from,
            Self::Image(e) => &e.links_from,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(e) => write!(f, "{}\t{}", e.key, e.value),
            Self::Image(e) => write!(f, "{}\t{}", e.key, e.value),
        }
    }
}
