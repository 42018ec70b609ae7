//! Metadata extraction boundary
//!
//! The engine only depends on the [`Extractor`] trait. With the `lofty`
//! feature enabled, [`LoftyExtractor`] reads the first tag of an audio file
//! and its first embedded picture.

use std::path::Path;

/// Embedded artwork found in a file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub data: Vec<u8>,
    pub mimetype: String,
}

/// Textual tag fields plus optional artwork
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub artist: String,
    pub album: String,
    pub title: String,
    pub genre: String,
    pub image: Option<EmbeddedImage>,
}

/// Pure function from a file to its metadata
pub trait Extractor: Send + Sync {
    /// `None` when the file is not a recognised tagged file
    fn extract(&self, path: &Path) -> Option<Metadata>;
}

#[cfg(feature = "lofty")]
pub use self::lofty_impl::LoftyExtractor;

#[cfg(feature = "lofty")]
mod lofty_impl {
    use super::{EmbeddedImage, Extractor, Metadata};
    use lofty::prelude::*;
    use std::borrow::Cow;
    use std::path::Path;
    use tracing::debug;

    /// Tag reader backed by lofty
    #[derive(Debug, Clone, Copy, Default)]
    pub struct LoftyExtractor;

    impl Extractor for LoftyExtractor {
        fn extract(&self, path: &Path) -> Option<Metadata> {
            let tagged = match lofty::read_from_path(path) {
                Ok(tagged) => tagged,
                Err(e) => {
                    debug!("No tags in {}: {}", path.display(), e);
                    return None;
                }
            };
            let tag = tagged.primary_tag().or_else(|| tagged.first_tag())?;

            let image = tag.pictures().first().map(|picture| EmbeddedImage {
                data: picture.data().to_vec(),
                mimetype: picture
                    .mime_type()
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            });

            Some(Metadata {
                artist: field(tag.artist()),
                album: field(tag.album()),
                title: field(tag.title()),
                genre: field(tag.genre()),
                image,
            })
        }
    }

    fn field(value: Option<Cow<'_, str>>) -> String {
        value.map(Cow::into_owned).unwrap_or_default()
    }

}
