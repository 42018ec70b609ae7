//! Per-file indexing job
//!
//! A [`Maintainer`] brings the Tag for one source file (and the Image its
//! artwork dedups into) up to date. Extraction runs outside any write
//! transaction; the staleness check is repeated once the write lock is held
//! so two jobs racing on the same path cannot both rewrite it.

use crate::error::IndexResult;
use crate::extract::Metadata;
use crate::key::Key;
use crate::metrics::Counter;
use crate::pool::Worker;
use crate::store::{Database, LinkSide};
use crate::txn::Transaction;
use crate::types::{Entry, Image, Tag};
use std::path::{Path, PathBuf};
use tracing::debug;

/// What a Maintainer run decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintainOutcome {
    /// The stored Tag is as new as the file
    Unchanged,
    /// The extractor found no metadata; nothing was written
    Skipped,
    /// The Tag was written; `added` is false for a refresh
    Indexed { added: bool },
}

/// Indexing job for one regular file
#[derive(Debug, Clone)]
pub struct Maintainer {
    path: PathBuf,
    modified: i64,
}

impl Maintainer {
    #[must_use]
    pub const fn new(path: PathBuf, modified: i64) -> Self {
        Self { path, modified }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the job on `worker`. Counts exactly one lookup.
    pub fn run(&self, db: &Database, worker: Worker) -> IndexResult<MaintainOutcome> {
        db.metrics().record(worker, Counter::Lookup);
        let outcome = self.maintain(db, worker)?;
        debug!("{}: {:?}", self.path.display(), outcome);
        Ok(outcome)
    }

    fn maintain(&self, db: &Database, worker: Worker) -> IndexResult<MaintainOutcome> {
        let key = Key::tag(&self.path);

        {
            let txn = db.begin_read(worker)?;
            let mut tag = Entry::<Tag>::new(key);
            if db.fetch(&mut tag, &txn)? && self.is_current(&tag) {
                return Ok(MaintainOutcome::Unchanged);
            }
        }

        let Some(metadata) = db.extractor().extract(&self.path) else {
            return Ok(MaintainOutcome::Skipped);
        };

        let txn = db.begin_write(worker)?;
        let mut tag = Entry::<Tag>::new(key);
        let found = db.fetch(&mut tag, &txn)?;
        if found && self.is_current(&tag) {
            txn.abort()?;
            return Ok(MaintainOutcome::Unchanged);
        }

        self.write(db, &txn, &mut tag, found, metadata)?;
        txn.commit()?;
        Ok(MaintainOutcome::Indexed { added: !found })
    }

    fn is_current(&self, tag: &Entry<Tag>) -> bool {
        tag.value.modified >= self.modified
    }

    fn write(
        &self,
        db: &Database,
        txn: &Transaction,
        tag: &mut Entry<Tag>,
        found: bool,
        metadata: Metadata,
    ) -> IndexResult<()> {
        let image_key = metadata.image.as_ref().map(|image| Key::image(&image.data));

        // Artwork changed or vanished: release the old images
        let stale: Vec<Key> = tag
            .links_to
            .iter()
            .copied()
            .filter(|k| Some(*k) != image_key)
            .collect();
        for old in stale {
            db.unlink(txn, old, tag.key, LinkSide::From)?;
            tag.links_to.remove(&old);
        }

        if let (Some(embedded), Some(image_key)) = (metadata.image, image_key) {
            let mut image = Entry::<Image>::new(image_key);
            if !db.fetch(&mut image, txn)? {
                image.value = Image::new(embedded.data, embedded.mimetype);
                image.added = true;
            }
            image.links_from.insert(tag.key);
            tag.links_to.insert(image_key);
            image.updated = !image.added;
            db.update(&image, txn)?;
        }

        tag.value = Tag {
            modified: self.modified,
            filename: self.path.to_string_lossy().into_owned(),
            artist: metadata.artist,
            album: metadata.album,
            title: metadata.title,
            genre: metadata.genre,
        };
        tag.added = !found;
        tag.updated = found;
        db.update(tag, txn)
    }
}
