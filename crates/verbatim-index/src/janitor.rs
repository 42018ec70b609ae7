//! Index sweep for vanished source files
//!
//! The sweep runs in two phases. A read pass over a snapshot collects every
//! Tag whose file no longer exists; the cursor is then dropped and each
//! departing Tag is removed in its own write transaction together with the
//! link repairs in its neighbours.

use crate::error::{IndexError, IndexResult};
use crate::key::Key;
use crate::pool::Worker;
use crate::store::{Database, LinkSide};
use crate::types::{Entry, Record, Tag};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Totals for one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JanitorReport {
    /// Records seen by the read pass
    pub visited: usize,
    /// Tags deleted
    pub removed: usize,
    /// Neighbour records rewritten to drop a departing key
    pub repaired: usize,
    /// Images nothing links to
    pub orphans: usize,
    /// Links whose target record was missing
    pub dangling: usize,
    /// Records that failed to decode and were skipped
    pub corrupt: usize,
    /// Departing Tags whose removal failed and was rolled back
    pub failed: usize,
}

/// Garbage collector for Tags whose file has disappeared
#[derive(Debug, Clone, Copy, Default)]
pub struct Janitor;

impl Janitor {
    /// Sweep the whole index. Only failures to reach the store abort the
    /// sweep; a bad record or a failed removal is logged and skipped.
    pub fn run(&self, db: &Database, worker: Worker) -> IndexResult<JanitorReport> {
        let mut report = JanitorReport::default();
        let departing = Self::collect(db, worker, &mut report)?;

        for key in departing {
            if let Err(e) = self.remove(db, worker, key, &mut report) {
                error!("Failed to remove {}: {}", key, e);
                report.failed += 1;
            }
        }

        if report.orphans > 0 {
            debug!("{} unreferenced images left in place", report.orphans);
        }
        Ok(report)
    }

    /// Read pass: keys of Tags whose file is gone
    fn collect(db: &Database, worker: Worker, report: &mut JanitorReport) -> IndexResult<Vec<Key>> {
        let mut departing = Vec::new();
        let txn = db.begin_read(worker)?;
        txn.for_each(|key, bytes| {
            report.visited += 1;
            match Record::decode(key, bytes) {
                Ok(Some(Record::Tag(tag))) if is_vanished(&tag.value.filename) => {
                    departing.push(tag.key);
                }
                Ok(Some(Record::Image(image))) if image.links_from.is_empty() => {
                    report.orphans += 1;
                }
                Ok(Some(_)) => {}
                Ok(None) => warn!("Skipping record with unknown kind {}", key),
                Err(source) => {
                    warn!("{}", IndexError::Bincode { key, source });
                    report.corrupt += 1;
                }
            }
            Ok(())
        })?;
        Ok(departing)
    }

    fn remove(
        &self,
        db: &Database,
        worker: Worker,
        key: Key,
        report: &mut JanitorReport,
    ) -> IndexResult<()> {
        let txn = db.begin_write(worker)?;
        let mut tag = Entry::<Tag>::new(key);
        if !db.lookup(&mut tag, &txn)? {
            // A Maintainer or an earlier repair got there first
            return txn.abort();
        }
        if !is_vanished(&tag.value.filename) {
            debug!("{} reappeared, keeping it", tag.value.filename);
            return txn.abort();
        }

        let mut repaired = 0;
        let mut dangling = 0;
        for (neighbour, side) in tag
            .links_from
            .iter()
            .map(|k| (*k, LinkSide::To))
            .chain(tag.links_to.iter().map(|k| (*k, LinkSide::From)))
        {
            if db.unlink(&txn, neighbour, key, side)? {
                repaired += 1;
            } else {
                dangling += 1;
            }
        }

        tag.removed = true;
        db.update(&tag, &txn)?;
        txn.commit()?;

        report.repaired += repaired;
        report.dangling += dangling;
        report.removed += 1;
        info!("Removed vanished file {}", tag.value.filename);
        Ok(())
    }
}

fn is_vanished(filename: &str) -> bool {
    match Path::new(filename).try_exists() {
        Ok(exists) => !exists,
        Err(e) => {
            warn!("Cannot check {}: {}; keeping it", filename, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::EmbeddedImage;
    use crate::key::KeyKind;
    use crate::maintainer::Maintainer;
    use crate::test_support::{FakeExtractor, engine, metadata};
    use crate::types::Image;
    use tempfile::tempdir;

    const W: Worker = Worker::new(0);

    fn with_art(art: &[u8]) -> crate::extract::Metadata {
        let mut m = metadata("X");
        m.image = Some(EmbeddedImage {
            data: art.to_vec(),
            mimetype: "image/png".into(),
        });
        m
    }

    fn touch(dir: &Path, name: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"audio").unwrap();
        path
    }

    #[test]
    fn test_sweep_removes_vanished_tag_and_repairs_image() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::default();
        let db = engine(1, extractor.clone());
        db.open(dir.path().join("index.redb")).unwrap();

        let a = touch(dir.path(), "a.mp3");
        let b = touch(dir.path(), "b.mp3");
        extractor.set(&a, with_art(b"cover"));
        extractor.set(&b, with_art(b"cover"));
        Maintainer::new(a.clone(), 100).run(&db, W).unwrap();
        Maintainer::new(b.clone(), 100).run(&db, W).unwrap();

        std::fs::remove_file(&a).unwrap();
        let report = Janitor.run(&db, W).unwrap();

        assert_eq!(report.visited, 3);
        assert_eq!(report.removed, 1);
        assert_eq!(report.repaired, 1);
        assert_eq!(report.orphans, 0);
        assert_eq!(report.dangling, 0);

        let txn = db.begin_read(W).unwrap();
        assert!(!db.fetch(&mut Entry::<Tag>::new(Key::tag(&a)), &txn).unwrap());
        let mut image = Entry::<Image>::new(Key::image(b"cover"));
        assert!(db.fetch(&mut image, &txn).unwrap());
        assert!(!image.links_from.contains(&Key::tag(&a)));
        assert!(image.links_from.contains(&Key::tag(&b)));
        assert_eq!(db.metrics().worker(W).removed, 1);
    }

    #[test]
    fn test_last_reference_leaves_orphan() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::default();
        let db = engine(1, extractor.clone());
        db.open(dir.path().join("index.redb")).unwrap();

        let a = touch(dir.path(), "a.mp3");
        extractor.set(&a, with_art(b"cover"));
        Maintainer::new(a.clone(), 100).run(&db, W).unwrap();
        std::fs::remove_file(&a).unwrap();

        let first = Janitor.run(&db, W).unwrap();
        assert_eq!(first.removed, 1);
        assert_eq!(first.orphans, 0);

        let second = Janitor.run(&db, W).unwrap();
        assert_eq!(second.visited, 1);
        assert_eq!(second.removed, 0);
        assert_eq!(second.orphans, 1);

        // Only the departing back-link is gone
        let txn = db.begin_read(W).unwrap();
        let mut image = Entry::<Image>::new(Key::image(b"cover"));
        assert!(db.fetch(&mut image, &txn).unwrap());
        assert_eq!(image.value, Image::new(b"cover".to_vec(), "image/png"));
        assert_eq!(image.value.size, 5);
        assert!(image.links_to.is_empty());
        assert!(image.links_from.is_empty());
    }

    fn vanished_tag(db: &Database, dir: &Path, name: &str, links_to: &[Key]) -> Key {
        let gone = dir.join(name);
        let mut tag = Entry::<Tag>::new(Key::tag(&gone));
        tag.value.filename = gone.to_string_lossy().into_owned();
        tag.links_to.extend(links_to.iter().copied());
        tag.added = true;
        let txn = db.begin_write(W).unwrap();
        db.update(&tag, &txn).unwrap();
        txn.commit().unwrap();
        tag.key
    }

    fn is_stored(db: &Database, key: Key) -> bool {
        let txn = db.begin_read(W).unwrap();
        txn.get(key).unwrap().is_some()
    }

    #[test]
    fn test_corrupt_record_does_not_stop_sweep() {
        let dir = tempdir().unwrap();
        let db = engine(1, FakeExtractor::default());
        db.open(dir.path().join("index.redb")).unwrap();

        let bad = Key::new(KeyKind::Image, 1);
        let txn = db.begin_write(W).unwrap();
        txn.put(bad, &[0xff]).unwrap();
        txn.commit().unwrap();
        let gone = vanished_tag(&db, dir.path(), "gone.mp3", &[]);

        let report = Janitor.run(&db, W).unwrap();
        assert_eq!(report.visited, 2);
        assert_eq!(report.corrupt, 1);
        assert_eq!(report.removed, 1);
        assert!(!is_stored(&db, gone));
        assert!(is_stored(&db, bad));
    }

    #[test]
    fn test_failed_removal_is_confined_to_its_tag() {
        let dir = tempdir().unwrap();
        let db = engine(1, FakeExtractor::default());
        db.open(dir.path().join("index.redb")).unwrap();

        let bad = Key::new(KeyKind::Image, 1);
        let txn = db.begin_write(W).unwrap();
        txn.put(bad, &[0xff]).unwrap();
        txn.commit().unwrap();
        let stuck = vanished_tag(&db, dir.path(), "stuck.mp3", &[bad]);
        let gone = vanished_tag(&db, dir.path(), "gone.mp3", &[]);

        let report = Janitor.run(&db, W).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(report.repaired, 0);
        assert!(is_stored(&db, stuck));
        assert!(!is_stored(&db, gone));
    }

    #[test]
    fn test_reappeared_file_is_kept() {
        let dir = tempdir().unwrap();
        let db = engine(1, FakeExtractor::default());
        db.open(dir.path().join("index.redb")).unwrap();

        let key = vanished_tag(&db, dir.path(), "back.mp3", &[]);
        touch(dir.path(), "back.mp3");

        let mut report = JanitorReport::default();
        Janitor.remove(&db, W, key, &mut report).unwrap();
        assert_eq!(report.removed, 0);
        assert!(is_stored(&db, key));
    }

    #[test]
    fn test_dangling_link_is_tolerated() {
        let dir = tempdir().unwrap();
        let db = engine(1, FakeExtractor::default());
        db.open(dir.path().join("index.redb")).unwrap();

        vanished_tag(&db, dir.path(), "gone.mp3", &[Key::image(b"never-written")]);

        let report = Janitor.run(&db, W).unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(report.dangling, 1);
        assert_eq!(report.repaired, 0);
    }

    #[test]
    fn test_present_files_are_kept() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::default();
        let db = engine(1, extractor.clone());
        db.open(dir.path().join("index.redb")).unwrap();

        let a = touch(dir.path(), "a.mp3");
        extractor.set(&a, metadata("X"));
        Maintainer::new(a.clone(), 100).run(&db, W).unwrap();

        let report = Janitor.run(&db, W).unwrap();
        assert_eq!(report.visited, 1);
        assert_eq!(report.removed, 0);
    }
}
