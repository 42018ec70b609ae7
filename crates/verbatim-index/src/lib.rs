//! Verbatim index - concurrent, content-addressed metadata index
//!
//! Audio files are walked, their tags extracted on a worker pool and stored
//! in redb as Tag records keyed by path. Embedded artwork is deduplicated
//! into Image records keyed by content, linked both ways to the Tags that
//! carry it. A Janitor sweep drops Tags whose files have vanished.

pub mod context;
pub mod error;
pub mod extract;
pub mod janitor;
pub mod key;
pub mod maintainer;
pub mod metrics;
pub mod pool;
pub mod store;
pub mod tables;
pub mod txn;
pub mod types;
pub mod walk;

// Re-exports
pub use context::Indexer;
pub use error::{IndexError, IndexResult};
#[cfg(feature = "lofty")]
pub use extract::LoftyExtractor;
pub use extract::{EmbeddedImage, Extractor, Metadata};
pub use janitor::{Janitor, JanitorReport};
pub use key::{Key, KeyKind};
pub use maintainer::{MaintainOutcome, Maintainer};
pub use metrics::{Counters, Metrics, MetricsReport};
pub use pool::{Worker, WorkerPool};
pub use store::Database;
pub use txn::Transaction;
pub use types::{Entry, Image, Record, Tag, Value};
pub use walk::{WalkEntry, WalkStats};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::extract::{Extractor, Metadata};
    use crate::key::Key;
    use crate::pool::WorkerPool;
    use crate::store::Database;
    use crate::types::{Entry, Tag};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    /// In-memory extractor; unknown paths are untagged
    #[derive(Clone, Default)]
    pub struct FakeExtractor {
        files: Arc<Mutex<HashMap<PathBuf, Metadata>>>,
    }

    impl FakeExtractor {
        pub fn set(&self, path: impl AsRef<Path>, metadata: Metadata) {
            self.files
                .lock()
                .insert(path.as_ref().to_path_buf(), metadata);
        }
    }

    impl Extractor for FakeExtractor {
        fn extract(&self, path: &Path) -> Option<Metadata> {
            self.files.lock().get(path).cloned()
        }
    }

    pub fn engine(workers: usize, extractor: FakeExtractor) -> Arc<Database> {
        let pool = Arc::new(WorkerPool::new(workers).unwrap());
        Database::new(pool, Arc::new(extractor))
    }

    pub fn metadata(artist: &str) -> Metadata {
        Metadata {
            artist: artist.into(),
            album: "Album".into(),
            title: "Title".into(),
            ..Metadata::default()
        }
    }

    pub fn tag_entry(path: &str, modified: i64, artist: &str) -> Entry<Tag> {
        let mut entry = Entry::new(Key::tag(Path::new(path)));
        entry.value = Tag {
            modified,
            filename: path.into(),
            artist: artist.into(),
            ..Tag::default()
        };
        entry
    }
}
