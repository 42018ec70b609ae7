//! Indexer wiring: pool, engine and walker under one owner.

use crate::error::IndexResult;
use crate::extract::Extractor;
use crate::metrics::MetricsReport;
use crate::pool::WorkerPool;
use crate::store::Database;
use crate::walk::{self, WalkStats};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use verbatim_common::config::IndexConfig;

/// Owns the worker pool and the engine that submits jobs to it
pub struct Indexer {
    db: Arc<Database>,
    pool: Arc<WorkerPool>,
    follow_links: bool,
}

impl Indexer {
    /// Start `workers` threads and an unbound engine on top of them
    pub fn new(workers: usize, extractor: Arc<dyn Extractor>) -> IndexResult<Self> {
        let pool = Arc::new(WorkerPool::new(workers)?);
        let db = Database::new(Arc::clone(&pool), extractor);
        Ok(Self {
            db,
            pool,
            follow_links: false,
        })
    }

    pub fn from_config(config: &IndexConfig, extractor: Arc<dyn Extractor>) -> IndexResult<Self> {
        Ok(Self::new(config.concurrency, extractor)?.follow_links(config.follow_links))
    }

    #[must_use]
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    #[must_use]
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Open `path` and queue the Janitor sweep
    pub fn open_for_update(&self, path: impl AsRef<Path>) -> IndexResult<()> {
        self.db.open_for_update(path)
    }

    /// Walk `root` and queue a Maintainer per regular file. Does not wait.
    pub fn scan(&self, root: impl AsRef<Path>) -> WalkStats {
        let root = root.as_ref();
        let stats = walk::walk(root, self.follow_links, |entry| self.db.add_path(entry));
        info!(
            "Dispatched {} entries from {} in {:?} ({} skipped)",
            stats.dispatched,
            root.display(),
            stats.elapsed,
            stats.skipped
        );
        stats
    }

    /// Block until every submitted job has finished
    pub fn wait(&self) {
        self.pool.wait();
    }

    /// Drain the pool, then aggregate the metrics
    pub fn report(&self) -> MetricsReport {
        self.wait();
        self.db.aggregate_metrics()
    }
}

impl Drop for Indexer {
    fn drop(&mut self) {
        // Jobs hold engine handles; let them finish so the pool is joined
        // from this thread and never from one of its own workers.
        self.pool.wait();
    }
}
