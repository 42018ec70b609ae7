//! Persistent index backed by redb.
//!
//! [`Database`] owns the store handle, the per-worker metrics and the
//! worker pool its jobs run on. Records are read and written through a
//! [`Transaction`]; redb serialises writers and gives readers a snapshot.

use crate::error::{IndexError, IndexResult};
use crate::extract::Extractor;
use crate::janitor::Janitor;
use crate::key::{Key, KeyKind};
use crate::maintainer::Maintainer;
use crate::metrics::{Counter, Metrics, MetricsReport};
use crate::pool::{Worker, WorkerPool};
use crate::tables;
use crate::txn::Transaction;
use crate::types::{Entry, Image, Record, Tag, Value};
use crate::walk::WalkEntry;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

/// Which link set of a neighbour to edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkSide {
    To,
    From,
}

struct Bound {
    path: PathBuf,
    db: redb::Database,
}

/// Index storage engine
pub struct Database {
    store: OnceLock<Bound>,
    pool: Arc<WorkerPool>,
    metrics: Metrics,
    extractor: Arc<dyn Extractor>,
}

impl Database {
    /// Create an unbound engine with one metrics slot per pool worker
    pub fn new(pool: Arc<WorkerPool>, extractor: Arc<dyn Extractor>) -> Arc<Self> {
        let metrics = Metrics::new(pool.size());
        Arc::new(Self {
            store: OnceLock::new(),
            pool,
            metrics,
            extractor,
        })
    }

    /// Bind to the store at `path`, creating it if absent
    pub fn open(&self, path: impl AsRef<Path>) -> IndexResult<()> {
        if self.store.get().is_some() {
            return Err(IndexError::AlreadyOpen);
        }
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| IndexError::StorageDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let db = redb::Database::create(path).map_err(|source| IndexError::StorageOpen {
            path: path.to_path_buf(),
            source,
        })?;

        // Create the table eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::ENTRIES)?;
        }
        write_txn.commit()?;

        self.store
            .set(Bound {
                path: path.to_path_buf(),
                db,
            })
            .map_err(|_| IndexError::AlreadyOpen)?;
        info!("Opened index at {}", path.display());
        Ok(())
    }

    /// Open the store (or keep the existing binding to the same path) and
    /// queue one Janitor sweep. Returns without waiting for the sweep.
    pub fn open_for_update(self: &Arc<Self>, path: impl AsRef<Path>) -> IndexResult<()> {
        let path = path.as_ref();
        match self.path() {
            Some(bound) if bound == path => {}
            Some(_) => return Err(IndexError::AlreadyOpen),
            None => self.open(path)?,
        }

        // Queued jobs only hold a weak handle; the engine owns the pool.
        let db = Arc::downgrade(self);
        self.pool.submit(move |worker| {
            let Some(db) = db.upgrade() else {
                debug!("Engine dropped before the Janitor ran");
                return;
            };
            match Janitor.run(&db, worker) {
                Ok(report) => info!(
                    "Janitor visited {} records, removed {}, repaired {}, orphaned images {}, corrupt {}",
                    report.visited, report.removed, report.repaired, report.orphans, report.corrupt
                ),
                Err(e) => error!("Janitor sweep failed: {}", e),
            }
        });
        Ok(())
    }

    /// Walker callback: queue a Maintainer for every regular file
    pub fn add_path(self: &Arc<Self>, entry: &WalkEntry) {
        if !entry.is_regular_file {
            return;
        }
        let maintainer = Maintainer::new(entry.path.clone(), entry.modified);
        let db = Arc::downgrade(self);
        self.pool.submit(move |worker| {
            let Some(db) = db.upgrade() else {
                debug!("Engine dropped before indexing {}", maintainer.path().display());
                return;
            };
            if let Err(e) = maintainer.run(&db, worker) {
                error!("Failed to index {}: {}", maintainer.path().display(), e);
            }
        });
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.store.get().is_some()
    }

    /// Path of the bound store
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.store.get().map(|bound| bound.path.as_path())
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub(crate) fn extractor(&self) -> &dyn Extractor {
        self.extractor.as_ref()
    }

    fn handle(&self) -> IndexResult<&redb::Database> {
        self.store
            .get()
            .map(|bound| &bound.db)
            .ok_or(IndexError::NotOpen)
    }

    /// Begin a snapshot read credited to `worker`
    pub fn begin_read(&self, worker: Worker) -> IndexResult<Transaction> {
        Ok(Transaction::read(self.handle()?.begin_read()?, worker))
    }

    /// Begin a write transaction credited to `worker`; blocks while another
    /// writer is active
    pub fn begin_write(&self, worker: Worker) -> IndexResult<Transaction> {
        Ok(Transaction::write(self.handle()?.begin_write()?, worker))
    }

    /// Read the record stored under `entry.key` into `entry`.
    ///
    /// Returns whether it was found and counts one lookup for the
    /// transaction's worker. `entry` is left untouched on a miss.
    pub fn lookup<V: Value>(&self, entry: &mut Entry<V>, txn: &Transaction) -> IndexResult<bool> {
        let found = self.fetch(entry, txn)?;
        self.metrics.record(txn.worker(), Counter::Lookup);
        Ok(found)
    }

    /// [`Database::lookup`] without touching the counters
    pub(crate) fn fetch<V: Value>(&self, entry: &mut Entry<V>, txn: &Transaction) -> IndexResult<bool> {
        check_key(entry.key, V::KIND)?;
        let Some(bytes) = txn.get(entry.key)? else {
            return Ok(false);
        };
        *entry = Entry::decode(entry.key, &bytes).map_err(|source| IndexError::Bincode {
            key: entry.key,
            source,
        })?;
        Ok(true)
    }

    /// Apply `entry`'s flags: `removed` deletes the key, `added` or
    /// `updated` writes the record, no flag leaves storage alone.
    pub fn update<V: Value>(&self, entry: &Entry<V>, txn: &Transaction) -> IndexResult<()> {
        check_key(entry.key, V::KIND)?;
        let worker = txn.worker();

        if entry.removed {
            txn.delete(entry.key)?;
            self.metrics.record(worker, Counter::Removed);
            debug!("Removed {}", entry.key);
        } else if entry.added || entry.updated {
            let bytes = entry.encode().map_err(|source| IndexError::Bincode {
                key: entry.key,
                source,
            })?;
            txn.put(entry.key, &bytes)?;
            let counter = if entry.added {
                Counter::Added
            } else {
                Counter::Updated
            };
            self.metrics.record(worker, counter);
            debug!("Wrote {} ({:?})", entry.key, counter);
        }
        Ok(())
    }

    /// Erase `departing` from one link set of the record at `neighbour`.
    ///
    /// Returns false when the neighbour is missing (a dangling edge).
    pub(crate) fn unlink(
        &self,
        txn: &Transaction,
        neighbour: Key,
        departing: Key,
        side: LinkSide,
    ) -> IndexResult<bool> {
        match neighbour.kind {
            KeyKind::Tag => self.unlink_as::<Tag>(txn, neighbour, departing, side),
            KeyKind::Image => self.unlink_as::<Image>(txn, neighbour, departing, side),
            KeyKind::Unset => {
                warn!("Ignoring null link from {}", departing);
                Ok(false)
            }
        }
    }

    fn unlink_as<V: Value>(
        &self,
        txn: &Transaction,
        neighbour: Key,
        departing: Key,
        side: LinkSide,
    ) -> IndexResult<bool> {
        let mut entry = Entry::<V>::new(neighbour);
        if !self.fetch(&mut entry, txn)? {
            warn!("Dangling link {} -> {}", departing, neighbour);
            return Ok(false);
        }
        let links: &mut BTreeSet<Key> = match side {
            LinkSide::To => &mut entry.links_to,
            LinkSide::From => &mut entry.links_from,
        };
        links.remove(&departing);
        entry.updated = true;
        self.update(&entry, txn)?;
        Ok(true)
    }

    /// Visit every record in key order; returns the number visited
    pub fn records<F>(&self, txn: &Transaction, mut f: F) -> IndexResult<usize>
    where
        F: FnMut(Record) -> IndexResult<()>,
    {
        let mut count = 0;
        txn.for_each(|key, bytes| {
            count += 1;
            match Record::decode(key, bytes) {
                Ok(Some(record)) => f(record),
                Ok(None) => {
                    warn!("Skipping record with unknown kind {}", key);
                    Ok(())
                }
                Err(source) => Err(IndexError::Bincode { key, source }),
            }
        })?;
        Ok(count)
    }

    /// Write every record with its outward (`->`) and inward (`<-`) links
    pub fn list_entries(&self, sink: &mut dyn Write) -> IndexResult<usize> {
        let txn = self.begin_read(Worker::new(0))?;
        self.records(&txn, |record| {
            writeln!(sink, "{record}")?;
            for key in record.links_to() {
                writeln!(sink, "\t-> {key}")?;
            }
            for key in record.links_from() {
                writeln!(sink, "\t<- {key}")?;
            }
            Ok(())
        })
    }

    /// Sum worker counters and score the spread. Run after the pool drains.
    pub fn aggregate_metrics(&self) -> MetricsReport {
        self.metrics.aggregate()
    }
}

fn check_key(key: Key, kind: KeyKind) -> IndexResult<()> {
    if key.is_null() {
        return Err(IndexError::invalid_key(key, "null key"));
    }
    if key.kind != kind {
        return Err(IndexError::invalid_key(key, "key kind does not match record type"));
    }
    Ok(())
}
