//! Directory walker
//!
//! Enumerates a tree with walkdir and hands each entry to a caller supplied
//! closure. Entries whose metadata cannot be read are logged and skipped.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::warn;
use walkdir::WalkDir;

/// Read-only view of one discovered filesystem entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub is_regular_file: bool,
    /// Last modification time in unix seconds
    pub modified: i64,
}

/// Totals for one walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub dispatched: u64,
    pub skipped: u64,
    pub elapsed: Duration,
}

/// Convert a filesystem timestamp to unix seconds
#[must_use]
pub fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_secs()).map_or(i64::MIN, |s| -s),
    }
}

/// Walk `root`, calling `callback` once per readable entry (the root included)
pub fn walk<F>(root: impl AsRef<Path>, follow_links: bool, mut callback: F) -> WalkStats
where
    F: FnMut(&WalkEntry),
{
    let started = Instant::now();
    let mut stats = WalkStats::default();

    for item in WalkDir::new(root.as_ref()).follow_links(follow_links) {
        let entry = match item {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                stats.skipped += 1;
                continue;
            }
        };
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                stats.skipped += 1;
                continue;
            }
        };
        let modified = metadata.modified().map(unix_seconds).unwrap_or_default();

        callback(&WalkEntry {
            path: entry.into_path(),
            is_regular_file: metadata.is_file(),
            modified,
        });
        stats.dispatched += 1;
    }

    stats.elapsed = started.elapsed();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_walk_reports_files_and_dirs() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("album")).unwrap();
        std::fs::write(dir.path().join("album/a.mp3"), b"a").unwrap();
        std::fs::write(dir.path().join("b.flac"), b"b").unwrap();

        let mut seen = Vec::new();
        let stats = walk(dir.path(), false, |entry| seen.push(entry.clone()));

        assert_eq!(stats.dispatched, 4);
        assert_eq!(stats.skipped, 0);
        let files: Vec<_> = seen.iter().filter(|e| e.is_regular_file).collect();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|e| e.modified > 0));
    }

    #[test]
    fn test_walk_missing_root() {
        let dir = tempdir().unwrap();
        let mut calls = 0;
        let stats = walk(dir.path().join("absent"), false, |_| calls += 1);
        assert_eq!(calls, 0);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_unix_seconds() {
        assert_eq!(unix_seconds(UNIX_EPOCH + Duration::from_secs(200)), 200);
        assert_eq!(unix_seconds(UNIX_EPOCH - Duration::from_secs(5)), -5);
    }
}
