use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::results::{MatchKind, MatchResult};

/// Counters shared by all workers of a run.
///
/// Every counter is a relaxed atomic: the totals are only read after the
/// workers have been joined, and additions commute, so the final numbers do
/// not depend on the number of threads or the order paths were processed in.
#[derive(Debug, Default)]
pub struct SearchStats {
    // Paths with at least one match, per kind
    name_matches: AtomicU64,
    file_matches: AtomicU64,

    // Work done
    paths_visited: AtomicU64,
    files_read: AtomicU64,
    bytes_read: AtomicU64,

    // Recovered failures
    access_denied: AtomicU64,
    io_errors: AtomicU64,
}

impl SearchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts the path of `result` if it matched at least once
    pub fn record_result(&self, result: &MatchResult) {
        if !result.is_match() {
            return;
        }
        let counter = match result.kind {
            MatchKind::Name => &self.name_matches,
            MatchKind::File => &self.file_matches,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_visit(&self) {
        self.paths_visited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_read(&self, bytes: u64) {
        self.files_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_access_denied(&self) {
        self.access_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_io_error(&self) {
        self.io_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn matches(&self, kind: MatchKind) -> u64 {
        match kind {
            MatchKind::Name => self.name_matches.load(Ordering::Relaxed),
            MatchKind::File => self.file_matches.load(Ordering::Relaxed),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            name_matches: self.name_matches.load(Ordering::Relaxed),
            file_matches: self.file_matches.load(Ordering::Relaxed),
            paths_visited: self.paths_visited.load(Ordering::Relaxed),
            files_read: self.files_read.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            access_denied: self.access_denied.load(Ordering::Relaxed),
            io_errors: self.io_errors.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.snapshot();
        debug!(
            "Search stats:\n\
             Paths visited: {}\n\
             Files read: {} ({} bytes)\n\
             Matches (name/file): {}/{}\n\
             Failures (access denied/io): {}/{}",
            stats.paths_visited,
            stats.files_read,
            stats.bytes_read,
            stats.name_matches,
            stats.file_matches,
            stats.access_denied,
            stats.io_errors
        );
    }
}

/// Point-in-time copy of [`SearchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub name_matches: u64,
    pub file_matches: u64,
    pub paths_visited: u64,
    pub files_read: u64,
    pub bytes_read: u64,
    pub access_denied: u64,
    pub io_errors: u64,
}

impl StatsSnapshot {
    pub fn matches(&self, kind: MatchKind) -> u64 {
        match kind {
            MatchKind::Name => self.name_matches,
            MatchKind::File => self.file_matches,
        }
    }
}
