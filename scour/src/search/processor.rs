use memmap2::Mmap;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

use super::matcher::PatternMatcher;
use crate::filters::IgnorePredicate;
use crate::report::Reporter;
use crate::results::{MatchKind, MatchResult};
use crate::stats::SearchStats;

/// Which tests run on every path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMode {
    pub names: bool,
    pub contents: bool,
}

impl SearchMode {
    /// Neither flag set means both
    pub fn from_flags(names: bool, contents: bool) -> Self {
        if !names && !contents {
            Self::both()
        } else {
            Self { names, contents }
        }
    }

    pub fn both() -> Self {
        Self {
            names: true,
            contents: true,
        }
    }
}

impl Default for SearchMode {
    fn default() -> Self {
        Self::both()
    }
}

/// Tests single paths and reports what it finds.
///
/// Nothing here returns an error to the caller: unreadable files are
/// reported, counted and skipped so one bad path never ends the run.
#[derive(Debug, Clone)]
pub struct PathSearcher {
    matcher: Arc<PatternMatcher>,
    predicate: Arc<IgnorePredicate>,
    mode: SearchMode,
    reporter: Arc<Reporter>,
    stats: Arc<SearchStats>,
}

impl PathSearcher {
    pub fn new(
        matcher: Arc<PatternMatcher>,
        predicate: Arc<IgnorePredicate>,
        mode: SearchMode,
        reporter: Arc<Reporter>,
        stats: Arc<SearchStats>,
    ) -> Self {
        Self {
            matcher,
            predicate,
            mode,
            reporter,
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<SearchStats> {
        &self.stats
    }

    pub fn reporter(&self) -> &Arc<Reporter> {
        &self.reporter
    }

    /// Runs the enabled tests on `path` and returns their results
    pub fn test_path(&self, path: &Path) -> Vec<MatchResult> {
        self.stats.record_visit();

        if !self.predicate.should_search(path) {
            self.reporter.ignored(path);
            return Vec::new();
        }

        let mut results = Vec::with_capacity(2);
        if self.mode.names {
            results.push(self.check_name(path));
        }
        if self.mode.contents && path.is_file() {
            match self.search_file(path) {
                Ok(result) => results.push(result),
                Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                    self.stats.record_access_denied();
                    self.reporter.access_denied(path);
                }
                Err(err) => {
                    self.stats.record_io_error();
                    self.reporter.io_error(path, &err);
                }
            }
        }
        results
    }

    /// Tests `path` and hands every result to the reporter and the stats
    pub fn process_path(&self, path: &Path) {
        for result in self.test_path(path) {
            self.reporter.result(&result);
            self.stats.record_result(&result);
        }
    }

    fn check_name(&self, path: &Path) -> MatchResult {
        let occurrences = path
            .file_name()
            .map_or(0, |name| self.matcher.match_count(name.as_encoded_bytes()));
        MatchResult::new(MatchKind::Name, path, occurrences)
    }

    /// Counts matches in the contents of a regular file
    fn search_file(&self, path: &Path) -> io::Result<MatchResult> {
        if fs::metadata(path)?.len() == 0 {
            trace!("Empty file: {}", path.display());
            return Ok(MatchResult::new(MatchKind::File, path, 0));
        }

        let file = File::open(path)?;
        // The mapping is read-only and dropped before returning. A file
        // truncated by another process while mapped can still fault.
        let mmap = unsafe { Mmap::map(&file) }?;
        self.stats.record_file_read(mmap.len() as u64);

        let occurrences = self.matcher.match_count(&mmap);
        trace!("{} occurrence(s) in {}", occurrences, path.display());
        Ok(MatchResult::new(MatchKind::File, path, occurrences))
    }
}
