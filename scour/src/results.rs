use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::stats::StatsSnapshot;

/// What a match was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchKind {
    /// The base name of a file or directory
    Name,
    /// The contents of a regular file
    File,
}

impl MatchKind {
    pub const ALL: [MatchKind; 2] = [MatchKind::Name, MatchKind::File];

    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::Name => "name",
            MatchKind::File => "file",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of testing one path for one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub kind: MatchKind,
    pub path: PathBuf,
    /// Non-overlapping occurrences of the pattern
    pub occurrences: usize,
}

impl MatchResult {
    pub fn new(kind: MatchKind, path: impl Into<PathBuf>, occurrences: usize) -> Self {
        Self {
            kind,
            path: path.into(),
            occurrences,
        }
    }

    pub fn is_match(&self) -> bool {
        self.occurrences > 0
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "In {}: {} {} occurrence(s)",
            self.kind,
            self.path.display(),
            self.occurrences
        )
    }
}

/// Final numbers of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSummary {
    pub stats: StatsSnapshot,
    pub elapsed: Duration,
    /// The run was stopped before the crawl finished
    pub interrupted: bool,
}

impl SearchSummary {
    /// Paths with at least one match of `kind`
    pub fn count(&self, kind: MatchKind) -> u64 {
        self.stats.matches(kind)
    }
}

impl fmt::Display for SearchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "Search Completed.")?;
        for kind in MatchKind::ALL {
            writeln!(f, "In {}(s): {} results", kind, self.count(kind))?;
        }
        write!(f, "Time elapsed: {:.6}s", self.elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_result_display() {
        let result = MatchResult::new(MatchKind::File, "/tmp/notes.txt", 3);
        assert_eq!(result.to_string(), "In file: /tmp/notes.txt 3 occurrence(s)");
        assert!(result.is_match());

        let result = MatchResult::new(MatchKind::Name, "/tmp/notes.txt", 0);
        assert_eq!(result.to_string(), "In name: /tmp/notes.txt 0 occurrence(s)");
        assert!(!result.is_match());
    }

    #[test]
    fn test_summary_display() {
        let summary = SearchSummary {
            stats: StatsSnapshot {
                name_matches: 2,
                file_matches: 5,
                ..Default::default()
            },
            elapsed: Duration::from_millis(1500),
            interrupted: false,
        };

        assert_eq!(summary.count(MatchKind::Name), 2);
        assert_eq!(summary.count(MatchKind::File), 5);
        assert_eq!(
            summary.to_string(),
            "\nSearch Completed.\nIn name(s): 2 results\nIn file(s): 5 results\nTime elapsed: 1.500000s"
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(MatchKind::Name.as_str(), "name");
        assert_eq!(MatchKind::File.to_string(), "file");
    }
}
