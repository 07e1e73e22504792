use colored::Colorize;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::trace;

use crate::results::{MatchResult, SearchSummary};

/// How much the reporter prints. Each level includes the ones before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Matching paths and the final summary
    #[default]
    Normal,
    /// Also paths that could not be read
    Verbose,
    /// Also paths without matches and ignored paths
    Debug,
}

/// User-facing output, serialised from all workers onto one sink.
///
/// Built once with the verbosity the user asked for and handed to the
/// searcher and dispatcher. Developer diagnostics still go through `tracing`.
pub struct Reporter {
    verbosity: Verbosity,
    color: bool,
    out: Mutex<Box<dyn Write + Send>>,
}

impl Reporter {
    pub fn new(verbosity: Verbosity, out: impl Write + Send + 'static) -> Self {
        Self {
            verbosity,
            color: false,
            out: Mutex::new(Box::new(out)),
        }
    }

    pub fn stdout(verbosity: Verbosity) -> Self {
        Self::new(verbosity, io::stdout())
    }

    /// Highlights paths in match lines
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn enabled(&self, level: Verbosity) -> bool {
        self.verbosity >= level
    }

    /// Writes one line if `level` is enabled
    pub fn emit(&self, level: Verbosity, line: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            trace!("Dropped output line: {}", err);
        }
    }

    /// Match lines print normally; zero counts only at debug verbosity
    pub fn result(&self, result: &MatchResult) {
        let level = if result.is_match() {
            Verbosity::Normal
        } else {
            Verbosity::Debug
        };
        if !self.enabled(level) {
            return;
        }
        if self.color {
            self.emit(
                level,
                format_args!(
                    "In {}: {} {} occurrence(s)",
                    result.kind,
                    result.path.display().to_string().blue(),
                    result.occurrences.to_string().green()
                ),
            );
        } else {
            self.emit(level, format_args!("{}", result));
        }
    }

    pub fn access_denied(&self, path: &Path) {
        self.emit(
            Verbosity::Verbose,
            format_args!("Permission denied: {}", path.display()),
        );
    }

    pub fn io_error(&self, path: &Path, err: &io::Error) {
        self.emit(
            Verbosity::Verbose,
            format_args!(
                "Error opening file: {}: {:?}: {}",
                path.display(),
                err.kind(),
                err
            ),
        );
    }

    pub fn ignored(&self, path: &Path) {
        self.emit(
            Verbosity::Debug,
            format_args!("Ignoring path due to configuration: {}", path.display()),
        );
    }

    pub fn summary(&self, summary: &SearchSummary) {
        self.emit(Verbosity::Normal, format_args!("{}", summary));
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("verbosity", &self.verbosity)
            .field("color", &self.color)
            .finish_non_exhaustive()
    }
}

/// In-memory sink; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct BufferSink(Arc<Mutex<Vec<u8>>>);

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buffer = match self.0.lock() {
            Ok(buffer) => buffer,
            Err(poisoned) => poisoned.into_inner(),
        };
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }
}

impl Write for BufferSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut buffer = match self.0.lock() {
            Ok(buffer) => buffer,
            Err(poisoned) => poisoned.into_inner(),
        };
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
