use std::fs::{self, FileType};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

use crate::filters::IgnorePredicate;

/// What kind of filesystem object an entry is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symlinks, sockets, devices and the like. Never expanded.
    Other,
}

impl EntryKind {
    fn from_file_type(file_type: FileType) -> Self {
        if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }
}

/// A path produced by the crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Descent steps from the root the entry was found under
    pub depth: usize,
}

impl CrawlEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

impl From<DirEntry> for CrawlEntry {
    fn from(entry: DirEntry) -> Self {
        Self {
            kind: EntryKind::from_file_type(entry.file_type()),
            depth: entry.depth(),
            path: entry.into_path(),
        }
    }
}

/// Receives listing failures; the failing directory is treated as empty
pub type ErrorHandler = Box<dyn FnMut(&Path, &io::Error) + Send>;

fn log_listing_error(path: &Path, err: &io::Error) {
    if err.kind() == io::ErrorKind::PermissionDenied {
        debug!("Permission denied: {}", path.display());
    } else {
        warn!("Failed to list {}: {}", path.display(), err);
    }
}

/// Lazy, depth-first directory walk.
///
/// The walk is pre-order: a directory is yielded before anything below it,
/// and a subdirectory is only opened once the walk reaches it, so dropping
/// the iterator stops the walk without touching the rest of the tree.
///
/// The root has depth 0 and every descent adds one. Every entry that is
/// encountered is yielded; a directory at depth `d` is only expanded when the
/// ignore predicate accepts it and `d <= max_depth`. With `max_depth = Some(0)`
/// the walk yields the root and its direct children. Symlinks below the root
/// are yielded but never followed.
///
/// Cheap to clone; one `Crawler` can start any number of walks.
#[derive(Debug, Clone, Default)]
pub struct Crawler {
    predicate: Arc<IgnorePredicate>,
    max_depth: Option<usize>,
}

impl Crawler {
    pub fn new(predicate: Arc<IgnorePredicate>, max_depth: Option<usize>) -> Self {
        Self {
            predicate,
            max_depth,
        }
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Starts a walk at `root`
    pub fn crawl(&self, root: impl Into<PathBuf>) -> Crawl {
        self.start(root.into(), Box::new(log_listing_error))
    }

    /// Starts a walk that reports listing failures to `on_error`
    pub fn crawl_with<F>(&self, root: impl Into<PathBuf>, on_error: F) -> Crawl
    where
        F: FnMut(&Path, &io::Error) + Send + 'static,
    {
        self.start(root.into(), Box::new(on_error))
    }

    fn start(&self, root: PathBuf, on_error: ErrorHandler) -> Crawl {
        let mut walker = WalkDir::new(&root).follow_links(false);
        if let Some(max_depth) = self.max_depth {
            // Entries one level below the deepest expanded directory are
            // still yielded
            walker = walker.max_depth(max_depth.saturating_add(1));
        }

        Crawl {
            inner: walker.into_iter(),
            root,
            predicate: Arc::clone(&self.predicate),
            on_error,
        }
    }
}

/// Walks `root` with no ignore rules
pub fn crawl(root: impl Into<PathBuf>, max_depth: Option<usize>) -> Crawl {
    Crawler::new(Arc::default(), max_depth).crawl(root)
}

/// Iterator over one walk; see [`Crawler`] for ordering and depth rules.
pub struct Crawl {
    inner: walkdir::IntoIter,
    root: PathBuf,
    predicate: Arc<IgnorePredicate>,
    on_error: ErrorHandler,
}

impl Crawl {
    fn handle_error(&mut self, err: walkdir::Error) {
        if err.depth() == 0 && fs::metadata(&self.root).is_err() {
            trace!("Skipping root {}: {}", self.root.display(), err);
            return;
        }
        let path = err
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);
        let message = err.to_string();
        let err = err
            .into_io_error()
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message));
        (self.on_error)(&path, &err);
    }
}

impl Iterator for Crawl {
    type Item = CrawlEntry;

    fn next(&mut self) -> Option<CrawlEntry> {
        loop {
            match self.inner.next()? {
                Ok(entry) => {
                    let entry = CrawlEntry::from(entry);
                    if entry.is_dir() && !self.predicate.should_search(&entry.path) {
                        self.inner.skip_current_dir();
                    }
                    return Some(entry);
                }
                Err(err) => self.handle_error(err),
            }
        }
    }
}
