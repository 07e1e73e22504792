use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use rayon::ThreadPoolBuilder;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::crawler::{Crawl, Crawler};
use super::matcher::PatternMatcher;
use super::processor::PathSearcher;
use crate::config::{Configuration, SearchConfig, QUEUE_SLOTS_PER_WORKER};
use crate::errors::SearchResult;
use crate::report::Reporter;
use crate::results::SearchSummary;
use crate::stats::SearchStats;

/// How long a blocked worker or producer waits before checking the stop flag
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lifecycle of a [`Dispatcher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    /// The crawl is feeding paths to the workers
    Running,
    /// The crawl is done or stopped; workers are finishing queued paths
    Draining,
}

/// Feeds crawled paths to a pool of workers.
///
/// The crawl runs on the calling thread and pushes paths into a bounded
/// queue; `threads` workers take paths off it and run them through the
/// [`PathSearcher`]. With `threads == 0` every path is searched inline on
/// the calling thread instead.
#[derive(Debug)]
pub struct Dispatcher {
    searcher: PathSearcher,
    crawler: Crawler,
    threads: usize,
    queue_capacity: usize,
    stop: Arc<AtomicBool>,
    state: Mutex<DispatchState>,
}

impl Dispatcher {
    pub fn new(searcher: PathSearcher, crawler: Crawler, threads: usize) -> Self {
        Self {
            searcher,
            crawler,
            threads,
            queue_capacity: threads.max(1) * QUEUE_SLOTS_PER_WORKER,
            stop: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(DispatchState::Idle),
        }
    }

    /// Builds the matcher, searcher and crawler for one run.
    ///
    /// Fails if the pattern does not compile or names an unknown option.
    pub fn from_config(
        config: &SearchConfig,
        configuration: &Configuration,
        reporter: Arc<Reporter>,
    ) -> SearchResult<Self> {
        let matcher = Arc::new(PatternMatcher::new(&config.pattern, &config.regex_options)?);
        let predicate = Arc::new(configuration.ignore.clone());
        let searcher = PathSearcher::new(
            matcher,
            Arc::clone(&predicate),
            config.mode,
            reporter,
            Arc::new(SearchStats::new()),
        );
        let crawler = Crawler::new(predicate, config.max_depth);

        Ok(Self::new(searcher, crawler, config.threads).with_queue_capacity(config.queue_capacity))
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Flag that stops the run when set. Safe to set from a signal handler.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> DispatchState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn stats(&self) -> &Arc<SearchStats> {
        self.searcher.stats()
    }

    fn set_state(&self, next: DispatchState) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        debug!("Dispatcher state: {:?} -> {:?}", *state, next);
        *state = next;
    }

    /// Searches every root in order and reports the summary.
    ///
    /// Returns once all workers have finished. If the stop flag was set the
    /// summary covers whatever was processed and is marked interrupted.
    pub fn run<P: AsRef<Path>>(&self, roots: &[P]) -> SearchResult<SearchSummary> {
        let started = Instant::now();
        info!(
            "Searching {} root(s) with {} worker(s)",
            roots.len(),
            self.threads
        );

        self.set_state(DispatchState::Running);
        let outcome = if self.threads == 0 {
            self.run_inline(roots);
            Ok(())
        } else {
            self.run_pooled(roots)
        };
        self.set_state(DispatchState::Idle);
        outcome?;

        let elapsed = started.elapsed();
        let summary = SearchSummary {
            stats: self.stats().snapshot(),
            elapsed,
            interrupted: self.is_stopped(),
        };

        self.searcher.reporter().summary(&summary);
        self.stats().log_stats();
        debug!(
            "Search finished in {}",
            humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64))
        );
        Ok(summary)
    }

    fn run_inline<P: AsRef<Path>>(&self, roots: &[P]) {
        'roots: for root in roots {
            for entry in self.crawl(root.as_ref()) {
                if self.is_stopped() {
                    break 'roots;
                }
                self.searcher.process_path(&entry.path);
            }
        }
        self.set_state(DispatchState::Draining);
    }

    fn run_pooled<P: AsRef<Path>>(&self, roots: &[P]) -> SearchResult<()> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("scour-worker-{}", i))
            .build()?;
        let (sender, receiver) = bounded::<PathBuf>(self.queue_capacity);

        // The crawl stays on this thread; every pool thread is a worker
        pool.in_place_scope(|scope| {
            for _ in 0..self.threads {
                let receiver = receiver.clone();
                let searcher = &self.searcher;
                let stop = &*self.stop;
                scope.spawn(move |_| work(searcher, &receiver, stop));
            }
            drop(receiver);

            self.produce(roots, &sender);
            drop(sender);
            self.set_state(DispatchState::Draining);
        });
        Ok(())
    }

    /// Pushes every crawled path onto the queue until the crawl ends or the
    /// stop flag is set
    fn produce<P: AsRef<Path>>(&self, roots: &[P], queue: &Sender<PathBuf>) {
        for root in roots {
            for entry in self.crawl(root.as_ref()) {
                let mut path = entry.into_path();
                loop {
                    if self.is_stopped() {
                        return;
                    }
                    match queue.send_timeout(path, POLL_INTERVAL) {
                        Ok(()) => break,
                        Err(SendTimeoutError::Timeout(returned)) => path = returned,
                        Err(SendTimeoutError::Disconnected(_)) => return,
                    }
                }
            }
        }
    }

    /// Listing failures are reported like unreadable files
    fn crawl(&self, root: &Path) -> Crawl {
        debug!("Crawling {}", root.display());
        let reporter = Arc::clone(self.searcher.reporter());
        let stats = Arc::clone(self.searcher.stats());
        self.crawler.crawl_with(root, move |path, err| {
            if err.kind() == std::io::ErrorKind::PermissionDenied {
                stats.record_access_denied();
                reporter.access_denied(path);
            } else {
                stats.record_io_error();
                reporter.io_error(path, err);
            }
        })
    }
}

fn work(searcher: &PathSearcher, queue: &Receiver<PathBuf>, stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        match queue.recv_timeout(POLL_INTERVAL) {
            Ok(path) => searcher.process_path(&path),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Runs a complete search and returns its summary
pub fn search(
    config: &SearchConfig,
    configuration: &Configuration,
    reporter: Arc<Reporter>,
) -> SearchResult<SearchSummary> {
    Dispatcher::from_config(config, configuration, reporter)?.run(&config.roots)
}
