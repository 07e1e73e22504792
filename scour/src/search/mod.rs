pub mod crawler;
pub mod engine;
pub mod matcher;
pub mod processor;

pub use crawler::{crawl, Crawl, CrawlEntry, Crawler, EntryKind};
pub use engine::{search, DispatchState, Dispatcher};
pub use matcher::{PatternMatcher, RegexFlag, RegexOptions};
pub use processor::{PathSearcher, SearchMode};
