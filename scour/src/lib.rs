pub mod config;
pub mod errors;
pub mod filters;
pub mod report;
pub mod results;
pub mod search;
pub mod stats;

pub use config::{Configuration, SearchConfig};
pub use errors::{SearchError, SearchResult};
pub use filters::{IgnorePredicate, IgnoreRule};
pub use report::{Reporter, Verbosity};
pub use results::{MatchKind, MatchResult, SearchSummary};
pub use search::{search, Dispatcher, SearchMode};
pub use stats::{SearchStats, StatsSnapshot};
