use config::{Config as ConfigBuilder, File, FileFormat};
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::errors::{SearchError, SearchResult};
use crate::filters::IgnorePredicate;
use crate::search::processor::SearchMode;

/// Environment variable naming a configuration file to try first
pub const CONFIG_ENV_VAR: &str = "SCOUR_CONFIG";

/// Default candidates, in order. `~` is the home directory; each entry is
/// glob-expanded so `~/.scour.conf.yaml` and `~/.scour.conf.json` both count.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["~/.scour.conf*", "/etc/scour.conf*"];

/// Default worker count
pub const DEFAULT_THREADS: usize = 4;

/// Paths queued per worker before the crawl waits for the workers
pub(crate) const QUEUE_SLOTS_PER_WORKER: usize = 64;

/// Resolved options for one run.
///
/// The configuration file only carries ignore rules; everything here comes
/// from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Regular expression matched against names and contents
    pub pattern: String,

    /// Names of regex engine flags, validated when the matcher is built
    pub regex_options: Vec<String>,

    /// Roots to crawl, in order
    pub roots: Vec<PathBuf>,

    /// Whether names and/or contents are tested
    pub mode: SearchMode,

    /// Deepest directory that is still expanded; `None` is unlimited
    pub max_depth: Option<usize>,

    /// Worker threads; 0 runs everything on the calling thread
    pub threads: usize,

    /// Capacity of the path queue between the crawl and the workers
    pub queue_capacity: usize,
}

impl SearchConfig {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            regex_options: Vec::new(),
            roots: vec![PathBuf::from(".")],
            mode: SearchMode::both(),
            max_depth: Some(0),
            threads: DEFAULT_THREADS,
            queue_capacity: DEFAULT_THREADS * QUEUE_SLOTS_PER_WORKER,
        }
    }

    pub fn with_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.roots = roots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Also resizes the queue to match the worker count
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self.queue_capacity = threads.max(1) * QUEUE_SLOTS_PER_WORKER;
        self
    }

    pub fn with_regex_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regex_options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// Settings read from the configuration file
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    /// File the settings came from, if any
    pub source: Option<PathBuf>,
    pub ignore: IgnorePredicate,
}

impl Configuration {
    /// Validates a parsed configuration document.
    ///
    /// `ignore` is the only recognised top-level key.
    pub fn from_document(mut document: Map<String, Value>, source: Option<PathBuf>) -> SearchResult<Self> {
        let ignore = match document.remove("ignore") {
            // `ignore:` with nothing after it
            Some(Value::Null) | None => IgnorePredicate::default(),
            Some(value) => IgnorePredicate::from_value(&value).map_err(|e| e.within("ignore"))?,
        };

        if !document.is_empty() {
            let keys: Vec<&String> = document.keys().collect();
            return Err(SearchError::config_error(
                "",
                format!("Unrecognized keys: {:?}", keys),
            ));
        }

        Ok(Self { source, ignore })
    }

    /// Loads the first configuration found among the default locations.
    ///
    /// `explicit` (from the command line) is tried first, then
    /// `$SCOUR_CONFIG`, then [`DEFAULT_CONFIG_PATHS`].
    pub fn load(explicit: Option<&Path>) -> SearchResult<Self> {
        let mut candidates = Vec::new();
        candidates.extend(explicit.map(Path::to_path_buf));
        if let Some(path) = env::var_os(CONFIG_ENV_VAR) {
            candidates.push(PathBuf::from(path));
        }
        candidates.extend(DEFAULT_CONFIG_PATHS.iter().flat_map(|p| expand_candidate(p)));
        Self::load_from_candidates(&candidates)
    }

    /// Loads the first candidate that is an existing, readable file.
    ///
    /// No candidate at all gives an empty configuration.
    pub fn load_from_candidates(candidates: &[PathBuf]) -> SearchResult<Self> {
        for path in candidates {
            if let Some(document) = read_document(path)? {
                debug!("Using configuration from: {}", path.display());
                return Self::from_document(document, Some(path.clone()));
            }
        }
        debug!("No configuration file found");
        Ok(Self::default())
    }

    pub fn should_search(&self, path: &Path) -> bool {
        self.ignore.should_search(path)
    }
}

/// Expands `~` and glob characters; entries without matches expand to nothing
fn expand_candidate(pattern: &str) -> Vec<PathBuf> {
    let expanded = match pattern.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => return Vec::new(),
        },
        None => PathBuf::from(pattern),
    };

    let expanded = expanded.to_string_lossy().into_owned();
    match glob::glob(&expanded) {
        Ok(paths) => paths.filter_map(Result::ok).collect(),
        Err(err) => {
            warn!("Invalid configuration path pattern {}: {}", expanded, err);
            Vec::new()
        }
    }
}

/// Formats worth trying for a file, best guess first
fn candidate_formats(path: &Path) -> Vec<FileFormat> {
    const ALL: [FileFormat; 2] = [FileFormat::Json, FileFormat::Yaml];

    let guessed = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Some(FileFormat::Json),
        Some("yml") | Some("yaml") => Some(FileFormat::Yaml),
        _ => None,
    };

    let mut formats: Vec<FileFormat> = guessed.into_iter().collect();
    formats.extend(ALL.into_iter().filter(|f| Some(*f) != guessed));
    formats
}

/// Reads and parses one candidate.
///
/// `Ok(None)` means "not usable, try the next one": missing, not a regular
/// file, or unreadable. A file no format can parse is used as an empty
/// document.
fn read_document(path: &Path) -> SearchResult<Option<Map<String, Value>>> {
    if !path.is_file() {
        trace!("Skipping configuration candidate {}", path.display());
        return Ok(None);
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err)
            if matches!(
                err.kind(),
                io::ErrorKind::PermissionDenied
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::InvalidData
            ) =>
        {
            debug!("Cannot read configuration {}: {}", path.display(), err);
            return Ok(None);
        }
        Err(err) => return Err(SearchError::IoError(err)),
    };

    for format in candidate_formats(path) {
        let parsed = ConfigBuilder::builder()
            .add_source(File::from_str(&content, format))
            .build()
            .and_then(|built| built.try_deserialize::<Map<String, Value>>());
        match parsed {
            Ok(document) => return Ok(Some(document)),
            Err(err) => trace!("{} is not {:?}: {}", path.display(), format, err),
        }
    }

    warn!(
        "Could not parse configuration {}, using defaults",
        path.display()
    );
    Ok(Some(Map::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_yaml_config() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "scour.yaml",
            r#"
ignore:
  - "*.pyc"
  - glob: ".git"
  - regex: "^tmp_"
    options: [IGNORECASE]
"#,
        );

        let config = Configuration::load_from_candidates(&[path.clone()]).unwrap();
        assert_eq!(config.source, Some(path));
        assert_eq!(config.ignore.rules().len(), 3);
        assert!(!config.should_search(Path::new("/x/mod.pyc")));
        assert!(!config.should_search(Path::new("/x/.git")));
        assert!(!config.should_search(Path::new("/x/TMP_file")));
        assert!(config.should_search(Path::new("/x/main.rs")));
    }

    #[test]
    fn test_load_json_config() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "scour.json",
            r#"{"ignore": ["node_modules", {"regex": "\\.min\\.js$"}]}"#,
        );

        let config = Configuration::load_from_candidates(&[path]).unwrap();
        assert!(!config.should_search(Path::new("/web/node_modules")));
        assert!(!config.should_search(Path::new("/web/app.min.js")));
        assert!(config.should_search(Path::new("/web/app.js")));
    }

    #[test]
    fn test_format_fallback_without_extension() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), ".scour.conf", "ignore:\n  - target\n");

        let config = Configuration::load_from_candidates(&[path]).unwrap();
        assert!(!config.should_search(Path::new("/repo/target")));
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        let first = write(dir.path(), "first.yaml", "ignore: [first]\n");
        let second = write(dir.path(), "second.yaml", "ignore: [second]\n");

        let config =
            Configuration::load_from_candidates(&[missing, dir.path().to_path_buf(), first.clone(), second])
                .unwrap();
        assert_eq!(config.source, Some(first));
        assert!(!config.should_search(Path::new("first")));
        assert!(config.should_search(Path::new("second")));
    }

    #[test]
    fn test_empty_ignore_key_gives_empty_config() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "scour.yaml", "ignore:\n");

        let config = Configuration::load_from_candidates(&[path.clone()]).unwrap();
        assert_eq!(config.source, Some(path));
        assert!(config.ignore.is_empty());

        let mut document = Map::new();
        document.insert("ignore".to_string(), Value::Null);
        let config = Configuration::from_document(document, None).unwrap();
        assert!(config.ignore.is_empty());
    }

    #[test]
    fn test_no_candidates_gives_empty_config() {
        let config = Configuration::load_from_candidates(&[]).unwrap();
        assert!(config.source.is_none());
        assert!(config.ignore.is_empty());
    }

    #[test]
    fn test_unparsable_file_gives_empty_config() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "broken.json", "{ this is : not [ valid");

        let config = Configuration::load_from_candidates(&[path.clone()]).unwrap();
        assert_eq!(config.source, Some(path));
        assert!(config.ignore.is_empty());
    }

    #[test]
    fn test_unknown_top_level_key() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "scour.yaml", "ignore: []\ncolour: always\n");

        let err = Configuration::load_from_candidates(&[path]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Unrecognized keys: [\"colour\"]"
        );
    }

    #[test]
    fn test_rule_with_two_pattern_types_is_rejected() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "scour.yaml",
            "ignore:\n  - \"*.log\"\n  - glob: \"*.tmp\"\n    regex: \"tmp\"\n",
        );

        let err = Configuration::load_from_candidates(&[path]).unwrap_err();
        let message = err.to_string();
        assert!(
            message.starts_with("Configuration error at path: ignore>1: Multiple pattern types found"),
            "unexpected message: {message}"
        );
    }

    #[test]
    fn test_search_config_builders() {
        let config = SearchConfig::new("needle")
            .with_roots(["/a", "/b"])
            .with_mode(SearchMode::from_flags(true, false))
            .with_max_depth(None)
            .with_threads(8)
            .with_regex_options(["IGNORECASE"]);

        assert_eq!(config.pattern, "needle");
        assert_eq!(config.roots, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert!(config.mode.names && !config.mode.contents);
        assert_eq!(config.max_depth, None);
        assert_eq!(config.threads, 8);
        assert_eq!(config.queue_capacity, 8 * QUEUE_SLOTS_PER_WORKER);
        assert_eq!(config.regex_options, vec!["IGNORECASE".to_string()]);

        let sequential = SearchConfig::new("x").with_threads(0);
        assert_eq!(sequential.queue_capacity, QUEUE_SLOTS_PER_WORKER);
    }

    #[test]
    fn test_search_config_defaults() {
        let config = SearchConfig::new("x");
        assert_eq!(config.threads, DEFAULT_THREADS);
        assert_eq!(config.max_depth, Some(0));
        assert_eq!(config.mode, SearchMode::both());
        assert_eq!(config.roots, vec![PathBuf::from(".")]);
    }
}
