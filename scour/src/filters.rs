use glob::Pattern;
use regex::bytes::Regex;
use serde_json::{Map, Value};
use std::ffi::OsStr;
use std::path::Path;

use crate::errors::{SearchError, SearchResult};
use crate::search::matcher::RegexOptions;

/// Keys that select the pattern type of a rule
const PATTERN_TYPES: &[&str] = &["regex", "glob"];

/// A single ignore rule
#[derive(Debug, Clone)]
pub enum IgnoreRule {
    Glob(Pattern),
    Regex(Regex),
}

impl IgnoreRule {
    pub fn glob(pattern: &str) -> SearchResult<Self> {
        Pattern::new(pattern)
            .map(IgnoreRule::Glob)
            .map_err(|e| SearchError::config_error("", format!("Invalid glob {:?}: {}", pattern, e)))
    }

    pub fn regex(pattern: &str, options: RegexOptions) -> SearchResult<Self> {
        options.compile(pattern).map(IgnoreRule::Regex).map_err(|e| {
            SearchError::config_error("", format!("Invalid regex {:?}: {}", pattern, e))
        })
    }

    /// Tests a base name against the rule
    pub fn matches(&self, name: &OsStr) -> bool {
        match self {
            IgnoreRule::Glob(pattern) => pattern.matches(&name.to_string_lossy()),
            IgnoreRule::Regex(regex) => regex.is_match(name.as_encoded_bytes()),
        }
    }

    /// Parses one entry of the `ignore` list.
    ///
    /// Error locations are relative to the entry itself.
    pub fn from_value(value: &Value) -> SearchResult<Self> {
        let entry = match value {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("glob".to_string(), other.clone());
                map
            }
        };

        let found: Vec<&str> = entry
            .keys()
            .map(String::as_str)
            .filter(|key| PATTERN_TYPES.contains(key))
            .collect();

        let kind = match found.as_slice() {
            [] => return Err(SearchError::config_error("", "No valid pattern type found")),
            [kind] => kind.to_string(),
            several => {
                return Err(SearchError::config_error(
                    "",
                    format!("Multiple pattern types found: {:?}", several),
                ))
            }
        };

        let mut params = entry;
        let pattern = match params.remove(&kind) {
            Some(Value::String(pattern)) => pattern,
            _ => {
                return Err(SearchError::config_error(
                    kind.as_str(),
                    "Pattern must be a string",
                ))
            }
        };

        match kind.as_str() {
            "glob" => {
                if let Some(key) = params.keys().next() {
                    return Err(SearchError::config_error(
                        key.as_str(),
                        format!("Invalid parameter {:?}", key),
                    ));
                }
                Self::glob(&pattern)
            }
            _ => {
                let options = match params.remove("options") {
                    None => RegexOptions::default(),
                    Some(value) => parse_regex_options(&value).map_err(|e| e.within("options"))?,
                };
                if let Some(key) = params.keys().next() {
                    return Err(SearchError::config_error(
                        key.as_str(),
                        format!("Invalid parameter {:?}", key),
                    ));
                }
                Self::regex(&pattern, options)
            }
        }
    }
}

/// `options` is either a list of option names or a string of one-letter names
fn parse_regex_options(value: &Value) -> SearchResult<RegexOptions> {
    let resolved = match value {
        Value::String(letters) => RegexOptions::from_letters(letters),
        Value::Array(items) => {
            let mut names = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                match item {
                    Value::String(name) => names.push(name.clone()),
                    _ => {
                        return Err(SearchError::config_error(
                            index.to_string(),
                            "Option name must be a string",
                        ))
                    }
                }
            }
            RegexOptions::from_names(&names)
        }
        _ => {
            return Err(SearchError::config_error(
                "",
                "Options must be a list of names or a string of letters",
            ))
        }
    };

    resolved.map_err(|e| match e {
        SearchError::UnknownRegexOption(name) => {
            SearchError::config_error("", format!("Unknown regex option {:?}", name))
        }
        other => other,
    })
}

/// Decides whether a path takes part in the search.
///
/// Rules are tested against the base name of a path only, never against the
/// full path, so `target` prunes every directory called `target` wherever it
/// sits in the tree. They come from the `ignore` key of the configuration
/// document:
///
/// ```yaml
/// ignore:
///   - "*.pyc"                  # bare string: glob
///   - glob: ".git"
///   - regex: "^tmp_\\d+$"
///     options: [IGNORECASE]
/// ```
///
/// Shared read-only between workers once built.
#[derive(Debug, Clone, Default)]
pub struct IgnorePredicate {
    rules: Vec<IgnoreRule>,
}

impl IgnorePredicate {
    pub fn new(rules: Vec<IgnoreRule>) -> Self {
        Self { rules }
    }

    /// Builds the predicate from the value of the `ignore` key.
    ///
    /// A single entry is accepted in place of a list. Error locations are
    /// relative to the value, starting with the entry index.
    pub fn from_value(value: &Value) -> SearchResult<Self> {
        let entries = match value {
            Value::Array(entries) => entries.clone(),
            other => vec![other.clone()],
        };

        let rules = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| IgnoreRule::from_value(entry).map_err(|e| e.within(index)))
            .collect::<SearchResult<Vec<_>>>()?;

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns false when any rule matches the base name of `path`
    pub fn should_search(&self, path: &Path) -> bool {
        match path.file_name() {
            Some(name) => !self.rules.iter().any(|rule| rule.matches(name)),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn location(err: SearchError) -> (String, String) {
        match err {
            SearchError::Config { path, reason } => (path, reason),
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_strings_are_globs() {
        let predicate = IgnorePredicate::from_value(&json!(["*.pyc", ".git"])).unwrap();
        assert_eq!(predicate.rules().len(), 2);
        assert!(matches!(predicate.rules()[0], IgnoreRule::Glob(_)));

        assert!(!predicate.should_search(Path::new("/src/module.pyc")));
        assert!(!predicate.should_search(Path::new("/repo/.git")));
        assert!(predicate.should_search(Path::new("/src/module.py")));
        assert!(predicate.should_search(Path::new("/repo/.github")));
    }

    #[test]
    fn test_only_base_name_is_tested() {
        let predicate = IgnorePredicate::from_value(&json!(["build"])).unwrap();
        assert!(!predicate.should_search(Path::new("/a/build")));
        assert!(predicate.should_search(Path::new("/a/build/output.txt")));
    }

    #[test]
    fn test_single_entry_is_accepted() {
        let predicate = IgnorePredicate::from_value(&json!("*.log")).unwrap();
        assert!(!predicate.should_search(Path::new("server.log")));
        assert!(predicate.should_search(Path::new("server.txt")));
    }

    #[test]
    fn test_regex_rule_with_options() {
        let predicate = IgnorePredicate::from_value(&json!([
            {"regex": "^tmp_\\d+$", "options": ["IGNORECASE"]}
        ]))
        .unwrap();

        assert!(!predicate.should_search(Path::new("/x/TMP_42")));
        assert!(!predicate.should_search(Path::new("/x/tmp_7")));
        assert!(predicate.should_search(Path::new("/x/tmp_7.txt")));
    }

    #[test]
    fn test_regex_rule_is_unanchored() {
        let predicate = IgnorePredicate::from_value(&json!([{"regex": "cache"}])).unwrap();
        assert!(!predicate.should_search(Path::new("/x/.pytest_cache")));
        assert!(!predicate.should_search(Path::new("/x/cache.db")));
        assert!(predicate.should_search(Path::new("/x/CACHE")));
    }

    #[test]
    fn test_regex_options_as_letters() {
        let predicate =
            IgnorePredicate::from_value(&json!([{"regex": "^readme", "options": "i"}])).unwrap();
        assert!(!predicate.should_search(Path::new("README.md")));
    }

    #[test]
    fn test_explicit_glob_entry() {
        let predicate = IgnorePredicate::from_value(&json!([{"glob": "node_modules"}])).unwrap();
        assert!(!predicate.should_search(Path::new("/web/node_modules")));
    }

    #[test]
    fn test_glob_is_case_sensitive() {
        let predicate = IgnorePredicate::from_value(&json!(["*.TXT"])).unwrap();
        assert!(predicate.should_search(Path::new("notes.txt")));
        assert!(!predicate.should_search(Path::new("notes.TXT")));
    }

    #[test]
    fn test_empty_predicate_searches_everything() {
        let predicate = IgnorePredicate::default();
        assert!(predicate.is_empty());
        assert!(predicate.should_search(Path::new("/anything/at/all")));
        assert!(predicate.should_search(Path::new("/")));
    }

    #[test]
    fn test_no_pattern_type() {
        let err = IgnorePredicate::from_value(&json!(["*.pyc", {"options": ["I"]}])).unwrap_err();
        let (path, reason) = location(err);
        assert_eq!(path, "1");
        assert_eq!(reason, "No valid pattern type found");
    }

    #[test]
    fn test_multiple_pattern_types() {
        let err = IgnorePredicate::from_value(&json!([{"glob": "*.a", "regex": "b"}])).unwrap_err();
        let (path, reason) = location(err);
        assert_eq!(path, "0");
        assert!(reason.starts_with("Multiple pattern types found"));
        assert!(reason.contains("glob") && reason.contains("regex"));
    }

    #[test]
    fn test_glob_rejects_options() {
        let err =
            IgnorePredicate::from_value(&json!([{"glob": "*.a", "options": ["I"]}])).unwrap_err();
        let (path, reason) = location(err);
        assert_eq!(path, "0>options");
        assert_eq!(reason, "Invalid parameter \"options\"");
    }

    #[test]
    fn test_regex_rejects_unknown_parameter() {
        let err =
            IgnorePredicate::from_value(&json!(["x", {"regex": "a", "flags": 1}])).unwrap_err();
        let (path, _) = location(err);
        assert_eq!(path, "1>flags");
    }

    #[test]
    fn test_unknown_regex_option_in_rule() {
        let err = IgnorePredicate::from_value(&json!([{"regex": "a", "options": ["NOPE"]}]))
            .unwrap_err();
        let (path, reason) = location(err);
        assert_eq!(path, "0>options");
        assert!(reason.contains("NOPE"));
    }

    #[test]
    fn test_non_string_pattern() {
        let err = IgnorePredicate::from_value(&json!([42])).unwrap_err();
        let (path, reason) = location(err);
        assert_eq!(path, "0>glob");
        assert_eq!(reason, "Pattern must be a string");
    }

    #[test]
    fn test_invalid_regex_in_rule() {
        let err = IgnorePredicate::from_value(&json!([{"regex": "(open"}])).unwrap_err();
        let (path, reason) = location(err);
        assert_eq!(path, "0");
        assert!(reason.starts_with("Invalid regex"));
    }
}
