use regex::bytes::{Regex, RegexBuilder};
use std::fmt;
use tracing::debug;

use crate::errors::{SearchError, SearchResult};

/// A named regex engine flag that can be switched on from the command line
/// or from an ignore rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexFlag {
    IgnoreCase,
    MultiLine,
    DotAll,
    Verbose,
    Ascii,
    Unicode,
    SwapGreed,
    Crlf,
}

/// Option names accepted for each flag, compared case-insensitively
const FLAG_NAMES: &[(&str, RegexFlag)] = &[
    ("i", RegexFlag::IgnoreCase),
    ("ignorecase", RegexFlag::IgnoreCase),
    ("m", RegexFlag::MultiLine),
    ("multiline", RegexFlag::MultiLine),
    ("s", RegexFlag::DotAll),
    ("dotall", RegexFlag::DotAll),
    ("x", RegexFlag::Verbose),
    ("verbose", RegexFlag::Verbose),
    ("a", RegexFlag::Ascii),
    ("ascii", RegexFlag::Ascii),
    ("u", RegexFlag::Unicode),
    ("unicode", RegexFlag::Unicode),
    ("ungreedy", RegexFlag::SwapGreed),
    ("swap_greed", RegexFlag::SwapGreed),
    ("crlf", RegexFlag::Crlf),
];

impl RegexFlag {
    /// Looks up a flag by one of its option names
    pub fn from_name(name: &str) -> SearchResult<Self> {
        FLAG_NAMES
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|&(_, flag)| flag)
            .ok_or_else(|| SearchError::unknown_regex_option(name))
    }
}

/// The set of flags a pattern is compiled with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegexOptions {
    pub case_insensitive: bool,
    pub multi_line: bool,
    pub dot_matches_new_line: bool,
    pub ignore_whitespace: bool,
    /// `None` keeps the engine default (Unicode on)
    pub unicode: Option<bool>,
    pub swap_greed: bool,
    pub crlf: bool,
}

impl RegexOptions {
    /// Resolves a list of option names, failing on the first unknown name
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> SearchResult<Self> {
        let mut options = Self::default();
        for name in names {
            options.set(RegexFlag::from_name(name.as_ref())?);
        }
        Ok(options)
    }

    /// Treats every character of `letters` as a one-letter option name
    pub fn from_letters(letters: &str) -> SearchResult<Self> {
        let names: Vec<String> = letters.chars().map(String::from).collect();
        Self::from_names(&names)
    }

    pub fn set(&mut self, flag: RegexFlag) {
        match flag {
            RegexFlag::IgnoreCase => self.case_insensitive = true,
            RegexFlag::MultiLine => self.multi_line = true,
            RegexFlag::DotAll => self.dot_matches_new_line = true,
            RegexFlag::Verbose => self.ignore_whitespace = true,
            RegexFlag::Ascii => self.unicode = Some(false),
            RegexFlag::Unicode => self.unicode = Some(true),
            RegexFlag::SwapGreed => self.swap_greed = true,
            RegexFlag::Crlf => self.crlf = true,
        }
    }

    /// Compiles `pattern` as a byte regex with these options applied
    pub fn compile(&self, pattern: &str) -> SearchResult<Regex> {
        let mut builder = RegexBuilder::new(pattern);
        builder
            .case_insensitive(self.case_insensitive)
            .multi_line(self.multi_line)
            .dot_matches_new_line(self.dot_matches_new_line)
            .ignore_whitespace(self.ignore_whitespace)
            .swap_greed(self.swap_greed)
            .crlf(self.crlf);
        if let Some(unicode) = self.unicode {
            builder.unicode(unicode);
        }
        builder
            .build()
            .map_err(|e| SearchError::invalid_pattern(e.to_string()))
    }
}

/// Compiled search term, applied the same way to names and file contents.
///
/// Matching works on raw bytes so file contents never need to be valid UTF-8.
#[derive(Clone)]
pub struct PatternMatcher {
    regex: Regex,
    options: RegexOptions,
}

impl PatternMatcher {
    /// Compiles `pattern` with the given option names
    pub fn new<S: AsRef<str>>(pattern: &str, option_names: &[S]) -> SearchResult<Self> {
        let options = RegexOptions::from_names(option_names)?;
        Self::with_options(pattern, options)
    }

    pub fn with_options(pattern: &str, options: RegexOptions) -> SearchResult<Self> {
        debug!("Compiling pattern {:?} with {:?}", pattern, options);
        let regex = options.compile(pattern)?;
        Ok(Self { regex, options })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn options(&self) -> RegexOptions {
        self.options
    }

    /// Counts non-overlapping occurrences of the pattern in `haystack`
    pub fn match_count(&self, haystack: &[u8]) -> usize {
        self.regex.find_iter(haystack).count()
    }

    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.regex.is_match(haystack)
    }
}

impl fmt::Debug for PatternMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternMatcher")
            .field("pattern", &self.regex.as_str())
            .field("options", &self.options)
            .finish()
    }
}
