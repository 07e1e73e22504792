use clap::Parser;
use colored::Colorize;
use scour::{Configuration, Dispatcher, Reporter, SearchConfig, SearchMode, SearchResult, Verbosity};
use std::env;
use std::io::{self, IsTerminal};
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "scour", author, version, about, long_about = None)]
struct Cli {
    /// Regular expression to look for in names and contents
    term: String,

    /// Directories or files to search
    #[arg(short = 's', long = "search", num_args = 1.., default_value = ".")]
    roots: Vec<PathBuf>,

    /// Only test file and directory names
    #[arg(short = 'n', long = "names")]
    names: bool,

    /// Only test file contents
    #[arg(short = 'f', long = "files")]
    files: bool,

    /// Descend into subdirectories, optionally no deeper than DEPTH
    #[arg(short = 'r', long = "recurse", value_name = "DEPTH", num_args = 0..=1)]
    recurse: Option<Option<usize>>,

    /// Regex engine flags, e.g. IGNORECASE MULTILINE
    #[arg(short = 'R', long = "regex-options", num_args = 1..)]
    regex_options: Vec<String>,

    /// Worker threads; 0 searches on the main thread
    #[arg(short = 't', long, default_value_t = scour::config::DEFAULT_THREADS)]
    threads: usize,

    /// Also print paths that could not be read
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Print every result, ignored paths and diagnostics
    #[arg(long)]
    debug: bool,

    /// Configuration file to use before the default locations
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn verbosity(&self) -> Verbosity {
        if self.debug {
            Verbosity::Debug
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    /// Without `-r` only the roots' direct children are searched
    fn max_depth(&self) -> Option<usize> {
        match self.recurse {
            None => Some(0),
            Some(depth) => depth,
        }
    }

    fn search_config(&self) -> SearchConfig {
        let cwd = env::current_dir().ok();
        let roots = self.roots.iter().map(|root| absolute(cwd.as_deref(), root));

        SearchConfig::new(self.term.clone())
            .with_roots(roots)
            .with_mode(SearchMode::from_flags(self.names, self.files))
            .with_max_depth(self.max_depth())
            .with_threads(self.threads)
            .with_regex_options(self.regex_options.iter().cloned())
    }
}

/// Joins relative roots onto `cwd` and drops `.` components
fn absolute(cwd: Option<&Path>, root: &Path) -> PathBuf {
    let joined = match cwd {
        Some(cwd) if root.is_relative() => cwd.join(root),
        _ => root.to_path_buf(),
    };
    joined
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

fn init_tracing(verbosity: Verbosity) {
    let default_level = match verbosity {
        Verbosity::Normal => "warn",
        Verbosity::Verbose => "info",
        Verbosity::Debug => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> SearchResult<bool> {
    let configuration = Configuration::load(cli.config.as_deref())?;
    if let Some(source) = &configuration.source {
        debug!("Loaded {} ignore rule(s) from {}", configuration.ignore.rules().len(), source.display());
    }

    let config = cli.search_config();
    let reporter = Reporter::stdout(cli.verbosity()).with_color(io::stdout().is_terminal());
    let dispatcher = Dispatcher::from_config(&config, &configuration, Arc::new(reporter))?;

    let stop = dispatcher.stop_handle();
    if let Err(err) = ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst)) {
        warn!("Could not install interrupt handler: {}", err);
    }

    let summary = dispatcher.run(&config.roots)?;
    Ok(!summary.interrupted)
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing(cli.verbosity());

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            println!("Interrupted.");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("{} {}", "Error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("scour").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_recurse_flag_depths() {
        assert_eq!(parse(&["term"]).max_depth(), Some(0));
        assert_eq!(parse(&["term", "-r"]).max_depth(), None);
        assert_eq!(parse(&["term", "-r", "3"]).max_depth(), Some(3));
        assert_eq!(parse(&["term", "--recurse=2"]).max_depth(), Some(2));
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["needle"]);
        assert_eq!(cli.roots, vec![PathBuf::from(".")]);
        assert_eq!(cli.threads, scour::config::DEFAULT_THREADS);
        assert_eq!(cli.verbosity(), Verbosity::Normal);

        let config = cli.search_config();
        assert_eq!(config.mode, SearchMode::both());
        assert!(config.roots.iter().all(|root| root.is_absolute()));
    }

    #[test]
    fn test_multiple_roots_and_options() {
        let cli = parse(&["x", "-s", "/a", "/b", "-R", "IGNORECASE", "DOTALL", "-n", "--debug"]);
        assert_eq!(cli.roots, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(cli.regex_options, vec!["IGNORECASE", "DOTALL"]);
        assert_eq!(cli.verbosity(), Verbosity::Debug);

        let config = cli.search_config();
        assert!(config.mode.names && !config.mode.contents);
    }

    #[test]
    fn test_relative_roots_are_made_absolute() {
        let cwd = Path::new("/work");
        assert_eq!(absolute(Some(cwd), Path::new("src")), PathBuf::from("/work/src"));
        assert_eq!(absolute(Some(cwd), Path::new("/etc")), PathBuf::from("/etc"));
        assert_eq!(absolute(None, Path::new("src")), PathBuf::from("src"));
        assert_eq!(absolute(Some(cwd), Path::new(".")), PathBuf::from("/work"));
        assert_eq!(absolute(Some(cwd), Path::new("./src/./lib")), PathBuf::from("/work/src/lib"));
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        assert!(Cli::try_parse_from(["scour", "term", "--bogus"]).is_err());
    }
}
