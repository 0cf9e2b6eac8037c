use crate::error::{Error, Result};
use crate::Cli;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:9011";
pub const DEFAULT_SPEC_URL: &str =
    "https://raw.githubusercontent.com/FusionAuth/fusionauth-openapi/main/openapi.yaml";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Settings read from the optional `.docverify.toml` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub url: Option<String>,
    pub timeout: Option<u64>,
    pub concurrency: Option<usize>,
    pub retries: Option<u32>,
    pub report_path: Option<PathBuf>,
    pub spec_path: Option<PathBuf>,
    pub spec_url: Option<String>,
    pub docs: Option<Vec<PathBuf>>,
    pub patterns: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub similarity_threshold: Option<f64>,
    pub include_deprecated: Option<bool>,
}

impl FileConfig {
    /// Missing file is not an error; a malformed one is.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Immutable run configuration, built once and passed to every stage.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub api_key: Option<String>,
    pub verbose: bool,
    pub quiet: bool,
    pub fix_docs: bool,
    pub watch: bool,
    pub include_deprecated: bool,
    pub timeout: Duration,
    pub concurrency: usize,
    /// Parsed and reported, never consulted: live probes are single-shot.
    pub retries: u32,
    pub report_path: PathBuf,
    pub spec_cache_path: PathBuf,
    pub spec_url: String,
    pub doc_roots: Vec<PathBuf>,
    pub patterns: Vec<String>,
    pub excludes: Vec<String>,
    pub similarity_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            verbose: false,
            quiet: false,
            fix_docs: false,
            watch: false,
            include_deprecated: false,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            concurrency: DEFAULT_CONCURRENCY,
            retries: 0,
            report_path: PathBuf::from(".docverify/report.json"),
            spec_cache_path: PathBuf::from(".docverify/openapi.json"),
            spec_url: DEFAULT_SPEC_URL.to_string(),
            doc_roots: vec![PathBuf::from(".")],
            patterns: ["**/*.md", "**/*.mdx", "**/*.txt", "**/*.rst"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            excludes: Vec::new(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl Config {
    /// Defaults, then the config file, then environment and flags (clap
    /// resolves those two).
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let file = FileConfig::load(&cli.config)?;
        Self::merge(cli, file)
    }

    pub fn merge(cli: &Cli, file: FileConfig) -> Result<Self> {
        let defaults = Config::default();

        let base_url = cli
            .url
            .clone()
            .or(file.url)
            .unwrap_or(defaults.base_url)
            .trim_end_matches('/')
            .to_string();

        let timeout_ms = cli.timeout.or(file.timeout).unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }

        let similarity_threshold = file
            .similarity_threshold
            .unwrap_or(defaults.similarity_threshold);
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(Error::Config(format!(
                "similarity-threshold must be within 0.0..=1.0, got {similarity_threshold}"
            )));
        }

        let doc_roots = if !cli.docs.is_empty() {
            cli.docs.clone()
        } else {
            file.docs.unwrap_or(defaults.doc_roots)
        };

        let patterns = if !cli.pattern.is_empty() {
            cli.pattern.clone()
        } else {
            file.patterns.unwrap_or(defaults.patterns)
        };

        let mut excludes = file.exclude.unwrap_or_default();
        excludes.extend(cli.exclude.iter().cloned());

        Ok(Self {
            base_url,
            api_key: cli.api_key.clone().filter(|k| !k.trim().is_empty()),
            verbose: cli.verbose,
            quiet: cli.quiet,
            fix_docs: cli.fix_docs,
            watch: cli.watch,
            include_deprecated: cli.include_deprecated || file.include_deprecated.unwrap_or(false),
            timeout: Duration::from_millis(timeout_ms),
            concurrency: cli
                .concurrency
                .or(file.concurrency)
                .unwrap_or(DEFAULT_CONCURRENCY)
                .max(1),
            retries: cli.retries.or(file.retries).unwrap_or(0),
            report_path: cli
                .report_path
                .clone()
                .or(file.report_path)
                .unwrap_or(defaults.report_path),
            spec_cache_path: cli
                .spec_path
                .clone()
                .or(file.spec_path)
                .unwrap_or(defaults.spec_cache_path),
            spec_url: cli
                .spec_url
                .clone()
                .or(file.spec_url)
                .unwrap_or(defaults.spec_url),
            doc_roots,
            patterns,
            excludes,
            similarity_threshold,
        })
    }

    pub fn live_checks_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            base_url: self.base_url.clone(),
            api_key_configured: self.api_key.is_some(),
            include_deprecated: self.include_deprecated,
            fix_docs: self.fix_docs,
            timeout_ms: self.timeout.as_millis() as u64,
            concurrency: self.concurrency,
            retries: self.retries,
            spec_url: self.spec_url.clone(),
            spec_cache_path: self.spec_cache_path.clone(),
            doc_roots: self.doc_roots.clone(),
            patterns: self.patterns.clone(),
            similarity_threshold: self.similarity_threshold,
        }
    }
}

/// Config as recorded in the report. Never carries the credential itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    pub base_url: String,
    pub api_key_configured: bool,
    pub include_deprecated: bool,
    pub fix_docs: bool,
    pub timeout_ms: u64,
    pub concurrency: usize,
    pub retries: u32,
    pub spec_url: String,
    pub spec_cache_path: PathBuf,
    pub doc_roots: Vec<PathBuf>,
    pub patterns: Vec<String>,
    pub similarity_threshold: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["docverify"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn test_defaults() {
        let config = Config::merge(&cli(&["--url", DEFAULT_BASE_URL]), FileConfig::default()).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_millis(10_000));
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.similarity_threshold, 0.7);
        assert!(!config.fix_docs);
        assert!(!config.watch);
    }

    #[test]
    fn test_flags_override_file() {
        let file: FileConfig = toml::from_str(
            r#"
            url = "http://file:9011"
            timeout = 2500
            concurrency = 3
            patterns = ["**/*.adoc"]
            exclude = ["drafts/**"]
            "#,
        )
        .unwrap();

        let config = Config::merge(
            &cli(&["--url", "http://flag:9011/", "--concurrency", "8", "--exclude", "old/**"]),
            file,
        )
        .unwrap();

        assert_eq!(config.base_url, "http://flag:9011");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.patterns, vec!["**/*.adoc".to_string()]);
        assert_eq!(config.excludes, vec!["drafts/**".to_string(), "old/**".to_string()]);
    }

    #[test]
    fn test_concurrency_never_zero() {
        let config = Config::merge(&cli(&["--concurrency", "0"]), FileConfig::default()).unwrap();
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let result = Config::merge(&cli(&["--timeout", "0"]), FileConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_blank_api_key_disables_live_checks() {
        let config = Config::merge(&cli(&["--api-key", "  "]), FileConfig::default()).unwrap();
        assert!(!config.live_checks_enabled());

        let config = Config::merge(&cli(&["--api-key", "secret"]), FileConfig::default()).unwrap();
        assert!(config.live_checks_enabled());
        assert!(config.snapshot().api_key_configured);
    }

    #[test]
    fn test_missing_config_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert!(file.url.is_none());
    }

    #[test]
    fn test_malformed_config_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".docverify.toml");
        fs::write(&path, "concurrency = \"many\"").unwrap();
        assert!(matches!(FileConfig::load(&path), Err(Error::Toml(_))));
    }
}
