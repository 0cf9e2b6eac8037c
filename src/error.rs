use std::path::PathBuf;

/// Errors that abort a verification run.
///
/// Per-file and per-endpoint problems never surface here; they are recorded
/// in the report instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("API specification unavailable (cache: {cache}; remote: {remote})")]
    SpecUnavailable { cache: String, remote: String },

    #[error("invalid API specification: {0}")]
    SpecParse(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to write report to {}", path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file watcher failed: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Glob(#[from] globset::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
