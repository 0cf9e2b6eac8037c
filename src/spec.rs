//! API specification model and the cache-first loader.
//!
//! Both OpenAPI documents (JSON or YAML) and the flattened
//! `{ paths: { template: { METHOD: { exists, deprecated } } } }` form are
//! accepted. Path templates keep their declaration order, which the path
//! matcher relies on for tie-breaking.

use crate::config::Config;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const HTTP_METHODS: [&str; 8] = [
    "GET", "PUT", "POST", "DELETE", "OPTIONS", "HEAD", "PATCH", "TRACE",
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub exists: bool,
    pub deprecated: bool,
    /// Path that supersedes this operation once deprecated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaced_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathItem {
    pub template: String,
    /// Uppercased method to operation, in declaration order.
    pub operations: Vec<(String, Operation)>,
}

impl PathItem {
    pub fn operation(&self, method: &str) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|(m, _)| m.eq_ignore_ascii_case(method))
            .map(|(_, op)| op)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiSpecification {
    version: String,
    paths: Vec<PathItem>,
    index: HashMap<String, usize>,
}

impl ApiSpecification {
    pub fn new(version: impl Into<String>, paths: Vec<PathItem>) -> Self {
        let mut index = HashMap::with_capacity(paths.len());
        for (i, item) in paths.iter().enumerate() {
            // First declaration wins, same as the matcher.
            index.entry(item.template.clone()).or_insert(i);
        }
        Self {
            version: version.into(),
            paths,
            index,
        }
    }

    /// Parse JSON first, falling back to YAML.
    pub fn parse(text: &str) -> Result<Self> {
        let value = match serde_json::from_str::<Value>(text) {
            Ok(value) => value,
            Err(json_err) => {
                let yaml: serde_yaml::Value = serde_yaml::from_str(text).map_err(|yaml_err| {
                    Error::SpecParse(format!("not JSON ({json_err}) and not YAML ({yaml_err})"))
                })?;
                yaml_to_json(yaml)
            }
        };
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let paths = value
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::SpecParse("missing `paths` object".into()))?;

        // YAML reads `version: 1.0` as a number.
        let version = match value.pointer("/info/version").or_else(|| value.get("version")) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "unknown".to_string(),
        };

        let items = paths
            .iter()
            .filter_map(|(template, item)| {
                let item = item.as_object()?;
                let operations = parse_operations(item);
                if operations.is_empty() {
                    return None;
                }
                Some(PathItem {
                    template: template.clone(),
                    operations,
                })
            })
            .collect();

        Ok(Self::new(version, items))
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn paths(&self) -> &[PathItem] {
        &self.paths
    }

    pub fn exact(&self, template: &str) -> Option<&PathItem> {
        self.index.get(template).map(|&i| &self.paths[i])
    }

    /// Every `(method, template, operation)` in declaration order.
    pub fn operations(&self) -> impl Iterator<Item = (&str, &str, &Operation)> {
        self.paths.iter().flat_map(|item| {
            item.operations
                .iter()
                .map(move |(method, op)| (method.as_str(), item.template.as_str(), op))
        })
    }

    pub fn operation_count(&self) -> usize {
        self.paths.iter().map(|p| p.operations.len()).sum()
    }
}

fn parse_operations(item: &Map<String, Value>) -> Vec<(String, Operation)> {
    item.iter()
        .filter_map(|(key, op)| {
            let method = key.to_ascii_uppercase();
            if !HTTP_METHODS.contains(&method.as_str()) {
                return None;
            }
            let exists = op.get("exists").and_then(Value::as_bool).unwrap_or(true);
            if !exists {
                return None;
            }
            let deprecated = op.get("deprecated").and_then(Value::as_bool).unwrap_or(false);
            let replaced_by = op
                .get("x-replaced-by")
                .or_else(|| op.get("replacedBy"))
                .and_then(Value::as_str)
                .map(str::to_string);
            Some((
                method,
                Operation {
                    exists,
                    deprecated,
                    replaced_by,
                },
            ))
        })
        .collect()
}

/// YAML mappings may use non-string keys (`200:` under `responses`).
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64().map(Value::from).unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => Value::Array(seq.into_iter().map(yaml_to_json).collect()),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (k, v) in mapping {
                let key = match k {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => serde_yaml::to_string(&other)
                        .unwrap_or_default()
                        .trim()
                        .to_string(),
                };
                map.insert(key, yaml_to_json(v));
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

/// Local cache first, remote fetch second. Loaded once per run.
pub struct SpecLoader {
    cache_path: PathBuf,
    remote_url: String,
    timeout: Duration,
}

impl SpecLoader {
    pub fn new(cache_path: impl Into<PathBuf>, remote_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            cache_path: cache_path.into(),
            remote_url: remote_url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.spec_cache_path, &config.spec_url, config.timeout)
    }

    pub async fn load(&self) -> Result<ApiSpecification> {
        let cache_err = match read_cached(&self.cache_path).await {
            Ok(spec) => {
                tracing::info!(path = %self.cache_path.display(), "loaded API specification from cache");
                return Ok(spec);
            }
            Err(e) => e,
        };
        tracing::debug!(error = %cache_err, "specification cache unusable, fetching remote");

        match self.fetch_remote().await {
            Ok(spec) => Ok(spec),
            Err(remote_err) => Err(Error::SpecUnavailable {
                cache: format!("{}: {cache_err}", self.cache_path.display()),
                remote: format!("{}: {remote_err}", self.remote_url),
            }),
        }
    }

    async fn fetch_remote(&self) -> Result<ApiSpecification> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let body = client
            .get(&self.remote_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let spec = ApiSpecification::parse(&body)?;

        if let Err(e) = persist(&self.cache_path, &body).await {
            tracing::warn!(path = %self.cache_path.display(), error = %e, "could not cache API specification");
        }
        tracing::info!(url = %self.remote_url, "fetched API specification");
        Ok(spec)
    }
}

async fn read_cached(path: &Path) -> Result<ApiSpecification> {
    let content = tokio::fs::read_to_string(path).await?;
    ApiSpecification::parse(&content)
}

async fn persist(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, body).await?;
    Ok(())
}
