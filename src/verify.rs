use crate::config::Config;
use crate::error::Result;
use crate::extract::EndpointKey;
use crate::matcher::PathMatcher;
use crate::spec::ApiSpecification;
use crate::suggest::{suggest, SimilaritySuggestion};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

/// Why an endpoint failed verification. `message` keeps the human text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    NotInSpec { message: String },
    Deprecated { message: String },
    LiveError { code: u16, message: String },
    VerificationError { message: String },
}

impl Issue {
    pub fn not_in_spec() -> Self {
        Issue::NotInSpec {
            message: "Endpoint not found in API specification".to_string(),
        }
    }

    pub fn deprecated(replacement: Option<&str>) -> Self {
        let message = match replacement {
            Some(path) => format!("Endpoint is deprecated (replaced by {path})"),
            None => "Endpoint is deprecated".to_string(),
        };
        Issue::Deprecated { message }
    }

    pub fn live_error(code: u16) -> Self {
        Issue::LiveError {
            code,
            message: format!("Live test failed with status {code}"),
        }
    }

    pub fn verification_error(detail: impl fmt::Display) -> Self {
        Issue::VerificationError {
            message: format!("Verification error: {detail}"),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Issue::NotInSpec { message }
            | Issue::Deprecated { message }
            | Issue::LiveError { message, .. }
            | Issue::VerificationError { message } => message,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub method: String,
    pub path: String,
    pub spec_matches: bool,
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    pub live_tested: bool,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub issues: Vec<Issue>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<SimilaritySuggestion>,
}

impl VerificationResult {
    fn new(key: &EndpointKey) -> Self {
        Self {
            method: key.method.clone(),
            path: key.path.clone(),
            spec_matches: false,
            deprecated: false,
            matched_template: None,
            replacement: None,
            live_tested: false,
            status_code: None,
            response_time_ms: None,
            issues: Vec::new(),
            valid: false,
            suggestion: None,
        }
    }

    /// Path a fix should substitute: the deprecation target first, then the
    /// similarity suggestion.
    pub fn fix_target(&self) -> Option<&str> {
        self.replacement
            .as_deref()
            .or_else(|| self.suggestion.as_ref().map(|s| s.to_path.as_str()))
            .filter(|target| *target != self.path)
    }
}

struct LiveProbe {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LiveProbe {
    async fn probe(&self, key: &EndpointKey, result: &mut VerificationResult) {
        let method = match reqwest::Method::from_bytes(key.method.as_bytes()) {
            Ok(m) => m,
            Err(e) => {
                result.issues.push(Issue::verification_error(e));
                return;
            }
        };
        let url = format!("{}{}", self.base_url, key.path);

        let start = Instant::now();
        let response = self
            .client
            .request(method, &url)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .send()
            .await;
        result.live_tested = true;

        match response {
            Ok(response) => {
                let status = response.status();
                result.status_code = Some(status.as_u16());
                result.response_time_ms = Some(start.elapsed().as_millis() as u64);

                // 401 only means the credential was withheld or scoped out.
                if status == reqwest::StatusCode::UNAUTHORIZED {
                    tracing::debug!(endpoint = %key, "live probe unauthorized, accepted");
                } else if status.is_client_error() || status.is_server_error() {
                    result.issues.push(Issue::live_error(status.as_u16()));
                }
            }
            Err(e) => {
                tracing::warn!(endpoint = %key, error = %e, "live probe failed");
                result.issues.push(Issue::verification_error(e));
            }
        }
    }
}

/// Checks endpoints against a specification and, when a credential is
/// configured, a live service.
pub struct Verifier<'a> {
    matcher: PathMatcher<'a>,
    live: Option<LiveProbe>,
    similarity_threshold: f64,
    concurrency: usize,
}

impl<'a> Verifier<'a> {
    pub fn new(spec: &'a ApiSpecification, config: &Config) -> Result<Self> {
        let live = match &config.api_key {
            Some(api_key) => Some(LiveProbe {
                client: reqwest::Client::builder().timeout(config.timeout).build()?,
                base_url: config.base_url.clone(),
                api_key: api_key.clone(),
            }),
            None => None,
        };

        Ok(Self {
            matcher: PathMatcher::new(spec)?,
            live,
            similarity_threshold: config.similarity_threshold,
            concurrency: config.concurrency.max(1),
        })
    }

    pub fn spec(&self) -> &'a ApiSpecification {
        self.matcher.spec()
    }

    pub async fn verify(&self, key: &EndpointKey) -> VerificationResult {
        let mut result = VerificationResult::new(key);

        match self.matcher.resolve(&key.method, &key.path) {
            Some(resolved) => {
                result.spec_matches = true;
                result.matched_template = Some(resolved.template.to_string());
                result.deprecated = resolved.operation.deprecated;
                if resolved.operation.deprecated {
                    result.replacement = resolved.operation.replaced_by.clone();
                    result
                        .issues
                        .push(Issue::deprecated(resolved.operation.replaced_by.as_deref()));
                }
            }
            None => {
                result.issues.push(Issue::not_in_spec());
                result.suggestion =
                    suggest(self.spec(), &key.method, &key.path, self.similarity_threshold);
            }
        }

        // A path still holding `{placeholders}` is not a concrete URL.
        if let Some(live) = &self.live {
            if !key.path.contains('{') {
                live.probe(key, &mut result).await;
            }
        }

        result.valid = result.spec_matches && result.issues.is_empty();
        tracing::debug!(endpoint = %key, valid = result.valid, issues = result.issues.len(), "verified");
        result
    }

    /// Unique keys are verified in fixed-size batches: members of a batch
    /// run concurrently, batches run one after another.
    pub async fn verify_all<I>(&self, keys: I) -> BTreeMap<EndpointKey, VerificationResult>
    where
        I: IntoIterator<Item = EndpointKey>,
    {
        let unique: Vec<EndpointKey> = keys.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let mut results = BTreeMap::new();

        for (n, batch) in unique.chunks(self.concurrency).enumerate() {
            tracing::debug!(batch = n, size = batch.len(), "verifying batch");
            let verified = join_all(batch.iter().map(|key| self.verify(key))).await;
            results.extend(batch.iter().cloned().zip(verified));
        }

        results
    }
}
