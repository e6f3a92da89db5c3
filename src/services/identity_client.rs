//! Remote fingerprint-identity lookup client
//!
//! HTTP GET with `client`, `fingerprint`, `duration` and `meta` query
//! parameters against an AcoustID-compatible endpoint; the JSON
//! response is an `ok`/`error` envelope with a ranked result list.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.acoustid.org/v2/lookup";
const USER_AGENT: &str = concat!("tunesmith/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
const LOOKUP_META: &str = "recordings";

/// Identity lookup errors. All of them map to the `lookup_failed`
/// outcome; they are distinguished from an empty result list, which is
/// a successful call that matched nothing.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Transport failure (connection, timeout, non-2xx status)
    #[error("Network error: {0}")]
    Network(String),

    /// Response body did not parse as the expected envelope
    #[error("Parse error: {0}")]
    Parse(String),

    /// The service returned an error envelope
    #[error("Service error: {0}")]
    Service(String),
}

/// Lookup response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<LookupResult>,
    pub error: Option<LookupErrorBody>,
}

/// One ranked candidate. The list arrives ranked by the service; the
/// first element is authoritative and `score` is not used to re-rank.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupResult {
    pub id: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookupErrorBody {
    pub message: String,
}

/// Successful lookup outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// The first (highest-ranked) candidate
    Matched { id: String, score: f64 },
    /// The call succeeded but matched nothing
    NoResults,
}

/// Identity lookup seam; the production client speaks HTTP, tests
/// substitute a fake.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn lookup(
        &self,
        fingerprint: &str,
        duration_secs: u64,
    ) -> Result<LookupOutcome, LookupError>;
}

/// AcoustID-compatible HTTP client.
pub struct AcoustidClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AcoustidClient {
    pub fn new(api_key: String) -> Result<Self, LookupError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LookupError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
        })
    }

    /// Point the client at a different endpoint (tests, self-hosted
    /// instances).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Map a parsed envelope to an outcome.
fn envelope_to_outcome(response: LookupResponse) -> Result<LookupOutcome, LookupError> {
    if response.status != "ok" {
        let message = response
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| format!("status {}", response.status));
        return Err(LookupError::Service(message));
    }

    match response.results.first() {
        None => Ok(LookupOutcome::NoResults),
        Some(first) => Ok(LookupOutcome::Matched {
            id: first.id.clone(),
            score: first.score,
        }),
    }
}

#[async_trait]
impl IdentityLookup for AcoustidClient {
    async fn lookup(
        &self,
        fingerprint: &str,
        duration_secs: u64,
    ) -> Result<LookupOutcome, LookupError> {
        let duration = duration_secs.to_string();
        let params: [(&str, &str); 4] = [
            ("client", self.api_key.as_str()),
            ("fingerprint", fingerprint),
            ("duration", duration.as_str()),
            ("meta", LOOKUP_META),
        ];

        debug!(duration_secs, "Querying identity service");

        let response = self
            .http
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| LookupError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Network(format!(
                "HTTP {}: {}",
                status,
                body.trim()
            )));
        }

        let parsed: LookupResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(e.to_string()))?;

        let outcome = envelope_to_outcome(parsed)?;
        if let LookupOutcome::Matched { id, score } = &outcome {
            debug!(identity = %id, score, "Identity lookup matched");
        }
        Ok(outcome)
    }
}
