//! Fact Fetch Client - Pulls random cat facts from the upstream provider
//!
//! Every upstream failure (transport error, timeout, non-success status,
//! malformed or blank payload) is logged and resolves to "no fact". The only
//! error surfaced to callers is an out-of-range batch size.

use crate::catalog::Fact;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Smallest batch `fetch_many` accepts
pub const MIN_BATCH: usize = 1;

/// Upstream provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Endpoint returning `{"fact": string, "length": int}`
    #[serde(default = "default_url")]
    pub url: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Pause between batch dispatches in milliseconds
    #[serde(default = "default_dispatch_delay")]
    pub dispatch_delay_ms: u64,

    /// Largest batch `fetch_many` accepts
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

fn default_url() -> String {
    "https://catfact.ninja/fact".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "CatFactsWebApp/1.0".to_string()
}

fn default_dispatch_delay() -> u64 {
    100 // upstream has informal rate limits
}

fn default_max_batch() -> usize {
    20
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            dispatch_delay_ms: default_dispatch_delay(),
            max_batch: default_max_batch(),
        }
    }
}

/// Fetch client errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Requested {count} facts, allowed range is {min}-{max}")]
    CountOutOfRange { count: usize, min: usize, max: usize },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Reject batch sizes outside `MIN_BATCH..=max`
pub fn check_batch_size(count: usize, max: usize) -> Result<(), FetchError> {
    if count < MIN_BATCH || count > max {
        return Err(FetchError::CountOutOfRange {
            count,
            min: MIN_BATCH,
            max,
        });
    }
    Ok(())
}

/// Source of freshly fetched, unsaved facts
#[async_trait]
pub trait FactSource: Send + Sync {
    /// One fact, or `None` on any upstream failure
    async fn fetch_one(&self) -> Option<Fact>;

    /// Up to `count` facts; failed fetches are dropped
    async fn fetch_many(&self, count: usize) -> Result<Vec<Fact>, FetchError>;

    /// Whether the upstream answers with a success status
    async fn probe_availability(&self) -> bool;
}

/// Upstream payload; field names match case-insensitively
#[derive(Debug, Deserialize)]
struct FactPayload {
    #[serde(default, alias = "Fact", alias = "FACT")]
    fact: Option<String>,
    #[serde(default, alias = "Length", alias = "LENGTH")]
    length: i64,
}

/// Parse a provider body; `Ok(None)` when the fact text is blank
pub fn parse_fact_payload(body: &str) -> Result<Option<Fact>, serde_json::Error> {
    let payload: FactPayload = serde_json::from_str(body)?;
    Ok(payload
        .fact
        .filter(|text| !text.trim().is_empty())
        .map(|text| Fact::fetched(&text, payload.length)))
}

// ============================================================================
// HTTP client
// ============================================================================

/// reqwest-backed client for the cat fact provider
#[derive(Clone)]
pub struct CatFactClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl CatFactClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl FactSource for CatFactClient {
    async fn fetch_one(&self) -> Option<Fact> {
        debug!("Fetching cat fact from {}", self.config.url);

        let response = match self.http.get(&self.config.url).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                error!("Timed out fetching cat fact: {}", e);
                return None;
            }
            Err(e) => {
                error!("HTTP error fetching cat fact: {}", e);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("Cat fact API returned HTTP {}", status);
            return None;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to read cat fact response: {}", e);
                return None;
            }
        };

        match parse_fact_payload(&body) {
            Ok(Some(fact)) => {
                info!("Fetched cat fact ({} chars)", fact.length);
                Some(fact)
            }
            Ok(None) => {
                warn!("Cat fact API returned an empty fact");
                None
            }
            Err(e) => {
                error!("Invalid cat fact payload: {}", e);
                None
            }
        }
    }

    async fn fetch_many(&self, count: usize) -> Result<Vec<Fact>, FetchError> {
        check_batch_size(count, self.config.max_batch)?;

        let delay = Duration::from_millis(self.config.dispatch_delay_ms);
        let mut pending = Vec::with_capacity(count);
        for i in 0..count {
            let client = self.clone();
            pending.push(tokio::spawn(async move { client.fetch_one().await }));

            if i + 1 < count && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let mut facts = Vec::with_capacity(count);
        for task in pending {
            match task.await {
                Ok(Some(fact)) => facts.push(fact),
                Ok(None) => {}
                Err(e) => error!("Cat fact fetch task failed: {}", e),
            }
        }

        info!("Fetched {} of {} cat facts", facts.len(), count);
        Ok(facts)
    }

    async fn probe_availability(&self) -> bool {
        match self.http.get(&self.config.url).send().await {
            Ok(response) => {
                let available = response.status().is_success();
                info!(
                    "Cat fact API is {}",
                    if available { "available" } else { "unavailable" }
                );
                available
            }
            Err(e) => {
                error!("Cat fact API availability check failed: {}", e);
                false
            }
        }
    }
}

// ============================================================================
// Scripted source (testing)
// ============================================================================

/// Fact source replaying a fixed script of upstream outcomes
///
/// Each `fetch_one` consumes one entry: `Some(text)` yields a fetched fact,
/// `None` a failed fetch. An exhausted script behaves like a failing upstream.
pub struct ScriptedFactSource {
    script: Mutex<VecDeque<Option<String>>>,
    available: bool,
    max_batch: usize,
    calls: AtomicUsize,
}

impl ScriptedFactSource {
    pub fn new<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(script.into_iter().map(|s| s.map(Into::into)).collect()),
            available: true,
            max_batch: default_max_batch(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Source whose every fetch fails and whose probe reports unavailable
    pub fn offline() -> Self {
        let mut source = Self::new(Vec::<Option<String>>::new());
        source.available = false;
        source
    }

    /// Number of `fetch_one` calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FactSource for ScriptedFactSource {
    async fn fetch_one(&self) -> Option<Fact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = match self.script.lock() {
            Ok(mut script) => script.pop_front().flatten(),
            Err(_) => None,
        };
        next.filter(|text| !text.trim().is_empty()).map(|text| {
            let length = text.chars().count() as i64;
            Fact::fetched(&text, length)
        })
    }

    async fn fetch_many(&self, count: usize) -> Result<Vec<Fact>, FetchError> {
        check_batch_size(count, self.max_batch)?;

        let mut facts = Vec::with_capacity(count);
        for _ in 0..count {
            if let Some(fact) = self.fetch_one().await {
                facts.push(fact);
            }
        }
        Ok(facts)
    }

    async fn probe_availability(&self) -> bool {
        self.available
    }
}
