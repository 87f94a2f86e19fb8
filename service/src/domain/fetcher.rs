//! Resilient multi-mirror Overpass fetcher.
//!
//! The fetcher owns the resilience policy: it walks a ranked mirror list,
//! retries transient failures on the same mirror with jittered exponential
//! backoff, fails over immediately on non-transient rejections, and only
//! reports failure once every endpoint and attempt is exhausted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::normalize::normalize_elements;
use super::poi::{NearbyQuery, Poi, RawElement};
use super::ports::{
    FetchError, OverpassSourceError, OverpassTransport, PoiSource, RetryJitter, Sleeper,
    TokioSleeper, UniformJitter,
};
use super::query::build_query;

/// Public Overpass interpreter mirrors tried in order by default.
pub const DEFAULT_OVERPASS_ENDPOINTS: [&str; 3] = [
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
    "https://overpass.openstreetmap.ru/api/interpreter",
];

/// Fetcher configuration.
///
/// Endpoints and retry parameters are explicit configuration rather than
/// module-level constants so tests and deployments can override them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherConfig {
    /// Mirror endpoints in priority order.
    pub endpoints: Vec<Url>,
    /// Attempts per endpoint before failing over (including the first call).
    pub max_attempts_per_endpoint: u32,
    /// Initial retry backoff; doubles on each subsequent attempt.
    pub base_backoff: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            max_attempts_per_endpoint: 3,
            base_backoff: Duration::from_secs(1),
        }
    }
}

/// Parse the built-in public mirror list.
pub fn default_endpoints() -> Vec<Url> {
    DEFAULT_OVERPASS_ENDPOINTS
        .iter()
        .filter_map(|raw| Url::parse(raw).ok())
        .collect()
}

/// Runtime helpers used by the retry policy.
pub struct FetcherRuntime {
    /// Async sleep implementation.
    pub sleeper: Arc<dyn Sleeper>,
    /// Jitter strategy for retry delays.
    pub jitter: Arc<dyn RetryJitter>,
}

impl Default for FetcherRuntime {
    fn default() -> Self {
        Self {
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(UniformJitter),
        }
    }
}

/// Resilient fetcher over a ranked list of Overpass mirrors.
pub struct OverpassFetcher {
    transport: Arc<dyn OverpassTransport>,
    config: FetcherConfig,
    sleeper: Arc<dyn Sleeper>,
    jitter: Arc<dyn RetryJitter>,
}

impl OverpassFetcher {
    /// Build a fetcher using default runtime dependencies.
    pub fn new(transport: Arc<dyn OverpassTransport>, config: FetcherConfig) -> Self {
        Self::with_runtime(transport, config, FetcherRuntime::default())
    }

    /// Build a fetcher with injected runtime abstractions.
    pub fn with_runtime(
        transport: Arc<dyn OverpassTransport>,
        config: FetcherConfig,
        runtime: FetcherRuntime,
    ) -> Self {
        Self {
            transport,
            config,
            sleeper: runtime.sleeper,
            jitter: runtime.jitter,
        }
    }

    /// Execute one query text against the mirror list.
    ///
    /// Walks endpoints in priority order. A retryable failure sleeps
    /// `base_backoff * 2^(attempt-1)` plus jitter and retries the same
    /// endpoint; a non-retryable failure abandons the endpoint at once.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Unavailable`] carrying the last observed error
    /// once every endpoint and attempt is exhausted, or
    /// [`FetchError::NoEndpoints`] for an empty endpoint list.
    pub async fn fetch_raw(&self, query: &str) -> Result<Vec<RawElement>, FetchError> {
        let mut last: Option<OverpassSourceError> = None;
        let max_attempts = self.config.max_attempts_per_endpoint.max(1);

        for endpoint in &self.config.endpoints {
            for attempt in 1..=max_attempts {
                match self.transport.fetch_elements(endpoint, query).await {
                    Ok(elements) => return Ok(elements),
                    Err(error) if error.is_retryable() => {
                        tracing::warn!(
                            endpoint = %endpoint,
                            attempt,
                            error = %error,
                            "transient overpass failure, backing off"
                        );
                        let delay = self.jitter.jittered(self.backoff_base(attempt), attempt);
                        last = Some(error);
                        self.sleeper.sleep(delay).await;
                    }
                    Err(error) => {
                        tracing::warn!(
                            endpoint = %endpoint,
                            attempt,
                            error = %error,
                            "overpass endpoint rejected the query, failing over"
                        );
                        last = Some(error);
                        break;
                    }
                }
            }
        }

        match last {
            Some(last) => Err(FetchError::unavailable(last)),
            None => Err(FetchError::no_endpoints()),
        }
    }

    /// Fetch, normalise, and deduplicate POIs for one query.
    ///
    /// `split_by_key` issues one upstream query per key in priority order
    /// (smaller payloads, more round trips); otherwise a single combined
    /// query is issued. Elements from every successful response accumulate
    /// into one list before normalisation, so identities recurring across
    /// split queries collapse to one POI.
    ///
    /// # Errors
    ///
    /// Fails with [`FetchError::Unavailable`] if any sub-query exhausts the
    /// endpoint list; no partial POI list is returned.
    pub async fn fetch_pois(&self, query: &NearbyQuery) -> Result<Vec<Poi>, FetchError> {
        let keys = query.effective_keys();
        let mut elements: Vec<RawElement> = Vec::new();

        if query.split_by_key {
            for key in &keys {
                let text = build_query(query, std::slice::from_ref(key));
                elements.extend(self.fetch_raw(&text).await?);
            }
        } else {
            let text = build_query(query, &keys);
            elements.extend(self.fetch_raw(&text).await?);
        }

        let pois = normalize_elements(elements, &keys);
        tracing::debug!(count = pois.len(), "normalised overpass elements");
        Ok(pois)
    }

    fn backoff_base(&self, attempt: u32) -> Duration {
        let exponent = 2_u64.saturating_pow(attempt.saturating_sub(1));
        let base_ms = u64::try_from(self.config.base_backoff.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(exponent))
    }
}

#[async_trait]
impl PoiSource for OverpassFetcher {
    async fn fetch_pois(&self, query: &NearbyQuery) -> Result<Vec<Poi>, FetchError> {
        Self::fetch_pois(self, query).await
    }
}
