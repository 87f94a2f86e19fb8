//! Driven ports for fetching POIs from the Overpass API.
//!
//! The domain owns the request shape and the error contract so the fetch
//! orchestration stays adapter-agnostic: [`OverpassTransport`] performs one
//! attempt against one mirror, [`PoiSource`] covers a whole resilient fetch.

use async_trait::async_trait;
use url::Url;

use super::define_port_error;
use crate::domain::poi::{NearbyQuery, Poi, RawElement};

define_port_error! {
    /// Errors surfaced by one transport attempt against one mirror.
    pub enum OverpassSourceError {
        /// Network transport failed before receiving a response.
        Transport { message: String } =>
            "overpass transport failed: {message}",
        /// The HTTP request exceeded its timeout.
        Timeout { message: String } =>
            "overpass request timed out: {message}",
        /// The mirror rate-limited the request (status 429).
        RateLimited { message: String } =>
            "overpass rate limited the request: {message}",
        /// The mirror reported transient overload (status 502, 503, or 504).
        Overloaded { status: u16, message: String } =>
            "overpass mirror overloaded ({status}): {message}",
        /// The mirror rejected the query with a non-transient status.
        Rejected { status: u16, message: String } =>
            "overpass rejected the query ({status}): {message}",
        /// The response body was not a valid Overpass JSON document.
        Decode { message: String } =>
            "overpass response decode failed: {message}",
    }
}

impl OverpassSourceError {
    /// Return whether retrying this error on the same mirror may help.
    ///
    /// The retryable set is exactly: connection failures, timeouts, and the
    /// 429/502/503/504 statuses. Anything else aborts the mirror at once.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Timeout { .. }
                | Self::RateLimited { .. }
                | Self::Overloaded { .. }
        )
    }
}

define_port_error! {
    /// Terminal failures of a resilient fetch.
    pub enum FetchError {
        /// The fetcher was configured with an empty endpoint list.
        NoEndpoints =>
            "no overpass endpoints configured",
        /// Every endpoint and attempt was exhausted without a success.
        Unavailable { last: OverpassSourceError } =>
            "all overpass endpoints failed: {last}",
    }
}

/// Port for one query execution against one Overpass mirror.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OverpassTransport: Send + Sync {
    /// Post `query` to `endpoint` and decode the returned element list.
    async fn fetch_elements(
        &self,
        endpoint: &Url,
        query: &str,
    ) -> Result<Vec<RawElement>, OverpassSourceError>;
}

/// Port for a complete nearby-POI fetch.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PoiSource: Send + Sync {
    /// Fetch, normalise, and deduplicate POIs for one query.
    async fn fetch_pois(&self, query: &NearbyQuery) -> Result<Vec<Poi>, FetchError>;
}

/// Fixture implementation returning an empty POI set.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixturePoiSource;

#[async_trait]
impl PoiSource for FixturePoiSource {
    async fn fetch_pois(&self, _query: &NearbyQuery) -> Result<Vec<Poi>, FetchError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::transport(OverpassSourceError::transport("reset"), true)]
    #[case::timeout(OverpassSourceError::timeout("deadline"), true)]
    #[case::rate_limited(OverpassSourceError::rate_limited("slow down"), true)]
    #[case::overloaded(OverpassSourceError::overloaded(503_u16, "busy"), true)]
    #[case::rejected(OverpassSourceError::rejected(400_u16, "bad query"), false)]
    #[case::server_error(OverpassSourceError::rejected(500_u16, "boom"), false)]
    #[case::decode(OverpassSourceError::decode("not json"), false)]
    fn retryable_set_is_exact(#[case] error: OverpassSourceError, #[case] retryable: bool) {
        assert_eq!(error.is_retryable(), retryable, "{error}");
    }

    #[test]
    fn unavailable_reports_the_last_underlying_error() {
        let error = FetchError::unavailable(OverpassSourceError::overloaded(503_u16, "busy"));
        assert!(error.to_string().contains("overloaded (503)"));
    }
}
