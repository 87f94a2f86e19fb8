//! Reqwest-backed Overpass transport adapter.
//!
//! This adapter owns transport details only: request serialisation, timeout
//! and HTTP error mapping, and JSON decoding into raw elements. Resilience
//! policy (retry, backoff, failover) lives in the domain fetcher.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use super::dto::OverpassResponseBody;
use crate::domain::poi::RawElement;
use crate::domain::ports::{OverpassSourceError, OverpassTransport};

const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_USER_AGENT: &str = "poi-service-overpass/0.1";

/// Outbound identity and timeout settings for Overpass requests.
pub struct OverpassHttpIdentity {
    /// HTTP user-agent sent to the mirrors.
    pub user_agent: String,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
}

impl Default for OverpassHttpIdentity {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS),
        }
    }
}

/// Overpass transport performing one HTTP POST per attempt.
pub struct OverpassHttpTransport {
    client: Client,
    user_agent: String,
}

impl OverpassHttpTransport {
    /// Build a transport with the default identity.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_identity(OverpassHttpIdentity::default())
    }

    /// Build a transport with explicit identity and timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn with_identity(identity: OverpassHttpIdentity) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(identity.http_timeout).build()?;
        Ok(Self {
            client,
            user_agent: identity.user_agent,
        })
    }
}

#[async_trait]
impl OverpassTransport for OverpassHttpTransport {
    async fn fetch_elements(
        &self,
        endpoint: &Url,
        query: &str,
    ) -> Result<Vec<RawElement>, OverpassSourceError> {
        let response = self
            .client
            .post(endpoint.clone())
            .header(reqwest::header::USER_AGENT, self.user_agent.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("data", query)])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }

        parse_elements(body.as_ref())
    }
}

fn parse_elements(body: &[u8]) -> Result<Vec<RawElement>, OverpassSourceError> {
    let decoded: OverpassResponseBody = serde_json::from_slice(body).map_err(|error| {
        OverpassSourceError::decode(format!("invalid overpass JSON payload: {error}"))
    })?;
    Ok(decoded.elements)
}

fn map_transport_error(error: reqwest::Error) -> OverpassSourceError {
    if error.is_timeout() {
        OverpassSourceError::timeout(error.to_string())
    } else {
        OverpassSourceError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> OverpassSourceError {
    let message = body_preview(body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => OverpassSourceError::rate_limited(message),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            OverpassSourceError::overloaded(status.as_u16(), message)
        }
        _ => OverpassSourceError::rejected(status.as_u16(), message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for non-network mapping helpers.

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::rate_limited(StatusCode::TOO_MANY_REQUESTS, true)]
    #[case::bad_gateway(StatusCode::BAD_GATEWAY, true)]
    #[case::service_unavailable(StatusCode::SERVICE_UNAVAILABLE, true)]
    #[case::gateway_timeout(StatusCode::GATEWAY_TIMEOUT, true)]
    #[case::bad_request(StatusCode::BAD_REQUEST, false)]
    #[case::request_timeout(StatusCode::REQUEST_TIMEOUT, false)]
    #[case::server_error(StatusCode::INTERNAL_SERVER_ERROR, false)]
    fn status_mapping_matches_the_retryable_set(
        #[case] status: StatusCode,
        #[case] retryable: bool,
    ) {
        let error = map_status_error(status, b"{\"remark\":\"backend unavailable\"}");
        assert_eq!(error.is_retryable(), retryable, "{error}");
    }

    #[test]
    fn status_errors_carry_a_body_preview() {
        let error = map_status_error(StatusCode::BAD_REQUEST, b"parse error near line 1");
        assert!(error.to_string().contains("parse error near line 1"));
    }

    #[test]
    fn long_bodies_are_truncated_in_previews() {
        let body = "x".repeat(500);
        let preview = body_preview(body.as_bytes());
        assert!(preview.ends_with("..."));
        assert!(preview.chars().count() <= 163);
    }

    #[test]
    fn parses_elements_from_a_valid_payload() {
        let body = r#"{
            "elements": [
                { "type": "node", "id": 101, "lat": 55.91, "lon": -3.21,
                  "tags": { "amenity": "cafe" } },
                { "type": "way", "id": 102,
                  "center": { "lat": 55.92, "lon": -3.22 },
                  "tags": { "name": "The Meadows" } }
            ]
        }"#;

        let elements = parse_elements(body.as_bytes()).expect("payload should decode");
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].element_type, "node");
        assert_eq!(elements[1].coordinates(), Some((55.92, -3.22)));
    }

    #[test]
    fn invalid_json_maps_to_a_decode_error() {
        let error = parse_elements(b"<html>busy</html>").expect_err("decode must fail");
        assert!(matches!(error, OverpassSourceError::Decode { .. }));
        assert!(!error.is_retryable());
    }
}
