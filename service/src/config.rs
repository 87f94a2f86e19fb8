//! Endpoint configuration shared by the binaries.
//!
//! Resolution order: explicit `--endpoint` flags, then the
//! `POI_OVERPASS_ENDPOINTS` environment variable (comma-separated), then
//! the built-in public mirror list.

use url::Url;

use crate::domain::fetcher::default_endpoints;

/// Environment variable naming the ranked mirror list.
pub const ENDPOINTS_ENV_VAR: &str = "POI_OVERPASS_ENDPOINTS";

/// Parse one endpoint flag value.
///
/// # Errors
///
/// Returns a human-readable message for clap when the URL is invalid.
pub fn parse_endpoint(raw: &str) -> Result<Url, String> {
    Url::parse(raw.trim()).map_err(|error| format!("invalid endpoint URL '{raw}': {error}"))
}

/// Parse a comma-separated endpoint list, dropping invalid entries.
pub fn parse_endpoint_list(raw: &str) -> Vec<Url> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match Url::parse(entry) {
            Ok(url) => Some(url),
            Err(error) => {
                tracing::warn!(entry, error = %error, "ignoring invalid endpoint entry");
                None
            }
        })
        .collect()
}

/// Resolve the effective endpoint list from flags and environment.
pub fn resolve_endpoints(flags: Vec<Url>, env_value: Option<&str>) -> Vec<Url> {
    if !flags.is_empty() {
        return flags;
    }
    if let Some(raw) = env_value {
        let parsed = parse_endpoint_list(raw);
        if !parsed.is_empty() {
            return parsed;
        }
    }
    default_endpoints()
}
