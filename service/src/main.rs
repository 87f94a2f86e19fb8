//! Nearby-POI tool service entry-point: JSON-RPC 2.0 over stdio.
//!
//! Requests and responses travel on stdout; logs go to stderr so they never
//! interfere with the protocol. The mirror list and retry parameters are
//! explicit configuration: `--endpoint` flags first, then the
//! `POI_OVERPASS_ENDPOINTS` environment variable, then the public mirrors.

use std::env;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

use poi_service::config::{ENDPOINTS_ENV_VAR, parse_endpoint, resolve_endpoints};
use poi_service::domain::fetcher::{FetcherConfig, OverpassFetcher};
use poi_service::domain::nearby::NearbyPoiService;
use poi_service::mcp::server::PoiToolServer;
use poi_service::outbound::overpass::{OverpassHttpIdentity, OverpassHttpTransport};

/// `poi-service` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "poi-service",
    about = "Nearby-POI tool service speaking JSON-RPC 2.0 over stdio",
    version
)]
struct Args {
    /// Overpass interpreter endpoint; repeat to rank mirrors.
    #[arg(long = "endpoint", value_name = "url", value_parser = parse_endpoint)]
    endpoints: Vec<Url>,
    /// Attempts per endpoint before failing over.
    #[arg(long, default_value_t = 3, value_name = "count")]
    max_attempts_per_endpoint: u32,
    /// Initial retry backoff in milliseconds; doubles per attempt.
    #[arg(long, default_value_t = 1_000, value_name = "ms")]
    base_backoff_ms: u64,
    /// Per-request HTTP timeout in seconds.
    #[arg(long, default_value_t = 60, value_name = "seconds")]
    http_timeout_s: u64,
}

#[tokio::main]
async fn main() -> io::Result<()> {
    // stdout carries the protocol, so logging must stay on stderr.
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = Args::parse();
    let endpoints = resolve_endpoints(
        args.endpoints,
        env::var(ENDPOINTS_ENV_VAR).ok().as_deref(),
    );
    tracing::info!(
        mirrors = endpoints.len(),
        attempts = args.max_attempts_per_endpoint,
        "starting poi tool service"
    );

    let transport = OverpassHttpTransport::with_identity(OverpassHttpIdentity {
        http_timeout: Duration::from_secs(args.http_timeout_s),
        ..OverpassHttpIdentity::default()
    })
    .map_err(|error| io::Error::other(format!("create HTTP client: {error}")))?;

    let fetcher = OverpassFetcher::new(
        Arc::new(transport),
        FetcherConfig {
            endpoints,
            max_attempts_per_endpoint: args.max_attempts_per_endpoint,
            base_backoff: Duration::from_millis(args.base_backoff_ms),
        },
    );
    let service = NearbyPoiService::new(Arc::new(fetcher));

    PoiToolServer::new(service)
        .run()
        .await
        .map_err(|error| io::Error::other(format!("serve loop failed: {error}")))
}
