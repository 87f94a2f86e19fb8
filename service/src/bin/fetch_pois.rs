//! One-shot nearby-POI fetch printing a compact text listing.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::env;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::runtime::Builder;
use url::Url;

use poi_service::config::{ENDPOINTS_ENV_VAR, parse_endpoint, resolve_endpoints};
use poi_service::domain::fetcher::{FetcherConfig, OverpassFetcher};
use poi_service::domain::nearby::render_text;
use poi_service::domain::poi::{GeoPoint, NearbyQuery};
use poi_service::outbound::overpass::{OverpassHttpIdentity, OverpassHttpTransport};

/// `fetch-pois` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fetch-pois",
    about = "Fetch nearby OpenStreetMap POIs via Overpass and print a compact listing",
    version
)]
struct CliArgs {
    /// Centre latitude in WGS84 degrees.
    #[arg(long, value_name = "degrees", allow_hyphen_values = true)]
    lat: f64,
    /// Centre longitude in WGS84 degrees.
    #[arg(long, value_name = "degrees", allow_hyphen_values = true)]
    lon: f64,
    /// Search radius in metres.
    #[arg(long, default_value_t = 500, value_name = "metres")]
    radius_m: u32,
    /// Priority-ordered tag key; repeat to widen the search.
    #[arg(long = "key", value_name = "tag-key")]
    keys: Vec<String>,
    /// Case-insensitive name filter.
    #[arg(long, value_name = "regex")]
    name: Option<String>,
    /// Element type to query; repeat for several, omit for all three.
    #[arg(long = "element-type", value_name = "type")]
    element_types: Vec<String>,
    /// Maximum number of elements per upstream query.
    #[arg(long, default_value_t = 120, value_name = "count")]
    limit: u32,
    /// Timeout directive embedded in the query text, in seconds.
    #[arg(long, default_value_t = 25, value_name = "seconds")]
    overpass_timeout_s: u32,
    /// Issue one combined query instead of one query per key.
    #[arg(long)]
    combined: bool,
    /// Overpass interpreter endpoint; repeat to rank mirrors.
    #[arg(long = "endpoint", value_name = "url", value_parser = parse_endpoint)]
    endpoints: Vec<Url>,
    /// Per-request HTTP timeout in seconds.
    #[arg(long, default_value_t = 60, value_name = "seconds")]
    http_timeout_s: u64,
    /// Maximum number of listing lines before truncation.
    #[arg(long, default_value_t = 80, value_name = "count")]
    max_items: usize,
}

fn main() -> io::Result<()> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("tracing init failed: {e}");
    }

    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let endpoints = resolve_endpoints(
        args.endpoints,
        env::var(ENDPOINTS_ENV_VAR).ok().as_deref(),
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
            ..FetcherConfig::default()
        },
    );

    let query = NearbyQuery {
        center: GeoPoint { lat: args.lat, lon: args.lon },
        radius_m: args.radius_m,
        keys: args.keys,
        name_filter: args.name,
        element_types: args.element_types,
        limit: args.limit,
        server_timeout_s: args.overpass_timeout_s,
        split_by_key: !args.combined,
    };

    let pois = fetcher
        .fetch_pois(&query)
        .await
        .map_err(|error| io::Error::other(format!("fetch failed: {error}")))?;

    if pois.is_empty() {
        println!("no POIs found");
    } else {
        println!("{}", render_text(&pois, args.max_items));
    }
    Ok(())
}
