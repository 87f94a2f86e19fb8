//! Domain types, pure logic, and ports.
//!
//! The fetch pipeline is assembled from leaves upward: the query builder
//! ([`query`]) and normaliser ([`normalize`]) are pure, the resilient
//! fetcher ([`fetcher`]) drives the transport port, and the nearby service
//! ([`nearby`]) shapes results for the tool surface. Adapters implement the
//! traits in [`ports`].

pub mod fetcher;
pub mod nearby;
pub mod normalize;
pub mod poi;
pub mod ports;
pub mod query;

pub use fetcher::{
    DEFAULT_OVERPASS_ENDPOINTS, FetcherConfig, FetcherRuntime, OverpassFetcher, default_endpoints,
};
pub use nearby::{CategoryCount, NearbyPoiService, NearbyRequest, NearbySummary, PoiRecord};
pub use poi::{DEFAULT_POI_KEYS, GeoPoint, NearbyQuery, Poi, RawElement};
