//! Domain ports: traits and error contracts implemented by adapters.
//!
//! Public surface:
//! - [`OverpassTransport`] — one query execution against one mirror.
//! - [`PoiSource`] — a complete resilient nearby-POI fetch.
//! - [`Sleeper`] / [`RetryJitter`] — injected retry runtime.
//! - [`OverpassSourceError`] / [`FetchError`] — the fetch error taxonomy.

mod macros;
mod overpass;
mod runtime;

pub(crate) use macros::define_port_error;
pub use overpass::{
    FetchError, FixturePoiSource, OverpassSourceError, OverpassTransport, PoiSource,
};
#[cfg(test)]
pub use overpass::{MockOverpassTransport, MockPoiSource};
pub use runtime::{RetryJitter, Sleeper, TokioSleeper, UniformJitter};
