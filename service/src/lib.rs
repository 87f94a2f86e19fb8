//! Nearby-POI tool service library.
//!
//! Fetches points of interest around a coordinate from the Overpass API
//! (ranked public mirrors, retry with jittered exponential backoff, failover)
//! and exposes the result as a `get_nearby_pois` tool over a JSON-RPC 2.0
//! stdio protocol. A subprocess client bridge drives one tool call per
//! service lifetime.
//!
//! Public surface:
//! - [`domain`] — data model, query builder, normaliser, resilient fetcher,
//!   nearby service, and ports.
//! - [`outbound`] — the reqwest Overpass transport adapter.
//! - [`mcp`] — protocol types, the stdio server, and the client bridge.
//! - [`config`] — endpoint resolution shared by the binaries.

pub mod config;
pub mod domain;
pub mod mcp;
pub mod outbound;
