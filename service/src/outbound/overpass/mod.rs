//! Overpass outbound adapters.
//!
//! This module provides a thin HTTP implementation of the
//! `OverpassTransport` port.

mod dto;
mod http;

pub use http::{OverpassHttpIdentity, OverpassHttpTransport};
