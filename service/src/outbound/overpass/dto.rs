//! DTO for decoding Overpass JSON responses.

use serde::Deserialize;

use crate::domain::poi::RawElement;

/// Top-level Overpass response envelope.
#[derive(Debug, Deserialize)]
pub(super) struct OverpassResponseBody {
    #[serde(default)]
    pub(super) elements: Vec<RawElement>,
}
