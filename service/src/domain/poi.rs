//! Core POI data model shared by the fetch pipeline and the tool surface.
//!
//! Types here mirror the Overpass wire vocabulary: raw elements arrive as
//! [`RawElement`] records and are normalised into immutable [`Poi`] values
//! keyed by `(osm_type, osm_id)`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tag keys queried when the caller does not supply any.
pub const DEFAULT_POI_KEYS: [&str; 4] = ["amenity", "tourism", "shop", "leisure"];

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// Centre coordinates reported for extended geometries (ways, relations).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementCenter {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// One element as returned by an Overpass interpreter.
///
/// Point features carry `lat`/`lon` directly; extended geometries report a
/// `center` sub-record instead. Elements resolving to neither are dropped
/// during normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawElement {
    /// OSM element type (`node`, `way`, or `relation`).
    #[serde(rename = "type")]
    pub element_type: String,
    /// Raw OSM element identifier.
    pub id: i64,
    /// Direct latitude, present on point features.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    /// Direct longitude, present on point features.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    /// Centroid reported for extended geometries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<ElementCenter>,
    /// Raw OSM tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl RawElement {
    /// Resolve the element's coordinates, preferring direct fields over the
    /// centre record.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            return Some((lat, lon));
        }
        self.center.map(|center| (center.lat, center.lon))
    }
}

/// A normalised point of interest.
///
/// Absent name, category, or value are empty strings, never null. The pair
/// `(osm_type, osm_id)` identifies the POI and is unique in any normaliser
/// output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    /// OSM element type (`node`, `way`, or `relation`).
    pub osm_type: String,
    /// Raw OSM element identifier.
    pub osm_id: i64,
    /// Latitude in WGS84.
    pub lat: f64,
    /// Longitude in WGS84.
    pub lon: f64,
    /// Display name, empty when untagged.
    pub name: String,
    /// First matching tag key from the caller's priority list, or empty.
    pub category: String,
    /// Tag value associated with `category`, or empty.
    pub value: String,
    /// Full raw tag mapping.
    pub tags: BTreeMap<String, String>,
}

impl Poi {
    /// Deduplication key.
    pub fn identity(&self) -> (&str, i64) {
        (&self.osm_type, self.osm_id)
    }
}

/// One fetch request against the Overpass API.
///
/// `keys` are priority-ordered: the first key present in an element's tags
/// decides its category. `element_types` is normalised by the query builder;
/// an empty or unrecognised set widens to all three types.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    /// Search centre.
    pub center: GeoPoint,
    /// Search radius in metres.
    pub radius_m: u32,
    /// Priority-ordered tag keys; empty means [`DEFAULT_POI_KEYS`].
    pub keys: Vec<String>,
    /// Optional case-insensitive name filter (regex, quoted server-side).
    pub name_filter: Option<String>,
    /// Requested element types; empty widens to node, way, and relation.
    pub element_types: Vec<String>,
    /// Maximum number of elements returned per query.
    pub limit: u32,
    /// Timeout directive embedded in the query text, in seconds.
    pub server_timeout_s: u32,
    /// Issue one query per key instead of one combined query.
    pub split_by_key: bool,
}

impl NearbyQuery {
    /// Build a query around `center` with the crate defaults.
    pub fn around(center: GeoPoint, radius_m: u32) -> Self {
        Self {
            center,
            radius_m,
            keys: Vec::new(),
            name_filter: None,
            element_types: Vec::new(),
            limit: 120,
            server_timeout_s: 25,
            split_by_key: true,
        }
    }

    /// Effective key list: the caller's keys, or the default set.
    pub fn effective_keys(&self) -> Vec<String> {
        if self.keys.is_empty() {
            DEFAULT_POI_KEYS.iter().map(|key| (*key).to_owned()).collect()
        } else {
            self.keys.clone()
        }
    }
}
