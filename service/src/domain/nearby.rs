//! Nearby-POI application service and its result document.
//!
//! This is the domain half of the tool surface: it turns tool arguments into
//! a fetch, then shapes the POI list into the summary document crossing the
//! RPC boundary (count, category histogram, projected records).

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::poi::{GeoPoint, NearbyQuery, Poi};
use super::ports::{FetchError, PoiSource};

/// Number of category histogram entries retained in a summary.
const CATEGORY_COUNTS_TOP: usize = 30;

/// Placeholder rendered for unnamed POIs in human-readable listings.
const NO_NAME_PLACEHOLDER: &str = "[no-name]";

/// Arguments of one `get_nearby_pois` invocation.
///
/// Defaults match the tool contract: a 500 m radius, the standard key set,
/// 120 results, a 25 s server-side timeout, split-by-key fetching, and
/// compact tag-free records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyRequest {
    /// Centre latitude in WGS84 degrees.
    pub lat: f64,
    /// Centre longitude in WGS84 degrees.
    pub lon: f64,
    /// Search radius in metres.
    #[serde(default = "default_radius_m")]
    pub radius_m: u32,
    /// Priority-ordered tag keys; omitted means the default set.
    #[serde(default)]
    pub poi_keys: Option<Vec<String>>,
    /// Optional case-insensitive name filter.
    #[serde(default)]
    pub name_query: Option<String>,
    /// Maximum number of elements per upstream query.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Timeout directive embedded in the query text, in seconds.
    #[serde(default = "default_timeout_overpass_s")]
    pub timeout_overpass_s: u32,
    /// Issue one upstream query per key.
    #[serde(default = "default_true")]
    pub split_by_key: bool,
    /// Reduced record selection; full mode embeds every field.
    #[serde(default = "default_true")]
    pub compact: bool,
    /// Attach the raw tag mapping to compact records.
    #[serde(default)]
    pub include_tags: bool,
}

const fn default_radius_m() -> u32 {
    500
}

const fn default_limit() -> u32 {
    120
}

const fn default_timeout_overpass_s() -> u32 {
    25
}

const fn default_true() -> bool {
    true
}

impl NearbyRequest {
    /// Build a request for `lat`/`lon` with the tool defaults.
    pub fn at(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            radius_m: default_radius_m(),
            poi_keys: None,
            name_query: None,
            limit: default_limit(),
            timeout_overpass_s: default_timeout_overpass_s(),
            split_by_key: true,
            compact: true,
            include_tags: false,
        }
    }

    /// Translate tool arguments into a fetch query.
    ///
    /// The tool queries node elements only: point features keep payloads
    /// small, and the builder widens to all types for callers that ask.
    pub fn to_query(&self) -> NearbyQuery {
        NearbyQuery {
            center: GeoPoint { lat: self.lat, lon: self.lon },
            radius_m: self.radius_m,
            keys: self.poi_keys.clone().unwrap_or_default(),
            name_filter: self.name_query.clone(),
            element_types: vec!["node".to_owned()],
            limit: self.limit,
            server_timeout_s: self.timeout_overpass_s,
            split_by_key: self.split_by_key,
        }
    }
}

/// One category histogram entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    /// `{category}={value}` label.
    pub label: String,
    /// Number of POIs carrying this label.
    pub count: usize,
}

/// One POI as serialised across the RPC boundary.
///
/// The tag mapping is present on full records and on compact records when
/// tags were explicitly requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiRecord {
    /// OSM element type.
    pub osm_type: String,
    /// OSM element identifier.
    pub osm_id: i64,
    /// Latitude in WGS84.
    pub lat: f64,
    /// Longitude in WGS84.
    pub lon: f64,
    /// Display name, empty when untagged.
    pub name: String,
    /// Matched category key, or empty.
    pub category: String,
    /// Matched category value, or empty.
    pub value: String,
    /// Raw tag mapping, omitted when suppressed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<std::collections::BTreeMap<String, String>>,
}

/// The summary document returned by one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbySummary {
    /// Echoed search centre.
    pub center: GeoPoint,
    /// Echoed search radius in metres.
    pub radius_m: u32,
    /// Number of POIs in `pois`.
    pub count: usize,
    /// Up to 30 `{category}={value}` labels by descending count.
    pub category_counts_top: Vec<CategoryCount>,
    /// Projected POI records.
    pub pois: Vec<PoiRecord>,
}

impl NearbySummary {
    /// Shape `pois` into the summary document for `request`.
    pub fn build(request: &NearbyRequest, pois: &[Poi]) -> Self {
        Self {
            center: GeoPoint { lat: request.lat, lon: request.lon },
            radius_m: request.radius_m,
            count: pois.len(),
            category_counts_top: top_category_counts(pois),
            pois: pois
                .iter()
                .map(|poi| project(poi, request.compact, request.include_tags))
                .collect(),
        }
    }
}

fn top_category_counts(pois: &[Poi]) -> Vec<CategoryCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for poi in pois {
        if poi.category.is_empty() || poi.value.is_empty() {
            continue;
        }
        *counts
            .entry(format!("{}={}", poi.category, poi.value))
            .or_insert(0) += 1;
    }

    let mut entries: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(label, count)| CategoryCount { label, count })
        .collect();
    // Label tie-break keeps the ordering stable across calls.
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    entries.truncate(CATEGORY_COUNTS_TOP);
    entries
}

fn project(poi: &Poi, compact: bool, include_tags: bool) -> PoiRecord {
    PoiRecord {
        osm_type: poi.osm_type.clone(),
        osm_id: poi.osm_id,
        lat: poi.lat,
        lon: poi.lon,
        name: poi.name.clone(),
        category: poi.category.clone(),
        value: poi.value.clone(),
        // Full records embed every field; compact records suppress tags
        // unless they were requested explicitly.
        tags: (!compact || include_tags).then(|| poi.tags.clone()),
    }
}

/// Render POIs as a compact text listing, one line per POI.
///
/// Sorted by (category, value, name); unnamed POIs render with a literal
/// placeholder, never blank. At most `max_items` lines are emitted, with a
/// trailer noting how many entries were omitted.
pub fn render_text(pois: &[Poi], max_items: usize) -> String {
    let mut sorted: Vec<&Poi> = pois.iter().collect();
    sorted.sort_by(|a, b| {
        (&a.category, &a.value, &a.name).cmp(&(&b.category, &b.value, &b.name))
    });

    let mut lines: Vec<String> = sorted
        .iter()
        .take(max_items)
        .map(|poi| {
            let name = match poi.name.trim() {
                "" => NO_NAME_PLACEHOLDER,
                trimmed => trimmed,
            };
            format!(
                "- name={name} | {category}={value} | lat={lat:.6} lon={lon:.6}",
                category = poi.category,
                value = poi.value,
                lat = poi.lat,
                lon = poi.lon,
            )
        })
        .collect();
    if sorted.len() > max_items {
        lines.push(format!("... ({} more omitted)", sorted.len() - max_items));
    }
    lines.join("\n")
}

/// Application service backing the `get_nearby_pois` tool.
///
/// Stateless between calls: every invocation is an isolated fetch with no
/// caching across calls, including repeated calls for the same coordinates.
pub struct NearbyPoiService {
    source: Arc<dyn PoiSource>,
}

impl NearbyPoiService {
    /// Build a service over a POI source.
    pub fn new(source: Arc<dyn PoiSource>) -> Self {
        Self { source }
    }

    /// Fetch nearby POIs and shape them into the summary document.
    ///
    /// # Errors
    ///
    /// Propagates [`FetchError`] when every upstream endpoint is exhausted.
    pub async fn get_nearby_pois(
        &self,
        request: &NearbyRequest,
    ) -> Result<NearbySummary, FetchError> {
        let query = request.to_query();
        let pois = self.source.fetch_pois(&query).await?;
        tracing::info!(
            lat = request.lat,
            lon = request.lon,
            radius_m = request.radius_m,
            count = pois.len(),
            "nearby poi fetch completed"
        );
        Ok(NearbySummary::build(request, &pois))
    }
}
