//! Element-to-POI normalisation and deduplication.

use std::collections::HashMap;

use super::poi::{Poi, RawElement};

/// Normalise raw elements into POIs, deduplicated by `(osm_type, osm_id)`.
///
/// Elements without resolvable coordinates are skipped, not errored: an
/// extended geometry missing its centroid carries no usable location. The
/// first key in `keys` present in an element's tags becomes its category;
/// no match leaves category and value empty.
///
/// When the same identity recurs (split-by-key queries return overlapping
/// sets), the output keeps the first occurrence's position and the latest
/// occurrence's payload.
pub fn normalize_elements(elements: Vec<RawElement>, keys: &[String]) -> Vec<Poi> {
    let mut pois: Vec<Poi> = Vec::with_capacity(elements.len());
    let mut seen: HashMap<(String, i64), usize> = HashMap::with_capacity(elements.len());

    for element in elements {
        let Some((lat, lon)) = element.coordinates() else {
            tracing::debug!(
                element_type = %element.element_type,
                id = element.id,
                "skipping element without resolvable coordinates"
            );
            continue;
        };

        let (category, value) = keys
            .iter()
            .find_map(|key| {
                element
                    .tags
                    .get(key)
                    .map(|tag_value| (key.clone(), tag_value.clone()))
            })
            .unwrap_or_default();

        let poi = Poi {
            osm_type: element.element_type,
            osm_id: element.id,
            lat,
            lon,
            name: element.tags.get("name").cloned().unwrap_or_default(),
            category,
            value,
            tags: element.tags,
        };

        let identity = (poi.osm_type.clone(), poi.osm_id);
        match seen.get(&identity) {
            Some(&position) => {
                if let Some(slot) = pois.get_mut(position) {
                    *slot = poi;
                }
            }
            None => {
                seen.insert(identity, pois.len());
                pois.push(poi);
            }
        }
    }

    pois
}
