//! Overpass QL builder.
//!
//! Pure text assembly: no I/O, deterministic for a given query aside from
//! float formatting of the centre coordinates.

use super::poi::NearbyQuery;

const ALLOWED_ELEMENT_TYPES: [&str; 3] = ["node", "way", "relation"];

/// Build one Overpass QL query for `query`, restricted to `keys`.
///
/// `keys` is passed separately so split-by-key fetches can reuse one
/// [`NearbyQuery`] while narrowing each round trip to a single key. Each
/// (element type, key) pair contributes one `around` clause; the clauses are
/// unioned and the output directive requests centroids for extended
/// geometries, capped at the query's limit.
pub fn build_query(query: &NearbyQuery, keys: &[String]) -> String {
    let name_filter = query
        .name_filter
        .as_deref()
        .filter(|name| !name.is_empty())
        .map(|name| format!("[\"name\"~\"(?i){}\"]", escape_quoted(name)))
        .unwrap_or_default();

    let element_types = normalize_element_types(&query.element_types);

    let mut clauses = Vec::with_capacity(keys.len() * element_types.len());
    for key in keys {
        for element_type in &element_types {
            clauses.push(format!(
                "{element_type}(around:{radius},{lat},{lon})[\"{key}\"]{name_filter};",
                radius = query.radius_m,
                lat = query.center.lat,
                lon = query.center.lon,
                key = escape_quoted(key),
            ));
        }
    }

    format!(
        "[out:json][timeout:{timeout}];\n(\n  {union}\n);\nout center {limit};",
        timeout = query.server_timeout_s,
        union = clauses.join("\n  "),
        limit = query.limit,
    )
}

/// Normalise requested element types against the allowed set.
///
/// Unknown entries are discarded; an empty result widens to all three types.
/// A missing type filter is safe (over-broad), so this never fails.
fn normalize_element_types(requested: &[String]) -> Vec<String> {
    let normalized: Vec<String> = requested
        .iter()
        .map(|element_type| element_type.trim().to_lowercase())
        .filter(|element_type| ALLOWED_ELEMENT_TYPES.contains(&element_type.as_str()))
        .collect();

    if normalized.is_empty() {
        ALLOWED_ELEMENT_TYPES
            .iter()
            .map(|element_type| (*element_type).to_owned())
            .collect()
    } else {
        normalized
    }
}

fn escape_quoted(raw: &str) -> String {
    raw.replace('\\', r"\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::poi::GeoPoint;

    fn query() -> NearbyQuery {
        NearbyQuery {
            element_types: vec!["node".to_owned()],
            limit: 60,
            ..NearbyQuery::around(GeoPoint { lat: 40.6938, lon: -73.9607 }, 800)
        }
    }

    #[test]
    fn builds_around_clause_per_type_and_key() {
        let mut q = query();
        q.element_types = vec!["node".to_owned(), "way".to_owned()];
        let text = build_query(&q, &["amenity".to_owned(), "shop".to_owned()]);

        assert!(text.contains("node(around:800,40.6938,-73.9607)[\"amenity\"];"));
        assert!(text.contains("way(around:800,40.6938,-73.9607)[\"amenity\"];"));
        assert!(text.contains("node(around:800,40.6938,-73.9607)[\"shop\"];"));
        assert!(text.contains("way(around:800,40.6938,-73.9607)[\"shop\"];"));
    }

    #[test]
    fn header_and_output_directive_carry_timeout_and_limit() {
        let text = build_query(&query(), &["amenity".to_owned()]);
        assert!(text.starts_with("[out:json][timeout:25];"));
        assert!(text.ends_with("out center 60;"));
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::unrecognised(vec!["area".to_owned(), "".to_owned()])]
    #[case::whitespace(vec!["   ".to_owned()])]
    fn invalid_element_types_widen_to_all_three(#[case] element_types: Vec<String>) {
        let mut q = query();
        q.element_types = element_types;
        let text = build_query(&q, &["amenity".to_owned()]);

        for element_type in ["node", "way", "relation"] {
            assert!(
                text.contains(&format!("{element_type}(around:")),
                "expected a {element_type} clause in: {text}"
            );
        }
    }

    #[test]
    fn element_types_are_trimmed_and_lowercased() {
        let mut q = query();
        q.element_types = vec![" Node ".to_owned(), "WAY".to_owned()];
        let text = build_query(&q, &["amenity".to_owned()]);

        assert!(text.contains("node(around:"));
        assert!(text.contains("way(around:"));
        assert!(!text.contains("relation(around:"));
    }

    #[test]
    fn name_filter_is_case_insensitive_and_escaped() {
        let mut q = query();
        q.name_filter = Some("Joe's \"Place\"".to_owned());
        let text = build_query(&q, &["amenity".to_owned()]);

        assert!(text.contains("[\"name\"~\"(?i)Joe's \\\"Place\\\"\"]"));
    }

    #[test]
    fn blank_name_filter_adds_no_clause() {
        let mut q = query();
        q.name_filter = Some(String::new());
        let text = build_query(&q, &["amenity".to_owned()]);

        assert!(!text.contains("\"name\""));
    }
}
