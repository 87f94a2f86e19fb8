//! End-to-end protocol coverage for the nearby-POI tool over
//! `handle_message`, with the upstream stubbed at the `PoiSource` port.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use poi_service::domain::nearby::{NearbyPoiService, NearbyRequest, NearbySummary};
use poi_service::domain::poi::{NearbyQuery, Poi};
use poi_service::domain::ports::{FetchError, OverpassSourceError, PoiSource};
use poi_service::mcp::server::PoiToolServer;

/// Source double returning one tagged cafe, as a stubbed upstream would.
struct JoesCafeSource;

#[async_trait]
impl PoiSource for JoesCafeSource {
    async fn fetch_pois(&self, query: &NearbyQuery) -> Result<Vec<Poi>, FetchError> {
        assert_eq!(query.effective_keys(), vec!["amenity"]);
        assert!(query.split_by_key);
        Ok(vec![Poi {
            osm_type: "node".to_owned(),
            osm_id: 101,
            lat: 40.6938,
            lon: -73.9607,
            name: "Joe's".to_owned(),
            category: "amenity".to_owned(),
            value: "cafe".to_owned(),
            tags: BTreeMap::from([
                ("amenity".to_owned(), "cafe".to_owned()),
                ("name".to_owned(), "Joe's".to_owned()),
            ]),
        }])
    }
}

/// Source double that always exhausts its mirrors.
struct ExhaustedSource;

#[async_trait]
impl PoiSource for ExhaustedSource {
    async fn fetch_pois(&self, _query: &NearbyQuery) -> Result<Vec<Poi>, FetchError> {
        Err(FetchError::unavailable(OverpassSourceError::overloaded(
            503_u16,
            "all mirrors busy",
        )))
    }
}

fn server(source: impl PoiSource + 'static) -> PoiToolServer {
    PoiToolServer::new(NearbyPoiService::new(Arc::new(source)))
}

async fn call_tool(server: &PoiToolServer, arguments: Value) -> Value {
    let request = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": { "name": "get_nearby_pois", "arguments": arguments },
    });
    let response = server
        .handle_message(&request.to_string())
        .await
        .expect("tools/call handled");
    serde_json::from_str(&response).expect("valid response json")
}

fn summary_from(response: &Value) -> NearbySummary {
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("first content block is text");
    serde_json::from_str(text).expect("summary document decodes")
}

#[tokio::test]
async fn brooklyn_cafe_scenario_yields_one_amenity_poi() {
    let server = server(JoesCafeSource);
    let response = call_tool(
        &server,
        json!({
            "lat": 40.6938,
            "lon": -73.9607,
            "radius_m": 800,
            "poi_keys": ["amenity"],
            "limit": 60,
            "split_by_key": true,
        }),
    )
    .await;

    let summary = summary_from(&response);
    assert_eq!(summary.count, 1);
    assert_eq!(summary.radius_m, 800);
    assert_eq!(summary.pois[0].category, "amenity");
    assert_eq!(summary.pois[0].value, "cafe");
    assert_eq!(summary.pois[0].name, "Joe's");
    assert_eq!(summary.category_counts_top.len(), 1);
    assert_eq!(summary.category_counts_top[0].label, "amenity=cafe");
    assert_eq!(summary.category_counts_top[0].count, 1);
}

#[tokio::test]
async fn summary_survives_the_rpc_boundary_unchanged() {
    let request = NearbyRequest {
        radius_m: 800,
        poi_keys: Some(vec!["amenity".to_owned()]),
        limit: 60,
        ..NearbyRequest::at(40.6938, -73.9607)
    };

    // The document built directly by the service...
    let service = NearbyPoiService::new(Arc::new(JoesCafeSource));
    let direct = service
        .get_nearby_pois(&request)
        .await
        .expect("direct fetch succeeds");

    // ...and the one decoded back out of the protocol envelope.
    let server = server(JoesCafeSource);
    let response = call_tool(
        &server,
        serde_json::to_value(&request).expect("request encodes"),
    )
    .await;
    let decoded = summary_from(&response);

    assert_eq!(decoded.count, direct.count);
    assert_eq!(decoded.radius_m, direct.radius_m);
    assert_eq!(decoded.center, direct.center);

    let identities = |summary: &NearbySummary| -> HashSet<(String, i64)> {
        summary
            .pois
            .iter()
            .map(|poi| (poi.osm_type.clone(), poi.osm_id))
            .collect()
    };
    assert_eq!(identities(&decoded), identities(&direct));
}

#[tokio::test]
async fn compact_records_omit_tags_unless_requested() {
    let server = server(JoesCafeSource);

    let compact = call_tool(&server, json!({ "lat": 40.6938, "lon": -73.9607 })).await;
    let summary = summary_from(&compact);
    assert!(summary.pois[0].tags.is_none());

    let with_tags = call_tool(
        &server,
        json!({ "lat": 40.6938, "lon": -73.9607, "include_tags": true }),
    )
    .await;
    let summary = summary_from(&with_tags);
    let tags = summary.pois[0].tags.as_ref().expect("tags requested");
    assert_eq!(tags.get("amenity").map(String::as_str), Some("cafe"));
}

#[tokio::test]
async fn upstream_exhaustion_becomes_a_tool_error_envelope() {
    let server = server(ExhaustedSource);
    let response = call_tool(&server, json!({ "lat": 40.6938, "lon": -73.9607 })).await;

    assert_eq!(response["result"]["is_error"], true);
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("error text");
    assert!(text.contains("all overpass endpoints failed"));
    assert!(text.contains("503"), "last underlying error is preserved");
}

#[tokio::test]
async fn session_order_initialize_list_call_works_end_to_end() {
    let server = server(JoesCafeSource);

    let init = server
        .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
        .await
        .expect("initialize handled");
    assert!(init.contains("protocolVersion"));

    let note = server
        .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await
        .expect("notification handled");
    assert!(note.is_empty());

    let list = server
        .handle_message(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}"#)
        .await
        .expect("tools/list handled");
    assert!(list.contains("get_nearby_pois"));

    let response = call_tool(&server, json!({ "lat": 40.6938, "lon": -73.9607 })).await;
    assert_eq!(summary_from(&response).count, 1);
}
