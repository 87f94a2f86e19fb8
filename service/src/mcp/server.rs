//! Stdio tool server.
//!
//! One long-lived process exposing `get_nearby_pois` over JSON-RPC 2.0 on
//! stdin/stdout. The server is stateless between calls and safe to restart
//! on every invocation; the bridge launches one process per prediction
//! step.

use std::io::{BufRead, Write};

use serde_json::{Value, json};

use super::protocol::{
    InitializeResult, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION, ServerCapabilities,
    ServerInfo, ToolCallParams, ToolDefinition, ToolResult, ToolsCapability,
};
use crate::domain::nearby::{NearbyPoiService, NearbyRequest};

/// Name of the single exposed tool.
pub const GET_NEARBY_POIS: &str = "get_nearby_pois";

/// Failures of the serve loop itself (tool failures travel inside result
/// envelopes instead).
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// Reading stdin or writing stdout failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A message could not be parsed or a response could not be encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stdio tool server wrapping the nearby-POI service.
pub struct PoiToolServer {
    service: NearbyPoiService,
}

impl PoiToolServer {
    /// Build a server over the nearby-POI service.
    pub fn new(service: NearbyPoiService) -> Self {
        Self { service }
    }

    /// Serve requests from stdin until EOF.
    ///
    /// Responses and logs are strictly separated: stdout carries protocol
    /// messages only.
    ///
    /// # Errors
    ///
    /// Returns [`McpError`] when stdin/stdout fail; malformed requests are
    /// answered with JSON-RPC error envelopes instead of ending the loop.
    pub async fn run(&self) -> Result<(), McpError> {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();

        tracing::info!("poi tool service ready, listening on stdio");

        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match self.handle_message(&line).await {
                Ok(response) if !response.is_empty() => {
                    writeln!(stdout, "{response}")?;
                    stdout.flush()?;
                }
                Ok(_) => {} // Notification, no response.
                Err(error) => {
                    let fallback =
                        JsonRpcResponse::error(None, -32700, format!("parse error: {error}"));
                    writeln!(stdout, "{}", serde_json::to_string(&fallback)?)?;
                    stdout.flush()?;
                }
            }
        }

        Ok(())
    }

    /// Handle one protocol message, returning the serialised response.
    ///
    /// Notifications return an empty string.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Json`] when the message is not a JSON-RPC
    /// request or the response cannot be encoded.
    pub async fn handle_message(&self, message: &str) -> Result<String, McpError> {
        let request: JsonRpcRequest = serde_json::from_str(message)?;

        let response = match request.method.as_str() {
            "initialize" => handle_initialize(request.id),
            "initialized" | "notifications/initialized" => return Ok(String::new()),
            "tools/list" => handle_tools_list(request.id),
            "tools/call" => self.handle_tools_call(request.id, request.params).await?,
            method => JsonRpcResponse::error(
                request.id,
                -32601,
                format!("Method not found: {method}"),
            ),
        };

        serde_json::to_string(&response).map_err(McpError::from)
    }

    async fn handle_tools_call(
        &self,
        id: Option<Value>,
        params: Value,
    ) -> Result<JsonRpcResponse, McpError> {
        let call: ToolCallParams = match serde_json::from_value(params) {
            Ok(call) => call,
            Err(error) => {
                return Ok(JsonRpcResponse::error(
                    id,
                    -32602,
                    format!("invalid tool call params: {error}"),
                ));
            }
        };

        if call.name != GET_NEARBY_POIS {
            let result = ToolResult::error(format!("unknown tool: {}", call.name));
            return Ok(JsonRpcResponse::success(id, serde_json::to_value(result)?));
        }

        let request: NearbyRequest = match serde_json::from_value(call.arguments) {
            Ok(request) => request,
            Err(error) => {
                return Ok(JsonRpcResponse::error(
                    id,
                    -32602,
                    format!("invalid {GET_NEARBY_POIS} arguments: {error}"),
                ));
            }
        };

        let result = match self.service.get_nearby_pois(&request).await {
            Ok(summary) => ToolResult::text(serde_json::to_string(&summary)?),
            Err(error) => {
                tracing::warn!(error = %error, "nearby poi fetch failed");
                ToolResult::error(error.to_string())
            }
        };
        Ok(JsonRpcResponse::success(id, serde_json::to_value(result)?))
    }
}

fn handle_initialize(id: Option<Value>) -> JsonRpcResponse {
    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_owned(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
        },
        server_info: ServerInfo {
            name: env!("CARGO_PKG_NAME").to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
        },
    };
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(error) => JsonRpcResponse::error(id, -32603, format!("internal error: {error}")),
    }
}

fn handle_tools_list(id: Option<Value>) -> JsonRpcResponse {
    let tools: Vec<Value> = tool_definitions()
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": tool.input_schema,
            })
        })
        .collect();
    JsonRpcResponse::success(id, json!({ "tools": tools }))
}

/// The advertised tool catalogue.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        name: GET_NEARBY_POIS.to_owned(),
        description: "Fetch nearby OpenStreetMap POIs around a coordinate via Overpass. \
                      Compact output by default."
            .to_owned(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "lat": { "type": "number", "description": "Centre latitude (WGS84)" },
                "lon": { "type": "number", "description": "Centre longitude (WGS84)" },
                "radius_m": { "type": "integer", "default": 500 },
                "poi_keys": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Priority-ordered tag keys"
                },
                "name_query": { "type": "string", "description": "Case-insensitive name filter" },
                "limit": { "type": "integer", "default": 120 },
                "timeout_overpass_s": { "type": "integer", "default": 25 },
                "split_by_key": { "type": "boolean", "default": true },
                "compact": { "type": "boolean", "default": true },
                "include_tags": { "type": "boolean", "default": false }
            },
            "required": ["lat", "lon"]
        }),
    }]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::ports::FixturePoiSource;

    fn server() -> PoiToolServer {
        PoiToolServer::new(NearbyPoiService::new(Arc::new(FixturePoiSource)))
    }

    #[tokio::test]
    async fn initialize_reports_capabilities_and_identity() {
        let request = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"test","version":"1.0"}}}"#;
        let response = server().handle_message(request).await.expect("handled");

        let parsed: Value = serde_json::from_str(&response).expect("valid json");
        assert_eq!(parsed["jsonrpc"], "2.0");
        assert_eq!(parsed["id"], 1);
        assert_eq!(parsed["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(parsed["result"]["serverInfo"]["name"], "poi-service");
    }

    #[tokio::test]
    async fn initialized_notifications_produce_no_response() {
        for method in ["initialized", "notifications/initialized"] {
            let request = format!(r#"{{"jsonrpc":"2.0","method":"{method}"}}"#);
            let response = server().handle_message(&request).await.expect("handled");
            assert!(response.is_empty(), "{method} must stay silent");
        }
    }

    #[tokio::test]
    async fn string_ids_are_preserved_in_responses() {
        let request = r#"{"jsonrpc":"2.0","id":"req-abc-123","method":"tools/list","params":{}}"#;
        let response = server().handle_message(request).await.expect("handled");
        let parsed: Value = serde_json::from_str(&response).expect("valid json");
        assert_eq!(parsed["id"], "req-abc-123");
    }

    #[tokio::test]
    async fn tools_list_advertises_the_nearby_tool() {
        let request = r#"{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}"#;
        let response = server().handle_message(request).await.expect("handled");
        let parsed: Value = serde_json::from_str(&response).expect("valid json");

        let tools = parsed["result"]["tools"].as_array().expect("tools array");
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], GET_NEARBY_POIS);
        assert_eq!(tools[0]["inputSchema"]["required"], json!(["lat", "lon"]));
    }

    #[tokio::test]
    async fn unknown_methods_return_method_not_found() {
        let request = r#"{"jsonrpc":"2.0","id":4,"method":"resources/list","params":{}}"#;
        let response = server().handle_message(request).await.expect("handled");
        let parsed: Value = serde_json::from_str(&response).expect("valid json");
        assert_eq!(parsed["error"]["code"], -32601);
        assert_eq!(parsed["id"], 4);
    }

    #[tokio::test]
    async fn unknown_tools_return_error_envelopes() {
        let request = r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"nope","arguments":{}}}"#;
        let response = server().handle_message(request).await.expect("handled");
        let parsed: Value = serde_json::from_str(&response).expect("valid json");

        assert_eq!(parsed["result"]["is_error"], true);
        assert!(
            parsed["result"]["content"][0]["text"]
                .as_str()
                .expect("text block")
                .contains("unknown tool")
        );
    }

    #[tokio::test]
    async fn missing_required_arguments_return_invalid_params() {
        let request = r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"get_nearby_pois","arguments":{"lon":-73.9607}}}"#;
        let response = server().handle_message(request).await.expect("handled");
        let parsed: Value = serde_json::from_str(&response).expect("valid json");
        assert_eq!(parsed["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let result = server().handle_message(r#"{"not valid json"#).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn tool_call_returns_a_summary_document() {
        let request = r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"get_nearby_pois","arguments":{"lat":40.6938,"lon":-73.9607,"radius_m":800}}}"#;
        let response = server().handle_message(request).await.expect("handled");
        let parsed: Value = serde_json::from_str(&response).expect("valid json");

        let text = parsed["result"]["content"][0]["text"]
            .as_str()
            .expect("text block");
        let summary: Value = serde_json::from_str(text).expect("summary document");
        assert_eq!(summary["count"], 0);
        assert_eq!(summary["radius_m"], 800);
        assert_eq!(summary["center"]["lat"], 40.6938);
    }
}
