//! Subprocess client bridge for the tool service.
//!
//! The bridge launches the service as a child process bound to stdio pipes,
//! performs the capability handshake, issues one tool call, and tears the
//! process down. One subprocess per call: an upstream hang or crash inside
//! the service cannot corrupt caller state, at the cost of process startup
//! latency on every call.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::protocol::{JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION, ToolContent, ToolResult};
use super::server::GET_NEARBY_POIS;
use crate::domain::nearby::{NearbyRequest, NearbySummary};

/// How long a drained child process may take to exit before being killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Typed failures of the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The service process could not be launched.
    #[error("failed to launch tool service: {message}")]
    Spawn {
        /// Launch failure detail.
        message: String,
    },
    /// The service closed its pipes before answering.
    #[error("tool service channel closed: {message}")]
    ChannelClosed {
        /// Channel failure detail.
        message: String,
    },
    /// The capability handshake failed.
    #[error("tool service handshake failed: {message}")]
    Handshake {
        /// Handshake failure detail.
        message: String,
    },
    /// The service answered with a JSON-RPC error envelope.
    #[error("tool service rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },
    /// The tool ran and reported a failure.
    #[error("tool reported failure: {message}")]
    Tool {
        /// Tool failure detail.
        message: String,
    },
    /// The response could not be decoded.
    #[error("failed to decode tool response: {message}")]
    Decode {
        /// Decode failure detail.
        message: String,
    },
}

/// Description of how to launch the tool service subprocess.
#[derive(Debug, Clone)]
pub struct ServiceLaunch {
    /// Program to execute.
    pub program: PathBuf,
    /// Command-line arguments.
    pub args: Vec<String>,
    /// Working directory for the child, inherited when absent.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables visible to the child.
    pub envs: Vec<(String, String)>,
}

impl ServiceLaunch {
    /// Launch `program` with no extra arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            envs: Vec::new(),
        }
    }

    /// Append one command-line argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the child's working directory.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add one environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

/// One stdio session with a launched tool service.
pub struct ToolServiceClient {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    next_id: i64,
}

impl ToolServiceClient {
    /// Spawn the service and bind its stdio pipes.
    ///
    /// The child's stderr is inherited so service logs reach the caller's
    /// stderr unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Spawn`] when the process cannot be started or
    /// its pipes are unavailable.
    pub async fn launch(launch: &ServiceLaunch) -> Result<Self, BridgeError> {
        let mut command = Command::new(&launch.program);
        command
            .args(&launch.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &launch.working_dir {
            command.current_dir(dir);
        }
        for (key, value) in &launch.envs {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|error| BridgeError::Spawn {
            message: format!("{}: {error}", launch.program.display()),
        })?;
        let stdin = child.stdin.take().ok_or_else(|| BridgeError::Spawn {
            message: "child stdin pipe unavailable".to_owned(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| BridgeError::Spawn {
            message: "child stdout pipe unavailable".to_owned(),
        })?;

        tracing::debug!(program = %launch.program.display(), "tool service launched");
        Ok(Self {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            next_id: 0,
        })
    }

    /// Perform the capability handshake.
    ///
    /// Must precede any tool call. Returns the server's initialize result.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Handshake`] when the exchange fails.
    pub async fn initialize(&mut self) -> Result<Value, BridgeError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "poi-service-bridge",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        let result = self
            .request("initialize", params)
            .await
            .map_err(|error| BridgeError::Handshake {
                message: error.to_string(),
            })?;
        self.notify("notifications/initialized").await?;
        Ok(result)
    }

    /// Enumerate the service's tool names.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] when the request or decoding fails.
    pub async fn list_tools(&mut self) -> Result<Vec<String>, BridgeError> {
        let result = self.request("tools/list", json!({})).await?;
        let tools = result
            .get("tools")
            .and_then(Value::as_array)
            .ok_or_else(|| BridgeError::Decode {
                message: "tools/list result lacks a tools array".to_owned(),
            })?;
        Ok(tools
            .iter()
            .filter_map(|tool| tool.get("name").and_then(Value::as_str))
            .map(str::to_owned)
            .collect())
    }

    /// Invoke one tool and return the first text content block.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Tool`] for `is_error` envelopes and
    /// [`BridgeError::Decode`] for malformed results.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<String, BridgeError> {
        let result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        extract_text(result)
    }

    /// Tear the session down deterministically.
    ///
    /// Closing stdin lets the serve loop exit on EOF; a child that does not
    /// exit within the grace period is killed.
    pub async fn shutdown(self) {
        let Self {
            mut child,
            stdin,
            lines,
            ..
        } = self;
        drop(stdin);
        drop(lines);

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(%status, "tool service exited"),
            Ok(Err(error)) => tracing::debug!(error = %error, "tool service wait failed"),
            Err(_) => {
                tracing::warn!("tool service did not exit in time, killing it");
                if let Err(error) = child.kill().await {
                    tracing::warn!(error = %error, "failed to kill tool service");
                }
            }
        }
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<Value, BridgeError> {
        self.next_id += 1;
        let id = self.next_id;
        self.send(&JsonRpcRequest::new(id, method, params)).await?;

        loop {
            let line = self.read_line().await?;
            let Ok(response) = serde_json::from_str::<JsonRpcResponse>(&line) else {
                tracing::debug!(line = %line, "ignoring non-response output from tool service");
                continue;
            };
            if response.id != Some(Value::from(id)) {
                continue;
            }
            if let Some(error) = response.error {
                return Err(BridgeError::Rpc {
                    code: error.code,
                    message: error.message,
                });
            }
            return response.result.ok_or_else(|| BridgeError::Decode {
                message: "response carries neither result nor error".to_owned(),
            });
        }
    }

    async fn notify(&mut self, method: &str) -> Result<(), BridgeError> {
        self.send(&JsonRpcRequest::notification(method)).await
    }

    async fn send(&mut self, request: &JsonRpcRequest) -> Result<(), BridgeError> {
        let mut encoded = serde_json::to_string(request).map_err(|error| BridgeError::Decode {
            message: format!("failed to encode request: {error}"),
        })?;
        encoded.push('\n');
        self.stdin
            .write_all(encoded.as_bytes())
            .await
            .map_err(|error| BridgeError::ChannelClosed {
                message: error.to_string(),
            })?;
        self.stdin
            .flush()
            .await
            .map_err(|error| BridgeError::ChannelClosed {
                message: error.to_string(),
            })
    }

    async fn read_line(&mut self) -> Result<String, BridgeError> {
        match self.lines.next_line().await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(BridgeError::ChannelClosed {
                message: "tool service closed stdout".to_owned(),
            }),
            Err(error) => Err(BridgeError::ChannelClosed {
                message: error.to_string(),
            }),
        }
    }
}

/// Launch the service, fetch one nearby-POI summary, and tear down.
///
/// The session is torn down on both success and failure; callers treat any
/// [`BridgeError`] as "no POI context for this step" and continue.
///
/// # Errors
///
/// Returns a [`BridgeError`] describing the first failing stage.
pub async fn call_get_nearby_pois(
    launch: &ServiceLaunch,
    request: &NearbyRequest,
) -> Result<NearbySummary, BridgeError> {
    let mut client = ToolServiceClient::launch(launch).await?;
    let outcome = run_call(&mut client, request).await;
    client.shutdown().await;
    outcome
}

async fn run_call(
    client: &mut ToolServiceClient,
    request: &NearbyRequest,
) -> Result<NearbySummary, BridgeError> {
    client.initialize().await?;
    let arguments = serde_json::to_value(request).map_err(|error| BridgeError::Decode {
        message: format!("failed to encode tool arguments: {error}"),
    })?;
    let text = client.call_tool(GET_NEARBY_POIS, arguments).await?;
    serde_json::from_str(&text).map_err(|error| BridgeError::Decode {
        message: format!("invalid summary document: {error}"),
    })
}

fn extract_text(result: Value) -> Result<String, BridgeError> {
    let result: ToolResult =
        serde_json::from_value(result).map_err(|error| BridgeError::Decode {
            message: format!("malformed tool result: {error}"),
        })?;

    let text = result
        .content
        .into_iter()
        .map(|content| match content {
            ToolContent::Text { text } => text,
        })
        .next()
        .ok_or_else(|| BridgeError::Decode {
            message: "tool result carries no content".to_owned(),
        })?;

    if result.is_error == Some(true) {
        return Err(BridgeError::Tool { message: text });
    }
    Ok(text)
}
