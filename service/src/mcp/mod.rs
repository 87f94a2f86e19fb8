//! Tool protocol: shared JSON-RPC message types, the stdio server, and the
//! subprocess client bridge.
//!
//! The contract is deliberately narrow: `initialize` must precede any tool
//! call, `tools/list` enumerates capabilities, `tools/call` executes one
//! operation, and the bridge runs one call per process lifetime.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{BridgeError, ServiceLaunch, ToolServiceClient, call_get_nearby_pois};
pub use server::{GET_NEARBY_POIS, McpError, PoiToolServer};
