//! MCP wire protocol: JSON-RPC types, frame decoding and method routing.

pub mod frame;
pub mod jsonrpc;
mod service;

pub use frame::{Inbound, MalformedFrame, MalformedKind, decode};
pub use jsonrpc::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
};
pub use service::{McpService, SUPPORTED_PROTOCOL_VERSIONS, ServerInfo, encode};
