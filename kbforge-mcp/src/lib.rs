//! ABOUTME: JSON-RPC 2.0 MCP tool surface over the global and per-KB endpoints
//! ABOUTME: Translates tool calls into registry/engine operations and back

pub mod args;
pub mod dispatcher;
pub mod protocol;
pub mod tools;

pub use dispatcher::Dispatcher;
pub use protocol::{parse_request, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
