//! MCP Protocol Implementation
//!
//! JSON-RPC 2.0 over stdio for the Model Context Protocol. No wire
//! transport beyond stdio framing is in scope.

pub mod messages;
pub mod stdio;
pub mod types;
