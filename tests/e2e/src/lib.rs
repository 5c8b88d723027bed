//! End-to-end test support for Athena
//!
//! Everything under `tests/*.rs` drives the server the same way a real MCP
//! client would: JSON-RPC requests through `McpServer::handle_request`,
//! never the `athena-core` stores directly. [`harness::TestHarness`] owns
//! the temp database and the initialized server; [`mocks::fixtures`] seeds
//! it with realistic memories.

pub mod harness;
pub mod mocks;
