//! Test harness
//!
//! One temp-database-backed [`McpServer`] per test, torn down with the
//! `TempDir` when the harness drops. Every call goes through the same
//! JSON-RPC `tools/call` path a real client would use, so these tests
//! exercise dispatch, schema validation, and the resource locks alongside
//! the underlying stores.

use athena_core::config::Config;
use athena_mcp::context::ServerContext;
use athena_mcp::protocol::types::{JsonRpcRequest, JsonRpcResponse};
use athena_mcp::server::McpServer;
use serde_json::Value;
use tempfile::TempDir;

pub struct TestHarness {
    _dir: TempDir,
    server: McpServer,
    next_id: i64,
}

impl TestHarness {
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let mut config = Config::default();
        config.database_path = Some(dir.path().join("athena.db"));
        config.embedding_dim = 32;

        let ctx = ServerContext::bootstrap(config).await.expect("bootstrap server context");
        let server = McpServer::new(ctx);

        let mut harness = Self { _dir: dir, server, next_id: 0 };
        let response = harness.request("initialize", None).await.expect("initialize response");
        assert!(response.error.is_none(), "initialize failed: {:?}", response.error);
        harness
    }

    fn next_request_id(&mut self) -> Value {
        self.next_id += 1;
        Value::from(self.next_id)
    }

    /// Send a raw JSON-RPC request and return the raw response, for tests
    /// that care about protocol-level framing rather than tool results.
    pub async fn request(&mut self, method: &str, params: Option<Value>) -> Option<JsonRpcResponse> {
        let id = self.next_request_id();
        let request = JsonRpcRequest { jsonrpc: "2.0".to_string(), id: Some(id), method: method.to_string(), params };
        self.server.handle_request(request).await
    }

    /// Call a registered tool and return its decoded JSON result, or the
    /// error message if the tool reported `isError`.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, String> {
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        let response = self.request("tools/call", Some(params)).await.expect("tools/call response");

        if let Some(error) = response.error {
            return Err(error.message);
        }

        let result = response.result.expect("successful response carries a result");
        let is_error = result.get("isError").and_then(|v| v.as_bool()).unwrap_or(false);
        let text = result["content"][0]["text"].as_str().unwrap_or_default();
        let body: Value = serde_json::from_str(text).unwrap_or(Value::Null);

        if is_error {
            Err(body.get("error").and_then(|v| v.as_str()).unwrap_or(text).to_string())
        } else {
            Ok(body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_initializes_and_lists_tools() {
        let mut harness = TestHarness::new().await;
        let response = harness.request("tools/list", None).await.unwrap();
        let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
        assert!(tools >= 10);
    }
}
