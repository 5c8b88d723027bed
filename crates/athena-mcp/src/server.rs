//! MCP Server Core
//!
//! Routes JSON-RPC requests to the tool registry via a single
//! `McpServer::handle_request` dispatch method.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::context::ServerContext;
use crate::protocol::messages::{
    CallToolRequest, CallToolResult, InitializeRequest, InitializeResult, ListResourcesResult, ListToolsResult,
    ServerCapabilities, ServerInfo, ToolDescription, ToolResultContent,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};
use crate::registry::{self, ToolEntry};

pub struct McpServer {
    ctx: ServerContext,
    registry: Vec<ToolEntry>,
    initialized: bool,
}

impl McpServer {
    pub fn new(ctx: ServerContext) -> Self {
        Self { ctx, registry: registry::registry(), initialized: false }
    }

    /// Handle an incoming JSON-RPC request.
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("handling request: {}", request.method);

        if !self.initialized && request.method != "initialize" && request.method != "notifications/initialized" {
            warn!("rejecting '{}': server not initialized", request.method);
            return Some(JsonRpcResponse::error(request.id, JsonRpcError::server_not_initialized()));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "notifications/initialized" => return None,
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params).await,
            "resources/list" => Ok(serde_json::to_value(ListResourcesResult { resources: vec![] }).unwrap()),
            "ping" => Ok(serde_json::json!({})),
            method => {
                warn!("unknown method: {}", method);
                Err(JsonRpcError::method_not_found())
            }
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    async fn handle_initialize(&mut self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => InitializeRequest::default(),
        };

        let negotiated_version = if request.protocol_version.as_str() < MCP_VERSION {
            info!("client requested older protocol version {}, using it", request.protocol_version);
            request.protocol_version.clone()
        } else {
            MCP_VERSION.to_string()
        };

        self.initialized = true;
        info!("MCP session initialized with protocol version {}", negotiated_version);

        let result = InitializeResult {
            protocol_version: negotiated_version,
            server_info: ServerInfo { name: "athena".to_string(), version: env!("CARGO_PKG_VERSION").to_string() },
            capabilities: ServerCapabilities {
                tools: Some({
                    let mut map = HashMap::new();
                    map.insert("listChanged".to_string(), serde_json::json!(false));
                    map
                }),
                resources: None,
                prompts: None,
            },
            instructions: Some(
                "Athena is a persistent, multi-layer memory substrate. Ingest raw observations with \
                 ingest-event, recall across layers with recall, and run consolidate periodically to turn \
                 episodic events into durable semantic memories. Use verify-decision-feedback to record \
                 human or agent judgments about recalled memories.".to_string(),
            ),
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let tools = self
            .registry
            .iter()
            .map(|entry| ToolDescription {
                name: entry.name.to_string(),
                description: Some(entry.description.to_string()),
                input_schema: (entry.schema)(),
            })
            .collect();

        serde_json::to_value(ListToolsResult { tools }).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_call(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("missing tool call parameters")),
        };

        let Some(entry) = self.registry.iter().find(|e| e.name == request.name) else {
            return Err(JsonRpcError::method_not_found_with_message(&format!("unknown tool: {}", request.name)));
        };

        let outcome = (entry.execute)(&self.ctx, request.arguments).await;

        let call_result = match outcome {
            Ok(value) => CallToolResult {
                content: vec![ToolResultContent {
                    content_type: "text".to_string(),
                    text: serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
                }],
                is_error: Some(false),
            },
            Err(message) => CallToolResult {
                content: vec![ToolResultContent { content_type: "text".to_string(), text: serde_json::json!({ "error": message }).to_string() }],
                is_error: Some(true),
            },
        };

        serde_json::to_value(call_result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }
}
