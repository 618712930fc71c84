//! The stdio JSON-RPC 2.0 transport.
//!
//! One request per line, one single-line JSON response per request.
//! Two methods: `tools/list` advertises the catalog, `tools/call`
//! dispatches `{name, arguments, sessionId?}` through the registry.
//! Tool failures are *successful* RPC responses carrying the error
//! envelope -- only transport-level problems (bad JSON, unknown method)
//! become JSON-RPC errors.

use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use loreforge_tools::{EngineState, SessionContext, ToolRegistry};

/// JSON-RPC parse error.
const PARSE_ERROR: i64 = -32700;
/// JSON-RPC invalid request.
const INVALID_REQUEST: i64 = -32600;
/// JSON-RPC method not found.
const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC invalid params.
const INVALID_PARAMS: i64 = -32602;

/// An inbound JSON-RPC request.
#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<serde_json::Value>,
    method: String,
    #[serde(default)]
    params: Option<serde_json::Value>,
}

/// Parameters of a `tools/call`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Option<serde_json::Value>,
    #[serde(default)]
    session_id: Option<String>,
}

fn rpc_result(id: Option<serde_json::Value>, result: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
    .to_string()
}

fn rpc_error(id: Option<serde_json::Value>, code: i64, message: &str) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message},
    })
    .to_string()
}

/// Handle one request line and produce one response line.
pub async fn handle_line(
    registry: &ToolRegistry,
    state: &Arc<EngineState>,
    line: &str,
) -> String {
    let request: RpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return rpc_error(None, PARSE_ERROR, &format!("unparseable request: {e}")),
    };
    if request.jsonrpc.as_deref() != Some("2.0") {
        return rpc_error(request.id, INVALID_REQUEST, "jsonrpc must be \"2.0\"");
    }

    match request.method.as_str() {
        "tools/list" => {
            let tools = registry.list();
            match serde_json::to_value(&tools) {
                Ok(value) => rpc_result(request.id, serde_json::json!({"tools": value})),
                Err(e) => rpc_error(request.id, INVALID_REQUEST, &e.to_string()),
            }
        }
        "tools/call" => {
            let params: CallParams = match request
                .params
                .map(serde_json::from_value)
                .transpose()
            {
                Ok(Some(params)) => params,
                Ok(None) => {
                    return rpc_error(request.id, INVALID_PARAMS, "tools/call requires params");
                }
                Err(e) => {
                    return rpc_error(request.id, INVALID_PARAMS, &e.to_string());
                }
            };
            let session = params
                .session_id
                .map_or_else(SessionContext::default, SessionContext::new);
            let arguments = params
                .arguments
                .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
            let response = registry
                .invoke(&params.name, arguments, session, state.clone())
                .await;
            match serde_json::to_value(&response) {
                Ok(value) => rpc_result(request.id, value),
                Err(e) => rpc_error(request.id, INVALID_REQUEST, &e.to_string()),
            }
        }
        other => rpc_error(
            request.id,
            METHOD_NOT_FOUND,
            &format!("unknown method {other:?}"),
        ),
    }
}

/// Serve requests from stdin until it closes.
pub async fn run_stdio(
    registry: Arc<ToolRegistry>,
    state: Arc<EngineState>,
) -> std::io::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let response = handle_line(&registry, &state, trimmed).await;
        stdout.write_all(response.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    tracing::info!("stdin closed, transport shutting down");
    Ok(())
}
