//! Wire types for the skill resource host.
//!
//! JSON-RPC 2.0, one JSON object per line on stdin/stdout.
//!
//! Message kinds:
//! - `JsonRpcRequest`: client → host call (a missing `id` makes it a notification)
//! - `JsonRpcResponse`: host → client result or error
//! - `JsonRpcNotification`: host → client server-push

use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────────────

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const MAX_LINE_BYTES: usize = 1_048_576; // 1 MB

// ── Methods ──────────────────────────────────────────────────────────────────

pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const PING: &str = "ping";
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
    pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
    pub const RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";
}

pub mod notifications {
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const RESOURCE_UPDATED: &str = "notifications/resources/updated";
    pub const RESOURCE_REMOVED: &str = "notifications/resources/removed";
    pub const RESOURCE_LIST_CHANGED: &str = "notifications/resources/list_changed";
}

// ── Error codes ──────────────────────────────────────────────────────────────

pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const RESOURCE_NOT_FOUND: i64 = -32002;
}

// ── JSON-RPC 2.0 ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: Some(serde_json::Value::Number(id.into())),
            method: method.into(),
            params,
        }
    }

    /// Requests without an `id` expect no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Deserialize `params` into `T`, treating absent params as `null`.
    pub fn parse_params<T: serde::de::DeserializeOwned>(&self) -> Result<T, JsonRpcError> {
        let params = self.params.clone().unwrap_or(serde_json::Value::Null);
        serde_json::from_value(params)
            .map_err(|e| JsonRpcError::new(error_codes::INVALID_PARAMS, format!("invalid params: {e}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn ok(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: serde_json::Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(error_codes::METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    pub fn resource_not_found(uri: &str) -> Self {
        Self {
            code: error_codes::RESOURCE_NOT_FOUND,
            message: format!("resource not found: {uri}"),
            data: Some(serde_json::json!({ "uri": uri })),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            method: method.into(),
            params,
        }
    }

    pub fn resource_updated(uri: &str) -> Self {
        Self::new(
            notifications::RESOURCE_UPDATED,
            Some(serde_json::json!({ "uri": uri })),
        )
    }

    pub fn resource_removed(uri: &str) -> Self {
        Self::new(
            notifications::RESOURCE_REMOVED,
            Some(serde_json::json!({ "uri": uri })),
        )
    }

    pub fn resource_list_changed() -> Self {
        Self::new(notifications::RESOURCE_LIST_CHANGED, None)
    }
}

// ── Handshake ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

impl InitializeResult {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: ServerCapabilities {
                resources: ResourcesCapability {
                    subscribe: true,
                    list_changed: true,
                },
            },
            server_info: ServerInfo {
                name: name.into(),
                version: Some(version.into()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    pub resources: ResourcesCapability,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    #[serde(default)]
    pub subscribe: bool,
    #[serde(default)]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

// ── Resource params ──────────────────────────────────────────────────────────

/// Params of `resources/read`, `resources/subscribe`, and `resources/unsubscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceParams {
    pub uri: String,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn request_without_id_is_notification() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(req.is_notification());
        assert!(!JsonRpcRequest::new(1, methods::PING, None).is_notification());
    }

    #[test]
    fn resource_params_parse_or_report_invalid() {
        let req = JsonRpcRequest::new(
            7,
            methods::RESOURCES_SUBSCRIBE,
            Some(json!({ "uri": "skill://pdf" })),
        );
        let params: ResourceParams = req.parse_params().unwrap();
        assert_eq!(params.uri, "skill://pdf");

        let bad = JsonRpcRequest::new(8, methods::RESOURCES_SUBSCRIBE, None);
        let err = bad.parse_params::<ResourceParams>().unwrap_err();
        assert_eq!(err.code, error_codes::INVALID_PARAMS);
    }

    #[test]
    fn error_response_omits_result() {
        let resp = JsonRpcResponse::err(json!(3), JsonRpcError::resource_not_found("skill://x"));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["error"]["code"], -32002);
        assert_eq!(value["error"]["data"]["uri"], "skill://x");
        assert!(value.get("result").is_none());
    }

    #[test]
    fn notifications_have_no_id() {
        let value = serde_json::to_value(JsonRpcNotification::resource_updated("skill://pdf/"))
            .unwrap();
        assert_eq!(value, json!({
            "jsonrpc": "2.0",
            "method": "notifications/resources/updated",
            "params": { "uri": "skill://pdf/" }
        }));
        let list = serde_json::to_value(JsonRpcNotification::resource_list_changed()).unwrap();
        assert!(list.get("params").is_none());
    }

    #[test]
    fn initialize_advertises_subscriptions() {
        let value = serde_json::to_value(InitializeResult::new("skillport", "0.3.0")).unwrap();
        assert_eq!(value["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(value["capabilities"]["resources"]["subscribe"], true);
        assert_eq!(value["capabilities"]["resources"]["listChanged"], true);
        assert_eq!(value["serverInfo"]["name"], "skillport");
    }
}
