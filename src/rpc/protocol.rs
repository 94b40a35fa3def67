//! Tipos de mensagem JSON-RPC 2.0.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::LoreError;

// ═══════════════════════════════════════════════════════════════════════════
// Códigos de erro
// ═══════════════════════════════════════════════════════════════════════════

/// JSON inválido.
pub const PARSE_ERROR: i32 = -32700;

/// Envelope JSON-RPC malformado.
pub const INVALID_REQUEST: i32 = -32600;

pub const METHOD_NOT_FOUND: i32 = -32601;

pub const INVALID_PARAMS: i32 = -32602;

pub const INTERNAL_ERROR: i32 = -32603;

/// Conversa ou mensagem referenciada não existe.
pub const NOT_FOUND: i32 = -32004;

// ═══════════════════════════════════════════════════════════════════════════
// Envelope
// ═══════════════════════════════════════════════════════════════════════════

/// ID da requisição (número ou string).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum JsonRpcId {
    Number(i64),
    String(String),
}

impl From<i64> for JsonRpcId {
    fn from(n: i64) -> Self {
        JsonRpcId::Number(n)
    }
}

impl From<&str> for JsonRpcId {
    fn from(s: &str) -> Self {
        JsonRpcId::String(s.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,

    /// Ausente em notificações.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonRpcId>,

    pub method: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, id: Option<JsonRpcId>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params: None,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,

    /// `null` quando o ID da requisição não pôde ser lido.
    pub id: Option<JsonRpcId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<JsonRpcId>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<JsonRpcId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid Request")
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(NOT_FOUND, message)
    }
}

impl From<LoreError> for JsonRpcError {
    fn from(err: LoreError) -> Self {
        match err {
            LoreError::NotFound(what) => Self::not_found(format!("Not found: {}", what)),
            other => Self::internal_error(other.to_string()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Payloads dos métodos
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "lorebank".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Resultado de `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub server_info: ServerInfo,
    pub methods: Vec<String>,
}

impl Default for InitializeResult {
    fn default() -> Self {
        Self {
            server_info: ServerInfo::default(),
            methods: [
                "initialize",
                "submit_query",
                "submit_feedback",
                "store_status",
                "learn_now",
                "shutdown",
            ]
            .iter()
            .map(|m| m.to_string())
            .collect(),
        }
    }
}

/// Parâmetros de `submit_query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitQueryParams {
    pub query: String,
    #[serde(default)]
    pub conversation_id: Option<i64>,
}

/// Resultado de `submit_query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitQueryResult {
    pub answer: String,
    pub needs_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

/// Parâmetros de `submit_feedback`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitFeedbackParams {
    pub message_id: i64,
    pub score: i32,
}
