//! Implementação dos métodos do servidor JSON-RPC.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::protocol::{
    InitializeResult, JsonRpcError, SubmitFeedbackParams, SubmitQueryParams, SubmitQueryResult,
};
use crate::app::App;

type HandlerResult = Result<Value, JsonRpcError>;

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
}

fn to_value<T: serde::Serialize>(value: &T) -> HandlerResult {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

/// Adaptador sem estado de parâmetros JSON para chamadas ao [`App`].
pub struct RpcHandler {
    app: Arc<App>,
}

impl RpcHandler {
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    pub fn initialize(&self) -> HandlerResult {
        to_value(&InitializeResult::default())
    }

    pub async fn submit_query(&self, params: Option<Value>) -> HandlerResult {
        let params: SubmitQueryParams = parse_params(params)?;
        if params.query.trim().is_empty() {
            return Err(JsonRpcError::invalid_params("query must not be empty"));
        }

        let answer = self
            .app
            .retrieval
            .answer(&params.query, params.conversation_id)
            .await?;

        to_value(&SubmitQueryResult {
            answer: answer.text,
            needs_review: answer.needs_review,
            conversation_id: answer.conversation_id,
            message_id: answer.message_id,
            distance: answer.distance,
        })
    }

    pub async fn submit_feedback(&self, params: Option<Value>) -> HandlerResult {
        let params: SubmitFeedbackParams = parse_params(params)?;
        self.app
            .retrieval
            .submit_feedback(params.message_id, params.score)
            .await?;
        Ok(json!({ "ack": true }))
    }

    pub async fn store_status(&self) -> HandlerResult {
        to_value(&self.app.status().await?)
    }

    pub async fn learn_now(&self) -> HandlerResult {
        to_value(&self.app.learner.run_once().await?)
    }
}
