//! Loop do servidor JSON-RPC.

use std::io::{BufRead, Write};
use std::sync::Arc;

use serde_json::json;

use super::handlers::RpcHandler;
use super::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use super::transport::{Incoming, LineTransport};
use crate::app::App;
use crate::LoreResult;

/// Atende um cliente via transporte por linhas até EOF ou `shutdown`.
pub struct RpcServer<R, W> {
    transport: LineTransport<R, W>,
    handler: RpcHandler,
    initialized: bool,
}

impl<R: BufRead, W: Write> RpcServer<R, W> {
    pub fn new(app: Arc<App>, transport: LineTransport<R, W>) -> Self {
        Self {
            transport,
            handler: RpcHandler::new(app),
            initialized: false,
        }
    }

    /// Loop principal. Retorna quando o cliente desconecta ou pede shutdown.
    pub async fn run(&mut self) -> LoreResult<()> {
        tracing::info!("lorebank RPC server starting");

        loop {
            let request = match self.transport.read_message()? {
                Incoming::Request(request) => request,
                Incoming::Malformed(_) => {
                    self.transport
                        .write_response(&JsonRpcResponse::error(None, JsonRpcError::parse_error()))?;
                    continue;
                }
                Incoming::Eof => {
                    tracing::info!("Client disconnected");
                    break;
                }
            };

            let is_notification = request.is_notification();
            let is_shutdown = request.method == "shutdown";

            let response = self.handle_request(request).await;

            // Notificações não recebem resposta.
            if !is_notification {
                self.transport.write_response(&response)?;
            }

            if is_shutdown {
                break;
            }
        }

        tracing::info!("lorebank RPC server stopped");
        Ok(())
    }

    /// Despacha uma requisição.
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!(method = %request.method, "Handling request");

        if request.jsonrpc != "2.0" {
            return JsonRpcResponse::error(request.id, JsonRpcError::invalid_request());
        }

        let result = match request.method.as_str() {
            "initialize" => {
                self.initialized = true;
                tracing::info!("Client initialized");
                self.handler.initialize()
            }
            "shutdown" => {
                tracing::info!("Client requested shutdown");
                self.initialized = false;
                Ok(json!(null))
            }
            "submit_query" => self.handler.submit_query(request.params).await,
            "submit_feedback" => self.handler.submit_feedback(request.params).await,
            "store_status" => self.handler.store_status().await,
            "learn_now" => self.handler.learn_now().await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(error) => {
                tracing::warn!(code = error.code, message = %error.message, "Request failed");
                JsonRpcResponse::error(request.id, error)
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn into_transport(self) -> LineTransport<R, W> {
        self.transport
    }
}
