//! Gateways HTTP compatíveis com OpenAI (`/embeddings` e `/chat/completions`).
//!
//! Funciona com OpenAI, OpenRouter, Groq e qualquer servidor com o mesmo
//! formato. A API key é lida da variável de ambiente indicada na
//! configuração; a falta da chave aparece como falha do gateway na primeira
//! chamada, não na inicialização.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::base::{CompletionParams, EmbeddingGateway, ReasoningGateway};
use crate::types::config::{EmbeddingConfig, ReasoningConfig};
use crate::{LoreError, LoreResult};

fn build_client(timeout_secs: u64) -> LoreResult<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Gateway de embeddings para um endpoint `/embeddings` compatível com OpenAI.
pub struct HttpEmbedder {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn from_config(config: &EmbeddingConfig, dimension: usize) -> LoreResult<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: join_url(&config.endpoint, "embeddings"),
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env).ok(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingGateway for HttpEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> LoreResult<Vec<f32>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LoreError::EmbeddingFailed("API key not configured".to_string()))?;

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: vec![text],
            })
            .send()
            .await
            .map_err(|e| LoreError::EmbeddingFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LoreError::EmbeddingFailed(format!("{}: {}", status, body)));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LoreError::EmbeddingFailed(format!("malformed response: {}", e)))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LoreError::EmbeddingFailed("no embedding in response".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Gateway de raciocínio para um endpoint `/chat/completions` compatível com OpenAI.
pub struct HttpReasoner {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpReasoner {
    pub fn from_config(config: &ReasoningConfig) -> LoreResult<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: join_url(&config.endpoint, "chat/completions"),
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env).ok(),
        })
    }

    fn fail(&self, msg: impl Into<String>) -> LoreError {
        LoreError::ReasoningFailed(self.model.clone(), msg.into())
    }
}

#[async_trait]
impl ReasoningGateway for HttpReasoner {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, params: &CompletionParams) -> LoreResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| self.fail("API key not configured"))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LoreError::ReasoningTimeout(self.model.clone())
                } else {
                    self.fail(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(self.fail(format!("{}: {}", status, body)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| self.fail(format!("malformed response: {}", e)))?;

        parse_chat_content(parsed).ok_or_else(|| self.fail("response has no content"))
    }
}

fn parse_chat_content(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://api.groq.com/openai/v1/", "chat/completions"),
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert_eq!(
            join_url("http://localhost:8080/v1", "embeddings"),
            "http://localhost:8080/v1/embeddings"
        );
    }

    #[test]
    fn test_parse_chat_content() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  An index.  "}}]}"#,
        )
        .unwrap();
        assert_eq!(parse_chat_content(response).as_deref(), Some("An index."));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(parse_chat_content(empty).is_none());

        let blank: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"   "}}]}"#).unwrap();
        assert!(parse_chat_content(blank).is_none());
    }

    #[tokio::test]
    async fn test_missing_key_is_gateway_failure() {
        let mut config = ReasoningConfig::default();
        config.api_key_env = "LOREBANK_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        let reasoner = HttpReasoner::from_config(&config).unwrap();

        let err = reasoner
            .complete("hi", &CompletionParams::default())
            .await
            .unwrap_err();
        assert!(err.is_gateway_failure());
    }
}
