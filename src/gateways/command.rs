//! Gateway de raciocínio baseado em uma CLI externa.

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use super::base::{CompletionParams, ReasoningGateway};
use crate::types::config::ReasoningConfig;
use crate::{LoreError, LoreResult};

/// Executa `command [args..] <prompt>` e usa o stdout como completion.
///
/// Os parâmetros de amostragem vão pelas variáveis de ambiente
/// `LOREBANK_TEMPERATURE` e `LOREBANK_MAX_TOKENS`.
pub struct CommandReasoner {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandReasoner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Cria o reasoner a partir da configuração TOML.
    pub fn from_config(config: &ReasoningConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Verifica se o comando pode ser executado.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl ReasoningGateway for CommandReasoner {
    fn name(&self) -> &str {
        &self.command
    }

    async fn complete(&self, prompt: &str, params: &CompletionParams) -> LoreResult<String> {
        let result = tokio::time::timeout(
            self.timeout,
            Command::new(&self.command)
                .args(&self.args)
                .arg(prompt)
                .env("LOREBANK_TEMPERATURE", params.temperature.to_string())
                .env("LOREBANK_MAX_TOKENS", params.max_tokens.to_string())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => {
                if output.status.success() {
                    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(LoreError::ReasoningFailed(
                        self.command.clone(),
                        stderr.trim().to_string(),
                    ))
                }
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(
                LoreError::ReasoningFailed(self.command.clone(), "command not found".to_string()),
            ),
            Ok(Err(e)) => Err(LoreError::ReasoningFailed(
                self.command.clone(),
                e.to_string(),
            )),
            Err(_) => Err(LoreError::ReasoningTimeout(self.command.clone())),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stdout_becomes_completion() {
        let reasoner = CommandReasoner::new("echo");
        let out = reasoner
            .complete("B-trees keep keys sorted.", &CompletionParams::default())
            .await
            .unwrap();
        assert_eq!(out, "B-trees keep keys sorted.");
    }

    #[tokio::test]
    async fn test_missing_command_is_failure() {
        let reasoner = CommandReasoner::new("lorebank-definitely-not-installed");
        let err = reasoner
            .complete("hi", &CompletionParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LoreError::ReasoningFailed(..)));
        assert!(!reasoner.is_available().await);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failure() {
        let reasoner = CommandReasoner::new("sh").with_args(vec!["-c".into(), "exit 3".into()]);
        let err = reasoner
            .complete("ignored", &CompletionParams::default())
            .await
            .unwrap_err();
        assert!(err.is_gateway_failure());
    }

    #[tokio::test]
    async fn test_timeout() {
        let reasoner = CommandReasoner::new("sleep").with_timeout(Duration::from_millis(50));
        let err = reasoner
            .complete("5", &CompletionParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LoreError::ReasoningTimeout(_)));
    }
}
