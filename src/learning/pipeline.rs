//! Um lote do pipeline de aprendizado recursivo.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::gateways::{CompletionParams, ReasoningGateway};
use crate::ledger::TranscriptLedger;
use crate::store::{truncate, KnowledgeStore};
use crate::types::config::{LearningConfig, ReasoningConfig};
use crate::types::knowledge::Provenance;
use crate::types::transcript::{PendingQuery, PendingStatus};
use crate::{LoreError, LoreResult};

/// Contadores de uma execução do pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningReport {
    pub examined: usize,
    pub promoted: usize,
    pub dropped: usize,
    pub already_known: usize,
    pub failed: usize,
    /// Parte de `failed` que atingiu `max_attempts` e saiu da fila.
    pub parked: usize,
}

enum Verdict {
    Promoted,
    Dropped,
}

/// Esvazia as queries marcadas, pede ao gateway de raciocínio que classifique
/// e responda cada uma, e promove as respostas dentro do tema para o store.
pub struct RecursiveLearner {
    store: Arc<KnowledgeStore>,
    ledger: Arc<TranscriptLedger>,
    reasoner: Arc<dyn ReasoningGateway>,
    config: LearningConfig,
    params: CompletionParams,
    call_timeout: Duration,
    running: Mutex<()>,
}

impl RecursiveLearner {
    pub fn new(
        store: Arc<KnowledgeStore>,
        ledger: Arc<TranscriptLedger>,
        reasoner: Arc<dyn ReasoningGateway>,
        config: LearningConfig,
        reasoning: &ReasoningConfig,
    ) -> LoreResult<Self> {
        // Sentinela vazia casaria com qualquer resposta.
        if config.off_topic_sentinel.trim().is_empty() {
            return Err(LoreError::config("learning.off_topic_sentinel must not be empty"));
        }

        Ok(Self {
            store,
            ledger,
            reasoner,
            config,
            params: CompletionParams {
                temperature: reasoning.temperature,
                max_tokens: reasoning.max_tokens,
            },
            call_timeout: Duration::from_secs(reasoning.timeout_secs),
            running: Mutex::new(()),
        })
    }

    /// Sobrescreve o timeout por chamada.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Prompt combinado de classificação e resposta para uma query.
    pub fn build_prompt(&self, query: &str) -> String {
        format!(
            "Is '{}' related to {}? If yes, provide an accurate, concise response. If no, respond with '{}'.",
            query, self.config.domain, self.config.off_topic_sentinel
        )
    }

    /// Verifica a sentinela sem diferenciar maiúsculas.
    pub fn is_off_topic(&self, response: &str) -> bool {
        response
            .to_uppercase()
            .contains(&self.config.off_topic_sentinel.to_uppercase())
    }

    /// Processa até `batch_size` queries elegíveis.
    ///
    /// Falhas de gateway e do store por item são contadas, nunca retornadas.
    /// Só falhas do ledger abortam a execução. Chamadas concorrentes rodam uma
    /// após a outra.
    pub async fn run_once(&self) -> LoreResult<LearningReport> {
        let _running = self.running.lock().await;
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("learning_run", run_id = %run_id);

        self.run_batch().instrument(span).await
    }

    async fn run_batch(&self) -> LoreResult<LearningReport> {
        let due = self
            .ledger
            .due_pending(self.config.batch_size, Utc::now())
            .await?;
        let mut report = LearningReport::default();

        if due.is_empty() {
            tracing::debug!("No pending queries");
            return Ok(report);
        }

        for item in due {
            report.examined += 1;

            if self.store.contains_prompt(&item.text).await {
                tracing::debug!(query = %truncate(&item.text), "Already known, resolving");
                self.ledger
                    .resolve_pending(item.id, PendingStatus::Promoted)
                    .await?;
                report.already_known += 1;
                continue;
            }

            match self.learn(&item).await {
                Ok(Verdict::Promoted) => {
                    self.ledger
                        .resolve_pending(item.id, PendingStatus::Promoted)
                        .await?;
                    report.promoted += 1;
                }
                Ok(Verdict::Dropped) => {
                    self.ledger
                        .resolve_pending(item.id, PendingStatus::Dropped)
                        .await?;
                    report.dropped += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    if self.record_failure(&item, &e).await? {
                        report.parked += 1;
                    }
                }
            }
        }

        tracing::info!(
            examined = report.examined,
            promoted = report.promoted,
            dropped = report.dropped,
            already_known = report.already_known,
            failed = report.failed,
            parked = report.parked,
            "Learning run finished"
        );
        Ok(report)
    }

    async fn learn(&self, item: &PendingQuery) -> LoreResult<Verdict> {
        let prompt = self.build_prompt(&item.text);
        let name = self.reasoner.name().to_string();

        let response = tokio::time::timeout(
            self.call_timeout,
            self.reasoner.complete(&prompt, &self.params),
        )
        .await
        .map_err(|_| LoreError::ReasoningTimeout(name.clone()))??;

        let response = response.trim();
        if response.is_empty() {
            return Err(LoreError::ReasoningFailed(name, "empty response".into()));
        }

        if self.is_off_topic(response) {
            tracing::info!(query = %truncate(&item.text), "Off-topic, dropped");
            return Ok(Verdict::Dropped);
        }

        self.store
            .add(&item.text, response, Provenance::Generated)
            .await?;
        tracing::info!(query = %truncate(&item.text), "Promoted generated answer");
        Ok(Verdict::Promoted)
    }

    /// Retorna true quando a query foi estacionada.
    async fn record_failure(&self, item: &PendingQuery, error: &LoreError) -> LoreResult<bool> {
        let attempts = item.attempts + 1;
        let message = error.to_string();

        if self.config.max_attempts > 0 && attempts >= self.config.max_attempts {
            self.ledger.record_failure(item.id, &message, None).await?;
            self.ledger
                .resolve_pending(item.id, PendingStatus::Parked)
                .await?;
            tracing::warn!(
                query = %truncate(&item.text),
                attempts,
                error = %message,
                "Giving up on query, parked"
            );
            return Ok(true);
        }

        let next_attempt_at = backoff_delay(&self.config, attempts)
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);
        self.ledger
            .record_failure(item.id, &message, next_attempt_at)
            .await?;
        tracing::warn!(
            query = %truncate(&item.text),
            attempts,
            error = %message,
            "Learning attempt failed, will retry"
        );
        Ok(false)
    }
}

/// Atraso até a próxima tentativa após `attempts` falhas, ou `None` quando
/// o backoff está desativado.
pub fn backoff_delay(config: &LearningConfig, attempts: u32) -> Option<Duration> {
    if config.backoff_base_secs == 0 {
        return None;
    }
    let factor = 1u64
        .checked_shl(attempts.saturating_sub(1))
        .unwrap_or(u64::MAX);
    let secs = config
        .backoff_base_secs
        .saturating_mul(factor)
        .min(config.backoff_max_secs);
    Some(Duration::from_secs(secs))
}
