//! Caminho de resposta ao vivo: busca no store e política de responder ou marcar.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ledger::TranscriptLedger;
use crate::store::{truncate, KnowledgeStore};
use crate::types::config::RetrievalConfig;
use crate::{LoreError, LoreResult};

/// Número de vizinhos consultados no caminho ao vivo.
const LIVE_K: usize = 1;

/// Resposta a uma query enviada.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub text: String,
    pub needs_review: bool,
    /// Distância ao quadrado da entrada encontrada, quando houve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,
    /// ID da mensagem do assistente registrada (alvo do feedback).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
}

/// Responde queries a partir do knowledge store e marca misses para revisão.
///
/// Nunca altera o store. Falhas de embedding e do ledger degradam para a
/// resposta padrão.
pub struct RetrievalService {
    store: Arc<KnowledgeStore>,
    ledger: Arc<TranscriptLedger>,
    threshold: f32,
    fallback: String,
}

impl RetrievalService {
    pub fn new(
        store: Arc<KnowledgeStore>,
        ledger: Arc<TranscriptLedger>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            threshold: config.threshold,
            fallback: config.fallback_message.clone(),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Responde `query`, registrando os dois turnos na conversa indicada (uma
    /// nova é aberta quando `conversation_id` é `None`).
    ///
    /// Só um `conversation_id` desconhecido é erro. Falhas do ledger são
    /// logadas e a resposta é retornada mesmo assim, sem os IDs que não puderam
    /// ser registrados.
    pub async fn answer(&self, query: &str, conversation_id: Option<i64>) -> LoreResult<Answer> {
        let conversation_id = match conversation_id {
            Some(id) => match self.ledger.conversation(id).await {
                Ok(conversation) => Some(conversation.id),
                Err(e @ LoreError::NotFound(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, conversation_id = id, "Conversation lookup failed");
                    None
                }
            },
            None => match self.ledger.create_conversation(None).await {
                Ok(conversation) => Some(conversation.id),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not open a conversation");
                    None
                }
            },
        };

        if let Some(id) = conversation_id {
            if let Err(e) = self.ledger.append_message(id, true, query, false).await {
                tracing::warn!(error = %e, conversation_id = id, "Could not record user message");
            }
        }

        let hit = match self.store.search(query, LIVE_K, self.threshold).await {
            Ok(mut results) => {
                if results.is_empty() {
                    None
                } else {
                    Some(results.remove(0))
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, query = %truncate(query), "Live search failed, using fallback");
                None
            }
        };

        let (text, needs_review, distance) = match hit {
            Some(result) => {
                tracing::debug!(
                    query = %truncate(query),
                    distance = result.distance,
                    "Answered from knowledge store"
                );
                (result.entry.completion, false, Some(result.distance))
            }
            None => {
                match self.ledger.enqueue_pending(query, conversation_id).await {
                    Ok(queued) => tracing::info!(
                        query = %truncate(query),
                        queued = queued.is_some(),
                        "No stored answer, flagged for review"
                    ),
                    Err(e) => tracing::warn!(
                        error = %e,
                        query = %truncate(query),
                        "No stored answer and the review queue is unavailable"
                    ),
                }
                (self.fallback.clone(), true, None)
            }
        };

        let message_id = match conversation_id {
            Some(id) => match self.ledger.append_message(id, false, &text, needs_review).await {
                Ok(message) => Some(message.id),
                Err(e) => {
                    tracing::warn!(error = %e, conversation_id = id, "Could not record reply");
                    None
                }
            },
            None => None,
        };

        Ok(Answer {
            text,
            needs_review,
            distance,
            conversation_id,
            message_id,
        })
    }

    /// Registra uma nota de feedback em uma mensagem do assistente.
    pub async fn submit_feedback(&self, message_id: i64, score: i32) -> LoreResult<()> {
        self.ledger.record_feedback(message_id, score).await
    }
}
