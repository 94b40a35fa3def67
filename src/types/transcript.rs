//! Registros de conversa e da fila de revisão.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ciclo de vida de uma query aguardando revisão.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    /// Aguardando o pipeline de aprendizado.
    Unresolved,
    /// Uma resposta foi adicionada ao knowledge store.
    Promoted,
    /// Classificada como fora do tema e descartada.
    Dropped,
    /// Abandonada após tentativas falhas demais.
    Parked,
}

impl std::fmt::Display for PendingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingStatus::Unresolved => write!(f, "unresolved"),
            PendingStatus::Promoted => write!(f, "promoted"),
            PendingStatus::Dropped => write!(f, "dropped"),
            PendingStatus::Parked => write!(f, "parked"),
        }
    }
}

impl PendingStatus {
    pub(crate) fn from_str(s: &str) -> Self {
        match s {
            "promoted" => PendingStatus::Promoted,
            "dropped" => PendingStatus::Dropped,
            "parked" => PendingStatus::Parked,
            _ => PendingStatus::Unresolved,
        }
    }
}

/// Pergunta do usuário que não achou resposta no store e aguarda o pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingQuery {
    pub id: i64,
    pub text: String,
    pub conversation_id: Option<i64>,
    pub first_seen_at: DateTime<Utc>,
    pub status: PendingStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Uma conversa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Um turno de uma conversa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub is_user: bool,
    pub content: String,
    pub needs_review: bool,
    pub feedback: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Contagem de linhas da fila de revisão por status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueStats {
    pub unresolved: usize,
    pub promoted: usize,
    pub dropped: usize,
    pub parked: usize,
}
