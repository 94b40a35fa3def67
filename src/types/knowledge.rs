//! Entradas de conhecimento e resultados de busca.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origem de uma entrada de conhecimento.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Carregada do corpus inicial.
    Original,
    /// Promovida pelo pipeline de aprendizado.
    Generated,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Original => write!(f, "original"),
            Provenance::Generated => write!(f, "generated"),
        }
    }
}

/// Par pergunta/resposta armazenado.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeEntry {
    pub prompt: String,
    pub completion: String,
    pub provenance: Provenance,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    pub fn new(
        prompt: impl Into<String>,
        completion: impl Into<String>,
        provenance: Provenance,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            completion: completion.into(),
            provenance,
            added_at: Utc::now(),
        }
    }
}

/// Resultado de uma chamada a `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// O prompt já estava armazenado; nada mudou.
    SkippedDuplicate,
}

/// Um resultado de busca por similaridade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub entry: KnowledgeEntry,
    /// Distância L2 ao quadrado até o embedding da query.
    pub distance: f32,
}

/// Contadores resumidos do store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStats {
    pub entries: usize,
    pub dimension: usize,
    pub original: usize,
    pub generated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provenance_serializes_lowercase() {
        let entry = KnowledgeEntry::new("q", "a", Provenance::Generated);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"provenance\":\"generated\""));
    }

    #[test]
    fn test_missing_added_at_defaults() {
        let entry: KnowledgeEntry = serde_json::from_str(
            r#"{"prompt":"What is a B-tree?","completion":"A tree.","provenance":"original"}"#,
        )
        .unwrap();
        assert_eq!(entry.provenance, Provenance::Original);
    }
}
