//! Tipos de erro do lorebank.

use thiserror::Error;

/// Tipo de resultado padrão do lorebank.
pub type LoreResult<T> = Result<T, LoreError>;

/// Erros possíveis no store, nos gateways e no ledger.
#[derive(Error, Debug)]
pub enum LoreError {
    #[error("Erro de configuração: {0}")]
    Config(String),

    #[error("Erro de IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erro ao parsear TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Erro ao serializar TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Erro de JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Erro de banco de dados: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Erro no codec do índice: {0}")]
    IndexCodec(#[from] bincode::Error),

    #[cfg(feature = "http")]
    #[error("Erro HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway de embeddings falhou: {0}")]
    EmbeddingFailed(String),

    #[error("Gateway de raciocínio '{0}' falhou: {1}")]
    ReasoningFailed(String, String),

    #[error("Timeout aguardando o gateway de raciocínio '{0}'")]
    ReasoningTimeout(String),

    #[error(
        "Estado inconsistente do store: índice tem {index_len} vetores mas os metadados têm {metadata_len} entradas"
    )]
    InconsistentStoreState {
        index_len: usize,
        metadata_len: usize,
    },

    #[error("Dimensão de embedding divergente: esperado {expected}, recebido {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Não encontrado: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl LoreError {
    /// Cria um erro genérico.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Cria um erro de configuração.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Cria um erro de não encontrado.
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound(what.into())
    }

    /// Verdadeiro para falhas de um gateway externo (embedding ou raciocínio).
    ///
    /// São recuperáveis por item e nunca abortam um lote de aprendizado.
    pub fn is_gateway_failure(&self) -> bool {
        match self {
            Self::EmbeddingFailed(_) | Self::ReasoningFailed(..) | Self::ReasoningTimeout(_) => {
                true
            }
            #[cfg(feature = "http")]
            Self::Http(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_failure_classification() {
        assert!(LoreError::ReasoningTimeout("groq".into()).is_gateway_failure());
        assert!(LoreError::EmbeddingFailed("down".into()).is_gateway_failure());
        assert!(!LoreError::not_found("message 7").is_gateway_failure());
        assert!(!LoreError::InconsistentStoreState {
            index_len: 2,
            metadata_len: 1
        }
        .is_gateway_failure());
    }

    #[test]
    fn test_inconsistent_state_message() {
        let err = LoreError::InconsistentStoreState {
            index_len: 3,
            metadata_len: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("3 vectors"));
        assert!(msg.contains("2 entries"));
    }
}
