//! Configuração do lorebank.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::LoreResult;

/// Configuração principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configurações gerais.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Configurações do knowledge store.
    #[serde(default)]
    pub store: StoreConfig,

    /// Política de resposta ao vivo.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Configurações do gateway de embeddings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Configurações do gateway de raciocínio.
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Configurações do pipeline de aprendizado recursivo.
    #[serde(default)]
    pub learning: LearningConfig,
}

/// Configurações gerais.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Nível de log (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Formato de log (text, json).
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Banco SQLite com as conversas e a fila de revisão.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            ledger_path: default_ledger_path(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from(".lorebank/ledger.db")
}

/// Configurações do knowledge store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Diretório com os artefatos de índice e metadados.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Dimensão dos embeddings, fixada na criação do store.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            dimension: default_dimension(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".lorebank/store")
}

fn default_dimension() -> usize {
    384
}

/// Política de resposta ao vivo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Distância L2 ao quadrado máxima para uma resposta armazenada contar como match.
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Resposta usada quando nada no store está próximo o suficiente.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            fallback_message: default_fallback_message(),
        }
    }
}

fn default_threshold() -> f32 {
    0.5
}

fn default_fallback_message() -> String {
    "Sorry, I can only answer questions related to SQL and NoSQL databases.".to_string()
}

/// Backend de embeddings a usar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// Embedder local por feature hashing (offline, determinístico).
    Hash,
    /// Endpoint `/embeddings` compatível com OpenAI.
    Http,
}

/// Configurações do gateway de embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: EmbeddingProvider,

    /// URL base da API compatível com OpenAI.
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Variável de ambiente com a API key.
    #[serde(default = "default_embedding_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Capacidade do cache LRU (0 desativa o cache).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            api_key_env: default_embedding_key_env(),
            timeout_secs: default_embedding_timeout(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_embedding_provider() -> EmbeddingProvider {
    EmbeddingProvider::Hash
}

fn default_embedding_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_cache_capacity() -> usize {
    1000
}

/// Backend de raciocínio a usar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningProvider {
    /// CLI externa; o prompt vai como último argumento.
    Command,
    /// Endpoint `/chat/completions` compatível com OpenAI.
    Http,
}

/// Configurações do gateway de raciocínio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default = "default_reasoning_provider")]
    pub provider: ReasoningProvider,

    /// Comando executado pelo provider `command`.
    #[serde(default = "default_reasoning_command")]
    pub command: String,

    /// Argumentos colocados antes do prompt.
    #[serde(default)]
    pub args: Vec<String>,

    /// URL base da API compatível com OpenAI.
    #[serde(default = "default_reasoning_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_reasoning_model")]
    pub model: String,

    /// Variável de ambiente com a API key.
    #[serde(default = "default_reasoning_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Timeout rígido por chamada (em segundos).
    #[serde(default = "default_reasoning_timeout")]
    pub timeout_secs: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: default_reasoning_provider(),
            command: default_reasoning_command(),
            args: Vec::new(),
            endpoint: default_reasoning_endpoint(),
            model: default_reasoning_model(),
            api_key_env: default_reasoning_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_reasoning_timeout(),
        }
    }
}

fn default_reasoning_provider() -> ReasoningProvider {
    ReasoningProvider::Http
}

fn default_reasoning_command() -> String {
    "llm".to_string()
}

fn default_reasoning_endpoint() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_reasoning_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_reasoning_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    300
}

fn default_reasoning_timeout() -> u64 {
    30
}

/// Configurações do pipeline de aprendizado recursivo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Executa o pipeline em background durante o serve.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Segundos entre execuções do pipeline.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Máximo de queries pendentes por execução.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Tema ao qual o assistente está restrito.
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Marcador que o serviço de raciocínio retorna para queries fora do tema.
    #[serde(default = "default_off_topic_sentinel")]
    pub off_topic_sentinel: String,

    /// Tentativas falhas antes de estacionar a query (0 = tenta para sempre).
    #[serde(default)]
    pub max_attempts: u32,

    /// Atraso base do backoff exponencial entre tentativas (0 = sem backoff).
    #[serde(default)]
    pub backoff_base_secs: u64,

    /// Limite superior do atraso de backoff.
    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: u64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval(),
            batch_size: default_batch_size(),
            domain: default_domain(),
            off_topic_sentinel: default_off_topic_sentinel(),
            max_attempts: 0,
            backoff_base_secs: 0,
            backoff_max_secs: default_backoff_max(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    300
}

fn default_batch_size() -> usize {
    5
}

fn default_domain() -> String {
    "SQL or NoSQL databases".to_string()
}

fn default_off_topic_sentinel() -> String {
    "OFF-TOPIC".to_string()
}

fn default_backoff_max() -> u64 {
    3600
}

impl Config {
    /// Carrega configuração de um arquivo TOML.
    pub fn load<P: AsRef<Path>>(path: P) -> LoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Salva configuração em um arquivo TOML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> LoreResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Cria configuração padrão.
    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig::default(),
            store: StoreConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            reasoning: ReasoningConfig::default(),
            learning: LearningConfig::default(),
        }
    }

    /// Tenta carregar configuração do diretório atual ou usa padrão.
    pub fn load_or_default() -> Self {
        Self::load("lorebank.toml").unwrap_or_else(|_| Self::default_config())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default_config();
        assert_eq!(config.retrieval.threshold, 0.5);
        assert_eq!(config.learning.batch_size, 5);
        assert_eq!(config.learning.max_attempts, 0);
        assert_eq!(config.reasoning.max_tokens, 300);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hash);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [learning]
            batch_size = 20
            max_attempts = 4

            [store]
            dimension = 64
            "#,
        )
        .unwrap();

        assert_eq!(config.learning.batch_size, 20);
        assert_eq!(config.learning.max_attempts, 4);
        assert_eq!(config.learning.off_topic_sentinel, "OFF-TOPIC");
        assert_eq!(config.store.dimension, 64);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lorebank.toml");

        let mut config = Config::default_config();
        config.reasoning.provider = ReasoningProvider::Command;
        config.reasoning.args = vec!["-m".to_string(), "mini".to_string()];
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.reasoning.provider, ReasoningProvider::Command);
        assert_eq!(loaded.reasoning.args, vec!["-m", "mini"]);
    }
}
