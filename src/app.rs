//! Raiz de composição.
//!
//! Cria todos os componentes a partir de [`Config`] uma única vez e
//! entrega handles compartilhados. Nada no crate usa instância global.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::gateways::{
    embedder_from_config, reasoner_from_config, CachedEmbedder, EmbeddingGateway,
    ReasoningGateway,
};
use crate::learning::{RecursiveLearner, Scheduler};
use crate::ledger::TranscriptLedger;
use crate::retrieval::RetrievalService;
use crate::store::KnowledgeStore;
use crate::types::config::Config;
use crate::types::knowledge::StoreStats;
use crate::types::transcript::QueueStats;
use crate::LoreResult;

/// Snapshot do serviço inteiro para as saídas de `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub store: StoreStats,
    pub queue: QueueStats,
    pub threshold: f32,
    pub embedding_model: String,
    pub reasoning_gateway: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_cache: Option<CacheStats>,
}

/// Todos os componentes de longa duração, conectados.
pub struct App {
    pub config: Config,
    pub store: Arc<KnowledgeStore>,
    pub ledger: Arc<TranscriptLedger>,
    pub retrieval: Arc<RetrievalService>,
    pub learner: Arc<RecursiveLearner>,
    embedder: Arc<dyn EmbeddingGateway>,
    reasoner: Arc<dyn ReasoningGateway>,
    cache: Option<Arc<CachedEmbedder>>,
}

impl App {
    /// Cria os gateways a partir da configuração e abre o store e o ledger
    /// em disco.
    pub async fn from_config(config: Config) -> LoreResult<Self> {
        let base = embedder_from_config(&config.embedding, config.store.dimension)?;
        let reasoner = reasoner_from_config(&config.reasoning)?;
        let ledger = Arc::new(TranscriptLedger::open(&config.general.ledger_path)?);

        let cache = if config.embedding.cache_capacity > 0 {
            Some(Arc::new(CachedEmbedder::new(
                base.clone(),
                config.embedding.cache_capacity,
            )))
        } else {
            None
        };
        let embedder: Arc<dyn EmbeddingGateway> = match &cache {
            Some(cached) => cached.clone(),
            None => base,
        };

        let mut app = Self::with_gateways(config, embedder, reasoner, ledger).await?;
        app.cache = cache;
        Ok(app)
    }

    /// Conecta os componentes em torno de gateways e ledger fornecidos por quem chama.
    pub async fn with_gateways(
        config: Config,
        embedder: Arc<dyn EmbeddingGateway>,
        reasoner: Arc<dyn ReasoningGateway>,
        ledger: Arc<TranscriptLedger>,
    ) -> LoreResult<Self> {
        let store = Arc::new(
            KnowledgeStore::open(
                &config.store.data_dir,
                config.store.dimension,
                embedder.clone(),
            )
            .await?,
        );

        let retrieval = Arc::new(RetrievalService::new(
            store.clone(),
            ledger.clone(),
            &config.retrieval,
        ));
        let learner = Arc::new(RecursiveLearner::new(
            store.clone(),
            ledger.clone(),
            reasoner.clone(),
            config.learning.clone(),
            &config.reasoning,
        )?);

        tracing::debug!(
            embedding_model = embedder.model(),
            reasoning_gateway = reasoner.name(),
            "Components wired"
        );

        Ok(Self {
            config,
            store,
            ledger,
            retrieval,
            learner,
            embedder,
            reasoner,
            cache: None,
        })
    }

    /// Scheduler em background do pipeline de aprendizado, se habilitado.
    pub fn scheduler(&self) -> Option<Scheduler> {
        if !self.config.learning.enabled {
            return None;
        }
        let interval = Duration::from_secs(self.config.learning.interval_secs.max(1));
        Some(Scheduler::new(self.learner.clone(), interval))
    }

    pub async fn status(&self) -> LoreResult<StatusReport> {
        let embedding_cache = match &self.cache {
            Some(cache) => Some(cache.stats().await),
            None => None,
        };

        Ok(StatusReport {
            store: self.store.stats().await,
            queue: self.ledger.queue_stats().await?,
            threshold: self.retrieval.threshold(),
            embedding_model: self.embedder.model().to_string(),
            reasoning_gateway: self.reasoner.name().to_string(),
            embedding_cache,
        })
    }
}
