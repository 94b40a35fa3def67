//! Cache LRU para vetores de embedding.
//!
//! Calcular o embedding do mesmo texto duas vezes (pergunta repetida,
//! nova checagem de uma query pendente pelo pipeline) é comum; este cache
//! guarda vetores recentes para que o gateway seja chamado uma vez por
//! texto distinto.

mod lru;

pub use lru::{CacheStats, EmbeddingCache};
