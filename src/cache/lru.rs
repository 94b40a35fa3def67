//! Cache LRU para embeddings calculados.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Estatísticas do cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Número atual de entradas.
    pub size: usize,

    /// Capacidade máxima.
    pub capacity: usize,

    /// Cache hits.
    pub hits: u64,

    /// Cache misses.
    pub misses: u64,
}

impl CacheStats {
    /// Fração das buscas que acertaram.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Cache LRU de vetores de embedding.
///
/// As chaves são digests SHA-256 do nome do modelo mais o texto exato;
/// dois backends nunca compartilham vetores e diferenças de espaço em
/// branco continuam distintas.
pub struct EmbeddingCache {
    cache: LruCache<String, Vec<f32>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    /// Cria um cache com no máximo `capacity` vetores.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(cap),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Gera a chave de cache para um texto em um dado modelo.
    pub fn cache_key(model: &str, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Busca um vetor, atualizando sua recência.
    pub fn get(&mut self, key: &str) -> Option<&Vec<f32>> {
        if self.cache.contains(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.cache.get(key)
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    pub fn insert(&mut self, key: String, vector: Vec<f32>) {
        self.cache.put(key, vector);
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Retorna estatísticas do cache.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.cache.len(),
            capacity: self.cache.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
