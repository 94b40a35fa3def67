//! Decorator de gateway de embeddings sobre [`EmbeddingCache`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::base::EmbeddingGateway;
use crate::cache::{CacheStats, EmbeddingCache};
use crate::LoreResult;

/// Envolve outro gateway de embeddings e memoriza seus vetores.
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingGateway>,
    cache: Mutex<EmbeddingCache>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingGateway>, capacity: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(EmbeddingCache::new(capacity)),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }
}

#[async_trait]
impl EmbeddingGateway for CachedEmbedder {
    fn model(&self) -> &str {
        self.inner.model()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, text: &str) -> LoreResult<Vec<f32>> {
        let key = EmbeddingCache::cache_key(self.inner.model(), text);

        if let Some(hit) = self.cache.lock().await.get(&key) {
            return Ok(hit.clone());
        }

        // O lock não fica preso durante a chamada ao gateway.
        let vector = self.inner.embed(text).await?;
        self.cache.lock().await.insert(key, vector.clone());
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingGateway for CountingEmbedder {
        fn model(&self) -> &str {
            "counting"
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn embed(&self, text: &str) -> LoreResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 0.0])
        }
    }

    #[tokio::test]
    async fn test_second_lookup_hits_cache() {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedEmbedder::new(inner.clone(), 8);

        let a = cached.embed("index scan").await.unwrap();
        let b = cached.embed("index scan").await.unwrap();
        cached.embed("seq scan").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);

        let stats = cached.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(cached.dimension(), 2);
    }
}
