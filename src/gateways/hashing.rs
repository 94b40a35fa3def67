//! Embeddings offline via feature hashing.
//!
//! Cada palavra em minúsculas e cada par de palavras adjacentes passa por
//! SHA-256 e cai em um bucket com sinal do vetor de saída, que depois é
//! normalizado em L2. Textos idênticos geram vetores idênticos; textos com
//! a maioria das palavras em comum ficam próximos. A qualidade fica bem
//! abaixo de um modelo treinado, mas não precisa de rede e nunca falha,
//! por isso é o backend padrão.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::base::EmbeddingGateway;
use crate::{LoreError, LoreResult};

/// Embedder determinístico por hashing.
pub struct HashEmbedder {
    dimension: usize,
    model: String,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> LoreResult<Self> {
        if dimension == 0 {
            return Err(LoreError::config("embedding dimension must be positive"));
        }
        Ok(Self {
            dimension,
            model: format!("hash-{}", dimension),
        })
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
            .map(|t| t.trim_matches('-').to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(raw) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }

    /// Embedding síncrono, usado pela impl assíncrona da trait e pelos testes.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens = Self::tokenize(text);

        for token in &tokens {
            let (i, sign) = self.bucket(token);
            vector[i] += sign;
        }
        for pair in tokens.windows(2) {
            let (i, sign) = self.bucket(&format!("{} {}", pair[0], pair[1]));
            vector[i] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingGateway for HashEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> LoreResult<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}
