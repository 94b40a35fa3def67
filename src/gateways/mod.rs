//! Adaptadores para os serviços externos de embeddings e raciocínio.
//!
//! O núcleo depende apenas das traits [`EmbeddingGateway`] e
//! [`ReasoningGateway`]; este módulo também traz backends concretos:
//!
//! - [`HashEmbedder`] - embeddings offline determinísticos
//! - [`CachedEmbedder`] - decorator LRU para qualquer embedder
//! - [`CommandReasoner`] - CLI externa, prompt como argumento
//! - `HttpEmbedder` / `HttpReasoner` - APIs HTTP compatíveis com OpenAI (feature `http`)

mod base;
mod cached;
mod command;
mod hashing;
#[cfg(feature = "http")]
mod openai;

use std::sync::Arc;

pub use base::{CompletionParams, EmbeddingGateway, ReasoningGateway};
pub use cached::CachedEmbedder;
pub use command::CommandReasoner;
pub use hashing::HashEmbedder;
#[cfg(feature = "http")]
pub use openai::{HttpEmbedder, HttpReasoner};

use crate::types::config::{
    EmbeddingConfig, EmbeddingProvider, ReasoningConfig, ReasoningProvider,
};
use crate::{LoreError, LoreResult};

/// Cria o backend de embeddings configurado. O cache é aplicado por quem
/// chama, com [`CachedEmbedder`].
pub fn embedder_from_config(
    config: &EmbeddingConfig,
    dimension: usize,
) -> LoreResult<Arc<dyn EmbeddingGateway>> {
    match config.provider {
        EmbeddingProvider::Hash => Ok(Arc::new(HashEmbedder::new(dimension)?)),
        #[cfg(feature = "http")]
        EmbeddingProvider::Http => Ok(Arc::new(HttpEmbedder::from_config(config, dimension)?)),
        #[cfg(not(feature = "http"))]
        EmbeddingProvider::Http => Err(LoreError::config(
            "embedding provider 'http' requires the 'http' feature",
        )),
    }
}

/// Cria o gateway de raciocínio configurado.
pub fn reasoner_from_config(config: &ReasoningConfig) -> LoreResult<Arc<dyn ReasoningGateway>> {
    match config.provider {
        ReasoningProvider::Command => {
            if config.command.trim().is_empty() {
                return Err(LoreError::config("reasoning.command must not be empty"));
            }
            Ok(Arc::new(CommandReasoner::from_config(config)))
        }
        #[cfg(feature = "http")]
        ReasoningProvider::Http => Ok(Arc::new(HttpReasoner::from_config(config)?)),
        #[cfg(not(feature = "http"))]
        ReasoningProvider::Http => Err(LoreError::config(
            "reasoning provider 'http' requires the 'http' feature",
        )),
    }
}
