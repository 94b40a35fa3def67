//! Traits para os serviços externos de embeddings e raciocínio.

use async_trait::async_trait;

use crate::LoreResult;

/// Mapeia texto para um vetor de tamanho fixo.
///
/// Implementações devem ser determinísticas: o mesmo texto sempre gera o
/// mesmo vetor, e todo vetor tem exatamente [`dimension`](Self::dimension)
/// componentes.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Identificador do modelo (também usado como namespace das chaves de cache).
    fn model(&self) -> &str;

    /// Tamanho de todo vetor retornado por este gateway.
    fn dimension(&self) -> usize;

    /// Calcula o embedding de `text`.
    async fn embed(&self, text: &str) -> LoreResult<Vec<f32>>;
}

/// Parâmetros de amostragem para uma completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 300,
        }
    }
}

/// Mapeia um prompt para texto gerado. Pode falhar ou travar; quem chama
/// limita com um timeout.
#[async_trait]
pub trait ReasoningGateway: Send + Sync {
    /// Nome curto usado em logs e erros.
    fn name(&self) -> &str;

    /// Gera uma completion para `prompt`.
    async fn complete(&self, prompt: &str, params: &CompletionParams) -> LoreResult<String>;
}
