//! O knowledge store: índice vetorial + metadados alinhados, escritor único.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::index::FlatIndex;
use super::persist::StoreFiles;
use crate::gateways::EmbeddingGateway;
use crate::types::knowledge::{
    AddOutcome, KnowledgeEntry, Provenance, SearchResult, StoreStats,
};
use crate::{LoreError, LoreResult};

/// Visão imutável publicada para os leitores.
#[derive(Debug, Clone)]
struct StoreState {
    index: FlatIndex,
    entries: Vec<KnowledgeEntry>,
    prompts: HashSet<String>,
}

impl StoreState {
    fn empty(dimension: usize) -> Self {
        Self {
            index: FlatIndex::new(dimension),
            entries: Vec::new(),
            prompts: HashSet::new(),
        }
    }

    fn from_parts(index: FlatIndex, entries: Vec<KnowledgeEntry>) -> Self {
        let prompts = entries.iter().map(|e| e.prompt.clone()).collect();
        Self {
            index,
            entries,
            prompts,
        }
    }
}

/// Store de similaridade vetorial com pares pergunta/resposta.
///
/// Leitores trabalham sobre um snapshot imutável e nunca esperam pelo
/// embedding ou pela gravação em disco de um escritor. Escritores são
/// serializados: um `add` monta o próximo snapshot, persiste e só então o
/// publica, então leitores só veem estados que já estão em disco e cujo
/// índice e metadados têm o mesmo tamanho.
pub struct KnowledgeStore {
    embedder: Arc<dyn EmbeddingGateway>,
    files: StoreFiles,
    dimension: usize,
    state: RwLock<Arc<StoreState>>,
    writer: Mutex<()>,
}

impl KnowledgeStore {
    /// Carrega o store de `data_dir`, criando e persistindo um vazio quando
    /// não há nada lá.
    pub async fn open(
        data_dir: impl AsRef<Path>,
        dimension: usize,
        embedder: Arc<dyn EmbeddingGateway>,
    ) -> LoreResult<Self> {
        if embedder.dimension() != dimension {
            return Err(LoreError::DimensionMismatch {
                expected: dimension,
                actual: embedder.dimension(),
            });
        }

        let files = StoreFiles::new(data_dir.as_ref());
        let loader = files.clone();
        let loaded = tokio::task::spawn_blocking(move || loader.load(dimension))
            .await
            .map_err(|e| LoreError::other(format!("store load task failed: {}", e)))??;

        let state = match loaded {
            Some((index, entries)) => {
                tracing::info!(
                    dir = %files.dir().display(),
                    entries = entries.len(),
                    dimension,
                    "Knowledge store loaded"
                );
                StoreState::from_parts(index, entries)
            }
            None => {
                let state = StoreState::empty(dimension);
                files.persist(&state.index, &state.entries)?;
                tracing::info!(
                    dir = %files.dir().display(),
                    dimension,
                    "Knowledge store initialized empty"
                );
                state
            }
        };

        Ok(Self {
            embedder,
            files,
            dimension,
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
        })
    }

    async fn snapshot(&self) -> Arc<StoreState> {
        self.state.read().await.clone()
    }

    /// Adiciona uma entrada, a menos que o prompt já exista (match exato).
    ///
    /// Só retorna depois que os dois artefatos estão em disco. Em qualquer
    /// falha (embedding, dimensão, persistência) o store fica inalterado, em
    /// memória e em disco.
    pub async fn add(
        &self,
        prompt: &str,
        completion: &str,
        provenance: Provenance,
    ) -> LoreResult<AddOutcome> {
        let _guard = self.writer.lock().await;
        let current = self.snapshot().await;

        if current.prompts.contains(prompt) {
            tracing::debug!(prompt = %truncate(prompt), "Duplicate prompt skipped");
            return Ok(AddOutcome::SkippedDuplicate);
        }

        let vector = self.embedder.embed(prompt).await?;

        let mut next = (*current).clone();
        next.index.push(&vector)?;
        next.entries
            .push(KnowledgeEntry::new(prompt, completion, provenance));
        next.prompts.insert(prompt.to_string());
        let next = Arc::new(next);

        let files = self.files.clone();
        let to_disk = next.clone();
        let previous = current.clone();
        tokio::task::spawn_blocking(move || {
            files.replace(&previous.index, &to_disk.index, &to_disk.entries)
        })
            .await
            .map_err(|e| LoreError::other(format!("store persist task failed: {}", e)))??;

        *self.state.write().await = next.clone();

        tracing::info!(
            prompt = %truncate(prompt),
            %provenance,
            entries = next.entries.len(),
            "Knowledge entry added"
        );
        Ok(AddOutcome::Added)
    }

    /// Retorna até `k` entradas a no máximo `threshold` de distância ao
    /// quadrado da query, mais próximas primeiro. Resultado vazio não é erro.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        threshold: f32,
    ) -> LoreResult<Vec<SearchResult>> {
        let vector = self.embedder.embed(query).await?;
        let state = self.snapshot().await;

        let hits = state
            .index
            .nearest(&vector, k)?
            .into_iter()
            .filter(|(_, distance)| *distance <= threshold)
            .map(|(position, distance)| SearchResult {
                entry: state.entries[position].clone(),
                distance,
            })
            .collect();

        Ok(hits)
    }

    /// Verdadeiro quando existe uma entrada com exatamente este prompt.
    pub async fn contains_prompt(&self, prompt: &str) -> bool {
        self.snapshot().await.prompts.contains(prompt)
    }

    /// Cópia ordenada de todas as entradas.
    pub async fn all_entries(&self) -> Vec<KnowledgeEntry> {
        self.snapshot().await.entries.clone()
    }

    pub async fn len(&self) -> usize {
        self.snapshot().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// `(tamanho do índice, tamanho dos metadados)` do snapshot atual.
    pub async fn alignment(&self) -> (usize, usize) {
        let state = self.snapshot().await;
        (state.index.len(), state.entries.len())
    }

    pub async fn stats(&self) -> StoreStats {
        let state = self.snapshot().await;
        let generated = state
            .entries
            .iter()
            .filter(|e| e.provenance == Provenance::Generated)
            .count();
        StoreStats {
            entries: state.entries.len(),
            dimension: self.dimension,
            original: state.entries.len() - generated,
            generated,
        }
    }

    /// Regrava os dois artefatos a partir do snapshot atual.
    pub async fn persist(&self) -> LoreResult<()> {
        let _guard = self.writer.lock().await;
        let state = self.snapshot().await;
        let files = self.files.clone();
        tokio::task::spawn_blocking(move || files.persist(&state.index, &state.entries))
            .await
            .map_err(|e| LoreError::other(format!("store persist task failed: {}", e)))?
    }

    pub fn files(&self) -> &StoreFiles {
        &self.files
    }
}

pub(crate) fn truncate(text: &str) -> String {
    const MAX: usize = 50;
    match text.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}...", &text[..i]),
        None => text.to_string(),
    }
}
