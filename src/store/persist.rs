//! Layout em disco do knowledge store.
//!
//! Dois artefatos no mesmo diretório são reescritos juntos após cada mutação:
//!
//! - `knowledge.index` - [`IndexArtifact`] codificado em bincode
//! - `knowledge.meta.json` - array JSON formatado de [`KnowledgeEntry`]
//!
//! Cada arquivo é substituído de forma atômica (arquivo temporário, fsync,
//! rename), índice primeiro. Um crash entre os dois renames deixa o índice um
//! vetor à frente dos metadados, o que [`StoreFiles::load`] rejeita com
//! [`LoreError::InconsistentStoreState`].

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::index::FlatIndex;
use crate::types::knowledge::KnowledgeEntry;
use crate::{LoreError, LoreResult};

pub const INDEX_FILE: &str = "knowledge.index";
pub const META_FILE: &str = "knowledge.meta.json";

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct IndexArtifact {
    format_version: u32,
    dimension: u64,
    data: Vec<f32>,
}

/// Caminhos dos artefatos do store dentro de um diretório de dados.
#[derive(Debug, Clone)]
pub struct StoreFiles {
    dir: PathBuf,
}

impl StoreFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    /// Carrega índice e metadados.
    ///
    /// Retorna `Ok(None)` quando não há estado anterior. Falha com
    /// `InconsistentStoreState` quando o par não está alinhado e com
    /// `DimensionMismatch` quando o índice foi criado com outra dimensão.
    pub fn load(
        &self,
        expected_dimension: usize,
    ) -> LoreResult<Option<(FlatIndex, Vec<KnowledgeEntry>)>> {
        let index_path = self.index_path();
        let meta_path = self.meta_path();

        let index = if index_path.exists() {
            Some(read_index(&index_path)?)
        } else {
            None
        };
        let entries = if meta_path.exists() {
            Some(read_metadata(&meta_path)?)
        } else {
            None
        };

        let (index, entries) = match (index, entries) {
            (None, None) => return Ok(None),
            (Some(index), Some(entries)) => (index, entries),
            (index, entries) => {
                let index_len = index.as_ref().map(FlatIndex::len).unwrap_or(0);
                let metadata_len = entries.as_ref().map(Vec::len).unwrap_or(0);
                if index_len == 0 && metadata_len == 0 {
                    // Primeira inicialização interrompida; nada a perder.
                    tracing::warn!(dir = %self.dir.display(), "Partial empty store found, reinitializing");
                    return Ok(None);
                }
                return Err(LoreError::InconsistentStoreState {
                    index_len,
                    metadata_len,
                });
            }
        };

        if index.len() != entries.len() {
            return Err(LoreError::InconsistentStoreState {
                index_len: index.len(),
                metadata_len: entries.len(),
            });
        }

        if index.dimension() != expected_dimension {
            return Err(LoreError::DimensionMismatch {
                expected: expected_dimension,
                actual: index.dimension(),
            });
        }

        Ok(Some((index, entries)))
    }

    /// Grava os dois artefatos, índice primeiro.
    pub fn persist(&self, index: &FlatIndex, entries: &[KnowledgeEntry]) -> LoreResult<()> {
        fs::create_dir_all(&self.dir)?;
        self.persist_index(index)?;
        self.persist_metadata(entries)?;
        Ok(())
    }

    /// Substitui o par persistido pelo próximo, índice primeiro.
    ///
    /// Se a gravação dos metadados falhar depois de o índice ter sido trocado,
    /// o índice `previous` é regravado para manter o par alinhado em disco.
    pub fn replace(
        &self,
        previous: &FlatIndex,
        index: &FlatIndex,
        entries: &[KnowledgeEntry],
    ) -> LoreResult<()> {
        fs::create_dir_all(&self.dir)?;
        self.persist_index(index)?;

        if let Err(e) = self.persist_metadata(entries) {
            match self.persist_index(previous) {
                Ok(()) => tracing::warn!(error = %e, "Metadata write failed, index rolled back"),
                Err(rollback) => tracing::error!(
                    error = %e,
                    rollback_error = %rollback,
                    dir = %self.dir.display(),
                    "Metadata write failed and the index could not be rolled back"
                ),
            }
            return Err(e);
        }
        Ok(())
    }

    /// Grava apenas o artefato de índice.
    pub fn persist_index(&self, index: &FlatIndex) -> LoreResult<()> {
        let artifact = IndexArtifact {
            format_version: FORMAT_VERSION,
            dimension: index.dimension() as u64,
            data: index.raw().to_vec(),
        };
        let bytes = bincode::serialize(&artifact)?;
        write_atomic(&self.index_path(), &bytes)
    }

    /// Grava apenas o artefato de metadados.
    pub fn persist_metadata(&self, entries: &[KnowledgeEntry]) -> LoreResult<()> {
        let json = serde_json::to_vec_pretty(entries)?;
        write_atomic(&self.meta_path(), &json)
    }
}

fn read_index(path: &Path) -> LoreResult<FlatIndex> {
    let bytes = fs::read(path)?;
    let artifact: IndexArtifact = bincode::deserialize(&bytes)?;
    if artifact.format_version != FORMAT_VERSION {
        return Err(LoreError::other(format!(
            "unsupported index format version {}",
            artifact.format_version
        )));
    }
    FlatIndex::from_raw(artifact.dimension as usize, artifact.data)
}

fn read_metadata(path: &Path) -> LoreResult<Vec<KnowledgeEntry>> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> LoreResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::knowledge::Provenance;
    use tempfile::tempdir;

    fn sample() -> (FlatIndex, Vec<KnowledgeEntry>) {
        let mut index = FlatIndex::new(2);
        index.push(&[0.1, 0.2]).unwrap();
        index.push(&[0.3, 0.4]).unwrap();
        let entries = vec![
            KnowledgeEntry::new("a", "A", Provenance::Original),
            KnowledgeEntry::new("b", "B", Provenance::Generated),
        ];
        (index, entries)
    }

    #[test]
    fn test_missing_dir_is_fresh() {
        let dir = tempdir().unwrap();
        let files = StoreFiles::new(dir.path().join("nope"));
        assert!(files.load(2).unwrap().is_none());
    }

    #[test]
    fn test_persist_then_load() {
        let dir = tempdir().unwrap();
        let files = StoreFiles::new(dir.path());
        let (index, entries) = sample();

        files.persist(&index, &entries).unwrap();
        let (loaded_index, loaded_entries) = files.load(2).unwrap().unwrap();

        assert_eq!(loaded_index, index);
        assert_eq!(loaded_entries, entries);
        assert!(!dir.path().join("knowledge.index.tmp").exists());
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let files = StoreFiles::new(dir.path());
        let (index, entries) = sample();

        files.persist(&index, &entries[..1]).unwrap();
        let err = files.load(2).unwrap_err();
        assert!(matches!(
            err,
            LoreError::InconsistentStoreState {
                index_len: 2,
                metadata_len: 1
            }
        ));
    }

    #[test]
    fn test_missing_metadata_is_rejected() {
        let dir = tempdir().unwrap();
        let files = StoreFiles::new(dir.path());
        let (index, _) = sample();

        files.persist_index(&index).unwrap();
        assert!(matches!(
            files.load(2),
            Err(LoreError::InconsistentStoreState { .. })
        ));
    }

    #[test]
    fn test_empty_partial_state_reinitializes() {
        let dir = tempdir().unwrap();
        let files = StoreFiles::new(dir.path());
        files.persist_index(&FlatIndex::new(2)).unwrap();
        assert!(files.load(2).unwrap().is_none());
    }

    #[test]
    fn test_dimension_mismatch() {
        let dir = tempdir().unwrap();
        let files = StoreFiles::new(dir.path());
        let (index, entries) = sample();
        files.persist(&index, &entries).unwrap();

        assert!(matches!(
            files.load(384),
            Err(LoreError::DimensionMismatch {
                expected: 384,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_corrupt_index_is_error() {
        let dir = tempdir().unwrap();
        let files = StoreFiles::new(dir.path());
        let (index, entries) = sample();
        files.persist(&index, &entries).unwrap();
        std::fs::write(files.index_path(), b"garbage").unwrap();

        assert!(files.load(2).is_err());
    }

    #[test]
    fn test_replace_rolls_back_index_when_metadata_write_fails() {
        let dir = tempdir().unwrap();
        let files = StoreFiles::new(dir.path());
        let (index, entries) = sample();
        files.persist(&index, &entries).unwrap();

        let mut grown = index.clone();
        grown.push(&[0.5, 0.6]).unwrap();
        let mut grown_entries = entries.clone();
        grown_entries.push(KnowledgeEntry::new("c", "C", Provenance::Generated));

        let mut blocker = files.meta_path().into_os_string();
        blocker.push(".tmp");
        std::fs::create_dir(&blocker).unwrap();

        assert!(files.replace(&index, &grown, &grown_entries).is_err());

        std::fs::remove_dir(&blocker).unwrap();
        let (loaded, loaded_entries) = files.load(2).unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded_entries.len(), 2);
    }
}
