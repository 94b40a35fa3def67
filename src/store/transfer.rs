//! Ingestão em lote, export e import de entradas de conhecimento.

use std::io::BufRead;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::knowledge::KnowledgeStore;
use crate::types::knowledge::{AddOutcome, KnowledgeEntry, Provenance, StoreStats};
use crate::LoreResult;

/// Uma linha do corpus inicial.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedRecord {
    pub prompt: String,
    pub completion: String,
}

/// Contadores de um ingest ou import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub added: usize,
    pub skipped: usize,
    pub invalid: usize,
}

impl IngestReport {
    pub fn processed(&self) -> usize {
        self.added + self.skipped + self.invalid
    }
}

/// Snapshot gravado por [`KnowledgeStore::export`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeExport {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub stats: StoreStats,
    pub entries: Vec<KnowledgeEntry>,
}

impl KnowledgeStore {
    /// Carrega um corpus `{prompt, completion}` delimitado por linha como
    /// entradas `Original`. Linhas em branco são ignoradas; linhas malformadas
    /// são contadas e logadas mas não interrompem o ingest.
    pub async fn ingest_jsonl<R, F>(&self, reader: R, mut progress: F) -> LoreResult<IngestReport>
    where
        R: BufRead,
        F: FnMut(&IngestReport),
    {
        let mut report = IngestReport::default();

        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record: SeedRecord = match serde_json::from_str(line) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(line = n + 1, error = %e, "Skipping malformed seed record");
                    report.invalid += 1;
                    progress(&report);
                    continue;
                }
            };

            match self
                .add(&record.prompt, &record.completion, Provenance::Original)
                .await?
            {
                AddOutcome::Added => report.added += 1,
                AddOutcome::SkippedDuplicate => report.skipped += 1,
            }
            progress(&report);
        }

        tracing::info!(
            added = report.added,
            skipped = report.skipped,
            invalid = report.invalid,
            "Seed corpus ingested"
        );
        Ok(report)
    }

    /// Atalho que lê um arquivo JSONL do disco.
    pub async fn ingest_file(&self, path: &Path) -> LoreResult<IngestReport> {
        let file = std::fs::File::open(path)?;
        self.ingest_jsonl(std::io::BufReader::new(file), |_| {}).await
    }

    /// Grava todas as entradas, em ordem de inserção, em um arquivo JSON.
    pub async fn export(&self, path: &Path) -> LoreResult<KnowledgeExport> {
        let export = KnowledgeExport {
            version: "1.0".to_string(),
            exported_at: Utc::now(),
            stats: self.stats().await,
            entries: self.all_entries().await,
        };

        let json = serde_json::to_string_pretty(&export)?;
        std::fs::write(path, json)?;

        tracing::info!(
            path = %path.display(),
            entries = export.entries.len(),
            "Knowledge store exported"
        );
        Ok(export)
    }

    /// Readiciona entradas de um export, mantendo a proveniência.
    pub async fn import(&self, path: &Path) -> LoreResult<IngestReport> {
        let json = std::fs::read_to_string(path)?;
        let export: KnowledgeExport = serde_json::from_str(&json)?;

        let mut report = IngestReport::default();
        for entry in export.entries {
            match self
                .add(&entry.prompt, &entry.completion, entry.provenance)
                .await?
            {
                AddOutcome::Added => report.added += 1,
                AddOutcome::SkippedDuplicate => report.skipped += 1,
            }
        }

        tracing::info!(
            path = %path.display(),
            added = report.added,
            skipped = report.skipped,
            "Knowledge store imported"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateways::HashEmbedder;
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn open_store(dir: &Path) -> KnowledgeStore {
        KnowledgeStore::open(dir, 32, Arc::new(HashEmbedder::new(32).unwrap()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ingest_counts_duplicates_and_garbage() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("store")).await;

        let corpus = concat!(
            r#"{"prompt":"What is a join?","completion":"Combines rows."}"#,
            "\n",
            "\n",
            "not json\n",
            r#"{"prompt":"What is a join?","completion":"Again."}"#,
            "\n",
            r#"{"prompt":"What is sharding?","completion":"Horizontal partitioning.","extra":1}"#,
            "\n",
        );

        let mut calls = 0;
        let report = store
            .ingest_jsonl(corpus.as_bytes(), |_| calls += 1)
            .await
            .unwrap();

        assert_eq!(
            report,
            IngestReport {
                added: 2,
                skipped: 1,
                invalid: 1
            }
        );
        assert_eq!(report.processed(), 4);
        assert_eq!(calls, 4);
        assert!(store
            .all_entries()
            .await
            .iter()
            .all(|e| e.provenance == Provenance::Original));
    }

    #[tokio::test]
    async fn test_export_then_import_into_fresh_store() {
        let dir = tempdir().unwrap();
        let source = open_store(&dir.path().join("a")).await;
        source.add("q1", "a1", Provenance::Original).await.unwrap();
        source.add("q2", "a2", Provenance::Generated).await.unwrap();

        let path = dir.path().join("export.json");
        let export = source.export(&path).await.unwrap();
        assert_eq!(export.stats.generated, 1);

        let target = open_store(&dir.path().join("b")).await;
        let report = target.import(&path).await.unwrap();
        assert_eq!(report.added, 2);

        let entries = target.all_entries().await;
        assert_eq!(entries[0].prompt, "q1");
        assert_eq!(entries[1].provenance, Provenance::Generated);

        let again = target.import(&path).await.unwrap();
        assert_eq!(again.skipped, 2);
    }
}
