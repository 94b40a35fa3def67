//! Testes de integração do knowledge store.

use std::sync::Arc;

use lorebank::gateways::{EmbeddingGateway, HashEmbedder};
use lorebank::store::KnowledgeStore;
use lorebank::types::knowledge::{AddOutcome, Provenance};
use lorebank::{LoreError, LoreResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

const DIM: usize = 384;

async fn open(dir: &std::path::Path) -> LoreResult<KnowledgeStore> {
    KnowledgeStore::open(dir, DIM, Arc::new(HashEmbedder::new(DIM)?)).await
}

/// Embedder que mapeia "pN" para o ponto N no eixo x.
struct AxisEmbedder;

#[async_trait::async_trait]
impl EmbeddingGateway for AxisEmbedder {
    fn model(&self) -> &str {
        "axis"
    }

    fn dimension(&self) -> usize {
        2
    }

    async fn embed(&self, text: &str) -> LoreResult<Vec<f32>> {
        let x: f32 = text
            .trim_start_matches('p')
            .parse()
            .map_err(|_| LoreError::EmbeddingFailed(format!("not an axis point: {}", text)))?;
        Ok(vec![x, 0.0])
    }
}

#[tokio::test]
async fn test_b_tree_end_to_end() {
    let dir = TempDir::new().unwrap();
    let store = open(dir.path()).await.unwrap();

    store
        .add(
            "What is a B-tree?",
            "A balanced search tree that keeps data sorted for logarithmic lookups.",
            Provenance::Original,
        )
        .await
        .unwrap();

    let hits = store.search("What is a B-tree?", 1, 0.5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entry.prompt, "What is a B-tree?");
    assert!(hits[0].distance.abs() < 1e-4);

    let misses = store.search("What's the weather?", 1, 0.5).await.unwrap();
    assert!(misses.is_empty());
}

#[tokio::test]
async fn test_dedup_idempotence_across_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open(dir.path()).await.unwrap();
        assert_eq!(
            store.add("What is a WAL?", "A write-ahead log.", Provenance::Original).await.unwrap(),
            AddOutcome::Added
        );
    }

    let store = open(dir.path()).await.unwrap();
    assert_eq!(
        store.add("What is a WAL?", "Different.", Provenance::Generated).await.unwrap(),
        AddOutcome::SkippedDuplicate
    );
    assert_eq!(store.len().await, 1);
    assert_eq!(store.all_entries().await[0].completion, "A write-ahead log.");
}

#[tokio::test]
async fn test_threshold_zero_only_exact_vectors() {
    let dir = TempDir::new().unwrap();
    let store = KnowledgeStore::open(dir.path(), 2, Arc::new(AxisEmbedder))
        .await
        .unwrap();
    store.add("p1", "one", Provenance::Original).await.unwrap();
    store.add("p2", "two", Provenance::Original).await.unwrap();

    let exact = store.search("p1", 5, 0.0).await.unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].entry.completion, "one");

    assert!(store.search("p1.5", 5, 0.0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_results_ascending_and_ties_in_insertion_order() {
    let dir = TempDir::new().unwrap();
    let store = KnowledgeStore::open(dir.path(), 2, Arc::new(AxisEmbedder))
        .await
        .unwrap();
    for p in ["p4", "p0", "p2", "p6", "p3"] {
        store.add(p, p, Provenance::Original).await.unwrap();
    }

    // p3 está a 0 de si mesmo; p2 e p4 empatam em 1, p4 foi inserido antes.
    let hits = store.search("p3", 4, 100.0).await.unwrap();
    let prompts: Vec<&str> = hits.iter().map(|h| h.entry.prompt.as_str()).collect();
    assert_eq!(prompts, vec!["p3", "p4", "p2", "p0"]);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

    // O threshold corta p0 e p6, a distância ao quadrado 9.
    let near = store.search("p3", 10, 4.0).await.unwrap();
    assert_eq!(near.len(), 3);
}

#[tokio::test]
async fn test_failed_embedding_leaves_store_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = KnowledgeStore::open(dir.path(), 2, Arc::new(AxisEmbedder))
        .await
        .unwrap();
    store.add("p1", "one", Provenance::Original).await.unwrap();

    let result = store.add("not a point", "x", Provenance::Generated).await;
    assert!(matches!(result, Err(LoreError::EmbeddingFailed(_))));
    assert_eq!(store.alignment().await, (1, 1));

    drop(store);
    let reopened = KnowledgeStore::open(dir.path(), 2, Arc::new(AxisEmbedder))
        .await
        .unwrap();
    assert_eq!(reopened.len().await, 1);
}

#[tokio::test]
async fn test_index_persisted_without_metadata_is_detected() {
    let dir = TempDir::new().unwrap();
    let meta_path;
    let stale_meta;
    {
        let store = open(dir.path()).await.unwrap();
        store.add("What is a join?", "Combines rows.", Provenance::Original).await.unwrap();
        meta_path = store.files().meta_path();
        stale_meta = std::fs::read(&meta_path).unwrap();

        store.add("What is a view?", "A stored query.", Provenance::Original).await.unwrap();
    }

    // Crash entre o rename do índice e o rename dos metadados.
    std::fs::write(&meta_path, stale_meta).unwrap();

    match open(dir.path()).await {
        Err(LoreError::InconsistentStoreState {
            index_len,
            metadata_len,
        }) => {
            assert_eq!(index_len, 2);
            assert_eq!(metadata_len, 1);
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("misaligned store was accepted"),
    }
}

#[tokio::test]
async fn test_dimension_change_is_rejected_on_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open(dir.path()).await.unwrap();
        store.add("What is a heap?", "An unordered table.", Provenance::Original).await.unwrap();
    }

    let result = KnowledgeStore::open(dir.path(), 64, Arc::new(HashEmbedder::new(64).unwrap())).await;
    assert!(matches!(
        result,
        Err(LoreError::DimensionMismatch {
            expected: 64,
            actual: DIM
        })
    ));
}

#[tokio::test]
async fn test_randomized_interleaving_keeps_lengths_equal() {
    let dir = TempDir::new().unwrap();
    let store = open(dir.path()).await.unwrap();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut expected = std::collections::HashSet::new();

    for _ in 0..200 {
        let topic = rng.random_range(0..40);
        let prompt = format!("What is concept {}?", topic);

        if rng.random_bool(0.6) {
            store.add(&prompt, "An answer.", Provenance::Original).await.unwrap();
            expected.insert(prompt);
        } else {
            let hits = store.search(&prompt, 3, 0.5).await.unwrap();
            assert!(hits.len() <= 3);
        }

        let (index_len, metadata_len) = store.alignment().await;
        assert_eq!(index_len, metadata_len);
        assert_eq!(metadata_len, expected.len());
    }

    drop(store);
    let reopened = open(dir.path()).await.unwrap();
    assert_eq!(reopened.len().await, expected.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_and_readers() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open(dir.path()).await.unwrap());
    let mut tasks = Vec::new();

    // Cada prompt é escrito por dois escritores; exatamente um deve vencer.
    for writer in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..10 {
                let prompt = format!("Question {} from group {}", i, writer % 4);
                store.add(&prompt, "answer", Provenance::Generated).await.unwrap();
            }
        }));
    }

    for _ in 0..4 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..25 {
                let (index_len, metadata_len) = store.alignment().await;
                assert_eq!(index_len, metadata_len);
                let _ = store
                    .search(&format!("Question {} from group 0", i % 10), 1, 0.5)
                    .await
                    .unwrap();
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(store.len().await, 40);
    let entries = store.all_entries().await;
    let unique: std::collections::HashSet<_> = entries.iter().map(|e| &e.prompt).collect();
    assert_eq!(unique.len(), 40);
}

#[tokio::test]
async fn test_seed_corpus_from_file() {
    let dir = TempDir::new().unwrap();
    let corpus = dir.path().join("seed.jsonl");
    std::fs::write(
        &corpus,
        concat!(
            r#"{"prompt":"What is sharding?","completion":"Splitting data across nodes."}"#,
            "\n",
            r#"{"prompt":"What is a replica set?","completion":"A group of mongod processes holding the same data."}"#,
            "\n",
        ),
    )
    .unwrap();

    let store = open(&dir.path().join("store")).await.unwrap();
    let report = store.ingest_file(&corpus).await.unwrap();
    assert_eq!(report.added, 2);
    assert_eq!(report.invalid, 0);

    let hits = store.search("What is sharding?", 1, 0.5).await.unwrap();
    assert_eq!(hits[0].entry.completion, "Splitting data across nodes.");
}

#[tokio::test]
async fn test_failed_metadata_write_keeps_disk_aligned() {
    let dir = TempDir::new().unwrap();
    let store = open(dir.path()).await.unwrap();
    store.add("What is MVCC?", "Multi-version concurrency control.", Provenance::Original).await.unwrap();

    let mut blocker = store.files().meta_path().into_os_string();
    blocker.push(".tmp");
    std::fs::create_dir(&blocker).unwrap();

    let result = store.add("What is a tombstone?", "A deletion marker.", Provenance::Generated).await;
    assert!(matches!(result, Err(LoreError::Io(_))));
    assert_eq!(store.alignment().await, (1, 1));

    std::fs::remove_dir(&blocker).unwrap();
    drop(store);

    let reopened = open(dir.path()).await.unwrap();
    assert_eq!(reopened.alignment().await, (1, 1));
    assert!(!reopened.contains_prompt("What is a tombstone?").await);
}
