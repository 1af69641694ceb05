//! Property tests for the deduplicating retriever over a real token-hash index.
//!
//! 1. Output never exceeds k
//! 2. No accepted pair overlaps by more than the duplicate threshold
//! 3. Rebuilding from the same corpus yields the same document ids
//!
//! 1 and 2 are also checked on a corpus large enough to be served by HNSW.

use std::collections::BTreeSet;
use std::sync::Arc;

use jobscout_index::*;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn word_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("engineer".to_string()),
        Just("sales".to_string()),
        Just("cairo".to_string()),
        Just("giza".to_string()),
        Just("pharmacist".to_string()),
        Just("remote".to_string()),
        Just("senior".to_string()),
        "[a-z]{3,8}".prop_map(|s| s),
    ]
}

/// Small corpora with many near-duplicates: documents are drawn from a tiny
/// vocabulary so overlaps above the threshold are common.
fn corpus_strategy() -> impl Strategy<Value = Vec<Document>> {
    prop::collection::vec(prop::collection::vec(word_strategy(), 1..8), 0..24).prop_map(|docs| {
        docs.into_iter()
            .enumerate()
            .map(|(i, words)| Document::new(format!("job-{i:03}"), words.join(" ")))
            .collect()
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime")
}

async fn retriever_for(docs: Vec<Document>) -> DedupRetriever {
    let index = VectorIndex::build(docs, Arc::new(TokenHashEmbedder))
        .await
        .expect("build index");
    DedupRetriever::new(Arc::new(index))
}

// ============================================================================
// Retrieval invariants
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn retrieve_never_exceeds_k(
        docs in corpus_strategy(),
        query in prop::collection::vec(word_strategy(), 0..4),
        k in 0usize..12,
    ) {
        let rt = runtime();
        let out = rt.block_on(async {
            retriever_for(docs).await.retrieve(&query.join(" "), k).await
        }).expect("retrieve");
        prop_assert!(out.len() <= k);
    }

    #[test]
    fn accepted_documents_are_pairwise_distinct(
        docs in corpus_strategy(),
        query in prop::collection::vec(word_strategy(), 1..4),
        k in 1usize..12,
    ) {
        let rt = runtime();
        let out = rt.block_on(async {
            retriever_for(docs).await.retrieve(&query.join(" "), k).await
        }).expect("retrieve");

        for (i, a) in out.iter().enumerate() {
            for b in out.iter().skip(i + 1) {
                let overlap = token_jaccard(&a.content, &b.content);
                prop_assert!(
                    overlap <= DEFAULT_DUPLICATE_THRESHOLD,
                    "{} and {} overlap {}", a.id, b.id, overlap
                );
            }
        }
    }

    #[test]
    fn rebuilding_yields_same_document_ids(docs in corpus_strategy()) {
        let rt = runtime();
        let (first, second) = rt.block_on(async {
            let a = VectorIndex::build(docs.clone(), Arc::new(TokenHashEmbedder)).await.expect("build");
            let b = VectorIndex::build(docs, Arc::new(TokenHashEmbedder)).await.expect("build");
            (a, b)
        });
        let ids = |idx: &VectorIndex| idx.documents().iter().map(|d| d.id.clone()).collect::<BTreeSet<_>>();
        prop_assert_eq!(ids(&first), ids(&second));
        prop_assert_eq!(first.to_file().items.len(), second.to_file().items.len());
    }
}

// ============================================================================
// Large corpus (HNSW candidate path)
// ============================================================================

const LARGE_CORPUS: usize = 600;

/// Deterministic corpus above the exact-scan cutoff, with repeated titles so
/// near-duplicates show up in every result list.
fn large_corpus() -> Vec<Document> {
    const TITLES: [&str; 6] = ["engineer", "sales", "pharmacist", "chemist", "driver", "analyst"];
    const CITIES: [&str; 4] = ["cairo", "giza", "alexandria", "remote"];
    (0..LARGE_CORPUS)
        .map(|i| {
            let content = format!(
                "Title: {} {}\nLocation: {}\nLevel: {}",
                TITLES[i % TITLES.len()],
                i % 37,
                CITIES[i % CITIES.len()],
                i % 5
            );
            Document::new(format!("job-{i:04}"), content)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn large_corpus_retrieval_respects_bound_and_overlap(
        query in prop::collection::vec(word_strategy(), 1..4),
        k in prop_oneof![1usize..(LARGE_CORPUS / 2), (LARGE_CORPUS / 2)..(LARGE_CORPUS * 2)],
    ) {
        let rt = runtime();
        let out = rt.block_on(async {
            retriever_for(large_corpus()).await.retrieve(&query.join(" "), k).await
        }).expect("retrieve");

        prop_assert!(out.len() <= k);
        for (i, a) in out.iter().enumerate() {
            for b in out.iter().skip(i + 1) {
                prop_assert!(token_jaccard(&a.content, &b.content) <= DEFAULT_DUPLICATE_THRESHOLD);
            }
        }
    }
}

#[tokio::test]
async fn large_corpus_retrieve_above_half_the_corpus() {
    let retriever = retriever_for(large_corpus()).await;
    for k in [LARGE_CORPUS / 2 - 1, LARGE_CORPUS / 2 + 1, 400, LARGE_CORPUS, LARGE_CORPUS + 1] {
        let out = retriever.retrieve("engineer cairo", k).await.expect("retrieve");
        assert!(out.len() <= k, "k={k} returned {}", out.len());
        assert!(!out.is_empty(), "k={k}");
    }
}

#[tokio::test]
async fn corpus_file_round_trips_through_open_or_build() {
    let dir = tempfile::tempdir().expect("tempdir");
    let jobs = dir.path().join("jobs.json");
    std::fs::write(
        &jobs,
        r#"[
            {"job_id": "b", "title": "Medical Representative", "location": "Cairo, Egypt"},
            {"job_id": "a", "title": "Production Supervisor", "location": "Sadat City"}
        ]"#,
    )
    .expect("write jobs");
    let index_path = dir.path().join("embeddings").join("jobs.jsi");

    let built = VectorIndex::open_or_build(&index_path, &jobs, Arc::new(TokenHashEmbedder), false)
        .await
        .expect("build");
    assert!(index_path.exists());

    // Second open loads the file instead of re-reading the corpus.
    std::fs::remove_file(&jobs).expect("remove corpus");
    let loaded = VectorIndex::open_or_build(&index_path, &jobs, Arc::new(TokenHashEmbedder), false)
        .await
        .expect("load");
    assert_eq!(built.documents(), loaded.documents());

    let err = VectorIndex::open_or_build(&index_path, &jobs, Arc::new(TokenHashEmbedder), true)
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::Io { .. }), "{err}");
}
