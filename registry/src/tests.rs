use std::sync::Arc;

use faceid_vecstore::{
    IndexStats, Match, MemoryIndex, Metadata, Page, Record, VecError, VectorIndex,
};

use crate::error::RegistryError;
use crate::registry::{Registry, RegistryConfig};

fn registry(dim: usize) -> Registry {
    Registry::new(Arc::new(MemoryIndex::new(dim)), RegistryConfig::new(dim))
}

fn meta(name: &str) -> Metadata {
    let mut m = Metadata::new();
    m.insert("name".into(), name.into());
    m
}

/// A store that fails every call. Used to prove the registry's
/// dimension guard runs before any store traffic.
struct FailingIndex;

#[async_trait::async_trait]
impl VectorIndex for FailingIndex {
    async fn upsert(&self, _record: Record) -> Result<(), VecError> {
        Err(VecError::Api("unexpected store call".into()))
    }
    async fn query(&self, _vector: &[f32], _top_k: usize) -> Result<Vec<Match>, VecError> {
        Err(VecError::Api("unexpected store call".into()))
    }
    async fn fetch(&self, _ids: &[String]) -> Result<Vec<Record>, VecError> {
        Err(VecError::Api("unexpected store call".into()))
    }
    async fn delete(&self, _id: &str) -> Result<(), VecError> {
        Err(VecError::Api("unexpected store call".into()))
    }
    async fn list_ids(&self, _token: Option<&str>) -> Result<Page, VecError> {
        Err(VecError::Api("unexpected store call".into()))
    }
    async fn describe_stats(&self) -> Result<IndexStats, VecError> {
        Err(VecError::Api("unexpected store call".into()))
    }
}

#[tokio::test]
async fn round_trip() {
    let reg = registry(4);
    let emb = [0.1, 0.2, 0.3, 0.4];
    let id = reg.register(&emb, Some("A"), meta("Alice")).await.unwrap();
    assert_eq!(id, "A");

    let matches = reg.search(&emb, 1, 0.0).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "A");
    assert!((matches[0].score - 1.0).abs() < 1e-4, "got {}", matches[0].score);
    assert_eq!(matches[0].metadata, meta("Alice"));
}

#[tokio::test]
async fn search_empty_registry_is_success() {
    let reg = registry(4);
    let matches = reg.search(&[1.0, 0.0, 0.0, 0.0], 5, 0.5).await.unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn threshold_filters_after_retrieval() {
    let reg = registry(4);
    reg.register(&[1.0, 0.0, 0.0, 0.0], Some("exact"), meta("e"))
        .await
        .unwrap();
    // cos = 0.9 against the query.
    reg.register(&[0.9, 0.43589, 0.0, 0.0], Some("close"), meta("c"))
        .await
        .unwrap();
    // cos = 0.6.
    reg.register(&[0.6, 0.8, 0.0, 0.0], Some("far"), meta("f"))
        .await
        .unwrap();

    let q = [1.0, 0.0, 0.0, 0.0];
    let all = reg.search(&q, 3, 0.0).await.unwrap();
    assert_eq!(all.len(), 3);

    let mid = reg.search(&q, 3, 0.7).await.unwrap();
    assert_eq!(mid.len(), 2);
    assert_eq!(mid[0].id, "exact");
    assert_eq!(mid[1].id, "close");

    let high = reg.search(&q, 3, 0.95).await.unwrap();
    assert_eq!(high.len(), 1);
    assert_eq!(high[0].id, "exact");

    // All top-k below threshold yields empty, not an error.
    let none = reg.search(&q, 3, 1.1).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn threshold_monotonicity() {
    let reg = registry(4);
    for i in 0..10 {
        let angle = i as f32 * 0.1;
        reg.register(
            &[angle.cos(), angle.sin(), 0.0, 0.0],
            Some(&format!("v{i}")),
            Metadata::new(),
        )
        .await
        .unwrap();
    }

    let q = [1.0, 0.0, 0.0, 0.0];
    let mut prev_len = usize::MAX;
    for t in [0.0, 0.3, 0.6, 0.8, 0.9, 0.99] {
        let res = reg.search(&q, 10, t).await.unwrap();
        assert!(res.len() <= prev_len, "threshold {t} grew the result set");
        assert!(res.iter().all(|m| m.score >= t));
        prev_len = res.len();
    }
}

#[tokio::test]
async fn ranking_descending_with_id_tiebreak() {
    let reg = registry(4);
    // Two records with identical embeddings tie on score.
    let emb = [0.5, 0.5, 0.0, 0.0];
    reg.register(&emb, Some("b"), Metadata::new()).await.unwrap();
    reg.register(&emb, Some("a"), Metadata::new()).await.unwrap();
    reg.register(&[0.0, 1.0, 0.0, 0.0], Some("c"), Metadata::new())
        .await
        .unwrap();

    let matches = reg.search(&emb, 3, 0.0).await.unwrap();
    assert_eq!(matches.len(), 3);
    for w in matches.windows(2) {
        assert!(w[0].score >= w[1].score, "not descending");
    }
    // Tied pair ordered by id.
    assert_eq!(matches[0].id, "a");
    assert_eq!(matches[1].id, "b");
}

#[tokio::test]
async fn guarded_register_refuses_duplicate() {
    let reg = registry(4);
    reg.register(&[1.0, 0.0, 0.0, 0.0], Some("A"), meta("Alice"))
        .await
        .unwrap();

    // cos = 0.9 >= 0.85 default duplicate threshold.
    let err = reg
        .register_guarded(&[0.9, 0.43589, 0.0, 0.0], None, meta("Alice again"))
        .await
        .unwrap_err();
    match err {
        RegistryError::DuplicateFound { id, score, metadata } => {
            assert_eq!(id, "A");
            assert!(score >= 0.85, "got {score}");
            assert_eq!(metadata, meta("Alice"));
        }
        other => panic!("expected DuplicateFound, got {other}"),
    }

    // Nothing was written.
    assert_eq!(reg.stats().await.unwrap().count, 1);
}

#[tokio::test]
async fn guarded_register_accepts_below_threshold() {
    let reg = registry(4);
    reg.register(&[1.0, 0.0, 0.0, 0.0], Some("A"), meta("Alice"))
        .await
        .unwrap();

    // cos = 0.6 < 0.85.
    let id = reg
        .register_guarded(&[0.6, 0.8, 0.0, 0.0], Some("B"), meta("Bob"))
        .await
        .unwrap();
    assert_eq!(id, "B");
    assert_eq!(reg.stats().await.unwrap().count, 2);
}

#[tokio::test]
async fn guarded_register_on_empty_registry() {
    let reg = registry(4);
    let id = reg
        .register_guarded(&[1.0, 0.0, 0.0, 0.0], None, meta("First"))
        .await
        .unwrap();
    assert!(id.starts_with("face_"));
}

#[tokio::test]
async fn custom_duplicate_threshold() {
    let store = Arc::new(MemoryIndex::new(4));
    let cfg = RegistryConfig::new(4).with_duplicate_threshold(0.5);
    let reg = Registry::new(store, cfg);

    reg.register(&[1.0, 0.0, 0.0, 0.0], Some("A"), Metadata::new())
        .await
        .unwrap();
    // cos = 0.6 >= 0.5: refused under the stricter threshold.
    let err = reg
        .register_guarded(&[0.6, 0.8, 0.0, 0.0], None, Metadata::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateFound { .. }));
}

#[tokio::test]
async fn auto_id_format_and_prefix() {
    let store = Arc::new(MemoryIndex::new(2));
    let reg = Registry::new(store, RegistryConfig::new(2).with_id_prefix("person"));

    let id = reg
        .register(&[1.0, 0.0], None, Metadata::new())
        .await
        .unwrap();
    let suffix = id.strip_prefix("person_").expect("prefix");
    assert_eq!(suffix.len(), 8);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn register_same_id_replaces() {
    let reg = registry(2);
    reg.register(&[1.0, 0.0], Some("A"), meta("old")).await.unwrap();
    reg.register(&[0.0, 1.0], Some("A"), meta("new")).await.unwrap();

    assert_eq!(reg.stats().await.unwrap().count, 1);
    let matches = reg.search(&[0.0, 1.0], 1, 0.9).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].metadata, meta("new"), "metadata replaced, not merged");
}

#[tokio::test]
async fn list_all_empty() {
    let reg = registry(4);
    assert!(reg.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn list_all_spans_pagination() {
    let reg = registry(2);
    // 250 records: 3 id pages and 3 metadata fetch batches of 100.
    for i in 0..250 {
        reg.register(&[1.0, i as f32], Some(&format!("id_{i:04}")), meta(&format!("p{i}")))
            .await
            .unwrap();
    }

    let entries = reg.list_all().await.unwrap();
    assert_eq!(entries.len(), 250);

    let mut ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 250);
    assert_eq!(ids[0], "id_0000");
    assert_eq!(ids[249], "id_0249");

    // Embeddings never appear; metadata survives intact.
    let e0 = entries.iter().find(|e| e.id == "id_0007").unwrap();
    assert_eq!(e0.metadata, meta("p7"));
}

#[tokio::test]
async fn search_top_k_zero_clamps_to_one() {
    let reg = registry(4);
    let emb = [1.0, 0.0, 0.0, 0.0];
    reg.register(&emb, Some("A"), meta("Alice")).await.unwrap();

    let matches = reg.search(&emb, 0, 0.0).await.unwrap();
    assert_eq!(matches.len(), 1, "top_k 0 retrieves the best match");
    assert_eq!(matches[0].id, "A");
}

#[tokio::test]
async fn ids_may_contain_reserved_characters() {
    let reg = registry(2);
    let odd = "a b&c=d+e";
    reg.register(&[1.0, 0.0], Some(odd), meta("odd")).await.unwrap();

    let entries = reg.list_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, odd);

    reg.delete(odd).await.unwrap();
    assert!(reg.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_removes_visibility() {
    let reg = registry(4);
    let emb = [1.0, 0.0, 0.0, 0.0];
    reg.register(&emb, Some("A"), meta("Alice")).await.unwrap();

    reg.delete("A").await.unwrap();

    assert!(reg.search(&emb, 5, 0.0).await.unwrap().is_empty());
    assert!(reg.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_missing_id_is_noop() {
    let reg = registry(4);
    reg.delete("ghost").await.unwrap();
}

#[tokio::test]
async fn dimension_guard_runs_before_store_calls() {
    let reg = Registry::new(Arc::new(FailingIndex), RegistryConfig::new(512));
    let short = vec![0.0f32; 128];

    let err = reg.search(&short, 1, 0.0).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::DimensionMismatch { got: 128, want: 512 }
    ));

    let err = reg.register(&short, Some("A"), Metadata::new()).await.unwrap_err();
    assert!(matches!(err, RegistryError::DimensionMismatch { .. }));

    let err = reg
        .register_guarded(&short, None, Metadata::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::DimensionMismatch { .. }));
}

#[tokio::test]
async fn connect_rejects_mismatched_index() {
    let store = Arc::new(MemoryIndex::new(128));
    let err = Registry::connect(store, RegistryConfig::new(512))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::ConfigMismatch { index: 128, configured: 512 }
    ));
}

#[tokio::test]
async fn connect_accepts_matching_index() {
    let store = Arc::new(MemoryIndex::new(512));
    let reg = Registry::connect(store, RegistryConfig::new(512)).await.unwrap();
    assert_eq!(reg.config().dimension, 512);
}

#[tokio::test]
async fn example_scenario() {
    // dimension 4 stand-in for the spec's 512 walkthrough: register,
    // near-identical search, guarded refusal, delete, empty search.
    let reg = registry(4);
    reg.register(&[1.0, 0.0, 0.0, 0.0], Some("A"), meta("Alice"))
        .await
        .unwrap();

    let near = [0.97, 0.24, 0.0, 0.0]; // cos ≈ 0.97
    let matches = reg.search(&near, 3, 0.5).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "A");
    assert!(matches[0].score > 0.95);
    assert_eq!(matches[0].metadata, meta("Alice"));

    let err = reg.register_guarded(&near, None, meta("Alice?")).await.unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateFound { ref id, .. } if id.as_str() == "A"));

    reg.delete("A").await.unwrap();
    assert!(reg.search(&near, 3, 0.5).await.unwrap().is_empty());
}

#[test]
fn error_conversions_preserve_kind() {
    let e: RegistryError = faceid_embed::EmbedError::NoFaceDetected.into();
    assert!(matches!(e, RegistryError::NoFaceDetected));

    let e: RegistryError = faceid_embed::EmbedError::Api("boom".into()).into();
    assert!(matches!(e, RegistryError::Provider(_)));

    let e: RegistryError = VecError::DimensionMismatch { got: 1, want: 2 }.into();
    assert!(matches!(e, RegistryError::DimensionMismatch { got: 1, want: 2 }));

    let e: RegistryError = VecError::Api("down".into()).into();
    assert!(matches!(e, RegistryError::Store(_)));
}
