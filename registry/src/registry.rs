use std::sync::Arc;

use faceid_vecstore::{IndexStats, Metadata, Record, VectorIndex};
use tracing::debug;
use uuid::Uuid;

use crate::error::RegistryError;

/// Metadata is fetched in batches of this size when listing.
const FETCH_BATCH_SIZE: usize = 100;

/// Attempts at generating an unused auto id before giving up.
const MAX_ID_ATTEMPTS: usize = 5;

/// Controls registry behavior. Immutable for the registry's lifetime.
pub struct RegistryConfig {
    /// Embedding dimension (e.g. 512 for ArcFace, 128 for Facenet).
    /// Every stored or queried vector must have exactly this length.
    pub dimension: usize,

    /// Prepended to generated ids (e.g. "face" -> "face_a3f8c01d").
    /// Default: "face".
    pub id_prefix: String,

    /// Similarity above which a guarded registration is refused as a
    /// duplicate of an existing record. Default: 0.85.
    pub duplicate_threshold: f32,
}

impl RegistryConfig {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            id_prefix: "face".to_string(),
            duplicate_threshold: 0.85,
        }
    }

    pub fn with_id_prefix(mut self, prefix: &str) -> Self {
        self.id_prefix = prefix.to_string();
        self
    }

    pub fn with_duplicate_threshold(mut self, t: f32) -> Self {
        self.duplicate_threshold = t;
        self
    }
}

/// A search hit: the stored record's id and metadata plus its cosine
/// similarity to the query. The embedding itself is never returned.
#[derive(Debug, Clone)]
pub struct FaceMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Metadata,
}

/// One registered identity as seen by listing: id and metadata only.
#[derive(Debug, Clone)]
pub struct FaceEntry {
    pub id: String,
    pub metadata: Metadata,
}

/// Identity registry over a vector index.
///
/// Holds no mutable state of its own; all shared state lives in the
/// backing store, so the registry is freely shareable across tasks.
pub struct Registry {
    store: Arc<dyn VectorIndex>,
    cfg: RegistryConfig,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}

impl Registry {
    /// Creates a registry over an already connected store. No I/O.
    /// Panics if `cfg.dimension` is 0.
    pub fn new(store: Arc<dyn VectorIndex>, cfg: RegistryConfig) -> Self {
        assert!(cfg.dimension > 0, "registry: dimension must be positive");
        Self { store, cfg }
    }

    /// Creates a registry and validates it against the backing index:
    /// an index that already fixed a different dimension is rejected
    /// rather than reused.
    pub async fn connect(
        store: Arc<dyn VectorIndex>,
        cfg: RegistryConfig,
    ) -> Result<Self, RegistryError> {
        let reg = Self::new(store, cfg);
        let stats = reg.store.describe_stats().await?;
        if stats.dimension != 0 && stats.dimension != reg.cfg.dimension {
            return Err(RegistryError::ConfigMismatch {
                index: stats.dimension,
                configured: reg.cfg.dimension,
            });
        }
        Ok(reg)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.cfg
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), RegistryError> {
        if vector.len() != self.cfg.dimension {
            return Err(RegistryError::DimensionMismatch {
                got: vector.len(),
                want: self.cfg.dimension,
            });
        }
        Ok(())
    }

    /// Search the registry for faces similar to `query`.
    ///
    /// Retrieves the `top_k` nearest neighbors, then filters to those
    /// scoring at least `score_threshold`. The filter runs after
    /// retrieval: if all `top_k` neighbors fall below the threshold
    /// the result is empty, and no larger re-query is attempted —
    /// `top_k` is the caller's precision/recall knob.
    ///
    /// Results are ordered by descending score; ties break by
    /// ascending id. An empty result is a successful outcome.
    /// Read-only. `top_k` below 1 is clamped to 1.
    pub async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        score_threshold: f32,
    ) -> Result<Vec<FaceMatch>, RegistryError> {
        self.check_dimension(query)?;

        // Contract requires top_k >= 1; clamp so a zero from a
        // misconfigured caller cannot masquerade as "no matches".
        let top_k = top_k.max(1);
        let raw = self.store.query(query, top_k).await?;
        let mut matches: Vec<FaceMatch> = raw
            .into_iter()
            .filter(|m| m.score >= score_threshold)
            .map(|m| FaceMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata,
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        debug!(hits = matches.len(), top_k, score_threshold, "search");
        Ok(matches)
    }

    /// Register a face unconditionally: no duplicate check.
    ///
    /// With no `proposed_id` a fresh id is generated. Re-using an id
    /// fully replaces the stored embedding and metadata; fields are
    /// never merged. Either the complete record is durably stored or
    /// the call fails with nothing written.
    pub async fn register(
        &self,
        embedding: &[f32],
        proposed_id: Option<&str>,
        metadata: Metadata,
    ) -> Result<String, RegistryError> {
        self.check_dimension(embedding)?;

        let id = match proposed_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.generate_id().await?,
        };

        self.store
            .upsert(Record {
                id: id.clone(),
                values: embedding.to_vec(),
                metadata,
            })
            .await?;

        debug!(%id, "registered");
        Ok(id)
    }

    /// Register a face, refusing near-duplicates.
    ///
    /// Runs a top-1 search with the same embedding first; if the best
    /// existing record scores at or above the duplicate threshold the
    /// registration is refused with `DuplicateFound` carrying that
    /// record's id, score and metadata, and nothing is written.
    ///
    /// The check and the write are two store calls: two concurrent
    /// registrations of near-identical embeddings can both pass the
    /// check. Duplicate suppression is best-effort, not a strict
    /// consistency guarantee.
    pub async fn register_guarded(
        &self,
        embedding: &[f32],
        proposed_id: Option<&str>,
        metadata: Metadata,
    ) -> Result<String, RegistryError> {
        self.check_dimension(embedding)?;

        let best = self.store.query(embedding, 1).await?;
        if let Some(m) = best.into_iter().next() {
            if m.score >= self.cfg.duplicate_threshold {
                debug!(existing = %m.id, score = m.score, "duplicate refused");
                return Err(RegistryError::DuplicateFound {
                    id: m.id,
                    score: m.score,
                    metadata: m.metadata,
                });
            }
        }

        self.register(embedding, proposed_id, metadata).await
    }

    /// List every registered identity: id and metadata, embeddings
    /// excluded. Order is store-defined. An empty registry yields an
    /// empty vec.
    ///
    /// Drains the store's id pagination and fetches metadata in
    /// batches; neither page size leaks into the result.
    pub async fn list_all(&self) -> Result<Vec<FaceEntry>, RegistryError> {
        let mut ids: Vec<String> = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.store.list_ids(token.as_deref()).await?;
            ids.extend(page.ids);
            match page.next {
                Some(t) => token = Some(t),
                None => break,
            }
        }

        let mut entries = Vec::with_capacity(ids.len());
        for batch in ids.chunks(FETCH_BATCH_SIZE) {
            let records = self.store.fetch(batch).await?;
            entries.extend(records.into_iter().map(|r| FaceEntry {
                id: r.id,
                metadata: r.metadata,
            }));
        }

        debug!(count = entries.len(), "list_all");
        Ok(entries)
    }

    /// Delete a registered identity. Deleting an id that does not
    /// exist is a successful no-op, matching the store's semantics.
    pub async fn delete(&self, id: &str) -> Result<(), RegistryError> {
        self.store.delete(id).await?;
        debug!(%id, "deleted");
        Ok(())
    }

    /// Stored record count and index dimension.
    pub async fn stats(&self) -> Result<IndexStats, RegistryError> {
        Ok(self.store.describe_stats().await?)
    }

    /// Generate an id of the form "{prefix}_{8 hex}", verifying
    /// non-existence and retrying on collision.
    async fn generate_id(&self) -> Result<String, RegistryError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let suffix = Uuid::new_v4().simple().to_string();
            let id = format!("{}_{}", self.cfg.id_prefix, &suffix[..8]);
            if self.store.fetch(&[id.clone()]).await?.is_empty() {
                return Ok(id);
            }
        }
        Err(RegistryError::IdExhausted)
    }
}
