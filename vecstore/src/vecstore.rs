use std::collections::HashMap;

use crate::error::VecError;

/// Arbitrary string/scalar fields attached to a stored vector.
pub type Metadata = HashMap<String, serde_json::Value>;

/// A stored vector with its identifier and metadata.
#[derive(Debug, Clone)]
pub struct Record {
    /// Unique identifier of the vector.
    pub id: String,

    /// The vector values.
    pub values: Vec<f32>,

    /// Metadata stored alongside the vector.
    pub metadata: Metadata,
}

/// Match is a single result from a vector similarity search.
#[derive(Debug, Clone)]
pub struct Match {
    /// Identifier of the matched vector.
    pub id: String,

    /// Cosine similarity in `[0, 1]`. Higher values indicate higher
    /// similarity, 1 means identical direction.
    pub score: f32,

    /// Metadata of the matched vector.
    pub metadata: Metadata,
}

/// One page of an id enumeration.
#[derive(Debug, Clone)]
pub struct Page {
    /// Ids in this page, in store-defined order.
    pub ids: Vec<String>,

    /// Opaque continuation token. None when this is the last page.
    pub next: Option<String>,
}

/// Index-level statistics.
#[derive(Debug, Clone, Copy)]
pub struct IndexStats {
    /// Number of stored vectors.
    pub count: usize,

    /// Vector dimension of the index. 0 when the backing store has not
    /// fixed a dimension yet.
    pub dimension: usize,
}

/// VectorIndex is the interface for similarity search over dense
/// float32 vectors with attached metadata.
///
/// All implementations must be safe for concurrent use (Send + Sync).
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Add or fully replace a vector keyed by its id. Metadata is
    /// replaced, never merged.
    async fn upsert(&self, record: Record) -> Result<(), VecError>;

    /// Return the top-k most similar vectors to the query, ordered by
    /// descending score, with metadata included.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Match>, VecError>;

    /// Fetch records by id. Absent ids are omitted from the result.
    async fn fetch(&self, ids: &[String]) -> Result<Vec<Record>, VecError>;

    /// Remove a vector by id. No error if the id does not exist.
    async fn delete(&self, id: &str) -> Result<(), VecError>;

    /// Return one page of stored ids. Pass the previous page's `next`
    /// token to continue; None starts from the beginning.
    async fn list_ids(&self, token: Option<&str>) -> Result<Page, VecError>;

    /// Return the number of stored vectors and the index dimension.
    async fn describe_stats(&self) -> Result<IndexStats, VecError>;
}
