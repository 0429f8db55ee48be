use std::collections::HashMap;
use std::sync::RwLock;

use crate::cosine::cosine_similarity;
use crate::error::VecError;
use crate::vecstore::{IndexStats, Match, Page, Record, VectorIndex};

/// Page size for id enumeration, matching the remote store's default.
const LIST_PAGE_SIZE: usize = 100;

/// MemoryIndex is an in-memory VectorIndex using brute-force cosine
/// similarity. Intended for testing and small-scale use (< 1000 vectors).
pub struct MemoryIndex {
    dimension: usize,
    records: RwLock<HashMap<String, Record>>,
}

impl MemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, record: Record) -> Result<(), VecError> {
        if record.values.len() != self.dimension {
            return Err(VecError::DimensionMismatch {
                got: record.values.len(),
                want: self.dimension,
            });
        }
        let mut recs = self.records.write().unwrap();
        recs.insert(record.id.clone(), record);
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Match>, VecError> {
        if vector.len() != self.dimension {
            return Err(VecError::DimensionMismatch {
                got: vector.len(),
                want: self.dimension,
            });
        }
        let recs = self.records.read().unwrap();
        if recs.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }

        let mut results: Vec<Match> = recs
            .values()
            .map(|r| Match {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.values),
                metadata: r.metadata.clone(),
            })
            .collect();

        // Descending score, ascending id on ties.
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        if results.len() > top_k {
            results.truncate(top_k);
        }
        Ok(results)
    }

    async fn fetch(&self, ids: &[String]) -> Result<Vec<Record>, VecError> {
        let recs = self.records.read().unwrap();
        Ok(ids.iter().filter_map(|id| recs.get(id).cloned()).collect())
    }

    async fn delete(&self, id: &str) -> Result<(), VecError> {
        let mut recs = self.records.write().unwrap();
        recs.remove(id);
        Ok(())
    }

    async fn list_ids(&self, token: Option<&str>) -> Result<Page, VecError> {
        let recs = self.records.read().unwrap();
        let mut all: Vec<String> = recs.keys().cloned().collect();
        all.sort();

        // The token is the last id of the previous page.
        let start = match token {
            Some(t) => match all.binary_search(&t.to_string()) {
                Ok(i) => i + 1,
                Err(i) => i,
            },
            None => 0,
        };

        let end = (start + LIST_PAGE_SIZE).min(all.len());
        let ids = all[start..end].to_vec();
        let next = if end < all.len() {
            ids.last().cloned()
        } else {
            None
        };
        Ok(Page { ids, next })
    }

    async fn describe_stats(&self) -> Result<IndexStats, VecError> {
        let recs = self.records.read().unwrap();
        Ok(IndexStats {
            count: recs.len(),
            dimension: self.dimension,
        })
    }
}
