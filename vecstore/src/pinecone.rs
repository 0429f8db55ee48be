use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::VecError;
use crate::vecstore::{IndexStats, Match, Metadata, Page, Record, VectorIndex};

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const LIST_PAGE_SIZE: usize = 100;

/// How long to wait for a freshly created serverless index to become
/// queryable before giving up.
const READY_WAIT_ATTEMPTS: usize = 30;
const READY_WAIT_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for connecting to a Pinecone index.
pub struct PineconeConfig {
    pub api_key: String,
    pub index_name: String,
    pub dimension: usize,
}

impl PineconeConfig {
    pub fn new(api_key: &str, index_name: &str, dimension: usize) -> Self {
        Self {
            api_key: api_key.to_string(),
            index_name: index_name.to_string(),
            dimension,
        }
    }
}

/// PineconeIndex is a VectorIndex backed by a remote Pinecone
/// serverless index with cosine metric.
///
/// `connect` provisions the index when it does not exist yet and waits
/// for it to become ready; an existing index is reused as-is. No call
/// is retried: a single failure surfaces as `VecError::Api`.
pub struct PineconeIndex {
    client: Client,
    api_key: String,
    host: String,
    dimension: usize,
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: IndexSpec<'a>,
}

#[derive(Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Deserialize)]
struct IndexDescription {
    name: String,
    #[serde(default)]
    host: String,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Deserialize, Default)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Serialize)]
struct UpsertRequest {
    vectors: Vec<WireVector>,
}

#[derive(Serialize, Deserialize)]
struct WireVector {
    id: String,
    values: Vec<f32>,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<WireMatch>,
}

#[derive(Deserialize)]
struct WireMatch {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, WireVector>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [&'a str],
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    vectors: Vec<ListedId>,
    pagination: Option<Pagination>,
}

#[derive(Deserialize)]
struct ListedId {
    id: String,
}

#[derive(Deserialize)]
struct Pagination {
    next: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    total_vector_count: usize,
    #[serde(default)]
    dimension: usize,
}

impl PineconeIndex {
    /// Connect to the named index, creating it when absent.
    ///
    /// A new index is provisioned as serverless (aws/us-east-1) with
    /// cosine metric and the configured dimension, then polled until
    /// ready. An existing index is reused without any dimension check;
    /// the registry layer validates via `describe_stats`.
    pub async fn connect(cfg: PineconeConfig) -> Result<Self, VecError> {
        let client = Client::new();

        let existing = control_get_index(&client, &cfg.api_key, &cfg.index_name).await?;
        let host = match existing {
            Some(desc) => {
                debug!(index = %cfg.index_name, "reusing existing index");
                desc.host
            }
            None => {
                info!(index = %cfg.index_name, dimension = cfg.dimension, "creating index");
                create_index(&client, &cfg).await?;
                wait_ready(&client, &cfg.api_key, &cfg.index_name).await?
            }
        };

        if host.is_empty() {
            return Err(VecError::NotReady(format!(
                "index {} has no host yet",
                cfg.index_name
            )));
        }

        Ok(Self {
            client,
            api_key: cfg.api_key,
            host: format!("https://{host}"),
            dimension: cfg.dimension,
        })
    }

    fn check_dimension(&self, len: usize) -> Result<(), VecError> {
        if len != self.dimension {
            return Err(VecError::DimensionMismatch {
                got: len,
                want: self.dimension,
            });
        }
        Ok(())
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, VecError> {
        let url = format!("{}{path}", self.host);
        debug!(%url, "pinecone request");
        let resp = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| VecError::Api(e.to_string()))?;
        read_json(resp).await
    }

    async fn get_json<Q, R>(&self, path: &str, query: &Q) -> Result<R, VecError>
    where
        Q: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{path}", self.host);
        debug!(%url, "pinecone request");
        let resp = self
            .client
            .get(&url)
            .header("Api-Key", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| VecError::Api(e.to_string()))?;
        read_json(resp).await
    }
}

/// Query parameters for a fetch call. Ids are caller-chosen arbitrary
/// strings; handing them to the client as pairs gets them
/// percent-encoded instead of corrupting the query string.
fn fetch_params(ids: &[String]) -> Vec<(&'static str, &str)> {
    ids.iter().map(|id| ("ids", id.as_str())).collect()
}

fn list_params(token: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![("limit", LIST_PAGE_SIZE.to_string())];
    if let Some(t) = token {
        params.push(("paginationToken", t.to_string()));
    }
    params
}

async fn read_json<R: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<R, VecError> {
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(VecError::Api(format!("HTTP {status}: {body}")));
    }
    resp.json().await.map_err(|e| VecError::Api(e.to_string()))
}

async fn control_get_index(
    client: &Client,
    api_key: &str,
    name: &str,
) -> Result<Option<IndexDescription>, VecError> {
    let url = format!("{CONTROL_PLANE_URL}/indexes");
    let resp = client
        .get(&url)
        .header("Api-Key", api_key)
        .send()
        .await
        .map_err(|e| VecError::Api(e.to_string()))?;
    let list: IndexList = read_json(resp).await?;
    Ok(list.indexes.into_iter().find(|d| d.name == name))
}

async fn create_index(client: &Client, cfg: &PineconeConfig) -> Result<(), VecError> {
    let url = format!("{CONTROL_PLANE_URL}/indexes");
    let body = CreateIndexRequest {
        name: &cfg.index_name,
        dimension: cfg.dimension,
        metric: "cosine",
        spec: IndexSpec {
            serverless: ServerlessSpec {
                cloud: "aws",
                region: "us-east-1",
            },
        },
    };
    let resp = client
        .post(&url)
        .header("Api-Key", &cfg.api_key)
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| VecError::Api(e.to_string()))?;
    let _: serde_json::Value = read_json(resp).await?;
    Ok(())
}

/// Poll until the index reports ready, returning its host.
/// Newly created serverless indexes may take a few seconds to come up.
async fn wait_ready(client: &Client, api_key: &str, name: &str) -> Result<String, VecError> {
    for _ in 0..READY_WAIT_ATTEMPTS {
        if let Some(desc) = control_get_index(client, api_key, name).await? {
            if desc.status.ready && !desc.host.is_empty() {
                return Ok(desc.host);
            }
        }
        tokio::time::sleep(READY_WAIT_INTERVAL).await;
    }
    Err(VecError::NotReady(format!(
        "index {name} did not become ready"
    )))
}

#[async_trait::async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, record: Record) -> Result<(), VecError> {
        self.check_dimension(record.values.len())?;
        let body = UpsertRequest {
            vectors: vec![WireVector {
                id: record.id,
                values: record.values,
                metadata: record.metadata,
            }],
        };
        let _: serde_json::Value = self.post_json("/vectors/upsert", &body).await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Match>, VecError> {
        self.check_dimension(vector.len())?;
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
        };
        let resp: QueryResponse = self.post_json("/query", &body).await?;
        Ok(resp
            .matches
            .into_iter()
            .map(|m| Match {
                id: m.id,
                // Cosine scores can dip below 0; clamp to the [0, 1] contract.
                score: m.score.clamp(0.0, 1.0),
                metadata: m.metadata,
            })
            .collect())
    }

    async fn fetch(&self, ids: &[String]) -> Result<Vec<Record>, VecError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let resp: FetchResponse = self.get_json("/vectors/fetch", &fetch_params(ids)).await?;
        Ok(resp
            .vectors
            .into_values()
            .map(|v| Record {
                id: v.id,
                values: v.values,
                metadata: v.metadata,
            })
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<(), VecError> {
        let body = DeleteRequest { ids: &[id] };
        let _: serde_json::Value = self.post_json("/vectors/delete", &body).await?;
        Ok(())
    }

    async fn list_ids(&self, token: Option<&str>) -> Result<Page, VecError> {
        let resp: ListResponse = self.get_json("/vectors/list", &list_params(token)).await?;
        Ok(Page {
            ids: resp.vectors.into_iter().map(|v| v.id).collect(),
            next: resp.pagination.and_then(|p| p.next),
        })
    }

    async fn describe_stats(&self) -> Result<IndexStats, VecError> {
        let resp: StatsResponse = self
            .post_json("/describe_index_stats", &serde_json::json!({}))
            .await?;
        Ok(IndexStats {
            count: resp.total_vector_count,
            dimension: resp.dimension,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_params_encode_reserved_chars() {
        let ids = vec!["a b".to_string(), "x&y=z".to_string()];
        let url =
            reqwest::Url::parse_with_params("https://idx.test/vectors/fetch", fetch_params(&ids))
                .unwrap();
        assert_eq!(url.query(), Some("ids=a+b&ids=x%26y%3Dz"));
    }

    #[test]
    fn list_params_default_and_token() {
        let url =
            reqwest::Url::parse_with_params("https://idx.test/vectors/list", list_params(None))
                .unwrap();
        assert_eq!(url.query(), Some("limit=100"));

        let url = reqwest::Url::parse_with_params(
            "https://idx.test/vectors/list",
            list_params(Some("tok en#1")),
        )
        .unwrap();
        assert_eq!(url.query(), Some("limit=100&paginationToken=tok+en%231"));
    }
}
