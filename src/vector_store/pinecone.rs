//! Pinecone REST adapter (control plane plus index data plane).

use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{IndexSpec, Metadata, Metric, QueryMatch, VectorRecord, VectorStore, MAX_UPSERT_BATCH};
use crate::error::{ConfigError, VectorStoreError};
use crate::http;

const API_VERSION: &str = "2024-07";
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Serverless placement used when the index has to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerlessSpec {
    /// Cloud provider (`aws`, `gcp`, `azure`).
    pub cloud: String,
    /// Provider region.
    pub region: String,
}

impl Default for ServerlessSpec {
    fn default() -> Self {
        Self {
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

/// Blocking Pinecone client bound to one index.
///
/// The data-plane host is resolved on first use through the describe endpoint
/// and cached for the lifetime of the adapter.
pub struct PineconeStore {
    client: Client,
    control_url: String,
    index_name: String,
    serverless: ServerlessSpec,
    ready_timeout: Duration,
    host: OnceLock<String>,
}

impl PineconeStore {
    /// Builds an adapter for `index_name`.
    pub fn new(
        api_key: &str,
        control_url: &str,
        index_name: &str,
        serverless: ServerlessSpec,
        timeout: Duration,
        ready_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::Missing("Pinecone API key"));
        }
        if index_name.trim().is_empty() {
            return Err(ConfigError::Missing("Pinecone index name"));
        }
        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|_| ConfigError::InvalidCredential("Pinecone API key"))?,
        );
        headers.insert(
            "x-pinecone-api-version",
            HeaderValue::from_static(API_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self {
            client,
            control_url: http::endpoint("Pinecone control plane", control_url, "")?
                .trim_end_matches('/')
                .to_string(),
            index_name: index_name.trim().to_string(),
            serverless,
            ready_timeout,
            host: OnceLock::new(),
        })
    }

    /// Names of all indexes in the project.
    pub fn list_indexes(&self) -> Result<Vec<String>, VectorStoreError> {
        let resp = self
            .client
            .get(format!("{}/indexes", self.control_url))
            .send()
            .map_err(|err| VectorStoreError::new("list_indexes", err.to_string()))?;
        let list: IndexList = read_json("list_indexes", resp)?;
        Ok(list.indexes.into_iter().map(|model| model.name).collect())
    }

    /// Describes one index; `Ok(None)` when it does not exist.
    pub fn describe_index(&self, name: &str) -> Result<Option<IndexModel>, VectorStoreError> {
        let resp = self
            .client
            .get(format!("{}/indexes/{}", self.control_url, name))
            .send()
            .map_err(|err| VectorStoreError::new("describe_index", err.to_string()))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_json("describe_index", resp).map(Some)
    }

    /// Creates a serverless index. A concurrent creation (409) counts as success.
    pub fn create_index(&self, spec: &IndexSpec) -> Result<(), VectorStoreError> {
        let body = CreateIndexRequest {
            name: &spec.name,
            dimension: spec.dimension,
            metric: spec.metric,
            spec: CreateIndexSpec {
                serverless: &self.serverless,
            },
        };
        let resp = self
            .client
            .post(format!("{}/indexes", self.control_url))
            .json(&body)
            .send()
            .map_err(|err| VectorStoreError::new("create_index", err.to_string()))?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::CONFLICT {
            return Ok(());
        }
        Err(VectorStoreError::new(
            "create_index",
            format!("{}: {}", status, http::body_or_placeholder(resp)),
        ))
    }

    fn wait_until_ready(&self, name: &str) -> Result<IndexModel, VectorStoreError> {
        let started = Instant::now();
        loop {
            if let Some(model) = self.describe_index(name)? {
                if model.status.as_ref().map(|s| s.ready).unwrap_or(false) {
                    return Ok(model);
                }
            }
            if started.elapsed() >= self.ready_timeout {
                return Err(VectorStoreError::new(
                    "create_index",
                    format!("index '{name}' not ready after {:?}", self.ready_timeout),
                ));
            }
            tracing::debug!(index = name, "waiting for index to become ready");
            thread::sleep(READY_POLL_INTERVAL);
        }
    }

    /// Data-plane base URL, resolving it when needed. `Ok(None)` if the index is missing.
    fn data_host(&self, operation: &'static str) -> Result<Option<&str>, VectorStoreError> {
        if let Some(host) = self.host.get() {
            return Ok(Some(host.as_str()));
        }
        let Some(model) = self
            .describe_index(&self.index_name)
            .map_err(|err| VectorStoreError::new(operation, err.detail))?
        else {
            return Ok(None);
        };
        Ok(Some(self.host.get_or_init(|| host_url(&model.host)).as_str()))
    }
}

fn host_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", host.trim_end_matches('/'))
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(
    operation: &'static str,
    resp: reqwest::blocking::Response,
) -> Result<T, VectorStoreError> {
    let status = resp.status();
    let body = http::body_or_placeholder(resp);
    if !status.is_success() {
        return Err(VectorStoreError::new(operation, format!("{status}: {body}")));
    }
    serde_json::from_str(&body)
        .map_err(|err| VectorStoreError::new(operation, format!("invalid response: {err}")))
}

impl VectorStore for PineconeStore {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    fn ensure_index(&self, spec: &IndexSpec) -> Result<(), VectorStoreError> {
        if spec.name != self.index_name {
            return Err(VectorStoreError::new(
                "ensure_index",
                format!(
                    "adapter is bound to index '{}', not '{}'",
                    self.index_name, spec.name
                ),
            ));
        }
        let existing = self.list_indexes()?;
        let model = if existing.iter().any(|name| name == &spec.name) {
            tracing::info!(index = %spec.name, "using existing index");
            self.describe_index(&spec.name)?.ok_or_else(|| {
                VectorStoreError::new("ensure_index", format!("index '{}' vanished", spec.name))
            })?
        } else {
            tracing::info!(index = %spec.name, dimension = spec.dimension, "creating index");
            self.create_index(spec)?;
            self.wait_until_ready(&spec.name)?
        };
        validate_model(spec, &model)?;
        let _ = self.host.set(host_url(&model.host));
        Ok(())
    }

    fn upsert_batch(&self, records: &[VectorRecord]) -> Result<(), VectorStoreError> {
        if records.is_empty() {
            return Ok(());
        }
        if records.len() > MAX_UPSERT_BATCH {
            return Err(VectorStoreError::new(
                "upsert",
                format!("batch of {} exceeds {}", records.len(), MAX_UPSERT_BATCH),
            ));
        }
        let host = self.data_host("upsert")?.ok_or_else(|| {
            VectorStoreError::new("upsert", format!("index '{}' does not exist", self.index_name))
        })?;
        let body = UpsertRequest { vectors: records };
        let resp = self
            .client
            .post(format!("{host}/vectors/upsert"))
            .json(&body)
            .send()
            .map_err(|err| VectorStoreError::new("upsert", err.to_string()))?;
        let parsed: UpsertResponse = read_json("upsert", resp)?;
        if parsed.upserted_count != records.len() {
            return Err(VectorStoreError::new(
                "upsert",
                format!(
                    "backend acknowledged {} of {} records",
                    parsed.upserted_count,
                    records.len()
                ),
            ));
        }
        Ok(())
    }

    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let Some(host) = self.data_host("query")? else {
            tracing::warn!(index = %self.index_name, "query against missing index");
            return Ok(Vec::new());
        };
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata,
            include_values: false,
        };
        let resp = self
            .client
            .post(format!("{host}/query"))
            .json(&body)
            .send()
            .map_err(|err| VectorStoreError::new("query", err.to_string()))?;
        let parsed: QueryResponse = read_json("query", resp)?;
        Ok(parsed.into_matches())
    }
}

fn validate_model(spec: &IndexSpec, model: &IndexModel) -> Result<(), VectorStoreError> {
    if let Some(dimension) = model.dimension {
        if dimension != spec.dimension {
            return Err(VectorStoreError::new(
                "ensure_index",
                format!(
                    "index '{}' has dimension {}, embedder produces {}",
                    spec.name, dimension, spec.dimension
                ),
            ));
        }
    }
    if let Some(metric) = model.metric {
        if metric != spec.metric {
            return Err(VectorStoreError::new(
                "ensure_index",
                format!(
                    "index '{}' uses metric {:?}, expected {:?}",
                    spec.name, metric, spec.metric
                ),
            ));
        }
    }
    Ok(())
}

/// Index description returned by the control plane.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexModel {
    /// Index name.
    pub name: String,
    /// Vector dimensionality, absent for sparse indexes.
    #[serde(default)]
    pub dimension: Option<usize>,
    /// Similarity metric.
    #[serde(default)]
    pub metric: Option<Metric>,
    /// Data-plane host name.
    pub host: String,
    /// Provisioning status.
    #[serde(default)]
    pub status: Option<IndexStatus>,
}

/// Provisioning status of an index.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexStatus {
    /// True once the index accepts reads and writes.
    pub ready: bool,
    /// Backend state label (`Initializing`, `Ready`, ...).
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: Metric,
    spec: CreateIndexSpec<'a>,
}

#[derive(Serialize)]
struct CreateIndexSpec<'a> {
    serverless: &'a ServerlessSpec,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<WireMatch>,
}

#[derive(Debug, Deserialize)]
struct WireMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Metadata>,
}

impl QueryResponse {
    /// Keeps the backend's relevance order; score direction depends on the metric.
    fn into_matches(self) -> Vec<QueryMatch> {
        self.matches
            .into_iter()
            .map(|m| QueryMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> IndexSpec {
        IndexSpec {
            name: "myind".into(),
            dimension: 1536,
            metric: Metric::Cosine,
        }
    }

    #[test]
    fn parses_index_list_and_validates_shape() {
        let body = r#"{"indexes": [{
            "name": "myind",
            "dimension": 1536,
            "metric": "cosine",
            "host": "myind-abc123.svc.aped-4627-b74a.pinecone.io",
            "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}},
            "status": {"ready": true, "state": "Ready"}
        }]}"#;
        let list: IndexList = serde_json::from_str(body).unwrap();
        let model = &list.indexes[0];
        assert!(validate_model(&spec(), model).is_ok());
        assert_eq!(
            host_url(&model.host),
            "https://myind-abc123.svc.aped-4627-b74a.pinecone.io"
        );

        let mut wrong = model.clone();
        wrong.dimension = Some(384);
        let err = validate_model(&spec(), &wrong).unwrap_err();
        assert!(err.detail.contains("384"));

        wrong.dimension = Some(1536);
        wrong.metric = Some(Metric::Euclidean);
        assert!(validate_model(&spec(), &wrong).is_err());
    }

    #[test]
    fn query_response_keeps_backend_order_and_metadata() {
        // euclidean index: smaller distances come first
        let body = r#"{
            "matches": [
                {"id": "7", "score": 0.10, "metadata": {"text": "best"}},
                {"id": "3", "score": 0.42, "metadata": {"text": "later"}},
                {"id": "9", "score": 0.91}
            ],
            "namespace": ""
        }"#;
        let parsed: QueryResponse = serde_json::from_str(body).unwrap();
        let matches = parsed.into_matches();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["7", "3", "9"]);
        assert_eq!(matches[0].text(), Some("best"));
        assert_eq!(matches[2].text(), None);
    }

    #[test]
    fn empty_query_response_is_not_an_error() {
        let parsed: QueryResponse = serde_json::from_str(r#"{"namespace": ""}"#).unwrap();
        assert!(parsed.into_matches().is_empty());
    }

    #[test]
    fn wire_requests_use_camel_case() {
        let vector = [0.5f32, 0.25];
        let query = QueryRequest {
            vector: &vector,
            top_k: 10,
            include_metadata: true,
            include_values: false,
        };
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["topK"], 10);
        assert_eq!(json["includeMetadata"], true);

        let records = vec![VectorRecord::with_text("42", vec![0.1], "the quick brown fox")];
        let json = serde_json::to_value(UpsertRequest { vectors: &records }).unwrap();
        assert_eq!(json["vectors"][0]["id"], "42");
        assert_eq!(json["vectors"][0]["metadata"]["text"], "the quick brown fox");

        let serverless = ServerlessSpec::default();
        let spec = spec();
        let create = CreateIndexRequest {
            name: &spec.name,
            dimension: spec.dimension,
            metric: spec.metric,
            spec: CreateIndexSpec {
                serverless: &serverless,
            },
        };
        let json = serde_json::to_value(&create).unwrap();
        assert_eq!(json["spec"]["serverless"]["region"], "us-east-1");
        assert_eq!(json["metric"], "cosine");
    }

    #[test]
    fn rejects_blank_index_name() {
        let result = PineconeStore::new(
            "key",
            "https://api.pinecone.io",
            " ",
            ServerlessSpec::default(),
            Duration::from_secs(30),
            Duration::from_secs(60),
        );
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }
}
