//! Elasticsearch-backed vector index and profile store.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{IndexError, IndexSchema, KnnQuery, SOURCE_FIELDS, VECTOR_FIELD, VectorIndex};
use crate::document::{DocumentId, EmbeddedDocument, Hit};
use crate::query::ProfileStore;
use crate::vector::VectorDimension;

/// Blocking client for one article index and its companion profile index.
///
/// Only transport failures (connect, timeout) and 429/5xx responses are
/// retried, with exponential backoff, inside a single request. Nothing here
/// retries a whole pipeline run.
#[derive(Debug, Clone)]
pub struct ElasticIndex {
    client: Client,
    base_url: String,
    index: String,
    profile_index: String,
    max_retries: usize,
}

impl ElasticIndex {
    /// Builds a client for `index` at `base_url`.
    ///
    /// # Arguments
    /// * `base_url` - Cluster URL, e.g. `http://localhost:9200`
    /// * `index` - Article index name
    /// * `profile_index` - Index holding `profile_vector` documents keyed by user id
    pub fn new(
        base_url: &str,
        index: impl Into<String>,
        profile_index: impl Into<String>,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self, IndexError> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(IndexError::Unreachable {
                url: base_url.to_string(),
                reason: "index URL must be an http(s) URL".to_string(),
            });
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| IndexError::Unreachable {
                url: base_url.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.into(),
            profile_index: profile_index.into(),
            max_retries: max_retries.max(1),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends the request built by `build`, retrying transport failures.
    fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, IndexError> {
        let mut attempt = 0usize;
        loop {
            match build().send() {
                Ok(resp) => {
                    let status = resp.status();
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        debug!(%status, attempt, "Retrying index request");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if (err.is_connect() || err.is_timeout()) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(attempt, "Index service request failed, retrying: {err}");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(IndexError::Unreachable {
                        url: self.base_url.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    /// Sends a request that must succeed and decodes its JSON body.
    fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        operation: &'static str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<T, IndexError> {
        let resp = self.send(build)?;
        let resp = ensure_success(operation, resp)?;
        resp.json()
            .map_err(|e| IndexError::InvalidResponse(format!("{operation}: {e}")))
    }
}

impl VectorIndex for ElasticIndex {
    fn schema(&self) -> Result<Option<IndexSchema>, IndexError> {
        let url = self.url(&format!("{}/_mapping", self.index));
        let resp = self.send(|| self.client.get(&url))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = ensure_success("get mapping", resp)?
            .json()
            .map_err(|e| IndexError::InvalidResponse(format!("get mapping: {e}")))?;
        parse_mapping_dims(&body).map(|dims| Some(IndexSchema { dims }))
    }

    fn create(&self, schema: IndexSchema) -> Result<(), IndexError> {
        let url = self.url(&self.index);
        let body = mapping_body(schema.dims);
        let resp = self.send(|| self.client.put(&url).json(&body))?;
        if resp.status() == StatusCode::BAD_REQUEST {
            let text = resp.text().unwrap_or_default();
            if text.contains("resource_already_exists_exception") {
                return Ok(());
            }
            return Err(IndexError::Rejected {
                operation: "create index",
                status: StatusCode::BAD_REQUEST.as_u16(),
                body: text,
            });
        }
        ensure_success("create index", resp)?;
        debug!(index = %self.index, dims = %schema.dims, "Created index");
        Ok(())
    }

    fn drop_index(&self) -> Result<(), IndexError> {
        let url = self.url(&self.index);
        let resp = self.send(|| self.client.delete(&url))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success("drop index", resp)?;
        Ok(())
    }

    fn delete_all(&self) -> Result<u64, IndexError> {
        let url = self.url(&format!(
            "{}/_delete_by_query?refresh=true&conflicts=proceed",
            self.index
        ));
        let body = json!({ "query": { "match_all": {} } });
        let resp: DeleteByQueryResponse =
            self.send_json("delete by query", || self.client.post(&url).json(&body))?;
        Ok(resp.deleted)
    }

    fn upsert(&self, entry: &EmbeddedDocument) -> Result<(), IndexError> {
        let url = self.url(&format!("{}/_doc/{}", self.index, entry.id));
        let body = EntryBody::from(entry);
        let resp = self.send(|| self.client.put(&url).json(&body))?;
        ensure_success("index document", resp)?;
        Ok(())
    }

    fn refresh(&self) -> Result<(), IndexError> {
        let url = self.url(&format!("{}/_refresh", self.index));
        let resp = self.send(|| self.client.post(&url))?;
        ensure_success("refresh", resp)?;
        Ok(())
    }

    fn knn(&self, query: &KnnQuery) -> Result<Vec<Hit>, IndexError> {
        let url = self.url(&format!("{}/_search", self.index));
        let body = knn_body(query);
        let resp = self.send(|| self.client.post(&url).json(&body))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(IndexError::MissingIndex {
                name: self.index.clone(),
            });
        }
        let resp: SearchResponse = ensure_success("search", resp)?
            .json()
            .map_err(|e| IndexError::InvalidResponse(format!("search: {e}")))?;
        Ok(resp.into_hits())
    }

    fn count(&self) -> Result<u64, IndexError> {
        let url = self.url(&format!("{}/_count", self.index));
        let resp = self.send(|| self.client.get(&url))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(IndexError::MissingIndex {
                name: self.index.clone(),
            });
        }
        let resp: CountResponse = ensure_success("count", resp)?
            .json()
            .map_err(|e| IndexError::InvalidResponse(format!("count: {e}")))?;
        Ok(resp.count)
    }
}

impl ProfileStore for ElasticIndex {
    fn profile_vector(&self, user_id: i64) -> Result<Option<Vec<f32>>, IndexError> {
        let url = self.url(&format!(
            "{}/_doc/{user_id}?_source=profile_vector",
            self.profile_index
        ));
        let resp = self.send(|| self.client.get(&url))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let doc: ProfileDocument = ensure_success("get profile", resp)?
            .json()
            .map_err(|e| IndexError::InvalidResponse(format!("get profile: {e}")))?;
        Ok(doc.into_vector())
    }
}

fn ensure_success(operation: &'static str, resp: Response) -> Result<Response, IndexError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp
        .text()
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(IndexError::Rejected {
        operation,
        status: status.as_u16(),
        body,
    })
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(200 * (1 << capped))
}

/// Index mapping for article entries of width `dims`.
///
/// `id` is mapped as `long` to hold the full `DocumentId` range.
fn mapping_body(dims: VectorDimension) -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": { "type": "long" },
                "title": { "type": "text" },
                "created_at": { "type": "date" },
                VECTOR_FIELD: {
                    "type": "dense_vector",
                    "dims": dims.get(),
                    "index": true,
                    "similarity": "cosine"
                }
            }
        }
    })
}

fn knn_body(query: &KnnQuery) -> Value {
    json!({
        "knn": {
            "field": query.field,
            "query_vector": query.vector,
            "k": query.k,
            "num_candidates": query.num_candidates
        },
        "size": query.k,
        "_source": SOURCE_FIELDS
    })
}

/// Reads the vector width out of a `GET /{index}/_mapping` response.
fn parse_mapping_dims(body: &Value) -> Result<VectorDimension, IndexError> {
    let dims = body
        .as_object()
        .and_then(|indices| indices.values().next())
        .and_then(|index| index.pointer(&format!("/mappings/properties/{VECTOR_FIELD}/dims")))
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            IndexError::InvalidResponse(format!("mapping has no dims for field '{VECTOR_FIELD}'"))
        })?;
    VectorDimension::new(dims as usize)
        .map_err(|e| IndexError::InvalidResponse(format!("mapping dims: {e}")))
}

#[derive(Serialize)]
struct EntryBody<'a> {
    id: i64,
    title: &'a str,
    created_at: DateTime<Utc>,
    vector: &'a [f32],
}

impl<'a> From<&'a EmbeddedDocument> for EntryBody<'a> {
    fn from(entry: &'a EmbeddedDocument) -> Self {
        Self {
            id: entry.id.get(),
            title: &entry.title,
            created_at: entry.created_at,
            vector: &entry.vector,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeleteByQueryResponse {
    #[serde(default)]
    deleted: u64,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f32>,
    #[serde(rename = "_source", default)]
    source: Option<HitSource>,
}

#[derive(Debug, Default, Deserialize)]
struct HitSource {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    title: Option<String>,
}

impl SearchResponse {
    fn into_hits(self) -> Vec<Hit> {
        self.hits
            .hits
            .into_iter()
            .filter_map(|raw| {
                let source = raw.source.unwrap_or_default();
                let id = source.id.or_else(|| raw.id.parse().ok())?;
                Some(Hit {
                    id: DocumentId::new(id),
                    title: source.title.unwrap_or_default(),
                    score: raw.score.unwrap_or(0.0),
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ProfileDocument {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Option<ProfileSource>,
}

#[derive(Debug, Deserialize)]
struct ProfileSource {
    #[serde(default)]
    profile_vector: Option<Vec<f32>>,
}

impl ProfileDocument {
    fn into_vector(self) -> Option<Vec<f32>> {
        if !self.found {
            return None;
        }
        self.source
            .and_then(|source| source.profile_vector)
            .filter(|vector| !vector.is_empty())
    }
}
