#[cfg(test)]
mod tests;

use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::{ChunkRecord, SearchResult, WeaviateMeta};
use crate::{RagError, config::Config};

/// Client for a Weaviate instance holding document chunks in a single class
#[derive(Debug, Clone)]
pub struct VectorStore {
    base_url: Url,
    class_name: String,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct SchemaResponse {
    #[serde(default)]
    classes: Vec<SchemaClass>,
}

#[derive(Debug, Deserialize)]
struct SchemaClass {
    class: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ChunkHit {
    #[serde(default)]
    content: String,
    doc_id: Option<String>,
    chunk_index: Option<i64>,
    #[serde(rename = "_additional")]
    additional: Option<HitAdditional>,
}

#[derive(Debug, Deserialize)]
struct HitAdditional {
    distance: Option<f32>,
}

impl VectorStore {
    /// Create a new VectorStore client
    ///
    /// # Arguments
    /// * `config` - Application configuration containing the Weaviate URL and class
    ///
    /// # Returns
    /// * `Result<Self, RagError>` - New VectorStore instance or error
    #[inline]
    pub fn new(config: &Config) -> Result<Self, RagError> {
        let base_url = config
            .weaviate_url()
            .map_err(|e| RagError::Config(format!("Invalid Weaviate URL: {}", e)))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.weaviate.timeout_seconds)))
            .http_status_as_error(false)
            .build()
            .into();

        debug!(
            "Using Weaviate at {} with class {}",
            base_url, config.weaviate.class_name
        );

        Ok(Self {
            base_url,
            class_name: config.weaviate.class_name.clone(),
            agent,
        })
    }

    #[inline]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Fetch server metadata; doubles as a reachability check
    #[inline]
    pub fn meta(&self) -> Result<WeaviateMeta, RagError> {
        let url = self.endpoint("v1/meta")?;
        let body = read_response("Weaviate meta request", self.agent.get(url.as_str()).call())?;

        serde_json::from_str(&body)
            .map_err(|e| RagError::Database(format!("Failed to parse Weaviate meta: {}", e)))
    }

    /// Check whether the chunk class is present in the schema
    #[inline]
    pub fn class_exists(&self) -> Result<bool, RagError> {
        let url = self.endpoint("v1/schema")?;
        let body = read_response("Weaviate schema request", self.agent.get(url.as_str()).call())?;

        let schema: SchemaResponse = serde_json::from_str(&body)
            .map_err(|e| RagError::Database(format!("Failed to parse Weaviate schema: {}", e)))?;

        Ok(schema.classes.iter().any(|c| c.class == self.class_name))
    }

    /// Create the chunk class if it does not exist yet
    ///
    /// # Returns
    /// * `Result<bool, RagError>` - Whether the class was created by this call
    #[inline]
    pub fn ensure_schema(&self) -> Result<bool, RagError> {
        if self.class_exists()? {
            debug!("Class {} already exists", self.class_name);
            return Ok(false);
        }

        info!("Creating Weaviate class {}", self.class_name);

        let class = json!({
            "class": self.class_name,
            "vectorizer": "none",
            "properties": [
                {"name": "content", "dataType": ["text"]},
                {"name": "doc_id", "dataType": ["text"]},
                {"name": "chunk_index", "dataType": ["int"]},
            ],
        });

        let url = self.endpoint("v1/schema")?;
        read_response(
            "Weaviate class creation",
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&class.to_string()),
        )?;

        Ok(true)
    }

    /// Insert one record with its explicit vector
    ///
    /// # Arguments
    /// * `record` - Chunk record to store
    ///
    /// # Returns
    /// * `Result<Uuid, RagError>` - Id of the stored object
    #[inline]
    pub fn insert(&self, record: &ChunkRecord) -> Result<Uuid, RagError> {
        let object = json!({
            "class": self.class_name,
            "id": record.id,
            "properties": {
                "content": record.content,
                "doc_id": record.doc_id,
                "chunk_index": record.chunk_index,
            },
            "vector": record.vector,
        });

        let url = self.endpoint("v1/objects")?;
        read_response(
            "Weaviate object insert",
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&object.to_string()),
        )?;

        debug!(
            "Stored chunk {} of {} as {}",
            record.chunk_index, record.doc_id, record.id
        );
        Ok(record.id)
    }

    /// Search for the stored chunks nearest to `query_vector`
    ///
    /// # Arguments
    /// * `query_vector` - The query embedding
    /// * `limit` - Maximum number of results to return
    ///
    /// # Returns
    /// * `Result<Vec<SearchResult>, RagError>` - At most `limit` results, closest first
    #[inline]
    pub fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchResult>, RagError> {
        debug!("Searching for similar vectors with limit: {}", limit);

        if limit == 0 {
            return Ok(Vec::new());
        }

        let vector = serde_json::to_string(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to serialize query vector: {}", e)))?;
        let query = format!(
            "{{ Get {{ {class}(nearVector: {{vector: {vector}}}, limit: {limit}) \
             {{ content doc_id chunk_index _additional {{ distance }} }} }} }}",
            class = self.class_name,
        );

        let Some(data) = self.graphql(&query)? else {
            return Ok(Vec::new());
        };

        let hits = match data.pointer(&format!("/Get/{}", self.class_name)) {
            Some(Value::Null) | None => Vec::new(),
            Some(value) => Vec::<ChunkHit>::deserialize(value).map_err(|e| {
                RagError::Database(format!("Failed to parse search results: {}", e))
            })?,
        };

        let mut results: Vec<SearchResult> = hits
            .into_iter()
            .map(|hit| SearchResult {
                content: hit.content,
                doc_id: hit.doc_id,
                chunk_index: hit.chunk_index.and_then(|i| u32::try_from(i).ok()),
                distance: hit.additional.and_then(|a| a.distance),
            })
            .collect();

        // Weaviate already orders by distance; keep that guaranteed for callers
        results.sort_by(|a, b| {
            a.distance
                .unwrap_or(f32::INFINITY)
                .total_cmp(&b.distance.unwrap_or(f32::INFINITY))
        });
        results.truncate(limit);

        debug!("Found {} similar chunks", results.len());
        Ok(results)
    }

    /// Number of objects stored in the chunk class
    #[inline]
    pub fn count(&self) -> Result<u64, RagError> {
        let query = format!(
            "{{ Aggregate {{ {class} {{ meta {{ count }} }} }} }}",
            class = self.class_name
        );

        let Some(data) = self.graphql(&query)? else {
            return Ok(0);
        };

        let count = data
            .pointer(&format!("/Aggregate/{}/0/meta/count", self.class_name))
            .and_then(Value::as_u64)
            .unwrap_or(0);

        debug!("Class {} holds {} objects", self.class_name, count);
        Ok(count)
    }

    /// Run a GraphQL query and return its `data`, or `None` when the class does not exist
    fn graphql(&self, query: &str) -> Result<Option<Value>, RagError> {
        let url = self.endpoint("v1/graphql")?;
        let body = read_response(
            "Weaviate GraphQL query",
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&json!({ "query": query }).to_string()),
        )?;

        let mut response: Value = serde_json::from_str(&body)
            .map_err(|e| RagError::Database(format!("Failed to parse GraphQL response: {}", e)))?;

        if let Some(errors) = response.get("errors").filter(|e| !e.is_null()) {
            let errors: Vec<GraphQlError> = Vec::deserialize(errors).unwrap_or_default();
            let missing_class = format!("Cannot query field \"{}\"", self.class_name);

            if errors.iter().any(|e| e.message.contains(&missing_class)) {
                debug!("Class {} does not exist yet", self.class_name);
                return Ok(None);
            }

            let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
            warn!("GraphQL query failed: {:?}", messages);
            return Err(RagError::Database(format!(
                "GraphQL query failed: {}",
                messages.join("; ")
            )));
        }

        Ok(Some(response.get_mut("data").map(Value::take).unwrap_or(Value::Null)))
    }

    fn endpoint(&self, path: &str) -> Result<Url, RagError> {
        self.base_url
            .join(path)
            .map_err(|e| RagError::Config(format!("Failed to build Weaviate URL: {}", e)))
    }
}

fn read_response(
    what: &str,
    result: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
) -> Result<String, RagError> {
    let mut response = result.map_err(|e| RagError::Network(format!("{} failed: {}", what, e)))?;
    let status = response.status();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| RagError::Network(format!("Failed to read {} response: {}", what, e)))?;

    if !status.is_success() {
        return Err(RagError::Database(format!(
            "{} failed with HTTP {}: {}",
            what,
            status.as_u16(),
            body.trim()
        )));
    }

    Ok(body)
}
