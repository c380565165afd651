//! Vector index client
//!
//! Pinecone-style REST client: sends an embedded query vector to the index
//! `/query` endpoint and returns the matched passage texts, most relevant
//! first. Results are consumed per request and never persisted.

use crate::error::ChatError;
use crate::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

/// Connection-pooled client for one vector index host.
pub struct VectorIndexClient {
    client: Client,
    api_key: String,
    query_url: String,
}

impl VectorIndexClient {
    pub fn new(api_key: String, index_host: String) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ChatError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let host = index_host.trim_end_matches('/');
        let query_url = if host.starts_with("http") {
            format!("{}/query", host)
        } else {
            format!("https://{}/query", host)
        };

        Ok(Self {
            client,
            api_key,
            query_url,
        })
    }

    /// Top-K similarity search within a namespace. Returns passage texts in
    /// relevance order; matches without text metadata are skipped.
    pub async fn query(
        &self,
        vector: &[f32],
        namespace: &str,
        top_k: usize,
    ) -> Result<Vec<String>> {
        let request = QueryRequest {
            vector: vector.to_vec(),
            top_k,
            namespace: namespace.to_string(),
            include_metadata: true,
        };

        let response = self
            .client
            .post(&self.query_url)
            .header("Api-Key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Vector index request failed: {}", e);
                ChatError::Retrieval(format!("Vector index error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Vector index error response: {}", error_text);
            return Err(ChatError::Retrieval(format!(
                "Vector index error: {}",
                error_text
            )));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Retrieval(format!("Vector index parse error: {}", e)))?;

        let passages = extract_passages(body.matches);
        info!(namespace, count = passages.len(), "Similarity search completed");
        Ok(passages)
    }
}

fn extract_passages(matches: Vec<IndexMatch>) -> Vec<String> {
    matches
        .into_iter()
        .filter_map(|m| {
            m.metadata
                .and_then(|meta| meta.get("text").and_then(Value::as_str).map(String::from))
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: usize,
    namespace: String,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<IndexMatch>,
}

#[derive(Debug, Deserialize)]
struct IndexMatch {
    #[allow(dead_code)]
    id: String,
    metadata: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_request_serialization() {
        let request = QueryRequest {
            vector: vec![0.1, 0.2],
            top_k: 5,
            namespace: "science".to_string(),
            include_metadata: true,
        };

        let body = serde_json::to_string(&request).unwrap();
        assert!(body.contains("\"topK\":5"));
        assert!(body.contains("\"namespace\":\"science\""));
        assert!(body.contains("\"includeMetadata\":true"));
    }

    #[test]
    fn test_extract_passages_preserves_order() {
        let matches = vec![
            IndexMatch {
                id: "a".into(),
                metadata: Some(json!({ "text": "first passage" })),
            },
            IndexMatch {
                id: "b".into(),
                metadata: Some(json!({ "text": "second passage" })),
            },
        ];

        let passages = extract_passages(matches);
        assert_eq!(passages, vec!["first passage", "second passage"]);
    }

    #[test]
    fn test_extract_passages_skips_missing_metadata() {
        let matches = vec![
            IndexMatch {
                id: "a".into(),
                metadata: None,
            },
            IndexMatch {
                id: "b".into(),
                metadata: Some(json!({ "score_only": 1.0 })),
            },
            IndexMatch {
                id: "c".into(),
                metadata: Some(json!({ "text": "kept" })),
            },
        ];

        assert_eq!(extract_passages(matches), vec!["kept"]);
    }

    #[test]
    fn test_parse_query_response() {
        let raw = r#"{
            "matches": [
                { "id": "doc-1", "score": 0.93, "metadata": { "text": "Cells divide." } }
            ]
        }"#;

        let parsed: QueryResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_passages(parsed.matches), vec!["Cells divide."]);
    }

    #[test]
    fn test_host_normalization() {
        let client =
            VectorIndexClient::new("key".into(), "my-index.svc.pinecone.io/".into()).unwrap();
        assert_eq!(client.query_url, "https://my-index.svc.pinecone.io/query");

        let client = VectorIndexClient::new("key".into(), "http://localhost:9000".into()).unwrap();
        assert_eq!(client.query_url, "http://localhost:9000/query");
    }
}
