use crate::error::{ApiError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Text to fixed-dimension vector. The catalog build aborts on the first
/// failure; a partially embedded catalog is never indexed.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone)]
pub struct GeminiEmbedder {
    client: Client,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    content: ContentPayload,
    #[serde(rename = "taskType")]
    task_type: String,
}

#[derive(Debug, Serialize)]
struct ContentPayload {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiEmbedder {
    pub fn new(api_key: &str, model: &str, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: qualify_model(model),
        })
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            content: ContentPayload {
                parts: vec![TextPart {
                    text: text.to_string(),
                }],
            },
            task_type: "RETRIEVAL_DOCUMENT".to_string(),
        };

        debug!("Requesting embedding for {} chars of text", text.len());
        let url = format!(
            "{}/{}:embedContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        );
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ApiError::EmbeddingUnavailable(format!("Embedding request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Embedding API returned {}: {}", status, error_text);
            return Err(ApiError::EmbeddingUnavailable(format!(
                "Embedding API returned {}",
                status
            )));
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            ApiError::EmbeddingUnavailable(format!("Malformed embedding response: {}", e))
        })?;

        Ok(parsed.embedding.values)
    }
}

/// The REST path wants "models/<name>"; config may carry either form.
fn qualify_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify_model() {
        assert_eq!(
            qualify_model("text-embedding-004"),
            "models/text-embedding-004"
        );
        assert_eq!(
            qualify_model("models/text-embedding-004"),
            "models/text-embedding-004"
        );
    }

    #[test]
    fn test_embed_request_wire_shape() {
        let request = EmbedRequest {
            content: ContentPayload {
                parts: vec![TextPart {
                    text: "Name: Camry".to_string(),
                }],
            },
            task_type: "RETRIEVAL_DOCUMENT".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["taskType"], "RETRIEVAL_DOCUMENT");
        assert_eq!(json["content"]["parts"][0]["text"], "Name: Camry");
    }
}
