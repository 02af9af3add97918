//! Embedding provider contract and the HTTP implementation

use crate::config::EmbeddingConfig;
use crate::error::{MatcherError, Result};
use crate::model::EmbeddingVector;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Converts batches of text to fixed-dimension vectors.
///
/// Implementations return exactly one vector per input, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<EmbeddingVector>>;
}

/// Reject a provider response with the wrong count or dimension.
pub fn validate_batch(
    inputs: usize,
    outputs: &[EmbeddingVector],
    dimension: usize,
) -> Result<()> {
    if outputs.len() != inputs {
        return Err(MatcherError::Validation(format!(
            "Provider returned {} embeddings for {} inputs",
            outputs.len(),
            inputs
        )));
    }
    if let Some((idx, bad)) = outputs.iter().enumerate().find(|(_, v)| v.dim() != dimension) {
        return Err(MatcherError::Validation(format!(
            "Embedding {} has dimension {}, expected {}",
            idx,
            bad.dim(),
            dimension
        )));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// Client for an Ollama-style `/api/embed` endpoint.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
    timeout_ms: u64,
}

impl HttpEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MatcherError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            dimension: config.dimensions,
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> MatcherError {
        if err.is_timeout() {
            MatcherError::Timeout(self.timeout_ms)
        } else {
            err.into()
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn name(&self) -> &str {
        "http"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<EmbeddingVector>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding batch of {} inputs with {}", inputs.len(), self.model);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest {
                model: &self.model,
                input: inputs,
            })
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MatcherError::provider(
                format!("Embedding endpoint returned {}: {}", status, body.trim()),
                status.is_server_error() || status.as_u16() == 429,
            ));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        let vectors: Vec<EmbeddingVector> =
            parsed.embeddings.into_iter().map(EmbeddingVector::from).collect();

        validate_batch(inputs.len(), &vectors, self.dimension)?;
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_batch_count_and_dimension() {
        let good = vec![EmbeddingVector::new(vec![0.0; 3]); 2];
        assert!(validate_batch(2, &good, 3).is_ok());

        let short = vec![EmbeddingVector::new(vec![0.0; 3])];
        assert!(matches!(validate_batch(2, &short, 3), Err(MatcherError::Validation(_))));

        let wrong_dim = vec![EmbeddingVector::new(vec![0.0; 3]), EmbeddingVector::new(vec![0.0; 4])];
        let err = validate_batch(2, &wrong_dim, 3).unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_request_shape() {
        let inputs = vec!["search_document: hej".to_string()];
        let body = serde_json::to_value(EmbedRequest {
            model: "nomic-embed-text",
            input: &inputs,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"model": "nomic-embed-text", "input": ["search_document: hej"]})
        );
    }

    #[test]
    fn test_response_parsing() {
        let parsed: EmbedResponse =
            serde_json::from_str(r#"{"model": "m", "embeddings": [[0.1, 0.2], [0.3, 0.4]]}"#).unwrap();
        assert_eq!(parsed.embeddings.len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_retryable() {
        let config = EmbeddingConfig {
            endpoint: "http://127.0.0.1:9/api/embed".to_string(),
            timeout_secs: 2,
            ..EmbeddingConfig::default()
        };
        let provider = HttpEmbeddingProvider::new(&config).unwrap();
        let err = provider
            .embed_batch(&["text".to_string()])
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
