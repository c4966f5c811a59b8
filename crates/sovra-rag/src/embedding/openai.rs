//! OpenAI-compatible HTTP embedding provider (requires the `http` feature)

use super::provider::{EmbeddingProvider, ProviderEmbedding};
use crate::config::EmbeddingConfig;
use crate::error::ProviderError;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    usage: Option<EmbeddingUsage>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingUsage {
    #[serde(default)]
    total_tokens: u32,
}

/// Provider speaking the `/embeddings` endpoint of OpenAI-compatible APIs
pub struct OpenAiEmbeddingProvider {
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
    batch_size: usize,
    http_client: reqwest::Client,
}

impl OpenAiEmbeddingProvider {
    /// Create a provider for `model` producing `dimensions`-long vectors
    pub fn new(base_url: Option<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
            api_key: None,
            dimensions,
            batch_size: 64,
            http_client: reqwest::Client::new(),
        }
    }

    /// Build from gateway configuration
    pub fn from_config(config: &EmbeddingConfig, dimensions: usize) -> Self {
        let mut provider = Self::new(config.base_url.clone(), config.model.clone(), dimensions);
        provider.api_key = config.api_key.clone();
        provider
    }

    /// Set the bearer token
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the batch window
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn request(&self, input: &[String]) -> Result<Vec<ProviderEmbedding>, ProviderError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = EmbeddingRequest {
            model: &self.model,
            input,
        };

        let mut http_req = self.http_client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body: text.chars().take(512).collect(),
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if parsed.data.len() != input.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                input.len(),
                parsed.data.len()
            )));
        }

        let mut data = parsed.data;
        if data.iter().all(|d| d.index.is_some()) {
            data.sort_by_key(|d| d.index);
        }

        // Usage is reported per request; attribute it evenly
        let total_tokens = parsed.usage.map(|u| u.total_tokens).unwrap_or(0);
        let per_item = total_tokens / input.len().max(1) as u32;

        Ok(data
            .into_iter()
            .map(|d| ProviderEmbedding::new(d.embedding, per_item))
            .collect())
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<ProviderEmbedding, ProviderError> {
        let input = [text.replace('\n', " ")];
        self.request(&input)
            .await?
            .pop()
            .ok_or_else(|| ProviderError::InvalidResponse("empty data".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<ProviderEmbedding>, ProviderError> {
        let cleaned: Vec<String> = texts.iter().map(|t| t.replace('\n', " ")).collect();
        self.request(&cleaned).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn max_batch_size(&self) -> usize {
        self.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_embed_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}],
                "usage": {"prompt_tokens": 4, "total_tokens": 4}
            })))
            .mount(&server)
            .await;

        let provider = OpenAiEmbeddingProvider::new(Some(server.uri()), "test-model", 3)
            .with_api_key("secret");
        let embedding = provider.embed("hello\nworld").await.unwrap();

        assert_eq!(embedding.vector, vec![0.1, 0.2, 0.3]);
        assert_eq!(embedding.tokens_used, 4);
    }

    #[tokio::test]
    async fn test_batch_respects_indices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"embedding": [2.0], "index": 1},
                    {"embedding": [1.0], "index": 0}
                ]
            })))
            .mount(&server)
            .await;

        let provider = OpenAiEmbeddingProvider::new(Some(server.uri()), "m", 1);
        let out = provider
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(out[0].vector, vec![1.0]);
        assert_eq!(out[1].vector, vec![2.0]);
    }

    #[tokio::test]
    async fn test_http_error_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let provider = OpenAiEmbeddingProvider::new(Some(server.uri()), "m", 1);
        let err = provider.embed("x").await.unwrap_err();
        assert!(matches!(err, ProviderError::Http { status: 429, .. }));
    }
}
