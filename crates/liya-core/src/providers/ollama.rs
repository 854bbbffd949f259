//! ============================================================================
//! Ollama Client - Embeddings and completions over the local Ollama API
//! ============================================================================
//! POST {base}/api/embeddings  {model, prompt}                -> {embedding}
//! POST {base}/api/generate    {model, prompt, stream: false} -> {response}
//! ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{EmbeddingProvider, TextGenerator};
use crate::config::CompanionConfig;
use crate::error::ProviderError;

/// Client for an Ollama-compatible server
pub struct OllamaClient {
    client: Client,
    base_url: String,
    embedding_model: String,
    generation_model: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaClient {
    /// Create a client with an explicit request timeout
    pub fn new(
        base_url: &str,
        embedding_model: &str,
        generation_model: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            embedding_model: embedding_model.to_string(),
            generation_model: generation_model.to_string(),
        })
    }

    /// Create a client from the companion configuration
    pub fn from_config(config: &CompanionConfig) -> Result<Self, ProviderError> {
        Self::new(
            &config.ollama_url,
            &config.embedding_model,
            &config.generation_model,
            config.request_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn generation_model(&self) -> &str {
        &self.generation_model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    async fn post<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp, ProviderError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Request to /api/{} failed: {}", path, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(ProviderError::Unavailable(format!(
                    "Ollama error ({}): {}",
                    status, error.error
                )));
            }
            return Err(ProviderError::Unavailable(format!(
                "Ollama error ({}): {}",
                status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        debug!("Embedding {} chars with {}", text.len(), self.embedding_model);

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            prompt: text,
        };

        let result = self
            .post::<_, EmbeddingResponse>("embeddings", &request)
            .await
            .and_then(|r| non_empty_embedding(r.embedding));

        if let Err(e) = &result {
            warn!("Embedding failed: {}", e);
        }
        result
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        debug!("Generating with {} ({} chars of prompt)", self.generation_model, prompt.len());

        let request = GenerateRequest {
            model: &self.generation_model,
            prompt,
            stream: false,
        };

        let result = self
            .post::<_, GenerateResponse>("generate", &request)
            .await
            .and_then(|r| non_blank_completion(r.response));

        if let Err(e) = &result {
            warn!("Generation failed: {}", e);
        }
        result
    }
}

fn non_empty_embedding(embedding: Vec<f32>) -> Result<Vec<f32>, ProviderError> {
    if embedding.is_empty() {
        Err(ProviderError::EmptyResponse)
    } else {
        Ok(embedding)
    }
}

fn non_blank_completion(text: String) -> Result<String, ProviderError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(ProviderError::EmptyResponse)
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OllamaClient {
        OllamaClient::new(
            "http://localhost:11434/",
            "gemma3:1b",
            "gemma3:1b",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = client();
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.endpoint("embeddings"), "http://localhost:11434/api/embeddings");
        assert_eq!(client.endpoint("generate"), "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_request_shapes() {
        let embed = serde_json::to_value(EmbeddingRequest {
            model: "gemma3:1b",
            prompt: "hello",
        })
        .unwrap();
        assert_eq!(embed, serde_json::json!({"model": "gemma3:1b", "prompt": "hello"}));

        let generate = serde_json::to_value(GenerateRequest {
            model: "gemma3:1b",
            prompt: "ask me",
            stream: false,
        })
        .unwrap();
        assert_eq!(
            generate,
            serde_json::json!({"model": "gemma3:1b", "prompt": "ask me", "stream": false})
        );
    }

    #[test]
    fn test_missing_embedding_is_empty_response() {
        let parsed: EmbeddingResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(
            non_empty_embedding(parsed.embedding),
            Err(ProviderError::EmptyResponse)
        );

        let parsed: EmbeddingResponse =
            serde_json::from_str(r#"{"embedding": [0.1, 0.2]}"#).unwrap();
        assert_eq!(non_empty_embedding(parsed.embedding), Ok(vec![0.1, 0.2]));
    }

    #[test]
    fn test_blank_completion_is_empty_response() {
        assert_eq!(
            non_blank_completion("  \n".to_string()),
            Err(ProviderError::EmptyResponse)
        );
        assert_eq!(
            non_blank_completion(" What is your favourite food?\n".to_string()),
            Ok("What is your favourite food?".to_string())
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let client = OllamaClient::new(
            "http://127.0.0.1:9",
            "m",
            "m",
            Duration::from_millis(500),
        )
        .unwrap();
        let result = client.embed("hello").await;
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }
}
