#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{Embedder, EmbeddingError, RetryPolicy};
use crate::config::{ConfigError, EmbeddingConfig};

/// Text embedded by availability and dimension checks
pub const SENTINEL_TEXT: &str = "test";

/// Blocking client for an Ollama-compatible `/api/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    endpoint: Url,
    model: String,
    agent: ureq::Agent,
    retry: RetryPolicy,
    dimension: OnceLock<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Option<Vec<f32>>,
}

impl EmbeddingClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint_url()?;

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            agent: build_agent(config.timeout()),
            retry: config.retry_policy(),
            dimension: OnceLock::new(),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Best-effort check: embeds the sentinel text and swallows any failure
    #[inline]
    pub fn is_available(&self) -> bool {
        match self.embed(SENTINEL_TEXT) {
            Ok(_) => {
                info!(
                    "Embedding backend at {} is available with model {}",
                    self.endpoint, self.model
                );
                true
            }
            Err(e) => {
                warn!("Embedding backend at {} is unavailable: {}", self.endpoint, e);
                false
            }
        }
    }

    /// Embedding dimension of the session, probing with the sentinel text if not yet known
    #[inline]
    pub fn dimension(&self) -> Result<usize, EmbeddingError> {
        if let Some(dimension) = self.dimension.get() {
            return Ok(*dimension);
        }

        Ok(self.embed(SENTINEL_TEXT)?.len())
    }

    /// Dimension recorded by the first successful call, if any
    #[inline]
    pub fn cached_dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    fn send_request(&self, request_json: &str) -> Result<String, EmbeddingError> {
        self.agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .send(request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(classify_error)
    }

    fn record_dimension(&self, embedding: &[f32]) -> Result<(), EmbeddingError> {
        let expected = *self.dimension.get_or_init(|| {
            debug!("Embedding dimension for this session: {}", embedding.len());
            embedding.len()
        });

        if expected != embedding.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }

        Ok(())
    }
}

impl Embedder for EmbeddingClient {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        debug!("Generating embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| EmbeddingError::Request(format!("Failed to serialize request: {}", e)))?;

        let response_text = self.retry.run(|| self.send_request(&request_json))?;
        let embedding = parse_embedding(&response_text)?;
        self.record_dimension(&embedding)?;

        Ok(embedding)
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn parse_embedding(response_text: &str) -> Result<Vec<f32>, EmbeddingError> {
    let response: EmbedResponse = serde_json::from_str(response_text).map_err(|e| {
        EmbeddingError::MalformedResponse(format!("Response is not valid JSON: {}", e))
    })?;

    let embedding = response.embedding.ok_or_else(|| {
        EmbeddingError::MalformedResponse("Missing 'embedding' field in response".to_string())
    })?;

    if embedding.is_empty() {
        return Err(EmbeddingError::MalformedResponse(
            "Response contains an empty embedding".to_string(),
        ));
    }

    Ok(embedding)
}

fn classify_error(error: ureq::Error) -> EmbeddingError {
    match error {
        ureq::Error::StatusCode(status) => {
            EmbeddingError::Connectivity(format!("Backend returned HTTP {}", status))
        }
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => EmbeddingError::Connectivity(error.to_string()),
        other => EmbeddingError::Request(other.to_string()),
    }
}
