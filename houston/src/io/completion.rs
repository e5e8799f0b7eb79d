//! Text-completion provider over HTTP.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::types::{CompletionRequest, CompletionResponse};
use crate::io::config::{ApiKey, OpenAiConfig};

/// Provider unreachable or answered with a non-success status.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("completion request failed")]
    Request(#[from] reqwest::Error),

    #[error("completion provider returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// A completion provider: one request, one response.
pub trait Completer {
    fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, TransportError>;
}

/// Blocking client for an OpenAI-compatible `/completions` endpoint.
pub struct OpenAiCompleter {
    client: Client,
    endpoint: String,
    api_key: ApiKey,
}

impl OpenAiCompleter {
    pub fn new(api_key: ApiKey, config: &OpenAiConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: completions_endpoint(&config.base_url),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Completer for OpenAiCompleter {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, model = %request.model))]
    fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        let completion: CompletionResponse = response.json()?;
        debug!(
            choices = completion.choices.len(),
            total_tokens = completion.usage.total_tokens,
            "completion received"
        );
        Ok(completion)
    }
}

fn completions_endpoint(base_url: &str) -> String {
    format!("{}/completions", base_url.trim_end_matches('/'))
}
