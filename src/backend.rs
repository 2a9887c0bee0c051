// ============================================================================
// File: src/backend.rs
// Generative backend abstraction and the optional timeout policy
// ============================================================================

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use serde_json::Value;

use crate::config::Config;
use crate::error::LlmError;
use crate::llm_client::GeminiClient;

/// Incremental text produced by a streamed generation.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

/// A provider-neutral generation request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub turns: Vec<Turn>,
    pub temperature: Option<f32>,
    /// When set, the reply must be JSON matching this schema.
    pub response_schema: Option<Value>,
    /// Let the model ground its answer with web search.
    pub web_search: bool,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Text of the most recent user turn.
    pub fn last_user_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == TurnRole::User)
            .map(|t| t.text.as_str())
    }
}

/// The hosted model, seen as an opaque capability returning untrusted text.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// One-shot generation returning the full reply text.
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError>;

    /// Streamed generation. Dropping the returned stream abandons the request.
    async fn generate_stream(&self, request: GenerationRequest) -> Result<TextStream, LlmError>;
}

/// Bounds every backend call by a fixed duration.
///
/// One-shot calls and stream establishment are bounded as a whole; an open
/// stream fails when the gap between two chunks exceeds the limit.
pub struct TimeoutBackend<B> {
    inner: B,
    limit: Duration,
}

impl<B> TimeoutBackend<B> {
    pub fn new(inner: B, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl<B: GenerativeBackend> GenerativeBackend for TimeoutBackend<B> {
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        tokio::time::timeout(self.limit, self.inner.generate(request))
            .await
            .map_err(|_| LlmError::Timeout(self.limit))?
    }

    async fn generate_stream(&self, request: GenerationRequest) -> Result<TextStream, LlmError> {
        let limit = self.limit;
        let inner = tokio::time::timeout(limit, self.inner.generate_stream(request))
            .await
            .map_err(|_| LlmError::Timeout(limit))??;

        let bounded = stream::unfold(Some(inner), move |state| async move {
            let mut inner = state?;
            match tokio::time::timeout(limit, inner.next()).await {
                Ok(Some(item)) => Some((item, Some(inner))),
                Ok(None) => None,
                Err(_) => Some((Err(LlmError::Timeout(limit)), None)),
            }
        });

        Ok(Box::pin(bounded))
    }
}

/// Builds the Gemini backend described by `config`, wrapped in the timeout
/// policy when one is configured.
pub fn connect(config: &Config) -> Arc<dyn GenerativeBackend> {
    let client = GeminiClient::new(config.api_key.clone(), config.api_base_url.clone());
    match config.search.request_timeout_secs {
        Some(secs) => Arc::new(TimeoutBackend::new(client, Duration::from_secs(secs))),
        None => Arc::new(client),
    }
}
