// ============================================================================
// File: src/tip.rs
// One-line advisory tip about buying RAM
// ============================================================================

use std::sync::Arc;

use tracing::warn;

use crate::backend::{GenerationRequest, GenerativeBackend, Turn};
use crate::error::LlmError;

const TIP_PROMPT: &str = "Provide a single, short sentence (max 15 words) advice about buying \
computer RAM right now (e.g. price trends or new tech).";

/// Shown when the model answers with nothing, including a blocked reply.
pub const EMPTY_TIP_FALLBACK: &str = "Check prices frequently for the best deals.";

/// Shown when the request itself fails.
pub const FAILED_TIP_FALLBACK: &str = "Stay updated on the latest hardware trends.";

pub struct TipClient {
    backend: Arc<dyn GenerativeBackend>,
    model: String,
}

impl TipClient {
    pub fn new(backend: Arc<dyn GenerativeBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Always returns displayable text.
    pub async fn get_tip(&self) -> String {
        let mut request = GenerationRequest::new(self.model.clone());
        request.turns = vec![Turn::user(TIP_PROMPT)];

        match self.backend.generate(request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) | Err(LlmError::NoCandidates { .. }) => EMPTY_TIP_FALLBACK.to_string(),
            Err(e) => {
                warn!(model = %self.model, error = %e, "tip request failed");
                FAILED_TIP_FALLBACK.to_string()
            }
        }
    }
}
