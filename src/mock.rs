// ============================================================================
// File: src/mock.rs
// Scripted backend for tests and offline development
// ============================================================================

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use tracing::debug;

use crate::backend::{GenerationRequest, GenerativeBackend, TextStream};
use crate::error::LlmError;

/// What the mock does when a request matches.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Reply with the whole text (a single fragment when streamed).
    Text(String),
    /// Fail with an HTTP 503 from the "API".
    Fail(String),
    /// Answer with no candidates, as a safety block does.
    Blocked,
    /// Stream these fragments (concatenated for one-shot calls).
    Fragments(Vec<String>),
    /// Stream these fragments, then fail.
    FragmentsThenFail(Vec<String>, String),
    /// Wait, then behave like the inner reply.
    Delayed(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        MockReply::Fail(reason.into())
    }

    pub fn fragments<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MockReply::Fragments(parts.into_iter().map(Into::into).collect())
    }

    pub fn delayed(delay: Duration, reply: MockReply) -> Self {
        MockReply::Delayed(delay, Box::new(reply))
    }
}

/// A [`GenerativeBackend`] answering from a script.
///
/// Rules are checked in insertion order against the request's latest user
/// turn; the first rule whose needle is a substring wins. Every request is
/// recorded for later inspection.
pub struct MockBackend {
    rules: Vec<(String, MockReply)>,
    fallback: MockReply,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: MockReply::fail("no scripted reply"),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn reply_when(mut self, needle: impl Into<String>, reply: MockReply) -> Self {
        self.rules.push((needle.into(), reply));
        self
    }

    pub fn otherwise(mut self, reply: MockReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    async fn resolve(&self, request: &GenerationRequest) -> Outcome {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }

        let prompt = request.last_user_text().unwrap_or_default();
        let mut reply = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.fallback.clone());

        debug!(model = %request.model, ?reply, "mock backend reply");
        loop {
            let outcome = match reply {
                MockReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                    continue;
                }
                MockReply::Text(text) => Outcome {
                    fragments: vec![text],
                    failure: None,
                },
                MockReply::Fail(reason) => Outcome {
                    fragments: Vec::new(),
                    failure: Some(Failure::Unavailable(reason)),
                },
                MockReply::Blocked => Outcome {
                    fragments: Vec::new(),
                    failure: Some(Failure::Blocked),
                },
                MockReply::Fragments(fragments) => Outcome {
                    fragments,
                    failure: None,
                },
                MockReply::FragmentsThenFail(fragments, reason) => Outcome {
                    fragments,
                    failure: Some(Failure::Unavailable(reason)),
                },
            };
            return outcome;
        }
    }
}

/// A reply with its delays already served.
struct Outcome {
    fragments: Vec<String>,
    failure: Option<Failure>,
}

enum Failure {
    Unavailable(String),
    Blocked,
}

impl Failure {
    fn into_error(self, model: &str) -> LlmError {
        match self {
            Failure::Unavailable(reason) => LlmError::Api {
                model: model.to_string(),
                status: 503,
                body: reason,
            },
            Failure::Blocked => LlmError::NoCandidates {
                model: model.to_string(),
            },
        }
    }
}

#[async_trait]
impl GenerativeBackend for MockBackend {
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        let outcome = self.resolve(&request).await;
        match outcome.failure {
            Some(failure) => Err(failure.into_error(&request.model)),
            None => Ok(outcome.fragments.concat()),
        }
    }

    /// A failure with no fragments before it fails the call itself;
    /// otherwise the failure arrives after the last fragment.
    async fn generate_stream(&self, request: GenerationRequest) -> Result<TextStream, LlmError> {
        let outcome = self.resolve(&request).await;
        if outcome.fragments.is_empty() {
            if let Some(failure) = outcome.failure {
                return Err(failure.into_error(&request.model));
            }
        }

        let failure = outcome
            .failure
            .map(|failure| Err(failure.into_error(&request.model)));
        let items: Vec<Result<String, LlmError>> = outcome
            .fragments
            .into_iter()
            .map(Ok)
            .chain(failure)
            .collect();

        Ok(Box::pin(stream::iter(items)))
    }
}
