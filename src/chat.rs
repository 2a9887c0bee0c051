// ============================================================================
// File: src/chat.rs
// Streamed multi-turn chat with the hardware assistant
// ============================================================================

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};

use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::{GenerationRequest, GenerativeBackend, TextStream, Turn};
use crate::error::LlmError;

pub const SYSTEM_INSTRUCTION: &str = "You are a helpful PC hardware assistant. You help users \
choose RAM and other components. You are knowledgeable about compatibility (DDR4 vs DDR5), \
speeds (MHz), and latency (CL). Keep answers concise and helpful.";

pub const WELCOME_MESSAGE: &str = "Hi! I'm your RAM expert. Need help choosing between DDR4 \
and DDR5, or have questions about latency? Ask me anything!";

pub const APOLOGY_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// The reply to one message, chunk by chunk. Consumed once; dropping it
/// abandons the request.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

pub struct ChatClient {
    backend: Arc<dyn GenerativeBackend>,
    model: String,
}

impl ChatClient {
    pub fn new(backend: Arc<dyn GenerativeBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    pub fn create_session(&self) -> ChatSession {
        ChatSession {
            backend: Arc::clone(&self.backend),
            model: self.model.clone(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// A conversation with a fixed system instruction. The session remembers
/// completed exchanges; callers only pass the new message.
pub struct ChatSession {
    backend: Arc<dyn GenerativeBackend>,
    model: String,
    system_instruction: String,
    history: Arc<Mutex<Vec<Turn>>>,
}

impl ChatSession {
    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// Completed turns so far, oldest first.
    pub fn history(&self) -> Vec<Turn> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Sends `text` and returns the reply as a lazy stream of fragments.
    ///
    /// Nothing is sent until the stream is first polled. The exchange is
    /// added to the session history only if the stream runs to completion.
    pub fn send_message(&self, text: &str) -> FragmentStream {
        let mut request = GenerationRequest::new(self.model.clone());
        request.system_instruction = Some(self.system_instruction.clone());
        request.turns = self.history();
        request.turns.push(Turn::user(text));

        let backend = Arc::clone(&self.backend);
        let opened = stream::once(async move { backend.generate_stream(request).await }).try_flatten();

        Box::pin(RecordReply {
            inner: Box::pin(opened),
            user_turn: Turn::user(text),
            reply: String::new(),
            history: Arc::clone(&self.history),
            done: false,
        })
    }
}

/// Passes fragments through and records the exchange once the reply ends.
struct RecordReply {
    inner: TextStream,
    user_turn: Turn,
    reply: String,
    history: Arc<Mutex<Vec<Turn>>>,
    done: bool,
}

impl Stream for RecordReply {
    type Item = Result<String, LlmError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            match ready!(this.inner.poll_next_unpin(cx)) {
                Some(Ok(fragment)) if fragment.is_empty() => continue,
                Some(Ok(fragment)) => {
                    this.reply.push_str(&fragment);
                    return Poll::Ready(Some(Ok(fragment)));
                }
                Some(Err(e)) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    this.done = true;
                    if let Ok(mut history) = this.history.lock() {
                        history.push(this.user_turn.clone());
                        history.push(Turn::model(std::mem::take(&mut this.reply)));
                    }
                    return Poll::Ready(None);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of a [`Transcript`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    id: String,
    role: Role,
    text: String,
    timestamp: DateTime<Utc>,
    #[serde(skip)]
    complete: bool,
}

impl ChatMessage {
    fn new(role: Role, text: &str, complete: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.to_string(),
            timestamp: Utc::now(),
            complete,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// False only while an assistant reply is still streaming in.
    pub fn is_final(&self) -> bool {
        self.complete
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The reply streamed to completion.
    Replied,
    /// The request failed; an apology was appended.
    Failed,
    /// Blank input, nothing sent.
    Ignored,
}

/// Caller-side record of a conversation.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens with the assistant's greeting.
    pub fn with_welcome() -> Self {
        Self {
            messages: vec![ChatMessage::new(Role::Assistant, WELCOME_MESSAGE, true)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Appends the user's message, then grows a single assistant message as
    /// fragments arrive, calling `on_fragment` for each one.
    ///
    /// On failure the text already received stays in place and an apology
    /// follows it.
    pub async fn send<F>(&mut self, session: &ChatSession, text: &str, mut on_fragment: F) -> SendOutcome
    where
        F: FnMut(&str),
    {
        if text.trim().is_empty() {
            return SendOutcome::Ignored;
        }

        self.messages.push(ChatMessage::new(Role::User, text, true));

        let mut stream = session.send_message(text);
        let mut reply_at: Option<usize> = None;
        let mut failed = false;

        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) => {
                    let at = match reply_at {
                        Some(at) => at,
                        None => {
                            self.messages.push(ChatMessage::new(Role::Assistant, "", false));
                            let at = self.messages.len() - 1;
                            reply_at = Some(at);
                            at
                        }
                    };
                    self.messages[at].text.push_str(&fragment);
                    on_fragment(&fragment);
                }
                Err(e) => {
                    warn!(error = %e, "chat reply failed");
                    failed = true;
                    break;
                }
            }
        }

        match reply_at {
            Some(at) => self.messages[at].complete = true,
            None if !failed => self.messages.push(ChatMessage::new(Role::Assistant, "", true)),
            None => {}
        }

        if failed {
            self.messages.push(ChatMessage::new(Role::Assistant, APOLOGY_MESSAGE, true));
            SendOutcome::Failed
        } else {
            debug!(messages = self.messages.len(), "chat reply finished");
            SendOutcome::Replied
        }
    }
}
