// ============================================================================
// File: src/llm_client.rs
// Gemini API client for one-shot and streamed generation
// ============================================================================

use std::collections::VecDeque;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

use crate::backend::{GenerationRequest, GenerativeBackend, TextStream};
use crate::error::LlmError;
use crate::models::{GenerateContentRequest, GenerateContentResponse};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn post(&self, model: &str, method: &str) -> RequestBuilder {
        let url = format!("{}/models/{}:{}", self.base_url, model, method);
        self.client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        request: &GenerationRequest,
    ) -> Result<Response, LlmError> {
        let body = GenerateContentRequest::from(request);

        debug!(
            model = %request.model,
            turns = request.turns.len(),
            web_search = request.web_search,
            "calling model"
        );

        let response = builder.json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                model: request.model.clone(),
                status: status.as_u16(),
                body: error_text,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        let response = self
            .send(self.post(&request.model, "generateContent"), &request)
            .await?;

        let response_text = response.text().await?;
        let response_data: GenerateContentResponse = serde_json::from_str(&response_text)
            .map_err(|source| LlmError::Decode {
                model: request.model.clone(),
                source,
            })?;

        if let Some(usage) = &response_data.usage_metadata {
            debug!(
                model = %request.model,
                prompt_tokens = usage.prompt_token_count,
                completion_tokens = usage.candidates_token_count,
                total_tokens = usage.total_token_count,
                "model call finished"
            );
        }

        response_data
            .first_text()
            .ok_or_else(|| LlmError::NoCandidates {
                model: request.model.clone(),
            })
    }

    async fn generate_stream(&self, request: GenerationRequest) -> Result<TextStream, LlmError> {
        let builder = self
            .post(&request.model, "streamGenerateContent")
            .query(&[("alt", "sse")]);
        let response = self.send(builder, &request).await?;

        Ok(text_events(response.bytes_stream(), request.model))
    }
}

/// Turns a raw server-sent-event body into the text of each event.
fn text_events<S, B>(body: S, model: String) -> TextStream
where
    S: Stream<Item = reqwest::Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    struct State<S> {
        body: std::pin::Pin<Box<S>>,
        decoder: SseDecoder,
        ready: VecDeque<String>,
        exhausted: bool,
        model: String,
    }

    let state = State {
        body: Box::pin(body),
        decoder: SseDecoder::default(),
        ready: VecDeque::new(),
        exhausted: false,
        model,
    };

    let events = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(data) = state.ready.pop_front() {
                let parsed = serde_json::from_str::<GenerateContentResponse>(&data);
                match parsed {
                    Ok(chunk) => match chunk.first_text() {
                        Some(text) if !text.is_empty() => return Some((Ok(text), state)),
                        _ => continue,
                    },
                    Err(source) => {
                        let err = LlmError::Decode {
                            model: state.model.clone(),
                            source,
                        };
                        state.ready.clear();
                        state.exhausted = true;
                        return Some((Err(err), state));
                    }
                }
            }

            if state.exhausted {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.push(bytes.as_ref());
                    state.ready.extend(events);
                }
                Some(Err(e)) => {
                    state.exhausted = true;
                    return Some((Err(LlmError::Http(e)), state));
                }
                None => {
                    state.exhausted = true;
                    let events = state.decoder.finish();
                    state.ready.extend(events);
                }
            }
        }
    });

    Box::pin(events)
}

/// Incremental `text/event-stream` parser yielding the `data` of each event.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a trailing event that was not closed by a blank line.
    fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = String::from_utf8_lossy(&rest);
        let mut events = Vec::new();
        let line = rest.trim_end_matches(['\n', '\r']);
        if !line.is_empty() {
            if let Some(event) = self.line(line) {
                events.push(event);
            }
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        events
    }

    fn line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if let Some(value) = line.strip_prefix("data:") {
            self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        // comments, event names and ids carry nothing we use
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data).join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;
    use pretty_assertions::assert_eq;

    fn chunk(text: &str) -> String {
        format!(
            "data: {{\"candidates\":[{{\"content\":{{\"role\":\"model\",\"parts\":[{{\"text\":\"{}\"}}]}}}}]}}\r\n\r\n",
            text
        )
    }

    #[test]
    fn decoder_splits_events_across_pushes() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"a\":").is_empty());
        assert_eq!(decoder.push(b"1}\n\ndata: 2\n"), vec!["{\"a\":1}"]);
        assert_eq!(decoder.push(b"\n"), vec!["2"]);
    }

    #[test]
    fn decoder_joins_multiline_data_and_ignores_comments() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b": keepalive\nevent: message\ndata: one\ndata: two\n\n");
        assert_eq!(events, vec!["one\ntwo"]);
    }

    #[test]
    fn decoder_flushes_unterminated_event() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), vec!["tail"]);
        assert!(decoder.finish().is_empty());
    }

    #[tokio::test]
    async fn text_events_yield_fragment_text() {
        let body = format!("{}{}{}", chunk("Hel"), chunk("lo wor"), chunk("ld."));
        let (head, tail) = body.split_at(37);
        let pieces: Vec<reqwest::Result<Vec<u8>>> =
            vec![Ok(head.as_bytes().to_vec()), Ok(tail.as_bytes().to_vec())];

        let fragments: Vec<String> = text_events(stream::iter(pieces), "m".into())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(fragments, vec!["Hel", "lo wor", "ld."]);
    }

    #[tokio::test]
    async fn text_events_skip_empty_chunks() {
        let body = format!("data: {{\"candidates\":[]}}\n\n{}", chunk("x"));
        let pieces: Vec<reqwest::Result<Vec<u8>>> = vec![Ok(body.into_bytes())];

        let fragments: Vec<String> = text_events(stream::iter(pieces), "m".into())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(fragments, vec!["x"]);
    }

    #[tokio::test]
    async fn text_events_fail_on_garbage_payload() {
        let pieces: Vec<reqwest::Result<Vec<u8>>> = vec![Ok(b"data: not json\n\n".to_vec())];
        let mut events = text_events(stream::iter(pieces), "m".into());

        assert!(matches!(events.next().await, Some(Err(LlmError::Decode { .. }))));
        assert!(events.next().await.is_none());
    }
}
