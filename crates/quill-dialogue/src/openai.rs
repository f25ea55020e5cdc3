//! OpenAI-compatible streaming chat completions client.
//!
//! Works against both the public API (bearer token) and Azure-style
//! deployments (`api-key` header). Replies arrive as server-sent events whose
//! `data:` payloads carry `choices[0].delta.content`.

use std::collections::VecDeque;
use std::fmt::Display;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use quill_core::config::{AuthStyle, CompletionConfig};
use quill_core::{ConversationMessage, QuillError, Result};
use serde::Serialize;
use tracing::debug;

use crate::completion::{CompletionService, DeltaStream};

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// HTTP client for a streaming chat completions endpoint.
pub struct OpenAiCompletionClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    auth_style: AuthStyle,
    temperature: Option<f32>,
}

impl std::fmt::Debug for OpenAiCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompletionClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("auth_style", &self.auth_style)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompletionClient {
    pub fn new(config: &CompletionConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(QuillError::Config(format!(
                "empty API key (set {})",
                config.api_key_env
            )));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| QuillError::Completion(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            auth_style: config.auth_style,
            temperature: config.temperature,
        })
    }

    /// Read the key from the environment variable named in `config`.
    pub fn from_env(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            QuillError::Config(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        Self::new(config, api_key)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_style {
            AuthStyle::Bearer => request.bearer_auth(&self.api_key),
            AuthStyle::ApiKey => request.header("api-key", &self.api_key),
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionClient {
    async fn stream_complete(&self, history: &[ConversationMessage]) -> Result<DeltaStream> {
        let body = ChatRequest {
            model: &self.model,
            messages: history,
            stream: true,
            temperature: self.temperature,
        };

        debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            messages = history.len(),
            "Opening completion stream"
        );

        let response = self
            .authorize(self.http.post(&self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| QuillError::Completion(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(QuillError::Completion(format!(
                "HTTP {}: {}",
                status.as_u16(),
                detail.trim()
            )));
        }

        Ok(delta_stream(Box::pin(response.bytes_stream())))
    }
}

/// One decoded server-sent event of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Delta(String),
    Done,
}

/// Incremental decoder for a chat completions event stream.
///
/// Bytes may be split anywhere, including inside a UTF-8 sequence.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning the events completed by them.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = decode_line(&line)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Decode whatever is left once the body has ended.
    pub fn finish(&mut self) -> Result<Vec<SseEvent>> {
        let rest = std::mem::take(&mut self.buffer);
        Ok(decode_line(&rest)?.into_iter().collect())
    }
}

fn decode_line(raw: &[u8]) -> Result<Option<SseEvent>> {
    let line = std::str::from_utf8(raw)
        .map_err(|e| QuillError::Completion(format!("invalid UTF-8 in event stream: {e}")))?
        .trim_end_matches(['\r', '\n']);

    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(None);
    }
    if payload == DONE_SENTINEL {
        return Ok(Some(SseEvent::Done));
    }

    let value: serde_json::Value = serde_json::from_str(payload)?;
    if let Some(message) = value.pointer("/error/message").and_then(|m| m.as_str()) {
        return Err(QuillError::Completion(message.to_string()));
    }

    Ok(value
        .pointer("/choices/0/delta/content")
        .and_then(|c| c.as_str())
        .filter(|c| !c.is_empty())
        .map(|c| SseEvent::Delta(c.to_string())))
}

struct DeltaState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

impl<S> DeltaState<S> {
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            match event {
                SseEvent::Delta(text) if !self.finished => self.pending.push_back(text),
                SseEvent::Delta(_) => {}
                SseEvent::Done => self.finished = true,
            }
        }
    }
}

/// Turn a raw event-stream body into a stream of text deltas.
pub(crate) fn delta_stream<S, B, E>(bytes: S) -> DeltaStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DeltaState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(delta) = state.pending.pop_front() {
                return Some((Ok(delta), state));
            }
            if state.finished {
                return None;
            }
            let step = match state.bytes.next().await {
                Some(Ok(chunk)) => state.decoder.push(chunk.as_ref()),
                Some(Err(e)) => Err(QuillError::Completion(format!("stream read failed: {e}"))),
                None => {
                    let tail = state.decoder.finish();
                    state.finished = true;
                    tail
                }
            };
            match step {
                Ok(events) => state.absorb(events),
                Err(e) => {
                    state.finished = true;
                    state.pending.clear();
                    return Some((Err(e), state));
                }
            }
        }
    })
    .boxed()
}
