//! Streaming chat completion seam.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use quill_core::{ConversationMessage, QuillError, Result};

/// Ordered stream of assistant text deltas.
///
/// An `Err` item ends the reply as failed.
pub type DeltaStream = BoxStream<'static, Result<String>>;

/// Produces an assistant reply for a message history.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Open a reply stream for `history`.
    ///
    /// Failures to reach the service are reported here, before any delta.
    async fn stream_complete(&self, history: &[ConversationMessage]) -> Result<DeltaStream>;
}

#[derive(Debug, Clone)]
enum ScriptedReply {
    Deltas(Vec<String>),
    OpenFailure(String),
    StreamFailure { deltas: Vec<String>, error: String },
}

/// Completion service that replays canned replies in order.
///
/// Every history it is called with is recorded for later inspection.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<Vec<ConversationMessage>>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// One reply per item, each given as its delta sequence.
    pub fn from_replies<R, D, S>(replies: R) -> Self
    where
        R: IntoIterator<Item = D>,
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scripted = Self::new();
        for deltas in replies {
            scripted.push_reply(deltas);
        }
        scripted
    }

    pub fn push_reply<D, S>(&self, deltas: D)
    where
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(ScriptedReply::Deltas(
            deltas.into_iter().map(Into::into).collect(),
        ));
    }

    /// Next call fails before producing a stream.
    pub fn push_open_failure(&self, message: impl Into<String>) {
        self.push(ScriptedReply::OpenFailure(message.into()));
    }

    /// Next call yields `deltas` and then an error item.
    pub fn push_stream_failure<D, S>(&self, deltas: D, message: impl Into<String>)
    where
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(ScriptedReply::StreamFailure {
            deltas: deltas.into_iter().map(Into::into).collect(),
            error: message.into(),
        });
    }

    /// Histories passed to each call, oldest first.
    pub fn calls(&self) -> Vec<Vec<ConversationMessage>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn remaining_replies(&self) -> usize {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn push(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn stream_complete(&self, history: &[ConversationMessage]) -> Result<DeltaStream> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(history.to_vec());

        let next = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next {
            Some(ScriptedReply::Deltas(deltas)) => {
                Ok(Box::pin(stream::iter(deltas.into_iter().map(Ok))))
            }
            Some(ScriptedReply::OpenFailure(message)) => Err(QuillError::Completion(message)),
            Some(ScriptedReply::StreamFailure { deltas, error }) => {
                let items = deltas
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(QuillError::Completion(error))));
                Ok(Box::pin(stream::iter(items)))
            }
            None => Err(QuillError::Completion("no scripted reply left".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn collect(stream: DeltaStream) -> Vec<Result<String>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_replays_in_order_and_records_history() {
        let scripted = ScriptedCompletion::from_replies(vec![vec!["Hel", "lo"], vec!["Bye"]]);
        let history = vec![ConversationMessage::system("rules")];

        let first = collect(scripted.stream_complete(&history).await.unwrap()).await;
        let first: Vec<String> = first.into_iter().map(|d| d.unwrap()).collect();
        assert_eq!(first, vec!["Hel", "lo"]);

        let second = collect(scripted.stream_complete(&history).await.unwrap()).await;
        assert_eq!(second.len(), 1);

        assert_eq!(scripted.call_count(), 2);
        assert_eq!(scripted.calls()[0], history);
        assert_eq!(scripted.remaining_replies(), 0);
    }

    #[tokio::test]
    async fn test_open_failure() {
        let scripted = ScriptedCompletion::new();
        scripted.push_open_failure("unreachable");
        let err = scripted.stream_complete(&[]).await.err().unwrap();
        assert!(err.to_string().contains("unreachable"));
    }

    #[tokio::test]
    async fn test_stream_failure_after_deltas() {
        let scripted = ScriptedCompletion::new();
        scripted.push_stream_failure(vec!["partial"], "connection reset");
        let items = collect(scripted.stream_complete(&[]).await.unwrap()).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_exhausted_script_is_an_error() {
        let scripted = ScriptedCompletion::new();
        assert!(scripted.stream_complete(&[]).await.is_err());
        assert_eq!(scripted.call_count(), 1);
    }
}
