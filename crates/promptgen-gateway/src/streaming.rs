//! Server-sent event relay
//!
//! Token production runs in a spawned task that owns the backend stream and
//! forwards events through a channel to the SSE body. When production ends
//! (done, backend error or client gone) the task runs the caller's finalize
//! step, then drops the sender, so the body closes only after persistence.

use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;

use promptgen_core::Message;

use crate::ollama::{LlmBackend, OllamaError};

const CHANNEL_CAPACITY: usize = 64;

/// One SSE `data:` frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Token(String),
    Done,
    Error(OllamaError),
}

impl StreamEvent {
    pub fn to_json(&self) -> Value {
        match self {
            StreamEvent::Token(token) => json!({ "token": token }),
            StreamEvent::Done => json!({ "done": true }),
            StreamEvent::Error(e) => json!({ "error": e.to_string(), "type": e.event_type() }),
        }
    }

    pub fn into_sse(self) -> Event {
        Event::default().data(self.to_json().to_string())
    }
}

/// How token production ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Every token received, concatenated
    pub text: String,
    /// The backend reported completion
    pub completed: bool,
    /// The client went away before completion
    pub disconnected: bool,
}

/// Stream a reply for `messages` as SSE, running `finalize` once production stops
pub fn relay<F>(
    llm: Arc<dyn LlmBackend>,
    messages: Vec<Message>,
    model: String,
    finalize: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: FnOnce(StreamOutcome) + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<StreamEvent>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let outcome = produce(llm.as_ref(), &messages, &model, &tx).await;
        finalize(outcome);
        drop(tx);
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok(event.into_sse());
        }
    };

    Sse::new(stream)
}

async fn produce(
    llm: &dyn LlmBackend,
    messages: &[Message],
    model: &str,
    tx: &mpsc::Sender<StreamEvent>,
) -> StreamOutcome {
    let mut outcome = StreamOutcome::default();

    let mut tokens = match llm.stream(messages, model).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!("Error during streaming: {}", e);
            let _ = tx.send(StreamEvent::Error(e)).await;
            return outcome;
        }
    };

    while let Some(item) = tokens.next().await {
        match item {
            Ok(token) => {
                outcome.text.push_str(&token);
                if tx.send(StreamEvent::Token(token)).await.is_err() {
                    tracing::info!(
                        "Client disconnected after {} chars, stopping generation",
                        outcome.text.len()
                    );
                    outcome.disconnected = true;
                    return outcome;
                }
            }
            Err(e) => {
                tracing::error!("Error during streaming: {}", e);
                let _ = tx.send(StreamEvent::Error(e)).await;
                return outcome;
            }
        }
    }

    outcome.completed = true;
    let _ = tx.send(StreamEvent::Done).await;
    outcome
}
