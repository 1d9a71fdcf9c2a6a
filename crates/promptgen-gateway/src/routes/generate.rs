//! One-shot generation routes
//!
//! No session: each request builds `[system, user]` from scratch.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use promptgen_core::{HistoryMode, Message, NewHistoryEntry};

use super::{default_model_type, parse_json_body, preview};
use crate::catalog::PromptMode;
use crate::gateway::GatewayState;
use crate::presets::{PresetForm, PresetSelection};
use crate::streaming::{self, StreamOutcome};
use crate::{GatewayError, Result};

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    input: String,
    #[serde(default = "default_model_type")]
    model: String,
    #[serde(default)]
    ollama_model: Option<String>,
    #[serde(flatten)]
    presets: PresetSelection,
}

struct PreparedGeneration {
    messages: Vec<Message>,
    user_input: String,
    model_type: String,
    ollama_model: String,
    presets: Value,
}

impl PreparedGeneration {
    fn history(&self, output: String) -> NewHistoryEntry {
        NewHistoryEntry {
            user_input: self.user_input.clone(),
            generated_output: output,
            model: self.model_type.clone(),
            presets: self.presets.clone(),
            mode: HistoryMode::Oneshot,
        }
    }
}

fn prepare(state: &GatewayState, body: &Bytes) -> Result<PreparedGeneration> {
    let request: GenerateRequest = parse_json_body(body)?;

    let user_input = request.input.trim().to_string();
    if user_input.is_empty() {
        return Err(GatewayError::bad_request(
            "Invalid input",
            "Please provide a description",
        ));
    }

    let ollama_model = request
        .ollama_model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.config.ollama.model.clone());
    tracing::info!(
        "Generating prompt for model: {}, ollama_model: {}",
        request.model,
        ollama_model
    );
    tracing::debug!("User input preview: {}...", preview(&user_input));

    let catalog = state.catalog.read();
    let composed = request
        .presets
        .compose(&user_input, &catalog, PresetForm::Oneshot);
    let messages = vec![
        Message::system(catalog.system_prompt(&request.model, PromptMode::Oneshot)),
        Message::user(composed.text),
    ];

    Ok(PreparedGeneration {
        messages,
        presets: request.presets.history_json(composed.hierarchical),
        user_input,
        model_type: request.model,
        ollama_model,
    })
}

/// `POST /generate`
pub async fn generate(State(state): State<Arc<GatewayState>>, body: Bytes) -> Result<Response> {
    let prepared = prepare(&state, &body)?;

    let result = state
        .llm
        .generate(&prepared.messages, &prepared.ollama_model)
        .await?;
    tracing::info!("Successfully generated prompt using model: {}", prepared.ollama_model);

    state.record_history(prepared.history(result.clone()));

    Ok(Json(json!({
        "result": result,
        "model": prepared.model_type,
    }))
    .into_response())
}

/// `POST /generate-stream`
pub async fn generate_stream(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> Result<Response> {
    let prepared = prepare(&state, &body)?;

    let messages = prepared.messages.clone();
    let model = prepared.ollama_model.clone();
    let finalizer = state.clone();

    let sse = streaming::relay(state.llm.clone(), messages, model, move |outcome: StreamOutcome| {
        // history keeps completed generations only
        if outcome.completed {
            finalizer.record_history(prepared.history(outcome.text));
            tracing::info!("Successfully streamed prompt");
        }
    });

    Ok(sse.into_response())
}
