//! Chat & refine routes
//!
//! Model-bound conversations keyed by the `conversation_id` cookie. Switching
//! the model type starts a new conversation.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use promptgen_core::{HistoryMode, NewHistoryEntry, SessionId};

use super::{default_model_type, parse_json_body, preview, with_cookie};
use crate::binding::{clear_cookie, read_cookie, session_cookie, Turn, CHAT_COOKIE};
use crate::catalog::PromptMode;
use crate::gateway::GatewayState;
use crate::presets::{PresetForm, PresetSelection};
use crate::streaming::{self, StreamOutcome};
use crate::{GatewayError, Result};

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default = "default_model_type")]
    model: String,
    #[serde(default)]
    ollama_model: Option<String>,
    #[serde(flatten)]
    presets: PresetSelection,
}

/// A chat turn saved and ready for the model
struct PreparedChat {
    turn: Turn,
    cookie: Option<String>,
    user_message: String,
    model_type: String,
    ollama_model: String,
    presets: Value,
}

impl PreparedChat {
    fn history(&self, output: String) -> NewHistoryEntry {
        NewHistoryEntry {
            user_input: self.user_message.clone(),
            generated_output: output,
            model: self.model_type.clone(),
            presets: self.presets.clone(),
            mode: HistoryMode::Chat,
        }
    }
}

fn prepare(state: &GatewayState, headers: &HeaderMap, body: &Bytes) -> Result<PreparedChat> {
    let request: ChatRequest = parse_json_body(body)?;

    let user_message = request.message.trim().to_string();
    if user_message.is_empty() {
        return Err(GatewayError::bad_request(
            "Invalid input",
            "Please provide a message",
        ));
    }

    let (composed, system_prompt) = {
        let catalog = state.catalog.read();
        (
            request.presets.compose(&user_message, &catalog, PresetForm::Chat),
            catalog.system_prompt(&request.model, PromptMode::Chat).to_string(),
        )
    };
    tracing::debug!("Chat message preview: {}...", preview(&user_message));

    let client_id = read_cookie(headers, CHAT_COOKIE);
    let turn = state
        .chat
        .begin_turn(client_id.as_ref(), &request.model, &system_prompt, composed.text)?;
    let cookie = turn
        .needs_cookie(client_id.as_ref())
        .then(|| session_cookie(CHAT_COOKIE, &turn.session_id));

    Ok(PreparedChat {
        turn,
        cookie,
        presets: request.presets.history_json(composed.hierarchical),
        ollama_model: request
            .ollama_model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| state.config.ollama.model.clone()),
        model_type: request.model,
        user_message,
    })
}

/// Generate the reply and store it; runs detached from the request
async fn complete_turn(state: &GatewayState, prepared: PreparedChat) -> Result<String> {
    let result = state
        .llm
        .generate(&prepared.turn.snapshot, &prepared.ollama_model)
        .await?;

    let entry = prepared.history(result.clone());
    state.chat.finish_turn(prepared.turn, &result)?;
    state.record_history(entry);
    Ok(result)
}

/// `POST /chat`
pub async fn chat(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    tracing::info!("Received /chat request");
    let prepared = prepare(&state, &headers, &body)?;
    let cookie = prepared.cookie.clone();
    let model_type = prepared.model_type.clone();

    // finishes the turn even if the client disconnects while the model runs
    let worker = state.clone();
    let outcome = tokio::spawn(async move { complete_turn(&worker, prepared).await })
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    let result = match outcome {
        Ok(result) => result,
        Err(e @ GatewayError::Ollama(_)) => {
            // the user turn is already stored, keep the client bound to it
            return Ok(with_cookie(e.into_response(), cookie));
        }
        Err(e) => return Err(e),
    };
    tracing::info!("Successfully processed chat message");

    let response = Json(json!({
        "result": result,
        "model": model_type,
    }));
    Ok(with_cookie(response.into_response(), cookie))
}

/// `POST /chat-stream`
pub async fn chat_stream(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    tracing::info!("Received /chat-stream request");
    let prepared = prepare(&state, &headers, &body)?;

    let cookie = prepared.cookie.clone();
    let snapshot = prepared.turn.snapshot.clone();
    let model = prepared.ollama_model.clone();
    let finalizer = state.clone();

    let sse = streaming::relay(state.llm.clone(), snapshot, model, move |outcome: StreamOutcome| {
        if outcome.text.is_empty() {
            return;
        }
        let entry = prepared.history(outcome.text.clone());
        if let Err(e) = finalizer.chat.finish_turn(prepared.turn, &outcome.text) {
            tracing::error!("Failed to save streamed chat reply: {}", e);
        }
        finalizer.record_history(entry);
        if outcome.completed {
            tracing::info!("Successfully processed streaming chat message");
        }
    });

    Ok(with_cookie(sse.into_response(), cookie))
}

/// `POST /reset`
pub async fn reset(State(state): State<Arc<GatewayState>>, headers: HeaderMap) -> Result<Response> {
    tracing::info!("Resetting conversation history");
    let client_id: Option<SessionId> = read_cookie(&headers, CHAT_COOKIE);
    state.chat.reset(client_id.as_ref())?;

    Ok(with_cookie(
        Json(json!({ "status": "reset" })).into_response(),
        Some(clear_cookie(CHAT_COOKIE)),
    ))
}
