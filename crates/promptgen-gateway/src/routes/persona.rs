//! Persona routes
//!
//! Persona catalog lookups plus persona-bound conversations keyed by the
//! `persona_conversation_id` cookie. The persona id is the stored participant,
//! so switching personas starts a new conversation.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use promptgen_core::{HistoryMode, NewHistoryEntry};

use super::{default_model_type, parse_json_body, preview, with_cookie};
use crate::binding::{clear_cookie, read_cookie, session_cookie, Turn, PERSONA_COOKIE};
use crate::gateway::GatewayState;
use crate::presets::{PresetForm, PresetSelection};
use crate::streaming::{self, StreamOutcome};
use crate::{GatewayError, Result};

fn persona_not_found(id: &str) -> GatewayError {
    GatewayError::not_found("Persona not found", format!("No persona with id: {}", id))
}

/// `GET /api/personas`
pub async fn list_personas(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let catalog = state.catalog.read();
    let personas = json!(catalog.personas());
    tracing::debug!("Returning {} personas", catalog.personas().len());
    Json(personas)
}

/// `GET /api/personas/:id`
pub async fn persona_details(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let catalog = state.catalog.read();
    let persona = catalog.persona(&id).ok_or_else(|| persona_not_found(&id))?;

    let mut details = serde_json::Map::new();
    details.insert("id".to_string(), json!(id));
    details.extend(persona.meta.clone());
    if let Some(prompt_file) = &persona.prompt_file {
        details.insert("prompt_file".to_string(), json!(prompt_file));
    }
    details.insert("supports_presets".to_string(), json!(persona.supports_presets));
    details.insert(
        "system_prompt".to_string(),
        json!(catalog.persona_prompt(&id).unwrap_or_default()),
    );

    tracing::debug!("Returned details for persona: {}", id);
    Ok(Json(Value::Object(details)))
}

#[derive(Debug, Deserialize)]
struct PersonaChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    persona_id: String,
    /// Model type recorded in history
    #[serde(default = "default_model_type")]
    model: String,
    #[serde(default)]
    ollama_model: Option<String>,
    #[serde(flatten)]
    presets: PresetSelection,
}

struct PreparedPersonaChat {
    turn: Turn,
    cookie: Option<String>,
    persona_id: String,
    user_message: String,
    model_type: String,
    ollama_model: String,
    presets: Value,
}

impl PreparedPersonaChat {
    fn history(&self, output: String) -> NewHistoryEntry {
        NewHistoryEntry {
            user_input: self.user_message.clone(),
            generated_output: output,
            model: self.model_type.clone(),
            presets: self.presets.clone(),
            mode: HistoryMode::PersonaChat,
        }
    }
}

fn prepare(state: &GatewayState, headers: &HeaderMap, body: &Bytes) -> Result<PreparedPersonaChat> {
    let request: PersonaChatRequest = parse_json_body(body)?;

    let user_message = request.message.trim().to_string();
    if user_message.is_empty() {
        return Err(GatewayError::bad_request(
            "Invalid input",
            "Please provide a message",
        ));
    }

    let persona_id = request.persona_id.trim().to_string();
    if persona_id.is_empty() {
        return Err(GatewayError::bad_request(
            "Invalid request",
            "Please specify a persona_id",
        ));
    }

    let (message, system_prompt, presets) = {
        let catalog = state.catalog.read();
        let persona = catalog
            .persona(&persona_id)
            .ok_or_else(|| persona_not_found(&persona_id))?;
        let system_prompt = catalog.persona_prompt(&persona_id).ok_or_else(|| {
            GatewayError::PersonaConfig(format!(
                "Could not load prompt for persona: {}",
                persona_id
            ))
        })?;

        let mut presets = json!({ "persona": persona_id });
        let message = if persona.supports_presets {
            if let (Some(record), Value::Object(flat)) =
                (presets.as_object_mut(), request.presets.flat_json())
            {
                record.extend(flat);
            }
            request
                .presets
                .compose(&user_message, &catalog, PresetForm::Chat)
                .text
        } else {
            user_message.clone()
        };
        (message, system_prompt, presets)
    };
    tracing::debug!("Persona: {}, message preview: {}...", persona_id, preview(&user_message));

    let client_id = read_cookie(headers, PERSONA_COOKIE);
    let turn = state
        .persona_chat
        .begin_turn(client_id.as_ref(), &persona_id, &system_prompt, message)?;
    let cookie = turn
        .needs_cookie(client_id.as_ref())
        .then(|| session_cookie(PERSONA_COOKIE, &turn.session_id));

    Ok(PreparedPersonaChat {
        turn,
        cookie,
        persona_id,
        user_message,
        model_type: request.model,
        ollama_model: request
            .ollama_model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| state.config.ollama.model.clone()),
        presets,
    })
}

/// Generate the reply and store it; runs detached from the request
async fn complete_turn(state: &GatewayState, prepared: PreparedPersonaChat) -> Result<String> {
    let result = state
        .llm
        .generate(&prepared.turn.snapshot, &prepared.ollama_model)
        .await?;

    let entry = prepared.history(result.clone());
    state.persona_chat.finish_turn(prepared.turn, &result)?;
    state.record_history(entry);
    Ok(result)
}

/// `POST /persona-chat`
pub async fn persona_chat(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    tracing::info!("Received /persona-chat request");
    let prepared = prepare(&state, &headers, &body)?;
    let cookie = prepared.cookie.clone();
    let persona_id = prepared.persona_id.clone();

    let worker = state.clone();
    let outcome = tokio::spawn(async move { complete_turn(&worker, prepared).await })
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    let result = match outcome {
        Ok(result) => result,
        Err(e @ GatewayError::Ollama(_)) => return Ok(with_cookie(e.into_response(), cookie)),
        Err(e) => return Err(e),
    };
    tracing::info!("Successfully processed persona chat message for: {}", persona_id);

    let response = Json(json!({
        "result": result,
        "persona": persona_id,
    }));
    Ok(with_cookie(response.into_response(), cookie))
}

/// `POST /persona-chat-stream`
pub async fn persona_chat_stream(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    tracing::info!("Received /persona-chat-stream request");
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
        if let Err(e) = finalizer
            .persona_chat
            .finish_turn(prepared.turn, &outcome.text)
        {
            tracing::error!("Failed to save streamed persona reply: {}", e);
        }
        finalizer.record_history(entry);
    });

    Ok(with_cookie(sse.into_response(), cookie))
}

/// `POST /persona-reset`
pub async fn persona_reset(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<Response> {
    tracing::info!("Resetting persona conversation");
    let client_id = read_cookie(&headers, PERSONA_COOKIE);
    state.persona_chat.reset(client_id.as_ref())?;

    Ok(with_cookie(
        Json(json!({ "status": "reset" })).into_response(),
        Some(clear_cookie(PERSONA_COOKIE)),
    ))
}
