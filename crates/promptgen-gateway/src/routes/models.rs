//! Installed model listing

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::gateway::GatewayState;
use crate::Result;

/// `GET /models`
pub async fn list_models(State(state): State<Arc<GatewayState>>) -> Result<Json<Value>> {
    let models = state.llm.list_models().await?;
    tracing::info!("Found {} Ollama models", models.len());

    Ok(Json(json!({
        "models": models,
        "default": state.config.ollama.model,
    })))
}
