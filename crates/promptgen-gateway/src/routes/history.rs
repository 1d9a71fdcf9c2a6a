//! Generation history routes

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use promptgen_core::MAX_HISTORY_LIMIT;

use crate::gateway::GatewayState;
use crate::{GatewayError, Result};

const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Non-numeric values fall back to the default
    #[serde(default)]
    limit: Option<String>,
    #[serde(default)]
    q: Option<String>,
}

/// `GET /history?limit=&q=`
pub async fn list_history(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>> {
    let limit = query
        .limit
        .as_deref()
        .and_then(|l| l.trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_LIMIT);

    if !(1..=MAX_HISTORY_LIMIT as i64).contains(&limit) {
        return Err(GatewayError::bad_request(
            "Invalid limit",
            format!("Limit must be between 1 and {}", MAX_HISTORY_LIMIT),
        ));
    }

    let search = query.q.as_deref().filter(|q| !q.is_empty());
    let history = state.history.query(limit as usize, search)?;
    tracing::debug!("Returning {} history entries", history.len());

    Ok(Json(json!({
        "count": history.len(),
        "history": history,
    })))
}

/// `DELETE /history/:id`
pub async fn delete_history(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let not_found = || {
        GatewayError::not_found(
            "Not found",
            format!("History item with ID {} not found", id),
        )
    };

    let history_id: i64 = id.parse().map_err(|_| not_found())?;
    if !state.history.delete(history_id)? {
        return Err(not_found());
    }

    Ok(Json(json!({
        "status": "deleted",
        "id": history_id,
    })))
}
