//! Admin routes

use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use promptgen_core::format_timestamp;

use crate::gateway::GatewayState;
use crate::security::ADMIN_KEY_QUERY;
use crate::{GatewayError, Result};

/// `POST /admin/reload-prompts`
pub async fn reload_prompts(
    State(state): State<Arc<GatewayState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let peer = connect_info.map(|ConnectInfo(addr)| addr.ip());
    let decision = state.admin.authorize(
        &headers,
        params.get(ADMIN_KEY_QUERY).map(String::as_str),
        peer,
    );

    let client = decision
        .client_ip
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !decision.authorized {
        tracing::warn!(
            "Denied /admin/reload-prompts request from {} (forwarded_for={}, reason={})",
            client,
            decision.forwarded_for.as_deref().unwrap_or("none"),
            decision.reason
        );
        return Err(GatewayError::Forbidden(decision.reason.to_string()));
    }

    tracing::warn!("Authorized prompt reload from {} ({})", client, decision.reason);
    let reloaded = state.catalog.write().reload();
    tracing::info!("System prompts reloaded successfully: {:?}", reloaded);

    Ok(Json(json!({
        "success": true,
        "message": "System prompts reloaded successfully",
        "reloaded": reloaded,
        "timestamp": format_timestamp(Utc::now()),
    })))
}
