//! Preset catalog routes
//!
//! `/presets` serves the flat presets (or the whole hierarchical document when
//! enabled). The `/api/...` routes walk the hierarchical document one level at
//! a time and answer 400 while the feature is off.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::catalog::PromptCatalog;
use crate::gateway::GatewayState;
use crate::presets::truthy;
use crate::{GatewayError, Result};

/// `GET /presets`: re-reads the preset files so edits show up without a restart
pub async fn list_presets(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    let mut catalog = state.catalog.write();
    catalog.reload_presets();
    tracing::debug!("Reloaded presets from disk");

    let presets = match catalog.hierarchical() {
        Some(document) => document.clone(),
        None => serde_json::to_value(catalog.presets()).unwrap_or_default(),
    };
    Json(presets)
}

fn document(catalog: &PromptCatalog) -> Result<&Value> {
    catalog.hierarchical().ok_or_else(|| {
        GatewayError::bad_request(
            "Hierarchical presets not enabled",
            "Set ENABLE_HIERARCHICAL_PRESETS=true to use this endpoint",
        )
    })
}

/// Children of `key` as `(id, data)` pairs; missing or non-object is empty
fn children<'a>(data: &'a Value, key: &str) -> impl Iterator<Item = (&'a String, &'a Value)> {
    data.get(key).and_then(Value::as_object).into_iter().flatten()
}

fn child<'a>(data: &'a Value, key: &str, id: &str) -> Option<&'a Value> {
    data.get(key)?.get(id).filter(|v| truthy(v))
}

fn field(data: &Value, key: &str, default: Value) -> Value {
    data.get(key).cloned().unwrap_or(default)
}

/// Stable sort putting `"popularity": "high"` entries first
fn by_popularity(items: &mut [Value]) {
    items.sort_by_key(|item| if item["popularity"] == "high" { 0 } else { 1 });
}

fn summary(id: &str, data: &Value, extra: &[&str]) -> Value {
    let mut entry = Map::new();
    entry.insert("id".into(), json!(id));
    entry.insert("name".into(), field(data, "name", json!(id)));
    entry.insert("description".into(), field(data, "description", json!("")));
    for key in extra {
        let default = if *key == "best_for" { json!([]) } else { json!("") };
        entry.insert(key.to_string(), field(data, key, default));
    }
    entry.insert("popularity".into(), field(data, "popularity", json!("medium")));
    Value::Object(entry)
}

fn category<'a>(document: &'a Value, category_id: &str) -> Result<&'a Value> {
    child(document, "categories", category_id).ok_or_else(|| {
        GatewayError::not_found(
            "Category not found",
            format!("No category with id '{}'", category_id),
        )
    })
}

fn category_type<'a>(category: &'a Value, category_id: &str, type_id: &str) -> Result<&'a Value> {
    child(category, "level2_types", type_id).ok_or_else(|| {
        GatewayError::not_found(
            "Type not found",
            format!("No type '{}' in category '{}'", type_id, category_id),
        )
    })
}

fn artist<'a>(document: &'a Value, category_id: &str, type_id: &str, artist_id: &str) -> Result<&'a Value> {
    document
        .get("categories")
        .and_then(|c| c.get(category_id))
        .and_then(|c| c.get("level2_types"))
        .and_then(|t| t.get(type_id))
        .and_then(|t| child(t, "level3_artists", artist_id))
        .ok_or_else(|| {
            GatewayError::not_found(
                "Artist not found",
                format!("No artist '{}' in {}/{}", artist_id, category_id, type_id),
            )
        })
}

/// `GET /api/categories`
pub async fn list_categories(State(state): State<Arc<GatewayState>>) -> Result<Json<Value>> {
    let catalog = state.catalog.read();
    let document = document(&catalog)?;

    let mut categories: Vec<Value> = children(document, "categories")
        .map(|(id, data)| summary(id, data, &["icon", "best_for"]))
        .collect();
    by_popularity(&mut categories);
    tracing::info!("Returned {} categories", categories.len());

    Ok(Json(json!({
        "version": field(document, "version", json!("1.0")),
        "categories": categories,
    })))
}

/// `GET /api/categories/:category_id/types`
pub async fn list_types(
    State(state): State<Arc<GatewayState>>,
    Path(category_id): Path<String>,
) -> Result<Json<Value>> {
    let catalog = state.catalog.read();
    let category = category(document(&catalog)?, &category_id)?;

    let mut types: Vec<Value> = children(category, "level2_types")
        .map(|(id, data)| summary(id, data, &["icon"]))
        .collect();
    by_popularity(&mut types);
    tracing::info!("Returned {} types for category '{}'", types.len(), category_id);

    Ok(Json(json!({
        "category_id": category_id,
        "category_name": field(category, "name", json!(category_id)),
        "types": types,
    })))
}

/// `GET /api/categories/:category_id/types/:type_id/artists`
pub async fn list_artists(
    State(state): State<Arc<GatewayState>>,
    Path((category_id, type_id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let catalog = state.catalog.read();
    let category = category(document(&catalog)?, &category_id)?;
    let type_data = category_type(category, &category_id, &type_id)?;

    let mut artists: Vec<Value> = children(type_data, "level3_artists")
        .map(|(id, data)| {
            let mut entry = summary(id, data, &["signature", "best_for"]);
            entry["has_technical"] = json!(data.get("level4_technical").is_some_and(truthy));
            entry["has_specifics"] = json!(data.get("level5_specifics").is_some_and(truthy));
            entry
        })
        .collect();
    by_popularity(&mut artists);
    tracing::info!(
        "Returned {} artists for {}/{}",
        artists.len(),
        category_id,
        type_id
    );

    Ok(Json(json!({
        "category_id": category_id,
        "type_id": type_id,
        "type_name": field(type_data, "name", json!(type_id)),
        "artists": artists,
    })))
}

/// Level 4 or level 5 block of one artist
fn artist_level(
    state: &GatewayState,
    (category_id, type_id, artist_id): (String, String, String),
    level_key: &str,
    response_key: &str,
) -> Result<Json<Value>> {
    let catalog = state.catalog.read();
    let artist = artist(document(&catalog)?, &category_id, &type_id, &artist_id)?;
    tracing::info!("Returned {} for {}", response_key, artist_id);

    Ok(Json(json!({
        "category_id": category_id,
        "type_id": type_id,
        "artist_name": field(artist, "name", json!(artist_id)),
        "artist_id": artist_id,
        response_key: field(artist, level_key, json!({})),
    })))
}

/// `GET /api/artists/:category_id/:type_id/:artist_id/technical`
pub async fn artist_technical(
    State(state): State<Arc<GatewayState>>,
    Path(ids): Path<(String, String, String)>,
) -> Result<Json<Value>> {
    artist_level(&state, ids, "level4_technical", "technical_options")
}

/// `GET /api/artists/:category_id/:type_id/:artist_id/specifics`
pub async fn artist_specifics(
    State(state): State<Arc<GatewayState>>,
    Path(ids): Path<(String, String, String)>,
) -> Result<Json<Value>> {
    artist_level(&state, ids, "level5_specifics", "scene_specifics")
}

/// `GET /api/preset-packs`
pub async fn list_preset_packs(State(state): State<Arc<GatewayState>>) -> Result<Json<Value>> {
    let catalog = state.catalog.read();
    let packs = document(&catalog)?
        .get("preset_packs")
        .and_then(|p| p.get("packs"))
        .cloned()
        .unwrap_or_else(|| json!([]));
    tracing::info!(
        "Returned {} preset packs",
        packs.as_array().map_or(0, Vec::len)
    );

    Ok(Json(json!({ "packs": packs })))
}

/// `GET /api/universal-options`
pub async fn universal_options(State(state): State<Arc<GatewayState>>) -> Result<Json<Value>> {
    let catalog = state.catalog.read();
    let universal = field(document(&catalog)?, "universal_options", json!({}));

    Ok(Json(json!({ "universal_options": universal })))
}
