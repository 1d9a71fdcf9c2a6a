//! Router integration tests
//!
//! Drive the full axum router in-process with a fake LLM backend and an
//! on-disk database: cookie binding, validation, persona lookups, history,
//! admin access and error mapping.

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use promptgen_core::{Message, Role, SessionId};
use promptgen_gateway::config::AdminSettings;
use promptgen_gateway::{
    Gateway, GatewayConfig, GatewayState, LlmBackend, OllamaError, TokenStream,
};

const REPLY: [&str; 3] = ["A ", "cinematic ", "fox"];

#[derive(Default)]
struct FakeBackend {
    failure: Mutex<Option<OllamaError>>,
    calls: Mutex<Vec<(String, Vec<Message>)>>,
    /// Stream `t0 `, `t1 `, ... with this delay instead of the canned reply,
    /// and delay `generate` by it
    drip: Mutex<Option<Duration>>,
}

impl FakeBackend {
    fn fail_with(&self, error: OllamaError) {
        *self.failure.lock() = Some(error);
    }

    fn drip_every(&self, delay: Duration) {
        *self.drip.lock() = Some(delay);
    }

    fn last_call(&self) -> (String, Vec<Message>) {
        self.calls.lock().last().cloned().expect("backend was called")
    }

    fn record(&self, messages: &[Message], model: &str) -> Result<(), OllamaError> {
        self.calls.lock().push((model.to_string(), messages.to_vec()));
        match self.failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LlmBackend for FakeBackend {
    async fn generate(&self, messages: &[Message], model: &str) -> Result<String, OllamaError> {
        self.record(messages, model)?;
        let drip = *self.drip.lock();
        if let Some(delay) = drip {
            tokio::time::sleep(delay).await;
        }
        Ok(REPLY.concat())
    }

    async fn stream(&self, messages: &[Message], model: &str) -> Result<TokenStream, OllamaError> {
        self.record(messages, model)?;
        let drip = *self.drip.lock();
        if let Some(delay) = drip {
            let tokens = futures::stream::unfold(0usize, move |i| async move {
                if i >= 1000 {
                    return None;
                }
                tokio::time::sleep(delay).await;
                Some((Ok(format!("t{} ", i)), i + 1))
            });
            return Ok(tokens.boxed());
        }
        let tokens: Vec<Result<String, OllamaError>> =
            REPLY.iter().map(|t| Ok(t.to_string())).collect();
        Ok(futures::stream::iter(tokens).boxed())
    }

    async fn list_models(&self) -> Result<Vec<String>, OllamaError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        Ok(vec!["qwen3:latest".to_string(), "llama3".to_string()])
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    state: Arc<GatewayState>,
    router: Router,
    llm: Arc<FakeBackend>,
}

fn harness() -> Harness {
    harness_with(|config| config)
}

fn harness_with(customize: impl FnOnce(GatewayConfig) -> GatewayConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();

    fs::write(
        dir.path().join("personas.json"),
        r#"{
            "artist": {"name": "Artist", "prompt_file": "artist.txt", "supports_presets": true},
            "broken": {"name": "Broken", "prompt_file": "missing.txt"}
        }"#,
    )
    .unwrap();
    fs::create_dir_all(dir.path().join("personas")).unwrap();
    fs::write(
        dir.path().join("personas/artist.txt"),
        "You are a painter describing scenes.",
    )
    .unwrap();

    let config = customize(
        GatewayConfig::default()
            .with_database_path(dir.path().join("gateway.db"))
            .with_catalog_root(dir.path()),
    );

    let llm = Arc::new(FakeBackend::default());
    let state = GatewayState::with_backend(config, llm.clone()).unwrap();
    let gateway = Gateway::from_state(state);

    Harness {
        router: gateway.build_router(),
        state: gateway.state(),
        llm,
        _dir: dir,
    }
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }

    /// `name=value` part of the Set-Cookie header, if any
    fn cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().split(';').next().unwrap().to_string())
    }

    fn set_cookie(&self) -> String {
        self.headers
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default()
    }
}

fn session_of(cookie: &str) -> SessionId {
    SessionId::from(cookie.split_once('=').unwrap().1)
}

async fn send(router: &Router, request: Request<Body>) -> Reply {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    Reply {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

/// Poll until `check` yields a value; background finalization is not awaited by the response
async fn eventually<T>(mut check: impl FnMut() -> Option<T>) -> T {
    for _ in 0..250 {
        if let Some(value) = check() {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within 5s");
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn admin_request(peer: [u8; 4], api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/admin/reload-prompts");
    if let Some(key) = api_key {
        builder = builder.header("x-admin-api-key", key);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
    request
}

#[tokio::test]
async fn test_health_and_status() {
    let h = harness();

    let health = send(&h.router, get("/health")).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.json()["status"], "healthy");

    let status = send(&h.router, get("/status")).await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.json()["sessions"], 0);
    assert_eq!(status.json()["personas"], 2);
}

#[tokio::test]
async fn test_index_serves_html() {
    let h = harness();
    let reply = send(&h.router, get("/")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.contains("<html"));
}

#[tokio::test]
async fn test_chat_sets_cookie_and_continues_session() {
    let h = harness();

    let first = send(
        &h.router,
        post_json("/chat", json!({"message": "a red fox"}), None),
    )
    .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json()["result"], "A cinematic fox");
    assert_eq!(first.json()["model"], "flux");
    assert!(first.set_cookie().contains("HttpOnly"));
    let cookie = first.cookie().expect("session cookie");
    assert!(cookie.starts_with("conversation_id="));

    let second = send(
        &h.router,
        post_json("/chat", json!({"message": "make it snowy"}), Some(&cookie)),
    )
    .await;
    assert_eq!(second.status, StatusCode::OK);
    assert!(second.cookie().is_none());

    let (model, seen) = h.llm.last_call();
    assert_eq!(model, "qwen3:latest");
    assert_eq!(seen.len(), 4);
    assert_eq!(seen[0].role, Role::System);
    assert_eq!(seen[3].content, "make it snowy");

    let stored = h
        .state
        .conversations
        .get_conversation(Some(&session_of(&cookie)))
        .unwrap();
    assert_eq!(stored.messages.len(), 5);
    assert_eq!(stored.participant.as_deref(), Some("flux"));
    assert_eq!(stored.messages[4].role, Role::Assistant);
}

#[tokio::test]
async fn test_chat_rejects_missing_or_empty_input() {
    let h = harness();

    let empty_body = send(
        &h.router,
        Request::post("/chat").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(empty_body.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty_body.json()["error"], "Invalid request");

    let blank = send(&h.router, post_json("/chat", json!({"message": "   "}), None)).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
    assert_eq!(blank.json()["error"], "Invalid input");

    assert!(h.llm.calls.lock().is_empty());
    assert_eq!(h.state.conversations.session_count().unwrap(), 0);
}

#[tokio::test]
async fn test_switching_model_type_starts_new_session() {
    let h = harness();

    let flux = send(&h.router, post_json("/chat", json!({"message": "a fox"}), None)).await;
    let old_cookie = flux.cookie().unwrap();

    let sdxl = send(
        &h.router,
        post_json(
            "/chat",
            json!({"message": "a fox", "model": "sdxl"}),
            Some(&old_cookie),
        ),
    )
    .await;
    assert_eq!(sdxl.status, StatusCode::OK);
    let new_cookie = sdxl.cookie().expect("new session cookie");
    assert_ne!(new_cookie, old_cookie);

    let old = h
        .state
        .conversations
        .get_conversation(Some(&session_of(&old_cookie)))
        .unwrap();
    assert!(old.is_empty());

    let (_, seen) = h.llm.last_call();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].content.contains("SDXL"));
}

#[tokio::test]
async fn test_reset_clears_cookie_and_session() {
    let h = harness();

    let chat = send(&h.router, post_json("/chat", json!({"message": "a fox"}), None)).await;
    let cookie = chat.cookie().unwrap();

    let reset = send(
        &h.router,
        Request::post("/reset")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(reset.status, StatusCode::OK);
    assert_eq!(reset.json()["status"], "reset");
    assert!(reset.set_cookie().contains("Max-Age=0"));
    assert_eq!(h.state.conversations.session_count().unwrap(), 0);

    // resetting without a session is still fine
    let again = send(
        &h.router,
        Request::post("/reset").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(again.status, StatusCode::OK);
}

#[tokio::test]
async fn test_chat_stream_persists_reply_and_history() {
    let h = harness();

    let reply = send(
        &h.router,
        post_json("/chat-stream", json!({"message": "a lighthouse"}), None),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.contains(r#"data: {"token":"cinematic "}"#));
    assert!(reply.body.contains(r#"data: {"done":true}"#));

    let cookie = reply.cookie().expect("stream binds a session");
    let stored = h
        .state
        .conversations
        .get_conversation(Some(&session_of(&cookie)))
        .unwrap();
    assert_eq!(stored.messages.len(), 3);
    assert_eq!(stored.messages[2].content, "A cinematic fox");

    let history = h.state.history.query(10, None).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].mode, "chat");
}

#[tokio::test]
async fn test_at_capacity_keeps_the_pending_turn() {
    let h = harness_with(|config| config.with_conversation_limits(3, 24));

    let first = send(&h.router, post_json("/chat", json!({"message": "first"}), None)).await;
    let cookie = first.cookie().unwrap();

    let second = send(
        &h.router,
        post_json("/chat", json!({"message": "second"}), Some(&cookie)),
    )
    .await;
    assert_eq!(second.status, StatusCode::OK);

    let (_, seen) = h.llm.last_call();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].role, Role::System);
    assert_eq!(seen[1].content, "second");

    let stored = h
        .state
        .conversations
        .get_conversation(Some(&session_of(&cookie)))
        .unwrap();
    assert_eq!(stored.messages.len(), 3);
    assert_eq!(stored.messages[1].content, "second");
}

#[tokio::test]
async fn test_llm_errors_map_to_status_codes() {
    let h = harness();

    h.llm.fail_with(OllamaError::Connection {
        url: "http://localhost:11434".into(),
    });
    let unavailable = send(
        &h.router,
        post_json("/generate", json!({"input": "a castle"}), None),
    )
    .await;
    assert_eq!(unavailable.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(unavailable.json()["type"], "connection_error");

    h.llm.fail_with(OllamaError::ModelNotFound("nope".into()));
    let missing = send(
        &h.router,
        post_json(
            "/generate",
            json!({"input": "a castle", "ollama_model": "nope"}),
            None,
        ),
    )
    .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(h.llm.last_call().0, "nope");

    assert!(h.state.history.query(10, None).unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_error_still_binds_the_session() {
    let h = harness();
    h.llm.fail_with(OllamaError::Timeout { secs: 120 });

    let reply = send(&h.router, post_json("/chat", json!({"message": "a fox"}), None)).await;
    assert_eq!(reply.status, StatusCode::GATEWAY_TIMEOUT);

    let cookie = reply.cookie().expect("cookie survives the failure");
    let stored = h
        .state
        .conversations
        .get_conversation(Some(&session_of(&cookie)))
        .unwrap();
    assert_eq!(stored.messages.last().unwrap().role, Role::User);
}

#[tokio::test]
async fn test_persona_chat_validation() {
    let h = harness();

    let no_persona = send(
        &h.router,
        post_json("/persona-chat", json!({"message": "hello"}), None),
    )
    .await;
    assert_eq!(no_persona.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_persona.json()["message"], "Please specify a persona_id");

    let unknown = send(
        &h.router,
        post_json(
            "/persona-chat",
            json!({"message": "hello", "persona_id": "ghost"}),
            None,
        ),
    )
    .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.json()["error"], "Persona not found");

    let broken = send(
        &h.router,
        post_json(
            "/persona-chat",
            json!({"message": "hello", "persona_id": "broken"}),
            None,
        ),
    )
    .await;
    assert_eq!(broken.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(broken.json()["error"], "Persona configuration error");

    assert!(h.llm.calls.lock().is_empty());
}

#[tokio::test]
async fn test_persona_chat_uses_persona_prompt() {
    let h = harness();

    let reply = send(
        &h.router,
        post_json(
            "/persona-chat",
            json!({"message": "a harbour at dusk", "persona_id": "artist"}),
            None,
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["persona"], "artist");
    let cookie = reply.cookie().unwrap();
    assert!(cookie.starts_with("persona_conversation_id="));

    let (_, seen) = h.llm.last_call();
    assert_eq!(seen[0].content, "You are a painter describing scenes.");

    let stored = h
        .state
        .conversations
        .get_conversation(Some(&session_of(&cookie)))
        .unwrap();
    assert_eq!(stored.participant.as_deref(), Some("artist"));

    let history = h.state.history.query(10, None).unwrap();
    assert_eq!(history[0].mode, "persona-chat");
    assert_eq!(history[0].presets["persona"], "artist");
}

#[tokio::test]
async fn test_persona_listing_and_details() {
    let h = harness();

    let list = send(&h.router, get("/api/personas")).await;
    assert_eq!(list.status, StatusCode::OK);
    assert!(list.json().get("artist").is_some());

    let details = send(&h.router, get("/api/personas/artist")).await;
    assert_eq!(details.status, StatusCode::OK);
    assert_eq!(details.json()["id"], "artist");
    assert_eq!(details.json()["name"], "Artist");
    assert_eq!(
        details.json()["system_prompt"],
        "You are a painter describing scenes."
    );

    let missing = send(&h.router, get("/api/personas/ghost")).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_history_listing_search_and_delete() {
    let h = harness();

    for input in ["a castle", "a lighthouse"] {
        let reply = send(&h.router, post_json("/generate", json!({"input": input}), None)).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    let all = send(&h.router, get("/history")).await;
    assert_eq!(all.json()["count"], 2);
    assert_eq!(all.json()["history"][0]["user_input"], "a lighthouse");

    let search = send(&h.router, get("/history?q=castle")).await;
    assert_eq!(search.json()["count"], 1);

    let junk_limit = send(&h.router, get("/history?limit=abc")).await;
    assert_eq!(junk_limit.status, StatusCode::OK);

    let bad_limit = send(&h.router, get("/history?limit=0")).await;
    assert_eq!(bad_limit.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_limit.json()["error"], "Invalid limit");

    let id = all.json()["history"][1]["id"].as_i64().unwrap();
    let delete = |uri: String| Request::delete(uri).body(Body::empty()).unwrap();

    let deleted = send(&h.router, delete(format!("/history/{}", id))).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.json()["status"], "deleted");

    let gone = send(&h.router, delete(format!("/history/{}", id))).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let not_numeric = send(&h.router, delete("/history/abc".to_string())).await;
    assert_eq!(not_numeric.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generate_stream_records_history() {
    let h = harness();

    let reply = send(
        &h.router,
        post_json("/generate-stream", json!({"input": "a castle"}), None),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.contains(r#"data: {"done":true}"#));
    assert!(reply.cookie().is_none());

    let history = h.state.history.query(10, None).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].generated_output, "A cinematic fox");
    assert_eq!(history[0].mode, "oneshot");
}

#[tokio::test]
async fn test_models_lists_backend_models() {
    let h = harness();

    let reply = send(&h.router, get("/models")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["models"], json!(["qwen3:latest", "llama3"]));
    assert_eq!(reply.json()["default"], "qwen3:latest");
}

#[tokio::test]
async fn test_presets_fall_back_when_file_missing() {
    let h = harness();

    let reply = send(&h.router, get("/presets")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.json()["styles"].is_object());
}

#[tokio::test]
async fn test_admin_reload_by_client_ip() {
    let h = harness();

    let local = send(&h.router, admin_request([127, 0, 0, 1], None)).await;
    assert_eq!(local.status, StatusCode::OK);
    assert_eq!(local.json()["success"], true);
    assert_eq!(local.json()["reloaded"].as_array().unwrap().len(), 4);

    let remote = send(&h.router, admin_request([203, 0, 113, 9], None)).await;
    assert_eq!(remote.status, StatusCode::FORBIDDEN);
    assert_eq!(remote.json()["error"], "forbidden");
}

#[tokio::test]
async fn test_admin_reload_with_api_key() {
    let h = harness_with(|config| {
        config.with_admin(AdminSettings {
            api_key: Some("s3cret".to_string()),
            ..AdminSettings::default()
        })
    });

    let loopback_without_key = send(&h.router, admin_request([127, 0, 0, 1], None)).await;
    assert_eq!(loopback_without_key.status, StatusCode::FORBIDDEN);

    let wrong = send(&h.router, admin_request([203, 0, 113, 9], Some("guess"))).await;
    assert_eq!(wrong.status, StatusCode::FORBIDDEN);

    let right = send(&h.router, admin_request([203, 0, 113, 9], Some("s3cret"))).await;
    assert_eq!(right.status, StatusCode::OK);
}

#[tokio::test]
async fn test_stream_disconnect_stores_partial_reply() {
    let h = harness();
    h.llm.drip_every(Duration::from_millis(10));

    let response = h
        .router
        .clone()
        .oneshot(post_json("/chat-stream", json!({"message": "a lighthouse"}), None))
        .await
        .unwrap();
    let cookie = response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let mut body = response.into_body();
    let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
    assert!(String::from_utf8_lossy(&first).contains(r#"{"token":"t0 "}"#));
    drop(body);

    let stored = eventually(|| {
        let conversation = h
            .state
            .conversations
            .get_conversation(Some(&session_of(&cookie)))
            .unwrap();
        (conversation.messages.len() == 3).then_some(conversation)
    })
    .await;
    assert_eq!(stored.messages[2].role, Role::Assistant);
    assert!(stored.messages[2].content.starts_with("t0 "));
}

#[tokio::test]
async fn test_chat_turn_completes_after_client_leaves() {
    let h = harness();

    let first = send(&h.router, post_json("/chat", json!({"message": "a fox"}), None)).await;
    let cookie = first.cookie().unwrap();

    h.llm.drip_every(Duration::from_millis(300));
    let abandoned = tokio::time::timeout(
        Duration::from_millis(100),
        h.router
            .clone()
            .oneshot(post_json("/chat", json!({"message": "now at night"}), Some(&cookie))),
    )
    .await;
    assert!(abandoned.is_err());

    let stored = eventually(|| {
        let conversation = h
            .state
            .conversations
            .get_conversation(Some(&session_of(&cookie)))
            .unwrap();
        (conversation.messages.len() == 5).then_some(conversation)
    })
    .await;
    assert_eq!(stored.messages[3].content, "now at night");
    assert_eq!(stored.messages[4].content, "A cinematic fox");
}

#[tokio::test]
async fn test_presets_pick_up_file_edits() {
    let h = harness();

    let before = send(&h.router, get("/presets")).await;
    assert!(before.json()["styles"].get("Noir").is_none());

    fs::write(
        &h.state.config.catalog.presets_file,
        r#"{"styles": {"None": "", "Noir": "film noir, hard shadows"}}"#,
    )
    .unwrap();

    let after = send(&h.router, get("/presets")).await;
    assert_eq!(after.json()["styles"]["Noir"], "film noir, hard shadows");
}

const HIERARCHY: &str = r#"{
    "version": "2.0",
    "categories": {
        "fantasy": {"name": "Fantasy", "popularity": "medium", "level2_types": {}},
        "photography": {
            "name": "Photography",
            "icon": "camera",
            "popularity": "high",
            "level2_types": {
                "landscape": {"name": "Landscape"},
                "portrait": {
                    "name": "Portrait",
                    "popularity": "high",
                    "level3_artists": {
                        "avedon": {"name": "Richard Avedon", "level4_technical": {"camera": ["8x10"]}},
                        "leibovitz": {
                            "name": "Annie Leibovitz",
                            "popularity": "high",
                            "level4_technical": {"lens": ["85mm"]},
                            "level5_specifics": {"pose": ["seated"]}
                        }
                    }
                }
            }
        }
    },
    "preset_packs": {"packs": [{"name": "Studio", "selections": {"level1": "photography"}}]},
    "universal_options": {"mood": {"core": ["calm"]}}
}"#;

fn hierarchical_harness() -> Harness {
    harness_with(|mut config| {
        fs::write(&config.catalog.hierarchical_presets_file, HIERARCHY).unwrap();
        config.catalog.enable_hierarchical_presets = true;
        config
    })
}

fn ids(list: &Value) -> Vec<&str> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_hierarchy_routes_need_the_feature() {
    let h = harness();

    for uri in [
        "/api/categories",
        "/api/categories/photography/types",
        "/api/preset-packs",
        "/api/universal-options",
    ] {
        let reply = send(&h.router, get(uri)).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(reply.json()["error"], "Hierarchical presets not enabled");
    }
}

#[tokio::test]
async fn test_browse_categories_types_and_artists() {
    let h = hierarchical_harness();

    let categories = send(&h.router, get("/api/categories")).await;
    assert_eq!(categories.status, StatusCode::OK);
    assert_eq!(categories.json()["version"], "2.0");
    assert_eq!(ids(&categories.json()["categories"]), ["photography", "fantasy"]);
    assert_eq!(categories.json()["categories"][1]["best_for"], json!([]));

    let types = send(&h.router, get("/api/categories/photography/types")).await;
    assert_eq!(types.json()["category_name"], "Photography");
    assert_eq!(ids(&types.json()["types"]), ["portrait", "landscape"]);

    let artists = send(
        &h.router,
        get("/api/categories/photography/types/portrait/artists"),
    )
    .await;
    let artists = artists.json();
    assert_eq!(artists["type_name"], "Portrait");
    assert_eq!(ids(&artists["artists"]), ["leibovitz", "avedon"]);
    assert_eq!(artists["artists"][0]["has_specifics"], true);
    assert_eq!(artists["artists"][1]["has_technical"], true);
    assert_eq!(artists["artists"][1]["has_specifics"], false);
}

#[tokio::test]
async fn test_browse_unknown_ids_are_not_found() {
    let h = hierarchical_harness();

    let category = send(&h.router, get("/api/categories/cubism/types")).await;
    assert_eq!(category.status, StatusCode::NOT_FOUND);
    assert_eq!(category.json()["error"], "Category not found");

    let kind = send(
        &h.router,
        get("/api/categories/photography/types/street/artists"),
    )
    .await;
    assert_eq!(kind.status, StatusCode::NOT_FOUND);
    assert_eq!(kind.json()["error"], "Type not found");

    let artist = send(
        &h.router,
        get("/api/artists/photography/portrait/adams/technical"),
    )
    .await;
    assert_eq!(artist.status, StatusCode::NOT_FOUND);
    assert_eq!(artist.json()["error"], "Artist not found");
}

#[tokio::test]
async fn test_artist_levels_packs_and_universal_options() {
    let h = hierarchical_harness();

    let technical = send(
        &h.router,
        get("/api/artists/photography/portrait/leibovitz/technical"),
    )
    .await;
    assert_eq!(technical.json()["artist_name"], "Annie Leibovitz");
    assert_eq!(technical.json()["technical_options"]["lens"][0], "85mm");

    let specifics = send(
        &h.router,
        get("/api/artists/photography/portrait/avedon/specifics"),
    )
    .await;
    assert_eq!(specifics.status, StatusCode::OK);
    assert_eq!(specifics.json()["scene_specifics"], json!({}));

    let packs = send(&h.router, get("/api/preset-packs")).await;
    assert_eq!(packs.json()["packs"][0]["name"], "Studio");

    let universal = send(&h.router, get("/api/universal-options")).await;
    assert_eq!(universal.json()["universal_options"]["mood"]["core"][0], "calm");
}
