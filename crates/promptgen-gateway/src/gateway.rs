//! Main Gateway implementation
//!
//! HTTP front end for prompt generation: wires the conversation store, the
//! history log, the prompt catalog and the LLM backend into an axum router.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::{delete, get, post},
    Json, Router,
};
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use promptgen_core::{ConversationStore, Database, HistoryLog, NewHistoryEntry};

use crate::binding::{SessionBinding, CHAT_COOKIE, PERSONA_COOKIE};
use crate::catalog::PromptCatalog;
use crate::config::GatewayConfig;
use crate::ollama::{LlmBackend, OllamaClient};
use crate::routes;
use crate::security::AdminPolicy;
use crate::{GatewayError, Result};

/// Gateway state shared across handlers
#[derive(Clone)]
pub struct GatewayState {
    pub config: GatewayConfig,
    pub conversations: ConversationStore,
    /// Model chat, bound through the `conversation_id` cookie
    pub chat: SessionBinding,
    /// Persona chat, bound through the `persona_conversation_id` cookie
    pub persona_chat: SessionBinding,
    pub history: HistoryLog,
    pub catalog: Arc<RwLock<PromptCatalog>>,
    pub llm: Arc<dyn LlmBackend>,
    pub admin: AdminPolicy,
}

impl GatewayState {
    /// Open the database and talk to the configured Ollama server
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let llm = Arc::new(OllamaClient::new(&config.ollama.url)?);
        Self::with_backend(config, llm)
    }

    /// Open the database with a caller-provided backend
    pub fn with_backend(config: GatewayConfig, llm: Arc<dyn LlmBackend>) -> Result<Self> {
        config.validate()?;
        let db = Database::open(&config.database_path)?;

        let conversations = ConversationStore::new(
            db.clone(),
            config.conversation.max_messages,
            config.conversation.max_age_hours,
        )?;
        let history = HistoryLog::new(db)?;
        let catalog = PromptCatalog::load(config.catalog.clone());

        Ok(Self {
            chat: SessionBinding::new(conversations.clone(), CHAT_COOKIE),
            persona_chat: SessionBinding::new(conversations.clone(), PERSONA_COOKIE),
            conversations,
            history,
            catalog: Arc::new(RwLock::new(catalog)),
            llm,
            admin: AdminPolicy::new(config.admin.clone()),
            config,
        })
    }

    /// Record a generation; failures are logged, never returned
    pub fn record_history(&self, entry: NewHistoryEntry) {
        if let Err(e) = self.history.record(&entry) {
            tracing::error!("Failed to save generation to history: {}", e);
        }
    }
}

/// Main Gateway
pub struct Gateway {
    state: Arc<GatewayState>,
}

impl Gateway {
    /// Create a new gateway with configuration
    pub fn new(config: GatewayConfig) -> Result<Self> {
        Ok(Self::from_state(GatewayState::new(config)?))
    }

    pub fn from_state(state: GatewayState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Get gateway state
    pub fn state(&self) -> Arc<GatewayState> {
        self.state.clone()
    }

    /// Build the Axum router
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/", get(Self::handle_index))
            .route("/health", get(Self::handle_health))
            .route("/status", get(Self::handle_status))
            .route("/presets", get(routes::presets::list_presets))
            .route("/api/categories", get(routes::presets::list_categories))
            .route(
                "/api/categories/:category_id/types",
                get(routes::presets::list_types),
            )
            .route(
                "/api/categories/:category_id/types/:type_id/artists",
                get(routes::presets::list_artists),
            )
            .route(
                "/api/artists/:category_id/:type_id/:artist_id/technical",
                get(routes::presets::artist_technical),
            )
            .route(
                "/api/artists/:category_id/:type_id/:artist_id/specifics",
                get(routes::presets::artist_specifics),
            )
            .route("/api/preset-packs", get(routes::presets::list_preset_packs))
            .route("/api/universal-options", get(routes::presets::universal_options))
            .route("/api/personas", get(routes::persona::list_personas))
            .route("/api/personas/:id", get(routes::persona::persona_details))
            .route("/generate", post(routes::generate::generate))
            .route("/generate-stream", post(routes::generate::generate_stream))
            .route("/chat", post(routes::chat::chat))
            .route("/chat-stream", post(routes::chat::chat_stream))
            .route("/reset", post(routes::chat::reset))
            .route("/persona-chat", post(routes::persona::persona_chat))
            .route("/persona-chat-stream", post(routes::persona::persona_chat_stream))
            .route("/persona-reset", post(routes::persona::persona_reset))
            .route("/history", get(routes::history::list_history))
            .route("/history/:id", delete(routes::history::delete_history))
            .route("/models", get(routes::models::list_models))
            .route("/admin/reload-prompts", post(routes::admin::reload_prompts))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the gateway server
    pub async fn start(&self) -> Result<()> {
        let addr = self.state.config.socket_addr()?;
        let router = self.build_router();

        tracing::info!("Prompt gateway starting on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(GatewayError::Io)?;

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

        Ok(())
    }

    // HTTP handlers

    async fn handle_index() -> Html<&'static str> {
        Html(include_str!("../static/index.html"))
    }

    async fn handle_health() -> impl IntoResponse {
        Json(serde_json::json!({
            "status": "healthy",
            "version": crate::VERSION
        }))
    }

    async fn handle_status(State(state): State<Arc<GatewayState>>) -> Result<impl IntoResponse> {
        let sessions = state.conversations.session_count()?;
        let catalog = state.catalog.read();

        Ok(Json(serde_json::json!({
            "version": crate::VERSION,
            "sessions": sessions,
            "ollama": {
                "url": state.config.ollama.url,
                "model": state.config.ollama.model,
            },
            "conversation": {
                "max_messages": state.conversations.max_messages(),
                "max_age_hours": state.config.conversation.max_age_hours,
            },
            "personas": catalog.personas().len(),
            "hierarchical_presets": catalog.hierarchical_enabled(),
        })))
    }
}
