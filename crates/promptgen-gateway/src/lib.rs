//! Promptgen Gateway - HTTP front end for image prompt generation
//!
//! Serves a single-page UI and a JSON/SSE API that expands image ideas into
//! detailed prompts with a local Ollama model. Conversations live in the
//! server-side store from `promptgen-core`; clients only hold a session cookie.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   Promptgen Gateway                      │
//! ├─────────────────────────────────────────────────────────┤
//! │   /generate    /chat    /persona-chat    /history ...    │
//! │        │          │            │              │          │
//! │        │   ┌──────▼────────────▼──────┐       │          │
//! │        │   │     SessionBinding       │       │          │
//! │        │   │  (cookie → session id)   │       │          │
//! │        │   └────────────┬─────────────┘       │          │
//! │        │                │                     │          │
//! │  ┌─────▼──────┐  ┌──────▼──────────┐   ┌──────▼──────┐   │
//! │  │ Prompt     │  │ Conversation    │   │ History     │   │
//! │  │ Catalog    │  │ Store (SQLite)  │   │ Log         │   │
//! │  └─────┬──────┘  └─────────────────┘   └─────────────┘   │
//! │        │                                                 │
//! │  ┌─────▼─────────────────────────────┐                   │
//! │  │ LlmBackend (Ollama, NDJSON → SSE) │                   │
//! │  └───────────────────────────────────┘                   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Features
//!
//! - **One-shot and chat modes** for Flux and SDXL, blocking or streamed
//! - **Personas**: alternative system prompts selected per conversation
//! - **Presets**: flat style/artist/composition/lighting or hierarchical
//! - **History**: searchable log of past generations
//! - **Admin reload** of prompts without a restart

pub mod binding;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ollama;
pub mod presets;
pub mod routes;
pub mod security;
pub mod streaming;

pub use binding::{BindingState, SessionBinding, Turn, CHAT_COOKIE, PERSONA_COOKIE};
pub use catalog::{Persona, PromptCatalog, PromptMode};
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use gateway::{Gateway, GatewayState};
pub use ollama::{LlmBackend, OllamaClient, OllamaError, TokenStream};
pub use presets::{build_hierarchical_prompt, PresetSelection};
pub use security::{AdminDecision, AdminPolicy};
pub use streaming::{StreamEvent, StreamOutcome};

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5000;

/// Default host
pub const DEFAULT_HOST: &str = "127.0.0.1";
