//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::error::GatewayError;
use crate::ollama::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use promptgen_core::{DEFAULT_MAX_AGE_HOURS, DEFAULT_MAX_MESSAGES};

/// Smallest budget that still fits system + user + assistant
pub const MIN_MAX_MESSAGES: usize = 3;

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// SQLite file holding sessions and history
    pub database_path: PathBuf,

    /// Log level name (`INFO`, `DEBUG`, ...)
    pub log_level: String,

    pub ollama: OllamaSettings,

    pub conversation: ConversationSettings,

    pub catalog: CatalogSettings,

    pub admin: AdminSettings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_path: PathBuf::from("prompt_history.db"),
            log_level: "INFO".to_string(),
            ollama: OllamaSettings::default(),
            conversation: ConversationSettings::default(),
            catalog: CatalogSettings::default(),
            admin: AdminSettings::default(),
        }
    }
}

impl GatewayConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Set the Ollama URL and default model
    pub fn with_ollama(mut self, url: impl Into<String>, model: impl Into<String>) -> Self {
        self.ollama.url = url.into();
        self.ollama.model = model.into();
        self
    }

    /// Set the per-session budget and lifetime
    pub fn with_conversation_limits(mut self, max_messages: usize, max_age_hours: u64) -> Self {
        self.conversation.max_messages = max_messages;
        self.conversation.max_age_hours = max_age_hours;
        self
    }

    /// Point every catalog path under one directory
    pub fn with_catalog_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.catalog = CatalogSettings::rooted_at(root.into());
        self
    }

    pub fn with_admin(mut self, admin: AdminSettings) -> Self {
        self.admin = admin;
        self
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> crate::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| {
                GatewayError::InvalidConfig(format!(
                    "Invalid socket address {}:{}: {}",
                    self.host, self.port, e
                ))
            })
    }

    /// Reject settings the gateway cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.conversation.max_messages < MIN_MAX_MESSAGES {
            return Err(GatewayError::InvalidConfig(format!(
                "max_messages must be at least {} (got {})",
                MIN_MAX_MESSAGES, self.conversation.max_messages
            )));
        }
        if self.ollama.model.trim().is_empty() {
            return Err(GatewayError::InvalidConfig(
                "Ollama model must not be empty".to_string(),
            ));
        }
        self.socket_addr()?;
        Ok(())
    }
}

/// Ollama settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    /// Generate endpoint, base URL or bare `host:port`
    pub url: String,

    /// Default model name
    pub model: String,

    /// Probe the server once at startup
    pub startup_check: bool,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            startup_check: true,
        }
    }
}

/// Conversation store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSettings {
    /// Message budget per session, system message included
    pub max_messages: usize,

    /// Session lifetime; 0 keeps sessions forever
    pub max_age_hours: u64,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
        }
    }
}

/// Locations of prompt, persona and preset files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// `{model}_{oneshot|chat}.txt` system prompts
    pub prompts_dir: PathBuf,

    pub personas_file: PathBuf,

    /// Persona prompt files
    pub personas_dir: PathBuf,

    pub presets_file: PathBuf,

    pub hierarchical_presets_file: PathBuf,

    /// Build messages from hierarchical `selections`
    pub enable_hierarchical_presets: bool,
}

impl CatalogSettings {
    pub fn rooted_at(root: PathBuf) -> Self {
        Self {
            prompts_dir: root.join("prompts"),
            personas_file: root.join("personas.json"),
            personas_dir: root.join("personas"),
            presets_file: root.join("presets.json"),
            hierarchical_presets_file: root.join("hierarchical_presets.json"),
            enable_hierarchical_presets: false,
        }
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self::rooted_at(PathBuf::new())
    }
}

/// Admin endpoint access
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSettings {
    /// When set, the only accepted credential
    pub api_key: Option<String>,

    /// Extra client IPs allowed besides loopback
    pub allowed_ips: Vec<IpAddr>,

    /// Take the client IP from `X-Forwarded-For`
    pub trust_proxy_headers: bool,
}

impl AdminSettings {
    /// Parse a comma separated IP list, skipping invalid entries
    pub fn parse_allowed_ips(raw: &str) -> Vec<IpAddr> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| match s.parse() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    tracing::warn!("Ignoring invalid admin IP '{}'", s);
                    None
                }
            })
            .collect()
    }
}
