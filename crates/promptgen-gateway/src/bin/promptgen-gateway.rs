#!/usr/bin/env cargo
//! Promptgen Gateway Binary
//!
//! Standalone HTTP server for the prompt generator UI and API.
//!
//! # Usage
//! ```bash
//! promptgen-gateway [--port 5000] [--host 127.0.0.1] [--ollama-model qwen3:latest] [--verbose]
//! ```
//!
//! Every flag can also be set from the environment or a `.env` file.

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use promptgen_gateway::config::AdminSettings;
use promptgen_gateway::ollama::{base_url, check_connection, generate_url};
use promptgen_gateway::{Gateway, GatewayConfig};

/// Promptgen Gateway - image prompt generation over a local Ollama server
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "5000")]
    port: u16,

    /// Host to bind to (use 0.0.0.0 to expose on the network)
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Ollama generate endpoint, base URL or host:port
    #[arg(long, env = "OLLAMA_URL", default_value = "http://localhost:11434/api/generate")]
    ollama_url: String,

    /// Default Ollama model
    #[arg(long, env = "OLLAMA_MODEL", default_value = "qwen3:latest")]
    ollama_model: String,

    /// Probe Ollama once at startup
    #[arg(
        long,
        env = "OLLAMA_STARTUP_CHECK",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    ollama_startup_check: bool,

    /// SQLite file for sessions and history
    #[arg(long, env = "DATABASE_PATH", default_value = "prompt_history.db")]
    database_path: PathBuf,

    /// Directory holding prompts/, personas/ and the preset files
    #[arg(long, env = "PROMPTGEN_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Build messages from hierarchical preset selections
    #[arg(
        long,
        env = "ENABLE_HIERARCHICAL_PRESETS",
        default_value = "false",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    hierarchical_presets: bool,

    /// Messages kept per conversation, system prompt included
    #[arg(long, env = "MAX_MESSAGES", default_value = "21")]
    max_messages: usize,

    /// Conversation lifetime in hours (0 disables expiry)
    #[arg(long, env = "MAX_AGE_HOURS", default_value = "24")]
    max_age_hours: u64,

    /// Key required by admin endpoints; disables the IP allow-list
    #[arg(long, env = "ADMIN_API_KEY", hide_env_values = true)]
    admin_api_key: Option<String>,

    /// Comma separated IPs allowed on admin endpoints besides loopback
    #[arg(long, env = "ADMIN_ALLOWED_IPS", default_value = "")]
    admin_allowed_ips: String,

    /// Trust X-Forwarded-For when checking admin access
    #[arg(
        long,
        env = "TRUST_PROXY_HEADERS",
        default_value = "false",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    trust_proxy_headers: bool,

    /// Log level (DEBUG, INFO, WARNING, ERROR); RUST_LOG takes precedence
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    log_level: String,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter_directive(&args.log_level)));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let mut config = GatewayConfig::default()
        .with_host(args.host.clone())
        .with_port(args.port)
        .with_database_path(args.database_path.clone())
        .with_ollama(args.ollama_url.clone(), args.ollama_model.clone())
        .with_conversation_limits(args.max_messages, args.max_age_hours)
        .with_catalog_root(&args.data_dir)
        .with_admin(AdminSettings {
            api_key: args.admin_api_key.clone().filter(|key| !key.is_empty()),
            allowed_ips: AdminSettings::parse_allowed_ips(&args.admin_allowed_ips),
            trust_proxy_headers: args.trust_proxy_headers,
        });
    config.log_level = args.log_level.clone();
    config.catalog.enable_hierarchical_presets = args.hierarchical_presets;
    config.ollama.startup_check = args.ollama_startup_check;

    if config.ollama.startup_check {
        let base = base_url(&generate_url(&config.ollama.url));
        if check_connection(&base).await {
            tracing::info!("Connected to Ollama at {}", base);
        } else {
            tracing::warn!(
                "Cannot reach Ollama at {}; requests will fail until it is running",
                base
            );
        }
    }

    print_banner(&config);

    let gateway = Gateway::new(config)?;
    gateway.start().await?;

    Ok(())
}

/// Map level names like `WARNING` or `CRITICAL` onto tracing directives
fn filter_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" | "FATAL" => "error",
        _ => "info",
    }
}

fn print_banner(config: &GatewayConfig) {
    println!();
    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("║                                                               ║");
    println!("║              PROMPTGEN GATEWAY  -  IMAGE PROMPTS              ║");
    println!("║                                                               ║");
    println!("║        Flux / SDXL prompt generation via local Ollama         ║");
    println!("║                                                               ║");
    println!("╚═══════════════════════════════════════════════════════════════╝");
    println!();
    println!("Web UI");
    println!("   └─ http://{}:{}", config.host, config.port);
    println!();
    println!("Ollama");
    println!("   ├─ {}", config.ollama.url);
    println!("   └─ model {}", config.ollama.model);
    println!();
    println!("HTTP Endpoints");
    println!("   ├─ POST /generate, /generate-stream      One-shot prompts");
    println!("   ├─ POST /chat, /chat-stream, /reset      Model chat");
    println!("   ├─ POST /persona-chat[-stream], /persona-reset");
    println!("   ├─ GET  /api/personas, /api/personas/:id");
    println!("   ├─ GET  /presets, /models, /health, /status");
    println!("   ├─ GET  /api/categories/..., /api/artists/...  Hierarchical presets");
    println!("   ├─ GET  /api/preset-packs, /api/universal-options");
    println!("   ├─ GET  /history   DELETE /history/:id");
    println!("   └─ POST /admin/reload-prompts");
    println!();
    println!("─────────────────────────────────────────────────────────────────");
    println!("Press Ctrl+C to stop the gateway");
    println!();
}
