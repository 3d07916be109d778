//! Command-line interface for the relay
//!
//! Provides argument parsing and subcommand handling for the binary.

use clap::{Parser, Subcommand};

/// Streaming chat relay for the OpenRouter API
#[derive(Parser)]
#[command(name = "openrouter-relay")]
#[command(version)]
#[command(about = "Streaming chat relay for the OpenRouter API")]
#[command(
    long_about = "Relays chat requests from a browser frontend to OpenRouter and streams \
    the generated text back as it is produced. Credentials come from the \
    OPENROUTER_API_KEY environment variable."
)]
pub struct Cli {
    /// Path to configuration file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "relay.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# openrouter-relay configuration
#
# Every section is optional; missing values fall back to the defaults shown.
#
# Upstream credentials are NOT read from this file. Set them in the environment
# or in a .env file in the working directory (process variables win):
#   OPENROUTER_API_KEY   (required)
#   OPENROUTER_BASE_URL  (default: https://openrouter.ai/api/v1)
#   YOUR_SITE_URL        (default: http://localhost:8000, sent as HTTP-Referer)
#   YOUR_SITE_NAME       (default: FastAPI OpenRouter App, sent as X-Title)

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 8000

[cors]
# Browser origins allowed to call the relay (credentials are allowed)
allowed_origins = ["http://localhost:3000"]

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
# RUST_LOG takes precedence when set
log_level = "info"
"#
}
