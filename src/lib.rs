//! openrouter-relay - streaming chat relay for the OpenRouter API
//!
//! Accepts chat requests from a browser frontend, reshapes their messages
//! into the OpenAI-compatible format, and streams the generated text back
//! as plain text while it is produced.

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod telemetry;
pub mod upstream;
