// src/config.rs

use dotenvy::dotenv;
use std::env;

use crate::gemini::DEFAULT_API_BASE;

#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream API key. Its absence is reported per-request as a server
    /// misconfiguration (HTTP 500), so startup does not fail without it.
    pub gemini_api_key: Option<String>,
    /// Base URL of the generative-language API. Overridden in tests to point
    /// at a local fake upstream.
    pub gemini_api_base: String,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let gemini_api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());

        let gemini_api_base =
            env::var("GEMINI_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            gemini_api_key,
            gemini_api_base,
            rust_log,
        }
    }
}
