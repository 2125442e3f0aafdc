// src/handlers/generate.rs

use axum::{Json, body::Bytes, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, sanitize::sanitize_fragment, state::AppState};

const MISSING_PROMPT: &str = "Missing \"prompt\" in request body.";
const MISSING_API_KEY: &str = "Missing GEMINI_API_KEY on server.";

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub html: String,
}

/// Proxies a prompt to the generative-text API and returns a sanitized
/// HTML fragment.
///
/// * Validates the request shape and the server credential before any
///   network traffic.
/// * Makes exactly one upstream call; failures map straight onto
///   [`AppError`] with no retry.
/// * Reduces the generated markup to the fixed allow-list.
pub async fn generate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    // A body that does not decode to an object behaves like an empty one,
    // so the caller sees the same missing-prompt error either way.
    let req: GenerateRequest = serde_json::from_slice(&body).unwrap_or_default();

    let prompt = match req.prompt.as_deref() {
        Some(p) if !p.is_empty() => p,
        _ => return Err(AppError::BadRequest(MISSING_PROMPT.to_string())),
    };

    let api_key = state
        .config
        .gemini_api_key
        .as_deref()
        .ok_or_else(|| AppError::ServerMisconfigured(MISSING_API_KEY.to_string()))?;

    let text = state.gemini.generate(api_key, prompt).await?;

    Ok(Json(GenerateResponse {
        html: sanitize_fragment(&text),
    }))
}

/// Fallback for non-POST methods on the generate route.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
