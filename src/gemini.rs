// src/gemini.rs

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;

/// Model identifier the proxy is pinned to.
const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";

/// Default base URL of the generative-language API. Overridable through
/// configuration so tests can target a local fake upstream.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Thin client for the Gemini `generateContent` endpoint.
///
/// Holds a shared `reqwest::Client`; cloning is cheap and every clone reuses
/// the same connection pool.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Builds the endpoint URL with the API key as a query credential.
    /// The key only ever lives in the URL; it is never logged.
    fn endpoint(&self, api_key: &str) -> Result<Url, AppError> {
        let raw = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let mut url = Url::parse(&raw)
            .map_err(|e| AppError::Internal(format!("Invalid upstream URL: {e}")))?;
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }

    /// Sends the prompt upstream and returns the first generated-text
    /// fragment, or the empty string when the response carries none.
    ///
    /// One call, no retries. A non-success status becomes
    /// [`AppError::Upstream`] with the upstream body passed through; a
    /// transport failure becomes [`AppError::Internal`].
    pub async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, AppError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let resp = self
            .http
            .post(self.endpoint(api_key)?)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            tracing::warn!("Upstream returned {}: {}", status, detail);
            return Err(AppError::Upstream {
                status: status.as_u16(),
                detail,
            });
        }

        let payload: GenerateContentResponse = resp.json().await?;
        Ok(payload.first_text().unwrap_or_default())
    }
}

// --- Wire types ---

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`; any missing segment of the
    /// path yields None rather than an error.
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> GenerateContentResponse {
        serde_json::from_str(raw).expect("payload should deserialize")
    }

    #[test]
    fn extracts_first_candidate_text() {
        let resp = parse(
            r#"{
                "candidates": [
                    {"content": {"parts": [{"text": "first"}, {"text": "second"}]}},
                    {"content": {"parts": [{"text": "other candidate"}]}}
                ]
            }"#,
        );
        assert_eq!(resp.first_text().as_deref(), Some("first"));
    }

    #[test]
    fn missing_candidates_yields_none() {
        assert_eq!(parse(r#"{}"#).first_text(), None);
        assert_eq!(parse(r#"{"candidates": []}"#).first_text(), None);
    }

    #[test]
    fn missing_content_or_parts_yields_none() {
        assert_eq!(parse(r#"{"candidates": [{}]}"#).first_text(), None);
        assert_eq!(
            parse(r#"{"candidates": [{"content": {}}]}"#).first_text(),
            None
        );
        assert_eq!(
            parse(r#"{"candidates": [{"content": {"parts": [{}]}}]}"#).first_text(),
            None
        );
    }

    #[test]
    fn endpoint_carries_model_and_key() {
        let client = GeminiClient::new(reqwest::Client::new(), "http://127.0.0.1:9");
        let url = client.endpoint("secret-key").unwrap();
        assert!(url.path().ends_with(&format!("{DEFAULT_MODEL}:generateContent")));
        assert_eq!(url.query(), Some("key=secret-key"));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash_in_base() {
        let client = GeminiClient::new(reqwest::Client::new(), "http://127.0.0.1:9/");
        let url = client.endpoint("k").unwrap();
        assert!(!url.path().contains("//"));
    }
}
