// tests/api_tests.rs

use axum::{Router, http::StatusCode, response::IntoResponse};
use gemini_proxy::{config::Config, gemini::GeminiClient, routes, state::AppState};

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app(config: Config) -> String {
    let gemini = GeminiClient::new(reqwest::Client::new(), config.gemini_api_base.clone());
    let state = AppState { config, gemini };

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Spawns a fake upstream that answers every request with a fixed status
/// and body, standing in for the generative-language API.
async fn spawn_upstream(status: StatusCode, body: String) -> String {
    let app = Router::new().fallback(move || {
        let body = body.clone();
        async move { (status, body).into_response() }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port for fake upstream");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

fn test_config(api_base: String) -> Config {
    Config {
        gemini_api_key: Some("test-api-key".to_string()),
        gemini_api_base: api_base,
        rust_log: "error".to_string(),
    }
}

/// A Gemini-shaped success payload carrying the given text.
fn gemini_payload(text: &str) -> String {
    serde_json::json!({
        "candidates": [
            { "content": { "parts": [ { "text": text } ] } }
        ]
    })
    .to_string()
}

#[tokio::test]
async fn unknown_path_404() {
    // Arrange
    let address = spawn_app(test_config("http://127.0.0.1:9".to_string())).await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn get_on_generate_returns_405() {
    // Arrange
    let address = spawn_app(test_config("http://127.0.0.1:9".to_string())).await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/api/generate", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 405);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Method Not Allowed");
}

#[tokio::test]
async fn missing_prompt_returns_400() {
    // Arrange
    let address = spawn_app(test_config("http://127.0.0.1:9".to_string())).await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .post(&format!("{}/api/generate", address))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Missing \"prompt\" in request body.");
}

#[tokio::test]
async fn empty_prompt_returns_400() {
    // Arrange
    let address = spawn_app(test_config("http://127.0.0.1:9".to_string())).await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .post(&format!("{}/api/generate", address))
        .json(&serde_json::json!({ "prompt": "" }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn malformed_body_returns_400() {
    // Arrange
    let address = spawn_app(test_config("http://127.0.0.1:9".to_string())).await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .post(&format!("{}/api/generate", address))
        .header("Content-Type", "application/json")
        .body("this is not json")
        .send()
        .await
        .expect("Failed to execute request");

    // Assert: treated like a missing prompt, not a decode crash
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Missing \"prompt\" in request body.");
}

#[tokio::test]
async fn missing_api_key_returns_500() {
    // Arrange: no credential configured; upstream base points nowhere so a
    // call attempt would fail with a different error body.
    let config = Config {
        gemini_api_key: None,
        gemini_api_base: "http://127.0.0.1:9".to_string(),
        rust_log: "error".to_string(),
    };
    let address = spawn_app(config).await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .post(&format!("{}/api/generate", address))
        .json(&serde_json::json!({ "prompt": "hello" }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Missing GEMINI_API_KEY on server.");
}

#[tokio::test]
async fn success_returns_sanitized_html() {
    // Arrange
    let payload = gemini_payload("<p>Hi</p><script>alert(1)</script>");
    let upstream = spawn_upstream(StatusCode::OK, payload).await;
    let address = spawn_app(test_config(upstream)).await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .post(&format!("{}/api/generate", address))
        .json(&serde_json::json!({ "prompt": "say hi" }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let html = body["html"].as_str().unwrap();
    assert!(html.contains("<p>Hi</p>"));
    assert!(!html.to_ascii_lowercase().contains("<script"));
}

#[tokio::test]
async fn disallowed_markup_collapses_to_text() {
    // Arrange
    let payload = gemini_payload("<div onclick=\"x()\">hi</div>");
    let upstream = spawn_upstream(StatusCode::OK, payload).await;
    let address = spawn_app(test_config(upstream)).await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .post(&format!("{}/api/generate", address))
        .json(&serde_json::json!({ "prompt": "anything" }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["html"], "hi");
}

#[tokio::test]
async fn upstream_error_status_passes_through() {
    // Arrange
    let upstream = spawn_upstream(StatusCode::TOO_MANY_REQUESTS, "rate limited".to_string()).await;
    let address = spawn_app(test_config(upstream)).await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .post(&format!("{}/api/generate", address))
        .json(&serde_json::json!({ "prompt": "hello" }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 429);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Upstream error");
    assert_eq!(body["detail"], "rate limited");
}

#[tokio::test]
async fn missing_text_path_yields_empty_html() {
    // Arrange
    let upstream = spawn_upstream(StatusCode::OK, r#"{"candidates": []}"#.to_string()).await;
    let address = spawn_app(test_config(upstream)).await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .post(&format!("{}/api/generate", address))
        .json(&serde_json::json!({ "prompt": "hello" }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["html"], "");
}

#[tokio::test]
async fn unreachable_upstream_returns_500() {
    // Arrange: nothing listens on this port, so the transport itself fails
    let address = spawn_app(test_config("http://127.0.0.1:9".to_string())).await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .post(&format!("{}/api/generate", address))
        .json(&serde_json::json!({ "prompt": "hello" }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Server error");
}
