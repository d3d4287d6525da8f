//! In-process stand-ins for the Gemini and Custom Search HTTP APIs.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

use scynv_core::config::{AgentSettings, Credentials};
use scynv_core::models::API_KEY_HEADER;

use crate::{app, AppState};

pub struct FakeProviders {
    pub base_url: String,
}

impl FakeProviders {
    pub const ANSWER: &'static str = "ChatGPT, Claude and Gemini lead the pack right now.";
    pub const DIRECT: &'static str = "Hello from the model";

    pub async fn spawn() -> Self {
        Self::serve(false).await
    }

    /// Every model call returns HTTP 500
    pub async fn spawn_failing_model() -> Self {
        Self::serve(true).await
    }

    async fn serve(fail_model: bool) -> Self {
        let router = Router::new()
            .route("/models/:model", post(generate))
            .route("/search", get(search))
            .with_state(fail_model);
        Self {
            base_url: serve(router).await,
        }
    }

    pub fn settings(&self) -> AgentSettings {
        AgentSettings {
            llm_base_url: self.base_url.clone(),
            search_base_url: format!("{}/search", self.base_url),
            ..AgentSettings::default()
        }
    }
}

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{}", addr)
}

async fn generate(
    State(fail): State<bool>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let header_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if header_key.is_empty() || params.contains_key("key") {
        return (StatusCode::UNAUTHORIZED, "API key must be sent in the header").into_response();
    }
    if fail {
        return (StatusCode::INTERNAL_SERVER_ERROR, "backend exploded").into_response();
    }

    let prompt = body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default();
    let text = if prompt.starts_with("Create a research plan") {
        json!({
            "searchQueries": ["best AI tools 2024", "top AI platforms"],
            "focusAreas": ["AI tools"],
            "expectedOutcome": "A short list"
        })
        .to_string()
    } else if prompt.starts_with("Analyze these search results") {
        "Analysis: three tools dominate.".to_string()
    } else if prompt.starts_with("Based on this research analysis") {
        FakeProviders::ANSWER.to_string()
    } else {
        FakeProviders::DIRECT.to_string()
    };

    Json(json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })).into_response()
}

async fn search(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let q = params.get("q").cloned().unwrap_or_default();
    Json(json!({
        "items": [
            { "title": format!("{} - Guide", q), "snippet": "A roundup", "link": "https://example.com/a" },
            { "title": format!("{} - Review", q), "snippet": "Hands-on", "link": "https://example.com/b" }
        ]
    }))
}

/// Serve the real API against the fake providers; returns its base URL
pub async fn spawn_app(credentials: Credentials, providers: &FakeProviders) -> String {
    let state = Arc::new(AppState {
        settings: RwLock::new(providers.settings()),
        credentials,
        http: reqwest::Client::new(),
        persist_settings: false,
    });
    serve(app(state)).await
}
