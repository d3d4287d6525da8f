//! # Chat API
//!
//! Routes a chat message to a direct model reply or tells the client to
//! open the research stream.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use scynv_core::chat::{respond, ChatReply};
use scynv_core::models::GeminiClient;

use super::ApiError;
use crate::SharedState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
    pub chat_id: Option<String>,
}

/// Direct replies carry only `reply`; research replies set `useAgent`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_agent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

impl From<ChatReply> for ChatResponse {
    fn from(reply: ChatReply) -> Self {
        match reply {
            ChatReply::Research {
                reply,
                use_agent,
                message,
                chat_id,
            } => Self {
                reply,
                use_agent: Some(use_agent),
                message: Some(message),
                chat_id,
            },
            ChatReply::Direct { reply } => Self {
                reply,
                use_agent: None,
                message: None,
                chat_id: None,
            },
        }
    }
}

pub fn chat_routes() -> Router<SharedState> {
    Router::new().route("/chat", post(chat))
}

/// Answer a chat message or start research
#[utoipa::path(
    post,
    path = "/api/v1/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Direct reply or research hand-off", body = ChatResponse),
        (status = 400, description = "Missing message or API keys", body = super::ErrorBody)
    )
)]
pub async fn chat(
    State(state): State<SharedState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing message"))?;

    let model_key = state.credentials.model_key()?;
    let model_config = state.settings.read().await.model_config();
    let llm = GeminiClient::with_http_client(model_config, model_key, state.http.clone());

    let reply = respond(
        &message,
        req.chat_id,
        state.credentials.has_search_key(),
        &llm,
    )
    .await;

    Ok(Json(reply.into()))
}
