//! # Research API
//!
//! Streams one research run to the client as Server-Sent Events.

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;
use utoipa::IntoParams;

use scynv_core::agent::{build_agent_with_http, spawn_research, DisconnectPolicy};

use super::ApiError;
use crate::SharedState;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ResearchQuery {
    /// The research question
    pub message: Option<String>,
    /// Chat the run belongs to
    pub chat_id: Option<String>,
}

pub fn research_routes() -> Router<SharedState> {
    Router::new().route("/research", get(research_stream))
}

/// Run research and stream its events
#[utoipa::path(
    get,
    path = "/api/v1/research",
    tag = "research",
    params(ResearchQuery),
    responses(
        (status = 200, description = "Event stream, one JSON event per `data:` frame", content_type = "text/event-stream"),
        (status = 400, description = "Missing message or API keys", body = super::ErrorBody)
    )
)]
pub async fn research_stream(
    State(state): State<SharedState>,
    Query(query): Query<ResearchQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let message = query
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing message parameter"))?;

    state.credentials.research_keys()?;
    let settings = state.settings.read().await.clone();
    let agent = build_agent_with_http(&settings, &state.credentials, state.http.clone())?;
    let policy = DisconnectPolicy::from_cancel_flag(settings.cancel_on_disconnect);

    tracing::info!(chat_id = ?query.chat_id, ?policy, "Starting research stream");
    let handle = spawn_research(agent, message, policy);

    let stream = ReceiverStream::new(handle.events)
        .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_json())));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
