//! # Research Agent
//!
//! Autonomous web research for a single query.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Query → Planning → Web Search → Analysis → Synthesis → Answer
//! ```

pub mod bridge;
pub mod events;
pub mod pipeline;
pub mod plan;
pub mod prompts;
pub mod researcher;
pub mod sse;

pub use bridge::{spawn_research, DisconnectPolicy, ResearchHandle};
pub use events::{PhaseId, ResearchEvent};
pub use pipeline::{research_phases, Pipeline, PipelineStage};
pub use plan::{PlanOutcome, ResearchPlan};
pub use researcher::{AgentError, ResearchAgent};
pub use sse::SseDecoder;

use crate::config::{AgentSettings, Credentials};
use crate::models::GeminiClient;
use crate::tools::GoogleSearchClient;
use anyhow::Result;
use std::sync::Arc;

/// Build an agent wired to the Gemini and Google Custom Search providers
pub fn build_agent(settings: &AgentSettings, credentials: &Credentials) -> Result<ResearchAgent> {
    build_agent_with_http(settings, credentials, reqwest::Client::new())
}

/// Same as [`build_agent`], with both providers on a shared connection pool
pub fn build_agent_with_http(
    settings: &AgentSettings,
    credentials: &Credentials,
    http: reqwest::Client,
) -> Result<ResearchAgent> {
    let (model_key, search_key) = credentials.research_keys()?;

    let llm = GeminiClient::with_http_client(settings.model_config(), model_key, http.clone());
    let search = GoogleSearchClient::with_http_client(search_key, &settings.search_cx, http)
        .with_base_url(&settings.search_base_url);

    Ok(ResearchAgent::new(Arc::new(llm), Arc::new(search))
        .with_results_per_query(settings.results_per_query))
}
