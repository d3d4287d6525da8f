//! # Research Agent
//!
//! Runs the four research phases strictly in order:
//!
//! ```text
//! Query → Planning → Search → Analysis → Synthesis → final text
//! ```
//!
//! Each phase emits `phase_start`, a few fixed `phase_update` checkpoints and
//! `phase_complete`. A successful run ends with `complete`; a failed one with
//! exactly one `error`.

use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use super::events::{PhaseId, ResearchEvent};
use super::pipeline::Pipeline;
use super::plan::{plan_from_response, PlanOutcome};
use super::prompts;
use crate::models::{GenerateRequest, LanguageModel, LlmError};
use crate::tools::{SearchError, SearchProvider, SearchResultSet, MAX_RESULTS_PER_QUERY};

/// Failure of a research run
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{phase} failed: {source}")]
    Model {
        phase: PhaseId,
        #[source]
        source: LlmError,
    },
}

impl AgentError {
    pub fn phase(&self) -> PhaseId {
        match self {
            AgentError::Model { phase, .. } => *phase,
        }
    }
}

/// The research agent
pub struct ResearchAgent {
    llm: Arc<dyn LanguageModel>,
    search: Arc<dyn SearchProvider>,
    results_per_query: u8,
    pipeline: Pipeline,
    event_tx: Option<mpsc::Sender<ResearchEvent>>,
}

impl ResearchAgent {
    pub fn new(llm: Arc<dyn LanguageModel>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            llm,
            search,
            results_per_query: MAX_RESULTS_PER_QUERY,
            pipeline: Pipeline::new(),
            event_tx: None,
        }
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<ResearchEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Results requested per planned query (capped at 5)
    pub fn with_results_per_query(mut self, count: u8) -> Self {
        self.results_per_query = count.clamp(1, MAX_RESULTS_PER_QUERY);
        self
    }

    /// Delivery failures are ignored; a vanished client is not a pipeline error
    async fn emit(&self, event: ResearchEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    async fn progress(&self, phase: PhaseId, percent: f64) {
        self.emit(ResearchEvent::phase_update(phase, percent)).await;
    }

    async fn ask(&self, phase: PhaseId, prompt: String) -> Result<String, AgentError> {
        self.llm
            .generate(GenerateRequest::new(prompt))
            .await
            .map_err(|source| AgentError::Model { phase, source })
    }

    /// Run the full pipeline on a user query
    #[tracing::instrument(skip(self), fields(query_preview = %query.chars().take(50).collect::<String>()))]
    pub async fn perform_research(&mut self, query: &str) -> Result<String, AgentError> {
        self.pipeline = Pipeline::new();
        match self.run_phases(query).await {
            Ok(answer) => {
                self.emit(ResearchEvent::complete(answer.clone())).await;
                tracing::info!(answer_chars = answer.len(), "Research complete");
                Ok(answer)
            }
            Err(e) => {
                tracing::warn!(
                    phase = %e.phase(),
                    stage = ?self.pipeline.stage,
                    "Research failed: {}",
                    e
                );
                self.pipeline.fail();
                self.emit(ResearchEvent::error(e.to_string())).await;
                Err(e)
            }
        }
    }

    async fn run_phases(&mut self, query: &str) -> Result<String, AgentError> {
        // Phase 1: Planning
        self.begin_phase().await;
        let plan = self.create_research_plan(query).await?.into_plan();
        self.finish_phase(serde_json::to_value(&plan).unwrap_or_default())
            .await;

        // Phase 2: Web search
        self.begin_phase().await;
        let results = self.perform_web_search(&plan.search_queries).await;
        self.finish_phase(serde_json::to_value(&results).unwrap_or_default())
            .await;

        // Phase 3: Analysis
        self.begin_phase().await;
        let analysis = self.analyze_results(query, &results).await?;
        self.finish_phase(json!(analysis)).await;

        // Phase 4: Synthesis
        self.begin_phase().await;
        let answer = self.synthesize_response(&analysis).await?;
        self.finish_phase(json!(answer)).await;

        Ok(answer)
    }

    /// Announce the phase of the current stage
    async fn begin_phase(&self) {
        if let Some(phase) = self.pipeline.current_phase() {
            tracing::debug!(phase = %phase, "Phase started");
            self.emit(ResearchEvent::phase_start(phase)).await;
        }
    }

    /// Report the current stage's result and move to the next stage
    async fn finish_phase(&mut self, result: serde_json::Value) {
        if let Some(phase) = self.pipeline.current_phase() {
            self.emit(ResearchEvent::phase_complete(phase, result)).await;
        }
        self.pipeline.advance();
    }

    /// Ask the model for a plan; malformed output falls back, never fails
    pub async fn create_research_plan(&self, query: &str) -> Result<PlanOutcome, AgentError> {
        let phase = PhaseId::Planning;
        self.progress(phase, 30.0).await;

        let response = self.ask(phase, prompts::planning_prompt(query)).await?;
        self.progress(phase, 80.0).await;

        let outcome = plan_from_response(query, &response);
        if outcome.is_fallback() {
            tracing::info!("Planner output was not a valid plan, using fallback");
        }
        self.emit(
            ResearchEvent::phase_update(phase, 100.0).with_data(json!({ "source": outcome.source() })),
        )
        .await;

        Ok(outcome)
    }

    /// Run each planned query in turn; failed queries are logged and skipped
    pub async fn perform_web_search(&self, queries: &[String]) -> Vec<SearchResultSet> {
        let phase = PhaseId::Search;
        let total = queries.len();
        let mut attempts: Vec<Result<SearchResultSet, SearchError>> = Vec::with_capacity(total);

        for (index, query) in queries.iter().enumerate() {
            let percent = index as f64 / total as f64 * 100.0;
            self.emit(ResearchEvent::phase_update(phase, percent).with_data(json!({
                "query": query,
                "index": index,
                "total": total,
            })))
            .await;

            let attempt = self
                .search
                .search(query, self.results_per_query)
                .await
                .map(|mut hits| {
                    hits.truncate(MAX_RESULTS_PER_QUERY as usize);
                    SearchResultSet {
                        query: query.clone(),
                        results: hits,
                    }
                });

            if let Err(e) = &attempt {
                tracing::warn!(query = %query, "Search failed for query: {}", e);
            }
            attempts.push(attempt);
        }

        attempts.into_iter().filter_map(Result::ok).collect()
    }

    pub async fn analyze_results(
        &self,
        query: &str,
        results: &[SearchResultSet],
    ) -> Result<String, AgentError> {
        let phase = PhaseId::Analysis;
        self.progress(phase, 25.0).await;

        let prompt = prompts::analysis_prompt(query, results);
        self.progress(phase, 70.0).await;

        let analysis = self.ask(phase, prompt).await?;
        self.progress(phase, 100.0).await;
        Ok(analysis)
    }

    pub async fn synthesize_response(&self, analysis: &str) -> Result<String, AgentError> {
        let phase = PhaseId::Synthesis;
        self.progress(phase, 30.0).await;

        let prompt = prompts::synthesis_prompt(analysis);
        self.progress(phase, 80.0).await;

        let answer = self.ask(phase, prompt).await?;
        self.progress(phase, 100.0).await;
        Ok(answer)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::agent::pipeline::PipelineStage;
    use crate::models::NO_RESPONSE;
    use tokio_test::{assert_err, assert_ok};

    fn agent_with(
        llm: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
    ) -> (ResearchAgent, mpsc::Receiver<ResearchEvent>) {
        let (tx, rx) = mpsc::channel(256);
        (ResearchAgent::new(llm, search).with_event_channel(tx), rx)
    }

    fn updates_for(events: &[ResearchEvent], phase: PhaseId) -> Vec<f64> {
        events
            .iter()
            .filter_map(|e| match e {
                ResearchEvent::PhaseUpdate {
                    phase_id, progress, ..
                } if *phase_id == phase => Some(*progress),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_invalid_plan_json_falls_back() {
        let llm = ScriptedModel::new(vec![Ok("not json at all")]);
        let (agent, mut rx) = agent_with(llm, ScriptedSearch::new(0, vec![]));

        let outcome = assert_ok!(agent.create_research_plan("best AI tools").await);
        assert!(outcome.is_fallback());
        assert_eq!(
            outcome.plan().search_queries,
            vec![
                "best AI tools",
                "best AI tools 2024",
                "best best AI tools",
                "popular best AI tools"
            ]
        );
        assert_eq!(outcome.plan().focus_areas, vec!["best AI tools"]);
        assert_eq!(outcome.plan().expected_outcome, "Information about best AI tools");

        let events = drain(&mut rx);
        assert_eq!(updates_for(&events, PhaseId::Planning), vec![30.0, 80.0, 100.0]);
    }

    #[tokio::test]
    async fn test_no_response_sentinel_is_not_an_error() {
        let llm = ScriptedModel::new(vec![Ok(NO_RESPONSE)]);
        let (agent, _rx) = agent_with(llm, ScriptedSearch::new(0, vec![]));
        let outcome = assert_ok!(agent.create_research_plan("rust").await);
        assert!(outcome.is_fallback());
    }

    #[tokio::test]
    async fn test_failed_query_is_skipped() {
        let search = ScriptedSearch::new(5, vec![1]);
        let (agent, mut rx) = agent_with(ScriptedModel::new(vec![]), search.clone());
        let queries: Vec<String> = vec!["q1".into(), "q2".into(), "q3".into()];

        let results = agent.perform_web_search(&queries).await;

        assert_eq!(search.calls(), 3);
        let answered: Vec<&str> = results.iter().map(|r| r.query.as_str()).collect();
        assert_eq!(answered, vec!["q1", "q3"]);
        assert!(results.iter().all(|r| r.results.len() == 5));

        let progress = updates_for(&drain(&mut rx), PhaseId::Search);
        assert_eq!(progress.len(), 3);
        assert_eq!(progress[0], 0.0);
        assert!((progress[1] - 100.0 / 3.0).abs() < 1e-9);
        assert!((progress[2] - 200.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_results_are_capped_at_five() {
        let (agent, _rx) = agent_with(ScriptedModel::new(vec![]), ScriptedSearch::new(8, vec![]));
        let results = agent.perform_web_search(&["q".to_string()]).await;
        assert_eq!(results[0].results.len(), 5);
    }

    #[tokio::test]
    async fn test_end_to_end_event_order() {
        let llm = ScriptedModel::new(vec![
            Ok(VALID_PLAN),
            Ok("Analysis: ChatGPT, Claude and Gemini lead the field."),
            Ok("ChatGPT, Claude and Gemini are the most widely used AI tools right now."),
        ]);
        let search = ScriptedSearch::new(5, vec![]);
        let (mut agent, mut rx) = agent_with(llm.clone(), search.clone());

        let answer = assert_ok!(agent.perform_research("best AI tools").await);
        assert_eq!(
            answer,
            "ChatGPT, Claude and Gemini are the most widely used AI tools right now."
        );
        assert_eq!(search.calls(), 3);
        assert_eq!(llm.calls(), 3);
        assert_eq!(agent.pipeline.stage, PipelineStage::Complete);

        let events = drain(&mut rx);
        let skeleton: Vec<String> = events
            .iter()
            .filter(|e| !matches!(e, ResearchEvent::PhaseUpdate { .. }))
            .map(|e| match e.phase_id() {
                Some(phase) => format!("{}:{}", e.kind(), phase),
                None => e.kind().to_string(),
            })
            .collect();
        assert_eq!(
            skeleton,
            vec![
                "phase_start:planning",
                "phase_complete:planning",
                "phase_start:search",
                "phase_complete:search",
                "phase_start:analysis",
                "phase_complete:analysis",
                "phase_start:synthesis",
                "phase_complete:synthesis",
                "complete",
            ]
        );
        assert_eq!(events.last(), Some(&ResearchEvent::complete(answer)));
        assert!(!events.iter().any(|e| matches!(e, ResearchEvent::Error { .. })));

        // The analysis prompt carries the serialized search results
        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[1].contains("best AI tools 2024 #0"));
        assert!(prompts[2].contains("Analysis: ChatGPT"));
    }

    #[tokio::test]
    async fn test_phase_updates_follow_checkpoints() {
        let llm = ScriptedModel::new(vec![Ok(VALID_PLAN), Ok("analysis"), Ok("answer")]);
        let (mut agent, mut rx) = agent_with(llm, ScriptedSearch::new(1, vec![]));
        assert_ok!(agent.perform_research("q").await);

        let events = drain(&mut rx);
        assert_eq!(updates_for(&events, PhaseId::Analysis), vec![25.0, 70.0, 100.0]);
        assert_eq!(updates_for(&events, PhaseId::Synthesis), vec![30.0, 80.0, 100.0]);
    }

    #[tokio::test]
    async fn test_model_failure_emits_single_error() {
        let llm = ScriptedModel::new(vec![Ok(VALID_PLAN), Err("HTTP 503")]);
        let (mut agent, mut rx) = agent_with(llm, ScriptedSearch::new(2, vec![]));

        let err = assert_err!(agent.perform_research("q").await);
        assert_eq!(err.phase(), PhaseId::Analysis);
        assert!(agent.pipeline.is_complete());
        assert!(!agent.pipeline.is_success());

        let events = drain(&mut rx);
        let errors: Vec<&ResearchEvent> = events
            .iter()
            .filter(|e| matches!(e, ResearchEvent::Error { .. }))
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(events.last(), Some(&ResearchEvent::error(err.to_string())));
        assert!(err.to_string().contains("HTTP 503"));
        assert!(!events.iter().any(|e| matches!(e, ResearchEvent::Complete { .. })));
        assert!(!events
            .iter()
            .any(|e| e.phase_id() == Some(PhaseId::Synthesis)));
    }

    #[tokio::test]
    async fn test_transport_error_never_exposes_model_key() {
        use crate::models::{GeminiClient, ModelConfig};

        let config = ModelConfig::default().with_base_url("http://127.0.0.1:1");
        let llm = Arc::new(GeminiClient::new(config, "SECRET-GEMINI-KEY-123"));
        let (mut agent, mut rx) = agent_with(llm, ScriptedSearch::new(1, vec![]));

        let err = assert_err!(agent.perform_research("q").await);
        assert!(matches!(err, AgentError::Model { source: LlmError::Transport(_), .. }));

        let events = drain(&mut rx);
        let last = events.last().unwrap();
        assert!(matches!(last, ResearchEvent::Error { .. }));
        assert!(!last.to_json().contains("SECRET-GEMINI-KEY-123"), "{}", last.to_json());
        assert!(!err.to_string().contains("SECRET-GEMINI-KEY-123"));
    }

    #[tokio::test]
    async fn test_all_searches_failing_still_completes() {
        let llm = ScriptedModel::new(vec![Ok(VALID_PLAN), Ok("nothing found"), Ok("answer")]);
        let (mut agent, _rx) = agent_with(llm.clone(), ScriptedSearch::new(5, vec![0, 1, 2]));
        assert_ok!(agent.perform_research("q").await);
        assert!(llm.prompts.lock().unwrap()[1].contains("Search Results:\n[]"));
    }

    #[tokio::test]
    async fn test_runs_without_event_channel() {
        let llm = ScriptedModel::new(vec![Ok("bad plan"), Ok("analysis"), Ok("answer")]);
        let mut agent = ResearchAgent::new(llm, ScriptedSearch::new(1, vec![]));
        assert_eq!(agent.perform_research("q").await.unwrap(), "answer");
    }
}
