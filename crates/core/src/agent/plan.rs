//! # Research Plan
//!
//! The planning phase asks the model for a JSON plan. Models often wrap JSON
//! in a Markdown fence or drift from the requested shape, so parsing yields a
//! tagged [`PlanOutcome`]: either the validated plan or the deterministic
//! fallback.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Upper bound on planned search queries
pub const MAX_SEARCH_QUERIES: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResearchPlan {
    /// Ordered search queries; never empty
    pub search_queries: Vec<String>,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    #[serde(default)]
    pub expected_outcome: String,
}

impl ResearchPlan {
    /// Deterministic plan used when the model output cannot be parsed
    pub fn fallback(query: &str) -> Self {
        Self {
            search_queries: vec![
                query.to_string(),
                format!("{} 2024", query),
                format!("best {}", query),
                format!("popular {}", query),
            ],
            focus_areas: vec![query.to_string()],
            expected_outcome: format!("Information about {}", query),
        }
    }
}

/// Where a plan came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// The model produced a valid plan
    Parsed(ResearchPlan),
    /// The model output was unusable; the fallback plan was substituted
    Fallback(ResearchPlan),
}

impl PlanOutcome {
    pub fn plan(&self) -> &ResearchPlan {
        match self {
            PlanOutcome::Parsed(plan) | PlanOutcome::Fallback(plan) => plan,
        }
    }

    pub fn into_plan(self) -> ResearchPlan {
        match self {
            PlanOutcome::Parsed(plan) | PlanOutcome::Fallback(plan) => plan,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PlanOutcome::Fallback(_))
    }

    pub fn source(&self) -> &'static str {
        match self {
            PlanOutcome::Parsed(_) => "model",
            PlanOutcome::Fallback(_) => "fallback",
        }
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("fence regex is valid")
    })
}

/// Strip a surrounding Markdown code fence, if present
fn unfence(raw: &str) -> &str {
    fence_regex()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw)
        .trim()
}

/// Parse and validate a model-produced plan
pub fn parse_plan(raw: &str) -> Option<ResearchPlan> {
    let mut plan: ResearchPlan = serde_json::from_str(unfence(raw)).ok()?;

    plan.search_queries = plan
        .search_queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(MAX_SEARCH_QUERIES)
        .collect();

    if plan.search_queries.is_empty() {
        return None;
    }
    Some(plan)
}

/// Parse the model output or substitute the fallback plan. Never fails.
pub fn plan_from_response(query: &str, raw: &str) -> PlanOutcome {
    match parse_plan(raw) {
        Some(plan) => PlanOutcome::Parsed(plan),
        None => PlanOutcome::Fallback(ResearchPlan::fallback(query)),
    }
}
