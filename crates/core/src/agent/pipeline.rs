//! # Pipeline Stages
//!
//! Defines the stages of the research pipeline and the phase catalogue the
//! client uses to seed its progress tracker.

use super::events::PhaseId;
use crate::state::PhaseSpec;
use serde::{Deserialize, Serialize};

/// Stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Building the research plan
    Planning,
    /// Running planned web searches
    Searching,
    /// Extracting findings from search results
    Analyzing,
    /// Writing the final answer
    Synthesizing,
    /// Complete
    Complete,
    /// Failed
    Failed,
}

impl PipelineStage {
    /// Phase that runs during this stage
    pub fn phase(&self) -> Option<PhaseId> {
        match self {
            PipelineStage::Planning => Some(PhaseId::Planning),
            PipelineStage::Searching => Some(PhaseId::Search),
            PipelineStage::Analyzing => Some(PhaseId::Analysis),
            PipelineStage::Synthesizing => Some(PhaseId::Synthesis),
            PipelineStage::Complete | PipelineStage::Failed => None,
        }
    }
}

/// The pipeline state machine
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Current stage
    pub stage: PipelineStage,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            stage: PipelineStage::Planning,
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next stage
    pub fn advance(&mut self) {
        self.stage = match self.stage {
            PipelineStage::Planning => PipelineStage::Searching,
            PipelineStage::Searching => PipelineStage::Analyzing,
            PipelineStage::Analyzing => PipelineStage::Synthesizing,
            PipelineStage::Synthesizing => PipelineStage::Complete,
            PipelineStage::Complete => PipelineStage::Complete,
            PipelineStage::Failed => PipelineStage::Failed,
        };
    }

    /// Fail the pipeline
    pub fn fail(&mut self) {
        if self.stage != PipelineStage::Complete {
            self.stage = PipelineStage::Failed;
        }
    }

    pub fn current_phase(&self) -> Option<PhaseId> {
        self.stage.phase()
    }

    /// Check if pipeline is complete
    pub fn is_complete(&self) -> bool {
        matches!(self.stage, PipelineStage::Complete | PipelineStage::Failed)
    }

    /// Check if pipeline succeeded
    pub fn is_success(&self) -> bool {
        self.stage == PipelineStage::Complete
    }
}

/// Display name shown by progress views
pub fn phase_name(phase: PhaseId) -> &'static str {
    match phase {
        PhaseId::Planning => "Planning",
        PhaseId::Search => "Web Search",
        PhaseId::Analysis => "Analysis",
        PhaseId::Synthesis => "Synthesis",
    }
}

/// Expected wall-clock duration in seconds
pub fn estimated_duration(phase: PhaseId) -> u64 {
    match phase {
        PhaseId::Planning => 5,
        PhaseId::Search => 8,
        PhaseId::Analysis => 6,
        PhaseId::Synthesis => 4,
    }
}

/// Short description shown by progress views
pub fn phase_summary(phase: PhaseId) -> &'static str {
    match phase {
        PhaseId::Planning => "Creating research strategy",
        PhaseId::Search => "Searching for information",
        PhaseId::Analysis => "Analyzing findings",
        PhaseId::Synthesis => "Creating final response",
    }
}

/// Phase list a client passes to `start_task` for a research run
pub fn research_phases() -> Vec<PhaseSpec> {
    PhaseId::ALL
        .iter()
        .map(|&phase| {
            PhaseSpec::new(
                phase.as_str(),
                phase_name(phase),
                phase_summary(phase),
                estimated_duration(phase),
            )
        })
        .collect()
}
