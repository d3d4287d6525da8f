//! # Research Events
//!
//! Discriminated event records produced by the research pipeline and pushed
//! to the client, one per SSE frame.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseId {
    Planning,
    Search,
    Analysis,
    Synthesis,
}

impl PhaseId {
    /// All phases in execution order
    pub const ALL: [PhaseId; 4] = [
        PhaseId::Planning,
        PhaseId::Search,
        PhaseId::Analysis,
        PhaseId::Synthesis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseId::Planning => "planning",
            PhaseId::Search => "search",
            PhaseId::Analysis => "analysis",
            PhaseId::Synthesis => "synthesis",
        }
    }

    /// Description sent with `phase_start`
    pub fn start_description(&self) -> &'static str {
        match self {
            PhaseId::Planning => "Analyzing query and creating research plan",
            PhaseId::Search => "Searching the web for relevant information",
            PhaseId::Analysis => "Analyzing and synthesizing information",
            PhaseId::Synthesis => "Creating final comprehensive response",
        }
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event in a research run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResearchEvent {
    PhaseStart {
        #[serde(rename = "phaseId")]
        phase_id: PhaseId,
        description: String,
    },
    PhaseUpdate {
        #[serde(rename = "phaseId")]
        phase_id: PhaseId,
        progress: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    PhaseComplete {
        #[serde(rename = "phaseId")]
        phase_id: PhaseId,
        result: serde_json::Value,
    },
    Error {
        error: String,
    },
    Complete {
        result: String,
    },
}

impl ResearchEvent {
    pub fn phase_start(phase_id: PhaseId) -> Self {
        Self::PhaseStart {
            phase_id,
            description: phase_id.start_description().to_string(),
        }
    }

    pub fn phase_update(phase_id: PhaseId, progress: f64) -> Self {
        Self::PhaseUpdate {
            phase_id,
            progress,
            data: None,
        }
    }

    /// Attach a payload to a `phase_update`; other kinds are returned unchanged
    pub fn with_data(mut self, payload: serde_json::Value) -> Self {
        if let Self::PhaseUpdate { data, .. } = &mut self {
            *data = Some(payload);
        }
        self
    }

    pub fn phase_complete(phase_id: PhaseId, result: serde_json::Value) -> Self {
        Self::PhaseComplete { phase_id, result }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn complete(result: impl Into<String>) -> Self {
        Self::Complete {
            result: result.into(),
        }
    }

    /// `complete` and `error` end the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    pub fn phase_id(&self) -> Option<PhaseId> {
        match self {
            Self::PhaseStart { phase_id, .. }
            | Self::PhaseUpdate { phase_id, .. }
            | Self::PhaseComplete { phase_id, .. } => Some(*phase_id),
            _ => None,
        }
    }

    /// Value of the `type` discriminator
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PhaseStart { .. } => "phase_start",
            Self::PhaseUpdate { .. } => "phase_update",
            Self::PhaseComplete { .. } => "phase_complete",
            Self::Error { .. } => "error",
            Self::Complete { .. } => "complete",
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Server-Sent Events framing: `data: <json>\n\n`
    pub fn to_sse_frame(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phase_start_wire_shape() {
        let event = ResearchEvent::phase_start(PhaseId::Planning);
        let value: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "phase_start",
                "phaseId": "planning",
                "description": "Analyzing query and creating research plan"
            })
        );
    }

    #[test]
    fn test_phase_update_omits_missing_data() {
        let json = ResearchEvent::phase_update(PhaseId::Search, 50.0).to_json();
        assert!(json.contains("\"type\":\"phase_update\""));
        assert!(json.contains("\"phaseId\":\"search\""));
        assert!(!json.contains("data"));
    }

    #[test]
    fn test_with_data_only_touches_updates() {
        let event = ResearchEvent::complete("done").with_data(json!({"x": 1}));
        assert_eq!(event, ResearchEvent::complete("done"));

        let event = ResearchEvent::phase_update(PhaseId::Search, 0.0).with_data(json!({"index": 0}));
        assert!(event.to_json().contains("\"data\":{\"index\":0}"));
    }

    #[test]
    fn test_terminal_events() {
        assert!(ResearchEvent::complete("x").is_terminal());
        assert!(ResearchEvent::error("boom").is_terminal());
        assert!(!ResearchEvent::phase_start(PhaseId::Search).is_terminal());
    }

    #[test]
    fn test_sse_frame() {
        let frame = ResearchEvent::error("boom").to_sse_frame();
        assert_eq!(frame, "data: {\"type\":\"error\",\"error\":\"boom\"}\n\n");
    }

    #[test]
    fn test_decode_client_payload() {
        let event = ResearchEvent::from_json(
            r#"{"type":"phase_complete","phaseId":"analysis","result":"text"}"#,
        )
        .unwrap();
        assert_eq!(event.phase_id(), Some(PhaseId::Analysis));
        assert_eq!(event.kind(), "phase_complete");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(ResearchEvent::from_json(r#"{"type":"heartbeat"}"#).is_err());
    }
}
