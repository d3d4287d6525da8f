//! # Research Bridge
//!
//! Runs a research pipeline on its own task and relays its events to a single
//! consumer (an SSE response, the CLI).
//!
//! ```text
//! Pipeline task                 Forwarder task                Consumer
//!     │                              │                           │
//!     ├── ResearchEvent ───────────▶ ├── ResearchEvent ────────▶ │
//!     ├── ResearchEvent ───────────▶ ├── ResearchEvent ────────▶ │
//!     ├── complete / error ────────▶ ├── complete / error ─────▶ │
//!     │                              └── (drops sender) ───────▶ closed
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

use super::events::ResearchEvent;
use super::researcher::{AgentError, ResearchAgent};

/// Buffered events between the pipeline and the forwarder
const EVENT_BUFFER: usize = 64;

/// Error relayed when the pipeline stops without a terminal event
pub const INTERRUPTED: &str = "Research ended unexpectedly";

/// What happens to a running pipeline once its consumer goes away
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectPolicy {
    /// Keep draining events so the pipeline finishes undisturbed
    #[default]
    RunToCompletion,
    /// Abort the pipeline task, even mid provider call
    CancelPipeline,
}

impl DisconnectPolicy {
    pub fn from_cancel_flag(cancel_on_disconnect: bool) -> Self {
        if cancel_on_disconnect {
            DisconnectPolicy::CancelPipeline
        } else {
            DisconnectPolicy::RunToCompletion
        }
    }
}

/// Handle for a spawned research run
pub struct ResearchHandle {
    /// Event stream; closes after the terminal event
    pub events: mpsc::Receiver<ResearchEvent>,
    /// Handle to the pipeline task
    pub pipeline: JoinHandle<Result<String, AgentError>>,
}

/// Spawn a research run and return its event stream
pub fn spawn_research(
    agent: ResearchAgent,
    query: impl Into<String>,
    policy: DisconnectPolicy,
) -> ResearchHandle {
    let query = query.into();
    let (inner_tx, inner_rx) = mpsc::channel::<ResearchEvent>(EVENT_BUFFER);
    let (outer_tx, outer_rx) = mpsc::channel::<ResearchEvent>(EVENT_BUFFER);

    let mut agent = agent.with_event_channel(inner_tx);
    let pipeline = tokio::spawn(async move { agent.perform_research(&query).await });

    tokio::spawn(forward_events(
        inner_rx,
        outer_tx,
        policy,
        pipeline.abort_handle(),
    ));

    ResearchHandle {
        events: outer_rx,
        pipeline,
    }
}

/// Relay events until the first terminal one, applying `policy` on disconnect
pub(crate) async fn forward_events(
    mut inner: mpsc::Receiver<ResearchEvent>,
    outer: mpsc::Sender<ResearchEvent>,
    policy: DisconnectPolicy,
    pipeline: AbortHandle,
) {
    let cancel = policy == DisconnectPolicy::CancelPipeline;

    loop {
        let next = tokio::select! {
            biased;
            event = inner.recv() => event,
            _ = outer.closed(), if cancel => {
                tracing::info!("Consumer disconnected, cancelling research");
                pipeline.abort();
                return;
            }
        };

        let Some(event) = next else {
            tracing::warn!("Research pipeline stopped without a terminal event");
            let _ = outer.send(ResearchEvent::error(INTERRUPTED)).await;
            return;
        };

        let terminal = event.is_terminal();
        if outer.send(event).await.is_err() {
            if cancel {
                tracing::info!("Consumer disconnected, cancelling research");
                pipeline.abort();
            } else {
                tracing::debug!("Consumer disconnected, draining remaining events");
                while inner.recv().await.is_some() {}
            }
            return;
        }

        if terminal {
            return;
        }
    }
}
