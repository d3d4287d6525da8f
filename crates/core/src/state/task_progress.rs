//! # Task Progress
//!
//! Client-side state machine for one research task. It consumes the
//! research event stream and derives per-phase status, overall progress and
//! elapsed/remaining time for display.
//!
//! The tracker owns at most one [`TaskProgress`]. All mutation goes through
//! the named operations; once a task is terminal (completed or failed) every
//! mutation except [`TaskProgressTracker::clear_task`] is ignored.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::agent::events::ResearchEvent;

/// Time source, injectable for tests
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Status of a single phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Pending,
    Active,
    Completed,
    Error,
}

impl PhaseStatus {
    /// Transitions only move forward
    pub fn can_become(self, next: PhaseStatus) -> bool {
        use PhaseStatus::*;
        matches!(
            (self, next),
            (Pending, Active) | (Pending, Completed) | (Active, Completed) | (Pending, Error) | (Active, Error)
        )
    }
}

/// Static description of a phase, as passed to `start_task`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSpec {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Expected duration in seconds
    pub estimated_duration: u64,
}

impl PhaseSpec {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        estimated_duration: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            estimated_duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPhase {
    pub id: String,
    pub name: String,
    pub description: String,
    pub estimated_duration: u64,
    pub status: PhaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Display figure in 0..=100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
}

impl TaskPhase {
    fn from_spec(spec: PhaseSpec) -> Self {
        Self {
            id: spec.id,
            name: spec.name,
            description: spec.description,
            estimated_duration: spec.estimated_duration,
            status: PhaseStatus::Pending,
            start_time: None,
            end_time: None,
            quality_score: None,
        }
    }

    fn activate(&mut self, now: DateTime<Utc>) {
        self.status = PhaseStatus::Active;
        self.start_time.get_or_insert(now);
    }

    fn finish(&mut self, now: DateTime<Utc>) {
        self.status = PhaseStatus::Completed;
        self.end_time.get_or_insert(now);
    }
}

/// Partial phase update; absent fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseUpdate {
    pub status: Option<PhaseStatus>,
    pub description: Option<String>,
    pub quality_score: Option<f64>,
}

impl PhaseUpdate {
    pub fn quality(score: f64) -> Self {
        Self {
            quality_score: Some(score),
            ..Self::default()
        }
    }

    pub fn status(status: PhaseStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Aggregate state of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    pub task_id: String,
    /// 0..=100, never decreases while active
    pub overall_progress: f64,
    /// Active phase, or the last known one once finished
    pub current_phase: String,
    pub phases: Vec<TaskPhase>,
    /// Seconds; fixed at start
    pub total_estimated_time: u64,
    pub elapsed_time: u64,
    pub estimated_time_remaining: u64,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskProgress {
    pub fn phase(&self, phase_id: &str) -> Option<&TaskPhase> {
        self.phases.iter().find(|p| p.id == phase_id)
    }

    pub fn active_phase(&self) -> Option<&TaskPhase> {
        self.phases.iter().find(|p| p.status == PhaseStatus::Active)
    }

    fn completed_count(&self) -> usize {
        self.phases
            .iter()
            .filter(|p| p.status == PhaseStatus::Completed)
            .count()
    }

    fn completed_fraction(&self) -> f64 {
        if self.phases.is_empty() {
            return 0.0;
        }
        self.completed_count() as f64 / self.phases.len() as f64 * 100.0
    }

    fn raise_progress(&mut self, candidate: f64) {
        self.overall_progress = candidate.min(100.0).max(self.overall_progress);
    }

    fn refresh_current_phase(&mut self) {
        if let Some(active) = self.active_phase() {
            self.current_phase = active.id.clone();
        }
    }

    fn refresh_timing(&mut self, now: DateTime<Utc>) {
        self.elapsed_time = self
            .phases
            .first()
            .and_then(|p| p.start_time)
            .map(|start| (now - start).num_seconds().max(0) as u64)
            .unwrap_or(0);

        let completed: u64 = self
            .phases
            .iter()
            .filter(|p| p.status == PhaseStatus::Completed)
            .map(|p| p.estimated_duration)
            .sum();
        self.estimated_time_remaining = self.total_estimated_time.saturating_sub(completed);
    }
}

/// Outcome of applying one event
#[derive(Debug, Clone, PartialEq)]
pub enum TaskSignal {
    /// Task still running, or the event was ignored
    Continue,
    /// Final answer text
    Completed(String),
    /// Error message from the server
    Failed(String),
}

impl TaskSignal {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskSignal::Continue)
    }

    /// Text appended to the chat transcript for a terminal signal
    pub fn chat_text(&self) -> Option<String> {
        match self {
            TaskSignal::Continue => None,
            TaskSignal::Completed(text) => Some(text.clone()),
            TaskSignal::Failed(msg) => Some(format!("Research failed: {}", msg)),
        }
    }
}

/// Owner of the single in-flight task
pub struct TaskProgressTracker {
    task: Option<TaskProgress>,
    clock: Clock,
}

impl Default for TaskProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskProgressTracker")
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

impl TaskProgressTracker {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self { task: None, clock }
    }

    pub fn task(&self) -> Option<&TaskProgress> {
        self.task.as_ref()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// The task, only while it accepts mutations
    fn active_task(&mut self) -> Option<&mut TaskProgress> {
        self.task.as_mut().filter(|t| t.is_active)
    }

    /// Start a new task, replacing any previous one
    pub fn start_task(&mut self, task_id: impl Into<String>, phases: Vec<PhaseSpec>) {
        let now = self.now();
        let mut phases: Vec<TaskPhase> = phases.into_iter().map(TaskPhase::from_spec).collect();
        if let Some(first) = phases.first_mut() {
            first.activate(now);
        }
        let total: u64 = phases.iter().map(|p| p.estimated_duration).sum();

        self.task = Some(TaskProgress {
            task_id: task_id.into(),
            overall_progress: 0.0,
            current_phase: phases.first().map(|p| p.id.clone()).unwrap_or_default(),
            phases,
            total_estimated_time: total,
            elapsed_time: 0,
            estimated_time_remaining: total,
            is_active: true,
            error: None,
        });
    }

    pub fn update_phase(&mut self, phase_id: &str, update: PhaseUpdate) {
        let now = self.now();
        let Some(task) = self.active_task() else {
            return;
        };
        let Some(index) = task.phases.iter().position(|p| p.id == phase_id) else {
            tracing::debug!(phase = %phase_id, "Ignoring update for unknown phase");
            return;
        };
        let other_active = task
            .phases
            .iter()
            .enumerate()
            .any(|(i, p)| i != index && p.status == PhaseStatus::Active);

        let phase = &mut task.phases[index];
        if let Some(status) = update.status {
            let allowed = phase.status.can_become(status)
                && !(status == PhaseStatus::Active && other_active);
            if allowed {
                match status {
                    PhaseStatus::Active => phase.activate(now),
                    PhaseStatus::Completed => phase.finish(now),
                    _ => phase.status = status,
                }
            }
        }
        if let Some(description) = update.description {
            phase.description = description;
        }
        if let Some(score) = update.quality_score {
            phase.quality_score = Some(score);
        }

        let n = task.phases.len() as f64;
        let candidate = match update.quality_score {
            Some(score) if task.phases[index].status == PhaseStatus::Active => {
                index as f64 / n * 100.0 + (score / 100.0) * (1.0 / n) * 100.0
            }
            _ => task.completed_fraction(),
        };
        task.raise_progress(candidate);
        task.refresh_current_phase();
        task.refresh_timing(now);
    }

    /// Complete a phase and activate the one after it
    pub fn complete_phase(&mut self, phase_id: &str, quality_score: Option<f64>) {
        let now = self.now();
        let Some(task) = self.active_task() else {
            return;
        };
        let Some(index) = task.phases.iter().position(|p| p.id == phase_id) else {
            tracing::debug!(phase = %phase_id, "Ignoring completion for unknown phase");
            return;
        };
        if !task.phases[index].status.can_become(PhaseStatus::Completed) {
            return;
        }

        // A dropped phase_complete must not leave an earlier phase running
        for earlier in task.phases[..index].iter_mut() {
            if earlier.status.can_become(PhaseStatus::Completed) {
                earlier.finish(now);
            }
        }

        let phase = &mut task.phases[index];
        phase.finish(now);
        if quality_score.is_some() {
            phase.quality_score = quality_score;
        }

        if let Some(next) = task.phases.get_mut(index + 1) {
            if next.status == PhaseStatus::Pending {
                next.activate(now);
            }
        }

        task.current_phase = phase_id.to_string();
        task.refresh_current_phase();
        let candidate = task.completed_fraction();
        task.raise_progress(candidate);
        task.refresh_timing(now);
    }

    pub fn complete_task(&mut self) {
        if let Some(task) = self.active_task() {
            task.overall_progress = 100.0;
            task.is_active = false;
            task.estimated_time_remaining = 0;
        }
    }

    /// Phase statuses are left as they are; a present `error` is terminal
    pub fn error_task(&mut self, message: impl Into<String>) {
        if let Some(task) = self.active_task() {
            task.is_active = false;
            task.error = Some(message.into());
        }
    }

    pub fn clear_task(&mut self) {
        self.task = None;
    }

    /// Refresh elapsed/remaining time; returns whether the task is still active
    pub fn tick(&mut self) -> bool {
        let now = self.now();
        match self.active_task() {
            Some(task) => {
                task.refresh_timing(now);
                true
            }
            None => false,
        }
    }

    /// Apply one research event
    pub fn apply(&mut self, event: &ResearchEvent) -> TaskSignal {
        if self.active_task().is_none() {
            return TaskSignal::Continue;
        }

        match event {
            ResearchEvent::PhaseStart { phase_id, .. } => {
                self.recover_missed_completion(phase_id.as_str());
                TaskSignal::Continue
            }
            ResearchEvent::PhaseUpdate {
                phase_id, progress, ..
            } => {
                self.update_phase(phase_id.as_str(), PhaseUpdate::quality(*progress));
                TaskSignal::Continue
            }
            ResearchEvent::PhaseComplete { phase_id, .. } => {
                let score = rand::thread_rng().gen_range(90u8..=100) as f64;
                self.complete_phase(phase_id.as_str(), Some(score));
                TaskSignal::Continue
            }
            ResearchEvent::Complete { result } => {
                self.complete_task();
                TaskSignal::Completed(result.clone())
            }
            ResearchEvent::Error { error } => {
                self.error_task(error.clone());
                TaskSignal::Failed(error.clone())
            }
        }
    }

    /// A phase starting while still pending means its predecessor's
    /// completion was lost in transit
    fn recover_missed_completion(&mut self, phase_id: &str) {
        let predecessor = self.task.as_ref().and_then(|task| {
            let index = task.phases.iter().position(|p| p.id == phase_id)?;
            if index == 0 || task.phases[index].status != PhaseStatus::Pending {
                return None;
            }
            Some(task.phases[index - 1].id.clone())
        });

        if let Some(previous) = predecessor {
            tracing::debug!(phase = %phase_id, "Completing {} after missed event", previous);
            self.complete_phase(&previous, None);
        }
    }
}

/// Tick the shared tracker once per second until its task is no longer active
pub fn spawn_ticker<F>(shared: Arc<Mutex<TaskProgressTracker>>, mut on_tick: F) -> JoinHandle<()>
where
    F: FnMut(&TaskProgress) + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let mut tracker = shared.lock().await;
            if !tracker.tick() {
                break;
            }
            if let Some(task) = tracker.task() {
                on_tick(task);
            }
        }
    })
}

/// Render seconds as `m:ss`
pub fn format_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
