//! # Terminal Client
//!
//! `scynv ask` stands in for the chat UI: it posts a message, follows the
//! research stream when the server hands off to the agent, and renders a
//! live progress line from the client-side task tracker.

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::Mutex;

use scynv_core::agent::{research_phases, SseDecoder};
use scynv_core::state::{format_clock, spawn_ticker, TaskProgress, TaskProgressTracker, TaskSignal};

use crate::api::chat::ChatResponse;
use crate::api::ErrorBody;

/// Reported when the stream closes before a terminal event
pub const CONNECTION_LOST: &str = "Connection to the research stream was lost";

const BAR_WIDTH: usize = 20;

pub struct ScynvClient {
    http: reqwest::Client,
    base_url: String,
}

impl ScynvClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn chat(&self, message: &str, chat_id: &str) -> Result<ChatResponse> {
        let response = self
            .http
            .post(format!("{}/api/v1/chat", self.base_url))
            .json(&json!({ "message": message, "chatId": chat_id }))
            .send()
            .await
            .with_context(|| format!("Failed to reach ScynV server at {}", self.base_url))?;

        if !response.status().is_success() {
            bail!("{}", error_message(response).await);
        }
        Ok(response.json().await?)
    }

    /// Follow the research stream, feeding every event to the shared tracker
    pub async fn research<F>(
        &self,
        message: &str,
        chat_id: &str,
        tracker: Arc<Mutex<TaskProgressTracker>>,
        on_progress: F,
    ) -> Result<TaskSignal>
    where
        F: FnMut(&TaskProgress),
    {
        let stream = self.open_research(message, chat_id, &tracker).await?;
        Ok(stream.follow(tracker, on_progress).await)
    }

    /// Connect to the research stream and start the task once the server accepts it
    pub async fn open_research(
        &self,
        message: &str,
        chat_id: &str,
        tracker: &Mutex<TaskProgressTracker>,
    ) -> Result<ResearchStream> {
        let response = self
            .http
            .get(format!("{}/api/v1/research", self.base_url))
            .query(&[("message", message), ("chatId", chat_id)])
            .send()
            .await
            .with_context(|| format!("Failed to reach ScynV server at {}", self.base_url))?;

        if !response.status().is_success() {
            bail!("{}", error_message(response).await);
        }

        tracker
            .lock()
            .await
            .start_task(uuid::Uuid::new_v4().to_string(), research_phases());
        Ok(ResearchStream { response })
    }
}

/// An accepted research stream whose task is already started
pub struct ResearchStream {
    response: reqwest::Response,
}

impl ResearchStream {
    pub async fn follow<F>(
        self,
        tracker: Arc<Mutex<TaskProgressTracker>>,
        mut on_progress: F,
    ) -> TaskSignal
    where
        F: FnMut(&TaskProgress),
    {
        let mut decoder = SseDecoder::new();
        let mut body = Box::pin(self.response.bytes_stream());

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!("Research stream failed: {}", e);
                    break;
                }
            };

            for event in decoder.feed_events(&chunk) {
                let mut tracker = tracker.lock().await;
                let signal = tracker.apply(&event);
                if let Some(task) = tracker.task() {
                    on_progress(task);
                }
                if signal.is_terminal() {
                    return signal;
                }
            }
        }

        tracker.lock().await.error_task(CONNECTION_LOST);
        TaskSignal::Failed(CONNECTION_LOST.to_string())
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => format!("Server returned {}", status),
    }
}

/// One-line progress summary, e.g. `[#####...............]  25% Web Search  0:04 / ~0:18`
pub fn render_progress(task: &TaskProgress) -> String {
    let percent = task.overall_progress.clamp(0.0, 100.0);
    let filled = ((percent / 100.0) * BAR_WIDTH as f64).round() as usize;
    let bar = format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled));

    let phase = task
        .phase(&task.current_phase)
        .map(|p| p.name.as_str())
        .unwrap_or("");

    format!(
        "[{}] {:>3.0}% {:<10} {} / ~{}",
        bar,
        percent,
        phase,
        format_clock(task.elapsed_time),
        format_clock(task.estimated_time_remaining)
    )
}

fn draw(task: &TaskProgress) {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "\r{}", render_progress(task));
    let _ = stderr.flush();
}

/// `scynv ask`: chat, then follow research if the server chose it
pub async fn ask(base_url: &str, message: &str, chat_id: Option<String>) -> Result<()> {
    let client = ScynvClient::new(base_url);
    let chat_id = chat_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let reply = client.chat(message, &chat_id).await?;
    println!("{}", reply.reply);
    if reply.use_agent != Some(true) {
        return Ok(());
    }

    let research_message = reply.message.as_deref().unwrap_or(message);
    let tracker = Arc::new(Mutex::new(TaskProgressTracker::new()));
    let stream = client
        .open_research(research_message, &chat_id, &tracker)
        .await?;

    // The ticker exits on an inactive tracker, so it starts after the task
    let ticker = spawn_ticker(tracker.clone(), draw);
    let signal = stream.follow(tracker.clone(), draw).await;
    ticker.abort();
    eprintln!();

    match signal.chat_text() {
        Some(text) => println!("\n{}", text),
        None => println!("\nResearch ended without a result"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{spawn_app, FakeProviders};
    use scynv_core::config::Credentials;
    use scynv_core::state::PhaseStatus;

    #[test]
    fn test_render_progress() {
        let mut tracker = TaskProgressTracker::new();
        tracker.start_task("t", research_phases());
        tracker.complete_phase("planning", None);

        let line = render_progress(tracker.task().unwrap());
        assert!(line.starts_with("[#####...............]  25% Web Search"));
        assert!(line.ends_with("0:00 / ~0:18"));
    }

    #[tokio::test]
    async fn test_ask_flow_against_server() {
        let providers = FakeProviders::spawn().await;
        let base = spawn_app(
            Credentials::new(vec!["model-key".into()], Some("search-key".into())),
            &providers,
        )
        .await;
        let client = ScynvClient::new(&base);

        let reply = client.chat("find the best AI tools", "chat-1").await.unwrap();
        assert_eq!(reply.use_agent, Some(true));
        assert_eq!(reply.chat_id.as_deref(), Some("chat-1"));

        let tracker = Arc::new(Mutex::new(TaskProgressTracker::new()));
        let mut updates = 0;
        let signal = client
            .research("find the best AI tools", "chat-1", tracker.clone(), |_| updates += 1)
            .await
            .unwrap();

        assert_eq!(signal, TaskSignal::Completed(FakeProviders::ANSWER.to_string()));
        assert!(updates > 8);

        let tracker = tracker.lock().await;
        let task = tracker.task().unwrap();
        assert_eq!(task.overall_progress, 100.0);
        assert!(!task.is_active);
        assert!(task
            .phases
            .iter()
            .all(|p| p.status == PhaseStatus::Completed));
    }

    #[tokio::test]
    async fn test_ticker_runs_while_stream_is_open() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let providers = FakeProviders::spawn().await;
        let base = spawn_app(
            Credentials::new(vec!["model-key".into()], Some("search-key".into())),
            &providers,
        )
        .await;
        let client = ScynvClient::new(&base);

        let tracker = Arc::new(Mutex::new(TaskProgressTracker::new()));
        let stream = client
            .open_research("best AI tools", "chat-1", &tracker)
            .await
            .unwrap();
        assert!(tracker.lock().await.task().unwrap().is_active);

        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let ticker = spawn_ticker(tracker.clone(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(std::time::Duration::from_millis(2300)).await;
        assert!(!ticker.is_finished());
        assert!(ticks.load(Ordering::SeqCst) >= 1);
        assert!(tracker.lock().await.task().unwrap().elapsed_time >= 1);

        let signal = stream.follow(tracker.clone(), |_| {}).await;
        assert_eq!(signal, TaskSignal::Completed(FakeProviders::ANSWER.to_string()));
        tokio::time::timeout(std::time::Duration::from_secs(3), ticker)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_keys_surface_as_error() {
        let providers = FakeProviders::spawn().await;
        let base = spawn_app(Credentials::new(vec![], None), &providers).await;
        let client = ScynvClient::new(&base);

        let err = client.chat("hello", "c").await.unwrap_err();
        assert_eq!(err.to_string(), "Missing API keys");

        let tracker = Arc::new(Mutex::new(TaskProgressTracker::new()));
        let err = client
            .research("best tools", "c", tracker.clone(), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing API keys");
        assert!(tracker.lock().await.task().is_none());
    }

    #[tokio::test]
    async fn test_failed_research_reports_message() {
        let providers = FakeProviders::spawn_failing_model().await;
        let base = spawn_app(
            Credentials::new(vec!["k".into()], Some("s".into())),
            &providers,
        )
        .await;
        let client = ScynvClient::new(&base);

        let tracker = Arc::new(Mutex::new(TaskProgressTracker::new()));
        let signal = client
            .research("best tools", "c", tracker.clone(), |_| {})
            .await
            .unwrap();

        let text = signal.chat_text().unwrap();
        assert!(text.starts_with("Research failed: planning failed"), "{}", text);
        assert!(tracker.lock().await.task().unwrap().error.is_some());
    }
}
