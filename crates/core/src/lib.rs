//! # ScynV Core
//!
//! Business logic for the ScynV research assistant: the research pipeline,
//! its event stream, chat routing and the client-side progress tracker.
//!
//! ## Architecture
//!
//! - `agent/` - Research pipeline, events and the streaming bridge
//! - `models` - Language-model provider (Gemini)
//! - `tools/` - Web search provider (Google Custom Search)
//! - `state/` - Client-side task progress state machine
//! - `chat` - Routing between direct replies and research
//! - `config` - Credentials and persisted settings
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scynv_core::agent::{build_agent, spawn_research, DisconnectPolicy};
//!
//! let agent = build_agent(&settings, &credentials)?;
//! let mut handle = spawn_research(agent, "best AI tools", DisconnectPolicy::default());
//! while let Some(event) = handle.events.recv().await {
//!     println!("{}", event.to_json());
//! }
//! ```

pub mod agent;
pub mod chat;
pub mod config;
pub mod models;
pub mod state;
pub mod tools;
