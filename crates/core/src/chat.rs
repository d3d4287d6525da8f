//! # Chat Routing
//!
//! Decides whether a chat message starts a research run or gets a direct
//! model reply.

use serde::{Deserialize, Serialize};

use crate::agent::prompts;
use crate::models::{GenerateRequest, LanguageModel, NO_RESPONSE};

/// Words that make a message a research request
pub const RESEARCH_TRIGGERS: [&str; 12] = [
    "research",
    "find",
    "list",
    "search",
    "popular",
    "best",
    "top",
    "compare",
    "analyze",
    "investigate",
    "explore",
    "discover",
];

pub const RESEARCH_STARTED: &str = "Starting autonomous research...";
pub const MODEL_UNREACHABLE: &str = "(error) model unreachable";
pub const NO_REPLY: &str = "(no reply)";

const DIRECT_TEMPERATURE: f32 = 0.7;
const DIRECT_MAX_TOKENS: u32 = 512;

/// Substring match, so "topic" triggers on "top"
pub fn should_use_agent(message: &str) -> bool {
    let lower = message.to_lowercase();
    RESEARCH_TRIGGERS.iter().any(|t| lower.contains(t))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatReply {
    /// The client should open the research stream for `message`
    #[serde(rename_all = "camelCase")]
    Research {
        reply: String,
        use_agent: bool,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        chat_id: Option<String>,
    },
    Direct {
        reply: String,
    },
}

impl ChatReply {
    pub fn research(message: impl Into<String>, chat_id: Option<String>) -> Self {
        ChatReply::Research {
            reply: RESEARCH_STARTED.to_string(),
            use_agent: true,
            message: message.into(),
            chat_id,
        }
    }

    pub fn direct(reply: impl Into<String>) -> Self {
        ChatReply::Direct {
            reply: reply.into(),
        }
    }

    pub fn reply(&self) -> &str {
        match self {
            ChatReply::Research { reply, .. } | ChatReply::Direct { reply } => reply,
        }
    }

    pub fn uses_agent(&self) -> bool {
        matches!(self, ChatReply::Research { .. })
    }
}

/// Route one chat message. Research is only chosen when search is available;
/// otherwise the model answers directly and model failures become a canned reply.
pub async fn respond(
    message: &str,
    chat_id: Option<String>,
    search_available: bool,
    llm: &dyn LanguageModel,
) -> ChatReply {
    if should_use_agent(message) && search_available {
        return ChatReply::research(message, chat_id);
    }

    let request = GenerateRequest::new(prompts::assistant_prompt(message))
        .with_temperature(DIRECT_TEMPERATURE)
        .with_max_output_tokens(DIRECT_MAX_TOKENS);

    match llm.generate(request).await {
        Ok(text) if text == NO_RESPONSE || text.trim().is_empty() => ChatReply::direct(NO_REPLY),
        Ok(text) => ChatReply::direct(text),
        Err(e) => {
            tracing::warn!("Direct reply failed: {}", e);
            ChatReply::direct(MODEL_UNREACHABLE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::researcher::testing::ScriptedModel;

    #[test]
    fn test_trigger_words() {
        assert!(should_use_agent("Find me the BEST laptops"));
        assert!(should_use_agent("compare rust and go"));
        assert!(should_use_agent("what's on top?"));
        assert!(!should_use_agent("hello there"));
        assert!(!should_use_agent("how are you today?"));
    }

    #[tokio::test]
    async fn test_research_requires_search_key() {
        let llm = ScriptedModel::new(vec![Ok("Here are some thoughts.")]);

        let reply = respond("best AI tools", None, false, llm.as_ref()).await;
        assert_eq!(reply, ChatReply::direct("Here are some thoughts."));
        assert_eq!(llm.calls(), 1);

        let prompt = llm.prompts.lock().unwrap()[0].clone();
        assert!(prompt.starts_with("You are ScynV"));
        assert!(prompt.trim_end().ends_with("User: best AI tools"));
    }

    #[tokio::test]
    async fn test_non_trigger_message_gets_direct_reply() {
        let llm = ScriptedModel::new(vec![Ok("Hi!")]);
        let reply = respond("hello", Some("c1".into()), true, llm.as_ref()).await;
        assert!(!reply.uses_agent());
        assert_eq!(reply.reply(), "Hi!");
    }

    #[tokio::test]
    async fn test_research_reply_shape() {
        let llm = ScriptedModel::new(vec![]);
        let reply = respond("research quantum computing", Some("c9".into()), true, llm.as_ref()).await;
        assert_eq!(llm.calls(), 0);

        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "reply": "Starting autonomous research...",
                "useAgent": true,
                "message": "research quantum computing",
                "chatId": "c9"
            })
        );
    }

    #[tokio::test]
    async fn test_model_failure_is_canned_reply() {
        let llm = ScriptedModel::new(vec![Err("connection reset")]);
        let reply = respond("hello", None, true, llm.as_ref()).await;
        assert_eq!(reply.reply(), MODEL_UNREACHABLE);
    }

    #[tokio::test]
    async fn test_empty_model_output() {
        let llm = ScriptedModel::new(vec![Ok(NO_RESPONSE)]);
        let reply = respond("hello", None, true, llm.as_ref()).await;
        assert_eq!(reply, ChatReply::direct(NO_REPLY));
    }
}
