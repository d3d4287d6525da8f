//! Prompt templates bundled at compile time.
//!
//! Placeholders are written as `{name}` and substituted in a single pass, so
//! text inserted for one placeholder is never rescanned for another.

use crate::tools::SearchResultSet;

/// Planner - turns a query into a JSON research plan
pub const PLANNER: &str = include_str!("defaults/planner.md");

/// Analyst - organizes findings from raw search results
pub const ANALYST: &str = include_str!("defaults/analyst.md");

/// Synthesizer - writes the final conversational answer
pub const SYNTHESIZER: &str = include_str!("defaults/synthesizer.md");

/// Assistant - direct chat replies outside of research
pub const ASSISTANT: &str = include_str!("defaults/assistant.md");

/// Substitute `{name}` placeholders; unknown braces are left untouched
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replacement = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });

        match replacement {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn planning_prompt(query: &str) -> String {
    render(PLANNER, &[("query", query)])
}

pub fn analysis_prompt(query: &str, results: &[SearchResultSet]) -> String {
    let serialized = serde_json::to_string_pretty(results).unwrap_or_else(|_| "[]".to_string());
    render(ANALYST, &[("query", query), ("results", &serialized)])
}

pub fn synthesis_prompt(analysis: &str) -> String {
    render(SYNTHESIZER, &[("analysis", analysis)])
}

pub fn assistant_prompt(message: &str) -> String {
    render(ASSISTANT, &[("message", message)])
}

/// All templates with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("planner", PLANNER),
        ("analyst", ANALYST),
        ("synthesizer", SYNTHESIZER),
        ("assistant", ASSISTANT),
    ]
}
