//! Incremental decoder for `text/event-stream` bodies.
//!
//! Network chunks split frames (and UTF-8 sequences) at arbitrary points, so
//! bytes are buffered until a blank line terminates a frame.

use super::events::ResearchEvent;

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the `data` payload of every frame it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line.is_empty() {
                if !self.data.is_empty() {
                    payloads.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            if field == "data" {
                self.data.push(value.to_string());
            }
        }

        payloads
    }

    /// Feed a chunk and decode completed frames; undecodable payloads are skipped
    pub fn feed_events(&mut self, chunk: &[u8]) -> Vec<ResearchEvent> {
        self.feed(chunk)
            .into_iter()
            .filter_map(|payload| match ResearchEvent::from_json(&payload) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!("Skipping undecodable event: {}", e);
                    None
                }
            })
            .collect()
    }
}
