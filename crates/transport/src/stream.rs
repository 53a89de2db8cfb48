//! Incremental decoding of streamed responses.
//!
//! Backends deliver either Server-Sent Events (`data: {...}` lines) or
//! newline-delimited JSON. Both arrive as arbitrary byte chunks, so lines
//! may be split across chunks, including in the middle of a UTF-8 sequence.

use shared::ToolCall;

use crate::error::{Result, TransportError};

/// Accumulates raw bytes and yields complete lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes (without the newline)
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            let text = text.trim_end_matches('\r');
            if !text.trim().is_empty() {
                lines.push(text.to_string());
            }
        }
        lines
    }

    /// Flush the trailing line when the stream ends without a newline
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// Classified Server-Sent-Events line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine<'a> {
    Data(&'a str),
    Done,
    Skip,
}

pub fn parse_sse_line(line: &str) -> SseLine<'_> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        SseLine::Done
    } else if data.is_empty() {
        SseLine::Skip
    } else {
        SseLine::Data(data)
    }
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Reassembles tool calls whose fields arrive as fragments keyed by index
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: Vec<PartialCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Merge one fragment into the call at `index`
    pub fn push(
        &mut self,
        index: usize,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) {
        while self.calls.len() <= index {
            self.calls.push(PartialCall::default());
        }
        let call = &mut self.calls[index];
        if let Some(id) = id.filter(|s| !s.is_empty()) {
            call.id = id.to_string();
        }
        if let Some(name) = name {
            call.name.push_str(name);
        }
        if let Some(args) = arguments {
            call.arguments.push_str(args);
        }
    }

    pub fn finish(self) -> Result<Vec<ToolCall>> {
        self.calls
            .into_iter()
            .enumerate()
            .filter(|(_, c)| !c.name.is_empty())
            .map(|(i, c)| {
                let id = if c.id.is_empty() { format!("call_{i}") } else { c.id };
                Ok(ToolCall {
                    id,
                    arguments: parse_arguments(&c.arguments)?,
                    tool_name: c.name,
                })
            })
            .collect()
    }
}

/// Parse a JSON-encoded argument string; an empty string means no arguments
pub fn parse_arguments(raw: &str) -> Result<serde_json::Map<String, serde_json::Value>> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Map::new());
    }
    match serde_json::from_str::<serde_json::Value>(raw)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(TransportError::InvalidResponse(format!(
            "tool arguments must be an object, got {other}"
        ))),
    }
}
