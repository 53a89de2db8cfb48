//! Local Ollama server (`/api/chat`, `/api/tags`), streamed as newline-delimited JSON.

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{ChatMessage, Completion, StreamEvent, StreamOutcome, Tool, ToolCall};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{Result, TransportError};
use crate::stream::LineBuffer;
use crate::ChatTransport;

#[derive(Debug, Clone)]
pub struct Ollama {
    chat_endpoint: String,
    tags_endpoint: String,
    model: String,
    client: reqwest::Client,
}

impl Ollama {
    pub fn new(url: &str, model: &str) -> Self {
        let base = url.trim_end_matches('/');
        Self {
            chat_endpoint: format!("{base}/api/chat"),
            tags_endpoint: format!("{base}/api/tags"),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
    }

    pub fn request_body(&self, history: &[ChatMessage], tools: Option<&[Tool]>, stream: bool) -> Value {
        let messages: Vec<Value> = history
            .iter()
            .filter(|m| !m.is_error)
            .map(|m| {
                let mut out = json!({ "role": m.role.as_str(), "content": m.content });
                if !m.image_urls.is_empty() {
                    out["images"] = m.image_urls.iter().map(|u| strip_data_url(u)).collect();
                }
                if !m.tool_calls.is_empty() {
                    out["tool_calls"] = m
                        .tool_calls
                        .iter()
                        .map(|c| json!({ "function": { "name": c.tool_name, "arguments": c.arguments } }))
                        .collect();
                }
                out
            })
            .collect();
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        });
        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            body["tools"] = serde_json::to_value(tools).unwrap_or(Value::Null);
        }
        body
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self.client.post(&self.chat_endpoint).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Ollama expects raw base64, not a data URL
fn strip_data_url(url: &str) -> String {
    match url.split_once(";base64,") {
        Some((_, data)) if url.starts_with("data:") => data.to_string(),
        _ => url.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<LineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LineMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    tool_calls: Vec<LineToolCall>,
}

#[derive(Debug, Deserialize)]
struct LineToolCall {
    function: LineFunction,
}

#[derive(Debug, Deserialize)]
struct LineFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    model: Option<String>,
}

fn parse_line(line: &str) -> Result<ChatLine> {
    let parsed: ChatLine = serde_json::from_str(line)?;
    if let Some(error) = parsed.error {
        return Err(TransportError::Api(error));
    }
    Ok(parsed)
}

fn convert_calls(calls: Vec<LineToolCall>, offset: usize) -> Vec<ToolCall> {
    calls
        .into_iter()
        .enumerate()
        .map(|(i, c)| ToolCall {
            id: format!("call_{}", offset + i),
            tool_name: c.function.name,
            arguments: c.function.arguments,
        })
        .collect()
}

impl ChatTransport for Ollama {
    fn name(&self) -> &str {
        "Ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn fetch_models(&self) -> Vec<String> {
        let result = async {
            self.client
                .get(&self.tags_endpoint)
                .send()
                .await?
                .error_for_status()?
                .json::<TagList>()
                .await
        }
        .await;

        match result {
            Ok(tags) => tags
                .models
                .into_iter()
                .map(|m| m.model.unwrap_or(m.name))
                .collect(),
            Err(e) => {
                tracing::error!("Error fetching Ollama models: {e}");
                Vec::new()
            }
        }
    }

    async fn complete(&self, history: &[ChatMessage], tools: Option<&[Tool]>) -> Result<Completion> {
        let body = self.request_body(history, tools, false);
        let text = self.post(&body).await?.text().await?;
        let line = parse_line(&text)?;
        let message = line
            .message
            .ok_or_else(|| TransportError::InvalidResponse("response has no message".into()))?;
        Ok(Completion {
            content: message.content,
            reasoning: message.thinking.filter(|t| !t.is_empty()),
            tool_calls: convert_calls(message.tool_calls, 0),
        })
    }

    async fn complete_streamed(
        &self,
        history: &[ChatMessage],
        tools: Option<&[Tool]>,
        events: &UnboundedSender<StreamEvent>,
    ) -> Result<StreamOutcome> {
        let body = self.request_body(history, tools, true);
        let mut stream = self.post(&body).await?.bytes_stream();
        let mut lines = LineBuffer::new();
        let mut calls = Vec::new();

        let handle = |line: &str, calls: &mut Vec<ToolCall>| -> Result<bool> {
            let parsed = parse_line(line)?;
            if let Some(message) = parsed.message {
                if !message.content.is_empty() {
                    let _ = events.send(StreamEvent::Token(message.content));
                }
                if let Some(thinking) = message.thinking.filter(|t| !t.is_empty()) {
                    let _ = events.send(StreamEvent::Reasoning(thinking));
                }
                let offset = calls.len();
                calls.extend(convert_calls(message.tool_calls, offset));
            }
            Ok(parsed.done)
        };

        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for line in lines.push(&chunk) {
                if handle(&line, &mut calls)? {
                    break 'read;
                }
            }
        }
        if let Some(line) = lines.finish() {
            handle(&line, &mut calls)?;
        }

        Ok(StreamOutcome::from_tool_calls(calls))
    }
}
