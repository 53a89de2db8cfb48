//! OpenAI-compatible chat completions (Groq, OpenAI, any server speaking the same API).

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{ChatMessage, Completion, Role, StreamEvent, StreamOutcome, Tool, ToolCall};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{Result, TransportError};
use crate::stream::{parse_arguments, parse_sse_line, LineBuffer, SseLine, ToolCallAccumulator};
use crate::ChatTransport;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for `/chat/completions` style endpoints
#[derive(Debug, Clone)]
pub struct OpenAiCompatible {
    provider: &'static str,
    base_url: String,
    api_key: String,
    model: String,
    images: bool,
    client: reqwest::Client,
}

impl OpenAiCompatible {
    pub fn new(provider: &'static str, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            images: false,
            client: reqwest::Client::new(),
        }
    }

    pub fn groq(api_key: &str, model: &str) -> Self {
        Self::new("Groq", GROQ_BASE_URL, api_key, model)
    }

    pub fn openai(api_key: &str, model: &str) -> Self {
        let mut client = Self::new("OpenAI", OPENAI_BASE_URL, api_key, model);
        client.images = true;
        client
    }

    pub fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
    }

    fn auth(&self) -> Result<String> {
        if self.api_key.trim().is_empty() {
            return Err(TransportError::MissingApiKey(self.provider));
        }
        Ok(format!("Bearer {}", self.api_key))
    }

    /// Build the JSON request body for a completion
    pub fn request_body(&self, history: &[ChatMessage], tools: Option<&[Tool]>, stream: bool) -> Value {
        let messages: Vec<Value> = history
            .iter()
            .filter(|m| !m.is_error)
            .map(wire_message)
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
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", self.auth()?)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

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

/// Convert a history message into the OpenAI wire shape
fn wire_message(msg: &ChatMessage) -> Value {
    let content = if msg.image_urls.is_empty() {
        Value::String(msg.content.clone())
    } else {
        let mut parts = vec![json!({ "type": "text", "text": msg.content })];
        parts.extend(
            msg.image_urls
                .iter()
                .map(|url| json!({ "type": "image_url", "image_url": { "url": url } })),
        );
        Value::Array(parts)
    };

    let mut out = json!({ "role": msg.role.as_str(), "content": content });
    if msg.role == Role::Tool {
        if let Some(name) = &msg.name {
            out["name"] = json!(name);
        }
        if let Some(id) = &msg.tool_call_id {
            out["tool_call_id"] = json!(id);
        }
    }
    if !msg.tool_calls.is_empty() {
        out["tool_calls"] = msg
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.tool_name,
                        "arguments": Value::Object(call.arguments.clone()).to_string(),
                    }
                })
            })
            .collect();
    }
    out
}

// ── Response shapes ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Vec<DeltaToolCall>,
}

#[derive(Debug, Deserialize)]
struct DeltaToolCall {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<DeltaFunction>,
}

#[derive(Debug, Deserialize)]
struct DeltaFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Parse a non-streamed completion body
pub fn parse_completion(body: &str) -> Result<Completion> {
    let response: ChatResponse = serde_json::from_str(body)?;
    let message = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| TransportError::InvalidResponse("response has no choices".into()))?
        .message;

    let tool_calls = message
        .tool_calls
        .into_iter()
        .enumerate()
        .map(|(i, call)| {
            Ok(ToolCall {
                id: if call.id.is_empty() { format!("call_{i}") } else { call.id },
                arguments: parse_arguments(&call.function.arguments)?,
                tool_name: call.function.name,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Completion {
        content: message.content.unwrap_or_default(),
        reasoning: message.reasoning.filter(|r| !r.is_empty()),
        tool_calls,
    })
}

/// Feed one SSE data payload into the stream state.
fn handle_chunk(
    data: &str,
    events: &UnboundedSender<StreamEvent>,
    calls: &mut ToolCallAccumulator,
) -> Result<()> {
    let chunk: StreamChunk = serde_json::from_str(data)?;
    if let Some(err) = chunk.error {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(TransportError::Api(message));
    }
    let Some(delta) = chunk.choices.into_iter().next().and_then(|c| c.delta) else {
        return Ok(());
    };
    for call in delta.tool_calls {
        let function = call.function.as_ref();
        calls.push(
            call.index,
            call.id.as_deref(),
            function.and_then(|f| f.name.as_deref()),
            function.and_then(|f| f.arguments.as_deref()),
        );
    }
    // a dropped receiver only means nobody is watching the tokens
    if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
        let _ = events.send(StreamEvent::Token(content));
    }
    if let Some(reasoning) = delta.reasoning.filter(|r| !r.is_empty()) {
        let _ = events.send(StreamEvent::Reasoning(reasoning));
    }
    Ok(())
}

impl ChatTransport for OpenAiCompatible {
    fn name(&self) -> &str {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_images(&self) -> bool {
        self.images
    }

    async fn fetch_models(&self) -> Vec<String> {
        let auth = match self.auth() {
            Ok(auth) => auth,
            Err(e) => {
                tracing::error!("Error fetching models: {e}");
                return Vec::new();
            }
        };
        let result = async {
            let response = self
                .client
                .get(format!("{}/models", self.base_url))
                .header("Authorization", auth)
                .send()
                .await?
                .error_for_status()?;
            response.json::<ModelList>().await
        }
        .await;

        match result {
            Ok(list) => list.data.into_iter().map(|m| m.id).collect(),
            Err(e) => {
                tracing::error!(provider = self.provider, "Error fetching models: {e}");
                Vec::new()
            }
        }
    }

    async fn complete(&self, history: &[ChatMessage], tools: Option<&[Tool]>) -> Result<Completion> {
        let body = self.request_body(history, tools, false);
        let text = self.post(&body).await?.text().await?;
        parse_completion(&text)
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
        let mut calls = ToolCallAccumulator::new();

        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for line in lines.push(&chunk) {
                match parse_sse_line(&line) {
                    SseLine::Data(data) => handle_chunk(data, events, &mut calls)?,
                    SseLine::Done => break 'read,
                    SseLine::Skip => {}
                }
            }
        }
        if let Some(line) = lines.finish() {
            if let SseLine::Data(data) = parse_sse_line(&line) {
                handle_chunk(data, events, &mut calls)?;
            }
        }

        Ok(StreamOutcome::from_tool_calls(calls.finish()?))
    }
}
