use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-request address of a scene object inside one diff exchange
pub type Uid = String;

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

fn default_true() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// A single message in a chat history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Reasoning text produced alongside the answer (if the backend exposes it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Tool name, set on tool-role messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Links a tool-role message to the call it answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Attached images as data or http URLs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
    /// Tool calls requested by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Hidden messages (system prompt) are sent but not shown
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub display: bool,
    /// Terminal error notice produced locally, never sent by a backend
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl ChatMessage {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            reasoning: None,
            name: None,
            tool_call_id: None,
            image_urls: Vec::new(),
            tool_calls: Vec::new(),
            display: true,
            is_error: false,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::System, content);
        msg.display = false;
        msg
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Tool result message answering the call `call_id`
    pub fn tool(name: impl Into<String>, call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content);
        msg.name = Some(name.into());
        msg.tool_call_id = Some(call_id.into());
        msg
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.image_urls = images;
        self
    }
}

// ============================================================================
// Tool manifest (OpenAI function-calling shape)
// ============================================================================

/// One entry of the tool manifest sent with a completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolFunction,
}

impl Tool {
    pub fn function(name: &str, description: &str, parameters: ToolParameters) -> Self {
        Self {
            kind: "function".to_string(),
            function: ToolFunction {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
}

/// JSON-schema object describing the tool arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameters {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: BTreeMap<String, ToolProperty>,
    pub required: Vec<String>,
}

impl Default for ToolParameters {
    fn default() -> Self {
        Self {
            kind: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

impl ToolParameters {
    /// Add a required parameter
    pub fn required(mut self, name: &str, property: ToolProperty) -> Self {
        self.properties.insert(name.to_string(), property);
        self.required.push(name.to_string());
        self
    }

    /// Add an optional parameter
    pub fn optional(mut self, name: &str, property: ToolProperty) -> Self {
        self.properties.insert(name.to_string(), property);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolProperty {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub variants: Option<Vec<String>>,
}

impl ToolProperty {
    pub fn new(kind: &str, description: &str) -> Self {
        Self {
            kind: kind.to_string(),
            description: description.to_string(),
            variants: None,
        }
    }
}

/// A request from the model to run a named tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "toolName")]
    pub tool_name: String,
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

// ============================================================================
// Completion results
// ============================================================================

/// Result of a one-shot completion
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    pub content: String,
    pub reasoning: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// Incremental output of a streamed completion
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Token(String),
    Reasoning(String),
}

/// Final result of a streamed completion
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamOutcome {
    pub tool_calls: Vec<ToolCall>,
    /// True when tool calls were requested and another turn must follow
    pub should_continue: bool,
}

impl StreamOutcome {
    pub fn from_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        let should_continue = !tool_calls.is_empty();
        Self {
            tool_calls,
            should_continue,
        }
    }
}
