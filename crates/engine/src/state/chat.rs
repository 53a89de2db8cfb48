//! Chat sessions and the turn loop.
//!
//! A turn snapshots the selection, sends the history to the transport,
//! runs any requested tools, and loops until the model answers without
//! tool calls. The final answer's fenced JSON block (or a diff proposed
//! through a tool) becomes a fresh [`DiffReview`].

use serde_json::Value as Json;
use shared::{ChatMessage, Completion, Role, StreamEvent, Tool};
use tokio::sync::mpsc::{self, UnboundedSender};
use transport::{ChatTransport, TransportError};

use super::settings::ForgeSettings;
use crate::command;
use crate::diff::{self, ApplyReport, DiffReview};
use crate::error::{PropertyError, ResolveError, ResolveWarning};
use crate::graph::{InstanceId, SceneGraph, UidMap};
use crate::snapshot;

pub const SYSTEM_PROMPT: &str = r#"You are an assistant inside a game engine editor. You help the user change the objects in their scene.

Each user message starts with "Scene JSON:" followed by the selected objects, keyed by UID:
{"0": {"name": "Player", "active": true, "tag": "Untagged", "layer": 0,
       "transform": {"position": [0, 0, 0], "rotation": [0, 0, 0], "scale": [1, 1, 1]},
       "components": [{"type": "Rigidbody", "properties": {"mass": 1.0}}]}}

To change the scene, explain what you will do, then reply with exactly one ```json block keyed by UID,
then component type, then property name, holding only the new values:
```json
{"0": {"Transform": {"position": [0, 2, 0]}, "Rigidbody": {"mass": 5}}}
```
- Vectors and colors are arrays of numbers, rotations are Euler angles in degrees.
- Naming a component the object does not have adds it.
- To create an object, use a new UID with a "name" and optionally a "parent" UID.
- To remove a component, set its section to null. To remove an object, set its UID to null.
You can call tools to inspect the rest of the scene."#;

pub const GREETING: &str = "Hi! Select some objects and tell me what you would like to change.";

/// Everything a turn needs besides the session itself
pub struct ChatContext<'a, T, G> {
    pub transport: &'a T,
    pub settings: &'a ForgeSettings,
    pub scene: &'a G,
    pub selection: &'a [InstanceId],
    /// Receives tokens as they stream in
    pub events: Option<&'a UnboundedSender<StreamEvent>>,
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Answer without a scene diff
    Reply,
    /// Answer with a diff, now under review
    Diff { ops: usize },
    /// The proposed diff could not be resolved
    InvalidDiff(ResolveError),
    /// The transport kept failing; a terminal error message was appended
    Failed(String),
}

/// Return the trimmed content of the first ```json fenced block
pub fn extract_json_block(text: &str) -> Option<&str> {
    const FENCE: &str = "```json";
    let start = text.to_ascii_lowercase().find(FENCE)? + FENCE.len();
    let end = text[start..].find("```")?;
    Some(text[start..start + end].trim())
}

/// One conversation with its own history, UID map and review
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub name: String,
    history: Vec<ChatMessage>,
    uids: UidMap,
    review: Option<DiffReview>,
    warnings: Vec<ResolveWarning>,
    errors: Vec<PropertyError>,
}

impl ChatSession {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            history: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::assistant(GREETING)],
            uids: UidMap::new(),
            review: None,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Messages shown to the user
    pub fn visible_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.history.iter().filter(|m| m.display)
    }

    pub fn uid_map(&self) -> &UidMap {
        &self.uids
    }

    pub fn review(&self) -> Option<&DiffReview> {
        self.review.as_ref()
    }

    pub fn review_mut(&mut self) -> Option<&mut DiffReview> {
        self.review.as_mut()
    }

    /// Warnings from resolving the last diff
    pub fn warnings(&self) -> &[ResolveWarning] {
        &self.warnings
    }

    /// Property errors from resolving the last diff
    pub fn errors(&self) -> &[PropertyError] {
        &self.errors
    }

    /// Append a message, merging consecutive user or assistant messages
    pub fn push(&mut self, message: ChatMessage) {
        if let Some(last) = self.history.last_mut() {
            let mergeable = matches!(message.role, Role::User | Role::Assistant)
                && last.role == message.role
                && last.display
                && message.display
                && !last.is_error
                && !message.is_error
                && last.tool_calls.is_empty()
                && message.tool_calls.is_empty();
            if mergeable {
                last.content.push('\n');
                last.content.push_str(&message.content);
                if !message.image_urls.is_empty() {
                    last.image_urls = message.image_urls;
                }
                if let Some(reasoning) = message.reasoning {
                    last.reasoning = Some(reasoning);
                }
                return;
            }
        }
        self.history.push(message);
    }

    /// Snapshot the selection, send the prompt and run the turn to completion
    pub async fn send_prompt<T: ChatTransport, G: SceneGraph>(
        &mut self,
        ctx: &ChatContext<'_, T, G>,
        prompt: &str,
        images: Vec<String>,
    ) -> TurnOutcome {
        let (uids, scene_json) = snapshot::serialize(ctx.scene, ctx.selection);
        // a review is only valid against the map it was resolved with
        self.uids = uids;
        self.review = None;
        self.warnings.clear();
        self.errors.clear();

        let images = if ctx.transport.supports_images() {
            images
        } else {
            if !images.is_empty() {
                tracing::warn!(backend = ctx.transport.name(), "backend does not accept images, dropping them");
            }
            Vec::new()
        };
        let content = format!("Scene JSON: {scene_json}\n\nUser Prompt: {prompt}");
        self.push(ChatMessage::user(content).with_images(images));
        self.run_turn(ctx).await
    }

    async fn run_turn<T: ChatTransport, G: SceneGraph>(&mut self, ctx: &ChatContext<'_, T, G>) -> TurnOutcome {
        let tools = command::manifest();
        let mut retries = 0;
        let mut rounds = 0;
        let mut tool_diff: Option<Json> = None;

        loop {
            let completion = match self.request(ctx, &tools).await {
                Ok(completion) => completion,
                Err(e) => {
                    tracing::error!(backend = ctx.transport.name(), attempt = retries + 1, "chat request failed: {e}");
                    if retries < ctx.settings.max_error_retries {
                        retries += 1;
                        let mut retry = ChatMessage::user(format!(
                            "The previous request failed with this error: {e}. Please answer again."
                        ));
                        retry.display = false;
                        self.push(retry);
                        continue;
                    }
                    let mut message = ChatMessage::assistant(format!(
                        "Request failed after {retries} retries. Please check the log for details."
                    ));
                    message.is_error = true;
                    self.push(message);
                    return TurnOutcome::Failed(e.to_string());
                }
            };

            let calls = completion.tool_calls.clone();
            let mut message = ChatMessage::assistant(completion.content);
            message.reasoning = completion.reasoning;
            message.tool_calls = completion.tool_calls;
            self.push(message);
            if calls.is_empty() {
                break;
            }

            for call in &calls {
                let content = match command::invoke(ctx.scene, ctx.selection, &call.tool_name, &call.arguments) {
                    Ok(output) => {
                        if let Some(diff) = output.as_diff() {
                            tool_diff = Some(diff.clone());
                        }
                        output.content()
                    }
                    Err(e) => {
                        tracing::warn!(tool = %call.tool_name, "tool call failed: {e}");
                        format!("Error: {e}")
                    }
                };
                self.push(ChatMessage::tool(&call.tool_name, &call.id, content));
            }

            rounds += 1;
            if rounds >= ctx.settings.max_tool_rounds {
                tracing::warn!(rounds, "tool round limit reached, ending turn");
                break;
            }
        }

        tracing::info!(rounds, retries, "chat turn finished");
        self.review_response(ctx, tool_diff)
    }

    /// One completion, streamed when enabled and supported
    async fn request<T: ChatTransport, G>(
        &self,
        ctx: &ChatContext<'_, T, G>,
        tools: &[Tool],
    ) -> Result<Completion, TransportError> {
        let transport = ctx.transport;
        if !(ctx.settings.stream && transport.supports_streaming()) {
            return transport.complete(&self.history, Some(tools)).await;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let history = &self.history;
        let request = async move {
            let outcome = transport.complete_streamed(history, Some(tools), &tx).await;
            drop(tx);
            outcome
        };
        let collect = async {
            let mut content = String::new();
            let mut reasoning = String::new();
            while let Some(event) = rx.recv().await {
                match &event {
                    StreamEvent::Token(token) => content.push_str(token),
                    StreamEvent::Reasoning(token) => reasoning.push_str(token),
                }
                if let Some(host) = ctx.events {
                    let _ = host.send(event);
                }
            }
            (content, reasoning)
        };

        let (outcome, (content, reasoning)) = tokio::join!(request, collect);
        let outcome = outcome?;
        Ok(Completion {
            content,
            reasoning: (!reasoning.is_empty()).then_some(reasoning),
            tool_calls: outcome.tool_calls,
        })
    }

    /// Replace the review with whatever diff the latest answer carries
    fn review_response<T, G: SceneGraph>(&mut self, ctx: &ChatContext<'_, T, G>, tool_diff: Option<Json>) -> TurnOutcome {
        self.review = None;
        self.warnings.clear();
        self.errors.clear();

        let fenced = self
            .history
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !m.is_error)
            .and_then(|m| extract_json_block(&m.content))
            .map(|block| serde_json::from_str::<Json>(block).map_err(|e| ResolveError::Parse(e.to_string())));

        let patch = match (fenced, tool_diff) {
            (Some(Ok(patch)), _) => patch,
            (Some(Err(e)), None) => {
                tracing::warn!("assistant reply has an unreadable diff: {e}");
                return TurnOutcome::InvalidDiff(e);
            }
            (_, Some(patch)) => patch,
            (None, None) => return TurnOutcome::Reply,
        };

        let policy = ctx.settings.resolve_policy();
        match diff::resolve(ctx.scene, &patch, &mut self.uids, &policy) {
            Ok(resolution) => {
                let review = DiffReview::new(resolution.ops);
                let ops = review.len();
                self.review = Some(review);
                self.warnings = resolution.warnings;
                self.errors = resolution.errors;
                TurnOutcome::Diff { ops }
            }
            Err(e) => {
                tracing::warn!("could not resolve diff: {e}");
                TurnOutcome::InvalidDiff(e)
            }
        }
    }

    /// Commit the current review and apply it. The review is consumed.
    pub fn apply_review(&mut self, scene: &mut impl SceneGraph) -> Option<ApplyReport> {
        let ops = self.review.take()?.commit();
        Some(diff::apply(scene, &ops, Some(&mut self.uids)))
    }

    /// Drop the current review without applying it
    pub fn discard_review(&mut self) {
        self.review = None;
    }
}

/// All open chats and the one being shown
#[derive(Debug, Clone)]
pub struct ChatManager {
    chats: Vec<ChatSession>,
    current: usize,
}

impl Default for ChatManager {
    fn default() -> Self {
        Self {
            chats: vec![ChatSession::new("Chat 1")],
            current: 0,
        }
    }
}

impl ChatManager {
    pub fn chats(&self) -> &[ChatSession] {
        &self.chats
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &ChatSession {
        &self.chats[self.current]
    }

    pub fn current_mut(&mut self) -> &mut ChatSession {
        &mut self.chats[self.current]
    }

    /// Open a new chat and make it current
    pub fn new_chat(&mut self, name: Option<&str>) -> usize {
        let name = match name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("Chat {}", self.chats.len() + 1),
        };
        self.chats.push(ChatSession::new(name));
        self.current = self.chats.len() - 1;
        self.current
    }

    /// Out-of-range indices are ignored
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.chats.len() {
            self.current = index;
            true
        } else {
            false
        }
    }

    /// Close a chat; the last one is replaced with a fresh chat
    pub fn close_chat(&mut self, index: usize) -> bool {
        if index >= self.chats.len() {
            return false;
        }
        self.chats.remove(index);
        if self.chats.is_empty() {
            self.chats.push(ChatSession::new("Chat 1"));
        }
        if self.current >= self.chats.len() || self.current > index {
            self.current = self.current.saturating_sub(1).min(self.chats.len() - 1);
        }
        true
    }

    pub async fn fetch_models(&self, transport: &impl ChatTransport) -> Vec<String> {
        transport.fetch_models().await
    }
}
