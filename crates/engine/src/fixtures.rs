//! Factory functions for test scenes and a scripted chat backend.
//!
//! Used by the unit tests, the integration tests and anyone driving the
//! chat loop without a live model.

use std::cell::RefCell;
use std::collections::VecDeque;

use serde_json::{Map, Value as Json};
use shared::{ChatMessage, Completion, StreamEvent, StreamOutcome, Tool, ToolCall};
use tokio::sync::mpsc::UnboundedSender;
use transport::{ChatTransport, TransportError};

use crate::codec::Value;
use crate::graph::{InstanceId, MemoryScene, SceneGraph};

// ── Scene factories ─────────────────────────────────────────────

fn attach(scene: &mut MemoryScene, id: InstanceId, component: &str) {
    if let Err(e) = scene.add_component(id, component) {
        tracing::warn!(%id, component, "fixture component not attached: {e}");
    }
}

fn set(scene: &mut MemoryScene, id: InstanceId, component: &str, property: &str, value: Value) {
    if let Some(target) = scene.get_component(id, component) {
        scene.set_property(&target, property, value);
    }
}

/// One object named "Light" carrying a `Light2D`
pub fn light2d_scene() -> (MemoryScene, InstanceId) {
    let mut scene = MemoryScene::default();
    let light = scene.create_object("Light", None);
    attach(&mut scene, light, "Light2D");
    (scene, light)
}

/// A "Player" with a `Rigidbody` and a `BoxCollider`
pub fn player_scene() -> (MemoryScene, InstanceId) {
    let mut scene = MemoryScene::default();
    let player = scene.create_object("Player", None);
    attach(&mut scene, player, "Rigidbody");
    attach(&mut scene, player, "BoxCollider");
    set(&mut scene, player, "Rigidbody", "mass", Value::Float(70.0));
    (scene, player)
}

/// Root > Child > Grandchild, plus a lone "Sibling" root
pub fn hierarchy_scene() -> (MemoryScene, [InstanceId; 4]) {
    let mut scene = MemoryScene::default();
    let root = scene.create_object("Root", None);
    let child = scene.create_object("Child", Some(root));
    let grandchild = scene.create_object("Grandchild", Some(child));
    let sibling = scene.create_object("Sibling", None);
    attach(&mut scene, child, "Light");
    (scene, [root, child, grandchild, sibling])
}

// ── Scripted backend ────────────────────────────────────────────

/// Plain assistant reply
pub fn reply(text: &str) -> Result<Completion, String> {
    Ok(Completion {
        content: text.to_string(),
        ..Completion::default()
    })
}

/// Assistant reply that only requests tool calls
pub fn tool_reply(calls: &[(&str, Json)]) -> Result<Completion, String> {
    let tool_calls = calls
        .iter()
        .enumerate()
        .map(|(i, (name, args))| ToolCall {
            id: format!("call_{i}"),
            tool_name: name.to_string(),
            arguments: args.as_object().cloned().unwrap_or_else(Map::new),
        })
        .collect();
    Ok(Completion {
        content: String::new(),
        reasoning: None,
        tool_calls,
    })
}

/// Backend that replays canned completions in order.
/// `Err` entries surface as API errors; an exhausted script is an error too.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: RefCell<VecDeque<Result<Completion, String>>>,
    requests: RefCell<Vec<Vec<ChatMessage>>>,
    streaming: bool,
    images: bool,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = Result<Completion, String>>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn streaming(mut self, on: bool) -> Self {
        self.streaming = on;
        self
    }

    pub fn with_images(mut self) -> Self {
        self.images = true;
        self
    }

    /// Every history sent so far
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.borrow().len()
    }

    fn next(&self, history: &[ChatMessage]) -> Result<Completion, TransportError> {
        self.requests.borrow_mut().push(history.to_vec());
        match self.replies.borrow_mut().pop_front() {
            Some(Ok(completion)) => Ok(completion),
            Some(Err(message)) => Err(TransportError::Api(message)),
            None => Err(TransportError::Api("script exhausted".to_string())),
        }
    }
}

impl ChatTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    fn supports_images(&self) -> bool {
        self.images
    }

    async fn fetch_models(&self) -> Vec<String> {
        vec!["scripted".to_string()]
    }

    async fn complete(&self, history: &[ChatMessage], _tools: Option<&[Tool]>) -> Result<Completion, TransportError> {
        self.next(history)
    }

    async fn complete_streamed(
        &self,
        history: &[ChatMessage],
        _tools: Option<&[Tool]>,
        events: &UnboundedSender<StreamEvent>,
    ) -> Result<StreamOutcome, TransportError> {
        let completion = self.next(history)?;
        if let Some(reasoning) = completion.reasoning {
            let _ = events.send(StreamEvent::Reasoning(reasoning));
        }
        for token in completion.content.split_inclusive(' ') {
            let _ = events.send(StreamEvent::Token(token.to_string()));
        }
        Ok(StreamOutcome::from_tool_calls(completion.tool_calls))
    }
}
