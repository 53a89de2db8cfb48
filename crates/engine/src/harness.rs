//! Headless test harness for driving the diff pipeline end to end.
//!
//! Bundles a scene, a selection and the resolve policy so tests (and
//! scripted agents) can snapshot, resolve a patch, toggle the review and
//! apply it without a chat backend.

use serde_json::Value as Json;

use crate::codec::Value;
use crate::diff::{self, ApplyReport, DiffReview, Resolution, ResolvePolicy};
use crate::error::ResolveError;
use crate::graph::{InstanceId, MemoryScene, SceneGraph, UidMap};
use crate::snapshot;
use crate::state::{ForgeSettings, SelectionState};

/// Headless test harness: scene, selection, UID map and pending review
pub struct TestHarness {
    pub scene: MemoryScene,
    pub selection: SelectionState,
    pub policy: ResolvePolicy,
    uids: UidMap,
    review: Option<DiffReview>,
    last_resolution: Option<Resolution>,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    /// Create a new empty harness.
    pub fn new() -> Self {
        Self::with_scene(MemoryScene::default())
    }

    pub fn with_scene(scene: MemoryScene) -> Self {
        Self {
            scene,
            selection: SelectionState::default(),
            policy: ResolvePolicy::default(),
            uids: UidMap::new(),
            review: None,
            last_resolution: None,
        }
    }

    /// Take the resolve policy from settings
    pub fn use_settings(&mut self, settings: &ForgeSettings) {
        self.policy = settings.resolve_policy();
    }

    // ── Scene manipulation ────────────────────────────────────

    /// Create an object with the given components and return its id
    pub fn create_object(&mut self, name: &str, components: &[&str]) -> InstanceId {
        let id = self.scene.create_object(name, None);
        for component in components {
            let _ = self.scene.add_component(id, component);
        }
        id
    }

    pub fn create_child(&mut self, name: &str, parent: InstanceId) -> InstanceId {
        self.scene.create_object(name, Some(parent))
    }

    pub fn select(&mut self, ids: &[InstanceId]) {
        self.selection = ids.iter().copied().collect();
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn property(&self, id: InstanceId, component: &str, property: &str) -> Option<Value> {
        let target = self.scene.get_component(id, component)?;
        self.scene.get_property(&target, property)
    }

    pub fn has_component(&self, id: InstanceId, component: &str) -> bool {
        self.scene.get_component(id, component).is_some()
    }

    pub fn uids(&self) -> &UidMap {
        &self.uids
    }

    pub fn review(&self) -> Option<&DiffReview> {
        self.review.as_ref()
    }

    pub fn review_mut(&mut self) -> Option<&mut DiffReview> {
        self.review.as_mut()
    }

    /// Warnings and errors of the last resolve
    pub fn last_resolution(&self) -> Option<&Resolution> {
        self.last_resolution.as_ref()
    }

    // ── Pipeline ──────────────────────────────────────────────

    /// Snapshot the selection; the UID map is replaced and any pending review dropped
    pub fn snapshot(&mut self) -> Json {
        let (uids, doc) = snapshot::serialize(&self.scene, self.selection.all());
        self.uids = uids;
        self.review = None;
        doc
    }

    /// Resolve a patch into a fresh review. Returns the number of ops.
    pub fn resolve(&mut self, patch: &Json) -> Result<usize, ResolveError> {
        self.review = None;
        let resolution = diff::resolve(&self.scene, patch, &mut self.uids, &self.policy)?;
        let review = DiffReview::new(resolution.ops.clone());
        let count = review.len();
        self.review = Some(review);
        self.last_resolution = Some(resolution);
        Ok(count)
    }

    /// Commit the pending review and apply it
    pub fn apply(&mut self) -> ApplyReport {
        let ops = self.review.take().map(DiffReview::commit).unwrap_or_default();
        diff::apply(&mut self.scene, &ops, Some(&mut self.uids))
    }

    /// Snapshot, resolve and apply with every op selected
    pub fn apply_patch(&mut self, patch: &Json) -> Result<ApplyReport, ResolveError> {
        self.snapshot();
        self.resolve(patch)?;
        Ok(self.apply())
    }
}
