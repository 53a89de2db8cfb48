//! Patch resolution: object layer, component layer, property layer.
//!
//! Patch shape:
//!
//! ```json
//! { "<uid>": { "name": "...", "parent": "<uid>", "<Component>": { "<property>": <wire value> } } }
//! ```
//!
//! A `null` object entry removes the object, a `null` component section
//! removes the component. UIDs absent from the [`UidMap`] are created when
//! policy allows and registered as [`ObjectRef::Pending`] so later entries
//! (children naming them as parent) resolve within the same pass.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use shared::Uid;

use super::{suppress_noops, Change, DiffOp};
use crate::codec::{self, Value};
use crate::error::{PropertyError, PropertyErrorKind, ResolveError, ResolveWarning};
use crate::graph::{ComponentDescriptor, ComponentRef, ObjectRef, SceneGraph, UidMap};

/// What to do when a new object names a parent that cannot be found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingParentPolicy {
    /// Create the object at the root and warn
    #[default]
    CreateAtRoot,
    /// Reject the whole patch
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvePolicy {
    pub allow_object_creation: bool,
    pub allow_component_creation: bool,
    pub missing_parent: MissingParentPolicy,
}

impl Default for ResolvePolicy {
    fn default() -> Self {
        Self {
            allow_object_creation: true,
            allow_component_creation: true,
            missing_parent: MissingParentPolicy::CreateAtRoot,
        }
    }
}

/// Operations in discovery order, plus everything that was skipped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub ops: Vec<DiffOp>,
    pub warnings: Vec<ResolveWarning>,
    pub errors: Vec<PropertyError>,
}

/// Name used for created objects when the patch gives none
const DEFAULT_OBJECT_NAME: &str = "GameObject";

const NAME_KEY: &str = "name";
const PARENT_KEY: &str = "parent";

/// Resolve a patch against the scene.
///
/// `uids` gains a [`ObjectRef::Pending`] entry for every object the patch
/// creates. Only a non-object patch, or a missing parent under
/// [`MissingParentPolicy::Fail`], is an error.
pub fn resolve(
    graph: &impl SceneGraph,
    patch: &Json,
    uids: &mut UidMap,
    policy: &ResolvePolicy,
) -> Result<Resolution, ResolveError> {
    let entries = patch.as_object().ok_or(ResolveError::NotAnObject)?;
    let mut resolver = Resolver {
        graph,
        entries,
        uids,
        policy,
        out: Resolution::default(),
        done: HashSet::new(),
        in_progress: HashSet::new(),
    };
    for uid in entries.keys() {
        resolver.resolve_object(uid)?;
    }

    let mut resolution = resolver.out;
    resolution.ops = suppress_noops(resolution.ops);
    tracing::info!(
        ops = resolution.ops.len(),
        warnings = resolution.warnings.len(),
        errors = resolution.errors.len(),
        "resolved scene diff"
    );
    Ok(resolution)
}

/// Parse and resolve a patch given as JSON text
pub fn resolve_str(
    graph: &impl SceneGraph,
    text: &str,
    uids: &mut UidMap,
    policy: &ResolvePolicy,
) -> Result<Resolution, ResolveError> {
    let patch: Json = serde_json::from_str(text).map_err(|e| ResolveError::Parse(e.to_string()))?;
    resolve(graph, &patch, uids, policy)
}

struct Resolver<'a, G> {
    graph: &'a G,
    entries: &'a Map<String, Json>,
    uids: &'a mut UidMap,
    policy: &'a ResolvePolicy,
    out: Resolution,
    done: HashSet<String>,
    in_progress: HashSet<String>,
}

/// The object a section applies to
struct Target {
    uid: Uid,
    object: ObjectRef,
    name: Option<String>,
}

impl Target {
    fn op(&self, change: Change) -> DiffOp {
        DiffOp {
            uid: self.uid.clone(),
            target: self.object.clone(),
            object_name: self.name.clone(),
            change,
        }
    }
}

impl<G: SceneGraph> Resolver<'_, G> {
    fn warn(&mut self, warning: ResolveWarning) {
        tracing::warn!("{warning}");
        self.out.warnings.push(warning);
    }

    /// The UID's object if it is still alive in the scene
    fn live_target(&self, uid: &str) -> Option<Target> {
        let id = self.uids.live(uid)?;
        let info = self.graph.find_object(id)?;
        Some(Target {
            uid: uid.to_string(),
            object: ObjectRef::Live(id),
            name: Some(info.name),
        })
    }

    fn resolve_object(&mut self, uid: &str) -> Result<(), ResolveError> {
        if self.done.contains(uid) || self.in_progress.contains(uid) {
            return Ok(());
        }
        let entries = self.entries;
        let Some(section) = entries.get(uid) else {
            return Ok(());
        };
        self.in_progress.insert(uid.to_string());

        match section {
            Json::Null => self.resolve_removal(uid),
            Json::Object(section) => self.resolve_section(uid, section)?,
            _ => self.warn(ResolveWarning::MalformedObject { uid: uid.to_string() }),
        }

        self.in_progress.remove(uid);
        self.done.insert(uid.to_string());
        Ok(())
    }

    fn resolve_removal(&mut self, uid: &str) {
        match self.live_target(uid) {
            Some(target) => self.out.ops.push(target.op(Change::RemoveObject)),
            None => self.warn(ResolveWarning::RemoveMissingObject { uid: uid.to_string() }),
        }
    }

    fn resolve_section(&mut self, uid: &str, section: &Map<String, Json>) -> Result<(), ResolveError> {
        let target = match self.live_target(uid) {
            Some(target) => target,
            None if !self.policy.allow_object_creation => {
                self.warn(ResolveWarning::ObjectCreationDisabled { uid: uid.to_string() });
                return Ok(());
            }
            None => self.create_object(uid, section)?,
        };

        for (key, value) in section {
            if key == NAME_KEY || key == PARENT_KEY {
                if matches!(target.object, ObjectRef::Live(_)) {
                    tracing::debug!(uid, key = %key, "ignoring metadata key on existing object");
                }
                continue;
            }
            self.resolve_component(&target, key, value);
        }
        Ok(())
    }

    fn create_object(&mut self, uid: &str, section: &Map<String, Json>) -> Result<Target, ResolveError> {
        let name = section
            .get(NAME_KEY)
            .and_then(Json::as_str)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_OBJECT_NAME)
            .to_string();
        let parent = match section.get(PARENT_KEY).and_then(uid_from_json) {
            Some(parent) => self.resolve_parent(uid, &parent)?,
            None => None,
        };

        let target = Target {
            uid: uid.to_string(),
            object: ObjectRef::Pending(uid.to_string()),
            name: Some(name.clone()),
        };
        self.out.ops.push(target.op(Change::CreateObject { name, parent }));
        self.uids.insert(uid, ObjectRef::Pending(uid.to_string()));
        Ok(target)
    }

    /// Look up a parent, resolving it first when it is created later in the same patch
    fn resolve_parent(&mut self, uid: &str, parent: &str) -> Result<Option<ObjectRef>, ResolveError> {
        if self.live_target(parent).is_none()
            && !matches!(self.uids.get(parent), Some(ObjectRef::Pending(_)))
            && self.entries.get(parent).is_some_and(Json::is_object)
        {
            self.resolve_object(parent)?;
        }

        match self.uids.get(parent) {
            Some(ObjectRef::Pending(p)) => return Ok(Some(ObjectRef::Pending(p.clone()))),
            Some(ObjectRef::Live(id)) if self.graph.find_object(*id).is_some() => {
                return Ok(Some(ObjectRef::Live(*id)))
            }
            _ => {}
        }

        match self.policy.missing_parent {
            MissingParentPolicy::CreateAtRoot => {
                self.warn(ResolveWarning::MissingParent {
                    uid: uid.to_string(),
                    parent: parent.to_string(),
                });
                Ok(None)
            }
            MissingParentPolicy::Fail => {
                tracing::warn!(uid, parent, "parent not found, rejecting diff");
                Err(ResolveError::MissingParent {
                    uid: uid.to_string(),
                    parent: parent.to_string(),
                })
            }
        }
    }

    fn resolve_component(&mut self, target: &Target, key: &str, value: &Json) {
        let graph = self.graph;
        let Some(descriptor) = graph.find_type(key) else {
            self.warn(ResolveWarning::UnknownType {
                uid: target.uid.clone(),
                component: key.to_string(),
            });
            return;
        };

        let existing = match &target.object {
            ObjectRef::Live(id) => graph.get_component(*id, descriptor.name),
            ObjectRef::Pending(_) => None,
        };

        match value {
            Json::Null => match existing {
                Some(_) if !descriptor.implicit => {
                    self.out.ops.push(target.op(Change::RemoveComponent {
                        component: descriptor.name.to_string(),
                    }));
                }
                _ => self.warn(ResolveWarning::RemoveMissingComponent {
                    uid: target.uid.clone(),
                    component: descriptor.name.to_string(),
                }),
            },
            Json::Object(properties) => match existing {
                Some(handle) => self.resolve_existing(target, descriptor, &handle, properties),
                None => self.resolve_new(target, descriptor, properties),
            },
            _ => self.warn(ResolveWarning::MalformedComponent {
                uid: target.uid.clone(),
                component: key.to_string(),
            }),
        }
    }

    /// Unknown or read-only properties are errors here, reported per property
    fn resolve_existing(
        &mut self,
        target: &Target,
        descriptor: &ComponentDescriptor,
        handle: &ComponentRef,
        properties: &Map<String, Json>,
    ) {
        for (name, wire) in properties {
            let error = |kind| PropertyError {
                uid: target.uid.clone(),
                component: descriptor.name.to_string(),
                property: name.clone(),
                kind,
            };
            let Some(property) = descriptor.property(name) else {
                self.property_error(error(PropertyErrorKind::NotFound));
                continue;
            };
            if !property.writable {
                self.property_error(error(PropertyErrorKind::NotWritable));
                continue;
            }
            let new = match codec::decode(&property.ty, wire) {
                Ok(Value::Unsupported) => {
                    tracing::debug!(uid = %target.uid, component = descriptor.name, property = property.name, "skipping unsupported value");
                    continue;
                }
                Ok(v) => v,
                Err(e) => {
                    self.property_error(error(PropertyErrorKind::Codec(e)));
                    continue;
                }
            };
            let old = self.graph.get_property(handle, property.name);
            self.out.ops.push(target.op(Change::UpdateProperty {
                component: descriptor.name.to_string(),
                property: property.name.to_string(),
                old,
                new,
                handle: Some(handle.clone()),
            }));
        }
    }

    /// Component to be added: emit AddComponent, then every property with no old value
    fn resolve_new(
        &mut self,
        target: &Target,
        descriptor: &ComponentDescriptor,
        properties: &Map<String, Json>,
    ) {
        // implicit components come with every new object
        if !(descriptor.implicit && matches!(target.object, ObjectRef::Pending(_))) {
            if !self.policy.allow_component_creation {
                self.warn(ResolveWarning::ComponentCreationDisabled {
                    uid: target.uid.clone(),
                    component: descriptor.name.to_string(),
                });
                return;
            }
            self.out.ops.push(target.op(Change::AddComponent {
                component: descriptor.name.to_string(),
            }));
        }

        for (name, wire) in properties {
            let skipped = |reason: &str| ResolveWarning::SkippedNewProperty {
                uid: target.uid.clone(),
                component: descriptor.name.to_string(),
                property: name.clone(),
                reason: reason.to_string(),
            };
            let Some(property) = descriptor.property(name) else {
                self.warn(skipped("no such property"));
                continue;
            };
            if !property.writable {
                self.warn(skipped("property is not writable"));
                continue;
            }
            match codec::decode(&property.ty, wire) {
                Ok(Value::Unsupported) => {
                    tracing::debug!(uid = %target.uid, component = descriptor.name, property = property.name, "skipping unsupported value");
                }
                Ok(new) => self.out.ops.push(target.op(Change::UpdateProperty {
                    component: descriptor.name.to_string(),
                    property: property.name.to_string(),
                    old: None,
                    new,
                    handle: None,
                })),
                Err(e) => self.property_error(PropertyError {
                    uid: target.uid.clone(),
                    component: descriptor.name.to_string(),
                    property: name.clone(),
                    kind: PropertyErrorKind::Codec(e),
                }),
            }
        }
    }

    fn property_error(&mut self, error: PropertyError) {
        tracing::warn!(
            uid = %error.uid,
            component = %error.component,
            property = %error.property,
            "{}",
            error.kind
        );
        self.out.errors.push(error);
    }
}

/// UIDs may arrive as strings or bare numbers
fn uid_from_json(value: &Json) -> Option<Uid> {
    match value {
        Json::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::OpKind;
    use crate::graph::{InstanceId, MemoryScene};
    use glam::Vec3;
    use serde_json::json;

    fn scene_with_lamp() -> (MemoryScene, InstanceId) {
        let mut scene = MemoryScene::default();
        let id = scene.create_object("Lamp", None);
        scene.add_component(id, "Light2D").unwrap();
        (scene, id)
    }

    fn kinds(resolution: &Resolution) -> Vec<OpKind> {
        resolution.ops.iter().map(|op| op.kind()).collect()
    }

    #[test]
    fn test_patch_must_be_object() {
        let scene = MemoryScene::default();
        let mut uids = UidMap::new();
        let err = resolve(&scene, &json!([1, 2]), &mut uids, &ResolvePolicy::default()).unwrap_err();
        assert_eq!(err, ResolveError::NotAnObject);
        assert!(matches!(
            resolve_str(&scene, "{oops", &mut uids, &ResolvePolicy::default()),
            Err(ResolveError::Parse(_))
        ));
    }

    #[test]
    fn test_noop_property_emits_nothing() {
        let (scene, id) = scene_with_lamp();
        let mut uids: UidMap = [("0".to_string(), id)].into_iter().collect();
        let patch = json!({ "0": { "Light2D": { "intensity": 1.0 } } });
        let resolution = resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
        assert!(resolution.ops.is_empty());
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn test_type_name_case_insensitive() {
        let (scene, id) = scene_with_lamp();
        let mut uids: UidMap = [("0".to_string(), id)].into_iter().collect();
        let patch = json!({ "0": { "transform": { "position": [1, 0, 0] } } });
        let resolution = resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
        assert_eq!(resolution.ops.len(), 1);
        assert_eq!(resolution.ops[0].component(), Some("Transform"));
    }

    #[test]
    fn test_unknown_type_skips_section_only() {
        let (scene, id) = scene_with_lamp();
        let mut uids: UidMap = [("0".to_string(), id)].into_iter().collect();
        let patch = json!({ "0": {
            "Hovercraft": { "speed": 3 },
            "Light2D": { "intensity": 4.0 }
        }});
        let resolution = resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
        assert_eq!(kinds(&resolution), vec![OpKind::UpdateProperty]);
        assert!(matches!(
            resolution.warnings[0],
            ResolveWarning::UnknownType { ref component, .. } if component == "Hovercraft"
        ));
    }

    #[test]
    fn test_read_only_property_on_existing_component_is_error() {
        let mut scene = MemoryScene::default();
        let id = scene.create_object("Ball", None);
        scene.add_component(id, "Rigidbody").unwrap();
        let mut uids: UidMap = [("0".to_string(), id)].into_iter().collect();
        let patch = json!({ "0": { "Rigidbody": { "worldCenterOfMass": [0, 1, 0], "mass": 2 } } });
        let resolution = resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
        assert_eq!(resolution.errors.len(), 1);
        assert_eq!(resolution.errors[0].kind, PropertyErrorKind::NotWritable);
        assert_eq!(resolution.ops.len(), 1);
    }

    #[test]
    fn test_bad_property_on_new_component_is_warning() {
        let (scene, id) = scene_with_lamp();
        let mut uids: UidMap = [("0".to_string(), id)].into_iter().collect();
        let patch = json!({ "0": { "SphereCollider": { "diameter": 2, "radius": 1.5 } } });
        let resolution = resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
        assert_eq!(
            kinds(&resolution),
            vec![OpKind::AddComponent, OpKind::UpdateProperty]
        );
        assert!(resolution.errors.is_empty());
        assert!(matches!(
            resolution.warnings[0],
            ResolveWarning::SkippedNewProperty { ref property, .. } if property == "diameter"
        ));
    }

    #[test]
    fn test_codec_failure_reported_per_property() {
        let (scene, id) = scene_with_lamp();
        let mut uids: UidMap = [("0".to_string(), id)].into_iter().collect();
        let patch = json!({ "0": { "Transform": { "position": [1, 2], "localScale": [2, 2, 2] } } });
        let resolution = resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
        assert_eq!(resolution.ops.len(), 1);
        assert!(matches!(resolution.errors[0].kind, PropertyErrorKind::Codec(_)));
    }

    #[test]
    fn test_component_creation_disabled() {
        let (scene, id) = scene_with_lamp();
        let mut uids: UidMap = [("0".to_string(), id)].into_iter().collect();
        let policy = ResolvePolicy {
            allow_component_creation: false,
            ..ResolvePolicy::default()
        };
        let patch = json!({ "0": { "BoxCollider": { "isTrigger": true } } });
        let resolution = resolve(&scene, &patch, &mut uids, &policy).unwrap();
        assert!(resolution.ops.is_empty());
        assert_eq!(resolution.warnings.len(), 1);
    }

    #[test]
    fn test_new_object_transform_needs_no_add() {
        let scene = MemoryScene::default();
        let mut uids = UidMap::new();
        let patch = json!({ "5": { "name": "Marker", "Transform": { "position": [0, 1, 0] } } });
        let resolution = resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
        assert_eq!(
            kinds(&resolution),
            vec![OpKind::CreateObject, OpKind::UpdateProperty]
        );
        assert_eq!(uids.get("5"), Some(&ObjectRef::Pending("5".into())));
    }

    #[test]
    fn test_parent_forward_reference_resolved_first() {
        let scene = MemoryScene::default();
        let mut uids = UidMap::new();
        let patch = json!({
            "child": { "name": "Wheel", "parent": "car" },
            "car": { "name": "Car" }
        });
        let resolution = resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
        assert_eq!(resolution.ops.len(), 2);
        assert_eq!(resolution.ops[0].uid, "car");
        assert_eq!(
            resolution.ops[1].change,
            Change::CreateObject {
                name: "Wheel".into(),
                parent: Some(ObjectRef::Pending("car".into())),
            }
        );
    }

    #[test]
    fn test_parent_cycle_falls_back_to_root() {
        let scene = MemoryScene::default();
        let mut uids = UidMap::new();
        let patch = json!({
            "a": { "name": "A", "parent": "b" },
            "b": { "name": "B", "parent": "a" }
        });
        let resolution = resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
        assert_eq!(resolution.ops.len(), 2);
        assert_eq!(resolution.warnings.len(), 1);
        assert!(matches!(resolution.warnings[0], ResolveWarning::MissingParent { .. }));
    }

    #[test]
    fn test_missing_parent_policies() {
        let scene = MemoryScene::default();
        let patch = json!({ "1": { "name": "Orphan", "parent": "99" } });

        let mut uids = UidMap::new();
        let resolution = resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
        assert_eq!(
            resolution.ops[0].change,
            Change::CreateObject {
                name: "Orphan".into(),
                parent: None
            }
        );

        let strict = ResolvePolicy {
            missing_parent: MissingParentPolicy::Fail,
            ..ResolvePolicy::default()
        };
        let mut uids = UidMap::new();
        assert_eq!(
            resolve(&scene, &patch, &mut uids, &strict),
            Err(ResolveError::MissingParent {
                uid: "1".into(),
                parent: "99".into()
            })
        );
    }

    #[test]
    fn test_live_parent_by_number() {
        let mut scene = MemoryScene::default();
        let root = scene.create_object("Root", None);
        let mut uids: UidMap = [("0".to_string(), root)].into_iter().collect();
        let patch = json!({ "1": { "name": "Leaf", "parent": 0 } });
        let resolution = resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
        assert_eq!(
            resolution.ops[0].change,
            Change::CreateObject {
                name: "Leaf".into(),
                parent: Some(ObjectRef::Live(root))
            }
        );
    }

    #[test]
    fn test_removals() {
        let (mut scene, id) = scene_with_lamp();
        let other = scene.create_object("Other", None);
        let mut uids: UidMap = [("0".to_string(), id), ("1".to_string(), other)]
            .into_iter()
            .collect();
        let patch = json!({
            "0": { "Light2D": null, "Transform": null, "BoxCollider": null },
            "1": null,
            "7": null
        });
        let resolution = resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
        assert_eq!(
            kinds(&resolution),
            vec![OpKind::RemoveComponent, OpKind::RemoveObject]
        );
        // Transform is implicit, BoxCollider absent, "7" unknown
        assert_eq!(resolution.warnings.len(), 3);
    }

    #[test]
    fn test_existing_object_ignores_name_key() {
        let (scene, id) = scene_with_lamp();
        let mut uids: UidMap = [("0".to_string(), id)].into_iter().collect();
        let patch = json!({ "0": { "name": "Renamed", "Transform": { "position": [0, 0, 3] } } });
        let resolution = resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
        assert_eq!(resolution.ops.len(), 1);
        let Change::UpdateProperty { old, new, .. } = &resolution.ops[0].change else {
            panic!("expected property update");
        };
        assert_eq!(old, &Some(Value::Vector3(Vec3::ZERO)));
        assert_eq!(new, &Value::Vector3(Vec3::new(0.0, 0.0, 3.0)));
    }
}
