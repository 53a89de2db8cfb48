//! Object graph accessor.
//!
//! [`SceneGraph`] is the only way the diff pipeline touches a scene: find
//! objects, resolve component types by name, read and write properties by
//! name, add/remove components, create/destroy objects. Hosts implement it
//! over their own scene; [`MemoryScene`] is the in-process implementation.

pub mod memory;
pub mod registry;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use shared::Uid;

use crate::codec::Value;

pub use memory::MemoryScene;
pub use registry::{ComponentDescriptor, PropertyDescriptor, TypeRegistry};

/// Stable identity of a live object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub i64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A component on a live object, addressed by its canonical type name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentRef {
    pub object: InstanceId,
    pub component: String,
}

/// Object-level data read from the graph
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub id: InstanceId,
    pub name: String,
    pub active: bool,
    pub tag: String,
    pub layer: i32,
    pub parent: Option<InstanceId>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("object {0} not found")]
    ObjectNotFound(InstanceId),
    #[error("unknown component type '{0}'")]
    UnknownType(String),
}

/// Accessor over a mutable scene with name-based typing.
///
/// Component type arguments are canonical names as returned by
/// [`SceneGraph::find_type`]. Failures never panic: lookups return `None`,
/// mutations return `false` or a [`GraphError`].
pub trait SceneGraph {
    fn registry(&self) -> &TypeRegistry;

    /// Resolve a short, qualified or aliased type name; first match wins
    fn find_type(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.registry().find_type(name)
    }

    fn find_object(&self, id: InstanceId) -> Option<ObjectInfo>;

    /// Every object, depth-first in hierarchy order
    fn all_objects(&self) -> Vec<InstanceId>;

    fn children(&self, id: InstanceId) -> Vec<InstanceId>;

    /// Canonical type names of the components on `id`, implicit ones included
    fn component_types(&self, id: InstanceId) -> Vec<String>;

    fn get_component(&self, id: InstanceId, component: &str) -> Option<ComponentRef>;

    /// Add a component; returns the existing one if already present
    fn add_component(&mut self, id: InstanceId, component: &str) -> Result<ComponentRef, GraphError>;

    fn remove_component(&mut self, id: InstanceId, component: &str) -> bool;

    /// Create an object; a missing parent places it at the root
    fn create_object(&mut self, name: &str, parent: Option<InstanceId>) -> InstanceId;

    /// Destroy an object and its children
    fn destroy_object(&mut self, id: InstanceId) -> bool;

    fn set_parent(&mut self, id: InstanceId, parent: Option<InstanceId>) -> bool;

    fn get_property(&self, component: &ComponentRef, property: &str) -> Option<Value>;

    /// Write a property. Returns `false` for missing, read-only or
    /// mistyped properties instead of failing.
    fn set_property(&mut self, component: &ComponentRef, property: &str, value: Value) -> bool;
}

/// An object a UID points at: live, or still to be created by the current batch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Live(InstanceId),
    Pending(Uid),
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRef::Live(id) => write!(f, "{id}"),
            ObjectRef::Pending(uid) => write!(f, "(New Object: {uid})"),
        }
    }
}

/// Address space of one diff: UID to object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UidMap {
    entries: BTreeMap<Uid, ObjectRef>,
}

impl UidMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uid: &str) -> Option<&ObjectRef> {
        self.entries.get(uid)
    }

    /// The live instance behind `uid`, if it has one
    pub fn live(&self, uid: &str) -> Option<InstanceId> {
        match self.entries.get(uid) {
            Some(ObjectRef::Live(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.entries.contains_key(uid)
    }

    pub fn insert(&mut self, uid: impl Into<Uid>, object: ObjectRef) -> Option<ObjectRef> {
        self.entries.insert(uid.into(), object)
    }

    pub fn insert_live(&mut self, uid: impl Into<Uid>, id: InstanceId) {
        self.entries.insert(uid.into(), ObjectRef::Live(id));
    }

    pub fn remove(&mut self, uid: &str) -> Option<ObjectRef> {
        self.entries.remove(uid)
    }

    /// Reverse lookup of a live instance
    pub fn uid_of(&self, id: InstanceId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, r)| **r == ObjectRef::Live(id))
            .map(|(uid, _)| uid.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ObjectRef)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(Uid, InstanceId)> for UidMap {
    fn from_iter<T: IntoIterator<Item = (Uid, InstanceId)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(uid, id)| (uid, ObjectRef::Live(id)))
                .collect(),
        }
    }
}
