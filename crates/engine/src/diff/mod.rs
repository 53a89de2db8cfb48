//! Scene diff operations.
//!
//! A patch proposed by the model is resolved into [`DiffOp`]s
//! ([`resolver`]), reviewed and filtered by the user ([`review`]), then
//! executed best-effort against the scene ([`applier`]).

pub mod applier;
pub mod resolver;
pub mod review;

use std::fmt;

use shared::Uid;

use crate::codec::{self, Value};
use crate::graph::{ComponentRef, ObjectRef};

pub use applier::{apply, ApplyReport};
pub use resolver::{resolve, resolve_str, MissingParentPolicy, Resolution, ResolvePolicy};
pub use review::{ComponentGroup, DiffReview, ObjectGroup};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    CreateObject,
    RemoveObject,
    AddComponent,
    RemoveComponent,
    UpdateProperty,
}

/// How an operation is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeClass {
    Added,
    Removed,
    Modified,
}

struct KindInfo {
    /// Data-model rank: objects, then components, then properties
    priority: u8,
    /// Execution order at commit
    phase: u8,
    label: &'static str,
    class: ChangeClass,
}

// indexed by `OpKind as usize`
const KINDS: [KindInfo; 5] = [
    KindInfo { priority: 0, phase: 0, label: "CreateObject", class: ChangeClass::Added },
    KindInfo { priority: 0, phase: 4, label: "RemoveObject", class: ChangeClass::Removed },
    KindInfo { priority: 1, phase: 1, label: "AddComponent", class: ChangeClass::Added },
    KindInfo { priority: 1, phase: 3, label: "RemoveComponent", class: ChangeClass::Removed },
    KindInfo { priority: 2, phase: 2, label: "UpdateProperty", class: ChangeClass::Modified },
];

impl OpKind {
    fn info(self) -> &'static KindInfo {
        &KINDS[self as usize]
    }

    pub fn priority(self) -> u8 {
        self.info().priority
    }

    /// Structural creation, then property writes, then removals
    pub fn phase(self) -> u8 {
        self.info().phase
    }

    pub fn label(self) -> &'static str {
        self.info().label
    }

    pub fn class(self) -> ChangeClass {
        self.info().class
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    CreateObject {
        name: String,
        parent: Option<ObjectRef>,
    },
    RemoveObject,
    AddComponent {
        component: String,
    },
    RemoveComponent {
        component: String,
    },
    UpdateProperty {
        component: String,
        property: String,
        /// `None` when there was nothing to read (component not yet added)
        old: Option<Value>,
        new: Value,
        /// Component resolved at diff time, if it already existed
        handle: Option<ComponentRef>,
    },
}

/// One atomic change to the scene
#[derive(Debug, Clone, PartialEq)]
pub struct DiffOp {
    pub uid: Uid,
    pub target: ObjectRef,
    /// Name of the object when the diff was resolved
    pub object_name: Option<String>,
    pub change: Change,
}

impl DiffOp {
    pub fn kind(&self) -> OpKind {
        match self.change {
            Change::CreateObject { .. } => OpKind::CreateObject,
            Change::RemoveObject => OpKind::RemoveObject,
            Change::AddComponent { .. } => OpKind::AddComponent,
            Change::RemoveComponent { .. } => OpKind::RemoveComponent,
            Change::UpdateProperty { .. } => OpKind::UpdateProperty,
        }
    }

    pub fn component(&self) -> Option<&str> {
        match &self.change {
            Change::AddComponent { component }
            | Change::RemoveComponent { component }
            | Change::UpdateProperty { component, .. } => Some(component.as_str()),
            Change::CreateObject { .. } | Change::RemoveObject => None,
        }
    }

    /// Same old and new values, neither of them null
    pub fn is_noop(&self) -> bool {
        match &self.change {
            Change::UpdateProperty {
                old: Some(old),
                new,
                ..
            } => !old.is_null() && !new.is_null() && old.same_as(new),
            _ => false,
        }
    }

    /// Label of the owning object for grouping
    pub fn object_label(&self) -> String {
        object_label(&self.target, self.object_name.as_deref())
    }
}

pub fn object_label(target: &ObjectRef, name: Option<&str>) -> String {
    match (target, name) {
        (ObjectRef::Pending(_), _) => target.to_string(),
        (ObjectRef::Live(_), Some(name)) => name.to_string(),
        (ObjectRef::Live(id), None) => format!("(Missing Object {id})"),
    }
}

fn describe(value: Option<&Value>) -> String {
    value.map_or_else(|| "null".to_string(), |v| codec::encode(v).to_string())
}

impl fmt::Display for DiffOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.kind().label();
        let object = self.object_label();
        match &self.change {
            Change::CreateObject { name, parent } => {
                write!(f, "{label}: {name}")?;
                match parent {
                    Some(ObjectRef::Pending(uid)) => write!(f, " under (New Object: {uid})"),
                    Some(ObjectRef::Live(id)) => write!(f, " under {id}"),
                    None => Ok(()),
                }
            }
            Change::RemoveObject => write!(f, "{label}: {object}"),
            Change::AddComponent { component } => write!(f, "{label}: {component} to {object}"),
            Change::RemoveComponent { component } => {
                write!(f, "{label}: {component} from {object}")
            }
            Change::UpdateProperty {
                component,
                property,
                old,
                new,
                ..
            } => write!(
                f,
                "{label}: {component}.{property} on {object}: {} -> {}",
                describe(old.as_ref()),
                describe(Some(new)),
            ),
        }
    }
}

/// Drop property updates that would not change anything
pub fn suppress_noops(ops: Vec<DiffOp>) -> Vec<DiffOp> {
    ops.into_iter()
        .filter(|op| {
            let noop = op.is_noop();
            if noop {
                tracing::debug!(uid = %op.uid, op = %op, "dropping no-op change");
            }
            !noop
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InstanceId;

    fn update(old: Option<Value>, new: Value) -> DiffOp {
        DiffOp {
            uid: "0".into(),
            target: ObjectRef::Live(InstanceId(1)),
            object_name: Some("Lamp".into()),
            change: Change::UpdateProperty {
                component: "Light".into(),
                property: "intensity".into(),
                old,
                new,
                handle: None,
            },
        }
    }

    #[test]
    fn test_kind_table() {
        assert_eq!(OpKind::CreateObject.priority(), 0);
        assert_eq!(OpKind::RemoveComponent.priority(), 1);
        assert_eq!(OpKind::UpdateProperty.priority(), 2);
        assert!(OpKind::AddComponent.phase() < OpKind::UpdateProperty.phase());
        assert!(OpKind::UpdateProperty.phase() < OpKind::RemoveComponent.phase());
        assert!(OpKind::RemoveComponent.phase() < OpKind::RemoveObject.phase());
        assert_eq!(OpKind::RemoveObject.class(), ChangeClass::Removed);
    }

    #[test]
    fn test_noop_requires_non_null_equal_values() {
        assert!(update(Some(Value::Float(1.0)), Value::Float(1.0)).is_noop());
        assert!(!update(Some(Value::Float(1.0)), Value::Float(2.0)).is_noop());
        assert!(!update(None, Value::Float(1.0)).is_noop());
        assert!(!update(Some(Value::Null), Value::Null).is_noop());
        let kept = suppress_noops(vec![
            update(Some(Value::Float(1.0)), Value::Float(1.0)),
            update(Some(Value::Float(1.0)), Value::Float(3.0)),
        ]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_display_labels() {
        let add = DiffOp {
            uid: "1".into(),
            target: ObjectRef::Pending("1".into()),
            object_name: Some("Enemy".into()),
            change: Change::AddComponent {
                component: "BoxCollider".into(),
            },
        };
        assert_eq!(add.to_string(), "AddComponent: BoxCollider to (New Object: 1)");
        assert_eq!(
            update(Some(Value::Float(1.0)), Value::Float(2.0)).to_string(),
            "UpdateProperty: Light.intensity on Lamp: 1.0 -> 2.0"
        );
        let missing = DiffOp {
            object_name: None,
            ..update(None, Value::Bool(true))
        };
        assert_eq!(missing.object_label(), "(Missing Object 1)");
    }
}
