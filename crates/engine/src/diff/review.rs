//! Review and selection of resolved operations.
//!
//! Operations are grouped by object, then by component. Object and
//! component groups carry their own toggles; toggling a group overwrites
//! every toggle beneath it. An operation is *effective* only when its whole
//! ancestor chain is enabled, which includes the `AddComponent` of a
//! component added in the same batch and the `CreateObject` of an object
//! created in the same batch.

use super::{object_label, Change, DiffOp, OpKind};
use crate::graph::ObjectRef;

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentGroup {
    pub component: String,
    pub enabled: bool,
    /// Indices into [`DiffReview::ops`]
    pub ops: Vec<usize>,
    /// The group's `AddComponent`, if the component is added by this batch
    pub add_op: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectGroup {
    pub target: ObjectRef,
    pub label: String,
    pub enabled: bool,
    /// Object-level operations (create / remove)
    pub ops: Vec<usize>,
    pub components: Vec<ComponentGroup>,
    /// The group's `CreateObject`, if the object is created by this batch
    pub create_op: Option<usize>,
}

impl ObjectGroup {
    fn component(&self, name: &str) -> Option<&ComponentGroup> {
        self.components.iter().find(|c| c.component == name)
    }

    fn all_ops(&self) -> impl Iterator<Item = usize> + '_ {
        self.ops
            .iter()
            .copied()
            .chain(self.components.iter().flat_map(|c| c.ops.iter().copied()))
    }
}

/// One review session over a resolved batch
#[derive(Debug, Clone, Default)]
pub struct DiffReview {
    ops: Vec<DiffOp>,
    selected: Vec<bool>,
    groups: Vec<ObjectGroup>,
    /// `(group, component)` position of every op
    location: Vec<(usize, Option<usize>)>,
}

impl DiffReview {
    pub fn new(ops: Vec<DiffOp>) -> Self {
        let ops = super::suppress_noops(ops);
        let mut groups: Vec<ObjectGroup> = Vec::new();
        let mut location = Vec::with_capacity(ops.len());

        for (index, op) in ops.iter().enumerate() {
            let g = match groups.iter().position(|g| g.target == op.target) {
                Some(g) => g,
                None => {
                    groups.push(ObjectGroup {
                        target: op.target.clone(),
                        label: object_label(&op.target, op.object_name.as_deref()),
                        enabled: true,
                        ops: Vec::new(),
                        components: Vec::new(),
                        create_op: None,
                    });
                    groups.len() - 1
                }
            };
            let group = &mut groups[g];

            let Some(component) = op.component() else {
                if op.kind() == OpKind::CreateObject {
                    group.create_op = Some(index);
                }
                group.ops.push(index);
                location.push((g, None));
                continue;
            };

            let c = match group.components.iter().position(|c| c.component == component) {
                Some(c) => c,
                None => {
                    group.components.push(ComponentGroup {
                        component: component.to_string(),
                        enabled: true,
                        ops: Vec::new(),
                        add_op: None,
                    });
                    group.components.len() - 1
                }
            };
            let component_group = &mut group.components[c];
            if op.kind() == OpKind::AddComponent {
                component_group.add_op = Some(index);
            }
            component_group.ops.push(index);
            location.push((g, Some(c)));
        }

        Self {
            selected: vec![true; ops.len()],
            ops,
            groups,
            location,
        }
    }

    pub fn ops(&self) -> &[DiffOp] {
        &self.ops
    }

    pub fn groups(&self) -> &[ObjectGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The user's own toggle, regardless of ancestors
    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.get(index).copied().unwrap_or(false)
    }

    /// Selected and every ancestor enabled
    pub fn is_effective(&self, index: usize) -> bool {
        self.is_selected(index) && self.ancestors_enabled(index)
    }

    pub fn effective_count(&self) -> usize {
        (0..self.ops.len()).filter(|i| self.is_effective(*i)).count()
    }

    fn ancestors_enabled(&self, index: usize) -> bool {
        let Some(&(g, c)) = self.location.get(index) else {
            return false;
        };
        let group = &self.groups[g];
        if !group.enabled {
            return false;
        }
        if let Some(create) = group.create_op.filter(|create| *create != index) {
            if !self.is_effective(create) {
                return false;
            }
        }
        if let Some(c) = c {
            let component = &group.components[c];
            if !component.enabled {
                return false;
            }
            if let Some(add) = component.add_op.filter(|add| *add != index) {
                if !self.is_selected(add) {
                    return false;
                }
            }
        }
        self.parent_enabled(index)
    }

    /// A created child needs its created parent
    fn parent_enabled(&self, index: usize) -> bool {
        let Change::CreateObject {
            parent: Some(parent @ ObjectRef::Pending(_)),
            ..
        } = &self.ops[index].change
        else {
            return true;
        };
        match self
            .groups
            .iter()
            .find(|g| &g.target == parent)
            .and_then(|g| g.create_op)
        {
            Some(create) => self.is_effective(create),
            None => true,
        }
    }

    /// Toggle an object group, overwriting everything beneath it
    pub fn set_object_enabled(&mut self, target: &ObjectRef, enabled: bool) -> bool {
        let Some(g) = self.groups.iter().position(|g| &g.target == target) else {
            return false;
        };
        let group = &mut self.groups[g];
        group.enabled = enabled;
        for component in &mut group.components {
            component.enabled = enabled;
        }
        let indices: Vec<usize> = group.all_ops().collect();
        for i in indices {
            self.selected[i] = enabled;
        }
        true
    }

    /// Toggle a component group and its operations. Enabling is refused
    /// while the owning object is disabled.
    pub fn set_component_enabled(&mut self, target: &ObjectRef, component: &str, enabled: bool) -> bool {
        let Some(g) = self.groups.iter().position(|g| &g.target == target) else {
            return false;
        };
        if enabled && !self.object_chain_enabled(g) {
            return false;
        }
        let Some(group) = self.groups[g]
            .components
            .iter_mut()
            .find(|c| c.component == component)
        else {
            return false;
        };
        group.enabled = enabled;
        let indices = group.ops.clone();
        for i in indices {
            self.selected[i] = enabled;
        }
        true
    }

    /// Toggle one operation. Enabling is refused while an ancestor is disabled.
    pub fn set_op_enabled(&mut self, index: usize, enabled: bool) -> bool {
        if index >= self.ops.len() {
            return false;
        }
        if enabled && !self.ancestors_enabled(index) {
            tracing::debug!(op = %self.ops[index], "cannot enable, an ancestor is disabled");
            return false;
        }
        self.selected[index] = enabled;
        true
    }

    pub fn set_all(&mut self, enabled: bool) {
        let targets: Vec<ObjectRef> = self.groups.iter().map(|g| g.target.clone()).collect();
        for target in targets {
            self.set_object_enabled(&target, enabled);
        }
    }

    fn object_chain_enabled(&self, g: usize) -> bool {
        let group = &self.groups[g];
        group.enabled && group.create_op.map_or(true, |create| self.is_effective(create))
    }

    pub fn component_group(&self, target: &ObjectRef, component: &str) -> Option<&ComponentGroup> {
        self.groups
            .iter()
            .find(|g| &g.target == target)
            .and_then(|g| g.component(component))
    }

    /// Effective operations in execution order: structural creation,
    /// property writes, removals. Ties keep discovery order.
    pub fn commit(self) -> Vec<DiffOp> {
        let mut ops: Vec<DiffOp> = self
            .ops
            .iter()
            .enumerate()
            .filter(|(i, _)| self.is_effective(*i))
            .map(|(_, op)| op.clone())
            .collect();
        ops.sort_by_key(|op| op.kind().phase());
        tracing::info!(committed = ops.len(), total = self.ops.len(), "committed diff review");
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Value;
    use crate::graph::InstanceId;

    fn op(uid: &str, target: ObjectRef, change: Change) -> DiffOp {
        DiffOp {
            uid: uid.into(),
            target,
            object_name: Some("Obj".into()),
            change,
        }
    }

    fn set(component: &str, property: &str, new: Value) -> Change {
        Change::UpdateProperty {
            component: component.into(),
            property: property.into(),
            old: None,
            new,
            handle: None,
        }
    }

    fn collider_batch() -> DiffReview {
        let live = ObjectRef::Live(InstanceId(1));
        DiffReview::new(vec![
            op(
                "0",
                live.clone(),
                Change::AddComponent {
                    component: "BoxCollider".into(),
                },
            ),
            op("0", live.clone(), set("BoxCollider", "isTrigger", Value::Bool(true))),
            op("0", live, set("Transform", "localScale", Value::Float(2.0))),
        ])
    }

    #[test]
    fn test_grouping() {
        let review = collider_batch();
        assert_eq!(review.groups().len(), 1);
        let group = &review.groups()[0];
        assert_eq!(group.label, "Obj");
        assert_eq!(group.components.len(), 2);
        assert_eq!(group.components[0].add_op, Some(0));
        assert_eq!(group.components[1].add_op, None);
    }

    #[test]
    fn test_disabled_add_component_gates_updates() {
        let mut review = collider_batch();
        assert!(review.set_op_enabled(0, false));
        assert!(review.is_selected(1));
        assert!(!review.is_effective(1));
        assert!(!review.set_op_enabled(1, true));
        assert!(review.is_effective(2));

        assert!(review.set_op_enabled(0, true));
        assert!(review.is_effective(1));
    }

    #[test]
    fn test_object_toggle_cascades() {
        let mut review = collider_batch();
        let target = ObjectRef::Live(InstanceId(1));
        assert!(review.set_object_enabled(&target, false));
        assert_eq!(review.effective_count(), 0);
        assert!(!review.set_component_enabled(&target, "Transform", true));
        assert!(!review.set_op_enabled(2, true));

        assert!(review.set_object_enabled(&target, true));
        assert_eq!(review.effective_count(), 3);
    }

    #[test]
    fn test_component_toggle_cascades() {
        let mut review = collider_batch();
        let target = ObjectRef::Live(InstanceId(1));
        assert!(review.set_component_enabled(&target, "BoxCollider", false));
        assert!(!review.is_selected(0));
        assert!(!review.is_selected(1));
        assert!(review.is_effective(2));
        assert!(!review.component_group(&target, "BoxCollider").unwrap().enabled);
    }

    #[test]
    fn test_created_object_gates_everything() {
        let pending = ObjectRef::Pending("1".into());
        let mut review = DiffReview::new(vec![
            op(
                "1",
                pending.clone(),
                Change::CreateObject {
                    name: "Enemy".into(),
                    parent: None,
                },
            ),
            op("1", pending.clone(), set("Transform", "position", Value::Null)),
        ]);
        assert_eq!(review.groups()[0].label, "(New Object: 1)");
        assert!(review.set_op_enabled(0, false));
        assert!(!review.is_effective(1));
        assert!(!review.set_component_enabled(&pending, "Transform", true));
    }

    #[test]
    fn test_created_child_needs_created_parent() {
        let parent = ObjectRef::Pending("p".into());
        let child = ObjectRef::Pending("c".into());
        let mut review = DiffReview::new(vec![
            op(
                "p",
                parent.clone(),
                Change::CreateObject {
                    name: "Car".into(),
                    parent: None,
                },
            ),
            op(
                "c",
                child,
                Change::CreateObject {
                    name: "Wheel".into(),
                    parent: Some(parent.clone()),
                },
            ),
        ]);
        review.set_object_enabled(&parent, false);
        assert!(!review.is_effective(1));
        assert!(review.commit().is_empty());
    }

    #[test]
    fn test_commit_orders_by_phase_stably() {
        let live = ObjectRef::Live(InstanceId(1));
        let pending = ObjectRef::Pending("2".into());
        let review = DiffReview::new(vec![
            op("0", live.clone(), set("Light", "intensity", Value::Float(2.0))),
            op(
                "0",
                live.clone(),
                Change::RemoveComponent {
                    component: "Rigidbody".into(),
                },
            ),
            op(
                "2",
                pending.clone(),
                Change::CreateObject {
                    name: "New".into(),
                    parent: None,
                },
            ),
            op(
                "2",
                pending,
                Change::AddComponent {
                    component: "Light".into(),
                },
            ),
            op("0", live, set("Light", "range", Value::Float(5.0))),
        ]);
        let kinds: Vec<OpKind> = review.commit().iter().map(|op| op.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                OpKind::CreateObject,
                OpKind::AddComponent,
                OpKind::UpdateProperty,
                OpKind::UpdateProperty,
                OpKind::RemoveComponent,
            ]
        );
    }

    #[test]
    fn test_noops_filtered_on_construction() {
        let live = ObjectRef::Live(InstanceId(1));
        let review = DiffReview::new(vec![op(
            "0",
            live,
            Change::UpdateProperty {
                component: "Light".into(),
                property: "range".into(),
                old: Some(Value::Float(5.0)),
                new: Value::Float(5.0),
                handle: None,
            },
        )]);
        assert!(review.is_empty());
    }
}
