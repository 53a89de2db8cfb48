//! Best-effort execution of committed operations

use std::collections::HashMap;

use shared::Uid;

use super::{Change, DiffOp};
use crate::error::ApplyFailure;
use crate::graph::{ComponentRef, InstanceId, ObjectRef, SceneGraph, UidMap};

/// Outcome of one apply pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub applied: usize,
    /// Operations that had nothing to act on
    pub skipped: usize,
    pub failures: Vec<ApplyFailure>,
    /// Objects created by this pass, by UID
    pub created: Vec<(Uid, InstanceId)>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Execute `ops` in the given order.
///
/// A failing operation is recorded and skipped; the rest still run.
/// Created objects are registered in `uids` when given.
pub fn apply(graph: &mut impl SceneGraph, ops: &[DiffOp], mut uids: Option<&mut UidMap>) -> ApplyReport {
    let mut applier = Applier {
        graph,
        created: HashMap::new(),
        report: ApplyReport::default(),
    };
    for op in ops {
        applier.apply_one(op, uids.as_deref_mut());
    }

    let report = applier.report;
    tracing::info!(
        applied = report.applied,
        skipped = report.skipped,
        failed = report.failures.len(),
        "applied scene diff"
    );
    report
}

struct Applier<'a, G> {
    graph: &'a mut G,
    created: HashMap<Uid, InstanceId>,
    report: ApplyReport,
}

impl<G: SceneGraph> Applier<'_, G> {
    fn resolve(&self, target: &ObjectRef) -> Option<InstanceId> {
        match target {
            ObjectRef::Live(id) => self.graph.find_object(*id).map(|_| *id),
            ObjectRef::Pending(uid) => self.created.get(uid).copied(),
        }
    }

    fn fail(&mut self, op: &DiffOp, reason: impl Into<String>) {
        let failure = ApplyFailure {
            op: op.to_string(),
            reason: reason.into(),
        };
        tracing::warn!(uid = %op.uid, "{failure}");
        self.report.failures.push(failure);
    }

    fn skip(&mut self, op: &DiffOp, reason: &str) {
        tracing::warn!(uid = %op.uid, op = %op, "skipped: {reason}");
        self.report.skipped += 1;
    }

    fn apply_one(&mut self, op: &DiffOp, uids: Option<&mut UidMap>) {
        match &op.change {
            Change::CreateObject { name, parent } => {
                let parent_id = match parent {
                    Some(p) => {
                        let resolved = self.resolve(p);
                        if resolved.is_none() {
                            tracing::warn!(uid = %op.uid, parent = %p, "parent not available, creating at root");
                        }
                        resolved
                    }
                    None => None,
                };
                let id = self.graph.create_object(name, parent_id);
                self.created.insert(op.uid.clone(), id);
                if let Some(uids) = uids {
                    uids.insert_live(op.uid.clone(), id);
                }
                self.report.created.push((op.uid.clone(), id));
                self.report.applied += 1;
            }
            Change::AddComponent { component } => {
                let Some(id) = self.resolve(&op.target) else {
                    self.fail(op, "object not found");
                    return;
                };
                if self.graph.get_component(id, component).is_some() {
                    self.skip(op, "component already exists");
                    return;
                }
                match self.graph.add_component(id, component) {
                    Ok(_) => self.report.applied += 1,
                    Err(e) => self.fail(op, e.to_string()),
                }
            }
            Change::UpdateProperty {
                component,
                property,
                new,
                handle,
                ..
            } => {
                let Some(target) = self.component_for(op, component, handle.as_ref()) else {
                    self.skip(op, "component not present");
                    return;
                };
                if self.graph.set_property(&target, property, new.clone()) {
                    self.report.applied += 1;
                } else {
                    self.fail(op, "could not set property");
                }
            }
            Change::RemoveComponent { component } => {
                let removed = self
                    .resolve(&op.target)
                    .is_some_and(|id| self.graph.remove_component(id, component));
                if removed {
                    self.report.applied += 1;
                } else {
                    tracing::debug!(uid = %op.uid, component = %component, "nothing to remove");
                    self.report.skipped += 1;
                }
            }
            Change::RemoveObject => {
                let destroyed = self
                    .resolve(&op.target)
                    .is_some_and(|id| self.graph.destroy_object(id));
                if destroyed {
                    if let Some(uids) = uids {
                        uids.remove(&op.uid);
                    }
                    self.report.applied += 1;
                } else {
                    tracing::debug!(uid = %op.uid, "object already gone");
                    self.report.skipped += 1;
                }
            }
        }
    }

    /// The held component if it still exists, otherwise a fresh lookup by type
    fn component_for(&self, op: &DiffOp, component: &str, held: Option<&ComponentRef>) -> Option<ComponentRef> {
        if let Some(held) = held {
            if self.graph.get_component(held.object, &held.component).is_some() {
                return Some(held.clone());
            }
        }
        let id = self.resolve(&op.target)?;
        self.graph.get_component(id, component)
    }
}
