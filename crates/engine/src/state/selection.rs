use crate::graph::{InstanceId, SceneGraph};

/// Object selection state (supports multi-select)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    /// Selected object IDs (in order of selection)
    selected: Vec<InstanceId>,
}

impl SelectionState {
    /// Primary (first) selected object
    pub fn primary(&self) -> Option<InstanceId> {
        self.selected.first().copied()
    }

    /// All selected objects
    pub fn all(&self) -> &[InstanceId] {
        &self.selected
    }

    pub fn is_selected(&self, id: InstanceId) -> bool {
        self.selected.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Replace the selection with a single object
    pub fn select(&mut self, id: InstanceId) {
        self.selected.clear();
        self.selected.push(id);
    }

    /// Add to the selection, keeping order
    pub fn add(&mut self, id: InstanceId) {
        if !self.is_selected(id) {
            self.selected.push(id);
        }
    }

    /// Toggle selection (for shift-click multi-select)
    pub fn toggle(&mut self, id: InstanceId) {
        if let Some(pos) = self.selected.iter().position(|s| *s == id) {
            self.selected.remove(pos);
        } else {
            self.selected.push(id);
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Drop objects that no longer exist
    pub fn retain_existing(&mut self, graph: &impl SceneGraph) {
        self.selected.retain(|id| graph.find_object(*id).is_some());
    }
}

impl FromIterator<InstanceId> for SelectionState {
    fn from_iter<T: IntoIterator<Item = InstanceId>>(iter: T) -> Self {
        let mut selection = Self::default();
        for id in iter {
            selection.add(id);
        }
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryScene;

    #[test]
    fn test_toggle_and_order() {
        let mut sel = SelectionState::default();
        sel.toggle(InstanceId(3));
        sel.toggle(InstanceId(1));
        sel.add(InstanceId(3));
        assert_eq!(sel.all(), &[InstanceId(3), InstanceId(1)]);
        assert_eq!(sel.primary(), Some(InstanceId(3)));
        sel.toggle(InstanceId(3));
        assert_eq!(sel.all(), &[InstanceId(1)]);
        sel.select(InstanceId(9));
        assert_eq!(sel.all(), &[InstanceId(9)]);
    }

    #[test]
    fn test_retain_existing() {
        let mut scene = MemoryScene::default();
        let a = scene.create_object("A", None);
        let b = scene.create_object("B", None);
        let mut sel: SelectionState = [a, b].into_iter().collect();
        scene.destroy_object(a);
        sel.retain_existing(&scene);
        assert_eq!(sel.all(), &[b]);
    }
}
