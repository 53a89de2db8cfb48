//! In-memory scene graph

use std::collections::{BTreeMap, HashMap};

use super::{ComponentRef, GraphError, InstanceId, ObjectInfo, SceneGraph, TypeRegistry};
use crate::codec::Value;

#[derive(Debug, Clone)]
struct ComponentData {
    type_name: &'static str,
    values: BTreeMap<&'static str, Value>,
}

#[derive(Debug, Clone)]
struct SceneObject {
    name: String,
    active: bool,
    tag: String,
    layer: i32,
    parent: Option<InstanceId>,
    children: Vec<InstanceId>,
    components: Vec<ComponentData>,
}

/// Scene held entirely in memory, one component per type per object
#[derive(Debug, Clone)]
pub struct MemoryScene {
    registry: TypeRegistry,
    objects: HashMap<InstanceId, SceneObject>,
    roots: Vec<InstanceId>,
    next_id: i64,
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new(TypeRegistry::builtin())
    }
}

impl MemoryScene {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            objects: HashMap::new(),
            roots: Vec::new(),
            next_id: 1000,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn roots(&self) -> &[InstanceId] {
        &self.roots
    }

    /// First object with this name, depth-first
    pub fn find_by_name(&self, name: &str) -> Option<InstanceId> {
        self.all_objects()
            .into_iter()
            .find(|id| self.objects.get(id).is_some_and(|o| o.name == name))
    }

    pub fn set_active(&mut self, id: InstanceId, active: bool) -> bool {
        self.with_object(id, |o| o.active = active)
    }

    pub fn set_tag(&mut self, id: InstanceId, tag: &str) -> bool {
        self.with_object(id, |o| o.tag = tag.to_string())
    }

    pub fn set_layer(&mut self, id: InstanceId, layer: i32) -> bool {
        self.with_object(id, |o| o.layer = layer)
    }

    pub fn rename(&mut self, id: InstanceId, name: &str) -> bool {
        self.with_object(id, |o| o.name = name.to_string())
    }

    fn with_object(&mut self, id: InstanceId, f: impl FnOnce(&mut SceneObject)) -> bool {
        match self.objects.get_mut(&id) {
            Some(object) => {
                f(object);
                true
            }
            None => false,
        }
    }

    fn component(&self, component: &ComponentRef) -> Option<&ComponentData> {
        self.objects
            .get(&component.object)?
            .components
            .iter()
            .find(|c| c.type_name == component.component)
    }

    fn detach(&mut self, id: InstanceId) {
        let parent = self.objects.get(&id).and_then(|o| o.parent);
        let siblings = match parent.and_then(|p| self.objects.get_mut(&p)) {
            Some(p) => &mut p.children,
            None => &mut self.roots,
        };
        siblings.retain(|c| *c != id);
    }

    fn attach(&mut self, id: InstanceId, parent: Option<InstanceId>) {
        let parent = parent.filter(|p| self.objects.contains_key(p));
        match parent.and_then(|p| self.objects.get_mut(&p)) {
            Some(p) => p.children.push(id),
            None => self.roots.push(id),
        }
        if let Some(object) = self.objects.get_mut(&id) {
            object.parent = parent;
        }
    }

    fn is_descendant(&self, id: InstanceId, ancestor: InstanceId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.objects.get(&c).and_then(|o| o.parent);
        }
        false
    }

    fn new_component(&self, type_name: &str) -> Option<ComponentData> {
        let descriptor = self.registry.find_type(type_name)?;
        Some(ComponentData {
            type_name: descriptor.name,
            values: descriptor
                .properties
                .iter()
                .map(|p| (p.name, p.default.clone()))
                .collect(),
        })
    }

    fn collect_depth_first(&self, id: InstanceId, out: &mut Vec<InstanceId>) {
        out.push(id);
        if let Some(object) = self.objects.get(&id) {
            for child in &object.children {
                self.collect_depth_first(*child, out);
            }
        }
    }
}

impl SceneGraph for MemoryScene {
    fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    fn find_object(&self, id: InstanceId) -> Option<ObjectInfo> {
        self.objects.get(&id).map(|o| ObjectInfo {
            id,
            name: o.name.clone(),
            active: o.active,
            tag: o.tag.clone(),
            layer: o.layer,
            parent: o.parent,
        })
    }

    fn all_objects(&self) -> Vec<InstanceId> {
        let mut out = Vec::with_capacity(self.objects.len());
        for root in &self.roots {
            self.collect_depth_first(*root, &mut out);
        }
        out
    }

    fn children(&self, id: InstanceId) -> Vec<InstanceId> {
        self.objects
            .get(&id)
            .map(|o| o.children.clone())
            .unwrap_or_default()
    }

    fn component_types(&self, id: InstanceId) -> Vec<String> {
        self.objects
            .get(&id)
            .map(|o| o.components.iter().map(|c| c.type_name.to_string()).collect())
            .unwrap_or_default()
    }

    fn get_component(&self, id: InstanceId, component: &str) -> Option<ComponentRef> {
        let name = self.registry.find_type(component)?.name;
        self.objects
            .get(&id)?
            .components
            .iter()
            .any(|c| c.type_name == name)
            .then(|| ComponentRef {
                object: id,
                component: name.to_string(),
            })
    }

    fn add_component(&mut self, id: InstanceId, component: &str) -> Result<ComponentRef, GraphError> {
        if !self.objects.contains_key(&id) {
            return Err(GraphError::ObjectNotFound(id));
        }
        if let Some(existing) = self.get_component(id, component) {
            return Ok(existing);
        }
        let data = self
            .new_component(component)
            .ok_or_else(|| GraphError::UnknownType(component.to_string()))?;
        let name = data.type_name;
        self.objects
            .get_mut(&id)
            .ok_or(GraphError::ObjectNotFound(id))?
            .components
            .push(data);
        Ok(ComponentRef {
            object: id,
            component: name.to_string(),
        })
    }

    fn remove_component(&mut self, id: InstanceId, component: &str) -> bool {
        let Some(descriptor) = self.registry.find_type(component) else {
            return false;
        };
        if descriptor.implicit {
            return false;
        }
        let name = descriptor.name;
        let Some(object) = self.objects.get_mut(&id) else {
            return false;
        };
        let before = object.components.len();
        object.components.retain(|c| c.type_name != name);
        object.components.len() != before
    }

    fn create_object(&mut self, name: &str, parent: Option<InstanceId>) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        let components = self
            .registry
            .implicit_types()
            .filter_map(|t| self.new_component(t.name))
            .collect();
        self.objects.insert(
            id,
            SceneObject {
                name: name.to_string(),
                active: true,
                tag: "Untagged".to_string(),
                layer: 0,
                parent: None,
                children: Vec::new(),
                components,
            },
        );
        self.attach(id, parent);
        id
    }

    fn destroy_object(&mut self, id: InstanceId) -> bool {
        if !self.objects.contains_key(&id) {
            return false;
        }
        self.detach(id);
        let mut doomed = Vec::new();
        self.collect_depth_first(id, &mut doomed);
        for d in doomed {
            self.objects.remove(&d);
        }
        true
    }

    fn set_parent(&mut self, id: InstanceId, parent: Option<InstanceId>) -> bool {
        if !self.objects.contains_key(&id) {
            return false;
        }
        if let Some(p) = parent {
            if !self.objects.contains_key(&p) || self.is_descendant(p, id) {
                return false;
            }
        }
        self.detach(id);
        self.attach(id, parent);
        true
    }

    fn get_property(&self, component: &ComponentRef, property: &str) -> Option<Value> {
        let name = self.registry.find_type(&component.component)?.property(property)?.name;
        self.component(component)?.values.get(name).cloned()
    }

    fn set_property(&mut self, component: &ComponentRef, property: &str, value: Value) -> bool {
        let Some(descriptor) = self
            .registry
            .find_type(&component.component)
            .and_then(|t| t.property(property))
        else {
            return false;
        };
        if !descriptor.writable || !descriptor.ty.accepts(&value) {
            return false;
        }
        let name = descriptor.name;
        let Some(data) = self
            .objects
            .get_mut(&component.object)
            .and_then(|o| o.components.iter_mut().find(|c| c.type_name == component.component))
        else {
            return false;
        };
        data.values.insert(name, value);
        true
    }
}
