//! Scene snapshot serializer.
//!
//! Produces the UID-keyed JSON document sent to the model along with the
//! [`UidMap`] that resolves those UIDs when the reply comes back.

use serde_json::{json, Map, Value as Json};

use crate::codec::{self, Value};
use crate::graph::{InstanceId, SceneGraph, UidMap};

/// Serialize `objects`, assigning each its index as UID.
///
/// Objects that no longer exist are skipped without shifting later UIDs.
pub fn serialize(graph: &impl SceneGraph, objects: &[InstanceId]) -> (UidMap, Json) {
    let mut uids = UidMap::new();
    let mut doc = Map::new();
    for (index, id) in objects.iter().enumerate() {
        let Some(entry) = serialize_object(graph, *id) else {
            tracing::warn!(instance_id = %id, "selected object no longer exists");
            continue;
        };
        let uid = index.to_string();
        uids.insert_live(uid.clone(), *id);
        doc.insert(uid, entry);
    }
    (uids, Json::Object(doc))
}

fn serialize_object(graph: &impl SceneGraph, id: InstanceId) -> Option<Json> {
    let info = graph.find_object(id)?;

    let transform = graph.get_component(id, "Transform");
    let read = |property: &str, fallback: Json| {
        transform
            .as_ref()
            .and_then(|t| graph.get_property(t, property))
            .map(|v| codec::encode(&v))
            .filter(|v| !v.is_null())
            .unwrap_or(fallback)
    };

    let components: Vec<Json> = graph
        .component_types(id)
        .iter()
        .filter_map(|name| graph.find_type(name))
        .filter(|descriptor| !descriptor.implicit)
        .filter_map(|descriptor| {
            let component = graph.get_component(id, descriptor.name)?;
            let properties: Map<String, Json> = descriptor
                .serializable_properties()
                .filter_map(|p| {
                    let value = graph.get_property(&component, p.name)?;
                    if matches!(value, Value::Null | Value::Unsupported) {
                        return None;
                    }
                    let wire = codec::encode(&value);
                    (!wire.is_null()).then(|| (p.name.to_string(), wire))
                })
                .collect();
            Some(json!({ "type": descriptor.name, "properties": properties }))
        })
        .collect();

    Some(json!({
        "name": info.name,
        "active": info.active,
        "tag": info.tag,
        "layer": info.layer,
        "transform": {
            "position": read("position", json!([0.0, 0.0, 0.0])),
            "rotation": read("rotation", json!([0.0, 0.0, 0.0])),
            "scale": read("localScale", json!([1.0, 1.0, 1.0])),
        },
        "components": components,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryScene;
    use glam::Vec3;

    #[test]
    fn test_uids_follow_input_order() {
        let mut scene = MemoryScene::default();
        let a = scene.create_object("A", None);
        let b = scene.create_object("B", None);
        let (uids, doc) = serialize(&scene, &[b, a]);
        assert_eq!(uids.live("0"), Some(b));
        assert_eq!(uids.live("1"), Some(a));
        assert_eq!(doc["0"]["name"], "B");
        assert_eq!(doc["1"]["name"], "A");
    }

    #[test]
    fn test_transform_block() {
        let mut scene = MemoryScene::default();
        let id = scene.create_object("Player", None);
        let t = scene.get_component(id, "Transform").unwrap();
        scene.set_property(&t, "position", Value::Vector3(Vec3::new(1.0, 2.5, -3.0)));
        let (_, doc) = serialize(&scene, &[id]);
        let transform = &doc["0"]["transform"];
        assert_eq!(transform["position"], json!([1.0, 2.5, -3.0]));
        assert_eq!(transform["rotation"], json!([0.0, 0.0, 0.0]));
        assert_eq!(transform["scale"], json!([1.0, 1.0, 1.0]));
    }

    #[test]
    fn test_components_exclude_transform_and_unserializable() {
        let mut scene = MemoryScene::default();
        let id = scene.create_object("Ball", None);
        scene.add_component(id, "Rigidbody").unwrap();
        scene.add_component(id, "SpriteRenderer").unwrap();
        let (_, doc) = serialize(&scene, &[id]);
        let components = doc["0"]["components"].as_array().unwrap();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0]["type"], "Rigidbody");

        let body = &components[0]["properties"];
        assert_eq!(body["mass"], json!(1.0));
        assert!(body.get("worldCenterOfMass").is_none());
        assert!(body.get("sleepVelocity").is_none());
        assert!(components[1]["properties"].get("sprite").is_none());
    }

    #[test]
    fn test_missing_object_keeps_index() {
        let mut scene = MemoryScene::default();
        let a = scene.create_object("A", None);
        let (uids, doc) = serialize(&scene, &[InstanceId(-1), a]);
        assert!(!uids.contains("0"));
        assert_eq!(uids.live("1"), Some(a));
        assert_eq!(doc.as_object().unwrap().len(), 1);
    }
}
