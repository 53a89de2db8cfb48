//! Integration tests for the diff pipeline.
//!
//! Tests end-to-end: snapshot -> resolve -> review -> commit -> apply.

use glam::Vec3;
use sceneforge_lib::codec::{euler_to_quat, Value};
use sceneforge_lib::diff::{self, Change, DiffReview, OpKind, ResolvePolicy};
use sceneforge_lib::error::{PropertyErrorKind, ResolveWarning};
use sceneforge_lib::fixtures::*;
use sceneforge_lib::graph::{MemoryScene, ObjectRef, SceneGraph, UidMap};
use sceneforge_lib::snapshot;
use serde_json::json;

fn kinds(ops: &[diff::DiffOp]) -> Vec<OpKind> {
    ops.iter().map(|op| op.kind()).collect()
}

#[test]
fn test_existing_light2d_position_and_intensity() {
    let (scene, light) = light2d_scene();
    let (mut uids, _) = snapshot::serialize(&scene, &[light]);
    let patch = json!({ "0": { "Transform": { "position": [0, 2, 0] }, "Light2D": { "intensity": 2.0 } } });

    let resolution = diff::resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
    assert!(resolution.errors.is_empty());
    assert_eq!(kinds(&resolution.ops), vec![OpKind::UpdateProperty, OpKind::UpdateProperty]);

    let Change::UpdateProperty { property, old, new, .. } = &resolution.ops[0].change else {
        panic!("expected a property update");
    };
    assert_eq!(property, "position");
    assert_eq!(old, &Some(Value::Vector3(Vec3::ZERO)));
    assert_eq!(new, &Value::Vector3(Vec3::new(0.0, 2.0, 0.0)));

    let Change::UpdateProperty { property, old, new, .. } = &resolution.ops[1].change else {
        panic!("expected a property update");
    };
    assert_eq!(property, "intensity");
    assert_eq!(old, &Some(Value::Float(1.0)));
    assert_eq!(new, &Value::Float(2.0));
}

#[test]
fn test_new_enemy_with_collider() {
    let scene = MemoryScene::default();
    let mut uids = UidMap::new();
    let patch = json!({ "1": { "name": "Enemy", "BoxCollider": { "isTrigger": true } } });

    let resolution = diff::resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
    let ops = DiffReview::new(resolution.ops).commit();
    assert_eq!(
        kinds(&ops),
        vec![OpKind::CreateObject, OpKind::AddComponent, OpKind::UpdateProperty]
    );
    assert!(matches!(&ops[0].change, Change::CreateObject { name, parent: None } if name == "Enemy"));
    assert!(matches!(
        &ops[2].change,
        Change::UpdateProperty { property, old: None, new: Value::Bool(true), .. } if property == "isTrigger"
    ));
    assert_eq!(uids.get("1"), Some(&ObjectRef::Pending("1".into())));
}

#[test]
fn test_new_enemy_with_creation_disabled() {
    let scene = MemoryScene::default();
    let mut uids = UidMap::new();
    let policy = ResolvePolicy {
        allow_object_creation: false,
        ..ResolvePolicy::default()
    };
    let patch = json!({ "1": { "name": "Enemy", "BoxCollider": { "isTrigger": true } } });

    let resolution = diff::resolve(&scene, &patch, &mut uids, &policy).unwrap();
    assert!(resolution.ops.is_empty());
    assert_eq!(
        resolution.warnings,
        vec![ResolveWarning::ObjectCreationDisabled { uid: "1".into() }]
    );
    assert!(uids.is_empty());
}

#[test]
fn test_forward_reference_parent_created_once() {
    let mut scene = MemoryScene::default();
    let mut uids = UidMap::new();
    // child listed before its parent
    let patch = json!({
        "5": { "name": "Wheel", "parent": "4" },
        "4": { "name": "Car", "Rigidbody": { "mass": 1200 } }
    });

    let resolution = diff::resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
    let creates: Vec<_> = resolution
        .ops
        .iter()
        .filter(|op| op.kind() == OpKind::CreateObject)
        .collect();
    assert_eq!(creates.len(), 2);
    assert_eq!(creates[0].uid, "4");
    assert!(matches!(
        &creates[1].change,
        Change::CreateObject { parent: Some(ObjectRef::Pending(p)), .. } if p == "4"
    ));

    let report = diff::apply(&mut scene, &DiffReview::new(resolution.ops).commit(), Some(&mut uids));
    assert!(report.is_clean());
    let car = uids.live("4").unwrap();
    let wheel = uids.live("5").unwrap();
    assert_eq!(scene.find_object(wheel).unwrap().parent, Some(car));
}

#[test]
fn test_deselected_add_component_gates_update() {
    let mut scene = MemoryScene::default();
    let crate_id = scene.create_object("Crate", None);
    let (mut uids, _) = snapshot::serialize(&scene, &[crate_id]);
    let patch = json!({ "0": { "BoxCollider": { "isTrigger": true } } });

    let resolution = diff::resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
    let mut review = DiffReview::new(resolution.ops);
    assert_eq!(kinds(review.ops()), vec![OpKind::AddComponent, OpKind::UpdateProperty]);

    assert!(review.set_op_enabled(0, false));
    assert!(!review.is_effective(1));
    assert!(!review.set_op_enabled(1, true));
    assert!(!review.is_effective(1));

    let ops = review.commit();
    assert!(ops.is_empty());
    let report = diff::apply(&mut scene, &ops, Some(&mut uids));
    assert_eq!(report.applied, 0);
    assert!(scene.get_component(crate_id, "BoxCollider").is_none());
}

#[test]
fn test_commit_orders_structure_before_properties() {
    let (scene, [root, child, _, sibling]) = hierarchy_scene();
    let (mut uids, _) = snapshot::serialize(&scene, &[root, child, sibling]);
    let patch = json!({
        "1": { "Light": { "intensity": 4 }, "AudioSource": { "volume": 0.5 } },
        "2": { "Light": { "range": 3 }, "SphereCollider": { "radius": 2 } },
        "7": { "name": "Marker", "parent": "0", "Camera": { "depth": 1 } },
        "0": { "Rigidbody": { "mass": 3 } }
    });

    let resolution = diff::resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
    let ops = DiffReview::new(resolution.ops).commit();

    for (i, op) in ops.iter().enumerate() {
        if !matches!(op.kind(), OpKind::UpdateProperty | OpKind::RemoveComponent) {
            continue;
        }
        let later_creation = ops[i..].iter().any(|other| {
            other.target == op.target
                && match other.kind() {
                    OpKind::CreateObject => true,
                    OpKind::AddComponent => other.component() == op.component(),
                    _ => false,
                }
        });
        assert!(!later_creation, "{op} runs before its structural creation");
    }
}

#[test]
fn test_bad_property_isolated_from_good_one() {
    let (scene, player) = player_scene();
    let (mut uids, _) = snapshot::serialize(&scene, &[player]);
    let patch = json!({ "0": { "Rigidbody": { "mass": 5, "wingspan": 12 } } });

    let resolution = diff::resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
    assert_eq!(resolution.errors.len(), 1);
    assert_eq!(resolution.errors[0].property, "wingspan");
    assert_eq!(resolution.errors[0].kind, PropertyErrorKind::NotFound);

    assert_eq!(resolution.ops.len(), 1);
    assert!(matches!(
        &resolution.ops[0].change,
        Change::UpdateProperty { property, old: Some(Value::Float(old)), new: Value::Float(new), .. }
            if property == "mass" && *old == 70.0 && *new == 5.0
    ));
}

#[test]
fn test_unchanged_values_produce_no_ops() {
    let (scene, player) = player_scene();
    let (mut uids, _) = snapshot::serialize(&scene, &[player]);
    let patch = json!({ "0": { "Rigidbody": { "mass": 70 }, "Transform": { "localScale": [1, 1, 1] } } });

    let resolution = diff::resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
    assert!(resolution.ops.is_empty());
}

#[test]
fn test_snapshot_values_resolve_to_noops() {
    let (mut scene, turret) = light2d_scene();
    let transform = scene.get_component(turret, "Transform").unwrap();
    let rotation = euler_to_quat(Vec3::new(30.0, 45.0, 10.0));
    assert!(scene.set_property(&transform, "rotation", Value::Quaternion(rotation)));
    let (mut uids, doc) = snapshot::serialize(&scene, &[turret]);

    // echo every snapshotted component back unchanged
    let mut section = serde_json::Map::new();
    for component in doc["0"]["components"].as_array().unwrap() {
        section.insert(
            component["type"].as_str().unwrap().to_string(),
            component["properties"].clone(),
        );
    }
    let snapshot_transform = &doc["0"]["transform"];
    section.insert(
        "Transform".to_string(),
        json!({
            "position": snapshot_transform["position"],
            "rotation": snapshot_transform["rotation"],
            "localScale": snapshot_transform["scale"],
        }),
    );
    let patch = json!({ "0": section });

    let resolution = diff::resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
    assert!(resolution.errors.is_empty(), "{:?}", resolution.errors);
    assert!(resolution.ops.is_empty(), "{:?}", resolution.ops);
}

#[test]
fn test_removal_runs_after_updates() {
    let (mut scene, player) = player_scene();
    let (mut uids, _) = snapshot::serialize(&scene, &[player]);
    let patch = json!({ "0": { "BoxCollider": null, "Rigidbody": { "mass": 2 } } });

    let resolution = diff::resolve(&scene, &patch, &mut uids, &ResolvePolicy::default()).unwrap();
    let ops = DiffReview::new(resolution.ops).commit();
    assert_eq!(kinds(&ops), vec![OpKind::UpdateProperty, OpKind::RemoveComponent]);

    let report = diff::apply(&mut scene, &ops, Some(&mut uids));
    assert_eq!(report.applied, 2);
    assert!(scene.get_component(player, "BoxCollider").is_none());
}
