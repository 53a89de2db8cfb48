//! Tools the model can call.
//!
//! A call arrives as a name plus a JSON argument object. Names match
//! case-insensitively; the arguments are merged with the name into one
//! tagged object and deserialized into a [`SceneTool`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use shared::{Tool, ToolParameters, ToolProperty};

use crate::codec;
use crate::error::ToolError;
use crate::graph::{InstanceId, SceneGraph};
use crate::snapshot;

/// A tool invocation with typed arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum SceneTool {
    /// Names and ids of every object, depth-first
    GetObjects,
    /// Same, indented by hierarchy depth
    GetObjectsWithHierarchy,
    GetObjectById { instance_id: i64 },
    /// Snapshot of the current selection
    GetSelectionSnapshot,
    /// Propose a patch; the result is handed to the diff pipeline
    ProposeSceneDiff { diff: Json },
}

const TOOL_NAMES: &[&str] = &[
    "get_objects",
    "get_objects_with_hierarchy",
    "get_object_by_id",
    "get_selection_snapshot",
    "propose_scene_diff",
];

/// Result of executing a tool
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// A scene diff payload
    Diff(Json),
    Json(Json),
}

impl ToolOutput {
    /// Text echoed back to the model as the tool message
    pub fn content(&self) -> String {
        match self {
            ToolOutput::Diff(diff) => diff.to_string(),
            ToolOutput::Json(Json::String(text)) => text.clone(),
            ToolOutput::Json(value) => value.to_string(),
        }
    }

    pub fn as_diff(&self) -> Option<&Json> {
        match self {
            ToolOutput::Diff(diff) => Some(diff),
            ToolOutput::Json(_) => None,
        }
    }
}

/// Function-calling manifest sent with every request
pub fn manifest() -> Vec<Tool> {
    vec![
        Tool::function(
            "get_objects",
            "List the name and instance id of every object in the scene.",
            ToolParameters::default(),
        ),
        Tool::function(
            "get_objects_with_hierarchy",
            "List every object in the scene, indented to show the parent/child hierarchy.",
            ToolParameters::default(),
        ),
        Tool::function(
            "get_object_by_id",
            "Get the details of one object: name, active state, tag, layer, transform and components.",
            ToolParameters::default().required(
                "instance_id",
                ToolProperty::new("integer", "Instance id of the object"),
            ),
        ),
        Tool::function(
            "get_selection_snapshot",
            "Get the UID-keyed JSON snapshot of the currently selected objects.",
            ToolParameters::default(),
        ),
        Tool::function(
            "propose_scene_diff",
            "Propose changes to the scene as a JSON object keyed by UID, then component type, then property.",
            ToolParameters::default().required(
                "diff",
                ToolProperty::new("object", "The scene diff"),
            ),
        ),
    ]
}

/// Turn a raw call into a typed tool
pub fn parse_call(name: &str, arguments: &Map<String, Json>) -> Result<SceneTool, ToolError> {
    let name = name.trim().to_ascii_lowercase();
    if !TOOL_NAMES.contains(&name.as_str()) {
        return Err(ToolError::UnknownTool(name));
    }
    let mut tagged = arguments.clone();
    tagged.insert("tool".to_string(), Json::String(name.clone()));
    serde_json::from_value(Json::Object(tagged)).map_err(|e| ToolError::InvalidArguments {
        tool: name,
        reason: e.to_string(),
    })
}

/// Execute a tool against the scene
pub fn execute(graph: &impl SceneGraph, selection: &[InstanceId], tool: SceneTool) -> ToolOutput {
    match tool {
        SceneTool::GetObjects => {
            let objects: Vec<Json> = graph
                .all_objects()
                .into_iter()
                .filter_map(|id| graph.find_object(id))
                .map(|info| json!({ "name": info.name, "instance_id": info.id }))
                .collect();
            ToolOutput::Json(json!({ "objects": objects }))
        }
        SceneTool::GetObjectsWithHierarchy => {
            let lines: Vec<String> = graph
                .all_objects()
                .into_iter()
                .filter_map(|id| graph.find_object(id))
                .map(|info| {
                    let indent = "  ".repeat(depth(graph, info.id));
                    format!("{indent}{} (ID: {})", info.name, info.id)
                })
                .collect();
            ToolOutput::Json(Json::String(lines.join("\n")))
        }
        SceneTool::GetObjectById { instance_id } => {
            ToolOutput::Json(describe_object(graph, InstanceId(instance_id)))
        }
        SceneTool::GetSelectionSnapshot => {
            let (_, doc) = snapshot::serialize(graph, selection);
            ToolOutput::Json(doc)
        }
        SceneTool::ProposeSceneDiff { diff } => ToolOutput::Diff(diff),
    }
}

/// Parse and execute in one step
pub fn invoke(
    graph: &impl SceneGraph,
    selection: &[InstanceId],
    name: &str,
    arguments: &Map<String, Json>,
) -> Result<ToolOutput, ToolError> {
    let tool = parse_call(name, arguments)?;
    tracing::debug!(?tool, "invoking tool");
    Ok(execute(graph, selection, tool))
}

fn depth(graph: &impl SceneGraph, id: InstanceId) -> usize {
    let mut depth = 0;
    let mut current = graph.find_object(id).and_then(|o| o.parent);
    while let Some(parent) = current {
        depth += 1;
        current = graph.find_object(parent).and_then(|o| o.parent);
    }
    depth
}

fn describe_object(graph: &impl SceneGraph, id: InstanceId) -> Json {
    let Some(info) = graph.find_object(id) else {
        return Json::String(format!("No object found with instance id {id}"));
    };
    let transform = graph.get_component(id, "Transform");
    let read = |property: &str| {
        transform
            .as_ref()
            .and_then(|t| graph.get_property(t, property))
            .map(|v| codec::encode(&v))
            .unwrap_or(Json::Null)
    };
    json!({
        "name": info.name,
        "instance_id": info.id,
        "active": info.active,
        "tag": info.tag,
        "layer": info.layer,
        "position": read("position"),
        "rotation": read("rotation"),
        "scale": read("localScale"),
        "components": graph.component_types(id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryScene;

    fn args(value: Json) -> Map<String, Json> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_parse_call_case_insensitive() {
        let tool = parse_call("Get_Object_By_Id", &args(json!({ "instance_id": 4 }))).unwrap();
        assert_eq!(tool, SceneTool::GetObjectById { instance_id: 4 });
    }

    #[test]
    fn test_parse_call_errors() {
        assert_eq!(
            parse_call("delete_everything", &Map::new()),
            Err(ToolError::UnknownTool("delete_everything".into()))
        );
        assert!(matches!(
            parse_call("get_object_by_id", &Map::new()),
            Err(ToolError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_manifest_matches_tool_names() {
        let tools = manifest();
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, TOOL_NAMES);
    }

    #[test]
    fn test_hierarchy_is_indented() {
        let mut scene = MemoryScene::default();
        let root = scene.create_object("Root", None);
        let child = scene.create_object("Child", Some(root));
        let output = execute(&scene, &[], SceneTool::GetObjectsWithHierarchy);
        assert_eq!(
            output.content(),
            format!("Root (ID: {root})\n  Child (ID: {child})")
        );
    }

    #[test]
    fn test_get_object_by_id() {
        let mut scene = MemoryScene::default();
        let id = scene.create_object("Lamp", None);
        scene.add_component(id, "Light").unwrap();
        let output = execute(&scene, &[], SceneTool::GetObjectById { instance_id: id.0 });
        let ToolOutput::Json(value) = output else {
            panic!("expected json");
        };
        assert_eq!(value["name"], "Lamp");
        assert_eq!(value["components"], json!(["Transform", "Light"]));
        assert_eq!(value["scale"], json!([1.0, 1.0, 1.0]));

        let missing = execute(&scene, &[], SceneTool::GetObjectById { instance_id: -1 });
        assert_eq!(missing.content(), "No object found with instance id -1");
    }

    #[test]
    fn test_propose_scene_diff_is_diff_payload() {
        let scene = MemoryScene::default();
        let diff = json!({ "0": { "Light": { "intensity": 2 } } });
        let output = invoke(&scene, &[], "propose_scene_diff", &args(json!({ "diff": diff }))).unwrap();
        assert_eq!(output.as_diff(), Some(&diff));
    }
}
