//! Error taxonomy of the diff pipeline.
//!
//! Only [`ResolveError`] aborts a whole patch. Everything else is collected
//! per property / per operation and returned next to the successful results.

use std::fmt;

use shared::Uid;

/// Malformed wire value for the declared type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("expected {expected} numbers, got {got}")]
    Length { expected: &'static str, got: usize },
    #[error("expected {expected}, got {got}")]
    Shape { expected: &'static str, got: String },
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("unknown variant '{value}', expected one of {variants:?}")]
    UnknownVariant {
        value: String,
        variants: &'static [&'static str],
    },
    #[error("{value} is out of range for {target}")]
    OutOfRange { value: String, target: &'static str },
    #[error("element {index}: {source}")]
    Element {
        index: usize,
        #[source]
        source: Box<CodecError>,
    },
}

impl CodecError {
    pub(crate) fn shape(expected: &'static str, got: &serde_json::Value) -> Self {
        CodecError::Shape {
            expected,
            got: json_kind(got).to_string(),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyErrorKind {
    NotFound,
    NotWritable,
    Codec(CodecError),
}

impl fmt::Display for PropertyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyErrorKind::NotFound => write!(f, "no such property"),
            PropertyErrorKind::NotWritable => write!(f, "property is not writable"),
            PropertyErrorKind::Codec(e) => write!(f, "invalid value: {e}"),
        }
    }
}

/// A single property of a patch that could not be resolved
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{uid}.{component}.{property}: {kind}")]
pub struct PropertyError {
    pub uid: Uid,
    pub component: String,
    pub property: String,
    pub kind: PropertyErrorKind,
}

/// Part of a patch skipped during resolution
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveWarning {
    #[error("object '{uid}' is not in the scene and object creation is disabled")]
    ObjectCreationDisabled { uid: Uid },
    #[error("'{uid}': entry must be an object or null")]
    MalformedObject { uid: Uid },
    #[error("'{uid}': cannot remove, not a live object")]
    RemoveMissingObject { uid: Uid },
    #[error("'{uid}': parent '{parent}' not found, creating at root")]
    MissingParent { uid: Uid, parent: Uid },
    #[error("'{uid}': component type '{component}' not found")]
    UnknownType { uid: Uid, component: String },
    #[error("'{uid}': '{component}' is missing and component creation is disabled")]
    ComponentCreationDisabled { uid: Uid, component: String },
    #[error("'{uid}': cannot remove '{component}'")]
    RemoveMissingComponent { uid: Uid, component: String },
    #[error("'{uid}': section '{component}' must be an object or null")]
    MalformedComponent { uid: Uid, component: String },
    #[error("'{uid}': skipped '{component}.{property}' on new component: {reason}")]
    SkippedNewProperty {
        uid: Uid,
        component: String,
        property: String,
        reason: String,
    },
}

/// Failure that invalidates the whole patch
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("scene diff must be a JSON object keyed by UID")]
    NotAnObject,
    #[error("'{uid}': parent '{parent}' not found")]
    MissingParent { uid: Uid, parent: Uid },
    #[error("invalid diff JSON: {0}")]
    Parse(String),
}

/// One operation that failed at commit time
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{op}: {reason}")]
pub struct ApplyFailure {
    /// Display label of the failed operation
    pub op: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },
}
