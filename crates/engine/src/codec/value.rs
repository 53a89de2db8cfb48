//! Native property values and their declared types

use glam::{IVec2, IVec3, Mat4, Quat, Vec2, Vec3, Vec4};

/// Linear RGBA color, components in 0..1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::rgba(r, g, b, 1.0)
    }
}

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color32 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RectInt {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub center: Vec3,
    pub size: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundsInt {
    pub position: IVec3,
    pub size: IVec3,
}

/// Which tangents of a keyframe are weighted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightedMode {
    #[default]
    None,
    In,
    Out,
    Both,
}

impl WeightedMode {
    pub const NAMES: &'static [&'static str] = &["None", "In", "Out", "Both"];

    pub fn name(&self) -> &'static str {
        Self::NAMES[*self as usize]
    }

    pub fn from_index(index: usize) -> Option<Self> {
        [Self::None, Self::In, Self::Out, Self::Both].get(index).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    pub in_tangent: f32,
    pub out_tangent: f32,
    pub weighted_mode: WeightedMode,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientColorKey {
    pub color: Color,
    pub time: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientAlphaKey {
    pub alpha: f32,
    pub time: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gradient {
    pub color_keys: Vec<GradientColorKey>,
    pub alpha_keys: Vec<GradientAlphaKey>,
}

/// A native, typed property value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Cleared / absent value
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Enum variant by canonical name
    Enum(String),
    Vector2(Vec2),
    Vector3(Vec3),
    Vector4(Vec4),
    Vector2Int(IVec2),
    Vector3Int(IVec3),
    Quaternion(Quat),
    Color(Color),
    Color32(Color32),
    Rect(Rect),
    RectInt(RectInt),
    Bounds(Bounds),
    BoundsInt(BoundsInt),
    Matrix4(Mat4),
    LayerMask(i32),
    Curve(Vec<Keyframe>),
    Gradient(Gradient),
    Array(Vec<Value>),
    /// Sentinel for types the codec cannot express
    Unsupported,
}

const QUAT_EPSILON: f32 = 1e-6;

impl Value {
    /// Equality where quaternions match by orientation, within a small tolerance
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Quaternion(a), Value::Quaternion(b)) => a.dot(*b).abs() >= 1.0 - QUAT_EPSILON,
            _ => self == other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Value::Unsupported)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Value::Vector3(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Value::Vector3(v)
    }
}

impl From<Color> for Value {
    fn from(v: Color) -> Self {
        Value::Color(v)
    }
}

/// Declared type of a property
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
    /// Enum with its variant names in declaration order
    Enum(&'static [&'static str]),
    Vector2,
    Vector3,
    Vector4,
    Vector2Int,
    Vector3Int,
    /// Rotation, exchanged as Euler angles in degrees
    Quaternion,
    Color,
    Color32,
    Rect,
    RectInt,
    Bounds,
    BoundsInt,
    Matrix4,
    LayerMask,
    Curve,
    Gradient,
    Array(Box<ValueType>),
    Nullable(Box<ValueType>),
    /// Object references and other types without a wire form
    Unsupported(&'static str),
}

impl ValueType {
    pub fn array_of(element: ValueType) -> Self {
        ValueType::Array(Box::new(element))
    }

    pub fn nullable(inner: ValueType) -> Self {
        ValueType::Nullable(Box::new(inner))
    }

    pub fn is_supported(&self) -> bool {
        match self {
            ValueType::Unsupported(_) => false,
            ValueType::Array(inner) | ValueType::Nullable(inner) => inner.is_supported(),
            _ => true,
        }
    }

    /// Whether `value` may be stored in a property of this type
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ValueType::Unsupported(_), _) => false,
            (ValueType::Nullable(inner), v) => inner.accepts(v),
            (ValueType::Array(inner), Value::Array(items)) => items.iter().all(|v| inner.accepts(v)),
            (ValueType::Enum(variants), Value::Enum(name)) => variants.contains(&name.as_str()),
            (ValueType::Bool, Value::Bool(_))
            | (ValueType::Int, Value::Int(_))
            | (ValueType::Float, Value::Float(_))
            | (ValueType::String, Value::String(_))
            | (ValueType::Vector2, Value::Vector2(_))
            | (ValueType::Vector3, Value::Vector3(_))
            | (ValueType::Vector4, Value::Vector4(_))
            | (ValueType::Vector2Int, Value::Vector2Int(_))
            | (ValueType::Vector3Int, Value::Vector3Int(_))
            | (ValueType::Quaternion, Value::Quaternion(_))
            | (ValueType::Color, Value::Color(_))
            | (ValueType::Color32, Value::Color32(_))
            | (ValueType::Rect, Value::Rect(_))
            | (ValueType::RectInt, Value::RectInt(_))
            | (ValueType::Bounds, Value::Bounds(_))
            | (ValueType::BoundsInt, Value::BoundsInt(_))
            | (ValueType::Matrix4, Value::Matrix4(_))
            | (ValueType::LayerMask, Value::LayerMask(_))
            | (ValueType::Curve, Value::Curve(_))
            | (ValueType::Gradient, Value::Gradient(_)) => true,
            _ => false,
        }
    }
}
