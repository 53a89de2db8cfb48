//! Explicitly registered component types and their property tables

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::codec::{
    Bounds, Color, Gradient, GradientAlphaKey, GradientColorKey, Keyframe, Rect, Value, ValueType,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub ty: ValueType,
    pub writable: bool,
    pub obsolete: bool,
    /// Value of a freshly added component
    pub default: Value,
}

impl PropertyDescriptor {
    pub fn new(name: &'static str, ty: ValueType, default: impl Into<Value>) -> Self {
        Self {
            name,
            ty,
            writable: true,
            obsolete: false,
            default: default.into(),
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn obsolete(mut self) -> Self {
        self.obsolete = true;
        self
    }

    /// Writable, current, and expressible on the wire
    pub fn is_serializable(&self) -> bool {
        self.writable && !self.obsolete && self.ty.is_supported()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDescriptor {
    pub name: &'static str,
    pub qualified_name: &'static str,
    pub aliases: Vec<&'static str>,
    /// Present on every object, cannot be added or removed
    pub implicit: bool,
    pub properties: Vec<PropertyDescriptor>,
}

impl ComponentDescriptor {
    pub fn new(name: &'static str, qualified_name: &'static str) -> Self {
        Self {
            name,
            qualified_name,
            aliases: Vec::new(),
            implicit: false,
            properties: Vec::new(),
        }
    }

    pub fn implicit(mut self) -> Self {
        self.implicit = true;
        self
    }

    pub fn alias(mut self, alias: &'static str) -> Self {
        self.aliases.push(alias);
        self
    }

    pub fn with(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    /// Exact name first, then case-insensitive
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .or_else(|| self.properties.iter().find(|p| p.name.eq_ignore_ascii_case(name)))
    }

    pub fn serializable_properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| p.is_serializable())
    }

    fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        [self.name, self.qualified_name]
            .into_iter()
            .chain(self.aliases.iter().copied())
    }
}

/// Closed set of component types known to a scene
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: Vec<ComponentDescriptor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ComponentDescriptor) {
        tracing::debug!(component = descriptor.name, "registered component type");
        self.types.push(descriptor);
    }

    pub fn types(&self) -> &[ComponentDescriptor] {
        &self.types
    }

    pub fn implicit_types(&self) -> impl Iterator<Item = &ComponentDescriptor> {
        self.types.iter().filter(|t| t.implicit)
    }

    /// Short name, qualified name or alias; exact matches win over
    /// case-insensitive ones, earlier registrations over later ones.
    pub fn find_type(&self, name: &str) -> Option<&ComponentDescriptor> {
        let name = name.trim();
        self.types
            .iter()
            .find(|t| t.names().any(|n| n == name))
            .or_else(|| {
                self.types
                    .iter()
                    .find(|t| t.names().any(|n| n.eq_ignore_ascii_case(name)))
            })
    }

    /// Unity-like built-in component set
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for descriptor in builtin_types() {
            registry.register(descriptor);
        }
        registry
    }
}

const LIGHT_TYPES: &[&str] = &["Spot", "Directional", "Point", "Area"];
const LIGHT2D_TYPES: &[&str] = &["Parametric", "Freeform", "Sprite", "Point", "Global"];
const SHADOW_TYPES: &[&str] = &["None", "Hard", "Soft"];
const INTERPOLATION: &[&str] = &["None", "Interpolate", "Extrapolate"];
const COLLISION_DETECTION: &[&str] = &[
    "Discrete",
    "Continuous",
    "ContinuousDynamic",
    "ContinuousSpeculative",
];
const CLEAR_FLAGS: &[&str] = &["Skybox", "SolidColor", "Depth", "Nothing"];
const SPRITE_DRAW_MODES: &[&str] = &["Simple", "Sliced", "Tiled"];
const ROLLOFF_MODES: &[&str] = &["Logarithmic", "Linear", "Custom"];

fn enum_prop(name: &'static str, variants: &'static [&'static str], default: &str) -> PropertyDescriptor {
    PropertyDescriptor::new(name, ValueType::Enum(variants), Value::Enum(default.to_string()))
}

fn float(name: &'static str, default: f64) -> PropertyDescriptor {
    PropertyDescriptor::new(name, ValueType::Float, default)
}

fn flag(name: &'static str, default: bool) -> PropertyDescriptor {
    PropertyDescriptor::new(name, ValueType::Bool, default)
}

fn vector3(name: &'static str, default: Vec3) -> PropertyDescriptor {
    PropertyDescriptor::new(name, ValueType::Vector3, default)
}

fn color(name: &'static str, default: Color) -> PropertyDescriptor {
    PropertyDescriptor::new(name, ValueType::Color, default)
}

fn unsupported(name: &'static str, type_name: &'static str) -> PropertyDescriptor {
    PropertyDescriptor::new(name, ValueType::Unsupported(type_name), Value::Null)
}

fn builtin_types() -> Vec<ComponentDescriptor> {
    vec![
        ComponentDescriptor::new("Transform", "UnityEngine.Transform")
            .implicit()
            .with(vector3("position", Vec3::ZERO))
            .with(PropertyDescriptor::new("rotation", ValueType::Quaternion, Value::Quaternion(Quat::IDENTITY)))
            .with(vector3("localScale", Vec3::ONE)),
        ComponentDescriptor::new("BoxCollider", "UnityEngine.BoxCollider")
            .with(flag("enabled", true))
            .with(flag("isTrigger", false))
            .with(vector3("center", Vec3::ZERO))
            .with(vector3("size", Vec3::ONE))
            .with(
                PropertyDescriptor::new(
                    "bounds",
                    ValueType::Bounds,
                    Value::Bounds(Bounds {
                        center: Vec3::ZERO,
                        size: Vec3::ONE,
                    }),
                )
                .read_only(),
            )
            .with(unsupported("sharedMaterial", "PhysicMaterial")),
        ComponentDescriptor::new("SphereCollider", "UnityEngine.SphereCollider")
            .with(flag("enabled", true))
            .with(flag("isTrigger", false))
            .with(vector3("center", Vec3::ZERO))
            .with(float("radius", 0.5)),
        ComponentDescriptor::new("Rigidbody", "UnityEngine.Rigidbody")
            .with(float("mass", 1.0))
            .with(float("drag", 0.0))
            .with(float("angularDrag", 0.05))
            .with(flag("useGravity", true))
            .with(flag("isKinematic", false))
            .with(vector3("velocity", Vec3::ZERO))
            .with(enum_prop("interpolation", INTERPOLATION, "None"))
            .with(enum_prop("collisionDetectionMode", COLLISION_DETECTION, "Discrete"))
            .with(vector3("worldCenterOfMass", Vec3::ZERO).read_only())
            .with(float("sleepVelocity", 0.14).obsolete()),
        ComponentDescriptor::new("Light", "UnityEngine.Light")
            .with(flag("enabled", true))
            .with(enum_prop("type", LIGHT_TYPES, "Point"))
            .with(color("color", Color::WHITE))
            .with(float("intensity", 1.0))
            .with(float("range", 10.0))
            .with(float("spotAngle", 30.0))
            .with(enum_prop("shadows", SHADOW_TYPES, "None"))
            .with(PropertyDescriptor::new("cullingMask", ValueType::LayerMask, Value::LayerMask(-1))),
        ComponentDescriptor::new("Light2D", "UnityEngine.Rendering.Universal.Light2D")
            .alias("UnityEngine.Experimental.Rendering.Universal.Light2D")
            .with(flag("enabled", true))
            .with(enum_prop("lightType", LIGHT2D_TYPES, "Point"))
            .with(color("color", Color::WHITE))
            .with(float("intensity", 1.0))
            .with(float("pointLightInnerRadius", 0.0))
            .with(float("pointLightOuterRadius", 1.0))
            .with(float("falloffIntensity", 0.5)),
        ComponentDescriptor::new("Camera", "UnityEngine.Camera")
            .with(flag("enabled", true))
            .with(float("fieldOfView", 60.0))
            .with(flag("orthographic", false))
            .with(float("orthographicSize", 5.0))
            .with(float("nearClipPlane", 0.3))
            .with(float("farClipPlane", 1000.0))
            .with(float("depth", -1.0))
            .with(enum_prop("clearFlags", CLEAR_FLAGS, "Skybox"))
            .with(color("backgroundColor", Color::rgba(0.19, 0.3, 0.47, 0.0)))
            .with(PropertyDescriptor::new(
                "rect",
                ValueType::Rect,
                Value::Rect(Rect {
                    x: 0.0,
                    y: 0.0,
                    width: 1.0,
                    height: 1.0,
                }),
            ))
            .with(PropertyDescriptor::new("cullingMask", ValueType::LayerMask, Value::LayerMask(-1)))
            .with(PropertyDescriptor::new("projectionMatrix", ValueType::Matrix4, Value::Matrix4(Mat4::IDENTITY)))
            .with(unsupported("targetTexture", "RenderTexture")),
        ComponentDescriptor::new("SpriteRenderer", "UnityEngine.SpriteRenderer")
            .with(flag("enabled", true))
            .with(color("color", Color::WHITE))
            .with(flag("flipX", false))
            .with(flag("flipY", false))
            .with(PropertyDescriptor::new("sortingOrder", ValueType::Int, Value::Int(0)))
            .with(PropertyDescriptor::new("sortingLayerName", ValueType::String, "Default"))
            .with(enum_prop("drawMode", SPRITE_DRAW_MODES, "Simple"))
            .with(PropertyDescriptor::new("size", ValueType::Vector2, Value::Vector2(Vec2::ONE)))
            .with(unsupported("sprite", "Sprite"))
            .with(unsupported("sharedMaterial", "Material")),
        ComponentDescriptor::new("AudioSource", "UnityEngine.AudioSource")
            .with(flag("enabled", true))
            .with(float("volume", 1.0))
            .with(float("pitch", 1.0))
            .with(flag("loop", false))
            .with(flag("playOnAwake", true))
            .with(flag("mute", false))
            .with(float("spatialBlend", 0.0))
            .with(enum_prop("rolloffMode", ROLLOFF_MODES, "Logarithmic"))
            .with(unsupported("clip", "AudioClip")),
        ComponentDescriptor::new("LineRenderer", "UnityEngine.LineRenderer")
            .with(flag("enabled", true))
            .with(float("startWidth", 1.0))
            .with(float("endWidth", 1.0))
            .with(color("startColor", Color::WHITE))
            .with(color("endColor", Color::WHITE))
            .with(flag("loop", false))
            .with(flag("useWorldSpace", true))
            .with(PropertyDescriptor::new("positionCount", ValueType::Int, Value::Int(2)))
            .with(PropertyDescriptor::new(
                "widthCurve",
                ValueType::Curve,
                Value::Curve(vec![Keyframe {
                    value: 1.0,
                    ..Keyframe::default()
                }]),
            ))
            .with(PropertyDescriptor::new(
                "colorGradient",
                ValueType::Gradient,
                Value::Gradient(Gradient {
                    color_keys: vec![
                        GradientColorKey {
                            color: Color::WHITE,
                            time: 0.0,
                        },
                        GradientColorKey {
                            color: Color::WHITE,
                            time: 1.0,
                        },
                    ],
                    alpha_keys: vec![
                        GradientAlphaKey { alpha: 1.0, time: 0.0 },
                        GradientAlphaKey { alpha: 1.0, time: 1.0 },
                    ],
                }),
            ))
            .with(PropertyDescriptor::new(
                "positions",
                ValueType::array_of(ValueType::Vector3),
                Value::Array(vec![Value::Vector3(Vec3::ZERO), Value::Vector3(Vec3::Z)]),
            )),
    ]
}
