//! Value codec: native [`Value`]s to JSON wire values and back.
//!
//! Wire forms:
//! - vectors, quaternions (Euler degrees) and colors: fixed-length numeric arrays
//! - rects and bounds: objects with named fields
//! - matrices: 4 row vectors
//! - curves: arrays of keyframe objects
//! - gradients: `{colorKeys, alphaKeys}`
//!
//! `null` decodes to [`Value::Null`] for every type. Types without a wire
//! form decode to [`Value::Unsupported`] and encode to `null`.

mod value;

pub use value::*;

use glam::{EulerRot, IVec2, IVec3, Mat4, Quat, Vec2, Vec3, Vec4};
use serde_json::{json, Map, Number, Value as Json};

use crate::error::CodecError;

pub type Result<T> = std::result::Result<T, CodecError>;

/// Decode a wire value into the native value of type `ty`
pub fn decode(ty: &ValueType, wire: &Json) -> Result<Value> {
    if !ty.is_supported() {
        return Ok(Value::Unsupported);
    }
    if wire.is_null() {
        return Ok(Value::Null);
    }

    let value = match ty {
        ValueType::Unsupported(_) => Value::Unsupported,
        ValueType::Nullable(inner) => decode(inner, wire)?,
        ValueType::Bool => Value::Bool(decode_bool(wire)?),
        ValueType::Int => Value::Int(integer(wire)?),
        ValueType::Float => Value::Float(number(wire)?),
        ValueType::String => Value::String(decode_string(wire)?),
        ValueType::Enum(variants) => Value::Enum(decode_enum(wire, *variants)?.to_string()),
        ValueType::Vector2 => {
            let v = floats(wire, 2, 2, "2")?;
            Value::Vector2(Vec2::new(v[0], v[1]))
        }
        ValueType::Vector3 => Value::Vector3(vec3(wire)?),
        ValueType::Vector4 => {
            let v = floats(wire, 4, 4, "4")?;
            Value::Vector4(Vec4::new(v[0], v[1], v[2], v[3]))
        }
        ValueType::Vector2Int => {
            let v = ints(wire, 2, "2")?;
            Value::Vector2Int(IVec2::new(v[0], v[1]))
        }
        ValueType::Vector3Int => Value::Vector3Int(ivec3(wire)?),
        ValueType::Quaternion => Value::Quaternion(euler_to_quat(vec3(wire)?)),
        ValueType::Color => Value::Color(decode_color(wire)?),
        ValueType::Color32 => {
            let v = ints(wire, 4, "4")?;
            let byte = |i: i32| {
                u8::try_from(i).map_err(|_| CodecError::OutOfRange {
                    value: i.to_string(),
                    target: "a color byte",
                })
            };
            Value::Color32(Color32 {
                r: byte(v[0])?,
                g: byte(v[1])?,
                b: byte(v[2])?,
                a: byte(v[3])?,
            })
        }
        ValueType::Rect => {
            let o = object(wire)?;
            Value::Rect(Rect {
                x: field_f32(o, "x")?,
                y: field_f32(o, "y")?,
                width: field_f32(o, "width")?,
                height: field_f32(o, "height")?,
            })
        }
        ValueType::RectInt => {
            let o = object(wire)?;
            Value::RectInt(RectInt {
                x: to_i32(integer(field(o, "x")?)?)?,
                y: to_i32(integer(field(o, "y")?)?)?,
                width: to_i32(integer(field(o, "width")?)?)?,
                height: to_i32(integer(field(o, "height")?)?)?,
            })
        }
        ValueType::Bounds => {
            let o = object(wire)?;
            Value::Bounds(Bounds {
                center: vec3(field(o, "center")?)?,
                size: vec3(field(o, "size")?)?,
            })
        }
        ValueType::BoundsInt => {
            let o = object(wire)?;
            Value::BoundsInt(BoundsInt {
                position: ivec3(field(o, "position")?)?,
                size: ivec3(field(o, "size")?)?,
            })
        }
        ValueType::Matrix4 => Value::Matrix4(decode_matrix(wire)?),
        ValueType::LayerMask => Value::LayerMask(to_i32(integer(wire)?)?),
        ValueType::Curve => Value::Curve(elements(wire, decode_keyframe)?),
        ValueType::Gradient => Value::Gradient(decode_gradient(wire)?),
        ValueType::Array(element) => {
            Value::Array(elements(wire, |item| decode(element, item))?)
        }
    };
    Ok(value)
}

/// Encode a native value into its wire form
pub fn encode(value: &Value) -> Json {
    match value {
        Value::Null | Value::Unsupported => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => json!(i),
        Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        Value::String(s) | Value::Enum(s) => Json::String(s.clone()),
        Value::Vector2(v) => nums(&v.to_array()),
        Value::Vector3(v) => nums(&v.to_array()),
        Value::Vector4(v) => nums(&v.to_array()),
        Value::Vector2Int(v) => json!(v.to_array()),
        Value::Vector3Int(v) => json!(v.to_array()),
        Value::Quaternion(q) => nums(&quat_to_euler(*q).to_array()),
        Value::Color(c) => encode_color(c),
        Value::Color32(c) => json!([c.r, c.g, c.b, c.a]),
        Value::Rect(r) => json!({
            "x": num(r.x),
            "y": num(r.y),
            "width": num(r.width),
            "height": num(r.height),
        }),
        Value::RectInt(r) => json!({ "x": r.x, "y": r.y, "width": r.width, "height": r.height }),
        Value::Bounds(b) => json!({
            "center": nums(&b.center.to_array()),
            "size": nums(&b.size.to_array()),
        }),
        Value::BoundsInt(b) => json!({
            "position": b.position.to_array(),
            "size": b.size.to_array(),
        }),
        Value::Matrix4(m) => {
            Json::Array(m.transpose().to_cols_array_2d().iter().map(|row| nums(row)).collect())
        }
        Value::LayerMask(mask) => json!(mask),
        Value::Curve(keys) => Json::Array(
            keys.iter()
                .map(|k| {
                    json!({
                        "time": num(k.time),
                        "value": num(k.value),
                        "inTangent": num(k.in_tangent),
                        "outTangent": num(k.out_tangent),
                        "weightedMode": k.weighted_mode.name(),
                    })
                })
                .collect(),
        ),
        Value::Gradient(g) => json!({
            "colorKeys": g.color_keys.iter()
                .map(|k| json!({ "color": encode_color(&k.color), "time": num(k.time) }))
                .collect::<Vec<_>>(),
            "alphaKeys": g.alpha_keys.iter()
                .map(|k| json!({ "alpha": num(k.alpha), "time": num(k.time) }))
                .collect::<Vec<_>>(),
        }),
        Value::Array(items) => Json::Array(items.iter().map(encode).collect()),
    }
}

/// Unity applies Euler angles Z, then X, then Y
pub fn euler_to_quat(degrees: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        degrees.y.to_radians(),
        degrees.x.to_radians(),
        degrees.z.to_radians(),
    )
}

/// Euler angles in degrees, each wrapped to `[0, 360)`
pub fn quat_to_euler(q: Quat) -> Vec3 {
    let (y, x, z) = q.to_euler(EulerRot::YXZ);
    Vec3::new(
        wrap_degrees(x.to_degrees()),
        wrap_degrees(y.to_degrees()),
        wrap_degrees(z.to_degrees()),
    )
}

fn wrap_degrees(d: f32) -> f32 {
    let d = d.rem_euclid(360.0);
    if d == 0.0 || 360.0 - d < 1e-4 {
        0.0
    } else {
        d
    }
}

/// Shortest decimal form of an f32, so 0.1f32 is written as 0.1
fn num(v: f32) -> Json {
    v.to_string()
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Json::Number)
        .unwrap_or(Json::Null)
}

fn nums(values: &[f32]) -> Json {
    Json::Array(values.iter().map(|v| num(*v)).collect())
}

fn encode_color(c: &Color) -> Json {
    nums(&[c.r, c.g, c.b, c.a])
}

// ── Decoding helpers ─────────────────────────────────────

fn number(wire: &Json) -> Result<f64> {
    match wire {
        Json::Number(n) => n.as_f64().ok_or_else(|| CodecError::shape("a number", wire)),
        Json::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| CodecError::shape("a number", wire)),
        _ => Err(CodecError::shape("a number", wire)),
    }
}

fn integer(wire: &Json) -> Result<i64> {
    let float = match wire {
        Json::Number(n) => match n.as_i64() {
            Some(i) => return Ok(i),
            None => n.as_f64(),
        },
        Json::String(s) => match s.trim().parse::<i64>() {
            Ok(i) => return Ok(i),
            Err(_) => s.trim().parse::<f64>().ok(),
        },
        _ => None,
    };
    match float {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        Some(f) => Err(CodecError::OutOfRange {
            value: f.to_string(),
            target: "an integer",
        }),
        None => Err(CodecError::shape("an integer", wire)),
    }
}

fn to_i32(i: i64) -> Result<i32> {
    i32::try_from(i).map_err(|_| CodecError::OutOfRange {
        value: i.to_string(),
        target: "a 32-bit integer",
    })
}

fn decode_bool(wire: &Json) -> Result<bool> {
    match wire {
        Json::Bool(b) => Ok(*b),
        Json::Number(_) => Ok(number(wire)? != 0.0),
        Json::String(s) if s.trim().eq_ignore_ascii_case("true") => Ok(true),
        Json::String(s) if s.trim().eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(CodecError::shape("a boolean", wire)),
    }
}

fn decode_string(wire: &Json) -> Result<String> {
    match wire {
        Json::String(s) => Ok(s.clone()),
        Json::Number(n) => Ok(n.to_string()),
        Json::Bool(b) => Ok(b.to_string()),
        _ => Err(CodecError::shape("a string", wire)),
    }
}

/// Exact name, then case-insensitive name, then numeric index
fn decode_enum(wire: &Json, variants: &'static [&'static str]) -> Result<&'static str> {
    let unknown = |value: String| CodecError::UnknownVariant { value, variants };
    let index = match wire {
        Json::String(s) => {
            let s = s.trim();
            if let Some(v) = variants.iter().find(|v| **v == s) {
                return Ok(*v);
            }
            if let Some(v) = variants.iter().find(|v| v.eq_ignore_ascii_case(s)) {
                return Ok(*v);
            }
            s.parse::<usize>().map_err(|_| unknown(s.to_string()))?
        }
        Json::Number(_) => {
            let i = integer(wire)?;
            usize::try_from(i).map_err(|_| unknown(i.to_string()))?
        }
        _ => return Err(CodecError::shape("an enum name or index", wire)),
    };
    variants
        .get(index)
        .copied()
        .ok_or_else(|| unknown(index.to_string()))
}

fn array(wire: &Json) -> Result<&Vec<Json>> {
    wire.as_array().ok_or_else(|| CodecError::shape("an array", wire))
}

fn object(wire: &Json) -> Result<&Map<String, Json>> {
    wire.as_object().ok_or_else(|| CodecError::shape("an object", wire))
}

fn field<'a>(o: &'a Map<String, Json>, name: &'static str) -> Result<&'a Json> {
    o.get(name)
        .filter(|v| !v.is_null())
        .ok_or(CodecError::MissingField(name))
}

fn field_f32(o: &Map<String, Json>, name: &'static str) -> Result<f32> {
    Ok(number(field(o, name)?)? as f32)
}

fn optional_f32(o: &Map<String, Json>, name: &'static str) -> Result<f32> {
    match o.get(name).filter(|v| !v.is_null()) {
        Some(v) => Ok(number(v)? as f32),
        None => Ok(0.0),
    }
}

fn elements<T>(wire: &Json, mut f: impl FnMut(&Json) -> Result<T>) -> Result<Vec<T>> {
    array(wire)?
        .iter()
        .enumerate()
        .map(|(index, item)| {
            f(item).map_err(|e| CodecError::Element {
                index,
                source: Box::new(e),
            })
        })
        .collect()
}

fn floats(wire: &Json, min: usize, max: usize, expected: &'static str) -> Result<Vec<f32>> {
    let items = array(wire)?;
    if items.len() < min || items.len() > max {
        return Err(CodecError::Length {
            expected,
            got: items.len(),
        });
    }
    items.iter().map(|v| Ok(number(v)? as f32)).collect()
}

fn ints(wire: &Json, len: usize, expected: &'static str) -> Result<Vec<i32>> {
    let items = array(wire)?;
    if items.len() != len {
        return Err(CodecError::Length {
            expected,
            got: items.len(),
        });
    }
    items.iter().map(|v| to_i32(integer(v)?)).collect()
}

fn vec3(wire: &Json) -> Result<Vec3> {
    let v = floats(wire, 3, 3, "3")?;
    Ok(Vec3::new(v[0], v[1], v[2]))
}

fn ivec3(wire: &Json) -> Result<IVec3> {
    let v = ints(wire, 3, "3")?;
    Ok(IVec3::new(v[0], v[1], v[2]))
}

fn decode_color(wire: &Json) -> Result<Color> {
    let v = floats(wire, 3, 4, "3 or 4")?;
    Ok(Color::rgba(v[0], v[1], v[2], v.get(3).copied().unwrap_or(1.0)))
}

fn decode_matrix(wire: &Json) -> Result<Mat4> {
    let rows = array(wire)?;
    if rows.len() != 4 {
        return Err(CodecError::Shape {
            expected: "4 row vectors",
            got: format!("{} rows", rows.len()),
        });
    }
    let mut m = [[0.0f32; 4]; 4];
    for (i, row) in rows.iter().enumerate() {
        let values = floats(row, 4, 4, "4").map_err(|e| CodecError::Element {
            index: i,
            source: Box::new(e),
        })?;
        m[i].copy_from_slice(&values);
    }
    // rows in, glam stores columns
    Ok(Mat4::from_cols_array_2d(&m).transpose())
}

fn decode_keyframe(wire: &Json) -> Result<Keyframe> {
    let o = object(wire)?;
    let weighted_mode = match o.get("weightedMode").filter(|v| !v.is_null()) {
        Some(mode) => {
            let name = decode_enum(mode, WeightedMode::NAMES)?;
            WeightedMode::NAMES
                .iter()
                .position(|n| *n == name)
                .and_then(WeightedMode::from_index)
                .unwrap_or_default()
        }
        None => WeightedMode::None,
    };
    Ok(Keyframe {
        time: field_f32(o, "time")?,
        value: field_f32(o, "value")?,
        in_tangent: optional_f32(o, "inTangent")?,
        out_tangent: optional_f32(o, "outTangent")?,
        weighted_mode,
    })
}

fn decode_gradient(wire: &Json) -> Result<Gradient> {
    let o = object(wire)?;
    let color_keys = match o.get("colorKeys").filter(|v| !v.is_null()) {
        Some(keys) => elements(keys, |k| {
            let k = object(k)?;
            Ok(GradientColorKey {
                color: decode_color(field(k, "color")?)?,
                time: field_f32(k, "time")?,
            })
        })?,
        None => Vec::new(),
    };
    let alpha_keys = match o.get("alphaKeys").filter(|v| !v.is_null()) {
        Some(keys) => elements(keys, |k| {
            let k = object(k)?;
            Ok(GradientAlphaKey {
                alpha: field_f32(k, "alpha")?,
                time: field_f32(k, "time")?,
            })
        })?,
        None => Vec::new(),
    };
    Ok(Gradient {
        color_keys,
        alpha_keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIGHT_TYPES: &[&str] = &["Spot", "Directional", "Point", "Area"];

    fn round_trip(ty: &ValueType, value: Value) {
        let wire = encode(&value);
        let back = decode(ty, &wire).unwrap();
        assert_eq!(back, value, "wire form was {wire}");
    }

    #[test]
    fn test_vector_round_trip() {
        round_trip(&ValueType::Vector3, Value::Vector3(Vec3::new(-1.5, 0.0, 0.25)));
        round_trip(&ValueType::Vector2, Value::Vector2(Vec2::new(0.1, -3.0)));
        round_trip(&ValueType::Vector4, Value::Vector4(Vec4::new(1.0, 2.0, 3.0, -4.0)));
        round_trip(&ValueType::Vector3Int, Value::Vector3Int(IVec3::new(-2, 0, 7)));
    }

    #[test]
    fn test_vector_wire_form_is_short() {
        let wire = encode(&Value::Vector3(Vec3::new(0.1, 2.0, 0.0)));
        assert_eq!(wire, json!([0.1, 2.0, 0.0]));
    }

    #[test]
    fn test_vector_length_mismatch_is_error() {
        let err = decode(&ValueType::Vector3, &json!([1.0, 2.0])).unwrap_err();
        assert_eq!(
            err,
            CodecError::Length {
                expected: "3",
                got: 2
            }
        );
        assert!(decode(&ValueType::Vector2Int, &json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_color_alpha_defaults_to_opaque() {
        let c = decode(&ValueType::Color, &json!([1.0, 0.5, 0.0])).unwrap();
        assert_eq!(c, Value::Color(Color::rgb(1.0, 0.5, 0.0)));
        round_trip(&ValueType::Color, Value::Color(Color::rgba(0.2, 0.4, 0.6, 0.5)));
        assert!(decode(&ValueType::Color, &json!([1.0, 0.5])).is_err());
    }

    #[test]
    fn test_color32_range() {
        round_trip(
            &ValueType::Color32,
            Value::Color32(Color32 {
                r: 255,
                g: 0,
                b: 12,
                a: 128,
            }),
        );
        assert!(matches!(
            decode(&ValueType::Color32, &json!([256, 0, 0, 0])),
            Err(CodecError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_enum_by_name_case_and_index() {
        let ty = ValueType::Enum(LIGHT_TYPES);
        assert_eq!(decode(&ty, &json!("Point")).unwrap(), Value::Enum("Point".into()));
        assert_eq!(decode(&ty, &json!("point")).unwrap(), Value::Enum("Point".into()));
        assert_eq!(decode(&ty, &json!(1)).unwrap(), Value::Enum("Directional".into()));
        assert!(matches!(
            decode(&ty, &json!("Laser")),
            Err(CodecError::UnknownVariant { .. })
        ));
        round_trip(&ty, Value::Enum("Area".into()));
    }

    #[test]
    fn test_scalar_coercion() {
        assert_eq!(decode(&ValueType::Int, &json!(3.0)).unwrap(), Value::Int(3));
        assert_eq!(decode(&ValueType::Int, &json!("42")).unwrap(), Value::Int(42));
        assert!(decode(&ValueType::Int, &json!(3.5)).is_err());
        assert_eq!(decode(&ValueType::Float, &json!(2)).unwrap(), Value::Float(2.0));
        assert_eq!(decode(&ValueType::Bool, &json!("TRUE")).unwrap(), Value::Bool(true));
        assert_eq!(decode(&ValueType::String, &json!(5)).unwrap(), Value::String("5".into()));
        assert!(decode(&ValueType::String, &json!([1])).is_err());
    }

    #[test]
    fn test_null_and_unsupported() {
        assert_eq!(decode(&ValueType::Vector3, &Json::Null).unwrap(), Value::Null);
        assert_eq!(
            decode(&ValueType::Unsupported("Material"), &json!("Default")).unwrap(),
            Value::Unsupported
        );
        assert_eq!(encode(&Value::Unsupported), Json::Null);
        assert_eq!(
            decode(&ValueType::array_of(ValueType::Unsupported("Mesh")), &json!([1])).unwrap(),
            Value::Unsupported
        );
    }

    #[test]
    fn test_nullable_unwraps() {
        let ty = ValueType::nullable(ValueType::Float);
        assert_eq!(decode(&ty, &json!(1.5)).unwrap(), Value::Float(1.5));
        assert_eq!(decode(&ty, &Json::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_nested_array_round_trip() {
        let ty = ValueType::array_of(ValueType::array_of(ValueType::Vector2));
        round_trip(
            &ty,
            Value::Array(vec![
                Value::Array(vec![Value::Vector2(Vec2::new(1.0, -1.0))]),
                Value::Array(vec![]),
            ]),
        );
    }

    #[test]
    fn test_array_error_names_element() {
        let ty = ValueType::array_of(ValueType::Vector3);
        let err = decode(&ty, &json!([[0, 0, 0], [1, 2]])).unwrap_err();
        assert!(matches!(err, CodecError::Element { index: 1, .. }));
    }

    #[test]
    fn test_quaternion_euler_round_trip() {
        let q = euler_to_quat(Vec3::new(30.0, 45.0, 10.0));
        let wire = encode(&Value::Quaternion(q));
        let Value::Quaternion(back) = decode(&ValueType::Quaternion, &wire).unwrap() else {
            panic!("expected quaternion");
        };
        assert!(q.dot(back).abs() > 0.99999);

        let euler = quat_to_euler(q);
        assert!((euler.x - 30.0).abs() < 1e-3);
        assert!((euler.y - 45.0).abs() < 1e-3);
        assert!((euler.z - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_identity_rotation_is_zero() {
        assert_eq!(encode(&Value::Quaternion(Quat::IDENTITY)), json!([0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_rect_and_bounds() {
        round_trip(
            &ValueType::Rect,
            Value::Rect(Rect {
                x: 0.0,
                y: 0.5,
                width: 10.0,
                height: 2.25,
            }),
        );
        round_trip(
            &ValueType::BoundsInt,
            Value::BoundsInt(BoundsInt {
                position: IVec3::new(1, 2, 3),
                size: IVec3::ONE,
            }),
        );
        let err = decode(&ValueType::Bounds, &json!({ "center": [0, 0, 0] })).unwrap_err();
        assert_eq!(err, CodecError::MissingField("size"));
    }

    #[test]
    fn test_matrix_rows() {
        let wire = json!([[1, 0, 0, 5], [0, 1, 0, 6], [0, 0, 1, 7], [0, 0, 0, 1]]);
        let Value::Matrix4(m) = decode(&ValueType::Matrix4, &wire).unwrap() else {
            panic!("expected matrix");
        };
        assert_eq!(m.w_axis, Vec4::new(5.0, 6.0, 7.0, 1.0));
        assert_eq!(encode(&Value::Matrix4(m)), json!([
            [1.0, 0.0, 0.0, 5.0],
            [0.0, 1.0, 0.0, 6.0],
            [0.0, 0.0, 1.0, 7.0],
            [0.0, 0.0, 0.0, 1.0]
        ]));
    }

    #[test]
    fn test_curve_keyframes() {
        let wire = json!([
            { "time": 0, "value": 0 },
            { "time": 1, "value": 2, "inTangent": 0.5, "outTangent": 0.5, "weightedMode": "both" }
        ]);
        let Value::Curve(keys) = decode(&ValueType::Curve, &wire).unwrap() else {
            panic!("expected curve");
        };
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].weighted_mode, WeightedMode::None);
        assert_eq!(keys[1].weighted_mode, WeightedMode::Both);
        assert_eq!(keys[1].in_tangent, 0.5);
        round_trip(&ValueType::Curve, Value::Curve(keys));
    }

    #[test]
    fn test_gradient() {
        let value = Value::Gradient(Gradient {
            color_keys: vec![
                GradientColorKey {
                    color: Color::WHITE,
                    time: 0.0,
                },
                GradientColorKey {
                    color: Color::rgb(1.0, 0.0, 0.0),
                    time: 1.0,
                },
            ],
            alpha_keys: vec![GradientAlphaKey {
                alpha: 0.5,
                time: 0.5,
            }],
        });
        round_trip(&ValueType::Gradient, value);
    }
}
