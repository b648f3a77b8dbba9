//! Property values - the typed payloads that flow through value links
//!
//! Every value a node can read or write belongs to this closed set. The
//! formatted text form defined here is also the persisted form used by the
//! binary script format.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::DataType;

// ─────────────────────────────────────────────────────────────────────────────
// Property Value
// ─────────────────────────────────────────────────────────────────────────────

/// A typed value held by a property or produced by a value node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "PascalCase")]
pub enum PropertyValue {
    /// Boolean value
    Boolean(bool),
    /// 32-bit signed integer
    Int(i32),
    /// 32-bit unsigned integer
    UnsignedInt(u32),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit floating point
    Double(f64),
    /// UTF-8 string
    Text(String),
    /// 2-component vector
    Vec2([f32; 2]),
    /// 3-component vector
    Vec3([f32; 3]),
    /// 4-component vector
    Vec4([f32; 4]),
    /// Reference to a simulation actor by id
    Actor(Uuid),
}

impl PropertyValue {
    /// The data type tag of this value
    pub fn data_type(&self) -> DataType {
        match self {
            PropertyValue::Boolean(_) => DataType::Boolean,
            PropertyValue::Int(_) => DataType::Int,
            PropertyValue::UnsignedInt(_) => DataType::UnsignedInt,
            PropertyValue::Float(_) => DataType::Float,
            PropertyValue::Double(_) => DataType::Double,
            PropertyValue::Text(_) => DataType::Text,
            PropertyValue::Vec2(_) => DataType::Vec2,
            PropertyValue::Vec3(_) => DataType::Vec3,
            PropertyValue::Vec4(_) => DataType::Vec4,
            PropertyValue::Actor(_) => DataType::Actor,
        }
    }

    /// Get as boolean (numbers coerce: non-zero is true)
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            PropertyValue::Int(i) => Some(*i != 0),
            PropertyValue::UnsignedInt(u) => Some(*u != 0),
            _ => None,
        }
    }

    /// Get as i32 (floats truncate, booleans coerce)
    pub fn as_int(&self) -> Option<i32> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            PropertyValue::UnsignedInt(u) => i32::try_from(*u).ok(),
            PropertyValue::Float(f) => Some(*f as i32),
            PropertyValue::Double(d) => Some(*d as i32),
            PropertyValue::Boolean(b) => Some(i32::from(*b)),
            _ => None,
        }
    }

    /// Get as u32
    pub fn as_uint(&self) -> Option<u32> {
        match self {
            PropertyValue::UnsignedInt(u) => Some(*u),
            PropertyValue::Int(i) => u32::try_from(*i).ok(),
            PropertyValue::Float(f) if *f >= 0.0 => Some(*f as u32),
            PropertyValue::Double(d) if *d >= 0.0 => Some(*d as u32),
            PropertyValue::Boolean(b) => Some(u32::from(*b)),
            _ => None,
        }
    }

    /// Get as f32 (integers widen)
    pub fn as_float(&self) -> Option<f32> {
        self.as_double().map(|d| d as f32)
    }

    /// Get as f64 (integers widen)
    pub fn as_double(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(f64::from(*f)),
            PropertyValue::Double(d) => Some(*d),
            PropertyValue::Int(i) => Some(f64::from(*i)),
            PropertyValue::UnsignedInt(u) => Some(f64::from(*u)),
            _ => None,
        }
    }

    /// Get as string reference
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get as 3-component vector
    pub fn as_vec3(&self) -> Option<[f32; 3]> {
        match self {
            PropertyValue::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as actor id
    pub fn as_actor(&self) -> Option<Uuid> {
        match self {
            PropertyValue::Actor(id) => Some(*id),
            _ => None,
        }
    }

    /// A default value of the given data type
    pub fn default_for(data_type: DataType) -> PropertyValue {
        match data_type {
            DataType::Boolean => PropertyValue::Boolean(false),
            DataType::Int => PropertyValue::Int(0),
            DataType::UnsignedInt => PropertyValue::UnsignedInt(0),
            DataType::Float => PropertyValue::Float(0.0),
            DataType::Double => PropertyValue::Double(0.0),
            DataType::Text | DataType::Unknown => PropertyValue::Text(String::new()),
            DataType::Vec2 => PropertyValue::Vec2([0.0; 2]),
            DataType::Vec3 => PropertyValue::Vec3([0.0; 3]),
            DataType::Vec4 => PropertyValue::Vec4([0.0; 4]),
            DataType::Actor => PropertyValue::Actor(Uuid::nil()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Formatted Text Form
// ─────────────────────────────────────────────────────────────────────────────

impl PropertyValue {
    /// Render the value into its persisted text form.
    ///
    /// Vectors serialize as JSON arrays so the round trip is lossless;
    /// everything else uses its natural display form.
    pub fn format(&self) -> String {
        match self {
            PropertyValue::Boolean(b) => b.to_string(),
            PropertyValue::Int(i) => i.to_string(),
            PropertyValue::UnsignedInt(u) => u.to_string(),
            PropertyValue::Float(f) => {
                serde_json::to_string(f).unwrap_or_else(|_| f.to_string())
            }
            PropertyValue::Double(d) => {
                serde_json::to_string(d).unwrap_or_else(|_| d.to_string())
            }
            PropertyValue::Text(s) => s.clone(),
            PropertyValue::Vec2(v) => {
                serde_json::to_string(v).unwrap_or_default()
            }
            PropertyValue::Vec3(v) => {
                serde_json::to_string(v).unwrap_or_default()
            }
            PropertyValue::Vec4(v) => {
                serde_json::to_string(v).unwrap_or_default()
            }
            PropertyValue::Actor(id) => id.to_string(),
        }
    }

    /// Convert this value into the given target type.
    ///
    /// Numeric conversions go through the accessors; everything else falls
    /// back to the formatted text form, the way property writes land in a
    /// property of a different declared type. Returns `None` when no
    /// conversion exists.
    pub fn coerce_to(&self, target: DataType) -> Option<PropertyValue> {
        if self.data_type() == target {
            return Some(self.clone());
        }
        let converted = match target {
            DataType::Boolean => self.as_bool().map(PropertyValue::Boolean),
            DataType::Int => self.as_int().map(PropertyValue::Int),
            DataType::UnsignedInt => self.as_uint().map(PropertyValue::UnsignedInt),
            DataType::Float => self.as_float().map(PropertyValue::Float),
            DataType::Double => self.as_double().map(PropertyValue::Double),
            DataType::Text | DataType::Unknown => Some(PropertyValue::Text(self.format())),
            _ => None,
        };
        converted.or_else(|| PropertyValue::parse(target, &self.format()))
    }

    /// Parse a persisted text form back into a value of the given type.
    ///
    /// Returns `None` when the text does not parse as that type.
    pub fn parse(data_type: DataType, text: &str) -> Option<PropertyValue> {
        match data_type {
            DataType::Boolean => match text {
                "true" | "1" => Some(PropertyValue::Boolean(true)),
                "false" | "0" => Some(PropertyValue::Boolean(false)),
                _ => None,
            },
            DataType::Int => text.parse().ok().map(PropertyValue::Int),
            DataType::UnsignedInt => text.parse().ok().map(PropertyValue::UnsignedInt),
            DataType::Float => text.parse().ok().map(PropertyValue::Float),
            DataType::Double => text.parse().ok().map(PropertyValue::Double),
            DataType::Text | DataType::Unknown => Some(PropertyValue::Text(text.to_string())),
            DataType::Vec2 => serde_json::from_str(text).ok().map(PropertyValue::Vec2),
            DataType::Vec3 => serde_json::from_str(text).ok().map(PropertyValue::Vec3),
            DataType::Vec4 => serde_json::from_str(text).ok().map(PropertyValue::Vec4),
            DataType::Actor => text.parse().ok().map(PropertyValue::Actor),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// From Implementations
// ─────────────────────────────────────────────────────────────────────────────

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Boolean(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<u32> for PropertyValue {
    fn from(v: u32) -> Self {
        PropertyValue::UnsignedInt(v)
    }
}

impl From<f32> for PropertyValue {
    fn from(v: f32) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<[f32; 3]> for PropertyValue {
    fn from(v: [f32; 3]) -> Self {
        PropertyValue::Vec3(v)
    }
}

impl From<Uuid> for PropertyValue {
    fn from(v: Uuid) -> Self {
        PropertyValue::Actor(v)
    }
}
