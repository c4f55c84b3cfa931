// Typed scalar values
//
// Used for persisted parameters, undo command arguments and effect property
// dictionaries. The textual type tags are part of the project file format.

use crate::media::PropertyValue;
use std::fmt;

/// A dynamically typed scalar
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Type tag written to the `type` attribute
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
        }
    }

    /// Text written to the `value` attribute
    pub fn to_text(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => format_float(*v),
            Value::Str(v) => v.clone(),
        }
    }

    /// Rebuild a value from its type tag and text
    ///
    /// Returns `None` for an unknown tag or text that does not parse.
    pub fn parse(type_name: &str, text: &str) -> Option<Self> {
        match type_name {
            "NoneType" => Some(Value::None),
            "bool" => match text {
                "True" | "true" | "1" => Some(Value::Bool(true)),
                "False" | "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            "int" | "long" => text.trim().parse().ok().map(Value::Int),
            "float" => text.trim().parse().ok().map(Value::Float),
            "str" | "unicode" => Some(Value::Str(text.to_string())),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_i64().and_then(|v| u32::try_from(v).ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Convert to a media-graph property; `None` has no property form
    pub fn to_property(&self) -> Option<PropertyValue> {
        match self {
            Value::None => None,
            Value::Bool(v) => Some(PropertyValue::Bool(*v)),
            Value::Int(v) => Some(PropertyValue::Int(*v)),
            Value::Float(v) => Some(PropertyValue::Float(*v)),
            Value::Str(v) => Some(PropertyValue::Str(v.clone())),
        }
    }
}

impl From<PropertyValue> for Value {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Bool(v) => Value::Bool(v),
            PropertyValue::Int(v) => Value::Int(v),
            PropertyValue::Float(v) => Value::Float(v),
            PropertyValue::Str(v) => Value::Str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(v) => write!(f, "{:?}", v),
            other => f.write_str(&other.to_text()),
        }
    }
}

/// Shortest text that parses back to the same float
pub fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_forms() {
        assert_eq!(Value::Bool(true).to_text(), "True");
        assert_eq!(Value::Float(2.0).to_text(), "2.0");
        assert_eq!(Value::Float(0.125).to_text(), "0.125");
        assert_eq!(Value::Int(-4).to_text(), "-4");
        assert_eq!(Value::None.type_name(), "NoneType");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Value::parse("float", "abc"), None);
        assert_eq!(Value::parse("bool", "maybe"), None);
        assert_eq!(Value::parse("complex", "1j"), None);
        assert_eq!(Value::parse("int", " 12 "), Some(Value::Int(12)));
    }

    #[test]
    fn test_numeric_coercions() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(3.0).as_u32(), Some(3));
        assert_eq!(Value::Float(3.5).as_u32(), None);
        assert_eq!(Value::Int(-1).as_u32(), None);
        assert_eq!(Value::Str("x".into()).as_f64(), None);
    }
}
