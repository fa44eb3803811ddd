//! Resource kinds and typed values.

use std::fmt;

/// Kind of a route, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// UTF-8 text.
    String,
    /// 32-bit signed integer.
    Int,
    /// 32-bit IEEE-754 float.
    Float,
    /// Executable resource with no value.
    Function,
}

impl ResourceKind {
    /// Type name used in the object-model wire format.
    pub fn wire_type(self) -> &'static str {
        match self {
            ResourceKind::String => "string",
            ResourceKind::Int => "int",
            ResourceKind::Float => "float",
            ResourceKind::Function => "opaque",
        }
    }

    /// Name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::String => "string",
            ResourceKind::Int => "int",
            ResourceKind::Float => "float",
            ResourceKind::Function => "function",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Current value of a non-function route.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceValue {
    /// UTF-8 text.
    String(String),
    /// 32-bit signed integer.
    Int(i32),
    /// 32-bit IEEE-754 float.
    Float(f32),
}

impl ResourceValue {
    /// Kind this value belongs to.
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceValue::String(_) => ResourceKind::String,
            ResourceValue::Int(_) => ResourceKind::Int,
            ResourceValue::Float(_) => ResourceKind::Float,
        }
    }

    /// Text value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ResourceValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value, if this is an int.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            ResourceValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float value, if this is a float.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            ResourceValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<String> for ResourceValue {
    fn from(value: String) -> Self {
        ResourceValue::String(value)
    }
}

impl From<&str> for ResourceValue {
    fn from(value: &str) -> Self {
        ResourceValue::String(value.to_string())
    }
}

impl From<i32> for ResourceValue {
    fn from(value: i32) -> Self {
        ResourceValue::Int(value)
    }
}

impl From<f32> for ResourceValue {
    fn from(value: f32) -> Self {
        ResourceValue::Float(value)
    }
}

impl fmt::Display for ResourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceValue::String(s) => f.write_str(s),
            ResourceValue::Int(v) => write!(f, "{}", v),
            ResourceValue::Float(v) => write!(f, "{}", v),
        }
    }
}
