use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SignatureError;

/// JSON-RPC protocol generation negotiated for a single call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolVersion {
    #[default]
    V1_0,
    V1_1,
    V2_0,
}

impl ProtocolVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V1_0 => "1.0",
            ProtocolVersion::V1_1 => "1.1",
            ProtocolVersion::V2_0 => "2.0",
        }
    }

    /// Resolve a version from the string form of an explicit `jsonrpc`/`version` field.
    /// Numbers are compared on their textual form, so `2.0` and `"2.0"` agree.
    pub fn from_field(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.to_string().parse().ok(),
            _ => None,
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.0" => Ok(ProtocolVersion::V1_0),
            "1.1" => Ok(ProtocolVersion::V1_1),
            "2.0" => Ok(ProtocolVersion::V2_0),
            other => Err(format!("JSON-RPC version {} not supported.", other)),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ProtocolVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProtocolVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Semantic value category used to check arguments against a signature.
///
/// `Any` matches every value; the remaining tags correspond one-to-one with
/// the JSON value shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    String,
    Number,
    Object,
    Array,
    Boolean,
    Nil,
    Any,
}

impl TypeTag {
    /// Classify a decoded value. Total and deterministic; never yields `Any`.
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::String(_) => TypeTag::String,
            Value::Number(_) => TypeTag::Number,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Array(_) => TypeTag::Array,
            Value::Object(_) => TypeTag::Object,
            Value::Null => TypeTag::Nil,
        }
    }

    /// Look up a type name as written in a signature string
    pub fn from_name(name: &str) -> Option<Self> {
        let tag = match name {
            "str" | "unicode" | "String" => TypeTag::String,
            "int" | "long" | "float" | "Number" => TypeTag::Number,
            "list" | "tuple" | "Array" => TypeTag::Array,
            "dict" | "Object" => TypeTag::Object,
            "bool" | "Boolean" => TypeTag::Boolean,
            "None" | "Nil" => TypeTag::Nil,
            "Any" => TypeTag::Any,
            _ => return None,
        };
        Some(tag)
    }

    /// Decode a type name found in `signature`, failing on anything outside
    /// the closed name table
    pub fn decode(name: &str, signature: &str) -> Result<Self, SignatureError> {
        Self::from_name(name.trim()).ok_or_else(|| SignatureError::UnknownType {
            name: name.trim().to_string(),
            signature: signature.to_string(),
        })
    }

    /// Whether `value` is acceptable where this tag is declared
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(self, TypeTag::Any) || Self::classify(value) == *self
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::String => "String",
            TypeTag::Number => "Number",
            TypeTag::Object => "Object",
            TypeTag::Array => "Array",
            TypeTag::Boolean => "Boolean",
            TypeTag::Nil => "Nil",
            TypeTag::Any => "Any",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
