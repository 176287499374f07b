//! Per-version argument normalisation
//!
//! Turns a raw `params` member into a canonical positional list plus a
//! keyword map, following the encoding rules of each protocol generation.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::error::RpcError;
use crate::types::ProtocolVersion;

/// Arguments ready to be bound to a procedure's declared parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalArgs {
    pub positional: Vec<Value>,
    pub keyword: Map<String, Value>,
}

impl CanonicalArgs {
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            keyword: Map::new(),
        }
    }

    pub fn keyword(map: Map<String, Value>) -> Self {
        Self {
            positional: Vec::new(),
            keyword: map,
        }
    }

    /// Total number of supplied arguments
    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalise `params` for the negotiated protocol version
pub fn normalize(version: ProtocolVersion, params: &Value) -> Result<CanonicalArgs, RpcError> {
    match (version, params) {
        (_, Value::Array(values)) => Ok(CanonicalArgs::positional(values.clone())),
        (ProtocolVersion::V1_0, Value::Object(_)) => Err(RpcError::invalid_params(
            "JSON-RPC 1.0 requires \"params\" to be an array",
        )),
        (ProtocolVersion::V2_0, Value::Object(map)) => Ok(CanonicalArgs::keyword(map.clone())),
        (ProtocolVersion::V1_1, Value::Object(map)) => Ok(split_mixed(map.clone())),
        _ => Err(RpcError::invalid_params("\"params\" must be an array or an object")),
    }
}

/// 1.1 keyed params: numeric keys are positional slots taken in ascending
/// order, every other key is a keyword argument.
fn split_mixed(map: Map<String, Value>) -> CanonicalArgs {
    let mut slots: Vec<(SlotIndex, Value)> = Vec::new();
    let mut keyword = Map::new();

    for (key, value) in map {
        match SlotIndex::parse(&key) {
            Some(position) => slots.push((position, value)),
            None => {
                keyword.insert(key, value);
            }
        }
    }

    // Distinct keys can still share a position ("1" and "01"); the first one wins.
    slots.sort_by(|(a, _), (b, _)| a.cmp(b));
    slots.dedup_by(|(a, _), (b, _)| a == b);

    CanonicalArgs {
        positional: slots.into_iter().map(|(_, value)| value).collect(),
        keyword,
    }
}

/// Integer key of arbitrary length, kept as its canonical digit string
#[derive(Debug, PartialEq, Eq)]
struct SlotIndex {
    negative: bool,
    digits: String,
}

impl SlotIndex {
    fn parse(key: &str) -> Option<Self> {
        let key = key.trim();
        let (negative, digits) = match key.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, key.strip_prefix('+').unwrap_or(key)),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let digits = digits.trim_start_matches('0');
        let digits = if digits.is_empty() { "0" } else { digits };
        Some(Self {
            negative: negative && digits != "0",
            digits: digits.to_string(),
        })
    }

    fn magnitude_cmp(&self, other: &Self) -> Ordering {
        self.digits
            .len()
            .cmp(&other.digits.len())
            .then_with(|| self.digits.cmp(&other.digits))
    }
}

impl Ord for SlotIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, false) => self.magnitude_cmp(other),
            (true, true) => other.magnitude_cmp(self),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
        }
    }
}

impl PartialOrd for SlotIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
