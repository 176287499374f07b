use serde_json::{Map, Value};

use crate::error::RpcError;
use crate::types::ProtocolVersion;

/// Id given to envelopes synthesised from a GET query
pub const GET_REQUEST_ID: &str = "jsonrpc";

/// A decoded request, one per call
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub method: String,
    /// Raw `params` member, normalised later per protocol version
    pub params: Value,
    pub id: Value,
    pub version: ProtocolVersion,
}

impl RequestEnvelope {
    /// Build an envelope from a decoded object whose version is already resolved
    pub fn from_object(
        obj: &Map<String, Value>,
        version: ProtocolVersion,
    ) -> Result<Self, RpcError> {
        let (Some(method), Some(params)) = (obj.get("method"), obj.get("params")) else {
            return Err(RpcError::invalid_params(
                "Request requires str:\"method\" and list:\"params\"",
            ));
        };
        let method = method
            .as_str()
            .ok_or_else(|| RpcError::InvalidRequest("\"method\" must be a string".into()))?;
        Ok(Self {
            method: method.to_string(),
            params: params.clone(),
            id: obj.get("id").cloned().unwrap_or(Value::Null),
            version,
        })
    }

    /// Build the synthetic 1.1 envelope for a GET call.
    /// Repeated query keys become arrays, single keys scalars.
    pub fn from_query<I, K, V>(method: &str, query: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Map::new();
        for (key, value) in query {
            let key = key.into();
            let value = Value::String(value.into());
            match params.get_mut(&key) {
                Some(Value::Array(values)) => values.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    params.insert(key, value);
                }
            }
        }
        Self {
            method: method.to_string(),
            params: Value::Object(params),
            id: Value::String(GET_REQUEST_ID.to_string()),
            version: ProtocolVersion::V1_1,
        }
    }

    /// No or null id
    pub fn is_notification(&self) -> bool {
        self.id.is_null()
    }
}

/// Resolve the protocol version of a decoded request object.
///
/// `jsonrpc` takes precedence over `version`; without either the
/// configured default applies.
pub fn resolve_version(
    obj: &Map<String, Value>,
    default: ProtocolVersion,
) -> Result<ProtocolVersion, RpcError> {
    let field = obj.get("jsonrpc").or_else(|| obj.get("version"));
    match field {
        None => Ok(default),
        Some(raw) => ProtocolVersion::from_field(raw).ok_or_else(|| {
            let shown = raw.as_str().map(str::to_string).unwrap_or_else(|| raw.to_string());
            RpcError::InvalidRequest(format!("JSON-RPC version {} not supported.", shown))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_version_precedence() {
        let both = object(json!({"jsonrpc": "2.0", "version": "1.1"}));
        assert_eq!(resolve_version(&both, ProtocolVersion::V1_0).unwrap(), ProtocolVersion::V2_0);

        let v11 = object(json!({"version": "1.1"}));
        assert_eq!(resolve_version(&v11, ProtocolVersion::V1_0).unwrap(), ProtocolVersion::V1_1);

        let none = object(json!({"method": "x"}));
        assert_eq!(resolve_version(&none, ProtocolVersion::V1_0).unwrap(), ProtocolVersion::V1_0);

        let bad = object(json!({"jsonrpc": "3.0"}));
        let err = resolve_version(&bad, ProtocolVersion::V1_0).unwrap_err();
        assert!(matches!(err, RpcError::InvalidRequest(ref m) if m.contains("3.0")));
    }

    #[test]
    fn test_envelope_requires_method_and_params() {
        let missing = object(json!({"method": "echo", "id": 1}));
        let err = RequestEnvelope::from_object(&missing, ProtocolVersion::V1_0).unwrap_err();
        assert!(matches!(err, RpcError::InvalidParams(_)));

        let ok = object(json!({"method": "echo", "params": ["hi"], "id": "1"}));
        let envelope = RequestEnvelope::from_object(&ok, ProtocolVersion::V1_0).unwrap();
        assert_eq!(envelope.method, "echo");
        assert_eq!(envelope.id, json!("1"));
        assert!(!envelope.is_notification());
    }

    #[test]
    fn test_missing_id_is_notification() {
        let obj = object(json!({"jsonrpc": "2.0", "method": "notify", "params": []}));
        let envelope = RequestEnvelope::from_object(&obj, ProtocolVersion::V2_0).unwrap();
        assert!(envelope.is_notification());
    }

    #[test]
    fn test_from_query_collects_repeated_keys() {
        let envelope = RequestEnvelope::from_query(
            "jsonrpc.safeEcho",
            vec![("string", "a"), ("tag", "x"), ("tag", "y"), ("tag", "z")],
        );
        assert_eq!(envelope.version, ProtocolVersion::V1_1);
        assert_eq!(envelope.id, json!(GET_REQUEST_ID));
        assert_eq!(envelope.params, json!({"string": "a", "tag": ["x", "y", "z"]}));
    }
}
