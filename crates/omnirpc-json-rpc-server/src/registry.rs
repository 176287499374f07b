use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{RpcError, SignatureError};
use crate::procedure::{Procedure, ProcedureFlags, RpcProcedure};
use crate::types::{ProtocolVersion, TypeTag};

/// Method name of the built-in introspection procedure
pub const DESCRIBE_METHOD: &str = "system.describe";

/// Service description format version
pub const SERVICE_DESCRIPTION_VERSION: &str = "1.0";

/// Service-level configuration of a registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub name: String,
    /// Version of the service itself, published by `system.describe`
    pub version: String,
    pub summary: Option<String>,
    /// Protocol assumed when a request names no version
    pub default_protocol: ProtocolVersion,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: "omnirpc".to_string(),
            version: "1.0".to_string(),
            summary: None,
            default_protocol: ProtocolVersion::V1_0,
        }
    }
}

impl RegistryConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn default_protocol(mut self, version: ProtocolVersion) -> Self {
        self.default_protocol = version;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnDescriptor {
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureDescriptor {
    pub name: String,
    pub summary: Option<String>,
    pub idempotent: bool,
    pub params: Vec<ParamDescriptor>,
    #[serde(rename = "return")]
    pub return_type: ReturnDescriptor,
}

/// Result of `system.describe`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDescriptor {
    #[serde(rename = "sdversion")]
    pub spec_version: String,
    pub name: String,
    pub id: String,
    pub summary: Option<String>,
    pub version: String,
    pub procs: Vec<ProcedureDescriptor>,
}

/// Method name to procedure mapping.
///
/// Registration takes `&mut self`; once traffic starts the registry is
/// shared read-only behind an `Arc` by the dispatcher.
#[derive(Debug)]
pub struct Registry {
    config: RegistryConfig,
    id: String,
    entries: BTreeMap<String, Procedure>,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        let mut registry = Self {
            config,
            id: format!("urn:uuid:{}", Uuid::now_v7()),
            entries: BTreeMap::new(),
        };
        registry.register(DESCRIBE_METHOD, Procedure::describe_builtin());
        registry
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Stable identifier of this service instance
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Insert or replace the procedure registered under `method_name`
    pub fn register(&mut self, method_name: impl Into<String>, procedure: Procedure) {
        let method_name = method_name.into();
        debug!("Registering procedure {} as {}", procedure.signature(), method_name);
        self.entries.insert(method_name, procedure);
    }

    /// Parse `signature_text`, build the procedure and register it under the
    /// method name the signature declares
    pub fn add<P>(
        &mut self,
        signature_text: &str,
        handler: P,
        flags: ProcedureFlags,
    ) -> Result<&Procedure, SignatureError>
    where
        P: RpcProcedure + 'static,
    {
        let procedure = Procedure::new(signature_text, handler, flags)?;
        let method_name = procedure.method_name().to_string();
        self.register(method_name.clone(), procedure);
        Ok(&self.entries[&method_name])
    }

    pub fn resolve(&self, method_name: &str) -> Result<&Procedure, RpcError> {
        self.entries.get(method_name).ok_or_else(|| {
            RpcError::MethodNotFound(format!(
                "Method not found. Available methods: {}",
                self.method_names().join(", ")
            ))
        })
    }

    pub fn contains(&self, method_name: &str) -> bool {
        self.entries.contains_key(method_name)
    }

    /// Every registered method name, in sorted order
    pub fn method_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn procedure_descriptor(&self, method_name: &str, procedure: &Procedure) -> ProcedureDescriptor {
        let signature = procedure.signature();
        ProcedureDescriptor {
            name: method_name.to_string(),
            summary: procedure.summary().map(str::to_string),
            idempotent: procedure.flags().allow_get,
            params: signature
                .arguments()
                .iter()
                .map(|arg| ParamDescriptor {
                    name: arg.name.clone(),
                    type_tag: arg.type_tag,
                })
                .collect(),
            return_type: ReturnDescriptor {
                type_tag: signature.return_type(),
            },
        }
    }

    /// Describe every registered procedure except the built-in describe entry
    pub fn describe(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            spec_version: SERVICE_DESCRIPTION_VERSION.to_string(),
            name: self.config.name.clone(),
            id: self.id.clone(),
            summary: self.config.summary.clone(),
            version: self.config.version.clone(),
            procs: self
                .entries
                .iter()
                .filter(|(_, procedure)| !procedure.is_builtin_describe())
                .map(|(name, procedure)| self.procedure_descriptor(name, procedure))
                .collect(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::procedure_fn;

    fn registry() -> Registry {
        let mut registry = Registry::new(RegistryConfig::new("test-service").version("2.1"));
        registry
            .add(
                "jsonrpc.test",
                procedure_fn(|_ctx, args| async move { args.required::<String>("string") })
                    .with_params(["string"])
                    .with_summary("Returns whatever you give it."),
                ProcedureFlags::new(),
            )
            .unwrap();
        registry
            .add(
                "jsonrpc.safeEcho(String) -> String",
                procedure_fn(|_ctx, args| async move { args.required::<String>("string") })
                    .with_params(["string"]),
                ProcedureFlags::new().safe(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_describe_is_registered_but_not_listed() {
        let registry = registry();
        assert!(registry.contains(DESCRIBE_METHOD));

        let description = registry.describe();
        assert_eq!(description.name, "test-service");
        assert_eq!(description.version, "2.1");
        assert!(description.id.starts_with("urn:uuid:"));
        assert_eq!(description.procs.len(), 2);
        assert!(description.procs.iter().all(|p| p.name != DESCRIBE_METHOD));

        let safe = description.procs.iter().find(|p| p.name == "jsonrpc.safeEcho").unwrap();
        assert!(safe.idempotent);
        assert_eq!(safe.params[0].type_tag, TypeTag::String);
        assert_eq!(safe.return_type.type_tag, TypeTag::String);

        let plain = description.procs.iter().find(|p| p.name == "jsonrpc.test").unwrap();
        assert!(!plain.idempotent);
        assert_eq!(plain.summary.as_deref(), Some("Returns whatever you give it."));
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut registry = registry();
        let before = registry.len();
        registry
            .add(
                "jsonrpc.test(String)",
                procedure_fn(|_ctx, _args| async move { Ok("replaced") }).with_params(["string"]),
                ProcedureFlags::new().safe(),
            )
            .unwrap();
        assert_eq!(registry.len(), before);
        assert!(registry.resolve("jsonrpc.test").unwrap().flags().allow_get);
        assert_eq!(
            registry.describe().procs.iter().filter(|p| p.name == "jsonrpc.test").count(),
            1
        );
    }

    #[test]
    fn test_resolve_unknown_lists_methods() {
        let registry = registry();
        let err = registry.resolve("nope").unwrap_err();
        match err {
            RpcError::MethodNotFound(message) => {
                assert!(message.contains("jsonrpc.test"));
                assert!(message.contains("jsonrpc.safeEcho"));
                assert!(message.contains(DESCRIBE_METHOD));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_descriptor_serialization() {
        let value = serde_json::to_value(registry().describe()).unwrap();
        assert_eq!(value["sdversion"], "1.0");
        assert_eq!(value["procs"][0]["name"], "jsonrpc.safeEcho");
        assert_eq!(value["procs"][0]["return"]["type"], "String");
        assert_eq!(value["procs"][1]["return"]["type"], "Any");
        assert_eq!(value["procs"][1]["params"][0]["type"], "Any");
    }
}
