use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::CredentialChecker;
use crate::error::{RpcError, SignatureError};
use crate::params::CanonicalArgs;
use crate::signature::ProcedureSignature;
use crate::types::{ProtocolVersion, TypeTag};
use crate::validate::encode_return;

/// Names of the credential arguments injected into authenticated procedures
pub const USERNAME_ARGUMENT: &str = "username";
pub const PASSWORD_ARGUMENT: &str = "password";

/// Identity resolved by a credential checker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            metadata: HashMap::new(),
        }
    }
}

/// What the transport knows about a request before dispatch
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Principal already established by the transport (e.g. HTTP Basic)
    pub principal: Option<Principal>,
    /// Transport metadata exposed to handlers
    pub metadata: HashMap<String, Value>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Per-call context handed to a procedure
#[derive(Debug, Clone)]
pub struct CallContext {
    pub method: String,
    pub version: ProtocolVersion,
    pub request_id: Value,
    /// Set for authenticated procedures once credentials are accepted
    pub principal: Option<Principal>,
    pub metadata: HashMap<String, Value>,
}

/// Arguments bound to a procedure's declared parameters
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    names: Vec<String>,
    positional: Vec<Value>,
    keyword: Map<String, Value>,
}

impl Arguments {
    pub fn new(names: Vec<String>, args: CanonicalArgs) -> Self {
        Self {
            names,
            positional: args.positional,
            keyword: args.keyword,
        }
    }

    /// Value of a parameter by name, whether it was passed by position or by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.names.iter().position(|n| n == name) {
            Some(index) if index < self.positional.len() => self.positional.get(index),
            _ => self.keyword.get(name),
        }
    }

    /// Value of the parameter declared at `index`
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.positional
            .get(index)
            .or_else(|| self.names.get(index).and_then(|name| self.keyword.get(name)))
    }

    /// Deserialize a required parameter
    pub fn required<T: DeserializeOwned>(&self, name: &str) -> Result<T, RpcError> {
        let value = self
            .get(name)
            .ok_or_else(|| RpcError::Other(format!("missing required argument '{}'", name)))?;
        serde_json::from_value(value.clone()).map_err(RpcError::from)
    }

    /// Deserialize an optional parameter; absent and null both give `None`
    pub fn optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, RpcError> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(RpcError::from),
        }
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keyword(&self) -> &Map<String, Value> {
        &self.keyword
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All supplied values: positional first, then keywords in declared
    /// order, then undeclared keywords.
    pub fn into_values(self) -> Vec<Value> {
        let mut keyword = self.keyword;
        let mut values = self.positional;
        for name in &self.names {
            if let Some(value) = keyword.remove(name) {
                values.push(value);
            }
        }
        values.extend(keyword.into_iter().map(|(_, v)| v));
        values
    }
}

/// Trait implemented by every callable procedure
#[async_trait]
pub trait RpcProcedure: Send + Sync {
    /// Invoke the procedure. Errors other than protocol faults should be
    /// wrapped with [`RpcError::other`].
    async fn call(&self, ctx: CallContext, args: Arguments) -> Result<Value, RpcError>;

    /// Method name used when the signature string is empty
    fn name(&self) -> Option<&str> {
        None
    }

    /// The procedure's own parameter names, in order
    fn parameter_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Doc text published by `system.describe`
    fn summary(&self) -> Option<String> {
        None
    }
}

pub type ProcedureFuture = BoxFuture<'static, Result<Value, RpcError>>;

/// A simple function-based procedure
pub struct FunctionProcedure<F>
where
    F: Fn(CallContext, Arguments) -> ProcedureFuture + Send + Sync,
{
    handler_fn: F,
    name: Option<String>,
    params: Vec<String>,
    summary: Option<String>,
}

impl<F> FunctionProcedure<F>
where
    F: Fn(CallContext, Arguments) -> ProcedureFuture + Send + Sync,
{
    pub fn new(handler_fn: F) -> Self {
        Self {
            handler_fn,
            name: None,
            params: Vec::new(),
            summary: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

#[async_trait]
impl<F> RpcProcedure for FunctionProcedure<F>
where
    F: Fn(CallContext, Arguments) -> ProcedureFuture + Send + Sync,
{
    async fn call(&self, ctx: CallContext, args: Arguments) -> Result<Value, RpcError> {
        (self.handler_fn)(ctx, args).await
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn parameter_names(&self) -> Vec<String> {
        self.params.clone()
    }

    fn summary(&self) -> Option<String> {
        self.summary.clone()
    }
}

/// Wrap an async closure returning any serializable value.
///
/// The result is encoded when the call completes; a value without a JSON
/// representation becomes a "return type not supported" fault.
pub fn procedure_fn<F, Fut, T>(
    f: F,
) -> FunctionProcedure<impl Fn(CallContext, Arguments) -> ProcedureFuture + Send + Sync>
where
    F: Fn(CallContext, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, RpcError>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    FunctionProcedure::new(move |ctx, args| {
        let fut = f(ctx, args);
        async move {
            let result = fut.await?;
            encode_return(&result)
        }
        .boxed()
    })
}

/// How an authenticated procedure checks credentials
#[derive(Clone, Default)]
pub enum Authentication {
    #[default]
    None,
    /// Use the dispatcher's credential checker
    Required,
    /// Use a procedure-specific checker
    With(Arc<dyn CredentialChecker>),
}

impl Authentication {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Authentication::None)
    }
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authentication::None => f.write_str("None"),
            Authentication::Required => f.write_str("Required"),
            Authentication::With(_) => f.write_str("With(<checker>)"),
        }
    }
}

/// Registration flags
#[derive(Debug, Clone, Default)]
pub struct ProcedureFlags {
    /// Callable through GET (safe/idempotent)
    pub allow_get: bool,
    /// Check arguments against the signature before invoking
    pub validate: bool,
    pub authenticated: Authentication,
}

impl ProcedureFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn safe(mut self) -> Self {
        self.allow_get = true;
        self
    }

    pub fn validated(mut self) -> Self {
        self.validate = true;
        self
    }

    pub fn authenticated(mut self) -> Self {
        self.authenticated = Authentication::Required;
        self
    }

    pub fn authenticated_with(mut self, checker: Arc<dyn CredentialChecker>) -> Self {
        self.authenticated = Authentication::With(checker);
        self
    }
}

#[derive(Clone)]
pub(crate) enum ProcedureHandler {
    /// The registry's own introspection entry
    Describe,
    Function(Arc<dyn RpcProcedure>),
}

/// A procedure owned by the registry
#[derive(Clone)]
pub struct Procedure {
    signature: ProcedureSignature,
    pub(crate) handler: ProcedureHandler,
    flags: ProcedureFlags,
    summary: Option<String>,
}

impl Procedure {
    /// Parse `signature_text` against the handler and apply `flags`.
    /// Authenticated procedures get leading `username`/`password` arguments.
    pub fn new<P>(signature_text: &str, handler: P, flags: ProcedureFlags) -> Result<Self, SignatureError>
    where
        P: RpcProcedure + 'static,
    {
        let mut signature =
            ProcedureSignature::parse(handler.name(), &handler.parameter_names(), signature_text)?;
        if flags.authenticated.is_enabled() {
            signature.prepend_argument(PASSWORD_ARGUMENT, TypeTag::String)?;
            signature.prepend_argument(USERNAME_ARGUMENT, TypeTag::String)?;
        }
        Ok(Self {
            summary: handler.summary(),
            signature,
            handler: ProcedureHandler::Function(Arc::new(handler)),
            flags,
        })
    }

    pub(crate) fn describe_builtin() -> Self {
        Self {
            signature: ProcedureSignature::parse(None, &[], "system.describe() -> Object")
                .unwrap_or_else(|_| unreachable!("built-in signature is well formed")),
            handler: ProcedureHandler::Describe,
            flags: ProcedureFlags::new().safe(),
            summary: Some("Describe the procedures offered by this service.".to_string()),
        }
    }

    pub fn method_name(&self) -> &str {
        self.signature.method_name()
    }

    /// Published signature, including injected credential arguments
    pub fn signature(&self) -> &ProcedureSignature {
        &self.signature
    }

    pub fn flags(&self) -> &ProcedureFlags {
        &self.flags
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Number of leading synthetic arguments consumed before the handler runs
    pub fn injected_arguments(&self) -> usize {
        if self.flags.authenticated.is_enabled() { 2 } else { 0 }
    }

    /// Signature of the arguments the handler itself receives
    pub fn handler_signature(&self) -> ProcedureSignature {
        self.signature.without_leading(self.injected_arguments())
    }

    pub fn is_builtin_describe(&self) -> bool {
        matches!(self.handler, ProcedureHandler::Describe)
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("signature", &self.signature.render())
            .field("flags", &self.flags)
            .finish()
    }
}
