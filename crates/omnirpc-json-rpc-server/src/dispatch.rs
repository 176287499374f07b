//! Request dispatch
//!
//! Each call runs through: receive envelope, resolve version, resolve
//! method, authenticate (optional), normalise arguments, validate
//! (optional), invoke, shape the response. A fault at any step is shaped
//! into an error response for that call alone; batch siblings are
//! unaffected.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::auth::{CredentialChecker, authenticate};
use crate::codec::{JsonCodec, SerdeJsonCodec};
use crate::error::{JsonRpcErrorCode, RpcError};
use crate::params::normalize;
use crate::procedure::{
    Arguments, Authentication, CallContext, Procedure, ProcedureHandler, RequestContext,
};
use crate::registry::Registry;
use crate::request::{GET_REQUEST_ID, RequestEnvelope, resolve_version};
use crate::response::{DispatchResponse, ResponseEnvelope, STATUS_OK};
use crate::types::ProtocolVersion;
use crate::validate::validate_params;

/// HTTP-like verb of an incoming call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestVerb {
    Get,
    Post,
    Other(String),
}

impl RequestVerb {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "GET" => RequestVerb::Get,
            "POST" => RequestVerb::Post,
            other => RequestVerb::Other(other.to_string()),
        }
    }
}

/// A call as handed over by a transport adapter
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub verb: RequestVerb,
    /// Method named by the transport (path segment); required for GET
    pub method: Option<String>,
    pub query: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TransportRequest {
    pub fn post(body: impl Into<Vec<u8>>) -> Self {
        Self {
            verb: RequestVerb::Post,
            method: None,
            query: Vec::new(),
            body: body.into(),
        }
    }

    pub fn get(method: impl Into<String>, query: Vec<(String, String)>) -> Self {
        Self {
            verb: RequestVerb::Get,
            method: Some(method.into()),
            query,
            body: Vec::new(),
        }
    }
}

/// Encoded body (absent for notifications) and status for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedResponse {
    pub body: Option<Vec<u8>>,
    pub status: u16,
}

/// Shaped response of a single call. `None` means no body (notification).
type CallOutcome = (Option<ResponseEnvelope>, u16);

/// Stateless dispatcher over a frozen registry
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    credential_checker: Option<Arc<dyn CredentialChecker>>,
    codec: Arc<dyn JsonCodec>,
}

impl Dispatcher {
    pub fn new(registry: Registry) -> Self {
        Self::from_shared(Arc::new(registry))
    }

    pub fn from_shared(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            credential_checker: None,
            codec: Arc::new(SerdeJsonCodec),
        }
    }

    /// Checker used by procedures flagged [`Authentication::Required`]
    pub fn with_credential_checker(mut self, checker: Arc<dyn CredentialChecker>) -> Self {
        self.credential_checker = Some(checker);
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn JsonCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn credential_checker(&self) -> Option<&Arc<dyn CredentialChecker>> {
        self.credential_checker.as_ref()
    }

    fn default_protocol(&self) -> ProtocolVersion {
        self.registry.config().default_protocol
    }

    /// Route a transport call by verb
    pub async fn dispatch(&self, request: TransportRequest, ctx: &RequestContext) -> DispatchResponse {
        match request.verb {
            RequestVerb::Post => self.handle_bytes(&request.body, ctx).await,
            RequestVerb::Get => match request.method {
                Some(method) => self.handle_get(&method, request.query, ctx).await,
                None => self.fault_response(
                    ProtocolVersion::V1_1,
                    Value::String(GET_REQUEST_ID.to_string()),
                    RpcError::InvalidRequest("GET requests must name a method".into()),
                ),
            },
            RequestVerb::Other(verb) => self.fault_response(
                self.default_protocol(),
                Value::Null,
                RpcError::RequestPost(format!("{} is not supported", verb)),
            ),
        }
    }

    /// Decode and dispatch a POST body
    pub async fn handle_bytes(&self, body: &[u8], ctx: &RequestContext) -> DispatchResponse {
        match self.codec.decode(body) {
            Ok(request) => self.handle_value(request, ctx).await,
            Err(err) => self.fault_response(
                self.default_protocol(),
                Value::Null,
                RpcError::Parse(err.to_string()),
            ),
        }
    }

    /// Dispatch an already decoded request: a single envelope or a batch
    pub async fn handle_value(&self, request: Value, ctx: &RequestContext) -> DispatchResponse {
        match request {
            Value::Array(items) => {
                debug!("Processing JSON-RPC batch of {} calls", items.len());
                let outcomes =
                    join_all(items.iter().map(|item| self.handle_call(item, true, ctx))).await;
                DispatchResponse::batch(
                    outcomes
                        .into_iter()
                        .filter_map(|(envelope, _)| envelope)
                        .collect(),
                )
            }
            single => match self.handle_call(&single, false, ctx).await {
                (Some(envelope), status) => DispatchResponse::single(envelope, status),
                (None, _) => DispatchResponse::no_content(),
            },
        }
    }

    /// Dispatch a GET call. Only procedures flagged safe are reachable.
    pub async fn handle_get<I, K, V>(&self, method: &str, query: I, ctx: &RequestContext) -> DispatchResponse
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let envelope = RequestEnvelope::from_query(method, query);
        let allowed = self
            .registry
            .resolve(method)
            .map(|procedure| procedure.flags().allow_get)
            .unwrap_or(false);
        if !allowed {
            return self.fault_response(
                envelope.version,
                envelope.id,
                RpcError::InvalidRequest(
                    "The method you are trying to access is not available by GET requests".into(),
                ),
            );
        }

        match self.process(envelope, false, ctx).await {
            (Some(envelope), status) => DispatchResponse::single(envelope, status),
            (None, _) => DispatchResponse::no_content(),
        }
    }

    /// Encode a dispatch response with the configured codec.
    /// An encoding failure becomes an `OtherError` body with status 500.
    pub fn encode(&self, response: &DispatchResponse) -> EncodedResponse {
        let Some(value) = response.to_value() else {
            return EncodedResponse {
                body: None,
                status: response.status,
            };
        };
        match self.codec.encode(&value) {
            Ok(bytes) => EncodedResponse {
                body: Some(bytes),
                status: response.status,
            },
            Err(err) => {
                error!("Failed to encode JSON-RPC response: {}", err);
                let fault = RpcError::other(err);
                let fallback = ResponseEnvelope::error(self.default_protocol(), Value::Null, &fault);
                EncodedResponse {
                    body: Some(fallback.to_value().to_string().into_bytes()),
                    status: fault.status(),
                }
            }
        }
    }

    async fn handle_call(&self, request: &Value, in_batch: bool, ctx: &RequestContext) -> CallOutcome {
        let default = self.default_protocol();
        let Some(obj) = request.as_object() else {
            return self.fault(
                default,
                Value::Null,
                RpcError::InvalidRequest("request must be a JSON object".into()),
            );
        };
        let id = obj.get("id").cloned().unwrap_or(Value::Null);

        let version = match resolve_version(obj, default) {
            Ok(version) => version,
            Err(err) => return self.fault(default, id, err),
        };
        let envelope = match RequestEnvelope::from_object(obj, version) {
            Ok(envelope) => envelope,
            Err(err) => return self.fault(version, id, err),
        };
        self.process(envelope, in_batch, ctx).await
    }

    async fn process(&self, envelope: RequestEnvelope, in_batch: bool, ctx: &RequestContext) -> CallOutcome {
        debug!(
            "Processing JSON-RPC {} call: method={}",
            envelope.version, envelope.method
        );
        match self.execute(&envelope, ctx).await {
            Ok(result) if !envelope.is_notification() => (
                Some(ResponseEnvelope::success(envelope.version, envelope.id, result)),
                STATUS_OK,
            ),
            // Bare notifications are not accepted inside a batch
            Ok(_) if in_batch => self.fault(
                envelope.version,
                envelope.id,
                RpcError::InvalidRequest("notifications are not allowed in a batch".into()),
            ),
            Ok(_) => {
                debug!("Notification {} handled", envelope.method);
                (None, STATUS_OK)
            }
            Err(err) => self.fault(envelope.version, envelope.id, err),
        }
    }

    async fn execute(&self, envelope: &RequestEnvelope, ctx: &RequestContext) -> Result<Value, RpcError> {
        let procedure = self.registry.resolve(&envelope.method)?;
        let mut args = normalize(envelope.version, &envelope.params)?;

        let mut principal = ctx.principal.clone();
        if procedure.flags().authenticated.is_enabled() && principal.is_none() {
            let checker = self.checker_for(procedure)?;
            let checked = AssertUnwindSafe(authenticate(checker.as_ref(), &mut args))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(RpcError::Other(format!(
                        "credential check for {} panicked",
                        envelope.method
                    )))
                });
            principal = Some(checked?);
        }

        let signature = procedure.handler_signature();
        if procedure.flags().validate {
            validate_params(&signature, &args)?;
        }

        let call_ctx = CallContext {
            method: envelope.method.clone(),
            version: envelope.version,
            request_id: envelope.id.clone(),
            principal,
            metadata: ctx.metadata.clone(),
        };

        match &procedure.handler {
            ProcedureHandler::Describe => Ok(serde_json::to_value(self.registry.describe())?),
            ProcedureHandler::Function(handler) => {
                let args = Arguments::new(signature.argument_names(), args);
                AssertUnwindSafe(handler.call(call_ctx, args))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        Err(RpcError::Other(format!(
                            "procedure {} panicked",
                            envelope.method
                        )))
                    })
            }
        }
    }

    fn checker_for(&self, procedure: &Procedure) -> Result<Arc<dyn CredentialChecker>, RpcError> {
        match &procedure.flags().authenticated {
            Authentication::With(checker) => Ok(Arc::clone(checker)),
            _ => self.credential_checker.clone().ok_or_else(|| {
                RpcError::Server(format!(
                    "no credential checker configured for {}",
                    procedure.method_name()
                ))
            }),
        }
    }

    fn fault(&self, version: ProtocolVersion, id: Value, err: RpcError) -> CallOutcome {
        match err.kind() {
            JsonRpcErrorCode::OtherError | JsonRpcErrorCode::ServerError => {
                error!("JSON-RPC call failed: {}", err)
            }
            _ => warn!("JSON-RPC call rejected: {}", err),
        }
        let status = err.status();
        (Some(ResponseEnvelope::error(version, id, &err)), status)
    }

    fn fault_response(&self, version: ProtocolVersion, id: Value, err: RpcError) -> DispatchResponse {
        match self.fault(version, id, err) {
            (Some(envelope), status) => DispatchResponse::single(envelope, status),
            (None, _) => DispatchResponse::no_content(),
        }
    }
}
