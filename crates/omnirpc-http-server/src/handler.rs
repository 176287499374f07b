//! HTTP request handler for JSON-RPC

use std::fmt::Display;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http_body::Body;
use http_body_util::{BodyExt, Full};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, error, warn};

use omnirpc_json_rpc_server::{
    CONTENT_TYPE as JSON_RPC_CONTENT_TYPE, DispatchResponse, Dispatcher, Principal, RequestContext,
    RequestVerb, TransportRequest,
};

use crate::{CorsLayer, ServerConfig};

/// Where a request path points
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    /// The endpoint itself
    Endpoint,
    /// `<endpoint>/<method>`
    Method(String),
}

fn is_method_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.'
}

/// Request head values needed once the body is consumed
struct RequestFacts {
    method: Method,
    path: String,
    authorization: Option<HeaderValue>,
}

impl RequestFacts {
    fn of<B>(req: &Request<B>) -> Self {
        Self {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            authorization: req.headers().get(AUTHORIZATION).cloned(),
        }
    }
}

/// Routes HTTP requests into the dispatcher
#[derive(Clone)]
pub struct RpcHttpHandler {
    pub(crate) config: Arc<ServerConfig>,
    pub(crate) dispatcher: Arc<Dispatcher>,
}

impl RpcHttpHandler {
    pub fn new(config: ServerConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle one HTTP request; never fails, faults become response bodies
    pub async fn handle_request<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        debug!("Handling {} {}", method, path);

        let Some(route) = self.route(&path) else {
            return plain_response(StatusCode::NOT_FOUND, "Not Found");
        };

        let mut response = match method {
            Method::OPTIONS => {
                let mut response = plain_response(StatusCode::OK, "");
                CorsLayer::apply_preflight_headers(response.headers_mut(), self.config.enable_get);
                response
            }
            Method::POST => self.handle_post(req).await,
            Method::GET if self.config.enable_get => self.handle_get(route, req).await,
            other => {
                let ctx = self.request_context(RequestFacts::of(&req)).await;
                let request = TransportRequest {
                    verb: RequestVerb::Other(other.as_str().to_string()),
                    method: None,
                    query: Vec::new(),
                    body: Vec::new(),
                };
                let response = self.dispatcher.dispatch(request, &ctx).await;
                self.rpc_response(&response)
            }
        };

        if self.config.enable_cors {
            CorsLayer::apply_cors_headers(response.headers_mut());
        }
        response
    }

    async fn handle_post<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        let ctx = self.request_context(RequestFacts::of(&req)).await;

        let body_bytes = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                error!("Failed to read request body: {}", err);
                return plain_response(StatusCode::BAD_REQUEST, "Failed to read request body");
            }
        };

        if body_bytes.len() > self.config.max_body_size {
            warn!("Request body too large: {} bytes", body_bytes.len());
            return plain_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }

        let response = self.dispatcher.handle_bytes(&body_bytes, &ctx).await;
        self.rpc_response(&response)
    }

    async fn handle_get<B>(&self, route: Route, req: Request<B>) -> Response<Full<Bytes>> {
        let ctx = self.request_context(RequestFacts::of(&req)).await;
        let query: Vec<(String, String)> = req
            .uri()
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        let request = TransportRequest {
            verb: RequestVerb::Get,
            method: match route {
                Route::Method(name) => Some(name),
                Route::Endpoint => None,
            },
            query,
            body: Vec::new(),
        };
        let response = self.dispatcher.dispatch(request, &ctx).await;
        self.rpc_response(&response)
    }

    fn route(&self, path: &str) -> Option<Route> {
        let base = self.config.rpc_path.trim_end_matches('/');
        let rest = path.strip_prefix(base)?;
        if rest.is_empty() || rest == "/" {
            return Some(Route::Endpoint);
        }
        let name = rest.strip_prefix('/')?;
        if name.chars().all(is_method_char) {
            Some(Route::Method(name.to_string()))
        } else {
            None
        }
    }

    /// Transport facts handed to the dispatcher. With basic auth enabled,
    /// accepted `Authorization: Basic` credentials establish the principal.
    async fn request_context(&self, facts: RequestFacts) -> RequestContext {
        let mut ctx = RequestContext::new()
            .with_metadata("http_method", Value::String(facts.method.to_string()))
            .with_metadata("path", Value::String(facts.path));

        if !self.config.basic_auth {
            return ctx;
        }
        if let Some(principal) = self.basic_auth_principal(facts.authorization.as_ref()).await {
            ctx = ctx.with_principal(principal);
        }
        ctx
    }

    async fn basic_auth_principal(&self, header: Option<&HeaderValue>) -> Option<Principal> {
        let (username, password) = parse_basic_auth(header?)?;
        let checker = self.dispatcher.credential_checker()?;
        match checker.check(&username, &password).await {
            Ok(Some(principal)) => {
                debug!("HTTP basic auth accepted for '{}'", principal.username);
                Some(principal)
            }
            Ok(None) => {
                warn!("HTTP basic auth rejected for '{}'", username);
                None
            }
            Err(err) => {
                error!("Credential checker failed: {}", err);
                None
            }
        }
    }

    fn rpc_response(&self, response: &DispatchResponse) -> Response<Full<Bytes>> {
        let encoded = self.dispatcher.encode(response);
        let status =
            StatusCode::from_u16(encoded.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut http_response = match encoded.body {
            Some(body) => {
                let mut http_response = Response::new(Full::new(Bytes::from(body)));
                http_response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_RPC_CONTENT_TYPE));
                http_response
            }
            None => Response::new(Full::new(Bytes::new())),
        };
        *http_response.status_mut() = status;
        http_response
    }
}

/// Decode an `Authorization: Basic` header into username and password
pub fn parse_basic_auth(header: &HeaderValue) -> Option<(String, String)> {
    let value = header.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn plain_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
