//! # Endpoint Layer
//!
//! An [`Endpoint`] is the transport-bound unit the adapter chain produces:
//! it parses a [`Request`] into an [`Invocation`], invokes the action, and
//! renders the result into a [`Response`].
//!
//! Decorators wrap an inner endpoint and override only the stage they care
//! about; the provided [`Endpoint::call`] drives the stages and converts
//! every [`CallError`] into a structured response.
//!
//! # Static vs Dynamic Dispatch
//!
//! `Endpoint` uses native `async fn` for static dispatch. Chains produce
//! [`BoxEndpoint`]s (via [`DynEndpoint`]) because the concrete decorator stack
//! depends on each action's declaration.

use crate::{
    action::{Action, Invocation},
    error::CallError,
    trigger::Trigger,
};
use futures::future::BoxFuture;
use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use serde::Serialize;
use serde_json::Value;
use std::{collections::BTreeMap, future::Future, sync::Arc};
use tracing::Instrument;

/// A transport-neutral inbound request.
///
/// Routers translate platform events into this shape before calling an
/// endpoint.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// HTTP-equivalent method.
    pub method: Method,
    /// Request path.
    pub path: String,
    /// Headers, including `Authorization` and conditional headers.
    pub headers: HeaderMap,
    /// Query string parameters.
    pub query: BTreeMap<String, String>,
    /// Parameters captured from the route template.
    pub path_params: BTreeMap<String, String>,
    /// Decoded body.
    pub body: Option<Value>,
}

impl Request {
    /// A request with `method` on `path`.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Self::default()
        }
    }

    /// `GET path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path` with a JSON body.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    /// Add a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header; invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            header::HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Attach `Authorization: Bearer <token>`.
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header(header::AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }

    /// The bearer credential, if one was sent.
    pub fn bearer_token(&self) -> Option<&str> {
        let raw = self.headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
        let token = match raw.split_once(' ') {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
            Some(_) => return None,
            None => raw,
        };
        (!token.is_empty()).then_some(token)
    }
}

/// A transport-neutral response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body; `None` for bodiless responses such as 304.
    pub body: Option<Value>,
}

impl Response {
    /// A JSON response.
    pub fn json(status: StatusCode, body: Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            status,
            headers,
            body: Some(body),
        }
    }

    /// `200 OK` with `body`.
    pub fn ok(body: Value) -> Self {
        Self::json(StatusCode::OK, body)
    }

    /// `304 Not Modified`, keeping the cache headers of `self`.
    pub fn into_not_modified(mut self) -> Self {
        self.status = StatusCode::NOT_MODIFIED;
        self.headers.remove(header::CONTENT_TYPE);
        self.body = None;
        self
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Header value as text.
    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Where an endpoint is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// Action name.
    pub action: String,
    /// The trigger the endpoint was built for.
    pub trigger: Trigger,
    /// Resolved route path, for web triggers.
    pub path: Option<String>,
}

impl RouteInfo {
    /// HTTP method, for web triggers.
    pub fn method(&self) -> Option<&Method> {
        self.trigger.as_web().map(|w| &w.method)
    }
}

/// Documentation for one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationDoc {
    /// Action name.
    pub action: String,
    /// Action description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// HTTP method, for web endpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Route path, for web endpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Parameter schema description.
    pub params: Value,
    /// Result schema description.
    pub result: Value,
    /// Whether a bearer credential is read.
    pub authenticated: bool,
    /// Scope a caller must hold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_scope: Option<String>,
    /// Cache policy summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,
}

/// Collected documentation for a set of endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaDoc {
    /// One entry per endpoint.
    pub operations: Vec<OperationDoc>,
}

impl SchemaDoc {
    /// The last operation added, for decorators to enrich.
    pub fn last_mut(&mut self) -> Option<&mut OperationDoc> {
        self.operations.last_mut()
    }

    /// Operation documenting `action`.
    pub fn find(&self, action: &str) -> Option<&OperationDoc> {
        self.operations.iter().find(|op| op.action == action)
    }
}

/// A transport-bound parse / invoke / render unit.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not an `Endpoint`",
    label = "missing `Endpoint` implementation",
    note = "Endpoints must implement `parse`, `invoke`, `render` and `describe`."
)]
pub trait Endpoint: Send + Sync + 'static {
    /// Where this endpoint is bound.
    fn route(&self) -> &RouteInfo;

    /// The action this endpoint invokes.
    fn action(&self) -> &Action;

    /// Extract typed arguments from `request`.
    fn parse(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Invocation, CallError>> + Send;

    /// Run the action.
    fn invoke(
        &self,
        invocation: Invocation,
    ) -> impl Future<Output = Result<Value, CallError>> + Send;

    /// Serialize `result` into a response for `request`.
    fn render(&self, request: &Request, result: Value) -> Result<Response, CallError>;

    /// Add this endpoint's documentation to `doc`.
    fn describe(&self, doc: &mut SchemaDoc);

    /// Handle one request end to end.
    ///
    /// Never fails: every [`CallError`] becomes a structured response.
    fn call(&self, request: Request) -> impl Future<Output = Response> + Send {
        let route = self.route();
        let span = tracing::info_span!(
            "action",
            action = %route.action,
            trigger = %route.trigger.kind()
        );
        async move {
            let outcome: Result<Response, CallError> = async {
                let invocation = self.parse(&request).await?;
                let result = self.invoke(invocation).await?;
                self.render(&request, result)
            }
            .await;
            match outcome {
                Ok(response) => response,
                Err(err) => {
                    if err.status().is_server_error() {
                        tracing::error!(error = %err, "call failed");
                    } else {
                        tracing::debug!(error = %err, status = %err.status(), "call rejected");
                    }
                    err.into_response()
                }
            }
        }
        .instrument(span)
    }
}

/// Object-safe version of [`Endpoint`].
pub trait DynEndpoint: Send + Sync + 'static {
    /// See [`Endpoint::route`].
    fn route_dyn(&self) -> &RouteInfo;

    /// See [`Endpoint::action`].
    fn action_dyn(&self) -> &Action;

    /// See [`Endpoint::parse`].
    fn parse_dyn<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<Invocation, CallError>>;

    /// See [`Endpoint::invoke`].
    fn invoke_dyn(&self, invocation: Invocation) -> BoxFuture<'_, Result<Value, CallError>>;

    /// See [`Endpoint::render`].
    fn render_dyn(&self, request: &Request, result: Value) -> Result<Response, CallError>;

    /// See [`Endpoint::describe`].
    fn describe_dyn(&self, doc: &mut SchemaDoc);

    /// See [`Endpoint::call`].
    fn call_dyn(&self, request: Request) -> BoxFuture<'_, Response>;
}

// Blanket implementation: any Endpoint is a DynEndpoint.
impl<T: Endpoint> DynEndpoint for T {
    fn route_dyn(&self) -> &RouteInfo {
        self.route()
    }

    fn action_dyn(&self) -> &Action {
        self.action()
    }

    fn parse_dyn<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<Invocation, CallError>> {
        Box::pin(self.parse(request))
    }

    fn invoke_dyn(&self, invocation: Invocation) -> BoxFuture<'_, Result<Value, CallError>> {
        Box::pin(self.invoke(invocation))
    }

    fn render_dyn(&self, request: &Request, result: Value) -> Result<Response, CallError> {
        self.render(request, result)
    }

    fn describe_dyn(&self, doc: &mut SchemaDoc) {
        self.describe(doc)
    }

    fn call_dyn(&self, request: Request) -> BoxFuture<'_, Response> {
        Box::pin(self.call(request))
    }
}

/// An owned, type-erased endpoint.
pub type BoxEndpoint = Box<dyn DynEndpoint>;

/// A shared, type-erased endpoint.
pub type SharedEndpoint = Arc<dyn DynEndpoint>;

macro_rules! impl_endpoint_for_erased {
    ($ty:ty) => {
        impl Endpoint for $ty {
            fn route(&self) -> &RouteInfo {
                (**self).route_dyn()
            }

            fn action(&self) -> &Action {
                (**self).action_dyn()
            }

            async fn parse(&self, request: &Request) -> Result<Invocation, CallError> {
                (**self).parse_dyn(request).await
            }

            async fn invoke(&self, invocation: Invocation) -> Result<Value, CallError> {
                (**self).invoke_dyn(invocation).await
            }

            fn render(&self, request: &Request, result: Value) -> Result<Response, CallError> {
                (**self).render_dyn(request, result)
            }

            fn describe(&self, doc: &mut SchemaDoc) {
                (**self).describe_dyn(doc)
            }

            // Forward so that an inner endpoint's own `call` is honored.
            // `(**self)` targets the vtable; `self.call_dyn` would recurse.
            async fn call(&self, request: Request) -> Response {
                (**self).call_dyn(request).await
            }
        }
    };
}

impl_endpoint_for_erased!(Box<dyn DynEndpoint>);
impl_endpoint_for_erased!(Arc<dyn DynEndpoint>);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bearer_token_extraction() {
        assert_eq!(Request::get("/").with_bearer("abc").bearer_token(), Some("abc"));
        assert_eq!(
            Request::get("/").with_header("authorization", "abc").bearer_token(),
            Some("abc")
        );
        assert_eq!(
            Request::get("/").with_header("authorization", "Basic xyz").bearer_token(),
            None
        );
        assert_eq!(Request::get("/").bearer_token(), None);
    }

    #[test]
    fn not_modified_drops_body() {
        let mut response = Response::ok(json!("bar"));
        response
            .headers
            .insert(header::ETAG, HeaderValue::from_static("\"x\""));
        let response = response.into_not_modified();
        assert_eq!(response.status, StatusCode::NOT_MODIFIED);
        assert!(response.body.is_none());
        assert_eq!(response.header(header::ETAG), Some("\"x\""));
        assert_eq!(response.header(header::CONTENT_TYPE), None);
    }
}
