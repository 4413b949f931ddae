//! Response caching headers and conditional requests.
//!
//! Applies to safe web methods only. Successful responses get `ETag`,
//! `Last-Modified`, `Expires` and `Cache-Control` per the action's
//! [`CacheControl`]; a request whose conditional headers match is answered
//! with `304 Not Modified` and no body. The action still runs: the headers
//! are derived from its result.

use super::CACHING_PRIORITY;
use portage_core::{
    Action, AdapterFactory, BoxEndpoint, CacheControl, CallError, Chain, ConfigurationError,
    Endpoint, Invocation, Request, Response, RouteInfo, SchemaDoc, Trigger, TriggerKind,
    http::Method,
};
use serde_json::Value;

/// Decorator factory adding cache headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CachingFactory;

impl CachingFactory {
    /// The factory.
    pub fn new() -> Self {
        Self
    }
}

impl AdapterFactory for CachingFactory {
    fn name(&self) -> &'static str {
        "caching"
    }

    fn priority(&self) -> i32 {
        CACHING_PRIORITY
    }

    fn supports(&self, kind: TriggerKind) -> bool {
        kind == TriggerKind::Web
    }

    fn create(
        &self,
        action: &Action,
        trigger: &Trigger,
        remaining: Chain<'_>,
    ) -> Result<Option<BoxEndpoint>, ConfigurationError> {
        let cacheable_method = trigger
            .as_web()
            .is_some_and(|web| web.method == Method::GET || web.method == Method::HEAD);
        if action.cache_control().is_no_cache() || !cacheable_method {
            return Ok(None);
        }
        let Some(inner) = remaining.build(action, trigger)? else {
            return Ok(None);
        };
        // Responses that depend on the caller must not land in shared caches.
        let policy = if action.access_control().is_open() && action.identity_param().is_none() {
            action.cache_control().clone()
        } else {
            action.cache_control().clone().private()
        };
        Ok(Some(Box::new(CachedEndpoint { inner, policy })))
    }
}

/// An endpoint whose successful responses carry cache headers.
pub struct CachedEndpoint {
    inner: BoxEndpoint,
    policy: CacheControl,
}

impl Endpoint for CachedEndpoint {
    fn route(&self) -> &RouteInfo {
        self.inner.route()
    }

    fn action(&self) -> &Action {
        self.inner.action()
    }

    async fn parse(&self, request: &Request) -> Result<Invocation, CallError> {
        self.inner.parse(request).await
    }

    async fn invoke(&self, invocation: Invocation) -> Result<Value, CallError> {
        self.inner.invoke(invocation).await
    }

    fn render(&self, request: &Request, result: Value) -> Result<Response, CallError> {
        let mut response = self.inner.render(request, result)?;
        let Some(body) = response.body.as_ref().filter(|_| response.is_success()) else {
            return Ok(response);
        };
        let now = chrono::Utc::now();
        let header = self.policy.header_for(body, now);
        header.apply(&mut response.headers, now);
        if header.matches_request(&request.headers) {
            tracing::debug!(action = %self.route().action, "conditional request matched");
            return Ok(response.into_not_modified());
        }
        Ok(response)
    }

    fn describe(&self, doc: &mut SchemaDoc) {
        self.inner.describe(doc);
        if let Some(op) = doc.last_mut() {
            op.cache = Some(format!("{:?}", self.policy.strategy()));
        }
    }
}
