//! Direct invocation, for calls between services.
//!
//! Events look like `{ action, params, authorization? }`; the reply is
//! `{ statusCode, body }`. Every registered action is reachable this way,
//! whatever its declared triggers.

use super::DIRECT_PRIORITY;
use crate::transport::Transport;
use futures::future::{BoxFuture, FutureExt};
use portage_core::{
    ActionRegistry, BoxHandler, ConfigurationError, Endpoint, EventHandler, EventRouter, Request,
    RoutingError, SharedEndpoint, WebTrigger, http::header,
};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Routes direct invocations by action name.
#[derive(Default)]
pub struct DirectRouter {
    endpoints: HashMap<String, SharedEndpoint>,
}

impl DirectRouter {
    /// Build an endpoint for every action in `registry`.
    pub fn build(
        transport: &Transport,
        registry: &ActionRegistry,
    ) -> Result<Self, ConfigurationError> {
        let mut endpoints = HashMap::new();
        for action in registry.all() {
            if let Some(endpoint) = transport.build_for(action, &WebTrigger::post().into())? {
                endpoints.insert(action.name().to_string(), SharedEndpoint::from(endpoint));
            }
        }
        Ok(Self { endpoints })
    }
}

impl EventRouter for DirectRouter {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn priority(&self) -> i32 {
        DIRECT_PRIORITY
    }

    fn create_handler<'a>(&'a self, event: &Value) -> Result<Option<BoxHandler<'a>>, RoutingError> {
        if !event.get("params").is_some_and(Value::is_object) {
            return Ok(None);
        }
        let name = event
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RoutingError::MalformedEvent("direct invocation without `action`".into())
            })?;
        let endpoint = self
            .endpoints
            .get(name)
            .ok_or_else(|| RoutingError::UnknownAction(name.to_string()))?;
        Ok(Some(Box::new(DirectHandler { endpoint })))
    }
}

struct DirectHandler<'a> {
    endpoint: &'a SharedEndpoint,
}

impl EventHandler for DirectHandler<'_> {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn handle(&self, event: Value) -> BoxFuture<'_, Value> {
        async move {
            let params = event.get("params").cloned().unwrap_or_else(|| json!({}));
            let mut request = Request::post(format!("/{}", self.endpoint.route().action), params);
            if let Some(credential) = event.get("authorization").and_then(Value::as_str) {
                request = request.with_header(header::AUTHORIZATION.as_str(), credential);
            }
            let response = self.endpoint.call(request).await;
            json!({
                "statusCode": response.status.as_u16(),
                "body": response.body.unwrap_or(Value::Null),
            })
        }
        .boxed()
    }
}
