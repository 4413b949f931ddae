//! HTTP gateway events.
//!
//! Recognised by a `path` (REST-style) or `rawPath` (HTTP-API-style) field.
//! The two variants differ only in where the method lives:
//!
//! - REST: `{ httpMethod, path, headers, queryStringParameters, body, isBase64Encoded }`
//! - HTTP API: `{ rawPath, requestContext: { http: { method } }, headers, ... }`
//!
//! The reply is `{ statusCode, headers, body?, isBase64Encoded }` with the
//! body as JSON text.

use super::{GATEWAY_PRIORITY, table::RouteTable};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use futures::future::{BoxFuture, FutureExt};
use portage_core::{
    BoxHandler, CallError, EventHandler, EventRouter, Request, Response, RoutingError,
    ValidationError, first_usable,
    http::{HeaderMap, HeaderName, HeaderValue, Method},
};
use serde_json::{Map, Value, json};
use std::{collections::BTreeMap, sync::Arc};

/// Routes gateway events through a [`RouteTable`].
#[derive(Clone)]
pub struct GatewayRouter {
    table: Arc<RouteTable>,
}

impl GatewayRouter {
    /// A router over `table`.
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }
}

impl EventRouter for GatewayRouter {
    fn name(&self) -> &'static str {
        "gateway"
    }

    fn priority(&self) -> i32 {
        GATEWAY_PRIORITY
    }

    fn create_handler<'a>(&'a self, event: &Value) -> Result<Option<BoxHandler<'a>>, RoutingError> {
        let has_path = |field: &str| event.get(field).is_some_and(Value::is_string);
        if !(has_path("path") || has_path("rawPath")) {
            return Ok(None);
        }
        let candidates: Vec<BoxHandler<'a>> = vec![
            Box::new(RestHandler { table: &self.table }),
            Box::new(HttpApiHandler { table: &self.table }),
        ];
        first_usable(candidates, event)
            .map(Some)
            .ok_or_else(|| RoutingError::MalformedEvent("gateway event without a method".into()))
    }
}

struct RestHandler<'a> {
    table: &'a RouteTable,
}

impl EventHandler for RestHandler<'_> {
    fn name(&self) -> &'static str {
        "gateway-rest"
    }

    fn is_usable(&self, event: &Value) -> bool {
        event.get("httpMethod").is_some_and(Value::is_string)
            && event.get("path").is_some_and(Value::is_string)
    }

    fn handle(&self, event: Value) -> BoxFuture<'_, Value> {
        async move {
            let method = text(&event, "/httpMethod");
            let path = text(&event, "/path");
            respond(self.table, request_from(method, path, &event)).await
        }
        .boxed()
    }
}

struct HttpApiHandler<'a> {
    table: &'a RouteTable,
}

impl EventHandler for HttpApiHandler<'_> {
    fn name(&self) -> &'static str {
        "gateway-http-api"
    }

    fn is_usable(&self, event: &Value) -> bool {
        event.pointer("/requestContext/http/method").is_some_and(Value::is_string)
    }

    fn handle(&self, event: Value) -> BoxFuture<'_, Value> {
        async move {
            let method = text(&event, "/requestContext/http/method");
            let path = match event.get("rawPath") {
                Some(Value::String(raw)) => raw.as_str(),
                _ => text(&event, "/path"),
            };
            respond(self.table, request_from(method, path, &event)).await
        }
        .boxed()
    }
}

fn text<'e>(event: &'e Value, pointer: &str) -> &'e str {
    event.pointer(pointer).and_then(Value::as_str).unwrap_or_default()
}

async fn respond(table: &RouteTable, request: Result<Request, CallError>) -> Value {
    let response = match request {
        Ok(request) => table.dispatch(request).await,
        Err(err) => err.into_response(),
    };
    gateway_response(&response)
}

fn request_from(method: &str, path: &str, event: &Value) -> Result<Request, CallError> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| ValidationError::new("httpMethod", "unknown method"))?;
    let mut request = Request::new(method, path);
    request.headers = headers_from(event.get("headers"));
    request.query = string_map(event.get("queryStringParameters"));
    request.body = body_from(event)?;
    Ok(request)
}

/// Header object of a platform event; non-string values are skipped.
pub(crate) fn headers_from(headers: Option<&Value>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers.and_then(Value::as_object).into_iter().flatten() {
        let (Some(value), Ok(name)) = (value.as_str(), HeaderName::from_bytes(name.as_bytes()))
        else {
            continue;
        };
        if let Ok(value) = HeaderValue::from_str(value) {
            map.append(name, value);
        }
    }
    map
}

fn string_map(values: Option<&Value>) -> BTreeMap<String, String> {
    values
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k.clone(), s.clone())),
            Value::Null => None,
            other => Some((k.clone(), other.to_string())),
        })
        .collect()
}

fn body_from(event: &Value) -> Result<Option<Value>, CallError> {
    let raw = match event.get("body") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(raw)) => raw,
        Some(other) => return Ok(Some(other.clone())),
    };
    let text = if event.get("isBase64Encoded").and_then(Value::as_bool).unwrap_or(false) {
        let bytes = STANDARD
            .decode(raw)
            .map_err(|e| ValidationError::new("body", e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ValidationError::new("body", e.to_string()))?
    } else {
        raw.clone()
    };
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| ValidationError::new("body", format!("invalid JSON: {e}")).into())
}

fn gateway_response(response: &Response) -> Value {
    let headers: Map<String, Value> = response
        .headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), Value::from(v))))
        .collect();
    let mut reply = json!({
        "statusCode": response.status.as_u16(),
        "headers": headers,
        "isBase64Encoded": false,
    });
    if let Some(body) = &response.body {
        reply["body"] = Value::String(body.to_string());
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        route::RouteStyle,
        testing::{StaticAuthorizer, echo_builder, gateway_event},
        transport::Transport,
    };
    use portage_core::{ActionRegistry, StaticFinder, WebTrigger};

    fn router() -> GatewayRouter {
        let add = portage_core::Action::builder("add", |inv: portage_core::Invocation| async move {
            Ok::<_, CallError>(inv.get::<i64>("a")? + inv.get::<i64>("b")?)
        })
        .param(portage_core::Param::typed("a", portage_core::ValueType::Integer))
        .param(portage_core::Param::typed("b", portage_core::ValueType::Integer))
        .trigger(WebTrigger::post())
        .build()
        .unwrap();
        let finder = StaticFinder::new().with(echo_builder().build().unwrap()).with(add);
        let registry = ActionRegistry::from_finder(&finder).unwrap();
        let style = RouteStyle::default();
        let endpoints = Transport::web(style.clone(), Arc::new(StaticAuthorizer::new()))
            .unwrap()
            .build(&registry)
            .unwrap();
        GatewayRouter::new(Arc::new(RouteTable::new(&style, endpoints).unwrap()))
    }

    async fn handle(router: &GatewayRouter, event: Value) -> Value {
        let handler = router.create_handler(&event).unwrap().unwrap();
        handler.handle(event).await
    }

    #[tokio::test]
    async fn rest_event() {
        let router = router();
        let event = gateway_event("GET", "/actions/echo", json!({ "val": "bar" }), None);
        assert_eq!(router.create_handler(&event).unwrap().unwrap().name(), "gateway-rest");
        let reply = handle(&router, event).await;
        assert_eq!(reply["statusCode"], 200);
        assert_eq!(reply["body"], "\"bar\"");
        assert_eq!(reply["headers"]["content-type"], "application/json");
    }

    #[tokio::test]
    async fn http_api_event_with_encoded_body() {
        let router = router();
        let event = json!({
            "rawPath": "/actions/add",
            "requestContext": { "http": { "method": "POST" } },
            "headers": { "content-type": "application/json" },
            "body": STANDARD.encode(r#"{"a":2,"b":3}"#),
            "isBase64Encoded": true,
        });
        assert_eq!(router.create_handler(&event).unwrap().unwrap().name(), "gateway-http-api");
        let reply = handle(&router, event).await;
        assert_eq!(reply["statusCode"], 200);
        assert_eq!(reply["body"], "5");
    }

    #[tokio::test]
    async fn invalid_json_body_is_422() {
        let router = router();
        let mut event = gateway_event("POST", "/actions/add", Value::Null, None);
        event["body"] = json!("{not json");
        let reply = handle(&router, event).await;
        assert_eq!(reply["statusCode"], 422);
    }

    #[test]
    fn unrecognised_shapes() {
        let router = router();
        assert!(router.create_handler(&json!({ "Records": [] })).unwrap().is_none());
        assert_eq!(
            router.create_handler(&json!({ "path": "/x" })).err(),
            Some(RoutingError::MalformedEvent("gateway event without a method".into()))
        );
    }
}
