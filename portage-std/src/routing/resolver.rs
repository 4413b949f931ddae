//! GraphQL resolver events.
//!
//! Every action with a web trigger becomes a field named after the action
//! in camelCase: a query field when its first web trigger is `GET`, a
//! mutation field otherwise. Events carry `{ info: { fieldName, variables },
//! source?, request?: { headers } }`, either singly or as a list for batched
//! resolution.
//!
//! Arguments come from `arguments` when present, else `info.variables`. A
//! non-null `source` is passed as the `source` argument to actions that
//! declare one.

use super::{RESOLVER_PRIORITY, gateway::headers_from};
use crate::{route::camel_case, transport::Transport};
use futures::future::{BoxFuture, FutureExt, join_all};
use portage_core::{
    ActionRegistry, BoxHandler, ConfigurationError, Endpoint, EventHandler, EventRouter, Request,
    Response, RoutingError, SharedEndpoint, Trigger, WebTrigger, first_usable, http::Method,
};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Whether a field reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    /// A query field.
    Query,
    /// A mutation field.
    Mutation,
}

struct ResolverField {
    operation: OperationType,
    endpoint: SharedEndpoint,
}

/// Routes resolver events to actions by field name.
pub struct ResolverRouter {
    fields: BTreeMap<String, ResolverField>,
}

impl ResolverRouter {
    /// Build a field for every action with a web trigger.
    ///
    /// Arguments always arrive as typed JSON, so endpoints are built for a
    /// body-carrying trigger regardless of the declared method.
    pub fn build(
        transport: &Transport,
        registry: &ActionRegistry,
    ) -> Result<Self, ConfigurationError> {
        let mut fields = BTreeMap::new();
        for action in registry.all() {
            let Some(web) = action.triggers().iter().find_map(Trigger::as_web) else {
                continue;
            };
            let operation = if web.method == Method::GET {
                OperationType::Query
            } else {
                OperationType::Mutation
            };
            let Some(endpoint) = transport.build_for(action, &WebTrigger::post().into())? else {
                continue;
            };
            let name = camel_case(action.name());
            if fields.contains_key(&name) {
                return Err(ConfigurationError::RouteConflict {
                    method: "RESOLVE".into(),
                    path: name,
                });
            }
            fields.insert(
                name,
                ResolverField {
                    operation,
                    endpoint: endpoint.into(),
                },
            );
        }
        Ok(Self { fields })
    }

    /// Field names and their operation types.
    pub fn fields(&self) -> impl Iterator<Item = (&str, OperationType)> {
        self.fields.iter().map(|(name, f)| (name.as_str(), f.operation))
    }

    fn field_name(event: &Value) -> Option<&str> {
        let first = match event {
            Value::Array(items) => items.first()?,
            other => other,
        };
        first.pointer("/info/fieldName")?.as_str()
    }
}

impl EventRouter for ResolverRouter {
    fn name(&self) -> &'static str {
        "resolver"
    }

    fn priority(&self) -> i32 {
        RESOLVER_PRIORITY
    }

    fn create_handler<'a>(&'a self, event: &Value) -> Result<Option<BoxHandler<'a>>, RoutingError> {
        let Some(name) = Self::field_name(event) else {
            return Ok(None);
        };
        let field = self
            .fields
            .get(name)
            .ok_or_else(|| RoutingError::UnknownAction(name.to_string()))?;
        let candidates: Vec<BoxHandler<'a>> = vec![
            Box::new(SingleResolver { field }),
            Box::new(BatchResolver { field }),
        ];
        Ok(first_usable(candidates, event))
    }
}

struct SingleResolver<'a> {
    field: &'a ResolverField,
}

impl EventHandler for SingleResolver<'_> {
    fn name(&self) -> &'static str {
        "resolver-single"
    }

    fn is_usable(&self, event: &Value) -> bool {
        event.is_object()
    }

    fn handle(&self, event: Value) -> BoxFuture<'_, Value> {
        async move {
            let response = resolve(&self.field.endpoint, &event).await;
            match error_of(&response) {
                Some(error) => error,
                None => response.body.unwrap_or(Value::Null),
            }
        }
        .boxed()
    }
}

struct BatchResolver<'a> {
    field: &'a ResolverField,
}

impl EventHandler for BatchResolver<'_> {
    fn name(&self) -> &'static str {
        "resolver-batch"
    }

    fn is_usable(&self, event: &Value) -> bool {
        event.is_array()
    }

    fn handle(&self, event: Value) -> BoxFuture<'_, Value> {
        async move {
            let items = match &event {
                Value::Array(items) => items.as_slice(),
                _ => &[],
            };
            let responses =
                join_all(items.iter().map(|item| resolve(&self.field.endpoint, item))).await;
            let results: Vec<Value> = responses
                .into_iter()
                .map(|response| match error_of(&response) {
                    Some(mut error) => {
                        error["data"] = Value::Null;
                        error
                    }
                    None => json!({ "data": response.body.unwrap_or(Value::Null) }),
                })
                .collect();
            Value::Array(results)
        }
        .boxed()
    }
}

async fn resolve(endpoint: &SharedEndpoint, item: &Value) -> Response {
    let mut args = item
        .get("arguments")
        .or_else(|| item.pointer("/info/variables"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Map::new);
    let declares_source = endpoint.action().params().iter().any(|p| p.name() == "source");
    if let Some(source) = item.get("source").filter(|s| !s.is_null() && declares_source) {
        args.insert("source".into(), source.clone());
    }
    let mut request = Request::post(format!("/{}", endpoint.route().action), Value::Object(args));
    request.headers = headers_from(item.pointer("/request/headers"));
    endpoint.call(request).await
}

fn error_of(response: &Response) -> Option<Value> {
    if response.is_success() {
        return None;
    }
    let error = response.body.as_ref().and_then(|b| b.get("error"));
    Some(json!({
        "errorType": error.and_then(|e| e.get("kind")).cloned().unwrap_or(Value::Null),
        "errorMessage": error.and_then(|e| e.get("message")).cloned().unwrap_or(Value::Null),
    }))
}
