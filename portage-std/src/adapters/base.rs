//! The terminal endpoint: parse, invoke under the timeout watch, render.

use super::BASE_PRIORITY;
use crate::{
    hooks::TimeoutWatch,
    parse::{RequestParser, ResultRenderer},
    route::RouteStyle,
};
use portage_core::{
    Action, AdapterFactory, BoxEndpoint, CallError, Chain, ConfigurationError, Endpoint,
    FactoryRole, Invocation, OperationDoc, Request, Response, RouteInfo, SchemaDoc, Trigger,
    TriggerKind,
};
use serde_json::Value;

/// Terminal factory producing [`BaseEndpoint`]s.
#[derive(Debug, Clone)]
pub struct BaseEndpointFactory {
    routes: RouteStyle,
    kinds: Vec<TriggerKind>,
}

impl BaseEndpointFactory {
    /// A terminal for every trigger kind.
    pub fn new(routes: RouteStyle) -> Self {
        Self::for_kinds(routes, TriggerKind::ALL)
    }

    /// A terminal for `kinds` only.
    pub fn for_kinds(routes: RouteStyle, kinds: impl IntoIterator<Item = TriggerKind>) -> Self {
        Self {
            routes,
            kinds: kinds.into_iter().collect(),
        }
    }
}

impl AdapterFactory for BaseEndpointFactory {
    fn name(&self) -> &'static str {
        "base"
    }

    fn priority(&self) -> i32 {
        BASE_PRIORITY
    }

    fn role(&self) -> FactoryRole {
        FactoryRole::Terminal
    }

    fn supports(&self, kind: TriggerKind) -> bool {
        self.kinds.contains(&kind)
    }

    fn create(
        &self,
        action: &Action,
        trigger: &Trigger,
        _remaining: Chain<'_>,
    ) -> Result<Option<BoxEndpoint>, ConfigurationError> {
        if action.receiver_param().is_some() {
            return Err(ConfigurationError::UnboundReceiver(action.name().to_string()));
        }
        let path = trigger
            .as_web()
            .map(|web| self.routes.path_for(action.name(), web));
        Ok(Some(Box::new(BaseEndpoint::new(
            action.clone(),
            RouteInfo {
                action: action.name().to_string(),
                trigger: trigger.clone(),
                path,
            },
        ))))
    }
}

/// Parses with a [`RequestParser`], invokes under a [`TimeoutWatch`] and
/// renders with a [`ResultRenderer`].
pub struct BaseEndpoint {
    action: Action,
    route: RouteInfo,
    parser: RequestParser,
    renderer: ResultRenderer,
    watch: TimeoutWatch,
}

impl BaseEndpoint {
    /// An endpoint for `action` bound at `route`.
    pub fn new(action: Action, route: RouteInfo) -> Self {
        Self {
            parser: RequestParser::for_trigger(&route.trigger),
            renderer: ResultRenderer,
            watch: TimeoutWatch::new(action.timeout()),
            action,
            route,
        }
    }
}

impl Endpoint for BaseEndpoint {
    fn route(&self) -> &RouteInfo {
        &self.route
    }

    fn action(&self) -> &Action {
        &self.action
    }

    async fn parse(&self, request: &Request) -> Result<Invocation, CallError> {
        self.parser.parse(&self.action, request)
    }

    async fn invoke(&self, invocation: Invocation) -> Result<Value, CallError> {
        let watched = self
            .watch
            .watch(self.action.name(), self.action.invoke(invocation))
            .await;
        watched.output
    }

    fn render(&self, _request: &Request, result: Value) -> Result<Response, CallError> {
        self.renderer.render(&self.action, result)
    }

    fn describe(&self, doc: &mut SchemaDoc) {
        doc.operations.push(OperationDoc {
            action: self.action.name().to_string(),
            description: self.action.description().map(str::to_string),
            method: self.route.method().map(|m| m.to_string()),
            path: self.route.path.clone(),
            params: self.action.param_schema().describe(),
            result: self.action.result_schema().describe(),
            authenticated: false,
            required_scope: None,
            cache: None,
        });
    }
}
