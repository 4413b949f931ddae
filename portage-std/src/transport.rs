//! Transports: a named factory chain plus the trigger kinds it must serve.
//!
//! [`Transport::build`] runs every action of a registry through the chain.
//! A trigger of a required kind that no factory handles is a start-up
//! failure, so misconfigured deployments never start serving.

use crate::{
    adapters::{AuthorizationFactory, BaseEndpointFactory, CachingFactory, SelfBindingFactory},
    config::PortageConfig,
    route::RouteStyle,
};
use portage_core::{
    Action, ActionRegistry, Authorizer, BoxEndpoint, ConfigurationError, Endpoint, FactoryChain,
    SchemaDoc, SharedEndpoint, Trigger, TriggerKind,
};
use std::{fmt, sync::Arc};

/// A factory chain bound to a transport.
#[derive(Clone)]
pub struct Transport {
    name: &'static str,
    chain: FactoryChain,
    required: Vec<TriggerKind>,
}

impl Transport {
    /// A transport named `name` using `chain`.
    pub fn new(name: &'static str, chain: FactoryChain) -> Self {
        Self {
            name,
            chain,
            required: Vec::new(),
        }
    }

    /// Fail the build if a trigger of `kind` is left without an endpoint.
    pub fn require(mut self, kind: TriggerKind) -> Self {
        if !self.required.contains(&kind) {
            self.required.push(kind);
        }
        self
    }

    /// HTTP gateways: binding, authorization, caching, base.
    pub fn web(
        routes: RouteStyle,
        authorizer: Arc<dyn Authorizer>,
    ) -> Result<Self, ConfigurationError> {
        let chain = FactoryChain::builder()
            .with(SelfBindingFactory)
            .with(AuthorizationFactory::shared(authorizer))
            .with(CachingFactory)
            .with(BaseEndpointFactory::for_kinds(routes, [TriggerKind::Web]))
            .build()?;
        Ok(Self::new("web", chain).require(TriggerKind::Web))
    }

    /// Queue, resolver and direct invocation: binding, authorization, base.
    pub fn event(
        routes: RouteStyle,
        authorizer: Arc<dyn Authorizer>,
    ) -> Result<Self, ConfigurationError> {
        let chain = FactoryChain::builder()
            .with(SelfBindingFactory)
            .with(AuthorizationFactory::shared(authorizer))
            .with(BaseEndpointFactory::for_kinds(routes, [TriggerKind::Web, TriggerKind::Queue]))
            .build()?;
        Ok(Self::new("event", chain)
            .require(TriggerKind::Web)
            .require(TriggerKind::Queue))
    }

    /// Fixed-rate timers: binding, base. Timers carry no credentials.
    pub fn schedule() -> Result<Self, ConfigurationError> {
        let chain = FactoryChain::builder()
            .with(SelfBindingFactory)
            .with(BaseEndpointFactory::for_kinds(RouteStyle::default(), [TriggerKind::FixedRate]))
            .build()?;
        Ok(Self::new("schedule", chain).require(TriggerKind::FixedRate))
    }

    /// Transport name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The factory chain.
    pub fn chain(&self) -> &FactoryChain {
        &self.chain
    }

    /// Build one endpoint, enforcing required kinds.
    pub fn build_for(
        &self,
        action: &Action,
        trigger: &Trigger,
    ) -> Result<Option<BoxEndpoint>, ConfigurationError> {
        let kind = trigger.kind();
        match self.chain.build_endpoint(action, trigger)? {
            Some(endpoint) => Ok(Some(endpoint)),
            None if self.required.contains(&kind) => Err(ConfigurationError::NoTerminal {
                action: action.name().to_string(),
                trigger: kind,
            }),
            None => Ok(None),
        }
    }

    /// Endpoints for every trigger of `kind` across `registry`.
    pub fn build_kind(
        &self,
        registry: &ActionRegistry,
        kind: TriggerKind,
    ) -> Result<EndpointSet, ConfigurationError> {
        let mut endpoints = Vec::new();
        for action in registry.all() {
            for trigger in action.triggers().iter().filter(|t| t.kind() == kind) {
                if let Some(endpoint) = self.build_for(action, trigger)? {
                    endpoints.push(SharedEndpoint::from(endpoint));
                }
            }
        }
        tracing::info!(
            transport = self.name,
            trigger = %kind,
            endpoints = endpoints.len(),
            "built endpoints"
        );
        Ok(EndpointSet { endpoints })
    }

    /// Endpoints for every trigger this transport requires.
    pub fn build(&self, registry: &ActionRegistry) -> Result<EndpointSet, ConfigurationError> {
        let mut all = EndpointSet::default();
        for &kind in &self.required {
            all.endpoints.extend(self.build_kind(registry, kind)?.endpoints);
        }
        Ok(all)
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("name", &self.name)
            .field("chain", &self.chain)
            .field("required", &self.required)
            .finish()
    }
}

/// The standard transports of one deployment.
#[derive(Debug, Clone)]
pub struct Transports {
    /// HTTP gateways.
    pub web: Transport,
    /// Queues, resolvers and direct invocation.
    pub event: Transport,
    /// Fixed-rate timers.
    pub schedule: Transport,
}

impl Transports {
    /// Build all three from `config`, verifying credentials with `authorizer`.
    pub fn from_config(
        config: &PortageConfig,
        authorizer: Arc<dyn Authorizer>,
    ) -> Result<Self, ConfigurationError> {
        let routes = RouteStyle::from_config(config);
        Ok(Self {
            web: Transport::web(routes.clone(), authorizer.clone())?,
            event: Transport::event(routes, authorizer)?,
            schedule: Transport::schedule()?,
        })
    }
}

/// Endpoints built by a transport.
#[derive(Clone, Default)]
pub struct EndpointSet {
    endpoints: Vec<SharedEndpoint>,
}

impl EndpointSet {
    /// All endpoints, in registry and trigger order.
    pub fn iter(&self) -> impl Iterator<Item = &SharedEndpoint> {
        self.endpoints.iter()
    }

    /// Endpoints of `action`.
    pub fn for_action<'a>(&'a self, action: &'a str) -> impl Iterator<Item = &'a SharedEndpoint> {
        self.endpoints.iter().filter(move |e| e.route().action == action)
    }

    /// Number of endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Documentation for every endpoint.
    pub fn describe(&self) -> SchemaDoc {
        let mut doc = SchemaDoc::default();
        for endpoint in &self.endpoints {
            endpoint.describe(&mut doc);
        }
        doc
    }
}

impl IntoIterator for EndpointSet {
    type Item = SharedEndpoint;
    type IntoIter = std::vec::IntoIter<SharedEndpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.into_iter()
    }
}
