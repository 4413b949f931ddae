//! Application assembly.
//!
//! [`Portage`] wires a registry, the standard transports, the web route
//! table and the event dispatcher together from one [`PortageConfig`].
//! Everything is built up front; configuration mistakes surface from
//! [`PortageBuilder::build`], never from a request.

use crate::{
    authorizer::HmacAuthorizer,
    config::PortageConfig,
    route::RouteStyle,
    routing::{
        BatchRouter, DirectRouter, EventDispatcher, GatewayRouter, ResolverRouter, RouteTable,
    },
    transport::{EndpointSet, Transports},
};
use portage_core::{
    Action, ActionRegistry, AuthorizationError, Authorizer, Endpoint, Finder, Identity,
    PortageError, Request, Response, RoutingError, SchemaDoc, TriggerKind,
};
use serde_json::Value;
use std::{fmt, sync::Arc};

/// A fully assembled deployment.
pub struct Portage {
    config: PortageConfig,
    registry: Arc<ActionRegistry>,
    transports: Transports,
    web: EndpointSet,
    routes: Arc<RouteTable>,
    dispatcher: EventDispatcher,
}

impl Portage {
    /// Start assembling a deployment.
    pub fn builder() -> PortageBuilder {
        PortageBuilder::default()
    }

    /// The configuration in use.
    pub fn config(&self) -> &PortageConfig {
        &self.config
    }

    /// Every registered action.
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// The transports endpoints were built with.
    pub fn transports(&self) -> &Transports {
        &self.transports
    }

    /// Serve a web request.
    pub async fn handle(&self, request: Request) -> Response {
        self.routes.dispatch(request).await
    }

    /// Route and handle a platform event.
    pub async fn dispatch(&self, event: Value) -> Result<Value, RoutingError> {
        self.dispatcher.dispatch(event).await
    }

    /// The event dispatcher.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Web operations `identity` is allowed to see.
    pub fn describe(&self, identity: Option<&Identity>) -> SchemaDoc {
        let mut doc = SchemaDoc::default();
        for endpoint in self.web.iter() {
            if endpoint.action().access_control().is_viewable(identity) {
                endpoint.describe(&mut doc);
            }
        }
        doc
    }

    /// Start fixed-rate timers, unless disabled by configuration.
    #[cfg(feature = "tokio")]
    pub fn start_scheduler(
        &self,
    ) -> Result<Option<crate::scheduler::SchedulerHandle>, PortageError> {
        if !self.config.scheduler.enabled {
            tracing::info!("scheduler disabled by configuration");
            return Ok(None);
        }
        let scheduler =
            crate::scheduler::Scheduler::build(&self.transports.schedule, &self.registry)?;
        Ok(Some(scheduler.start()))
    }
}

impl fmt::Debug for Portage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Portage")
            .field("registry", &self.registry)
            .field("routes", &self.routes.len())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Collects actions, configuration and an authorizer.
#[derive(Default)]
pub struct PortageBuilder {
    config: PortageConfig,
    authorizer: Option<Arc<dyn Authorizer>>,
    actions: Vec<Action>,
    finders: Vec<Box<dyn Finder>>,
}

impl PortageBuilder {
    /// Use `config` instead of the defaults.
    pub fn config(mut self, config: PortageConfig) -> Self {
        self.config = config;
        self
    }

    /// Verify bearer credentials with `authorizer`.
    ///
    /// Without one, an [`HmacAuthorizer`] is built from `auth.secret`; with
    /// no secret either, every credential is rejected.
    pub fn authorizer(self, authorizer: impl Authorizer + 'static) -> Self {
        self.shared_authorizer(Arc::new(authorizer))
    }

    /// Verify bearer credentials with a shared authorizer.
    pub fn shared_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Register `action`.
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Register everything `finder` discovers.
    pub fn finder(mut self, finder: impl Finder + 'static) -> Self {
        self.finders.push(Box::new(finder));
        self
    }

    /// Register, build every endpoint and freeze.
    pub fn build(self) -> Result<Portage, PortageError> {
        self.config.validate().map_err(|e| PortageError::Custom(Box::new(e)))?;

        let mut registry = ActionRegistry::new();
        for action in self.actions {
            registry.register(action)?;
        }
        for finder in &self.finders {
            for action in finder.find()? {
                registry.register(action)?;
            }
        }

        let authorizer: Arc<dyn Authorizer> = match self.authorizer {
            Some(authorizer) => authorizer,
            None => match &self.config.auth.secret {
                Some(_) => Arc::new(
                    HmacAuthorizer::from_config(&self.config.auth)
                        .map_err(|e| PortageError::Custom(Box::new(e)))?,
                ),
                None => Arc::new(NoCredentials),
            },
        };

        let transports = Transports::from_config(&self.config, authorizer)?;
        let web = transports.web.build_kind(&registry, TriggerKind::Web)?;
        let routes = Arc::new(RouteTable::new(
            &RouteStyle::from_config(&self.config),
            web.iter().cloned(),
        )?);
        let queues = transports.event.build_kind(&registry, TriggerKind::Queue)?;
        let dispatcher = EventDispatcher::builder()
            .with(GatewayRouter::new(routes.clone()))
            .with(ResolverRouter::build(&transports.event, &registry)?)
            .with(BatchRouter::new(queues))
            .with(DirectRouter::build(&transports.event, &registry)?)
            .build();

        tracing::info!(
            actions = registry.len(),
            routes = routes.len(),
            routers = ?dispatcher.names(),
            "portage assembled"
        );
        Ok(Portage {
            config: self.config,
            registry: Arc::new(registry),
            transports,
            web,
            routes,
            dispatcher,
        })
    }
}

/// Rejects every credential; used when no authorizer is configured.
struct NoCredentials;

impl Authorizer for NoCredentials {
    fn encode(&self, _: &Identity) -> Result<String, AuthorizationError> {
        Err(AuthorizationError::Malformed("no authorizer configured".into()))
    }

    fn authorize(&self, _: &str) -> Result<Identity, AuthorizationError> {
        Err(AuthorizationError::Malformed("no authorizer configured".into()))
    }
}
