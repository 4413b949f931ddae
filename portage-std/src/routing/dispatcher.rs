//! Priority-ordered event dispatch.

use portage_core::{BoxHandler, EventRouter, RoutingError};
use serde_json::Value;
use std::fmt;
use tracing::Instrument;

/// Consults routers from highest to lowest priority; the first to produce
/// a handler wins.
#[derive(Default)]
pub struct EventDispatcher {
    routers: Vec<Box<dyn EventRouter>>,
}

impl EventDispatcher {
    /// Sort `routers` by descending priority. Ties keep their given order.
    pub fn new(mut routers: Vec<Box<dyn EventRouter>>) -> Self {
        routers.sort_by_key(|r| std::cmp::Reverse(r.priority()));
        Self { routers }
    }

    /// Start an empty builder.
    pub fn builder() -> EventDispatcherBuilder {
        EventDispatcherBuilder::default()
    }

    /// Router names, in consultation order.
    pub fn names(&self) -> Vec<&'static str> {
        self.routers.iter().map(|r| r.name()).collect()
    }

    /// The handler for `event`.
    ///
    /// A router that recognises the shape but rejects the content stops the
    /// search with its error.
    pub fn create_handler(&self, event: &Value) -> Result<BoxHandler<'_>, RoutingError> {
        for router in &self.routers {
            if let Some(handler) = router.create_handler(event)? {
                tracing::debug!(router = router.name(), handler = handler.name(), "event routed");
                return Ok(handler);
            }
        }
        Err(RoutingError::NoHandler)
    }

    /// Route and handle `event`.
    pub async fn dispatch(&self, event: Value) -> Result<Value, RoutingError> {
        let handler = self.create_handler(&event).inspect_err(|err| {
            tracing::warn!(error = %err, "event rejected");
        })?;
        let span = tracing::info_span!("event", handler = handler.name());
        Ok(handler.handle(event).instrument(span).await)
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("routers", &self.names())
            .finish()
    }
}

/// Collects routers for an [`EventDispatcher`].
#[derive(Default)]
pub struct EventDispatcherBuilder {
    routers: Vec<Box<dyn EventRouter>>,
}

impl EventDispatcherBuilder {
    /// Add a router.
    pub fn with<R: EventRouter + 'static>(mut self, router: R) -> Self {
        self.routers.push(Box::new(router));
        self
    }

    /// Sort and freeze.
    pub fn build(self) -> EventDispatcher {
        EventDispatcher::new(self.routers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::{BoxFuture, FutureExt};
    use portage_core::EventHandler;
    use serde_json::json;

    struct Named(&'static str);

    impl EventHandler for Named {
        fn name(&self) -> &'static str {
            self.0
        }
        fn handle(&self, _: Value) -> BoxFuture<'_, Value> {
            async move { json!(self.0) }.boxed()
        }
    }

    struct KeyRouter {
        key: &'static str,
        priority: i32,
    }

    impl EventRouter for KeyRouter {
        fn name(&self) -> &'static str {
            self.key
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn create_handler<'a>(
            &'a self,
            event: &Value,
        ) -> Result<Option<BoxHandler<'a>>, RoutingError> {
            match event.get(self.key) {
                Some(Value::Null) => Err(RoutingError::MalformedEvent(self.key.into())),
                Some(_) => Ok(Some(Box::new(Named(self.key)))),
                None => Ok(None),
            }
        }
    }

    fn dispatcher() -> EventDispatcher {
        EventDispatcher::builder()
            .with(KeyRouter { key: "low", priority: 1 })
            .with(KeyRouter { key: "high", priority: 9 })
            .build()
    }

    #[test]
    fn consults_by_priority() {
        let dispatcher = dispatcher();
        assert_eq!(dispatcher.names(), vec!["high", "low"]);
        let event = json!({ "low": 1, "high": 1 });
        assert_eq!(dispatcher.create_handler(&event).unwrap().name(), "high");
        assert_eq!(dispatcher.create_handler(&json!({ "low": 1 })).unwrap().name(), "low");
    }

    #[test]
    fn selection_is_deterministic() {
        let dispatcher = dispatcher();
        let event = json!({ "low": 1, "high": 1 });
        let first = dispatcher.create_handler(&event).unwrap().name();
        for _ in 0..10 {
            assert_eq!(dispatcher.create_handler(&event).unwrap().name(), first);
        }
    }

    #[tokio::test]
    async fn unmatched_and_rejected_events() {
        let dispatcher = dispatcher();
        assert_eq!(dispatcher.dispatch(json!({})).await, Err(RoutingError::NoHandler));
        assert_eq!(
            dispatcher.dispatch(json!({ "high": null, "low": 1 })).await,
            Err(RoutingError::MalformedEvent("high".into()))
        );
        assert_eq!(dispatcher.dispatch(json!({ "low": 1 })).await, Ok(json!("low")));
    }
}
