//! # Event Routing Layer
//!
//! Platform events arrive untyped. An [`EventRouter`] recognises one coarse
//! event *shape* (a `path` field, an `info.fieldName`, a `Records` list, ...)
//! and produces an [`EventHandler`] for it. Routers are consulted in
//! priority order, so later routers act as fallbacks.
//!
//! Within one router, several handler variants may compete for the same
//! shape; [`first_usable`] picks the first whose [`EventHandler::is_usable`]
//! accepts the event.

use crate::error::RoutingError;
use futures::future::BoxFuture;
use serde_json::Value;

/// Handles one recognised event.
pub trait EventHandler: Send + Sync {
    /// Variant name, stable across calls.
    fn name(&self) -> &'static str;

    /// Whether this variant can handle `event`.
    fn is_usable(&self, event: &Value) -> bool {
        let _ = event;
        true
    }

    /// Process the event and produce the platform response.
    fn handle(&self, event: Value) -> BoxFuture<'_, Value>;
}

/// A boxed handler borrowing its router.
pub type BoxHandler<'a> = Box<dyn EventHandler + 'a>;

/// Recognises events by shape.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not an `EventRouter`",
    label = "missing `EventRouter` implementation",
    note = "Routers must implement `name`, `priority` and `create_handler`."
)]
pub trait EventRouter: Send + Sync {
    /// Router name for logs.
    fn name(&self) -> &'static str;

    /// Higher priorities are consulted first.
    fn priority(&self) -> i32;

    /// A handler for `event`, or `None` if the shape is not recognised.
    ///
    /// An error means the shape was recognised but the content is unusable.
    fn create_handler<'a>(&'a self, event: &Value) -> Result<Option<BoxHandler<'a>>, RoutingError>;
}

/// The first candidate that accepts `event`.
pub fn first_usable<'a>(candidates: Vec<BoxHandler<'a>>, event: &Value) -> Option<BoxHandler<'a>> {
    candidates.into_iter().find(|h| h.is_usable(event))
}
