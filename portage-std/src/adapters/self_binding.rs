//! Binds the receiver of method-style actions.
//!
//! The receiver is resolved on first call and memoized for the lifetime of
//! the bound action. Concurrent first calls may each resolve one, but only
//! the first published receiver is ever used.

use super::SELF_BINDING_PRIORITY;
use portage_core::{
    Action, AdapterFactory, BoxEndpoint, CallError, Chain, ConfigurationError, Invocation,
    InvokeFn, Receiver, Trigger,
};
use futures::future::{self, FutureExt};
use std::sync::{Arc, OnceLock};

/// Decorator that replaces a method-style action with a bound one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfBindingFactory;

impl SelfBindingFactory {
    /// The factory.
    pub fn new() -> Self {
        Self
    }

    /// A copy of `action` whose receiver is resolved once and reused.
    pub fn bind(action: &Action) -> Action {
        let cell: Arc<OnceLock<Receiver>> = Arc::new(OnceLock::new());
        let unbound = action.clone();
        let invoke: InvokeFn = Arc::new(move |invocation: Invocation| {
            match memoized_receiver(&cell, &unbound) {
                Ok(Some(receiver)) => unbound.invoke(invocation.with_receiver(receiver)),
                Ok(None) => unbound.invoke(invocation),
                Err(err) => future::ready(Err(err)).boxed(),
            }
        });
        action.bind_receiver(invoke)
    }
}

fn memoized_receiver(
    cell: &OnceLock<Receiver>,
    action: &Action,
) -> Result<Option<Receiver>, CallError> {
    if let Some(receiver) = cell.get() {
        return Ok(Some(receiver.clone()));
    }
    let Some(resolved) = action.resolve_receiver().transpose()? else {
        return Ok(None);
    };
    tracing::debug!(action = action.name(), "resolved receiver");
    // Another caller may have published first; theirs wins.
    let _ = cell.set(resolved);
    Ok(cell.get().cloned())
}

impl AdapterFactory for SelfBindingFactory {
    fn name(&self) -> &'static str {
        "self-binding"
    }

    fn priority(&self) -> i32 {
        SELF_BINDING_PRIORITY
    }

    fn create(
        &self,
        action: &Action,
        trigger: &Trigger,
        remaining: Chain<'_>,
    ) -> Result<Option<BoxEndpoint>, ConfigurationError> {
        if action.receiver_param().is_none() {
            return Ok(None);
        }
        remaining.build(&Self::bind(action), trigger)
    }
}
