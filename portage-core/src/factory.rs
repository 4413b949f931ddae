//! # Adapter Factory Chain
//!
//! Each transport owns a [`FactoryChain`]: a priority-sorted list of
//! [`AdapterFactory`]s. Building an endpoint walks the chain from highest to
//! lowest priority. A factory may
//!
//! - decline (return `None`), letting the next factory try;
//! - decorate: derive a new action or trigger, ask the [`Chain`] it was
//!   handed for an endpoint, and wrap the result;
//! - terminate: return an endpoint without consulting the remainder.
//!
//! The remainder is passed explicitly as a narrowed [`Chain`] slice. A
//! decorator can therefore never reach itself again, and factories stay free
//! of per-call state even though one instance serves every action.

use crate::{
    action::Action,
    endpoint::BoxEndpoint,
    error::ConfigurationError,
    trigger::{Trigger, TriggerKind},
};
use std::{fmt, sync::Arc};

/// Whether a factory delegates to the remainder of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryRole {
    /// Wraps whatever the remainder builds.
    Decorator,
    /// Builds endpoints itself.
    Terminal,
}

/// Builds (part of) an endpoint for an action and trigger.
///
/// Implementations are shared by every action of a transport and may be
/// called concurrently; they hold configuration only.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not an `AdapterFactory`",
    label = "missing `AdapterFactory` implementation",
    note = "Factories must implement `name`, `priority` and `create`."
)]
pub trait AdapterFactory: Send + Sync + 'static {
    /// Name used in logs and configuration errors.
    fn name(&self) -> &'static str;

    /// Higher priorities are consulted first.
    fn priority(&self) -> i32;

    /// Decorator or terminal.
    fn role(&self) -> FactoryRole {
        FactoryRole::Decorator
    }

    /// Whether this factory handles triggers of `kind` at all.
    fn supports(&self, kind: TriggerKind) -> bool {
        let _ = kind;
        true
    }

    /// Build an endpoint, or decline with `Ok(None)`.
    ///
    /// `remaining` holds only the factories after this one.
    fn create(
        &self,
        action: &Action,
        trigger: &Trigger,
        remaining: Chain<'_>,
    ) -> Result<Option<BoxEndpoint>, ConfigurationError>;
}

/// A shared factory handle.
pub type SharedFactory = Arc<dyn AdapterFactory>;

/// A borrowed, already-sorted view of (part of) a factory chain.
#[derive(Clone, Copy)]
pub struct Chain<'a> {
    factories: &'a [SharedFactory],
}

impl<'a> Chain<'a> {
    /// Factories in this view, highest priority first.
    pub fn factories(&self) -> &'a [SharedFactory] {
        self.factories
    }

    /// Number of factories in this view.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether this view is empty.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Ask each factory in turn; the first endpoint produced wins.
    ///
    /// `Ok(None)` means no factory here handles the trigger.
    pub fn build(
        self,
        action: &Action,
        trigger: &Trigger,
    ) -> Result<Option<BoxEndpoint>, ConfigurationError> {
        let kind = trigger.kind();
        for (index, factory) in self.factories.iter().enumerate() {
            if !factory.supports(kind) {
                continue;
            }
            let remaining = Chain {
                factories: &self.factories[index + 1..],
            };
            if let Some(endpoint) = factory.create(action, trigger, remaining)? {
                tracing::debug!(
                    action = action.name(),
                    trigger = %kind,
                    factory = factory.name(),
                    "factory produced endpoint"
                );
                return Ok(Some(endpoint));
            }
        }
        Ok(None)
    }
}

impl fmt::Debug for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.factories.iter().map(|x| (x.name(), x.priority())))
            .finish()
    }
}

/// A transport's full, priority-sorted factory list.
#[derive(Clone, Default)]
pub struct FactoryChain {
    factories: Vec<SharedFactory>,
}

impl FactoryChain {
    /// Sort `factories` by descending priority and validate the result.
    ///
    /// Equal priorities keep their registration order. Two terminals that
    /// support the same trigger kind are a [`ConfigurationError`].
    pub fn new<I>(factories: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = SharedFactory>,
    {
        let mut factories: Vec<SharedFactory> = factories.into_iter().collect();
        factories.sort_by_key(|f| std::cmp::Reverse(f.priority()));

        for kind in TriggerKind::ALL {
            let mut terminals = factories
                .iter()
                .filter(|f| f.role() == FactoryRole::Terminal && f.supports(kind));
            if let (Some(first), Some(second)) = (terminals.next(), terminals.next()) {
                return Err(ConfigurationError::ConflictingTerminals {
                    first: first.name(),
                    second: second.name(),
                    kind,
                });
            }
        }
        Ok(Self { factories })
    }

    /// Start an empty builder.
    pub fn builder() -> FactoryChainBuilder {
        FactoryChainBuilder::default()
    }

    /// The whole chain as a [`Chain`] view.
    pub fn chain(&self) -> Chain<'_> {
        Chain {
            factories: &self.factories,
        }
    }

    /// Build an endpoint for `action` and `trigger`.
    pub fn build_endpoint(
        &self,
        action: &Action,
        trigger: &Trigger,
    ) -> Result<Option<BoxEndpoint>, ConfigurationError> {
        let endpoint = self.chain().build(action, trigger)?;
        if endpoint.is_none() {
            tracing::debug!(
                action = action.name(),
                trigger = %trigger.kind(),
                "no factory handles trigger"
            );
        }
        Ok(endpoint)
    }

    /// Whether some terminal factory handles `kind`.
    pub fn terminates(&self, kind: TriggerKind) -> bool {
        self.factories
            .iter()
            .any(|f| f.role() == FactoryRole::Terminal && f.supports(kind))
    }

    /// Factory names, highest priority first.
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.name()).collect()
    }
}

impl fmt::Debug for FactoryChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryChain")
            .field("factories", &self.chain())
            .finish()
    }
}

/// Collects factories for a [`FactoryChain`].
#[derive(Default)]
pub struct FactoryChainBuilder {
    factories: Vec<SharedFactory>,
}

impl FactoryChainBuilder {
    /// Add a factory.
    pub fn with<F: AdapterFactory>(mut self, factory: F) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    /// Add a shared factory.
    pub fn with_shared(mut self, factory: SharedFactory) -> Self {
        self.factories.push(factory);
        self
    }

    /// Sort and validate.
    pub fn build(self) -> Result<FactoryChain, ConfigurationError> {
        FactoryChain::new(self.factories)
    }
}
