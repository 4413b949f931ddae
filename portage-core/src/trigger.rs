//! Trigger declarations.
//!
//! A [`Trigger`] declares one way an action may be invoked. Adapters select
//! by [`TriggerKind`]; an action may declare any mix of triggers, or none.

use http::Method;
use std::fmt;
use std::time::Duration;

/// How an action may be invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// An HTTP-style request.
    Web(WebTrigger),
    /// A periodic timer.
    FixedRate(FixedRateTrigger),
    /// A queue or topic message.
    Queue(QueueTrigger),
}

impl Trigger {
    /// The variant tag.
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::Web(_) => TriggerKind::Web,
            Trigger::FixedRate(_) => TriggerKind::FixedRate,
            Trigger::Queue(_) => TriggerKind::Queue,
        }
    }

    /// The web trigger, if this is one.
    pub fn as_web(&self) -> Option<&WebTrigger> {
        match self {
            Trigger::Web(web) => Some(web),
            _ => None,
        }
    }

    /// The queue trigger, if this is one.
    pub fn as_queue(&self) -> Option<&QueueTrigger> {
        match self {
            Trigger::Queue(queue) => Some(queue),
            _ => None,
        }
    }
}

impl From<WebTrigger> for Trigger {
    fn from(value: WebTrigger) -> Self {
        Trigger::Web(value)
    }
}

impl From<FixedRateTrigger> for Trigger {
    fn from(value: FixedRateTrigger) -> Self {
        Trigger::FixedRate(value)
    }
}

impl From<QueueTrigger> for Trigger {
    fn from(value: QueueTrigger) -> Self {
        Trigger::Queue(value)
    }
}

/// Tag of a [`Trigger`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TriggerKind {
    /// [`Trigger::Web`]
    Web,
    /// [`Trigger::FixedRate`]
    FixedRate,
    /// [`Trigger::Queue`]
    Queue,
}

impl TriggerKind {
    /// Every kind, in declaration order.
    pub const ALL: [TriggerKind; 3] =
        [TriggerKind::Web, TriggerKind::FixedRate, TriggerKind::Queue];
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerKind::Web => "web",
            TriggerKind::FixedRate => "fixed-rate",
            TriggerKind::Queue => "queue",
        })
    }
}

/// HTTP method plus an optional explicit path.
///
/// Without a path the route is derived from the action name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebTrigger {
    /// HTTP method.
    pub method: Method,
    /// Explicit route path.
    pub path: Option<String>,
}

impl WebTrigger {
    /// A trigger for `method` on the derived path.
    pub fn new(method: Method) -> Self {
        Self { method, path: None }
    }

    /// `GET` on the derived path.
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    /// `POST` on the derived path.
    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    /// Set an explicit path.
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Whether arguments travel in the request body.
    pub fn carries_body(&self) -> bool {
        method_carries_body(&self.method)
    }
}

/// `POST`, `PUT` and `PATCH` carry their arguments in the body.
pub fn method_carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// Run periodically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedRateTrigger {
    /// Time between runs.
    pub interval: Duration,
}

impl FixedRateTrigger {
    /// Every `seconds` seconds.
    pub fn every_secs(seconds: u64) -> Self {
        Self {
            interval: Duration::from_secs(seconds),
        }
    }
}

/// Consume messages from a named queue or topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTrigger {
    /// Queue or topic name, matched against the tail of the source ARN.
    pub queue: String,
    /// Deliver all records of a batch in one call (as the `records` argument).
    pub batch: bool,
}

impl QueueTrigger {
    /// One call per record.
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            batch: false,
        }
    }

    /// One call per batch.
    pub fn batched(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            batch: true,
        }
    }
}
