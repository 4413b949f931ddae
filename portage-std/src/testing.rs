//! Testing utilities.
//!
//! - [`StaticAuthorizer`]: an authorizer backed by a fixed token table
//! - [`RecordingFactory`]: a declining factory that records when it is consulted
//! - [`echo_action`]: a small action for exercising transports
//! - [`gateway_event`] / [`direct_event`]: platform event builders

use portage_core::{
    AccessControl, Action, ActionBuilder, AdapterFactory, AuthorizationError, Authorizer,
    BoxEndpoint, CacheControl, CallError, Chain, ConfigurationError, Identity, Invocation, Param,
    Trigger, ValueType, WebTrigger,
};
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

// ============================================================================
// Static Authorizer
// ============================================================================

/// An [`Authorizer`] with a fixed token → identity table.
///
/// [`Authorizer::encode`] mints sequential tokens and remembers them.
#[derive(Debug, Default)]
pub struct StaticAuthorizer {
    tokens: Mutex<HashMap<String, Identity>>,
    minted: AtomicUsize,
}

impl StaticAuthorizer {
    /// An authorizer that knows no tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as `identity`.
    pub fn with_token(self, token: impl Into<String>, identity: Identity) -> Self {
        self.insert(token.into(), identity);
        self
    }

    fn insert(&self, token: String, identity: Identity) {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(token, identity);
    }
}

impl Authorizer for StaticAuthorizer {
    fn encode(&self, identity: &Identity) -> Result<String, AuthorizationError> {
        let token = format!("static-{}", self.minted.fetch_add(1, Ordering::Relaxed));
        self.insert(token.clone(), identity.clone());
        Ok(token)
    }

    fn authorize(&self, token: &str) -> Result<Identity, AuthorizationError> {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(token)
            .cloned()
            .ok_or_else(|| AuthorizationError::Malformed("unknown token".into()))
    }
}

// ============================================================================
// Recording Factory
// ============================================================================

/// A decorator that always declines, logging its name each time it is asked.
///
/// # Example
///
/// ```rust,ignore
/// let log = RecordingFactory::log();
/// let chain = FactoryChain::builder()
///     .with(RecordingFactory::new("a", 10, log.clone()))
///     .with(RecordingFactory::new("b", 20, log.clone()))
///     .build()?;
/// chain.build_endpoint(&action, &trigger)?;
/// assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
/// ```
#[derive(Debug, Clone)]
pub struct RecordingFactory {
    name: &'static str,
    priority: i32,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingFactory {
    /// A new shared log.
    pub fn log() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    /// A factory appending `name` to `log`.
    pub fn new(name: &'static str, priority: i32, log: Arc<Mutex<Vec<&'static str>>>) -> Self {
        Self { name, priority, log }
    }
}

impl AdapterFactory for RecordingFactory {
    fn name(&self) -> &'static str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn create(
        &self,
        _: &Action,
        _: &Trigger,
        _: Chain<'_>,
    ) -> Result<Option<BoxEndpoint>, ConfigurationError> {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(self.name);
        Ok(None)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Declaration of `echo(val: string) -> string` on `GET`.
///
/// Extend it before calling `build()`.
pub fn echo_builder() -> ActionBuilder {
    Action::builder("echo", |inv: Invocation| async move { inv.get::<String>("val") })
        .description("Returns its argument.")
        .param(Param::typed("val", ValueType::String))
        .returns(ValueType::String)
        .trigger(WebTrigger::get())
}

/// An `echo` action with the given policies.
pub fn echo_action(
    access: AccessControl,
    cache: CacheControl,
) -> Result<Action, portage_core::RegistrationError> {
    echo_builder().access(access).cache(cache).build()
}

/// An action that always fails with an execution error.
pub fn failing_action(name: &str) -> Result<Action, portage_core::RegistrationError> {
    Action::builder(name, |_: Invocation| async {
        Err::<(), _>(CallError::execution("intentional failure"))
    })
    .trigger(WebTrigger::post())
    .build()
}

/// A REST-style gateway event.
pub fn gateway_event(method: &str, path: &str, query: Value, token: Option<&str>) -> Value {
    let mut headers = serde_json::Map::new();
    if let Some(token) = token {
        headers.insert("Authorization".into(), json!(format!("Bearer {token}")));
    }
    json!({
        "httpMethod": method,
        "path": path,
        "headers": headers,
        "queryStringParameters": query,
        "body": null,
        "isBase64Encoded": false,
    })
}

/// A direct invocation event.
pub fn direct_event(action: &str, params: Value, token: Option<&str>) -> Value {
    let mut event = json!({ "action": action, "params": params });
    if let Some(token) = token {
        event["authorization"] = json!(format!("Bearer {token}"));
    }
    event
}
