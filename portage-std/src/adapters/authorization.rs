//! Bearer-token authorization.
//!
//! The wrapped endpoint's parse stage first decodes the caller's credential
//! and checks it against the action's [`AccessControl`]. A missing
//! credential for a protected action is `401`; a valid identity lacking the
//! required scope is `403`. Only then are the arguments parsed, with the
//! identity injected under the action's identity parameter.
//!
//! Actions that are open to everyone and never read the caller's identity
//! are left untouched.

use super::AUTHORIZATION_PRIORITY;
use portage_core::{
    AccessControl, Action, AdapterFactory, AuthorizationError, Authorizer, BoxEndpoint,
    CallError, Chain, ConfigurationError, Endpoint, Identity, Invocation, Request, Response,
    RouteInfo, SchemaDoc, Trigger,
};
use serde_json::Value;
use std::sync::Arc;

/// Decorator factory enforcing access control.
#[derive(Clone)]
pub struct AuthorizationFactory {
    authorizer: Arc<dyn Authorizer>,
}

impl AuthorizationFactory {
    /// Verify credentials with `authorizer`.
    pub fn new(authorizer: impl Authorizer + 'static) -> Self {
        Self::shared(Arc::new(authorizer))
    }

    /// Verify credentials with a shared authorizer.
    pub fn shared(authorizer: Arc<dyn Authorizer>) -> Self {
        Self { authorizer }
    }
}

impl AdapterFactory for AuthorizationFactory {
    fn name(&self) -> &'static str {
        "authorization"
    }

    fn priority(&self) -> i32 {
        AUTHORIZATION_PRIORITY
    }

    fn create(
        &self,
        action: &Action,
        trigger: &Trigger,
        remaining: Chain<'_>,
    ) -> Result<Option<BoxEndpoint>, ConfigurationError> {
        if action.access_control().is_open() && action.identity_param().is_none() {
            return Ok(None);
        }
        let Some(inner) = remaining.build(action, trigger)? else {
            return Ok(None);
        };
        Ok(Some(Box::new(AuthorizedEndpoint {
            inner,
            authorizer: self.authorizer.clone(),
        })))
    }
}

/// An endpoint guarded by an [`Authorizer`].
pub struct AuthorizedEndpoint {
    inner: BoxEndpoint,
    authorizer: Arc<dyn Authorizer>,
}

impl AuthorizedEndpoint {
    fn access(&self) -> &AccessControl {
        self.inner.action().access_control()
    }

    fn identify(&self, request: &Request) -> Result<Option<Identity>, AuthorizationError> {
        let identity = request
            .bearer_token()
            .map(|token| self.authorizer.authorize(token))
            .transpose()?;
        if self.access().is_executable(identity.as_ref()) {
            return Ok(identity);
        }
        Err(match identity {
            None => AuthorizationError::MissingCredential,
            Some(_) => {
                AuthorizationError::Forbidden(self.access().required_scope().map(str::to_string))
            }
        })
    }
}

impl Endpoint for AuthorizedEndpoint {
    fn route(&self) -> &RouteInfo {
        self.inner.route()
    }

    fn action(&self) -> &Action {
        self.inner.action()
    }

    async fn parse(&self, request: &Request) -> Result<Invocation, CallError> {
        let identity = self.identify(request).inspect_err(|err| {
            tracing::warn!(action = %self.route().action, error = %err, "caller rejected");
        })?;
        if let Some(identity) = &identity {
            tracing::debug!(subject = identity.subject.as_deref(), "caller authorized");
        }
        let mut invocation = self.inner.parse(request).await?;
        if let (Some(param), Some(identity)) = (self.action().identity_param(), identity) {
            let value = serde_json::to_value(identity).map_err(CallError::execution)?;
            invocation.args.insert(param.to_string(), value);
        }
        Ok(invocation)
    }

    async fn invoke(&self, invocation: Invocation) -> Result<Value, CallError> {
        self.inner.invoke(invocation).await
    }

    fn render(&self, request: &Request, result: Value) -> Result<Response, CallError> {
        self.inner.render(request, result)
    }

    fn describe(&self, doc: &mut SchemaDoc) {
        self.inner.describe(doc);
        if let Some(op) = doc.last_mut() {
            op.authenticated = true;
            op.required_scope = self.access().required_scope().map(str::to_string);
        }
    }
}
