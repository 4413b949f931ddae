//! Error types for Portage.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`PortageError`] - Top-level error type for all Portage operations
//! - [`RegistrationError`] - Bad action declarations (fatal at start-up)
//! - [`ConfigurationError`] - Misassembled adapter chains (fatal at start-up)
//! - [`RoutingError`] - Events no router could resolve
//! - [`CallError`] - Recoverable per-call failures, converted to responses
//! - [`AuthorizationError`] / [`ValidationError`] - the two recoverable
//!   causes a caller can fix

use crate::trigger::TriggerKind;
use http::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all Portage operations.
#[derive(Error, Debug)]
pub enum PortageError {
    /// An action declaration was rejected.
    #[error("registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// An adapter chain or transport was misconfigured.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// An inbound event could not be routed.
    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    /// A single call failed.
    #[error("call error: {0}")]
    Call(#[from] CallError),

    /// A custom error occurred.
    #[error(transparent)]
    Custom(BoxError),
}

impl From<BoxError> for PortageError {
    fn from(err: BoxError) -> Self {
        PortageError::Custom(err)
    }
}

/// Errors raised while declaring or registering an action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The action name is empty.
    #[error("action name must not be empty")]
    EmptyName,

    /// A declared parameter carries no type.
    #[error("parameter `{param}` of action `{action}` has no declared type")]
    UntypedParameter {
        /// Action being declared.
        action: String,
        /// Offending parameter.
        param: String,
    },

    /// Two parameters share a name.
    #[error("parameter `{param}` declared twice on action `{action}`")]
    DuplicateParameter {
        /// Action being declared.
        action: String,
        /// Offending parameter.
        param: String,
    },

    /// An action with this name is already registered.
    #[error("action `{0}` is already registered")]
    DuplicateAction(String),

    /// The declared timeout is zero.
    #[error("action `{0}` declares a zero timeout")]
    InvalidTimeout(String),

    /// A web trigger path does not start with `/`.
    #[error("action `{action}` declares invalid path `{path}`")]
    InvalidPath {
        /// Action being declared.
        action: String,
        /// Offending path.
        path: String,
    },
}

/// Errors raised while assembling adapter chains and transports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Two terminal factories claim the same trigger kind.
    #[error("factories `{first}` and `{second}` both terminate {kind} triggers")]
    ConflictingTerminals {
        /// Higher-priority factory.
        first: &'static str,
        /// Lower-priority factory.
        second: &'static str,
        /// Contested trigger kind.
        kind: TriggerKind,
    },

    /// A trigger the transport requires produced no endpoint.
    #[error("no factory produced an endpoint for {trigger} trigger of action `{action}`")]
    NoTerminal {
        /// Action being built.
        action: String,
        /// Trigger kind left unserved.
        trigger: TriggerKind,
    },

    /// A method-style action reached a terminal without being bound.
    #[error("action `{0}` still has an unbound receiver at its terminal endpoint")]
    UnboundReceiver(String),

    /// Two endpoints claim the same web route.
    #[error("route {method} {path} is claimed twice")]
    RouteConflict {
        /// HTTP method.
        method: String,
        /// Route path.
        path: String,
    },

    /// A route could not be registered with the path matcher.
    #[error("invalid route `{path}`: {reason}")]
    InvalidRoute {
        /// Route path.
        path: String,
        /// Matcher's complaint.
        reason: String,
    },
}

/// Errors that occur while resolving an inbound event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// No router recognised the event's shape.
    #[error("no handler recognises this event")]
    NoHandler,

    /// The event names an action that is not registered.
    #[error("unknown action `{0}`")]
    UnknownAction(String),

    /// The event has a recognised shape but unusable content.
    #[error("malformed event: {0}")]
    MalformedEvent(String),
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dotted path to the offending value; empty for the root.
    pub path: String,
    /// Human readable reason.
    pub message: String,
}

/// A value failed validation against a schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

impl ValidationError {
    /// Create a validation error with one failure.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                path: path.into(),
                message: message.into(),
            }],
        }
    }

    /// Record another failure.
    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Absorb all failures of `other`, prefixing their paths with `prefix`.
    pub fn extend_nested(&mut self, prefix: &str, other: ValidationError) {
        for err in other.errors {
            let path = match (prefix.is_empty(), err.path.is_empty()) {
                (true, _) => err.path,
                (false, true) => prefix.to_string(),
                (false, false) => format!("{prefix}.{}", err.path),
            };
            self.errors.push(FieldError {
                path,
                message: err.message,
            });
        }
    }

    /// The recorded failures.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Whether no failure was recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed")?;
        for (i, err) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            if err.path.is_empty() {
                write!(f, "{sep}{}", err.message)?;
            } else {
                write!(f, "{sep}{}: {}", err.path, err.message)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// A credential was missing, unusable, or insufficient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// No credential accompanied a call that requires one.
    #[error("missing credential")]
    MissingCredential,

    /// The credential could not be decoded.
    #[error("malformed credential: {0}")]
    Malformed(String),

    /// The credential signature does not verify.
    #[error("credential signature mismatch")]
    BadSignature,

    /// The credential is past its expiry.
    #[error("credential expired")]
    Expired,

    /// The credential is not valid yet.
    #[error("credential not yet valid")]
    NotYetValid,

    /// The identity may not execute the action.
    #[error("insufficient access{}", required_scope(.0))]
    Forbidden(Option<String>),
}

fn required_scope(scope: &Option<String>) -> String {
    match scope {
        Some(scope) => format!(": requires scope `{scope}`"),
        None => String::new(),
    }
}

impl AuthorizationError {
    /// Status code for this failure: 403 for `Forbidden`, 401 otherwise.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthorizationError::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Recoverable failures of one call.
///
/// Every variant is caught at the endpoint boundary and turned into a
/// structured response; see [`CallError::into_response`].
#[derive(Error, Debug)]
pub enum CallError {
    /// Input failed validation; the action was not invoked.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Credential rejected; the action was not invoked.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// The route or action does not exist.
    #[error("not found")]
    NotFound,

    /// The action itself failed.
    #[error("execution failed: {0}")]
    Execution(BoxError),

    /// The action returned data that does not match its result schema.
    #[error("result rejected: {0}")]
    Render(ValidationError),
}

impl CallError {
    /// Wrap an arbitrary failure of the underlying action.
    pub fn execution<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        CallError::Execution(err.into())
    }

    /// Transport status for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            CallError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CallError::Authorization(err) => err.status(),
            CallError::NotFound => StatusCode::NOT_FOUND,
            CallError::Execution(_) | CallError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::Validation(_) => "validation",
            CallError::Authorization(AuthorizationError::Forbidden(_)) => "forbidden",
            CallError::Authorization(_) => "unauthorized",
            CallError::NotFound => "not_found",
            CallError::Execution(_) => "execution",
            CallError::Render(_) => "render",
        }
    }

    /// Structured JSON body describing this failure.
    ///
    /// Server-side faults do not leak their cause to the caller.
    pub fn to_body(&self) -> Value {
        match self {
            CallError::Validation(err) => json!({
                "error": {
                    "kind": self.kind(),
                    "message": "invalid input",
                    "details": err.errors()
                }
            }),
            CallError::Execution(_) | CallError::Render(_) => json!({
                "error": { "kind": self.kind(), "message": "internal error" }
            }),
            _ => json!({ "error": { "kind": self.kind(), "message": self.to_string() } }),
        }
    }

    /// Convert into a transport response.
    pub fn into_response(self) -> crate::endpoint::Response {
        crate::endpoint::Response::json(self.status(), self.to_body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            CallError::from(ValidationError::new("val", "missing")).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            CallError::from(AuthorizationError::MissingCredential).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            CallError::from(AuthorizationError::Forbidden(Some("root".into()))).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(CallError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            CallError::Render(ValidationError::new("", "bad")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_display_lists_fields() {
        let mut err = ValidationError::new("a", "missing");
        err.push("", "not an object");
        assert_eq!(err.to_string(), "validation failed: a: missing; not an object");
    }

    #[test]
    fn nested_paths_are_prefixed() {
        let mut outer = ValidationError::default();
        outer.extend_nested("items", ValidationError::new("0", "expected string"));
        outer.extend_nested("name", ValidationError::new("", "expected string"));
        assert_eq!(outer.errors()[0].path, "items.0");
        assert_eq!(outer.errors()[1].path, "name");
    }

    #[test]
    fn server_faults_hide_details() {
        let body = CallError::execution("db down").to_body();
        assert_eq!(body["error"]["message"], "internal error");
        assert_eq!(body["error"]["kind"], "execution");
    }

    #[test]
    fn forbidden_names_scope() {
        let err = AuthorizationError::Forbidden(Some("root".into()));
        assert_eq!(err.to_string(), "insufficient access: requires scope `root`");
        assert_eq!(AuthorizationError::Forbidden(None).to_string(), "insufficient access");
    }
}
