//! Identities, access-control policies and the authorizer capability.

use crate::error::AuthorizationError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The decoded result of a bearer credential.
///
/// Lives for one request only; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identity {
    /// Subject the credential was issued to.
    #[serde(rename = "sub", default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Granted scopes.
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    /// Start of validity.
    #[serde(
        rename = "nbf",
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_seconds_option"
    )]
    pub not_before: Option<DateTime<Utc>>,
    /// End of validity.
    #[serde(
        rename = "exp",
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_seconds_option"
    )]
    pub expire_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// An identity for `subject` with no scopes.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }

    /// Grant a scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.insert(scope.into());
        self
    }

    /// Set the validity window end.
    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Self {
        self.expire_at = Some(at);
        self
    }

    /// Set the validity window start.
    pub fn valid_from(mut self, at: DateTime<Utc>) -> Self {
        self.not_before = Some(at);
        self
    }

    /// Whether `scope` was granted.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Check the validity window at `now`, allowing `leeway` on both ends.
    ///
    /// A leeway reaching past the representable date range leaves that end
    /// of the window open.
    pub fn check_window(
        &self,
        now: DateTime<Utc>,
        leeway: Duration,
    ) -> Result<(), AuthorizationError> {
        if let (Some(nbf), Some(latest)) = (self.not_before, now.checked_add_signed(leeway)) {
            if latest < nbf {
                return Err(AuthorizationError::NotYetValid);
            }
        }
        if let (Some(exp), Some(earliest)) = (self.expire_at, now.checked_sub_signed(leeway)) {
            if earliest >= exp {
                return Err(AuthorizationError::Expired);
            }
        }
        Ok(())
    }
}

/// Who may execute (and see) an action.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AccessControl {
    /// Anyone, with or without a credential.
    #[default]
    AllowAll,
    /// Nobody.
    AllowNone,
    /// Identities holding the given scope.
    ScopeBased(String),
}

impl AccessControl {
    /// Require `scope`.
    pub fn scope(scope: impl Into<String>) -> Self {
        AccessControl::ScopeBased(scope.into())
    }

    /// Whether `identity` may execute the action.
    pub fn is_executable(&self, identity: Option<&Identity>) -> bool {
        match self {
            AccessControl::AllowAll => true,
            AccessControl::AllowNone => false,
            AccessControl::ScopeBased(scope) => identity.is_some_and(|i| i.has_scope(scope)),
        }
    }

    /// Whether `identity` may see the action in schema listings.
    pub fn is_viewable(&self, identity: Option<&Identity>) -> bool {
        self.is_executable(identity)
    }

    /// Whether this policy never rejects.
    pub fn is_open(&self) -> bool {
        matches!(self, AccessControl::AllowAll)
    }

    /// The scope a caller must hold, if any.
    pub fn required_scope(&self) -> Option<&str> {
        match self {
            AccessControl::ScopeBased(scope) => Some(scope),
            _ => None,
        }
    }
}

/// Encodes identities into bearer tokens and decodes them back.
pub trait Authorizer: Send + Sync + 'static {
    /// Issue a token for `identity`.
    fn encode(&self, identity: &Identity) -> Result<String, AuthorizationError>;

    /// Decode and check `token`.
    fn authorize(&self, token: &str) -> Result<Identity, AuthorizationError>;
}

impl<A: Authorizer + ?Sized> Authorizer for std::sync::Arc<A> {
    fn encode(&self, identity: &Identity) -> Result<String, AuthorizationError> {
        (**self).encode(identity)
    }

    fn authorize(&self, token: &str) -> Result<Identity, AuthorizationError> {
        (**self).authorize(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_based_matches_membership() {
        let policy = AccessControl::scope("root");
        let cases = [
            (Identity::new("a"), false),
            (Identity::new("b").with_scope("root"), true),
            (Identity::new("c").with_scope("user"), false),
            (Identity::new("d").with_scope("user").with_scope("root"), true),
        ];
        for (identity, expected) in cases {
            assert_eq!(policy.is_executable(Some(&identity)), identity.has_scope("root"));
            assert_eq!(policy.is_executable(Some(&identity)), expected);
        }
        assert!(!policy.is_executable(None));
    }

    #[test]
    fn fixed_policies() {
        let identity = Identity::new("a").with_scope("root");
        assert!(AccessControl::AllowAll.is_executable(None));
        assert!(AccessControl::AllowAll.is_executable(Some(&identity)));
        assert!(!AccessControl::AllowNone.is_executable(Some(&identity)));
        assert!(!AccessControl::AllowNone.is_viewable(None));
    }

    #[test]
    fn validity_window() {
        let now = Utc::now();
        let identity = Identity::new("a")
            .valid_from(now - Duration::seconds(10))
            .expiring_at(now + Duration::seconds(10));
        assert!(identity.check_window(now, Duration::zero()).is_ok());
        assert_eq!(
            identity.check_window(now + Duration::seconds(11), Duration::zero()),
            Err(AuthorizationError::Expired)
        );
        assert!(
            identity
                .check_window(now + Duration::seconds(11), Duration::seconds(5))
                .is_ok()
        );
        assert_eq!(
            identity.check_window(now - Duration::seconds(20), Duration::zero()),
            Err(AuthorizationError::NotYetValid)
        );
    }

    #[test]
    fn oversized_leeway_opens_the_window() {
        let now = Utc::now();
        let identity = Identity::new("a")
            .valid_from(now + Duration::hours(1))
            .expiring_at(now - Duration::hours(1));
        let huge = Duration::seconds(i64::MAX / 1000);
        assert!(identity.check_window(now, huge).is_ok());
        assert_eq!(
            identity.check_window(now, Duration::zero()),
            Err(AuthorizationError::NotYetValid)
        );
    }

    #[test]
    fn identity_serializes_compact_claims() {
        let identity = Identity::new("svc").with_scope("root");
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json, serde_json::json!({ "sub": "svc", "scopes": ["root"] }));
        let back: Identity = serde_json::from_value(json).unwrap();
        assert_eq!(back, identity);
    }
}
