//! HMAC-signed bearer tokens.
//!
//! A token is `base64url(claims).base64url(signature)` where `claims` is the
//! JSON form of an [`Identity`] (`sub`, `scopes`, `nbf`, `exp`) and the
//! signature is HMAC-SHA256 over the encoded claims. Both parts use the
//! unpadded URL-safe alphabet.

use crate::config::{AuthConfig, ConfigError};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use portage_core::{AuthorizationError, Authorizer, Identity};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies HMAC-SHA256 bearer tokens.
#[derive(Clone)]
pub struct HmacAuthorizer {
    key: Vec<u8>,
    leeway: Duration,
}

impl HmacAuthorizer {
    /// An authorizer signing with `secret` and no clock leeway.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
            leeway: Duration::zero(),
        }
    }

    /// Tolerate `seconds` of clock skew on `nbf` and `exp`.
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX).min(i64::MAX / 1000);
        self.leeway = Duration::seconds(seconds);
        self
    }

    /// An authorizer from the `auth` configuration section.
    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let secret = config.secret.as_deref().filter(|s| !s.is_empty()).ok_or_else(|| {
            ConfigError::Invalid {
                field: "auth.secret",
                reason: "a signing secret is required".into(),
            }
        })?;
        Ok(Self::new(secret).with_leeway(config.leeway_secs))
    }

    fn mac(&self, payload: &[u8]) -> Result<HmacSha256, AuthorizationError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AuthorizationError::Malformed(e.to_string()))?;
        mac.update(payload);
        Ok(mac)
    }
}

impl fmt::Debug for HmacAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacAuthorizer")
            .field("key", &"<redacted>")
            .field("leeway", &self.leeway)
            .finish()
    }
}

impl Authorizer for HmacAuthorizer {
    fn encode(&self, identity: &Identity) -> Result<String, AuthorizationError> {
        let claims = serde_json::to_vec(identity)
            .map_err(|e| AuthorizationError::Malformed(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(claims);
        let signature = self.mac(payload.as_bytes())?.finalize().into_bytes();
        Ok(format!("{payload}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    fn authorize(&self, token: &str) -> Result<Identity, AuthorizationError> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| AuthorizationError::Malformed("expected `claims.signature`".into()))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| AuthorizationError::Malformed(e.to_string()))?;
        self.mac(payload.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| AuthorizationError::BadSignature)?;

        let claims = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| AuthorizationError::Malformed(e.to_string()))?;
        let identity: Identity = serde_json::from_slice(&claims)
            .map_err(|e| AuthorizationError::Malformed(e.to_string()))?;
        identity.check_window(Utc::now(), self.leeway)?;
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let auth = HmacAuthorizer::new("secret");
        let identity = Identity::new("alice").with_scope("root");
        let token = auth.encode(&identity).unwrap();
        assert_eq!(auth.authorize(&token).unwrap(), identity);
    }

    #[test]
    fn tampering_is_detected() {
        let auth = HmacAuthorizer::new("secret");
        let token = auth.encode(&Identity::new("alice")).unwrap();
        let (_, signature) = token.split_once('.').unwrap();
        let forged_claims = URL_SAFE_NO_PAD.encode(br#"{"sub":"alice","scopes":["root"]}"#);
        let forged = format!("{forged_claims}.{signature}");
        assert_eq!(auth.authorize(&forged), Err(AuthorizationError::BadSignature));

        let other = HmacAuthorizer::new("other");
        assert_eq!(other.authorize(&token), Err(AuthorizationError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let auth = HmacAuthorizer::new("secret");
        assert!(matches!(auth.authorize("nodot"), Err(AuthorizationError::Malformed(_))));
        assert!(matches!(auth.authorize("a.!!!"), Err(AuthorizationError::Malformed(_))));
    }

    #[test]
    fn validity_window_with_leeway() {
        let now = Utc::now();
        let expired = Identity::new("a").expiring_at(now - Duration::seconds(5));
        let early = Identity::new("b").valid_from(now + Duration::seconds(60));

        let strict = HmacAuthorizer::new("k");
        assert_eq!(
            strict.authorize(&strict.encode(&expired).unwrap()),
            Err(AuthorizationError::Expired)
        );
        assert_eq!(
            strict.authorize(&strict.encode(&early).unwrap()),
            Err(AuthorizationError::NotYetValid)
        );

        let lenient = HmacAuthorizer::new("k").with_leeway(30);
        assert!(lenient.authorize(&lenient.encode(&expired).unwrap()).is_ok());
    }

    #[test]
    fn from_config_requires_secret() {
        assert!(HmacAuthorizer::from_config(&AuthConfig::default()).is_err());
        let config = AuthConfig {
            secret: Some("s".into()),
            leeway_secs: 3,
        };
        assert_eq!(HmacAuthorizer::from_config(&config).unwrap().leeway, Duration::seconds(3));
    }

    #[test]
    fn out_of_range_leeway_is_rejected_not_fatal() {
        let config = AuthConfig {
            secret: Some("k".into()),
            leeway_secs: u64::MAX,
        };
        assert!(matches!(
            HmacAuthorizer::from_config(&config),
            Err(ConfigError::Invalid { field: "auth.leeway_secs", .. })
        ));

        // Built directly, the clamped leeway still verifies without panicking.
        let lenient = HmacAuthorizer::new("k").with_leeway(u64::MAX);
        let identity = Identity::new("a").expiring_at(Utc::now() + Duration::hours(1));
        assert!(lenient.authorize(&lenient.encode(&identity).unwrap()).is_ok());
    }
}
