//! Deployment configuration.
//!
//! Loaded once at start-up, usually from a JSON document. Every field has a
//! default, so `{}` is a valid configuration.
//!
//! ```json
//! {
//!   "route_prefix": "/actions",
//!   "path_style": "kebab",
//!   "default_timeout_secs": 30,
//!   "auth": { "secret": "…", "leeway_secs": 5 },
//!   "scheduler": { "enabled": true }
//! }
//! ```

use portage_core::ActionBuilder;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The document could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range or missing.
    #[error("invalid configuration value `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// How web paths are derived from action names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    /// One shared `{prefix}/{name}` route; the name selects the action.
    Template,
    /// One route per action: `{prefix}/{kebab-name}`.
    #[default]
    Kebab,
}

/// Bearer token settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing secret.
    pub secret: Option<String>,
    /// Allowed clock skew when checking `nbf` / `exp`, at most
    /// [`MAX_LEEWAY_SECS`].
    pub leeway_secs: u64,
}

/// Upper bound for `auth.leeway_secs`: one day.
pub const MAX_LEEWAY_SECS: u64 = 86_400;

impl AuthConfig {
    /// Check the bounds of the token settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::Invalid {
                field: "auth.secret",
                reason: "must not be empty".into(),
            });
        }
        if self.leeway_secs > MAX_LEEWAY_SECS {
            return Err(ConfigError::Invalid {
                field: "auth.leeway_secs",
                reason: format!("{} exceeds the maximum of {MAX_LEEWAY_SECS}", self.leeway_secs),
            });
        }
        Ok(())
    }
}

/// Fixed-rate scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Whether fixed-rate triggers are started.
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PortageConfig {
    /// Prefix of derived web routes.
    pub route_prefix: String,
    /// Derived route style.
    pub path_style: PathStyle,
    /// Timeout applied by [`PortageConfig::action_defaults`].
    pub default_timeout_secs: u64,
    /// Bearer token settings.
    pub auth: AuthConfig,
    /// Scheduler settings.
    pub scheduler: SchedulerConfig,
}

impl Default for PortageConfig {
    fn default() -> Self {
        Self {
            route_prefix: "/actions".to_string(),
            path_style: PathStyle::default(),
            default_timeout_secs: 30,
            auth: AuthConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl PortageConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "default_timeout_secs",
                reason: "must be positive".into(),
            });
        }
        if !self.route_prefix.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "route_prefix",
                reason: format!("`{}` must start with `/`", self.route_prefix),
            });
        }
        self.auth.validate()
    }

    /// The configured default timeout.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Apply deployment defaults to an action declaration.
    ///
    /// Call before any explicit `.timeout(..)` so that the action's own
    /// value wins.
    pub fn action_defaults(&self, builder: ActionBuilder) -> ActionBuilder {
        builder.timeout(self.default_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PortageConfig::from_json("{}").unwrap();
        assert_eq!(config, PortageConfig::default());
        assert_eq!(config.route_prefix, "/actions");
        assert_eq!(config.path_style, PathStyle::Kebab);
        assert_eq!(config.default_timeout(), Duration::from_secs(30));
        assert!(config.scheduler.enabled);
        assert_eq!(config.auth.secret, None);
    }

    #[test]
    fn parses_all_sections() {
        let config = PortageConfig::from_json(
            r#"{
                "route_prefix": "/api",
                "path_style": "template",
                "default_timeout_secs": 5,
                "auth": { "secret": "s3cret", "leeway_secs": 10 },
                "scheduler": { "enabled": false }
            }"#,
        )
        .unwrap();
        assert_eq!(config.path_style, PathStyle::Template);
        assert_eq!(config.auth.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.auth.leeway_secs, 10);
        assert!(!config.scheduler.enabled);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            PortageConfig::from_json(r#"{ "default_timeout_secs": 0 }"#),
            Err(ConfigError::Invalid { field: "default_timeout_secs", .. })
        ));
        assert!(matches!(
            PortageConfig::from_json(r#"{ "route_prefix": "actions" }"#),
            Err(ConfigError::Invalid { field: "route_prefix", .. })
        ));
        assert!(matches!(
            PortageConfig::from_json(r#"{ "path_style": "camel" }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn leeway_is_bounded() {
        let within = format!(r#"{{ "auth": {{ "leeway_secs": {MAX_LEEWAY_SECS} }} }}"#);
        assert!(PortageConfig::from_json(&within).is_ok());
        assert!(matches!(
            PortageConfig::from_json(r#"{ "auth": { "leeway_secs": 18446744073709551615 } }"#),
            Err(ConfigError::Invalid { field: "auth.leeway_secs", .. })
        ));
    }
}
