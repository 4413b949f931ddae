//! Name conversions and route derivation.
//!
//! Action names are snake_case identifiers. Web routes use the kebab-case
//! form (`get_user` → `/actions/get-user`) or a shared `{name}` template,
//! and resolver fields use camelCase (`getUser`).

use crate::config::{PathStyle, PortageConfig};
use portage_core::WebTrigger;

/// Path parameter that selects the action under [`PathStyle::Template`].
pub const NAME_PARAM: &str = "name";

/// `get_user` → `get-user`.
pub fn kebab_case(name: &str) -> String {
    name.trim_matches('_').replace('_', "-").to_ascii_lowercase()
}

/// `get_user` → `getUser`.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// How web routes are derived for actions without an explicit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteStyle {
    prefix: String,
    style: PathStyle,
}

impl Default for RouteStyle {
    fn default() -> Self {
        Self::new("/actions", PathStyle::Kebab)
    }
}

impl RouteStyle {
    /// Routes under `prefix` in `style`.
    pub fn new(prefix: impl Into<String>, style: PathStyle) -> Self {
        let prefix = prefix.into();
        let prefix = format!("/{}", prefix.trim_matches('/'));
        Self { prefix, style }
    }

    /// The style configured in `config`.
    pub fn from_config(config: &PortageConfig) -> Self {
        Self::new(config.route_prefix.clone(), config.path_style)
    }

    /// Path prefix, always with one leading slash.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Path style.
    pub fn style(&self) -> PathStyle {
        self.style
    }

    /// The route path for `action` on `trigger`.
    ///
    /// An explicit trigger path always wins.
    pub fn path_for(&self, action: &str, trigger: &WebTrigger) -> String {
        if let Some(path) = &trigger.path {
            return path.clone();
        }
        let base = self.prefix.trim_end_matches('/');
        match self.style {
            PathStyle::Template => format!("{base}/{{{NAME_PARAM}}}"),
            PathStyle::Kebab => format!("{base}/{}", kebab_case(action)),
        }
    }

    /// Whether endpoints on `trigger` are selected by the `{name}` parameter.
    pub fn selects_by_name(&self, trigger: &WebTrigger) -> bool {
        trigger.path.is_none() && self.style == PathStyle::Template
    }
}
