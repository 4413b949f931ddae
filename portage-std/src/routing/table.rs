//! Matchit-backed web route table.
//!
//! Paths are matched with [`matchit`]; each path holds one entry per
//! method (and, for templated routes, per action name).

use crate::route::{NAME_PARAM, RouteStyle};
use matchit::{Match, Router as InnerRouter};
use portage_core::{
    CallError, ConfigurationError, Endpoint, Request, Response, SharedEndpoint,
    http::{HeaderValue, Method, StatusCode, header},
};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};

struct RouteEntry {
    method: Method,
    selector: Option<String>,
    endpoint: SharedEndpoint,
}

impl RouteEntry {
    fn selects(&self, name: Option<&String>) -> bool {
        self.selector.is_none() || self.selector.as_ref() == name
    }
}

fn select<'g>(
    group: &'g [RouteEntry],
    method: &Method,
    name: Option<&String>,
) -> Option<&'g RouteEntry> {
    group.iter().find(|e| &e.method == method && e.selects(name))
}

/// Web endpoints indexed by path and method.
pub struct RouteTable {
    matcher: InnerRouter<usize>,
    groups: Vec<Vec<RouteEntry>>,
    paths: HashMap<String, usize>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            matcher: InnerRouter::new(),
            groups: Vec::new(),
            paths: HashMap::new(),
        }
    }
}

/// The endpoint a request resolves to.
pub struct RouteMatch<'a> {
    /// Endpoint to call.
    pub endpoint: &'a SharedEndpoint,
    /// Parameters captured from the path.
    pub params: BTreeMap<String, String>,
}

impl RouteTable {
    /// Index every web endpoint in `endpoints`.
    ///
    /// Two endpoints on the same method and path are a conflict.
    pub fn new<I>(style: &RouteStyle, endpoints: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = SharedEndpoint>,
    {
        let mut table = Self::default();
        for endpoint in endpoints {
            let route = endpoint.route();
            let (Some(web), Some(path)) = (route.trigger.as_web(), route.path.clone()) else {
                continue;
            };
            let entry = RouteEntry {
                method: web.method.clone(),
                selector: style.selects_by_name(web).then(|| route.action.clone()),
                endpoint: endpoint.clone(),
            };
            table.insert(path, entry)?;
        }
        Ok(table)
    }

    fn insert(&mut self, path: String, entry: RouteEntry) -> Result<(), ConfigurationError> {
        let index = match self.paths.get(&path) {
            Some(&index) => index,
            None => {
                let index = self.groups.len();
                self.matcher
                    .insert(path.clone(), index)
                    .map_err(|e| ConfigurationError::InvalidRoute {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                self.groups.push(Vec::new());
                self.paths.insert(path.clone(), index);
                index
            }
        };
        let group = &mut self.groups[index];
        if group
            .iter()
            .any(|e| e.method == entry.method && e.selector == entry.selector)
        {
            return Err(ConfigurationError::RouteConflict {
                method: entry.method.to_string(),
                path,
            });
        }
        tracing::debug!(
            method = %entry.method,
            path = %path,
            action = %entry.endpoint.route().action,
            "route registered"
        );
        group.push(entry);
        Ok(())
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    /// Whether no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Resolve `method path`.
    ///
    /// `HEAD` falls back to `GET`. A known path with no entry for the method
    /// yields the methods it does allow.
    pub fn lookup(&self, method: &Method, path: &str) -> Result<RouteMatch<'_>, Lookup> {
        let Ok(Match { value, params }) = self.matcher.at(path) else {
            return Err(Lookup::NotFound);
        };
        let mut params: BTreeMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let group = &self.groups[*value];
        let name = params.get(NAME_PARAM).cloned();

        let entry = select(group, method, name.as_ref()).or_else(|| match *method {
            Method::HEAD => select(group, &Method::GET, name.as_ref()),
            _ => None,
        });
        if let Some(entry) = entry {
            if entry.selector.is_some() {
                params.remove(NAME_PARAM);
            }
            return Ok(RouteMatch {
                endpoint: &entry.endpoint,
                params,
            });
        }

        let mut allowed: Vec<String> = group
            .iter()
            .filter(|e| e.selects(name.as_ref()))
            .map(|e| e.method.to_string())
            .collect();
        if allowed.is_empty() {
            return Err(Lookup::NotFound);
        }
        allowed.sort();
        allowed.dedup();
        Err(Lookup::MethodNotAllowed(allowed))
    }

    /// Route `request` to its endpoint and call it.
    pub async fn dispatch(&self, mut request: Request) -> Response {
        match self.lookup(&request.method, &request.path) {
            Ok(RouteMatch { endpoint, params }) => {
                request.path_params = params;
                endpoint.call(request).await
            }
            Err(Lookup::NotFound) => {
                tracing::debug!(method = %request.method, path = %request.path, "no route");
                CallError::NotFound.into_response()
            }
            Err(Lookup::MethodNotAllowed(allowed)) => {
                let mut response = Response::json(
                    StatusCode::METHOD_NOT_ALLOWED,
                    json!({
                        "error": { "kind": "method_not_allowed", "message": "method not allowed" }
                    }),
                );
                if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                    response.headers.insert(header::ALLOW, value);
                }
                response
            }
        }
    }
}

/// Why a lookup failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// No route matches the path.
    NotFound,
    /// The path exists, but not for this method.
    MethodNotAllowed(Vec<String>),
}
