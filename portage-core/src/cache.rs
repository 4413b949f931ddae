//! Cache policies and the response headers they produce.
//!
//! A [`CacheControl`] turns a serialized result into a [`CacheHeader`];
//! headers computed for partial results merge with
//! [`CacheHeader::combine_with`].

use chrono::{DateTime, TimeZone, Utc};
use http::{HeaderMap, HeaderValue, header};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::time::Duration;

/// How a result's cache metadata is derived.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    /// Never cache.
    #[default]
    NoCache,
    /// Entity tag from a hash of the serialized body.
    ContentHash,
    /// Content hash plus a fixed lifetime.
    Ttl(Duration),
    /// Last-modified time read from a field of the body.
    Timestamp(String),
}

/// A cache policy attached to an action.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheControl {
    strategy: CacheStrategy,
    private: bool,
    must_revalidate: bool,
}

impl CacheControl {
    /// Never cache.
    pub fn no_cache() -> Self {
        Self::default()
    }

    /// Hash-based entity tags.
    pub fn content_hash() -> Self {
        Self::with_strategy(CacheStrategy::ContentHash)
    }

    /// Cacheable for `seconds`.
    pub fn ttl(seconds: u64) -> Self {
        Self::with_strategy(CacheStrategy::Ttl(Duration::from_secs(seconds)))
    }

    /// Last-modified from `field` of the result (RFC 3339 text or epoch seconds).
    pub fn timestamp(field: impl Into<String>) -> Self {
        Self::with_strategy(CacheStrategy::Timestamp(field.into()))
    }

    fn with_strategy(strategy: CacheStrategy) -> Self {
        Self {
            strategy,
            private: false,
            must_revalidate: false,
        }
    }

    /// Restrict caching to the requesting client.
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    /// Require revalidation once stale.
    pub fn must_revalidate(mut self) -> Self {
        self.must_revalidate = true;
        self
    }

    /// The derivation strategy.
    pub fn strategy(&self) -> &CacheStrategy {
        &self.strategy
    }

    /// Whether this policy disables caching.
    pub fn is_no_cache(&self) -> bool {
        self.strategy == CacheStrategy::NoCache
    }

    /// Cache metadata for a serialized result rendered at `now`.
    pub fn header_for(&self, body: &Value, now: DateTime<Utc>) -> CacheHeader {
        let mut out = CacheHeader {
            private: self.private,
            must_revalidate: self.must_revalidate,
            ..CacheHeader::default()
        };
        match &self.strategy {
            CacheStrategy::NoCache => out.must_revalidate = true,
            CacheStrategy::ContentHash => {
                out.etags.insert(content_hash(body));
            }
            CacheStrategy::Ttl(ttl) => {
                out.etags.insert(content_hash(body));
                out.expire_at = chrono::Duration::from_std(*ttl).ok().map(|d| now + d);
            }
            CacheStrategy::Timestamp(field) => {
                out.updated_at = body.get(field).and_then(parse_timestamp);
            }
        }
        out
    }
}

/// Lowercase hex SHA-256 of the canonical JSON form of `body`.
pub fn content_hash(body: &Value) -> String {
    // `Value`'s map is ordered, so serialization is canonical.
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|s| Utc.timestamp_opt(s, 0).single()),
        _ => None,
    }
}

/// Cache metadata for one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHeader {
    etags: BTreeSet<String>,
    /// Last modification of the underlying data.
    pub updated_at: Option<DateTime<Utc>>,
    /// When the response goes stale.
    pub expire_at: Option<DateTime<Utc>>,
    /// Only the requesting client may cache.
    pub private: bool,
    /// Stale responses must be revalidated.
    pub must_revalidate: bool,
}

impl Default for CacheHeader {
    fn default() -> Self {
        Self {
            etags: BTreeSet::new(),
            updated_at: None,
            expire_at: None,
            private: true,
            must_revalidate: false,
        }
    }
}

impl CacheHeader {
    /// A header carrying a single entity tag.
    pub fn with_etag(etag: impl Into<String>) -> Self {
        let mut out = Self {
            private: false,
            ..Self::default()
        };
        out.etags.insert(etag.into());
        out
    }

    /// The entity tag.
    ///
    /// A combined header hashes the sorted set of its source tags, so the
    /// result does not depend on combination order or grouping.
    pub fn etag(&self) -> Option<String> {
        match self.etags.len() {
            0 => None,
            1 => self.etags.iter().next().cloned(),
            _ => {
                let mut hasher = Sha256::new();
                for tag in &self.etags {
                    hasher.update(tag.as_bytes());
                    hasher.update([0u8]);
                }
                Some(hex::encode(hasher.finalize()))
            }
        }
    }

    /// Merge with `others`: earliest expiry, latest update, `private` only
    /// if all are private, `must_revalidate` if any requires it.
    pub fn combine_with<'a, I>(&self, others: I) -> CacheHeader
    where
        I: IntoIterator<Item = &'a CacheHeader>,
    {
        let mut out = self.clone();
        for other in others {
            out.etags.extend(other.etags.iter().cloned());
            out.expire_at = earliest(out.expire_at, other.expire_at);
            out.updated_at = out.updated_at.max(other.updated_at);
            out.private &= other.private;
            out.must_revalidate |= other.must_revalidate;
        }
        out
    }

    /// Whether a conditional request can be answered with "not modified".
    ///
    /// `If-None-Match` wins over `If-Modified-Since` when both are present.
    pub fn matches(
        &self,
        if_none_match: Option<&str>,
        if_modified_since: Option<DateTime<Utc>>,
    ) -> bool {
        if let Some(candidates) = if_none_match {
            let Some(etag) = self.etag() else {
                return false;
            };
            return candidates.split(',').map(normalize_etag).any(|c| c == "*" || c == etag);
        }
        match (if_modified_since, self.updated_at) {
            (Some(since), Some(updated)) => updated.timestamp() <= since.timestamp(),
            _ => false,
        }
    }

    /// Read the conditional headers of a request and test them.
    pub fn matches_request(&self, headers: &HeaderMap) -> bool {
        let inm = headers
            .get(header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok());
        let ims = headers
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|t| t.with_timezone(&Utc));
        self.matches(inm, ims)
    }

    /// Write `ETag`, `Last-Modified`, `Expires` and `Cache-Control`.
    pub fn apply(&self, headers: &mut HeaderMap, now: DateTime<Utc>) {
        if let Some(etag) = self.etag() {
            insert(headers, header::ETAG, format!("\"{etag}\""));
        }
        if let Some(updated) = self.updated_at {
            insert(headers, header::LAST_MODIFIED, http_date(updated));
        }
        let mut directives = vec![if self.private { "private" } else { "public" }.to_string()];
        match self.expire_at {
            Some(expire) => {
                insert(headers, header::EXPIRES, http_date(expire));
                directives.push(format!("max-age={}", (expire - now).num_seconds().max(0)));
            }
            None if self.etags.is_empty() && self.updated_at.is_none() => {
                directives.push("no-cache".to_string());
            }
            None => {}
        }
        if self.must_revalidate {
            directives.push("must-revalidate".to_string());
        }
        insert(headers, header::CACHE_CONTROL, directives.join(", "));
    }
}

fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

fn normalize_etag(raw: &str) -> &str {
    let raw = raw.trim();
    let raw = raw.strip_prefix("W/").unwrap_or(raw);
    raw.trim_matches('"')
}

/// IMF-fixdate, as used by `Last-Modified` and `Expires`.
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn insert(headers: &mut HeaderMap, name: header::HeaderName, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(name, value);
    }
}
