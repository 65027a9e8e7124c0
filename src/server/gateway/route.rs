use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote service a call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Service {
    Discord,
    Torn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Whether repeating the call cannot duplicate its effect.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, Method::Post)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Method plus normalized route: the only identity a call has before the remote service
/// has revealed which bucket it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    key: String,
}

impl RouteKey {
    /// Normalizes a raw route.
    ///
    /// The query string is dropped, the route gets exactly one leading slash, and every
    /// purely numeric path segment collapses into `{id}`, so
    /// `channels/123/messages?limit=5` becomes `/channels/{id}/messages`.
    pub fn new(method: Method, raw: &str) -> Self {
        let path = raw.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                if segment.bytes().all(|b| b.is_ascii_digit()) {
                    "{id}"
                } else {
                    segment
                }
            })
            .collect();
        let key = format!("{}|/{}", method.as_str(), segments.join("/"));

        Self { key }
    }

    /// `METHOD|/normalized/route`
    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}
