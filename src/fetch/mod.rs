//! Requests, responses and the network capability
//!
//! A [`Response`] is an owned value that is consumed once: it is not `Clone`.
//! Code that needs to both return a response and persist it must call
//! [`Response::duplicate`] and hand each side its own copy.

mod http;

pub use http::HttpFetcher;

use crate::error::{ShelfError, ShelfResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// An outgoing request observed by the interception layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    url: Url,
}

impl Request {
    /// Create a request with an explicit method
    pub fn new(method: impl AsRef<str>, url: Url) -> Self {
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            url,
        }
    }

    /// Create a GET request
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Parse a request target, joining origin-relative paths onto `origin`
    pub fn parse(origin: &Url, target: &str) -> ShelfResult<Self> {
        let url = resolve_url(origin, target)?;
        Ok(Self::get(url))
    }

    /// HTTP method (uppercase)
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Full request URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// URL path component
    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Identity used to key stored responses
    pub fn key(&self) -> RequestKey {
        let mut url = self.url.clone();
        url.set_fragment(None);
        RequestKey {
            method: self.method.clone(),
            url: url.to_string(),
        }
    }
}

/// Resolve an absolute or origin-relative URL string
pub fn resolve_url(base: &Url, target: &str) -> ShelfResult<Url> {
    base.join(target).map_err(|e| ShelfError::InvalidUrl {
        url: target.to_string(),
        reason: e.to_string(),
    })
}

/// Request identity: method plus full URL, query included
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// How the response relates to the deployment origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response
    Basic,
    /// Cross-origin response with a readable body
    Cors,
    /// Cross-origin response with no readable body
    Opaque,
    /// Network-level error response
    Error,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Cors => write!(f, "cors"),
            Self::Opaque => write!(f, "opaque"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A response snapshot with a fully materialized body
#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, kind: ResponseKind, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            kind,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a header (builder style)
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 2xx status
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only a same-origin 200 is stored at request time
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind == ResponseKind::Basic
    }

    /// Materialize an independent copy of this response
    pub fn duplicate(&self) -> Self {
        Self {
            status: self.status,
            kind: self.kind,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

/// Network capability
///
/// A transport failure is an `Err`; any HTTP status is an `Ok` response.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request over the network
    async fn fetch(&self, request: &Request) -> ShelfResult<Response>;
}
