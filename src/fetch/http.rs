//! HTTP fetcher backed by `ureq`
//!
//! `ureq` is blocking, so each fetch runs on the blocking pool. Every fetch
//! is bounded twice: the agent's global timeout aborts the transfer itself,
//! and `tokio::time::timeout` bounds the wait on the blocking task.

use super::{Fetcher, Request, Response, ResponseKind};
use crate::config::Config;
use crate::error::{ShelfError, ShelfResult};
use async_trait::async_trait;
use std::time::Duration;
use ureq::ResponseExt;
use tracing::debug;
use url::Url;

/// Fetcher that talks to real HTTP servers
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
    origin: Url,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher for a deployment origin
    pub fn new(origin: Url, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            origin,
            timeout,
        }
    }

    /// Create a fetcher from the `[network]` section
    pub fn from_config(config: &Config) -> ShelfResult<Self> {
        let origin = Url::parse(&config.network.origin).map_err(|e| ShelfError::InvalidUrl {
            url: config.network.origin.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(
            origin,
            Duration::from_secs(config.network.timeout_secs),
        ))
    }

    /// Origin this fetcher treats as same-origin
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn kind_for(&self, url: &Url) -> ResponseKind {
        if url.origin() == self.origin.origin() {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        }
    }
}

struct RawResponse {
    /// Location that produced the response, after redirects
    final_url: String,
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

fn blocking_fetch(agent: &ureq::Agent, method: &str, url: &str) -> ShelfResult<RawResponse> {
    let result = match method {
        "GET" => agent.get(url).call(),
        "HEAD" => agent.head(url).call(),
        other => {
            return Err(ShelfError::network(
                url,
                format!("unsupported method {}", other),
            ))
        }
    };

    let mut response = result.map_err(|e| ShelfError::network(url, e.to_string()))?;

    let final_url = response.get_uri().to_string();
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = if method == "HEAD" {
        Vec::new()
    } else {
        response
            .body_mut()
            .read_to_vec()
            .map_err(|e| ShelfError::network(url, format!("reading body: {}", e)))?
    };

    Ok(RawResponse {
        final_url,
        status,
        headers,
        body,
    })
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> ShelfResult<Response> {
        let agent = self.agent.clone();
        let method = request.method().to_string();
        let url = request.url().to_string();

        debug!("{} {}", method, url);

        let task = {
            let url = url.clone();
            tokio::task::spawn_blocking(move || blocking_fetch(&agent, &method, &url))
        };

        let raw = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                return Err(ShelfError::Timeout {
                    url,
                    secs: self.timeout.as_secs(),
                })
            }
            Ok(Err(e)) => return Err(ShelfError::Internal(format!("fetch task failed: {}", e))),
            Ok(Ok(result)) => result?,
        };

        debug!("{} -> {} ({} bytes)", url, raw.status, raw.body.len());

        // A redirect may have left the origin
        let kind = match Url::parse(&raw.final_url) {
            Ok(final_url) => {
                if final_url != *request.url() {
                    debug!("{} redirected to {}", url, final_url);
                }
                self.kind_for(&final_url)
            }
            Err(_) => self.kind_for(request.url()),
        };

        let mut response = Response::new(raw.status, kind, raw.body);
        response.headers = raw.headers;
        Ok(response)
    }
}
