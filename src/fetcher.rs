//! Resource fetching
//!
//! One GET per resource against `server_address + remote_path`, bounded by
//! the configured timeout. There are no retries: a failed attempt is final
//! for that resource in the current run.

use crate::config::CollectorConfig;
use crate::error::{ResourceError, Result};
use crate::types::{FetchedPayload, parse_server_address};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

/// HTTP fetcher bound to a single server
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct ResourceFetcher {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ResourceFetcher {
    /// Create a fetcher for `server_address`
    pub fn new(config: &CollectorConfig, server_address: &str) -> Result<Self> {
        let base = parse_server_address(server_address)?;

        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            timeout: config.fetch_timeout,
        })
    }

    /// Full URL for a resource path
    ///
    /// The path is appended to the base address as-is, so a server mounted
    /// under a route prefix keeps that prefix.
    pub fn url_for(&self, remote_path: &str) -> String {
        format!("{}{}", self.base_url, remote_path)
    }

    /// Fetch one resource
    pub async fn fetch(
        &self,
        remote_path: &str,
    ) -> std::result::Result<FetchedPayload, ResourceError> {
        let url = self.url_for(remote_path);
        debug!(%url, "fetching resource");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.network_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResourceError::HttpStatus {
                url,
                code: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                self.network_error(&url, e)
            } else {
                ResourceError::Body {
                    url: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        debug!(%url, bytes = body.len(), "fetched resource");

        Ok(FetchedPayload {
            body: body.to_vec(),
            content_type,
        })
    }

    fn network_error(&self, url: &str, e: reqwest::Error) -> ResourceError {
        let timed_out = e.is_timeout();
        let reason = if timed_out {
            format!("timed out after {:?}", self.timeout)
        } else if e.is_connect() {
            format!("connection failed: {}", e)
        } else {
            e.to_string()
        };

        ResourceError::Network {
            url: url.to_string(),
            reason,
            timed_out,
        }
    }
}
