//! HTTP dispatcher: server rotation, retry budget, and request encoding.
//!
//! Both the config and naming engines issue every outbound call through a
//! single [`HttpDispatcher`] instance so connection pooling and the
//! server-rotation index are shared.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Method;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::model::ServerEndpoint;

/// Outcome of a single dispatched request: HTTP status plus response body.
#[derive(Debug, Clone)]
pub struct DispatchResponse {
    pub status: u16,
    pub body: String,
}

impl DispatchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Retry budget for one logical operation.
#[derive(Clone, Copy, Debug)]
pub enum RetryBudget {
    /// `len(servers) * 3`, used for naming operations.
    PerServer(usize),
    /// A flat attempt count, used for config operations.
    Flat(usize),
}

impl RetryBudget {
    pub fn attempts(self, server_count: usize) -> usize {
        match self {
            RetryBudget::PerServer(factor) => server_count.saturating_mul(factor).max(1),
            RetryBudget::Flat(n) => n.max(1),
        }
    }
}

pub struct HttpDispatcher {
    http: reqwest::Client,
    servers: Vec<ServerEndpoint>,
    rotation: AtomicUsize,
}

impl HttpDispatcher {
    pub fn new(servers: Vec<ServerEndpoint>) -> Result<Arc<Self>> {
        if servers.is_empty() {
            return Err(ClientError::InvalidArgument(
                "at least one server endpoint is required".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(ClientError::Http)?;

        Ok(Arc::new(Self {
            http,
            servers,
            rotation: AtomicUsize::new(0),
        }))
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// Issue `request` against the server list, rotating on 5xx/transport
    /// failure and stopping immediately on a 4xx response.
    ///
    /// `headers` and `params` are both plain string maps; `params` is sent
    /// as a query string for GET/DELETE and as a form body for POST/PUT.
    pub async fn request(
        &self,
        method: Method,
        path_suffix: &str,
        headers: &[(&str, String)],
        timeout: Duration,
        params: &[(&str, String)],
        budget: RetryBudget,
    ) -> Result<DispatchResponse> {
        let attempts = budget.attempts(self.servers.len());
        let start_index = self.rotation.fetch_add(1, Ordering::Relaxed);

        let mut last_err: Option<ClientError> = None;

        for attempt in 0..attempts {
            let endpoint = &self.servers[(start_index + attempt) % self.servers.len()];
            let url = format!("{}{}", endpoint.base_url(), path_suffix);

            let mut builder = self
                .http
                .request(method.clone(), &url)
                .timeout(timeout);

            for (key, value) in headers {
                builder = builder.header(*key, value.as_str());
            }

            builder = match method {
                Method::GET | Method::DELETE => builder.query(params),
                _ => builder.form(params),
            };

            match builder.send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();

                    if ClientError::is_server_error(status) {
                        warn!(url, status, "server error, rotating to next endpoint");
                        last_err = Some(ClientError::ServerRejected { status, body });
                        continue;
                    }

                    return Ok(DispatchResponse { status, body });
                }
                Err(e) => {
                    debug!(url, error = %e, "transport error, rotating to next endpoint");
                    last_err = Some(ClientError::TransportFailure(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            ClientError::TransportFailure("no server endpoints available".to_string())
        }))
    }
}
