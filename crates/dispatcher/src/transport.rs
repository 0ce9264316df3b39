//! HTTP transport
//!
//! One pooled client is shared by every host; only the request URL differs.

use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use contracts::PoolConfig;

use crate::error::{DispatcherError, TransportError};
use crate::request::OutboundRequest;

/// Issues a single outbound request
///
/// Implementations perform no retries; the dispatcher owns retry and
/// failover.
#[trait_variant::make(HttpTransport: Send)]
pub trait LocalHttpTransport {
    /// Send the request and return the response status.
    ///
    /// # Errors
    /// Returns a transport error when no response was received
    async fn execute(&self, request: OutboundRequest) -> Result<StatusCode, TransportError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client from the pool settings.
    ///
    /// Built without the `http2` feature, so requests use HTTP/1.1 with
    /// keep-alive connections.
    pub fn from_pool(pool: &PoolConfig) -> Result<Self, DispatcherError> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(pool.max_idle_per_host)
            .pool_idle_timeout(pool.idle_timeout())
            .connect_timeout(pool.connect_timeout())
            .no_proxy();

        if let Some(timeout) = pool.request_timeout() {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| DispatcherError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    #[instrument(
        name = "transport_execute",
        skip(self, request),
        fields(method = %request.method, url = %request.url, bytes = request.body.len())
    )]
    async fn execute(&self, request: OutboundRequest) -> Result<StatusCode, TransportError> {
        let response = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status();

        // Drain so the connection can return to the pool
        if let Err(e) = response.bytes().await {
            debug!(error = %e, "Failed to drain response body");
        }

        Ok(status)
    }
}
