//! Dispatcher - delivery loop with round-robin failover

use std::collections::{BTreeMap, HashSet};
use std::num::NonZeroUsize;
use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use contracts::{PoolConfig, RelayBlueprint, RetryConfig, TargetConfig};
use observability::metrics as obs;

use crate::error::{AttemptError, DispatcherError};
use crate::metrics::{DeliveryMetrics, MetricsSnapshot};
use crate::payload::decode_buffered;
use crate::request::RequestTemplate;
use crate::retry::RetryPolicy;
use crate::selector::{HostSelector, RoundRobin};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Outcome of a successful delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Attempts made, including the accepted one
    pub attempts: u32,
    /// Host that accepted the payload
    pub host: String,
    pub host_index: usize,
    pub status: StatusCode,
    pub elapsed: Duration,
    /// Decompressed payload size
    pub bytes: usize,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    target: TargetConfig,
    retry: RetryConfig,
    pool: PoolConfig,
    selector: Option<Box<dyn HostSelector>>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder with default retry and pool settings
    pub fn new(target: TargetConfig) -> Self {
        Self {
            target,
            retry: RetryConfig::default(),
            pool: PoolConfig::default(),
            selector: None,
        }
    }

    /// Builder seeded from a full blueprint
    pub fn from_blueprint(blueprint: &RelayBlueprint) -> Self {
        Self::new(blueprint.target.clone())
            .retry(blueprint.retry.clone())
            .pool(blueprint.pool.clone())
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Replace the default randomly-seeded round-robin selector
    pub fn selector(mut self, selector: impl HostSelector + 'static) -> Self {
        self.selector = Some(Box::new(selector));
        self
    }

    /// Build with a pooled reqwest client configured from the pool settings
    pub fn build(self) -> Result<Dispatcher<ReqwestTransport>, DispatcherError> {
        let transport = ReqwestTransport::from_pool(&self.pool)?;
        self.build_with_transport(transport)
    }

    /// Build with a caller-supplied transport
    #[instrument(
        name = "dispatcher_build",
        skip(self, transport),
        fields(hosts = self.target.hosts.len(), path = %self.target.context_path)
    )]
    pub fn build_with_transport<T>(self, transport: T) -> Result<Dispatcher<T>, DispatcherError>
    where
        T: HttpTransport + Sync,
    {
        let target = self.target;
        let host_count = NonZeroUsize::new(target.hosts.len())
            .ok_or_else(|| DispatcherError::config("host list is empty"))?;

        if target.success_codes.is_empty() {
            return Err(DispatcherError::config("success code list is empty"));
        }

        let template = RequestTemplate::new(
            &target.hosts,
            &target.context_path,
            &target.method,
            &target.headers,
        )?;

        let selector = match self.selector {
            Some(selector) if selector.len() != host_count.get() => {
                return Err(DispatcherError::config(format!(
                    "selector covers {} hosts but {} are configured",
                    selector.len(),
                    host_count
                )));
            }
            Some(selector) => selector,
            None => Box::new(RoundRobin::new(host_count)),
        };

        let hosts: Vec<String> = target.hosts.iter().map(|h| h.trim().to_string()).collect();
        let dispatcher = Dispatcher {
            success_codes: target.success_codes.iter().copied().collect(),
            hosts,
            template,
            selector,
            transport,
            retry: RetryPolicy::from(&self.retry),
            metrics: DeliveryMetrics::new(),
        };

        info!(
            hosts = ?dispatcher.hosts,
            cursor = dispatcher.cursor(),
            method = %dispatcher.template.method(),
            "Dispatcher created"
        );
        obs::record_cursor(dispatcher.cursor());

        Ok(dispatcher)
    }
}

/// Delivers payloads to one of a fixed set of hosts.
///
/// The cursor persists across deliveries, so round-robin state carries over
/// from one payload to the next. All methods take `&self`; concurrent
/// deliveries share the cursor through the selector.
pub struct Dispatcher<T = ReqwestTransport> {
    hosts: Vec<String>,
    template: RequestTemplate,
    success_codes: HashSet<u16>,
    selector: Box<dyn HostSelector>,
    transport: T,
    retry: RetryPolicy,
    metrics: DeliveryMetrics,
}

impl<T> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("hosts", &self.hosts)
            .field("cursor", &self.selector.current())
            .field("success_codes", &self.success_codes)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Dispatcher<ReqwestTransport> {
    /// Create a dispatcher with default retry and pool settings
    pub fn new(
        hosts: Vec<String>,
        context_path: impl Into<String>,
        method: impl Into<String>,
        headers: BTreeMap<String, Vec<String>>,
        success_codes: Vec<u16>,
    ) -> Result<Self, DispatcherError> {
        let target = TargetConfig {
            hosts,
            context_path: context_path.into(),
            method: method.into(),
            headers,
            success_codes,
        };
        DispatcherBuilder::new(target).build()
    }
}

impl<T> Dispatcher<T>
where
    T: HttpTransport + Sync,
{
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Index of the host the next attempt will target
    pub fn cursor(&self) -> usize {
        self.selector.current()
    }

    pub fn current_host(&self) -> Option<&str> {
        self.hosts.get(self.cursor()).map(String::as_str)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Get snapshot of delivery counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Make one attempt against `host_index`. Never moves the cursor.
    pub async fn send_once(&self, host_index: usize, body: Bytes) -> Result<StatusCode, AttemptError> {
        let no_such_host = || AttemptError::NoSuchHost {
            index: host_index,
            hosts: self.hosts.len(),
        };
        let host = self.hosts.get(host_index).ok_or_else(no_such_host)?;
        let request = self
            .template
            .request_for(host_index, body)
            .ok_or_else(no_such_host)?;

        let status = self
            .transport
            .execute(request)
            .await
            .map_err(|source| AttemptError::Transport {
                host: host.clone(),
                source,
            })?;

        if self.success_codes.contains(&status.as_u16()) {
            Ok(status)
        } else {
            Err(AttemptError::UnexpectedStatus {
                host: host.clone(),
                status: status.as_u16(),
            })
        }
    }

    /// Read a gzip payload from `reader` to its end, decode it and deliver it.
    ///
    /// The reader is borrowed and never closed here. Malformed input is
    /// rejected before any attempt and leaves the cursor where it was.
    pub async fn deliver<R: AsyncRead + Unpin + ?Sized>(
        &self,
        reader: &mut R,
    ) -> Result<DeliveryReport, DispatcherError> {
        let mut compressed = Vec::new();
        reader.read_to_end(&mut compressed).await?;

        let body = match decode_buffered(&compressed) {
            Ok(body) => body,
            Err(err) => {
                self.metrics.inc_malformed();
                obs::record_malformed_payload();
                warn!(error = %err, "Rejecting payload");
                return Err(err);
            }
        };
        self.deliver_decoded(body).await
    }

    /// Deliver an already-decoded payload, failing over between hosts until
    /// one accepts it or a retry ceiling is hit.
    ///
    /// The same bytes are resent on every attempt.
    #[instrument(name = "dispatcher_deliver", skip(self, body), fields(bytes = body.len()))]
    pub async fn deliver_decoded(&self, body: Bytes) -> Result<DeliveryReport, DispatcherError> {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            let index = self.selector.current();
            let Some(host) = self.hosts.get(index) else {
                // A selector pointing outside the host list cannot recover
                let last_error = AttemptError::NoSuchHost {
                    index,
                    hosts: self.hosts.len(),
                };
                self.metrics.inc_gave_up();
                obs::record_gave_up(attempts);
                error!(error = %last_error, "Host selector out of range, giving up");
                return Err(DispatcherError::GaveUp {
                    attempts,
                    elapsed: started.elapsed(),
                    last_error,
                });
            };
            attempts = attempts.saturating_add(1);
            self.metrics.inc_attempts();

            match self.send_once(index, body.clone()).await {
                Ok(status) => {
                    let elapsed = started.elapsed();
                    self.metrics.inc_deliveries();
                    obs::record_attempt(host, obs::OUTCOME_ACCEPTED);
                    obs::record_delivery(host, attempts, elapsed, body.len());

                    if attempts > 1 {
                        info!(host = %host, attempts, status = status.as_u16(), ?elapsed, "Payload delivered after retries");
                    } else {
                        debug!(host = %host, status = status.as_u16(), ?elapsed, "Payload delivered");
                    }

                    return Ok(DeliveryReport {
                        attempts,
                        host: host.clone(),
                        host_index: index,
                        status,
                        elapsed,
                        bytes: body.len(),
                    });
                }
                Err(err) => {
                    self.metrics.inc_failures();
                    obs::record_attempt(host, err.outcome());

                    let next = self.selector.record_failure(index);
                    obs::record_cursor(next);
                    warn!(host = %host, attempt = attempts, next_host = self.hosts.get(next).map_or("?", String::as_str), error = %err, "Delivery attempt failed");

                    let elapsed = started.elapsed();
                    if self.retry.exhausted(attempts, elapsed) {
                        self.metrics.inc_gave_up();
                        obs::record_gave_up(attempts);
                        warn!(attempts, ?elapsed, "Retry ceiling reached, giving up");
                        return Err(DispatcherError::GaveUp {
                            attempts,
                            elapsed,
                            last_error: err,
                        });
                    }

                    // Failures in this delivery equal attempts so far
                    if let Some(delay) = self.retry.delay_after(attempts) {
                        self.metrics.inc_backoffs();
                        obs::record_backoff(delay);
                        debug!(?delay, failures = attempts, "Backing off");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

/// Convenience function to create a dispatcher from a loaded blueprint
#[instrument(name = "dispatcher_create", skip(blueprint))]
pub fn create_dispatcher(
    blueprint: &RelayBlueprint,
) -> Result<Dispatcher<ReqwestTransport>, DispatcherError> {
    DispatcherBuilder::from_blueprint(blueprint).build()
}
