//! Relay orchestrator - feeds payloads to the dispatcher one at a time.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::RelayBlueprint;
use dispatcher::{create_dispatcher, Dispatcher, DispatcherError, HttpTransport};
use observability::DeliveryOutcome;
use tokio::io::AsyncRead;
use tracing::{info, instrument, warn};

use super::RelayStats;
use crate::error::CliError;

/// Where a payload comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSource {
    Stdin,
    File(PathBuf),
}

impl PayloadSource {
    /// Map command-line paths to sources; no paths means stdin
    pub fn from_args(paths: &[PathBuf]) -> Vec<Self> {
        if paths.is_empty() {
            return vec![Self::Stdin];
        }
        paths
            .iter()
            .map(|p| {
                if p.as_os_str() == "-" {
                    Self::Stdin
                } else {
                    Self::File(p.clone())
                }
            })
            .collect()
    }

    fn label(&self) -> String {
        match self {
            Self::Stdin => "<stdin>".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }

    /// Open the source for streaming into the dispatcher
    async fn open(&self) -> Result<Box<dyn AsyncRead + Unpin + Send>, CliError> {
        match self {
            Self::Stdin => Ok(Box::new(tokio::io::stdin())),
            Self::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| CliError::payload_read(path, e))?;
                Ok(Box::new(file))
            }
        }
    }
}

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Validated blueprint, overrides applied
    pub blueprint: RelayBlueprint,

    /// Payloads in delivery order
    pub payloads: Vec<PayloadSource>,

    /// Per-payload deadline (None = wait until delivered)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main relay orchestrator
pub struct Relay {
    config: RelayConfig,
}

impl Relay {
    /// Create a new relay with the given configuration
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Build the dispatcher and deliver every payload
    pub async fn run(self) -> Result<RelayStats> {
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let dispatcher =
            create_dispatcher(&self.config.blueprint).context("Failed to create dispatcher")?;

        Ok(self.run_with(&dispatcher).await)
    }

    /// Deliver every payload through `dispatcher`, strictly in order.
    ///
    /// A payload that cannot be read or delivered is counted and the next
    /// one proceeds.
    #[instrument(name = "relay_run", skip(self, dispatcher), fields(payloads = self.config.payloads.len()))]
    pub async fn run_with<T>(&self, dispatcher: &Dispatcher<T>) -> RelayStats
    where
        T: HttpTransport + Sync,
    {
        let start_time = Instant::now();
        let mut stats = RelayStats::default();

        for source in &self.config.payloads {
            let label = source.label();

            let mut reader = match source.open().await {
                Ok(reader) => reader,
                Err(e) => {
                    warn!(payload = %label, error = %e, "Skipping unreadable payload");
                    stats.unreadable += 1;
                    continue;
                }
            };

            let delivery = dispatcher.deliver(&mut *reader);
            let result = match self.config.timeout {
                Some(deadline) => tokio::time::timeout(deadline, delivery).await.ok(),
                None => Some(delivery.await),
            };

            match result {
                Some(Ok(report)) => {
                    info!(
                        payload = %label,
                        host = %report.host,
                        attempts = report.attempts,
                        bytes = report.bytes,
                        "Payload delivered"
                    );
                    stats.deliveries.update(&DeliveryOutcome::Delivered {
                        host: &report.host,
                        attempts: report.attempts,
                        latency: report.elapsed,
                        bytes: report.bytes,
                    });
                }
                Some(Err(DispatcherError::GaveUp { attempts, .. })) => {
                    warn!(payload = %label, attempts, "Payload not delivered");
                    stats
                        .deliveries
                        .update(&DeliveryOutcome::GaveUp { attempts });
                }
                Some(Err(e @ DispatcherError::MalformedPayload { .. })) => {
                    warn!(payload = %label, error = %e, "Payload is not gzip");
                    stats.deliveries.update(&DeliveryOutcome::Malformed);
                }
                Some(Err(e)) => {
                    warn!(payload = %label, error = %e, "Payload could not be delivered");
                    stats.deliveries.update(&DeliveryOutcome::Failed);
                }
                None => {
                    warn!(payload = %label, timeout = ?self.config.timeout, "Payload deadline reached");
                    stats.deliveries.update(&DeliveryOutcome::TimedOut);
                }
            }
        }

        stats.duration = start_time.elapsed();
        stats.final_host = dispatcher.current_host().map(str::to_string);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{RetryConfig, TargetConfig};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::path::Path;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn write_payload(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_payload_sources_from_args() {
        assert_eq!(PayloadSource::from_args(&[]), vec![PayloadSource::Stdin]);
        assert_eq!(
            PayloadSource::from_args(&[PathBuf::from("a.gz"), PathBuf::from("-")]),
            vec![PayloadSource::File(PathBuf::from("a.gz")), PayloadSource::Stdin]
        );
    }

    #[tokio::test]
    async fn test_relay_counts_each_outcome() {
        let mut down = mockito::Server::new_async().await;
        let mut up = mockito::Server::new_async().await;
        let _down_mock = down
            .mock("POST", "/ingest")
            .with_status(500)
            .create_async()
            .await;
        let up_mock = up
            .mock("POST", "/ingest")
            .with_status(200)
            .expect(2)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let first = write_payload(dir.path(), "first.gz", &gzip(b"one"));
        let plain = write_payload(dir.path(), "plain.txt", b"not gzip");
        let second = write_payload(dir.path(), "second.gz", &gzip(b"two"));
        let missing = dir.path().join("missing.gz");

        let blueprint = RelayBlueprint::new(TargetConfig::new(
            vec![down.host_with_port(), up.host_with_port()],
            "/ingest",
        ));
        let relay = Relay::new(RelayConfig {
            blueprint,
            payloads: PayloadSource::from_args(&[first, plain, missing, second]),
            timeout: None,
            metrics_port: None,
        });

        let stats = relay.run().await.unwrap();

        assert_eq!(stats.total(), 4);
        assert_eq!(stats.deliveries.delivered, 2);
        assert_eq!(stats.deliveries.malformed, 1);
        assert_eq!(stats.unreadable, 1);
        assert_eq!(stats.failed(), 2);
        assert_eq!(stats.final_host, Some(up.host_with_port()));
        up_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_relay_counts_read_errors_during_delivery() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/ingest")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        // A directory opens fine on Linux but fails once read
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        let good = write_payload(dir.path(), "good.gz", &gzip(b"ok"));

        let blueprint =
            RelayBlueprint::new(TargetConfig::new(vec![server.host_with_port()], "/ingest"));
        let stats = Relay::new(RelayConfig {
            blueprint,
            payloads: PayloadSource::from_args(&[nested, good]),
            timeout: None,
            metrics_port: None,
        })
        .run()
        .await
        .unwrap();

        assert_eq!(stats.unreadable, 0);
        assert_eq!(stats.deliveries.failed, 1);
        assert_eq!(stats.deliveries.delivered, 1);
        assert_eq!(stats.failed(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_relay_gives_up_and_continues() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/ingest")
            .with_status(503)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let a = write_payload(dir.path(), "a.gz", &gzip(b"a"));
        let b = write_payload(dir.path(), "b.gz", &gzip(b"b"));

        let mut blueprint =
            RelayBlueprint::new(TargetConfig::new(vec![server.host_with_port()], "/ingest"));
        blueprint.retry = RetryConfig {
            max_attempts: Some(2),
            ..RetryConfig::default()
        };

        let stats = Relay::new(RelayConfig {
            blueprint,
            payloads: PayloadSource::from_args(&[a, b]),
            timeout: None,
            metrics_port: None,
        })
        .run()
        .await
        .unwrap();

        assert_eq!(stats.deliveries.gave_up, 2);
        assert_eq!(stats.failed(), 2);
    }

    #[tokio::test]
    async fn test_relay_deadline_stops_unbounded_retry() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/ingest")
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let payload = write_payload(dir.path(), "p.gz", &gzip(b"p"));

        let blueprint =
            RelayBlueprint::new(TargetConfig::new(vec![server.host_with_port()], "/ingest"));

        let stats = Relay::new(RelayConfig {
            blueprint,
            payloads: vec![PayloadSource::File(payload)],
            timeout: Some(Duration::from_millis(300)),
            metrics_port: None,
        })
        .run()
        .await
        .unwrap();

        assert_eq!(stats.deliveries.timed_out, 1);
        assert_eq!(stats.failed(), 1);
    }
}
