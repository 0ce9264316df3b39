//! # Dispatcher
//!
//! 负载投递模块。
//!
//! 负责：
//! - 解压 gzip 负载
//! - 按共享请求模板向当前主机发送
//! - 失败时轮询切换主机并重试，直到某个主机接受
//!
//! ```no_run
//! # async fn run() -> Result<(), dispatcher::DispatcherError> {
//! use std::collections::BTreeMap;
//! use dispatcher::Dispatcher;
//!
//! let dispatcher = Dispatcher::new(
//!     vec!["10.0.0.1:8080".into(), "10.0.0.2:8080".into()],
//!     "/api/v1/ingest",
//!     "POST",
//!     BTreeMap::new(),
//!     vec![200, 204],
//! )?;
//!
//! let payload = std::fs::read("events.json.gz")?;
//! let report = dispatcher.deliver(&mut payload.as_slice()).await?;
//! println!("accepted by {} after {} attempts", report.host, report.attempts);
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod payload;
pub mod request;
pub mod retry;
pub mod selector;
pub mod transport;

pub use contracts::{PoolConfig, RelayBlueprint, RetryConfig, TargetConfig};
pub use dispatcher::{create_dispatcher, DeliveryReport, Dispatcher, DispatcherBuilder};
pub use error::{AttemptError, DispatcherError, TransportError, TransportErrorKind};
pub use metrics::{DeliveryMetrics, MetricsSnapshot};
pub use payload::decode_gzip;
pub use request::{OutboundRequest, RequestTemplate};
pub use retry::RetryPolicy;
pub use selector::{HostSelector, RoundRobin};
pub use transport::{HttpTransport, LocalHttpTransport, ReqwestTransport};
pub use reqwest::StatusCode;
