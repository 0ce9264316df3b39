//! 投递指标收集模块
//!
//! 通过 `metrics` 门面导出 Prometheus 指标，并在内存中聚合投递统计。

use std::collections::BTreeMap;
use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// 单次尝试结果标签
pub const OUTCOME_ACCEPTED: &str = "accepted";
pub const OUTCOME_TRANSPORT_ERROR: &str = "transport_error";
pub const OUTCOME_UNEXPECTED_STATUS: &str = "unexpected_status";

/// 记录一次发送尝试
pub fn record_attempt(host: &str, outcome: &'static str) {
    counter!(
        "gzrelay_attempts_total",
        "host" => host.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// 记录一次成功投递
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_delivery;
///
/// let report = dispatcher.deliver(&mut payload).await?;
/// record_delivery(&report.host, report.attempts, report.elapsed, report.bytes);
/// ```
pub fn record_delivery(host: &str, attempts: u32, elapsed: Duration, bytes: usize) {
    counter!("gzrelay_deliveries_total", "host" => host.to_string()).increment(1);
    histogram!("gzrelay_attempts_per_delivery").record(attempts as f64);
    histogram!("gzrelay_delivery_latency_ms").record(elapsed.as_secs_f64() * 1000.0);
    histogram!("gzrelay_payload_bytes").record(bytes as f64);
}

/// 记录退避休眠
pub fn record_backoff(delay: Duration) {
    counter!("gzrelay_backoffs_total").increment(1);
    histogram!("gzrelay_backoff_ms").record(delay.as_secs_f64() * 1000.0);
}

/// 记录达到重试上限后放弃的投递
pub fn record_gave_up(attempts: u32) {
    counter!("gzrelay_gave_up_total").increment(1);
    histogram!("gzrelay_attempts_before_give_up").record(attempts as f64);
}

/// 记录非 gzip 负载
pub fn record_malformed_payload() {
    counter!("gzrelay_malformed_payloads_total").increment(1);
}

/// 记录当前游标位置
pub fn record_cursor(index: usize) {
    gauge!("gzrelay_cursor").set(index as f64);
}

/// 单个负载的最终结果 (用于内存聚合)
#[derive(Debug, Clone, Copy)]
pub enum DeliveryOutcome<'a> {
    /// 某个主机接受了负载
    Delivered {
        host: &'a str,
        attempts: u32,
        latency: Duration,
        bytes: usize,
    },
    /// 负载不是合法 gzip
    Malformed,
    /// 达到重试上限
    GaveUp { attempts: u32 },
    /// 调用方截止时间到达
    TimedOut,
    /// 其他投递错误 (例如读取负载时的 I/O 错误)
    Failed,
}

/// 投递指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DeliveryStatsAggregator {
    /// 成功投递数
    pub delivered: u64,

    /// 非 gzip 负载数
    pub malformed: u64,

    /// 放弃的投递数
    pub gave_up: u64,

    /// 超时的投递数
    pub timed_out: u64,

    /// 其他错误导致失败的投递数
    pub failed: u64,

    /// 尝试次数统计 (仅成功投递)
    pub attempt_stats: RunningStats,

    /// 投递耗时统计 (毫秒)
    pub latency_stats: RunningStats,

    /// 解压后字节总数
    pub bytes_delivered: u64,

    /// 各主机接受次数
    pub accepted_by_host: BTreeMap<String, u64>,
}

impl DeliveryStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, outcome: &DeliveryOutcome<'_>) {
        match *outcome {
            DeliveryOutcome::Delivered {
                host,
                attempts,
                latency,
                bytes,
            } => {
                self.delivered += 1;
                self.bytes_delivered += bytes as u64;
                self.attempt_stats.push(attempts as f64);
                self.latency_stats.push(latency.as_secs_f64() * 1000.0);
                *self.accepted_by_host.entry(host.to_string()).or_insert(0) += 1;
            }
            DeliveryOutcome::Malformed => self.malformed += 1,
            DeliveryOutcome::GaveUp { .. } => self.gave_up += 1,
            DeliveryOutcome::TimedOut => self.timed_out += 1,
            DeliveryOutcome::Failed => self.failed += 1,
        }
    }

    /// 总负载数
    pub fn total(&self) -> u64 {
        self.delivered + self.malformed + self.gave_up + self.timed_out + self.failed
    }

    /// 未送达的负载数
    pub fn undelivered(&self) -> u64 {
        self.total() - self.delivered
    }

    /// 生成摘要报告
    pub fn summary(&self) -> DeliverySummary {
        let total = self.total();
        DeliverySummary {
            total_payloads: total,
            delivered: self.delivered,
            malformed: self.malformed,
            gave_up: self.gave_up,
            timed_out: self.timed_out,
            failed: self.failed,
            success_rate: if total > 0 {
                self.delivered as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            bytes_delivered: self.bytes_delivered,
            attempts: StatsSummary::from(&self.attempt_stats),
            latency_ms: StatsSummary::from(&self.latency_stats),
            accepted_by_host: self.accepted_by_host.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub total_payloads: u64,
    pub delivered: u64,
    pub malformed: u64,
    pub gave_up: u64,
    pub timed_out: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub bytes_delivered: u64,
    pub attempts: StatsSummary,
    pub latency_ms: StatsSummary,
    pub accepted_by_host: BTreeMap<String, u64>,
}

impl std::fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(f, "Payloads: {}", self.total_payloads)?;
        writeln!(
            f,
            "Delivered: {} ({:.2}%)",
            self.delivered, self.success_rate
        )?;
        writeln!(f, "Malformed: {}", self.malformed)?;
        writeln!(f, "Gave up: {}", self.gave_up)?;
        writeln!(f, "Timed out: {}", self.timed_out)?;
        writeln!(f, "Failed: {}", self.failed)?;
        writeln!(f, "Bytes delivered: {}", self.bytes_delivered)?;
        writeln!(f, "Attempts per delivery: {}", self.attempts)?;
        writeln!(f, "Latency (ms): {}", self.latency_ms)?;

        if !self.accepted_by_host.is_empty() {
            writeln!(f, "Accepted by host:")?;
            for (host, count) in &self.accepted_by_host {
                writeln!(f, "  {}: {}", host, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.2}, max={:.2}, mean={:.2} (n={})",
                self.min, self.max, self.mean, self.count
            )
        }
    }
}

/// 在线统计 (增量均值)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
            self.mean += (value - self.mean) / self.count as f64;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
