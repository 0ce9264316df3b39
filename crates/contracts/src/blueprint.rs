//! RelayBlueprint - Config Loader 输出
//!
//! 描述完整的投递配置：目标主机、共享请求模板、重试策略、连接池。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use validator::Validate;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的投递配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RelayBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 目标主机与共享请求模板
    #[validate(nested)]
    pub target: TargetConfig,

    /// 重试策略
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig,

    /// HTTP 连接池
    #[serde(default)]
    #[validate(nested)]
    pub pool: PoolConfig,
}

impl RelayBlueprint {
    /// 使用默认重试与连接池配置创建蓝图
    pub fn new(target: TargetConfig) -> Self {
        Self {
            version: ConfigVersion::V1,
            target,
            retry: RetryConfig::default(),
            pool: PoolConfig::default(),
        }
    }
}

/// 目标配置：所有主机共享同一路径、方法与请求头
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TargetConfig {
    /// 候选主机列表 (`host[:port]`)，顺序即轮询顺序
    #[validate(length(min = 1, message = "at least one host is required"))]
    pub hosts: Vec<String>,

    /// 共享的上下文路径 (e.g., "/api/v1/ingest")
    #[validate(length(min = 1, message = "context path cannot be empty"))]
    pub context_path: String,

    /// HTTP 方法
    #[serde(default = "default_method")]
    #[validate(length(min = 1, message = "method cannot be empty"))]
    pub method: String,

    /// 请求头：名称 -> 有序值列表
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,

    /// 视为投递成功的状态码
    #[serde(default = "default_success_codes")]
    #[validate(length(min = 1, message = "at least one success code is required"))]
    pub success_codes: Vec<u16>,
}

impl TargetConfig {
    /// 以默认方法 (POST) 与成功码 (200) 创建目标配置
    pub fn new(hosts: Vec<String>, context_path: impl Into<String>) -> Self {
        Self {
            hosts,
            context_path: context_path.into(),
            method: default_method(),
            headers: BTreeMap::new(),
            success_codes: default_success_codes(),
        }
    }
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_success_codes() -> Vec<u16> {
    vec![200]
}

/// 重试策略配置
///
/// 两个上限均为 `None` 时保持无限重试 (至少一次投递)。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RetryConfig {
    /// 连续失败达到该次数后，每次重试前休眠
    #[serde(default = "default_backoff_after")]
    pub backoff_after: u32,

    /// 退避休眠时长 (毫秒)
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// 最大尝试次数
    #[serde(default)]
    #[validate(range(min = 1, message = "max_attempts must be >= 1"))]
    pub max_attempts: Option<u32>,

    /// 最长投递耗时 (毫秒)
    #[serde(default)]
    #[validate(range(min = 1, message = "max_elapsed_ms must be >= 1"))]
    pub max_elapsed_ms: Option<u64>,
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn max_elapsed(&self) -> Option<Duration> {
        self.max_elapsed_ms.map(Duration::from_millis)
    }

    /// 未配置任何上限
    pub fn is_unbounded(&self) -> bool {
        self.max_attempts.is_none() && self.max_elapsed_ms.is_none()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_after: default_backoff_after(),
            backoff_ms: default_backoff_ms(),
            max_attempts: None,
            max_elapsed_ms: None,
        }
    }
}

fn default_backoff_after() -> u32 {
    10
}

fn default_backoff_ms() -> u64 {
    1000
}

/// HTTP 连接池配置 (所有主机共享一个客户端)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PoolConfig {
    /// 每个主机保留的最大空闲连接数
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,

    /// 空闲连接存活时间 (秒)
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// 建立连接超时 (毫秒)
    #[serde(default = "default_connect_timeout_ms")]
    #[validate(range(min = 1, message = "connect_timeout_ms must be >= 1"))]
    pub connect_timeout_ms: u64,

    /// 单次请求超时 (毫秒)
    ///
    /// 缺省为 30 秒。`None` 表示不限制：JSON 中写 `null`，或在代码中设置；
    /// TOML 没有 null，因此无法通过 TOML 关闭该超时。
    #[serde(default = "default_request_timeout_ms")]
    #[validate(range(min = 1, message = "request_timeout_ms must be >= 1"))]
    pub request_timeout_ms: Option<u64>,
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: default_max_idle_per_host(),
            idle_timeout_secs: default_idle_timeout_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_max_idle_per_host() -> usize {
    8
}

fn default_idle_timeout_secs() -> u64 {
    90
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> Option<u64> {
    Some(30_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blueprint_defaults_from_minimal_toml() {
        let content = r#"
[target]
hosts = ["a:80"]
context_path = "/ingest"
"#;
        let bp: RelayBlueprint = toml::from_str(content).unwrap();
        assert_eq!(bp.version, ConfigVersion::V1);
        assert_eq!(bp.target.method, "POST");
        assert_eq!(bp.target.success_codes, vec![200]);
        assert!(bp.target.headers.is_empty());
        assert_eq!(bp.retry, RetryConfig::default());
        assert_eq!(bp.pool, PoolConfig::default());
        assert!(bp.retry.is_unbounded());
    }

    #[test]
    fn retry_durations() {
        let retry = RetryConfig {
            backoff_after: 3,
            backoff_ms: 250,
            max_attempts: None,
            max_elapsed_ms: Some(1500),
        };
        assert_eq!(retry.backoff(), Duration::from_millis(250));
        assert_eq!(retry.max_elapsed(), Some(Duration::from_millis(1500)));
        assert!(!retry.is_unbounded());
    }

    #[test]
    fn nested_validation_reaches_target() {
        let bp = RelayBlueprint::new(TargetConfig::new(vec![], "/ingest"));
        let errors = bp.validate().unwrap_err();
        assert!(errors.errors().contains_key("target"), "got: {errors:?}");
    }

    #[test]
    fn headers_keep_value_order() {
        let json = r#"{
            "target": {
                "hosts": ["a:80"],
                "context_path": "/x",
                "headers": { "X-Tag": ["one", "two"] }
            }
        }"#;
        let bp: RelayBlueprint = serde_json::from_str(json).unwrap();
        assert_eq!(
            bp.target.headers.get("X-Tag"),
            Some(&vec!["one".to_string(), "two".to_string()])
        );
    }
}
