//! 配置解析模块
//!
//! 只负责把文本反序列化为 `RelayBlueprint`，缺省字段由 serde 默认值补齐
//! (method = POST, success_codes = [200], 不限重试次数)。校验在 `validator` 中完成。

use std::path::Path;

use contracts::{ContractError, RelayBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML，中继配置的常用格式
    Toml,
    /// JSON，可以用 `null` 关闭请求超时
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式 (不区分大小写)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// 从配置文件路径推断格式，例如 `relay.toml`
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                ContractError::config_parse(format!(
                    "cannot tell relay config format of {} (expected .toml or .json)",
                    path.display()
                ))
            })?;
        Self::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

/// 把配置文本解析为 `RelayBlueprint` (不做校验)
pub fn parse(content: &str, format: ConfigFormat) -> Result<RelayBlueprint, ContractError> {
    let parsed = match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(box_source),
        ConfigFormat::Json => serde_json::from_str(content).map_err(box_source),
    };
    parsed.map_err(|source| ContractError::ConfigParse {
        message: format!("{} parse error: {source}", format.name()),
        source: Some(source),
    })
}

fn box_source<E>(e: E) -> Box<dyn std::error::Error + Send + Sync>
where
    E: std::error::Error + Send + Sync + 'static,
{
    Box::new(e)
}
