//! # Config Loader
//!
//! 读取中继配置 (`relay.toml` / `relay.json`) 并生成经过校验的 `RelayBlueprint`。
//!
//! 加载成功即保证：
//! - 主机列表非空、无重复
//! - 请求路径与方法非空，成功状态码合法
//! - 重试上限与各项超时不为 0
//!
//! 主机格式 (`host[:port]`) 与请求路径能否拼成 URL 由 dispatcher 构造时检查。
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("relay.toml")).unwrap();
//! for host in &blueprint.target.hosts {
//!     println!("{} http://{}{}", blueprint.target.method, host, blueprint.target.context_path);
//! }
//! ```

mod parser;
mod validator;

pub use contracts::RelayBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// 中继配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从文件加载中继配置，格式由扩展名决定
    ///
    /// 读取失败返回 `ContractError::Io`，解析失败返回 `ConfigParse`，
    /// 校验失败返回带字段路径的 `ConfigValidation` (如 `target.hosts[1]`)。
    pub fn load_from_path(path: &Path) -> Result<RelayBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// 从文本加载中继配置 (解析后立即校验)
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<RelayBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// 重新校验 (例如 CLI 覆盖了主机列表或重试上限之后)
    pub fn validate(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    pub fn to_toml(blueprint: &RelayBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(blueprint: &RelayBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}
