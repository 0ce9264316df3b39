//! 配置校验模块
//!
//! 校验规则：
//! - 至少一个主机，主机名非空且唯一
//! - context_path / method 非空
//! - 至少一个成功状态码，且位于 100..=599
//! - 重试上限、连接超时与请求超时 >= 1
//!
//! 字段级规则由 `validator` 派生完成，其余为跨字段手写校验。

use std::collections::HashSet;

use contracts::{ContractError, RelayBlueprint};
use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 RelayBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    validate_declared(blueprint)?;
    validate_hosts(blueprint)?;
    validate_request_template(blueprint)?;
    validate_success_codes(blueprint)?;
    Ok(())
}

/// 执行派生的字段级校验
fn validate_declared(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    match blueprint.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_violation(&errors, "")
                .unwrap_or_else(|| (String::from("<root>"), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

/// 按字段名排序后取第一条违规，保证报错稳定
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by_key(|(name, _)| name.to_string());

    for (name, kind) in fields {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };
        match kind {
            ValidationErrorsKind::Field(violations) => {
                if let Some(violation) = violations.first() {
                    let message = violation
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| violation.code.to_string());
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_violation(inner, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_violation(inner, &format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// 校验主机：非空白且唯一
fn validate_hosts(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, host) in blueprint.target.hosts.iter().enumerate() {
        let trimmed = host.trim();
        if trimmed.is_empty() {
            return Err(ContractError::config_validation(
                format!("target.hosts[{idx}]"),
                "host cannot be blank",
            ));
        }
        if !seen.insert(trimmed) {
            return Err(ContractError::config_validation(
                format!("target.hosts[{idx}]"),
                format!("duplicate host '{trimmed}'"),
            ));
        }
    }
    Ok(())
}

/// 校验共享请求模板
fn validate_request_template(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    if blueprint.target.context_path.trim().is_empty() {
        return Err(ContractError::config_validation(
            "target.context_path",
            "context path cannot be blank",
        ));
    }
    if blueprint.target.method.trim().is_empty() {
        return Err(ContractError::config_validation(
            "target.method",
            "method cannot be blank",
        ));
    }
    Ok(())
}

/// 校验成功状态码范围
fn validate_success_codes(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    for (idx, code) in blueprint.target.success_codes.iter().enumerate() {
        if !(100..=599).contains(code) {
            return Err(ContractError::config_validation(
                format!("target.success_codes[{idx}]"),
                format!("status code must be within 100..=599, got {code}"),
            ));
        }
    }
    Ok(())
}
