//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::RelayBlueprint;
use dispatcher::RequestTemplate;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    host_count: usize,
    method: String,
    context_path: String,
    success_codes: Vec<u16>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    let invalid = |config_path: String, error: String| ValidationResult {
        valid: false,
        config_path,
        error: Some(error),
        warnings: None,
        summary: None,
    };

    if !args.config.exists() {
        return invalid(
            config_path,
            format!("File not found: {}", args.config.display()),
        );
    }

    let blueprint = match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => blueprint,
        Err(e) => return invalid(config_path, e.to_string()),
    };

    // Hosts and path must also resolve to request targets
    let target = &blueprint.target;
    if let Err(e) = RequestTemplate::new(
        &target.hosts,
        &target.context_path,
        &target.method,
        &target.headers,
    ) {
        return invalid(config_path, e.to_string());
    }

    let warnings = collect_warnings(&blueprint);
    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: if warnings.is_empty() {
            None
        } else {
            Some(warnings)
        },
        summary: Some(ConfigSummary {
            version: format!("{:?}", blueprint.version),
            host_count: target.hosts.len(),
            method: target.method.clone(),
            context_path: target.context_path.clone(),
            success_codes: target.success_codes.clone(),
        }),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &RelayBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.target.hosts.len() == 1 {
        warnings.push("Only one host configured - failures retry against the same host".to_string());
    }

    if blueprint.retry.is_unbounded() {
        warnings.push(
            "No retry limit - a delivery blocks until some host accepts it (use send --timeout or set retry.max_attempts)"
                .to_string(),
        );
    }

    let non_2xx: Vec<u16> = blueprint
        .target
        .success_codes
        .iter()
        .copied()
        .filter(|code| !(200..300).contains(code))
        .collect();
    if !non_2xx.is_empty() {
        warnings.push(format!(
            "Non-2xx success codes {:?} will count as delivered",
            non_2xx
        ));
    }

    if blueprint.pool.request_timeout_ms.is_none() {
        warnings.push("pool.request_timeout_ms is unset - a stalled host can hang an attempt".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Hosts: {}", summary.host_count);
            println!("  Request: {} {}", summary.method, summary.context_path);
            println!("  Success codes: {:?}", summary.success_codes);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TargetConfig;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_warnings_for_risky_config() {
        let mut target = TargetConfig::new(vec!["a:80".into()], "/x");
        target.success_codes = vec![200, 404];
        let warnings = collect_warnings(&RelayBlueprint::new(target));

        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("Only one host"));
        assert!(warnings[1].contains("No retry limit"));
        assert!(warnings[2].contains("[404]"));
    }

    #[test]
    fn test_no_warnings_for_bounded_multi_host() {
        let mut bp = RelayBlueprint::new(TargetConfig::new(vec!["a:80".into(), "b:80".into()], "/x"));
        bp.retry.max_attempts = Some(10);
        assert!(collect_warnings(&bp).is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_host_format() {
        let file = write_config(
            r#"
[target]
hosts = ["http://a:80"]
context_path = "/x"
"#,
        );
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("bare host"));
    }

    #[test]
    fn test_validate_accepts_good_config() {
        let file = write_config(
            r#"
[target]
hosts = ["a:80", "b:80"]
context_path = "/x"

[retry]
max_attempts = 5
"#,
        );
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };
        assert!(run_validate(&args).is_ok());
    }
}
