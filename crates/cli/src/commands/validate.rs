//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::ViewerConfig;
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
    config: Option<ViewerConfig>,
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

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            config: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                config: Some(config),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            config: None,
        },
    }
}

/// Non-fatal issues
fn collect_warnings(config: &ViewerConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.delay.release_interval_ms > 1000 {
        warnings.push(format!(
            "delay.release_interval_ms = {} - delayed messages may be released late",
            config.delay.release_interval_ms
        ));
    }
    if config.playback.tick_interval_ms > u64::from(config.playback.step_seconds) * 1000 {
        warnings.push(
            "playback.tick_interval_ms exceeds the step - playback will advance slower than real time"
                .to_string(),
        );
    }
    if config.delay.initial_seconds > 0 {
        warnings.push(format!(
            "live services start {}s behind the feed",
            config.delay.initial_seconds
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref config) = result.config {
            println!("\n  Namespace: {}", config.namespace);
            println!(
                "  Delay: initial {}s, max {}s, release every {}ms",
                config.delay.initial_seconds,
                config.delay.max_seconds,
                config.delay.release_interval_ms
            );
            println!(
                "  Playback: {}s step, tick every {}ms",
                config.playback.step_seconds, config.playback.tick_interval_ms
            );
            println!(
                "  System messages: {} / {}",
                config.messages.category, config.messages.message_type
            );
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
