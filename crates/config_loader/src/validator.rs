//! Config validation
//!
//! Rules:
//! - field constraints declared on the config types (intervals and the
//!   maximum delay > 0, non-empty namespace and message labels)
//! - `delay.initial_seconds <= delay.max_seconds`
//! - namespace is a dotted name without empty segments

use contracts::{TimingError, ViewerConfig};
use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a parsed config
///
/// Returns the first error found, or Ok(()).
pub fn validate(config: &ViewerConfig) -> Result<(), TimingError> {
    validate_fields(config)?;
    validate_delay(config)?;
    validate_namespace(config)?;
    Ok(())
}

fn validate_fields(config: &ViewerConfig) -> Result<(), TimingError> {
    config.validate().map_err(|errors| {
        let (field, message) = first_error(&errors, "")
            .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
        TimingError::config_validation(field, message)
    })
}

/// First failing field in name order, as a dotted path
fn first_error(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in entries {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        let found = match kind {
            ValidationErrorsKind::Field(list) => list.first().map(|e| {
                let message = match e.params.get("value") {
                    Some(value) => format!("failed '{}' check, got {value}", e.code),
                    None => format!("failed '{}' check", e.code),
                };
                (path.clone(), message)
            }),
            ValidationErrorsKind::Struct(inner) => first_error(inner, &path),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(idx, inner)| first_error(inner, &format!("{path}[{idx}]"))),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

fn validate_delay(config: &ViewerConfig) -> Result<(), TimingError> {
    let delay = &config.delay;
    if delay.initial_seconds > delay.max_seconds {
        return Err(TimingError::config_validation(
            "delay.initial_seconds",
            format!(
                "initial_seconds ({}) must be <= max_seconds ({})",
                delay.initial_seconds, delay.max_seconds
            ),
        ));
    }
    Ok(())
}

fn validate_namespace(config: &ViewerConfig) -> Result<(), TimingError> {
    let namespace = &config.namespace;
    if namespace.split('.').any(|segment| segment.trim().is_empty()) {
        return Err(TimingError::config_validation(
            "namespace",
            format!("'{namespace}' has an empty segment"),
        ));
    }
    if namespace.chars().any(char::is_whitespace) {
        return Err(TimingError::config_validation(
            "namespace",
            format!("'{namespace}' contains whitespace"),
        ));
    }
    Ok(())
}
