//! Configuration validation
//!
//! Rules:
//! - field ranges declared on the config types (`validator` derive)
//! - reduced_speed <= cruise_speed
//! - control topics are distinct and outside the status prefix
//! - class names unique and non-empty, at least one phase class present

use std::collections::HashSet;

use contracts::{CarConfig, ContractError, TrafficLightPhase};
use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a CarConfig
///
/// Returns the first violation found, or Ok(()).
pub fn validate(config: &CarConfig) -> Result<(), ContractError> {
    validate_ranges(config)?;
    validate_speeds(config)?;
    validate_topics(config)?;
    validate_classes(config)?;
    Ok(())
}

/// Declarative range / length rules
fn validate_ranges(config: &CarConfig) -> Result<(), ContractError> {
    match config.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_violation(&errors, "")
                .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

fn first_violation(errors: &ValidationErrors, path: &str) -> Option<(String, String)> {
    for (field, kind) in errors.errors() {
        let field_path = if path.is_empty() {
            field.to_string()
        } else {
            format!("{path}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                if let Some(err) = field_errors.first() {
                    return Some((field_path, err.to_string()));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_violation(inner, &field_path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_violation(inner, &format!("{field_path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// Speed policy consistency
fn validate_speeds(config: &CarConfig) -> Result<(), ContractError> {
    let control = &config.control;
    if control.reduced_speed > control.cruise_speed {
        return Err(ContractError::config_validation(
            "control.reduced_speed / control.cruise_speed",
            format!(
                "reduced_speed ({}) must be <= cruise_speed ({})",
                control.reduced_speed, control.cruise_speed
            ),
        ));
    }
    Ok(())
}

/// Topic layout
fn validate_topics(config: &CarConfig) -> Result<(), ContractError> {
    let topics = &config.topics;
    let mut seen = HashSet::new();
    for topic in topics.control_topics() {
        if !seen.insert(topic) {
            return Err(ContractError::config_validation(
                "topics",
                format!("duplicate control topic '{topic}'"),
            ));
        }
        if topic.starts_with(&topics.status_prefix) {
            return Err(ContractError::config_validation(
                "topics.status_prefix",
                format!(
                    "control topic '{topic}' falls under status prefix '{}'",
                    topics.status_prefix
                ),
            ));
        }
    }
    Ok(())
}

/// Detector class table
fn validate_classes(config: &CarConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, class) in config.detection.classes.iter().enumerate() {
        if class.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("detection.classes[{idx}].name"),
                "class name cannot be empty",
            ));
        }
        if !seen.insert(class.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("detection.classes[{idx}].name"),
                format!("duplicate class name '{}'", class.name),
            ));
        }
    }

    let has_phase_class = config
        .detection
        .classes
        .iter()
        .any(|class| TrafficLightPhase::from_token(&class.name).is_some());
    if !has_phase_class {
        return Err(ContractError::config_validation(
            "detection.classes",
            "class table contains no traffic-light phase class",
        ));
    }
    Ok(())
}
