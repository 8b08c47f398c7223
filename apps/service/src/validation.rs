use url::Url;

use crate::error::MonitorError;

const MAX_NAME_LEN: usize = 100;

/// Validation results with specific error messages
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { is_valid: false, error: Some(msg.into()) }
    }

    pub fn into_result(self) -> Result<(), MonitorError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(MonitorError::InvalidEndpoint(
                self.error.unwrap_or_else(|| "Validation failed".to_string()),
            ))
        }
    }

    fn and(self, other: impl FnOnce() -> ValidationResult) -> ValidationResult {
        if self.is_valid { other() } else { self }
    }
}

/// Validate an HTTP/HTTPS URL to be monitored
pub fn validate_endpoint_url(target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("URL cannot be empty");
    }

    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return ValidationResult::err(format!(
                    "Invalid scheme '{scheme}'. Must be http or https"
                ));
            }

            if url.host_str().is_none_or(str::is_empty) {
                return ValidationResult::err("URL must have a valid host");
            }

            ValidationResult::ok()
        }
        Err(e) => {
            // If it fails to parse, check if it's missing a scheme
            if !target.contains("://") {
                ValidationResult::err("URL must include scheme (http:// or https://)")
            } else {
                ValidationResult::err(format!("Invalid URL: {e}"))
            }
        }
    }
}

/// Validate the display name of an endpoint
pub fn validate_endpoint_name(name: &str) -> ValidationResult {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return ValidationResult::err("Name cannot be empty");
    }

    if trimmed.chars().count() > MAX_NAME_LEN {
        return ValidationResult::err(format!("Name too long (max {MAX_NAME_LEN} characters)"));
    }

    ValidationResult::ok()
}

/// Validate everything a registration carries, name first
pub fn validate_registration(name: &str, url: &str) -> ValidationResult {
    validate_endpoint_name(name).and(|| validate_endpoint_url(url))
}
