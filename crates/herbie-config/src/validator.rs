//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Collapse into the first error, if any.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(ConfigError::InvalidValue {
                field: err.path,
                message: err.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_locator(config, &mut result);
        Self::validate_executor(config, &mut result);
        Self::validate_verification(config, &mut result);
        Self::validate_browser(config, &mut result);

        result
    }

    fn validate_locator(config: &Config, result: &mut ValidationResult) {
        if config.locator.retries == 0 {
            result.add_warning(ValidationWarning::new(
                "locator.retries",
                "retries is 0, elements are looked up once without waiting",
            ));
        }

        if config.locator.heading_depth == 0 {
            result.add_warning(ValidationWarning::new(
                "locator.heading_depth",
                "heading_depth is 0, targets are searched inside the heading itself",
            ));
        }
    }

    fn validate_executor(config: &Config, result: &mut ValidationResult) {
        if config.executor.skip_poll_ms == 0 {
            result.add_error(ValidationError::new(
                "executor.skip_poll_ms",
                "skip_poll_ms must be greater than 0",
            ));
        }
    }

    fn validate_verification(config: &Config, result: &mut ValidationResult) {
        let v = &config.verification;

        if v.poll_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "verification.poll_interval_ms",
                "poll_interval_ms must be greater than 0",
            ));
        }

        if v.page_timeout_ms < v.poll_interval_ms {
            result.add_warning(ValidationWarning::new(
                "verification.page_timeout_ms",
                "page_timeout_ms is shorter than poll_interval_ms, page checks will poll at most once",
            ));
        }

        if v.timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "verification.timeout_ms",
                "timeout_ms must be greater than 0",
            ));
        }
    }

    fn validate_browser(config: &Config, result: &mut ValidationResult) {
        let endpoint = &config.browser.cdp_endpoint;
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            result.add_error(ValidationError::new(
                "browser.cdp_endpoint",
                "cdp_endpoint must start with http:// or https://",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
