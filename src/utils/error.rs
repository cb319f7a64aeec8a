use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Catalog error in {source_name}: {message}")]
    CatalogError {
        source_name: String,
        message: String,
    },

    #[error("Rule table error: {message}")]
    RuleTableError { message: String },

    #[error("Audit processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Catalog,
    Rules,
    Io,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RouterError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RouterError::ConfigError { .. }
            | RouterError::MissingConfigError { .. }
            | RouterError::InvalidConfigValueError { .. }
            | RouterError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            RouterError::CatalogError { .. } | RouterError::SerializationError(_) => {
                ErrorCategory::Catalog
            }
            RouterError::RuleTableError { .. } => ErrorCategory::Rules,
            RouterError::IoError(_) | RouterError::ZipError(_) | RouterError::CsvError(_) => {
                ErrorCategory::Io
            }
            RouterError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Catalog => ErrorSeverity::High,
            // 規則表是編譯進來的，建不起來代表程式本身有問題
            ErrorCategory::Rules => ErrorSeverity::Critical,
            ErrorCategory::Io => ErrorSeverity::Medium,
            ErrorCategory::Processing => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the command line flags or the TOML configuration file"
            }
            ErrorCategory::Catalog => {
                "Make sure protocols.json and regions/*.json exist and contain valid JSON"
            }
            ErrorCategory::Rules => "The built-in rule table is invalid; report this as a bug",
            ErrorCategory::Io => "Check that the output directory is writable and retry",
            ErrorCategory::Processing => "Retry with --concurrency 1 and --verbose for details",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            RouterError::CatalogError {
                source_name,
                message,
            } => format!("Could not read catalog '{}': {}", source_name, message),
            RouterError::IoError(e) => format!("File system error: {}", e),
            RouterError::MissingConfigError { field } => {
                format!("Required setting '{}' is missing", field)
            }
            RouterError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_high_severity() {
        let err = RouterError::MissingConfigError {
            field: "catalog.dir".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.user_friendly_message().contains("catalog.dir"));
    }

    #[test]
    fn test_io_errors_are_medium_severity() {
        let err = RouterError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(err.category(), ErrorCategory::Io);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_processing_error_is_critical() {
        let err = RouterError::ProcessingError {
            message: "worker panicked".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.to_string().contains("worker panicked"));
    }
}
