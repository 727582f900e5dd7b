use thiserror::Error;

/// Errors raised while compiling an AQL query to SQL.
///
/// Every variant describes invalid or unsupported input. None of them are
/// transient, so callers should never retry a failed compilation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AqlError {
    #[error("Unknown alias '{0}'")]
    UnknownAlias(String),

    #[error("Duplicate alias '{0}' in FROM clause")]
    DuplicateAlias(String),

    #[error("Unsupported FROM operand: {0}")]
    UnsupportedFromOperand(String),

    #[error("Unsupported SELECT expression: {0}")]
    UnsupportedSelectExpression(String),

    #[error("Unsupported WHERE expression: {0}")]
    UnsupportedWhereExpression(String),

    #[error("Unsupported node predicate: {0}")]
    UnsupportedNodePredicate(String),

    #[error("Unsupported function call: {0}")]
    UnsupportedFunctionCall(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("Invalid arguments for function {function}: {message}")]
    InvalidFunctionArguments { function: String, message: String },

    #[error("Missing parameter ${0}")]
    MissingParameter(String),

    #[error("Parameter ${name} must be a {expected}, got {actual}")]
    ParameterTypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid term code '{0}', expected terminology::code")]
    InvalidTermCodeFormat(String),

    #[error("Query too complex: {0}")]
    QueryTooComplex(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AqlError {
    pub fn unknown_alias(alias: impl Into<String>) -> Self {
        Self::UnknownAlias(alias.into())
    }

    pub fn duplicate_alias(alias: impl Into<String>) -> Self {
        Self::DuplicateAlias(alias.into())
    }

    pub fn unsupported_feature(feature: impl Into<String>) -> Self {
        Self::UnsupportedFeature(feature.into())
    }

    pub fn missing_parameter(name: impl Into<String>) -> Self {
        Self::MissingParameter(name.into())
    }

    pub fn invalid_arguments(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFunctionArguments {
            function: function.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if this error should be reported to the client (4xx category)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownAlias(_) | Self::DuplicateAlias(_) => ErrorCategory::Reference,
            Self::UnsupportedFromOperand(_)
            | Self::UnsupportedSelectExpression(_)
            | Self::UnsupportedWhereExpression(_)
            | Self::UnsupportedNodePredicate(_)
            | Self::UnsupportedFunctionCall(_)
            | Self::UnsupportedFeature(_) => ErrorCategory::Unsupported,
            Self::MissingParameter(_) | Self::ParameterTypeMismatch { .. } => {
                ErrorCategory::Parameter
            }
            Self::InvalidFunctionArguments { .. }
            | Self::InvalidTermCodeFormat(_)
            | Self::QueryTooComplex(_) => ErrorCategory::Validation,
            Self::Configuration(_) => ErrorCategory::Configuration,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Reference,
    Unsupported,
    Parameter,
    Validation,
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Parameter => write!(f, "parameter"),
            Self::Validation => write!(f, "validation"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

pub type Result<T> = std::result::Result<T, AqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_errors_are_client_errors() {
        assert!(AqlError::unknown_alias("x").is_client_error());
        assert!(AqlError::missing_parameter("foo").is_client_error());
        assert!(!AqlError::configuration("bad schema").is_client_error());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            AqlError::duplicate_alias("c").category(),
            ErrorCategory::Reference
        );
        assert_eq!(
            AqlError::unsupported_feature("ORDER BY").category(),
            ErrorCategory::Unsupported
        );
        assert_eq!(
            AqlError::ParameterTypeMismatch {
                name: "p".into(),
                expected: "string",
                actual: "number",
            }
            .category(),
            ErrorCategory::Parameter
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AqlError::missing_parameter("foo").to_string(),
            "Missing parameter $foo"
        );
        assert_eq!(
            AqlError::InvalidTermCodeFormat("snomed".into()).to_string(),
            "Invalid term code 'snomed', expected terminology::code"
        );
    }
}
