#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Kubernetes error: {0}")]
    KubernetesError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Translation error: {0}")]
    TranslationError(String),

    #[error("Unsupported volume type {kind:?} for volume {volume:?}")]
    UnsupportedVolumeType { volume: String, kind: String },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Not implemented: {0}")]
    Unimplemented(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    /// True for errors raised before any backend was contacted.
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::ValidationError(_))
    }
}

// Add From implementations for common error types
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalServerError(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalServerError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::ConfigurationError(format!("YAML error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalServiceError(format!("HTTP error: {}", err))
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::ConfigurationError(format!("URL error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
