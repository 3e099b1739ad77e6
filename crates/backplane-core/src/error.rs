use thiserror::Error;

/// Core error types for backplane operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Version conflict on {entity} {id}: expected {expected}, stored {stored}")]
    VersionConflict {
        entity: String,
        id: String,
        expected: i64,
        stored: i64,
    },

    #[error("{entity} name already taken: {name}")]
    DuplicateName { entity: String, name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// Create a new Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new NotFound error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a new VersionConflict error
    pub fn version_conflict(
        entity: impl Into<String>,
        id: impl Into<String>,
        expected: i64,
        stored: i64,
    ) -> Self {
        Self::VersionConflict {
            entity: entity.into(),
            id: id.into(),
            expected,
            stored,
        }
    }

    /// Create a new DuplicateName error
    pub fn duplicate_name(entity: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            entity: entity.into(),
            name: name.into(),
        }
    }

    /// Create a new UnsupportedOperation error
    pub fn unsupported_operation(tag: impl Into<String>) -> Self {
        Self::UnsupportedOperation(tag.into())
    }

    /// Create a new Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Check if this error is a client error (4xx category)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::NotFound { .. }
                | Self::VersionConflict { .. }
                | Self::DuplicateName { .. }
                | Self::DivisionByZero
                | Self::UnsupportedOperation(_)
        )
    }

    /// Check if this error is a server error (5xx category)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::JsonError(_))
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } | Self::UnsupportedOperation(_) => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::VersionConflict { .. } | Self::DuplicateName { .. } => ErrorCategory::Conflict,
            Self::DivisionByZero => ErrorCategory::Arithmetic,
            Self::JsonError(_) => ErrorCategory::Serialization,
            Self::Storage(_) => ErrorCategory::System,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Arithmetic,
    Serialization,
    System,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Arithmetic => write!(f, "arithmetic"),
            Self::Serialization => write!(f, "serialization"),
            Self::System => write!(f, "system"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
