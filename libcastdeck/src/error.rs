//! Error types for Castdeck

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CastdeckError>;

#[derive(Error, Debug)]
pub enum CastdeckError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Media storage error: {0}")]
    Storage(#[source] std::io::Error),
}

impl CastdeckError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CastdeckError::InvalidArgument(_) | CastdeckError::NotFound(_) => 3,
            CastdeckError::Publish(PublishError::Authentication(_)) => 2,
            CastdeckError::Config(_) => 2,
            CastdeckError::Publish(_) => 1,
            CastdeckError::Database(_) => 1,
            CastdeckError::Conflict(_) => 1,
            CastdeckError::Storage(_) => 1,
        }
    }

    pub(crate) fn not_found(kind: &str, id: &str) -> Self {
        CastdeckError::NotFound(format!("{} not found: {}", kind, id))
    }
}

impl From<sqlx::Error> for CastdeckError {
    fn from(err: sqlx::Error) -> Self {
        CastdeckError::Database(DbError::SqlxError(err))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },
}

/// Failure reported by a platform publisher
///
/// Retryable variants describe conditions that may clear up on their own
/// (network trouble, rate limits, timeouts); everything else is terminal for
/// the post being dispatched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Rejected by platform: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not supported: {0}")]
    Unsupported(String),
}

impl PublishError {
    /// Whether the dispatcher may try this post again later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PublishError::Network(_) | PublishError::RateLimit(_) | PublishError::Timeout(_)
        )
    }
}
