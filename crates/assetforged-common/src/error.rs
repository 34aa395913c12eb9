//! Common error types used throughout assetforged.
//!
//! The taxonomy mirrors how a failure is reported to a client: configuration
//! and generation problems are server faults, a missing attachment is a 404,
//! and unreadable blobs surface as I/O failures. None of them are retried.

/// Common error type for assetforged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A profile is undefined or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested attachment or variant was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The transform backend failed or produced no output.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// A blob or filesystem operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A registry operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a new Configuration error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Generation error.
    pub fn generation<S: Into<String>>(msg: S) -> Self {
        Self::Generation(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Io error from a message.
    pub fn io<S: Into<String>>(msg: S) -> Self {
        Self::Io(std::io::Error::other(msg.into()))
    }

    /// HTTP status class this error maps to when answering a request.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidInput(_) => 400,
            Self::Configuration(_) | Self::Generation(_) | Self::Io(_) | Self::Database(_) => 500,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
