//! Error types for plateshot.
//!
//! Every fallible operation in the crate returns [`Error`]. The variants group
//! into capture failures, recognition API failures, and the local plumbing
//! (storage, configuration, I/O) underneath them.
//!
//! A plate that the API could not read is *not* an error; see
//! [`crate::api::Recognition::NotRecognized`].

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for plateshot operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Capture Errors ===
    /// The frame source could not produce an image.
    #[error("capture unavailable from {source_name}: {message}")]
    CaptureUnavailable {
        /// Name of the frame source.
        source_name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// The frame source did not produce an image in time.
    #[error("capture from {source_name} timed out after {timeout_ms} ms")]
    CaptureTimeout {
        /// Name of the frame source.
        source_name: &'static str,
        /// The acquisition timeout that elapsed.
        timeout_ms: u64,
    },

    /// Image decoding or encoding failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    // === Recognition API Errors ===
    /// The request never got a response (connection, DNS, TLS, timeout).
    #[error("recognition request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error: {status} {reason}")]
    ApiStatus {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase, if any.
        reason: String,
    },

    /// The API answered 2xx with a body we could not interpret.
    #[error("invalid API response: {message}")]
    ApiResponse {
        /// Description of what was wrong with the body.
        message: String,
    },

    /// A recognition request is already outstanding.
    #[error("a recognition request is already in flight")]
    RequestInFlight,

    // === Settings Errors ===
    /// The endpoint entered in settings is not a usable URL.
    #[error("invalid endpoint URL '{input}': {reason}")]
    InvalidEndpoint {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No endpoint has been configured.
    #[error("API endpoint not configured; run `plateshot settings set-endpoint <URL>`")]
    EndpointNotConfigured,

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for plateshot operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a capture-unavailable error.
    #[must_use]
    pub fn capture_unavailable(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::CaptureUnavailable {
            source_name,
            message: message.into(),
        }
    }

    /// Create an invalid-response error.
    #[must_use]
    pub fn api_response(message: impl Into<String>) -> Self {
        Self::ApiResponse {
            message: message.into(),
        }
    }

    /// Create an invalid-endpoint error.
    #[must_use]
    pub fn invalid_endpoint(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error came from acquiring or decoding a frame.
    #[must_use]
    pub fn is_capture_error(&self) -> bool {
        matches!(
            self,
            Self::CaptureUnavailable { .. } | Self::CaptureTimeout { .. } | Self::Image(_)
        )
    }

    /// Check if this error came from talking to the recognition API.
    #[must_use]
    pub fn is_api_error(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::ApiStatus { .. } | Self::ApiResponse { .. }
        )
    }
}
