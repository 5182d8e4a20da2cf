//! Error types for the lobby notification service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific notification-service scenarios
#[derive(Debug, thiserror::Error)]
pub enum HeraldError {
    #[error("Feed request failed: {message}")]
    FeedUnavailable { message: String },

    #[error("Feed returned a malformed payload: {message}")]
    FeedMalformed { message: String },

    #[error("No lobby data available from any source")]
    NoLobbyData,

    #[error("Stored lobby {key} does not match its derived identity {derived}")]
    IdentityMismatch { key: i64, derived: i64 },

    #[error("Invalid alert for channel {channel_id}: {reason}")]
    InvalidAlert { channel_id: String, reason: String },

    #[error("Invalid template: {message}")]
    InvalidTemplate { message: String },

    #[error("Store operation failed: {message}")]
    StoreFailed { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
