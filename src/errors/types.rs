//! Error type definitions for the EPG loader

use thiserror::Error;

/// Errors raised while loading a source into the guide store
#[derive(Error, Debug)]
pub enum IngestError {
    /// The feed could not be read or is not well-formed XML
    #[error("Feed unreadable for source '{source_name}': {message}")]
    FeedUnreadable {
        source_name: String,
        message: String,
    },

    /// A start/stop attribute is not a valid compact feed timestamp
    #[error("Malformed timestamp '{value}': {message}")]
    MalformedTimestamp { value: String, message: String },

    /// The source declares a feed format the loader does not implement
    #[error("Unsupported parse mode '{mode}' for source '{source_name}'")]
    UnsupportedParseMode { source_name: String, mode: String },

    /// A delete, insert or stream update statement failed
    #[error("Store write failed: {operation} - {message}")]
    StoreWriteFailure { operation: String, message: String },

    /// Read-side store failures
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid configuration values
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl IngestError {
    /// Create a feed unreadable error for a named source
    pub fn feed_unreadable<S: Into<String>, M: Into<String>>(source_name: S, message: M) -> Self {
        Self::FeedUnreadable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a malformed timestamp error
    pub fn malformed_timestamp<V: Into<String>, M: Into<String>>(value: V, message: M) -> Self {
        Self::MalformedTimestamp {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported parse mode error
    pub fn unsupported_parse_mode<S: Into<String>, M: Into<String>>(
        source_name: S,
        mode: M,
    ) -> Self {
        Self::UnsupportedParseMode {
            source_name: source_name.into(),
            mode: mode.into(),
        }
    }

    /// Create a store write failure for the named operation
    pub fn store_write<O: Into<String>, M: Into<String>>(operation: O, message: M) -> Self {
        Self::StoreWriteFailure {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
