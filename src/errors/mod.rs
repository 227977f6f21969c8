//! Error handling for the EPG loader
//!
//! # Error Categories
//!
//! - **Feed Errors**: unreadable or malformed source feeds
//! - **Timestamp Errors**: feed times outside the compact XMLTV form
//! - **Store Errors**: failed deletes, inserts and stream updates
//! - **Configuration Errors**: invalid timezone or limits
//!
//! Unmapped channels are not errors; those events are dropped and counted.

pub mod types;

pub use types::*;

/// Convenience type alias for Results using IngestError
pub type IngestResult<T> = Result<T, IngestError>;
