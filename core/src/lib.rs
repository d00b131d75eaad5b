//! BioAuth Core Library
//!
//! This crate provides the platform-independent part of a strong biometric login:
//! capability negotiation with the device, enrollment redirection, a single-outcome
//! challenge orchestrator, and the top-level flow that turns all of it into one
//! user-visible result string.

pub mod auth;
pub mod config;
pub mod flow;
pub mod logging;

// Re-export commonly used types
pub use auth::*;
pub use crate::config::*;
pub use flow::*;
pub use logging::*;

/// Core result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// BioAuth-specific result type for better error handling
pub type BioAuthResult<T> = std::result::Result<T, BioAuthError>;

/// Core error type for the BioAuth system
#[derive(Debug, thiserror::Error)]
pub enum BioAuthError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<::config::ConfigError> for BioAuthError {
    fn from(err: ::config::ConfigError) -> Self {
        BioAuthError::ConfigurationError(err.to_string())
    }
}
