//! Error types for Shardstorm.
//!
//! The simulation itself never fails at runtime; these types cover
//! construction-time validation and configuration loading.

use thiserror::Error;

/// Top-level error type for Shardstorm operations.
#[derive(Debug, Error)]
pub enum ShardError {
    /// A constructor or setter received a value outside its valid range
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShardError {
    /// Shorthand for [`ShardError::InvalidParameter`].
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be parsed
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// Config could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(String),
}

/// Result type alias for Shardstorm operations.
pub type ShardResult<T> = Result<T, ShardError>;
