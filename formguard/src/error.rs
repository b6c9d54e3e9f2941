// formguard/src/error.rs
//
// Library error types. The binary wraps these in anyhow.

use thiserror::Error;

/// Failures of a rate-limit state backend. Every variant makes the
/// rate limiter deny the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("state store unavailable: {0}")]
    Unavailable(String),

    #[error("compare-and-swap on key {key} lost {attempts} times in a row")]
    Contention { key: String, attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var}: expected an unsigned integer, got {value:?}")]
    NotANumber { var: &'static str, value: String },

    #[error("{var}: {value} exceeds the maximum of {max}")]
    OutOfRange { var: &'static str, value: u64, max: u64 },

    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },

    #[error("minimum completion time ({min} ms) must be below the maximum ({max} ms)")]
    CompletionBounds { min: u64, max: u64 },
}
