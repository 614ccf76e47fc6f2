//! Error types for the Athena engine
//!
//! Provides a unified error type and domain-specific error variants.
//! Every variant is recoverable: the caller decides whether to abort a larger
//! transaction. Arithmetic overflow is not represented here, it panics.

use thiserror::Error;

use crate::types::ids::{CoverId, PoolId, PositionId};

/// Result type alias using AthenaError
pub type Result<T> = std::result::Result<T, AthenaError>;

/// Unified error type for Athena operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AthenaError {
    // Math errors
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    // Capacity errors
    #[error("Insufficient capacity in pool {pool}: requested {requested}, available {available}")]
    InsufficientCapacity {
        pool: PoolId,
        requested: u128,
        available: u128,
    },

    #[error("Zero values are forbidden for this operation")]
    ForbiddenZeroValue,

    // Cover errors
    #[error("Premium does not pay for a single tick of cover")]
    DurationBelowOneTick,

    #[error("Cover {0} is expired")]
    CoverIsExpired(CoverId),

    #[error("Cover {0} is closed")]
    CoverIsClosed(CoverId),

    #[error("Cover not found: {0}")]
    CoverNotFound(CoverId),

    #[error("Insufficient premium: requested {requested}, remaining {remaining}")]
    InsufficientPremium { requested: u128, remaining: u128 },

    // Clock errors
    #[error("Time travel not allowed: last update {last_update}, target {target}")]
    TimeTravelNotAllowed { last_update: u64, target: u64 },

    // Pool and position errors
    #[error("Pool does not exist: {0}")]
    PoolDoesNotExist(PoolId),

    #[error("Position not found: {0}")]
    PositionNotFound(PositionId),

    #[error("Insufficient liquidity in position {position}: requested {requested}, available {available}")]
    InsufficientLiquidity {
        position: PositionId,
        requested: u128,
        available: u128,
    },

    #[error("Pools {pool} and {other} are incompatible")]
    IncompatiblePools { pool: PoolId, other: PoolId },

    #[error("Too many pools for one position: {count} (max {max})")]
    TooManyPools { count: usize, max: usize },

    // Configuration errors
    #[error("Invalid premium curve: {0}")]
    InvalidCurve(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Fixed-point math errors
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Negative decimal cannot be converted to ray")]
    NegativeDecimal,

    #[error("Decimal out of ray range")]
    DecimalOutOfRange,
}

impl From<serde_json::Error> for AthenaError {
    fn from(err: serde_json::Error) -> Self {
        AthenaError::Config(err.to_string())
    }
}
