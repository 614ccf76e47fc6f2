//! # Athena Engine
//!
//! Premium accrual, cover expiry and capital accounting for Athena pools.
//!
//! ## Pricing
//!
//! ```text
//! utilization = insured / available
//! rate        = curve(utilization)            annual %, ray
//! tick        = 86_400 * r0 / rate seconds
//! per_tick    = capital * rate * tick / (100 * 365 * 86_400)
//! ```
//!
//! Pools advance lazily: nothing happens between calls, and every mutating call
//! first brings the pools it touches forward to its timestamp, expiring covers
//! and growing the liquidity index on the way.
//!
//! ## Modules
//!
//! - [`curve`]: utilization to premium rate
//! - [`pool`]: pool state, expiry queue, actualizer
//! - [`cover`]: cover pricing and lifecycle
//! - [`liquidity`]: LP positions and claim logs
//! - [`intersection`]: capital shared between pools
//! - [`registry`]: owner of everything above
//! - [`shared`]: lock wrapper over the registry

pub mod config;
pub mod cover;
pub mod curve;
pub mod intersection;
pub mod liquidity;
pub mod pool;
pub mod registry;
pub mod shared;

pub use config::{CurveSettings, EngineConfig};
pub use cover::{
    Cover, CoverClosure, CoverLedger, CoverQuote, CoverReceipt, CoverUpdate, CoverUpdateOutcome,
    CoverView,
};
pub use curve::PremiumCurve;
pub use intersection::{ClaimImpact, IntersectionTracker};
pub use liquidity::{ClaimLogEntry, LpPosition, PoolSnapshot, RewardSettlement};
pub use pool::{Actualization, Pool, PoolState};
pub use registry::{ClaimReceipt, Registry, Withdrawal};
pub use shared::SharedRegistry;

/// Default cap on the pools one deposit may back
pub const DEFAULT_MAX_POOLS_PER_POSITION: usize = 10;
