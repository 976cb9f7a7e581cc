//! Abuse protection in front of the tables.
//!
//! Every action a player submits passes through a per-user
//! [`ActionRateLimiter`] before it is queued to a table actor.

pub mod rate_limiter;

pub use rate_limiter::{ActionRateLimiter, RateLimitConfig};
