// SPDX-License-Identifier: Apache-2.0

//! Concurrency and rate limiting primitives governing network egress.

mod concurrency;
mod rate;

pub use concurrency::{ConcurrencyLimiter, ConcurrencyLimiterConfig};
pub use rate::RateLimiter;
