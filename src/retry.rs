//! Retry eligibility and delay computation.
//!
//! Decisions are pure: [`RetryPolicy`] inspects a [`RetryContext`] and never performs I/O.
//! The [`Pipeline`](crate::pipeline::Pipeline) owns the waiting and resubmission.

pub mod policy;
pub mod rate_limit;

pub use policy::*;
pub use rate_limit::*;
