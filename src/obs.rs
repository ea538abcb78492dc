//! Optional observability helpers for the request pipeline.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_courier.request` with the `kind`
//!   (token or resource) and `stage` (call site) fields, plus `info!` events for retries and
//!   DPoP handshake transitions.
//! - Enable `metrics` to increment the `oauth2_courier_request_total` counter for every
//!   attempt/retry/success/failure, labeled by `kind` + `outcome`, and the
//!   `oauth2_courier_dpop_handshake_total` counter labeled by `step`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Request classes observed by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
	/// Token endpoint exchange.
	Token,
	/// Any other API call.
	Resource,
}
impl RequestKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestKind::Token => "token",
			RequestKind::Resource => "resource",
		}
	}
}
impl Display for RequestKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each pipeline call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
	/// A transport attempt is about to be made.
	Attempt,
	/// A failed attempt is being resubmitted.
	Retry,
	/// The call produced a response the caller accepts.
	Success,
	/// The call failed and the error propagates.
	Failure,
}
impl RequestOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestOutcome::Attempt => "attempt",
			RequestOutcome::Retry => "retry",
			RequestOutcome::Success => "success",
			RequestOutcome::Failure => "failure",
		}
	}
}
impl Display for RequestOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
