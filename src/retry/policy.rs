//! Retry decisions over a [`RetryConfig`]: attempt eligibility and the wait before resubmitting.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	config::{IdempotencyPolicy, RetryConfig},
	http::TransportError,
	retry::rate_limit_delay,
};

/// Result of one transport attempt, as seen by the policy.
#[derive(Clone, Copy, Debug)]
pub enum AttemptOutcome<'a> {
	/// The transport failed before a response was received.
	Transport(&'a TransportError),
	/// The server answered.
	Response {
		/// HTTP status code.
		status: StatusCode,
		/// Response headers.
		headers: &'a HeaderMap,
	},
}

/// Everything the policy needs to decide about one attempt.
#[derive(Clone, Copy, Debug)]
pub struct RetryContext<'a> {
	/// 1-based number of the attempt that just finished.
	pub attempt: u32,
	/// What the attempt produced.
	pub outcome: AttemptOutcome<'a>,
	/// Whether the request is idempotent under the configured [`IdempotencyPolicy`].
	pub idempotent: bool,
	/// Whether the caller cancelled the operation.
	pub cancelled: bool,
}

/// Pure retry decision function over a [`RetryConfig`].
#[derive(Clone, Debug, Default)]
pub struct RetryPolicy {
	config: RetryConfig,
}
impl RetryPolicy {
	/// Wraps a retry configuration.
	pub fn new(config: RetryConfig) -> Self {
		Self { config }
	}

	/// Underlying configuration.
	pub fn config(&self) -> &RetryConfig {
		&self.config
	}

	/// Decides whether the attempt described by `ctx` should be resubmitted.
	pub fn should_retry(&self, ctx: &RetryContext<'_>) -> bool {
		if ctx.cancelled || ctx.attempt > self.config.max_retries {
			return false;
		}

		match ctx.outcome {
			AttemptOutcome::Transport(err) =>
				!self.config.non_retriable_kinds.contains(&err.kind) && ctx.idempotent,
			AttemptOutcome::Response { status, .. } =>
				self.config.retriable_statuses.contains(&status.as_u16()),
		}
	}

	/// Wait before resubmitting the attempt described by `ctx`.
	///
	/// A `429` waits for the server's rate-limit reset when the headers allow computing it;
	/// everything else uses exponential backoff.
	pub fn retry_delay(&self, ctx: &RetryContext<'_>) -> StdDuration {
		match ctx.outcome {
			AttemptOutcome::Response { status, headers }
				if status == StatusCode::TOO_MANY_REQUESTS =>
				rate_limit_delay(headers).unwrap_or_else(|| self.backoff_delay(ctx.attempt)),
			_ => self.backoff_delay(ctx.attempt),
		}
	}

	/// `min(initial_backoff * 2^attempt, max_backoff)`.
	pub fn backoff_delay(&self, attempt: u32) -> StdDuration {
		let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);

		self.config.initial_backoff.saturating_mul(factor).min(self.config.max_backoff)
	}

	/// Applies the configured [`IdempotencyPolicy`] to a request.
	pub fn is_idempotent(&self, method: &Method, request_sent: bool) -> bool {
		match self.config.idempotency {
			IdempotencyPolicy::Always => true,
			IdempotencyPolicy::Never => false,
			IdempotencyPolicy::SafeMethodsOrUnsent => !request_sent || method.is_idempotent(),
		}
	}
}
