//! Retry settings, deserializable from application configuration.
//!
//! Durations are expressed in milliseconds on the wire:
//!
//! ```json
//! { "max_retries": 2, "initial_backoff_ms": 500, "max_elapsed_ms": 30000 }
//! ```

// std
use std::{collections::BTreeSet, time::Duration as StdDuration};
// self
use crate::{_prelude::*, http::TransportFailureKind};

/// Which requests may be resubmitted after a transport failure that is not classified as
/// non-retriable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyPolicy {
	/// Safe methods (`GET`, `HEAD`, `OPTIONS`, `TRACE`, `PUT`, `DELETE`) or requests that never
	/// reached the server.
	#[default]
	SafeMethodsOrUnsent,
	/// Every request is treated as idempotent.
	Always,
	/// No request is retried after a transport failure.
	Never,
}

/// Retry budget and eligibility rules.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
	/// Maximum number of resubmissions; zero disables retrying.
	pub max_retries: u32,
	/// Base of the exponential backoff.
	#[serde(rename = "initial_backoff_ms", with = "millis")]
	pub initial_backoff: StdDuration,
	/// Upper bound of the exponential backoff.
	#[serde(rename = "max_backoff_ms", with = "millis")]
	pub max_backoff: StdDuration,
	/// Cap on the total time spent retrying one request.
	#[serde(rename = "max_elapsed_ms", with = "optional_millis")]
	pub max_elapsed: Option<StdDuration>,
	/// HTTP statuses that are retried.
	pub retriable_statuses: BTreeSet<u16>,
	/// Transport failure kinds that are never retried.
	pub non_retriable_kinds: BTreeSet<TransportFailureKind>,
	/// Idempotency rule for other transport failures.
	pub idempotency: IdempotencyPolicy,
	/// Send `x-okta-retry-count` and `x-okta-retry-for` on resubmissions.
	pub retry_headers: bool,
}
impl RetryConfig {
	/// Default number of resubmissions.
	pub const DEFAULT_MAX_RETRIES: u32 = 4;

	/// Configuration that never retries.
	pub fn disabled() -> Self {
		Self { max_retries: 0, ..Self::default() }
	}
}
impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_retries: Self::DEFAULT_MAX_RETRIES,
			initial_backoff: StdDuration::from_millis(300),
			max_backoff: StdDuration::from_millis(20_000),
			max_elapsed: None,
			retriable_statuses: BTreeSet::from([429, 503, 504]),
			non_retriable_kinds: BTreeSet::from([
				TransportFailureKind::NameResolution,
				TransportFailureKind::Connect,
				TransportFailureKind::ConnectionClosed,
				TransportFailureKind::NoRoute,
				TransportFailureKind::Tls,
				TransportFailureKind::Interrupted,
			]),
			idempotency: IdempotencyPolicy::default(),
			retry_headers: true,
		}
	}
}

mod millis {
	// std
	use std::time::Duration;
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(value.as_millis().try_into().unwrap_or(u64::MAX))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}

mod optional_millis {
	// std
	use std::time::Duration;
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(value) => super::millis::serialize(value, serializer),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
	where
		D: Deserializer<'de>,
	{
		<Option<u64>>::deserialize(deserializer).map(|value| value.map(Duration::from_millis))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_match_documented_budget() {
		let config = RetryConfig::default();

		assert_eq!(config.max_retries, 4);
		assert_eq!(config.initial_backoff, StdDuration::from_millis(300));
		assert_eq!(config.max_backoff, StdDuration::from_secs(20));
		assert!(config.retriable_statuses.contains(&429));
		assert!(!config.retriable_statuses.contains(&500));
		assert!(config.non_retriable_kinds.contains(&TransportFailureKind::Tls));
		assert!(!config.non_retriable_kinds.contains(&TransportFailureKind::Timeout));
		assert_eq!(RetryConfig::disabled().max_retries, 0);
	}

	#[test]
	fn partial_json_fills_in_defaults() {
		let config: RetryConfig = serde_json::from_str(
			r#"{"max_retries":2,"initial_backoff_ms":50,"max_elapsed_ms":1000,"idempotency":"always"}"#,
		)
		.expect("Partial retry config should deserialize.");

		assert_eq!(config.max_retries, 2);
		assert_eq!(config.initial_backoff, StdDuration::from_millis(50));
		assert_eq!(config.max_backoff, StdDuration::from_secs(20));
		assert_eq!(config.max_elapsed, Some(StdDuration::from_secs(1)));
		assert_eq!(config.idempotency, IdempotencyPolicy::Always);
		assert!(config.retry_headers);
	}
}
