//! Server-clock driven delays for `429 Too Many Requests` responses.

// std
use std::time::Duration as StdDuration;
// crates.io
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

/// Header carrying the epoch second at which the rate-limit window resets.
pub const RATE_LIMIT_RESET: &str = "x-rate-limit-reset";

/// Reset instant and server "now" read from a rate-limited response.
///
/// Both instants come from the server so local clock skew never shortens or lengthens the
/// wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitClock {
	/// Instant the server's rate-limit window resets.
	pub reset_at: OffsetDateTime,
	/// Server time from the `Date` header.
	pub server_now: OffsetDateTime,
}
impl RateLimitClock {
	/// Minimum wait and slack added after the reset instant.
	pub const MIN_DELAY: StdDuration = StdDuration::from_secs(1);

	/// Reads the clock from response headers; `None` when either header is missing or
	/// unparseable.
	pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
		let reset = rate_limit_reset(headers)?;
		let server_now = server_date(headers)?;
		let reset_at = OffsetDateTime::from_unix_timestamp(reset).ok()?;

		Some(Self { reset_at, server_now })
	}

	/// `max(reset_ms - server_now_ms + 1000, 1000)` milliseconds.
	pub fn delay(&self) -> StdDuration {
		let reset_ms = self.reset_at.unix_timestamp() * 1_000;
		let now_ms = (self.server_now.unix_timestamp_nanos() / 1_000_000) as i64;
		let min_ms = Self::MIN_DELAY.as_millis() as i64;
		let delay_ms = (reset_ms - now_ms + min_ms).max(min_ms);

		StdDuration::from_millis(delay_ms as u64)
	}
}

/// Delay mandated by a rate-limited response, or `None` when it cannot be determined.
pub fn rate_limit_delay(headers: &HeaderMap) -> Option<StdDuration> {
	RateLimitClock::from_headers(headers).map(|clock| clock.delay())
}

/// Smallest positive, all-digit `x-rate-limit-reset` value.
pub fn rate_limit_reset(headers: &HeaderMap) -> Option<i64> {
	headers
		.get_all(RATE_LIMIT_RESET)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split(','))
		.map(str::trim)
		.filter(|value| !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()))
		.filter_map(|value| value.parse::<i64>().ok())
		.filter(|value| *value > 0)
		.min()
}

/// Parses the HTTP `Date` header.
pub fn server_date(headers: &HeaderMap) -> Option<OffsetDateTime> {
	let raw = headers.get(DATE)?.to_str().ok()?.trim();

	OffsetDateTime::parse(raw, &Rfc2822).ok()
}
