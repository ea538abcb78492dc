// self
use crate::{dpop::HandshakeStep, obs::RequestKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRequest<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRequest<F> = F;

/// A span builder used around pipeline calls.
#[derive(Clone, Debug)]
pub struct RequestSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RequestSpan {
	/// Creates a new span tagged with the provided request kind + stage.
	pub fn new(kind: RequestKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("oauth2_courier.request", kind = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRequest<Fut>
	where
		Fut: std::future::Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a scheduled retry.
pub fn log_retry(attempt: u32, delay: std::time::Duration) {
	#[cfg(feature = "tracing")]
	{
		let delay_ms = delay.as_millis() as u64;

		tracing::info!(attempt, delay_ms, "Retry # {attempt} after {delay_ms} ms delay");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (attempt, delay);
	}
}

/// Logs the delay chosen before the next attempt.
pub fn log_backoff(attempt: u32, delay: std::time::Duration, rate_limited: bool) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			attempt,
			delay_ms = delay.as_millis() as u64,
			rate_limited,
			"Computed retry delay."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (attempt, delay, rate_limited);
	}
}

/// Logs a DPoP handshake transition.
pub fn log_handshake_step(step: HandshakeStep) {
	#[cfg(feature = "tracing")]
	{
		match step {
			HandshakeStep::Completed => tracing::info!("DPoP handshake successful."),
			_ => tracing::info!(step = step.as_str(), "DPoP handshake advanced."),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = step;
	}
}
