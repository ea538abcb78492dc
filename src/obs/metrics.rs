// self
use crate::{
	dpop::HandshakeStep,
	obs::{RequestKind, RequestOutcome},
};

/// Records a request outcome via the global metrics recorder (when enabled).
pub fn record_request_outcome(kind: RequestKind, outcome: RequestOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_courier_request_total",
			"kind" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a DPoP handshake transition via the global metrics recorder (when enabled).
pub fn record_handshake_step(step: HandshakeStep) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("oauth2_courier_dpop_handshake_total", "step" => step.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = step;
	}
}
