// self
use crate::{
	_prelude::*,
	dpop::{
		DpopErrorCode, HandshakeError, HandshakeFailure, HandshakeStep, ProofClaims, ProofKey,
		access_token_hash,
	},
	error::ConfigError,
	http::{ApiRequest, ApiResponse},
	obs,
};

/// Response header carrying a server-issued nonce.
pub const DPOP_NONCE: &str = "dpop-nonce";
/// Request header carrying the proof.
pub const DPOP: &str = "dpop";

/// Which kind of endpoint a request targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestTarget {
	/// The token endpoint; proofs carry the held nonce.
	Token,
	/// Any other endpoint; proofs carry `ath` when a token is presented.
	Resource,
}

/// Server nonce together with the instant it stops being used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeldNonce {
	/// Opaque nonce value, echoed verbatim.
	pub value: String,
	/// Instant after which the nonce is discarded before the next token request.
	pub expires_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct HandshakeState {
	proof_key: Option<Arc<ProofKey>>,
	nonce: Option<HeldNonce>,
}

/// Per-client DPoP handshake state.
///
/// One mutex guards key creation, nonce replacement, and nonce expiry. Every read takes the
/// key and nonce together in a single acquisition, and the lock is never held across an
/// `.await`.
#[derive(Debug)]
pub struct DpopHandshake {
	state: Mutex<HandshakeState>,
	nonce_validity: Duration,
}
impl DpopHandshake {
	/// Creates an inactive handshake that holds nonces for `nonce_validity`.
	pub fn new(nonce_validity: Duration) -> Self {
		Self { state: Mutex::new(HandshakeState::default()), nonce_validity }
	}

	/// Whether a proof key exists and requests are decorated.
	pub fn is_active(&self) -> bool {
		self.state.lock().proof_key.is_some()
	}

	/// Currently held nonce, if any.
	pub fn nonce(&self) -> Option<HeldNonce> {
		self.state.lock().nonce.clone()
	}

	/// Returns the proof key, creating it on first use.
	pub fn get_or_create_key(&self) -> Result<Arc<ProofKey>, ConfigError> {
		let mut state = self.state.lock();

		if let Some(key) = &state.proof_key {
			return Ok(key.clone());
		}

		let key = Arc::new(ProofKey::generate()?);

		state.proof_key = Some(key.clone());

		Ok(key)
	}

	/// Key and usable nonce in one acquisition; token requests discard an expired nonce first.
	fn snapshot(
		&self,
		target: RequestTarget,
		now: OffsetDateTime,
	) -> (Option<Arc<ProofKey>>, Option<String>) {
		let mut state = self.state.lock();
		let expired = target == RequestTarget::Token
			&& state.nonce.as_ref().is_some_and(|nonce| nonce.expires_at <= now);

		if expired {
			state.nonce = None;
		}

		let snapshot =
			(state.proof_key.clone(), state.nonce.as_ref().map(|nonce| nonce.value.clone()));

		drop(state);

		if expired {
			record(HandshakeStep::NonceExpired);
		}

		snapshot
	}

	/// Decorates `request` with a proof when the handshake is active.
	pub fn prepare(&self, request: &mut ApiRequest, target: RequestTarget) -> Result<()> {
		self.prepare_at(request, target, OffsetDateTime::now_utc())
	}

	/// [`prepare`](Self::prepare) with an explicit clock.
	pub fn prepare_at(
		&self,
		request: &mut ApiRequest,
		target: RequestTarget,
		now: OffsetDateTime,
	) -> Result<()> {
		let (key, nonce) = self.snapshot(target, now);
		let Some(key) = key else {
			return Ok(());
		};
		let mut claims = ProofClaims::new(&request.method, &request.url, now);
		// The scheme may already be `DPoP` when a decorated request is resubmitted.
		let presented =
			request.headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()).map(|value| {
				value.split_once(' ').map(|(_, token)| token.to_owned()).unwrap_or_default()
			});

		if let Some(token) = presented {
			let mut value =
				HeaderValue::try_from(format!("DPoP {token}")).map_err(ConfigError::from)?;

			value.set_sensitive(true);
			request.headers.insert(AUTHORIZATION, value);
			claims.ath = Some(access_token_hash(&token));
		} else if target == RequestTarget::Token {
			claims.nonce = nonce;
		}

		let proof = HeaderValue::try_from(key.sign(&claims)?).map_err(ConfigError::from)?;

		request.headers.insert(HeaderName::from_static(DPOP), proof);

		Ok(())
	}

	/// Reacts to a token endpoint response.
	///
	/// Returns the step when the handshake advanced and the request must be reissued,
	/// `Ok(None)` when the response should be handled normally, or a [`HandshakeError`] on a
	/// protocol violation.
	pub fn observe_token_response(
		&self,
		response: &ApiResponse,
	) -> Result<Option<HandshakeStep>> {
		self.observe_token_response_at(response, OffsetDateTime::now_utc())
	}

	/// [`observe_token_response`](Self::observe_token_response) with an explicit clock.
	pub fn observe_token_response_at(
		&self,
		response: &ApiResponse,
		now: OffsetDateTime,
	) -> Result<Option<HandshakeStep>> {
		if response.status.is_success() {
			if self.state.lock().nonce.is_some() {
				record(HandshakeStep::Completed);
			}

			return Ok(None);
		}
		if response.status != StatusCode::BAD_REQUEST {
			return Ok(None);
		}

		let violation = |failure| Error::from(HandshakeError::new(failure, &response.body));

		match DpopErrorCode::from_body(&response.body) {
			Some(DpopErrorCode::InvalidDpopProof) => {
				let mut state = self.state.lock();

				if state.proof_key.is_some() {
					return Err(violation(HandshakeFailure::RepeatedInvalidProof));
				}

				state.proof_key = Some(Arc::new(ProofKey::generate()?));
				drop(state);
				record(HandshakeStep::KeyEstablished);

				Ok(Some(HandshakeStep::KeyEstablished))
			},
			Some(DpopErrorCode::UseDpopNonce) => {
				let mut state = self.state.lock();

				if state.nonce.is_some() {
					return Err(violation(HandshakeFailure::RepeatedUseNonce));
				}

				let Some(value) = response.header_str(DPOP_NONCE).filter(|v| !v.is_empty()) else {
					return Err(violation(HandshakeFailure::MissingNonceHeader));
				};

				if state.proof_key.is_none() {
					state.proof_key = Some(Arc::new(ProofKey::generate()?));
				}

				state.nonce =
					Some(HeldNonce { value: value.to_owned(), expires_at: now + self.nonce_validity });
				drop(state);
				record(HandshakeStep::NonceAccepted);

				Ok(Some(HandshakeStep::NonceAccepted))
			},
			Some(DpopErrorCode::Unrecognized(_)) | None if self.is_active() =>
				Err(violation(HandshakeFailure::UnexpectedError)),
			Some(DpopErrorCode::Unrecognized(_)) | None => Ok(None),
		}
	}
}
impl Default for DpopHandshake {
	fn default() -> Self {
		Self::new(crate::config::ClientConfig::DEFAULT_NONCE_VALIDITY)
	}
}

fn record(step: HandshakeStep) {
	obs::log_handshake_step(step);
	obs::record_handshake_step(step);
}
