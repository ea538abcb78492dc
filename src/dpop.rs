//! DPoP (RFC 9449) handshake and proof construction.
//!
//! The authorization server never advertises that it requires DPoP. The client learns it
//! from token-endpoint rejections and walks through the handshake:
//!
//! 1. `invalid_dpop_proof`: create the ES256 proof key; every later request carries a proof.
//! 2. `use_dpop_nonce` + `dpop-nonce` header: hold the nonce and echo it on token requests.
//! 3. Established: token requests carry `nonce`, resource requests carry `ath` and present the
//!    token with the `DPoP` scheme.
//!
//! Seeing either code a second time is a protocol violation reported as [`HandshakeError`].

mod code;
mod proof;
mod state;

pub use code::*;
pub use proof::*;
pub use state::*;

// self
use crate::_prelude::*;

/// Handshake transitions, reported to logs and metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandshakeStep {
	/// First `invalid_dpop_proof`: the proof key now exists.
	KeyEstablished,
	/// First `use_dpop_nonce`: a nonce is held.
	NonceAccepted,
	/// A token request succeeded while holding a nonce.
	Completed,
	/// A stale nonce was discarded before a token request.
	NonceExpired,
}
impl HandshakeStep {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			HandshakeStep::KeyEstablished => "key_established",
			HandshakeStep::NonceAccepted => "nonce_accepted",
			HandshakeStep::Completed => "completed",
			HandshakeStep::NonceExpired => "nonce_expired",
		}
	}
}
impl Display for HandshakeStep {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Named handshake protocol violations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandshakeFailure {
	/// `invalid_dpop_proof` while a proof key already exists.
	RepeatedInvalidProof,
	/// `use_dpop_nonce` while a nonce is already held.
	RepeatedUseNonce,
	/// `use_dpop_nonce` without a `dpop-nonce` header.
	MissingNonceHeader,
	/// Any other error code while the handshake is active.
	UnexpectedError,
}
impl HandshakeFailure {
	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			HandshakeFailure::RepeatedInvalidProof => "repeated_invalid_dpop_proof",
			HandshakeFailure::RepeatedUseNonce => "repeated_use_dpop_nonce",
			HandshakeFailure::MissingNonceHeader => "missing_dpop_nonce_header",
			HandshakeFailure::UnexpectedError => "unexpected_error",
		}
	}
}
impl Display for HandshakeFailure {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Fatal handshake failure carrying the raw server error body.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("DPoP handshake failed ({failure}): {body}.")]
pub struct HandshakeError {
	/// Which violation occurred.
	pub failure: HandshakeFailure,
	/// Raw error body returned by the server.
	pub body: String,
}
impl HandshakeError {
	/// Creates an error from a failure and the raw response body.
	pub fn new(failure: HandshakeFailure, body: &[u8]) -> Self {
		Self { failure, body: String::from_utf8_lossy(body).into_owned() }
	}
}
