// self
use crate::_prelude::*;

/// OAuth `error` codes the handshake reacts to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DpopErrorCode {
	/// `invalid_dpop_proof`.
	InvalidDpopProof,
	/// `use_dpop_nonce`.
	UseDpopNonce,
	/// Any other code.
	Unrecognized(String),
}
impl DpopErrorCode {
	/// Reads the `error` field from a JSON error body; `None` when absent or not a string.
	pub fn from_body(body: &[u8]) -> Option<Self> {
		let value = serde_json::from_slice::<serde_json::Value>(body).ok()?;

		value.get("error")?.as_str().map(Self::from)
	}
}
impl From<&str> for DpopErrorCode {
	fn from(code: &str) -> Self {
		match code {
			"invalid_dpop_proof" => Self::InvalidDpopProof,
			"use_dpop_nonce" => Self::UseDpopNonce,
			other => Self::Unrecognized(other.to_owned()),
		}
	}
}
impl Display for DpopErrorCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::InvalidDpopProof => f.write_str("invalid_dpop_proof"),
			Self::UseDpopNonce => f.write_str("use_dpop_nonce"),
			Self::Unrecognized(code) => f.write_str(code),
		}
	}
}
