//! Private-key JWT client assertions (RFC 7523) for the client-credentials grant.

// crates.io
use jsonwebtoken::Header;
use uuid::Uuid;
// self
use crate::{_prelude::*, auth::PrivateKey, error::ConfigError};

/// `client_assertion_type` value for JWT bearer assertions.
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
/// Lifetime stamped into each assertion's `exp` claim.
pub const ASSERTION_LIFETIME: Duration = Duration::minutes(50);

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
	aud: String,
	iss: String,
	sub: String,
	iat: i64,
	exp: i64,
	jti: String,
}

/// Signs a fresh assertion for `client_id` addressed to `token_endpoint`.
///
/// Every call produces a new `jti`, so assertions are never replayed across handshake rounds.
pub fn sign_client_assertion(
	client_id: &str,
	token_endpoint: &Url,
	key: &PrivateKey,
	kid: Option<&str>,
	now: OffsetDateTime,
) -> Result<String, ConfigError> {
	let mut header = Header::new(key.algorithm().jwt_algorithm());

	header.kid = kid.map(ToOwned::to_owned);

	let claims = AssertionClaims {
		aud: token_endpoint.as_str().to_owned(),
		iss: client_id.to_owned(),
		sub: client_id.to_owned(),
		iat: now.unix_timestamp(),
		exp: (now + ASSERTION_LIFETIME).unix_timestamp(),
		jti: Uuid::new_v4().to_string(),
	};

	Ok(jsonwebtoken::encode(&header, &claims, key.encoding_key())?)
}
