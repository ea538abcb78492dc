//! Access tokens issued by the token endpoint.

// self
use crate::{_prelude::*, error::ConfigError};

/// Redacted secret wrapper keeping token material out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the raw value. Callers must avoid logging it.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenSecret(<redacted>)")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Immutable access token value; every acquisition replaces it wholesale.
#[derive(Clone, Debug)]
pub struct AccessToken {
	/// Token secret sent in the `Authorization` header.
	pub secret: TokenSecret,
	/// Token type reported by the server (`Bearer` or `DPoP`).
	pub token_type: String,
	/// Instant the token response was received.
	pub issued_at: OffsetDateTime,
	/// `issued_at + expires_in`.
	pub expires_at: OffsetDateTime,
	/// Granted scope string, when the server echoed it.
	pub scope: Option<String>,
	/// OpenID Connect ID token, when issued.
	pub id_token: Option<TokenSecret>,
}
impl AccessToken {
	/// Creates a token that expires `expires_in` after `issued_at`.
	pub fn new(
		secret: impl Into<String>,
		token_type: impl Into<String>,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Self {
		Self {
			secret: TokenSecret::new(secret),
			token_type: token_type.into(),
			issued_at,
			expires_at: issued_at + expires_in,
			scope: None,
			id_token: None,
		}
	}

	/// Attaches the granted scope string.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Attaches an ID token.
	pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
		self.id_token = Some(TokenSecret::new(id_token));

		self
	}

	/// Returns true when the token is expired at `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Returns true when the token expires within `window` of `instant`.
	pub fn expires_within(&self, window: Duration, instant: OffsetDateTime) -> bool {
		instant + window >= self.expires_at
	}

	/// Returns true when the server bound the token to a DPoP key.
	pub fn is_dpop_bound(&self) -> bool {
		self.token_type.eq_ignore_ascii_case("dpop")
	}

	/// `Authorization` header value. DPoP decoration rewrites the scheme when active.
	pub fn authorization_value(&self) -> Result<HeaderValue> {
		let mut value = HeaderValue::try_from(format!("Bearer {}", self.secret.expose()))
			.map_err(ConfigError::from)?;

		value.set_sensitive(true);

		Ok(value)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn secrets_redact_in_formatters() {
		let secret = TokenSecret::new("eyJ.super.secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(<redacted>)");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn expiry_is_issued_at_plus_expires_in() {
		let issued = datetime!(2025-01-01 00:00 UTC);
		let token = AccessToken::new("abc", "DPoP", issued, Duration::seconds(3600));

		assert_eq!(token.expires_at, datetime!(2025-01-01 01:00 UTC));
		assert!(!token.is_expired_at(datetime!(2025-01-01 00:59:59 UTC)));
		assert!(token.is_expired_at(datetime!(2025-01-01 01:00 UTC)));
		assert!(token.expires_within(Duration::minutes(5), datetime!(2025-01-01 00:56 UTC)));
		assert!(!token.expires_within(Duration::minutes(5), datetime!(2025-01-01 00:50 UTC)));
		assert!(token.is_dpop_bound());
	}

	#[test]
	fn authorization_value_uses_bearer_scheme() {
		let token = AccessToken::new(
			"abc",
			"Bearer",
			OffsetDateTime::now_utc(),
			Duration::seconds(60),
		);
		let value = token.authorization_value().expect("Token should form a header value.");

		assert_eq!(value.to_str().expect("Header should be text."), "Bearer abc");
		assert!(value.is_sensitive());
		assert!(!token.is_dpop_bound());
	}
}
