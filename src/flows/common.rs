//! Token endpoint response mapping shared by acquisition flows.

// crates.io
use oauth2::basic::BasicErrorResponse;
// self
use crate::{_prelude::*, auth::AccessToken, error::TokenError, http::ApiResponse};

#[derive(Debug, Deserialize)]
struct TokenResponseBody {
	token_type: String,
	#[serde(default)]
	expires_in: Option<i64>,
	access_token: String,
	#[serde(default)]
	id_token: Option<String>,
	#[serde(default)]
	scope: Option<String>,
}

/// Maps a final token endpoint response into an [`AccessToken`] or a [`TokenError`].
pub fn map_token_response(
	response: &ApiResponse,
	issued_at: OffsetDateTime,
) -> Result<AccessToken, TokenError> {
	let status = response.status.as_u16();

	if !response.status.is_success() {
		return Err(map_error_body(response));
	}
	if response.body.iter().all(u8::is_ascii_whitespace) {
		return Err(TokenError::EmptyResponse { status });
	}

	let mut de = serde_json::Deserializer::from_slice(&response.body);
	let body: TokenResponseBody = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| TokenError::MalformedResponse { source, status })?;
	let expires_in = body.expires_in.ok_or(TokenError::MissingExpiresIn)?;

	if expires_in <= 0 {
		return Err(TokenError::ExpiresInOutOfRange);
	}

	let lifetime = Duration::seconds(expires_in);

	issued_at.checked_add(lifetime).ok_or(TokenError::ExpiresInOutOfRange)?;

	let mut token = AccessToken::new(body.access_token, body.token_type, issued_at, lifetime);

	if let Some(scope) = body.scope {
		token = token.with_scope(scope);
	}
	if let Some(id_token) = body.id_token {
		token = token.with_id_token(id_token);
	}

	Ok(token)
}

fn map_error_body(response: &ApiResponse) -> TokenError {
	let status = response.status.as_u16();

	match serde_json::from_slice::<BasicErrorResponse>(&response.body) {
		Ok(parsed) => TokenError::Server {
			error: parsed.error().as_ref().to_owned(),
			description: parsed.error_description().cloned(),
			status,
		},
		Err(_) => TokenError::EmptyResponse { status },
	}
}

/// Whether a cached token must be renewed before use.
pub fn needs_renewal(token: &AccessToken, window: Duration, now: OffsetDateTime) -> bool {
	let window = if window.is_negative() { Duration::ZERO } else { window };

	token.is_expired_at(now) || token.expires_within(window, now)
}
