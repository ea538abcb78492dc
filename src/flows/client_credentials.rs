//! Client Credentials grant with a private-key JWT assertion, caching, and singleflight guards.
//!
//! [`TokenClient::access_token`] reuses the cached token until it enters the configured
//! preemptive window. Concurrent callers piggy-back on one in-flight acquisition instead of
//! stampeding the token endpoint. Each acquisition drives the DPoP handshake: a demanded
//! handshake step reissues the request with a fresh assertion, outside the retry budget.

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, CLIENT_ASSERTION_TYPE, sign_client_assertion},
	config::ClientConfig,
	error::TokenError,
	flows::common,
	http::{ApiRequest, HttpTransport},
	obs::{RequestKind, RequestSpan},
	pipeline::{Pipeline, TokenExchange},
};

/// `grant_type` sent to the token endpoint.
pub const CLIENT_CREDENTIALS: &str = "client_credentials";

/// Acquires and caches access tokens for one client identity.
pub struct TokenClient<T>
where
	T: ?Sized + HttpTransport,
{
	config: Arc<ClientConfig>,
	pipeline: Arc<Pipeline<T>>,
	cached: Mutex<Option<AccessToken>>,
	singleflight: AsyncMutex<()>,
}
impl<T> TokenClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Handshake rounds tolerated per acquisition (`invalid_dpop_proof`, then `use_dpop_nonce`).
	pub const MAX_HANDSHAKE_ROUNDS: u32 = 2;

	/// Creates a client that sends token requests through `pipeline`.
	pub fn new(config: Arc<ClientConfig>, pipeline: Arc<Pipeline<T>>) -> Self {
		Self { config, pipeline, cached: Mutex::new(None), singleflight: AsyncMutex::new(()) }
	}

	/// Returns a usable token, acquiring a new one when the cache is empty or about to expire.
	pub async fn access_token(&self, cancel: &CancellationToken) -> Result<AccessToken> {
		if let Some(token) = self.fresh(OffsetDateTime::now_utc()) {
			return Ok(token);
		}

		let _singleflight = self.singleflight.lock().await;

		// Another caller may have finished while this one waited.
		if let Some(token) = self.fresh(OffsetDateTime::now_utc()) {
			return Ok(token);
		}

		let token = self.fetch_token(cancel).await?;

		*self.cached.lock() = Some(token.clone());

		Ok(token)
	}

	/// Drops the cached token so the next call acquires a new one.
	pub fn invalidate(&self) {
		self.cached.lock().take();
	}

	/// Currently cached token, regardless of freshness.
	pub fn cached(&self) -> Option<AccessToken> {
		self.cached.lock().clone()
	}

	/// Performs the grant without consulting the cache.
	pub async fn fetch_token(&self, cancel: &CancellationToken) -> Result<AccessToken> {
		let span = RequestSpan::new(RequestKind::Token, "client_credentials");

		span.instrument(async move {
			let mut rounds = 0;

			loop {
				let request = self.token_request(OffsetDateTime::now_utc())?;

				match self.pipeline.execute_token(request, cancel).await? {
					TokenExchange::Completed(response) =>
						return Ok(common::map_token_response(
							&response,
							OffsetDateTime::now_utc(),
						)?),
					TokenExchange::HandshakeAdvanced(_) => {
						rounds += 1;

						if rounds > Self::MAX_HANDSHAKE_ROUNDS {
							return Err(TokenError::HandshakeUnsettled { rounds }.into());
						}
					},
				}
			}
		})
		.await
	}

	fn fresh(&self, now: OffsetDateTime) -> Option<AccessToken> {
		self.cached
			.lock()
			.as_ref()
			.filter(|token| !common::needs_renewal(token, self.config.token_refresh_window, now))
			.cloned()
	}

	fn token_request(&self, now: OffsetDateTime) -> Result<ApiRequest> {
		let config = &self.config;
		let assertion = sign_client_assertion(
			&config.client_id,
			&config.token_endpoint,
			&config.private_key,
			config.kid.as_deref(),
			now,
		)?;
		let scope = config.scopes.normalized();

		Ok(ApiRequest::post(config.token_endpoint.clone())
			.with_header(oauth2::http::header::ACCEPT, HeaderValue::from_static("application/json"))
			.with_form([
				("grant_type", CLIENT_CREDENTIALS),
				("scope", scope.as_str()),
				("client_assertion_type", CLIENT_ASSERTION_TYPE),
				("client_assertion", assertion.as_str()),
			]))
	}
}
impl<T> Debug for TokenClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenClient")
			.field("client_id", &self.config.client_id)
			.field("cached", &self.cached.lock().is_some())
			.finish_non_exhaustive()
	}
}
