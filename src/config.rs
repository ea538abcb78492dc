//! Validated client configuration.

pub mod builder;
pub mod retry;

pub use builder::*;
pub use retry::*;

// self
use crate::{
	_prelude::*,
	auth::{PrivateKey, ScopeSet},
};

/// Path of the organization token endpoint.
pub const TOKEN_PATH: &str = "/oauth2/v1/token";

/// Immutable configuration shared by every component of an [`ApiClient`](crate::client::ApiClient).
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// Organization base URL.
	pub org_url: Url,
	/// `{org_url}/oauth2/v1/token`.
	pub token_endpoint: Url,
	/// OAuth client identifier; also the assertion `iss` and `sub`.
	pub client_id: String,
	/// Assertion signing key.
	pub private_key: PrivateKey,
	/// Optional `kid` header for the assertion.
	pub kid: Option<String>,
	/// Scopes requested with every token.
	pub scopes: ScopeSet,
	/// Retry behavior for every pipeline call.
	pub retry: RetryConfig,
	/// How long a server-issued DPoP nonce is held before it is discarded.
	pub nonce_validity: Duration,
	/// Cached tokens are renewed once they expire within this window.
	pub token_refresh_window: Duration,
}
impl ClientConfig {
	/// Default DPoP nonce validity.
	pub const DEFAULT_NONCE_VALIDITY: Duration = Duration::hours(22);
	/// Default preemptive token renewal window.
	pub const DEFAULT_TOKEN_REFRESH_WINDOW: Duration = Duration::minutes(5);

	/// Returns a builder with default retry and handshake settings.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::default()
	}

	/// Resolves `path_or_url` against the organization URL; absolute URLs pass through.
	pub fn resolve(&self, path_or_url: &str) -> Result<Url> {
		Ok(self.org_url.join(path_or_url).map_err(crate::error::ConfigError::from)?)
	}
}
