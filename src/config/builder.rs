//! Validating builder for [`ClientConfig`].

// self
use crate::{
	_prelude::*,
	auth::{PrivateKey, ScopeSet},
	config::{ClientConfig, RetryConfig, TOKEN_PATH},
	error::ConfigError,
};

/// Builder for [`ClientConfig`] values.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
	org_url: Option<Url>,
	client_id: Option<String>,
	private_key: Option<PrivateKey>,
	kid: Option<String>,
	scopes: ScopeSet,
	retry: RetryConfig,
	nonce_validity: Option<Duration>,
	token_refresh_window: Option<Duration>,
}
impl ClientConfigBuilder {
	/// Sets the organization base URL.
	pub fn org_url(mut self, url: Url) -> Self {
		self.org_url = Some(url);

		self
	}

	/// Sets the OAuth client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the assertion signing key.
	pub fn private_key(mut self, key: PrivateKey) -> Self {
		self.private_key = Some(key);

		self
	}

	/// Sets the `kid` header of the assertion.
	pub fn kid(mut self, kid: impl Into<String>) -> Self {
		self.kid = Some(kid.into());

		self
	}

	/// Sets the requested scopes.
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Overrides the retry configuration.
	pub fn retry(mut self, retry: RetryConfig) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides how long a DPoP nonce is held.
	pub fn nonce_validity(mut self, validity: Duration) -> Self {
		self.nonce_validity = Some(validity);

		self
	}

	/// Overrides the preemptive token renewal window.
	pub fn token_refresh_window(mut self, window: Duration) -> Self {
		self.token_refresh_window = Some(window);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let org_url = self.org_url.ok_or(ConfigError::MissingOrgUrl)?;

		validate_endpoint(&org_url)?;

		let client_id = self
			.client_id
			.filter(|id| !id.trim().is_empty())
			.ok_or(ConfigError::MissingClientId)?;
		let private_key = self.private_key.ok_or(ConfigError::MissingPrivateKey)?;

		if self.scopes.is_empty() {
			return Err(ConfigError::NoScopes);
		}

		let token_endpoint = org_url.join(TOKEN_PATH)?;

		Ok(ClientConfig {
			org_url,
			token_endpoint,
			client_id,
			private_key,
			kid: self.kid,
			scopes: self.scopes,
			retry: self.retry,
			nonce_validity: self.nonce_validity.unwrap_or(ClientConfig::DEFAULT_NONCE_VALIDITY),
			token_refresh_window: self
				.token_refresh_window
				.unwrap_or(ClientConfig::DEFAULT_TOKEN_REFRESH_WINDOW),
		})
	}
}

fn validate_endpoint(url: &Url) -> Result<(), ConfigError> {
	let loopback = match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	};

	if url.scheme() == "https" || (url.scheme() == "http" && loopback) {
		Ok(())
	} else {
		Err(ConfigError::InsecureEndpoint { url: url.to_string() })
	}
}
