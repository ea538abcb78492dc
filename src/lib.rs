//! Resilient request execution for OAuth 2.0 protected APIs: server-clock driven retries,
//! transparent DPoP handshakes, and lazy cursor pagination behind one pipeline.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod dpop;
pub mod error;
pub mod flows;
pub mod http;
pub mod obs;
pub mod pagination;
pub mod pipeline;
pub mod retry;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for unit and integration tests; enabled via
	//! `cfg(test)` or the `test` crate feature.

	pub use crate::_prelude::*;

	// crates.io
	use ring::{
		rand::SystemRandom,
		signature::{ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair},
	};
	// self
	#[cfg(feature = "reqwest")]
	use crate::{client::ApiClient, http::ReqwestTransport};
	use crate::{
		auth::{PrivateKey, ScopeSet, SigningAlgorithm},
		config::{ClientConfig, RetryConfig},
	};

	/// Client type alias used by reqwest-backed integration tests.
	#[cfg(feature = "reqwest")]
	pub type ReqwestTestClient = ApiClient<ReqwestTransport>;

	/// Generates a throwaway PKCS#8 (DER) P-256 key for signing client assertions.
	pub fn test_assertion_key() -> PrivateKey {
		let rng = SystemRandom::new();
		let document = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
			.expect("Failed to generate a test signing key.");

		PrivateKey::der(document.as_ref().to_vec(), SigningAlgorithm::Es256)
	}

	/// Retry settings that keep test backoff in the millisecond range.
	pub fn fast_retry_config() -> RetryConfig {
		RetryConfig {
			initial_backoff: std::time::Duration::from_millis(5),
			max_backoff: std::time::Duration::from_millis(40),
			..RetryConfig::default()
		}
	}

	/// Builds a client configuration pointing at a mock server base URL.
	pub fn test_client_config(base_url: &str, retry: RetryConfig) -> ClientConfig {
		ClientConfig::builder()
			.org_url(Url::parse(base_url).expect("Mock server URL should parse."))
			.client_id("courier-test-client")
			.private_key(test_assertion_key())
			.scopes(
				ScopeSet::new(["okta.users.read", "okta.groups.read"])
					.expect("Test scopes should be valid."),
			)
			.retry(retry)
			.build()
			.expect("Test client configuration should build.")
	}

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Constructs an [`ApiClient`] backed by the test reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_client(base_url: &str, retry: RetryConfig) -> ReqwestTestClient {
		ApiClient::with_transport(test_client_config(base_url, retry), test_reqwest_transport())
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, HashSet, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use oauth2::http::{
		HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
		header::{AUTHORIZATION, CONTENT_TYPE, DATE, LINK},
	};
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
