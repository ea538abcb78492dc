//! Crate-level error taxonomy shared by the pipeline, flows, and pagination.

// self
use crate::{_prelude::*, dpop::HandshakeError, http::TransportError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure that was not retried or exhausted its retry budget.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// DPoP handshake protocol violation; retrying would loop against the server.
	#[error(transparent)]
	Handshake(#[from] HandshakeError),
	/// Token endpoint refused to issue an access token.
	#[error(transparent)]
	Token(#[from] TokenError),
	/// Collection endpoint broke its pagination contract.
	#[error(transparent)]
	Pagination(#[from] PaginationError),
	/// Resource endpoint answered with a non-success status.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Response body did not match the requested type.
	#[error("Response body could not be decoded.")]
	Decode(#[from] serde_path_to_error::Error<serde_json::Error>),
	/// The caller cancelled the operation.
	#[error("Request was cancelled.")]
	Cancelled,
}

/// Configuration and request construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Organization URL is required.
	#[error("Missing organization URL.")]
	MissingOrgUrl,
	/// Client identifier is required.
	#[error("Missing client identifier.")]
	MissingClientId,
	/// Private key material is required.
	#[error("Missing private key material.")]
	MissingPrivateKey,
	/// Endpoints must use HTTPS outside of loopback hosts.
	#[error("The organization URL must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// URL that failed validation.
		url: String,
	},
	/// At least one scope must be requested.
	#[error("At least one scope must be configured.")]
	NoScopes,
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Private key material could not be read or parsed.
	#[error("Private key material is invalid: {reason}.")]
	InvalidPrivateKey {
		/// Human-readable reason.
		reason: String,
	},
	/// Private key file could not be read.
	#[error("Private key file could not be read.")]
	PrivateKeyFile(#[source] std::io::Error),
	/// JWT construction or signing failed.
	#[error("Unable to sign JWT.")]
	Jwt(#[from] jsonwebtoken::errors::Error),
	/// DPoP proof key could not be generated.
	#[error("Unable to generate the DPoP proof key.")]
	ProofKey,
	/// URL could not be joined or parsed.
	#[error("URL is invalid.")]
	InvalidUrl(#[from] url::ParseError),
	/// Header value contains characters HTTP does not allow.
	#[error("Header value is invalid.")]
	InvalidHeader(#[from] oauth2::http::header::InvalidHeaderValue),
	/// Request could not be serialized.
	#[error("Request body could not be serialized.")]
	Serialize(#[from] serde_json::Error),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: Box<dyn StdError + Send + Sync>,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Failures raised while exchanging a client assertion for an access token.
#[derive(Debug, ThisError)]
pub enum TokenError {
	/// Token endpoint explained the refusal with an OAuth error body.
	#[error("Token endpoint returned an OAuth error `{error}`{}.", describe(.description))]
	Server {
		/// OAuth `error` code.
		error: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
		/// HTTP status code.
		status: u16,
	},
	/// Token endpoint failed without a usable body.
	#[error("Token endpoint returned HTTP {status} without a usable response body.")]
	EmptyResponse {
		/// HTTP status code.
		status: u16,
	},
	/// Successful response carried malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code.
		status: u16,
	},
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned a non-positive or oversized `expires_in`.
	#[error("The expires_in value is out of range.")]
	ExpiresInOutOfRange,
	/// The DPoP handshake kept asking for another round.
	#[error("DPoP handshake did not settle after {rounds} rounds.")]
	HandshakeUnsettled {
		/// Number of handshake rounds attempted.
		rounds: u32,
	},
}

fn describe(description: &Option<String>) -> String {
	description.as_deref().map(|value| format!(": {value}")).unwrap_or_default()
}

/// Pagination contract violations.
#[derive(Debug, ThisError)]
pub enum PaginationError {
	/// `Link` header value does not follow `<url>; rel="..."`.
	#[error("Malformed Link header value: {value}.")]
	MalformedLink {
		/// Offending header value.
		value: String,
	},
	/// `Link` header value is not valid visible ASCII.
	#[error("Link header value is not valid text.")]
	NonTextLink,
}

/// Non-success responses from resource endpoints.
#[derive(Debug, ThisError)]
#[error("API request failed with HTTP {status}.")]
pub struct ApiError {
	/// HTTP status code.
	pub status: u16,
	/// Server-issued request identifier, if any.
	pub request_id: Option<String>,
	/// Truncated response body.
	pub body_preview: String,
}
impl ApiError {
	const BODY_PREVIEW_LIMIT: usize = 512;

	/// Builds an error from a status, request identifier, and raw body.
	pub fn new(status: u16, request_id: Option<String>, body: &[u8]) -> Self {
		let text = String::from_utf8_lossy(body);
		let body_preview = match text.char_indices().nth(Self::BODY_PREVIEW_LIMIT) {
			Some((idx, _)) => format!("{}...", &text[..idx]),
			None => text.into_owned(),
		};

		Self { status, request_id, body_preview }
	}
}
