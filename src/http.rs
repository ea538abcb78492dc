//! Transport primitives shared by every outbound request.
//!
//! The module exposes [`HttpTransport`] alongside the crate-owned [`ApiRequest`] and
//! [`ApiResponse`] values so downstream crates can plug in custom HTTP clients. Transports
//! report failures as [`TransportError`] values tagged with a [`TransportFailureKind`], which
//! is what the retry policy keys its eligibility rules on.

// std
use std::io::ErrorKind as IoErrorKind;
// self
#[cfg(feature = "reqwest")] use crate::error::ConfigError;
use crate::_prelude::*;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing a single request attempt.
///
/// Implementations perform exactly one round trip per call. Retries, DPoP decoration, and
/// pacing live in the [`Pipeline`](crate::pipeline::Pipeline); connection pooling and
/// timeouts stay with the transport.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and buffers the full response body.
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// Buffered outbound request that can be replayed across retry attempts.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute request URL.
	pub url: Url,
	/// Request headers.
	pub headers: HeaderMap,
	/// Request body bytes (empty when absent).
	pub body: Vec<u8>,
}
impl ApiRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: Vec::new() }
	}

	/// Shorthand for a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Shorthand for a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Sets or replaces a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a form-encoded body and the matching content type.
	pub fn with_form<'a, I>(mut self, pairs: I) -> Self
	where
		I: IntoIterator<Item = (&'a str, &'a str)>,
	{
		let mut serializer = url::form_urlencoded::Serializer::new(String::new());

		for (key, value) in pairs {
			serializer.append_pair(key, value);
		}

		self.body = serializer.finish().into_bytes();
		self.headers.insert(
			CONTENT_TYPE,
			HeaderValue::from_static("application/x-www-form-urlencoded"),
		);

		self
	}
}

/// Buffered response returned by a transport.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response from its parts.
	pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
		Self { status, headers, body }
	}

	/// Returns the first value of `name` as text, ignoring non-text values.
	pub fn header_str(&self, name: &str) -> Option<&str> {
		header_str(&self.headers, name)
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: for<'de> Deserialize<'de>,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		Ok(serde_path_to_error::deserialize(&mut de)?)
	}
}

/// Returns the first value of `name` as trimmed text.
pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name)?.to_str().ok().map(str::trim)
}

/// Failure classes the retry policy distinguishes between.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailureKind {
	/// Host name could not be resolved.
	NameResolution,
	/// TCP connection could not be established.
	Connect,
	/// Peer closed or reset the connection mid-exchange.
	ConnectionClosed,
	/// No route to the host or network.
	NoRoute,
	/// TLS handshake or certificate validation failed.
	Tls,
	/// The operation was interrupted.
	Interrupted,
	/// The request timed out.
	Timeout,
	/// Any other I/O-level failure.
	Other,
}
impl TransportFailureKind {
	/// Returns a stable label suitable for logs and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			TransportFailureKind::NameResolution => "name_resolution",
			TransportFailureKind::Connect => "connect",
			TransportFailureKind::ConnectionClosed => "connection_closed",
			TransportFailureKind::NoRoute => "no_route",
			TransportFailureKind::Tls => "tls",
			TransportFailureKind::Interrupted => "interrupted",
			TransportFailureKind::Timeout => "timeout",
			TransportFailureKind::Other => "other",
		}
	}

	/// Classifies an I/O error kind.
	pub fn from_io(kind: IoErrorKind) -> Self {
		match kind {
			IoErrorKind::ConnectionRefused => Self::Connect,
			IoErrorKind::ConnectionReset
			| IoErrorKind::ConnectionAborted
			| IoErrorKind::BrokenPipe
			| IoErrorKind::NotConnected
			| IoErrorKind::UnexpectedEof => Self::ConnectionClosed,
			IoErrorKind::HostUnreachable | IoErrorKind::NetworkUnreachable => Self::NoRoute,
			IoErrorKind::Interrupted => Self::Interrupted,
			IoErrorKind::TimedOut => Self::Timeout,
			_ => Self::Other,
		}
	}
}
impl Display for TransportFailureKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Transport-level failure reported by an [`HttpTransport`].
#[derive(Debug, ThisError)]
#[error("Transport failure ({kind}) while calling the API.")]
pub struct TransportError {
	/// Classified failure kind.
	pub kind: TransportFailureKind,
	/// Whether any part of the request may have reached the server.
	pub request_sent: bool,
	/// Underlying transport error.
	#[source]
	pub source: BoxError,
}
impl TransportError {
	/// Wraps a transport-specific error with its classification.
	pub fn new(
		kind: TransportFailureKind,
		request_sent: bool,
		src: impl 'static + Send + Sync + StdError,
	) -> Self {
		Self { kind, request_sent, source: Box::new(src) }
	}

	/// Classifies an [`std::io::Error`] surfaced by a custom transport.
	pub fn io(err: std::io::Error) -> Self {
		let kind = TransportFailureKind::from_io(err.kind());
		let request_sent = !matches!(
			kind,
			TransportFailureKind::Connect
				| TransportFailureKind::NameResolution
				| TransportFailureKind::NoRoute
		);

		Self::new(kind, request_sent, err)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport that never follows redirects; the token endpoint answers directly
	/// and pagination links are followed explicitly.
	pub fn new() -> Result<Self> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let ApiRequest { method, url, headers, body } = request;
			let response = self
				.0
				.request(method, url)
				.headers(headers)
				.body(body)
				.send()
				.await
				.map_err(classify_reqwest_error)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(classify_reqwest_error)?.to_vec();

			Ok(ApiResponse::new(status, headers, body))
		})
	}
}

#[cfg(feature = "reqwest")]
fn classify_reqwest_error(err: ReqwestError) -> TransportError {
	let (kind, request_sent) = if err.is_timeout() {
		(TransportFailureKind::Timeout, true)
	} else if let Some(kind) = classify_source_chain(&err) {
		(kind, !matches!(kind, TransportFailureKind::NameResolution | TransportFailureKind::Connect))
	} else if err.is_connect() {
		(TransportFailureKind::Connect, false)
	} else {
		(TransportFailureKind::Other, !err.is_builder())
	};

	TransportError::new(kind, request_sent, err)
}

// Walks the error chain looking for the underlying I/O, DNS, or TLS cause.
#[cfg(feature = "reqwest")]
fn classify_source_chain(err: &(dyn StdError + 'static)) -> Option<TransportFailureKind> {
	let mut current: Option<&(dyn StdError + 'static)> = Some(err);

	while let Some(cause) = current {
		if let Some(io) = cause.downcast_ref::<std::io::Error>() {
			let kind = TransportFailureKind::from_io(io.kind());

			if kind != TransportFailureKind::Other {
				return Some(kind);
			}
		}

		let message = cause.to_string().to_ascii_lowercase();

		if message.contains("dns error") || message.contains("failed to lookup address") {
			return Some(TransportFailureKind::NameResolution);
		}
		if message.contains("certificate") || message.contains("tls handshake") {
			return Some(TransportFailureKind::Tls);
		}

		current = cause.source();
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn io_kinds_map_to_failure_classes() {
		assert_eq!(
			TransportFailureKind::from_io(IoErrorKind::ConnectionRefused),
			TransportFailureKind::Connect
		);
		assert_eq!(
			TransportFailureKind::from_io(IoErrorKind::ConnectionReset),
			TransportFailureKind::ConnectionClosed
		);
		assert_eq!(
			TransportFailureKind::from_io(IoErrorKind::Interrupted),
			TransportFailureKind::Interrupted
		);
		assert_eq!(
			TransportFailureKind::from_io(IoErrorKind::TimedOut),
			TransportFailureKind::Timeout
		);
		assert_eq!(
			TransportFailureKind::from_io(IoErrorKind::InvalidData),
			TransportFailureKind::Other
		);
	}

	#[test]
	fn connect_failures_are_reported_as_unsent() {
		let err = TransportError::io(std::io::Error::from(IoErrorKind::ConnectionRefused));

		assert_eq!(err.kind, TransportFailureKind::Connect);
		assert!(!err.request_sent);

		let err = TransportError::io(std::io::Error::from(IoErrorKind::UnexpectedEof));

		assert_eq!(err.kind, TransportFailureKind::ConnectionClosed);
		assert!(err.request_sent);
	}

	#[test]
	fn form_bodies_are_url_encoded() {
		let url = Url::parse("https://example.okta.com/oauth2/v1/token")
			.expect("Test URL should parse.");
		let request = ApiRequest::post(url).with_form([("scope", "a b"), ("grant_type", "x")]);

		assert_eq!(request.body, b"scope=a+b&grant_type=x");
		assert_eq!(
			request.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok()),
			Some("application/x-www-form-urlencoded")
		);
	}
}
