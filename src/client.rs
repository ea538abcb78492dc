//! High-level client tying token acquisition, the request pipeline, and pagination together.

// std
use std::marker::PhantomData;
// crates.io
use oauth2::http::header::ACCEPT;
use tokio_util::sync::CancellationToken;
// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;
use crate::{
	_prelude::*,
	auth::AccessToken,
	config::ClientConfig,
	dpop::DpopHandshake,
	error::ApiError,
	flows::TokenClient,
	http::{ApiRequest, ApiResponse, HttpTransport},
	pagination::{Page, PageFetcher, PageFuture, PagedCollection},
	pipeline::{Pipeline, REQUEST_ID},
	retry::RetryPolicy,
};

/// Authenticated API client; clones share the token cache, handshake state, and cancellation.
pub struct ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	config: Arc<ClientConfig>,
	pipeline: Arc<Pipeline<T>>,
	tokens: Arc<TokenClient<T>>,
	cancel: CancellationToken,
}
impl<T> ApiClient<T>
where
	T: HttpTransport,
{
	/// Creates a client over a caller-supplied transport.
	pub fn with_transport(config: ClientConfig, transport: T) -> Self {
		Self::with_shared_transport(config, Arc::new(transport))
	}
}
impl<T> ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client over a transport shared with other components.
	pub fn with_shared_transport(config: ClientConfig, transport: Arc<T>) -> Self {
		let config = Arc::new(config);
		let handshake = Arc::new(DpopHandshake::new(config.nonce_validity));
		let pipeline =
			Arc::new(Pipeline::new(transport, RetryPolicy::new(config.retry.clone()), handshake));
		let tokens = Arc::new(TokenClient::new(config.clone(), pipeline.clone()));

		Self { config, pipeline, tokens, cancel: CancellationToken::new() }
	}

	/// Configuration the client was built with.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Token cache and acquisition flow.
	pub fn tokens(&self) -> &TokenClient<T> {
		&self.tokens
	}

	/// DPoP handshake state shared by token and resource requests.
	pub fn handshake(&self) -> &DpopHandshake {
		self.pipeline.handshake()
	}

	/// Token that aborts every in-flight and future call made through this client.
	pub fn cancellation_token(&self) -> &CancellationToken {
		&self.cancel
	}

	/// Returns a usable access token, acquiring one when needed.
	pub async fn access_token(&self) -> Result<AccessToken> {
		self.tokens.access_token(&self.cancel).await
	}

	/// Sends an authenticated request and returns the successful response.
	///
	/// A `401` drops the cached token and the request is sent once more with a new one. Any
	/// other non-success status becomes [`ApiError`].
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		let mut reauthenticated = false;

		loop {
			let token = self.tokens.access_token(&self.cancel).await?;
			let outgoing = request.clone().with_header(AUTHORIZATION, token.authorization_value()?);
			let response = self.pipeline.execute(outgoing, &self.cancel).await?;

			if response.status == StatusCode::UNAUTHORIZED && !reauthenticated {
				reauthenticated = true;

				self.tokens.invalidate();

				continue;
			}
			if !response.status.is_success() {
				return Err(ApiError::new(
					response.status.as_u16(),
					response.header_str(REQUEST_ID).map(ToOwned::to_owned),
					&response.body,
				)
				.into());
			}

			return Ok(response);
		}
	}

	/// `GET`s `path` (relative to the organization URL) and decodes the JSON body.
	pub async fn get_json<R>(&self, path: &str) -> Result<R>
	where
		R: for<'de> Deserialize<'de>,
	{
		self.send(json_get(self.config.resolve(path)?)).await?.json()
	}

	/// Lazily pages through the JSON array collection at `path`.
	pub fn paginate<I>(&self, path: &str) -> Result<PagedCollection<I, JsonPages<T, I>>>
	where
		I: 'static + Send + for<'de> Deserialize<'de>,
	{
		Ok(PagedCollection::new(JsonPages {
			client: self.clone(),
			first: self.config.resolve(path)?,
			_item: PhantomData,
		}))
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Creates a client backed by the default reqwest transport.
	pub fn new(config: ClientConfig) -> Result<Self> {
		Ok(Self::with_transport(config, ReqwestTransport::new()?))
	}
}
impl<T> Clone for ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			pipeline: self.pipeline.clone(),
			tokens: self.tokens.clone(),
			cancel: self.cancel.clone(),
		}
	}
}
impl<T> Debug for ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("org_url", &self.config.org_url.as_str())
			.field("tokens", &self.tokens)
			.field("cancelled", &self.cancel.is_cancelled())
			.finish_non_exhaustive()
	}
}

/// Page fetcher behind [`ApiClient::paginate`]: `GET`s the first URL, then each next link
/// resolved against the organization URL, decoding every body as a JSON array.
pub struct JsonPages<T, I>
where
	T: ?Sized + HttpTransport,
{
	client: ApiClient<T>,
	first: Url,
	_item: PhantomData<fn() -> I>,
}
impl<T, I> PageFetcher<I> for JsonPages<T, I>
where
	T: ?Sized + HttpTransport,
	I: 'static + Send + for<'de> Deserialize<'de>,
{
	fn fetch_page<'a>(&'a self, next: Option<&'a str>) -> PageFuture<'a, I> {
		Box::pin(async move {
			let url = match next {
				Some(link) => self.client.config.resolve(link)?,
				None => self.first.clone(),
			};
			let response = self.client.send(json_get(url)).await?;
			let items = response.json::<Vec<I>>()?;

			Ok(Page::new(items, response.headers))
		})
	}
}
impl<T, I> Debug for JsonPages<T, I>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("JsonPages").field("first", &self.first.as_str()).finish_non_exhaustive()
	}
}

fn json_get(url: Url) -> ApiRequest {
	ApiRequest::get(url).with_header(ACCEPT, HeaderValue::from_static("application/json"))
}
