//! Request pipeline: DPoP decoration, transport, and retry.
//!
//! Every outbound request goes through [`Pipeline`]. Each attempt starts from a fresh copy of
//! the caller's request so proofs never repeat a `jti`, then the [`RetryPolicy`] decides whether
//! the outcome is final. Waits race the caller's [`CancellationToken`].

// crates.io
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	dpop::{DpopHandshake, HandshakeStep, RequestTarget},
	http::{ApiRequest, ApiResponse, HttpTransport, TransportError},
	obs::{self, RequestKind, RequestOutcome, RequestSpan},
	retry::{AttemptOutcome, RetryContext, RetryPolicy},
};

/// Request identifier assigned by the server.
pub const REQUEST_ID: &str = "x-okta-request-id";
/// Identifier of the first failed attempt, sent on resubmissions.
pub const RETRY_FOR: &str = "x-okta-retry-for";
/// Attempt number (1-based), sent from the second attempt on.
pub const RETRY_COUNT: &str = "x-okta-retry-count";

/// Outcome of a token endpoint call.
#[derive(Debug)]
pub enum TokenExchange {
	/// The server answered without a handshake demand; the response still needs mapping.
	Completed(ApiResponse),
	/// The server demanded a handshake step that has now been taken; reissue the request.
	HandshakeAdvanced(HandshakeStep),
}

/// Shared execution path for token and resource requests.
pub struct Pipeline<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	policy: RetryPolicy,
	handshake: Arc<DpopHandshake>,
}
impl<T> Pipeline<T>
where
	T: ?Sized + HttpTransport,
{
	/// Assembles a pipeline from its collaborators.
	pub fn new(transport: Arc<T>, policy: RetryPolicy, handshake: Arc<DpopHandshake>) -> Self {
		Self { transport, policy, handshake }
	}

	/// Transport used for every attempt.
	pub fn transport(&self) -> &Arc<T> {
		&self.transport
	}

	/// Retry policy applied to every call.
	pub fn policy(&self) -> &RetryPolicy {
		&self.policy
	}

	/// Handshake state shared by every call.
	pub fn handshake(&self) -> &Arc<DpopHandshake> {
		&self.handshake
	}

	/// Executes a resource request. Non-success statuses are returned, not raised.
	pub async fn execute(
		&self,
		request: ApiRequest,
		cancel: &CancellationToken,
	) -> Result<ApiResponse> {
		self.run(request, RequestTarget::Resource, cancel).await
	}

	/// Executes a token request and lets the handshake react to the final response.
	pub async fn execute_token(
		&self,
		request: ApiRequest,
		cancel: &CancellationToken,
	) -> Result<TokenExchange> {
		let response = self.run(request, RequestTarget::Token, cancel).await?;

		Ok(match self.handshake.observe_token_response(&response)? {
			Some(step) => TokenExchange::HandshakeAdvanced(step),
			None => TokenExchange::Completed(response),
		})
	}

	async fn run(
		&self,
		request: ApiRequest,
		target: RequestTarget,
		cancel: &CancellationToken,
	) -> Result<ApiResponse> {
		let kind = match target {
			RequestTarget::Token => RequestKind::Token,
			RequestTarget::Resource => RequestKind::Resource,
		};
		let span = RequestSpan::new(kind, "pipeline");
		let result = span.instrument(self.run_attempts(request, target, kind, cancel)).await;

		match &result {
			Ok(response) if response.status.is_success() =>
				obs::record_request_outcome(kind, RequestOutcome::Success),
			_ => obs::record_request_outcome(kind, RequestOutcome::Failure),
		}

		result
	}

	async fn run_attempts(
		&self,
		request: ApiRequest,
		target: RequestTarget,
		kind: RequestKind,
		cancel: &CancellationToken,
	) -> Result<ApiResponse> {
		let config = self.policy.config();
		let started = Instant::now();
		let mut attempt = 0_u32;
		let mut retry_for = None::<HeaderValue>;

		loop {
			if cancel.is_cancelled() {
				return Err(Error::Cancelled);
			}

			attempt += 1;

			let mut outgoing = request.clone();

			if attempt > 1 && config.retry_headers {
				outgoing.headers.insert(RETRY_COUNT, HeaderValue::from(attempt));

				if let Some(id) = &retry_for {
					outgoing.headers.insert(RETRY_FOR, id.clone());
				}
			}

			self.handshake.prepare(&mut outgoing, target)?;
			obs::record_request_outcome(kind, RequestOutcome::Attempt);

			let result = tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(Error::Cancelled),
				result = self.transport.execute(outgoing) => result,
			};
			let decision = {
				let (outcome, request_sent) = match &result {
					Ok(response) => (
						AttemptOutcome::Response {
							status: response.status,
							headers: &response.headers,
						},
						true,
					),
					Err(err) => (AttemptOutcome::Transport(err), err.request_sent),
				};
				let ctx = RetryContext {
					attempt,
					outcome,
					idempotent: self.policy.is_idempotent(&request.method, request_sent),
					cancelled: cancel.is_cancelled(),
				};

				self.policy.should_retry(&ctx).then(|| self.policy.retry_delay(&ctx))
			};
			let Some(delay) = decision else {
				return finish(result);
			};

			obs::log_backoff(attempt, delay, is_rate_limited(&result));

			if config.max_elapsed.is_some_and(|max| started.elapsed() + delay > max) {
				return finish(result);
			}
			if let (None, Ok(response)) = (&retry_for, &result) {
				retry_for = response.headers.get(REQUEST_ID).cloned();
			}

			obs::log_retry(attempt, delay);
			obs::record_request_outcome(kind, RequestOutcome::Retry);

			tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(Error::Cancelled),
				_ = time::sleep(delay) => {},
			}
		}
	}
}
impl<T> Debug for Pipeline<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Pipeline")
			.field("policy", &self.policy)
			.field("handshake", &self.handshake)
			.finish_non_exhaustive()
	}
}

fn finish(result: Result<ApiResponse, TransportError>) -> Result<ApiResponse> {
	Ok(result?)
}

fn is_rate_limited(result: &Result<ApiResponse, TransportError>) -> bool {
	matches!(result, Ok(response) if response.status == StatusCode::TOO_MANY_REQUESTS)
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		io::{Error as IoError, ErrorKind as IoErrorKind},
		time::Duration as StdDuration,
	};
	// self
	use super::*;
	use crate::{
		config::RetryConfig,
		http::{TransportFailureKind, TransportFuture},
	};

	type Scripted = Result<ApiResponse, TransportError>;

	#[derive(Default)]
	struct ScriptedTransport {
		script: Mutex<VecDeque<Scripted>>,
		seen: Mutex<Vec<ApiRequest>>,
	}
	impl ScriptedTransport {
		fn new(script: impl IntoIterator<Item = Scripted>) -> Arc<Self> {
			Arc::new(Self { script: Mutex::new(script.into_iter().collect()), ..Self::default() })
		}

		fn seen(&self) -> Vec<ApiRequest> {
			self.seen.lock().clone()
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
			self.seen.lock().push(request);

			let next = self.script.lock().pop_front().expect("Script should cover every attempt.");

			Box::pin(async move { next })
		}
	}

	fn respond(status: u16, headers: &[(&'static str, &'static str)]) -> Scripted {
		let mut map = HeaderMap::new();

		for (name, value) in headers {
			map.insert(*name, HeaderValue::from_static(value));
		}

		Ok(ApiResponse::new(
			StatusCode::from_u16(status).expect("Status should be valid."),
			map,
			Vec::new(),
		))
	}

	fn fail(kind: TransportFailureKind, request_sent: bool) -> Scripted {
		Err(TransportError::new(kind, request_sent, IoError::from(IoErrorKind::Other)))
	}

	fn pipeline(
		transport: Arc<ScriptedTransport>,
		retry: RetryConfig,
	) -> Pipeline<ScriptedTransport> {
		Pipeline::new(transport, RetryPolicy::new(retry), Arc::new(DpopHandshake::default()))
	}

	fn fast() -> RetryConfig {
		RetryConfig {
			initial_backoff: StdDuration::from_millis(1),
			max_backoff: StdDuration::from_millis(4),
			..RetryConfig::default()
		}
	}

	fn get() -> ApiRequest {
		ApiRequest::get(Url::parse("https://acme.okta.com/api/v1/users").expect("URL should parse."))
	}

	#[tokio::test]
	async fn retries_until_success_and_tags_resubmissions() {
		let transport = ScriptedTransport::new([
			respond(503, &[(REQUEST_ID, "req-1")]),
			respond(504, &[(REQUEST_ID, "req-2")]),
			respond(200, &[]),
		]);
		let response = pipeline(transport.clone(), fast())
			.execute(get(), &CancellationToken::new())
			.await
			.expect("Third attempt should succeed.");
		let seen = transport.seen();

		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(seen.len(), 3);
		assert!(seen[0].headers.get(RETRY_COUNT).is_none());
		assert_eq!(seen[1].headers.get(RETRY_COUNT).map(|v| v.as_bytes()), Some(&b"2"[..]));
		assert_eq!(seen[2].headers.get(RETRY_COUNT).map(|v| v.as_bytes()), Some(&b"3"[..]));
		assert_eq!(seen[2].headers.get(RETRY_FOR).map(|v| v.as_bytes()), Some(&b"req-1"[..]));
	}

	#[tokio::test]
	async fn exhaustion_returns_the_last_response() {
		let transport =
			ScriptedTransport::new([respond(503, &[]), respond(503, &[]), respond(503, &[])]);
		let retry = RetryConfig { max_retries: 2, ..fast() };
		let response = pipeline(transport.clone(), retry)
			.execute(get(), &CancellationToken::new())
			.await
			.expect("Exhaustion should surface the response.");

		assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
		assert_eq!(transport.seen().len(), 3);
	}

	#[tokio::test]
	async fn non_retriable_transport_failures_propagate() {
		let transport = ScriptedTransport::new([fail(TransportFailureKind::Connect, false)]);
		let err = pipeline(transport.clone(), fast())
			.execute(get(), &CancellationToken::new())
			.await
			.expect_err("Connect failures should not be retried.");

		assert!(matches!(err, Error::Transport(ref e) if e.kind == TransportFailureKind::Connect));
		assert_eq!(transport.seen().len(), 1);
	}

	#[tokio::test]
	async fn sent_posts_are_not_retried_after_timeouts() {
		let transport = ScriptedTransport::new([
			fail(TransportFailureKind::Timeout, true),
			respond(200, &[]),
		]);
		let post = ApiRequest::post(
			Url::parse("https://acme.okta.com/api/v1/groups").expect("URL should parse."),
		);
		let err = pipeline(transport.clone(), fast())
			.execute(post, &CancellationToken::new())
			.await
			.expect_err("A sent POST is not idempotent.");

		assert!(matches!(err, Error::Transport(_)));

		let transport = ScriptedTransport::new([
			fail(TransportFailureKind::Timeout, true),
			respond(200, &[]),
		]);
		let response = pipeline(transport, fast())
			.execute(get(), &CancellationToken::new())
			.await
			.expect("A GET is retried after a timeout.");

		assert_eq!(response.status, StatusCode::OK);
	}

	#[tokio::test]
	async fn max_elapsed_stops_retrying() {
		let transport = ScriptedTransport::new([respond(503, &[]), respond(200, &[])]);
		let retry = RetryConfig {
			initial_backoff: StdDuration::from_secs(5),
			max_backoff: StdDuration::from_secs(5),
			max_elapsed: Some(StdDuration::from_secs(1)),
			..RetryConfig::default()
		};
		let response = pipeline(transport.clone(), retry)
			.execute(get(), &CancellationToken::new())
			.await
			.expect("The first response should be surfaced.");

		assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
		assert_eq!(transport.seen().len(), 1);
	}

	#[tokio::test]
	async fn cancellation_interrupts_the_wait() {
		let transport = ScriptedTransport::new([respond(503, &[]), respond(200, &[])]);
		let retry = RetryConfig {
			initial_backoff: StdDuration::from_secs(30),
			max_backoff: StdDuration::from_secs(30),
			..RetryConfig::default()
		};
		let cancel = CancellationToken::new();
		let trigger = cancel.clone();

		tokio::spawn(async move {
			time::sleep(StdDuration::from_millis(20)).await;
			trigger.cancel();
		});

		let err = pipeline(transport.clone(), retry)
			.execute(get(), &cancel)
			.await
			.expect_err("Cancellation should abort the retry wait.");

		assert!(matches!(err, Error::Cancelled));
		assert_eq!(transport.seen().len(), 1);
	}

	#[tokio::test]
	async fn token_requests_report_handshake_progress() {
		let body = br#"{"error":"invalid_dpop_proof"}"#.to_vec();
		let transport = ScriptedTransport::new([Ok(ApiResponse::new(
			StatusCode::BAD_REQUEST,
			HeaderMap::new(),
			body,
		))]);
		let pipeline = pipeline(transport, fast());
		let exchange = pipeline
			.execute_token(
				ApiRequest::post(
					Url::parse("https://acme.okta.com/oauth2/v1/token").expect("URL should parse."),
				),
				&CancellationToken::new(),
			)
			.await
			.expect("Handshake progress is not an error.");

		assert!(matches!(
			exchange,
			TokenExchange::HandshakeAdvanced(HandshakeStep::KeyEstablished)
		));
		assert!(pipeline.handshake().is_active());
	}
}
