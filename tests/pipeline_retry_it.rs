// std
use std::time::Instant;
// crates.io
use httpmock::prelude::*;
use time::format_description::well_known::Rfc2822;
// self
use oauth2_courier::{
	_preludet::*,
	config::{RetryConfig, TOKEN_PATH},
	pipeline::{REQUEST_ID, RETRY_COUNT, RETRY_FOR},
};

async fn mock_token(server: &MockServer) {
	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"token_type":"Bearer","expires_in":3600,"access_token":"retry-token"}"#);
		})
		.await;
}

#[tokio::test]
async fn unavailable_response_is_resubmitted_with_bookkeeping_headers() {
	let server = MockServer::start_async().await;
	let client = build_reqwest_test_client(&server.base_url(), fast_retry_config());

	mock_token(&server).await;

	let unavailable = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/users").header_missing(RETRY_COUNT);
			then.status(503).header(REQUEST_ID, "req-first");
		})
		.await;
	let recovered = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v1/users")
				.header(RETRY_COUNT, "2")
				.header(RETRY_FOR, "req-first");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let users = client
		.get_json::<Vec<serde_json::Value>>("/api/v1/users")
		.await
		.expect("Request should succeed after one retry.");

	assert!(users.is_empty());

	unavailable.assert_calls_async(1).await;
	recovered.assert_calls_async(1).await;
}

#[tokio::test]
async fn exhausted_budget_returns_last_response() {
	let server = MockServer::start_async().await;
	let client = build_reqwest_test_client(&server.base_url(), fast_retry_config());

	mock_token(&server).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/groups");
			then.status(504).header(REQUEST_ID, "req-timeout").body("gateway timeout");
		})
		.await;
	let err = client
		.get_json::<serde_json::Value>("/api/v1/groups")
		.await
		.expect_err("Budget exhaustion should surface the last response.");

	match err {
		Error::Api(err) => {
			assert_eq!(err.status, 504);
			assert_eq!(err.request_id.as_deref(), Some("req-timeout"));
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	mock.assert_calls_async(5).await;
}

#[tokio::test]
async fn rate_limited_response_waits_for_server_reset() {
	let server = MockServer::start_async().await;
	let client = build_reqwest_test_client(&server.base_url(), fast_retry_config());

	mock_token(&server).await;

	let now = OffsetDateTime::now_utc();
	let date = now.format(&Rfc2822).expect("Current time should format as RFC 2822.");
	let reset = now.unix_timestamp().to_string();
	let limited = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/apps").header_missing(RETRY_COUNT);
			then.status(429).header("date", date.as_str()).header("x-rate-limit-reset", reset.as_str());
		})
		.await;
	let recovered = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/apps").header(RETRY_COUNT, "2");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let started = Instant::now();

	client
		.get_json::<Vec<serde_json::Value>>("/api/v1/apps")
		.await
		.expect("Request should succeed after the rate-limit window.");

	// Reset equal to the server clock still waits the one-second floor.
	assert!(started.elapsed() >= std::time::Duration::from_millis(900));

	limited.assert_calls_async(1).await;
	recovered.assert_calls_async(1).await;
}

#[tokio::test]
async fn disabled_retries_make_one_attempt() {
	let server = MockServer::start_async().await;
	let client = build_reqwest_test_client(&server.base_url(), RetryConfig::disabled());

	mock_token(&server).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/users");
			then.status(503);
		})
		.await;
	let err = client
		.get_json::<serde_json::Value>("/api/v1/users")
		.await
		.expect_err("A single 503 should be final.");

	assert!(matches!(err, Error::Api(ref err) if err.status == 503));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn unreachable_host_is_not_retried() {
	let client = build_reqwest_test_client("http://127.0.0.1:9", fast_retry_config());
	let err = client.access_token().await.expect_err("Nothing listens on the discard port.");

	assert!(matches!(err, Error::Transport(_)));
}
