// std
use std::time::Duration;
// crates.io
use lingua_api::{Error, RefreshError, RequestOptions, Result, SharedContext};
use serde_json::json;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	Request,
	matchers::{body_json, header, method, path},
};
// self
use crate::support;

async fn mount_guarded(server: &MockServer, route: &str, token: &str, hits: u64) {
	Mock::given(method("GET"))
		.and(path(route))
		.and(header("authorization", format!("Bearer {token}").as_str()))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": route })))
		.expect(hits)
		.mount(server)
		.await;
}

async fn mount_unauthorized(server: &MockServer, route: &str, hits: u64) {
	Mock::given(method("GET"))
		.and(path(route))
		.respond_with(
			ResponseTemplate::new(401).set_body_json(json!({ "detail": "Token expired." })),
		)
		.expect(hits)
		.mount(server)
		.await;
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_guarded(&server, "/api/words/", "fresh", 1).await;
	mount_guarded(&server, "/api/topics/", "fresh", 1).await;
	mount_unauthorized(&server, "/api/words/", 1).await;
	mount_unauthorized(&server, "/api/topics/", 1).await;
	Mock::given(method("POST"))
		.and(path("/api/token/refresh/"))
		.and(body_json(json!({ "refresh": "r1" })))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(json!({ "access": "fresh", "refresh": "r2" }))
				.set_delay(Duration::from_millis(200)),
		)
		.expect(1)
		.mount(&server)
		.await;

	let context = support::context_with_tokens(Some("stale"), Some("r1"));
	let client = context.client(support::config(&server))?;
	let (words, topics) = tokio::join!(
		client.get("/words/", RequestOptions::new()),
		client.get("/topics/", RequestOptions::new()),
	);

	assert_eq!(words?.body, json!({ "ok": "/api/words/" }));
	assert_eq!(topics?.body, json!({ "ok": "/api/topics/" }));
	assert_eq!(context.storage().access_token().as_deref(), Some("fresh"));
	assert_eq!(context.storage().refresh_token().as_deref(), Some("r2"));
	assert_eq!(
		client.default_authorization().and_then(|value| value.to_str().ok().map(str::to_owned)),
		Some("Bearer fresh".to_owned())
	);
	assert!(!context.refresh().is_pending());
	assert_eq!(context.metrics().snapshot().refresh_successes, 1);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn retried_401_is_surfaced_without_another_refresh() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_unauthorized(&server, "/api/words/", 2).await;
	Mock::given(method("POST"))
		.and(path("/api/token/refresh/"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "fresh" })))
		.expect(1)
		.mount(&server)
		.await;

	let context = support::context_with_tokens(Some("stale"), Some("r1"));
	let client = context.client(support::config(&server))?;
	let err = client.get("/words/", RequestOptions::new()).await.expect_err("still unauthorized");

	assert!(err.is_unauthorized());
	assert_eq!(context.storage().access_token().as_deref(), Some("fresh"));
	assert_eq!(context.storage().refresh_token().as_deref(), Some("r1"));

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn missing_refresh_token_surfaces_the_401_untouched() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_unauthorized(&server, "/api/words/", 1).await;
	Mock::given(method("POST"))
		.and(path("/api/token/refresh/"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "fresh" })))
		.expect(0)
		.mount(&server)
		.await;

	let context = support::context_with_tokens(Some("stale"), None);
	let client = context.client(support::config(&server))?;
	let err = client.get("/words/", RequestOptions::new()).await.expect_err("no refresh token");

	assert!(matches!(err, Error::HttpStatus { .. }));
	assert!(err.is_unauthorized());
	assert_eq!(context.storage().access_token().as_deref(), Some("stale"));

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn refresh_failure_erases_credentials() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_unauthorized(&server, "/api/words/", 1).await;
	Mock::given(method("POST"))
		.and(path("/api/token/refresh/"))
		.respond_with(
			ResponseTemplate::new(401)
				.set_body_json(json!({ "detail": "Token is blacklisted." })),
		)
		.expect(1)
		.mount(&server)
		.await;

	let context = support::context_with_tokens(Some("stale"), Some("revoked"));
	let client = context.client(support::config(&server))?;
	let err = client.get("/words/", RequestOptions::new()).await.expect_err("refresh rejected");

	assert!(matches!(err, Error::Refresh(RefreshError::RefreshFailed(_))));
	assert_eq!(context.storage().access_token(), None);
	assert_eq!(context.storage().refresh_token(), None);
	assert_eq!(context.metrics().snapshot().refresh_errors, 1);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn unusable_refreshed_token_retries_without_credentials() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_guarded(&server, "/api/words/", "fresh", 1).await;
	Mock::given(method("GET"))
		.and(path("/api/topics/"))
		.and(|request: &Request| !request.headers.contains_key("authorization"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": "anonymous" })))
		.expect(1)
		.mount(&server)
		.await;
	mount_unauthorized(&server, "/api/words/", 1).await;
	mount_unauthorized(&server, "/api/topics/", 1).await;
	Mock::given(method("POST"))
		.and(path("/api/token/refresh/"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "fresh" })))
		.up_to_n_times(1)
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/token/refresh/"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "bad\ntoken" })))
		.expect(1)
		.mount(&server)
		.await;

	let context = support::context_with_tokens(Some("stale"), Some("r1"));
	let client = context.client(support::config(&server))?;

	client.get("/words/", RequestOptions::new()).await?;

	assert!(client.default_authorization().is_some());

	let topics = client.get("/topics/", RequestOptions::new()).await?;

	assert_eq!(topics.body, json!({ "ok": "anonymous" }));
	assert!(client.default_authorization().is_none());

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn clients_without_refresh_surface_401_directly() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_unauthorized(&server, "/api/words/", 1).await;
	Mock::given(method("POST"))
		.and(path("/api/token/refresh/"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "fresh" })))
		.expect(0)
		.mount(&server)
		.await;

	let context = support::context_with_tokens(Some("stale"), Some("r1"));
	let client = context.client(support::config(&server).without_refresh())?;
	let err = client.get("/words/", RequestOptions::new()).await.expect_err("unauthorized");

	assert!(matches!(err, Error::HttpStatus { .. }));
	assert!(err.is_unauthorized());
	assert_eq!(context.storage().refresh_token().as_deref(), Some("r1"));

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn outgoing_requests_carry_locale_and_proxy_bypass() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/api/me/"))
		.and(header("authorization", "Bearer token"))
		.and(header("accept-language", "uk"))
		.and(header("ngrok-skip-browser-warning", "true"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
		.expect(1)
		.mount(&server)
		.await;

	let context = SharedContext::default();

	context.storage().store_tokens("token", None)?;
	context.storage().set_locale("uk")?;

	let config = support::config(&server).with_proxy_domains(["127.0.0.1"]);
	let client = context.client(config)?;
	let response = client.get("/me/", RequestOptions::new()).await?;

	assert_eq!(response.body, json!({ "id": 1 }));

	server.verify().await;

	Ok(())
}
