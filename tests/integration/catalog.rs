// std
use std::time::Duration;
// crates.io
use lingua_api::{
	ApiCatalog, CacheOptions, Result,
	cache::Query,
	model::{ChatMessage, ChatRole},
};
use serde_json::json;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{body_partial_json, header, method, path},
};
// self
use crate::support;

#[tokio::test]
async fn backends_share_one_refresh_exchange() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let primary = MockServer::start().await;
	let ai = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/api/languages/"))
		.and(header("authorization", "Bearer fresh"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"count": 1,
			"next": null,
			"previous": null,
			"results": [{ "id": 1, "code": "de", "name": "German" }],
		})))
		.expect(1)
		.mount(&primary)
		.await;
	Mock::given(method("GET"))
		.and(path("/api/languages/"))
		.respond_with(ResponseTemplate::new(401))
		.expect(1)
		.mount(&primary)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/token/refresh/"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(json!({ "access": "fresh" }))
				.set_delay(Duration::from_millis(200)),
		)
		.expect(1)
		.mount(&primary)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/ai/chat/"))
		.and(header("authorization", "Bearer fresh"))
		.and(body_partial_json(json!({ "language": "de" })))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"message": { "role": "assistant", "content": "Hallo!" },
		})))
		.expect(1)
		.mount(&ai)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/ai/chat/"))
		.respond_with(ResponseTemplate::new(401))
		.expect(1)
		.mount(&ai)
		.await;

	let context = support::context_with_tokens(Some("stale"), Some("r1"));
	// Both backends refresh against the primary backend.
	let mut ai_config = support::config(&ai).with_label("ai");

	ai_config.refresh_url = support::config(&primary).refresh_url;

	let catalog = ApiCatalog::new(&context, support::config(&primary), ai_config)?;
	let history = [ChatMessage { role: ChatRole::User, content: "Hallo".into() }];
	let (languages, reply) = tokio::join!(
		catalog.languages.list(Query::new(), CacheOptions::default()),
		catalog.ai.chat("de", &history),
	);
	let languages = languages?;

	assert_eq!(languages.total(), 1);
	assert_eq!(languages.items()[0].code, "de");
	assert_eq!(reply?, ChatMessage { role: ChatRole::Assistant, content: "Hallo!".into() });
	assert_eq!(context.storage().access_token().as_deref(), Some("fresh"));

	primary.verify().await;
	ai.verify().await;

	Ok(())
}

#[tokio::test]
async fn evaluation_and_record_reads() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let primary = MockServer::start().await;
	let ai = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/api/topics/3/"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"id": 3,
			"title": "Animals",
			"language": "de",
		})))
		.expect(1)
		.mount(&primary)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/ai/evaluate/"))
		.and(body_partial_json(json!({ "prompt": "dog", "answer": "Hund" })))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"score": 1.0,
			"feedback": "Perfect.",
		})))
		.expect(1)
		.mount(&ai)
		.await;

	let context = support::context_with_tokens(Some("token"), Some("r1"));
	let ai_config = support::config(&ai).with_label("ai");
	let catalog = ApiCatalog::new(&context, support::config(&primary), ai_config)?;
	let cache = CacheOptions::ttl(Duration::from_secs(30));
	let topic = catalog.topics.get(3, cache).await?;
	let again = catalog.topics.get(3, cache).await?;

	assert_eq!(topic, again);
	assert_eq!(topic.title, "Animals");

	let evaluation = catalog.ai.evaluate("de", "dog", "Hund").await?;

	assert_eq!(evaluation.score, 1.0);
	assert_eq!(evaluation.feedback.as_deref(), Some("Perfect."));
	assert_eq!(evaluation.correction, None);

	primary.verify().await;
	ai.verify().await;

	Ok(())
}
