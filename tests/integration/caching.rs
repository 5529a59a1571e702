// std
use std::{sync::Arc, time::Duration};
// crates.io
use lingua_api::{
	CacheOptions, RequestOptions, Resource, Result, Scope, SharedContext, cache::Query, model::Word,
};
use serde_json::{Value, json};
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path, query_param},
};
// self
use crate::support;

fn words_body() -> serde_json::Value {
	json!([{ "id": 1, "text": "Hund", "translation": "dog", "language": "de" }])
}

#[tokio::test]
async fn repeated_reads_hit_the_network_once_per_ttl() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/api/words/"))
		.and(query_param("language", "en"))
		.respond_with(ResponseTemplate::new(200).set_body_json(words_body()))
		.expect(2)
		.mount(&server)
		.await;

	let client = SharedContext::in_memory().client(support::config(&server))?;
	let cache = CacheOptions::ttl(Duration::from_millis(1_000));
	let read = || {
		client.cached_get("/words/", RequestOptions::new().param("language", "en"), cache)
	};
	let first = read().await?;
	let second = read().await?;

	assert!(Arc::ptr_eq(&first, &second));

	tokio::time::sleep(Duration::from_millis(1_100)).await;

	let third = read().await?;

	assert!(!Arc::ptr_eq(&first, &third));
	assert_eq!(third.body, words_body());

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn concurrent_reads_share_one_call() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/api/words/"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(words_body())
				.set_delay(Duration::from_millis(200)),
		)
		.expect(1)
		.mount(&server)
		.await;

	let client = SharedContext::in_memory().client(support::config(&server))?;
	let words = Resource::<Word>::new(client.clone(), "/words/");
	let (first, second) = tokio::join!(
		words.list(Query::new(), CacheOptions::default()),
		words.list(Query::new(), CacheOptions::default()),
	);

	assert_eq!(first?, second?);
	assert_eq!(client.context().cache().in_flight(), 0);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn concurrent_reads_share_one_failure() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/api/topics/"))
		.respond_with(
			ResponseTemplate::new(500)
				.set_body_json(json!({ "detail": "boom" }))
				.set_delay(Duration::from_millis(200)),
		)
		.expect(1)
		.mount(&server)
		.await;

	let client = SharedContext::in_memory().client(support::config(&server))?;
	let read = || client.cached_get("/topics/", RequestOptions::new(), CacheOptions::default());
	let (first, second) = tokio::join!(read(), read());

	for result in [first, second] {
		let err = result.expect_err("shared failure");

		assert_eq!(err.status().map(|status| status.as_u16()), Some(500));
	}

	assert!(client.context().cache().is_empty());

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn mutations_wipe_the_cache_even_when_they_fail() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/api/words/"))
		.respond_with(ResponseTemplate::new(200).set_body_json(words_body()))
		.expect(3)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/words/"))
		.respond_with(ResponseTemplate::new(201).set_body_json(json!({
			"id": 2,
			"text": "Katze",
			"language": "de",
		})))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("DELETE"))
		.and(path("/api/words/7/"))
		.respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "Not found." })))
		.expect(1)
		.mount(&server)
		.await;

	let client = SharedContext::in_memory().client(support::config(&server))?;
	let words = Resource::<Word>::new(client.clone(), "words");
	let cache = CacheOptions::ttl(Duration::from_secs(60));

	words.list(Query::new(), cache).await?;
	words.list(Query::new(), cache).await?;

	let payload = json!({ "text": "Katze", "language": "de" });
	let created = words.create(&payload, RequestOptions::new()).await?;

	assert_eq!(created.text, "Katze");
	assert!(client.context().cache().is_empty());

	words.list(Query::new(), cache).await?;

	let err = words.remove(7, RequestOptions::new()).await.expect_err("missing record");

	assert_eq!(err.status().map(|status| status.as_u16()), Some(404));
	assert!(client.context().cache().is_empty());

	words.list(Query::new(), cache).await?;

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn replacing_and_patching_wipe_the_cache() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/api/words/"))
		.respond_with(ResponseTemplate::new(200).set_body_json(words_body()))
		.expect(3)
		.mount(&server)
		.await;
	Mock::given(method("PUT"))
		.and(path("/api/words/1/"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"id": 1,
			"text": "Hund",
			"translation": "hound",
			"language": "de",
		})))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("PATCH"))
		.and(path("/api/words/1/"))
		.respond_with(
			ResponseTemplate::new(400).set_body_json(json!({ "text": ["Must not be blank."] })),
		)
		.expect(1)
		.mount(&server)
		.await;

	let client = SharedContext::in_memory().client(support::config(&server))?;
	let words = Resource::<Word>::new(client.clone(), "/words/");
	let cache = CacheOptions::ttl(Duration::from_secs(60));

	words.list(Query::new(), cache).await?;
	words.list(Query::new(), cache).await?;

	let replacement = json!({ "text": "Hund", "translation": "hound", "language": "de" });
	let replaced = words.update(1, &replacement, RequestOptions::new()).await?;

	assert_eq!(replaced.translation.as_deref(), Some("hound"));
	assert!(client.context().cache().is_empty());

	words.list(Query::new(), cache).await?;

	let err = words
		.patch(1, &json!({ "text": "" }), RequestOptions::new())
		.await
		.expect_err("rejected patch");

	assert_eq!(err.status().map(|status| status.as_u16()), Some(400));
	assert!(client.context().cache().is_empty());

	words.list(Query::new(), cache).await?;

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn cancelled_mutation_still_wipes_the_cache() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/api/words/"))
		.respond_with(ResponseTemplate::new(200).set_body_json(words_body()))
		.expect(2)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/words/"))
		.respond_with(
			ResponseTemplate::new(201)
				.set_body_json(json!({ "id": 2, "text": "Katze", "language": "de" }))
				.set_delay(Duration::from_millis(300)),
		)
		.expect(1)
		.mount(&server)
		.await;

	let client = SharedContext::in_memory().client(support::config(&server))?;
	let words = Resource::<Word>::new(client.clone(), "/words/");
	let cache = CacheOptions::ttl(Duration::from_secs(60));

	words.list(Query::new(), cache).await?;

	assert_eq!(client.context().cache().len(), 1);

	let payload = json!({ "text": "Katze", "language": "de" });
	let created = tokio::time::timeout(
		Duration::from_millis(100),
		words.create(&payload, RequestOptions::new()),
	)
	.await;

	assert!(created.is_err());
	assert!(client.context().cache().is_empty());

	words.list(Query::new(), cache).await?;

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn scope_calls_leave_the_cache_alone() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/api/words/"))
		.respond_with(ResponseTemplate::new(200).set_body_json(words_body()))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/ai/chat/"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("DELETE"))
		.and(path("/api/ai/history/"))
		.respond_with(ResponseTemplate::new(500))
		.expect(1)
		.mount(&server)
		.await;

	let client = SharedContext::in_memory().client(support::config(&server))?;
	let words = Resource::<Word>::new(client.clone(), "/words/");
	let ai = Scope::new(client.clone(), "/ai");
	let cache = CacheOptions::ttl(Duration::from_secs(60));

	words.list(Query::new(), cache).await?;

	let reply: Value = ai.post("chat/", RequestOptions::new()).await?;

	assert_eq!(reply, json!({ "ok": true }));
	assert!(ai.delete::<Value>("/history/", RequestOptions::new()).await.is_err());
	assert_eq!(client.context().cache().len(), 1);

	words.list(Query::new(), cache).await?;

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn clients_sharing_a_context_keep_separate_entries_per_backend() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let primary = MockServer::start().await;
	let ai = MockServer::start().await;

	for server in [&primary, &ai] {
		Mock::given(method("GET"))
			.and(path("/api/status/"))
			.respond_with(
				ResponseTemplate::new(200).set_body_json(json!({ "origin": server.uri() })),
			)
			.expect(1)
			.mount(server)
			.await;
	}

	let context = SharedContext::in_memory();
	let first = context.client(support::config(&primary))?;
	let second = context.client(support::config(&ai).with_label("ai"))?;
	let cache = CacheOptions::ttl(Duration::from_secs(60));
	let a = first.cached_get("/status/", RequestOptions::new(), cache).await?;
	let b = second.cached_get("/status/", RequestOptions::new(), cache).await?;

	assert_eq!(a.body["origin"], json!(primary.uri()));
	assert_eq!(b.body["origin"], json!(ai.uri()));
	assert_eq!(context.cache().len(), 2);

	primary.verify().await;
	ai.verify().await;

	Ok(())
}
