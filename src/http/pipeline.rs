//! Request/response pipeline with transparent re-authentication.
//!
//! Every call made by an [`ApiClient`] passes through the same stages:
//!
//! 1. Outgoing transform: tunnelling-proxy bypass header, bearer credential, locale, debug log.
//! 2. Transport.
//! 3. Incoming transform: success is logged and returned; a first 401 on a refreshable request
//!    triggers the shared refresh coordinator and one retry; everything else is logged and
//!    returned unchanged. Without a persisted refresh token the 401 itself is returned.

// std
use std::sync::RwLock;
// crates.io
use http::{
	HeaderMap, HeaderName, HeaderValue, Method,
	header::{ACCEPT_LANGUAGE, AUTHORIZATION},
};
use serde::Serialize;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::RefreshExchange,
	cache::{CacheOptions, Query, signature},
	config::ClientConfig,
	context::SharedContext,
	error::RefreshError,
	http::{
		debug::{self, DebugGate},
		proxy,
		transport::{ApiResponse, OutgoingRequest, Transport},
	},
	path,
};

/// States of the failure path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryState {
	/// Failure returned to the caller unchanged.
	NormalError,
	/// First 401 on a refreshable request.
	UnauthorizedFirstAttempt,
	/// Awaiting the shared refresh exchange.
	RefreshInFlight,
	/// Re-issuing the request with the fresh token.
	UnauthorizedRetry,
	/// Refresh failed; credentials were erased.
	RefreshFailed,
}
impl RecoveryState {
	/// Decide how a failed exchange is handled.
	pub fn classify(error: &Error, request: &OutgoingRequest, refresh_configured: bool) -> Self {
		if error.is_unauthorized() && !request.is_refresh && !request.retried && refresh_configured
		{
			Self::UnauthorizedFirstAttempt
		} else {
			Self::NormalError
		}
	}
}

/// Per-call request settings.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// Query parameters.
	pub query: Query,
	/// Extra headers; they are applied before the pipeline's own headers.
	pub headers: HeaderMap,
	/// JSON body.
	pub body: Option<Value>,
}
impl RequestOptions {
	/// Empty options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Append a query parameter.
	pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.query.push(key, value);

		self
	}

	/// Replace the query with the fields of a serialisable object.
	pub fn params<T>(mut self, params: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		self.query = Query::from_serialize(params)?;

		Ok(self)
	}

	/// Replace the query.
	pub fn query(mut self, query: Query) -> Self {
		self.query = query;

		self
	}

	/// Add a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Set the JSON body.
	pub fn json<T>(mut self, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_value(body)?);

		Ok(self)
	}
}

/// HTTP client bound to one backend, sharing refresh and cache state through its context.
///
/// Cloning is cheap; clones share the default authorisation header.
#[derive(Clone, Debug)]
pub struct ApiClient {
	inner: Arc<ClientInner>,
}
impl ApiClient {
	/// Build a client from `config` sharing `context`.
	pub fn new(config: ClientConfig, context: SharedContext) -> Result<Self> {
		config.validate()?;

		let transport = Transport::new(config.timeout, config.user_agent.as_deref())?;

		Ok(Self::with_transport(config, context, transport))
	}

	/// Build a client around an existing transport (primarily for tests).
	pub fn with_transport(
		config: ClientConfig,
		context: SharedContext,
		transport: Transport,
	) -> Self {
		let gate = DebugGate::new(config.debug);

		Self {
			inner: Arc::new(ClientInner {
				config,
				context,
				transport,
				gate,
				default_authorization: RwLock::new(None),
			}),
		}
	}

	/// Client configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Shared context the client was built from.
	pub fn context(&self) -> &SharedContext {
		&self.inner.context
	}

	/// Logging label.
	pub fn label(&self) -> &str {
		&self.inner.config.label
	}

	/// Absolute address of `path` for this client.
	pub fn url(&self, path: &str) -> String {
		path::resolve(&self.inner.config.base_url, path)
	}

	/// Authorisation header installed by the most recent successful refresh.
	pub fn default_authorization(&self) -> Option<HeaderValue> {
		self.inner.default_authorization.read().ok().and_then(|value| value.clone())
	}

	/// Issue a request through the full pipeline.
	pub async fn request(
		&self,
		method: Method,
		path: &str,
		options: RequestOptions,
	) -> Result<ApiResponse> {
		let mut request = OutgoingRequest::new(method, self.url(path));

		request.headers = options.headers;
		request.query = options.query;
		request.body = options.body;

		self.execute(request).await
	}

	/// `GET` without caching.
	pub async fn get(&self, path: &str, options: RequestOptions) -> Result<ApiResponse> {
		self.request(Method::GET, path, options).await
	}

	/// `POST`.
	pub async fn post(&self, path: &str, options: RequestOptions) -> Result<ApiResponse> {
		self.request(Method::POST, path, options).await
	}

	/// `PUT`.
	pub async fn put(&self, path: &str, options: RequestOptions) -> Result<ApiResponse> {
		self.request(Method::PUT, path, options).await
	}

	/// `PATCH`.
	pub async fn patch(&self, path: &str, options: RequestOptions) -> Result<ApiResponse> {
		self.request(Method::PATCH, path, options).await
	}

	/// `DELETE`.
	pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<ApiResponse> {
		self.request(Method::DELETE, path, options).await
	}

	/// `GET` through the shared cache.
	///
	/// A fresh entry for the same signature is returned without a network call; concurrent reads
	/// of one signature share a single call when `cache.dedupe` is set.
	pub async fn cached_get(
		&self,
		path: &str,
		options: RequestOptions,
		cache: CacheOptions,
	) -> Result<Arc<ApiResponse>> {
		let url = self.url(path);
		let signature = signature(&Method::GET, &url, &options.query);
		let client = self.clone();
		let fetch = move || async move {
			let mut request = OutgoingRequest::new(Method::GET, url);

			request.headers = options.headers;
			request.query = options.query;

			client.execute(request).await
		};

		self.inner.context.cache().get_or_fetch(&signature, cache, fetch).await
	}

	/// Drop every cached response in the shared context.
	pub fn invalidate_cache(&self) {
		self.inner.context.cache().invalidate_all();
	}

	async fn execute(&self, request: OutgoingRequest) -> Result<ApiResponse> {
		let (request, result) = self.dispatch(request).await;

		match result {
			Ok(response) => Ok(response),
			Err(err) => self.recover(request, err).await,
		}
	}

	/// Outgoing transform, transport, and logging for one attempt.
	async fn dispatch(
		&self,
		mut request: OutgoingRequest,
	) -> (OutgoingRequest, Result<ApiResponse>) {
		let debug = self.prepare(&mut request);
		let result = self.inner.transport.send(&request).await;

		if debug {
			match &result {
				Ok(response) => debug::log_response(self.label(), &request, response),
				Err(err) => debug::log_failure(self.label(), &request, err),
			}
		}

		(request, result)
	}

	/// Apply the outgoing transform; returns whether debug logging is on for this request.
	fn prepare(&self, request: &mut OutgoingRequest) -> bool {
		let storage = self.inner.context.storage();

		proxy::apply_bypass_header(
			&mut request.headers,
			&request.url,
			&self.inner.config.proxy_domains,
		);

		if let Some(default) = self.default_authorization() {
			request.headers.insert(AUTHORIZATION, default);
		}
		if let Some(token) = storage.access_token()
			&& let Some(value) = bearer(&token)
		{
			request.headers.insert(AUTHORIZATION, value);
		}
		if let Some(lang) = storage.locale()
			&& let Ok(value) = HeaderValue::from_str(&lang)
		{
			request.headers.insert(ACCEPT_LANGUAGE, value);
		}

		let debug = self.inner.gate.is_open(storage.as_ref());

		if debug {
			debug::log_request(self.label(), request);
		}

		debug
	}

	async fn recover(&self, mut request: OutgoingRequest, err: Error) -> Result<ApiResponse> {
		let refresh_url = self.inner.config.refresh_url.clone();
		let state = RecoveryState::classify(&err, &request, refresh_url.is_some());
		let Some(refresh_url) =
			refresh_url.filter(|_| state == RecoveryState::UnauthorizedFirstAttempt)
		else {
			tracing::debug!(
				label = %self.label(),
				method = %request.method,
				url = %request.url,
				?state,
				error = %err,
				"request failed"
			);

			return Err(err);
		};

		tracing::debug!(
			label = %self.label(),
			url = %request.url,
			state = ?RecoveryState::RefreshInFlight,
			"refreshing access token"
		);

		let exchange = RefreshExchange::new(self.inner.transport.clone(), refresh_url);

		match self.inner.context.refresh().refresh(exchange).await {
			Ok(token) => {
				let value = bearer(&token);

				request.retried = true;
				request.headers.remove(AUTHORIZATION);

				// An unusable token also drops the default so no stale credential is replayed.
				if let Ok(mut default) = self.inner.default_authorization.write() {
					default.clone_from(&value);
				}
				if let Some(value) = value {
					request.headers.insert(AUTHORIZATION, value);
				}

				tracing::debug!(
					label = %self.label(),
					url = %request.url,
					state = ?RecoveryState::UnauthorizedRetry,
					"retrying with refreshed token"
				);

				self.dispatch(request).await.1
			},
			Err(RefreshError::NoRefreshToken) => {
				tracing::debug!(
					label = %self.label(),
					url = %request.url,
					state = ?RecoveryState::NormalError,
					"no refresh token; surfacing 401"
				);

				Err(err)
			},
			Err(refresh_err) => {
				tracing::debug!(
					label = %self.label(),
					url = %request.url,
					state = ?RecoveryState::RefreshFailed,
					error = %refresh_err,
					"giving up after refresh failure"
				);

				Err(refresh_err.into())
			},
		}
	}
}

#[derive(Debug)]
struct ClientInner {
	config: ClientConfig,
	context: SharedContext,
	transport: Transport,
	gate: DebugGate,
	default_authorization: RwLock<Option<HeaderValue>>,
}

fn bearer(token: &str) -> Option<HeaderValue> {
	let mut value = HeaderValue::from_str(&format!("Bearer {token}")).ok()?;

	value.set_sensitive(true);

	Some(value)
}
