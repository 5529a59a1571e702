//! Network transport built on `reqwest`.

// crates.io
use http::{
	HeaderMap, HeaderValue, Method, StatusCode,
	header::{ACCEPT, CONTENT_TYPE},
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{_prelude::*, cache::Query};

/// A fully resolved request ready for the wire.
#[derive(Clone, Debug)]
pub struct OutgoingRequest {
	/// HTTP verb.
	pub method: Method,
	/// Absolute target address without the query string.
	pub url: String,
	/// Headers sent with the request.
	pub headers: HeaderMap,
	/// Query parameters appended to `url`.
	pub query: Query,
	/// JSON body, if any.
	pub body: Option<Value>,
	/// Set once the request has been re-issued after a token refresh.
	pub retried: bool,
	/// Marks the refresh-token exchange itself.
	pub is_refresh: bool,
}
impl OutgoingRequest {
	/// Create a request with no headers, parameters, or body.
	pub fn new(method: Method, url: impl Into<String>) -> Self {
		Self {
			method,
			url: url.into(),
			headers: HeaderMap::new(),
			query: Query::new(),
			body: None,
			retried: false,
			is_refresh: false,
		}
	}
}

/// Response with its body decoded as JSON.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// Status returned by the upstream.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Final address after redirects.
	pub url: String,
	/// Decoded body: `null` when empty, a JSON string when the payload is not JSON.
	pub body: Value,
}
impl ApiResponse {
	/// Build a response carrying only a status and body.
	pub fn from_json(status: StatusCode, body: Value) -> Self {
		Self { status, headers: HeaderMap::new(), url: String::new(), body }
	}

	/// Deserialize the body into `T`.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		Ok(serde_json::from_value(self.body.clone())?)
	}

	/// Consume the response and deserialize the body into `T`.
	pub fn into_json<T>(self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		Ok(serde_json::from_value(self.body)?)
	}
}

/// Performs network calls for one client.
#[derive(Clone, Debug)]
pub struct Transport {
	client: Client,
}
impl Transport {
	/// Build a transport with the given per-request timeout.
	pub fn new(timeout: Duration, user_agent: Option<&str>) -> Result<Self> {
		let user_agent = user_agent
			.map(ToOwned::to_owned)
			.unwrap_or_else(|| format!("lingua-api/{}", env!("CARGO_PKG_VERSION")));
		let client = Client::builder()
			.user_agent(user_agent)
			.timeout(timeout)
			.connect_timeout(timeout.min(Duration::from_secs(5)))
			.build()
			.map_err(|err| Error::Validation {
				field: "timeout",
				reason: format!("Failed to build HTTP client: {err}."),
			})?;

		Ok(Self { client })
	}

	/// Build a transport around an existing `reqwest` client (primarily for tests).
	pub fn with_client(client: Client) -> Self {
		Self { client }
	}

	/// Send `request` and decode the response.
	///
	/// Non-2xx answers become [`Error::HttpStatus`] carrying the decoded body; network failures
	/// become [`Error::Transport`].
	pub async fn send(&self, request: &OutgoingRequest) -> Result<ApiResponse> {
		let mut builder = self.client.request(request.method.clone(), &request.url);

		if !request.query.is_empty() {
			builder = builder.query(request.query.pairs());
		}
		for (name, value) in request.headers.iter() {
			builder = builder.header(name, value);
		}
		if let Some(body) = &request.body {
			if !request.headers.contains_key(CONTENT_TYPE) {
				builder =
					builder.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
			}

			builder = builder.body(serde_json::to_vec(body)?);
		}
		if !request.headers.contains_key(ACCEPT) {
			builder = builder.header(ACCEPT, HeaderValue::from_static("application/json"));
		}

		let start = Instant::now();
		let response = builder
			.send()
			.await
			.map_err(|err| Error::transport(&request.method, &request.url, err))?;
		let elapsed = start.elapsed();
		let status = response.status();
		let headers = response.headers().clone();
		let url = response.url().to_string();
		let bytes = response
			.bytes()
			.await
			.map_err(|err| Error::transport(&request.method, &request.url, err))?;
		let body = decode_body(&bytes);

		tracing::trace!(
			method = %request.method,
			url = %url,
			status = %status,
			?elapsed,
			"exchange complete"
		);

		if !status.is_success() {
			return Err(Error::HttpStatus { status, url, body });
		}

		Ok(ApiResponse { status, headers, url, body })
	}
}

fn decode_body(bytes: &[u8]) -> Value {
	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Value::Null;
	}

	serde_json::from_slice(bytes)
		.unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
