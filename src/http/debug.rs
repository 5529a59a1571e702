//! Developer-facing request and response logging.

// crates.io
use http::{HeaderMap, header::AUTHORIZATION};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	http::transport::{ApiResponse, OutgoingRequest},
	storage::Storage,
};

/// Decides whether verbose request logging is on.
///
/// Logging is on in debug builds, when the client override enables it, or when the persisted
/// developer toggle is set. An override of `false` silences it unconditionally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebugGate {
	override_flag: Option<bool>,
	development: bool,
}
impl DebugGate {
	/// Gate for the current build profile.
	pub fn new(override_flag: Option<bool>) -> Self {
		Self { override_flag, development: cfg!(debug_assertions) }
	}

	/// Evaluate the gate against the persisted toggle.
	pub fn is_open(&self, storage: &dyn Storage) -> bool {
		match self.override_flag {
			Some(flag) => flag,
			None => self.development || storage.debug_enabled(),
		}
	}
}

/// Log an outgoing request.
pub fn log_request(label: &str, request: &OutgoingRequest) {
	let span =
		tracing::debug_span!("api_request", label, method = %request.method, url = %request.url);
	let _entered = span.enter();

	tracing::debug!(
		headers = ?redacted(&request.headers),
		query = ?request.query.pairs(),
		body = %render_body(request.body.as_ref()),
		retried = request.retried,
		"request"
	);
}

/// Log a successful response.
pub fn log_response(label: &str, request: &OutgoingRequest, response: &ApiResponse) {
	let span =
		tracing::debug_span!("api_response", label, method = %request.method, url = %response.url);
	let _entered = span.enter();

	tracing::debug!(status = %response.status, body = %response.body, "response");
}

/// Log a failed exchange.
pub fn log_failure(label: &str, request: &OutgoingRequest, error: &Error) {
	let span =
		tracing::debug_span!("api_error", label, method = %request.method, url = %request.url);
	let _entered = span.enter();

	match error {
		Error::HttpStatus { status, body, .. } =>
			tracing::debug!(status = %status, body = %body, "error response"),
		other => tracing::debug!(error = %other, "request failed"),
	}
}

fn render_body(body: Option<&Value>) -> String {
	body.map(Value::to_string).unwrap_or_default()
}

/// Header view safe for logs: bearer credentials are masked.
pub fn redacted(headers: &HeaderMap) -> Vec<(String, String)> {
	headers
		.iter()
		.map(|(name, value)| {
			let rendered = if *name == AUTHORIZATION {
				"Bearer ***".to_owned()
			} else {
				value.to_str().unwrap_or("<binary>").to_owned()
			};

			(name.as_str().to_owned(), rendered)
		})
		.collect()
}
