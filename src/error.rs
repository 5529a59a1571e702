//! Crate-wide error types and `Result` alias.

// self
use crate::_prelude::*;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the API client core.
///
/// The type is `Clone` so a single failure can be handed to every caller awaiting a shared
/// in-flight request; sources that are not `Clone` are wrapped in [`Arc`].
#[allow(missing_docs)]
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(Arc<std::io::Error>),
	#[error(transparent)]
	Serde(Arc<serde_json::Error>),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error("Transport failure for {method} {url}: {source}")]
	Transport { method: http::Method, url: String, source: Arc<reqwest::Error> },
	#[error("Upstream HTTP status {status} from {url}: {body}")]
	HttpStatus { status: http::StatusCode, url: String, body: serde_json::Value },
	#[error(transparent)]
	Refresh(#[from] RefreshError),
	#[error("Metrics error: {0}")]
	Metrics(String),
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
impl Error {
	/// HTTP status carried by the error, if the upstream answered at all.
	pub fn status(&self) -> Option<http::StatusCode> {
		match self {
			Self::HttpStatus { status, .. } => Some(*status),
			_ => None,
		}
	}

	/// Whether the error is an HTTP 401 response.
	pub fn is_unauthorized(&self) -> bool {
		self.status() == Some(http::StatusCode::UNAUTHORIZED)
	}

	pub(crate) fn transport(method: &http::Method, url: &str, source: reqwest::Error) -> Self {
		Self::Transport { method: method.clone(), url: url.to_owned(), source: Arc::new(source) }
	}
}
impl From<std::io::Error> for Error {
	fn from(value: std::io::Error) -> Self {
		Self::Io(Arc::new(value))
	}
}
impl From<serde_json::Error> for Error {
	fn from(value: serde_json::Error) -> Self {
		Self::Serde(Arc::new(value))
	}
}
#[cfg(feature = "prometheus")]
impl From<metrics_exporter_prometheus::BuildError> for Error {
	fn from(value: metrics_exporter_prometheus::BuildError) -> Self {
		Self::Metrics(value.to_string())
	}
}

/// Failures of the refresh-token exchange.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
	/// No refresh token is persisted; nothing was sent upstream.
	#[error("No refresh token is available.")]
	NoRefreshToken,
	/// The exchange failed on the network or returned no usable access token.
	#[error("Token refresh failed: {0}")]
	RefreshFailed(String),
}
