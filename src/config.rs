//! Client configuration and validation.

// crates.io
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::{_prelude::*, http::proxy};

/// Logging label applied when none is configured.
pub const DEFAULT_LABEL: &str = "api";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
/// Lower bound accepted for the per-request timeout.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(100);
/// Host suffixes of tunnelling proxies that serve an interstitial warning page.
pub const DEFAULT_PROXY_DOMAINS: &[&str] =
	&["ngrok-free.app", "ngrok-free.dev", "ngrok.app", "ngrok.io"];

/// Settings for a single [`ApiClient`](crate::ApiClient) instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Base address every relative request path is resolved against.
	pub base_url: Url,
	/// Timeout applied to every request issued by the client.
	#[serde(default = "default_timeout")]
	pub timeout: Duration,
	/// Token refresh endpoint; `None` disables retry-after-refresh.
	pub refresh_url: Option<Url>,
	/// Label attached to every log line the client emits.
	#[serde(default = "default_label")]
	pub label: String,
	/// Explicit debug logging override.
	///
	/// `None` defers to the build profile and the persisted developer toggle.
	#[serde(default)]
	pub debug: Option<bool>,
	/// Tunnelling-proxy host suffixes that receive the warning-bypass header.
	#[serde(
		default = "default_proxy_domains",
		deserialize_with = "crate::http::proxy::deserialize_domains"
	)]
	pub proxy_domains: Vec<String>,
	/// Optional `User-Agent` override.
	#[serde(default)]
	pub user_agent: Option<String>,
}
impl ClientConfig {
	/// Construct a configuration with the required settings and defaults for the rest.
	pub fn new(
		base_url: impl AsRef<str>,
		timeout: Duration,
		refresh_url: impl AsRef<str>,
	) -> Result<Self> {
		let base_url = Url::parse(base_url.as_ref())?;
		let refresh_url = Url::parse(refresh_url.as_ref())?;

		Ok(Self {
			base_url,
			timeout,
			refresh_url: Some(refresh_url),
			label: DEFAULT_LABEL.into(),
			debug: None,
			proxy_domains: default_proxy_domains(),
			user_agent: None,
		})
	}

	/// Set the logging label.
	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = label.into();

		self
	}

	/// Force debug logging on or off regardless of build profile and persisted toggle.
	pub fn with_debug(mut self, debug: bool) -> Self {
		self.debug = Some(debug);

		self
	}

	/// Replace the tunnelling-proxy host suffixes.
	pub fn with_proxy_domains<I, S>(mut self, domains: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.proxy_domains = proxy::normalize_domains(domains.into_iter().map(Into::into));

		self
	}

	/// Disable the retry-after-refresh path for this client.
	pub fn without_refresh(mut self) -> Self {
		self.refresh_url = None;

		self
	}

	/// Validate the configuration against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if self.base_url.cannot_be_a_base() {
			return Err(Error::Validation {
				field: "base_url",
				reason: "Must be usable as a base for relative paths.".into(),
			});
		}
		if !matches!(self.base_url.scheme(), "http" | "https") {
			return Err(Error::Validation {
				field: "base_url",
				reason: "Must use the http or https scheme.".into(),
			});
		}
		if self.timeout < MIN_TIMEOUT {
			return Err(Error::Validation {
				field: "timeout",
				reason: format!("Must be at least {MIN_TIMEOUT:?}."),
			});
		}
		if let Some(refresh_url) = &self.refresh_url
			&& !matches!(refresh_url.scheme(), "http" | "https")
		{
			return Err(Error::Validation {
				field: "refresh_url",
				reason: "Must use the http or https scheme.".into(),
			});
		}
		if self.label.trim().is_empty() {
			return Err(Error::Validation { field: "label", reason: "Must not be empty.".into() });
		}

		Ok(())
	}
}

fn default_timeout() -> Duration {
	DEFAULT_TIMEOUT
}

fn default_label() -> String {
	DEFAULT_LABEL.into()
}

fn default_proxy_domains() -> Vec<String> {
	DEFAULT_PROXY_DOMAINS.iter().map(|domain| (*domain).to_owned()).collect()
}
