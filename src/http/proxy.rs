//! Tunnelling-proxy detection.
//!
//! Development backends are often exposed through tunnelling proxies that answer browser-like
//! clients with an interstitial warning page. Requests bound for such hosts carry a header that
//! tells the proxy to skip it.

// std
use std::collections::HashSet;
// crates.io
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, de::Deserializer};
use url::Url;

/// Header instructing the tunnelling proxy to skip its warning page.
pub const SKIP_WARNING_HEADER: HeaderName = HeaderName::from_static("ngrok-skip-browser-warning");

/// Canonicalise a DNS name by trimming whitespace, removing any trailing dot, and lowercasing.
pub fn canonicalize_dns_name(value: &str) -> Option<String> {
	let trimmed = value.trim();

	if trimmed.is_empty() {
		return None;
	}

	let without_trailing_dot = trimmed.trim_end_matches('.');

	if without_trailing_dot.is_empty() {
		return None;
	}

	Some(without_trailing_dot.to_ascii_lowercase())
}

/// Canonicalise domain suffixes and drop duplicates/empties.
pub fn normalize_domains<I>(domains: I) -> Vec<String>
where
	I: IntoIterator<Item = String>,
{
	let mut seen = HashSet::new();
	let mut normalized = Vec::new();

	for domain in domains {
		if let Some(canonical) = canonicalize_dns_name(&domain)
			&& seen.insert(canonical.clone())
		{
			normalized.push(canonical);
		}
	}

	normalized
}

/// `serde` helper to normalise proxy domains during deserialisation.
pub fn deserialize_domains<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Vec::<String>::deserialize(deserializer)?;

	Ok(normalize_domains(raw))
}

#[inline]
fn matches_suffix(host: &str, domain: &str) -> bool {
	if host == domain {
		return true;
	}

	host.strip_suffix(domain).and_then(|prefix| prefix.strip_suffix('.')).is_some()
}

/// Whether `host` is one of `domains` or a subdomain of one.
pub fn host_matches(host: &str, domains: &[String]) -> bool {
	let Some(host) = canonicalize_dns_name(host) else {
		return false;
	};

	domains.iter().any(|domain| matches_suffix(&host, domain))
}

/// Whether the absolute request target is served through a known tunnelling proxy.
///
/// A target that does not parse or has no host is never a proxy host.
pub fn is_proxy_target(target: &str, domains: &[String]) -> bool {
	Url::parse(target)
		.ok()
		.and_then(|url| url.host_str().map(|host| host_matches(host, domains)))
		.unwrap_or(false)
}

/// Add the warning-bypass header when `target` points at a tunnelling proxy.
pub fn apply_bypass_header(headers: &mut HeaderMap, target: &str, domains: &[String]) -> bool {
	if !is_proxy_target(target, domains) {
		return false;
	}

	headers.insert(SKIP_WARNING_HEADER, HeaderValue::from_static("true"));

	true
}
