//! Separator-idempotent path joining.

// crates.io
use url::Url;

/// Normalise `prefix` so it ends with exactly one `/`.
pub fn normalize_prefix(prefix: &str) -> String {
	let trimmed = prefix.trim_end_matches('/');

	format!("{trimmed}/")
}

/// Join `sub` under `prefix`; leading separators of `sub` are stripped.
pub fn join(prefix: &str, sub: &str) -> String {
	let mut joined = normalize_prefix(prefix);

	joined.push_str(sub.trim_start_matches('/'));

	joined
}

/// Path of a single record: `{prefix}{id}/`.
pub fn member(prefix: &str, id: impl std::fmt::Display) -> String {
	join(prefix, &format!("{id}/"))
}

/// Resolve `path` against `base`; absolute `http(s)` addresses pass through unchanged.
pub fn resolve(base: &Url, path: &str) -> String {
	if let Ok(url) = Url::parse(path)
		&& matches!(url.scheme(), "http" | "https")
	{
		return url.into();
	}

	join(base.as_str(), path)
}
