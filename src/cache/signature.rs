//! Deterministic request signatures used as cache and in-flight keys.

// crates.io
use http::Method;
use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;
// self
use crate::_prelude::*;

/// Ordered list of query parameters.
///
/// Insertion order is kept for the wire; [`signature`] sorts it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
	pairs: Vec<(String, String)>,
}
impl Query {
	/// Create an empty parameter list.
	pub fn new() -> Self {
		Self::default()
	}

	/// Append a parameter.
	pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
		self.pairs.push((key.into(), value.to_string()));
	}

	/// Append a parameter, builder style.
	pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.push(key, value);

		self
	}

	/// Flatten any serialisable object into parameters.
	///
	/// Strings are taken verbatim, `null` fields are skipped, arrays become repeated keys and
	/// other values use their JSON text.
	pub fn from_serialize<T>(params: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let value = serde_json::to_value(params)?;
		let Value::Object(map) = value else {
			return Err(Error::Validation {
				field: "params",
				reason: "Query parameters must serialize to an object.".into(),
			});
		};
		let mut query = Self::new();

		for (key, value) in map {
			match value {
				Value::Null => {},
				Value::Array(items) =>
					for item in items {
						if let Some(rendered) = render(item) {
							query.push(key.clone(), rendered);
						}
					},
				other =>
					if let Some(rendered) = render(other) {
						query.push(key, rendered);
					},
			}
		}

		Ok(query)
	}

	/// Parameters in insertion order.
	pub fn pairs(&self) -> &[(String, String)] {
		&self.pairs
	}

	/// Whether no parameters are present.
	pub fn is_empty(&self) -> bool {
		self.pairs.is_empty()
	}

	/// Parameters sorted by key, then value.
	pub fn sorted(&self) -> Vec<(&str, &str)> {
		let mut sorted: Vec<_> = self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

		sorted.sort_unstable();

		sorted
	}
}
impl<K, V> FromIterator<(K, V)> for Query
where
	K: Into<String>,
	V: ToString,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
	{
		let mut query = Self::new();

		for (key, value) in iter {
			query.push(key, value);
		}

		query
	}
}

/// Compute the signature of a read: `METHOD url?sorted-query`.
pub fn signature(method: &Method, url: &str, query: &Query) -> String {
	if query.is_empty() {
		return format!("{method} {url}");
	}

	let mut encoded = form_urlencoded::Serializer::new(String::new());

	for (key, value) in query.sorted() {
		encoded.append_pair(key, value);
	}

	format!("{method} {url}?{}", encoded.finish())
}

fn render(value: Value) -> Option<String> {
	match value {
		Value::Null => None,
		Value::String(s) => Some(s),
		other => Some(other.to_string()),
	}
}
