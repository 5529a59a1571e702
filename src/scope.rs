//! Ad hoc endpoints under a URL prefix.

// crates.io
use http::Method;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	cache::CacheOptions,
	http::pipeline::{ApiClient, RequestOptions},
	path,
};

/// Verb helpers for endpoints that are not plain collections.
///
/// Paths are joined like [`Resource`](crate::Resource) paths and bodies are unwrapped the same
/// way, but mutations never touch the cache; callers invalidate when they need to.
#[derive(Clone, Debug)]
pub struct Scope {
	client: ApiClient,
	prefix: String,
}
impl Scope {
	/// Mount a scope at `prefix` on `client`.
	pub fn new(client: ApiClient, prefix: &str) -> Self {
		Self { client, prefix: path::normalize_prefix(prefix) }
	}

	/// Scope prefix, always ending with a single `/`.
	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// Client the scope is mounted on.
	pub fn client(&self) -> &ApiClient {
		&self.client
	}

	/// Nested scope under `sub`.
	pub fn scope(&self, sub: &str) -> Self {
		Self::new(self.client.clone(), &path::join(&self.prefix, sub))
	}

	/// Uncached `GET`.
	pub async fn get<R>(&self, sub: &str, options: RequestOptions) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.call(Method::GET, sub, options).await
	}

	/// `GET` through the shared cache.
	pub async fn cached_get<R>(
		&self,
		sub: &str,
		options: RequestOptions,
		cache: CacheOptions,
	) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.client.cached_get(&path::join(&self.prefix, sub), options, cache).await?.json()
	}

	/// `POST`.
	pub async fn post<R>(&self, sub: &str, options: RequestOptions) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.call(Method::POST, sub, options).await
	}

	/// `PUT`.
	pub async fn put<R>(&self, sub: &str, options: RequestOptions) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.call(Method::PUT, sub, options).await
	}

	/// `PATCH`.
	pub async fn patch<R>(&self, sub: &str, options: RequestOptions) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.call(Method::PATCH, sub, options).await
	}

	/// `DELETE`.
	pub async fn delete<R>(&self, sub: &str, options: RequestOptions) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.call(Method::DELETE, sub, options).await
	}

	async fn call<R>(&self, method: Method, sub: &str, options: RequestOptions) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.client.request(method, &path::join(&self.prefix, sub), options).await?.into_json()
	}
}
