//! Typed CRUD operations for a REST collection.

// std
use std::{fmt::Display, marker::PhantomData};
// crates.io
use http::Method;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	cache::{CacheOptions, Query},
	http::pipeline::{ApiClient, RequestOptions},
	model::ListPage,
	path,
};

/// Uniform list/get/create/update/patch/remove for a collection mounted at a prefix.
///
/// Reads go through the shared cache. Every mutation wipes the whole cache once it settles,
/// whether it succeeded, failed, or was cancelled, so no read after a write can observe
/// pre-write data.
#[derive(Debug)]
pub struct Resource<T> {
	client: ApiClient,
	prefix: String,
	_record: PhantomData<fn() -> T>,
}
impl<T> Clone for Resource<T> {
	fn clone(&self) -> Self {
		Self { client: self.client.clone(), prefix: self.prefix.clone(), _record: PhantomData }
	}
}
impl<T> Resource<T>
where
	T: DeserializeOwned,
{
	/// Mount a collection at `prefix` on `client`.
	pub fn new(client: ApiClient, prefix: &str) -> Self {
		Self { client, prefix: path::normalize_prefix(prefix), _record: PhantomData }
	}

	/// Collection prefix, always ending with a single `/`.
	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// Client the collection is mounted on.
	pub fn client(&self) -> &ApiClient {
		&self.client
	}

	/// Cached listing of the collection.
	pub async fn list(&self, query: Query, cache: CacheOptions) -> Result<ListPage<T>> {
		let response =
			self.client.cached_get(&self.prefix, RequestOptions::new().query(query), cache).await?;

		response.json()
	}

	/// Cached read of one record.
	pub async fn get(&self, id: impl Display, cache: CacheOptions) -> Result<T> {
		let response = self
			.client
			.cached_get(&path::member(&self.prefix, id), RequestOptions::new(), cache)
			.await?;

		response.json()
	}

	/// Create a record.
	pub async fn create<P>(&self, payload: &P, options: RequestOptions) -> Result<T>
	where
		P: ?Sized + Serialize,
	{
		self.mutate(Method::POST, self.prefix.clone(), Some(payload), options).await?.into_json()
	}

	/// Replace a record.
	pub async fn update<P>(
		&self,
		id: impl Display,
		payload: &P,
		options: RequestOptions,
	) -> Result<T>
	where
		P: ?Sized + Serialize,
	{
		self.mutate(Method::PUT, path::member(&self.prefix, id), Some(payload), options)
			.await?
			.into_json()
	}

	/// Partially update a record.
	pub async fn patch<P>(
		&self,
		id: impl Display,
		payload: &P,
		options: RequestOptions,
	) -> Result<T>
	where
		P: ?Sized + Serialize,
	{
		self.mutate(Method::PATCH, path::member(&self.prefix, id), Some(payload), options)
			.await?
			.into_json()
	}

	/// Delete a record, returning whatever body the backend sent (usually `null`).
	pub async fn remove(&self, id: impl Display, options: RequestOptions) -> Result<Value> {
		let response = self
			.mutate::<Value>(Method::DELETE, path::member(&self.prefix, id), None, options)
			.await?;

		Ok(response.body)
	}

	async fn mutate<P>(
		&self,
		method: Method,
		path: String,
		payload: Option<&P>,
		mut options: RequestOptions,
	) -> Result<crate::ApiResponse>
	where
		P: ?Sized + Serialize,
	{
		let _settled = InvalidateOnDrop(&self.client);

		if let Some(payload) = payload {
			options.body = Some(serde_json::to_value(payload)?);
		}

		self.client.request(method, &path, options).await
	}
}

/// Wipes the cache when a mutation settles, including when its future is dropped mid-flight.
struct InvalidateOnDrop<'a>(&'a ApiClient);
impl Drop for InvalidateOnDrop<'_> {
	fn drop(&mut self) {
		self.0.invalidate_cache();
	}
}
