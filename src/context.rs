//! State shared by every client of one process.

// self
use crate::{
	_prelude::*,
	auth::RefreshCoordinator,
	cache::CacheStore,
	config::ClientConfig,
	http::pipeline::ApiClient,
	metrics::ClientMetrics,
	storage::{MemoryStorage, Storage},
};

/// Cache store, refresh coordinator, storage, and metrics shared across clients.
///
/// Clients pointed at different backends but built from the same context share one
/// outstanding-refresh guarantee and one response cache. Tests build isolated contexts.
#[derive(Clone, Debug)]
pub struct SharedContext {
	storage: Arc<dyn Storage>,
	cache: Arc<CacheStore>,
	refresh: Arc<RefreshCoordinator>,
	metrics: Arc<ClientMetrics>,
}
impl SharedContext {
	/// Build a context persisting credentials into `storage`.
	pub fn new(storage: Arc<dyn Storage>) -> Self {
		let metrics = ClientMetrics::new();
		let cache = CacheStore::new(metrics.clone());
		let refresh = RefreshCoordinator::new(storage.clone(), metrics.clone());

		Self { storage, cache, refresh, metrics }
	}

	/// Build a context backed by in-process storage.
	pub fn in_memory() -> Self {
		Self::new(Arc::new(MemoryStorage::new()))
	}

	/// Build a client sharing this context.
	pub fn client(&self, config: ClientConfig) -> Result<ApiClient> {
		ApiClient::new(config, self.clone())
	}

	/// Persisted key/value storage.
	pub fn storage(&self) -> &Arc<dyn Storage> {
		&self.storage
	}

	/// Shared response cache.
	pub fn cache(&self) -> &Arc<CacheStore> {
		&self.cache
	}

	/// Shared refresh coordinator.
	pub fn refresh(&self) -> &Arc<RefreshCoordinator> {
		&self.refresh
	}

	/// Shared counters.
	pub fn metrics(&self) -> &Arc<ClientMetrics> {
		&self.metrics
	}
}
impl Default for SharedContext {
	fn default() -> Self {
		Self::in_memory()
	}
}
