//! Process-wide cache store and in-flight table.

// std
use std::{
	collections::HashMap,
	future::Future,
	sync::{Mutex, MutexGuard},
};
// crates.io
use futures::{
	FutureExt,
	future::{BoxFuture, Shared, WeakShared},
};
// self
use crate::{
	_prelude::*,
	cache::entry::CacheEntry,
	http::transport::ApiResponse,
	metrics::ClientMetrics,
};

/// Default lifetime of a cached read.
pub const DEFAULT_TTL: Duration = Duration::from_millis(5_000);

type FetchFuture = BoxFuture<'static, Result<Arc<ApiResponse>>>;

/// Per-call caching behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheOptions {
	/// Lifetime of the stored response; zero disables storing.
	pub ttl: Duration,
	/// Whether concurrent identical reads share one transport call.
	pub dedupe: bool,
}
impl CacheOptions {
	/// Options with the given lifetime and deduplication on.
	pub fn ttl(ttl: Duration) -> Self {
		Self { ttl, ..Self::default() }
	}

	/// Options that neither store nor read cached responses for longer than the call.
	pub fn no_store() -> Self {
		Self::ttl(Duration::ZERO)
	}

	/// Toggle in-flight deduplication.
	pub fn with_dedupe(mut self, dedupe: bool) -> Self {
		self.dedupe = dedupe;

		self
	}
}
impl Default for CacheOptions {
	fn default() -> Self {
		Self { ttl: DEFAULT_TTL, dedupe: true }
	}
}

/// Counts captured for diagnostics.
#[derive(Clone, Debug)]
pub struct CacheSnapshot {
	/// Wall-clock time of capture.
	pub captured_at: DateTime<Utc>,
	/// Entries that are still fresh.
	pub fresh_entries: usize,
	/// Entries past expiry that have not been overwritten yet.
	pub expired_entries: usize,
	/// Reads currently outstanding.
	pub in_flight: usize,
}

/// Response cache keyed by request signature, plus the table of outstanding reads.
///
/// Expired entries are never swept; they are detected lazily on lookup and overwritten by the
/// next successful fetch.
#[derive(Debug)]
pub struct CacheStore {
	state: Mutex<StoreState>,
	metrics: Arc<ClientMetrics>,
}
impl CacheStore {
	/// Create an empty store reporting into `metrics`.
	pub fn new(metrics: Arc<ClientMetrics>) -> Arc<Self> {
		Arc::new(Self { state: Mutex::new(StoreState::default()), metrics })
	}

	/// Return the cached response for `signature`, joining or issuing `fetch` as needed.
	///
	/// A fresh entry is returned without calling `fetch`. With deduplication on, a caller that
	/// finds an outstanding read for the same signature awaits that read's outcome instead of
	/// issuing its own. The in-flight registration is always removed before the outcome is
	/// delivered. The table only holds a weak handle: once every waiter has been dropped the
	/// read is cancelled and the next caller issues a fresh one.
	pub async fn get_or_fetch<F, Fut>(
		self: &Arc<Self>,
		signature: &str,
		options: CacheOptions,
		fetch: F,
	) -> Result<Arc<ApiResponse>>
	where
		F: FnOnce() -> Fut,
		Fut: 'static + Send + Future<Output = Result<ApiResponse>>,
	{
		let pending = {
			let mut state = self.lock();
			let now = Instant::now();

			if let Some(entry) = state.entries.get(signature)
				&& !entry.is_expired(now)
			{
				self.metrics.record_cache_hit();

				tracing::trace!(signature, remaining = ?entry.remaining(now), "cache hit");

				return Ok(entry.response.clone());
			}

			if options.dedupe
				&& let Some(joined) = state.in_flight.get(signature).and_then(InFlight::upgrade)
			{
				self.metrics.record_inflight_join();

				tracing::trace!(signature, "joining in-flight read");

				joined
			} else {
				self.metrics.record_cache_miss();

				let epoch = state.epoch;
				let id = state.next_id();
				let store = Arc::clone(self);
				let key = signature.to_owned();
				let fetch = fetch();
				let future = async move {
					let result = fetch.await.map(Arc::new);

					store.settle(&key, id, epoch, options.ttl, &result);

					result
				}
				.boxed()
				.shared();

				if options.dedupe
					&& let Some(future) = future.downgrade()
				{
					state.in_flight.insert(signature.to_owned(), InFlight { id, future });
				}

				future
			}
		};

		pending.await
	}

	/// Drop every cached response.
	///
	/// Reads already outstanding keep running for their current waiters, but their responses
	/// are not stored and later reads no longer join them.
	pub fn invalidate_all(&self) {
		let mut state = self.lock();
		let cleared = state.entries.len();

		state.entries.clear();
		state.in_flight.clear();
		state.epoch = state.epoch.wrapping_add(1);

		tracing::debug!(cleared, "cache invalidated");
	}

	/// Drop the cached response for one signature.
	pub fn invalidate(&self, signature: &str) -> bool {
		self.lock().entries.remove(signature).is_some()
	}

	/// Fresh cached response for `signature`, without touching the network.
	pub fn peek(&self, signature: &str) -> Option<Arc<ApiResponse>> {
		let state = self.lock();
		let now = Instant::now();

		state
			.entries
			.get(signature)
			.filter(|entry| !entry.is_expired(now))
			.map(|entry| entry.response.clone())
	}

	/// Number of stored entries, fresh or expired.
	pub fn len(&self) -> usize {
		self.lock().entries.len()
	}

	/// Whether no entries are stored.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Number of reads currently outstanding.
	pub fn in_flight(&self) -> usize {
		self.lock().live_in_flight()
	}

	/// Capture entry and in-flight counts.
	pub fn snapshot(&self) -> CacheSnapshot {
		let state = self.lock();
		let now = Instant::now();
		let fresh_entries = state.entries.values().filter(|entry| !entry.is_expired(now)).count();

		CacheSnapshot {
			captured_at: Utc::now(),
			fresh_entries,
			expired_entries: state.entries.len() - fresh_entries,
			in_flight: state.live_in_flight(),
		}
	}

	fn settle(
		&self,
		key: &str,
		id: u64,
		epoch: u64,
		ttl: Duration,
		result: &Result<Arc<ApiResponse>>,
	) {
		let mut state = self.lock();

		if state.in_flight.get(key).is_some_and(|in_flight| in_flight.id == id) {
			state.in_flight.remove(key);
		}

		match result {
			Ok(response) if !ttl.is_zero() && state.epoch == epoch => {
				state
					.entries
					.insert(key.to_owned(), CacheEntry::new(response.clone(), Instant::now(), ttl));
			},
			Ok(_) => {},
			Err(err) => {
				tracing::trace!(signature = key, error = %err, "read failed; nothing cached")
			},
		}
	}

	fn lock(&self) -> MutexGuard<'_, StoreState> {
		self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

#[derive(Debug, Default)]
struct StoreState {
	entries: HashMap<String, CacheEntry>,
	in_flight: HashMap<String, InFlight>,
	epoch: u64,
	next_id: u64,
}
impl StoreState {
	fn next_id(&mut self) -> u64 {
		self.next_id = self.next_id.wrapping_add(1);

		self.next_id
	}

	fn live_in_flight(&self) -> usize {
		self.in_flight.values().filter(|in_flight| in_flight.upgrade().is_some()).count()
	}
}

struct InFlight {
	id: u64,
	future: WeakShared<FetchFuture>,
}
impl InFlight {
	fn upgrade(&self) -> Option<Shared<FetchFuture>> {
		self.future.upgrade()
	}
}
impl std::fmt::Debug for InFlight {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InFlight").field("id", &self.id).finish_non_exhaustive()
	}
}
