//! Cached response entries.

// self
use crate::{_prelude::*, http::transport::ApiResponse};

/// A cached response and its absolute expiry.
#[derive(Clone, Debug)]
pub struct CacheEntry {
	/// Response captured for the signature.
	pub response: Arc<ApiResponse>,
	/// Monotonic deadline; the entry is valid strictly before it.
	pub expires_at: Instant,
	/// Wall-clock time the entry was stored, for diagnostics.
	pub stored_at: DateTime<Utc>,
}
impl CacheEntry {
	/// Create an entry that stays valid for `ttl` from `now`.
	pub fn new(response: Arc<ApiResponse>, now: Instant, ttl: Duration) -> Self {
		Self { response, expires_at: now + ttl, stored_at: Utc::now() }
	}

	/// Whether the entry has reached its expiry.
	pub fn is_expired(&self, now: Instant) -> bool {
		now >= self.expires_at
	}

	/// Time left before expiry.
	pub fn remaining(&self, now: Instant) -> Duration {
		self.expires_at.saturating_duration_since(now)
	}
}
