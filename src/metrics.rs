//! Metrics helpers and per-context telemetry bookkeeping.
//!
//! Counters are always tracked in-process; the `metrics` feature additionally emits them through
//! the `metrics` facade and `prometheus` installs an exporter.

// std
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "prometheus")] use std::sync::OnceLock;
// crates.io
#[cfg(feature = "metrics")] use ::metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
#[cfg(feature = "metrics")] use smallvec::SmallVec;
// self
use crate::_prelude::*;

#[cfg(feature = "metrics")]
type LabelSet = SmallVec<[Label; 2]>;

#[cfg(feature = "metrics")]
const METRIC_CACHE_HITS_TOTAL: &str = "lingua_api_cache_hits_total";
#[cfg(feature = "metrics")]
const METRIC_CACHE_MISSES_TOTAL: &str = "lingua_api_cache_misses_total";
#[cfg(feature = "metrics")]
const METRIC_INFLIGHT_JOINS_TOTAL: &str = "lingua_api_inflight_joins_total";
#[cfg(feature = "metrics")]
const METRIC_REFRESH_TOTAL: &str = "lingua_api_refresh_total";
#[cfg(feature = "metrics")]
const METRIC_REFRESH_DURATION: &str = "lingua_api_refresh_duration_seconds";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Thread-safe counters shared by every client built from one context.
#[derive(Debug, Default)]
pub struct ClientMetrics {
	cache_hits: AtomicU64,
	cache_misses: AtomicU64,
	inflight_joins: AtomicU64,
	refresh_successes: AtomicU64,
	refresh_errors: AtomicU64,
	last_refresh_micros: AtomicU64,
}
impl ClientMetrics {
	/// Create a new metrics accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record a read served from the cache.
	pub fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);

		emit_counter(CounterKind::CacheHit, None);
	}

	/// Record a read that went to the network.
	pub fn record_cache_miss(&self) {
		self.cache_misses.fetch_add(1, Ordering::Relaxed);

		emit_counter(CounterKind::CacheMiss, None);
	}

	/// Record a read that joined an outstanding request.
	pub fn record_inflight_join(&self) {
		self.inflight_joins.fetch_add(1, Ordering::Relaxed);

		emit_counter(CounterKind::InflightJoin, None);
	}

	/// Record a successful token refresh and its latency.
	pub fn record_refresh_success(&self, duration: Duration) {
		self.refresh_successes.fetch_add(1, Ordering::Relaxed);
		self.last_refresh_micros.store(duration.as_micros() as u64, Ordering::Relaxed);

		emit_counter(CounterKind::Refresh, Some("success"));
		emit_refresh_duration(duration);
	}

	/// Record a failed token refresh.
	pub fn record_refresh_error(&self) {
		self.refresh_errors.fetch_add(1, Ordering::Relaxed);

		emit_counter(CounterKind::Refresh, Some("error"));
	}

	/// Take a point-in-time snapshot.
	pub fn snapshot(&self) -> ClientMetricsSnapshot {
		ClientMetricsSnapshot {
			cache_hits: self.cache_hits.load(Ordering::Relaxed),
			cache_misses: self.cache_misses.load(Ordering::Relaxed),
			inflight_joins: self.inflight_joins.load(Ordering::Relaxed),
			refresh_successes: self.refresh_successes.load(Ordering::Relaxed),
			refresh_errors: self.refresh_errors.load(Ordering::Relaxed),
			last_refresh_micros: match self.last_refresh_micros.load(Ordering::Relaxed) {
				0 => None,
				value => Some(value),
			},
		}
	}
}

/// Read-only snapshot of the context counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientMetricsSnapshot {
	/// Reads answered from a fresh cache entry.
	pub cache_hits: u64,
	/// Reads that issued a transport call.
	pub cache_misses: u64,
	/// Reads that awaited an already outstanding call.
	pub inflight_joins: u64,
	/// Completed refresh exchanges.
	pub refresh_successes: u64,
	/// Failed refresh exchanges.
	pub refresh_errors: u64,
	/// Microsecond latency of the most recent successful refresh.
	pub last_refresh_micros: Option<u64>,
}
impl ClientMetricsSnapshot {
	/// Share of cached reads that avoided the network.
	pub fn hit_rate(&self) -> f64 {
		let total = self.cache_hits + self.cache_misses + self.inflight_joins;

		if total == 0 { 0.0 } else { (self.cache_hits + self.inflight_joins) as f64 / total as f64 }
	}
}

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new().install_recorder()?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Install the default exporter; without the `prometheus` feature this only reports the gap.
#[cfg(not(feature = "prometheus"))]
pub fn install_default_exporter() -> Result<()> {
	Err(Error::Metrics("Built without the `prometheus` feature.".into()))
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

#[derive(Clone, Copy, Debug)]
enum CounterKind {
	CacheHit,
	CacheMiss,
	InflightJoin,
	Refresh,
}

#[cfg(feature = "metrics")]
fn emit_counter(kind: CounterKind, status: Option<&'static str>) {
	let name = match kind {
		CounterKind::CacheHit => METRIC_CACHE_HITS_TOTAL,
		CounterKind::CacheMiss => METRIC_CACHE_MISSES_TOTAL,
		CounterKind::InflightJoin => METRIC_INFLIGHT_JOINS_TOTAL,
		CounterKind::Refresh => METRIC_REFRESH_TOTAL,
	};
	let mut labels = LabelSet::new();

	if let Some(status) = status {
		labels.push(Label::new("status", status));
	}

	::metrics::counter!(name, labels.iter()).increment(1);
}

#[cfg(not(feature = "metrics"))]
fn emit_counter(_kind: CounterKind, _status: Option<&'static str>) {}

#[cfg(feature = "metrics")]
fn emit_refresh_duration(duration: Duration) {
	::metrics::histogram!(METRIC_REFRESH_DURATION).record(duration.as_secs_f64());
}

#[cfg(not(feature = "metrics"))]
fn emit_refresh_duration(_duration: Duration) {}
