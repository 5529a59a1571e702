//! Single-flight access-token refresh.
//!
//! Every client built from one [`SharedContext`](crate::SharedContext) shares a single
//! coordinator, so any number of concurrent 401s trigger at most one refresh exchange against the
//! authentication backend. Joiners await the same shared outcome.

// std
use std::sync::{Mutex, MutexGuard};
// crates.io
use futures::{
	FutureExt,
	future::{BoxFuture, Shared},
};
use http::{HeaderValue, Method, header::CONTENT_TYPE};
use serde::Deserialize;
use url::Url;
// self
use crate::{
	_prelude::*,
	error::RefreshError,
	http::{
		proxy::SKIP_WARNING_HEADER,
		transport::{OutgoingRequest, Transport},
	},
	metrics::ClientMetrics,
	storage::Storage,
};

type RefreshResult<T> = std::result::Result<T, RefreshError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshResult<String>>>;

/// Everything needed to run one refresh exchange.
#[derive(Clone, Debug)]
pub struct RefreshExchange {
	/// Transport of the client that hit the 401.
	pub transport: Transport,
	/// Refresh endpoint.
	pub url: Url,
}
impl RefreshExchange {
	/// Create an exchange against `url`.
	pub fn new(transport: Transport, url: Url) -> Self {
		Self { transport, url }
	}

	/// Trade `refresh_token` for a new access token and, if rotated, a new refresh token.
	async fn run(&self, refresh_token: &str) -> RefreshResult<Tokens> {
		let mut request = OutgoingRequest::new(Method::POST, self.url.as_str());

		request.is_refresh = true;
		request.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		request.headers.insert(SKIP_WARNING_HEADER, HeaderValue::from_static("true"));
		request.body = Some(serde_json::json!({ "refresh": refresh_token }));

		let response = self
			.transport
			.send(&request)
			.await
			.map_err(|err| RefreshError::RefreshFailed(err.to_string()))?;
		let body: RefreshResponse = response.into_json().map_err(|err| {
			RefreshError::RefreshFailed(format!("Malformed refresh response: {err}."))
		})?;
		let access = body.access.filter(|access| !access.is_empty()).ok_or_else(|| {
			RefreshError::RefreshFailed("Refresh response carried no access token.".into())
		})?;

		Ok(Tokens { access, refresh: body.refresh.filter(|refresh| !refresh.is_empty()) })
	}
}

/// Process-wide guard allowing at most one outstanding refresh exchange.
#[derive(Debug)]
pub struct RefreshCoordinator {
	storage: Arc<dyn Storage>,
	metrics: Arc<ClientMetrics>,
	pending: Mutex<PendingSlot>,
}
impl RefreshCoordinator {
	/// Create a coordinator persisting tokens into `storage`.
	pub fn new(storage: Arc<dyn Storage>, metrics: Arc<ClientMetrics>) -> Arc<Self> {
		Arc::new(Self { storage, metrics, pending: Mutex::new(PendingSlot::default()) })
	}

	/// Whether a refresh exchange is currently outstanding.
	pub fn is_pending(&self) -> bool {
		self.lock().current.is_some()
	}

	/// Obtain a fresh access token, joining an outstanding exchange when there is one.
	///
	/// Without a persisted refresh token this fails with [`RefreshError::NoRefreshToken`] before
	/// any network call and leaves storage untouched. A failed exchange erases the persisted
	/// credentials once, on behalf of every waiter. The pending handle is cleared when the
	/// exchange settles, whatever its outcome.
	#[tracing::instrument(skip(self, exchange), fields(url = %exchange.url))]
	pub async fn refresh(self: &Arc<Self>, exchange: RefreshExchange) -> RefreshResult<String> {
		let pending = {
			let mut slot = self.lock();

			if let Some((_, pending)) = &slot.current {
				tracing::debug!("joining outstanding token refresh");

				pending.clone()
			} else {
				let Some(refresh_token) = self.storage.refresh_token() else {
					tracing::debug!("no refresh token persisted");

					return Err(RefreshError::NoRefreshToken);
				};

				slot.next_id = slot.next_id.wrapping_add(1);

				let id = slot.next_id;
				let coordinator = Arc::clone(self);
				let pending = async move {
					let started = Instant::now();
					let result = exchange.run(&refresh_token).await;

					coordinator.settle(id, result, started.elapsed())
				}
				.boxed()
				.shared();

				slot.current = Some((id, pending.clone()));

				pending
			}
		};

		pending.await
	}

	fn settle(
		&self,
		id: u64,
		result: RefreshResult<Tokens>,
		elapsed: Duration,
	) -> RefreshResult<String> {
		let outcome = result.and_then(|tokens| {
			self.storage.store_tokens(&tokens.access, tokens.refresh.as_deref()).map_err(|err| {
				RefreshError::RefreshFailed(format!("Failed to persist tokens: {err}."))
			})?;
			self.metrics.record_refresh_success(elapsed);

			tracing::debug!(rotated = tokens.refresh.is_some(), ?elapsed, "token refreshed");

			Ok(tokens.access)
		});

		if let Err(err) = &outcome {
			self.metrics.record_refresh_error();

			tracing::warn!(error = %err, "token refresh failed; clearing credentials");

			if let Err(clear_err) = self.storage.clear_tokens() {
				tracing::warn!(error = %clear_err, "failed to clear credentials");
			}
		}

		let mut slot = self.lock();

		if slot.current.as_ref().is_some_and(|(current, _)| *current == id) {
			slot.current = None;
		}

		outcome
	}

	fn lock(&self) -> MutexGuard<'_, PendingSlot> {
		self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

#[derive(Default)]
struct PendingSlot {
	current: Option<(u64, SharedRefresh)>,
	next_id: u64,
}
impl std::fmt::Debug for PendingSlot {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PendingSlot")
			.field("pending", &self.current.as_ref().map(|(id, _)| id))
			.finish()
	}
}

/// Body returned by the refresh endpoint.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
	#[serde(default)]
	access: Option<String>,
	#[serde(default)]
	refresh: Option<String>,
}

#[derive(Debug)]
struct Tokens {
	access: String,
	refresh: Option<String>,
}
