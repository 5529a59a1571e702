//! Async API client core for the Lingua learning platform: request pipeline with single-flight
//! token refresh, short-TTL read caching with in-flight deduplication, and typed resource
//! factories.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod context;
pub mod http;
pub mod metrics;
pub mod model;
pub mod path;
pub mod resource;
pub mod scope;
pub mod storage;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

pub use crate::{
	cache::{CacheOptions, CacheStore},
	catalog::ApiCatalog,
	config::ClientConfig,
	context::SharedContext,
	error::{Error, RefreshError, Result},
	http::{
		pipeline::{ApiClient, RequestOptions},
		transport::ApiResponse,
	},
	metrics::install_default_exporter,
	resource::Resource,
	scope::Scope,
	storage::{FileStorage, MemoryStorage, Storage},
};
