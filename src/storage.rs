//! Durable key/value storage for session credentials and client preferences.

// std
use std::{
	collections::BTreeMap,
	fmt::Debug,
	fs,
	path::{Path, PathBuf},
	sync::{Mutex, MutexGuard},
};
// self
use crate::{_prelude::*, model::SessionUser};

/// Well-known storage keys.
pub mod keys {
	/// Bearer access token.
	pub const ACCESS: &str = "access";
	/// Refresh token exchanged for new access tokens.
	pub const REFRESH: &str = "refresh";
	/// Preferred locale sent as `Accept-Language`.
	pub const LANG: &str = "lang";
	/// Developer toggle; `"1"` enables verbose request logging.
	pub const DEBUG_API: &str = "debug_api";
	/// Serialized last-known user profile.
	pub const SESSION_USER: &str = "session.user.v1";
}

/// Durable client-side key/value store.
pub trait Storage: Debug + Send + Sync {
	/// Read the value stored under `key`.
	fn get(&self, key: &str) -> Option<String>;

	/// Store `value` under `key`, replacing any previous value.
	fn set(&self, key: &str, value: &str) -> Result<()>;

	/// Delete `key`; missing keys are not an error.
	fn remove(&self, key: &str) -> Result<()>;

	/// Persisted access token.
	fn access_token(&self) -> Option<String> {
		self.get(keys::ACCESS).filter(|token| !token.is_empty())
	}

	/// Persisted refresh token.
	fn refresh_token(&self) -> Option<String> {
		self.get(keys::REFRESH).filter(|token| !token.is_empty())
	}

	/// Persist a fresh access token and, when rotated, a new refresh token.
	fn store_tokens(&self, access: &str, refresh: Option<&str>) -> Result<()> {
		self.set(keys::ACCESS, access)?;

		if let Some(refresh) = refresh {
			self.set(keys::REFRESH, refresh)?;
		}

		Ok(())
	}

	/// Erase both session credentials.
	fn clear_tokens(&self) -> Result<()> {
		self.remove(keys::ACCESS)?;
		self.remove(keys::REFRESH)
	}

	/// Persisted locale preference.
	fn locale(&self) -> Option<String> {
		self.get(keys::LANG).filter(|lang| !lang.is_empty())
	}

	/// Persist the locale preference.
	fn set_locale(&self, lang: &str) -> Result<()> {
		self.set(keys::LANG, lang)
	}

	/// Whether the persisted developer toggle enables verbose logging.
	fn debug_enabled(&self) -> bool {
		self.get(keys::DEBUG_API).as_deref() == Some("1")
	}

	/// Last-known user profile; unreadable data counts as absent.
	fn session_user(&self) -> Option<SessionUser> {
		let raw = self.get(keys::SESSION_USER)?;

		match serde_json::from_str(&raw) {
			Ok(user) => Some(user),
			Err(err) => {
				tracing::debug!(error = %err, "discarding unreadable session user");

				None
			},
		}
	}

	/// Persist the user profile.
	fn set_session_user(&self, user: &SessionUser) -> Result<()> {
		let raw = serde_json::to_string(user)?;

		self.set(keys::SESSION_USER, &raw)
	}

	/// Forget the user profile.
	fn clear_session_user(&self) -> Result<()> {
		self.remove(keys::SESSION_USER)
	}
}

/// In-process storage, primarily for tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryStorage {
	values: Mutex<BTreeMap<String, String>>,
}
impl MemoryStorage {
	/// Create an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Create a store pre-populated with `values`.
	pub fn with_values<I, K, V>(values: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let values = values.into_iter().map(|(k, v)| (k.into(), v.into())).collect();

		Self { values: Mutex::new(values) }
	}

	fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
		self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}
impl Storage for MemoryStorage {
	fn get(&self, key: &str) -> Option<String> {
		self.lock().get(key).cloned()
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		self.lock().insert(key.to_owned(), value.to_owned());

		Ok(())
	}

	fn remove(&self, key: &str) -> Result<()> {
		self.lock().remove(key);

		Ok(())
	}
}

/// Storage persisted as a JSON object on disk.
///
/// The whole file is rewritten on every mutation; a missing file is an empty store. A mutation
/// becomes visible in memory only after it has reached disk.
#[derive(Debug)]
pub struct FileStorage {
	path: PathBuf,
	values: Mutex<BTreeMap<String, String>>,
}
impl FileStorage {
	/// Open (or lazily create) the store at `path`.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref().to_path_buf();
		let values = match fs::read(&path) {
			Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
			Ok(bytes) => serde_json::from_slice(&bytes)?,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
			Err(err) => return Err(err.into()),
		};

		tracing::debug!(path = %path.display(), entries = values.len(), "opened file storage");

		Ok(Self { path, values: Mutex::new(values) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn mutate<F>(&self, f: F) -> Result<()>
	where
		F: FnOnce(&mut BTreeMap<String, String>),
	{
		let mut values = self.lock();
		let mut next = values.clone();

		f(&mut next);
		self.persist(&next).map_err(|err| {
			Error::Storage(format!("Failed to persist {}: {err}.", self.path.display()))
		})?;

		*values = next;

		Ok(())
	}

	fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
		let json = serde_json::to_vec_pretty(values)?;

		if let Some(parent) = self.path.parent()
			&& !parent.as_os_str().is_empty()
		{
			fs::create_dir_all(parent)?;
		}

		let staging = self.path.with_extension("tmp");

		fs::write(&staging, json)?;
		fs::rename(&staging, &self.path)?;

		Ok(())
	}

	fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
		self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}
impl Storage for FileStorage {
	fn get(&self, key: &str) -> Option<String> {
		self.lock().get(key).cloned()
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		self.mutate(|values| {
			values.insert(key.to_owned(), value.to_owned());
		})
	}

	fn remove(&self, key: &str) -> Result<()> {
		self.mutate(|values| {
			values.remove(key);
		})
	}

	fn store_tokens(&self, access: &str, refresh: Option<&str>) -> Result<()> {
		self.mutate(|values| {
			values.insert(keys::ACCESS.to_owned(), access.to_owned());

			if let Some(refresh) = refresh {
				values.insert(keys::REFRESH.to_owned(), refresh.to_owned());
			}
		})
	}

	fn clear_tokens(&self) -> Result<()> {
		self.mutate(|values| {
			values.remove(keys::ACCESS);
			values.remove(keys::REFRESH);
		})
	}
}
