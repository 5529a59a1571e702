//! Typed record shapes returned by the platform's collections.

// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// Identifier type used by every collection.
pub type RecordId = u64;

/// Last-known profile of the signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
	/// User identifier.
	pub id: RecordId,
	/// Login name.
	pub username: String,
	/// Contact address, if shared.
	#[serde(default)]
	pub email: Option<String>,
	/// Whether the user may open the admin screens.
	#[serde(default)]
	pub is_staff: bool,
	/// Locale code of the learner's native language.
	#[serde(default)]
	pub native_language: Option<String>,
}

/// A language offered for study.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
	#[allow(missing_docs)]
	pub id: RecordId,
	/// ISO-style code, e.g. `en`.
	pub code: String,
	/// Display name.
	pub name: String,
}

/// A vocabulary entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Word {
	#[allow(missing_docs)]
	pub id: RecordId,
	/// Headword in the studied language.
	pub text: String,
	/// Translation into the learner's language.
	#[serde(default)]
	pub translation: Option<String>,
	/// Code of the language the word belongs to.
	pub language: String,
	/// Owning topic.
	#[serde(default)]
	pub topic: Option<RecordId>,
	/// Pronunciation audio location.
	#[serde(default)]
	pub audio_url: Option<String>,
}

/// A themed group of words.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
	#[allow(missing_docs)]
	pub id: RecordId,
	#[allow(missing_docs)]
	pub title: String,
	/// Code of the language the topic belongs to.
	pub language: String,
	#[serde(default)]
	#[allow(missing_docs)]
	pub description: Option<String>,
}

/// Result of one learner practice run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PracticeSession {
	#[allow(missing_docs)]
	pub id: RecordId,
	#[allow(missing_docs)]
	pub topic: RecordId,
	/// Share of correct answers in `0.0..=1.0`.
	#[serde(default)]
	pub score: Option<f64>,
	#[allow(missing_docs)]
	pub started_at: DateTime<Utc>,
	#[serde(default)]
	#[allow(missing_docs)]
	pub finished_at: Option<DateTime<Utc>>,
}

/// Author of a chat turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
	/// Learner input.
	User,
	/// Tutor reply.
	Assistant,
	/// Instructions seeded by the platform.
	System,
}

/// One turn of a tutor conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
	#[allow(missing_docs)]
	pub role: ChatRole,
	#[allow(missing_docs)]
	pub content: String,
}

/// Collection listing as returned by the backend.
///
/// Endpoints either answer with a bare array or with a paginated envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListPage<T> {
	/// Paginated envelope.
	Paginated {
		/// Total number of records across all pages.
		count: u64,
		/// Link to the next page.
		#[serde(default)]
		next: Option<String>,
		/// Link to the previous page.
		#[serde(default)]
		previous: Option<String>,
		/// Records on this page.
		results: Vec<T>,
	},
	/// Complete, unpaginated listing.
	Plain(Vec<T>),
}
impl<T> ListPage<T> {
	/// Records on this page.
	pub fn items(&self) -> &[T] {
		match self {
			Self::Paginated { results, .. } => results,
			Self::Plain(items) => items,
		}
	}

	/// Consume the page, keeping only its records.
	pub fn into_items(self) -> Vec<T> {
		match self {
			Self::Paginated { results, .. } => results,
			Self::Plain(items) => items,
		}
	}

	/// Total record count, falling back to the page length for plain listings.
	pub fn total(&self) -> u64 {
		match self {
			Self::Paginated { count, .. } => *count,
			Self::Plain(items) => items.len() as u64,
		}
	}

	/// Whether another page follows.
	pub fn has_next(&self) -> bool {
		matches!(self, Self::Paginated { next: Some(_), .. })
	}
}
