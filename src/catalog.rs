//! Platform endpoints wired onto the primary backend and the AI service.

// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	context::SharedContext,
	http::pipeline::{ApiClient, RequestOptions},
	model::{ChatMessage, Language, PracticeSession, Topic, Word},
	resource::Resource,
	scope::Scope,
};

/// Collections of the primary backend plus the AI tutor service.
///
/// Both clients are built from one [`SharedContext`], so a 401 on either side triggers at most
/// one refresh exchange.
#[derive(Clone, Debug)]
pub struct ApiCatalog {
	/// Languages offered for study.
	pub languages: Resource<Language>,
	/// Vocabulary entries.
	pub words: Resource<Word>,
	/// Word groups.
	pub topics: Resource<Topic>,
	/// Learner practice runs.
	pub practice_sessions: Resource<PracticeSession>,
	/// AI tutor endpoints.
	pub ai: AiService,
}
impl ApiCatalog {
	/// Wire the catalog onto clients built from `context`.
	pub fn new(context: &SharedContext, primary: ClientConfig, ai: ClientConfig) -> Result<Self> {
		let primary = context.client(primary)?;
		let ai = context.client(ai)?;

		Ok(Self::with_clients(primary, ai))
	}

	/// Wire the catalog onto existing clients.
	pub fn with_clients(primary: ApiClient, ai: ApiClient) -> Self {
		Self {
			languages: Resource::new(primary.clone(), "/languages/"),
			words: Resource::new(primary.clone(), "/words/"),
			topics: Resource::new(primary.clone(), "/topics/"),
			practice_sessions: Resource::new(primary, "/practice-sessions/"),
			ai: AiService::new(Scope::new(ai, "/ai/")),
		}
	}
}

/// Feedback on a learner's answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
	/// Score in `0.0..=1.0`.
	pub score: f64,
	/// Tutor commentary.
	#[serde(default)]
	pub feedback: Option<String>,
	/// Suggested corrected answer.
	#[serde(default)]
	pub correction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
	message: ChatMessage,
}

/// AI tutor endpoints.
#[derive(Clone, Debug)]
pub struct AiService {
	scope: Scope,
}
impl AiService {
	/// Wrap `scope`.
	pub fn new(scope: Scope) -> Self {
		Self { scope }
	}

	/// Underlying scope.
	pub fn scope(&self) -> &Scope {
		&self.scope
	}

	/// Send the conversation so far and receive the tutor's next turn.
	pub async fn chat(&self, language: &str, history: &[ChatMessage]) -> Result<ChatMessage> {
		let options = RequestOptions::new()
			.json(&serde_json::json!({ "language": language, "messages": history }))?;
		let reply: ChatReply = self.scope.post("chat/", options).await?;

		Ok(reply.message)
	}

	/// Grade a learner answer against a prompt.
	pub async fn evaluate(&self, language: &str, prompt: &str, answer: &str) -> Result<Evaluation> {
		let options = RequestOptions::new().json(&serde_json::json!({
			"language": language,
			"prompt": prompt,
			"answer": answer,
		}))?;

		self.scope.post("evaluate/", options).await
	}
}
