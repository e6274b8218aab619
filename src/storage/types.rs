use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier
    pub id: String,
    /// Email address, unique across users
    pub email: String,
    /// When the user was created
    pub created_at: DateTime<Utc>,
}

/// A conversation owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    /// Client-chosen identifier
    pub id: String,
    /// Owning user; never changes after creation
    pub user_id: String,
    /// Title derived from the first user message
    pub title: String,
    /// When the chat was created
    pub created_at: DateTime<Utc>,
    /// Inline chats are disposable and hidden from history
    #[serde(default)]
    pub ephemeral: bool,
    /// When an inline chat becomes eligible for reaping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<DateTime<Utc>>,
}

/// A persisted chat message
///
/// `content` is a JSON string for user messages and an array of typed
/// parts for assistant and tool messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    /// Unique identifier
    pub id: String,
    /// Chat the message belongs to
    pub chat_id: String,
    /// user, assistant or tool
    pub role: String,
    /// Message content
    pub content: serde_json::Value,
    /// When the message was created
    pub created_at: DateTime<Utc>,
}

/// Kind of generated document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Prose
    Text,
    /// Source code
    Code,
}

impl DocumentKind {
    /// Wire and database name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Code => "code",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "code" => Ok(Self::Code),
            other => Err(format!("Unknown document kind: {}", other)),
        }
    }
}

/// A document created by the model or edited by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique identifier
    pub id: String,
    /// Document title
    pub title: String,
    /// text or code
    pub kind: DocumentKind,
    /// Full document body
    pub content: String,
    /// Owning user
    pub user_id: String,
    /// When the document was first created; preserved across updates
    pub created_at: DateTime<Utc>,
}

/// A proposed edit to one sentence of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// Unique identifier
    pub id: String,
    /// Document the suggestion applies to
    pub document_id: String,
    /// Creation time of that document
    pub document_created_at: DateTime<Utc>,
    /// Sentence as currently written
    pub original_text: String,
    /// Replacement sentence
    pub suggested_text: String,
    /// Why the change is proposed
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the user has applied or dismissed it
    #[serde(default)]
    pub is_resolved: bool,
    /// User who requested the suggestions
    pub user_id: String,
    /// When the suggestion was created
    pub created_at: DateTime<Utc>,
}

/// A user's rating of an assistant message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    /// Chat containing the message
    pub chat_id: String,
    /// Rated message
    pub message_id: String,
    /// Up (`true`) or down (`false`)
    pub is_upvoted: bool,
}
