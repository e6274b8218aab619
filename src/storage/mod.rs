use crate::config::StorageConfig;
use crate::error::{QuireError, Result};
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod types;
pub use types::{Chat, Document, DocumentKind, StoredMessage, Suggestion, User, Vote};

/// Persistence operations used by the chat service
///
/// Implemented by [`SqliteStorage`]; unit tests substitute a mock.
#[cfg_attr(test, mockall::automock)]
pub trait Store: Send + Sync {
    /// Create a user with a fresh id
    fn create_user(&self, email: &str) -> Result<User>;

    /// Look up a user by email
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Record a session under the hash of its token
    fn create_session(
        &self,
        token_hash: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Resolve a token hash to its user id, ignoring sessions expired at `now`
    fn get_session_user(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<String>>;

    /// Fetch a chat by id
    fn get_chat(&self, id: &str) -> Result<Option<Chat>>;

    /// Insert a new chat
    fn save_chat(&self, chat: &Chat) -> Result<()>;

    /// Delete a chat with its messages and votes; returns whether a row was removed
    fn delete_chat(&self, id: &str) -> Result<bool>;

    /// Chats owned by a user, newest first
    fn list_chats_for_user(&self, user_id: &str, include_ephemeral: bool) -> Result<Vec<Chat>>;

    /// Push back the lease of an ephemeral chat
    fn renew_lease(&self, chat_id: &str, expires_at: DateTime<Utc>) -> Result<()>;

    /// Delete ephemeral chats whose lease expired before `now`; returns the count
    fn delete_expired_ephemeral(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Append messages in one transaction
    fn save_messages(&self, messages: &[StoredMessage]) -> Result<()>;

    /// Messages of a chat in creation order
    fn get_messages_by_chat(&self, chat_id: &str) -> Result<Vec<StoredMessage>>;

    /// Fetch a document by id
    fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// Insert a document, or overwrite title and content of an existing one
    ///
    /// Kind, owner and creation time of an existing document are preserved.
    fn save_document(&self, document: &Document) -> Result<()>;

    /// Insert suggestions in one transaction
    fn save_suggestions(&self, suggestions: &[Suggestion]) -> Result<()>;

    /// Suggestions attached to a document
    fn get_suggestions_by_document(&self, document_id: &str) -> Result<Vec<Suggestion>>;

    /// Record or replace a vote
    fn vote_message(&self, vote: &Vote) -> Result<()>;

    /// Votes cast in a chat
    fn get_votes_by_chat(&self, chat_id: &str) -> Result<Vec<Vote>>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS sessions (
    token_hash TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS chats (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    title TEXT NOT NULL,
    created_at TEXT NOT NULL,
    ephemeral INTEGER NOT NULL DEFAULT 0,
    lease_expires_at TEXT
);
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    content JSON NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS messages_chat_idx ON messages(chat_id, created_at);
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    kind TEXT NOT NULL,
    content TEXT NOT NULL,
    user_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS suggestions (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    document_created_at TEXT NOT NULL,
    original_text TEXT NOT NULL,
    suggested_text TEXT NOT NULL,
    description TEXT,
    is_resolved INTEGER NOT NULL DEFAULT 0,
    user_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS votes (
    chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
    message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
    is_upvoted INTEGER NOT NULL,
    PRIMARY KEY (chat_id, message_id)
);
";

/// Format a timestamp so that string order matches time order
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
    })
    .transpose()
}

fn storage_error(e: anyhow::Error) -> anyhow::Error {
    QuireError::Storage(format!("{:#}", e)).into()
}

fn chat_from_row(row: &Row<'_>) -> rusqlite::Result<Chat> {
    Ok(Chat {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        created_at: parse_ts(row, 3)?,
        ephemeral: row.get(4)?,
        lease_expires_at: parse_opt_ts(row, 5)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<StoredMessage> {
    let content: String = row.get(3)?;
    Ok(StoredMessage {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        role: row.get(2)?,
        content: serde_json::from_str(&content).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: parse_ts(row, 4)?,
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let kind: String = row.get(2)?;
    Ok(Document {
        id: row.get(0)?,
        title: row.get(1)?,
        kind: kind.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?,
        content: row.get(3)?,
        user_id: row.get(4)?,
        created_at: parse_ts(row, 5)?,
    })
}

fn suggestion_from_row(row: &Row<'_>) -> rusqlite::Result<Suggestion> {
    Ok(Suggestion {
        id: row.get(0)?,
        document_id: row.get(1)?,
        document_created_at: parse_ts(row, 2)?,
        original_text: row.get(3)?,
        suggested_text: row.get(4)?,
        description: row.get(5)?,
        is_resolved: row.get(6)?,
        user_id: row.get(7)?,
        created_at: parse_ts(row, 8)?,
    })
}

/// Run store calls on the blocking thread pool
///
/// SQLite access is synchronous; request handlers go through this so a slow
/// query does not stall the async workers.
///
/// # Errors
///
/// Returns the closure's error, or a storage error if the task panicked
pub async fn blocking<T, F>(store: &Arc<dyn Store>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Store) -> Result<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| QuireError::Storage(format!("Store task failed: {}", e)))?
}

/// SQLite-backed store
///
/// Opens a fresh connection per operation, so a single instance can be
/// shared across request tasks.
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a storage instance from configuration
    ///
    /// Uses `storage.db_path` when set, otherwise `quire.db` in the
    /// platform data directory.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        if let Some(path) = &config.db_path {
            return Self::new_with_path(path);
        }

        let proj_dirs = ProjectDirs::from("dev", "quire", "quire")
            .ok_or_else(|| QuireError::Storage("Could not determine data directory".into()))?;

        Self::new_with_path(proj_dirs.data_dir().join("quire.db"))
    }

    /// Create a storage instance that uses the specified database path
    ///
    /// # Examples
    ///
    /// ```
    /// use quire::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("quire.db")).unwrap();
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(storage_error)?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(storage_error)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")
            .map_err(storage_error)?;
        Ok(conn)
    }

    fn init(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(SCHEMA)
            .context("Failed to create tables")
            .map_err(storage_error)?;
        Ok(())
    }
}

impl Store for SqliteStorage {
    fn create_user(&self, email: &str) -> Result<User> {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        self.connect()?
            .execute(
                "INSERT INTO users (id, email, created_at) VALUES (?, ?, ?)",
                params![user.id, user.email, ts(&user.created_at)],
            )
            .context("Failed to insert user")
            .map_err(storage_error)?;
        Ok(user)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.connect()?
            .query_row(
                "SELECT id, email, created_at FROM users WHERE email = ?",
                params![email],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        created_at: parse_ts(row, 2)?,
                    })
                },
            )
            .optional()
            .context("Failed to query user")
            .map_err(storage_error)
    }

    fn create_session(
        &self,
        token_hash: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.connect()?
            .execute(
                "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
                VALUES (?, ?, ?, ?)",
                params![token_hash, user_id, ts(&Utc::now()), ts(&expires_at)],
            )
            .context("Failed to insert session")
            .map_err(storage_error)?;
        Ok(())
    }

    fn get_session_user(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        self.connect()?
            .query_row(
                "SELECT user_id FROM sessions WHERE token_hash = ? AND expires_at > ?",
                params![token_hash, ts(&now)],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query session")
            .map_err(storage_error)
    }

    fn get_chat(&self, id: &str) -> Result<Option<Chat>> {
        self.connect()?
            .query_row(
                "SELECT id, user_id, title, created_at, ephemeral, lease_expires_at
                FROM chats WHERE id = ?",
                params![id],
                chat_from_row,
            )
            .optional()
            .context("Failed to query chat")
            .map_err(storage_error)
    }

    fn save_chat(&self, chat: &Chat) -> Result<()> {
        self.connect()?
            .execute(
                "INSERT INTO chats (id, user_id, title, created_at, ephemeral, lease_expires_at)
                VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    chat.id,
                    chat.user_id,
                    chat.title,
                    ts(&chat.created_at),
                    chat.ephemeral,
                    chat.lease_expires_at.as_ref().map(ts),
                ],
            )
            .context("Failed to insert chat")
            .map_err(storage_error)?;
        Ok(())
    }

    fn delete_chat(&self, id: &str) -> Result<bool> {
        let removed = self
            .connect()?
            .execute("DELETE FROM chats WHERE id = ?", params![id])
            .context("Failed to delete chat")
            .map_err(storage_error)?;
        Ok(removed > 0)
    }

    fn list_chats_for_user(&self, user_id: &str, include_ephemeral: bool) -> Result<Vec<Chat>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, title, created_at, ephemeral, lease_expires_at
                FROM chats
                WHERE user_id = ?1 AND (?2 OR ephemeral = 0)
                ORDER BY created_at DESC",
            )
            .context("Failed to prepare statement")
            .map_err(storage_error)?;

        let chats = stmt
            .query_map(params![user_id, include_ephemeral], chat_from_row)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .context("Failed to query chats")
            .map_err(storage_error)?;
        Ok(chats)
    }

    fn renew_lease(&self, chat_id: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.connect()?
            .execute(
                "UPDATE chats SET lease_expires_at = ? WHERE id = ? AND ephemeral = 1",
                params![ts(&expires_at), chat_id],
            )
            .context("Failed to renew lease")
            .map_err(storage_error)?;
        Ok(())
    }

    fn delete_expired_ephemeral(&self, now: DateTime<Utc>) -> Result<usize> {
        self.connect()?
            .execute(
                "DELETE FROM chats
                WHERE ephemeral = 1 AND lease_expires_at IS NOT NULL AND lease_expires_at < ?",
                params![ts(&now)],
            )
            .context("Failed to delete expired chats")
            .map_err(storage_error)
    }

    fn save_messages(&self, messages: &[StoredMessage]) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(storage_error)?;

        for message in messages {
            let content = serde_json::to_string(&message.content)
                .context("Failed to serialize message content")
                .map_err(storage_error)?;
            tx.execute(
                "INSERT INTO messages (id, chat_id, role, content, created_at)
                VALUES (?, ?, ?, ?, ?)",
                params![
                    message.id,
                    message.chat_id,
                    message.role,
                    content,
                    ts(&message.created_at)
                ],
            )
            .context("Failed to insert message")
            .map_err(storage_error)?;
        }

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(storage_error)?;
        Ok(())
    }

    fn get_messages_by_chat(&self, chat_id: &str) -> Result<Vec<StoredMessage>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, chat_id, role, content, created_at
                FROM messages WHERE chat_id = ?
                ORDER BY created_at ASC, rowid ASC",
            )
            .context("Failed to prepare statement")
            .map_err(storage_error)?;

        let messages = stmt
            .query_map(params![chat_id], message_from_row)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .context("Failed to query messages")
            .map_err(storage_error)?;
        Ok(messages)
    }

    fn get_document(&self, id: &str) -> Result<Option<Document>> {
        self.connect()?
            .query_row(
                "SELECT id, title, kind, content, user_id, created_at
                FROM documents WHERE id = ?",
                params![id],
                document_from_row,
            )
            .optional()
            .context("Failed to query document")
            .map_err(storage_error)
    }

    fn save_document(&self, document: &Document) -> Result<()> {
        self.connect()?
            .execute(
                "INSERT INTO documents (id, title, kind, content, user_id, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    content = excluded.content",
                params![
                    document.id,
                    document.title,
                    document.kind.as_str(),
                    document.content,
                    document.user_id,
                    ts(&document.created_at),
                ],
            )
            .context("Failed to save document")
            .map_err(storage_error)?;
        Ok(())
    }

    fn save_suggestions(&self, suggestions: &[Suggestion]) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(storage_error)?;

        for s in suggestions {
            tx.execute(
                "INSERT INTO suggestions (id, document_id, document_created_at, original_text,
                    suggested_text, description, is_resolved, user_id, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    s.id,
                    s.document_id,
                    ts(&s.document_created_at),
                    s.original_text,
                    s.suggested_text,
                    s.description,
                    s.is_resolved,
                    s.user_id,
                    ts(&s.created_at),
                ],
            )
            .context("Failed to insert suggestion")
            .map_err(storage_error)?;
        }

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(storage_error)?;
        Ok(())
    }

    fn get_suggestions_by_document(&self, document_id: &str) -> Result<Vec<Suggestion>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, document_id, document_created_at, original_text, suggested_text,
                    description, is_resolved, user_id, created_at
                FROM suggestions WHERE document_id = ?
                ORDER BY created_at ASC, rowid ASC",
            )
            .context("Failed to prepare statement")
            .map_err(storage_error)?;

        let suggestions = stmt
            .query_map(params![document_id], suggestion_from_row)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .context("Failed to query suggestions")
            .map_err(storage_error)?;
        Ok(suggestions)
    }

    fn vote_message(&self, vote: &Vote) -> Result<()> {
        self.connect()?
            .execute(
                "INSERT INTO votes (chat_id, message_id, is_upvoted) VALUES (?, ?, ?)
                ON CONFLICT(chat_id, message_id) DO UPDATE SET is_upvoted = excluded.is_upvoted",
                params![vote.chat_id, vote.message_id, vote.is_upvoted],
            )
            .context("Failed to save vote")
            .map_err(storage_error)?;
        Ok(())
    }

    fn get_votes_by_chat(&self, chat_id: &str) -> Result<Vec<Vote>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare("SELECT chat_id, message_id, is_upvoted FROM votes WHERE chat_id = ?")
            .context("Failed to prepare statement")
            .map_err(storage_error)?;

        let votes = stmt
            .query_map(params![chat_id], |row| {
                Ok(Vote {
                    chat_id: row.get(0)?,
                    message_id: row.get(1)?,
                    is_upvoted: row.get(2)?,
                })
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .context("Failed to query votes")
            .map_err(storage_error)?;
        Ok(votes)
    }
}
