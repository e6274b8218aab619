//! Per-request state handed to every tool call

use crate::auth::Session;
use crate::config::ChatModel;
use crate::providers::Provider;
use crate::storage::{self, Document, Store};
use crate::stream::EventSink;
use std::sync::Arc;

/// Everything a tool needs from the request that invoked it
///
/// Tools write their events to `sink`, which is the same channel the
/// orchestrator writes to, and run sub-generations against `model`.
#[derive(Clone)]
pub struct ToolContext {
    /// Event channel of the current response
    pub sink: EventSink,
    /// The requester
    pub session: Session,
    /// Provider for sub-generations
    pub provider: Arc<dyn Provider>,
    /// Model selected for the chat
    pub model: ChatModel,
    /// Persistence
    pub store: Arc<dyn Store>,
}

impl ToolContext {
    /// Fetch a document only if the requester owns it
    ///
    /// # Returns
    ///
    /// Returns `None` for missing documents and for documents owned by
    /// another user, so callers cannot tell the two apart
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be queried
    pub async fn owned_document(&self, id: &str) -> crate::error::Result<Option<Document>> {
        let id = id.to_string();
        let document = storage::blocking(&self.store, move |store| store.get_document(&id)).await?;
        Ok(document.filter(|doc| doc.user_id == self.session.user_id))
    }

    /// Insert or replace a document
    pub async fn save_document(&self, document: Document) -> crate::error::Result<()> {
        storage::blocking(&self.store, move |store| store.save_document(&document)).await
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("session", &self.session)
            .field("model", &self.model.id)
            .finish_non_exhaustive()
    }
}
