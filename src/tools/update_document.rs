//! Document update tool

use super::generation::{stream_draft, DraftRequest};
use super::{
    parse_args, Tool, ToolContext, ToolExecutor, ToolKind, ToolResult, DOCUMENT_NOT_FOUND,
};
use crate::error::Result;
use crate::prompts::document_prompt::update_document_prompt;
use crate::storage::{Document, DocumentKind};
use crate::stream::DataEvent;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    id: String,
    description: String,
}

/// Regenerates an existing document from a description of the change
#[derive(Debug, Clone, Default)]
pub struct UpdateDocumentTool;

impl UpdateDocumentTool {
    /// Create the tool
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolExecutor for UpdateDocumentTool {
    fn tool_definition(&self) -> serde_json::Value {
        Tool::new(
            ToolKind::UpdateDocument.name(),
            "Update a document with the given description",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string", "description": "The ID of the document to update" },
                    "description": {
                        "type": "string",
                        "description": "The description of changes that need to be made"
                    }
                },
                "required": ["id", "description"]
            }),
        )
        .to_value()
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let args: UpdateArgs = match parse_args(ToolKind::UpdateDocument.name(), args) {
            Ok(args) => args,
            Err(result) => return Ok(result),
        };

        let Some(document) = ctx.owned_document(&args.id).await? else {
            tracing::debug!("Update requested for unavailable document {}", args.id);
            return Ok(ToolResult::error(DOCUMENT_NOT_FOUND));
        };

        ctx.sink.data(DataEvent::Clear(document.title.clone()));

        let system = update_document_prompt(&document.content, document.kind);
        let prediction = match document.kind {
            DocumentKind::Text => Some(document.content.as_str()),
            DocumentKind::Code => None,
        };
        let content = stream_draft(
            ctx,
            DraftRequest {
                kind: document.kind,
                system: &system,
                prompt: &args.description,
                prediction,
            },
        )
        .await?;

        ctx.sink.data(DataEvent::Finish(String::new()));

        ctx.save_document(Document {
            content,
            ..document.clone()
        })
        .await?;

        Ok(ToolResult::success(serde_json::json!({
            "id": document.id,
            "title": document.title,
            "kind": document.kind,
            "content": "The document has been updated successfully.",
        })))
    }
}
