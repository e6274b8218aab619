//! Document creation tool

use super::generation::{stream_draft, DraftRequest};
use super::{parse_args, Tool, ToolContext, ToolExecutor, ToolKind, ToolResult};
use crate::error::Result;
use crate::prompts::document_prompt::create_document_prompt;
use crate::storage::{Document, DocumentKind};
use crate::stream::DataEvent;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CreateArgs {
    title: String,
    kind: DocumentKind,
}

/// Writes a new document and streams it to the client as it is generated
#[derive(Debug, Clone, Default)]
pub struct CreateDocumentTool;

impl CreateDocumentTool {
    /// Create the tool
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolExecutor for CreateDocumentTool {
    fn tool_definition(&self) -> serde_json::Value {
        Tool::new(
            ToolKind::CreateDocument.name(),
            "Create a document for writing or code creation activities. The content is \
             generated from the title and shown to the user as it is written.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "kind": { "type": "string", "enum": ["text", "code"] }
                },
                "required": ["title", "kind"]
            }),
        )
        .to_value()
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let args: CreateArgs = match parse_args(ToolKind::CreateDocument.name(), args) {
            Ok(args) => args,
            Err(result) => return Ok(result),
        };

        let id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("Creating {} document {}", args.kind, id);

        ctx.sink.data(DataEvent::Id(id.clone()));
        ctx.sink.data(DataEvent::Title(args.title.clone()));
        ctx.sink.data(DataEvent::Kind(args.kind));
        ctx.sink.data(DataEvent::Clear(String::new()));

        let content = stream_draft(
            ctx,
            DraftRequest {
                kind: args.kind,
                system: create_document_prompt(args.kind),
                prompt: &args.title,
                prediction: None,
            },
        )
        .await?;

        ctx.sink.data(DataEvent::Finish(String::new()));

        ctx.save_document(Document {
            id: id.clone(),
            title: args.title.clone(),
            kind: args.kind,
            content,
            user_id: ctx.session.user_id.clone(),
            created_at: Utc::now(),
        })
        .await?;

        Ok(ToolResult::success(serde_json::json!({
            "id": id,
            "title": args.title,
            "kind": args.kind,
            "content": "A document was created and is now visible to the user.",
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{drain_events, split_chunks, text_chunks, tool_context};
    use serde_json::json;

    #[tokio::test]
    async fn test_create_text_document_streams_and_saves() {
        let (ctx, mut rx, _dir) = tool_context(vec![text_chunks(&["# Rust", "\n\nFast."])]);

        let result = CreateDocumentTool::new()
            .execute(json!({"title": "About Rust", "kind": "text"}), &ctx)
            .await
            .unwrap();

        assert!(!result.is_error);
        let id = result.value["id"].as_str().unwrap().to_string();
        assert_eq!(result.value["kind"], "text");
        assert_eq!(
            result.value["content"],
            "A document was created and is now visible to the user."
        );

        let events = drain_events(&mut rx);
        assert_eq!(
            events,
            vec![
                DataEvent::Id(id.clone()),
                DataEvent::Title("About Rust".into()),
                DataEvent::Kind(DocumentKind::Text),
                DataEvent::Clear(String::new()),
                DataEvent::TextDelta("# Rust".into()),
                DataEvent::TextDelta("\n\nFast.".into()),
                DataEvent::Finish(String::new()),
            ]
        );

        let saved = ctx.store.get_document(&id).unwrap().unwrap();
        assert_eq!(saved.content, "# Rust\n\nFast.");
        assert_eq!(saved.user_id, ctx.session.user_id);
    }

    #[tokio::test]
    async fn test_create_code_document_saves_final_code() {
        let (ctx, mut rx, _dir) =
            tool_context(vec![split_chunks(r#"{"code":"print('hi')"}"#, 5)]);

        let result = CreateDocumentTool::new()
            .execute(json!({"title": "Hello", "kind": "code"}), &ctx)
            .await
            .unwrap();

        let id = result.value["id"].as_str().unwrap();
        let saved = ctx.store.get_document(id).unwrap().unwrap();
        assert_eq!(saved.kind, DocumentKind::Code);
        assert_eq!(saved.content, "print('hi')");

        let events = drain_events(&mut rx);
        assert!(events.contains(&DataEvent::CodeDelta("print('hi')".into())));
        assert_eq!(events.last(), Some(&DataEvent::Finish(String::new())));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_kind() {
        let (ctx, mut rx, _dir) = tool_context(vec![]);

        let result = CreateDocumentTool::new()
            .execute(json!({"title": "Sheet", "kind": "spreadsheet"}), &ctx)
            .await
            .unwrap();

        assert!(result.is_error);
        assert!(drain_events(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_create_propagates_provider_failure() {
        let (ctx, _rx, _dir) = tool_context(vec![vec![
            Ok(crate::providers::StreamChunk::TextDelta("partial".into())),
            Err("connection reset".to_string()),
        ]]);

        let err = CreateDocumentTool::new()
            .execute(json!({"title": "T", "kind": "text"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}
