//! Suggestion generation tool
//!
//! Streams a structured list of sentence edits and forwards each element
//! to the client as soon as it is complete.

use super::{
    parse_args, Tool, ToolContext, ToolExecutor, ToolKind, ToolResult, DOCUMENT_NOT_FOUND,
};
use crate::error::Result;
use crate::prompts::document_prompt::SUGGESTIONS_PROMPT;
use crate::providers::structured::ElementStream;
use crate::providers::{GenerationRequest, Message, StreamChunk};
use crate::storage::{self, Document, Suggestion};
use crate::stream::DataEvent;
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionArgs {
    document_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionElement {
    original_sentence: String,
    suggested_sentence: String,
    #[serde(default)]
    description: Option<String>,
}

/// Schema of the structured suggestion list
pub fn suggestions_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "elements": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "originalSentence": { "type": "string" },
                        "suggestedSentence": { "type": "string" },
                        "description": { "type": "string" }
                    },
                    "required": ["originalSentence", "suggestedSentence", "description"]
                }
            }
        },
        "required": ["elements"]
    })
}

/// Proposes sentence-level edits to a document
#[derive(Debug, Clone, Default)]
pub struct RequestSuggestionsTool;

impl RequestSuggestionsTool {
    /// Create the tool
    pub fn new() -> Self {
        Self
    }

    fn emit(
        &self,
        ctx: &ToolContext,
        document: &Document,
        element: serde_json::Value,
        out: &mut Vec<Suggestion>,
    ) {
        let element: SuggestionElement = match serde_json::from_value(element) {
            Ok(element) => element,
            Err(e) => {
                tracing::warn!("Skipping malformed suggestion: {}", e);
                return;
            }
        };

        let suggestion = Suggestion {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            document_created_at: document.created_at,
            original_text: element.original_sentence,
            suggested_text: element.suggested_sentence,
            description: element.description,
            is_resolved: false,
            user_id: ctx.session.user_id.clone(),
            created_at: Utc::now(),
        };
        ctx.sink.data(DataEvent::Suggestion(suggestion.clone()));
        out.push(suggestion);
    }
}

#[async_trait]
impl ToolExecutor for RequestSuggestionsTool {
    fn tool_definition(&self) -> serde_json::Value {
        Tool::new(
            ToolKind::RequestSuggestions.name(),
            "Request suggestions for a document",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "documentId": {
                        "type": "string",
                        "description": "The ID of the document to request edits"
                    }
                },
                "required": ["documentId"]
            }),
        )
        .to_value()
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let args: SuggestionArgs = match parse_args(ToolKind::RequestSuggestions.name(), args) {
            Ok(args) => args,
            Err(result) => return Ok(result),
        };

        let document = match ctx.owned_document(&args.document_id).await? {
            Some(doc) if !doc.content.is_empty() => doc,
            _ => return Ok(ToolResult::error(DOCUMENT_NOT_FOUND)),
        };

        let request = GenerationRequest::new(
            ctx.model.api_identifier.clone(),
            vec![Message::user(document.content.clone())],
        )
        .with_system(SUGGESTIONS_PROMPT)
        .with_schema("suggestions", suggestions_schema());

        let mut stream = ctx.provider.stream(&request).await?;
        let mut elements = ElementStream::new("elements");
        let mut suggestions = Vec::new();

        let mut failure = None;

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(StreamChunk::TextDelta(delta)) => {
                    for element in elements.push(&delta) {
                        self.emit(ctx, &document, element, &mut suggestions);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if failure.is_none() {
            match elements.finish() {
                Ok(rest) => {
                    for element in rest {
                        self.emit(ctx, &document, element, &mut suggestions);
                    }
                }
                Err(e) => tracing::warn!("Dropping truncated suggestion output: {:#}", e),
            }
        }

        // Everything already sent to the client is persisted, even on failure
        tracing::debug!(
            "Generated {} suggestions for document {}",
            suggestions.len(),
            document.id
        );
        storage::blocking(&ctx.store, move |store| store.save_suggestions(&suggestions)).await?;
        if let Some(e) = failure {
            return Err(e);
        }

        Ok(ToolResult::success(serde_json::json!({
            "id": document.id,
            "title": document.title,
            "kind": document.kind,
            "message": "Suggestions have been added to the document",
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DocumentKind;
    use crate::test_utils::{drain_events, split_chunks, tool_context};
    use serde_json::json;

    const TWO_SUGGESTIONS: &str = r#"{"elements":[
        {"originalSentence":"It are good.","suggestedSentence":"It is good.","description":"Agreement"},
        {"originalSentence":"Me like it.","suggestedSentence":"I like it.","description":"Pronoun"}
    ]}"#;

    fn streamed_suggestions(
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<crate::stream::StreamPart>,
    ) -> Vec<Suggestion> {
        drain_events(rx)
            .into_iter()
            .filter_map(|event| match event {
                DataEvent::Suggestion(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn seed(ctx: &ToolContext, content: &str) -> Document {
        let doc = Document {
            id: "doc-9".into(),
            title: "Draft".into(),
            kind: DocumentKind::Text,
            content: content.into(),
            user_id: ctx.session.user_id.clone(),
            created_at: Utc::now(),
        };
        ctx.store.save_document(&doc).unwrap();
        doc
    }

    #[tokio::test]
    async fn test_suggestions_streamed_and_saved() {
        let (ctx, mut rx, _dir) = tool_context(vec![split_chunks(TWO_SUGGESTIONS, 7)]);
        let doc = seed(&ctx, "It are good. Me like it.");

        let result = RequestSuggestionsTool::new()
            .execute(json!({"documentId": "doc-9"}), &ctx)
            .await
            .unwrap();

        assert!(!result.is_error);
        assert_eq!(result.value["message"], "Suggestions have been added to the document");

        let streamed = streamed_suggestions(&mut rx);
        assert_eq!(streamed.len(), 2);
        assert_eq!(streamed[0].original_text, "It are good.");
        assert_eq!(streamed[1].suggested_text, "I like it.");
        assert_eq!(streamed[0].document_created_at, doc.created_at);
        assert!(!streamed[0].is_resolved);

        let saved = ctx.store.get_suggestions_by_document("doc-9").unwrap();
        assert_eq!(saved.len(), 2);
        for (row, sent) in saved.iter().zip(&streamed) {
            assert_eq!(row.id, sent.id);
            assert_eq!(row.document_id, "doc-9");
            assert_eq!(row.document_created_at, doc.created_at);
            assert_eq!(row.user_id, ctx.session.user_id);
            assert_eq!(row.original_text, sent.original_text);
        }
    }

    #[tokio::test]
    async fn test_empty_document_is_not_found() {
        let (ctx, _rx, _dir) = tool_context(vec![]);
        seed(&ctx, "");

        let result = RequestSuggestionsTool::new()
            .execute(json!({"documentId": "doc-9"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.value["error"], DOCUMENT_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let (ctx, _rx, _dir) = tool_context(vec![]);

        let result = RequestSuggestionsTool::new()
            .execute(json!({"documentId": "nope"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn test_truncated_output_keeps_complete_suggestions() {
        let truncated = r#"{"elements":[
            {"originalSentence":"It are good.","suggestedSentence":"It is good.","description":"Agreement"},
            {"originalSentence":"Me like it.","suggestedSentence":"I like it.","description":"Pronoun"},
            {"originalSentence":"x"#;
        let (ctx, mut rx, _dir) = tool_context(vec![split_chunks(truncated, 9)]);
        seed(&ctx, "It are good. Me like it. x");

        let result = RequestSuggestionsTool::new()
            .execute(json!({"documentId": "doc-9"}), &ctx)
            .await
            .unwrap();
        assert!(!result.is_error);

        let streamed = streamed_suggestions(&mut rx);
        let saved = ctx.store.get_suggestions_by_document("doc-9").unwrap();
        assert_eq!(streamed.len(), 2);
        assert_eq!(saved.len(), streamed.len());
        assert_eq!(saved[1].original_text, "Me like it.");
    }
}
