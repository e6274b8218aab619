//! Streaming document drafts
//!
//! Shared by document creation and update: runs a sub-generation against
//! the chat's model and mirrors its progress to the client as `text-delta`
//! or `code-delta` events.

use super::ToolContext;
use crate::error::Result;
use crate::providers::structured::StringFieldStream;
use crate::providers::{GenerationRequest, Message, StreamChunk};
use crate::storage::DocumentKind;
use crate::stream::DataEvent;
use futures::StreamExt;

/// Schema of a structured code draft
pub fn code_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "code": { "type": "string" }
        },
        "required": ["code"],
        "additionalProperties": false
    })
}

/// Inputs of one draft generation
#[derive(Debug, Clone)]
pub struct DraftRequest<'a> {
    /// Text or code
    pub kind: DocumentKind,
    /// System prompt
    pub system: &'a str,
    /// User prompt (the title, or the change description)
    pub prompt: &'a str,
    /// Current content, offered as a predicted-output hint for text
    pub prediction: Option<&'a str>,
}

/// Generate a draft, streaming it to the client
///
/// # Returns
///
/// Returns the final draft content
///
/// # Errors
///
/// Returns error if the sub-generation cannot be started or fails midway
pub async fn stream_draft(ctx: &ToolContext, draft: DraftRequest<'_>) -> Result<String> {
    match draft.kind {
        DocumentKind::Text => stream_text_draft(ctx, &draft).await,
        DocumentKind::Code => stream_code_draft(ctx, &draft).await,
    }
}

async fn stream_text_draft(ctx: &ToolContext, draft: &DraftRequest<'_>) -> Result<String> {
    let mut request = GenerationRequest::new(
        ctx.model.api_identifier.clone(),
        vec![Message::user(draft.prompt)],
    )
    .with_system(draft.system);
    if let Some(current) = draft.prediction {
        request = request.with_prediction(current);
    }

    let mut stream = ctx.provider.stream(&request).await?;
    let mut content = String::new();

    while let Some(chunk) = stream.next().await {
        if let StreamChunk::TextDelta(delta) = chunk? {
            content.push_str(&delta);
            ctx.sink.data(DataEvent::TextDelta(delta));
        }
    }

    Ok(content)
}

async fn stream_code_draft(ctx: &ToolContext, draft: &DraftRequest<'_>) -> Result<String> {
    let request = GenerationRequest::new(
        ctx.model.api_identifier.clone(),
        vec![Message::user(draft.prompt)],
    )
    .with_system(draft.system)
    .with_schema("code", code_schema());

    let mut stream = ctx.provider.stream(&request).await?;
    let mut field = StringFieldStream::new("code");
    let mut content = String::new();

    while let Some(chunk) = stream.next().await {
        if let StreamChunk::TextDelta(delta) = chunk? {
            if let Some(code) = field.push(&delta) {
                ctx.sink.data(DataEvent::CodeDelta(code.clone()));
                content = code;
            }
        }
    }

    Ok(content)
}
