//! Prompts for document sub-generations

use crate::storage::DocumentKind;

/// System prompt for writing a new text document
pub const TEXT_DOCUMENT_PROMPT: &str =
    "Write about the given topic. Markdown is supported. Use headings wherever appropriate.";

/// System prompt for writing a new code document
pub const CODE_DOCUMENT_PROMPT: &str = r#"
You are a code generator that writes self-contained, executable snippets.
Unless the user asks for another language, write Python. When writing code:

1. Each snippet must be complete and runnable on its own
2. Prefer printing results so the output is visible
3. Keep snippets short, generally under 15 lines
4. Use only the standard library
5. Handle likely errors gracefully
6. Never read from stdin or make network requests
7. Do not use infinite loops

Return only the code in the `code` field.
"#;

/// System prompt for proposing edits to a document
pub const SUGGESTIONS_PROMPT: &str = "You are a writing assistant. Given a piece of writing, \
offer suggestions that improve it and describe each change. Every edit must contain full \
sentences, not single words. Give at most 5 suggestions.";

/// Builds the system prompt for regenerating an existing document
///
/// # Arguments
///
/// * `current_content` - The document body being revised
/// * `kind` - Whether the document is prose or code
///
/// # Examples
///
/// ```
/// use quire::prompts::document_prompt::update_document_prompt;
/// use quire::storage::DocumentKind;
///
/// let prompt = update_document_prompt("print(1)", DocumentKind::Code);
/// assert!(prompt.contains("code snippet"));
/// assert!(prompt.ends_with("print(1)"));
/// ```
pub fn update_document_prompt(current_content: &str, kind: DocumentKind) -> String {
    let subject = match kind {
        DocumentKind::Text => "contents of the document",
        DocumentKind::Code => "code snippet",
    };
    format!(
        "Improve the following {} based on the given prompt.\n\n{}",
        subject, current_content
    )
}

/// System prompt for writing a new document of `kind`
pub fn create_document_prompt(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Text => TEXT_DOCUMENT_PROMPT,
        DocumentKind::Code => CODE_DOCUMENT_PROMPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_prompt_embeds_content() {
        let prompt = update_document_prompt("Once upon a time.", DocumentKind::Text);
        assert!(prompt.contains("contents of the document"));
        assert!(prompt.ends_with("Once upon a time."));
    }

    #[test]
    fn test_create_prompt_per_kind() {
        assert!(create_document_prompt(DocumentKind::Text).contains("Markdown"));
        assert!(create_document_prompt(DocumentKind::Code).contains("`code`"));
    }
}
