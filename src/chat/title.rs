//! Chat titles from the first user message

use crate::error::Result;
use crate::prompts::{build_title_prompt, TITLE_PROMPT};
use crate::providers::{GenerationRequest, Message, Provider};

/// Longest title kept, in characters
pub const MAX_TITLE_CHARS: usize = 80;

/// Title used when nothing usable remains after cleanup
pub const FALLBACK_TITLE: &str = "New chat";

/// Ask the title model for a title
///
/// # Errors
///
/// Returns error if the completion call fails
pub async fn generate_title(
    provider: &dyn Provider,
    model: &str,
    user_message: &str,
) -> Result<String> {
    let request = GenerationRequest::new(model, vec![Message::user(build_title_prompt(user_message))])
        .with_system(TITLE_PROMPT);
    let response = provider.complete(&request).await?;
    Ok(clean_title(response.text()))
}

/// Trim, strip surrounding quotes and cap the length
///
/// # Examples
///
/// ```
/// use quire::chat::title::clean_title;
///
/// assert_eq!(clean_title("  \"Rust ownership\"\n"), "Rust ownership");
/// ```
pub fn clean_title(raw: &str) -> String {
    let quotes: &[char] = &['"', '\'', '`', '\u{201c}', '\u{201d}'];
    let stripped = raw.trim().trim_matches(quotes).trim();

    let capped: String = stripped.chars().take(MAX_TITLE_CHARS).collect();
    let capped = capped.trim_end();
    if capped.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        capped.to_string()
    }
}

/// Title derived from the message text alone
pub fn fallback_title(user_message: &str) -> String {
    let first_line = user_message.lines().next().unwrap_or_default();
    clean_title(first_line)
}
