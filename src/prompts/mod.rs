//! System prompts for chat turns and sub-generations
//!
//! This module provides the prompts that steer the main chat turn, the
//! document tools, and chat title generation.

pub mod chat_prompt;
pub mod document_prompt;

pub use chat_prompt::generate_chat_prompt;

/// System prompt for chat title generation
pub const TITLE_PROMPT: &str = "\
- you will generate a short title based on the first message a user begins a conversation with
- ensure it is not more than 80 characters long
- the title should be a summary of the user's message
- do not use quotes or colons";

/// Builds the user prompt for title generation
///
/// The message is passed as JSON so its quoting and newlines reach the model
/// unambiguously.
///
/// # Examples
///
/// ```
/// use quire::prompts::build_title_prompt;
///
/// assert_eq!(build_title_prompt("Hi \"there\""), r#""Hi \"there\"""#);
/// ```
pub fn build_title_prompt(message: &str) -> String {
    serde_json::Value::String(message.to_string()).to_string()
}
