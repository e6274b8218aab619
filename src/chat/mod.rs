//! Chat module for Quire
//!
//! This module contains the request handler, the streaming orchestrator,
//! message conversion, title generation and turn metrics.

pub mod handler;
pub mod messages;
pub mod metrics;
pub mod orchestrator;
pub mod title;

pub use handler::{ChatError, ChatRequest, ChatService};
pub use messages::{ContentPart, ToolInvocation, UiMessage};
pub use orchestrator::{Orchestrator, Turn, TurnOutcome};
