//! Streaming orchestration of one chat turn
//!
//! A turn is a bounded loop of steps. Each step streams one model response
//! to the client and then runs the tools it asked for, feeding their results
//! into the next step. When the loop ends the generated messages are cleaned
//! up, announced to the client and persisted.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use super::messages::{sanitize_response_messages, ContentPart, ResponseMessage, ResponseRole};
use super::metrics::TurnMetrics;
use crate::auth::Session;
use crate::config::ChatModel;
use crate::providers::{
    FinishReason, GenerationRequest, Message, Provider, StreamChunk, TokenUsage, ToolCall,
};
use crate::storage::{self, Store, StoredMessage};
use crate::stream::{DataEvent, EventSink};
use crate::tools::{ToolContext, ToolRegistry, ToolResult};

/// Inputs of one streamed turn
#[derive(Debug, Clone)]
pub struct Turn {
    /// Chat the turn belongs to
    pub chat_id: String,
    /// Id of the already persisted user message
    pub user_message_id: String,
    /// The requester
    pub session: Session,
    /// Selected chat model
    pub model: ChatModel,
    /// Full prior conversation, in provider form
    pub messages: Vec<Message>,
}

/// Summary of a finished turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Steps run
    pub steps: usize,
    /// Reason the last step finished
    pub finish_reason: FinishReason,
    /// Usage summed over all steps
    pub usage: TokenUsage,
    /// Ids of the persisted response messages, in order
    pub message_ids: Vec<String>,
}

/// How a single step ended
enum StepEnd {
    /// The model answered without calling tools
    Done,
    /// Tools ran; another step may follow
    Continue,
    /// The provider or a tool failed; the error was written to the stream
    Failed,
}

/// Drives model steps and tool calls for a chat turn
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn Store>,
    system_prompt: String,
    max_steps: usize,
}

impl Orchestrator {
    /// Create an orchestrator
    ///
    /// # Arguments
    ///
    /// * `provider` - Provider for model steps and tool sub-generations
    /// * `tools` - Tools offered to the model
    /// * `store` - Persistence for response messages and tool side effects
    /// * `max_steps` - Upper bound on model steps per turn
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn Store>,
        max_steps: usize,
    ) -> Self {
        Self {
            provider,
            tools,
            store,
            system_prompt: crate::prompts::generate_chat_prompt(),
            max_steps: max_steps.max(1),
        }
    }

    /// Run a turn, writing every part to `sink`
    ///
    /// Failures never escape: they are written to the stream as error parts
    /// and finalization still runs. Persistence failures are logged.
    pub async fn run(&self, turn: Turn, sink: EventSink) -> TurnOutcome {
        let mut metrics = TurnMetrics::start();
        info!(chat_id = %turn.chat_id, "Starting chat turn");

        sink.data(DataEvent::UserMessageId(turn.user_message_id.clone()));

        let ctx = ToolContext {
            sink: sink.clone(),
            session: turn.session.clone(),
            provider: Arc::clone(&self.provider),
            model: turn.model.clone(),
            store: Arc::clone(&self.store),
        };

        let mut conversation = turn.messages.clone();
        let mut responses: Vec<ResponseMessage> = Vec::new();
        let mut usage = TokenUsage::default();
        let mut finish_reason = FinishReason::Unknown;
        let mut failed = false;

        while metrics.steps() < self.max_steps {
            metrics.step();
            debug!("Step {}/{}", metrics.steps(), self.max_steps);

            let end = self
                .run_step(
                    &ctx,
                    &mut conversation,
                    &mut responses,
                    &mut usage,
                    &mut finish_reason,
                    &metrics,
                )
                .await;

            match end {
                StepEnd::Done => break,
                StepEnd::Continue => continue,
                StepEnd::Failed => {
                    failed = true;
                    finish_reason = FinishReason::Error;
                    break;
                }
            }
        }

        let message_ids = self.finalize(&turn.chat_id, responses, &sink, &metrics).await;
        sink.finish_message(finish_reason, usage);

        info!(
            chat_id = %turn.chat_id,
            steps = metrics.steps(),
            tokens = usage.total(),
            "Chat turn finished"
        );
        let steps = metrics.steps();
        metrics.finish(if failed { "error" } else { "completed" });

        TurnOutcome {
            steps,
            finish_reason,
            usage,
            message_ids,
        }
    }

    async fn run_step(
        &self,
        ctx: &ToolContext,
        conversation: &mut Vec<Message>,
        responses: &mut Vec<ResponseMessage>,
        usage: &mut TokenUsage,
        finish_reason: &mut FinishReason,
        metrics: &TurnMetrics,
    ) -> StepEnd {
        let sink = &ctx.sink;
        let step_id = uuid::Uuid::new_v4().to_string();
        sink.start_step(&step_id);

        let request = GenerationRequest::new(ctx.model.api_identifier.clone(), conversation.clone())
            .with_system(self.system_prompt.clone())
            .with_tools(self.tools.all_definitions());

        let mut stream = match self.provider.stream(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Model call failed: {:#}", e);
                sink.error(e.to_string());
                return StepEnd::Failed;
            }
        };

        let mut assistant = ResponseMessage::assistant();
        let mut text = String::new();
        let mut calls: Vec<ToolCall> = Vec::new();
        let mut step_usage = TokenUsage::default();
        let mut step_reason = FinishReason::Unknown;

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(StreamChunk::TextDelta(delta)) => {
                    sink.text(delta.clone());
                    text.push_str(&delta);
                    assistant.push_text(&delta);
                }
                Ok(StreamChunk::ToolCall(call)) => {
                    let args = call
                        .parsed_arguments()
                        .unwrap_or_else(|_| serde_json::Value::String(call.function.arguments.clone()));
                    sink.tool_call(&call.id, &call.function.name, args.clone());
                    assistant.parts.push(ContentPart::ToolCall {
                        tool_call_id: call.id.clone(),
                        tool_name: call.function.name.clone(),
                        args,
                    });
                    calls.push(call);
                }
                Ok(StreamChunk::Finish { reason, usage }) => {
                    step_reason = reason;
                    if let Some(u) = usage {
                        step_usage = u;
                    }
                }
                Err(e) => {
                    warn!("Model stream failed: {:#}", e);
                    sink.error(e.to_string());
                    responses.push(assistant);
                    return StepEnd::Failed;
                }
            }
        }

        usage.add(step_usage);
        *finish_reason = step_reason;
        responses.push(assistant);

        if calls.is_empty() {
            sink.finish_step(step_reason, step_usage, false);
            return StepEnd::Done;
        }

        conversation.push(Message::assistant_with_tools(
            (!text.is_empty()).then_some(text),
            calls.clone(),
        ));

        let mut tool_message = ResponseMessage::tool();
        let mut end = StepEnd::Continue;

        for call in &calls {
            let name = call.function.name.as_str();
            let result = match call.parsed_arguments() {
                Ok(args) => self.tools.dispatch(name, args, ctx).await,
                Err(e) => Ok(ToolResult::error(format!("Invalid JSON arguments: {}", e))),
            };

            match result {
                Ok(result) => {
                    metrics.record_tool(name, if result.is_error { "error" } else { "success" });
                    sink.tool_result(&call.id, result.value.clone());
                    conversation.push(Message::tool_result(&call.id, result.to_message()));
                    tool_message.parts.push(ContentPart::ToolResult {
                        tool_call_id: call.id.clone(),
                        tool_name: name.to_string(),
                        result: result.value,
                    });
                }
                Err(e) => {
                    error!("Tool {} failed: {:#}", name, e);
                    metrics.record_tool(name, "failure");
                    sink.error(format!("Tool {} failed: {}", name, e));
                    end = StepEnd::Failed;
                    break;
                }
            }
        }

        if !tool_message.parts.is_empty() {
            responses.push(tool_message);
        }
        if matches!(end, StepEnd::Continue) {
            sink.finish_step(step_reason, step_usage, true);
        }
        end
    }

    /// Clean up, announce and persist generated messages
    async fn finalize(
        &self,
        chat_id: &str,
        responses: Vec<ResponseMessage>,
        sink: &EventSink,
        metrics: &TurnMetrics,
    ) -> Vec<String> {
        let cleaned = sanitize_response_messages(responses);
        let now = Utc::now();
        let mut rows = Vec::with_capacity(cleaned.len());

        for message in cleaned {
            let id = uuid::Uuid::new_v4().to_string();
            let content = match serde_json::to_value(&message.parts) {
                Ok(content) => content,
                Err(e) => {
                    error!("Failed to encode response message: {}", e);
                    continue;
                }
            };
            if message.role == ResponseRole::Assistant {
                sink.annotation(serde_json::json!({ "messageIdFromServer": id }));
            }
            rows.push(StoredMessage {
                id,
                chat_id: chat_id.to_string(),
                role: message.role.as_str().to_string(),
                content,
                created_at: now,
            });
        }

        let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
        let saved = storage::blocking(&self.store, move |store| store.save_messages(&rows)).await;
        if let Err(e) = saved {
            error!(chat_id = %chat_id, "Failed to save chat response: {:#}", e);
            metrics.record_persist_failure();
        }
        ids
    }
}
