//! Tools module for Quire
//!
//! This module contains the tool definitions, the tool registry, and the
//! tools the model may call mid-generation: weather lookup, document
//! creation, document update and suggestion generation.

pub mod context;
pub mod create_document;
pub mod generation;
pub mod registry_builder;
pub mod request_suggestions;
pub mod update_document;
pub mod weather;

pub use context::ToolContext;
pub use create_document::CreateDocumentTool;
pub use registry_builder::ToolRegistryBuilder;
pub use request_suggestions::RequestSuggestionsTool;
pub use update_document::UpdateDocumentTool;
pub use weather::WeatherTool;

use crate::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Error returned to the model when a document is missing or not the caller's
pub const DOCUMENT_NOT_FOUND: &str = "Document not found";

/// Tool definition structure
///
/// Follows the OpenAI function calling format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Name of the tool
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON schema for the tool's parameters
    pub parameters: serde_json::Value,
}

impl Tool {
    /// Create a new tool definition
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Definition as the JSON value offered to the provider
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters,
        })
    }
}

/// The fixed set of tools the chat model can call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Current weather for a coordinate
    GetWeather,
    /// Write a new text or code document
    CreateDocument,
    /// Regenerate an existing document
    UpdateDocument,
    /// Propose sentence-level edits to a document
    RequestSuggestions,
}

impl ToolKind {
    /// Every tool, in registration order
    pub const ALL: [ToolKind; 4] = [
        ToolKind::GetWeather,
        ToolKind::CreateDocument,
        ToolKind::UpdateDocument,
        ToolKind::RequestSuggestions,
    ];

    /// Name the model uses to call the tool
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetWeather => "getWeather",
            Self::CreateDocument => "createDocument",
            Self::UpdateDocument => "updateDocument",
            Self::RequestSuggestions => "requestSuggestions",
        }
    }

    /// Look up a tool by its call name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a tool call, returned to the model as the tool message
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// Result payload
    pub value: serde_json::Value,
    /// Whether the payload describes a failure
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(value: serde_json::Value) -> Self {
        Self {
            value,
            is_error: false,
        }
    }

    /// Create a failed tool result of the form `{"error": message}`
    ///
    /// # Examples
    ///
    /// ```
    /// use quire::tools::ToolResult;
    ///
    /// let result = ToolResult::error("Document not found");
    /// assert_eq!(result.value["error"], "Document not found");
    /// assert!(result.is_error);
    /// ```
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            value: serde_json::json!({ "error": message.into() }),
            is_error: true,
        }
    }

    /// Convert to the content of a tool message
    pub fn to_message(&self) -> String {
        self.value.to_string()
    }
}

/// Parse tool arguments, turning a schema mismatch into an error result
pub fn parse_args<T: DeserializeOwned>(
    tool: &str,
    args: serde_json::Value,
) -> std::result::Result<T, ToolResult> {
    serde_json::from_value(args).map_err(|e| {
        tracing::warn!("Invalid arguments for {}: {}", tool, e);
        ToolResult::error(format!("Invalid arguments for {}: {}", tool, e))
    })
}

/// Tool executor trait for implementing tool execution logic
///
/// # Examples
///
/// ```no_run
/// use quire::tools::{ToolContext, ToolExecutor, ToolResult};
/// use quire::error::Result;
/// use async_trait::async_trait;
/// use serde_json::Value;
///
/// struct Echo;
///
/// #[async_trait]
/// impl ToolExecutor for Echo {
///     fn tool_definition(&self) -> Value {
///         serde_json::json!({
///             "name": "echo",
///             "description": "Returns its arguments",
///             "parameters": {"type": "object", "properties": {}}
///         })
///     }
///
///     async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult> {
///         Ok(ToolResult::success(args))
///     }
/// }
/// ```
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Returns the tool definition as a JSON value
    fn tool_definition(&self) -> serde_json::Value;

    /// Executes the tool with the given arguments
    ///
    /// # Arguments
    ///
    /// * `args` - Tool arguments as a JSON value
    /// * `ctx` - The request the call belongs to
    ///
    /// # Returns
    ///
    /// Returns a ToolResult; expected failures (bad arguments, missing
    /// documents) are error results rather than `Err`
    ///
    /// # Errors
    ///
    /// Returns error for unexpected failures such as a broken provider stream
    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult>;
}

/// Tool registry for managing available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolExecutor>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool executor in the registry
    pub fn register(&mut self, name: impl Into<String>, executor: Arc<dyn ToolExecutor>) {
        self.tools.insert(name.into(), executor);
    }

    /// Get a tool executor by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions, ordered by name so requests are stable
    pub fn all_definitions(&self) -> Vec<serde_json::Value> {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|executor| executor.tool_definition())
            .collect()
    }

    /// Run a tool by name
    ///
    /// Unknown tools produce an error result.
    ///
    /// # Errors
    ///
    /// Propagates unexpected failures from the tool itself
    pub async fn dispatch(
        &self,
        name: &str,
        args: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult> {
        match self.get(name) {
            Some(executor) => executor.execute(args, ctx).await,
            None => {
                tracing::warn!("Model called unknown tool: {}", name);
                Ok(ToolResult::error(format!("Unknown tool: {}", name)))
            }
        }
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::tool_context;
    use serde_json::json;

    struct EchoTool {
        name: &'static str,
    }

    #[async_trait]
    impl ToolExecutor for EchoTool {
        fn tool_definition(&self) -> serde_json::Value {
            Tool::new(self.name, "echo", json!({"type": "object"})).to_value()
        }

        async fn execute(&self, args: serde_json::Value, _ctx: &ToolContext) -> Result<ToolResult> {
            Ok(ToolResult::success(args))
        }
    }

    #[test]
    fn test_tool_kind_names_roundtrip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("deleteEverything"), None);
        assert_eq!(ToolKind::GetWeather.to_string(), "getWeather");
    }

    #[test]
    fn test_tool_result_message() {
        let ok = ToolResult::success(json!({"a": 1}));
        assert_eq!(ok.to_message(), r#"{"a":1}"#);
        assert!(!ok.is_error);

        let err = ToolResult::error("nope");
        assert_eq!(err.to_message(), r#"{"error":"nope"}"#);
    }

    #[test]
    fn test_parse_args_error_result() {
        #[derive(Debug, Deserialize)]
        struct Args {
            #[allow(dead_code)]
            id: String,
        }

        let err = parse_args::<Args>("updateDocument", json!({"id": 5})).unwrap_err();
        assert!(err.is_error);
        assert!(err.value["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid arguments for updateDocument"));
    }

    #[test]
    fn test_definitions_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register("zeta", Arc::new(EchoTool { name: "zeta" }));
        registry.register("alpha", Arc::new(EchoTool { name: "alpha" }));

        let names: Vec<String> = registry
            .all_definitions()
            .iter()
            .map(|d| d["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_known_and_unknown() {
        let mut registry = ToolRegistry::new();
        registry.register("echo", Arc::new(EchoTool { name: "echo" }));
        let (ctx, _rx, _dir) = tool_context(vec![]);

        let result = registry.dispatch("echo", json!({"x": 1}), &ctx).await.unwrap();
        assert_eq!(result.value, json!({"x": 1}));

        let missing = registry.dispatch("nope", json!({}), &ctx).await.unwrap();
        assert!(missing.is_error);
        assert_eq!(missing.value["error"], "Unknown tool: nope");
    }
}
