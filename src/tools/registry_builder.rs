//! Tool registry builder
//!
//! Builds the registry offered to the chat model on every turn. The set of
//! tools is fixed; configuration only affects how they reach their
//! collaborators.

use std::sync::Arc;

use crate::config::ToolsConfig;
use crate::error::Result;
use crate::tools::{
    CreateDocumentTool, RequestSuggestionsTool, ToolExecutor, ToolKind, ToolRegistry,
    UpdateDocumentTool, WeatherTool,
};

/// Builder for the chat tool registry
///
/// # Examples
///
/// ```
/// use quire::config::ToolsConfig;
/// use quire::tools::registry_builder::ToolRegistryBuilder;
///
/// let registry = ToolRegistryBuilder::new(ToolsConfig::default())
///     .build()
///     .expect("Failed to build registry");
/// assert_eq!(registry.len(), 4);
/// assert!(registry.get("getWeather").is_some());
/// ```
pub struct ToolRegistryBuilder {
    /// Tools configuration
    tools_config: ToolsConfig,
    /// Tools left out of the registry
    disabled: Vec<ToolKind>,
}

impl ToolRegistryBuilder {
    /// Create a new tool registry builder
    ///
    /// # Arguments
    ///
    /// * `tools_config` - Weather API endpoint and timeouts
    pub fn new(tools_config: ToolsConfig) -> Self {
        Self {
            tools_config,
            disabled: Vec::new(),
        }
    }

    /// Leave a tool out of the registry
    ///
    /// # Returns
    ///
    /// Returns self for method chaining
    pub fn without(mut self, kind: ToolKind) -> Self {
        self.disabled.push(kind);
        self
    }

    /// Build the registry
    ///
    /// # Errors
    ///
    /// Returns error if tool initialization fails
    pub fn build(&self) -> Result<ToolRegistry> {
        let mut registry = ToolRegistry::new();

        for kind in ToolKind::ALL {
            if self.disabled.contains(&kind) {
                continue;
            }
            let executor: Arc<dyn ToolExecutor> = match kind {
                ToolKind::GetWeather => Arc::new(WeatherTool::new(&self.tools_config)),
                ToolKind::CreateDocument => Arc::new(CreateDocumentTool::new()),
                ToolKind::UpdateDocument => Arc::new(UpdateDocumentTool::new()),
                ToolKind::RequestSuggestions => Arc::new(RequestSuggestionsTool::new()),
            };
            registry.register(kind.name(), executor);
        }

        tracing::debug!("Built tool registry with {} tools", registry.len());
        Ok(registry)
    }
}
