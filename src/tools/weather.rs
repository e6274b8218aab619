//! Weather lookup tool
//!
//! Queries an Open-Meteo compatible forecast API and hands the response
//! back to the model unchanged.

use super::{parse_args, Tool, ToolContext, ToolExecutor, ToolKind, ToolResult};
use crate::config::ToolsConfig;
use crate::error::{QuireError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    latitude: f64,
    longitude: f64,
}

/// Current weather for a coordinate
#[derive(Clone)]
pub struct WeatherTool {
    client: reqwest::Client,
    api_base: String,
}

impl WeatherTool {
    /// Create a weather tool from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Tools configuration carrying the API base and timeout
    ///
    /// # Returns
    ///
    /// Returns a new WeatherTool instance
    pub fn new(config: &ToolsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.weather_timeout_seconds))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_base: config.weather_api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the forecast for a coordinate
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, the service answers with a
    /// non-success status, or the body is not JSON
    pub async fn forecast(&self, latitude: f64, longitude: f64) -> Result<serde_json::Value> {
        let url = format!("{}/forecast", self.api_base);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current", "temperature_2m".to_string()),
                ("hourly", "temperature_2m".to_string()),
                ("daily", "sunrise,sunset".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|e| QuireError::Tool(format!("Failed to fetch weather: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuireError::Tool(format!(
                "HTTP {} from weather service",
                status.as_u16()
            ))
            .into());
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| QuireError::Tool(format!("Invalid weather response: {}", e)))?;
        Ok(body)
    }
}

#[async_trait]
impl ToolExecutor for WeatherTool {
    fn tool_definition(&self) -> serde_json::Value {
        Tool::new(
            ToolKind::GetWeather.name(),
            "Get the current weather at a location",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "latitude": { "type": "number" },
                    "longitude": { "type": "number" }
                },
                "required": ["latitude", "longitude"]
            }),
        )
        .to_value()
    }

    async fn execute(&self, args: serde_json::Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let args: WeatherArgs = match parse_args(ToolKind::GetWeather.name(), args) {
            Ok(args) => args,
            Err(result) => return Ok(result),
        };

        match self.forecast(args.latitude, args.longitude).await {
            Ok(body) => Ok(ToolResult::success(body)),
            Err(e) => {
                tracing::warn!("Weather lookup failed: {:#}", e);
                Ok(ToolResult::error(e.to_string()))
            }
        }
    }
}
