//! Model listing command
//!
//! Prints the chat models a client may select with `modelId`, marking the
//! default and title models.

use crate::config::{ChatModel, Config};
use crate::error::{QuireError, Result};
use colored::Colorize;
use prettytable::{format, row, Table};
use serde::Serialize;

/// JSON shape of `quire models list --json`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelListing<'a> {
    models: &'a [ChatModel],
    default_model: &'a str,
    title_model: &'a str,
}

/// List configured chat models
///
/// # Arguments
///
/// * `config` - Loaded configuration
/// * `json` - Print pretty JSON instead of a table
///
/// # Examples
///
/// ```no_run
/// use quire::config::Config;
/// use quire::commands::models::list_models;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::load("config/config.yaml", &Default::default())?;
/// list_models(&config, false)?;
/// # Ok(())
/// # }
/// ```
pub fn list_models(config: &Config, json: bool) -> Result<()> {
    tracing::debug!("models::list_models json: {}", json);

    if json {
        println!("{}", models_json(config)?);
        return Ok(());
    }

    if config.models.is_empty() {
        println!("{}", "No models configured.".yellow());
        return Ok(());
    }

    println!("\nConfigured models:\n");
    models_table(config).printstd();
    println!();
    Ok(())
}

fn models_json(config: &Config) -> Result<String> {
    let listing = ModelListing {
        models: &config.models,
        default_model: &config.default_model,
        title_model: &config.title_model,
    };
    Ok(serde_json::to_string_pretty(&listing).map_err(QuireError::Serialization)?)
}

fn models_table(config: &Config) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(row![
        "ID".bold(),
        "Label".bold(),
        "Provider Model".bold(),
        "Description".bold()
    ]);

    for model in &config.models {
        let id = if model.id == config.default_model {
            format!("{} (default)", model.id).cyan()
        } else {
            model.id.cyan()
        };
        table.add_row(row![id, model.label, model.api_identifier, model.description]);
    }

    table
}
