//! Tools an agent can call: market data, weather, news, translation, encyclopedia lookups
//! and SQL databases.
//!
//! Each tool describes itself with a [ToolDefinition] whose parameter schema is derived from
//! its argument struct, and is invoked with JSON arguments through a [Toolbox].

use std::sync::Arc;

use futures::future::BoxFuture;
use rig::completion::ToolDefinition;
use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::{http::HttpError, search::SearchError};

pub mod finance;
pub mod news;
pub mod sql;
pub mod translate;
pub mod weather;
pub mod wikipedia;

pub use finance::{ExchangeRate, PercentageChange, StockPrice};
pub use news::{LatestNews, WebSearch};
pub use sql::{Dialect, GetSchema, RunQuery, SqlDatabase, SqlError};
pub use translate::TranslatePhrases;
pub use weather::WeatherForecast;
pub use wikipedia::{WikipediaSearch, WikipediaSearcher};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{tool} failed: {detail}")]
    Failed { tool: &'static str, detail: String },
    #[error(transparent)]
    HttpError(#[from] HttpError),
    #[error(transparent)]
    SearchError(#[from] SearchError),
    #[error(transparent)]
    SqlError(#[from] SqlError),
}

pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn definition(&self) -> ToolDefinition;

    /// Run the tool. `args` must match the parameter schema of [Tool::definition].
    fn call(&self, args: Value) -> BoxFuture<'static, Result<String, ToolError>>;
}

/// Build a definition whose parameters are the JSON schema of `A`.
pub fn definition_for<A: JsonSchema>(name: &str, description: &str) -> ToolDefinition {
    let mut parameters = serde_json::to_value(schema_for!(A)).unwrap_or(Value::Null);
    if let Some(object) = parameters.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    ToolDefinition {
        name: name.to_owned(),
        description: description.to_owned(),
        parameters,
    }
}

/// Deserialize tool arguments, naming the tool on failure.
pub fn parse_args<A: DeserializeOwned>(tool: &'static str, args: Value) -> Result<A, ToolError> {
    serde_json::from_value(args).map_err(|source| ToolError::InvalidArguments { tool, source })
}

/// The set of tools available to one agent.
#[derive(Clone, Default)]
pub struct Toolbox {
    tools: Vec<Arc<dyn Tool>>,
}

impl Toolbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. A tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: impl Tool + 'static) -> &mut Self {
        let tool: Arc<dyn Tool> = Arc::new(tool);
        match self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            Some(slot) => *slot = tool,
            None => self.tools.push(tool),
        }
        self
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|tool| tool.name() == name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    /// A plain-text listing of the tools and their argument schemas, for prompts.
    pub fn catalogue(&self) -> String {
        self.definitions()
            .into_iter()
            .map(|def| {
                format!(
                    "- {}: {}\n  arguments schema: {}",
                    def.name,
                    def.description.trim(),
                    def.parameters
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn call(&self, name: &str, args: Value) -> Result<String, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.name() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_owned()))?;
        info!(tool = name, "calling tool");
        debug!(tool = name, %args, "tool arguments");
        let output = tool.call(args).await?;
        debug!(tool = name, output_len = output.len(), "tool output");
        Ok(output)
    }
}
