//! Recipes for building LLM applications on top of [rig].
//!
//! The crate collects the building blocks the recipe binaries under `src/bin` are made of:
//!
//! * A [model seam][model] that hides the hosted provider behind [`ChatModel`], plus
//!   [provider selection][llm_provider] driven by [configuration][config].
//! * [Prompt templates][prompt], [chains][chain] and [output parsers][output_parser] for
//!   turning model text into typed values.
//! * [Tools][tools] an agent can call, backed by [search], other HTTP APIs and SQL databases.
//! * [Workflows][workflow]: an iterative summarize/review loop and a reasoning/acting agent.
//! * Document [loading][loader], [splitting][splitter], [summarization][summarize],
//!   [embeddings] and [token counting][tokens].
//!
//! [`ChatModel`]: crate::model::ChatModel
//!
//! # A Tour
//!
//! ## Talking To a Model
//!
//! Every component takes an `Arc<dyn ChatModel>`. [`LLMProvider`] builds one for OpenAI,
//! DeepSeek or Gemini from the [`Config`] read at startup:
//!
//! ```rust,ignore
//! use agent_recipes::{config::{ApiKey, Config}, llm_provider::LLMProvider};
//!
//! let config = Config::from_env(&[ApiKey::Tavily])?;
//! let model = LLMProvider::from_config(&config).chat_model(&config)?;
//! ```
//!
//! [`LLMProvider`]: crate::llm_provider::LLMProvider
//! [`Config`]: crate::config::Config
//!
//! ## Structured Output
//!
//! [`structured_chat`] appends the JSON schema of the target type to the request and parses
//! the completion, so a model reply becomes a plain Rust value or a [`ParseError`] that
//! keeps the raw text:
//!
//! ```rust,ignore
//! #[derive(Deserialize, JsonSchema)]
//! struct Person { name: String, age: u32 }
//!
//! let person: Person = structured_chat(model.as_ref(), ChatRequest::new("", "Invent a person.")).await?;
//! ```
//!
//! [`structured_chat`]: crate::output_parser::structured_chat
//! [`ParseError`]: crate::output_parser::ParseError
//!
//! ## Workflows
//!
//! [`ReviewWorkflow`] searches for news, then lets a summarizer and a reviewer iterate until
//! the reviewer approves or the round cap is hit. [`ReactAgent`] answers questions by
//! calling tools from a [`Toolbox`] until it has an answer.
//!
//! ```rust,ignore
//! let workflow = ReviewWorkflow::new(model, config.max_iterations)?;
//! let outcome = workflow.search_and_run(&tavily, "quantum computing").await?;
//! println!("{}", outcome.final_summary().unwrap_or_default());
//! ```
//!
//! [`ReviewWorkflow`]: crate::workflow::ReviewWorkflow
//! [`ReactAgent`]: crate::workflow::ReactAgent
//! [`Toolbox`]: crate::tools::Toolbox

pub mod chain;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod embeddings;
pub mod http;
pub mod llm_provider;
pub mod loader;
pub mod model;
pub mod output_parser;
pub mod prompt;
pub mod search;
pub mod splitter;
pub mod summarize;
pub mod tokens;
pub mod tools;
pub mod workflow;

pub use rig;
