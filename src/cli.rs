//! Shared startup for the recipe binaries.

use std::{
    io::{self, BufRead, Write},
    sync::Arc,
};

use tracing_subscriber::EnvFilter;

use crate::{
    config::{ApiKey, Config},
    llm_provider::{LLMProvider, LLMProviderError},
    model::ChatModel,
};

/// Load `.env` and install the log subscriber. `RUST_LOG` overrides the `info` default.
pub fn init() {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolve configuration, exiting with status 1 when a credential is missing.
#[allow(clippy::exit)]
pub fn require(keys: &[ApiKey]) -> Config {
    match Config::from_env(keys) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}

/// The chat model selected by `LLM_PROVIDER` and `LLM_MODEL`.
pub fn chat_model(config: &Config) -> Result<Arc<dyn ChatModel>, LLMProviderError> {
    LLMProvider::from_config(config).chat_model(config)
}

/// Prompt on stdout and read one trimmed line from stdin.
pub fn read_line(prompt: &str) -> io::Result<String> {
    read_line_from(&mut io::stdin().lock(), &mut io::stdout(), prompt)
}

fn read_line_from<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> io::Result<String> {
    write!(output, "{prompt}")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_owned())
}
