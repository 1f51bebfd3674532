use std::{collections::HashMap, fmt::Display};

use thiserror::Error;

use crate::{llm_provider::ProviderKind, summarize::SummaryStrategy, workflow::DEFAULT_MAX_STEPS};

/// Default chat model used by every recipe.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default cap on summarize/review rounds.
pub const DEFAULT_MAX_ITERATIONS: u32 = 25;

/// A credential one of the recipes needs, together with the environment variable it is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKey {
    OpenAI,
    DeepSeek,
    Gemini,
    Tavily,
    OpenWeatherMap,
}

impl ApiKey {
    pub const fn env_var(self) -> &'static str {
        match self {
            ApiKey::OpenAI => "OPENAI_API_KEY",
            ApiKey::DeepSeek => "DEEPSEEK_API_KEY",
            ApiKey::Gemini => "GEMINI_API_KEY",
            ApiKey::Tavily => "TAVILY_API_KEY",
            ApiKey::OpenWeatherMap => "OPENWEATHERMAP_API_KEY",
        }
    }
}

impl Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.env_var())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<&'static str>),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Process configuration, resolved once at startup and passed to every component.
///
/// All credentials a recipe needs are listed upfront; [Config::from_env] fails before any
/// network call is attempted when one of them is absent.
#[derive(Clone)]
pub struct Config {
    keys: HashMap<ApiKey, String>,
    pub provider: ProviderKind,
    pub model: String,
    pub max_iterations: u32,
    /// Step cap for the reasoning/acting agents, from `MAX_STEPS`.
    pub max_steps: usize,
    /// From `SUMMARY_STRATEGY`. Defaults to [SummaryStrategy::Stuff].
    pub summary_strategy: SummaryStrategy,
    /// Connection string for the SQL agent, from `DATABASE_URL`.
    pub database_url: Option<String>,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// Call `dotenv::dotenv()` beforehand to pick up a `.env` file.
    pub fn from_env(required: &[ApiKey]) -> Result<Self, ConfigError> {
        Self::from_lookup(required, |name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(required: &[ApiKey], lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let provider = match present("LLM_PROVIDER") {
            Some(value) => value
                .parse::<ProviderKind>()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "LLM_PROVIDER",
                    value,
                })?,
            None => ProviderKind::OpenAI,
        };

        let mut required = required.to_vec();
        let provider_key = provider.api_key();
        if !required.contains(&provider_key) {
            required.insert(0, provider_key);
        }

        let missing: Vec<&'static str> = required
            .iter()
            .filter(|key| present(key.env_var()).is_none())
            .map(|key| key.env_var())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingEnv(missing));
        }

        let keys = [
            ApiKey::OpenAI,
            ApiKey::DeepSeek,
            ApiKey::Gemini,
            ApiKey::Tavily,
            ApiKey::OpenWeatherMap,
        ]
        .into_iter()
        .filter_map(|key| present(key.env_var()).map(|value| (key, value)))
        .collect();

        let max_iterations = match present("MAX_ITERATIONS") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(parsed) if parsed > 0 => parsed,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "MAX_ITERATIONS",
                        value,
                    });
                }
            },
            None => DEFAULT_MAX_ITERATIONS,
        };

        let max_steps = match present("MAX_STEPS") {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(parsed) if parsed > 0 => parsed,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "MAX_STEPS",
                        value,
                    });
                }
            },
            None => DEFAULT_MAX_STEPS,
        };

        let summary_strategy = match present("SUMMARY_STRATEGY") {
            Some(value) => value
                .parse::<SummaryStrategy>()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "SUMMARY_STRATEGY",
                    value,
                })?,
            None => SummaryStrategy::Stuff,
        };

        Ok(Self {
            keys,
            model: present("LLM_MODEL").unwrap_or_else(|| provider.default_model().to_owned()),
            provider,
            max_iterations,
            max_steps,
            summary_strategy,
            database_url: present("DATABASE_URL"),
        })
    }

    /// Get a credential. Keys that were not listed as required may still be absent.
    pub fn api_key(&self, key: ApiKey) -> Result<&str, ConfigError> {
        self.keys
            .get(&key)
            .map(String::as_str)
            .ok_or(ConfigError::MissingEnv(vec![key.env_var()]))
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.keys.keys().map(|key| key.env_var()).collect();
        keys.sort_unstable();
        f.debug_struct("Config")
            .field("keys", &keys)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("max_iterations", &self.max_iterations)
            .field("max_steps", &self.max_steps)
            .field("summary_strategy", &self.summary_strategy)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .finish()
    }
}
