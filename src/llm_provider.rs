use std::{str::FromStr, sync::Arc};

use rig::providers::{deepseek, gemini, openai};
use thiserror::Error;

use crate::{
    config::{ApiKey, Config, ConfigError, DEFAULT_MODEL},
    embeddings::{Embedder, RigEmbedder},
    model::{ChatModel, RigChatModel},
};

/// Which hosted model family to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAI,
    DeepSeek,
    Gemini,
}

impl ProviderKind {
    pub const fn api_key(self) -> ApiKey {
        match self {
            ProviderKind::OpenAI => ApiKey::OpenAI,
            ProviderKind::DeepSeek => ApiKey::DeepSeek,
            ProviderKind::Gemini => ApiKey::Gemini,
        }
    }

    pub const fn default_model(self) -> &'static str {
        match self {
            ProviderKind::OpenAI => DEFAULT_MODEL,
            ProviderKind::DeepSeek => "deepseek-chat",
            ProviderKind::Gemini => "gemini-1.5-flash",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = LLMProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "deepseek" => Ok(ProviderKind::DeepSeek),
            "gemini" => Ok(ProviderKind::Gemini),
            other => Err(LLMProviderError::UnknownProvider(other.to_owned())),
        }
    }
}

#[derive(Clone, Debug)]
pub enum LLMProvider {
    OpenAI(ModelConfig),
    DeepSeek(ModelConfig),
    Gemini(ModelConfig),
}

macro_rules! impl_chat_model {
    ($method:ident, $variant:ident, $client:ty) => {
        pub fn $method(&self, api_key: &str) -> Result<Arc<dyn ChatModel>, LLMProviderError> {
            let LLMProvider::$variant(config) = self else {
                return Err(LLMProviderError::LLMProviderNotMatch);
            };
            let client = <$client>::new(api_key);
            let model = RigChatModel::new(client.completion_model(&config.model), &config.model)
                .temperature(config.temperature)
                .max_tokens(config.max_tokens);
            Ok(Arc::new(model))
        }
    };
}

macro_rules! impl_chat_model_auto {
    ($variant:ident, $client:ty) => {
        paste::paste! {
            impl_chat_model!(
                [<get_ $variant:snake _chat_model>],
                $variant,
                $client
            );
        }
    };
}

impl LLMProvider {
    pub fn openai(model: impl Into<String>) -> Self {
        Self::OpenAI(ModelConfig::new(model))
    }

    pub fn deepseek(model: impl Into<String>) -> Self {
        Self::DeepSeek(ModelConfig::new(model))
    }

    pub fn gemini(model: impl Into<String>) -> Self {
        Self::Gemini(ModelConfig::new(model))
    }

    /// The provider and model named by the configuration.
    pub fn from_config(config: &Config) -> Self {
        match config.provider {
            ProviderKind::OpenAI => Self::openai(&config.model),
            ProviderKind::DeepSeek => Self::deepseek(&config.model),
            ProviderKind::Gemini => Self::gemini(&config.model),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            LLMProvider::OpenAI(_) => ProviderKind::OpenAI,
            LLMProvider::DeepSeek(_) => ProviderKind::DeepSeek,
            LLMProvider::Gemini(_) => ProviderKind::Gemini,
        }
    }

    pub fn get_config(&self) -> &ModelConfig {
        match self {
            LLMProvider::OpenAI(config)
            | LLMProvider::DeepSeek(config)
            | LLMProvider::Gemini(config) => config,
        }
    }

    /// Set the sampling temperature for every request made through this provider.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        match &mut self {
            LLMProvider::OpenAI(config)
            | LLMProvider::DeepSeek(config)
            | LLMProvider::Gemini(config) => config.temperature = Some(temperature),
        }
        self
    }

    /// Build a [ChatModel], taking the credential from `config`.
    pub fn chat_model(&self, config: &Config) -> Result<Arc<dyn ChatModel>, LLMProviderError> {
        let api_key = config.api_key(self.kind().api_key())?;
        match self {
            LLMProvider::OpenAI(_) => self.get_openai_chat_model(api_key),
            LLMProvider::DeepSeek(_) => self.get_deep_seek_chat_model(api_key),
            LLMProvider::Gemini(_) => self.get_gemini_chat_model(api_key),
        }
    }

    // paste would snake-case `OpenAI` into `open_a_i`
    impl_chat_model!(get_openai_chat_model, OpenAI, openai::Client);

    impl_chat_model_auto!(DeepSeek, deepseek::Client);

    impl_chat_model_auto!(Gemini, gemini::Client);
}

/// An OpenAI embedding model such as `text-embedding-3-small`.
pub fn embedding_model(
    config: &Config,
    model: &str,
) -> Result<Arc<dyn Embedder>, LLMProviderError> {
    let client = openai::Client::new(config.api_key(ApiKey::OpenAI)?);
    Ok(Arc::new(RigEmbedder::new(client.embedding_model(model))))
}

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LLMProviderError {
    #[error("LLM provider not match")]
    LLMProviderNotMatch,
    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),
    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAI);
        assert_eq!(" deepseek ".parse::<ProviderKind>().unwrap(), ProviderKind::DeepSeek);
        assert!(matches!(
            "ollama".parse::<ProviderKind>(),
            Err(LLMProviderError::UnknownProvider(name)) if name == "ollama"
        ));
    }

    #[test]
    fn provider_follows_config() {
        let config = Config::from_lookup(&[], |name| match name {
            "LLM_PROVIDER" => Some("gemini".to_owned()),
            "GEMINI_API_KEY" => Some("g".to_owned()),
            _ => None,
        })
        .unwrap();
        let provider = LLMProvider::from_config(&config).with_temperature(0.0);
        assert_eq!(provider.kind(), ProviderKind::Gemini);
        assert_eq!(provider.get_config().model, "gemini-1.5-flash");
        assert_eq!(provider.get_config().temperature, Some(0.0));
    }

    #[test]
    fn mismatched_builder_is_rejected() {
        let provider = LLMProvider::openai("gpt-4o-mini");
        assert!(matches!(
            provider.get_deep_seek_chat_model("key"),
            Err(LLMProviderError::LLMProviderNotMatch)
        ));
    }
}
