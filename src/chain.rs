use std::{collections::HashMap, sync::Arc};

use thiserror::Error;
use tracing::{debug, info};

use crate::{
    model::{ChatModel, ChatRequest, ModelError},
    prompt::{PromptError, PromptTemplate},
};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Model error: {0}")]
    ModelError(#[from] ModelError),
    #[error("Prompt error: {0}")]
    PromptError(#[from] PromptError),
}

/// A prompt template piped into a model.
pub struct LlmChain {
    template: PromptTemplate,
    model: Arc<dyn ChatModel>,
    preamble: String,
}

impl LlmChain {
    pub fn new(template: PromptTemplate, model: Arc<dyn ChatModel>) -> Self {
        Self {
            template,
            model,
            preamble: String::new(),
        }
    }

    pub fn preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    pub fn input_variables(&self) -> Vec<String> {
        self.template.input_variables()
    }

    pub async fn invoke(&self, vars: &HashMap<String, String>) -> Result<String, ChainError> {
        let prompt = self.template.format(vars)?;
        debug!(model = %self.model.name(), prompt_len = prompt.len(), "invoking chain");
        let output = self
            .model
            .chat(ChatRequest::new(self.preamble.as_str(), prompt))
            .await?;
        Ok(output.trim().to_owned())
    }
}

/// Runs chains in order. Each step's output is bound to its output key, so later steps
/// can use it as a prompt variable.
#[derive(Default)]
pub struct SequentialChain {
    steps: Vec<(String, LlmChain)>,
}

impl SequentialChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, output_key: impl Into<String>, chain: LlmChain) -> Self {
        self.steps.push((output_key.into(), chain));
        self
    }

    /// Run every step and return all variables: the inputs plus one entry per step.
    pub async fn invoke(
        &self,
        inputs: HashMap<String, String>,
    ) -> Result<HashMap<String, String>, ChainError> {
        let mut vars = inputs;
        for (output_key, chain) in &self.steps {
            let output = chain.invoke(&vars).await?;
            info!(step = %output_key, output_len = output.len(), "chain step done");
            vars.insert(output_key.clone(), output);
        }
        Ok(vars)
    }
}
