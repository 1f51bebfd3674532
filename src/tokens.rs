use thiserror::Error;
use tiktoken_rs::CoreBPE;

/// Price of `text-embedding-3-small`, in USD per 1,000 tokens.
pub const EMBEDDING_COST_PER_1K_TOKENS: f64 = 0.00002;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Tokenizer unavailable: {0}")]
    Tokenizer(String),
}

/// Counts tokens the way the hosted model does.
pub struct TokenCounter {
    bpe: CoreBPE,
}

impl TokenCounter {
    /// Pick the encoding for a model name: `o200k_base` for the gpt-4o family, `cl100k_base` otherwise.
    pub fn for_model(model: &str) -> Result<Self, TokenError> {
        let bpe = if model.starts_with("gpt-4o") || model.starts_with("o1") {
            tiktoken_rs::o200k_base()
        } else {
            tiktoken_rs::cl100k_base()
        }
        .map_err(|e| TokenError::Tokenizer(e.to_string()))?;
        Ok(Self { bpe })
    }

    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Total tokens across `texts` and what embedding them costs.
    pub fn estimate_embedding_cost<S: AsRef<str>>(&self, texts: &[S]) -> (usize, f64) {
        let tokens: usize = texts.iter().map(|text| self.count(text.as_ref())).sum();
        (tokens, tokens as f64 / 1000.0 * EMBEDDING_COST_PER_1K_TOKENS)
    }
}
