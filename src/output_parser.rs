//! Turning model text into values.
//!
//! Every parser reports failure through [ParseError] rather than panicking or returning a
//! placeholder, so callers decide whether a malformed completion is fatal. The
//! [OutputFixingParser] gives the model one chance to repair its own output.

use std::{marker::PhantomData, sync::Arc};

use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::model::{ChatModel, ChatRequest, ModelError};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("No JSON value found in model output: {raw}")]
    NoJson { raw: String },
    #[error("Model output does not match the expected schema: {source}")]
    Invalid {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ParseError {
    /// The completion text that failed to parse.
    pub fn raw(&self) -> &str {
        match self {
            ParseError::NoJson { raw } | ParseError::Invalid { raw, .. } => raw,
        }
    }
}

#[derive(Debug, Error)]
pub enum StructuredError {
    #[error("Model error: {0}")]
    ModelError(#[from] ModelError),
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
}

pub trait OutputParser: Send + Sync {
    type Output;

    fn parse(&self, text: &str) -> Result<Self::Output, ParseError>;

    /// Text to append to a prompt so the model produces parseable output.
    fn format_instructions(&self) -> Option<String> {
        None
    }
}

/// Passes the completion through, trimmed.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrOutputParser;

impl OutputParser for StrOutputParser {
    type Output = String;

    fn parse(&self, text: &str) -> Result<String, ParseError> {
        Ok(text.trim().to_owned())
    }
}

/// Extracts an untyped JSON value, tolerating code fences and surrounding prose.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOutputParser;

impl OutputParser for JsonOutputParser {
    type Output = Value;

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        extract_json(text).ok_or_else(|| ParseError::NoJson {
            raw: text.to_owned(),
        })
    }

    fn format_instructions(&self) -> Option<String> {
        Some("Return a JSON object.".to_owned())
    }
}

/// Parses the completion into `T`, instructing the model with `T`'s JSON schema.
pub struct StructuredOutputParser<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> StructuredOutputParser<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for StructuredOutputParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OutputParser for StructuredOutputParser<T>
where
    T: JsonSchema + DeserializeOwned,
{
    type Output = T;

    fn parse(&self, text: &str) -> Result<T, ParseError> {
        let value = JsonOutputParser.parse(text)?;
        serde_json::from_value(value).map_err(|source| ParseError::Invalid {
            raw: text.to_owned(),
            source,
        })
    }

    fn format_instructions(&self) -> Option<String> {
        let schema = serde_json::to_string_pretty(&schema_for!(T)).unwrap_or_default();
        Some(format!(
            "The output should be formatted as a JSON instance that conforms to the JSON schema below.\n\
             ```json\n{schema}\n```\n\
             Respond with the JSON object only."
        ))
    }
}

/// Wraps a parser; when parsing fails, asks the model once to rewrite its output.
pub struct OutputFixingParser<P> {
    parser: P,
    model: Arc<dyn ChatModel>,
}

impl<P: OutputParser> OutputFixingParser<P> {
    pub fn new(parser: P, model: Arc<dyn ChatModel>) -> Self {
        Self { parser, model }
    }

    pub fn format_instructions(&self) -> Option<String> {
        self.parser.format_instructions()
    }

    pub async fn parse(&self, text: &str) -> Result<P::Output, StructuredError> {
        let err = match self.parser.parse(text) {
            Ok(output) => return Ok(output),
            Err(err) => err,
        };
        warn!(error = %err, "model output did not parse, asking for a fix");

        let instructions = self.parser.format_instructions().unwrap_or_default();
        let request = ChatRequest::new(
            "You repair malformed model output. Reply with the corrected output only.",
            format!(
                "Instructions:\n{instructions}\n\nCompletion:\n{text}\n\nError:\n{err}\n\n\
                 Please try again. Only respond with an answer that satisfies the instructions above."
            ),
        );
        let fixed = self.model.chat(request).await?;
        Ok(self.parser.parse(&fixed)?)
    }
}

/// One model call whose reply must parse into `T`.
///
/// The schema instructions are appended to the request preamble.
pub async fn structured_chat<T>(
    model: &dyn ChatModel,
    mut request: ChatRequest,
) -> Result<T, StructuredError>
where
    T: JsonSchema + DeserializeOwned,
{
    let parser = StructuredOutputParser::<T>::new();
    if let Some(instructions) = parser.format_instructions() {
        request.preamble = format!("{}\n\n{instructions}", request.preamble);
    }
    let response = model.chat(request).await?;
    Ok(parser.parse(&response)?)
}

/// Find the JSON value in a completion: the whole text, a fenced block, or the first
/// balanced object or array.
fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    if let Some(fenced) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str(fenced) {
            return Some(value);
        }
    }

    trimmed
        .char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .find_map(|(start, _)| {
            let end = balanced_end(&trimmed[start..])?;
            serde_json::from_str(&trimmed[start..start + end]).ok()
        })
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Byte length of the bracketed value at the start of `text`, skipping brackets in strings.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
