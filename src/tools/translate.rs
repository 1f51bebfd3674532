use futures::future::BoxFuture;
use reqwest::Client;
use rig::completion::ToolDefinition;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{Tool, ToolError, definition_for, parse_args};
use crate::http::{self, HttpError};

const MYMEMORY_URL: &str = "https://api.mymemory.translated.net/get";

/// Phrases every traveller needs.
pub const COMMON_PHRASES: [&str; 5] = [
    "Hello",
    "Thank you",
    "Where is the restroom?",
    "How much does this cost?",
    "Goodbye",
];

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TranslateArgs {
    /// Target language code, e.g. de or pt-BR.
    pub language: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyMemoryResponse {
    response_data: ResponseData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseData {
    translated_text: String,
}

/// Translates [COMMON_PHRASES] from English with the MyMemory API.
#[derive(Clone)]
pub struct TranslatePhrases {
    client: Client,
}

impl TranslatePhrases {
    pub fn new() -> Result<Self, HttpError> {
        Ok(Self {
            client: http::client()?,
        })
    }

    async fn translate(&self, phrase: &str, language: &str) -> Result<String, ToolError> {
        let langpair = format!("en|{language}");
        let response = self
            .client
            .get(MYMEMORY_URL)
            .query(&[("q", phrase), ("langpair", langpair.as_str())])
            .send()
            .await
            .map_err(HttpError::transport("mymemory"))?;
        let body: MyMemoryResponse = http::decode_json("mymemory", response).await?;
        Ok(body.response_data.translated_text)
    }
}

fn render(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(phrase, translated)| format!("{phrase} -> {translated}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Tool for TranslatePhrases {
    fn name(&self) -> &'static str {
        "translate_common_phrases"
    }

    fn definition(&self) -> ToolDefinition {
        definition_for::<TranslateArgs>(
            self.name(),
            "Translate common travel phrases into the given language.",
        )
    }

    fn call(&self, args: Value) -> BoxFuture<'static, Result<String, ToolError>> {
        let this = self.clone();
        let args = parse_args::<TranslateArgs>(self.name(), args);
        Box::pin(async move {
            let language = args?.language;
            let mut pairs = Vec::with_capacity(COMMON_PHRASES.len());
            for phrase in COMMON_PHRASES {
                pairs.push((phrase, this.translate(phrase, &language).await?));
            }
            Ok(render(&pairs))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mymemory_payload() {
        let body: MyMemoryResponse = serde_json::from_str(
            r#"{"responseData": {"translatedText": "Hallo", "match": 1}, "responseStatus": 200}"#,
        )
        .unwrap();
        assert_eq!(body.response_data.translated_text, "Hallo");
    }

    #[test]
    fn renders_pairs() {
        let pairs = [("Hello", "Hallo".to_owned()), ("Goodbye", "Tschüss".to_owned())];
        assert_eq!(render(&pairs), "Hello -> Hallo\nGoodbye -> Tschüss");
    }
}
