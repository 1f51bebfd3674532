use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::http::{self, HttpError};

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Http error: {0}")]
    HttpError(#[from] HttpError),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

/// A piece of text plus where it came from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: HashMap<String, String>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Turns an HTML page into readable text.
struct MarkupStripper {
    hidden: Regex,
    title: Regex,
    block: Regex,
    tag: Regex,
    blank_lines: Regex,
}

impl MarkupStripper {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            hidden: Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<!--.*?-->")?,
            title: Regex::new(r"(?is)<title[^>]*>(.*?)</title>")?,
            block: Regex::new(r"(?i)<(br|/p|/div|/h[1-6]|/li|/tr)\b[^>]*>")?,
            tag: Regex::new(r"(?s)<[^>]*>")?,
            blank_lines: Regex::new(r"\n\s*\n+")?,
        })
    }

    fn title(&self, html: &str) -> Option<String> {
        self.title
            .captures(html)
            .map(|caps| decode_entities(caps[1].trim()))
            .filter(|title| !title.is_empty())
    }

    fn text(&self, html: &str) -> String {
        let text = self.hidden.replace_all(html, "");
        let text = self.block.replace_all(&text, "\n");
        let text = self.tag.replace_all(&text, "");
        let text = decode_entities(&text);
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        self.blank_lines
            .replace_all(lines.join("\n").trim(), "\n\n")
            .into_owned()
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Fetches a web page and keeps only its text.
pub struct WebPageLoader {
    client: Client,
    url: String,
    stripper: MarkupStripper,
}

impl WebPageLoader {
    pub fn new(url: impl Into<String>) -> Result<Self, LoaderError> {
        Ok(Self {
            client: http::client()?,
            url: url.into(),
            stripper: MarkupStripper::new()?,
        })
    }

    pub async fn load(&self) -> Result<Vec<Document>, LoaderError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(HttpError::transport("web page"))?;
        http::check_status("web page", response.status())?;
        let html = response
            .text()
            .await
            .map_err(HttpError::transport("web page"))?;
        info!(url = %self.url, bytes = html.len(), "page loaded");
        Ok(vec![self.to_document(&html)])
    }

    fn to_document(&self, html: &str) -> Document {
        let mut document =
            Document::new(self.stripper.text(html)).with_metadata("source", self.url.as_str());
        if let Some(title) = self.stripper.title(html) {
            document = document.with_metadata("title", title);
        }
        document
    }
}

/// Reads a UTF-8 text file as one document.
pub struct TextLoader {
    path: PathBuf,
}

impl TextLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub async fn load(&self) -> Result<Vec<Document>, LoaderError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| LoaderError::Io {
                path: self.path.clone(),
                source,
            })?;
        let document =
            Document::new(content).with_metadata("source", self.path.display().to_string());
        Ok(vec![document])
    }
}
