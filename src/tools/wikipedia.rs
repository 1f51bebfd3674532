use std::time::Instant;

use futures::future::BoxFuture;
use reqwest::Client;
use rig::completion::ToolDefinition;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{Tool, ToolError, definition_for, parse_args};
use crate::http::{self, HttpError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WikipediaSearchResult {
    pub title: String,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WikipediaSearchResponse {
    pub query: String,
    pub results: Vec<WikipediaSearchResult>,
    /// Seconds spent waiting for Wikipedia.
    pub response_time: f64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    query: Option<ApiQuery>,
}

#[derive(Debug, Deserialize)]
struct ApiQuery {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    title: String,
    #[serde(default)]
    index: u32,
    #[serde(default)]
    extract: String,
}

/// Looks up article introductions with the MediaWiki search API.
#[derive(Clone)]
pub struct WikipediaSearcher {
    client: Client,
    endpoint: String,
    top_k: u32,
}

impl WikipediaSearcher {
    pub fn new(top_k: u32) -> Result<Self, HttpError> {
        Ok(Self {
            client: http::client()?,
            endpoint: "https://en.wikipedia.org/w/api.php".to_owned(),
            top_k,
        })
    }

    /// Search another language edition, e.g. `de`.
    pub fn language(mut self, language: &str) -> Self {
        self.endpoint = format!("https://{language}.wikipedia.org/w/api.php");
        self
    }

    pub async fn get_summaries(&self, query: &str) -> Result<WikipediaSearchResponse, HttpError> {
        let started = Instant::now();
        let limit = self.top_k.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("generator", "search"),
                ("gsrsearch", query),
                ("gsrlimit", limit.as_str()),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("exlimit", "max"),
                ("redirects", "1"),
            ])
            .send()
            .await
            .map_err(HttpError::transport("wikipedia"))?;
        let body: ApiResponse = http::decode_json("wikipedia", response).await?;
        let results = ranked_results(body);
        let response_time = started.elapsed().as_secs_f64();
        debug!(query, results = results.len(), response_time, "wikipedia search");
        Ok(WikipediaSearchResponse {
            query: query.to_owned(),
            results,
            response_time,
        })
    }
}

/// Pages come back unordered; `index` is the search rank.
fn ranked_results(body: ApiResponse) -> Vec<WikipediaSearchResult> {
    let mut pages = body.query.map(|q| q.pages).unwrap_or_default();
    pages.sort_by_key(|page| page.index);
    pages
        .into_iter()
        .map(|page| WikipediaSearchResult {
            title: page.title,
            content: page.extract,
        })
        .collect()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WikipediaSearchArgs {
    /// The search query.
    pub query: String,
}

/// [WikipediaSearcher] exposed as an agent tool.
pub struct WikipediaSearch {
    searcher: WikipediaSearcher,
}

impl WikipediaSearch {
    pub fn new(searcher: WikipediaSearcher) -> Self {
        Self { searcher }
    }
}

impl Tool for WikipediaSearch {
    fn name(&self) -> &'static str {
        "wikipedia_search"
    }

    fn definition(&self) -> ToolDefinition {
        definition_for::<WikipediaSearchArgs>(
            self.name(),
            "Search Wikipedia and return the introduction of the best matching articles.",
        )
    }

    fn call(&self, args: Value) -> BoxFuture<'static, Result<String, ToolError>> {
        let searcher = self.searcher.clone();
        let args = parse_args::<WikipediaSearchArgs>(self.name(), args);
        Box::pin(async move {
            let response = searcher.get_summaries(&args?.query).await?;
            if response.results.is_empty() {
                return Ok("No Wikipedia articles found.".to_owned());
            }
            Ok(response
                .results
                .iter()
                .map(|result| format!("Title: {}\nContent: {}", result.title, result.content))
                .collect::<Vec<_>>()
                .join("\n\n"))
        })
    }
}
