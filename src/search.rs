use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::http::{self, HttpError};

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search request failed: {0}")]
    HttpError(#[from] HttpError),
    #[cfg(test)]
    #[error("Test error: {0}")]
    TestError(String),
}

/// One hit from the search collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub score: f64,
    #[serde(default)]
    pub raw_content: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(default)]
    pub follow_up_questions: Option<Vec<String>>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub images: Vec<serde_json::Value>,
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub response_time: f64,
}

/// The part of a search hit the summarizer gets to see.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub content: String,
}

impl SearchResponse {
    pub fn articles(&self) -> Vec<Article> {
        self.results
            .iter()
            .map(|result| Article {
                title: result.title.clone(),
                url: result.url.clone(),
                content: result.content.clone(),
            })
            .collect()
    }
}

/// Keyword search over the web.
#[cfg_attr(test, mockall::automock)]
pub trait SearchClient: Send + Sync {
    fn search(&self, query: String) -> BoxFuture<'static, Result<SearchResponse, SearchError>>;
}

/// [SearchClient] for the Tavily search API.
#[derive(Clone)]
pub struct TavilyClient {
    client: Client,
    api_key: String,
    max_results: u32,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    include_answer: bool,
    include_raw_content: bool,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, HttpError> {
        Ok(Self {
            client: http::client()?,
            api_key: api_key.into(),
            max_results: 5,
            include_answer: false,
            include_raw_content: false,
        })
    }

    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn include_answer(mut self) -> Self {
        self.include_answer = true;
        self
    }

    pub fn include_raw_content(mut self) -> Self {
        self.include_raw_content = true;
        self
    }
}

impl SearchClient for TavilyClient {
    fn search(&self, query: String) -> BoxFuture<'static, Result<SearchResponse, SearchError>> {
        let this = self.clone();
        Box::pin(async move {
            let body = TavilyRequest {
                api_key: &this.api_key,
                query: &query,
                max_results: this.max_results,
                include_answer: this.include_answer,
                include_raw_content: this.include_raw_content,
            };
            let response = this
                .client
                .post(TAVILY_SEARCH_URL)
                .json(&body)
                .send()
                .await
                .map_err(HttpError::transport("tavily"))?;
            let response: SearchResponse = http::decode_json("tavily", response).await?;
            debug!(
                query = %response.query,
                results = response.results.len(),
                response_time = response.response_time,
                "tavily search"
            );
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "query": "latest news in Paris",
        "follow_up_questions": null,
        "answer": null,
        "images": [],
        "results": [
            {"title": "Seine reopens", "url": "https://example.com/a", "content": "Swimming is back.", "score": 0.91, "raw_content": null},
            {"title": "Metro strike", "url": "https://example.com/b", "content": "Lines 1 and 4 closed.", "score": 0.72}
        ],
        "response_time": 1.42
    }"#;

    #[test]
    fn decodes_tavily_payload() {
        let response: SearchResponse = serde_json::from_str(BODY).unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[1].raw_content, None);
        assert!((response.response_time - 1.42).abs() < 1e-9);
    }

    #[test]
    fn articles_drop_scores() {
        let response: SearchResponse = serde_json::from_str(BODY).unwrap();
        let articles = response.articles();
        assert_eq!(
            articles[0],
            Article {
                title: "Seine reopens".to_owned(),
                url: "https://example.com/a".to_owned(),
                content: "Swimming is back.".to_owned(),
            }
        );
        let json = serde_json::to_value(&articles[0]).unwrap();
        assert!(json.get("score").is_none());
    }

    #[test]
    fn request_body_shape() {
        let body = TavilyRequest {
            api_key: "tv",
            query: "rust",
            max_results: 5,
            include_answer: true,
            include_raw_content: false,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "api_key": "tv",
                "query": "rust",
                "max_results": 5,
                "include_answer": true,
                "include_raw_content": false
            })
        );
    }
}
