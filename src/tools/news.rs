use std::sync::Arc;

use futures::future::BoxFuture;
use rig::completion::ToolDefinition;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{Tool, ToolError, definition_for, parse_args};
use crate::search::{SearchClient, SearchResponse};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LatestNewsArgs {
    /// City to fetch news for.
    pub city: String,
}

/// Recent news about a city, through the search collaborator.
pub struct LatestNews {
    search: Arc<dyn SearchClient>,
}

impl LatestNews {
    pub fn new(search: Arc<dyn SearchClient>) -> Self {
        Self { search }
    }
}

fn render_news(city: &str, response: &SearchResponse) -> String {
    let news = response
        .results
        .iter()
        .map(|result| {
            format!(
                "Title: {}\nURL: {}\nContent: {}\n",
                result.title, result.url, result.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("Latest news in {city}:\n{news}")
}

impl Tool for LatestNews {
    fn name(&self) -> &'static str {
        "get_latest_news"
    }

    fn definition(&self) -> ToolDefinition {
        definition_for::<LatestNewsArgs>(
            self.name(),
            "Fetch the latest news articles for a given city.",
        )
    }

    fn call(&self, args: Value) -> BoxFuture<'static, Result<String, ToolError>> {
        let search = Arc::clone(&self.search);
        let args = parse_args::<LatestNewsArgs>(self.name(), args);
        Box::pin(async move {
            let city = args?.city;
            let response = search.search(format!("latest news in {city}")).await?;
            Ok(render_news(&city, &response))
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WebSearchArgs {
    /// The search query.
    pub query: String,
}

/// General web search, returning ranked snippets.
pub struct WebSearch {
    search: Arc<dyn SearchClient>,
}

impl WebSearch {
    pub fn new(search: Arc<dyn SearchClient>) -> Self {
        Self { search }
    }
}

impl Tool for WebSearch {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn definition(&self) -> ToolDefinition {
        definition_for::<WebSearchArgs>(
            self.name(),
            "Search the web for current information. Returns titles, links and snippets.",
        )
    }

    fn call(&self, args: Value) -> BoxFuture<'static, Result<String, ToolError>> {
        let search = Arc::clone(&self.search);
        let args = parse_args::<WebSearchArgs>(self.name(), args);
        Box::pin(async move {
            let response = search.search(args?.query).await?;
            let mut out = String::new();
            if let Some(answer) = &response.answer {
                out.push_str(&format!("Answer: {answer}\n\n"));
            }
            for (rank, result) in response.results.iter().enumerate() {
                out.push_str(&format!(
                    "{}. {} ({})\n{}\n",
                    rank + 1,
                    result.title,
                    result.url,
                    result.content
                ));
            }
            if response.results.is_empty() {
                out.push_str("No results found.");
            }
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{MockSearchClient, SearchResult};

    fn response(query: &str) -> SearchResponse {
        SearchResponse {
            query: query.to_owned(),
            follow_up_questions: None,
            answer: None,
            images: Vec::new(),
            results: vec![SearchResult {
                title: "Bridge reopens".to_owned(),
                url: "https://example.com/bridge".to_owned(),
                content: "Traffic is flowing again.".to_owned(),
                score: 0.8,
                raw_content: None,
            }],
            response_time: 0.5,
        }
    }

    #[tokio::test]
    async fn news_queries_by_city() {
        let mut search = MockSearchClient::new();
        search
            .expect_search()
            .withf(|query| query == "latest news in Lisbon")
            .times(1)
            .returning(|query| {
                let response = response(&query);
                Box::pin(async move { Ok(response) })
            });

        let output = LatestNews::new(Arc::new(search))
            .call(serde_json::json!({"city": "Lisbon"}))
            .await
            .unwrap();
        assert_eq!(
            output,
            "Latest news in Lisbon:\nTitle: Bridge reopens\nURL: https://example.com/bridge\nContent: Traffic is flowing again.\n"
        );
    }

    #[tokio::test]
    async fn web_search_ranks_results() {
        let mut search = MockSearchClient::new();
        search.expect_search().returning(|query| {
            let mut response = response(&query);
            response.answer = Some("It reopened on Monday.".to_owned());
            Box::pin(async move { Ok(response) })
        });

        let output = WebSearch::new(Arc::new(search))
            .call(serde_json::json!({"query": "bridge"}))
            .await
            .unwrap();
        assert!(output.starts_with("Answer: It reopened on Monday.\n\n1. Bridge reopens"));
    }
}
