//! Summarizing documents that may not fit in one prompt.
//!
//! * `stuff`: everything in one prompt.
//! * `map_reduce`: summarize each document concurrently, then combine the summaries.
//! * `refine`: walk the documents in order, refining a running summary.

use std::{str::FromStr, sync::Arc};

use futures::future::try_join_all;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    loader::Document,
    model::{ChatModel, ChatRequest, ModelError},
    prompt::{PromptError, PromptTemplate},
    vars,
};

const SUMMARY_PROMPT: &str = "Write a concise summary of the following:\n\n\"{text}\"\n\nCONCISE SUMMARY:";

const REFINE_PROMPT: &str = "Your job is to produce a final summary.\n\
We have provided an existing summary up to a certain point: {existing_answer}\n\
We have the opportunity to refine the existing summary (only if needed) with some more context below.\n\
------------\n\
{text}\n\
------------\n\
Given the new context, refine the original summary.\n\
If the context isn't useful, return the original summary.";

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("Model error: {0}")]
    ModelError(#[from] ModelError),
    #[error("Prompt error: {0}")]
    PromptError(#[from] PromptError),
    #[error("Nothing to summarize")]
    NoDocuments,
    #[error("Unknown summary strategy: {0}")]
    UnknownStrategy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStrategy {
    Stuff,
    MapReduce,
    Refine,
}

impl FromStr for SummaryStrategy {
    type Err = SummarizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "stuff" => Ok(Self::Stuff),
            "map_reduce" => Ok(Self::MapReduce),
            "refine" => Ok(Self::Refine),
            other => Err(SummarizeError::UnknownStrategy(other.to_owned())),
        }
    }
}

/// The final summary and, for multi-step strategies, what each step produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryOutput {
    pub output_text: String,
    pub intermediate_steps: Vec<String>,
}

pub struct Summarizer {
    model: Arc<dyn ChatModel>,
    summary_prompt: PromptTemplate,
    combine_prompt: PromptTemplate,
    refine_prompt: PromptTemplate,
}

impl Summarizer {
    pub fn new(model: Arc<dyn ChatModel>) -> Result<Self, SummarizeError> {
        let summary_prompt = PromptTemplate::from_template(SUMMARY_PROMPT)?;
        Ok(Self {
            model,
            combine_prompt: summary_prompt.clone(),
            summary_prompt,
            refine_prompt: PromptTemplate::from_template(REFINE_PROMPT)?,
        })
    }

    /// Use a custom prompt for summarizing single chunks. It must take `{text}`.
    pub fn with_summary_prompt(mut self, template: PromptTemplate) -> Self {
        self.summary_prompt = template;
        self
    }

    /// Use a custom prompt for combining chunk summaries. It must take `{text}`.
    pub fn with_combine_prompt(mut self, template: PromptTemplate) -> Self {
        self.combine_prompt = template;
        self
    }

    pub async fn summarize(
        &self,
        strategy: SummaryStrategy,
        documents: &[Document],
    ) -> Result<SummaryOutput, SummarizeError> {
        info!(?strategy, documents = documents.len(), "summarizing");
        match strategy {
            SummaryStrategy::Stuff => Ok(SummaryOutput {
                output_text: self.stuff(documents).await?,
                intermediate_steps: Vec::new(),
            }),
            SummaryStrategy::MapReduce => self.map_reduce(documents).await,
            SummaryStrategy::Refine => self.refine(documents).await,
        }
    }

    pub async fn stuff(&self, documents: &[Document]) -> Result<String, SummarizeError> {
        if documents.is_empty() {
            return Err(SummarizeError::NoDocuments);
        }
        self.complete(&self.summary_prompt, &join_contents(documents))
            .await
    }

    pub async fn map_reduce(&self, documents: &[Document]) -> Result<SummaryOutput, SummarizeError> {
        if documents.is_empty() {
            return Err(SummarizeError::NoDocuments);
        }
        let intermediate_steps = try_join_all(
            documents
                .iter()
                .map(|document| self.complete(&self.summary_prompt, &document.content)),
        )
        .await?;
        debug!(summaries = intermediate_steps.len(), "map step done");

        let output_text = self
            .complete(&self.combine_prompt, &intermediate_steps.join("\n\n"))
            .await?;
        Ok(SummaryOutput {
            output_text,
            intermediate_steps,
        })
    }

    pub async fn refine(&self, documents: &[Document]) -> Result<SummaryOutput, SummarizeError> {
        let Some((first, rest)) = documents.split_first() else {
            return Err(SummarizeError::NoDocuments);
        };
        let mut summary = self.complete(&self.summary_prompt, &first.content).await?;
        let mut intermediate_steps = vec![summary.clone()];

        for document in rest {
            let prompt = self.refine_prompt.format(&vars! {
                "existing_answer" => summary,
                "text" => document.content,
            })?;
            summary = self.model.chat(ChatRequest::new("", prompt)).await?;
            intermediate_steps.push(summary.clone());
            debug!(step = intermediate_steps.len(), "summary refined");
        }

        Ok(SummaryOutput {
            output_text: summary,
            intermediate_steps,
        })
    }

    async fn complete(&self, template: &PromptTemplate, text: &str) -> Result<String, SummarizeError> {
        let prompt = template.format(&vars! {"text" => text})?;
        Ok(self.model.chat(ChatRequest::new("", prompt)).await?)
    }
}

fn join_contents(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|document| document.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::ScriptedModel;

    fn documents() -> Vec<Document> {
        vec![
            Document::new("Agents plan."),
            Document::new("Agents remember."),
            Document::new("Agents use tools."),
        ]
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!("stuff".parse::<SummaryStrategy>().unwrap(), SummaryStrategy::Stuff);
        assert_eq!(
            "map-reduce".parse::<SummaryStrategy>().unwrap(),
            SummaryStrategy::MapReduce
        );
        assert_eq!("Refine".parse::<SummaryStrategy>().unwrap(), SummaryStrategy::Refine);
        assert!("tldr".parse::<SummaryStrategy>().is_err());
    }

    #[tokio::test]
    async fn stuff_uses_one_call() {
        let model = ScriptedModel::new(["All about agents."]);
        let summarizer = Summarizer::new(Arc::new(model.clone())).unwrap();
        let summary = summarizer.stuff(&documents()).await.unwrap();

        assert_eq!(summary, "All about agents.");
        assert_eq!(model.calls(), 1);
        let prompt = &model.requests()[0].prompt;
        assert!(prompt.starts_with("Write a concise summary of the following:"));
        assert!(prompt.contains("Agents plan.\n\nAgents remember.\n\nAgents use tools."));
    }

    #[tokio::test]
    async fn map_reduce_keeps_intermediate_steps() {
        let model = ScriptedModel::new(["plan", "memory", "tools", "plan, memory, tools"]);
        let summarizer = Summarizer::new(Arc::new(model.clone())).unwrap();
        let output = summarizer.map_reduce(&documents()).await.unwrap();

        assert_eq!(output.intermediate_steps.len(), 3);
        assert_eq!(output.output_text, "plan, memory, tools");
        assert_eq!(model.calls(), 4);
        assert!(model.requests()[3].prompt.contains("plan\n\nmemory\n\ntools"));
    }

    #[tokio::test]
    async fn refine_walks_in_order() {
        let model = ScriptedModel::new(["v1", "v2", "v3"]);
        let summarizer = Summarizer::new(Arc::new(model.clone())).unwrap();
        let output = summarizer
            .summarize(SummaryStrategy::Refine, &documents())
            .await
            .unwrap();

        assert_eq!(output.output_text, "v3");
        assert_eq!(output.intermediate_steps, vec!["v1", "v2", "v3"]);
        let requests = model.requests();
        assert!(requests[1].prompt.contains("existing summary up to a certain point: v1"));
        assert!(requests[2].prompt.contains("Agents use tools."));
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let summarizer = Summarizer::new(Arc::new(ScriptedModel::default())).unwrap();
        assert!(matches!(
            summarizer.refine(&[]).await,
            Err(SummarizeError::NoDocuments)
        ));
    }
}
