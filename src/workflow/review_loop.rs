//! The iterative summarize/review loop.
//!
//! A summarizer condenses a set of articles, a reviewer judges the latest summary, and a
//! router decides whether another round is needed:
//!
//! ```text
//! START -> summarizer -> reviewer -> (summarizer | final_step) -> END
//! ```
//!
//! The router is the pure function [route]; the loop is bounded by `max_iterations`
//! summarizer rounds whatever the reviewer says.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use super::graph::{END, GraphError, START, StepGraph};
use crate::{
    conversation::{Conversation, Role},
    model::{ChatModel, ChatRequest},
    output_parser::{StructuredError, structured_chat},
    search::{Article, SearchClient, SearchError},
};

pub const SUMMARIZER: &str = "summarizer";
pub const REVIEWER: &str = "reviewer";
pub const FINAL_STEP: &str = "final_step";

/// Appended to the transcript when the loop ends.
pub const COMPLETION_MARKER: &str = "**Workflow Completed**";

const SEARCH_PREFIX: &str = "Give me the latest news on the following subject: ";

const SUMMARIZER_PREAMBLE: &str = "You are an expert summarizer. Summarize the provided articles clearly, accurately, and concisely. \
Include key points and direct links to the original sources. Ensure the summary is well-structured and readable.";

const REVIEWER_PREAMBLE: &str = "You are an expert reviewer. Assess the summary for accuracy, clarity, and completeness. \
Provide constructive feedback on any needed improvements. If the summary is satisfactory, approve it.";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Step {step} failed: {source}")]
    StepFailed {
        step: &'static str,
        #[source]
        source: StructuredError,
    },
    #[error("Search error: {0}")]
    SearchError(#[from] SearchError),
    #[error("Graph error: {0}")]
    GraphError(#[from] GraphError),
    #[error("Transition {from} -> {to} is not declared")]
    UndeclaredTransition {
        from: &'static str,
        to: &'static str,
    },
    #[error("max_iterations must be at least 1")]
    InvalidMaxIterations,
}

/// Where the loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Summarizing,
    Reviewing,
    Done,
}

/// Decide what follows a review.
///
/// Approval ends the loop. Otherwise another summarizer round runs while fewer than
/// `max_iterations` rounds have happened.
pub fn route(approved: bool, iteration: u32, max_iterations: u32) -> LoopState {
    if approved || iteration >= max_iterations {
        LoopState::Done
    } else {
        LoopState::Summarizing
    }
}

/// What the summarizer must return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryRecord {
    /// Status message about the summarization process.
    pub message: String,
    /// A concise summary of the input text.
    pub summary: String,
}

/// What the reviewer must return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewVerdict {
    /// Review feedback message.
    pub message: String,
    /// Indicates if the summary is approved.
    pub approved: bool,
}

/// One executed step and the transcript length right after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: &'static str,
    pub transcript_len: usize,
}

#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub conversation: Conversation,
    pub summaries: Vec<String>,
    pub iterations: u32,
    pub approved: bool,
    pub steps: Vec<StepRecord>,
}

impl ReviewOutcome {
    /// The summary the loop ended with.
    pub fn final_summary(&self) -> Option<&str> {
        self.summaries.last().map(String::as_str)
    }
}

struct LoopContext {
    conversation: Conversation,
    articles: String,
    summaries: Vec<String>,
    approved: bool,
    iteration: u32,
    steps: Vec<StepRecord>,
}

pub struct ReviewWorkflow {
    model: Arc<dyn ChatModel>,
    max_iterations: u32,
    graph: StepGraph,
}

impl ReviewWorkflow {
    pub fn new(model: Arc<dyn ChatModel>, max_iterations: u32) -> Result<Self, WorkflowError> {
        if max_iterations == 0 {
            return Err(WorkflowError::InvalidMaxIterations);
        }
        let mut graph = StepGraph::new();
        graph
            .add_step(SUMMARIZER)?
            .add_step(REVIEWER)?
            .add_step(FINAL_STEP)?;
        graph
            .add_edge(START, SUMMARIZER)?
            .add_edge(SUMMARIZER, REVIEWER)?
            .add_conditional_edges(REVIEWER, &[SUMMARIZER, FINAL_STEP])?
            .add_edge(FINAL_STEP, END)?;
        graph.validate()?;

        Ok(Self {
            model,
            max_iterations,
            graph,
        })
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn graph(&self) -> &StepGraph {
        &self.graph
    }

    /// Search for news on `topic` and run the loop over the results.
    pub async fn search_and_run(
        &self,
        search: &dyn SearchClient,
        topic: &str,
    ) -> Result<ReviewOutcome, WorkflowError> {
        let response = search.search(format!("{SEARCH_PREFIX}{topic}")).await?;
        info!(results = response.results.len(), "search results received");
        self.run(response.articles()).await
    }

    /// Run the loop to completion over a fixed set of articles.
    pub async fn run(&self, articles: Vec<Article>) -> Result<ReviewOutcome, WorkflowError> {
        let span = info_span!("review_workflow", run_id = %Uuid::new_v4());
        self.run_loop(articles).instrument(span).await
    }

    async fn run_loop(&self, articles: Vec<Article>) -> Result<ReviewOutcome, WorkflowError> {
        let articles = serde_json::to_string_pretty(&articles).unwrap_or_default();
        let mut ctx = LoopContext {
            conversation: Conversation::new(),
            articles,
            summaries: Vec::new(),
            approved: false,
            iteration: 0,
            steps: Vec::new(),
        };

        let mut state = LoopState::Summarizing;
        let mut previous = START;
        loop {
            let next = match state {
                LoopState::Summarizing => SUMMARIZER,
                LoopState::Reviewing => REVIEWER,
                LoopState::Done => FINAL_STEP,
            };
            self.transition(previous, next)?;
            previous = next;

            state = match state {
                LoopState::Summarizing => {
                    self.summarize(&mut ctx).await?;
                    LoopState::Reviewing
                }
                LoopState::Reviewing => {
                    self.review(&mut ctx).await?;
                    route(ctx.approved, ctx.iteration, self.max_iterations)
                }
                LoopState::Done => {
                    ctx.conversation
                        .add(Role::assistant("workflow"), COMPLETION_MARKER);
                    ctx.steps.push(StepRecord {
                        step: FINAL_STEP,
                        transcript_len: ctx.conversation.len(),
                    });
                    self.transition(FINAL_STEP, END)?;
                    break;
                }
            };
        }

        info!(
            iterations = ctx.iteration,
            approved = ctx.approved,
            "review workflow completed"
        );
        Ok(ReviewOutcome {
            conversation: ctx.conversation,
            summaries: ctx.summaries,
            iterations: ctx.iteration,
            approved: ctx.approved,
            steps: ctx.steps,
        })
    }

    fn transition(&self, from: &'static str, to: &'static str) -> Result<(), WorkflowError> {
        if !self.graph.has_edge(from, to) {
            return Err(WorkflowError::UndeclaredTransition { from, to });
        }
        debug!(from, to, "transition");
        Ok(())
    }

    async fn summarize(&self, ctx: &mut LoopContext) -> Result<(), WorkflowError> {
        let request = ChatRequest::new(
            format!("{SUMMARIZER_PREAMBLE}\n\nArticles to summarize: {}", ctx.articles),
            "Write the summary now, addressing any reviewer feedback above.",
        )
        .with_history(ctx.conversation.history());

        let record: SummaryRecord = structured_chat(self.model.as_ref(), request)
            .await
            .map_err(|source| WorkflowError::StepFailed {
                step: SUMMARIZER,
                source,
            })?;

        ctx.conversation
            .add(Role::assistant(SUMMARIZER), record.summary.as_str());
        ctx.conversation
            .add(Role::assistant(SUMMARIZER), record.message.as_str());
        ctx.summaries.push(record.summary);
        ctx.iteration += 1;
        ctx.steps.push(StepRecord {
            step: SUMMARIZER,
            transcript_len: ctx.conversation.len(),
        });
        info!(iteration = ctx.iteration, "summary drafted");
        Ok(())
    }

    async fn review(&self, ctx: &mut LoopContext) -> Result<(), WorkflowError> {
        let request = ChatRequest::new(REVIEWER_PREAMBLE, "Review the latest summary.")
            .with_history(ctx.conversation.history());

        let verdict: ReviewVerdict = structured_chat(self.model.as_ref(), request)
            .await
            .map_err(|source| WorkflowError::StepFailed {
                step: REVIEWER,
                source,
            })?;

        ctx.conversation
            .add(Role::assistant(REVIEWER), verdict.message.as_str());
        ctx.approved = verdict.approved;
        ctx.steps.push(StepRecord {
            step: REVIEWER,
            transcript_len: ctx.conversation.len(),
        });
        info!(
            iteration = ctx.iteration,
            approved = verdict.approved,
            "summary reviewed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::testing::ScriptedModel,
        output_parser::ParseError,
        search::{MockSearchClient, SearchResponse, SearchResult},
    };

    fn summary(n: u32) -> String {
        format!(r#"{{"message": "Draft {n} ready", "summary": "Summary {n}"}}"#)
    }

    fn review(approved: bool) -> String {
        format!(r#"{{"message": "Feedback approved={approved}", "approved": {approved}}}"#)
    }

    /// A script that rejects `rejections` times, then approves.
    fn script(rejections: u32, approve: bool) -> Vec<String> {
        let mut responses = Vec::new();
        for n in 1..=rejections {
            responses.push(summary(n));
            responses.push(review(false));
        }
        if approve {
            responses.push(summary(rejections + 1));
            responses.push(review(true));
        }
        responses
    }

    fn articles() -> Vec<Article> {
        vec![Article {
            title: "Rust 2024 edition".to_owned(),
            url: "https://example.com/rust".to_owned(),
            content: "The 2024 edition is stable.".to_owned(),
        }]
    }

    fn workflow(model: &ScriptedModel, max_iterations: u32) -> ReviewWorkflow {
        ReviewWorkflow::new(Arc::new(model.clone()), max_iterations).unwrap()
    }

    #[test]
    fn router_table() {
        assert_eq!(route(true, 1, 25), LoopState::Done);
        assert_eq!(route(true, 25, 25), LoopState::Done);
        assert_eq!(route(false, 1, 25), LoopState::Summarizing);
        assert_eq!(route(false, 24, 25), LoopState::Summarizing);
        assert_eq!(route(false, 25, 25), LoopState::Done);
        assert_eq!(route(false, 30, 25), LoopState::Done);
    }

    #[tokio::test]
    async fn approval_stops_the_loop() {
        for approve_at in 1..=4u32 {
            let model = ScriptedModel::new(script(approve_at - 1, true));
            let outcome = workflow(&model, 25).run(articles()).await.unwrap();

            assert!(outcome.approved);
            assert_eq!(outcome.iterations, approve_at);
            assert_eq!(outcome.summaries.len(), approve_at as usize);
            assert_eq!(outcome.final_summary(), Some(format!("Summary {approve_at}").as_str()));
            assert_eq!(model.calls(), 2 * approve_at as usize);
        }
    }

    #[tokio::test]
    async fn cap_forces_termination() {
        let max_iterations = 3;
        let model = ScriptedModel::new(script(max_iterations + 2, false));
        let outcome = workflow(&model, max_iterations).run(articles()).await.unwrap();

        assert!(!outcome.approved);
        assert_eq!(outcome.iterations, max_iterations);
        assert_eq!(model.calls(), 2 * max_iterations as usize);
        assert_eq!(
            outcome.conversation.last().map(|m| m.content.as_str()),
            Some(COMPLETION_MARKER)
        );
    }

    #[test]
    fn zero_round_cap_is_rejected() {
        let model = ScriptedModel::new(script(1, true));
        let result = ReviewWorkflow::new(Arc::new(model.clone()), 0);

        assert!(matches!(result, Err(WorkflowError::InvalidMaxIterations)));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn transcript_only_grows() {
        let model = ScriptedModel::new(script(2, true));
        let outcome = workflow(&model, 25).run(articles()).await.unwrap();

        let steps: Vec<_> = outcome.steps.iter().map(|record| record.step).collect();
        assert_eq!(
            steps,
            vec![
                SUMMARIZER, REVIEWER, SUMMARIZER, REVIEWER, SUMMARIZER, REVIEWER, FINAL_STEP
            ]
        );
        assert!(
            outcome
                .steps
                .windows(2)
                .all(|pair| pair[0].transcript_len < pair[1].transcript_len)
        );
        // summary + status per round, feedback per review, one marker
        assert_eq!(outcome.conversation.len(), 3 * 2 + 3 + 1);

        let history = outcome.conversation.history();
        assert_eq!(history[0].content.as_str(), "Summary 1");
        assert_eq!(history[1].content.as_str(), "Draft 1 ready");
        assert_eq!(history[2].content.as_str(), "Feedback approved=false");
    }

    #[tokio::test]
    async fn model_sees_running_transcript() {
        let model = ScriptedModel::new(script(1, true));
        workflow(&model, 25).run(articles()).await.unwrap();

        let requests = model.requests();
        assert!(requests[0].history.is_empty());
        assert!(requests[0].preamble.contains("https://example.com/rust"));
        assert!(requests[0].preamble.contains("JSON schema"));
        assert_eq!(requests[1].history.len(), 2);
        assert_eq!(requests[2].history.len(), 3);
        assert!(requests[3].preamble.starts_with("You are an expert reviewer."));
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_transcripts() {
        let first = ScriptedModel::new(script(2, true));
        let second = ScriptedModel::new(script(2, true));
        let a = workflow(&first, 25).run(articles()).await.unwrap();
        let b = workflow(&second, 25).run(articles()).await.unwrap();
        assert_eq!(a.conversation.fingerprint(), b.conversation.fingerprint());
        assert_eq!(a.summaries, b.summaries);
    }

    #[tokio::test]
    async fn malformed_summary_fails_the_run() {
        let model = ScriptedModel::new(["I cannot produce JSON today."]);
        let err = workflow(&model, 25).run(articles()).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::StepFailed {
                step: SUMMARIZER,
                source: StructuredError::ParseError(ParseError::NoJson { .. })
            }
        ));
    }

    #[tokio::test]
    async fn searches_with_prefixed_topic() {
        let mut search = MockSearchClient::new();
        search
            .expect_search()
            .withf(|query| {
                query == "Give me the latest news on the following subject: rust compiler"
            })
            .times(1)
            .returning(|query| {
                let response = SearchResponse {
                    query,
                    follow_up_questions: None,
                    answer: None,
                    images: Vec::new(),
                    results: vec![SearchResult {
                        title: "rustc 1.90".to_owned(),
                        url: "https://example.com/rustc".to_owned(),
                        content: "Faster builds.".to_owned(),
                        score: 0.9,
                        raw_content: None,
                    }],
                    response_time: 0.3,
                };
                Box::pin(async move { Ok(response) })
            });

        let model = ScriptedModel::new(script(0, true));
        let outcome = workflow(&model, 25)
            .search_and_run(&search, "rust compiler")
            .await
            .unwrap();
        assert!(outcome.approved);
        assert!(model.requests()[0].preamble.contains("https://example.com/rustc"));
    }

    #[test]
    fn declared_topology() {
        let model = ScriptedModel::default();
        let workflow = workflow(&model, 25);
        assert_eq!(
            workflow.graph().successors(REVIEWER).unwrap(),
            vec![FINAL_STEP, SUMMARIZER]
        );
        assert!(workflow.graph().to_dot().contains(FINAL_STEP));
    }
}
