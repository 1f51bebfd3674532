//! Multi-step model workflows.
//!
//! * [review_loop]: a summarizer and a reviewer iterate until approval or a round cap.
//! * [react]: an agent alternates between reasoning and tool calls until it answers.
//!
//! Both are driven by explicit state enums; [graph::StepGraph] holds the declared
//! topology the review loop checks itself against.

pub mod graph;
pub mod react;
pub mod review_loop;

pub use graph::{END, GraphError, START, StepGraph};
pub use react::{AgentStep, DEFAULT_MAX_STEPS, ReactAgent, ReactError, ReactOutcome};
pub use review_loop::{ReviewOutcome, ReviewVerdict, ReviewWorkflow, SummaryRecord, WorkflowError};
