//! A reasoning/acting agent: the model either calls a tool or answers, and tool output is
//! fed back as an observation until it answers or runs out of steps.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::{
    conversation::{Conversation, Role},
    model::{ChatModel, ChatRequest},
    output_parser::{StructuredError, structured_chat},
    tools::Toolbox,
};

pub const DEFAULT_MAX_STEPS: usize = 10;

const AGENT_NAME: &str = "agent";

const REACT_PREAMBLE: &str = "You are a helpful assistant that answers questions by reasoning step by step. \
At every step either call exactly one of the available tools, or give the final answer once you have enough information.";

#[derive(Debug, Error)]
pub enum ReactError {
    #[error("Agent decision failed: {0}")]
    DecisionFailed(#[from] StructuredError),
    #[error("No final answer after {0} steps")]
    StepLimit(usize),
}

/// One decision of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentStep {
    /// Call a tool.
    ToolCall {
        /// Name of the tool to call.
        tool: String,
        /// Arguments matching the tool's schema.
        arguments: Value,
    },
    /// Answer the question.
    FinalAnswer {
        /// The answer for the user.
        answer: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Reasoning,
    Acting,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool: String,
    pub arguments: Value,
    pub observation: String,
    pub failed: bool,
}

#[derive(Debug, Clone)]
pub struct ReactOutcome {
    pub answer: String,
    pub conversation: Conversation,
    pub invocations: Vec<ToolInvocation>,
    pub steps: usize,
}

pub struct ReactAgent {
    model: Arc<dyn ChatModel>,
    toolbox: Toolbox,
    instructions: String,
    max_steps: usize,
}

impl ReactAgent {
    pub fn new(model: Arc<dyn ChatModel>, toolbox: Toolbox) -> Self {
        Self {
            model,
            toolbox,
            instructions: REACT_PREAMBLE.to_owned(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Replace the role description that opens the system prompt.
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn toolbox(&self) -> &Toolbox {
        &self.toolbox
    }

    fn preamble(&self) -> String {
        format!(
            "{}\n\nAvailable tools:\n{}",
            self.instructions,
            self.toolbox.catalogue()
        )
    }

    pub async fn run(&self, question: &str) -> Result<ReactOutcome, ReactError> {
        let span = info_span!("react_agent", run_id = %Uuid::new_v4());
        self.run_loop(question).instrument(span).await
    }

    async fn run_loop(&self, question: &str) -> Result<ReactOutcome, ReactError> {
        let preamble = self.preamble();
        let mut conversation = Conversation::new();
        conversation.add(Role::Human, question);

        let mut invocations = Vec::new();
        let mut pending = None;
        let mut answer = String::new();
        let mut state = AgentState::Reasoning;
        let mut steps = 0;

        while state != AgentState::Done {
            state = match state {
                AgentState::Reasoning => {
                    if steps >= self.max_steps {
                        warn!(steps, "step limit reached");
                        return Err(ReactError::StepLimit(self.max_steps));
                    }
                    steps += 1;

                    let request = ChatRequest::new(preamble.as_str(), "Decide on the next step.")
                        .with_history(conversation.history());
                    let step: AgentStep = structured_chat(self.model.as_ref(), request).await?;
                    conversation.add(
                        Role::assistant(AGENT_NAME),
                        serde_json::to_string(&step).unwrap_or_default(),
                    );

                    match step {
                        AgentStep::ToolCall { tool, arguments } => {
                            pending = Some((tool, arguments));
                            AgentState::Acting
                        }
                        AgentStep::FinalAnswer { answer: text } => {
                            answer = text;
                            AgentState::Done
                        }
                    }
                }
                AgentState::Acting => {
                    if let Some((tool, arguments)) = pending.take() {
                        invocations.push(self.act(&mut conversation, tool, arguments).await);
                    }
                    AgentState::Reasoning
                }
                AgentState::Done => AgentState::Done,
            };
        }

        info!(steps, tools = invocations.len(), "final answer");
        Ok(ReactOutcome {
            answer,
            conversation,
            invocations,
            steps,
        })
    }

    /// Run one tool call. Failures are observations too.
    async fn act(
        &self,
        conversation: &mut Conversation,
        tool: String,
        arguments: Value,
    ) -> ToolInvocation {
        let (observation, failed) = match self.toolbox.call(&tool, arguments.clone()).await {
            Ok(output) => (output, false),
            Err(err) => {
                warn!(tool = %tool, error = %err, "tool call failed");
                (format!("Error: {err}"), true)
            }
        };
        conversation.add(Role::Human, format!("Observation from {tool}: {observation}"));
        ToolInvocation {
            tool,
            arguments,
            observation,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;
    use rig::completion::ToolDefinition;

    use super::*;
    use crate::{
        model::testing::ScriptedModel,
        tools::{PercentageChange, Tool, ToolError},
    };

    struct Broken;

    impl Tool for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "broken".to_owned(),
                description: "Always fails.".to_owned(),
                parameters: serde_json::json!({"type": "object"}),
            }
        }

        fn call(&self, _args: Value) -> BoxFuture<'static, Result<String, ToolError>> {
            Box::pin(async {
                Err(ToolError::Failed {
                    tool: "broken",
                    detail: "service down".to_owned(),
                })
            })
        }
    }

    fn agent(model: &ScriptedModel) -> ReactAgent {
        let toolbox = Toolbox::new().with(PercentageChange).with(Broken);
        ReactAgent::new(Arc::new(model.clone()), toolbox)
    }

    #[test]
    fn step_wire_format() {
        let step: AgentStep = serde_json::from_str(
            r#"{"action": "tool_call", "tool": "web_search", "arguments": {"query": "rust"}}"#,
        )
        .unwrap();
        assert_eq!(
            step,
            AgentStep::ToolCall {
                tool: "web_search".to_owned(),
                arguments: serde_json::json!({"query": "rust"}),
            }
        );
    }

    #[tokio::test]
    async fn answers_directly() {
        let model = ScriptedModel::new([r#"{"action": "final_answer", "answer": "42"}"#]);
        let outcome = agent(&model).run("What is the answer?").await.unwrap();
        assert_eq!(outcome.answer, "42");
        assert_eq!(outcome.steps, 1);
        assert!(outcome.invocations.is_empty());
        assert!(model.requests()[0].preamble.contains("calculate_percentage_change"));
    }

    #[tokio::test]
    async fn feeds_observations_back() {
        let model = ScriptedModel::new([
            r#"{"action": "tool_call", "tool": "calculate_percentage_change", "arguments": {"today_price": 110.0, "yesterday_price": 100.0}}"#,
            r#"{"action": "final_answer", "answer": "Up 10%."}"#,
        ]);
        let outcome = agent(&model).run("How did it move?").await.unwrap();

        assert_eq!(outcome.answer, "Up 10%.");
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.invocations.len(), 1);
        assert!(!outcome.invocations[0].failed);

        // question, decision, observation, decision
        assert_eq!(outcome.conversation.len(), 4);
        let second = &model.requests()[1];
        assert_eq!(second.history.len(), 3);
        assert!(
            second.history[2]
                .content
                .as_str()
                .starts_with("Observation from calculate_percentage_change:")
        );
    }

    #[tokio::test]
    async fn tool_errors_become_observations() {
        let model = ScriptedModel::new([
            r#"{"action": "tool_call", "tool": "broken", "arguments": {}}"#,
            r#"{"action": "tool_call", "tool": "missing", "arguments": {}}"#,
            r#"{"action": "final_answer", "answer": "Sorry."}"#,
        ]);
        let outcome = agent(&model).run("Try it").await.unwrap();

        assert_eq!(outcome.answer, "Sorry.");
        assert!(outcome.invocations.iter().all(|call| call.failed));
        assert_eq!(outcome.invocations[0].observation, "Error: broken failed: service down");
        assert_eq!(outcome.invocations[1].observation, "Error: Unknown tool: missing");
    }

    #[tokio::test]
    async fn stops_at_step_limit() {
        let call = r#"{"action": "tool_call", "tool": "broken", "arguments": {}}"#;
        let model = ScriptedModel::new(std::iter::repeat_n(call, 5));
        let err = agent(&model).max_steps(3).run("Loop forever").await.unwrap_err();
        assert!(matches!(err, ReactError::StepLimit(3)));
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn unparseable_decision_is_an_error() {
        let model = ScriptedModel::new(["I think I should search."]);
        let err = agent(&model).run("?").await.unwrap_err();
        assert!(matches!(err, ReactError::DecisionFailed(StructuredError::ParseError(_))));
    }
}
