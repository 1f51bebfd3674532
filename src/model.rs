use futures::future::BoxFuture;
use rig::{
    agent::AgentBuilder,
    completion::{Chat, CompletionModel, Message as RigMessage, PromptError},
};
use thiserror::Error;
use tracing::debug;

use crate::conversation::{Message, Role};

/// A single call to a chat model: a system preamble, the prior turns, and the new user prompt.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub preamble: String,
    pub history: Vec<Message>,
    pub prompt: String,
}

impl ChatRequest {
    pub fn new(preamble: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
            history: Vec::new(),
            prompt: prompt.into(),
        }
    }

    pub fn with_history(mut self, history: impl Into<Vec<Message>>) -> Self {
        self.history = history.into();
        self
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model prompt error: {0}")]
    PromptError(#[from] PromptError),
    #[cfg(test)]
    #[error("Test error: {0}")]
    TestError(String),
}

/// The seam between the recipes and a hosted model.
pub trait ChatModel: Send + Sync {
    /// Send one request and return the completion text.
    fn chat(&self, request: ChatRequest) -> BoxFuture<'static, Result<String, ModelError>>;

    /// Name of the underlying model, for logs.
    fn name(&self) -> String;
}

/// [ChatModel] backed by any rig [CompletionModel].
///
/// A fresh rig agent is assembled for every request, carrying the request preamble plus the
/// sampling settings of this model.
#[derive(Clone)]
pub struct RigChatModel<M: CompletionModel> {
    model: M,
    name: String,
    temperature: Option<f64>,
    max_tokens: Option<u64>,
}

impl<M: CompletionModel> RigChatModel<M> {
    pub fn new(model: M, name: impl Into<String>) -> Self {
        Self {
            model,
            name: name.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: Option<u64>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

impl<M> ChatModel for RigChatModel<M>
where
    M: CompletionModel + 'static,
{
    fn chat(&self, request: ChatRequest) -> BoxFuture<'static, Result<String, ModelError>> {
        let model = self.model.clone();
        let name = self.name.clone();
        let temperature = self.temperature;
        let max_tokens = self.max_tokens;

        Box::pin(async move {
            let (preamble, history) = to_rig_history(&request.preamble, &request.history);

            let mut builder = AgentBuilder::new(model).preamble(&preamble);
            if let Some(temperature) = temperature {
                builder = builder.temperature(temperature);
            }
            if let Some(max_tokens) = max_tokens {
                builder = builder.max_tokens(max_tokens);
            }
            let agent = builder.build();

            debug!(
                model = %name,
                history = history.len(),
                prompt_len = request.prompt.len(),
                "chat request"
            );
            let response = agent.chat(request.prompt.clone(), history).await?;
            debug!(model = %name, response_len = response.len(), "chat response");
            Ok(response)
        })
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Split our transcript into rig chat history. System messages have no place in rig's
/// history, so they are appended to the preamble in order.
fn to_rig_history(preamble: &str, history: &[Message]) -> (String, Vec<RigMessage>) {
    let mut preamble = preamble.to_owned();
    let mut messages = Vec::with_capacity(history.len());
    for message in history {
        let text = message.content.as_str();
        match &message.role {
            Role::System => {
                preamble.push_str("\n\n");
                preamble.push_str(text);
            }
            Role::Human => messages.push(RigMessage::user(text)),
            Role::Assistant(_) => messages.push(RigMessage::assistant(text)),
        }
    }
    (preamble, messages)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use super::*;

    /// A [ChatModel] that replays canned responses in order and records every request.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedModel {
        responses: Arc<Mutex<VecDeque<String>>>,
        requests: Arc<Mutex<Vec<ChatRequest>>>,
    }

    impl ScriptedModel {
        pub(crate) fn new<I, S>(responses: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                responses: Arc::new(Mutex::new(responses.into_iter().map(Into::into).collect())),
                requests: Arc::default(),
            }
        }

        pub(crate) fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl ChatModel for ScriptedModel {
        fn chat(&self, request: ChatRequest) -> BoxFuture<'static, Result<String, ModelError>> {
            self.requests.lock().unwrap().push(request);
            let next = self.responses.lock().unwrap().pop_front();
            Box::pin(async move {
                next.ok_or_else(|| ModelError::TestError("script exhausted".to_owned()))
            })
        }

        fn name(&self) -> String {
            "scripted".to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Conversation;

    #[test]
    fn system_messages_fold_into_preamble() {
        let mut conversation = Conversation::new();
        conversation.add(Role::System, "Be brief.");
        conversation.add(Role::Human, "hi");
        conversation.add(Role::assistant("Bot"), "hello");

        let (preamble, history) = to_rig_history("You are helpful.", conversation.history());
        assert_eq!(preamble, "You are helpful.\n\nBe brief.");
        assert_eq!(history.len(), 2);
        assert!(matches!(history[0], RigMessage::User { .. }));
        assert!(matches!(history[1], RigMessage::Assistant { .. }));
    }

    #[tokio::test]
    async fn scripted_model_replays_in_order() {
        let model = testing::ScriptedModel::new(["one", "two"]);
        assert_eq!(model.chat(ChatRequest::new("", "a")).await.unwrap(), "one");
        assert_eq!(model.chat(ChatRequest::new("", "b")).await.unwrap(), "two");
        assert!(model.chat(ChatRequest::new("", "c")).await.is_err());
        assert_eq!(model.requests()[1].prompt, "b");
    }
}
