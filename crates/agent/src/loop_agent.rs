//! Agent loop: one user turn, at most one round of tool execution.
//!
//! ```text
//! AwaitingInput -> ModelTurnPending -> DoneForTurn
//!                        |                  ^
//!                        v                  |
//!                  ToolExecution -> FollowupPending
//! ```
//!
//! Tool calls in the follow-up turn are recorded but never dispatched.

use std::sync::Arc;

use neoneo_config::Config;
use neoneo_provider::{ChatParams, ChatResponse, Message, NullSink, Provider, StreamSink, ToolCall};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conversation::Conversation;
use crate::safety::SafetyGate;
use crate::tools::{ToolError, ToolOutcome, ToolRegistry};
use crate::{AgentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingInput,
    ModelTurnPending,
    ToolExecution,
    FollowupPending,
    DoneForTurn,
}

/// One dispatched tool call and what came of it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRun {
    pub call: ToolCall,
    pub outcome: ToolOutcome,
}

#[derive(Debug, Clone)]
pub struct TurnReport {
    /// Model requests issued for this turn: 1 without tools, 2 with.
    pub round_trips: u32,
    pub outcomes: Vec<ToolRun>,
    /// The last assistant turn appended.
    pub reply: Message,
    /// Tool calls in the follow-up turn that were not executed.
    pub unexecuted_calls: usize,
}

impl TurnReport {
    pub fn used_tools(&self) -> bool {
        !self.outcomes.is_empty()
    }
}

/// Hooks for showing tool activity to the user.
pub trait ToolObserver: Send + Sync {
    fn on_tool_call(&self, _call: &ToolCall) {}
    fn on_tool_outcome(&self, _call: &ToolCall, _outcome: &ToolOutcome) {}
    fn on_followup(&self) {}
}

pub struct NullObserver;

impl ToolObserver for NullObserver {}

pub struct AgentLoop<P: Provider> {
    provider: Arc<P>,
    model: String,
    stream: bool,
    tools: ToolRegistry,
    gate: SafetyGate,
    conversation: Conversation,
    sink: Arc<dyn StreamSink>,
    observer: Arc<dyn ToolObserver>,
    cancel: CancellationToken,
    state: LoopState,
}

impl<P: Provider> AgentLoop<P> {
    pub fn new(provider: P, config: &Config, tools: ToolRegistry, gate: SafetyGate) -> Self {
        let model = if config.model.is_empty() {
            provider.default_model()
        } else {
            config.model.clone()
        };

        Self {
            provider: Arc::new(provider),
            model,
            stream: config.stream,
            tools,
            gate,
            conversation: Conversation::new(config.system_prompt.clone()),
            sink: Arc::new(NullSink),
            observer: Arc::new(NullObserver),
            cancel: CancellationToken::new(),
            state: LoopState::AwaitingInput,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn StreamSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ToolObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Drop everything but the system turn.
    pub fn reset(&mut self) {
        self.conversation.reset();
        info!("conversation reset");
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.conversation.set_system_prompt(prompt);
    }

    pub fn system_prompt(&self) -> &str {
        self.conversation.system_prompt()
    }

    pub fn tool_definitions(&self) -> Vec<neoneo_provider::Tool> {
        self.tools.definitions()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.names()
    }

    /// Run one cycle for `input`.
    ///
    /// A transport failure leaves the user turn in place but appends no
    /// assistant turn; the loop is ready for the next input either way.
    pub async fn handle_input(&mut self, input: &str) -> Result<TurnReport> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AgentError::EmptyInput);
        }

        let result = self.run_cycle(input).await;
        self.state = LoopState::AwaitingInput;
        result
    }

    async fn run_cycle(&mut self, input: &str) -> Result<TurnReport> {
        self.conversation.push(Message::user(input));
        self.state = LoopState::ModelTurnPending;

        let response = self.round_trip().await?;
        if !response.has_tool_calls() {
            let reply = Message::from(response);
            self.conversation.push(reply.clone());
            self.state = LoopState::DoneForTurn;
            return Ok(TurnReport {
                round_trips: 1,
                outcomes: Vec::new(),
                reply,
                unexecuted_calls: 0,
            });
        }

        let calls = response.tool_calls.clone();
        self.conversation.push(Message::from(response));
        self.state = LoopState::ToolExecution;
        debug!("dispatching {} tool call(s)", calls.len());

        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            let outcome = if self.cancel.is_cancelled() {
                ToolOutcome::Failure(ToolError::Cancelled)
            } else {
                self.observer.on_tool_call(&call);
                let outcome = self.dispatch(&call).await;
                self.observer.on_tool_outcome(&call, &outcome);
                outcome
            };
            self.conversation
                .push(Message::tool(call.name.clone(), outcome.text()));
            outcomes.push(ToolRun { call, outcome });
        }

        if self.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        self.state = LoopState::FollowupPending;
        self.observer.on_followup();
        let followup = self.round_trip().await?;

        let unexecuted_calls = followup.tool_calls.len();
        if unexecuted_calls > 0 {
            warn!(
                "follow-up turn requested {} more tool call(s); not executing",
                unexecuted_calls
            );
        }

        let reply = Message::from(followup);
        self.conversation.push(reply.clone());
        self.state = LoopState::DoneForTurn;

        Ok(TurnReport {
            round_trips: 2,
            outcomes,
            reply,
            unexecuted_calls,
        })
    }

    /// Send the whole conversation and wait for the assembled turn.
    async fn round_trip(&self) -> Result<ChatResponse> {
        if self.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let params = ChatParams {
            model: self.model.clone(),
            messages: self.conversation.turns().to_vec(),
            tools: self.tools.definitions(),
            stream: self.stream,
            temperature: None,
        };

        debug!(
            "requesting {} with {} turn(s), {} tool(s)",
            params.model,
            params.messages.len(),
            params.tools.len()
        );

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!("model request abandoned");
                Err(AgentError::Cancelled)
            }
            response = self.provider.chat(params, self.sink.clone()) => Ok(response?),
        }
    }

    /// Resolve, validate, gate and invoke a single call.
    async fn dispatch(&self, call: &ToolCall) -> ToolOutcome {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!("model requested unknown tool '{}'", call.name);
            return ToolOutcome::Failure(ToolError::NotFound(call.name.clone()));
        };

        let payload = match tool.payload(&call.arguments) {
            Ok(payload) => payload,
            Err(e) => return ToolOutcome::Failure(e),
        };
        let preview = tool.preview(&call.arguments);

        if let Err(denial) =
            self.gate
                .check(&call.name, tool.category(), &payload, preview.as_deref())
        {
            info!("{}: {}", call.name, denial);
            return ToolOutcome::Failure(denial.into());
        }

        self.tools.invoke(&call.name, call.arguments.clone()).await
    }
}
