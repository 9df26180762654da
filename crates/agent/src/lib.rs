//! Agent core for neoneo.
//!
//! Tool registry and capabilities, the safety gate guarding them, the
//! conversation history and the loop that drives one user turn through at
//! most one round of tool execution.

use thiserror::Error;

pub mod conversation;
pub mod loop_agent;
pub mod safety;
pub mod tools;

pub use conversation::Conversation;
pub use loop_agent::{AgentLoop, LoopState, NullObserver, ToolObserver, ToolRun, TurnReport};
pub use safety::{
    CategoryPolicy, Classification, ConfirmRequest, Confirmer, Denial, SafetyCategory, SafetyGate,
};
pub use tools::{register_default_tools, ToolError, ToolOutcome, ToolRegistry, ToolTrait};

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("model request failed: {0}")]
    Provider(#[from] neoneo_provider::ProviderError),

    #[error("invalid deny pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("interrupted")]
    Cancelled,

    #[error("empty input")]
    EmptyInput,
}

pub type Result<T> = std::result::Result<T, AgentError>;
