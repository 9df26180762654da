//! Conversation history.

use neoneo_provider::{Message, Role};

/// Append-only turn history that always starts with exactly one system turn.
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<Message>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Message::system(system_prompt)],
        }
    }

    /// Append a turn. A system turn replaces the existing system prompt
    /// instead of being appended.
    pub fn push(&mut self, turn: Message) {
        if turn.role == Role::System {
            self.set_system_prompt(turn.content);
        } else {
            self.turns.push(turn);
        }
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.turns[0].content = prompt.into();
    }

    pub fn system_prompt(&self) -> &str {
        &self.turns[0].content
    }

    /// Drop everything but the system turn.
    pub fn reset(&mut self) {
        self.turns.truncate(1);
    }

    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Message> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True when only the system turn is present.
    pub fn is_fresh(&self) -> bool {
        self.turns.len() == 1
    }
}
