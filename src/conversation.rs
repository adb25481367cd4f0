//! In-memory conversation history for a single chat session.

use serde::{Deserialize, Serialize};

use crate::answer::{AnswerResult, Answerer};
use crate::chat::{ChatMessage, ChatModel, Role};
use crate::embedder::Embedder;
use crate::error::ConversationError;
use crate::vector_store::VectorStore;

/// Speaker of a stored turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The person asking.
    User,
    /// The generated answer.
    Assistant,
}

impl From<TurnRole> for Role {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => Role::User,
            TurnRole::Assistant => Role::Assistant,
        }
    }
}

/// One stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Speaker.
    pub role: TurnRole,
    /// Message text.
    pub content: String,
}

impl ConversationTurn {
    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    /// An assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }

    /// Converts the turn into a chat request message.
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage::new(self.role.into(), self.content.clone())
    }
}

/// Where a conversation is in its question/answer cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    /// Ready for a question.
    Idle,
    /// A user turn was appended and its answer has not been recorded yet.
    AwaitingAnswer,
}

/// Append-only history of one session.
///
/// Turns are never reordered or removed except by [`Conversation::clear`].
/// `max_history_turns` bounds what is sent to the model, not what is stored.
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
    max_history_turns: Option<usize>,
    state: ConversationState,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// An empty conversation that sends its whole history with each question.
    pub fn new() -> Self {
        Self {
            turns: Vec::new(),
            max_history_turns: None,
            state: ConversationState::Idle,
        }
    }

    /// Limits prompts to the most recent `limit` completed turns.
    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.max_history_turns = limit;
        self
    }

    /// All stored turns in order.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Number of stored turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True when nothing has been asked yet.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Current cycle state.
    pub fn state(&self) -> ConversationState {
        self.state
    }

    /// True while a question awaits its answer.
    pub fn pending(&self) -> bool {
        self.state == ConversationState::AwaitingAnswer
    }

    /// Completed turns that go into the next prompt.
    pub fn history_window(&self) -> &[ConversationTurn] {
        let completed = if self.pending() {
            &self.turns[..self.turns.len() - 1]
        } else {
            &self.turns[..]
        };
        match self.max_history_turns {
            Some(limit) if completed.len() > limit => &completed[completed.len() - limit..],
            _ => completed,
        }
    }

    /// Records the user's question: Idle → AwaitingAnswer.
    pub fn begin(&mut self, question: &str) -> Result<(), ConversationError> {
        if self.pending() {
            return Err(ConversationError::Busy);
        }
        self.turns.push(ConversationTurn::user(question));
        self.state = ConversationState::AwaitingAnswer;
        Ok(())
    }

    /// Records the answer: AwaitingAnswer → Idle.
    pub fn complete(&mut self, answer: &str) -> Result<(), ConversationError> {
        if !self.pending() {
            return Err(ConversationError::NotAwaiting);
        }
        self.turns.push(ConversationTurn::assistant(answer));
        self.state = ConversationState::Idle;
        Ok(())
    }

    /// Asks `question` with the prior history and records both turns.
    pub fn ask<C, E, S>(
        &mut self,
        answerer: &Answerer<C, E, S>,
        question: &str,
    ) -> Result<AnswerResult, ConversationError>
    where
        C: ChatModel,
        E: Embedder,
        S: VectorStore,
    {
        self.begin(question)?;
        let result = answerer.answer(question, self.history_window());
        self.complete(&result.text)?;
        Ok(result)
    }

    /// Drops all turns and returns to Idle.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.state = ConversationState::Idle;
    }
}
