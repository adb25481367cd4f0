//! Grounded answering: retrieved context plus conversation history in, answer text out.

use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, ChatModel, ChatRequest, Role};
use crate::conversation::ConversationTurn;
use crate::embedder::Embedder;
use crate::error::ChatError;
use crate::retriever::Retriever;
use crate::vector_store::VectorStore;

/// Returned without calling the chat model when retrieval finds nothing.
pub const NO_CONTEXT_MESSAGE: &str = "No relevant information found in the provided materials.";

/// Instructions sent as the first message of every request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant that answers questions about a fixed set of documents.

Rules:
- Answer using only the information in the provided materials.
- If the materials do not fully cover the question, say: \"I don't know based on the provided materials.\"
- Answer in the same language as the user's question.";

/// Answer generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerConfig {
    /// Sampling temperature; `0.0` keeps answers deterministic.
    pub temperature: f32,
    /// System instruction.
    pub system_prompt: String,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Outcome of one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Text shown to the user: the completion, the no-context message, or an error line.
    pub text: String,
    /// True when retrieved context was sent to the chat model.
    pub used_context: bool,
    /// Context assembled for the question (empty when none was found).
    #[serde(default)]
    pub context: String,
}

/// Couples a [`Retriever`] with a [`ChatModel`].
pub struct Answerer<C, E, S> {
    chat: C,
    retriever: Retriever<E, S>,
    config: AnswerConfig,
}

impl<C: ChatModel, E: Embedder, S: VectorStore> Answerer<C, E, S> {
    /// Builds an answerer.
    pub fn new(chat: C, retriever: Retriever<E, S>, config: AnswerConfig) -> Self {
        Self {
            chat,
            retriever,
            config,
        }
    }

    /// Underlying retriever.
    pub fn retriever(&self) -> &Retriever<E, S> {
        &self.retriever
    }

    /// Answers `question`; never fails.
    ///
    /// Chat failures become an `Error: ...` line carrying the service detail so
    /// the interactive path always has something to show.
    pub fn answer(&self, question: &str, history: &[ConversationTurn]) -> AnswerResult {
        let context = self.retriever.retrieve(question);
        match self.complete_with_context(question, history, context) {
            Ok(result) => result,
            Err((err, context)) => {
                tracing::error!(error = %err, "chat completion failed");
                AnswerResult {
                    text: format!("Error: {err}"),
                    used_context: true,
                    context,
                }
            }
        }
    }

    /// Answers `question`, surfacing chat failures to the caller.
    pub fn try_answer(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<AnswerResult, ChatError> {
        let context = self.retriever.retrieve(question);
        self.complete_with_context(question, history, context)
            .map_err(|(err, _)| err)
    }

    fn complete_with_context(
        &self,
        question: &str,
        history: &[ConversationTurn],
        context: String,
    ) -> Result<AnswerResult, (ChatError, String)> {
        if context.is_empty() {
            tracing::info!("no context retrieved; skipping chat call");
            return Ok(AnswerResult {
                text: NO_CONTEXT_MESSAGE.to_string(),
                used_context: false,
                context,
            });
        }
        let messages = build_messages(&self.config.system_prompt, history, &context, question);
        let request = ChatRequest {
            messages: &messages,
            temperature: self.config.temperature,
        };
        tracing::debug!(
            messages = messages.len(),
            context_chars = context.len(),
            "requesting completion"
        );
        match self.chat.complete(&request) {
            Ok(text) => Ok(AnswerResult {
                text,
                used_context: true,
                context,
            }),
            Err(err) => Err((err, context)),
        }
    }
}

/// Renders the final user message: context first, then the question.
pub fn render_user_prompt(context: &str, question: &str) -> String {
    format!("Materials (Context):\n{context}\n\nCurrent Question:\n{question}\n\nAnswer:")
}

/// System instruction, prior turns in order, then the grounded question.
pub fn build_messages(
    system_prompt: &str,
    history: &[ConversationTurn],
    context: &str,
    question: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::new(Role::System, system_prompt));
    messages.extend(history.iter().map(ConversationTurn::to_message));
    messages.push(ChatMessage::new(
        Role::User,
        render_user_prompt(context, question),
    ));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationTurn;
    use pretty_assertions::assert_eq;

    #[test]
    fn messages_keep_history_order_between_system_and_question() {
        let history = vec![
            ConversationTurn::user("What is a chunk?"),
            ConversationTurn::assistant("A slice of a document."),
        ];
        let messages = build_messages("rules", &history, "ctx", "And overlap?");
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(messages[1].content, "What is a chunk?");
        assert_eq!(
            messages[3].content,
            "Materials (Context):\nctx\n\nCurrent Question:\nAnd overlap?\n\nAnswer:"
        );
    }

    #[test]
    fn context_precedes_question_in_user_prompt() {
        let prompt = render_user_prompt("alpha\n\nbeta", "why?");
        let context_at = prompt.find("alpha").unwrap();
        let question_at = prompt.find("why?").unwrap();
        assert!(context_at < question_at);
    }
}
