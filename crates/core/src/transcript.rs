//! The ordered message history of a conversation.

mod budget;

use scenechat_model::{ModelMessage, Role};

pub use budget::{DEFAULT_MAX_PROMPT_TOKENS, shrink};

/// Role-tagged messages whose first entry is always the system message.
#[derive(Clone, Debug, PartialEq)]
pub struct Transcript {
    messages: Vec<ModelMessage>,
}

impl Transcript {
    /// Creates a transcript holding only the given system message.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ModelMessage::System(system_prompt.into())],
        }
    }

    /// Returns all messages, the system message first.
    #[inline]
    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    /// Returns the number of messages including the system message.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if only the system message is present.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.len() == 1
    }

    /// Returns the most recent message.
    #[inline]
    pub fn last(&self) -> Option<&ModelMessage> {
        self.messages.last()
    }

    /// Returns the role of the most recent message.
    #[inline]
    pub fn last_role(&self) -> Role {
        self.messages.last().map_or(Role::System, ModelMessage::role)
    }

    /// Appends a user or assistant message.
    pub fn push(&mut self, message: ModelMessage) {
        debug_assert!(
            message.role() != Role::System,
            "the system message can only be replaced"
        );
        self.messages.push(message);
    }

    /// Removes the most recent message unless it is the system message.
    pub fn pop(&mut self) -> Option<ModelMessage> {
        if self.messages.len() > 1 {
            self.messages.pop()
        } else {
            None
        }
    }

    /// Replaces the system message, keeping the rest of the history.
    pub fn set_system_prompt(&mut self, system_prompt: impl Into<String>) {
        self.messages[0] = ModelMessage::System(system_prompt.into());
    }

    /// Concatenates the content of every message.
    pub fn joined_content(&self) -> String {
        self.messages.iter().map(ModelMessage::content).collect()
    }

    fn remove_oldest(&mut self) -> ModelMessage {
        self.messages.remove(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_keeps_system_message() {
        let mut transcript = Transcript::new("sys");
        transcript.push(ModelMessage::User("hi".to_owned()));
        assert_eq!(
            transcript.pop(),
            Some(ModelMessage::User("hi".to_owned()))
        );
        assert_eq!(transcript.pop(), None);
        assert_eq!(transcript.len(), 1);
        assert!(transcript.is_empty());
        assert_eq!(transcript.last_role(), Role::System);
    }

    #[test]
    fn test_set_system_prompt() {
        let mut transcript = Transcript::new("python");
        transcript.push(ModelMessage::User("q".to_owned()));
        transcript.push(ModelMessage::Assistant("a".to_owned()));
        transcript.set_system_prompt("mel");

        assert_eq!(
            transcript.messages()[0],
            ModelMessage::System("mel".to_owned())
        );
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.joined_content(), "melqa");
    }
}
