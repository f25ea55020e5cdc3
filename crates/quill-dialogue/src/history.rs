//! Append-only conversation history.

use quill_core::{ConversationMessage, Role};

/// Ordered message history for one dialogue session.
///
/// The first entry is always the single system message. Entries are only
/// ever appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ConversationMessage>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ConversationMessage::system(system_prompt)],
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ConversationMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ConversationMessage::assistant(content));
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false: the system message is never removed.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }

    pub fn count(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_single_system_message() {
        let conversation = Conversation::new("rules");
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].role, Role::System);
        assert_eq!(conversation.messages()[0].content, "rules");
        assert!(!conversation.is_empty());
    }

    #[test]
    fn test_appends_in_order() {
        let mut conversation = Conversation::new("rules");
        conversation.push_user("close my account");
        conversation.push_assistant("What is your name?");
        conversation.push_user("Asha");

        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(conversation.last().unwrap().content, "Asha");
        assert_eq!(conversation.count(Role::System), 1);
        assert_eq!(conversation.count(Role::User), 2);
    }
}
