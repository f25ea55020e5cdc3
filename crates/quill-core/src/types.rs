//! Domain types shared across the Quill crates.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Conversation
// =============================================================================

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of the conversation history sent to the completion service.
///
/// Serializes to the `{"role": ..., "content": ...}` shape used by
/// chat-completion APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// A named letter shape and the fields that must be collected before the
/// letter can be generated.
///
/// `required_fields` order is the suggested collection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub required_fields: Vec<String>,
}

impl Template {
    pub fn new<I, S>(name: impl Into<String>, required_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            required_fields: required_fields.into_iter().map(Into::into).collect(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display() {
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_message_serializes_to_chat_shape() {
        let msg = ConversationMessage::user("close my account");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "user", "content": "close my account"})
        );
    }

    #[test]
    fn test_message_constructors_set_role() {
        assert_eq!(ConversationMessage::system("s").role, Role::System);
        assert_eq!(ConversationMessage::user("u").role, Role::User);
        assert_eq!(ConversationMessage::assistant("a").role, Role::Assistant);
    }

    #[test]
    fn test_role_deserializes_lowercase() {
        let role: Role = serde_json::from_str("\"assistant\"").unwrap();
        assert_eq!(role, Role::Assistant);
        assert!(serde_json::from_str::<Role>("\"Assistant\"").is_err());
    }

    #[test]
    fn test_template_new_keeps_field_order() {
        let t = Template::new("address_change", ["Name", "Old Address", "New Address"]);
        assert_eq!(t.name, "address_change");
        assert_eq!(t.required_fields, vec!["Name", "Old Address", "New Address"]);
    }
}
