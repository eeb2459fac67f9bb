use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation log. Never mutated once it is in a log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Generated section code attached to an assistant turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snapshot: Option<String>,
    /// Change summary bullets reported with the generated code.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Message {
    /// An optimistic user turn with a locally generated temporary id.
    pub fn user(conversation_id: &str, content: impl Into<String>) -> Self {
        Self::new(
            format!("temp-{}", Uuid::new_v4()),
            conversation_id,
            Role::User,
            content.into(),
        )
    }

    pub fn assistant(
        id: impl Into<String>,
        conversation_id: &str,
        content: impl Into<String>,
    ) -> Self {
        Self::new(id.into(), conversation_id, Role::Assistant, content.into())
    }

    pub fn with_code_snapshot(mut self, code: Option<String>) -> Self {
        self.code_snapshot = code;
        self
    }

    pub fn with_changes(mut self, changes: Vec<String>) -> Self {
        self.changes = changes;
        self
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    fn new(id: String, conversation_id: &str, role: Role, content: String) -> Self {
        Self {
            id,
            conversation_id: conversation_id.to_string(),
            role,
            content,
            created_at: Utc::now(),
            code_snapshot: None,
            changes: Vec::new(),
            is_error: false,
            error_message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_gets_temporary_id() {
        let message = Message::user("conv-1", "Add a hero banner");
        assert!(message.id.starts_with("temp-"));
        assert_eq!(message.role, Role::User);
        assert_eq!(message.conversation_id, "conv-1");
        assert!(message.code_snapshot.is_none());
    }

    #[test]
    fn test_message_deserializes_store_shape() {
        let json = r#"{
            "id": "msg_1",
            "conversationId": "conv-1",
            "role": "assistant",
            "content": "Here is your section",
            "createdAt": "2025-01-02T03:04:05Z",
            "codeSnapshot": "{% schema %}{% endschema %}"
        }"#;
        let message: Message = serde_json::from_str(json).expect("message should parse");
        assert!(message.is_assistant());
        assert_eq!(
            message.code_snapshot.as_deref(),
            Some("{% schema %}{% endschema %}")
        );
        assert!(message.changes.is_empty());
        assert!(!message.is_error);
    }

    #[test]
    fn test_serialized_message_uses_camel_case_keys() {
        let message = Message::assistant("a1", "conv-1", "ok")
            .with_code_snapshot(Some("<div></div>".to_string()));
        let value = serde_json::to_value(&message).expect("serialize");
        assert!(value.get("conversationId").is_some());
        assert!(value.get("codeSnapshot").is_some());
        assert!(value.get("errorMessage").is_none());
    }
}
