use crate::types::Message;
use anyhow::{Context, Result};
use std::path::Path;

/// Reads a stored conversation log: a JSON array of messages, returned oldest first.
pub fn load_history_file(path: impl AsRef<Path>) -> Result<Vec<Message>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read history file {}", path.display()))?;
    let mut messages: Vec<Message> = serde_json::from_str(&raw)
        .with_context(|| format!("history file {} is not a message array", path.display()))?;
    messages.sort_by_key(|message| message.created_at);
    tracing::debug!(path = %path.display(), count = messages.len(), "history loaded");
    Ok(messages)
}

/// Keeps only the messages that belong to `conversation_id`.
pub fn for_conversation(messages: Vec<Message>, conversation_id: &str) -> Vec<Message> {
    let total = messages.len();
    let kept: Vec<Message> = messages
        .into_iter()
        .filter(|message| message.conversation_id == conversation_id)
        .collect();
    if kept.len() != total {
        tracing::warn!(
            conversation_id,
            skipped = total - kept.len(),
            "history contains messages from other conversations"
        );
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_history(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write history");
        file
    }

    #[test]
    fn test_loads_camel_case_messages_in_creation_order() {
        let file = write_history(
            r#"[
              {"id":"msg_2","conversationId":"c1","role":"assistant","content":"Done",
               "createdAt":"2026-03-01T10:00:05Z","codeSnapshot":"<section/>",
               "changes":["Added hero"]},
              {"id":"msg_1","conversationId":"c1","role":"user","content":"Hero please",
               "createdAt":"2026-03-01T10:00:00Z"}
            ]"#,
        );

        let messages = load_history_file(file.path()).expect("history loads");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "msg_1");
        assert_eq!(messages[0].role, Role::User);
        assert!(messages[0].code_snapshot.is_none());
        assert_eq!(messages[1].code_snapshot.as_deref(), Some("<section/>"));
        assert_eq!(messages[1].changes, vec!["Added hero".to_string()]);
        assert!(!messages[1].is_error);
    }

    #[test]
    fn test_rejects_malformed_history() {
        let file = write_history(r#"{"id":"not-an-array"}"#);
        let error = load_history_file(file.path()).expect_err("object is rejected");
        assert!(error.to_string().contains("not a message array"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("missing.json");
        let error = load_history_file(&path).expect_err("missing file");
        assert!(error.to_string().contains("missing.json"));
    }

    #[test]
    fn test_filters_other_conversations() {
        let messages = vec![
            Message::user("c1", "keep"),
            Message::user("c2", "drop"),
            Message::assistant("a1", "c1", "keep too"),
        ];
        let kept = for_conversation(messages, "c1");
        let contents: Vec<&str> = kept.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["keep", "keep too"]);
    }
}
