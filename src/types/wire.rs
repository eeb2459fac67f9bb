use serde::Deserialize;

/// Body of one generation request sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub conversation_id: String,
    /// Already trimmed user content.
    pub content: String,
    pub current_code: Option<String>,
    /// Resume an existing unanswered user turn instead of appending a new one.
    pub continue_generation: bool,
}

impl GenerationRequest {
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("conversationId", self.conversation_id.clone()),
            ("content", self.content.clone()),
        ];
        if let Some(code) = self.current_code.as_ref().filter(|c| !c.is_empty()) {
            fields.push(("currentCode", code.clone()));
        }
        if self.continue_generation {
            fields.push(("continueGeneration", "true".to_string()));
        }
        fields
    }
}

/// Decoded `{type, data}` record of the generation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRecord {
    MessageStart,
    ContentDelta {
        content: String,
    },
    MessageComplete {
        message_id: Option<String>,
        code_snapshot: Option<String>,
        changes: Vec<String>,
    },
    ContinuationStart {
        attempt: Option<u32>,
    },
    ContinuationComplete {
        attempt: Option<u32>,
        is_complete: Option<bool>,
    },
    Error {
        error: Option<String>,
    },
    Unknown {
        record_type: String,
    },
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(rename = "type")]
    record_type: String,
    #[serde(default)]
    data: Option<RawData>,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawData {
    message_id: Option<String>,
    content: Option<String>,
    code_snapshot: Option<String>,
    changes: Option<Vec<String>>,
    error: Option<String>,
    attempt: Option<u32>,
    is_complete: Option<bool>,
}

impl StreamRecord {
    pub fn parse(json: &str) -> serde_json::Result<Self> {
        let raw: RawRecord = serde_json::from_str(json)?;
        let data = raw.data.unwrap_or_default();

        Ok(match raw.record_type.as_str() {
            "message_start" => Self::MessageStart,
            "content_delta" => Self::ContentDelta {
                content: data.content.unwrap_or_default(),
            },
            "message_complete" => Self::MessageComplete {
                message_id: data.message_id.filter(|id| !id.is_empty()),
                code_snapshot: data.code_snapshot.filter(|code| !code.is_empty()),
                changes: data.changes.unwrap_or_default(),
            },
            "continuation_start" => Self::ContinuationStart {
                attempt: data.attempt,
            },
            "continuation_complete" => Self::ContinuationComplete {
                attempt: data.attempt,
                is_complete: data.is_complete,
            },
            "error" => Self::Error { error: data.error },
            _ => Self::Unknown {
                record_type: raw.record_type,
            },
        })
    }
}
