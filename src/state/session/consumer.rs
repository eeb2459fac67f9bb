use super::cancel::GenerationTicket;
use crate::api::stream::RecordDecoder;
use crate::api::GenerationBackend;
use crate::error::GenerationError;
use crate::types::{GenerationRequest, Message, StreamRecord};
use futures::StreamExt;
use uuid::Uuid;

pub(super) enum ConsumerOutcome {
    Completed(Message),
    Cancelled,
    Failed(GenerationError),
}

/// Where a running consumer reports its progress. Both calls return false
/// once the ticket is no longer the live generation.
pub(super) trait ConsumerSink {
    fn append_fragment(&self, ticket: &GenerationTicket, fragment: &str) -> bool;

    fn code_ready(&self, ticket: &GenerationTicket, code: &str) -> bool;
}

#[derive(Default)]
struct Completion {
    message_id: Option<String>,
    code_snapshot: Option<String>,
    changes: Vec<String>,
}

pub(super) async fn consume_stream(
    sink: &impl ConsumerSink,
    backend: &dyn GenerationBackend,
    ticket: &GenerationTicket,
    request: &GenerationRequest,
    reassemble_split_records: bool,
) -> ConsumerOutcome {
    let token = ticket.token();

    let mut body = tokio::select! {
        biased;
        _ = token.cancelled() => return ConsumerOutcome::Cancelled,
        opened = backend.open_stream(request) => match opened {
            Ok(body) => body,
            Err(error) => return ConsumerOutcome::Failed(error),
        },
    };

    let mut decoder = if reassemble_split_records {
        RecordDecoder::reassembling()
    } else {
        RecordDecoder::new()
    };
    let mut accumulated = String::new();
    let mut completion = Completion::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return ConsumerOutcome::Cancelled,
            next = body.next() => next,
        };

        let (records, exhausted) = match next {
            Some(Ok(chunk)) => (decoder.process(&chunk), false),
            Some(Err(error)) => return ConsumerOutcome::Failed(error),
            None => (decoder.finish(), true),
        };

        for record in records {
            match record {
                StreamRecord::ContentDelta { content } => {
                    if content.is_empty() {
                        continue;
                    }
                    accumulated.push_str(&content);
                    if !sink.append_fragment(ticket, &content) {
                        return ConsumerOutcome::Cancelled;
                    }
                }
                StreamRecord::MessageComplete {
                    message_id,
                    code_snapshot,
                    changes,
                } => {
                    if let Some(code) = &code_snapshot {
                        if !sink.code_ready(ticket, code) {
                            return ConsumerOutcome::Cancelled;
                        }
                    }
                    completion = Completion {
                        message_id,
                        code_snapshot,
                        changes,
                    };
                }
                StreamRecord::Error { error } => {
                    return ConsumerOutcome::Failed(GenerationError::protocol(error));
                }
                StreamRecord::MessageStart => {
                    tracing::debug!(generation = ticket.id(), "stream started");
                }
                StreamRecord::ContinuationStart { attempt } => {
                    tracing::debug!(generation = ticket.id(), ?attempt, "continuation started");
                }
                StreamRecord::ContinuationComplete {
                    attempt,
                    is_complete,
                } => {
                    tracing::debug!(
                        generation = ticket.id(),
                        ?attempt,
                        ?is_complete,
                        "continuation finished"
                    );
                }
                StreamRecord::Unknown { record_type } => {
                    tracing::debug!(generation = ticket.id(), record_type = %record_type, "ignoring record");
                }
            }
        }

        if exhausted {
            break;
        }
    }

    let id = completion
        .message_id
        .unwrap_or_else(|| format!("assistant-{}", Uuid::new_v4()));
    let message = Message::assistant(id, &request.conversation_id, accumulated)
        .with_code_snapshot(completion.code_snapshot)
        .with_changes(completion.changes);
    ConsumerOutcome::Completed(message)
}
