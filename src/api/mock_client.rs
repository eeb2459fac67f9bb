//! Scripted generation backend for tests and offline runs.

use crate::api::client::{ByteStream, GenerationBackend};
use crate::error::GenerationError;
use crate::types::GenerationRequest;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

pub enum MockResponse {
    /// Each string is one `data:` record; every record arrives in its own read.
    Records(Vec<String>),
    /// Raw reads, delivered exactly as given.
    Raw(Vec<Vec<u8>>),
    /// Reads pushed by the test through the returned sender; the body stays
    /// open until the sender is dropped.
    Live(mpsc::UnboundedReceiver<Vec<u8>>),
    /// The records are delivered, then the body hangs without ending.
    Hang(Vec<String>),
    /// Non-success response status.
    Status { status: u16, body: String },
    /// Failure before any response is received.
    ConnectError(String),
}

#[derive(Clone, Default)]
pub struct MockGenerationClient {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl MockGenerationClient {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::default(),
        }
    }

    pub fn push(&self, response: MockResponse) {
        self.responses.lock().push_back(response);
    }

    /// Queues a live body and returns the sender that feeds it.
    pub fn push_live(&self) -> mpsc::UnboundedSender<Vec<u8>> {
        let (tx, rx) = mpsc::unbounded();
        self.push(MockResponse::Live(rx));
        tx
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    fn respond(&self, request: &GenerationRequest) -> Result<ByteStream, GenerationError> {
        self.requests.lock().push(request.clone());
        let Some(response) = self.responses.lock().pop_front() else {
            return Err(GenerationError::Transport(
                "MockGenerationClient: no more responses configured".to_string(),
            ));
        };

        match response {
            MockResponse::Records(records) => Ok(Box::pin(stream::iter(frame_all(records)))),
            MockResponse::Raw(reads) => Ok(Box::pin(stream::iter(
                reads.into_iter().map(|read| Ok(Bytes::from(read))),
            ))),
            MockResponse::Live(rx) => Ok(Box::pin(rx.map(|read| Ok(Bytes::from(read))))),
            MockResponse::Hang(records) => Ok(Box::pin(
                stream::iter(frame_all(records)).chain(stream::pending()),
            )),
            MockResponse::Status { status, body } => Err(GenerationError::Server {
                status,
                message: body,
            }),
            MockResponse::ConnectError(message) => Err(GenerationError::Transport(message)),
        }
    }
}

impl GenerationBackend for MockGenerationClient {
    fn open_stream<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<ByteStream, GenerationError>> {
        let result = self.respond(request);
        async move {
            tokio::task::yield_now().await;
            result
        }
        .boxed()
    }
}

/// Frames a JSON record as one stream line.
pub fn frame_record(json: &str) -> Vec<u8> {
    format!("data: {json}\n\n").into_bytes()
}

pub fn content_delta(content: &str) -> String {
    serde_json::json!({ "type": "content_delta", "data": { "content": content } }).to_string()
}

pub fn message_complete(message_id: Option<&str>, code_snapshot: Option<&str>) -> String {
    serde_json::json!({
        "type": "message_complete",
        "data": {
            "messageId": message_id,
            "codeSnapshot": code_snapshot,
            "hasCode": code_snapshot.is_some(),
        }
    })
    .to_string()
}

pub fn error_record(error: &str) -> String {
    serde_json::json!({ "type": "error", "data": { "error": error } }).to_string()
}

fn frame_all(records: Vec<String>) -> Vec<Result<Bytes, GenerationError>> {
    records
        .into_iter()
        .map(|record| Ok(Bytes::from(frame_record(&record))))
        .collect()
}
