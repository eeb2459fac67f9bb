use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::Config;
use crate::error::GenerationError;
use crate::types::GenerationRequest;
use anyhow::Result;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use serde::Deserialize;
use std::pin::Pin;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, GenerationError>> + Send>>;

/// Opens one generation request and hands back its raw response body.
pub trait GenerationBackend: Send + Sync {
    fn open_stream<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<ByteStream, GenerationError>>;
}

#[derive(Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl GenerationClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn send(&self, request: &GenerationRequest) -> Result<ByteStream, GenerationError> {
        if debug_payload_enabled() {
            emit_debug_payload(&self.api_url, request);
        }

        let mut builder = self
            .http
            .post(&self.api_url)
            .header("accept", "text/event-stream")
            .form(&request.form_fields());
        if let Some(api_key) = &self.api_key {
            builder = builder.header("authorization", format!("Bearer {api_key}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|error| map_request_error(error, &self.api_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Server {
                status: status.as_u16(),
                message: server_error_message(&body, status.canonical_reason()),
            });
        }

        let request_url = self.api_url.clone();
        let stream = response
            .bytes_stream()
            .map(move |item| item.map_err(|error| map_request_error(error, &request_url)));
        Ok(Box::pin(stream))
    }
}

impl GenerationBackend for GenerationClient {
    fn open_stream<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<ByteStream, GenerationError>> {
        self.send(request).boxed()
    }
}

fn map_request_error(error: reqwest::Error, request_url: &str) -> GenerationError {
    if let Some(status) = error.status() {
        return GenerationError::Server {
            status: status.as_u16(),
            message: error.to_string(),
        };
    }
    if error.is_decode() {
        return GenerationError::Decode(error.to_string());
    }
    if error.is_connect() {
        return GenerationError::Transport(format!("cannot reach '{request_url}': {error}"));
    }
    if error.is_timeout() {
        return GenerationError::Transport(format!("request to '{request_url}' timed out"));
    }
    GenerationError::Transport(format!("request to '{request_url}' failed: {error}"))
}

/// Prefers the backend's `{"error": "..."}` body, then the raw body, then the status reason.
fn server_error_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(ErrorBody { error: Some(error) }) = serde_json::from_str::<ErrorBody>(body) {
        if !error.trim().is_empty() {
            return error;
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() <= 300 {
        return trimmed.to_string();
    }
    reason.unwrap_or("request failed").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_message_prefers_json_error_field() {
        let body = r#"{"error":"Trial limit reached. Upgrade to continue generating.","trialExpired":true}"#;
        assert_eq!(
            server_error_message(body, Some("Forbidden")),
            "Trial limit reached. Upgrade to continue generating."
        );
    }

    #[test]
    fn test_server_error_message_falls_back_to_text_then_reason() {
        assert_eq!(
            server_error_message("Conversation not found", Some("Not Found")),
            "Conversation not found"
        );
        assert_eq!(
            server_error_message("", Some("Internal Server Error")),
            "Internal Server Error"
        );
        assert_eq!(server_error_message("   ", None), "request failed");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_maps_to_transport_error() {
        let config = Config {
            api_url: "http://127.0.0.1:9/api/chat/stream".to_string(),
            ..Config::default()
        };
        let client = GenerationClient::new(&config).expect("client should build");
        let request = GenerationRequest {
            conversation_id: "conv-1".to_string(),
            content: "hi".to_string(),
            current_code: None,
            continue_generation: false,
        };

        match client.open_stream(&request).await {
            Err(GenerationError::Transport(message)) => {
                assert!(message.contains("127.0.0.1:9"));
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("discard port should not accept connections"),
        }
    }
}
