use sectiongen::api::mock_client::{
    content_delta, message_complete, MockGenerationClient, MockResponse,
};
use sectiongen::config::Config;
use sectiongen::history::load_history_file;
use sectiongen::state::{MemoryDraft, Session};
use std::io::Write;
use std::sync::Arc;

#[test]
fn test_config_validation_requires_key_for_remote_endpoint() {
    let config = Config {
        api_url: "https://sections.example.com/api/chat/stream".to_string(),
        api_key: None,
        ..Config::default()
    };
    assert!(config.validate().is_err());

    let config = Config {
        api_key: Some("sk-test".to_string()),
        ..config
    };
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_allows_local_endpoint_without_api_key() {
    let config = Config::default();
    assert!(config.is_local_endpoint());
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_rejects_non_http_url() {
    let config = Config {
        api_url: "ftp://localhost/stream".to_string(),
        ..Config::default()
    };
    assert!(config.validate().is_err());
}

#[tokio::test]
async fn test_resumes_unanswered_history_and_applies_first_version() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(
        br#"[{"id":"msg_u1","conversationId":"conv-9","role":"user",
              "content":"Testimonial carousel","createdAt":"2026-05-02T08:00:00Z"}]"#,
    )
    .expect("write history");

    let backend = MockGenerationClient::new(vec![
        MockResponse::Records(vec![
            content_delta("Here is a carousel"),
            message_complete(Some("msg_a1"), Some("<section>carousel</section>")),
        ]),
        MockResponse::Records(vec![
            content_delta("Slower autoplay"),
            message_complete(Some("msg_a2"), Some("<section>slow</section>")),
        ]),
    ]);
    let draft = Arc::new(MemoryDraft::default());
    let session = Session::builder("conv-9", Arc::new(backend.clone()))
        .config(&Config::default())
        .draft_source(draft.clone())
        .hooks(draft.clone())
        .build();

    session.load_messages(load_history_file(file.path()).expect("history"));
    session
        .maybe_auto_generate()
        .expect("unanswered turn resumes")
        .join()
        .await
        .expect("consumer task");

    assert_eq!(draft.code().as_deref(), Some("<section>carousel</section>"));
    assert_eq!(draft.auto_applied_count(), 1);

    session
        .send_message("Slow the autoplay down")
        .expect("send accepted")
        .join()
        .await
        .expect("consumer task");

    let versions = session.versions();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[1].version_number, 2);
    assert_eq!(session.active_version_id().as_deref(), Some("msg_a2"));
    assert_eq!(
        draft.saved(),
        vec![
            "<section>carousel</section>".to_string(),
            "<section>slow</section>".to_string()
        ]
    );

    let requests = backend.requests();
    assert!(requests[0].continue_generation);
    assert_eq!(requests[0].current_code, None);
    assert!(!requests[1].continue_generation);
    assert_eq!(
        requests[1].current_code.as_deref(),
        Some("<section>carousel</section>")
    );
    assert!(session.maybe_auto_generate().is_none());
}
