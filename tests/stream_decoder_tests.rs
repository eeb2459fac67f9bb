use sectiongen::api::stream::RecordDecoder;
use sectiongen::types::StreamRecord;

#[test]
fn test_message_complete_carries_id_code_and_changes() {
    let mut decoder = RecordDecoder::new();
    let chunk = b"data: {\"type\":\"message_complete\",\"data\":{\"messageId\":\"msg_1\",\"codeSnapshot\":\"<p/>\",\"changes\":[\"Added text\"]}}\n\n";

    assert_eq!(
        decoder.process(chunk),
        vec![StreamRecord::MessageComplete {
            message_id: Some("msg_1".to_string()),
            code_snapshot: Some("<p/>".to_string()),
            changes: vec!["Added text".to_string()],
        }]
    );
}

#[test]
fn test_malformed_record_does_not_stop_later_ones() {
    let mut decoder = RecordDecoder::new();
    let chunk = b"data: {broken\n\ndata: {\"type\":\"content_delta\",\"data\":{\"content\":\"after\"}}\n\n";
    assert_eq!(
        decoder.process(chunk),
        vec![StreamRecord::ContentDelta {
            content: "after".to_string()
        }]
    );
}

#[test]
fn test_unknown_record_type_is_surfaced() {
    let mut decoder = RecordDecoder::new();
    let records = decoder.process(b"data: {\"type\":\"usage\",\"data\":{\"tokens\":12}}\n");
    assert_eq!(
        records,
        vec![StreamRecord::Unknown {
            record_type: "usage".to_string()
        }]
    );
}
