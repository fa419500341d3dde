use super::Metadata;
use super::Session;
use super::SessionState;
use crate::domain::models::MetadataFrame;
use crate::domain::models::OutputFormat;

#[test]
fn it_only_moves_states_forward() {
    assert!(SessionState::Idle.can_advance_to(SessionState::Started));
    assert!(SessionState::Started.can_advance_to(SessionState::Streaming));
    assert!(SessionState::Streaming.can_advance_to(SessionState::Streaming));
    assert!(SessionState::Streaming.can_advance_to(SessionState::Completed));
    assert!(SessionState::Idle.can_advance_to(SessionState::Completed));
    assert!(!SessionState::Streaming.can_advance_to(SessionState::Started));
    assert!(!SessionState::Completed.can_advance_to(SessionState::Errored));
    assert!(!SessionState::Cancelled.can_advance_to(SessionState::Cancelled));
}

#[test]
fn it_reports_active_states() {
    assert!(!SessionState::Idle.is_active());
    assert!(SessionState::Started.is_active());
    assert!(SessionState::Streaming.is_active());
    assert!(!SessionState::Errored.is_active());
}

#[test]
fn it_merges_metadata_without_blanking() {
    let mut metadata = Metadata::default();
    metadata.merge(&MetadataFrame {
        mode: Some("base".to_string()),
        prompt_used: Some("<image>\nFree OCR.".to_string()),
        image_urls: Some(vec!["/outputs/a.png".to_string()]),
        duration_ms: Some(10),
        ..MetadataFrame::default()
    });
    metadata.merge(&MetadataFrame {
        mode: Some("".to_string()),
        prompt_used: None,
        image_urls: Some(vec![]),
        timestamp: Some("20250101_000000".to_string()),
        ..MetadataFrame::default()
    });

    assert_eq!(metadata.mode, Some("base".to_string()));
    assert_eq!(metadata.prompt_used, Some("<image>\nFree OCR.".to_string()));
    assert_eq!(metadata.image_urls, vec!["/outputs/a.png".to_string()]);
    assert_eq!(metadata.timestamp, Some("20250101_000000".to_string()));
    assert_eq!(metadata.duration_ms, Some(10));
}

#[test]
fn it_prefers_reported_output_format_once_finished() {
    let mut session = Session::new("base", OutputFormat::Markdown);
    session.metadata.output_format = Some("ocr".to_string());

    assert_eq!(session.snapshot().output_format, OutputFormat::Markdown);

    session.state = SessionState::Completed;
    assert_eq!(session.snapshot().output_format, OutputFormat::Ocr);

    session.metadata.output_format = Some("unknown".to_string());
    assert_eq!(session.snapshot().output_format, OutputFormat::Markdown);
}
