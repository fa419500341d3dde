use std::time::Duration;

use super::fallback_deadline;
use super::DeadlinePolicy;
use super::FallbackSupervisor;
use crate::domain::models::Document;
use crate::domain::models::DocumentKind;
use crate::domain::models::SessionState;

const MB: u64 = 1024 * 1024;

#[test]
fn it_clamps_image_deadlines() {
    let policy = DeadlinePolicy::for_kind(DocumentKind::Image);

    assert_eq!(policy.deadline(0), Duration::from_millis(8_000));
    assert_eq!(policy.deadline(4 * MB), Duration::from_millis(9_000));
    assert_eq!(policy.deadline(MB + MB / 2), Duration::from_millis(8_000));
    assert_eq!(policy.deadline(100 * MB), Duration::from_millis(30_000));
}

#[test]
fn it_gives_pdfs_longer_deadlines() {
    let policy = DeadlinePolicy::for_kind(DocumentKind::Pdf);

    assert_eq!(policy.deadline(0), Duration::from_millis(20_000));
    assert_eq!(policy.deadline(10 * MB), Duration::from_millis(35_000));
    assert_eq!(policy.deadline(MB / 2), Duration::from_millis(20_000));
    assert_eq!(policy.deadline(500 * MB), Duration::from_millis(120_000));
}

#[test]
fn it_honours_deadline_overrides() {
    let document = Document::new("scan.pdf", vec![0; 16]);

    assert_eq!(fallback_deadline(&document, None), Duration::from_millis(20_000));
    assert_eq!(
        fallback_deadline(&document, Some(250)),
        Duration::from_millis(250)
    );
}

#[tokio::test(start_paused = true)]
async fn it_fires_once_when_idle() {
    let mut supervisor = FallbackSupervisor::arm(Duration::from_secs(8));
    assert!(supervisor.deadline().is_some());

    assert!(supervisor.try_fire(SessionState::Idle, false));
    assert!(supervisor.has_fired());
    assert!(supervisor.deadline().is_none());
    assert!(!supervisor.try_fire(SessionState::Idle, false));
}

#[tokio::test(start_paused = true)]
async fn it_drops_frames_after_firing() {
    let mut supervisor = FallbackSupervisor::arm(Duration::from_secs(8));
    assert!(supervisor.try_fire(SessionState::Idle, false));

    assert!(!supervisor.observe_frame());
}

#[tokio::test(start_paused = true)]
async fn it_never_fires_after_a_frame() {
    let mut supervisor = FallbackSupervisor::arm(Duration::from_secs(8));

    assert!(supervisor.observe_frame());
    assert!(!supervisor.is_armed());
    assert!(supervisor.deadline().is_none());
    assert!(!supervisor.try_fire(SessionState::Idle, false));
    assert!(supervisor.observe_frame());
}

#[tokio::test(start_paused = true)]
async fn it_stands_down_when_cancelling_or_streaming() {
    let mut cancelled = FallbackSupervisor::arm(Duration::from_secs(8));
    assert!(!cancelled.try_fire(SessionState::Idle, true));
    assert!(!cancelled.is_armed());

    let mut started = FallbackSupervisor::arm(Duration::from_secs(8));
    assert!(!started.try_fire(SessionState::Started, false));
    assert!(!started.has_fired());
}
