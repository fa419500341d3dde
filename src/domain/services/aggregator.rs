#[cfg(test)]
#[path = "aggregator_test.rs"]
mod tests;

use std::mem;
use std::time::Duration;

use crate::domain::models::ChunkFrame;
use crate::domain::models::DoneFrame;
use crate::domain::models::ErrorFrame;
use crate::domain::models::Frame;
use crate::domain::models::JobError;
use crate::domain::models::MetadataFrame;
use crate::domain::models::Outcome;
use crate::domain::models::PageResult;
use crate::domain::models::RecognitionRequest;
use crate::domain::models::RecognitionResponse;
use crate::domain::models::ResultSnapshot;
use crate::domain::models::Session;
use crate::domain::models::SessionState;
use crate::domain::models::StartFrame;
use crate::domain::models::CANCELLED_NOTICE;
use crate::domain::models::SERVER_FAILURE_MESSAGE;
use crate::domain::models::TRANSPORT_FAILURE_MESSAGE;

pub fn page_header(page: u32) -> String {
    return format!("\n\n--- Page {page} ---\n\n");
}

fn non_empty(value: Option<String>) -> Option<String> {
    return value.filter(|val| return !val.is_empty());
}

/// What applying one input did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The input was not legal from the current state and changed nothing.
    Ignored,
    /// The session moved forward. Carries the snapshot to present.
    Updated(ResultSnapshot),
    /// The session reached a terminal state.
    Finished(Outcome),
}

fn on_start(mut session: Session, frame: StartFrame) -> Session {
    session.job_id = non_empty(frame.job_id);
    session.start_time = non_empty(frame.start_time);
    session.text.clear();
    if session.output_format.is_paginated() {
        session.pages = Some(vec![]);
    }
    session.state = SessionState::Started;

    return session;
}

fn on_chunk(mut session: Session, frame: ChunkFrame) -> Session {
    session.state = SessionState::Streaming;
    let image_url = non_empty(frame.image_url);

    if let Some(page) = frame.page {
        session.text += &page_header(page);
        session.text += &frame.text;
        session.pages.get_or_insert_with(Vec::new).push(PageResult {
            page,
            total: frame.total,
            text: frame.text,
            image_url,
        });
        session.current_page = Some(page);
        session.total_pages = frame.total.or(session.total_pages);

        return session;
    }

    if session.output_format.is_localization() {
        if image_url.is_some() {
            session.image_url = image_url;
        }

        return session;
    }

    session.text += &frame.text;
    if session.image_url.is_none() {
        session.image_url = image_url;
    }

    return session;
}

fn on_metadata(mut session: Session, frame: MetadataFrame) -> Session {
    session.state = SessionState::Streaming;
    session.metadata.merge(&frame);

    if session.output_format.is_localization() && session.image_url.is_none() {
        session.image_url = frame
            .image_urls
            .unwrap_or_default()
            .into_iter()
            .find(|url| return !url.is_empty());
    }

    return session;
}

fn on_done(mut session: Session, frame: DoneFrame) -> Session {
    session.duration_ms = frame.duration_ms.or(session.metadata.duration_ms);

    if session.image_url.is_none() {
        session.image_url = session.metadata.image_urls.first().cloned();
    }
    if session.reported_output_format().is_localization() {
        session.text.clear();
    }
    if session.pages.as_ref().is_some_and(|pages| return pages.is_empty()) {
        session.pages = None;
    }
    session.state = SessionState::Completed;

    return session;
}

fn on_failure(mut session: Session, err: JobError) -> Session {
    session.discard_result();
    session.error = Some(err);
    session.state = SessionState::Errored;

    return session;
}

fn on_error(session: Session, frame: ErrorFrame) -> Session {
    let message =
        non_empty(frame.message).unwrap_or_else(|| return SERVER_FAILURE_MESSAGE.to_string());

    return on_failure(session, JobError::Server(message));
}

fn on_cancelled(mut session: Session) -> Session {
    session.discard_result();
    session.state = SessionState::Cancelled;

    return session;
}

fn on_fallback(mut session: Session, response: RecognitionResponse) -> Session {
    let mut metadata = response.clone();
    metadata.image_urls.retain(|url| return !url.is_empty());
    session.metadata.merge(&MetadataFrame {
        mode: metadata.mode,
        output_format: metadata.output_format,
        prompt_used: metadata.prompt_used,
        timestamp: metadata.timestamp,
        start_time: None,
        duration_ms: metadata.duration_ms,
        image_urls: Some(metadata.image_urls),
    });

    session.text = if session.reported_output_format().is_localization() {
        "".to_string()
    } else {
        response.text
    };
    session.image_url = session.metadata.image_urls.first().cloned();
    session.duration_ms = response.duration_ms;
    session.state = SessionState::Completed;

    return session;
}

fn target_state(frame: &Frame) -> SessionState {
    return match frame {
        Frame::Start(_) => SessionState::Started,
        Frame::Chunk(_) | Frame::Metadata(_) => SessionState::Streaming,
        Frame::Done(_) => SessionState::Completed,
        Frame::Error(_) => SessionState::Errored,
        Frame::Cancelled(_) => SessionState::Cancelled,
    };
}

/// Owns the session of one in-flight job and folds decoded frames into it.
/// Every input outside its legal source state is ignored, which is what
/// keeps late frames, duplicate cancels and a racing fallback from mutating a
/// finished result.
pub struct SessionAggregator {
    session: Session,
}

impl SessionAggregator {
    pub fn new(request: &RecognitionRequest) -> SessionAggregator {
        return SessionAggregator {
            session: Session::new(&request.mode, request.output_format),
        };
    }

    pub fn session(&self) -> &Session {
        return &self.session;
    }

    pub fn state(&self) -> SessionState {
        return self.session.state;
    }

    pub fn job_id(&self) -> Option<String> {
        return self.session.job_id.clone();
    }

    pub fn cancel_requested(&self) -> bool {
        return self.session.cancel_requested;
    }

    pub fn elapsed(&self) -> Duration {
        return self
            .session
            .started_at
            .map(|started_at| return started_at.elapsed())
            .unwrap_or_default();
    }

    fn advance<F>(&mut self, next: SessionState, transition: F) -> Applied
    where
        F: FnOnce(Session) -> Session,
    {
        if !self.session.state.can_advance_to(next) {
            tracing::debug!(
                state = self.session.state.to_string(),
                next = next.to_string(),
                "Ignoring input outside of its legal state"
            );
            return Applied::Ignored;
        }

        let session = mem::take(&mut self.session);
        self.session = transition(session);

        return self.applied();
    }

    fn applied(&self) -> Applied {
        return match self.session.state {
            SessionState::Completed => Applied::Finished(Outcome::Completed(self.session.snapshot())),
            SessionState::Errored => {
                let err = self
                    .session
                    .error
                    .clone()
                    .unwrap_or_else(|| return JobError::Transport(TRANSPORT_FAILURE_MESSAGE.to_string()));
                Applied::Finished(Outcome::Failed(err))
            }
            SessionState::Cancelled => Applied::Finished(Outcome::Cancelled(CANCELLED_NOTICE.to_string())),
            _ => Applied::Updated(self.session.snapshot()),
        };
    }

    /// Applies one decoded frame in arrival order.
    pub fn apply(&mut self, frame: Frame) -> Applied {
        tracing::debug!(kind = frame.kind(), state = self.session.state.to_string(), "Applying frame");

        if matches!(frame, Frame::Start(_)) && self.session.state != SessionState::Idle {
            return Applied::Ignored;
        }

        let next = target_state(&frame);
        return self.advance(next, |session| {
            return match frame {
                Frame::Start(start) => on_start(session, start),
                Frame::Chunk(chunk) => on_chunk(session, chunk),
                Frame::Metadata(metadata) => on_metadata(session, metadata),
                Frame::Done(done) => on_done(session, done),
                Frame::Error(error) => on_error(session, error),
                Frame::Cancelled(_) => on_cancelled(session),
            };
        });
    }

    /// Flags a user cancellation. Only an active session can be cancelled,
    /// and only once.
    pub fn request_cancel(&mut self) -> bool {
        if !self.session.state.is_active() || self.session.cancel_requested {
            return false;
        }

        self.session.cancel_requested = true;
        return true;
    }

    /// The transport ended without a terminal frame. A flagged cancellation
    /// turns this into `Cancelled`, anything else is a transport failure.
    pub fn transport_closed(&mut self, reason: Option<String>) -> Applied {
        if self.session.cancel_requested {
            return self.advance(SessionState::Cancelled, on_cancelled);
        }

        if let Some(reason) = &reason {
            tracing::error!(reason = reason, "Recognition stream failed");
        }

        return self.advance(SessionState::Errored, |session| {
            return on_failure(session, JobError::Transport(TRANSPORT_FAILURE_MESSAGE.to_string()));
        });
    }

    /// Completes a session that never saw a frame with the synchronous
    /// fallback's response.
    pub fn complete_from_fallback(&mut self, response: RecognitionResponse) -> Applied {
        if self.session.state != SessionState::Idle {
            return Applied::Ignored;
        }

        return self.advance(SessionState::Completed, |session| {
            return on_fallback(session, response);
        });
    }

    pub fn fail(&mut self, err: JobError) -> Applied {
        return self.advance(SessionState::Errored, |session| {
            return on_failure(session, err);
        });
    }
}
