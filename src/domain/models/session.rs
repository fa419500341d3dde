#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use tokio::time::Instant;

use super::JobError;
use super::MetadataFrame;
use super::OutputFormat;
use super::ResultSnapshot;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Started,
    Streaming,
    Completed,
    Errored,
    Cancelled,
}

impl SessionState {
    fn rank(&self) -> u8 {
        return match self {
            SessionState::Idle => 0,
            SessionState::Started => 1,
            SessionState::Streaming => 2,
            SessionState::Completed | SessionState::Errored | SessionState::Cancelled => 3,
        };
    }

    pub fn is_terminal(&self) -> bool {
        return self.rank() == 3;
    }

    pub fn is_active(&self) -> bool {
        return matches!(self, SessionState::Started | SessionState::Streaming);
    }

    /// States only ever move forward. Staying put is allowed for the
    /// non-terminal states so repeated chunks keep a session `Streaming`.
    pub fn can_advance_to(&self, next: SessionState) -> bool {
        if self.is_terminal() {
            return false;
        }

        return next.rank() >= self.rank();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    pub page: u32,
    pub total: Option<u32>,
    pub text: String,
    pub image_url: Option<String>,
}

/// Descriptive fields that may arrive at any point before the terminal frame.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub mode: Option<String>,
    pub output_format: Option<String>,
    pub prompt_used: Option<String>,
    pub timestamp: Option<String>,
    pub start_time: Option<String>,
    pub duration_ms: Option<u64>,
    pub image_urls: Vec<String>,
}

fn merge_field(current: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = incoming {
        if !value.is_empty() {
            *current = Some(value.to_string());
        }
    }
}

impl Metadata {
    /// Merges incoming fields, never replacing a recorded value with an
    /// emptier one.
    pub fn merge(&mut self, frame: &MetadataFrame) {
        merge_field(&mut self.mode, &frame.mode);
        merge_field(&mut self.output_format, &frame.output_format);
        merge_field(&mut self.prompt_used, &frame.prompt_used);
        merge_field(&mut self.timestamp, &frame.timestamp);
        merge_field(&mut self.start_time, &frame.start_time);

        if frame.duration_ms.is_some() {
            self.duration_ms = frame.duration_ms;
        }

        if let Some(urls) = &frame.image_urls {
            if !urls.is_empty() {
                self.image_urls = urls.clone();
            }
        }
    }
}

/// Mutable state of one recognition job, owned by a single aggregator.
#[derive(Debug, Default, Clone)]
pub struct Session {
    pub job_id: Option<String>,
    pub state: SessionState,
    pub mode: String,
    pub output_format: OutputFormat,
    pub text: String,
    pub pages: Option<Vec<PageResult>>,
    pub image_url: Option<String>,
    pub current_page: Option<u32>,
    pub total_pages: Option<u32>,
    pub metadata: Metadata,
    pub start_time: Option<String>,
    pub started_at: Option<Instant>,
    pub duration_ms: Option<u64>,
    pub error: Option<JobError>,
    pub cancel_requested: bool,
}

impl Session {
    pub fn new(mode: &str, output_format: OutputFormat) -> Session {
        return Session {
            mode: mode.to_string(),
            output_format,
            started_at: Some(Instant::now()),
            ..Session::default()
        };
    }

    /// Drops everything a presenter could render. Failed and cancelled jobs
    /// deliver no partial result.
    pub fn discard_result(&mut self) {
        self.text.clear();
        self.pages = None;
        self.image_url = None;
        self.current_page = None;
        self.total_pages = None;
    }

    /// Output format reported by the service, falling back to the one that
    /// was requested.
    pub fn reported_output_format(&self) -> OutputFormat {
        return self
            .metadata
            .output_format
            .as_deref()
            .and_then(|format| return OutputFormat::from_str(format).ok())
            .unwrap_or(self.output_format);
    }

    pub fn snapshot(&self) -> ResultSnapshot {
        let streaming = !self.state.is_terminal();

        return ResultSnapshot {
            job_id: self.job_id.clone(),
            text: self.text.to_string(),
            mode: self
                .metadata
                .mode
                .clone()
                .unwrap_or_else(|| return self.mode.to_string()),
            output_format: if streaming {
                self.output_format
            } else {
                self.reported_output_format()
            },
            pages: self.pages.clone().unwrap_or_default(),
            image_url: self.image_url.clone(),
            current_page: self.current_page,
            total_pages: self.total_pages,
            prompt_used: self.metadata.prompt_used.clone().unwrap_or_default(),
            timestamp: self.metadata.timestamp.clone().unwrap_or_default(),
            start_time: self
                .start_time
                .clone()
                .or_else(|| return self.metadata.start_time.clone()),
            streaming,
            duration_ms: self.duration_ms,
        };
    }
}
