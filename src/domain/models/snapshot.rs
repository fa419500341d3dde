use serde::Serialize;

use super::JobError;
use super::OutputFormat;
use super::PageResult;

/// Externally observable view of a session at the instant it was emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSnapshot {
    pub job_id: Option<String>,
    pub text: String,
    pub mode: String,
    pub output_format: OutputFormat,
    pub pages: Vec<PageResult>,
    pub image_url: Option<String>,
    pub current_page: Option<u32>,
    pub total_pages: Option<u32>,
    pub prompt_used: String,
    pub timestamp: String,
    pub start_time: Option<String>,
    pub streaming: bool,
    pub duration_ms: Option<u64>,
}

/// How a job ended. Reported exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(ResultSnapshot),
    Failed(JobError),
    Cancelled(String),
}
