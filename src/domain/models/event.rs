use std::time::Duration;

use super::JobError;
use super::ResultSnapshot;

#[derive(Debug)]
pub enum Event {
    JobCancelled(String),
    JobCompleted(ResultSnapshot),
    JobFailed(JobError),
    JobFallback(Duration),
    JobProgress(Duration),
    JobSnapshot(ResultSnapshot),
}
