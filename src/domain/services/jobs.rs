#[cfg(test)]
#[path = "jobs_test.rs"]
mod tests;

use std::io;
use std::time::Duration;

use anyhow::Result;
use futures::future;
use futures::future::BoxFuture;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;

use super::decode_frames;
use super::fallback_deadline;
use super::Applied;
use super::CancellationController;
use super::DecodedFrame;
use super::FallbackSupervisor;
use super::FrameStream;
use super::SessionAggregator;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Action;
use crate::domain::models::BackendBox;
use crate::domain::models::ChunkStream;
use crate::domain::models::Event;
use crate::domain::models::JobError;
use crate::domain::models::Outcome;
use crate::domain::models::RecognitionRequest;
use crate::domain::models::ServiceRejection;
use crate::domain::models::FALLBACK_FAILURE_MESSAGE;

pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

type Opening<'a> = BoxFuture<'a, Result<ChunkStream>>;

enum Step {
    Opened(Result<ChunkStream>),
    Frame(Option<Result<DecodedFrame, io::Error>>),
    Action(Option<Action>),
    Deadline,
    Tick,
}

async fn opened(opening: &mut Option<Opening<'_>>) -> Result<ChunkStream> {
    if let Some(fut) = opening {
        return fut.await;
    }

    return future::pending().await;
}

async fn next_frame(transport: &mut Option<FrameStream>) -> Option<Result<DecodedFrame, io::Error>> {
    if let Some(frames) = transport {
        return frames.next().await;
    }

    return future::pending().await;
}

async fn expired(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        return time::sleep_until(deadline).await;
    }

    return future::pending().await;
}

fn emit(applied: Applied, tx: &mpsc::UnboundedSender<Event>) -> Result<Option<Outcome>> {
    let outcome = match applied {
        Applied::Ignored => return Ok(None),
        Applied::Updated(snapshot) => {
            tx.send(Event::JobSnapshot(snapshot))?;
            return Ok(None);
        }
        Applied::Finished(outcome) => outcome,
    };

    let event = match &outcome {
        Outcome::Completed(snapshot) => Event::JobCompleted(snapshot.clone()),
        Outcome::Failed(err) => Event::JobFailed(err.clone()),
        Outcome::Cancelled(notice) => Event::JobCancelled(notice.to_string()),
    };
    tx.send(event)?;

    return Ok(Some(outcome));
}

/// Drives one recognition job at a time, reporting progress to the
/// presenter through events.
pub struct JobService {}

impl JobService {
    pub async fn start(
        backend: BackendBox,
        tx: mpsc::UnboundedSender<Event>,
        rx: &mut mpsc::UnboundedReceiver<Action>,
    ) -> Result<()> {
        while let Some(action) = rx.recv().await {
            match action {
                Action::JobCancel() => {
                    tracing::debug!("No recognition job is running, ignoring cancel");
                }
                Action::JobSubmit(request) => {
                    let override_ms = Config::get(ConfigKey::FallbackTimeout).parse::<u64>().ok();
                    let timeout = fallback_deadline(&request.document, override_ms);
                    let outcome = JobService::run(&backend, request, timeout, &tx, rx).await?;
                    tracing::info!(outcome = ?outcome, "Recognition job finished");
                }
            }
        }

        return Ok(());
    }

    async fn fallback(
        backend: &BackendBox,
        request: &RecognitionRequest,
        aggregator: &mut SessionAggregator,
        tx: &mpsc::UnboundedSender<Event>,
    ) -> Result<Applied> {
        tx.send(Event::JobFallback(aggregator.elapsed()))?;

        let applied = match backend.recognize(request).await {
            Ok(response) => aggregator.complete_from_fallback(response),
            Err(err) => {
                tracing::error!(error = ?err, "Fallback recognition request failed");
                let message = match err.downcast_ref::<ServiceRejection>() {
                    Some(rejection) => rejection.detail.to_string(),
                    None => FALLBACK_FAILURE_MESSAGE.to_string(),
                };
                aggregator.fail(JobError::Fallback(message))
            }
        };

        return Ok(applied);
    }

    /// Runs a single job until it reaches a terminal state.
    ///
    /// The stream, user actions, the fallback deadline and the progress
    /// ticker are polled together in that priority order, so a frame that is
    /// ready at the same instant as the deadline is always applied first.
    pub async fn run(
        backend: &BackendBox,
        request: RecognitionRequest,
        timeout: Duration,
        tx: &mpsc::UnboundedSender<Event>,
        rx: &mut mpsc::UnboundedReceiver<Action>,
    ) -> Result<Outcome> {
        tracing::info!(
            file = request.document.file_name.as_str(),
            mode = request.mode.as_str(),
            output_format = request.output_format.to_string(),
            timeout_ms = timeout.as_millis() as u64,
            "Submitting recognition job"
        );

        let mut aggregator = SessionAggregator::new(&request);
        let mut supervisor = FallbackSupervisor::arm(timeout);
        let controller = CancellationController::new(backend);

        let mut ticker = time::interval(PROGRESS_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut opening: Option<Opening<'_>> = Some(backend.open_stream(&request));
        let mut transport: Option<FrameStream> = None;
        let mut actions_open = true;

        loop {
            let step = tokio::select! {
                biased;
                res = opened(&mut opening) => Step::Opened(res),
                frame = next_frame(&mut transport) => Step::Frame(frame),
                action = rx.recv(), if actions_open => Step::Action(action),
                _ = expired(supervisor.deadline()) => Step::Deadline,
                _ = ticker.tick() => Step::Tick,
            };

            let applied = match step {
                Step::Opened(res) => {
                    opening = None;
                    match res {
                        Ok(stream) => {
                            tracing::debug!("Recognition stream opened");
                            transport = Some(decode_frames(stream));
                            continue;
                        }
                        Err(err) => {
                            supervisor.disarm();
                            aggregator.transport_closed(Some(err.to_string()))
                        }
                    }
                }
                Step::Frame(Some(Ok(Ok(frame)))) => {
                    if !supervisor.observe_frame() {
                        tracing::debug!(kind = frame.kind(), "Fallback owns the session, dropping frame");
                        continue;
                    }
                    aggregator.apply(frame)
                }
                Step::Frame(Some(Ok(Err(err)))) => {
                    tracing::warn!(error = err.reason, payload = err.payload, "Skipping malformed frame");
                    continue;
                }
                Step::Frame(Some(Err(err))) => {
                    transport = None;
                    if supervisor.try_fire(aggregator.state(), aggregator.cancel_requested()) {
                        JobService::fallback(backend, &request, &mut aggregator, tx).await?
                    } else {
                        aggregator.transport_closed(Some(err.to_string()))
                    }
                }
                Step::Frame(None) => {
                    transport = None;
                    if supervisor.try_fire(aggregator.state(), aggregator.cancel_requested()) {
                        JobService::fallback(backend, &request, &mut aggregator, tx).await?
                    } else {
                        aggregator.transport_closed(None)
                    }
                }
                Step::Action(Some(Action::JobCancel())) => {
                    controller.cancel(&mut aggregator, &mut transport).await
                }
                Step::Action(Some(Action::JobSubmit(_))) => {
                    tracing::warn!("A recognition job is already running, ignoring submission");
                    continue;
                }
                Step::Action(None) => {
                    actions_open = false;
                    continue;
                }
                Step::Deadline => {
                    if !supervisor.try_fire(aggregator.state(), aggregator.cancel_requested()) {
                        continue;
                    }
                    opening = None;
                    if transport.take().is_some() {
                        tracing::info!("Aborted stalled recognition stream");
                    }
                    JobService::fallback(backend, &request, &mut aggregator, tx).await?
                }
                Step::Tick => {
                    tx.send(Event::JobProgress(aggregator.elapsed()))?;
                    continue;
                }
            };

            if let Some(outcome) = emit(applied, tx)? {
                return Ok(outcome);
            }
        }
    }
}
