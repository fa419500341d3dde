use std::io;
use std::pin::Pin;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::task::Context;
use std::task::Poll;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures::Stream;
use futures::StreamExt;
use serde_json::Value;
use test_utils::sse_body;

use crate::domain::models::Backend;
use crate::domain::models::BackendBox;
use crate::domain::models::ChunkStream;
use crate::domain::models::RecognitionRequest;
use crate::domain::models::RecognitionResponse;
use crate::domain::models::ServiceConfigs;
use crate::domain::models::ServiceRejection;

#[derive(Default)]
pub struct Calls {
    pub opened: AtomicUsize,
    pub aborted: AtomicUsize,
    pub recognized: AtomicUsize,
    pub cancelled: AtomicUsize,
    pub cancelled_ids: Mutex<Vec<String>>,
}

impl Calls {
    pub fn count(counter: &AtomicUsize) -> usize {
        return counter.load(Ordering::SeqCst);
    }
}

/// Increments `aborted` when dropped before its stream finished.
pub struct AbortProbe {
    pub calls: Arc<Calls>,
    pub finished: bool,
}

impl Drop for AbortProbe {
    fn drop(&mut self) {
        if !self.finished {
            self.calls.aborted.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct ProbedStream {
    inner: ChunkStream,
    probe: AbortProbe,
}

impl Stream for ProbedStream {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let res = self.inner.as_mut().poll_next(cx);
        if let Poll::Ready(None) = res {
            self.probe.finished = true;
        }

        return res;
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Tail {
    Pending,
    Close,
    Fail,
}

/// In-memory recognition service. Streams the configured frames, then
/// behaves according to `tail`.
pub struct FakeBackend {
    pub calls: Arc<Calls>,
    pub frames: Vec<Value>,
    pub tail: Tail,
    pub open_stalls: bool,
    pub fallback: Option<RecognitionResponse>,
    pub fallback_rejection: Option<String>,
    pub cancel_fails: bool,
}

impl FakeBackend {
    pub fn new(frames: Vec<Value>, tail: Tail) -> FakeBackend {
        return FakeBackend {
            calls: Arc::new(Calls::default()),
            frames,
            tail,
            open_stalls: false,
            fallback: None,
            fallback_rejection: None,
            cancel_fails: false,
        };
    }

    pub fn boxed(self) -> (BackendBox, Arc<Calls>) {
        let calls = self.calls.clone();
        return (Box::new(self), calls);
    }
}

#[async_trait]
impl Backend for FakeBackend {
    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn list_configs(&self) -> Result<ServiceConfigs> {
        return Ok(ServiceConfigs::default());
    }

    #[allow(clippy::implicit_return)]
    async fn open_stream(&self, _request: &RecognitionRequest) -> Result<ChunkStream> {
        self.calls.opened.fetch_add(1, Ordering::SeqCst);
        if self.open_stalls {
            futures::future::pending::<()>().await;
        }

        let body = Bytes::from(sse_body(&self.frames));
        let head = stream::iter(vec![Ok::<Bytes, io::Error>(body)]);
        let inner: ChunkStream = match self.tail {
            Tail::Pending => Box::pin(head.chain(stream::pending())),
            Tail::Close => Box::pin(head),
            Tail::Fail => Box::pin(head.chain(stream::iter(vec![Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            ))]))),
        };

        return Ok(Box::pin(ProbedStream {
            inner,
            probe: AbortProbe {
                calls: self.calls.clone(),
                finished: false,
            },
        }));
    }

    #[allow(clippy::implicit_return)]
    async fn recognize(&self, _request: &RecognitionRequest) -> Result<RecognitionResponse> {
        self.calls.recognized.fetch_add(1, Ordering::SeqCst);
        if let Some(response) = &self.fallback {
            return Ok(response.clone());
        }

        if let Some(detail) = &self.fallback_rejection {
            return Err(ServiceRejection {
                status: 400,
                detail: detail.to_string(),
            }
            .into());
        }

        bail!("error sending request for url (http://127.0.0.1:1/api/ocr): Connection refused (os error 111)");
    }

    #[allow(clippy::implicit_return)]
    async fn cancel(&self, job_id: &str) -> Result<()> {
        self.calls.cancelled.fetch_add(1, Ordering::SeqCst);
        self.calls
            .cancelled_ids
            .lock()
            .unwrap()
            .push(job_id.to_string());
        if self.cancel_fails {
            bail!("Job not found or already finished");
        }

        return Ok(());
    }
}
