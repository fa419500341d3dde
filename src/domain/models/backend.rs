use std::io;
use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use super::RecognitionRequest;
use super::RecognitionResponse;
use super::ServiceConfigs;

/// Raw body of a streaming recognition response. Dropping it aborts the
/// underlying transport.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;

#[async_trait]
pub trait Backend {
    /// Used by the `health` subcommand to verify the service is reachable and
    /// has its model loaded.
    async fn health_check(&self) -> Result<()>;

    /// Lists the modes and output formats the service offers.
    async fn list_configs(&self) -> Result<ServiceConfigs>;

    /// Submits a document and returns the still-open event stream once the
    /// service has accepted the request.
    async fn open_stream(&self, request: &RecognitionRequest) -> Result<ChunkStream>;

    /// Submits the same document through the synchronous endpoint and waits
    /// for the full result.
    async fn recognize(&self, request: &RecognitionRequest) -> Result<RecognitionResponse>;

    /// Asks the service to stop working on a job. Callers treat this as best
    /// effort.
    async fn cancel(&self, job_id: &str) -> Result<()>;
}

pub type BackendBox = Box<dyn Backend + Send + Sync>;
