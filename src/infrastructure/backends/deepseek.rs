#[cfg(test)]
#[path = "deepseek_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use reqwest::multipart::Form;
use reqwest::multipart::Part;
use serde::Deserialize;
use serde::Serialize;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Backend;
use crate::domain::models::ChunkStream;
use crate::domain::models::RecognitionRequest;
use crate::domain::models::RecognitionResponse;
use crate::domain::models::ServiceConfigs;
use crate::domain::models::ServiceRejection;

fn convert_err(err: reqwest::Error) -> std::io::Error {
    let err_msg = err.to_string();
    return std::io::Error::new(std::io::ErrorKind::Interrupted, err_msg);
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CancelRequest {
    job_id: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RecognitionEnvelope {
    #[serde(default)]
    success: bool,
    data: RecognitionResponse,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ErrorResponse {
    detail: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    model_loaded: bool,
}

fn to_form(request: &RecognitionRequest) -> Result<Form> {
    let file = Part::bytes(request.document.content.to_vec())
        .file_name(request.document.file_name.to_string())
        .mime_str(&request.document.mime_type())?;

    let mut form = Form::new()
        .part("file", file)
        .text("mode", request.mode.to_string())
        .text("output_format", request.output_format.to_string());

    if let Some(prompt) = &request.prompt {
        form = form.text("custom_prompt", prompt.to_string());
    }

    return Ok(form);
}

/// Turns an error response into a `ServiceRejection` when FastAPI supplied a
/// `detail`, otherwise into a plain status error.
async fn rejection(res: reqwest::Response) -> anyhow::Error {
    let status = res.status().as_u16();
    if let Ok(body) = res.json::<ErrorResponse>().await {
        if !body.detail.is_empty() {
            return ServiceRejection {
                status,
                detail: body.detail,
            }
            .into();
        }
    }

    return anyhow!("HTTP error! status: {status}");
}

/// Client for the DeepSeek-OCR web service.
pub struct DeepSeek {
    url: String,
    timeout: String,
}

impl Default for DeepSeek {
    fn default() -> DeepSeek {
        return DeepSeek {
            url: Config::get(ConfigKey::ServerURL),
            timeout: Config::get(ConfigKey::RequestTimeout),
        };
    }
}

impl DeepSeek {
    fn request_timeout(&self) -> Result<Duration> {
        return Ok(Duration::from_millis(self.timeout.parse::<u64>()?));
    }
}

#[async_trait]
impl Backend for DeepSeek {
    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        let res = reqwest::Client::new()
            .get(format!("{url}/api/health", url = self.url))
            .timeout(self.request_timeout()?)
            .send()
            .await;

        let res = match res {
            Ok(res) => res,
            Err(err) => {
                tracing::error!(error = ?err, "DeepSeek-OCR is not running");
                bail!("DeepSeek-OCR is not running");
            }
        };

        if res.status() != 200 {
            tracing::error!(status = res.status().as_u16(), "DeepSeek-OCR health check failed");
            bail!("DeepSeek-OCR health check failed");
        }

        let health = res.json::<HealthResponse>().await?;
        if !health.model_loaded {
            tracing::error!(status = health.status, "DeepSeek-OCR model is not loaded");
            bail!("DeepSeek-OCR is running, but its model is not loaded yet");
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn list_configs(&self) -> Result<ServiceConfigs> {
        let res = reqwest::Client::new()
            .get(format!("{url}/api/configs", url = self.url))
            .timeout(self.request_timeout()?)
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(status = res.status().as_u16(), "Failed to list DeepSeek-OCR configs");
            bail!("Failed to list DeepSeek-OCR configs");
        }

        return Ok(res.json::<ServiceConfigs>().await?);
    }

    #[allow(clippy::implicit_return)]
    async fn open_stream(&self, request: &RecognitionRequest) -> Result<ChunkStream> {
        let res = reqwest::Client::new()
            .post(format!("{url}/api/ocr/stream", url = self.url))
            .header("Accept", "text/event-stream")
            .multipart(to_form(request)?)
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(
                status = res.status().as_u16(),
                "Failed to open recognition stream with DeepSeek-OCR"
            );
            return Err(rejection(res).await);
        }

        let stream = res.bytes_stream().map_err(convert_err);
        return Ok(Box::pin(stream));
    }

    #[allow(clippy::implicit_return)]
    async fn recognize(&self, request: &RecognitionRequest) -> Result<RecognitionResponse> {
        let res = reqwest::Client::new()
            .post(format!("{url}/api/ocr", url = self.url))
            .multipart(to_form(request)?)
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(
                status = res.status().as_u16(),
                "Failed to make recognition request to DeepSeek-OCR"
            );
            return Err(rejection(res).await);
        }

        let envelope = res.json::<RecognitionEnvelope>().await?;
        tracing::debug!(body = ?envelope, "Recognition response");
        if !envelope.success {
            bail!("DeepSeek-OCR returned an unsuccessful recognition response");
        }

        return Ok(envelope.data);
    }

    #[allow(clippy::implicit_return)]
    async fn cancel(&self, job_id: &str) -> Result<()> {
        let res = reqwest::Client::new()
            .post(format!("{url}/api/ocr/cancel", url = self.url))
            .timeout(self.request_timeout()?)
            .json(&CancelRequest {
                job_id: job_id.to_string(),
            })
            .send()
            .await?;

        if res.status() == 404 {
            tracing::debug!(job_id = job_id, "Job was already finished when cancelling");
            bail!("Job not found or already finished");
        }

        if !res.status().is_success() {
            tracing::error!(status = res.status().as_u16(), "Failed to cancel DeepSeek-OCR job");
            bail!("Failed to cancel DeepSeek-OCR job");
        }

        return Ok(());
    }
}
