#[cfg(test)]
#[path = "request_test.rs"]
mod tests;

use std::path;

use anyhow::bail;
use anyhow::Result;
use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;
use tokio::fs;

use super::OutputFormat;
use super::PromptPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
    Other,
}

impl DocumentKind {
    pub fn from_file_name(file_name: &str) -> DocumentKind {
        let ext = path::Path::new(file_name)
            .extension()
            .map(|ext| return ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        return match ext.as_str() {
            "pdf" => DocumentKind::Pdf,
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "tif" | "tiff" => {
                DocumentKind::Image
            }
            _ => DocumentKind::Other,
        };
    }
}

/// A file submitted for recognition, held in memory so that the same bytes
/// can be sent again through the synchronous fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub kind: DocumentKind,
    pub content: Bytes,
}

impl Document {
    pub fn new(file_name: &str, content: impl Into<Bytes>) -> Document {
        return Document {
            file_name: file_name.to_string(),
            kind: DocumentKind::from_file_name(file_name),
            content: content.into(),
        };
    }

    pub async fn load(file_path: &path::Path) -> Result<Document> {
        if !file_path.exists() {
            bail!(format!("No file found at {}", file_path.display()));
        }

        let content = fs::read(file_path).await?;
        if content.is_empty() {
            bail!(format!("{} is empty", file_path.display()));
        }

        let file_name = file_path
            .file_name()
            .map(|name| return name.to_string_lossy().to_string())
            .unwrap_or_else(|| return "document".to_string());

        return Ok(Document::new(&file_name, content));
    }

    pub fn size_bytes(&self) -> u64 {
        return self.content.len() as u64;
    }

    pub fn mime_type(&self) -> String {
        let ext = path::Path::new(&self.file_name)
            .extension()
            .map(|ext| return ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let mime = match ext.as_str() {
            "pdf" => "application/pdf",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            "webp" => "image/webp",
            "tif" | "tiff" => "image/tiff",
            _ => "application/octet-stream",
        };

        return mime.to_string();
    }
}

/// Everything needed to submit one recognition job. The same request is
/// replayed verbatim by the synchronous fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionRequest {
    pub document: Document,
    pub mode: String,
    pub output_format: OutputFormat,
    pub prompt: Option<String>,
}

impl RecognitionRequest {
    pub fn new(
        document: Document,
        mode: &str,
        output_format: OutputFormat,
        prompt: &str,
    ) -> Result<RecognitionRequest> {
        let prompt = prompt.trim();
        let prompt = match output_format.prompt_policy() {
            PromptPolicy::Required => {
                if prompt.is_empty() {
                    bail!(format!(
                        "Output format '{output_format}' requires a prompt describing what to locate"
                    ));
                }
                Some(prompt.to_string())
            }
            PromptPolicy::Optional if !prompt.is_empty() => Some(prompt.to_string()),
            _ => None,
        };

        return Ok(RecognitionRequest {
            document,
            mode: mode.to_string(),
            output_format,
            prompt,
        });
    }
}

/// Body of the synchronous recognition endpoint's `data` field.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResponse {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub output_format: Option<String>,
    #[serde(default)]
    pub prompt_used: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeOption {
    pub value: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFormatOption {
    pub value: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Options advertised by the recognition service.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfigs {
    #[serde(default)]
    pub modes: Vec<ModeOption>,
    #[serde(default)]
    pub output_formats: Vec<OutputFormatOption>,
    #[serde(default)]
    pub default_mode: String,
    #[serde(default)]
    pub default_format: String,
}
