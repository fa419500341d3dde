use anyhow::Result;

use super::Document;
use super::DocumentKind;
use super::RecognitionRequest;
use crate::domain::models::OutputFormat;

#[test]
fn it_detects_document_kinds() {
    assert_eq!(DocumentKind::from_file_name("scan.PDF"), DocumentKind::Pdf);
    assert_eq!(DocumentKind::from_file_name("photo.jpeg"), DocumentKind::Image);
    assert_eq!(DocumentKind::from_file_name("notes"), DocumentKind::Other);
}

#[test]
fn it_guesses_mime_types() {
    assert_eq!(Document::new("a.pdf", vec![1]).mime_type(), "application/pdf");
    assert_eq!(Document::new("a.png", vec![1]).mime_type(), "image/png");
    assert_eq!(
        Document::new("a.bin", vec![1]).mime_type(),
        "application/octet-stream"
    );
}

#[test]
fn it_requires_a_prompt_for_localization() {
    let res = RecognitionRequest::new(
        Document::new("a.png", vec![1]),
        "base",
        OutputFormat::Rec,
        "  ",
    );
    assert!(res.is_err());
}

#[test]
fn it_drops_prompts_for_general_descriptions() -> Result<()> {
    let req = RecognitionRequest::new(
        Document::new("a.png", vec![1]),
        "base",
        OutputFormat::General,
        "ignored",
    )?;
    assert_eq!(req.prompt, None);

    return Ok(());
}

#[test]
fn it_keeps_optional_prompts() -> Result<()> {
    let req = RecognitionRequest::new(
        Document::new("a.png", vec![1]),
        "small",
        OutputFormat::Markdown,
        " Convert the table. ",
    )?;
    assert_eq!(req.prompt, Some("Convert the table.".to_string()));

    let req = RecognitionRequest::new(
        Document::new("a.png", vec![1]),
        "small",
        OutputFormat::Markdown,
        "",
    )?;
    assert_eq!(req.prompt, None);

    return Ok(());
}

#[tokio::test]
async fn it_fails_to_load_missing_files() {
    let res = Document::load(std::path::Path::new("./test/does-not-exist.pdf")).await;
    assert!(res.is_err());
}
