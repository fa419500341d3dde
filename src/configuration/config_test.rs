use anyhow::Result;

use super::Config;
use super::ConfigKey;
use crate::application::cli;

#[test]
fn it_serializes_to_valid_toml() {
    let res = Config::serialize_default(cli::build());
    let toml_res = res.parse::<toml_edit::Document>();
    assert!(toml_res.is_ok());

    insta::assert_snapshot!(res, @r###"
    # Milliseconds to wait for the first streamed frame before falling back to a synchronous request. Computed from the document size when not set.
    # fallback-timeout = ""

    # Model resolution mode used for recognition. [possible values: tiny, small, base, large, gundam]
    mode = "base"

    # What the service should produce from the document. [possible values: markdown, ocr, free_ocr, figure, general, rec]
    output-format = "markdown"

    # Custom prompt. Required by the rec output format to describe what to locate, ignored by general.
    # prompt = ""

    # Time to wait in milliseconds for health, configs and cancel requests.
    request-timeout = 5000

    # Base URL of the DeepSeek-OCR service.
    server-url = "http://localhost:8000"
    "###);
}

#[test]
fn it_has_stable_config_key_names() {
    let keys = [
        ConfigKey::ConfigFile,
        ConfigKey::FallbackTimeout,
        ConfigKey::OutputFormat,
        ConfigKey::ServerURL,
    ]
    .iter()
    .map(|key| return key.to_string())
    .collect::<Vec<_>>();

    assert_eq!(
        keys,
        vec!["config-file", "fallback-timeout", "output-format", "server-url"]
    );
}

// Loading mutates global state, so every case runs in one test.
#[tokio::test]
async fn it_loads_config_from_file() -> Result<()> {
    let matches =
        cli::build().try_get_matches_from(vec!["ocrstream", "-c", "./config.example.toml", "scan.png"])?;
    Config::load(cli::build(), vec![&matches]).await?;
    assert_eq!(Config::get(ConfigKey::Mode), "gundam");
    assert_eq!(Config::get(ConfigKey::OutputFormat), "ocr");
    assert_eq!(Config::get(ConfigKey::FallbackTimeout), "12000");

    let matches = cli::build().try_get_matches_from(vec![
        "ocrstream",
        "-c",
        "./config.example.toml",
        "-f",
        "figure",
        "scan.png",
    ])?;
    Config::load(cli::build(), vec![&matches]).await?;
    assert_eq!(Config::get(ConfigKey::OutputFormat), "figure");
    assert_eq!(Config::get(ConfigKey::Mode), "gundam");

    let matches = cli::build().try_get_matches_from(vec![
        "ocrstream",
        "-c",
        "./test/bad-config.toml",
        "scan.png",
    ])?;
    let res = Config::load(cli::build(), vec![&matches]).await;
    assert!(res.is_err());

    let matches = cli::build().try_get_matches_from(vec![
        "ocrstream",
        "-c",
        "./config.example.toml",
        "--fallback-timeout",
        "soon",
        "scan.png",
    ])?;
    let res = Config::load(cli::build(), vec![&matches]).await;
    assert!(res.is_err());

    return Ok(());
}
