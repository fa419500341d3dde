#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::io;
use std::process;

use anyhow::bail;
use anyhow::Error;
use anyhow::Result;
use domain::models::Action;
use domain::models::Document;
use domain::models::Event;
use domain::models::OutputFormat;
use domain::models::RecognitionRequest;
use domain::services::JobService;
use infrastructure::backends::BackendManager;
use tokio::sync::mpsc;
use tokio::task;
use yansi::Paint;

use crate::application::cli;
use crate::application::cli::Invocation;
use crate::application::presenter::ResultPresenter;
use crate::configuration::Config;
use crate::configuration::ConfigKey;

fn handle_error(err: Error) {
    eprintln!(
        "{}",
        Paint::red(format!(
            "Oh no! ocrstream has failed with the following app version and error.\n\nVersion: {}\nError: {}",
            env!("CARGO_PKG_VERSION"),
            err
        ))
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

async fn build_request(invocation: &Invocation) -> Result<RecognitionRequest> {
    let document = Document::load(&invocation.file).await?;
    let output_format = Config::get(ConfigKey::OutputFormat).parse::<OutputFormat>()?;

    return RecognitionRequest::new(
        document,
        &Config::get(ConfigKey::Mode),
        output_format,
        &Config::get(ConfigKey::Prompt),
    );
}

async fn run(invocation: Invocation) -> Result<i32> {
    let request = build_request(&invocation).await?;
    let backend = BackendManager::get()?;

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
    action_tx.send(Action::JobSubmit(request))?;

    let mut background_futures = task::JoinSet::new();
    background_futures.spawn(async move {
        return JobService::start(backend, event_tx, &mut action_rx).await;
    });
    background_futures.spawn(async move {
        loop {
            tokio::signal::ctrl_c().await?;
            tracing::info!("Received interrupt, cancelling recognition job");
            if action_tx.send(Action::JobCancel()).is_err() {
                return Ok::<(), Error>(());
            }
        }
    });

    let presenter = ResultPresenter::new(
        io::stdout(),
        io::stderr(),
        &Config::get(ConfigKey::ServerURL),
        invocation.print_json,
    );

    return tokio::select! {
        biased;
        res = presenter.start(event_rx) => res,
        Some(res) = background_futures.join_next() => {
            res??;
            bail!("Recognition stopped before the job finished");
        }
    };
}

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let debug_log_dir = env::var("OCRSTREAM_LOG_DIR").unwrap_or_else(|_| {
        return dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("ocrstream")
            .to_string_lossy()
            .to_string();
    });

    let file_appender = tracing_appender::rolling::never(debug_log_dir, "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("ocrstream")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    let invocation = match cli::parse().await {
        Ok(Some(invocation)) => invocation,
        Ok(None) => process::exit(0),
        Err(err) => return handle_error(err),
    };

    match run(invocation).await {
        Ok(code) => process::exit(code),
        Err(err) => handle_error(err),
    }
}
