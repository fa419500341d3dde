#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgMatches;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use yansi::Paint;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::OutputFormat;
use crate::domain::models::ServiceConfigs;
use crate::infrastructure::backends::BackendManager;

/// Resolution modes offered by the recognition service.
pub const MODES: [&str; 5] = ["tiny", "small", "base", "large", "gundam"];

/// A document submission parsed from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub file: path::PathBuf,
    pub print_json: bool,
}

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

async fn print_health() -> Result<()> {
    let backend = BackendManager::get()?;
    backend.health_check().await?;
    println!(
        "{} DeepSeek-OCR is ready at {}",
        Paint::green("✔"),
        Config::get(ConfigKey::ServerURL)
    );

    return Ok(());
}

pub fn format_configs(configs: &ServiceConfigs) -> String {
    let mut lines = vec![Paint::new("MODES").bold().to_string()];
    for mode in &configs.modes {
        let mut line = format!("  {:<10} {}", mode.value, mode.label);
        if mode.value == configs.default_mode {
            line = format!("{line} (default)");
        }
        lines.push(line);
    }

    lines.push("".to_string());
    lines.push(Paint::new("OUTPUT FORMATS").bold().to_string());
    for format in &configs.output_formats {
        let mut line = format!("  {:<10} {}", format.value, format.label);
        if let Some(input_type) = &format.input_type {
            line = format!("{line} [prompt: {input_type}]");
        }
        if format.value == configs.default_format {
            line = format!("{line} (default)");
        }
        lines.push(line);
    }

    return lines.join("\n");
}

async fn print_configs() -> Result<()> {
    let backend = BackendManager::get()?;
    let configs = backend.list_configs().await?;
    println!("{}", format_configs(&configs));

    return Ok(());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

pub fn build() -> Command {
    let about = format!(
        "{}\n\nVersion: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
    );

    return Command::new("ocrstream")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .args_conflicts_with_subcommands(true)
        .subcommand_negates_reqs(true)
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(Command::new("configs").about("Lists the modes and output formats offered by the service."))
        .subcommand(Command::new("health").about("Checks the service is reachable and its model is loaded."))
        .arg(
            Arg::new("file")
                .help("Document to recognize. Images and PDFs are supported.")
                .value_parser(value_parser!(path::PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the final result as JSON instead of streaming text.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("OCRSTREAM_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::ServerURL.to_string())
                .short('u')
                .long(ConfigKey::ServerURL.to_string())
                .env("OCRSTREAM_SERVER_URL")
                .num_args(1)
                .help(format!("Base URL of the DeepSeek-OCR service. [default: {}]", Config::default(ConfigKey::ServerURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::Mode.to_string())
                .short('m')
                .long(ConfigKey::Mode.to_string())
                .env("OCRSTREAM_MODE")
                .num_args(1)
                .help(format!("Model resolution mode used for recognition. [default: {}]", Config::default(ConfigKey::Mode)))
                .value_parser(PossibleValuesParser::new(MODES))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::OutputFormat.to_string())
                .short('f')
                .long(ConfigKey::OutputFormat.to_string())
                .env("OCRSTREAM_OUTPUT_FORMAT")
                .num_args(1)
                .help(format!("What the service should produce from the document. [default: {}]", Config::default(ConfigKey::OutputFormat)))
                .value_parser(PossibleValuesParser::new(OutputFormat::VARIANTS))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::Prompt.to_string())
                .short('p')
                .long(ConfigKey::Prompt.to_string())
                .env("OCRSTREAM_PROMPT")
                .num_args(1)
                .help("Custom prompt. Required by the rec output format to describe what to locate, ignored by general.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::FallbackTimeout.to_string())
                .long(ConfigKey::FallbackTimeout.to_string())
                .env("OCRSTREAM_FALLBACK_TIMEOUT")
                .num_args(1)
                .help("Milliseconds to wait for the first streamed frame before falling back to a synchronous request. Computed from the document size when not set.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::RequestTimeout.to_string())
                .long(ConfigKey::RequestTimeout.to_string())
                .env("OCRSTREAM_REQUEST_TIMEOUT")
                .num_args(1)
                .help(format!("Time to wait in milliseconds for health, configs and cancel requests. [default: {}]", Config::default(ConfigKey::RequestTimeout)))
                .global(true),
        );
}

/// Reads the document submission out of top level matches.
pub fn invocation(matches: &ArgMatches) -> Result<Invocation> {
    let file = match matches.get_one::<path::PathBuf>("file") {
        Some(file) => file.to_path_buf(),
        None => bail!("A document to recognize is required"),
    };

    return Ok(Invocation {
        file,
        print_json: matches.get_flag("json"),
    });
}

/// Handles subcommands, loads configuration, and returns the document to
/// recognize when there is one.
pub async fn parse() -> Result<Option<Invocation>> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
            }
            _ => {
                subcommand_config().print_long_help()?;
            }
        },
        Some(("configs", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            print_configs().await?;
        }
        Some(("health", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            print_health().await?;
        }
        _ => {
            Config::load(build(), vec![&matches]).await?;
            return Ok(Some(invocation(&matches)?));
        }
    }

    return Ok(None);
}
