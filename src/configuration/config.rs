#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::Arg;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;

use crate::domain::models::OutputFormat;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    ConfigFile,
    FallbackTimeout,
    Mode,
    OutputFormat,
    Prompt,
    RequestTimeout,
    #[strum(serialize = "server-url")]
    ServerURL,
}

fn find_arg(cmd: &Command, key: ConfigKey) -> Option<&Arg> {
    return cmd
        .get_arguments()
        .find(|e| return e.get_long() == Some(key.to_string().as_str()));
}

fn possible_values(cmd: &Command, key: ConfigKey) -> Vec<String> {
    return find_arg(cmd, key)
        .map(|arg| {
            return arg
                .get_possible_values()
                .iter()
                .map(|e| return e.get_name().to_string())
                .collect::<Vec<String>>();
        })
        .unwrap_or_default();
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn default(key: ConfigKey) -> String {
        let default_format = OutputFormat::default().to_string();

        let config_path = dirs::config_dir()
            .unwrap_or_else(|| return path::PathBuf::from("."))
            .join("ocrstream/config.toml")
            .to_string_lossy()
            .to_string();

        let res = match key {
            ConfigKey::FallbackTimeout => "",
            ConfigKey::Mode => "base",
            ConfigKey::OutputFormat => &default_format,
            ConfigKey::Prompt => "",
            ConfigKey::RequestTimeout => "5000",
            ConfigKey::ServerURL => "http://localhost:8000",

            // Special
            ConfigKey::ConfigFile => &config_path,
        };

        return res.to_string();
    }

    /// Overlays the TOML file at `config_path` onto the current values.
    /// Integers are kept as written; strings must match the option's clap
    /// possible values when it declares any.
    async fn load_file(cmd: &Command, config_path: &path::Path) -> Result<()> {
        let toml_str = fs::read_to_string(config_path).await?;
        let doc = toml_str.parse::<toml_edit::Document>()?;

        for key in ConfigKey::iter() {
            let item = match doc.get(&key.to_string()) {
                Some(item) => item,
                None => continue,
            };

            if let Some(millis) = item.as_integer() {
                Config::set(key, &millis.to_string());
                continue;
            }

            let val = item.as_str().unwrap_or_default();
            if val.is_empty() {
                continue;
            }

            let allowed = possible_values(cmd, key);
            if !allowed.is_empty() && !allowed.iter().any(|e| return e == val) {
                bail!(format!(
                    "config.toml has an invalid value for key '{key}': {val}\nPossible values are: {}",
                    allowed.join(", ")
                ));
            }
            Config::set(key, val);
        }

        return Ok(());
    }

    pub async fn load(cmd: Command, clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let config_file = clap_arg_matches
            .iter()
            .filter_map(|matches| {
                return matches
                    .try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
                    .ok()
                    .flatten();
            })
            .last()
            .cloned()
            .unwrap_or_else(|| return Config::default(ConfigKey::ConfigFile));

        let config_path = path::PathBuf::from(config_file);
        if config_path.exists() {
            Config::load_file(&cmd, &config_path).await?;
        }

        // Command line and environment values win over the file.
        for matches in clap_arg_matches.iter() {
            for key in ConfigKey::iter() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if !val.is_empty() {
                        Config::set(key, val);
                    }
                }
            }
        }

        for key in [ConfigKey::FallbackTimeout, ConfigKey::RequestTimeout] {
            let val = Config::get(key);
            if !val.is_empty() && val.parse::<u64>().is_err() {
                bail!(format!(
                    "Invalid value for '{key}': {val}\nExpected a duration in milliseconds"
                ));
            }
        }

        tracing::debug!(
            server_url = Config::get(ConfigKey::ServerURL),
            mode = Config::get(ConfigKey::Mode),
            output_format = Config::get(ConfigKey::OutputFormat),
            fallback_timeout = Config::get(ConfigKey::FallbackTimeout),
            request_timeout = Config::get(ConfigKey::RequestTimeout),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::ConfigFile {
                    return None;
                }

                let arg = find_arg(&cmd, key)?;

                let mut description = arg
                    .get_help()
                    .map(|help| return help.to_string())
                    .unwrap_or_default();

                description = description
                    .split("[default:")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                let allowed = possible_values(&cmd, key);
                if !allowed.is_empty() {
                    description = format!("{description} [possible values: {}]", allowed.join(", "));
                }

                let mut val = Config::default(key);
                if val.is_empty() {
                    val = format!("# {key} = \"\"");
                } else if val.parse::<i32>().is_ok() {
                    val = format!("{key} = {val}");
                } else {
                    val = format!("{key} = \"{val}\"");
                }

                return Some(format!("# {description}\n{val}"));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }
}
