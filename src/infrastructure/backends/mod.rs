pub mod deepseek;

use anyhow::bail;
use anyhow::Result;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::BackendBox;

pub struct BackendManager {}

impl BackendManager {
    pub fn get() -> Result<BackendBox> {
        let url = Config::get(ConfigKey::ServerURL);
        if !url.starts_with("http://") && !url.starts_with("https://") {
            bail!(format!("Invalid server URL '{url}', expected an http(s) address"));
        }

        return Ok(Box::<deepseek::DeepSeek>::default());
    }
}
