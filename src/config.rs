use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// On-disk configuration, read from `travelbot/config.json` under the
/// platform config directory. Every field is optional; the API key may also
/// come from the OPENWEATHER_API_KEY environment variable, which wins over
/// the file.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub locations_file: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        Ok(config)
    }

    pub fn resolved_api_key(&self) -> Option<String> {
        env::var("OPENWEATHER_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| self.api_key.clone())
    }

    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Saved locations live next to the config file unless overridden.
    pub fn resolved_locations_file(&self) -> Result<PathBuf> {
        match &self.locations_file {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(Self::config_dir()?.join("locations.json")),
        }
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("travelbot.log"))
    }

    /// Config file location for error messages, best effort.
    pub fn display_path() -> String {
        Self::get_config_path()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|_| "the config file".to_string())
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("travelbot"))
    }
}
