use crate::api::{ClientSettings, Context, LogLevel, MonitoringConfig};
use anyhow::{Context as _, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of the environment variables that override configured instances
const ENV_PREFIX: &str = "CKAN_MIGRATE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceConfig {
    pub base_url: String,
    /// Empty for instances only ever read from
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceConfig>,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Publish migrated datasets unless the command line says otherwise
    #[serde(default)]
    pub publish: bool,
    #[serde(default = "default_request_logging")]
    pub request_logging: bool,
    /// Most verbose API event written when request logging is on
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_logging() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            publish: false,
            request_logging: default_request_logging(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    pub fn to_client_settings(&self) -> ClientSettings {
        ClientSettings {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            monitoring: MonitoringConfig {
                request_logging: self.request_logging,
                log_level: LogLevel::parse(&self.log_level),
            },
        }
    }
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            // Use XDG config directory on Linux
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("ckan-migrate")
        } else {
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".ckan-migrate")
        };

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
            info!("Created config directory: {:?}", config_dir);
        }

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", config_path);

        if !config_path.exists() {
            info!("Config file doesn't exist, using default config");
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        debug!("Loaded config with {} instances", config.instances.len());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        debug!("Saving config to: {:?}", config_path);

        let config_content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(config_path, config_content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        info!("Config saved successfully");
        Ok(())
    }

    pub fn add_instance(&mut self, name: String, instance: InstanceConfig) -> Result<()> {
        if self.instances.contains_key(&name) {
            warn!("Replacing existing instance: {}", name);
        }
        info!("Adding instance: {} ({})", name, instance.base_url);
        self.instances.insert(name, instance);
        Ok(())
    }

    pub fn remove_instance(&mut self, name: &str) -> Result<InstanceConfig> {
        info!("Removing instance: {}", name);
        self.instances
            .remove(name)
            .with_context(|| format!("Instance '{}' not found", name))
    }

    pub fn list_instances(&self) -> Vec<&String> {
        self.instances.keys().collect()
    }

    /// Instance settings with environment overrides applied
    pub fn get_instance(&self, name: &str) -> Option<InstanceConfig> {
        self.resolve_instance(name, |key| std::env::var(key).ok())
    }

    /// Instance settings with overrides taken from `lookup`. An instance that exists
    /// only in the environment needs at least its URL variable set.
    pub fn resolve_instance(&self, name: &str, lookup: impl Fn(&str) -> Option<String>) -> Option<InstanceConfig> {
        let url = lookup(&env_key(name, "URL")).filter(|v| !v.is_empty());
        let api_key = lookup(&env_key(name, "API_KEY"));

        let mut instance = match (self.instances.get(name), url.clone()) {
            (Some(instance), _) => instance.clone(),
            (None, Some(base_url)) => InstanceConfig {
                base_url,
                api_key: String::new(),
            },
            (None, None) => return None,
        };

        if let Some(base_url) = url {
            debug!("Instance '{}' URL overridden from environment", name);
            instance.base_url = base_url;
        }
        if let Some(api_key) = api_key {
            debug!("Instance '{}' API key overridden from environment", name);
            instance.api_key = api_key;
        }
        Some(instance)
    }

    /// Build a validated Context for `instance` scoped to `organization`
    pub fn context_for(&self, instance: &str, organization: &str) -> Result<Context> {
        let settings = self
            .get_instance(instance)
            .with_context(|| format!("Instance '{}' is not configured", instance))?;
        Context::new(settings.base_url, settings.api_key, organization)
            .with_context(|| format!("Invalid settings for instance '{}'", instance))
    }
}

/// `CKAN_MIGRATE_<NAME>_<SUFFIX>` with the instance name upper-cased and
/// non-alphanumerics mapped to `_`
pub fn env_key(instance: &str, suffix: &str) -> String {
    let name: String = instance
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{}_{}_{}", ENV_PREFIX, name, suffix)
}
