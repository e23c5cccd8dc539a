use crate::prelude::*;

use crate::device::identify;
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};
use std::sync::{Arc, Mutex};

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde_as(as = "DisplayFromStr")]
    pub family: Family,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,

    #[serde(default = "Config::default_auto_register")]
    pub auto_register: bool,

    #[serde(default = "Vec::new")]
    pub devices: Vec<IdentityCandidate>,

    /// Optional JSON register file overriding the family's descriptors
    pub register_file: Option<String>,

    /// Optional override of the family's expected rows per day
    pub normal_day_size: Option<usize>,
}

pub struct ConfigWrapper {
    config: Arc<Mutex<Config>>,
}

impl Clone for ConfigWrapper {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
        }
    }
}

impl ConfigWrapper {
    pub fn new(file: String) -> Result<Self> {
        let config = Config::new(file)?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
        }
    }

    fn config(&self) -> std::sync::MutexGuard<'_, Config> {
        self.config.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn family(&self) -> Family {
        self.config().family
    }

    pub fn loglevel(&self) -> String {
        self.config().loglevel.clone()
    }

    pub fn auto_register(&self) -> bool {
        self.config().auto_register
    }

    pub fn devices(&self) -> Vec<IdentityCandidate> {
        self.config().devices.clone()
    }

    pub fn register_file(&self) -> Option<String> {
        self.config().register_file.clone()
    }

    pub fn normal_day_size(&self) -> Option<usize> {
        self.config().normal_day_size
    }

    /// Builds the device manager for the configured family, with the
    /// register file applied and the configured devices registered.
    pub fn device_manager(&self) -> Result<DeviceManager> {
        let family = self.family();
        let mut catalog = family.catalog();
        if let Some(file) = self.register_file() {
            catalog = catalog.with_register_file(&file)?;
        }

        let manager = DeviceManager::with_catalog(family, catalog)
            .auto_register(self.auto_register())
            .normal_day_size_override(self.normal_day_size());

        for device in self.devices() {
            manager.register(device)?;
        }

        Ok(manager)
    }
}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        info!("Reading configuration from {}", file);
        let content = std::fs::read_to_string(&file)
            .map_err(|err| crate::file_error!("error reading {}: {}", file, err))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;

        info!("Configuration loaded successfully:");
        info!("  Family: {}", config.family);
        info!("  Auto Register: {}", config.auto_register);
        info!("  Devices: {} configured", config.devices.len());
        for (i, device) in config.devices.iter().enumerate() {
            info!("    Device[{}]: {}", i, device);
        }
        if let Some(file) = &config.register_file {
            info!("  Register File: {}", file);
        }
        if let Some(size) = config.normal_day_size {
            info!("  Normal Day Size: {}", size);
        }
        info!("  Log Level: {}", config.loglevel);

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (i, device) in self.devices.iter().enumerate() {
            if let Err(e) = identify(device.clone()) {
                bail!("devices[{}]: {}", i, e);
            }
        }

        if self.normal_day_size == Some(0) {
            return Err(crate::file_error!("normal_day_size must be at least 1"));
        }

        if let Some(file) = &self.register_file {
            if file.is_empty() {
                return Err(crate::file_error!("register_file cannot be empty"));
            }
        }

        if self.loglevel.parse::<log::LevelFilter>().is_err() {
            bail!("loglevel {} is not a valid level", self.loglevel);
        }

        Ok(())
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_auto_register() -> bool {
        true
    }
}
