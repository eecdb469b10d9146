//! Per-domain adaptive volume settings and their stores

use crate::constants::settings::{
    APP_DIR, DEFAULT_DOMAIN, DEFAULT_ENABLED, DEFAULT_EQUALIZATION, DEFAULT_SENSITIVITY,
    FILE_NAME, KEY_PREFIX, MAX_SENSITIVITY, MIN_SENSITIVITY,
};
use crate::error::{AppError, AppResult};
use crate::messages::{Message, MessageSender};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Complete settings for one domain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(rename = "isEnabled")]
    pub enabled: bool,
    pub sensitivity: f32,
    #[serde(rename = "eqEnabled")]
    pub equalization_enabled: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_ENABLED,
            sensitivity: DEFAULT_SENSITIVITY,
            equalization_enabled: DEFAULT_EQUALIZATION,
        }
    }
}

/// Keep sensitivity inside the range that cannot produce extreme amplification
pub fn clamp_sensitivity(sensitivity: f32) -> f32 {
    if sensitivity.is_finite() {
        sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY)
    } else {
        DEFAULT_SENSITIVITY
    }
}

/// Stored settings; missing keys fall back to the defaults when read
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialConfiguration {
    #[serde(rename = "isEnabled", default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<f32>,
    #[serde(rename = "eqEnabled", default, skip_serializing_if = "Option::is_none")]
    pub equalization_enabled: Option<bool>,
}

impl PartialConfiguration {
    /// Fill the gaps from the defaults
    pub fn merged(&self) -> Configuration {
        let defaults = Configuration::default();
        Configuration {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            sensitivity: clamp_sensitivity(self.sensitivity.unwrap_or(defaults.sensitivity)),
            equalization_enabled: self
                .equalization_enabled
                .unwrap_or(defaults.equalization_enabled),
        }
    }

    /// Overlay the keys set in `other` on top of these
    pub fn overlay(&self, other: &PartialConfiguration) -> PartialConfiguration {
        PartialConfiguration {
            enabled: other.enabled.or(self.enabled),
            sensitivity: other.sensitivity.or(self.sensitivity),
            equalization_enabled: other.equalization_enabled.or(self.equalization_enabled),
        }
    }
}

impl From<Configuration> for PartialConfiguration {
    fn from(config: Configuration) -> Self {
        Self {
            enabled: Some(config.enabled),
            sensitivity: Some(config.sensitivity),
            equalization_enabled: Some(config.equalization_enabled),
        }
    }
}

/// Storage key for a domain; an empty domain maps to the default key
pub fn storage_key(domain: &str) -> String {
    let domain = if domain.is_empty() { DEFAULT_DOMAIN } else { domain };
    format!("{}{}", KEY_PREFIX, domain)
}

/// Read/write contract of a settings backend.
///
/// Neither operation fails outward: reads degrade to defaults and failed
/// writes are logged.
pub trait SettingsStore {
    /// Defaults merged with whatever is stored for `domain`
    fn get_settings(&self, domain: &str) -> Configuration;
    /// Replace what is stored for `domain`
    fn save_settings(&self, domain: &str, settings: &PartialConfiguration);
}

impl<S: SettingsStore + ?Sized> SettingsStore for std::sync::Arc<S> {
    fn get_settings(&self, domain: &str) -> Configuration {
        (**self).get_settings(domain)
    }

    fn save_settings(&self, domain: &str, settings: &PartialConfiguration) {
        (**self).save_settings(domain, settings)
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, PartialConfiguration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get_settings(&self, domain: &str) -> Configuration {
        let key = storage_key(domain);
        match self.entries.lock() {
            Ok(entries) => entries.get(&key).copied().unwrap_or_default().merged(),
            Err(_) => {
                tracing::error!(key = %key, "Settings store poisoned, using defaults");
                Configuration::default()
            }
        }
    }

    fn save_settings(&self, domain: &str, settings: &PartialConfiguration) {
        let key = storage_key(domain);
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(key, *settings);
            }
            Err(_) => tracing::error!(key = %key, "Settings store poisoned, write dropped"),
        }
    }
}

/// JSON file store: one object mapping storage keys to stored settings
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles from this process.
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store at the platform config directory
    pub fn at_default_location() -> AppResult<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| AppError::Settings("No config directory on this platform".to_string()))?;
        Ok(Self::new(dir.join(APP_DIR).join(FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> AppResult<BTreeMap<String, PartialConfiguration>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_entry(&self, key: String, settings: &PartialConfiguration) -> AppResult<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| AppError::Settings("settings file lock poisoned".to_string()))?;

        let mut all = self.read_all()?;
        all.insert(key, *settings);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&all)?;
        // Write next to the target and rename, so readers never see half a file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for FileStore {
    fn get_settings(&self, domain: &str) -> Configuration {
        let key = storage_key(domain);
        match self.read_all() {
            Ok(all) => all.get(&key).copied().unwrap_or_default().merged(),
            Err(e) => {
                tracing::error!(key = %key, "Failed to read settings, using defaults: {}", e);
                Configuration::default()
            }
        }
    }

    fn save_settings(&self, domain: &str, settings: &PartialConfiguration) {
        let key = storage_key(domain);
        if let Err(e) = self.write_entry(key.clone(), settings) {
            tracing::error!(key = %key, "Failed to save settings: {}", e);
        }
    }
}

/// A store bound to one domain that announces every write
pub struct SettingsService<S: SettingsStore> {
    store: S,
    domain: String,
    notify: Option<MessageSender>,
}

impl<S: SettingsStore> SettingsService<S> {
    pub fn new(store: S, domain: impl Into<String>, notify: Option<MessageSender>) -> Self {
        Self {
            store,
            domain: domain.into(),
            notify,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn load(&self) -> Configuration {
        self.store.get_settings(&self.domain)
    }

    /// Save and broadcast `settingsChanged`. Delivery failures are logged only.
    pub async fn save(&self, settings: &PartialConfiguration) {
        self.store.save_settings(&self.domain, settings);

        let Some(notify) = &self.notify else {
            return;
        };
        let message = Message::SettingsChanged {
            domain: self.domain.clone(),
        };
        if let Err(e) = notify.send(message).await {
            tracing::warn!(domain = %self.domain, "settingsChanged not delivered: {}", e);
        }
    }
}
