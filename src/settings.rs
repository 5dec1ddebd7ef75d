use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

/// Fixed key the recognition settings are stored under.
pub const SETTINGS_KEY: &str = "signcastSettings";

/// User-tunable recognition parameters, sent with every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub confidence_threshold: f64,
    pub prediction_count: u32,
    /// Milliseconds between two live captures.
    pub frame_rate: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            prediction_count: 3,
            frame_rate: 50,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            bail!(
                "confidenceThreshold must be within [0, 1], got {}",
                self.confidence_threshold
            );
        }
        if self.prediction_count == 0 {
            bail!("predictionCount must be positive");
        }
        if self.frame_rate == 0 {
            bail!("frameRate must be positive");
        }
        Ok(())
    }

    /// Parse a stored blob, filling absent fields from the defaults.
    pub fn merged_from_json(raw: &str) -> Result<Self> {
        let settings: Settings =
            serde_json::from_str(raw).context("settings blob is not valid JSON")?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredSettings {
    #[serde(rename = "signcastSettings", default)]
    recognition: Settings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<StoredSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<StoredSettings>(&contents) {
                Ok(stored) if stored.recognition.validate().is_ok() => stored,
                _ => {
                    log::warn!(
                        "ignoring unreadable {} blob in {}",
                        SETTINGS_KEY,
                        path.display()
                    );
                    StoredSettings::default()
                }
            }
        } else {
            StoredSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> Settings {
        match self.data.read() {
            Ok(guard) => guard.recognition.clone(),
            Err(poisoned) => poisoned.into_inner().recognition.clone(),
        }
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        settings.validate()?;
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        guard.recognition = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &StoredSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
