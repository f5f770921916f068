//! Settings persistence as a pretty-printed JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::model::Settings;
use crate::domain::tree;

/// Reads and writes [`Settings`] at a fixed path.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the persisted settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted settings, falling back to defaults when the file does not exist yet.
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no settings file, using defaults");
            return Ok(Settings::default());
        }

        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read settings file at {}", self.path.display()))?;
        let settings: Settings = serde_json::from_str(&data)
            .with_context(|| format!("invalid settings data in {}", self.path.display()))?;
        tree::validate_unique_ids(&settings.choices)
            .with_context(|| format!("invalid choice tree in {}", self.path.display()))?;
        Ok(settings)
    }

    /// Persist `settings`, creating parent directories as needed.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create settings directory {}", dir.display()))?;
        }

        let data =
            serde_json::to_string_pretty(settings).context("failed to serialize settings")?;
        fs::write(&self.path, data)
            .with_context(|| format!("failed to write settings file to {}", self.path.display()))?;
        Ok(())
    }
}
