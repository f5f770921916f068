//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static WORKSPACE_DIR: &str = ".quickchoice";
static WORKSPACE_CONFIG_FILE: &str = "config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub ai: Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    /// Root folder of the document store.
    #[serde(default = "Defaults::default_vault")]
    pub vault: PathBuf,
    /// Settings file, relative to the vault unless absolute.
    #[serde(default = "Defaults::default_settings_file")]
    pub settings_file: PathBuf,
}

impl Defaults {
    fn default_vault() -> PathBuf {
        PathBuf::from(".")
    }

    fn default_settings_file() -> PathBuf {
        PathBuf::from(".quickchoice/settings.json")
    }

    /// Absolute or vault-relative location of the settings file.
    pub fn settings_path(&self) -> PathBuf {
        if self.settings_file.is_absolute() {
            self.settings_file.clone()
        } else {
            self.vault.join(&self.settings_file)
        }
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            vault: Self::default_vault(),
            settings_file: Self::default_settings_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ai {
    #[serde(default = "Ai::default_endpoint")]
    pub endpoint: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "Ai::default_api_key_env")]
    pub api_key_env: String,
    /// Model override applied on top of the settings' default model.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "Ai::default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    #[serde(default = "Ai::default_notice_dismiss_ms")]
    pub notice_dismiss_ms: u64,
}

impl Ai {
    fn default_endpoint() -> String {
        "https://api.openai.com/v1/chat/completions".into()
    }

    fn default_api_key_env() -> String {
        "OPENAI_API_KEY".into()
    }

    fn default_progress_interval_ms() -> u64 {
        1_000
    }

    fn default_notice_dismiss_ms() -> u64 {
        10_000
    }

    pub fn notice_dismiss_delay(&self) -> Duration {
        Duration::from_millis(self.notice_dismiss_ms)
    }

    /// Read the API key from the configured environment variable, empty when unset.
    pub fn api_key(&self) -> String {
        env::var(&self.api_key_env).unwrap_or_default()
    }
}

impl Default for Ai {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            api_key_env: Self::default_api_key_env(),
            model: None,
            progress_interval_ms: Self::default_progress_interval_ms(),
            notice_dismiss_ms: Self::default_notice_dismiss_ms(),
        }
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    vault: Option<String>,
    model: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            vault: env::var("QUICKCHOICE_VAULT").ok(),
            model: env::var("QUICKCHOICE_MODEL").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(vault: &str, model: &str) -> Self {
        Self {
            vault: Some(vault.to_owned()),
            model: Some(model.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    ///
    /// The vault is resolved first (`vault_override`, then `QUICKCHOICE_VAULT`, then the default and
    /// global layers); the workspace layer is `.quickchoice/config.toml` inside that vault.
    pub fn load(vault_override: Option<PathBuf>) -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        Self::load_with_layers(global, vault_override, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        vault_override: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut base = Self::from_str(&DEFAULT_CONFIG)?;

        if let Some(global_path) = global.filter(|path| path.exists()) {
            tracing::debug!(path = %global_path.display(), "loading global config");
            base = base.merge(Self::from_file(&global_path)?);
        }

        let vault = vault_override
            .or_else(|| env_overrides.vault.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| base.defaults.vault.clone());

        let workspace_path = workspace_config_path(&vault);
        if workspace_path.exists() {
            tracing::debug!(path = %workspace_path.display(), "loading workspace config");
            base = base.merge(Self::from_file(&workspace_path)?);
        }

        let mut config = apply_env_overrides(base, env_overrides);
        config.defaults.vault = vault;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            defaults: merge_defaults(self.defaults, other.defaults),
            ai: merge_ai(self.ai, other.ai),
        }
    }
}

fn merge_defaults(base: Defaults, overlay: Defaults) -> Defaults {
    Defaults {
        vault: choose(base.vault, overlay.vault, Defaults::default_vault),
        settings_file: choose(
            base.settings_file,
            overlay.settings_file,
            Defaults::default_settings_file,
        ),
    }
}

fn merge_ai(base: Ai, overlay: Ai) -> Ai {
    Ai {
        endpoint: choose(base.endpoint, overlay.endpoint, Ai::default_endpoint),
        api_key_env: choose(base.api_key_env, overlay.api_key_env, Ai::default_api_key_env),
        model: overlay.model.or(base.model),
        progress_interval_ms: choose(
            base.progress_interval_ms,
            overlay.progress_interval_ms,
            Ai::default_progress_interval_ms,
        ),
        notice_dismiss_ms: choose(
            base.notice_dismiss_ms,
            overlay.notice_dismiss_ms,
            Ai::default_notice_dismiss_ms,
        ),
    }
}

/// Prefer the overlay unless it still carries the built-in default.
fn choose<T: PartialEq>(base: T, overlay: T, default_fn: fn() -> T) -> T {
    if overlay != default_fn() { overlay } else { base }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("quickchoice/config.toml"))
}

fn workspace_config_path(vault: &Path) -> PathBuf {
    vault.join(WORKSPACE_DIR).join(WORKSPACE_CONFIG_FILE)
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(vault) = env.vault {
        config.defaults.vault = PathBuf::from(vault);
    }
    if let Some(model) = env.model {
        config.ai.model = Some(model);
    }
    config
}
