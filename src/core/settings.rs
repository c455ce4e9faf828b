use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const BASE_URL_ENV: &str = "GRADEWATCH_BASE_URL";
const TOKEN_ENV: &str = "GRADEWATCH_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub polling: PollingSettings,
    pub notifications: NotificationSettings,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub queue_path: String,
    pub trigger_path: String,
    pub report_path: String,
    pub timeout_secs: u64,
    pub token: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            queue_path: "/api/analysis/queue".to_string(),
            trigger_path: "/api/tasks/{task_id}/analyze".to_string(),
            report_path: "/tasks/{task_id}".to_string(),
            timeout_secs: 10,
            token: None,
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn queue_url(&self) -> String {
        join_url(&self.base_url, &self.queue_path)
    }

    pub fn trigger_url(&self, task_id: &str) -> String {
        join_url(&self.base_url, &self.trigger_path.replace("{task_id}", task_id))
    }

    pub fn report_url(&self, task_id: &str) -> String {
        join_url(&self.base_url, &self.report_path.replace("{task_id}", task_id))
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_ms: u64,
    pub max_consecutive_errors: Option<u32>,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            max_consecutive_errors: None,
        }
    }
}

impl PollingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gradewatch").join("config.toml"))
    }

    /// Loads settings from `path` (or the default location), applies
    /// environment overrides and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let path = Self::config_path().context("Could not determine config directory")?;
                if path.exists() {
                    Self::load_from(&path)?
                } else {
                    tracing::info!(?path, "Config file not found, using defaults");
                    Self::default()
                }
            }
        };

        settings.apply_env_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(?path, "Loaded config");
        Ok(settings)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|v| !v.is_empty()) {
            tracing::debug!(%base_url, "Overriding api.base_url from environment");
            self.api.base_url = base_url;
        }
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.api.token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_ms == 0 {
            anyhow::bail!("polling.interval_ms must be greater than 0");
        }
        if self.polling.max_consecutive_errors == Some(0) {
            anyhow::bail!("polling.max_consecutive_errors must be greater than 0 when set");
        }
        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be greater than 0");
        }
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            anyhow::bail!(
                "api.base_url must start with http:// or https://, got {}",
                self.api.base_url
            );
        }
        for (key, path) in [
            ("api.queue_path", &self.api.queue_path),
            ("api.trigger_path", &self.api.trigger_path),
            ("api.report_path", &self.api.report_path),
        ] {
            if !path.starts_with('/') {
                anyhow::bail!("{} must start with '/', got {}", key, path);
            }
        }
        Ok(())
    }
}
