//! CLI configuration.
//!
//! Read from `<config dir>/ferry/config.json` unless `--config` names another
//! file. Every key is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ferry_transfer::RetryConfig;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the configured token.
pub const TOKEN_ENV: &str = "FERRY_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FerryConfig {
    /// Control-plane endpoint URL.
    pub endpoint: String,
    /// Bearer token; `FERRY_TOKEN` takes precedence.
    pub token: Option<String>,
    /// Where session records live. Defaults to `<config dir>/ferry/sessions`.
    pub state_dir: Option<PathBuf>,
    pub request_timeout_secs: u64,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub retry: RetrySettings,
}

impl Default for FerryConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: None,
            state_dir: None,
            request_timeout_secs: 30,
            log_level: "info".into(),
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub fail_fast_on_client_error: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            fail_fast_on_client_error: defaults.fail_fast_on_client_error,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            fail_fast_on_client_error: self.fail_fast_on_client_error,
            ..RetryConfig::default()
        }
    }
}

impl FerryConfig {
    /// Loads `path`, or the default location when `None`.
    ///
    /// A missing file yields defaults; an unparsable one is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Token to present to the control plane.
    pub fn token(&self) -> Option<String> {
        resolve_token(std::env::var(TOKEN_ENV).ok(), self.token.as_deref())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn state_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => ferry_session_store::default_state_dir()
                .ok_or_else(|| anyhow::anyhow!("cannot determine a state directory; set stateDir")),
        }
    }
}

fn resolve_token(from_env: Option<String>, configured: Option<&str>) -> Option<String> {
    from_env
        .filter(|t| !t.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .filter(|t| !t.trim().is_empty())
}

/// `<config dir>/ferry/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    config_base_dir().map(|d| d.join("ferry").join("config.json"))
}

fn config_base_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }
}
