use std::{env, path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};

/// Default backend location when the server is reached directly.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/api";

/// Identification calls a vision model, so the default is generous.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Application configuration, loaded at startup.
pub struct AppConfig {
    /// Base URL every endpoint path is joined onto (no trailing slash).
    pub api_base: String,
    /// Timeout applied to each request.
    pub timeout: Duration,
    /// SQLite file backing durable session storage.
    pub storage_path: PathBuf,
}

impl AppConfig {
    /// Load configuration from the environment.
    ///
    /// - `NUTRIX_API_BASE`: backend base URL. Deployments behind a reverse
    ///   proxy point this at the proxied prefix, e.g. `https://host/api`.
    /// - `NUTRIX_TIMEOUT_SECS`: request timeout in seconds.
    /// - `NUTRIX_STORAGE`: path of the storage database.
    pub fn load() -> Result<Self> {
        let api_base = env::var("NUTRIX_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let timeout_secs = match env::var("NUTRIX_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid NUTRIX_TIMEOUT_SECS '{}'", raw))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let storage_path = env::var("NUTRIX_STORAGE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_storage_path());

        Ok(AppConfig {
            api_base: normalize_base(&api_base),
            timeout: timeout_from_secs(timeout_secs).context("invalid NUTRIX_TIMEOUT_SECS")?,
            storage_path,
        })
    }
}

/// Values that can be supplied via command-line flags; they take precedence
/// over the environment.
#[derive(Default)]
pub struct ConfigOverrides {
    pub api_base: Option<String>,
    pub timeout_secs: Option<u64>,
    pub storage_path: Option<PathBuf>,
}

impl AppConfig {
    /// Apply non-`None` values from `overrides` to `self`.
    ///
    /// Nothing is changed when an override is rejected.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> Result<()> {
        let timeout = overrides
            .timeout_secs
            .map(timeout_from_secs)
            .transpose()
            .context("invalid timeout override")?;

        if let Some(base) = &overrides.api_base {
            self.api_base = normalize_base(base);
        }
        if let Some(timeout) = timeout {
            self.timeout = timeout;
        }
        if let Some(path) = &overrides.storage_path {
            self.storage_path = path.clone();
        }
        Ok(())
    }
}

// a zero timeout would fail every request immediately.
fn timeout_from_secs(secs: u64) -> Result<Duration> {
    if secs == 0 {
        bail!("timeout must be at least one second");
    }
    Ok(Duration::from_secs(secs))
}

fn normalize_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("nutri-x").join("storage.sqlite3"))
        .unwrap_or_else(|| PathBuf::from("nutri-x.sqlite3"))
}
