//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `TODOKEEP_DATA_DIR` and `TODOKEEP_LOG_LEVEL` env overrides.
//! The token signing key is read from `TODOKEEP_SECRET` only.

use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    time::Duration as StdDuration,
};

use chrono::Duration;
use serde::Deserialize;

use crate::auth::TokenSettings;
use crate::error::AppError;
use crate::store::DEFAULT_STORE_TIMEOUT;

/// HMAC secret for access tokens.  `Debug` never prints the bytes.
#[derive(Clone)]
pub struct SigningKey(String);

impl SigningKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey(<{} bytes>)", self.0.len())
    }
}

/// Credential store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `"memory"` or `"json"`.
    pub backend: String,
    /// Upper bound on a single store call.
    pub timeout: StdDuration,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    /// Directory for persistent data (already expanded, no `~`).
    pub data_dir: PathBuf,
    pub log_level: String,
    pub auth: TokenSettings,
    pub store: StoreConfig,
    /// From `TODOKEEP_SECRET`, never from TOML.  `None` when unset or empty.
    pub signing_key: Option<SigningKey>,
}

/// Raw TOML shape: `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    app: RawApp,
    #[serde(default)]
    auth: RawAuth,
    #[serde(default)]
    store: RawStore,
}

#[derive(Deserialize)]
struct RawApp {
    #[serde(default = "default_app_name")]
    name: String,
    data_dir: String,
    log_level: String,
}

#[derive(Deserialize)]
struct RawAuth {
    #[serde(default = "default_issuer")]
    issuer: String,
    #[serde(default = "default_access_ttl_secs")]
    access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    refresh_ttl_secs: u64,
}

impl Default for RawAuth {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            access_ttl_secs: default_access_ttl_secs(),
            refresh_ttl_secs: default_refresh_ttl_secs(),
        }
    }
}

#[derive(Deserialize)]
struct RawStore {
    #[serde(default = "default_backend")]
    backend: String,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
}

impl Default for RawStore {
    fn default() -> Self {
        Self { backend: default_backend(), timeout_ms: default_timeout_ms() }
    }
}

fn default_app_name() -> String { "todokeep".to_string() }
fn default_issuer() -> String { "todokeep".to_string() }
fn default_access_ttl_secs() -> u64 { 5 * 60 }
fn default_refresh_ttl_secs() -> u64 { 14 * 24 * 60 * 60 }
fn default_backend() -> String { "json".to_string() }
fn default_timeout_ms() -> u64 { DEFAULT_STORE_TIMEOUT.as_millis() as u64 }

/// Load config from `config/default.toml` (or `path`), then apply env-var
/// overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let data_dir_override = env::var("TODOKEEP_DATA_DIR").ok();
    let log_level_override = env::var("TODOKEEP_LOG_LEVEL").ok();
    let secret = env::var("TODOKEEP_SECRET").ok();
    load_from(
        Path::new(path.unwrap_or("config/default.toml")),
        data_dir_override.as_deref(),
        log_level_override.as_deref(),
        secret.as_deref(),
    )
}

/// Internal loader: accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    data_dir_override: Option<&str>,
    log_level_override: Option<&str>,
    secret: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let a = parsed.app;
    let data_dir = expand_home(data_dir_override.unwrap_or(&a.data_dir));
    let log_level = log_level_override.unwrap_or(&a.log_level).to_string();

    if parsed.auth.issuer.trim().is_empty() {
        return Err(AppError::Config("auth.issuer must not be empty".into()));
    }
    if parsed.store.timeout_ms == 0 {
        return Err(AppError::Config("store.timeout_ms must be greater than zero".into()));
    }

    Ok(Config {
        app_name: a.name,
        data_dir,
        log_level,
        auth: TokenSettings {
            issuer: parsed.auth.issuer,
            access_ttl: ttl("auth.access_ttl_secs", parsed.auth.access_ttl_secs)?,
            refresh_ttl: ttl("auth.refresh_ttl_secs", parsed.auth.refresh_ttl_secs)?,
        },
        store: StoreConfig {
            backend: parsed.store.backend,
            timeout: StdDuration::from_millis(parsed.store.timeout_ms),
        },
        signing_key: secret.filter(|s| !s.is_empty()).map(SigningKey::new),
    })
}

fn ttl(field: &str, secs: u64) -> Result<Duration, AppError> {
    if secs == 0 {
        return Err(AppError::Config(format!("{field} must be greater than zero")));
    }
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| AppError::Config(format!("{field} is out of range: {secs}")))
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// In-memory backend, short timeouts, fixed signing key.
#[cfg(test)]
impl Config {
    pub fn test_default(data_dir: &Path) -> Self {
        Self {
            app_name: "test".into(),
            data_dir: data_dir.to_path_buf(),
            log_level: "info".into(),
            auth: TokenSettings::default(),
            store: StoreConfig { backend: "memory".into(), timeout: StdDuration::from_millis(500) },
            signing_key: Some(SigningKey::new("test-secret-test-secret-test-sec")),
        }
    }
}
