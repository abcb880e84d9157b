//! Configuration primitives for the fan site.
//!
//! Stored in a TOML file located at `<root>/config/config.toml`, where the
//! root is `FANSITE_HOME` or the OS data directory. Every section has
//! defaults so a missing or partial file still yields a working site.

use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Root configuration persisted per installation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Listener settings for the HTTP server.
    #[serde(default)]
    pub server: ServerSettings,
    /// Profile photo upload limits and storage location.
    #[serde(default)]
    pub uploads: UploadSettings,
    /// Password hashing and session cookie knobs.
    #[serde(default)]
    pub security: SecuritySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8000
}

/// Upload settings for the `foto` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Largest accepted image, in bytes.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    /// Hard cap on a whole request body. Parts beyond `max_image_bytes` are
    /// drained and reported as a form error as long as this is not hit.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
    /// Sub-directory of the media root receiving profile photos.
    #[serde(default = "default_upload_to")]
    pub upload_to: String,
    /// URL prefix under which the media root is served.
    #[serde(default = "default_media_url")]
    pub media_url: String,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
            max_request_bytes: default_max_request_bytes(),
            upload_to: default_upload_to(),
            media_url: default_media_url(),
        }
    }
}

impl UploadSettings {
    /// Room for multipart boundaries and the other form fields.
    pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

    /// Body limit applied to every route, never below one full image.
    pub fn request_body_limit(&self) -> usize {
        self.max_request_bytes
            .max(self.max_image_bytes.saturating_add(Self::MULTIPART_OVERHEAD))
    }
}

const fn default_max_image_bytes() -> usize {
    5 * 1024 * 1024
}

const fn default_max_request_bytes() -> usize {
    32 * 1024 * 1024
}

fn default_upload_to() -> String {
    "fotos_perfil".to_string()
}

fn default_media_url() -> String {
    "/media/".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySettings {
    /// bcrypt work factor used for new password hashes.
    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    /// Seconds a session stays valid after login.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

impl SecuritySettings {
    pub fn session_ttl(&self) -> chrono::Duration {
        let secs = i64::try_from(self.session_ttl_secs).unwrap_or(i64::MAX);
        chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            password_hash_cost: default_password_hash_cost(),
            min_password_length: default_min_password_length(),
            session_cookie: default_session_cookie(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

const fn default_password_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

const fn default_min_password_length() -> usize {
    8
}

fn default_session_cookie() -> String {
    "sessionid".to_string()
}

const fn default_session_ttl_secs() -> u64 {
    14 * 24 * 60 * 60
}

/// Standard relative path to the config file.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Returns the root directory where the site stores data.
///
/// Order of precedence:
/// 1. `FANSITE_HOME` environment variable.
/// 2. OS-specific data directory via `directories::BaseDirs`.
pub fn workspace_root() -> Result<PathBuf> {
    if let Ok(path) = env::var("FANSITE_HOME") {
        return Ok(PathBuf::from(path));
    }
    let base_dirs = BaseDirs::new().context("Unable to determine OS data directory")?;
    Ok(base_dirs.data_dir().join("Fansite"))
}

/// Important directories below a workspace root.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub media_dir: PathBuf,
}

impl WorkspacePaths {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
            media_dir: root.join("media"),
            root,
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// JSON document holding the account and profile tables.
    pub fn database_file(&self) -> PathBuf {
        self.data_dir.join("db.json")
    }

    pub fn events_file(&self) -> PathBuf {
        self.data_dir.join("events.jsonl")
    }

    /// Creates the config, data and media directories.
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.media_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed creating workspace directory {:?}", dir))?;
        }
        Ok(())
    }
}

/// Resolves the workspace root and makes sure its directories exist.
pub fn ensure_workspace_structure() -> Result<WorkspacePaths> {
    let paths = WorkspacePaths::at(workspace_root()?);
    paths.ensure()?;
    Ok(paths)
}

/// Loads the configuration from disk or returns defaults.
pub fn load_or_default(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let cfg: AppConfig = toml::from_str(&data)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(cfg)
    } else {
        Ok(AppConfig::default())
    }
}

/// Applies `FANSITE_PORT` and `FANSITE_BIND` on top of the loaded file.
/// Unparseable values are ignored with a warning.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(raw) = env::var("FANSITE_PORT") {
        match raw.parse() {
            Ok(port) => {
                info!("FANSITE_PORT set, using port {port}");
                config.server.port = port;
            }
            Err(err) => warn!("Invalid FANSITE_PORT value {raw:?}: {err}"),
        }
    }
    if let Ok(bind) = env::var("FANSITE_BIND") {
        info!("FANSITE_BIND set, binding to {bind}");
        config.server.bind_address = bind;
    }
}

/// Persists the configuration to disk.
pub fn save(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let data = toml::to_string_pretty(config)?;
    fs::write(path, data)?;
    Ok(())
}
