use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub http: Http,
    pub log: Log,
    pub storage: Storage,
    pub auth: Auth,
    pub password: Password,
    pub cookie: Cookie,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub cert_path: String,
    pub key_path: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
    pub backend: String, // "memory" or "real"
    #[serde(default)]
    pub mysql_dsn: String,
    #[serde(default)]
    pub redis_dsn: String,
    #[serde(default = "default_redis_prefix")]
    pub redis_prefix: String,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub issuer: String,
    pub access_audience: String,
    pub refresh_audience: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
    #[serde(default = "default_remember_me_ttl_secs")]
    pub remember_me_ttl_secs: u64,
    #[serde(default = "default_rotation_grace_secs")]
    pub rotation_grace_secs: u64,
    #[serde(default = "default_reuse_epoch_secs")]
    pub reuse_epoch_secs: u64,
    #[serde(default = "default_password_change_epoch_secs")]
    pub password_change_epoch_secs: u64,
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
    // names of environment variables, never the secrets themselves
    pub access_secret_env: String,
    pub refresh_secret_env: String,
    pub csrf_secret_env: String,
}

#[derive(Debug, Deserialize)]
pub struct Password {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Deserialize)]
pub struct Cookie {
    pub secure: bool,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
}

fn default_redis_prefix() -> String {
    "tokengate".to_string()
}

fn default_call_timeout_ms() -> u64 {
    2000
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_access_ttl_secs() -> u64 {
    15 * 60
}

fn default_refresh_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_remember_me_ttl_secs() -> u64 {
    30 * 24 * 60 * 60
}

fn default_rotation_grace_secs() -> u64 {
    10
}

fn default_reuse_epoch_secs() -> u64 {
    5
}

fn default_password_change_epoch_secs() -> u64 {
    60 * 60
}

fn default_min_password_len() -> usize {
    8
}

fn default_refresh_path() -> String {
    "/api/v1/auth".to_string()
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
