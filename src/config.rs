//! Server configuration.
//!
//! Defaults can be replaced by a YAML file named in `SIMPLEWEB_CONFIG`, and
//! individual values by environment variables:
//!
//! | Variable           | Field                  |
//! |--------------------|------------------------|
//! | `LISTEN`           | `server.listen_addr`   |
//! | `POLL_INTERVAL_MS` | `pool.poll_interval_ms`|
//! | `IDLE_TIMEOUT_MS`  | `pool.idle_timeout_ms` |
//! | `MAX_TOKEN_LEN`    | `pool.max_token_len`   |
//! | `MAX_HEADERS`      | `pool.max_headers`     |

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::http::parser::{DEFAULT_MAX_HEADERS, DEFAULT_MAX_TOKEN_LEN, ParserLimits};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Sleep between idle poll passes.
    pub poll_interval_ms: u64,
    /// A connection with no reads for this long is evicted.
    pub idle_timeout_ms: u64,
    /// Longest method, URI, version, header name or value accepted.
    pub max_token_len: usize,
    /// Most distinct headers accepted in one request.
    pub max_headers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
            idle_timeout_ms: 5000,
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
            max_headers: DEFAULT_MAX_HEADERS,
        }
    }
}

impl PoolConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn limits(&self) -> ParserLimits {
        ParserLimits {
            max_token_len: self.max_token_len,
            max_headers: self.max_headers,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Loads configuration, resolving variables through `lookup`.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut cfg = match lookup("SIMPLEWEB_CONFIG") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(addr) = lookup("LISTEN") {
            cfg.server.listen_addr = addr;
        }
        if let Some(v) = lookup("POLL_INTERVAL_MS") {
            cfg.pool.poll_interval_ms = parse_var("POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("IDLE_TIMEOUT_MS") {
            cfg.pool.idle_timeout_ms = parse_var("IDLE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("MAX_TOKEN_LEN") {
            cfg.pool.max_token_len = parse_var("MAX_TOKEN_LEN", &v)?;
        }
        if let Some(v) = lookup("MAX_HEADERS") {
            cfg.pool.max_headers = parse_var("MAX_HEADERS", &v)?;
        }

        Ok(cfg)
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("invalid configuration")
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config file {}", path.display()))
    }
}

fn parse_var<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a non-negative integer, got {value:?}"))
}
