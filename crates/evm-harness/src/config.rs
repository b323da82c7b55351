//! Harness configuration.

use std::env;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

pub const NODE_BINARY_ENV: &str = "HARNESS_NODE_BINARY";
pub const DISPLAY_LOG_ENV: &str = "HARNESS_DISPLAY_LOG";
pub const NODE_LOG_ENV: &str = "HARNESS_NODE_LOG";
pub const BACKEND_TYPE_ENV: &str = "HARNESS_BACKEND_TYPE";
pub const GENESIS_PATH_ENV: &str = "HARNESS_GENESIS_PATH";
pub const WORK_ROOT_ENV: &str = "HARNESS_WORK_ROOT";
pub const STARTUP_TIMEOUT_ENV: &str = "HARNESS_STARTUP_TIMEOUT_MS";
pub const STOP_TIMEOUT_ENV: &str = "HARNESS_STOP_TIMEOUT_MS";
pub const STOP_POLL_ENV: &str = "HARNESS_STOP_POLL_MS";

pub const DEFAULT_READINESS_PATTERN: &str = "addcon thread start";
const DEFAULT_NODE_LOG: &str = "info";
const DEFAULT_BACKEND_TYPE: &str = "key-value";
const DEFAULT_GENESIS_FILE: &str = "genesis.json";
const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 45_000;
const DEFAULT_STOP_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_STOP_POLL_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    node_binary: Option<PathBuf>,
    display_log: bool,
    node_log: String,
    backend_type: String,
    genesis_path: PathBuf,
    work_root: PathBuf,
    readiness_pattern: String,
    startup_timeout: Duration,
    stop_timeout: Duration,
    stop_poll_interval: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl HarnessConfig {
    pub fn from_env() -> Self {
        Self {
            node_binary: env_non_empty(NODE_BINARY_ENV).map(PathBuf::from),
            display_log: env_bool(DISPLAY_LOG_ENV).unwrap_or(false),
            node_log: env_non_empty(NODE_LOG_ENV).unwrap_or_else(|| DEFAULT_NODE_LOG.to_string()),
            backend_type: env_non_empty(BACKEND_TYPE_ENV)
                .unwrap_or_else(|| DEFAULT_BACKEND_TYPE.to_string()),
            genesis_path: env_non_empty(GENESIS_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(default_genesis_path),
            work_root: env_non_empty(WORK_ROOT_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            readiness_pattern: DEFAULT_READINESS_PATTERN.to_string(),
            startup_timeout: Duration::from_millis(parse_env_u64(
                STARTUP_TIMEOUT_ENV,
                DEFAULT_STARTUP_TIMEOUT_MS,
            )),
            stop_timeout: Duration::from_millis(parse_env_u64(
                STOP_TIMEOUT_ENV,
                DEFAULT_STOP_TIMEOUT_MS,
            )),
            stop_poll_interval: Duration::from_millis(parse_env_u64(
                STOP_POLL_ENV,
                DEFAULT_STOP_POLL_MS,
            )),
        }
    }

    pub fn node_binary(&self) -> Option<&Path> {
        self.node_binary.as_deref()
    }

    pub fn display_log(&self) -> bool {
        self.display_log
    }

    pub fn node_log(&self) -> &str {
        &self.node_log
    }

    pub fn backend_type(&self) -> &str {
        &self.backend_type
    }

    pub fn genesis_path(&self) -> &Path {
        &self.genesis_path
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    pub fn readiness_pattern(&self) -> &str {
        &self.readiness_pattern
    }

    pub fn startup_timeout(&self) -> Duration {
        self.startup_timeout
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    pub fn stop_poll_interval(&self) -> Duration {
        self.stop_poll_interval
    }

    pub fn with_node_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.node_binary = Some(binary.into());
        self
    }

    pub fn with_display_log(mut self, display: bool) -> Self {
        self.display_log = display;
        self
    }

    pub fn with_genesis_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.genesis_path = path.into();
        self
    }

    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    pub fn with_readiness_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.readiness_pattern = pattern.into();
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_stop_poll_interval(mut self, interval: Duration) -> Self {
        self.stop_poll_interval = interval;
        self
    }
}

fn default_genesis_path() -> PathBuf {
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(DEFAULT_GENESIS_FILE)
}

fn env_non_empty(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_bool(key: &str) -> Option<bool> {
    let value = env_non_empty(key)?;
    let parsed = parse_bool(&value);
    if parsed.is_none() {
        warn!(value = %value, key, "Invalid boolean config; using default");
    }
    parsed
}

fn parse_env_u64(key: &str, default: u64) -> u64 {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return default,
    };
    if value.trim().is_empty() {
        return default;
    }
    match value.trim().parse::<u64>() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(value = %value, key, "Invalid numeric config; using default");
            default
        }
    }
}
